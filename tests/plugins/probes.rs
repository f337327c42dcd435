use reality::core::config::RealityConfig;
use reality::core::consensus::ScoringMode;
use reality::core::error::RealityError;
use reality::core::probe::{Probe, ProbeStatus};
use reality::core::runner::run_probes;
use reality::plugins::build_probes;
use reality::plugins::filesystem::FilesystemProbe;
use reality::plugins::snapshot::SnapshotProbe;
use serde_json::json;
use std::fs;
use tempfile::tempdir;

#[test]
fn filesystem_probe_skips_system_dirs_and_ignored_files() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("target/debug")).unwrap();
    fs::write(root.join("target/debug/big.bin"), vec![0u8; 4096]).unwrap();
    fs::create_dir_all(root.join("docs")).unwrap();
    fs::write(root.join("docs/guide.md"), "guide").unwrap();
    fs::write(root.join("docs/draft.tmp"), "draft").unwrap();
    fs::write(root.join("Cargo.toml"), "[package]").unwrap();

    let obs = FilesystemProbe::new("filesystem", root)
        .with_paths(vec!["Cargo.toml".to_string()])
        .with_ignore(&["*.tmp".to_string()])
        .unwrap()
        .observe()
        .unwrap();

    assert_eq!(obs.fact("file_count"), Some(&json!(2)));
    assert_eq!(obs.fact("dir_count"), Some(&json!(1)));
    assert_eq!(obs.fact("total_size_bytes"), Some(&json!(5 + 9)));
    assert_eq!(obs.fact("exists:Cargo.toml"), Some(&json!(true)));
    assert!(obs.fact("sha256:Cargo.toml").is_some());
    assert_eq!(obs.fact("root_readable"), Some(&json!(true)));
}

#[test]
fn secret_files_are_tracked_but_never_hashed() {
    let tmp = tempdir().unwrap();
    for name in [".env.production", "server.pem", "db_credentials.json", "notes.md"] {
        fs::write(tmp.path().join(name), "x").unwrap();
    }
    let obs = FilesystemProbe::new("filesystem", tmp.path())
        .with_paths(
            [".env.production", "server.pem", "db_credentials.json", "notes.md"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .observe()
        .unwrap();
    assert_eq!(obs.fact("exists:server.pem"), Some(&json!(true)));
    assert!(obs.fact("sha256:.env.production").is_none());
    assert!(obs.fact("sha256:server.pem").is_none());
    assert!(obs.fact("sha256:db_credentials.json").is_none());
    assert!(obs.fact("sha256:notes.md").is_some());
}

#[test]
fn snapshot_with_bad_json_is_invalid() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("export.json");
    fs::write(&path, "{ not json").unwrap();
    let err = SnapshotProbe::new("supabase", &path).observe().unwrap_err();
    assert!(matches!(err, RealityError::ValidationError(_)));
}

#[test]
fn configured_probes_reach_consensus_through_the_runner() {
    let tmp = tempdir().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::write(root.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
    fs::write(
        root.join("vercel.json"),
        r#"{"confidence": 0.6, "facts": {"branch": "preview", "deployed": true}}"#,
    )
    .unwrap();

    let config = RealityConfig::parse(
        r#"
[trust]
order = ["filesystem", "vercel"]

[run]
scoring = "confidence"

[[probe]]
id = "filesystem"
kind = "filesystem"

[[probe]]
id = "vercel"
kind = "snapshot"
file = "vercel.json"

[[probe]]
id = "supabase"
kind = "snapshot"
file = "missing.json"
"#,
    )
    .unwrap();
    assert_eq!(config.run.scoring, ScoringMode::Confidence);

    let probes = build_probes(&config, root).unwrap();
    let run = run_probes("run", &probes, &config.run_options());
    let statuses: Vec<_> = run.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![ProbeStatus::Ok, ProbeStatus::Ok, ProbeStatus::Unavailable]
    );

    let report = config.aggregator().unwrap().aggregate_run("run", &run, 0);
    assert_eq!(report.resolved_value("branch"), Some(&json!("main")));
    assert_eq!(report.resolved_value("deployed"), Some(&json!(true)));
    assert_eq!(report.conflicts().len(), 1);
    assert!(report.score() > 0.0 && report.score() < 1.0);
}

#[cfg(unix)]
#[test]
fn command_probe_runs_connector_from_config() {
    let tmp = tempdir().unwrap();
    let config = RealityConfig::parse(
        r#"
[[probe]]
id = "github"
kind = "command"
command = "sh"
args = ["-c", "printf '{\"confidence\": 0.9, \"facts\": {\"default_branch\": \"main\"}}'"]
timeout_secs = 5
"#,
    )
    .unwrap();
    let probes = build_probes(&config, tmp.path()).unwrap();
    let obs = probes[0].observe().unwrap();
    assert_eq!(obs.fact("default_branch"), Some(&json!("main")));
    assert_eq!(probes[0].kind(), "command");
}
