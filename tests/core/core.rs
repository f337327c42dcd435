use reality::core::audit;
use reality::core::config::RealityConfig;
use reality::core::consensus::{Aggregator, ConsensusReport, ReportCondition, ScoringMode};
use reality::core::drift::compare_reports;
use reality::core::error::RealityError;
use reality::core::gate::{GateThresholds, ViolationKind, evaluate};
use reality::core::observation::Observation;
use reality::core::probe::{Probe, ProbeStatus};
use reality::core::runner::{RunOptions, run_probes};
use reality::core::store::{FileReportStore, ReportStore};
use reality::core::trust::TrustHierarchy;
use reality::facts;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn trust() -> TrustHierarchy {
    TrustHierarchy::new(["github", "git", "filesystem", "supabase", "vercel"]).unwrap()
}

fn aggregate(observations: &[Observation], scoring: ScoringMode) -> ConsensusReport {
    Aggregator::new(trust(), scoring).aggregate("r", observations, vec![], false, 1_000)
}

struct DelayedProbe {
    id: &'static str,
    delay: Duration,
    branch: &'static str,
}

impl Probe for DelayedProbe {
    fn id(&self) -> &str {
        self.id
    }

    fn kind(&self) -> &'static str {
        "delayed"
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(500)
    }

    fn observe(&self) -> Result<Observation, RealityError> {
        std::thread::sleep(self.delay);
        Observation::new(self.id, facts! { "branch" => self.branch }, 1.0, 0)
    }
}

#[test]
fn single_source_facts_resolve_unchanged() {
    let report = aggregate(
        &[
            Observation::new("git", facts! { "head_commit" => "abc123" }, 0.9, 0).unwrap(),
            Observation::new("filesystem", facts! { "file_count" => 42 }, 1.0, 0).unwrap(),
        ],
        ScoringMode::Unweighted,
    );
    assert_eq!(report.resolved_value("head_commit"), Some(&serde_json::json!("abc123")));
    assert_eq!(report.resolved_value("file_count"), Some(&serde_json::json!(42)));
    assert!(report.conflicts().is_empty());
    assert_eq!(report.score(), 1.0);
}

#[test]
fn higher_trust_source_wins_a_conflict() {
    let report = aggregate(
        &[
            Observation::new("filesystem", facts! { "branch" => "dev" }, 1.0, 0).unwrap(),
            Observation::new("git", facts! { "branch" => "main" }, 1.0, 0).unwrap(),
        ],
        ScoringMode::Unweighted,
    );
    assert_eq!(report.resolved_value("branch"), Some(&serde_json::json!("main")));
    assert_eq!(report.conflicts().len(), 1);
    assert_eq!(report.conflicts()[0].resolved_source, "git");
    assert_eq!(report.score(), 0.0);
}

#[test]
fn unanimous_exists_scores_one_in_either_mode() {
    let observations = [
        Observation::new("github", facts! { "exists" => true }, 0.9, 0).unwrap(),
        Observation::new("git", facts! { "exists" => true }, 0.8, 0).unwrap(),
        Observation::new("filesystem", facts! { "exists" => true }, 1.0, 0).unwrap(),
    ];
    for mode in [ScoringMode::Unweighted, ScoringMode::Confidence] {
        let report = aggregate(&observations, mode);
        assert_eq!(report.score(), 1.0);
        assert!(report.conflicts().is_empty());
    }
}

#[test]
fn conflicts_never_raise_the_score() {
    let agree = aggregate(
        &[
            Observation::new("git", facts! { "a" => 1, "b" => 2 }, 1.0, 0).unwrap(),
            Observation::new("filesystem", facts! { "a" => 1, "b" => 2 }, 1.0, 0).unwrap(),
        ],
        ScoringMode::Unweighted,
    );
    let one_conflict = aggregate(
        &[
            Observation::new("git", facts! { "a" => 1, "b" => 2 }, 1.0, 0).unwrap(),
            Observation::new("filesystem", facts! { "a" => 1, "b" => 3 }, 1.0, 0).unwrap(),
        ],
        ScoringMode::Unweighted,
    );
    let two_conflicts = aggregate(
        &[
            Observation::new("git", facts! { "a" => 1, "b" => 2 }, 1.0, 0).unwrap(),
            Observation::new("filesystem", facts! { "a" => 0, "b" => 3 }, 1.0, 0).unwrap(),
        ],
        ScoringMode::Unweighted,
    );
    assert!(agree.score() >= one_conflict.score());
    assert!(one_conflict.score() >= two_conflicts.score());
    assert_eq!(one_conflict.score(), 0.5);
}

#[test]
fn no_observations_is_no_data() {
    let report = aggregate(&[], ScoringMode::Unweighted);
    assert_eq!(report.score(), 0.0);
    assert_eq!(report.condition(), Some(ReportCondition::NoDataAvailable));
    let decision = evaluate(Some(&report), &GateThresholds::default(), 1_000);
    assert!(!decision.allowed);
    assert!(decision.has(ViolationKind::NoDataAvailable));
}

#[test]
fn stale_report_denied_regardless_of_score() {
    let report = aggregate(
        &[Observation::new("git", facts! { "branch" => "main" }, 1.0, 0).unwrap()],
        ScoringMode::Unweighted,
    );
    assert_eq!(report.score(), 1.0);
    let thresholds = GateThresholds {
        max_age_secs: 60,
        ..GateThresholds::default()
    };
    assert!(evaluate(Some(&report), &thresholds, 1_060).allowed);
    let decision = evaluate(Some(&report), &thresholds, 1_061);
    assert!(!decision.allowed);
    assert_eq!(decision.violations[0].kind, ViolationKind::StaleReport);
}

#[test]
fn slow_probe_times_out_and_fast_probes_still_count() {
    let probes: Vec<Arc<dyn Probe>> = vec![
        Arc::new(DelayedProbe {
            id: "git",
            delay: Duration::from_millis(5),
            branch: "main",
        }),
        Arc::new(DelayedProbe {
            id: "github",
            delay: Duration::from_secs(3),
            branch: "dev",
        }),
    ];
    let run = run_probes("run-1", &probes, &RunOptions::default());
    assert_eq!(run.outcomes[0].status, ProbeStatus::Ok);
    assert_eq!(run.outcomes[1].status, ProbeStatus::Timeout);
    assert!(!run.partial);

    let report = Aggregator::new(trust(), ScoringMode::Unweighted).aggregate_run("run-1", &run, 5);
    assert_eq!(report.resolved_value("branch"), Some(&serde_json::json!("main")));
    assert_eq!(report.failed_sources().count(), 1);
    assert_eq!(report.score(), 1.0);

    let thresholds = GateThresholds {
        required_sources: vec!["github".to_string()],
        ..GateThresholds::default()
    };
    let decision = evaluate(Some(&report), &thresholds, 5);
    assert!(decision.has(ViolationKind::SourceUnavailable));
}

#[test]
fn file_store_round_trip_feeds_gate_and_drift() {
    let tmp = tempdir().unwrap();
    let store = FileReportStore::new(&tmp.path().join("data"));
    let config = RealityConfig::parse("[gate]\nrequired_facts = [\"branch\"]\n").unwrap();

    let probes: Vec<Arc<dyn Probe>> = vec![Arc::new(DelayedProbe {
        id: "git",
        delay: Duration::from_millis(1),
        branch: "main",
    })];
    let first = audit::check_and_publish(&config, &probes, &store, None).unwrap();

    let probes: Vec<Arc<dyn Probe>> = vec![Arc::new(DelayedProbe {
        id: "git",
        delay: Duration::from_millis(1),
        branch: "release",
    })];
    let second = audit::check_and_publish(&config, &probes, &store, None).unwrap();

    assert_eq!(store.latest().unwrap().unwrap(), second);
    assert_eq!(store.history(10).unwrap().len(), 2);

    let decision = audit::gate_latest(&store, &config.gate, None, second.created_at()).unwrap();
    assert!(decision.allowed, "{:?}", decision.reasons());

    let drift = compare_reports(&store.load(first.report_id()).unwrap(), &second);
    assert_eq!(drift.changed.len(), 1);
    assert_eq!(drift.changed[0].fact, "branch");
}

#[test]
fn builtin_config_drives_the_default_trust_order() {
    let config = RealityConfig::builtin().unwrap();
    let trust = config.trust_hierarchy().unwrap();
    assert_eq!(trust.rank("github"), Some(0));
    assert_eq!(trust.rank("vercel"), Some(4));
    assert!(trust.rank("netlify").is_none());
    assert_eq!(config.gate.min_score, 0.8);
}
