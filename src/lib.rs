//! Reality: a consensus reality check for agentic software work.
//!
//! Before an agent declares work done, ask every system of record what it
//! actually sees (the working tree, git, hosted services) and reconcile the
//! answers into one consensus report. A compliance gate then allows or
//! denies on that report.
//!
//! # Pipeline
//!
//! - **Source Probes** ([`core::probe`], [`plugins`]): read-only queries,
//!   one system each, run concurrently with per-probe and run deadlines
//! - **Trust Hierarchy** ([`core::trust`]): explicit source ranking used to
//!   break ties when probes disagree
//! - **Consensus Aggregator** ([`core::consensus`]): facts, conflicts and a
//!   score in `[0, 1]`
//! - **Compliance Gate** ([`core::gate`]): pure, fail-closed allow/deny
//!
//! # State
//!
//! Everything lives under `<project>/.reality/`:
//! - `reality.toml`: trust order, run limits, gate thresholds, probes
//! - `data/latest.json`: the latest published report
//! - `data/reality.db`: run history
//! - `data/reality.events.jsonl`: run event log
//!
//! # Examples
//!
//! ```bash
//! reality init
//! reality check
//! reality gate || echo "not done yet"
//! reality diff <old-report> latest
//! ```

pub mod core;
pub mod plugins;

use crate::core::{
    assets, audit, config,
    consensus::ConsensusReport,
    drift,
    error::RealityError,
    events::EventLog,
    output,
    store::{FileReportStore, ReportStore},
    time,
};

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "reality",
    version = env!("CARGO_PKG_VERSION"),
    about = "Multi-source consensus reality check"
)]
struct Cli {
    /// Echo run events to stderr.
    #[clap(long, short, global = true)]
    verbose: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct FormatArgs {
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

impl FormatArgs {
    fn json(&self) -> bool {
        self.format == "json"
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write `.reality/reality.toml` and create the data directory.
    Init {
        /// Directory to initialize (default: current directory).
        #[clap(long)]
        dir: Option<PathBuf>,
        /// Overwrite an existing configuration.
        #[clap(long)]
        force: bool,
    },
    /// Run all probes and publish a consensus report.
    Check(FormatArgs),
    /// Allow or deny based on the latest report. Exits non-zero on deny.
    Gate(FormatArgs),
    /// Print the latest report.
    Show(FormatArgs),
    /// List recorded runs, newest first.
    History {
        #[clap(long, default_value_t = 20)]
        limit: usize,
        #[clap(flatten)]
        format: FormatArgs,
    },
    /// Compare two recorded reports (`latest` names the current one).
    Diff {
        old: String,
        new: String,
        #[clap(flatten)]
        format: FormatArgs,
    },
    /// List configured probes.
    Probes(FormatArgs),
}

struct Project {
    root: PathBuf,
    config: config::RealityConfig,
    store: FileReportStore,
    events: EventLog,
}

impl Project {
    /// Resolve from `start`: nearest ancestor with `.reality/`, else `start` itself.
    fn open(start: &Path, verbose: bool) -> Result<Self, RealityError> {
        let root = config::find_project_root(start).unwrap_or_else(|_| start.to_path_buf());
        let config = config::load_config(&root)?;
        let data_dir = config::data_dir(&root);
        Ok(Self {
            store: FileReportStore::new(&data_dir),
            events: EventLog::new(&data_dir).with_echo(verbose),
            root,
            config,
        })
    }

    fn resolve_report(&self, id: &str) -> Result<ConsensusReport, RealityError> {
        if id == "latest" {
            return self
                .store
                .latest()?
                .ok_or_else(|| RealityError::NotFound("no report has been published".to_string()));
        }
        self.store.load(id)
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), RealityError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_project(dir: Option<PathBuf>, force: bool) -> Result<(), RealityError> {
    let target_dir = match dir {
        Some(d) => d,
        None => std::env::current_dir()?,
    };
    let target_dir = fs::canonicalize(&target_dir)?;
    let config_path = config::config_path(&target_dir);

    if config_path.exists() && !force {
        println!(
            "  {} {} already exists; use {} to overwrite",
            "▸".bright_yellow(),
            config_path.display(),
            "--force".bright_cyan().bold()
        );
        return Ok(());
    }

    let template = assets::get_template(assets::CONFIG_TEMPLATE).ok_or_else(|| {
        RealityError::NotFound(format!("embedded template {}", assets::CONFIG_TEMPLATE))
    })?;
    fs::create_dir_all(config::data_dir(&target_dir))?;
    fs::write(&config_path, template)?;
    println!("  {} {}", "●".bright_green(), config_path.display().to_string().bright_white());
    println!(
        "  {} {}",
        "●".bright_green(),
        config::data_dir(&target_dir).display().to_string().bright_white()
    );
    Ok(())
}

pub fn run() -> Result<(), RealityError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    match cli.command {
        Command::Init { dir, force } => init_project(dir, force),
        Command::Check(format) => {
            let project = Project::open(&current_dir, cli.verbose)?;
            let probes = plugins::build_probes(&project.config, &project.root)?;
            let report =
                audit::check_and_publish(&project.config, &probes, &project.store, Some(&project.events))?;
            if format.json() {
                print_json(&time::command_envelope(
                    "check",
                    "ok",
                    serde_json::json!({ "report": report }),
                ))
            } else {
                print!("{}", output::render_report(&report));
                Ok(())
            }
        }
        Command::Gate(format) => {
            let project = Project::open(&current_dir, cli.verbose)?;
            let decision = audit::gate_latest(
                &project.store,
                &project.config.gate,
                Some(&project.events),
                time::now_epoch_secs(),
            )?;
            if format.json() {
                print_json(&time::command_envelope(
                    "gate",
                    if decision.allowed { "allow" } else { "deny" },
                    serde_json::json!({
                        "allowed": decision.allowed,
                        "reasons": decision.reasons(),
                        "violations": &decision.violations,
                    }),
                ))?;
            } else {
                print!("{}", output::render_decision(&decision));
            }
            if decision.allowed {
                Ok(())
            } else {
                Err(RealityError::ComplianceDenied(output::preview_messages(
                    &decision.reasons(),
                    3,
                    120,
                )))
            }
        }
        Command::Show(format) => {
            let project = Project::open(&current_dir, cli.verbose)?;
            let report = project.resolve_report("latest")?;
            if format.json() {
                print_json(&serde_json::to_value(&report)?)
            } else {
                print!("{}", output::render_report(&report));
                Ok(())
            }
        }
        Command::History { limit, format } => {
            let project = Project::open(&current_dir, cli.verbose)?;
            let entries = project.store.history(limit)?;
            if format.json() {
                print_json(&time::command_envelope(
                    "history",
                    "ok",
                    serde_json::json!({ "runs": entries }),
                ))
            } else {
                print!("{}", output::render_history(&entries));
                Ok(())
            }
        }
        Command::Diff { old, new, format } => {
            let project = Project::open(&current_dir, cli.verbose)?;
            let drift = drift::compare_reports(
                &project.resolve_report(&old)?,
                &project.resolve_report(&new)?,
            );
            if format.json() {
                print_json(&time::command_envelope(
                    "diff",
                    "ok",
                    serde_json::json!({ "drift": drift }),
                ))
            } else {
                print!("{}", output::render_drift(&drift));
                Ok(())
            }
        }
        Command::Probes(format) => {
            let project = Project::open(&current_dir, cli.verbose)?;
            let trust = project.config.trust_hierarchy()?;
            if format.json() {
                return print_json(&time::command_envelope(
                    "probes",
                    "ok",
                    serde_json::json!({
                        "trust": trust.order(),
                        "probes": project.config.probe,
                    }),
                ));
            }
            for def in &project.config.probe {
                let rank = trust
                    .rank(&def.id)
                    .map(|r| format!("#{}", r + 1))
                    .unwrap_or_else(|| "unranked".to_string());
                println!(
                    "  {} {:<16} {:<11} {:<9} {}s {}",
                    "▸".bright_cyan(),
                    def.id.bright_white(),
                    format!("{:?}", def.kind).to_lowercase(),
                    rank,
                    def.timeout().as_secs(),
                    def.description.bright_black()
                );
            }
            Ok(())
        }
    }
}
