//! Check and gate orchestration.
//!
//! Glue between the pure pieces: run the probes, aggregate, publish through
//! a caller-owned store, then decide. Each step is recorded in the event log
//! when one is supplied.

use crate::core::config::RealityConfig;
use crate::core::consensus::ConsensusReport;
use crate::core::error::RealityError;
use crate::core::events::EventLog;
use crate::core::gate::{self, ComplianceDecision, GateThresholds};
use crate::core::probe::Probe;
use crate::core::runner;
use crate::core::store::ReportStore;
use crate::core::time;
use serde_json::json;
use std::sync::Arc;

/// Run every probe once and aggregate the results into a fresh report.
/// The report id is the run id.
pub fn run_check(
    config: &RealityConfig,
    probes: &[Arc<dyn Probe>],
    events: Option<&EventLog>,
) -> Result<ConsensusReport, RealityError> {
    let aggregator = config.aggregator()?;
    let run_id = time::new_event_id();
    let run = runner::run_probes(&run_id, probes, &config.run_options());

    if let Some(log) = events {
        for outcome in &run.outcomes {
            log.record(
                &run_id,
                "probe.observe",
                Some(&outcome.source),
                &outcome.status.to_string(),
                json!({
                    "kind": outcome.kind,
                    "elapsed_ms": outcome.elapsed_ms,
                    "facts": outcome.observation.as_ref().map(|o| o.facts().len()),
                    "confidence": outcome.observation.as_ref().map(|o| o.confidence()),
                    "error": outcome.error,
                }),
            )?;
        }
    }

    Ok(aggregator.aggregate_run(&run_id, &run, time::now_epoch_secs()))
}

/// Check, then publish the report as the new latest.
pub fn check_and_publish(
    config: &RealityConfig,
    probes: &[Arc<dyn Probe>],
    store: &dyn ReportStore,
    events: Option<&EventLog>,
) -> Result<ConsensusReport, RealityError> {
    let report = run_check(config, probes, events)?;
    store.publish(&report)?;
    if let Some(log) = events {
        log.record(
            report.report_id(),
            "report.publish",
            None,
            "published",
            json!({
                "score": report.score(),
                "facts": report.resolved().len(),
                "agreeing": report.agreeing_facts(),
                "conflicts": report.conflicts().len(),
                "partial": report.partial(),
            }),
        )?;
    }
    Ok(report)
}

/// Evaluate the gate against the store's latest report.
pub fn gate_latest(
    store: &dyn ReportStore,
    thresholds: &GateThresholds,
    events: Option<&EventLog>,
    now: u64,
) -> Result<ComplianceDecision, RealityError> {
    let latest = store.latest()?;
    let decision = gate::evaluate(latest.as_ref(), thresholds, now);
    if let Some(log) = events {
        log.record(
            latest.as_ref().map(|r| r.report_id()).unwrap_or("-"),
            "gate.evaluate",
            None,
            if decision.allowed { "allow" } else { "deny" },
            json!({ "reasons": decision.reasons() }),
        )?;
    }
    Ok(decision)
}
