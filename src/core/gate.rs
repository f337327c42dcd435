//! Compliance Gate
//!
//! Pure allow/deny decision over the latest consensus report:
//! - fails closed on a missing, stale or empty report
//! - requires every configured fact and source to be present
//! - rejects partial reports unless explicitly allowed
//! - enforces the minimum consensus score
//!
//! All violations are collected so a caller can remediate them in one pass.

use crate::core::consensus::{ConsensusReport, ReportCondition};
use crate::core::time;
use serde::{Deserialize, Serialize};

/// Default maximum report age (24h, the auditor's freshness window).
pub const DEFAULT_MAX_AGE_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_MIN_SCORE: f64 = 0.8;
/// Clock skew tolerated before a future-dated report is rejected.
pub const MAX_CLOCK_SKEW_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateThresholds {
    pub min_score: f64,
    pub max_age_secs: u64,
    pub required_facts: Vec<String>,
    /// Sources whose probes must have answered successfully.
    pub required_sources: Vec<String>,
    pub allow_partial: bool,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_score: DEFAULT_MIN_SCORE,
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            required_facts: Vec::new(),
            required_sources: Vec::new(),
            allow_partial: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingReport,
    StaleReport,
    NoDataAvailable,
    MissingRequiredFact,
    SourceUnavailable,
    PartialReport,
    ScoreBelowThreshold,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingReport => write!(f, "Missing report"),
            Self::StaleReport => write!(f, "Stale report"),
            Self::NoDataAvailable => write!(f, "No data available"),
            Self::MissingRequiredFact => write!(f, "Missing required fact"),
            Self::SourceUnavailable => write!(f, "Source unavailable"),
            Self::PartialReport => write!(f, "Partial report"),
            Self::ScoreBelowThreshold => write!(f, "Score below threshold"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
    pub remediation: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDecision {
    pub allowed: bool,
    pub violations: Vec<Violation>,
}

impl ComplianceDecision {
    /// Ordered human-readable violation strings.
    pub fn reasons(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.to_string()).collect()
    }

    pub fn has(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

fn violation(kind: ViolationKind, message: String, remediation: &str) -> Violation {
    Violation {
        kind,
        message,
        remediation: remediation.to_string(),
    }
}

pub fn evaluate(
    report: Option<&ConsensusReport>,
    thresholds: &GateThresholds,
    now: u64,
) -> ComplianceDecision {
    let Some(report) = report else {
        return ComplianceDecision {
            allowed: false,
            violations: vec![violation(
                ViolationKind::MissingReport,
                "no consensus report has been published".to_string(),
                "run `reality check` to produce a report",
            )],
        };
    };

    let mut violations = Vec::new();

    let age = time::age_secs(report.created_at(), now);
    let ahead = time::age_secs(now, report.created_at());
    if ahead > MAX_CLOCK_SKEW_SECS {
        violations.push(violation(
            ViolationKind::StaleReport,
            format!(
                "report {} is dated {}s in the future",
                report.report_id(),
                ahead
            ),
            "check the system clock and re-run `reality check`",
        ));
    } else if age > thresholds.max_age_secs {
        violations.push(violation(
            ViolationKind::StaleReport,
            format!(
                "report {} is {}s old (max {}s)",
                report.report_id(),
                age,
                thresholds.max_age_secs
            ),
            "re-run `reality check` to refresh the report",
        ));
    }

    if report.condition() == Some(ReportCondition::NoDataAvailable) {
        violations.push(violation(
            ViolationKind::NoDataAvailable,
            "no probe produced any facts".to_string(),
            "check probe configuration and connectivity",
        ));
    }

    for fact in &thresholds.required_facts {
        if !report.has_fact(fact) {
            violations.push(violation(
                ViolationKind::MissingRequiredFact,
                format!("required fact '{}' was not observed", fact),
                "enable a probe that reports this fact",
            ));
        }
    }

    for source in &thresholds.required_sources {
        match report.sources().iter().find(|s| &s.source == source) {
            Some(s) if s.is_ok() => {}
            Some(s) => violations.push(violation(
                ViolationKind::SourceUnavailable,
                format!(
                    "required source '{}' {}{}",
                    source,
                    s.status,
                    s.error
                        .as_deref()
                        .map(|e| format!(": {}", e))
                        .unwrap_or_default()
                ),
                "restore access to the source and re-run the check",
            )),
            None => violations.push(violation(
                ViolationKind::SourceUnavailable,
                format!("required source '{}' was not probed", source),
                "add a probe for this source",
            )),
        }
    }

    if report.partial() && !thresholds.allow_partial {
        violations.push(violation(
            ViolationKind::PartialReport,
            "report was cut short before every probe answered".to_string(),
            "raise the run timeout or investigate slow probes",
        ));
    }

    if report.score() < thresholds.min_score {
        violations.push(violation(
            ViolationKind::ScoreBelowThreshold,
            format!(
                "consensus score {:.2} is below minimum {:.2} ({} conflicts)",
                report.score(),
                thresholds.min_score,
                report.conflicts().len()
            ),
            "reconcile the conflicting facts listed in the report",
        ));
    }

    ComplianceDecision {
        allowed: violations.is_empty(),
        violations,
    }
}
