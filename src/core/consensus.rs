//! Consensus aggregation.
//!
//! Merges the observations of one run into a [`ConsensusReport`]. For each
//! fact seen by at least one probe:
//! - all contributing values agree: the fact is resolved directly;
//! - values disagree: a [`ConflictRecord`] is emitted and the value of the
//!   most trusted source wins.
//!
//! The score is the share of agreeing facts, optionally weighted by the mean
//! confidence of the probes that reported each fact. A run without any
//! observed fact scores `0.0` and carries [`ReportCondition::NoDataAvailable`].

use crate::core::observation::{FactValue, Observation};
use crate::core::probe::SourceReport;
use crate::core::runner::ProbeRun;
use crate::core::trust::TrustHierarchy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// agreeing facts / distinct facts
    #[default]
    Unweighted,
    /// each fact weighted by the mean confidence of its reporters
    Confidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcedValue {
    pub source: String,
    pub value: FactValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub fact: String,
    /// Competing values, most trusted source first.
    pub values: Vec<SourcedValue>,
    pub resolved_source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFact {
    pub value: FactValue,
    pub source: String,
    pub sources: Vec<String>,
    pub agreed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCondition {
    NoDataAvailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Excellent,
    Good,
    Warning,
    Critical,
}

impl HealthBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.7 {
            Self::Good
        } else if score >= 0.5 {
            Self::Warning
        } else {
            Self::Critical
        }
    }
}

impl std::fmt::Display for HealthBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Write-once result of a check run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    report_id: String,
    created_at: u64,
    score: f64,
    scoring: ScoringMode,
    resolved: BTreeMap<String, ResolvedFact>,
    conflicts: Vec<ConflictRecord>,
    sources: Vec<SourceReport>,
    partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<ReportCondition>,
}

impl ConsensusReport {
    pub fn report_id(&self) -> &str {
        &self.report_id
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn scoring(&self) -> ScoringMode {
        self.scoring
    }

    pub fn resolved(&self) -> &BTreeMap<String, ResolvedFact> {
        &self.resolved
    }

    pub fn resolved_value(&self, fact: &str) -> Option<&FactValue> {
        self.resolved.get(fact).map(|r| &r.value)
    }

    pub fn has_fact(&self, fact: &str) -> bool {
        self.resolved.contains_key(fact)
    }

    pub fn conflicts(&self) -> &[ConflictRecord] {
        &self.conflicts
    }

    pub fn sources(&self) -> &[SourceReport] {
        &self.sources
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| !s.is_ok())
    }

    pub fn partial(&self) -> bool {
        self.partial
    }

    pub fn condition(&self) -> Option<ReportCondition> {
        self.condition
    }

    pub fn agreeing_facts(&self) -> usize {
        self.resolved.values().filter(|r| r.agreed).count()
    }

    pub fn health_band(&self) -> HealthBand {
        HealthBand::from_score(self.score)
    }
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    trust: TrustHierarchy,
    scoring: ScoringMode,
}

struct Contribution<'a> {
    source: &'a str,
    value: &'a FactValue,
    confidence: f64,
}

impl Aggregator {
    pub fn new(trust: TrustHierarchy, scoring: ScoringMode) -> Self {
        Self { trust, scoring }
    }

    pub fn aggregate_run(&self, report_id: &str, run: &ProbeRun, now: u64) -> ConsensusReport {
        let sources = run.outcomes.iter().map(|o| o.source_report()).collect();
        self.aggregate(report_id, &run.observations(), sources, run.partial, now)
    }

    pub fn aggregate(
        &self,
        report_id: &str,
        observations: &[Observation],
        sources: Vec<SourceReport>,
        partial: bool,
        now: u64,
    ) -> ConsensusReport {
        let mut by_fact: BTreeMap<&str, Vec<Contribution<'_>>> = BTreeMap::new();
        for obs in observations {
            for (name, value) in obs.facts() {
                by_fact.entry(name.as_str()).or_default().push(Contribution {
                    source: obs.source(),
                    value,
                    confidence: obs.confidence(),
                });
            }
        }

        let mut resolved = BTreeMap::new();
        let mut conflicts = Vec::new();
        let mut agree_weight = 0.0;
        let mut total_weight = 0.0;

        for (fact, mut contributions) in by_fact {
            contributions.sort_by(|a, b| self.trust.compare(a.source, b.source));
            let winner = &contributions[0];
            let agreed = contributions.iter().all(|c| c.value == winner.value);

            let weight = match self.scoring {
                ScoringMode::Unweighted => 1.0,
                ScoringMode::Confidence => {
                    contributions.iter().map(|c| c.confidence).sum::<f64>()
                        / contributions.len() as f64
                }
            };
            total_weight += weight;
            if agreed {
                agree_weight += weight;
            } else {
                conflicts.push(ConflictRecord {
                    fact: fact.to_string(),
                    values: contributions
                        .iter()
                        .map(|c| SourcedValue {
                            source: c.source.to_string(),
                            value: c.value.clone(),
                        })
                        .collect(),
                    resolved_source: winner.source.to_string(),
                });
            }

            resolved.insert(
                fact.to_string(),
                ResolvedFact {
                    value: winner.value.clone(),
                    source: winner.source.to_string(),
                    sources: contributions.iter().map(|c| c.source.to_string()).collect(),
                    agreed,
                },
            );
        }

        let condition = resolved
            .is_empty()
            .then_some(ReportCondition::NoDataAvailable);
        // All-zero confidence carries no weighting signal; fall back to the plain ratio.
        let score = if resolved.is_empty() {
            0.0
        } else if total_weight > 0.0 {
            (agree_weight / total_weight).clamp(0.0, 1.0)
        } else {
            (resolved.len() - conflicts.len()) as f64 / resolved.len() as f64
        };

        ConsensusReport {
            report_id: report_id.to_string(),
            created_at: now,
            score,
            scoring: self.scoring,
            resolved,
            conflicts,
            sources,
            partial,
            condition,
        }
    }
}
