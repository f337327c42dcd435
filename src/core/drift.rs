//! Report-to-report drift.

use crate::core::consensus::ConsensusReport;
use crate::core::observation::FactValue;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactChange {
    pub fact: String,
    pub before: FactValue,
    pub after: FactValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDrift {
    pub from: String,
    pub to: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<FactChange>,
    pub score_delta: f64,
    pub conflict_delta: i64,
}

impl ReportDrift {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

pub fn compare_reports(old: &ConsensusReport, new: &ConsensusReport) -> ReportDrift {
    let mut added = Vec::new();
    let mut changed = Vec::new();
    for (fact, resolved) in new.resolved() {
        match old.resolved().get(fact) {
            None => added.push(fact.clone()),
            Some(prev) if prev.value != resolved.value => changed.push(FactChange {
                fact: fact.clone(),
                before: prev.value.clone(),
                after: resolved.value.clone(),
            }),
            Some(_) => {}
        }
    }
    let removed = old
        .resolved()
        .keys()
        .filter(|fact| !new.has_fact(fact))
        .cloned()
        .collect();

    ReportDrift {
        from: old.report_id().to_string(),
        to: new.report_id().to_string(),
        added,
        removed,
        changed,
        score_delta: new.score() - old.score(),
        conflict_delta: new.conflicts().len() as i64 - old.conflicts().len() as i64,
    }
}
