//! Static precedence over probe sources.
//!
//! The hierarchy is configuration, never logic: callers hand in the ordered
//! list (highest trust first) and the aggregator only ever asks it to rank.
//! Sources missing from the list rank below every listed source and are
//! ordered among themselves by id, so resolution is deterministic.

use crate::core::error::RealityError;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

#[derive(Debug, Clone, Default)]
pub struct TrustHierarchy {
    order: Vec<String>,
    ranks: FxHashMap<String, usize>,
}

impl TrustHierarchy {
    pub fn new<I, S>(order: I) -> Result<Self, RealityError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ranks = FxHashMap::default();
        let mut list = Vec::new();
        for source in order {
            let source = source.into();
            if source.trim().is_empty() {
                return Err(RealityError::ConfigError(
                    "trust order contains an empty source id".to_string(),
                ));
            }
            if ranks.insert(source.clone(), list.len()).is_some() {
                return Err(RealityError::ConfigError(format!(
                    "trust order lists '{}' more than once",
                    source
                )));
            }
            list.push(source);
        }
        Ok(Self { order: list, ranks })
    }

    /// Zero-based rank, lower is more trusted. `None` for unlisted sources.
    pub fn rank(&self, source: &str) -> Option<usize> {
        self.ranks.get(source).copied()
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Total order: `Less` means `a` is trusted more than `b`.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match (self.rank(a), self.rank(b)) {
            (Some(ra), Some(rb)) => ra.cmp(&rb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }
}
