//! Request evidence.
//!
//! Evidence keys are dotted strings with a reserved prefix (`header.`,
//! `cookie.`, `query.`, `session.`, `server.`). Keys are case-insensitive and
//! are stored lower-cased.

pub mod filter;

pub use filter::{
    EvidenceKeyFilter, EvidenceKeyFilterAggregator, EvidenceKeyFilterShareUsage,
    EvidenceKeyFilterWhitelist,
};

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::constants::EVIDENCE_SEPARATOR;

/// Evidence for one request. Elements may add evidence while processing, so
/// the store is interior mutable.
#[derive(Debug, Default)]
pub struct Evidence {
    values: RwLock<BTreeMap<String, String>>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, key: impl AsRef<str>, value: impl Into<String>) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.as_ref().to_lowercase(), value.into());
    }

    pub fn try_get(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(&key.to_lowercase()).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.try_get(key).is_some()
    }

    /// Snapshot of all evidence.
    pub fn as_dictionary(&self) -> BTreeMap<String, String> {
        self.values.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Evidence whose key starts with `prefix.`, keyed by the remainder.
    pub fn with_prefix(&self, prefix: &str) -> BTreeMap<String, String> {
        let start = format!("{}{}", prefix.to_lowercase(), EVIDENCE_SEPARATOR);
        self.values
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&start).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
