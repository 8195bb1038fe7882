//! Evidence key filters
//!
//! Each element declares which evidence keys it reads. The pipeline combines
//! these so hosts only gather evidence somebody will use.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::constants::{
    EVIDENCE_COOKIE_PREFIX, EVIDENCE_HTTPHEADER_PREFIX, EVIDENCE_QUERY_PREFIX,
    EVIDENCE_SEPARATOR, EVIDENCE_SERVER_PREFIX, FIFTYONE_COOKIE_PREFIX,
};

/// Predicate and ordering over evidence keys.
pub trait EvidenceKeyFilter: Send + Sync {
    /// True if the key is of interest.
    fn include(&self, key: &str) -> bool;

    /// Relative order of an included key; `None` if the key is not included.
    fn order(&self, key: &str) -> Option<i32>;
}

/// Filter accepting a fixed set of keys, case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct EvidenceKeyFilterWhitelist {
    keys: HashMap<String, i32>,
}

impl EvidenceKeyFilterWhitelist {
    /// Keys are ordered by their position in `keys`.
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .enumerate()
            .map(|(i, k)| (k.as_ref().to_lowercase(), i as i32))
            .collect();
        Self { keys }
    }

    pub fn with_order<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = (S, i32)>,
        S: AsRef<str>,
    {
        let keys = keys
            .into_iter()
            .map(|(k, o)| (k.as_ref().to_lowercase(), o))
            .collect();
        Self { keys }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

impl EvidenceKeyFilter for EvidenceKeyFilterWhitelist {
    fn include(&self, key: &str) -> bool {
        self.keys.contains_key(&key.to_lowercase())
    }

    fn order(&self, key: &str) -> Option<i32> {
        self.keys.get(&key.to_lowercase()).copied()
    }
}

/// Union of several filters.
#[derive(Clone, Default)]
pub struct EvidenceKeyFilterAggregator {
    filters: Vec<Arc<dyn EvidenceKeyFilter>>,
}

impl EvidenceKeyFilterAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(&mut self, filter: Arc<dyn EvidenceKeyFilter>) {
        self.filters.push(filter);
    }
}

impl EvidenceKeyFilter for EvidenceKeyFilterAggregator {
    fn include(&self, key: &str) -> bool {
        self.filters.iter().any(|f| f.include(key))
    }

    fn order(&self, key: &str) -> Option<i32> {
        self.filters.iter().find_map(|f| f.order(key))
    }
}

/// Filter selecting the evidence that is safe to share for usage analysis.
///
/// - headers, except blocked ones and the raw cookie header
/// - cookies whose name starts with `51d_`
/// - query parameters that are listed, or all of them when configured
/// - server values (e.g. client IP)
#[derive(Debug, Clone)]
pub struct EvidenceKeyFilterShareUsage {
    blocked_headers: HashSet<String>,
    included_query_params: HashSet<String>,
    include_all_query_params: bool,
}

impl EvidenceKeyFilterShareUsage {
    pub fn new<I, J, S, T>(blocked_headers: I, included_query_params: J, include_all_query_params: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        let mut blocked: HashSet<String> = blocked_headers
            .into_iter()
            .map(|h| h.as_ref().to_lowercase())
            .collect();
        blocked.insert("cookie".to_string());
        Self {
            blocked_headers: blocked,
            included_query_params: included_query_params
                .into_iter()
                .map(|q| q.as_ref().to_lowercase())
                .collect(),
            include_all_query_params,
        }
    }
}

impl EvidenceKeyFilter for EvidenceKeyFilterShareUsage {
    fn include(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        let (prefix, name) = match key.split_once(EVIDENCE_SEPARATOR) {
            Some(parts) => parts,
            None => return false,
        };
        match prefix {
            EVIDENCE_HTTPHEADER_PREFIX => !self.blocked_headers.contains(name),
            EVIDENCE_COOKIE_PREFIX => name.starts_with(FIFTYONE_COOKIE_PREFIX),
            EVIDENCE_QUERY_PREFIX => {
                self.include_all_query_params || self.included_query_params.contains(name)
            }
            EVIDENCE_SERVER_PREFIX => true,
            _ => false,
        }
    }

    fn order(&self, key: &str) -> Option<i32> {
        self.include(key).then_some(0)
    }
}
