//! Fingerprint-keyed result cache
//!
//! Every node invocation is keyed by a fingerprint of everything that can
//! change its outputs: the node type's name and body version, the resolved
//! input values in port order, and the parameter values in declared order.
//! Identical fingerprints mean identical outputs, so a hit skips the body
//! entirely. Entries are stored per instance so structural edits can evict
//! precisely.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use log::trace;

use crate::graph::NodeId;
use crate::value::Value;

/// The fingerprint of one node invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    /// Combine everything that determines a node's outputs into one key.
    /// Value hashing is exact at the bit level: 0.1 + 0.2 and 0.3 produce
    /// different fingerprints.
    pub fn compute(
        type_name: &str,
        body_version: u64,
        inputs: &IndexMap<String, Value>,
        params: &IndexMap<String, Value>,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        type_name.hash(&mut hasher);
        body_version.hash(&mut hasher);
        inputs.len().hash(&mut hasher);
        for (port, value) in inputs {
            port.hash(&mut hasher);
            value.fingerprint(&mut hasher);
        }
        params.len().hash(&mut hasher);
        for (param, value) in params {
            param.hash(&mut hasher);
            value.fingerprint(&mut hasher);
        }
        Self(hasher.finish())
    }
}

/// Hit/miss/eviction counters, readable at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStatistics {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
}

impl CacheStatistics {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Entry {
    fingerprint: Fingerprint,
    outputs: IndexMap<String, Value>,
}

/// Per-instance cache of the last produced outputs.
///
/// One entry per instance is enough: a changed fingerprint replaces the
/// old entry, and an unchanged fingerprint is exactly the hit case.
#[derive(Default)]
pub struct ResultCache {
    entries: HashMap<NodeId, Entry>,
    stats: CacheStatistics,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the outputs for an instance at a given fingerprint.
    pub fn get(&mut self, id: &NodeId, fingerprint: Fingerprint) -> Option<IndexMap<String, Value>> {
        match self.entries.get(id) {
            Some(entry) if entry.fingerprint == fingerprint => {
                self.stats.hits += 1;
                trace!("cache hit for '{}'", id);
                Some(entry.outputs.clone())
            }
            _ => {
                self.stats.misses += 1;
                trace!("cache miss for '{}'", id);
                None
            }
        }
    }

    pub fn insert(&mut self, id: NodeId, fingerprint: Fingerprint, outputs: IndexMap<String, Value>) {
        self.entries.insert(id, Entry { fingerprint, outputs });
    }

    /// Drop the entry for one instance. Used when the instance is removed
    /// or its node type re-registered.
    pub fn invalidate(&mut self, id: &NodeId) {
        if self.entries.remove(id).is_some() {
            self.stats.invalidations += 1;
        }
    }

    pub fn clear(&mut self) {
        self.stats.invalidations += self.entries.len() as u64;
        self.entries.clear();
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_identical_state_identical_fingerprint() {
        let a = Fingerprint::compute("Math", 1, &inputs(&[("a", Value::Number(2.0))]), &inputs(&[]));
        let b = Fingerprint::compute("Math", 1, &inputs(&[("a", Value::Number(2.0))]), &inputs(&[]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_is_bit_exact() {
        let sum = inputs(&[("a", Value::Number(0.1 + 0.2))]);
        let lit = inputs(&[("a", Value::Number(0.3))]);
        let empty = inputs(&[]);
        assert_ne!(
            Fingerprint::compute("Math", 1, &sum, &empty),
            Fingerprint::compute("Math", 1, &lit, &empty)
        );
    }

    #[test]
    fn test_body_version_changes_fingerprint() {
        let empty = inputs(&[]);
        assert_ne!(
            Fingerprint::compute("Custom", 1, &empty, &empty),
            Fingerprint::compute("Custom", 2, &empty, &empty)
        );
    }

    #[test]
    fn test_hit_then_invalidate() {
        let mut cache = ResultCache::new();
        let id = NodeId::new("n1");
        let fp = Fingerprint::compute("Float", 1, &inputs(&[]), &inputs(&[("value", Value::Number(5.0))]));
        let outputs = inputs(&[("value", Value::Number(5.0))]);

        assert!(cache.get(&id, fp).is_none());
        cache.insert(id.clone(), fp, outputs.clone());
        assert_eq!(cache.get(&id, fp), Some(outputs));

        cache.invalidate(&id);
        assert!(cache.get(&id, fp).is_none());

        let stats = cache.statistics();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.invalidations, 1);
    }

    #[test]
    fn test_changed_fingerprint_replaces_entry() {
        let mut cache = ResultCache::new();
        let id = NodeId::new("n1");
        let empty = inputs(&[]);
        let fp1 = Fingerprint::compute("Float", 1, &empty, &inputs(&[("value", Value::Number(5.0))]));
        let fp2 = Fingerprint::compute("Float", 1, &empty, &inputs(&[("value", Value::Number(7.0))]));

        cache.insert(id.clone(), fp1, inputs(&[("value", Value::Number(5.0))]));
        cache.insert(id.clone(), fp2, inputs(&[("value", Value::Number(7.0))]));
        assert!(cache.get(&id, fp1).is_none());
        assert!(cache.get(&id, fp2).is_some());
        assert_eq!(cache.len(), 1);
    }
}
