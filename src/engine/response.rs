//! Response filtering: the last stage before results leave the engine
//! boundary.
//!
//! Strips excluded field paths from hit bodies (pruning objects the
//! stripping emptied), masks masked leaves, and leaves aggregation labels
//! alone — those were already masked at the engine through field bindings.
//! Operates on the response copy only and records its application on the
//! response, so running it twice is a no-op.

use serde_json::{Map, Value};

use crate::types::policy::{FieldAccess, FieldPolicy};
use crate::types::response::SearchResults;

/// Counters for one filtering pass, in the spirit of retrieval-side audit
/// stats: how much was withheld, and from how many hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub hits_processed: usize,
    pub fields_excluded: usize,
    pub values_masked: usize,
}

/// Apply the field policy to a response in place.
pub(crate) fn filter_results(results: &mut SearchResults, policy: &FieldPolicy) -> FilterStats {
    let mut stats = FilterStats::default();
    if results.security_applied {
        return stats;
    }
    results.security_applied = true;
    stats.hits_processed = results.hits.len();
    if policy.is_unrestricted() {
        return stats;
    }

    for hit in &mut results.hits {
        if let Value::Object(map) = &mut hit.source {
            filter_object(map, "", policy, &mut stats);
        }
    }

    tracing::debug!(
        hits = stats.hits_processed,
        excluded = stats.fields_excluded,
        masked = stats.values_masked,
        "filtered response"
    );
    stats
}

fn filter_object(map: &mut Map<String, Value>, prefix: &str, policy: &FieldPolicy, stats: &mut FilterStats) {
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match policy.access(&path) {
            FieldAccess::Excluded => {
                map.remove(&key);
                stats.fields_excluded += 1;
            }
            FieldAccess::Masked(mask) => {
                if let Some(value) = map.get_mut(&key) {
                    *value = mask.apply(value);
                    stats.values_masked += 1;
                }
            }
            FieldAccess::Visible => {
                // Deeper paths may still be restricted.
                let emptied = map
                    .get_mut(&key)
                    .is_some_and(|value| filter_nested(value, &path, policy, stats));
                if emptied {
                    map.remove(&key);
                }
            }
        }
    }
}

/// Recurse into containers; returns true when exclusions emptied the value
/// and it should be pruned from its parent.
fn filter_nested(
    value: &mut Value,
    path: &str,
    policy: &FieldPolicy,
    stats: &mut FilterStats,
) -> bool {
    match value {
        Value::Object(map) => {
            if map.is_empty() {
                return false;
            }
            filter_object(map, path, policy, stats);
            map.is_empty()
        }
        Value::Array(items) => {
            if items.is_empty() {
                return false;
            }
            // Field paths ignore array position: each element is filtered
            // under the same path, emptied elements drop out.
            let mut kept = Vec::with_capacity(items.len());
            for mut item in items.drain(..) {
                if !filter_nested(&mut item, path, policy, stats) {
                    kept.push(item);
                }
            }
            *items = kept;
            items.is_empty()
        }
        _ => false,
    }
}
