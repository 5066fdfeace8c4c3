//! Search response types returned by execution engines and post-processed by
//! the response filter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Response copy of the document body; the response filter mutates this,
    /// never the stored document.
    pub source: Value,
}

/// One terms-aggregation bucket. The key is textual: raw canonical value for
/// unbound fields, masked surrogate for bound ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationBucket {
    pub key: String,
    pub doc_count: usize,
}

/// Buckets of one named terms aggregation, ordered by doc count descending
/// then key ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub name: String,
    pub buckets: Vec<AggregationBucket>,
}

/// Engine results before (and after) response filtering.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResults {
    /// Total matching documents, independent of the hit page size.
    pub total: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hits: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<AggregationResult>,
    /// Set once the response filter has run, making a second pass a no-op.
    /// In-process only; not part of the wire shape.
    #[serde(skip)]
    pub(crate) security_applied: bool,
}

impl SearchResults {
    /// Whether the response filter has already processed this response.
    pub fn security_applied(&self) -> bool {
        self.security_applied
    }

    /// Buckets of a named aggregation, if present.
    pub fn aggregation(&self, name: &str) -> Option<&AggregationResult> {
        self.aggregations.iter().find(|agg| agg.name == name)
    }
}
