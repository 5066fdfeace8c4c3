//! Embeddable in-memory execution engine.
//!
//! A reference [`ExecutionEngine`] for embedding and tests: per-index
//! document store, query-tree evaluation, sorting, and terms aggregations,
//! all honoring field bindings — a bound field's clauses, sort keys, and
//! bucket labels are evaluated over the masked representation, so masked
//! values never leave the engine in derived output. Not a storage product:
//! nothing here persists.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::engine::ExecutionEngine;
use crate::error::{Result, ShroudError};
use crate::mask::{canonical_text, ResolvedMask};
use crate::types::query::{QueryNode, RewrittenQuery, SortClause, SortOrder};
use crate::types::response::{AggregationBucket, AggregationResult, SearchHit, SearchResults};

#[derive(Debug, Clone)]
struct StoredDocument {
    id: String,
    source: Value,
}

#[derive(Debug, Clone, Default)]
struct MemoryIndex {
    fields: Vec<String>,
    docs: Vec<StoredDocument>,
}

/// In-memory multi-index engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    indexes: BTreeMap<String, MemoryIndex>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index with its leaf field schema.
    pub fn create_index(&mut self, name: &str, fields: impl IntoIterator<Item = impl Into<String>>) {
        self.indexes.insert(
            name.to_string(),
            MemoryIndex {
                fields: fields.into_iter().map(Into::into).collect(),
                docs: Vec::new(),
            },
        );
    }

    /// Store a document body under an id.
    pub fn index_document(&mut self, index: &str, id: &str, source: Value) -> Result<()> {
        let idx = self
            .indexes
            .get_mut(index)
            .ok_or_else(|| ShroudError::UnknownIndex {
                index: index.to_string(),
            })?;
        idx.docs.push(StoredDocument {
            id: id.to_string(),
            source,
        });
        Ok(())
    }

    fn index(&self, name: &str) -> Result<&MemoryIndex> {
        self.indexes
            .get(name)
            .ok_or_else(|| ShroudError::UnknownIndex {
                index: name.to_string(),
            })
    }
}

impl ExecutionEngine for MemoryEngine {
    fn schema(&self, index: &str) -> Result<Vec<String>> {
        Ok(self.index(index)?.fields.clone())
    }

    fn execute(&self, query: &RewrittenQuery) -> Result<SearchResults> {
        let index = self.index(&query.index)?;
        let matching: Vec<&StoredDocument> = index
            .docs
            .iter()
            .filter(|doc| eval(&query.query, &doc.source, &query.bindings))
            .collect();

        // Aggregations run over the full matching set, independent of the
        // hit page.
        let aggregations = query
            .aggregations
            .iter()
            .map(|agg| {
                let binding = query.bindings.get(&agg.field);
                let mut counts: BTreeMap<String, usize> = BTreeMap::new();
                for doc in &matching {
                    let mut keys = BTreeSet::new();
                    for value in values_at(&doc.source, &agg.field) {
                        if value.is_null() {
                            continue;
                        }
                        keys.insert(key_text(value, binding));
                    }
                    for key in keys {
                        *counts.entry(key).or_default() += 1;
                    }
                }
                let mut buckets: Vec<AggregationBucket> = counts
                    .into_iter()
                    .map(|(key, doc_count)| AggregationBucket { key, doc_count })
                    .collect();
                buckets.sort_by(|a, b| {
                    b.doc_count
                        .cmp(&a.doc_count)
                        .then_with(|| a.key.cmp(&b.key))
                });
                buckets.truncate(agg.size);
                AggregationResult {
                    name: agg.name.clone(),
                    buckets,
                }
            })
            .collect();

        let total = matching.len();
        let mut ordered = matching;
        if !query.sort.is_empty() {
            let clauses = &query.sort;
            let bindings = &query.bindings;
            ordered.sort_by(|a, b| compare_docs(&a.source, &b.source, clauses, bindings));
        }

        let hits = ordered
            .into_iter()
            .take(query.size)
            .map(|doc| SearchHit {
                id: doc.id.clone(),
                score: None,
                // Response copy; the stored document is never mutated.
                source: doc.source.clone(),
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            index = %query.index,
            total,
            hits = hits.len(),
            "executed query"
        );

        Ok(SearchResults {
            total,
            hits,
            aggregations,
            security_applied: false,
        })
    }
}

/// Collect every value reachable at a dotted path, descending through
/// arrays (field paths ignore array position).
fn values_at<'a>(source: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![source];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(v) = map.get(segment) {
                        next.push(v);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        if let Value::Object(map) = item {
                            if let Some(v) = map.get(segment) {
                                next.push(v);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }
    // A terminal array yields its elements.
    let mut flattened = Vec::with_capacity(current.len());
    for value in current {
        match value {
            Value::Array(items) => flattened.extend(items.iter()),
            other => flattened.push(other),
        }
    }
    flattened
}

fn key_text(value: &Value, binding: Option<&ResolvedMask>) -> String {
    match binding {
        Some(mask) => mask.apply_text(&canonical_text(value)),
        None => canonical_text(value),
    }
}

fn eval(node: &QueryNode, source: &Value, bindings: &BTreeMap<String, ResolvedMask>) -> bool {
    match node {
        QueryNode::MatchAll => true,
        QueryNode::Term { field, value } => {
            let stored = values_at(source, field);
            match bindings.get(field) {
                // Bound fields compare in masked space: the caller matches
                // by supplying the surrogate, never the raw value.
                Some(mask) => {
                    let wanted = canonical_text(value);
                    stored
                        .into_iter()
                        .any(|v| mask.apply_text(&canonical_text(v)) == wanted)
                }
                None => stored.into_iter().any(|v| v == value),
            }
        }
        QueryNode::Range { field, gte, lte } => {
            let binding = bindings.get(field);
            values_at(source, field).into_iter().any(|v| {
                let lower = gte
                    .as_ref()
                    .is_none_or(|b| bound_cmp(v, b, binding) != Ordering::Less);
                let upper = lte
                    .as_ref()
                    .is_none_or(|b| bound_cmp(v, b, binding) != Ordering::Greater);
                lower && upper
            })
        }
        QueryNode::Exists { field } => values_at(source, field).iter().any(|v| !v.is_null()),
        QueryNode::Bool {
            must,
            should,
            must_not,
        } => {
            must.iter().all(|n| eval(n, source, bindings))
                && (should.is_empty() || should.iter().any(|n| eval(n, source, bindings)))
                && !must_not.iter().any(|n| eval(n, source, bindings))
        }
    }
}

/// Compare a stored value against a query bound. Numbers compare
/// numerically; everything else compares as canonical text. Bound fields
/// compare in masked space, which keeps range behavior deterministic even
/// though the ordering is opaque.
fn bound_cmp(stored: &Value, bound: &Value, binding: Option<&ResolvedMask>) -> Ordering {
    if let Some(mask) = binding {
        return mask
            .apply_text(&canonical_text(stored))
            .cmp(&canonical_text(bound));
    }
    match (stored.as_f64(), bound.as_f64()) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        _ => canonical_text(stored).cmp(&canonical_text(bound)),
    }
}

fn compare_docs(
    a: &Value,
    b: &Value,
    clauses: &[SortClause],
    bindings: &BTreeMap<String, ResolvedMask>,
) -> Ordering {
    for clause in clauses {
        let binding = bindings.get(&clause.field);
        let va = values_at(a, &clause.field).into_iter().next();
        let vb = values_at(b, &clause.field).into_iter().next();
        let ord = match (va, vb) {
            (None, None) => Ordering::Equal,
            // Missing values sort last regardless of direction.
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(x), Some(y)) => sort_key_cmp(x, y, binding),
        };
        let ord = match clause.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn sort_key_cmp(a: &Value, b: &Value, binding: Option<&ResolvedMask>) -> Ordering {
    if let Some(mask) = binding {
        return mask
            .apply_text(&canonical_text(a))
            .cmp(&mask.apply_text(&canonical_text(b)));
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => canonical_text(a).cmp(&canonical_text(b)),
    }
}
