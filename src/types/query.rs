//! Engine-native query form and the request/rewritten-request types.
//!
//! `QueryNode` is the filter fragment role definitions and callers share; it
//! is deliberately small — this crate does not define a query language, it
//! rewrites one the execution engine already understands.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ShroudError};
use crate::mask::ResolvedMask;

/// Placeholder in role-defined DLS filters, replaced per request with the
/// requester's login name (self-service row filtering).
pub const USER_NAME_PLACEHOLDER: &str = "${user.name}";

static FIELD_NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[\w.\-@]+$").ok());

fn valid_field_name(name: &str) -> bool {
    match FIELD_NAME.as_ref() {
        Some(re) => re.is_match(name),
        None => !name.is_empty(),
    }
}

/// A node of the engine-native query tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueryNode {
    MatchAll,
    /// Exact value match. Arrays in the stored document match if any element
    /// equals the value.
    Term { field: String, value: Value },
    /// Inclusive range over numbers or strings.
    Range {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gte: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lte: Option<Value>,
    },
    /// Field is present and non-null.
    Exists { field: String },
    Bool {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        must: Vec<QueryNode>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        should: Vec<QueryNode>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        must_not: Vec<QueryNode>,
    },
}

impl QueryNode {
    /// Shorthand for a term filter.
    pub fn term(field: &str, value: impl Into<Value>) -> Self {
        Self::Term {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn exists(field: &str) -> Self {
        Self::Exists {
            field: field.to_string(),
        }
    }

    /// `AND` of two trees.
    pub fn and(self, other: QueryNode) -> Self {
        Self::Bool {
            must: vec![self, other],
            should: Vec::new(),
            must_not: Vec::new(),
        }
    }

    /// `OR` of several trees (at least one must match).
    pub fn any_of(clauses: Vec<QueryNode>) -> Self {
        Self::Bool {
            must: Vec::new(),
            should: clauses,
            must_not: Vec::new(),
        }
    }

    /// Collect every field referenced by this tree.
    pub fn collect_fields(&self, out: &mut BTreeSet<String>) {
        match self {
            QueryNode::MatchAll => {}
            QueryNode::Term { field, .. }
            | QueryNode::Range { field, .. }
            | QueryNode::Exists { field } => {
                out.insert(field.clone());
            }
            QueryNode::Bool {
                must,
                should,
                must_not,
            } => {
                for node in must.iter().chain(should).chain(must_not) {
                    node.collect_fields(out);
                }
            }
        }
    }

    /// Structural validation, independent of any security policy.
    pub fn validate(&self) -> Result<()> {
        match self {
            QueryNode::MatchAll => Ok(()),
            QueryNode::Term { field, .. } | QueryNode::Exists { field } => {
                if valid_field_name(field) {
                    Ok(())
                } else {
                    Err(ShroudError::InvalidQuery {
                        reason: format!("invalid field name {field:?}"),
                    })
                }
            }
            QueryNode::Range { field, gte, lte } => {
                if !valid_field_name(field) {
                    return Err(ShroudError::InvalidQuery {
                        reason: format!("invalid field name {field:?}"),
                    });
                }
                if gte.is_none() && lte.is_none() {
                    return Err(ShroudError::InvalidQuery {
                        reason: format!("range on {field:?} has no bounds"),
                    });
                }
                Ok(())
            }
            QueryNode::Bool {
                must,
                should,
                must_not,
            } => {
                if must.is_empty() && should.is_empty() && must_not.is_empty() {
                    return Err(ShroudError::InvalidQuery {
                        reason: "bool query has no clauses".to_string(),
                    });
                }
                for node in must.iter().chain(should).chain(must_not) {
                    node.validate()?;
                }
                Ok(())
            }
        }
    }

    /// Replace `${user.name}` in string values with the requester's login
    /// name. Role-defined DLS filters use this for per-user row filtering.
    pub fn resolve_user_placeholders(&self, username: &str) -> QueryNode {
        let subst = |v: &Value| -> Value {
            match v {
                Value::String(s) if s.contains(USER_NAME_PLACEHOLDER) => {
                    Value::String(s.replace(USER_NAME_PLACEHOLDER, username))
                }
                other => other.clone(),
            }
        };
        match self {
            QueryNode::Term { field, value } => QueryNode::Term {
                field: field.clone(),
                value: subst(value),
            },
            QueryNode::Range { field, gte, lte } => QueryNode::Range {
                field: field.clone(),
                gte: gte.as_ref().map(&subst),
                lte: lte.as_ref().map(&subst),
            },
            QueryNode::Bool {
                must,
                should,
                must_not,
            } => QueryNode::Bool {
                must: must
                    .iter()
                    .map(|n| n.resolve_user_placeholders(username))
                    .collect(),
                should: should
                    .iter()
                    .map(|n| n.resolve_user_placeholders(username))
                    .collect(),
                must_not: must_not
                    .iter()
                    .map(|n| n.resolve_user_placeholders(username))
                    .collect(),
            },
            other => other.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// A sort key. Sorting on a masked field orders by the masked surrogate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortClause {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortClause {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: SortOrder::Desc,
        }
    }
}

/// A terms (bucket) aggregation: per-distinct-value document counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermsAggregation {
    pub name: String,
    pub field: String,
    /// Maximum buckets returned.
    pub size: usize,
}

impl TermsAggregation {
    pub fn new(name: &str, field: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            field: field.to_string(),
            size,
        }
    }
}

fn default_size() -> usize {
    10
}

/// A caller's search request before security is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub index: String,
    pub query: QueryNode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<TermsAggregation>,
    /// Maximum hits returned; aggregations always run over the full matching
    /// set.
    #[serde(default = "default_size")]
    pub size: usize,
}

impl SearchRequest {
    pub fn new(index: &str, query: QueryNode) -> Self {
        Self {
            index: index.to_string(),
            query,
            sort: Vec::new(),
            aggregations: Vec::new(),
            size: default_size(),
        }
    }

    pub fn with_sort(mut self, sort: SortClause) -> Self {
        self.sort.push(sort);
        self
    }

    pub fn with_aggregation(mut self, agg: TermsAggregation) -> Self {
        self.aggregations.push(agg);
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Every field the caller's own clauses touch: query tree, sort keys,
    /// aggregation group-bys. This is the set the rewriter screens against
    /// the field policy — the injected DLS predicate is exempt.
    pub fn referenced_fields(&self) -> BTreeSet<String> {
        let mut fields = BTreeSet::new();
        self.query.collect_fields(&mut fields);
        for clause in &self.sort {
            fields.insert(clause.field.clone());
        }
        for agg in &self.aggregations {
            fields.insert(agg.field.clone());
        }
        fields
    }

    pub fn validate(&self) -> Result<()> {
        if self.index.trim().is_empty() {
            return Err(ShroudError::InvalidQuery {
                reason: "empty index name".to_string(),
            });
        }
        self.query.validate()?;
        for clause in &self.sort {
            if !valid_field_name(&clause.field) {
                return Err(ShroudError::InvalidQuery {
                    reason: format!("invalid sort field {:?}", clause.field),
                });
            }
        }
        for agg in &self.aggregations {
            if agg.name.trim().is_empty() {
                return Err(ShroudError::InvalidQuery {
                    reason: "aggregation with empty name".to_string(),
                });
            }
            if !valid_field_name(&agg.field) {
                return Err(ShroudError::InvalidQuery {
                    reason: format!("invalid aggregation field {:?}", agg.field),
                });
            }
            if agg.size == 0 {
                return Err(ShroudError::InvalidQuery {
                    reason: format!("aggregation {:?} has size 0", agg.name),
                });
            }
        }
        Ok(())
    }
}

/// The security-rewritten request handed to the execution engine.
///
/// `query` is the caller's tree AND-combined with the DLS predicate (the
/// caller can never OR their way out of it). `bindings` carry self-contained
/// masks: any clause, sort key, or aggregation on a bound field must be
/// evaluated over the masked representation, so bucket labels and sort keys
/// leave the engine already masked while doc counts reflect the true
/// population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewrittenQuery {
    pub index: String,
    pub query: QueryNode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortClause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<TermsAggregation>,
    pub size: usize,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, ResolvedMask>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collects_fields_from_nested_bools() {
        let query = QueryNode::term("os", "linux")
            .and(QueryNode::any_of(vec![
                QueryNode::exists("ip"),
                QueryNode::Range {
                    field: "bytes".to_string(),
                    gte: Some(json!(100)),
                    lte: None,
                },
            ]));
        let mut fields = BTreeSet::new();
        query.collect_fields(&mut fields);
        assert_eq!(
            fields.into_iter().collect::<Vec<_>>(),
            vec!["bytes", "ip", "os"]
        );
    }

    #[test]
    fn referenced_fields_include_sort_and_aggs() {
        let request = SearchRequest::new("logs", QueryNode::MatchAll)
            .with_sort(SortClause::desc("timestamp"))
            .with_aggregation(TermsAggregation::new("by_os", "os", 10));
        let fields = request.referenced_fields();
        assert!(fields.contains("timestamp"));
        assert!(fields.contains("os"));
    }

    #[test]
    fn validate_rejects_structural_faults() {
        let empty_bool = SearchRequest::new(
            "logs",
            QueryNode::Bool {
                must: Vec::new(),
                should: Vec::new(),
                must_not: Vec::new(),
            },
        );
        assert!(matches!(
            empty_bool.validate(),
            Err(ShroudError::InvalidQuery { .. })
        ));

        let unbounded_range = SearchRequest::new(
            "logs",
            QueryNode::Range {
                field: "bytes".to_string(),
                gte: None,
                lte: None,
            },
        );
        assert!(unbounded_range.validate().is_err());

        let zero_agg = SearchRequest::new("logs", QueryNode::MatchAll)
            .with_aggregation(TermsAggregation::new("by_os", "os", 0));
        assert!(zero_agg.validate().is_err());

        let bad_field = SearchRequest::new("logs", QueryNode::term("no spaces", 1));
        assert!(bad_field.validate().is_err());
    }

    #[test]
    fn user_placeholder_substitution() {
        let filter = QueryNode::term("owner", USER_NAME_PLACEHOLDER);
        let resolved = filter.resolve_user_placeholders("kirk");
        assert_eq!(resolved, QueryNode::term("owner", "kirk"));

        // Untouched trees come back structurally identical.
        let plain = QueryNode::term("owner", "fixed");
        assert_eq!(plain.resolve_user_placeholders("kirk"), plain);
    }
}
