//! Request-scoped access context: the effective DLS predicate and per-field
//! disclosure policy derived from every role a requester holds.
//!
//! Built fresh per request and never cached across requests — two concurrent
//! callers against the same index must never observe each other's view.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::mask::ResolvedMask;
use crate::types::query::QueryNode;

/// Disclosure outcome for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "access", rename_all = "snake_case")]
pub enum FieldAccess {
    /// Unrestricted.
    Visible,
    /// Absent from responses; querying, sorting, or aggregating on it is an
    /// authorization error.
    Excluded,
    /// Disclosed only as a deterministic masked surrogate.
    Masked(ResolvedMask),
}

const VISIBLE: FieldAccess = FieldAccess::Visible;

/// Per-field disclosure policy, fully resolved against the index schema.
/// Fields no role restricts are visible by default and not stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldPolicy {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    restricted: BTreeMap<String, FieldAccess>,
}

impl FieldPolicy {
    pub(crate) fn from_restricted(restricted: BTreeMap<String, FieldAccess>) -> Self {
        Self { restricted }
    }

    /// Disclosure outcome for a field. Unmentioned fields are visible.
    pub fn access(&self, field: &str) -> &FieldAccess {
        self.restricted.get(field).unwrap_or(&VISIBLE)
    }

    pub fn is_unrestricted(&self) -> bool {
        self.restricted.is_empty()
    }

    /// Fields with a non-visible outcome, in field order.
    pub fn restricted_fields(&self) -> impl Iterator<Item = (&str, &FieldAccess)> {
        self.restricted.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Non-fatal conditions met while building an access context, reported to
/// the caller alongside the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccessWarning {
    /// A role id the role store does not know. The role contributes no
    /// visibility; the request proceeds on the remaining roles.
    UnresolvedRole { role: String },
}

impl std::fmt::Display for AccessWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessWarning::UnresolvedRole { role } => {
                write!(f, "role {role:?} could not be resolved")
            }
        }
    }
}

/// Everything security needs to know about one request: the document
/// visibility predicate (`None` = unrestricted), the field policy, and any
/// warnings gathered during role resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveAccessContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dls: Option<QueryNode>,
    pub fields: FieldPolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AccessWarning>,
}
