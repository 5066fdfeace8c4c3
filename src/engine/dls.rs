//! Document-level security: combining per-grant filters into one effective
//! visibility predicate.
//!
//! Visibility is the union of what each grant allows — holding more roles
//! never shrinks the visible set. A grant with no filter means unconditional
//! visibility and short-circuits the whole combination to unrestricted.

use crate::engine::roles::RoleGrant;
use crate::types::query::QueryNode;
use crate::types::Identity;

/// Build the effective DLS predicate for a request. `None` means
/// unrestricted. Filter expressions are evaluated per request: `${user.name}`
/// placeholders resolve against the requester, never against cached state.
pub(crate) fn build_dls_filter(grants: &[RoleGrant], identity: &Identity) -> Option<QueryNode> {
    if grants.iter().any(|grant| grant.dls.is_none()) {
        tracing::debug!(user = %identity.username, "a grant carries no DLS filter; document visibility unrestricted");
        return None;
    }

    let mut clauses: Vec<QueryNode> = grants
        .iter()
        .filter_map(|grant| grant.dls.as_ref())
        .map(|filter| filter.resolve_user_placeholders(&identity.username))
        .collect();

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(QueryNode::any_of(clauses)),
    }
}
