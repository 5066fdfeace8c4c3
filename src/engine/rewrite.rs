//! Query rewriting: injecting the DLS predicate and binding masked fields
//! before the execution engine ever sees the request.
//!
//! Field screening happens here, not in the response filter, so a caller can
//! never probe the existence or distribution of a field they cannot see —
//! not even through an aggregation that would only surface counts.

use std::collections::BTreeMap;

use crate::error::{Result, ShroudError};
use crate::types::policy::{EffectiveAccessContext, FieldAccess};
use crate::types::query::{RewrittenQuery, SearchRequest};

/// Rewrite a validated request under the given access context.
///
/// Every field the caller's own clauses reference (query tree, sort keys,
/// aggregation group-bys) is screened: EXCLUDED fields reject the request
/// outright; MASKED fields get a self-contained binding so the engine
/// evaluates them over the masked representation. The DLS predicate is then
/// AND-combined with the caller's query — never OR — so the caller's own
/// query cannot widen visibility.
pub(crate) fn rewrite_request(
    request: &SearchRequest,
    context: &EffectiveAccessContext,
) -> Result<RewrittenQuery> {
    let mut bindings = BTreeMap::new();
    for field in request.referenced_fields() {
        match context.fields.access(&field) {
            FieldAccess::Visible => {}
            FieldAccess::Excluded => {
                // The offending field goes to the log, never to the caller.
                tracing::warn!(
                    index = %request.index,
                    field = %field,
                    "query references an excluded field; rejecting"
                );
                return Err(ShroudError::AccessDenied);
            }
            FieldAccess::Masked(mask) => {
                bindings.insert(field, mask.clone());
            }
        }
    }

    let query = match &context.dls {
        Some(dls) => request.query.clone().and(dls.clone()),
        None => request.query.clone(),
    };

    Ok(RewrittenQuery {
        index: request.index.clone(),
        query,
        sort: request.sort.clone(),
        aggregations: request.aggregations.clone(),
        size: request.size,
        bindings,
    })
}
