//! The security filtering engine: per-request context construction, query
//! rewriting, and response filtering, orchestrated over two external
//! collaborators (role store, execution engine).
//!
//! Everything derived from an identity lives in a request-scoped
//! [`EffectiveAccessContext`]; nothing identity-dependent is cached across
//! requests, so concurrent callers against the same index can never observe
//! each other's view. Role definitions and salts are shared immutable state.

mod dls;
mod fls;
mod response;
mod rewrite;
mod roles;

use std::sync::Arc;

pub use response::FilterStats;
pub use roles::{RoleStore, StaticRoleStore};

use crate::error::{Result, ShroudError};
use crate::mask::SaltRegistry;
use crate::types::policy::{AccessWarning, EffectiveAccessContext, FieldPolicy};
use crate::types::query::{RewrittenQuery, SearchRequest};
use crate::types::response::SearchResults;
use crate::types::Identity;

/// External query execution contract. The engine is a black box that runs a
/// rewritten query and returns hits plus aggregation buckets; it must honor
/// the query's field bindings so bucket labels and sort keys for bound
/// fields leave the engine already masked.
pub trait ExecutionEngine: Send + Sync {
    /// Leaf field paths of an index's schema.
    fn schema(&self, index: &str) -> Result<Vec<String>>;

    /// Execute a security-rewritten query.
    fn execute(&self, query: &RewrittenQuery) -> Result<SearchResults>;
}

/// Outcome of `apply_security`: a query ready for execution plus the context
/// the response must later be filtered with.
#[derive(Debug, Clone)]
pub struct SecurityDecision {
    pub query: RewrittenQuery,
    pub context: EffectiveAccessContext,
}

/// A fully secured response: filtered results, role-resolution warnings, and
/// filtering counters.
#[derive(Debug, Clone)]
pub struct SecuredResponse {
    pub results: SearchResults,
    pub warnings: Vec<AccessWarning>,
    pub stats: FilterStats,
}

/// The engine facade. Holds only shared immutable state; everything
/// per-request is derived inside the call and dropped with it.
pub struct SecurityEngine {
    roles: Arc<dyn RoleStore>,
    salts: SaltRegistry,
}

impl SecurityEngine {
    pub fn new(roles: Arc<dyn RoleStore>, salts: SaltRegistry) -> Self {
        Self { roles, salts }
    }

    /// Build the request-scoped access context for an identity and index.
    ///
    /// Fails with `AccessDenied` when no resolved role grants anything on
    /// the index at all — index existence stays as opaque as field
    /// existence.
    pub fn resolve_context(
        &self,
        identity: &Identity,
        index: &str,
        schema_fields: &[String],
    ) -> Result<EffectiveAccessContext> {
        let (grants, warnings) = roles::resolve_grants(self.roles.as_ref(), identity, index)?;
        if grants.is_empty() {
            tracing::warn!(user = %identity.username, index = %index, "no role grants access to index");
            return Err(ShroudError::AccessDenied);
        }
        let dls = dls::build_dls_filter(&grants, identity);
        let fields = fls::build_field_policy(&grants, schema_fields, &self.salts)?;
        Ok(EffectiveAccessContext {
            dls,
            fields,
            warnings,
        })
    }

    /// Validate and rewrite a request under the caller's entitlements.
    ///
    /// Structural validation runs first: a malformed query reports
    /// `InvalidQuery` regardless of what the caller may or may not see.
    pub fn apply_security(
        &self,
        request: &SearchRequest,
        identity: &Identity,
        schema_fields: &[String],
    ) -> Result<SecurityDecision> {
        request.validate()?;
        let context = self.resolve_context(identity, &request.index, schema_fields)?;
        let query = rewrite::rewrite_request(request, &context)?;
        Ok(SecurityDecision { query, context })
    }

    /// Filter an engine response in place under a field policy. Idempotent;
    /// returns counters for the pass.
    pub fn filter_response(
        &self,
        results: &mut SearchResults,
        policy: &FieldPolicy,
    ) -> FilterStats {
        response::filter_results(results, policy)
    }

    /// The end-to-end pipeline: resolve → rewrite → execute → filter.
    /// Filtering completes before the response is returned; no caller can
    /// observe an unfiltered byte.
    pub fn search(
        &self,
        engine: &dyn ExecutionEngine,
        request: &SearchRequest,
        identity: &Identity,
    ) -> Result<SecuredResponse> {
        let schema_fields = engine.schema(&request.index)?;
        let decision = self.apply_security(request, identity, &schema_fields)?;
        let mut results = engine.execute(&decision.query)?;
        let stats = self.filter_response(&mut results, &decision.context.fields);
        Ok(SecuredResponse {
            results,
            warnings: decision.context.warnings,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::query::QueryNode;
    use crate::types::role::{IndexRule, Role};

    fn engine_with(roles: StaticRoleStore) -> SecurityEngine {
        SecurityEngine::new(Arc::new(roles), SaltRegistry::new("test-salt"))
    }

    #[test]
    fn no_matching_role_is_denied() {
        let engine = engine_with(
            StaticRoleStore::new()
                .with_role(Role::new("other_index").with_rule(IndexRule::new("metrics"))),
        );
        let identity = Identity::new("u", ["other_index"]);
        let err = engine
            .resolve_context(&identity, "logs", &[])
            .unwrap_err();
        assert!(matches!(err, ShroudError::AccessDenied));
    }

    #[test]
    fn malformed_query_reported_before_policy() {
        // Even an identity with no roles at all gets the structural error.
        let engine = engine_with(StaticRoleStore::new());
        let identity = Identity::new("u", Vec::<String>::new());
        let request = SearchRequest::new(
            "logs",
            QueryNode::Range {
                field: "bytes".to_string(),
                gte: None,
                lte: None,
            },
        );
        let err = engine.apply_security(&request, &identity, &[]).unwrap_err();
        assert!(matches!(err, ShroudError::InvalidQuery { .. }));
    }

    #[test]
    fn unresolved_roles_surface_as_warnings() {
        let engine = engine_with(
            StaticRoleStore::new().with_role(Role::new("reader").with_rule(IndexRule::new("logs"))),
        );
        let identity = Identity::new("u", ["reader", "ghost"]);
        let context = engine.resolve_context(&identity, "logs", &[]).unwrap();
        assert_eq!(context.warnings.len(), 1);
        assert!(context.dls.is_none());
    }
}
