//! Role resolution: turning a requester's role ids into the grants that
//! apply to one target index.
//!
//! The role store is an external collaborator passed in by the embedder —
//! there is no process-wide singleton. Unknown role ids degrade to warnings
//! (an unresolvable role contributes no visibility); store failures
//! propagate.

use std::collections::BTreeMap;

use smallvec::SmallVec;

use crate::error::Result;
use crate::types::policy::AccessWarning;
use crate::types::query::QueryNode;
use crate::types::role::{FlsSpec, Role};
use crate::types::Identity;

/// External role store contract. Implementations may be backed by anything
/// that can look up an immutable role definition by id; lookups happen per
/// request, so implementations own any caching they want.
pub trait RoleStore: Send + Sync {
    /// `Ok(None)` for an unknown id; `Err` only for store-level failures
    /// (which abort the request as upstream errors).
    fn load(&self, role_id: &str) -> Result<Option<Role>>;
}

/// Map-backed role store for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticRoleStore {
    roles: BTreeMap<String, Role>,
}

impl StaticRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.roles.insert(role.name.clone(), role);
        self
    }
}

impl RoleStore for StaticRoleStore {
    fn load(&self, role_id: &str) -> Result<Option<Role>> {
        Ok(self.roles.get(role_id).cloned())
    }
}

/// One applicable (role, index rule) pair, flattened: a role with several
/// rules matching the index contributes one grant per rule, each an
/// independent visibility grant.
#[derive(Debug, Clone)]
pub(crate) struct RoleGrant {
    pub role: String,
    pub dls: Option<QueryNode>,
    pub fls: Option<FlsSpec>,
}

/// Grants are per-request and usually few; keep them off the heap.
pub(crate) type GrantSet = SmallVec<[RoleGrant; 4]>;

/// Resolve the requester's role ids against the store and collect every
/// grant applicable to `index`, in role-id order.
pub(crate) fn resolve_grants(
    store: &dyn RoleStore,
    identity: &Identity,
    index: &str,
) -> Result<(GrantSet, Vec<AccessWarning>)> {
    let mut grants = GrantSet::new();
    let mut warnings = Vec::new();

    for role_id in &identity.roles {
        let Some(role) = store.load(role_id)? else {
            tracing::warn!(role = %role_id, "role not found in role store");
            warnings.push(AccessWarning::UnresolvedRole {
                role: role_id.clone(),
            });
            continue;
        };
        for rule in role.matching_rules(index) {
            grants.push(RoleGrant {
                role: role.name.clone(),
                dls: rule.dls.clone(),
                fls: rule.fls.clone(),
            });
        }
    }

    tracing::debug!(
        index = %index,
        grants = grants.len(),
        unresolved = warnings.len(),
        "resolved role grants"
    );
    Ok((grants, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShroudError;
    use crate::types::role::IndexRule;

    struct FailingStore;

    impl RoleStore for FailingStore {
        fn load(&self, _role_id: &str) -> Result<Option<Role>> {
            Err(ShroudError::RoleStore {
                reason: "connection refused".to_string(),
            })
        }
    }

    fn store() -> StaticRoleStore {
        StaticRoleStore::new()
            .with_role(Role::new("logs_reader").with_rule(IndexRule::new("logs")))
            .with_role(Role::new("wildcard_reader").with_rule(IndexRule::new("logs-*")))
    }

    #[test]
    fn collects_all_matching_roles() {
        let identity = Identity::new("u", ["logs_reader", "wildcard_reader"]);
        let (grants, warnings) = resolve_grants(&store(), &identity, "logs").unwrap();
        assert_eq!(grants.len(), 1);
        assert!(warnings.is_empty());

        let (grants, _) = resolve_grants(&store(), &identity, "logs-2024").unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].role, "wildcard_reader");
    }

    #[test]
    fn unknown_role_degrades_to_warning() {
        let identity = Identity::new("u", ["logs_reader", "ghost"]);
        let (grants, warnings) = resolve_grants(&store(), &identity, "logs").unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(
            warnings,
            vec![AccessWarning::UnresolvedRole {
                role: "ghost".to_string()
            }]
        );
    }

    #[test]
    fn store_failure_propagates() {
        let identity = Identity::new("u", ["any"]);
        let err = resolve_grants(&FailingStore, &identity, "logs").unwrap_err();
        assert!(matches!(err, ShroudError::RoleStore { .. }));
    }

    #[test]
    fn role_with_multiple_matching_rules_grants_each() {
        let store = StaticRoleStore::new().with_role(
            Role::new("broad")
                .with_rule(IndexRule::new("logs"))
                .with_rule(IndexRule::new("logs*")),
        );
        let identity = Identity::new("u", ["broad"]);
        let (grants, _) = resolve_grants(&store, &identity, "logs").unwrap();
        assert_eq!(grants.len(), 2);
    }
}
