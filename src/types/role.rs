//! Security role definitions.
//!
//! Roles are owned by the external role store and immutable once loaded; the
//! engine only reads them. A role maps index patterns to an optional DLS
//! filter and an optional FLS spec.

use serde::{Deserialize, Serialize};

use crate::mask::MaskSpec;
use crate::pattern::WildcardPattern;
use crate::types::query::QueryNode;

/// A named bundle of DLS/FLS rules scoped to index patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    /// Ordered; every rule whose pattern matches the target index applies
    /// (all matches are collected, not first-match-wins).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<IndexRule>,
}

impl Role {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: IndexRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Rules applicable to `index`.
    pub fn matching_rules<'a>(&'a self, index: &'a str) -> impl Iterator<Item = &'a IndexRule> {
        self.rules
            .iter()
            .filter(move |rule| WildcardPattern::new(&rule.index_pattern).matches(index))
    }
}

/// One index-pattern entry of a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRule {
    /// Exact index name or wildcard pattern (`logs-*`).
    pub index_pattern: String,
    /// Document-level filter in the engine's native query form. `None` means
    /// this rule grants unconditional document visibility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dls: Option<QueryNode>,
    /// Field-level rules. `None` means every field is visible under this
    /// rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fls: Option<FlsSpec>,
}

impl IndexRule {
    pub fn new(index_pattern: &str) -> Self {
        Self {
            index_pattern: index_pattern.to_string(),
            dls: None,
            fls: None,
        }
    }

    pub fn with_dls(mut self, filter: QueryNode) -> Self {
        self.dls = Some(filter);
        self
    }

    pub fn with_fls(mut self, fls: FlsSpec) -> Self {
        self.fls = Some(fls);
        self
    }
}

/// Field selection: either named exclusions or an include list that
/// implicitly excludes everything else. Wildcards allowed in both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSelection {
    Exclude(Vec<String>),
    Include(Vec<String>),
}

/// Field-level spec of one index rule: an optional selection plus masked
/// fields with per-field mask parameters. A field matched by both an exclude
/// rule and a mask rule of the same specificity is excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlsSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<FieldSelection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub masked: Vec<MaskedField>,
}

impl FlsSpec {
    pub fn exclude(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            selection: Some(FieldSelection::Exclude(
                patterns.into_iter().map(Into::into).collect(),
            )),
            masked: Vec::new(),
        }
    }

    pub fn include(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            selection: Some(FieldSelection::Include(
                patterns.into_iter().map(Into::into).collect(),
            )),
            masked: Vec::new(),
        }
    }

    pub fn with_mask(mut self, pattern: &str, spec: MaskSpec) -> Self {
        self.masked.push(MaskedField {
            pattern: pattern.to_string(),
            spec,
        });
        self
    }
}

/// A masked-field entry: field pattern plus mask parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskedField {
    pub pattern: String,
    #[serde(flatten)]
    pub spec: MaskSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_rules_collects_all_matches() {
        let role = Role::new("reader")
            .with_rule(IndexRule::new("logs"))
            .with_rule(IndexRule::new("logs-*"))
            .with_rule(IndexRule::new("audit"));
        assert_eq!(role.matching_rules("logs").count(), 1);
        assert_eq!(role.matching_rules("logs-2024").count(), 1);
        assert_eq!(role.matching_rules("metrics").count(), 0);
    }

    #[test]
    fn role_roundtrips_through_serde() {
        let role = Role::new("masked_nowc").with_rule(
            IndexRule::new("logs")
                .with_fls(FlsSpec::default().with_mask("ip", MaskSpec::default())),
        );
        let json = serde_json::to_string(&role).unwrap();
        let back: Role = serde_json::from_str(&json).unwrap();
        assert_eq!(back, role);
    }
}
