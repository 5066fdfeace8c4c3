//! Field-level security: expanding per-grant field rules against the index
//! schema into one effective per-field disclosure policy.
//!
//! Within one grant the most specific matching rule wins and exclusion beats
//! masking on ties. Across grants the outcome is most-permissive: any grant
//! making a field visible makes it visible, masking beats exclusion, and
//! pattern specificity never overrides permissiveness between grants.

use std::collections::BTreeMap;

use crate::engine::roles::RoleGrant;
use crate::error::Result;
use crate::mask::{MaskSpec, SaltRegistry};
use crate::pattern::WildcardPattern;
use crate::types::policy::{FieldAccess, FieldPolicy};
use crate::types::role::FieldSelection;

enum CompiledSelection {
    Exclude(Vec<WildcardPattern>),
    Include(Vec<WildcardPattern>),
}

struct CompiledFls<'a> {
    selection: Option<CompiledSelection>,
    masked: Vec<(WildcardPattern, &'a MaskSpec)>,
}

enum GrantOutcome<'a> {
    Visible,
    Excluded,
    Masked(&'a MaskSpec),
}

fn compile_patterns(patterns: &[String]) -> Vec<WildcardPattern> {
    patterns.iter().map(|p| WildcardPattern::new(p)).collect()
}

fn compile(grant: &RoleGrant) -> Option<CompiledFls<'_>> {
    let fls = grant.fls.as_ref()?;
    let selection = fls.selection.as_ref().map(|sel| match sel {
        FieldSelection::Exclude(patterns) => CompiledSelection::Exclude(compile_patterns(patterns)),
        FieldSelection::Include(patterns) => CompiledSelection::Include(compile_patterns(patterns)),
    });
    let masked = fls
        .masked
        .iter()
        .map(|m| (WildcardPattern::new(&m.pattern), &m.spec))
        .collect();
    Some(CompiledFls { selection, masked })
}

/// Outcome of one grant for one leaf field.
fn grant_outcome<'a>(fls: &'a CompiledFls<'a>, field: &str) -> GrantOutcome<'a> {
    // Exclusion specificity. Include-mode's implicit exclude-all-else has
    // zero specificity, so an explicit mask on a non-included field wins.
    let excluded: Option<usize> = match &fls.selection {
        None => None,
        Some(CompiledSelection::Exclude(patterns)) => patterns
            .iter()
            .filter(|p| p.matches_path(field))
            .map(WildcardPattern::specificity)
            .max(),
        Some(CompiledSelection::Include(patterns)) => {
            if patterns.iter().any(|p| p.matches_path(field)) {
                None
            } else {
                Some(0)
            }
        }
    };

    // Most specific mask rule; list order breaks exact ties.
    let mut masked: Option<(usize, &MaskSpec)> = None;
    for (pattern, spec) in &fls.masked {
        if pattern.matches_path(field) {
            let specificity = pattern.specificity();
            if masked.is_none_or(|(best, _)| specificity > best) {
                masked = Some((specificity, *spec));
            }
        }
    }

    match (excluded, masked) {
        (None, None) => GrantOutcome::Visible,
        (Some(_), None) => GrantOutcome::Excluded,
        (None, Some((_, spec))) => GrantOutcome::Masked(spec),
        (Some(exc), Some((msk, spec))) => {
            if exc >= msk {
                GrantOutcome::Excluded
            } else {
                GrantOutcome::Masked(spec)
            }
        }
    }
}

/// Build the effective field policy for a request from every applicable
/// grant, resolved against the index schema's leaf fields.
pub(crate) fn build_field_policy(
    grants: &[RoleGrant],
    schema_fields: &[String],
    salts: &SaltRegistry,
) -> Result<FieldPolicy> {
    // A grant without any FLS spec makes every field visible, and visibility
    // is most-permissive across grants.
    if grants.iter().any(|grant| grant.fls.is_none()) {
        return Ok(FieldPolicy::default());
    }

    let compiled: Vec<CompiledFls<'_>> = grants.iter().filter_map(compile).collect();
    if compiled.is_empty() {
        return Ok(FieldPolicy::default());
    }

    let mut restricted = BTreeMap::new();
    for field in schema_fields {
        let mut any_visible = false;
        let mut any_excluded = false;
        let mut first_mask: Option<&MaskSpec> = None;
        for fls in &compiled {
            match grant_outcome(fls, field) {
                GrantOutcome::Visible => {
                    any_visible = true;
                    break;
                }
                GrantOutcome::Excluded => any_excluded = true,
                GrantOutcome::Masked(spec) => {
                    if first_mask.is_none() {
                        first_mask = Some(spec);
                    }
                }
            }
        }
        if any_visible {
            continue;
        }
        let access = match first_mask {
            Some(spec) => FieldAccess::Masked(salts.resolve(spec)?),
            None if any_excluded => FieldAccess::Excluded,
            None => continue,
        };
        restricted.insert(field.clone(), access);
    }

    tracing::debug!(
        schema_fields = schema_fields.len(),
        restricted = restricted.len(),
        "built field policy"
    );
    Ok(FieldPolicy::from_restricted(restricted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::MaskAlgorithm;
    use crate::types::role::FlsSpec;

    fn grant(role: &str, fls: Option<FlsSpec>) -> RoleGrant {
        RoleGrant {
            role: role.to_string(),
            dls: None,
            fls,
        }
    }

    fn schema() -> Vec<String> {
        ["os", "ip", "machine.os", "machine.ram", "user.email"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn salts() -> SaltRegistry {
        SaltRegistry::new("test-salt")
    }

    #[test]
    fn grant_without_fls_makes_everything_visible() {
        let grants = vec![
            grant("masked", Some(FlsSpec::default().with_mask("ip", MaskSpec::default()))),
            grant("open", None),
        ];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        assert!(policy.is_unrestricted());
    }

    #[test]
    fn visible_beats_masked_across_grants() {
        let grants = vec![
            grant("masked", Some(FlsSpec::default().with_mask("ip", MaskSpec::default()))),
            grant("plain", Some(FlsSpec::default())),
        ];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        assert_eq!(policy.access("ip"), &FieldAccess::Visible);
    }

    #[test]
    fn masked_beats_excluded_across_grants() {
        let grants = vec![
            grant("excluder", Some(FlsSpec::exclude(["ip"]))),
            grant("masker", Some(FlsSpec::default().with_mask("ip", MaskSpec::default()))),
        ];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        assert!(matches!(policy.access("ip"), FieldAccess::Masked(_)));
    }

    #[test]
    fn excluded_wins_ties_within_one_grant() {
        let grants = vec![grant(
            "conflicted",
            Some(FlsSpec::exclude(["ip"]).with_mask("ip", MaskSpec::default())),
        )];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        assert_eq!(policy.access("ip"), &FieldAccess::Excluded);
    }

    #[test]
    fn more_specific_mask_overrides_parent_exclude() {
        let grants = vec![grant(
            "nested",
            Some(FlsSpec::exclude(["machine"]).with_mask("machine.os", MaskSpec::default())),
        )];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        assert!(matches!(policy.access("machine.os"), FieldAccess::Masked(_)));
        assert_eq!(policy.access("machine.ram"), &FieldAccess::Excluded);
    }

    #[test]
    fn parent_rule_covers_descendants() {
        let grants = vec![grant("nested", Some(FlsSpec::exclude(["machine"])))];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        assert_eq!(policy.access("machine.os"), &FieldAccess::Excluded);
        assert_eq!(policy.access("machine.ram"), &FieldAccess::Excluded);
        assert_eq!(policy.access("os"), &FieldAccess::Visible);
    }

    #[test]
    fn include_mode_excludes_everything_else() {
        let grants = vec![grant("narrow", Some(FlsSpec::include(["os", "machine*"])))];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        assert_eq!(policy.access("os"), &FieldAccess::Visible);
        assert_eq!(policy.access("machine.os"), &FieldAccess::Visible);
        assert_eq!(policy.access("ip"), &FieldAccess::Excluded);
    }

    #[test]
    fn explicit_mask_overrides_include_modes_implicit_exclude() {
        let grants = vec![grant(
            "narrow",
            Some(FlsSpec::include(["os"]).with_mask("ip", MaskSpec::default())),
        )];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        assert!(matches!(policy.access("ip"), FieldAccess::Masked(_)));
        assert_eq!(policy.access("user.email"), &FieldAccess::Excluded);
    }

    #[test]
    fn wildcard_masks_expand_against_schema() {
        let grants = vec![grant(
            "masker",
            Some(FlsSpec::default().with_mask("machine.*", MaskSpec::default())),
        )];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        assert!(matches!(policy.access("machine.os"), FieldAccess::Masked(_)));
        assert!(matches!(policy.access("machine.ram"), FieldAccess::Masked(_)));
        assert_eq!(policy.access("os"), &FieldAccess::Visible);
    }

    #[test]
    fn first_masking_grant_wins_spec_conflicts() {
        let grants = vec![
            grant(
                "sha",
                Some(FlsSpec::default().with_mask("ip", MaskSpec::new(MaskAlgorithm::Sha256))),
            ),
            grant(
                "blake",
                Some(FlsSpec::default().with_mask("ip", MaskSpec::new(MaskAlgorithm::Blake3))),
            ),
        ];
        let policy = build_field_policy(&grants, &schema(), &salts()).unwrap();
        match policy.access("ip") {
            FieldAccess::Masked(mask) => assert_eq!(mask.algorithm, MaskAlgorithm::Sha256),
            other => panic!("expected masked, got {other:?}"),
        }
    }

    #[test]
    fn unknown_salt_is_a_config_error() {
        let grants = vec![grant(
            "masker",
            Some(FlsSpec::default().with_mask("ip", MaskSpec::default().with_salt("missing"))),
        )];
        let err = build_field_policy(&grants, &schema(), &salts()).unwrap_err();
        assert!(matches!(err, crate::ShroudError::InvalidConfig { .. }));
    }
}
