#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions, allowed project-wide:
//
// Documentation lints: internal/self-documenting functions don't need
// extensive docs. Public APIs should still have proper documentation.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Pattern matching: these pedantic lints often suggest changes that reduce
// clarity.
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
//
// Performance/ergonomics trade-offs that are acceptable for this codebase:
#![allow(clippy::needless_pass_by_value)] // Builders take owned values intentionally
#![allow(clippy::return_self_not_must_use)] // Builder patterns don't need must_use everywhere
#![allow(clippy::must_use_candidate)]

//! Per-identity document-level (DLS) and field-level (FLS) security over a
//! shared search index.
//!
//! Callers with different entitlements query the same dataset and each see
//! only the documents and field values their roles allow — without
//! per-tenant data duplication. The pipeline: resolve roles, build a
//! request-scoped access context (visibility predicate + per-field
//! disclosure policy), rewrite the query so the execution engine evaluates
//! masked fields over masked representations, then filter the response
//! before any byte reaches the caller. Masking happens *before* derived
//! computation, so aggregation bucket labels and sort keys never leak raw
//! values.

/// The shroud-core crate version (matches `Cargo.toml`).
pub const SHROUD_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod backend;
pub mod engine;
pub mod error;
pub mod mask;
pub mod pattern;
pub mod types;

pub use backend::MemoryEngine;
pub use engine::{
    ExecutionEngine, FilterStats, RoleStore, SecuredResponse, SecurityDecision, SecurityEngine,
    StaticRoleStore,
};
pub use error::{Result, ShroudError};
pub use mask::{MaskAlgorithm, MaskSpec, ResolvedMask, SaltRegistry};
pub use pattern::WildcardPattern;
pub use types::{
    AccessWarning, AggregationBucket, AggregationResult, EffectiveAccessContext, FieldAccess,
    FieldPolicy, FieldSelection, FlsSpec, Identity, IndexRule, MaskedField, QueryNode, Role,
    SearchHit, SearchRequest, SearchResults, SortClause, SortOrder, TermsAggregation,
    RewrittenQuery, USER_NAME_PLACEHOLDER,
};
