//! Public types exposed by the `shroud-core` crate.

pub mod identity;
pub mod policy;
pub mod query;
pub mod response;
pub mod role;

pub use identity::Identity;
pub use policy::{AccessWarning, EffectiveAccessContext, FieldAccess, FieldPolicy};
pub use query::{
    QueryNode, RewrittenQuery, SearchRequest, SortClause, SortOrder, TermsAggregation,
    USER_NAME_PLACEHOLDER,
};
pub use response::{AggregationBucket, AggregationResult, SearchHit, SearchResults};
pub use role::{FieldSelection, FlsSpec, IndexRule, MaskedField, Role};
