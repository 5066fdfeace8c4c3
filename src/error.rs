//! Error taxonomy for the security filtering engine.
//!
//! Four request-visible kinds: authorization rejections (`AccessDenied`),
//! structurally invalid queries (`InvalidQuery`), unknown indexes, and
//! upstream failures from the role store or execution engine. Unresolvable
//! role ids are *not* errors — they degrade to [`AccessWarning`]s on the
//! access context (see `types::policy`).

use thiserror::Error;

/// Errors surfaced by `shroud-core`.
#[derive(Debug, Error)]
pub enum ShroudError {
    /// The request references data the caller may not see, or the caller has
    /// no grant on the target index at all.
    ///
    /// The message is deliberately opaque: which field or filter triggered
    /// the rejection is logged at `warn` level, never returned, so restricted
    /// data cannot be probed through error text.
    #[error("access denied")]
    AccessDenied,

    /// The query is structurally invalid independent of any security policy.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// The target index is not known to the execution engine.
    #[error("unknown index: {index}")]
    UnknownIndex { index: String },

    /// The external role store failed or timed out. Propagated unmodified;
    /// retry policy belongs to the transport layer, not this crate.
    #[error("role store failure: {reason}")]
    RoleStore { reason: String },

    /// The external execution engine failed or timed out.
    #[error("execution engine failure: {reason}")]
    Execution { reason: String },

    /// Malformed security configuration (e.g. a mask referencing an unknown
    /// salt name). Raised when a policy is built, not at request evaluation.
    #[error("invalid security configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl ShroudError {
    /// True for the two upstream-collaborator failure kinds.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ShroudError::RoleStore { .. } | ShroudError::Execution { .. }
        )
    }

    /// True when the error must be reported as an authorization failure
    /// rather than a client or server fault.
    pub fn is_authorization(&self) -> bool {
        matches!(self, ShroudError::AccessDenied)
    }
}

pub type Result<T> = std::result::Result<T, ShroudError>;
