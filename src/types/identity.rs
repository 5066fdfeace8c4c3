//! Requester identity handed to the engine by the (external) authentication
//! layer. The engine never authenticates; it only consumes the resolved role
//! ids.

use serde::{Deserialize, Serialize};

/// Caller identity used to build the per-request access context.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Default)]
pub struct Identity {
    /// Login name; substituted into DLS filters that use `${user.name}`.
    pub username: String,
    /// Role ids resolved externally. Order matters: it breaks ties when
    /// several roles mask the same field with different specs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
}

impl Identity {
    pub fn new(username: &str, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            username: username.to_string(),
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}
