//! Deterministic, irreversible field masking.
//!
//! A mask turns a raw field value into an opaque surrogate with two
//! invariants: the same (algorithm, salt, value) triple always yields the
//! same surrogate, so aggregations still group identical raw values under one
//! label, and distinct raw values yield distinct surrogates with overwhelming
//! probability. Non-string scalars are canonicalized to a stable textual form
//! before hashing; null stays null; arrays and objects are masked
//! element-wise. Output length is fixed per algorithm, so repeated calls
//! never change the surrogate's shape.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};

use crate::error::{Result, ShroudError};

/// Separates salt from payload in digest input so `("ab","c")` and
/// `("a","bc")` cannot collide.
const SALT_SEPARATOR: u8 = 0x1f;

/// How a masked surrogate is derived from the raw value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaskAlgorithm {
    /// Keyed BLAKE3 digest, hex-encoded (64 chars). The default.
    Blake3,
    /// Salted SHA-256 digest, hex-encoded (64 chars).
    Sha256,
    /// Salted SHA-512 digest, hex-encoded (128 chars).
    Sha512,
    /// Regex find/replace for structure-preserving masks
    /// (e.g. keep an IP's first octet). Not collision-resistant; use only
    /// where the replacement itself is the desired disclosure.
    Pattern { pattern: String, replacement: String },
}

impl Default for MaskAlgorithm {
    fn default() -> Self {
        Self::Blake3
    }
}

/// Configuration form of a mask: an algorithm plus an optional *named* salt
/// reference, resolved through the [`SaltRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MaskSpec {
    #[serde(default)]
    pub algorithm: MaskAlgorithm,
    /// Name of a registry salt. Absent means the deployment default salt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl MaskSpec {
    pub fn new(algorithm: MaskAlgorithm) -> Self {
        Self {
            algorithm,
            salt: None,
        }
    }

    pub fn with_salt(mut self, salt_name: &str) -> Self {
        self.salt = Some(salt_name.to_string());
        self
    }
}

/// Immutable-after-load salt material: one per-deployment default plus
/// optional named per-field salts. Never derived from the values being
/// masked. Concurrent requests read this without locking; there is no writer
/// path after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaltRegistry {
    default_salt: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    named: BTreeMap<String, String>,
}

impl SaltRegistry {
    pub fn new(default_salt: &str) -> Self {
        Self {
            default_salt: default_salt.to_string(),
            named: BTreeMap::new(),
        }
    }

    pub fn with_salt(mut self, name: &str, salt: &str) -> Self {
        self.named.insert(name.to_string(), salt.to_string());
        self
    }

    /// Resolve a config-form spec into a self-contained mask. Unknown salt
    /// names are a configuration error, not a silent fallback.
    pub fn resolve(&self, spec: &MaskSpec) -> Result<ResolvedMask> {
        let salt = match &spec.salt {
            None => self.default_salt.clone(),
            Some(name) => self
                .named
                .get(name)
                .cloned()
                .ok_or_else(|| ShroudError::InvalidConfig {
                    reason: format!("mask references unknown salt {name:?}"),
                })?,
        };
        Ok(ResolvedMask::new(spec.algorithm.clone(), salt))
    }
}

/// A fully resolved mask: algorithm plus concrete salt. Self-contained so it
/// can travel inside a rewritten query and be applied by an execution engine
/// that has no access to the salt registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedMask {
    pub algorithm: MaskAlgorithm,
    salt: String,
    #[serde(skip)]
    compiled: Option<Regex>,
}

impl PartialEq for ResolvedMask {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm == other.algorithm && self.salt == other.salt
    }
}

impl ResolvedMask {
    pub fn new(algorithm: MaskAlgorithm, salt: String) -> Self {
        let compiled = match &algorithm {
            MaskAlgorithm::Pattern { pattern, .. } => Regex::new(pattern).ok(),
            _ => None,
        };
        Self {
            algorithm,
            salt,
            compiled,
        }
    }

    /// Mask a JSON value. Pure and total: never fails for any representable
    /// value. Null is preserved (it discloses nothing); containers are masked
    /// element-wise so nested documents keep their shape.
    pub fn apply(&self, value: &Value) -> Value {
        match value {
            Value::Null => Value::Null,
            Value::Array(items) => Value::Array(items.iter().map(|v| self.apply(v)).collect()),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.apply(v)))
                    .collect(),
            ),
            scalar => Value::String(self.apply_text(&canonical_text(scalar))),
        }
    }

    /// Mask an already-canonical textual value.
    pub fn apply_text(&self, text: &str) -> String {
        match &self.algorithm {
            MaskAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(self.salt.as_bytes());
                hasher.update(&[SALT_SEPARATOR]);
                hasher.update(text.as_bytes());
                hasher.finalize().to_hex().to_string()
            }
            MaskAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(self.salt.as_bytes());
                hasher.update([SALT_SEPARATOR]);
                hasher.update(text.as_bytes());
                hex::encode(hasher.finalize())
            }
            MaskAlgorithm::Sha512 => {
                let mut hasher = Sha512::new();
                hasher.update(self.salt.as_bytes());
                hasher.update([SALT_SEPARATOR]);
                hasher.update(text.as_bytes());
                hex::encode(hasher.finalize())
            }
            MaskAlgorithm::Pattern {
                pattern,
                replacement,
            } => {
                // Compiled at construction; deserialized masks recompile here.
                match &self.compiled {
                    Some(re) => re.replace_all(text, replacement.as_str()).into_owned(),
                    None => match Regex::new(pattern) {
                        Ok(re) => re.replace_all(text, replacement.as_str()).into_owned(),
                        Err(_) => text.to_string(),
                    },
                }
            }
        }
    }
}

/// Stable textual form of a JSON scalar, used as digest input.
pub fn canonical_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Null => String::new(),
        // Containers are handled element-wise by `apply`; canonicalize to
        // compact JSON if a caller hands one in directly.
        other => other.to_string(),
    }
}
