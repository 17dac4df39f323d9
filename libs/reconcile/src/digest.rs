//! Config digest builder.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::error::{ConfigError, StateError};
use crate::spec::NodePoolSpec;

/// Length of a freshly computed digest in hex characters.
pub const DIGEST_LEN: usize = 8;

/// Longest digest accepted when reading stored state (a full SHA-256).
const MAX_STORED_DIGEST_LEN: usize = 64;

/// Short fingerprint of a node-pool configuration.
///
/// Computed digests are the first four bytes of SHA-256 over the canonical
/// JSON encoding of the spec, rendered as eight lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ConfigDigest(String);

impl ConfigDigest {
    /// Parse a digest read back from the state store.
    ///
    /// Any non-empty lowercase hex string up to 64 characters is accepted.
    pub fn parse(s: &str) -> Result<Self, StateError> {
        let well_formed = !s.is_empty()
            && s.len() <= MAX_STORED_DIGEST_LEN
            && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f'));
        if !well_formed {
            return Err(StateError::MalformedDigest(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ConfigDigest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Compute the digest of a node-pool spec.
///
/// Fails closed: an invalid or unserializable spec never yields a digest.
pub fn digest(spec: &NodePoolSpec) -> Result<ConfigDigest, ConfigError> {
    spec.validate()?;
    let value = serde_json::to_value(spec)?;
    let canonical = canonical_json(&value);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let result = hasher.finalize();
    Ok(ConfigDigest(hex::encode(&result[..DIGEST_LEN / 2])))
}

/// Produce canonical JSON (sorted keys, no extra whitespace).
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let inner: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("\"{}\":{}", escape_json_string(k), canonical_json(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        serde_json::Value::Array(arr) => {
            let inner: Vec<String> = arr.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        serde_json::Value::String(s) => format!("\"{}\"", escape_json_string(s)),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
    }
}

fn escape_json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}
