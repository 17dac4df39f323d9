//! Desired node-pool configuration.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// CPU architecture of the pool's instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuArch {
    X86_64,
    Arm64,
}

impl fmt::Display for CpuArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64 => f.write_str("x86_64"),
            Self::Arm64 => f.write_str("arm64"),
        }
    }
}

/// Scheduling effect of a taint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

/// A taint applied to every node in the pool, keyed by name in the spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    #[serde(default)]
    pub value: String,
    pub effect: TaintEffect,
}

/// Desired configuration of one node pool.
///
/// Labels and taints are unordered; the digest builder canonicalizes them, so
/// two specs that differ only in map iteration order fingerprint the same.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodePoolSpec {
    /// Cloud instance type, e.g. `m6i.xlarge`.
    pub instance_type: String,

    /// CPU architecture.
    pub arch: CpuArch,

    /// Whether instances carry GPUs.
    #[serde(default)]
    pub gpu: bool,

    /// Root disk size in GiB.
    pub disk_size_gb: u32,

    /// Node labels.
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Node taints, keyed by taint name.
    #[serde(default)]
    pub taints: HashMap<String, Taint>,

    /// Resolved machine image identifier.
    pub image: String,
}

impl NodePoolSpec {
    /// Check the spec for values no provisioner could act on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instance_type.trim().is_empty() {
            return Err(ConfigError::invalid("instance_type", "must not be empty"));
        }
        if self.image.trim().is_empty() {
            return Err(ConfigError::invalid("image", "must not be empty"));
        }
        if self.disk_size_gb == 0 {
            return Err(ConfigError::invalid("disk_size_gb", "must be greater than 0"));
        }
        if self.labels.keys().any(|k| k.is_empty()) {
            return Err(ConfigError::invalid("labels", "keys must not be empty"));
        }
        if self.taints.keys().any(|k| k.is_empty()) {
            return Err(ConfigError::invalid("taints", "names must not be empty"));
        }
        Ok(())
    }
}
