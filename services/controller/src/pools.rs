//! Desired node pools, loaded from a TOML file.
//!
//! ```toml
//! [pools.workers]
//! instance_type = "m6i.xlarge"
//! arch = "x86_64"
//! disk_size_gb = 100
//! image = "ami-0123456789abcdef0"
//!
//! [pools.workers.labels]
//! team = "platform"
//!
//! [pools.workers.taints."dedicated"]
//! value = "batch"
//! effect = "NoSchedule"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use bgpool_id::PoolName;
use bgpool_reconcile::NodePoolSpec;
use serde::Deserialize;

use crate::config::ConfigLoadError;

/// One pool the controller should keep reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredPool {
    pub name: PoolName,
    pub spec: NodePoolSpec,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PoolsFile {
    #[serde(default)]
    pools: BTreeMap<String, NodePoolSpec>,
}

/// Load desired pools from `path`, ordered by name.
pub fn load_pools(path: impl AsRef<Path>) -> Result<Vec<DesiredPool>, ConfigLoadError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: PoolsFile = toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    file.pools
        .into_iter()
        .map(|(name, spec)| {
            let name = PoolName::parse(&name)
                .map_err(|source| ConfigLoadError::InvalidPool { name, source })?;
            Ok(DesiredPool { name, spec })
        })
        .collect()
}
