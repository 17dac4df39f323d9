//! Parameter key layout.

use bgpool_id::{ClusterName, PoolName};

/// Default top-level key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "bgpool";

/// Parameter keys for one pool of one cluster.
///
/// ```text
/// /<prefix>/<cluster>/nodepools/<pool>/active_hash
/// /<prefix>/<cluster>/nodepools/<pool>/candidate_hash
/// /<prefix>/<cluster>/nodepools/<pool>/pending_request
/// /<prefix>/<cluster>/promote_nodepools
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKeys {
    cluster_root: String,
    pool_root: String,
}

impl StateKeys {
    pub fn new(prefix: &str, cluster: &ClusterName, pool: &PoolName) -> Self {
        let cluster_root = Self::cluster_root(prefix, cluster);
        let pool_root = format!("{cluster_root}/nodepools/{pool}");
        Self {
            cluster_root,
            pool_root,
        }
    }

    fn cluster_root(prefix: &str, cluster: &ClusterName) -> String {
        format!("/{}/{cluster}", prefix.trim_matches('/'))
    }

    pub fn active(&self) -> String {
        format!("{}/active_hash", self.pool_root)
    }

    pub fn candidate(&self) -> String {
        format!("{}/candidate_hash", self.pool_root)
    }

    pub fn pending_request(&self) -> String {
        format!("{}/pending_request", self.pool_root)
    }

    /// Lease name guarding this pool's read-modify-write.
    pub fn lease(&self) -> &str {
        &self.pool_root
    }

    /// The cluster-wide promote flag.
    pub fn promote_flag(&self) -> String {
        Self::promote_flag_for(&self.cluster_root)
    }

    /// The promote flag key without a pool in hand.
    pub fn cluster_promote_flag(prefix: &str, cluster: &ClusterName) -> String {
        Self::promote_flag_for(&Self::cluster_root(prefix, cluster))
    }

    fn promote_flag_for(cluster_root: &str) -> String {
        format!("{cluster_root}/promote_nodepools")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let cluster = ClusterName::parse("prod-eu1").unwrap();
        let pool = PoolName::parse("workers").unwrap();
        let keys = StateKeys::new("/bgpool/", &cluster, &pool);

        assert_eq!(keys.active(), "/bgpool/prod-eu1/nodepools/workers/active_hash");
        assert_eq!(
            keys.candidate(),
            "/bgpool/prod-eu1/nodepools/workers/candidate_hash"
        );
        assert_eq!(
            keys.pending_request(),
            "/bgpool/prod-eu1/nodepools/workers/pending_request"
        );
        assert_eq!(keys.lease(), "/bgpool/prod-eu1/nodepools/workers");
        assert_eq!(keys.promote_flag(), "/bgpool/prod-eu1/promote_nodepools");
        assert_eq!(
            StateKeys::cluster_promote_flag(DEFAULT_KEY_PREFIX, &cluster),
            keys.promote_flag()
        );
    }
}
