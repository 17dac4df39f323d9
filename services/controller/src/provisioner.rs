//! Pool provisioner interface and recording implementation.
//!
//! The provisioner is the collaborator that actually stands node pools up and
//! tears them down. The reconciler only needs a request to have been accepted;
//! it never waits for a pool to become ready. Implementations must be
//! idempotent per (digest, role): the same `ensure_pool` may arrive again
//! after a crash or a failed pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bgpool_reconcile::{ConfigDigest, NodePoolSpec, PoolHandle, PoolRecord, PoolRole};
use thiserror::Error;
use tracing::info;

/// Errors from provisioning requests. Reported, never fatal for a pass.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("provisioner rejected {op} for {handle}: {reason}")]
    Rejected {
        op: &'static str,
        handle: PoolHandle,
        reason: String,
    },

    #[error("provisioner {op} for {handle} timed out after {timeout:?}")]
    Timeout {
        op: &'static str,
        handle: PoolHandle,
        timeout: Duration,
    },
}

/// Pool provisioner interface.
#[async_trait]
pub trait PoolProvisioner: Send + Sync {
    /// Create the pool described by `record` and `spec`, or return the
    /// existing one.
    async fn ensure_pool(
        &self,
        record: &PoolRecord,
        spec: &NodePoolSpec,
    ) -> Result<PoolHandle, ProvisionError>;

    /// Retire a pool. May complete asynchronously.
    async fn retire_pool(&self, handle: &PoolHandle) -> Result<(), ProvisionError>;
}

/// A call seen by the recording provisioner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionCall {
    Ensure {
        handle: PoolHandle,
        role: PoolRole,
        digest: ConfigDigest,
    },
    Retire {
        handle: PoolHandle,
    },
}

/// Provisioner that logs and records requests without touching any
/// infrastructure. Used for development and tests.
#[derive(Default)]
pub struct RecordingProvisioner {
    calls: Mutex<Vec<ProvisionCall>>,

    /// Whether requests should "fail".
    failing: AtomicBool,
}

impl RecordingProvisioner {
    /// Create a new recording provisioner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recording provisioner that rejects every request.
    pub fn failing() -> Self {
        let provisioner = Self::new();
        provisioner.set_failing(true);
        provisioner
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Calls recorded so far, including rejected ones.
    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: ProvisionCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check(&self, op: &'static str, handle: &PoolHandle) -> Result<(), ProvisionError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProvisionError::Rejected {
                op,
                handle: handle.clone(),
                reason: "recording provisioner configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PoolProvisioner for RecordingProvisioner {
    async fn ensure_pool(
        &self,
        record: &PoolRecord,
        spec: &NodePoolSpec,
    ) -> Result<PoolHandle, ProvisionError> {
        self.record(ProvisionCall::Ensure {
            handle: record.handle.clone(),
            role: record.role,
            digest: record.digest.clone(),
        });
        self.check("ensure_pool", &record.handle)?;

        info!(
            pool = %record.pool,
            handle = %record.handle,
            role = %record.role,
            instance_type = %spec.instance_type,
            arch = %spec.arch,
            gpu = spec.gpu,
            image = %spec.image,
            "[MOCK] Ensuring node pool"
        );

        Ok(record.handle.clone())
    }

    async fn retire_pool(&self, handle: &PoolHandle) -> Result<(), ProvisionError> {
        self.record(ProvisionCall::Retire {
            handle: handle.clone(),
        });
        self.check("retire_pool", handle)?;

        info!(handle = %handle, "[MOCK] Retiring node pool");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use bgpool_id::PoolName;
    use bgpool_reconcile::CpuArch;

    use super::*;

    fn spec() -> NodePoolSpec {
        NodePoolSpec {
            instance_type: "m6i.large".to_string(),
            arch: CpuArch::X86_64,
            gpu: false,
            disk_size_gb: 50,
            labels: HashMap::new(),
            taints: HashMap::new(),
            image: "ami-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_recording_provisioner() {
        let provisioner = RecordingProvisioner::new();
        let pool = PoolName::parse("workers").unwrap();
        let digest = ConfigDigest::parse("abc123").unwrap();
        let record = PoolRecord::canonical(&pool, &digest, PoolRole::Active);

        let handle = provisioner.ensure_pool(&record, &spec()).await.unwrap();
        assert_eq!(handle.as_str(), "workers-abc123");

        provisioner.retire_pool(&handle).await.unwrap();
        assert_eq!(provisioner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_provisioner_still_records() {
        let provisioner = RecordingProvisioner::failing();
        let handle = PoolHandle::new("workers-abc123");

        let err = provisioner.retire_pool(&handle).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Rejected { op: "retire_pool", .. }));
        assert_eq!(provisioner.calls(), vec![ProvisionCall::Retire { handle }]);
    }
}
