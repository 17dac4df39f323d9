//! Cross-pool network bridge.
//!
//! While a candidate pool runs beside the active one, workloads on both sides
//! must reach each other. The bridge opens that connectivity. Requests are
//! idempotent and repeated on every pass of the overlap window; teardown after
//! promotion is left to the operator workflow.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bgpool_reconcile::PoolHandle;
use thiserror::Error;
use tracing::info;

/// Errors from bridge requests. Reported, never fatal for a pass.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge between {active} and {candidate} rejected: {reason}")]
    Rejected {
        active: PoolHandle,
        candidate: PoolHandle,
        reason: String,
    },

    #[error("bridge between {active} and {candidate} timed out after {timeout:?}")]
    Timeout {
        active: PoolHandle,
        candidate: PoolHandle,
        timeout: Duration,
    },
}

/// Network bridge interface.
#[async_trait]
pub trait NetworkBridge: Send + Sync {
    /// Open bidirectional connectivity between two pools.
    async fn open_bridge(
        &self,
        active: &PoolHandle,
        candidate: &PoolHandle,
    ) -> Result<(), BridgeError>;
}

/// Bridge that logs and records requests. Used for development and tests.
#[derive(Default)]
pub struct RecordingBridge {
    opened: Mutex<Vec<(PoolHandle, PoolHandle)>>,
    failing: AtomicBool,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Bridge requests recorded so far, including rejected ones.
    pub fn requests(&self) -> Vec<(PoolHandle, PoolHandle)> {
        self.opened
            .lock()
            .map(|opened| opened.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NetworkBridge for RecordingBridge {
    async fn open_bridge(
        &self,
        active: &PoolHandle,
        candidate: &PoolHandle,
    ) -> Result<(), BridgeError> {
        if let Ok(mut opened) = self.opened.lock() {
            opened.push((active.clone(), candidate.clone()));
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::Rejected {
                active: active.clone(),
                candidate: candidate.clone(),
                reason: "recording bridge configured to fail".to_string(),
            });
        }

        info!(active = %active, candidate = %candidate, "[MOCK] Opening pool bridge");
        Ok(())
    }
}
