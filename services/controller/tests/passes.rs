//! Integration tests for single reconciliation passes.
//!
//! Each test drives a `PassRunner` against the in-memory store and the
//! recording provisioner/bridge, then checks stored state and the calls the
//! collaborators saw.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bgpool_controller::provisioner::ProvisionCall;
use bgpool_controller::store::LeaseOutcome;
use bgpool_controller::{
    InMemoryStateStore, PassError, PassRunner, PassSettings, PoolProvisioner, ProvisionError,
    RecordingBridge, RecordingProvisioner, SideEffectError, StateKeys, StateStore,
    StateStoreError,
};
use bgpool_id::{ClusterName, HolderId, PoolName};
use bgpool_reconcile::{
    digest, Action, ActionKind, ConfigDigest, CpuArch, NodePoolSpec, NoOpReason, OwedRequests,
    Phase, PoolHandle, PoolRecord, PoolRole, ProvisionRequest,
};
use rstest::rstest;

struct Harness {
    store: Arc<InMemoryStateStore>,
    provisioner: Arc<RecordingProvisioner>,
    bridge: Arc<RecordingBridge>,
    runner: PassRunner,
    keys: StateKeys,
    pool: PoolName,
}

fn settings() -> PassSettings {
    PassSettings {
        cluster: ClusterName::parse("test-cluster").unwrap(),
        key_prefix: "bgpool".to_string(),
        call_timeout: Duration::from_secs(2),
        lease_ttl: Duration::from_secs(30),
    }
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStateStore::new());
    let provisioner = Arc::new(RecordingProvisioner::new());
    let bridge = Arc::new(RecordingBridge::new());
    let settings = settings();
    let pool = PoolName::parse("workers").unwrap();
    let keys = StateKeys::new(&settings.key_prefix, &settings.cluster, &pool);

    let runner = PassRunner::new(
        settings,
        store.clone(),
        provisioner.clone(),
        bridge.clone(),
    );

    Harness {
        store,
        provisioner,
        bridge,
        runner,
        keys,
        pool,
    }
}

fn spec(image: &str) -> NodePoolSpec {
    NodePoolSpec {
        instance_type: "m6i.xlarge".to_string(),
        arch: CpuArch::X86_64,
        gpu: false,
        disk_size_gb: 100,
        labels: HashMap::from([("team".to_string(), "platform".to_string())]),
        taints: HashMap::new(),
        image: image.to_string(),
    }
}

fn d(s: &str) -> ConfigDigest {
    ConfigDigest::parse(s).unwrap()
}

impl Harness {
    async fn seed(&self, active: Option<&str>, candidate: Option<&str>) {
        if let Some(active) = active {
            self.store.set(&self.keys.active(), active).await.unwrap();
        }
        if let Some(candidate) = candidate {
            self.store
                .set(&self.keys.candidate(), candidate)
                .await
                .unwrap();
        }
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.store.get(key).await.unwrap()
    }

    async fn active(&self) -> Option<String> {
        self.get(&self.keys.active()).await
    }

    async fn candidate(&self) -> Option<String> {
        self.get(&self.keys.candidate()).await
    }

    async fn pending(&self) -> Option<String> {
        self.get(&self.keys.pending_request()).await
    }

    /// Requests still owed, in the order they will be issued.
    async fn owed(&self) -> Vec<ProvisionRequest> {
        let raw = self.pending().await.unwrap_or_default();
        OwedRequests::parse(&raw).unwrap().requests().cloned().collect()
    }

    fn handle(&self, digest: &str) -> PoolHandle {
        PoolHandle::canonical(&self.pool, &d(digest))
    }
}

#[tokio::test]
async fn test_bootstrap() {
    let h = harness();
    let desired = digest(&spec("ami-a")).unwrap();

    let report = h.runner.run_pass(&h.pool, &spec("ami-a"), false).await.unwrap();

    assert_eq!(
        report.action,
        Action::Bootstrap {
            digest: desired.clone()
        }
    );
    assert_eq!(report.outcome(), ActionKind::Bootstrap);
    assert_eq!(h.active().await.as_deref(), Some(desired.as_str()));
    assert_eq!(h.candidate().await, None);
    assert_eq!(h.pending().await, None);
    assert_eq!(
        h.provisioner.calls(),
        vec![ProvisionCall::Ensure {
            handle: PoolHandle::canonical(&h.pool, &desired),
            role: PoolRole::Active,
            digest: desired.clone(),
        }]
    );
    assert!(h.bridge.requests().is_empty());
    assert_eq!(report.phase, Phase::Stable);
    assert!(report.issue.is_none());
}

#[tokio::test]
async fn test_new_candidate() {
    let h = harness();
    h.seed(Some("abc123"), None).await;
    let desired = digest(&spec("ami-b")).unwrap();

    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();

    assert_eq!(report.outcome(), ActionKind::CandidateCreated);
    assert_eq!(h.active().await.as_deref(), Some("abc123"));
    assert_eq!(h.candidate().await.as_deref(), Some(desired.as_str()));
    assert_eq!(
        h.provisioner.calls(),
        vec![ProvisionCall::Ensure {
            handle: PoolHandle::canonical(&h.pool, &desired),
            role: PoolRole::Candidate,
            digest: desired.clone(),
        }]
    );

    // Both pools exist now, so the bridge is opened.
    assert_eq!(
        h.bridge.requests(),
        vec![(h.handle("abc123"), PoolHandle::canonical(&h.pool, &desired))]
    );
    assert_eq!(
        report.candidate,
        Some(PoolRecord::canonical(&h.pool, &desired, PoolRole::Candidate))
    );
}

#[tokio::test]
async fn test_promotion() {
    let h = harness();
    let desired = digest(&spec("ami-b")).unwrap();
    h.seed(Some("abc123"), Some(desired.as_str())).await;

    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), true).await.unwrap();

    assert_eq!(
        report.action,
        Action::Promote {
            previous: d("abc123"),
            promoted: desired.clone()
        }
    );
    assert_eq!(h.active().await.as_deref(), Some(desired.as_str()));
    assert_eq!(h.candidate().await, None);
    assert_eq!(h.pending().await, None);
    assert_eq!(
        h.provisioner.calls(),
        vec![ProvisionCall::Retire {
            handle: h.handle("abc123")
        }]
    );
    assert!(h.bridge.requests().is_empty());
    assert_eq!(report.phase, Phase::Stable);
}

#[rstest]
#[case(false)]
#[case(true)]
#[tokio::test]
async fn test_in_sync_noop(#[case] promote: bool) {
    let h = harness();
    let desired = digest(&spec("ami-a")).unwrap();
    h.seed(Some(desired.as_str()), None).await;
    let writes_before = h.store.write_count();

    let report = h
        .runner
        .run_pass(&h.pool, &spec("ami-a"), promote)
        .await
        .unwrap();

    assert_eq!(
        report.action,
        Action::NoOp {
            reason: NoOpReason::InSync
        }
    );
    assert_eq!(h.store.write_count(), writes_before);
    assert!(h.provisioner.calls().is_empty());
    assert!(h.bridge.requests().is_empty());
}

#[tokio::test]
async fn test_abandoned_candidate_left_in_place() {
    let h = harness();
    let active = digest(&spec("ami-a")).unwrap();
    h.seed(Some(active.as_str()), Some("def456")).await;
    let writes_before = h.store.write_count();

    let report = h.runner.run_pass(&h.pool, &spec("ami-a"), false).await.unwrap();

    assert_eq!(
        report.action,
        Action::NoOp {
            reason: NoOpReason::CandidateRetained
        }
    );
    assert_eq!(h.candidate().await.as_deref(), Some("def456"));
    assert_eq!(h.store.write_count(), writes_before);
    assert!(h.provisioner.calls().is_empty());
    // The candidate pool is still running, so connectivity is kept open.
    assert_eq!(h.bridge.requests().len(), 1);
}

#[tokio::test]
async fn test_second_pass_is_idempotent() {
    let h = harness();

    h.runner.run_pass(&h.pool, &spec("ami-a"), false).await.unwrap();
    h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();
    let calls = h.provisioner.calls().len();
    let writes = h.store.write_count();

    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();

    assert_eq!(
        report.action,
        Action::NoOp {
            reason: NoOpReason::AwaitingPromotion
        }
    );
    assert_eq!(h.provisioner.calls().len(), calls);
    assert_eq!(h.store.write_count(), writes);
    assert!(report.provision_requested.is_empty());
}

#[tokio::test]
async fn test_full_rollout() {
    let h = harness();
    let a = digest(&spec("ami-a")).unwrap();
    let b = digest(&spec("ami-b")).unwrap();

    let kinds = [
        (spec("ami-a"), false, ActionKind::Bootstrap),
        (spec("ami-b"), false, ActionKind::CandidateCreated),
        (spec("ami-b"), false, ActionKind::NoChange),
        (spec("ami-b"), true, ActionKind::Promoted),
        (spec("ami-b"), true, ActionKind::NoChange),
    ];
    for (spec, promote, expected) in kinds {
        let report = h.runner.run_pass(&h.pool, &spec, promote).await.unwrap();
        assert_eq!(report.outcome(), expected);
    }

    assert_eq!(h.active().await, Some(b.to_string()));
    assert_eq!(h.candidate().await, None);
    assert_eq!(
        h.provisioner.calls(),
        vec![
            ProvisionCall::Ensure {
                handle: PoolHandle::canonical(&h.pool, &a),
                role: PoolRole::Active,
                digest: a.clone(),
            },
            ProvisionCall::Ensure {
                handle: PoolHandle::canonical(&h.pool, &b),
                role: PoolRole::Candidate,
                digest: b.clone(),
            },
            ProvisionCall::Retire {
                handle: PoolHandle::canonical(&h.pool, &a),
            },
        ]
    );
    // Bridge opened on every pass of the overlap window.
    assert_eq!(h.bridge.requests().len(), 2);
}

#[tokio::test]
async fn test_failed_provisioning_is_retried() {
    let h = harness();
    h.seed(Some("abc123"), None).await;
    let desired = digest(&spec("ami-b")).unwrap();
    h.provisioner.set_failing(true);

    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();

    // State is persisted despite the failure, and the request stays owed.
    assert_eq!(report.outcome(), ActionKind::CandidateCreated);
    assert!(matches!(report.issue, Some(SideEffectError::Provision(_))));
    assert_eq!(h.candidate().await.as_deref(), Some(desired.as_str()));
    assert_eq!(
        h.owed().await,
        vec![ProvisionRequest::Ensure {
            role: PoolRole::Candidate,
            digest: desired.clone()
        }]
    );
    // No bridge towards a pool that may not exist.
    assert!(h.bridge.requests().is_empty());

    h.provisioner.set_failing(false);
    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();

    assert_eq!(report.outcome(), ActionKind::NoChange);
    assert!(report.issue.is_none());
    assert_eq!(
        report.provision_requested,
        vec![ProvisionRequest::Ensure {
            role: PoolRole::Candidate,
            digest: desired.clone()
        }]
    );
    assert_eq!(h.pending().await, None);
    assert_eq!(h.provisioner.calls().len(), 2);
    assert_eq!(h.bridge.requests().len(), 1);
}

#[tokio::test]
async fn test_promotion_waits_for_candidate_request() {
    let h = harness();
    h.seed(Some("abc123"), None).await;
    h.provisioner.set_failing(true);
    h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();
    h.provisioner.set_failing(false);

    // Promote requested while the candidate ensure is still owed.
    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), true).await.unwrap();
    assert_eq!(report.outcome(), ActionKind::NoChange);
    assert_eq!(h.active().await.as_deref(), Some("abc123"));
    assert_eq!(h.pending().await, None);

    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), true).await.unwrap();
    assert_eq!(report.outcome(), ActionKind::Promoted);
}

#[tokio::test]
async fn test_failed_retire_is_retried() {
    let h = harness();
    let desired = digest(&spec("ami-b")).unwrap();
    h.seed(Some("abc123"), Some(desired.as_str())).await;
    h.provisioner.set_failing(true);

    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), true).await.unwrap();
    assert_eq!(report.outcome(), ActionKind::Promoted);
    assert!(report.issue.is_some());
    assert_eq!(
        h.owed().await,
        vec![ProvisionRequest::Retire {
            digest: d("abc123")
        }]
    );

    h.provisioner.set_failing(false);
    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), true).await.unwrap();
    assert_eq!(report.outcome(), ActionKind::NoChange);
    assert_eq!(
        h.provisioner.calls().last(),
        Some(&ProvisionCall::Retire {
            handle: h.handle("abc123")
        })
    );
    assert_eq!(h.pending().await, None);
}

#[tokio::test]
async fn test_failed_bootstrap_survives_new_candidate() {
    let h = harness();
    let a = digest(&spec("ami-a")).unwrap();
    let b = digest(&spec("ami-b")).unwrap();

    h.provisioner.set_failing(true);
    let report = h.runner.run_pass(&h.pool, &spec("ami-a"), false).await.unwrap();
    assert_eq!(report.outcome(), ActionKind::Bootstrap);
    assert!(report.issue.is_some());

    // The desired spec moves on before the active pool was ever accepted.
    h.provisioner.set_failing(false);
    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();

    assert_eq!(report.outcome(), ActionKind::CandidateCreated);
    assert!(report.issue.is_none());
    let ensure_active = ProvisionRequest::Ensure {
        role: PoolRole::Active,
        digest: a.clone(),
    };
    let ensure_candidate = ProvisionRequest::Ensure {
        role: PoolRole::Candidate,
        digest: b.clone(),
    };
    assert_eq!(
        report.provision_requested,
        vec![ensure_active, ensure_candidate]
    );
    assert_eq!(
        h.provisioner.calls()[1..].to_vec(),
        vec![
            ProvisionCall::Ensure {
                handle: PoolHandle::canonical(&h.pool, &a),
                role: PoolRole::Active,
                digest: a.clone(),
            },
            ProvisionCall::Ensure {
                handle: PoolHandle::canonical(&h.pool, &b),
                role: PoolRole::Candidate,
                digest: b.clone(),
            },
        ]
    );
    assert!(h.owed().await.is_empty());
}

#[tokio::test]
async fn test_failed_retire_survives_next_candidate() {
    let h = harness();
    let b = digest(&spec("ami-b")).unwrap();
    let c = digest(&spec("ami-c")).unwrap();
    h.seed(Some("abc123"), Some(b.as_str())).await;

    h.provisioner.set_failing(true);
    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), true).await.unwrap();
    assert_eq!(report.outcome(), ActionKind::Promoted);

    h.provisioner.set_failing(false);
    let report = h.runner.run_pass(&h.pool, &spec("ami-c"), false).await.unwrap();

    assert_eq!(report.outcome(), ActionKind::CandidateCreated);
    assert_eq!(
        report.provision_requested,
        vec![
            ProvisionRequest::Retire {
                digest: d("abc123")
            },
            ProvisionRequest::Ensure {
                role: PoolRole::Candidate,
                digest: c.clone()
            },
        ]
    );
    assert_eq!(
        h.provisioner.calls()[1],
        ProvisionCall::Retire {
            handle: h.handle("abc123")
        }
    );
    assert!(h.owed().await.is_empty());
}

#[tokio::test]
async fn test_abandoned_candidate_ensure_is_dropped() {
    let h = harness();
    h.seed(Some("abc123"), None).await;
    let c = digest(&spec("ami-c")).unwrap();

    h.provisioner.set_failing(true);
    h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();
    let report = h.runner.run_pass(&h.pool, &spec("ami-c"), false).await.unwrap();

    // The candidate for ami-b was replaced; only ami-c is still wanted.
    assert_eq!(report.outcome(), ActionKind::CandidateCreated);
    assert_eq!(
        h.owed().await,
        vec![ProvisionRequest::Ensure {
            role: PoolRole::Candidate,
            digest: c
        }]
    );
}

/// Provisioner that records another owed request while it is being called,
/// the way an overlapping pass would once the lease is released.
struct InterleavingProvisioner {
    store: Arc<InMemoryStateStore>,
    key: String,
    inner: RecordingProvisioner,
}

#[async_trait]
impl PoolProvisioner for InterleavingProvisioner {
    async fn ensure_pool(
        &self,
        record: &PoolRecord,
        spec: &NodePoolSpec,
    ) -> Result<PoolHandle, ProvisionError> {
        let raw = self.store.get(&self.key).await.unwrap().unwrap_or_default();
        let mut owed = OwedRequests::parse(&raw).unwrap();
        owed.push(
            ProvisionRequest::Retire {
                digest: d("abc123"),
            },
            None,
        );
        self.store
            .set(&self.key, &owed.to_json().unwrap())
            .await
            .unwrap();

        self.inner.ensure_pool(record, spec).await
    }

    async fn retire_pool(&self, handle: &PoolHandle) -> Result<(), ProvisionError> {
        self.inner.retire_pool(handle).await
    }
}

#[tokio::test]
async fn test_settling_keeps_requests_recorded_meanwhile() {
    let store = Arc::new(InMemoryStateStore::new());
    let settings = settings();
    let pool = PoolName::parse("workers").unwrap();
    let keys = StateKeys::new(&settings.key_prefix, &settings.cluster, &pool);
    let provisioner = Arc::new(InterleavingProvisioner {
        store: store.clone(),
        key: keys.pending_request(),
        inner: RecordingProvisioner::new(),
    });
    let runner = PassRunner::new(
        settings,
        store.clone(),
        provisioner,
        Arc::new(RecordingBridge::new()),
    );

    let report = runner.run_pass(&pool, &spec("ami-a"), false).await.unwrap();
    assert_eq!(report.outcome(), ActionKind::Bootstrap);
    assert!(report.issue.is_none());

    // The accepted ensure is gone; the retire written during the call stays.
    let raw = store.get(&keys.pending_request()).await.unwrap().unwrap();
    let owed: Vec<_> = OwedRequests::parse(&raw).unwrap().requests().cloned().collect();
    assert_eq!(
        owed,
        vec![ProvisionRequest::Retire {
            digest: d("abc123")
        }]
    );
}

#[tokio::test]
async fn test_store_read_failure_is_fatal() {
    let h = harness();
    h.store.fail_reads(true);

    let err = h
        .runner
        .run_pass(&h.pool, &spec("ami-a"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, PassError::StateStore(StateStoreError::Backend(_))));
    assert_eq!(h.store.write_count(), 0);
    assert!(h.provisioner.calls().is_empty());
}

#[tokio::test]
async fn test_store_write_failure_is_fatal() {
    let h = harness();
    h.store.fail_writes(true);

    let err = h
        .runner
        .run_pass(&h.pool, &spec("ami-a"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, PassError::StateStore(_)));
    assert!(h.provisioner.calls().is_empty());

    h.store.fail_writes(false);
    assert_eq!(h.active().await, None);
}

#[tokio::test]
async fn test_invalid_spec_aborts_before_store() {
    let h = harness();
    h.store.fail_reads(true);
    let mut bad = spec("ami-a");
    bad.disk_size_gb = 0;

    let err = h.runner.run_pass(&h.pool, &bad, false).await.unwrap_err();

    assert!(matches!(err, PassError::Config(_)));
}

#[tokio::test]
async fn test_corrupt_state_is_fatal() {
    let h = harness();
    h.seed(Some("not-a-digest"), None).await;

    let err = h
        .runner
        .run_pass(&h.pool, &spec("ami-a"), false)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PassError::StateStore(StateStoreError::Corrupt { .. })
    ));
    assert!(h.provisioner.calls().is_empty());
}

#[tokio::test]
async fn test_candidate_equal_to_active_is_cleared() {
    let h = harness();
    let desired = digest(&spec("ami-a")).unwrap();
    h.seed(Some(desired.as_str()), Some(desired.as_str())).await;

    let report = h.runner.run_pass(&h.pool, &spec("ami-a"), false).await.unwrap();

    assert_eq!(report.phase, Phase::Stable);
    assert_eq!(h.candidate().await, None);
    assert!(h.provisioner.calls().is_empty());
}

#[tokio::test]
async fn test_lease_held_by_other_holder() {
    let h = harness();
    let other = HolderId::new();
    let outcome = h
        .store
        .try_acquire_lease(h.keys.lease(), other, Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(outcome, LeaseOutcome::Acquired);

    let err = h
        .runner
        .run_pass(&h.pool, &spec("ami-a"), false)
        .await
        .unwrap_err();

    assert!(matches!(err, PassError::LeaseHeld { holder, .. } if holder == other.to_string()));
    assert_eq!(h.store.write_count(), 0);

    // The runner released nothing it did not own; after the other holder
    // lets go, the pass goes through.
    h.store.release_lease(h.keys.lease(), other).await.unwrap();
    let report = h.runner.run_pass(&h.pool, &spec("ami-a"), false).await.unwrap();
    assert_eq!(report.outcome(), ActionKind::Bootstrap);
}

#[tokio::test]
async fn test_lease_released_after_pass() {
    let h = harness();
    h.runner.run_pass(&h.pool, &spec("ami-a"), false).await.unwrap();

    let outcome = h
        .store
        .try_acquire_lease(h.keys.lease(), HolderId::new(), Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(outcome, LeaseOutcome::Acquired);
}

#[tokio::test]
async fn test_bridge_failure_reported() {
    let h = harness();
    h.seed(Some("abc123"), None).await;
    h.bridge.set_failing(true);

    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();

    assert_eq!(report.outcome(), ActionKind::CandidateCreated);
    assert!(matches!(report.issue, Some(SideEffectError::Bridge(_))));
    // Provisioning went through; only the bridge is retried.
    assert_eq!(h.pending().await, None);

    h.bridge.set_failing(false);
    let report = h.runner.run_pass(&h.pool, &spec("ami-b"), false).await.unwrap();
    assert!(report.issue.is_none());
    assert_eq!(h.bridge.requests().len(), 2);
}

/// Provisioner that never answers.
struct StuckProvisioner;

#[async_trait]
impl PoolProvisioner for StuckProvisioner {
    async fn ensure_pool(
        &self,
        _record: &PoolRecord,
        _spec: &NodePoolSpec,
    ) -> Result<PoolHandle, ProvisionError> {
        std::future::pending().await
    }

    async fn retire_pool(&self, _handle: &PoolHandle) -> Result<(), ProvisionError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_provisioner_timeout_reported() {
    let store = Arc::new(InMemoryStateStore::new());
    let mut settings = settings();
    settings.call_timeout = Duration::from_millis(50);
    let runner = PassRunner::new(
        settings,
        store.clone(),
        Arc::new(StuckProvisioner),
        Arc::new(RecordingBridge::new()),
    );
    let pool = PoolName::parse("workers").unwrap();

    let report = runner.run_pass(&pool, &spec("ami-a"), false).await.unwrap();

    assert_eq!(report.outcome(), ActionKind::Bootstrap);
    assert!(matches!(
        report.issue,
        Some(SideEffectError::Provision(ProvisionError::Timeout { op: "ensure_pool", .. }))
    ));
}

#[tokio::test]
async fn test_report_serializes() {
    let h = harness();
    let report = h.runner.run_pass(&h.pool, &spec("ami-a"), false).await.unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["pool"], "workers");
    assert_eq!(json["action"]["kind"], "bootstrap");
    assert_eq!(json["phase"], "stable");
    assert_eq!(json["active"]["role"], "active");
    assert!(json["issue"].is_null());
}
