//! In-memory state store for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bgpool_id::HolderId;

use super::{now_millis, ttl_millis, LeaseOutcome, ParamWrite, StateStore, StateStoreError};

#[derive(Default)]
struct Inner {
    params: BTreeMap<String, String>,
    leases: HashMap<String, (String, i64)>,
}

/// In-memory state store.
///
/// Can be told to fail reads or writes so tests can exercise the fail-closed
/// paths of a pass.
#[derive(Default)]
pub struct InMemoryStateStore {
    inner: Mutex<Inner>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful parameter writes (each batch counts once).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot of all parameters.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner
            .lock()
            .map(|inner| inner.params.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StateStoreError> {
        self.inner.lock().map_err(|_| StateStoreError::Lock)
    }

    fn check_write(&self) -> Result<(), StateStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StateStoreError::Backend("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StateStoreError::Backend("injected read failure".to_string()));
        }
        Ok(self.lock()?.params.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        self.check_write()?;
        self.lock()?.params.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        self.check_write()?;
        self.lock()?.params.remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn write_batch(&self, writes: &[ParamWrite]) -> Result<(), StateStoreError> {
        self.check_write()?;
        let mut inner = self.lock()?;
        for write in writes {
            match &write.value {
                Some(value) => {
                    inner.params.insert(write.key.clone(), value.clone());
                }
                None => {
                    inner.params.remove(&write.key);
                }
            }
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: HolderId,
        ttl: Duration,
    ) -> Result<LeaseOutcome, StateStoreError> {
        let now = now_millis();
        let holder = holder.to_string();
        let mut inner = self.lock()?;

        if let Some((current, expires_at)) = inner.leases.get(name) {
            if *current != holder && *expires_at > now {
                return Ok(LeaseOutcome::Held {
                    holder: current.clone(),
                });
            }
        }

        inner.leases.insert(
            name.to_string(),
            (holder, now.saturating_add(ttl_millis(ttl))),
        );
        Ok(LeaseOutcome::Acquired)
    }

    async fn release_lease(&self, name: &str, holder: HolderId) -> Result<(), StateStoreError> {
        let holder = holder.to_string();
        let mut inner = self.lock()?;
        if inner
            .leases
            .get(name)
            .is_some_and(|(current, _)| *current == holder)
        {
            inner.leases.remove(name);
        }
        Ok(())
    }
}
