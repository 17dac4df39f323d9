//! SQLite-backed state store.
//!
//! An embedded stand-in for a distributed parameter store: one file per
//! controller deployment, shared by every process that opens it. Batches run
//! in a single transaction, and leases are rows with an expiry so a crashed
//! holder cannot wedge a pool.
//!
//! rusqlite is synchronous. Trait calls run on the blocking pool, so a caller
//! timing out is not stuck behind a busy database.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bgpool_id::HolderId;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{now_millis, ttl_millis, LeaseOutcome, ParamWrite, StateStore, StateStoreError};

/// SQLite state store.
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStateStore {
    /// Open or create a state store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateStoreError> {
        let conn = Connection::open(path)?;

        // WAL lets readers (e.g. `bgpoolctl status`) run beside the controller.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StateStoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StateStoreError> {
        self.conn.lock().map_err(|_| StateStoreError::Lock)
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StateStoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StateStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StateStoreError::Lock)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StateStoreError::Backend(format!("store task failed: {e}")))?
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), StateStoreError> {
        self.conn()?.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS parameters (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS leases (
                name TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            );
            "#,
        )?;

        debug!("State store schema initialized");
        Ok(())
    }

    /// List every parameter under `prefix`, ordered by key.
    pub fn list(&self, prefix: &str) -> Result<Vec<(String, String)>, StateStoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT key, value FROM parameters WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;

        let rows = stmt
            .query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

fn upsert(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        INSERT INTO parameters (key, value, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
        params![key, value, chrono::Utc::now().timestamp()],
    )
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateStoreError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM parameters WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateStoreError> {
        let (key, value) = (key.to_string(), value.to_string());
        self.with_conn(move |conn| {
            upsert(conn, &key, &value)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StateStoreError> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM parameters WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }

    async fn write_batch(&self, writes: &[ParamWrite]) -> Result<(), StateStoreError> {
        let writes = writes.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            for write in &writes {
                match &write.value {
                    Some(value) => {
                        upsert(&tx, &write.key, value)?;
                    }
                    None => {
                        tx.execute("DELETE FROM parameters WHERE key = ?1", params![write.key])?;
                    }
                }
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn try_acquire_lease(
        &self,
        name: &str,
        holder: HolderId,
        ttl: Duration,
    ) -> Result<LeaseOutcome, StateStoreError> {
        let now = now_millis();
        let expires_at = now.saturating_add(ttl_millis(ttl));
        let (name, holder) = (name.to_string(), holder.to_string());

        self.with_conn(move |conn| {
            // Insert, or take over when expired or already ours. The row is
            // only touched when one of those holds, so `changed == 0` means it
            // is held.
            let changed = conn.execute(
                r#"
                INSERT INTO leases (name, holder, expires_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(name) DO UPDATE SET
                    holder = excluded.holder,
                    expires_at = excluded.expires_at
                WHERE leases.expires_at <= ?4 OR leases.holder = excluded.holder
                "#,
                params![name, holder, expires_at, now],
            )?;

            if changed > 0 {
                return Ok(LeaseOutcome::Acquired);
            }

            let current: String = conn.query_row(
                "SELECT holder FROM leases WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )?;
            Ok(LeaseOutcome::Held { holder: current })
        })
        .await
    }

    async fn release_lease(&self, name: &str, holder: HolderId) -> Result<(), StateStoreError> {
        let (name, holder) = (name.to_string(), holder.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM leases WHERE name = ?1 AND holder = ?2",
                params![name, holder],
            )?;
            Ok(())
        })
        .await
    }
}
