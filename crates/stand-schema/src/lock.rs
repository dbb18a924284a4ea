//! Cross-process migration lock.
//!
//! The lock is one row in `<prefix>schema_lock`, taken with a single
//! atomic upsert: the row is inserted, or overwritten only when the
//! previous holder's lease has expired. Each holder carries a random owner
//! token and release deletes the row only if the token still matches.
//!
//! A holder renews its lease before each step of a long run and before it
//! writes the schema version. Waiters keep polling while the lease is live,
//! so a slow but healthy run is never taken over.

use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SchemaConfig;
use crate::dialect::{MigrationDialect, SqliteDialect};
use crate::error::{Result, SchemaError};

/// The named migration lock.
#[derive(Debug, Clone)]
pub struct MigrationLock {
    pool: SqlitePool,
    table: String,
    name: String,
    ttl: Duration,
    wait: Option<Duration>,
    poll: Duration,
    clock: Arc<dyn Clock>,
}

/// A held lock. Call [`LockGuard::release`] when done.
#[derive(Debug)]
#[must_use = "the lock stays held until released or expired"]
pub struct LockGuard {
    pool: SqlitePool,
    table: String,
    name: String,
    owner: String,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl MigrationLock {
    /// Creates the lock described by `config`.
    pub fn new(pool: SqlitePool, config: &SchemaConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            table: config.lock_table(),
            name: config.lock_name.clone(),
            ttl: config.lock_ttl(),
            wait: config.lock_wait(),
            poll: config.lock_poll(),
            clock,
        }
    }

    /// Ensures the lock table exists.
    pub async fn ensure_table(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  \
             name TEXT PRIMARY KEY NOT NULL,\n  \
             owner TEXT NOT NULL,\n  \
             acquired_at INTEGER NOT NULL,\n  \
             expires_at INTEGER NOT NULL\n)",
            quoted(&self.table)
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }

    /// Makes one attempt to take the lock.
    pub async fn try_acquire(&self) -> Result<Option<LockGuard>> {
        let owner = Uuid::new_v4().to_string();
        let now = self.clock.now().timestamp_millis();
        let ttl = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl);

        let table = quoted(&self.table);
        let sql = format!(
            "INSERT INTO {table} (name, owner, acquired_at, expires_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(name) DO UPDATE SET \
             owner = excluded.owner, \
             acquired_at = excluded.acquired_at, \
             expires_at = excluded.expires_at \
             WHERE {table}.expires_at <= excluded.acquired_at"
        );
        let result = sqlx::query(&sql)
            .bind(&self.name)
            .bind(&owner)
            .bind(now)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        debug!(lock = %self.name, owner = %owner, "Migration lock acquired");
        Ok(Some(LockGuard {
            pool: self.pool.clone(),
            table: self.table.clone(),
            name: self.name.clone(),
            owner,
            ttl_ms: ttl,
            clock: self.clock.clone(),
        }))
    }

    /// Takes the lock, polling while another holder's lease is live.
    ///
    /// Without a configured wait this returns only once the holder releases
    /// or stops renewing. With one, [`SchemaError::LockTimeout`] ends the wait.
    pub async fn acquire(&self) -> Result<LockGuard> {
        let started = tokio::time::Instant::now();
        let mut reported = false;
        loop {
            if let Some(guard) = self.try_acquire().await? {
                return Ok(guard);
            }
            if !reported {
                let holder = self.holder().await?.unwrap_or_default();
                warn!(lock = %self.name, holder = %holder, "Migration lock busy, waiting");
                reported = true;
            }
            if let Some(wait) = self.wait {
                if started.elapsed() >= wait {
                    return Err(SchemaError::LockTimeout {
                        name: self.name.clone(),
                        waited: wait,
                    });
                }
            }
            tokio::time::sleep(self.poll).await;
        }
    }

    /// Returns the current owner token, if any row is present.
    pub async fn holder(&self) -> Result<Option<String>> {
        let sql = format!("SELECT owner FROM {} WHERE name = ?", quoted(&self.table));
        let owner: Option<String> = sqlx::query_scalar(&sql)
            .bind(&self.name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(owner)
    }
}

impl LockGuard {
    /// Returns this holder's owner token.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Extends the lease by the TTL from now. Fails with
    /// [`SchemaError::LockLost`] once another worker owns the row.
    pub async fn renew(&self) -> Result<()> {
        let expires_at = self
            .clock
            .now()
            .timestamp_millis()
            .saturating_add(self.ttl_ms);
        let sql = format!(
            "UPDATE {} SET expires_at = ? WHERE name = ? AND owner = ?",
            quoted(&self.table)
        );
        let result = sqlx::query(&sql)
            .bind(expires_at)
            .bind(&self.name)
            .bind(&self.owner)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(lock = %self.name, owner = %self.owner, "Migration lock lost");
            return Err(SchemaError::LockLost {
                name: self.name.clone(),
            });
        }
        debug!(lock = %self.name, owner = %self.owner, "Migration lock renewed");
        Ok(())
    }

    /// Releases the lock. Returns false if another holder took it over.
    pub async fn release(self) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE name = ? AND owner = ?",
            quoted(&self.table)
        );
        let result = sqlx::query(&sql)
            .bind(&self.name)
            .bind(&self.owner)
            .execute(&self.pool)
            .await?;

        let released = result.rows_affected() > 0;
        if released {
            debug!(lock = %self.name, owner = %self.owner, "Migration lock released");
        } else {
            warn!(lock = %self.name, owner = %self.owner, "Migration lock was taken over before release");
        }
        Ok(released)
    }
}

fn quoted(table: &str) -> String {
    SqliteDialect::new().quote_identifier(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{TimeZone, Utc};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    fn config() -> SchemaConfig {
        SchemaConfig::new("1.0.0").table_prefix("ts_").lock_timing(
            Duration::from_secs(60),
            Duration::from_secs(1),
            Duration::from_millis(20),
        )
    }

    async fn lock_with_clock() -> (MigrationLock, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
        ));
        let lock = MigrationLock::new(create_test_pool().await, &config(), clock.clone());
        lock.ensure_table().await.unwrap();
        (lock, clock)
    }

    #[tokio::test]
    async fn test_second_attempt_fails_while_held() {
        let (lock, _) = lock_with_clock().await;
        let guard = lock.try_acquire().await.unwrap().unwrap();
        assert!(lock.try_acquire().await.unwrap().is_none());
        assert_eq!(lock.holder().await.unwrap().as_deref(), Some(guard.owner()));

        assert!(guard.release().await.unwrap());
        assert!(lock.holder().await.unwrap().is_none());
        assert!(lock.try_acquire().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let (lock, clock) = lock_with_clock().await;
        let stale = lock.try_acquire().await.unwrap().unwrap();

        clock.advance(chrono::Duration::seconds(59));
        assert!(lock.try_acquire().await.unwrap().is_none());

        clock.advance(chrono::Duration::seconds(2));
        let fresh = lock.try_acquire().await.unwrap().unwrap();
        assert_ne!(fresh.owner(), stale.owner());

        // The stale holder must not remove the new holder's row
        assert!(!stale.release().await.unwrap());
        assert_eq!(lock.holder().await.unwrap().as_deref(), Some(fresh.owner()));
    }

    #[tokio::test]
    async fn test_renewed_lease_is_not_taken_over() {
        let (lock, clock) = lock_with_clock().await;
        let guard = lock.try_acquire().await.unwrap().unwrap();

        clock.advance(chrono::Duration::seconds(50));
        guard.renew().await.unwrap();
        clock.advance(chrono::Duration::seconds(50));
        assert!(lock.try_acquire().await.unwrap().is_none());

        clock.advance(chrono::Duration::seconds(11));
        let next = lock.try_acquire().await.unwrap().unwrap();
        let err = guard.renew().await.unwrap_err();
        assert!(matches!(err, SchemaError::LockLost { .. }));
        assert!(err.is_schema_incomplete());
        assert_eq!(lock.holder().await.unwrap().as_deref(), Some(next.owner()));
    }

    #[tokio::test]
    async fn test_unbounded_wait_ends_when_lease_expires() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap(),
        ));
        let config = SchemaConfig {
            lock_wait_secs: None,
            ..config()
        };
        let lock = MigrationLock::new(create_test_pool().await, &config, clock.clone());
        lock.ensure_table().await.unwrap();
        let stalled = lock.try_acquire().await.unwrap().unwrap();

        let expire = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            clock.advance(chrono::Duration::seconds(61));
        };
        let (acquired, ()) = tokio::join!(lock.acquire(), expire);
        let guard = acquired.unwrap();
        assert_ne!(guard.owner(), stalled.owner());
    }

    #[tokio::test]
    async fn test_acquire_times_out() {
        let (lock, _) = lock_with_clock().await;
        let _held = lock.try_acquire().await.unwrap().unwrap();

        let err = lock.acquire().await.unwrap_err();
        assert!(matches!(err, SchemaError::LockTimeout { .. }));
        assert!(err.is_schema_incomplete());
    }
}
