//! Account storage
//!
//! SQLite persistence for [`AccountRecord`]s. Every read-modify-write runs
//! inside a [`UnitOfWork`], a transaction that is rolled back when dropped
//! without a commit, so the pooled connection is returned on every exit
//! path including early returns and errors.
//!
//! SQLite allows one writer at a time and fails a read transaction that
//! tries to upgrade while another writer is active. Units of work on one
//! store are therefore queued behind a writer lock instead of overlapping.
//!
//! # Usage
//! ```no_run
//! use account_rs::config::StorageConfig;
//! use account_rs::storage::AccountStore;
//!
//! # async fn example() -> account_rs::Result<()> {
//! let store = AccountStore::open(&StorageConfig::in_memory()).await?;
//!
//! let mut uow = store.begin().await?;
//! if let Some(mut record) = uow.find_by_identity("wxid_42").await? {
//!     record.remark = "vip".to_string();
//!     uow.upsert(&record).await?;
//! }
//! uow.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod registry;

pub use registry::StoreRegistry;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::account::AccountRecord;
use crate::config::StorageConfig;
use crate::error::{AccountError, Result};

/// How long a connection waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "SELECT identity, display_name, created_at, expires_at, active, \
     free_quota_remaining, quota_reset_at, remark FROM accounts";

/// Handle to the account database
///
/// Cloning is cheap and shares the underlying pool.
#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
    location: String,
    writer: Arc<Mutex<()>>,
}

impl AccountStore {
    /// Open (creating if needed) the database described by `config`.
    pub async fn open(config: &StorageConfig) -> Result<Self> {
        let url = config.database_url();
        let mut options = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);

        let mut pool_options = SqlitePoolOptions::new().max_connections(config.pool_size());
        if config.is_memory() {
            // The database lives only as long as its connection
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        } else {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = pool_options.connect_with(options).await?;
        let store = Self {
            pool,
            location: config.database_path.clone(),
            writer: Arc::new(Mutex::new(())),
        };
        store.init_db().await?;

        info!("Account store opened at {}", store.location);
        Ok(store)
    }

    /// Initialize database tables
    async fn init_db(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                identity TEXT PRIMARY KEY,
                display_name TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                expires_at TEXT,
                active INTEGER NOT NULL DEFAULT 0,
                free_quota_remaining INTEGER NOT NULL DEFAULT 0,
                quota_reset_at TEXT,
                remark TEXT NOT NULL DEFAULT ''
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Where the store was opened from, as configured.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Start a unit of work.
    ///
    /// Waits until no other unit of work on this store is open.
    pub async fn begin(&self) -> Result<UnitOfWork> {
        let writer = Arc::clone(&self.writer).lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(UnitOfWork {
            tx,
            _writer: writer,
        })
    }

    /// Exact lookup, no side effects.
    pub async fn find_by_identity(&self, identity: &str) -> Result<Option<AccountRecord>> {
        fetch_record(&self.pool, identity).await
    }

    /// Insert or replace a record in its own unit of work.
    pub async fn upsert(&self, record: &AccountRecord) -> Result<()> {
        let mut uow = self.begin().await?;
        uow.upsert(record).await?;
        uow.commit().await
    }

    /// Delete a record in its own unit of work.
    pub async fn delete(&self, identity: &str) -> Result<bool> {
        let mut uow = self.begin().await?;
        let deleted = uow.delete(identity).await?;
        uow.commit().await?;
        Ok(deleted)
    }

    /// Snapshot of every record.
    pub async fn list_all(&self) -> Result<Vec<AccountRecord>> {
        fetch_all_records(&self.pool).await
    }

    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Health check - verify database connectivity
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// A scoped storage session
///
/// Changes become visible to other sessions only after [`commit`](Self::commit).
/// Dropping an uncommitted unit rolls it back.
pub struct UnitOfWork {
    // Dropped before the writer guard, so the rollback is queued first
    tx: Transaction<'static, Sqlite>,
    _writer: OwnedMutexGuard<()>,
}

impl UnitOfWork {
    pub async fn find_by_identity(&mut self, identity: &str) -> Result<Option<AccountRecord>> {
        fetch_record(&mut *self.tx, identity).await
    }

    /// Insert if absent, otherwise replace every mutable field.
    ///
    /// `identity` and `created_at` are never changed on an existing row.
    pub async fn upsert(&mut self, record: &AccountRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                identity, display_name, created_at, expires_at, active,
                free_quota_remaining, quota_reset_at, remark
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(identity) DO UPDATE SET
                display_name = excluded.display_name,
                expires_at = excluded.expires_at,
                active = excluded.active,
                free_quota_remaining = excluded.free_quota_remaining,
                quota_reset_at = excluded.quota_reset_at,
                remark = excluded.remark
            "#,
        )
        .bind(&record.identity)
        .bind(&record.display_name)
        .bind(encode_timestamp(&record.created_at))
        .bind(record.expires_at.as_ref().map(encode_timestamp))
        .bind(record.active)
        .bind(i64::from(record.free_quota_remaining))
        .bind(record.quota_reset_at.as_ref().map(encode_timestamp))
        .bind(&record.remark)
        .execute(&mut *self.tx)
        .await?;

        debug!("Upserted account {}", record.identity);
        Ok(())
    }

    /// Insert `record` unless its identity already exists.
    ///
    /// Returns whether a row was created. As the first statement of a unit
    /// of work it takes the database write lock up front, waiting out other
    /// writers rather than failing on a later upgrade.
    pub async fn insert_if_absent(&mut self, record: &AccountRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (
                identity, display_name, created_at, expires_at, active,
                free_quota_remaining, quota_reset_at, remark
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(identity) DO NOTHING
            "#,
        )
        .bind(&record.identity)
        .bind(&record.display_name)
        .bind(encode_timestamp(&record.created_at))
        .bind(record.expires_at.as_ref().map(encode_timestamp))
        .bind(record.active)
        .bind(i64::from(record.free_quota_remaining))
        .bind(record.quota_reset_at.as_ref().map(encode_timestamp))
        .bind(&record.remark)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns whether a row was removed.
    pub async fn delete(&mut self, identity: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM accounts WHERE identity = ?")
            .bind(identity)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_all(&mut self) -> Result<Vec<AccountRecord>> {
        fetch_all_records(&mut *self.tx).await
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

async fn fetch_record<'e, E>(executor: E, identity: &str) -> Result<Option<AccountRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("{} WHERE identity = ?", SELECT_COLUMNS);
    let row = sqlx::query(&query)
        .bind(identity)
        .fetch_optional(executor)
        .await?;

    debug!("Lookup {}: {}", identity, if row.is_some() { "hit" } else { "miss" });
    row.as_ref().map(record_from_row).transpose()
}

async fn fetch_all_records<'e, E>(executor: E) -> Result<Vec<AccountRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let query = format!("{} ORDER BY created_at, identity", SELECT_COLUMNS);
    let rows = sqlx::query(&query).fetch_all(executor).await?;
    rows.iter().map(record_from_row).collect()
}

fn record_from_row(row: &SqliteRow) -> Result<AccountRecord> {
    let identity: String = row.try_get("identity")?;
    let created_at: String = row.try_get("created_at")?;
    let expires_at: Option<String> = row.try_get("expires_at")?;
    let quota_reset_at: Option<String> = row.try_get("quota_reset_at")?;
    let remaining: i64 = row.try_get("free_quota_remaining")?;

    Ok(AccountRecord {
        display_name: row.try_get("display_name")?,
        created_at: decode_timestamp(&created_at)?,
        expires_at: expires_at.as_deref().map(decode_timestamp).transpose()?,
        active: row.try_get("active")?,
        free_quota_remaining: u32::try_from(remaining.max(0)).unwrap_or(u32::MAX),
        quota_reset_at: quota_reset_at.as_deref().map(decode_timestamp).transpose()?,
        remark: row.try_get("remark")?,
        identity,
    })
}

fn encode_timestamp(t: &DateTime<Local>) -> String {
    t.to_rfc3339()
}

/// Parse a stored timestamp.
///
/// Older databases hold naive `YYYY-MM-DD HH:MM:SS[.ffffff]` values, which
/// are taken to be local time.
fn decode_timestamp(raw: &str) -> Result<DateTime<Local>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Local));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| AccountError::Storage(format!("Invalid timestamp '{}': {}", raw, e)))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| AccountError::Storage(format!("Nonexistent local time '{}'", raw)))
}
