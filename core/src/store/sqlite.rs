//! SQLite backend over a `sqlx` connection pool.
//!
//! A `:memory:` database lives inside a single connection, so in-memory pools
//! are pinned to exactly one connection that is never recycled. Concurrent
//! callers then queue on that connection instead of each seeing an empty
//! database of their own.

use super::{RecordStore, sql_bound};
use crate::config::PoolSettings;
use crate::error::StoreError;
use crate::partition::IdRange;
use crate::record::{PlaceholderRow, Record};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

pub const IN_MEMORY: &str = ":memory:";

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    created_at DATETIME NULL,
    updated_at DATETIME NULL,
    deleted_at DATETIME NULL
)";

const CREATE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_records_deleted_at ON records (deleted_at)";

const INSERT_ROW: &str =
    "INSERT INTO records (created_at, updated_at, deleted_at) VALUES (?, ?, ?)";

const COUNT_LIVE: &str = "SELECT COUNT(*) FROM records WHERE deleted_at IS NULL";

const SELECT_IDS: &str = "SELECT id FROM records WHERE deleted_at IS NULL LIMIT ?";

const SELECT_ID_RANGE: &str =
    "SELECT id FROM records WHERE id >= ? AND id < ? AND deleted_at IS NULL";

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(path: &str, pool: &PoolSettings) -> Result<Self, StoreError> {
        if path == IN_MEMORY {
            return Self::in_memory().await;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(pool.max_connections)
            .acquire_timeout(pool.acquire_timeout)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// A fresh private in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl RecordStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query(CREATE_TABLE).execute(&mut *conn).await?;
        sqlx::query(CREATE_INDEX).execute(&mut *conn).await?;
        Ok(())
    }

    async fn insert_placeholder(&self, row: &PlaceholderRow) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(INSERT_ROW)
            .bind(row.created_at)
            .bind(row.updated_at)
            .bind(row.deleted_at)
            .execute(&mut *conn)
            .await?;
        Ok(result.last_insert_rowid().max(0) as u64)
    }

    async fn count_live(&self) -> Result<u64, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let count: i64 = sqlx::query_scalar(COUNT_LIVE)
            .fetch_one(&mut *conn)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_ids(&self, limit: u64) -> Result<Vec<Record>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let ids: Vec<i64> = sqlx::query_scalar(SELECT_IDS)
            .bind(sql_bound(limit))
            .fetch_all(&mut *conn)
            .await?;
        Ok(to_records(ids))
    }

    async fn fetch_id_range(&self, range: IdRange) -> Result<Vec<Record>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let ids: Vec<i64> = sqlx::query_scalar(SELECT_ID_RANGE)
            .bind(sql_bound(range.begin))
            .bind(sql_bound(range.end))
            .fetch_all(&mut *conn)
            .await?;
        Ok(to_records(ids))
    }
}

fn to_records(ids: Vec<i64>) -> Vec<Record> {
    ids.into_iter()
        .map(|id| Record::new(id.max(0) as u64))
        .collect()
}
