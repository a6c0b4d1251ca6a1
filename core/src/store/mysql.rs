//! MySQL backend over a `sqlx` connection pool.

use super::{RecordStore, sql_bound};
use crate::config::{MySqlTarget, PoolSettings};
use crate::error::StoreError;
use crate::partition::IdRange;
use crate::record::{PlaceholderRow, Record};
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS records (
    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT,
    created_at DATETIME NULL,
    updated_at DATETIME NULL,
    deleted_at DATETIME NULL,
    PRIMARY KEY (id),
    INDEX idx_records_deleted_at (deleted_at)
)";

const INSERT_ROW: &str =
    "INSERT INTO records (created_at, updated_at, deleted_at) VALUES (?, ?, ?)";

const COUNT_LIVE: &str = "SELECT COUNT(*) FROM records WHERE deleted_at IS NULL";

const SELECT_IDS: &str = "SELECT id FROM records WHERE deleted_at IS NULL LIMIT ?";

const SELECT_ID_RANGE: &str =
    "SELECT id FROM records WHERE id >= ? AND id < ? AND deleted_at IS NULL";

#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Build the pool and open its first connection, so an unreachable
    /// server is reported before any work starts.
    pub async fn connect(target: &MySqlTarget, pool: &PoolSettings) -> Result<Self, StoreError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(pool.max_connections)
            .acquire_timeout(pool.acquire_timeout)
            .connect_with(connect_options(target))
            .await?;
        Ok(Self { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn connect_options(target: &MySqlTarget) -> MySqlConnectOptions {
    let options = MySqlConnectOptions::new()
        .host(&target.host)
        .port(target.port)
        .username(&target.user)
        .database(&target.database)
        .charset(&target.charset)
        .timezone(Some(target.time_zone.clone()));
    if target.password.is_empty() {
        options
    } else {
        options.password(&target.password)
    }
}

impl RecordStore for MySqlStore {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query(CREATE_TABLE).execute(&mut *conn).await?;
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
        Ok(result.last_insert_id())
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
        let ids: Vec<u64> = sqlx::query_scalar(SELECT_IDS)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?;
        Ok(ids.into_iter().map(Record::new).collect())
    }

    async fn fetch_id_range(&self, range: IdRange) -> Result<Vec<Record>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let ids: Vec<u64> = sqlx::query_scalar(SELECT_ID_RANGE)
            .bind(sql_bound(range.begin))
            .bind(sql_bound(range.end))
            .fetch_all(&mut *conn)
            .await?;
        Ok(ids.into_iter().map(Record::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_options_carry_the_target() {
        let target = MySqlTarget {
            host: "db.internal".to_string(),
            port: 3306,
            database: "bench".to_string(),
            ..MySqlTarget::default()
        };
        let options = connect_options(&target);
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 3306);
        assert_eq!(options.get_database(), Some("bench"));
        assert_eq!(options.get_charset(), "utf8mb4");
    }

    #[test]
    fn range_query_is_half_open_on_id() {
        assert!(SELECT_ID_RANGE.contains("id >= ? AND id < ?"));
        assert!(SELECT_ID_RANGE.starts_with("SELECT id FROM records"));
    }
}
