//! Storage seam for the `records` table.
//!
//! [`RecordStore`] is the only way the populator and the fetch strategies
//! touch storage. Each SQL backend owns a connection pool and checks out one
//! connection per call, returning it when the call finishes, so a cloned
//! store handle can be moved into every concurrent task.
//!
//! | Backend          | Pool                | Used for                        |
//! |------------------|---------------------|---------------------------------|
//! | [`MySqlStore`]   | `sqlx::MySqlPool`   | the real benchmark target       |
//! | [`SqliteStore`]  | `sqlx::SqlitePool`  | local files, in-memory fixtures |
//! | [`MemoryStore`]  | none (`RwLock`)     | dry runs and tests              |

pub mod memory;
pub mod mysql;
pub mod sqlite;

pub use memory::MemoryStore;
pub use mysql::MySqlStore;
pub use sqlite::SqliteStore;

use crate::config::{ConnectionTarget, PoolSettings};
use crate::error::StoreError;
use crate::partition::IdRange;
use crate::record::{PlaceholderRow, Record};
use std::future::Future;

/// Operations every backend provides over the `records` table.
///
/// Fetch operations only return live rows (`deleted_at IS NULL`) and only
/// project the `id` column.
pub trait RecordStore: Clone + Send + Sync + 'static {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Create the table and its `deleted_at` index if they are missing.
    fn ensure_schema(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert one row in its own round trip and return the assigned id.
    fn insert_placeholder(
        &self,
        row: &PlaceholderRow,
    ) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Number of live rows.
    fn count_live(&self) -> impl Future<Output = Result<u64, StoreError>> + Send;

    /// Up to `limit` live ids, in whatever order the backend yields them.
    fn fetch_ids(&self, limit: u64)
    -> impl Future<Output = Result<Vec<Record>, StoreError>> + Send;

    /// Live ids with `range.begin <= id < range.end`.
    fn fetch_id_range(
        &self,
        range: IdRange,
    ) -> impl Future<Output = Result<Vec<Record>, StoreError>> + Send;
}

/// A store picked at runtime from a [`ConnectionTarget`].
#[derive(Debug, Clone)]
pub enum AnyStore {
    MySql(MySqlStore),
    Sqlite(SqliteStore),
    Memory(MemoryStore),
}

impl AnyStore {
    /// Connect to `target`, building a pool sized by `pool`.
    pub async fn open(target: &ConnectionTarget, pool: &PoolSettings) -> Result<Self, StoreError> {
        let store = match target {
            ConnectionTarget::MySql(mysql) => Self::MySql(MySqlStore::connect(mysql, pool).await?),
            ConnectionTarget::Sqlite { path } => {
                Self::Sqlite(SqliteStore::connect(path, pool).await?)
            }
            ConnectionTarget::Memory => Self::Memory(MemoryStore::new()),
        };
        log::info!("Opened {} store at {target}", store.backend());
        Ok(store)
    }

    /// Close the underlying pool, waiting for checked-out connections.
    pub async fn close(&self) {
        match self {
            Self::MySql(store) => store.close().await,
            Self::Sqlite(store) => store.close().await,
            Self::Memory(_) => {}
        }
    }
}

impl RecordStore for AnyStore {
    fn backend(&self) -> &'static str {
        match self {
            Self::MySql(store) => store.backend(),
            Self::Sqlite(store) => store.backend(),
            Self::Memory(store) => store.backend(),
        }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        match self {
            Self::MySql(store) => store.ensure_schema().await,
            Self::Sqlite(store) => store.ensure_schema().await,
            Self::Memory(store) => store.ensure_schema().await,
        }
    }

    async fn insert_placeholder(&self, row: &PlaceholderRow) -> Result<u64, StoreError> {
        match self {
            Self::MySql(store) => store.insert_placeholder(row).await,
            Self::Sqlite(store) => store.insert_placeholder(row).await,
            Self::Memory(store) => store.insert_placeholder(row).await,
        }
    }

    async fn count_live(&self) -> Result<u64, StoreError> {
        match self {
            Self::MySql(store) => store.count_live().await,
            Self::Sqlite(store) => store.count_live().await,
            Self::Memory(store) => store.count_live().await,
        }
    }

    async fn fetch_ids(&self, limit: u64) -> Result<Vec<Record>, StoreError> {
        match self {
            Self::MySql(store) => store.fetch_ids(limit).await,
            Self::Sqlite(store) => store.fetch_ids(limit).await,
            Self::Memory(store) => store.fetch_ids(limit).await,
        }
    }

    async fn fetch_id_range(&self, range: IdRange) -> Result<Vec<Record>, StoreError> {
        match self {
            Self::MySql(store) => store.fetch_id_range(range).await,
            Self::Sqlite(store) => store.fetch_id_range(range).await,
            Self::Memory(store) => store.fetch_id_range(range).await,
        }
    }
}

/// Clamp an id bound into SQL's signed 64-bit integer domain.
pub(crate) fn sql_bound(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
