//! Process-local store used for dry runs and tests.
//!
//! Rows live in a `Vec` indexed by `id - 1`, behind an `RwLock` shared by
//! every clone of the handle, so ids are contiguous from 1 exactly like an
//! auto-increment column.

use super::RecordStore;
use crate::error::StoreError;
use crate::partition::IdRange;
use crate::record::{FIRST_ID, PlaceholderRow, Record, TABLE_NAME};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct MemoryTable {
    created: bool,
    rows: Vec<PlaceholderRow>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    table: Arc<RwLock<MemoryTable>>,
}

impl MemoryStore {
    /// An empty store whose table has not been created yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose table already holds `rows` live placeholder rows.
    pub fn seeded(rows: u64) -> Self {
        let row = PlaceholderRow::now();
        let table = MemoryTable {
            created: true,
            rows: (0..rows).map(|_| row.clone()).collect(),
        };
        Self {
            table: Arc::new(RwLock::new(table)),
        }
    }

    /// Soft-delete a row. Returns false when the id does not exist.
    pub fn mark_deleted(&self, id: u64) -> Result<bool, StoreError> {
        let mut table = self.write()?;
        let Some(row) = slot(id).and_then(|idx| table.rows.get_mut(idx)) else {
            return Ok(false);
        };
        row.deleted_at = Some(row.updated_at);
        Ok(true)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryTable>, StoreError> {
        let table = self
            .table
            .read()
            .map_err(|_| StoreError::Unavailable("memory table lock poisoned".to_string()))?;
        if !table.created {
            return Err(missing_table());
        }
        Ok(table)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryTable>, StoreError> {
        self.table
            .write()
            .map_err(|_| StoreError::Unavailable("memory table lock poisoned".to_string()))
    }
}

fn missing_table() -> StoreError {
    StoreError::Unavailable(format!("table {TABLE_NAME} does not exist"))
}

fn slot(id: u64) -> Option<usize> {
    id.checked_sub(FIRST_ID).map(|idx| idx as usize)
}

fn live_ids<'a>(
    rows: &'a [PlaceholderRow],
    first_id: u64,
) -> impl Iterator<Item = Record> + 'a {
    rows.iter()
        .zip(first_id..)
        .filter(|(row, _)| row.is_live())
        .map(|(_, id)| Record::new(id))
}

impl RecordStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.write()?.created = true;
        Ok(())
    }

    async fn insert_placeholder(&self, row: &PlaceholderRow) -> Result<u64, StoreError> {
        let mut table = self.write()?;
        if !table.created {
            return Err(missing_table());
        }
        table.rows.push(row.clone());
        Ok(table.rows.len() as u64)
    }

    async fn count_live(&self) -> Result<u64, StoreError> {
        let table = self.read()?;
        Ok(table.rows.iter().filter(|row| row.is_live()).count() as u64)
    }

    async fn fetch_ids(&self, limit: u64) -> Result<Vec<Record>, StoreError> {
        let table = self.read()?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(live_ids(&table.rows, FIRST_ID).take(limit).collect())
    }

    async fn fetch_id_range(&self, range: IdRange) -> Result<Vec<Record>, StoreError> {
        let table = self.read()?;
        let len = table.rows.len();
        let begin = range.begin.max(FIRST_ID);
        if range.end <= begin {
            return Ok(Vec::new());
        }
        let start = slot(begin).unwrap_or(0).min(len);
        let stop = slot(range.end).unwrap_or(0).min(len);
        Ok(live_ids(&table.rows[start..stop], begin).collect())
    }
}
