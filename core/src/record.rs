//! Row types for the `records` table.

use chrono::{NaiveDateTime, Utc};

/// Name of the single table both tools operate on.
pub const TABLE_NAME: &str = "records";

/// First id handed out by the storage engine's auto-increment counter.
pub const FIRST_ID: u64 = 1;

/// The identifier projection every fetch strategy reads back.
///
/// Only the `id` column is selected; the audit timestamps stay in the
/// database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Record {
    pub id: u64,
}

impl Record {
    pub fn new(id: u64) -> Self {
        Self { id }
    }
}

/// An empty placeholder row as written by the populator.
///
/// The id is not part of the row: the storage engine assigns it on insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderRow {
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    /// Soft-delete marker. Rows with a value here are invisible to every fetch.
    pub deleted_at: Option<NaiveDateTime>,
}

impl PlaceholderRow {
    /// A live row stamped with the current UTC time.
    pub fn now() -> Self {
        Self::at(Utc::now().naive_utc())
    }

    pub fn at(timestamp: NaiveDateTime) -> Self {
        Self {
            created_at: timestamp,
            updated_at: timestamp,
            deleted_at: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Collect the ids of a result set into ascending order.
///
/// Strategies make no ordering promise, so comparisons between them go
/// through this.
pub fn sorted_ids(records: &[Record]) -> Vec<u64> {
    let mut ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids
}
