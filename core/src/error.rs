//! Error types shared by the store backends and the fetch strategies.

use crate::partition::IdRange;
use std::time::Duration;
use thiserror::Error as ThisError;

/// A single storage operation failed.
#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("sql error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Raised by test and wrapper stores that simulate a failing query.
    #[error("injected failure: {reason}")]
    Injected { reason: String },
}

/// A fetch strategy could not produce a complete result set.
#[derive(Debug, ThisError)]
pub enum FetchError {
    #[error("bucket size must be greater than zero")]
    InvalidBucketSize,

    #[error("partition {index} covering {range} failed: {source}")]
    Partition {
        index: usize,
        range: IdRange,
        #[source]
        source: StoreError,
    },

    #[error("bulk fetch failed: {0}")]
    Bulk(#[source] StoreError),

    #[error("deadline of {deadline:?} exceeded after merging {received} of {expected} partitions")]
    DeadlineExceeded {
        deadline: Duration,
        received: usize,
        expected: usize,
    },

    #[error("partition {index} covering {range} panicked after {received} of {expected} partitions merged")]
    PartitionPanicked {
        index: usize,
        range: IdRange,
        received: usize,
        expected: usize,
    },

    #[error("result channel closed after {received} of {expected} partitions")]
    ChannelClosed { received: usize, expected: usize },
}

impl FetchError {
    /// Index of the partition that caused the failure, if one did.
    pub fn partition_index(&self) -> Option<usize> {
        match self {
            Self::Partition { index, .. } | Self::PartitionPanicked { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// The populator stopped before inserting every row.
#[derive(Debug, ThisError)]
pub enum PopulateError {
    #[error("could not create table: {0}")]
    Schema(#[source] StoreError),

    #[error("insert {index} failed: {source}")]
    Insert {
        index: u64,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
