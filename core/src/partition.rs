//! Splitting the id space `[1, N]` into fixed-size, non-overlapping buckets.
//!
//! | N         | B       | K  | ranges                                        |
//! |-----------|---------|----|-----------------------------------------------|
//! | 1,000,000 | 100,000 | 10 | `[1,100001)`, `[100001,200001)`, ... `[900001,1000001)` |
//! | 0         | any     | 0  | none                                          |
//! | 10        | 4       | 3  | `[1,5)`, `[5,9)`, `[9,13)`                     |
//!
//! When `B` does not divide `N` the last bucket runs past `N + 1`. That is
//! harmless for a half-open range query because no ids exist beyond `N`, so
//! the plan keeps the extra width and only reports it via
//! [`PartitionPlan::has_remainder`].

use crate::error::FetchError;
use crate::record::FIRST_ID;
use std::fmt;

/// Half-open id interval `[begin, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdRange {
    pub begin: u64,
    pub end: u64,
}

impl IdRange {
    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    pub fn contains(&self, id: u64) -> bool {
        id >= self.begin && id < self.end
    }

    pub fn width(&self) -> u64 {
        self.end.saturating_sub(self.begin)
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// One bucket of the plan, tagged with its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub index: usize,
    pub range: IdRange,
}

/// The bucket layout for a fetch of `total` rows in buckets of `bucket_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPlan {
    total: u64,
    bucket_size: u64,
}

impl PartitionPlan {
    pub fn new(total: u64, bucket_size: u64) -> Result<Self, FetchError> {
        if bucket_size == 0 {
            return Err(FetchError::InvalidBucketSize);
        }
        Ok(Self { total, bucket_size })
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn bucket_size(&self) -> u64 {
        self.bucket_size
    }

    /// `K = ceil(N / B)`.
    pub fn len(&self) -> usize {
        self.total.div_ceil(self.bucket_size) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// True when the final bucket extends beyond id `N`.
    pub fn has_remainder(&self) -> bool {
        self.total % self.bucket_size != 0
    }

    /// The id span covered by all buckets together.
    pub fn span(&self) -> IdRange {
        let end = FIRST_ID + self.len() as u64 * self.bucket_size;
        IdRange::new(FIRST_ID, end)
    }

    pub fn partition(&self, index: usize) -> Option<Partition> {
        if index >= self.len() {
            return None;
        }
        let begin = FIRST_ID + index as u64 * self.bucket_size;
        Some(Partition {
            index,
            range: IdRange::new(begin, begin + self.bucket_size),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Partition> + '_ {
        (0..self.len()).filter_map(move |index| self.partition(index))
    }
}
