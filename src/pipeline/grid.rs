//! The canonical per-minute grid every dense table is aligned to.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::ops::Range;
use tracing::info;

use crate::error::{QosError, Result};
use crate::model::{PartitionKey, WEEK_MINUTES};

/// One minute of one (location, week) partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGridRow<'a> {
    pub location: &'a str,
    pub week_start: NaiveDate,
    pub x: usize,
}

/// Cross product of the observed partitions with minutes `0..10080`.
///
/// Rows are generated on demand; only the partition set is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeGrid {
    partitions: BTreeSet<PartitionKey>,
}

impl TimeGrid {
    /// The full minute range of a week.
    pub fn minutes() -> Range<usize> {
        0..WEEK_MINUTES
    }

    pub fn partitions(&self) -> impl Iterator<Item = &PartitionKey> {
        self.partitions.iter()
    }

    pub fn contains(&self, key: &PartitionKey) -> bool {
        self.partitions.contains(key)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Number of grid rows: 10080 per partition.
    pub fn len(&self) -> usize {
        self.partitions.len() * WEEK_MINUTES
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = TimeGridRow<'_>> {
        self.partitions.iter().flat_map(|key| {
            Self::minutes().map(move |x| TimeGridRow {
                location: key.location.as_str(),
                week_start: key.week_start,
                x,
            })
        })
    }
}

/// Builds the grid for the given (location, week) pairs.
pub fn build_time_grid<I>(keys: I) -> Result<TimeGrid>
where
    I: IntoIterator<Item = PartitionKey>,
{
    let partitions: BTreeSet<PartitionKey> = keys.into_iter().collect();
    if partitions.is_empty() {
        return Err(QosError::EmptyData("time grid partitions"));
    }

    let grid = TimeGrid { partitions };
    info!(
        partitions = grid.partition_count(),
        rows = grid.len(),
        "Time grid built"
    );
    Ok(grid)
}
