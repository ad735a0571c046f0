//! Per-minute fraction of a location's products that are in stock.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::{info, warn};

use crate::error::{QosError, Result};
use crate::model::{PartitionKey, WEEK_MINUTES};
use crate::pipeline::grid::TimeGrid;
use crate::pipeline::inventory::ProductInventory;

/// Dense availability ratio for every partition of the grid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AvailabilityTable {
    ratios: BTreeMap<PartitionKey, Vec<f64>>,
}

impl AvailabilityTable {
    /// Wraps precomputed per-partition ratios, checking the dense shape and range.
    pub fn from_ratios(ratios: BTreeMap<PartitionKey, Vec<f64>>) -> Result<Self> {
        let table = Self { ratios };
        table.check()?;
        Ok(table)
    }

    pub fn get(&self, key: &PartitionKey) -> Option<&[f64]> {
        self.ratios.get(key).map(Vec::as_slice)
    }

    pub fn ratio(&self, key: &PartitionKey, x: usize) -> Option<f64> {
        self.ratios.get(key).and_then(|r| r.get(x).copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartitionKey, &[f64])> {
        self.ratios.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Number of rows (minutes across all partitions).
    pub fn len(&self) -> usize {
        self.ratios.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    fn check(&self) -> Result<()> {
        for (key, ratios) in &self.ratios {
            if ratios.len() != WEEK_MINUTES {
                return Err(QosError::data_format(
                    "availability",
                    format!("partition {key} has {} minutes", ratios.len()),
                ));
            }
            if let Some((minute, &value)) = ratios
                .iter()
                .enumerate()
                .find(|&(_, &r)| !(0.0..=1.0).contains(&r))
            {
                return Err(QosError::OutOfRange {
                    stage: "availability",
                    location: key.location.clone(),
                    week_start: key.week_start,
                    minute: Some(minute),
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Reduces dense product levels to the available fraction per grid row.
///
/// A (location, week, product) may occur only once; a second inventory for the
/// same key is a merge ambiguity. Partitions without products report 0.0.
#[tracing::instrument(skip_all, fields(products = products.len(), partitions = grid.partition_count()))]
pub fn aggregate_availability(
    products: &[ProductInventory],
    grid: &TimeGrid,
) -> Result<AvailabilityTable> {
    let mut by_partition: BTreeMap<&PartitionKey, BTreeMap<&str, &ProductInventory>> =
        BTreeMap::new();

    for product in products {
        if !grid.contains(&product.key) {
            return Err(QosError::Linkage {
                curve_id: product.curve_id.clone(),
                reason: format!("partition {} is not on the time grid", product.key),
            });
        }
        match by_partition
            .entry(&product.key)
            .or_default()
            .entry(product.product_id.as_str())
        {
            Entry::Vacant(slot) => {
                slot.insert(product);
            }
            Entry::Occupied(_) => {
                return Err(QosError::MergeAmbiguity {
                    location: product.key.location.clone(),
                    week_start: product.key.week_start,
                    product_id: product.product_id.clone(),
                });
            }
        }
    }

    let mut ratios = BTreeMap::new();
    for key in grid.partitions() {
        let stocked: Vec<&ProductInventory> = by_partition
            .get(key)
            .map(|p| p.values().copied().collect())
            .unwrap_or_default();

        if stocked.is_empty() {
            warn!(partition = %key, "No products for partition; availability is zero");
        }

        let total = stocked.len();
        let dense: Vec<f64> = TimeGrid::minutes()
            .map(|x| {
                if total == 0 {
                    return 0.0;
                }
                let available = stocked.iter().filter(|p| p.is_available(x)).count();
                available as f64 / total as f64
            })
            .collect();

        ratios.insert(key.clone(), dense);
    }

    let table = AvailabilityTable::from_ratios(ratios)?;
    debug_assert_eq!(table.len(), grid.len());
    info!(rows = table.len(), "Availability ratio computed");
    Ok(table)
}
