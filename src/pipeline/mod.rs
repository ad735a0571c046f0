//! The QoS computation, from raw curve rows to one value per location and week.
//!
//! Stages run strictly in order and each one only reads its predecessors'
//! output: classification, the time grid, inventory expansion, availability,
//! consumption interpolation and finally the weighted QoS.

pub mod availability;
pub mod classify;
pub mod grid;
pub mod interpolate;
pub mod inventory;
mod points;
pub mod qos;

use std::collections::BTreeSet;
use tracing::info;

use crate::error::Result;
use crate::model::{LinkRecord, QosResult, RawCurve};

pub use availability::{AvailabilityTable, aggregate_availability};
pub use classify::{ClassifiedCurves, classify_curves};
pub use grid::{TimeGrid, build_time_grid};
pub use interpolate::{InterpolatedConsumption, interpolate_consumption};
pub use inventory::{ProductInventory, expand_inventory};
pub use qos::calculate_qos;

/// Runs the full pipeline over one input snapshot.
///
/// Pure: the same rows always give the same results, sorted by location and
/// week. Any validation failure aborts the whole batch.
#[tracing::instrument(skip_all)]
pub fn compute_qos(curves: &[RawCurve], records: &[LinkRecord]) -> Result<Vec<QosResult>> {
    let locations: BTreeSet<&str> = records.iter().map(|r| r.location.as_str()).collect();
    info!(
        locations = locations.len(),
        curves = curves.len(),
        records = records.len(),
        "Computing quality of service"
    );

    let classified = classify_curves(curves, records)?;
    let grid = build_time_grid(classified.partitions())?;
    let weeks: BTreeSet<_> = grid.partitions().map(|k| k.week_start).collect();
    info!(
        partitions = grid.partition_count(),
        weeks = weeks.len(),
        "Partitions found in input"
    );

    let products = expand_inventory(&classified.inventory, &grid)?;
    let availability = aggregate_availability(&products, &grid)?;
    let consumption = interpolate_consumption(&classified.consumption, &grid)?;

    calculate_qos(&availability, &consumption, &classified.inventory)
}
