//! Expands sparse inventory change points into a per-minute stock level.

use tracing::{debug, info};

use crate::error::{QosError, Result};
use crate::model::{InventoryCurve, PartitionKey, WEEK_MINUTES};
use crate::pipeline::grid::TimeGrid;
use crate::pipeline::points::validated_points;

/// Dense stock level of one product for one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInventory {
    pub key: PartitionKey,
    pub product_id: String,
    pub curve_id: String,
    levels: Vec<f64>,
}

impl ProductInventory {
    /// Stock level at minute `x`, or `None` outside the week.
    pub fn level(&self, x: usize) -> Option<f64> {
        self.levels.get(x).copied()
    }

    /// A product counts as available when its level is positive.
    pub fn is_available(&self, x: usize) -> bool {
        self.level(x).is_some_and(|level| level > 0.0)
    }

    pub fn levels(&self) -> &[f64] {
        &self.levels
    }
}

/// Holds each declared value until the next change point.
///
/// `points` must be sorted, unique and start at minute 0; the value declared
/// at a change point applies from that minute onwards.
pub fn forward_fill(points: &[(usize, f64)]) -> Vec<f64> {
    let mut levels = Vec::with_capacity(WEEK_MINUTES);
    let mut next = 0;
    let mut current = 0.0;

    for x in TimeGrid::minutes() {
        while let Some(&(px, py)) = points.get(next) {
            if px > x {
                break;
            }
            current = py;
            next += 1;
        }
        levels.push(current);
    }

    levels
}

/// Expands every inventory curve onto the minutes of its grid partition.
#[tracing::instrument(skip_all, fields(curves = curves.len()))]
pub fn expand_inventory(curves: &[InventoryCurve], grid: &TimeGrid) -> Result<Vec<ProductInventory>> {
    if curves.is_empty() {
        return Err(QosError::EmptyData("inventory curves"));
    }

    let mut products = Vec::with_capacity(curves.len());
    for inventory in curves {
        if !grid.contains(&inventory.key) {
            return Err(QosError::Linkage {
                curve_id: inventory.curve.curve_id.clone(),
                reason: format!("partition {} is not on the time grid", inventory.key),
            });
        }

        let points = validated_points(&inventory.curve)?;
        debug!(
            curve_id = %inventory.curve.curve_id,
            change_points = points.len(),
            "Expanding inventory curve"
        );

        products.push(ProductInventory {
            key: inventory.key.clone(),
            product_id: inventory.product_id.clone(),
            curve_id: inventory.curve.curve_id.clone(),
            levels: forward_fill(&points),
        });
    }

    info!(
        products = products.len(),
        rows = products.len() * WEEK_MINUTES,
        "Inventory expanded"
    );
    Ok(products)
}
