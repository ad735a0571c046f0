//! Linear interpolation and normalization of consumption-profile curves.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::{debug, info};

use crate::error::{QosError, Result};
use crate::model::{ConsumptionCurve, PartitionKey, WEEK_MINUTES};
use crate::pipeline::grid::TimeGrid;
use crate::pipeline::points::validated_points;

/// Maximum allowed deviation of a normalized curve's sum from 1.
pub const NORMALIZATION_TOLERANCE: f64 = 1e-6;

/// Dense demand weights of one consumption curve, summing to 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionWeights {
    pub key: PartitionKey,
    pub curve_id: String,
    weights: Vec<f64>,
    scale: f64,
}

impl ConsumptionWeights {
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weight(&self, x: usize) -> Option<f64> {
        self.weights.get(x).copied()
    }

    /// Sum of the interpolated curve before normalization.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Interpolated value at `x` before normalization.
    pub fn value(&self, x: usize) -> Option<f64> {
        self.weight(x).map(|w| w * self.scale)
    }
}

/// All interpolated consumption curves, keyed by partition and curve id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterpolatedConsumption {
    curves: BTreeMap<(PartitionKey, String), ConsumptionWeights>,
}

impl InterpolatedConsumption {
    pub fn get(&self, key: &PartitionKey, curve_id: &str) -> Option<&ConsumptionWeights> {
        self.curves.get(&(key.clone(), curve_id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConsumptionWeights> {
        self.curves.values()
    }

    pub fn curve_count(&self) -> usize {
        self.curves.len()
    }

    /// Number of dense rows (minutes across all curves).
    pub fn len(&self) -> usize {
        self.curves.len() * WEEK_MINUTES
    }

    pub fn is_empty(&self) -> bool {
        self.curves.is_empty()
    }
}

/// Straight lines between consecutive declared points, one value per minute.
///
/// `points` must be sorted, unique and span minute 0 to 10079.
pub fn interpolate_linear(points: &[(usize, f64)]) -> Vec<f64> {
    let mut dense = Vec::with_capacity(WEEK_MINUTES);

    for pair in points.windows(2) {
        let [(x0, y0), (x1, y1)] = [pair[0], pair[1]];
        let span = (x1 - x0) as f64;
        for x in x0..x1 {
            dense.push(y0 + (y1 - y0) * (x - x0) as f64 / span);
        }
    }
    if let Some(&(_, last)) = points.last() {
        dense.push(last);
    }

    dense
}

/// Interpolates every consumption curve onto the grid and normalizes it.
#[tracing::instrument(skip_all, fields(curves = curves.len()))]
pub fn interpolate_consumption(
    curves: &[ConsumptionCurve],
    grid: &TimeGrid,
) -> Result<InterpolatedConsumption> {
    if curves.is_empty() {
        return Err(QosError::EmptyData("consumption curves"));
    }

    let mut interpolated = InterpolatedConsumption::default();
    for consumption in curves {
        let curve_id = &consumption.curve.curve_id;
        if !grid.contains(&consumption.key) {
            return Err(QosError::Linkage {
                curve_id: curve_id.clone(),
                reason: format!("partition {} is not on the time grid", consumption.key),
            });
        }

        let points = validated_points(&consumption.curve)?;
        if let Some(&(x, y)) = points.iter().find(|&&(_, y)| y < 0.0) {
            return Err(QosError::data_format(
                "Y",
                format!("consumption curve {curve_id} is negative ({y}) at minute {x}"),
            ));
        }

        let dense = interpolate_linear(&points);
        let scale: f64 = dense.iter().sum();
        if !(scale.is_finite() && scale > 0.0) {
            return Err(QosError::data_format(
                "Y",
                format!("consumption curve {curve_id} sums to {scale} and cannot be normalized"),
            ));
        }
        let weights: Vec<f64> = dense.iter().map(|v| v / scale).collect();
        debug!(curve_id = %curve_id, scale, "Consumption curve normalized");

        match interpolated
            .curves
            .entry((consumption.key.clone(), curve_id.clone()))
        {
            Entry::Vacant(slot) => {
                slot.insert(ConsumptionWeights {
                    key: consumption.key.clone(),
                    curve_id: curve_id.clone(),
                    weights,
                    scale,
                });
            }
            Entry::Occupied(_) => {
                return Err(QosError::Linkage {
                    curve_id: curve_id.clone(),
                    reason: format!("declared twice for partition {}", consumption.key),
                });
            }
        }
    }

    info!(
        curves = interpolated.curve_count(),
        rows = interpolated.len(),
        "Consumption curves interpolated"
    );
    Ok(interpolated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Curve;
    use crate::pipeline::grid::build_time_grid;
    use chrono::NaiveDate;

    fn key() -> PartitionKey {
        PartitionKey::new("Lobby", NaiveDate::from_ymd_opt(2023, 6, 12).unwrap())
    }

    fn consumption(id: &str, x: Vec<i64>, y: Vec<f64>) -> ConsumptionCurve {
        ConsumptionCurve {
            key: key(),
            curve: Curve {
                curve_id: id.into(),
                x,
                y,
            },
        }
    }

    #[test]
    fn test_interpolate_linear_midpoints() {
        let dense = interpolate_linear(&[(0, 0.0), (10, 10.0), (10079, 10.0)]);

        assert_eq!(dense.len(), WEEK_MINUTES);
        assert_eq!(dense[0], 0.0);
        assert!((dense[5] - 5.0).abs() < 1e-12);
        assert_eq!(dense[10], 10.0);
        assert_eq!(dense[10079], 10.0);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let grid = build_time_grid([key()]).unwrap();
        let curves = vec![
            consumption("c1", vec![0, 720, 1440, 10079], vec![1.0, 8.0, 2.0, 1.0]),
            consumption("c2", vec![0, 10079], vec![3.0, 3.0]),
        ];

        let interpolated = interpolate_consumption(&curves, &grid).unwrap();

        assert_eq!(interpolated.curve_count(), 2);
        for curve in interpolated.iter() {
            let total: f64 = curve.weights().iter().sum();
            assert!((total - 1.0).abs() < NORMALIZATION_TOLERANCE);
        }
    }

    #[test]
    fn test_declared_points_survive_interpolation() {
        let grid = build_time_grid([key()]).unwrap();
        let x = vec![0, 17, 600, 4321, 10079];
        let y = vec![0.5, 4.0, 2.25, 9.0, 1.0];
        let curves = vec![consumption("c1", x.clone(), y.clone())];

        let interpolated = interpolate_consumption(&curves, &grid).unwrap();
        let curve = interpolated.get(&key(), "c1").unwrap();

        for (&xi, &yi) in x.iter().zip(&y) {
            let value = curve.value(xi as usize).unwrap();
            assert!((value - yi).abs() < 1e-9, "minute {xi}: {value} != {yi}");
        }
    }

    #[test]
    fn test_missing_last_minute_is_boundary_error() {
        let grid = build_time_grid([key()]).unwrap();
        let curves = vec![consumption("c1", vec![0, 5000], vec![1.0, 1.0])];

        let err = interpolate_consumption(&curves, &grid).unwrap_err();
        assert!(matches!(err, QosError::Boundary { minute: 10079, .. }));
    }

    #[test]
    fn test_length_mismatch() {
        let grid = build_time_grid([key()]).unwrap();
        let curves = vec![consumption("c1", vec![0, 10079], vec![1.0])];

        let err = interpolate_consumption(&curves, &grid).unwrap_err();
        assert!(matches!(err, QosError::LengthMismatch { .. }));
    }

    #[test]
    fn test_zero_curve_cannot_be_normalized() {
        let grid = build_time_grid([key()]).unwrap();
        let curves = vec![consumption("c1", vec![0, 10079], vec![0.0, 0.0])];

        let err = interpolate_consumption(&curves, &grid).unwrap_err();
        assert_eq!(err.kind(), "data_format");
    }

    #[test]
    fn test_negative_demand_rejected() {
        let grid = build_time_grid([key()]).unwrap();
        let curves = vec![consumption("c1", vec![0, 10079], vec![-1.0, 2.0])];

        let err = interpolate_consumption(&curves, &grid).unwrap_err();
        assert_eq!(err.kind(), "data_format");
    }

    #[test]
    fn test_empty_input() {
        let grid = build_time_grid([key()]).unwrap();
        let err = interpolate_consumption(&[], &grid).unwrap_err();
        assert!(matches!(err, QosError::EmptyData(_)));
    }
}
