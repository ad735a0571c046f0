//! Combines availability and demand weights into one QoS value per partition.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::error::{QosError, Result};
use crate::model::{InventoryCurve, PartitionKey, QosResult};
use crate::pipeline::availability::AvailabilityTable;
use crate::pipeline::interpolate::InterpolatedConsumption;

/// Float drift tolerated just outside [0, 1] before the value is clamped.
const QOS_TOLERANCE: f64 = 1e-9;

/// Σ ratio × weight over aligned minutes.
pub fn weighted_sum(ratios: &[f64], weights: &[f64]) -> f64 {
    ratios.iter().zip(weights).map(|(r, w)| r * w).sum()
}

/// Computes the consumption-weighted availability of every partition.
///
/// Each partition must resolve to exactly one consumption-profile curve: the
/// ids referenced by its inventory curves together with the consumption curves
/// placed in it. The ratio and weight tables must then align minute by minute.
#[tracing::instrument(skip_all, fields(partitions = availability.iter().count()))]
pub fn calculate_qos(
    availability: &AvailabilityTable,
    consumption: &InterpolatedConsumption,
    inventory: &[InventoryCurve],
) -> Result<Vec<QosResult>> {
    let mut profiles: BTreeMap<&PartitionKey, BTreeSet<&str>> = BTreeMap::new();
    for curve in inventory {
        profiles
            .entry(&curve.key)
            .or_default()
            .insert(curve.consumption_profile_curve_id.as_str());
    }
    for weights in consumption.iter() {
        if availability.get(&weights.key).is_none() {
            return Err(one_to_one(
                &weights.key,
                format!("consumption curve {} has no availability ratio", weights.curve_id),
            ));
        }
        profiles
            .entry(&weights.key)
            .or_default()
            .insert(weights.curve_id.as_str());
    }

    let mut results = Vec::new();
    for (key, ratios) in availability.iter() {
        let profile_id = match profiles.get(key) {
            Some(ids) if ids.len() == 1 => ids.iter().next().copied(),
            Some(ids) if ids.len() > 1 => {
                let ids: Vec<&str> = ids.iter().copied().collect();
                return Err(one_to_one(
                    key,
                    format!("several consumption profiles ({})", ids.join(", ")),
                ));
            }
            _ => None,
        }
        .ok_or_else(|| one_to_one(key, "no consumption profile".to_string()))?;

        let weights = consumption.get(key, profile_id).ok_or_else(|| {
            one_to_one(key, format!("consumption curve {profile_id} is missing"))
        })?;
        if weights.weights().len() != ratios.len() {
            return Err(one_to_one(
                key,
                format!(
                    "{} availability minutes against {} weight minutes",
                    ratios.len(),
                    weights.weights().len()
                ),
            ));
        }

        let qos = bounded_qos(key, weighted_sum(ratios, weights.weights()))?;

        debug!(partition = %key, profile_id, qos, "QoS computed");
        results.push(QosResult {
            location: key.location.clone(),
            week_start: key.week_start,
            qos,
        });
    }

    info!(results = results.len(), "Quality of service calculated");
    Ok(results)
}

/// Clamps float drift into [0, 1]; anything further out is an error for the
/// whole week, so no minute is reported.
fn bounded_qos(key: &PartitionKey, qos: f64) -> Result<f64> {
    if !qos.is_finite() || !(-QOS_TOLERANCE..=1.0 + QOS_TOLERANCE).contains(&qos) {
        return Err(QosError::OutOfRange {
            stage: "qos",
            location: key.location.clone(),
            week_start: key.week_start,
            minute: None,
            value: qos,
        });
    }
    Ok(qos.clamp(0.0, 1.0))
}

fn one_to_one(key: &PartitionKey, reason: String) -> QosError {
    QosError::MergeOneToOne {
        location: key.location.clone(),
        week_start: key.week_start,
        reason,
    }
}
