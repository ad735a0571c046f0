//! Splits the raw curve table by curve type and attaches linkage from `qos_data`.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

use crate::error::{QosError, Result};
use crate::model::{
    ConsumptionCurve, Curve, CurveType, InventoryCurve, LinkRecord, PartitionKey, RawCurve,
};

/// Curves split into the two groups, each carrying its partition key.
#[derive(Debug, Default)]
pub struct ClassifiedCurves {
    pub inventory: Vec<InventoryCurve>,
    pub consumption: Vec<ConsumptionCurve>,
}

impl ClassifiedCurves {
    /// Distinct (location, week) pairs across both groups.
    pub fn partitions(&self) -> BTreeSet<PartitionKey> {
        self.inventory
            .iter()
            .map(|c| c.key.clone())
            .chain(self.consumption.iter().map(|c| c.key.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inventory.len() + self.consumption.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partitions `curves` into inventory and consumption-profile curves.
///
/// Inventory curves are linked through `CURVE_ID`/`INVENTORY_CURVE_ID` of the
/// records; consumption curves through `CONSUMPTION_PROFILE_CURVE_ID`. Every
/// curve must match exactly one distinct record (or one distinct location for
/// a consumption curve), and every record must point at an existing inventory
/// curve. Exact duplicate records are collapsed first.
#[tracing::instrument(skip_all, fields(curves = curves.len(), records = records.len()))]
pub fn classify_curves(curves: &[RawCurve], records: &[LinkRecord]) -> Result<ClassifiedCurves> {
    if curves.is_empty() {
        return Err(QosError::EmptyData("qos_curves"));
    }
    if records.is_empty() {
        return Err(QosError::EmptyData("qos_data"));
    }

    let records: BTreeSet<&LinkRecord> = records.iter().collect();
    debug!(distinct_records = records.len(), "Linkage records deduplicated");

    let mut by_inventory: HashMap<&str, Vec<&LinkRecord>> = HashMap::new();
    let mut by_consumption: HashMap<&str, BTreeSet<(&str, Option<NaiveDate>)>> = HashMap::new();
    for record in records.iter().copied() {
        by_inventory
            .entry(record.inventory_curve_id.as_str())
            .or_default()
            .push(record);
        by_consumption
            .entry(record.consumption_profile_curve_id.as_str())
            .or_default()
            .insert((record.location.as_str(), record.week_start));
    }

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut classified = ClassifiedCurves::default();

    for raw in curves {
        let curve_type =
            CurveType::parse(&raw.curve_type).ok_or_else(|| QosError::UnknownCurveType {
                curve_id: raw.curve_id.clone(),
                curve_type: raw.curve_type.clone(),
            })?;

        if !seen.insert((curve_type.as_str(), raw.curve_id.as_str())) {
            return Err(QosError::Linkage {
                curve_id: raw.curve_id.clone(),
                reason: format!("{} curve id appears more than once", curve_type.as_str()),
            });
        }

        let curve = Curve {
            curve_id: raw.curve_id.clone(),
            x: raw.x.clone(),
            y: raw.y.clone(),
        };

        match curve_type {
            CurveType::Inventory => {
                let record = match by_inventory.get(raw.curve_id.as_str()).map(Vec::as_slice) {
                    Some([record]) => *record,
                    Some(many) if !many.is_empty() => {
                        return Err(QosError::Linkage {
                            curve_id: raw.curve_id.clone(),
                            reason: format!("matched {} distinct qos_data records", many.len()),
                        });
                    }
                    _ => {
                        return Err(QosError::Linkage {
                            curve_id: raw.curve_id.clone(),
                            reason: "no qos_data record references this inventory curve".into(),
                        });
                    }
                };
                let week_start = resolve_week(&raw.curve_id, record.week_start, raw.week_start)?;
                classified.inventory.push(InventoryCurve {
                    key: PartitionKey::new(record.location.clone(), week_start),
                    product_id: record.product_id.clone(),
                    consumption_profile_curve_id: record.consumption_profile_curve_id.clone(),
                    curve,
                });
            }
            CurveType::ConsumptionProfile => {
                let links = by_consumption.get(raw.curve_id.as_str());
                let (location, record_week) = match links {
                    Some(links) if links.len() == 1 => links.iter().next().copied(),
                    Some(links) => {
                        return Err(QosError::Linkage {
                            curve_id: raw.curve_id.clone(),
                            reason: format!(
                                "shared by {} distinct location/week pairs",
                                links.len()
                            ),
                        });
                    }
                    None => None,
                }
                .ok_or_else(|| QosError::Linkage {
                    curve_id: raw.curve_id.clone(),
                    reason: "no qos_data record references this consumption profile".into(),
                })?;
                let week_start = resolve_week(&raw.curve_id, record_week, raw.week_start)?;
                classified.consumption.push(ConsumptionCurve {
                    key: PartitionKey::new(location, week_start),
                    curve,
                });
            }
        }
    }

    if let Some(record) = records.iter().find(|r| {
        !seen.contains(&(CurveType::Inventory.as_str(), r.inventory_curve_id.as_str()))
    }) {
        return Err(QosError::Linkage {
            curve_id: record.inventory_curve_id.clone(),
            reason: format!(
                "referenced by qos_data for location {} but absent from the inventory curves",
                record.location
            ),
        });
    }

    debug_assert_eq!(classified.len(), curves.len());
    info!(
        inventory = classified.inventory.len(),
        consumption = classified.consumption.len(),
        "Curves classified"
    );

    Ok(classified)
}

/// Week start from the linkage record, falling back to the curve row.
fn resolve_week(
    curve_id: &str,
    from_record: Option<NaiveDate>,
    from_curve: Option<NaiveDate>,
) -> Result<NaiveDate> {
    match (from_record, from_curve) {
        (Some(a), Some(b)) if a != b => Err(QosError::data_format(
            "WEEK_START",
            format!("curve {curve_id} is dated {b} but its qos_data record says {a}"),
        )),
        (Some(week), _) | (None, Some(week)) => Ok(week),
        (None, None) => Err(QosError::data_format(
            "WEEK_START",
            format!("curve {curve_id} has no week start in qos_data or qos_curves"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 6, 12).unwrap()
    }

    fn raw(curve_type: &str, id: &str) -> RawCurve {
        RawCurve {
            curve_type: curve_type.into(),
            curve_id: id.into(),
            week_start: None,
            x: vec![0, 10079],
            y: vec![1.0, 1.0],
        }
    }

    fn record(location: &str, product: &str, inventory: &str, consumption: &str) -> LinkRecord {
        LinkRecord {
            location: location.into(),
            week_start: Some(week()),
            product_id: product.into(),
            inventory_curve_id: inventory.into(),
            consumption_profile_curve_id: consumption.into(),
        }
    }

    #[test]
    fn test_splits_and_links_curves() {
        let curves = vec![
            raw("inventory", "i1"),
            raw("inventory", "i2"),
            raw("consumption_profile", "c1"),
        ];
        let records = vec![
            record("Lobby", "p1", "i1", "c1"),
            record("Lobby", "p2", "i2", "c1"),
        ];

        let classified = classify_curves(&curves, &records).unwrap();

        assert_eq!(classified.len(), curves.len());
        assert_eq!(classified.inventory.len(), 2);
        assert_eq!(classified.consumption.len(), 1);
        assert_eq!(classified.inventory[1].product_id, "p2");
        assert_eq!(classified.inventory[1].consumption_profile_curve_id, "c1");
        assert_eq!(classified.consumption[0].key, PartitionKey::new("Lobby", week()));
        assert_eq!(classified.partitions().len(), 1);
    }

    #[test]
    fn test_duplicate_records_are_collapsed() {
        let curves = vec![raw("inventory", "i1"), raw("consumption_profile", "c1")];
        let records = vec![
            record("Lobby", "p1", "i1", "c1"),
            record("Lobby", "p1", "i1", "c1"),
        ];

        let classified = classify_curves(&curves, &records).unwrap();
        assert_eq!(classified.inventory.len(), 1);
    }

    #[test]
    fn test_unknown_curve_type() {
        let curves = vec![raw("inventroy", "i1")];
        let records = vec![record("Lobby", "p1", "i1", "c1")];

        let err = classify_curves(&curves, &records).unwrap_err();
        assert!(matches!(err, QosError::UnknownCurveType { ref curve_type, .. } if curve_type == "inventroy"));
    }

    #[test]
    fn test_inventory_curve_without_record() {
        let curves = vec![raw("inventory", "i9"), raw("consumption_profile", "c1")];
        let records = vec![record("Lobby", "p1", "i1", "c1")];

        let err = classify_curves(&curves, &records).unwrap_err();
        assert!(matches!(err, QosError::Linkage { ref curve_id, .. } if curve_id == "i9"));
    }

    #[test]
    fn test_inventory_curve_with_two_records() {
        let curves = vec![raw("inventory", "i1"), raw("consumption_profile", "c1")];
        let records = vec![
            record("Lobby", "p1", "i1", "c1"),
            record("Lobby", "p2", "i1", "c1"),
        ];

        let err = classify_curves(&curves, &records).unwrap_err();
        assert_eq!(err.kind(), "linkage");
    }

    #[test]
    fn test_consumption_curve_shared_by_two_locations() {
        let curves = vec![
            raw("inventory", "i1"),
            raw("inventory", "i2"),
            raw("consumption_profile", "c1"),
        ];
        let records = vec![
            record("Lobby", "p1", "i1", "c1"),
            record("Canteen", "p1", "i2", "c1"),
        ];

        let err = classify_curves(&curves, &records).unwrap_err();
        assert!(matches!(err, QosError::Linkage { ref curve_id, .. } if curve_id == "c1"));
    }

    #[test]
    fn test_record_pointing_at_missing_curve() {
        let curves = vec![raw("inventory", "i1"), raw("consumption_profile", "c1")];
        let records = vec![
            record("Lobby", "p1", "i1", "c1"),
            record("Lobby", "p2", "i2", "c1"),
        ];

        let err = classify_curves(&curves, &records).unwrap_err();
        assert!(matches!(err, QosError::Linkage { ref curve_id, .. } if curve_id == "i2"));
    }

    #[test]
    fn test_week_taken_from_curve_when_record_has_none() {
        let mut inventory = raw("inventory", "i1");
        inventory.week_start = Some(week());
        let mut consumption = raw("consumption_profile", "c1");
        consumption.week_start = Some(week());
        let mut link = record("Lobby", "p1", "i1", "c1");
        link.week_start = None;

        let classified = classify_curves(&[inventory, consumption], &[link]).unwrap();
        assert_eq!(classified.inventory[0].key.week_start, week());
        assert_eq!(classified.consumption[0].key.week_start, week());
    }

    #[test]
    fn test_missing_week_everywhere() {
        let mut link = record("Lobby", "p1", "i1", "c1");
        link.week_start = None;

        let err = classify_curves(&[raw("inventory", "i1")], &[link]).unwrap_err();
        assert_eq!(err.kind(), "data_format");
    }

    #[test]
    fn test_empty_curve_table() {
        let err = classify_curves(&[], &[record("Lobby", "p1", "i1", "c1")]).unwrap_err();
        assert!(matches!(err, QosError::EmptyData("qos_curves")));
    }

    #[test]
    fn test_empty_record_table() {
        let err = classify_curves(&[raw("inventory", "i1")], &[]).unwrap_err();
        assert!(matches!(err, QosError::EmptyData("qos_data")));
    }
}
