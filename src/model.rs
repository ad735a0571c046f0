//! Row types shared by the pipeline, the storage adapters and the API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::fields;

/// Number of minutes on the weekly axis (7 × 1440).
pub const WEEK_MINUTES: usize = 10_080;

/// Last minute of the week; every curve must declare a point here.
pub const LAST_MINUTE: i64 = 10_079;

/// The two literals accepted in `CURVE_TYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveType {
    Inventory,
    ConsumptionProfile,
}

impl CurveType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "inventory" => Some(CurveType::Inventory),
            "consumption_profile" => Some(CurveType::ConsumptionProfile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CurveType::Inventory => "inventory",
            CurveType::ConsumptionProfile => "consumption_profile",
        }
    }
}

/// One row of `qos_curves`: a full sparse curve instance with list-valued X/Y.
///
/// `curve_type` stays a raw string here so an unexpected literal can be
/// reported by the classifier together with the curve id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawCurve {
    #[serde(rename = "CURVE_TYPE")]
    pub curve_type: String,
    #[serde(rename = "CURVE_ID", deserialize_with = "fields::id")]
    pub curve_id: String,
    #[serde(
        rename = "WEEK_START",
        default,
        deserialize_with = "fields::optional_date"
    )]
    pub week_start: Option<NaiveDate>,
    #[serde(rename = "X", deserialize_with = "fields::int_list")]
    pub x: Vec<i64>,
    #[serde(rename = "Y", deserialize_with = "fields::float_list")]
    pub y: Vec<f64>,
}

/// One row of `qos_data`, linking an inventory curve to its location, product
/// and consumption profile. Extra columns such as `DATE` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub struct LinkRecord {
    #[serde(rename = "LOCATION", deserialize_with = "fields::id")]
    pub location: String,
    #[serde(
        rename = "WEEK_START",
        default,
        deserialize_with = "fields::optional_date"
    )]
    pub week_start: Option<NaiveDate>,
    #[serde(rename = "PRODUCT_ID", alias = "PRODUCT", deserialize_with = "fields::id")]
    pub product_id: String,
    #[serde(
        rename = "CURVE_ID",
        alias = "INVENTORY_CURVE_ID",
        deserialize_with = "fields::id"
    )]
    pub inventory_curve_id: String,
    #[serde(rename = "CONSUMPTION_PROFILE_CURVE_ID", deserialize_with = "fields::id")]
    pub consumption_profile_curve_id: String,
}

/// The (location, week) pair every computation is partitioned by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    pub location: String,
    pub week_start: NaiveDate,
}

impl PartitionKey {
    pub fn new(location: impl Into<String>, week_start: NaiveDate) -> Self {
        Self {
            location: location.into(),
            week_start,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.location, self.week_start)
    }
}

/// Sparse points of one curve instance, as declared in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub curve_id: String,
    pub x: Vec<i64>,
    pub y: Vec<f64>,
}

/// Inventory curve with its linkage attached.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryCurve {
    pub key: PartitionKey,
    pub product_id: String,
    pub consumption_profile_curve_id: String,
    pub curve: Curve,
}

/// Consumption-profile curve with its location/week attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionCurve {
    pub key: PartitionKey,
    pub curve: Curve,
}

/// Final weekly metric for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosResult {
    #[serde(rename = "LOCATION")]
    pub location: String,
    #[serde(rename = "WEEK_START", with = "fields::week")]
    pub week_start: NaiveDate,
    #[serde(rename = "QOS")]
    pub qos: f64,
}
