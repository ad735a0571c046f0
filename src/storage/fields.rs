//! Serde helpers for the loosely typed input columns.
//!
//! Flat files carry lists as `[0, 60, 10079]`, the relational store as arrays
//! or `{0,60,10079}` text, and ids may arrive as numbers or strings.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y"];

/// Format used for `WEEK_START` in outputs and API paths.
pub const WEEK_FORMAT: &str = "%d.%m.%Y";

/// Id columns of both input tables, including accepted aliases.
pub const ID_COLUMNS: &[&str] = &[
    "CURVE_ID",
    "INVENTORY_CURVE_ID",
    "CONSUMPTION_PROFILE_CURVE_ID",
    "LOCATION",
    "PRODUCT_ID",
    "PRODUCT",
];

#[derive(Deserialize)]
#[serde(untagged)]
enum ListField {
    Numbers(Vec<f64>),
    Text(String),
}

/// Parses a date in either ISO (`2023-06-12`) or day-first (`12.06.2023`) form.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Splits a textual list like `[1, 2.5]` or `{1,2.5}` into numbers.
pub fn parse_number_list(raw: &str) -> Result<Vec<f64>, String> {
    let inner = raw
        .trim()
        .trim_start_matches(['[', '{', '('])
        .trim_end_matches([']', '}', ')']);

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|token| {
            let token = token.trim();
            token
                .parse::<f64>()
                .map_err(|_| format!("'{token}' is not a number"))
        })
        .collect()
}

fn list<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match ListField::deserialize(deserializer)? {
        ListField::Numbers(values) => Ok(values),
        ListField::Text(text) => parse_number_list(&text).map_err(serde::de::Error::custom),
    }
}

pub fn int_list<'de, D>(deserializer: D) -> Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    list(deserializer)?
        .into_iter()
        .map(|v| {
            if v.is_finite() && v.fract() == 0.0 {
                Ok(v as i64)
            } else {
                Err(serde::de::Error::custom(format!(
                    "minute {v} is not an integer"
                )))
            }
        })
        .collect()
}

pub fn float_list<'de, D>(deserializer: D) -> Result<Vec<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    list(deserializer)
}

/// Reads an id column as text, verbatim apart from surrounding whitespace.
///
/// `0042` and `42` stay distinct ids. Numeric ids coming from the relational
/// store are turned into text by [`stringify_ids`] before decoding.
pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(|v| v.trim().to_string())
}

/// Replaces numeric id values of a JSON row with their decimal text.
///
/// `to_jsonb` keeps integer or numeric id columns as JSON numbers; integral
/// floats such as `17.0` become `"17"`.
pub fn stringify_ids(row: &mut serde_json::Value) {
    let Some(object) = row.as_object_mut() else {
        return;
    };
    for column in ID_COLUMNS {
        if let Some(serde_json::Value::Number(number)) = object.get(*column) {
            let text = match (number.as_i64(), number.as_u64(), number.as_f64()) {
                (Some(v), _, _) => v.to_string(),
                (_, Some(v), _) => v.to_string(),
                (_, _, Some(v)) if v.fract() == 0.0 => format!("{v:.0}"),
                _ => number.to_string(),
            };
            object.insert((*column).to_string(), serde_json::Value::String(text));
        }
    }
}

pub fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => parse_date(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date '{raw}'"))),
    }
}

/// `dd.mm.yyyy` on the way out, either accepted format on the way in.
pub mod week {
    use super::*;

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        date.format(WEEK_FORMAT).to_string().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_date(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid date '{raw}'")))
    }
}
