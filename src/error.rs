//! Error taxonomy for the QoS batch run.
//!
//! Every validation failure aborts the whole run; variants carry the key or
//! field that was implicated so the log line is enough to locate bad input.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QosError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input not accessible: {0}")]
    InputAccess(String),

    #[error("Data format error in {field}: {reason}")]
    DataFormat { field: String, reason: String },

    #[error("Curve {curve_id}: X has {x_len} values but Y has {y_len}")]
    LengthMismatch {
        curve_id: String,
        x_len: usize,
        y_len: usize,
    },

    #[error("Curve {curve_id}: missing boundary minute {minute}")]
    Boundary { curve_id: String, minute: i64 },

    #[error("Empty data: {0} contains no rows")]
    EmptyData(&'static str),

    #[error(
        "Ambiguous merge: more than one inventory curve for location {location}, \
         week {week_start}, product {product_id}"
    )]
    MergeAmbiguity {
        location: String,
        week_start: NaiveDate,
        product_id: String,
    },

    #[error("One-to-one merge violated for location {location}, week {week_start}: {reason}")]
    MergeOneToOne {
        location: String,
        week_start: NaiveDate,
        reason: String,
    },

    #[error("Unknown curve type '{curve_type}' on curve {curve_id}")]
    UnknownCurveType { curve_id: String, curve_type: String },

    #[error("Linkage error for curve {curve_id}: {reason}")]
    Linkage { curve_id: String, reason: String },

    /// `minute` is `None` when the value covers the whole week.
    #[error(
        "{stage} produced {value} for location {location}, week {week_start}{}",
        at_minute(.minute)
    )]
    OutOfRange {
        stage: &'static str,
        location: String,
        week_start: NaiveDate,
        minute: Option<usize>,
        value: f64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl QosError {
    /// Stable name of the error kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            QosError::Config(_) => "config",
            QosError::InputAccess(_) => "input_access",
            QosError::DataFormat { .. } => "data_format",
            QosError::LengthMismatch { .. } => "length_mismatch",
            QosError::Boundary { .. } => "boundary",
            QosError::EmptyData(_) => "empty_data",
            QosError::MergeAmbiguity { .. } => "merge_ambiguity",
            QosError::MergeOneToOne { .. } => "merge_one_to_one",
            QosError::UnknownCurveType { .. } => "unknown_curve_type",
            QosError::Linkage { .. } => "linkage",
            QosError::OutOfRange { .. } => "out_of_range",
            QosError::Io(_) => "io",
            QosError::Csv(_) => "csv",
            QosError::Json(_) => "json",
            QosError::Database(_) => "database",
        }
    }

    pub(crate) fn data_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        QosError::DataFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn at_minute(minute: &Option<usize>) -> String {
    minute.map(|m| format!(", minute {m}")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, QosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(QosError::EmptyData("qos_curves").kind(), "empty_data");
        assert_eq!(
            QosError::Boundary {
                curve_id: "7".into(),
                minute: 10079
            }
            .kind(),
            "boundary"
        );
    }

    #[test]
    fn test_boundary_message_names_curve_and_minute() {
        let err = QosError::Boundary {
            curve_id: "inv-1".into(),
            minute: 0,
        };
        assert_eq!(err.to_string(), "Curve inv-1: missing boundary minute 0");
    }

    #[test]
    fn test_out_of_range_message() {
        let week_start = NaiveDate::from_ymd_opt(2023, 6, 12).unwrap();
        let per_minute = QosError::OutOfRange {
            stage: "availability",
            location: "Lobby".into(),
            week_start,
            minute: Some(42),
            value: 1.5,
        };
        let weekly = QosError::OutOfRange {
            stage: "qos",
            location: "Lobby".into(),
            week_start,
            minute: None,
            value: 1.5,
        };

        assert_eq!(
            per_minute.to_string(),
            "availability produced 1.5 for location Lobby, week 2023-06-12, minute 42"
        );
        assert_eq!(
            weekly.to_string(),
            "qos produced 1.5 for location Lobby, week 2023-06-12"
        );
    }
}
