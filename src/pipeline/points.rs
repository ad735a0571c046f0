//! Validation shared by the inventory expander and the curve interpolator.

use crate::error::{QosError, Result};
use crate::model::{Curve, LAST_MINUTE};

/// Checks a sparse curve and returns its points sorted by minute.
///
/// X and Y must pair up, the first and last minute of the week must be
/// declared, no minute may repeat and every value must be finite.
pub fn validated_points(curve: &Curve) -> Result<Vec<(usize, f64)>> {
    if curve.x.len() != curve.y.len() {
        return Err(QosError::LengthMismatch {
            curve_id: curve.curve_id.clone(),
            x_len: curve.x.len(),
            y_len: curve.y.len(),
        });
    }

    let min = curve.x.iter().min().copied();
    let max = curve.x.iter().max().copied();
    if min != Some(0) {
        return Err(QosError::Boundary {
            curve_id: curve.curve_id.clone(),
            minute: 0,
        });
    }
    if max != Some(LAST_MINUTE) {
        return Err(QosError::Boundary {
            curve_id: curve.curve_id.clone(),
            minute: LAST_MINUTE,
        });
    }

    let mut points = Vec::with_capacity(curve.x.len());
    for (&x, &y) in curve.x.iter().zip(&curve.y) {
        if !y.is_finite() {
            return Err(QosError::data_format(
                "Y",
                format!("curve {} has non-finite value at minute {x}", curve.curve_id),
            ));
        }
        // Bounds were checked above, so the cast cannot wrap.
        points.push((x as usize, y));
    }
    points.sort_by_key(|&(x, _)| x);

    if let Some(pair) = points.windows(2).find(|pair| pair[0].0 == pair[1].0) {
        return Err(QosError::data_format(
            "X",
            format!("curve {} declares minute {} twice", curve.curve_id, pair[0].0),
        ));
    }

    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(x: Vec<i64>, y: Vec<f64>) -> Curve {
        Curve {
            curve_id: "c".into(),
            x,
            y,
        }
    }

    #[test]
    fn test_sorts_points() {
        let points = validated_points(&curve(vec![10079, 0, 50], vec![3.0, 1.0, 2.0])).unwrap();
        assert_eq!(points, vec![(0, 1.0), (50, 2.0), (10079, 3.0)]);
    }

    #[test]
    fn test_length_mismatch() {
        let err = validated_points(&curve(vec![0, 10079], vec![1.0])).unwrap_err();
        assert!(matches!(err, QosError::LengthMismatch { x_len: 2, y_len: 1, .. }));
    }

    #[test]
    fn test_missing_start_boundary() {
        let err = validated_points(&curve(vec![1, 10079], vec![1.0, 1.0])).unwrap_err();
        assert!(matches!(err, QosError::Boundary { minute: 0, .. }));
    }

    #[test]
    fn test_missing_end_boundary() {
        let err = validated_points(&curve(vec![0, 10000], vec![1.0, 1.0])).unwrap_err();
        assert!(matches!(err, QosError::Boundary { minute: 10079, .. }));
    }

    #[test]
    fn test_minute_past_end_is_boundary_error() {
        let err = validated_points(&curve(vec![0, 10080], vec![1.0, 1.0])).unwrap_err();
        assert!(matches!(err, QosError::Boundary { minute: 10079, .. }));
    }

    #[test]
    fn test_empty_curve_is_boundary_error() {
        let err = validated_points(&curve(vec![], vec![])).unwrap_err();
        assert!(matches!(err, QosError::Boundary { minute: 0, .. }));
    }

    #[test]
    fn test_duplicate_minute() {
        let err =
            validated_points(&curve(vec![0, 5, 5, 10079], vec![1.0, 1.0, 2.0, 1.0])).unwrap_err();
        assert_eq!(err.kind(), "data_format");
    }

    #[test]
    fn test_non_finite_value() {
        let err = validated_points(&curve(vec![0, 10079], vec![f64::NAN, 1.0])).unwrap_err();
        assert_eq!(err.kind(), "data_format");
    }
}
