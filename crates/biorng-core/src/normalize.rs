//! Min-max normalization of raw electrode traces.
//!
//! Every channel of a [`SampleBatch`](crate::source::SampleBatch) is rescaled
//! independently into `[0, 1]` before it reaches the staging buffer:
//!
//! ```text
//! x' = (x - min) / (max - min)
//! ```
//!
//! # Degenerate input
//!
//! - **Empty trace**: rejected with [`NormalizeError::Empty`].
//! - **Non-finite sample** (NaN, ±inf): rejected with
//!   [`NormalizeError::NonFinite`]. A single bad sample poisons min/max, so
//!   the whole trace is refused rather than patched.
//! - **Constant trace** (`max == min`): the quotient is `0/0`. Every output
//!   is defined as `0.0`. The trace still contributes samples; a flat
//!   electrode simply pulls the staging buffer towards zero for that cycle.

use thiserror::Error;

/// Reasons a trace cannot be normalized.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    /// The trace had no samples, so min/max are undefined.
    #[error("cannot normalize an empty trace")]
    Empty,
    /// The trace contained NaN or an infinity.
    #[error("non-finite sample {value} at index {index}")]
    NonFinite { index: usize, value: f64 },
}

/// Rescale `data` into `[0, 1]` using min-max normalization.
///
/// Output has the same length and order as the input. Results are clamped
/// into `[0, 1]` so rounding can never leak a value outside the unit range.
///
/// ```
/// use biorng_core::normalize;
///
/// let out = normalize(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
/// assert_eq!(out, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
/// ```
pub fn normalize(data: &[f64]) -> Result<Vec<f64>, NormalizeError> {
    if data.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for (index, &value) in data.iter().enumerate() {
        if !value.is_finite() {
            return Err(NormalizeError::NonFinite { index, value });
        }
        min = min.min(value);
        max = max.max(value);
    }

    let range = max - min;
    // Constant trace: 0/0 is defined as 0.
    if range == 0.0 {
        return Ok(vec![0.0; data.len()]);
    }
    // Finite inputs spanning more than f64::MAX overflow the range.
    if !range.is_finite() {
        return Ok(data
            .iter()
            .map(|&v| ((v / 2.0 - min / 2.0) / (max / 2.0 - min / 2.0)).clamp(0.0, 1.0))
            .collect());
    }

    Ok(data
        .iter()
        .map(|&v| ((v - min) / range).clamp(0.0, 1.0))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_reference_sequence() {
        let out = normalize(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(out, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_normalize_spans_unit_interval() {
        let data = [-3.5, 12.0, 0.25, 7.0, -1.0, 4.4];
        let out = normalize(&data).unwrap();
        let min = out.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = out.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(min, 0.0);
        assert_eq!(max, 1.0);
    }

    #[test]
    fn test_normalize_preserves_order() {
        let data = [0.3, -2.0, 9.0, 4.5, 4.6, -2.1];
        let out = normalize(&data).unwrap();
        assert_eq!(out.len(), data.len());
        for i in 0..data.len() {
            for j in 0..data.len() {
                if data[i] < data[j] {
                    assert!(out[i] < out[j], "order broken at ({i}, {j})");
                }
            }
        }
    }

    #[test]
    fn test_normalize_constant_is_all_zero() {
        let out = normalize(&[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(out, vec![0.0, 0.0, 0.0]);
        assert!(out.iter().all(|v| !v.is_nan()));
    }

    #[test]
    fn test_normalize_single_sample() {
        assert_eq!(normalize(&[42.0]).unwrap(), vec![0.0]);
    }

    #[test]
    fn test_normalize_empty_rejected() {
        assert_eq!(normalize(&[]), Err(NormalizeError::Empty));
    }

    #[test]
    fn test_normalize_nan_rejected() {
        let err = normalize(&[1.0, f64::NAN, 3.0]).unwrap_err();
        assert!(matches!(err, NormalizeError::NonFinite { index: 1, .. }));
    }

    #[test]
    fn test_normalize_infinity_rejected() {
        let err = normalize(&[f64::NEG_INFINITY, 0.0]).unwrap_err();
        assert!(matches!(err, NormalizeError::NonFinite { index: 0, .. }));
    }

    #[test]
    fn test_normalize_extreme_range_stays_finite() {
        let out = normalize(&[-f64::MAX, 0.0, f64::MAX]).unwrap();
        assert_eq!(out[0], 0.0);
        assert_eq!(out[2], 1.0);
        assert!((out[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let data = [0.12, 0.5, -7.25, 3.0];
        assert_eq!(normalize(&data).unwrap(), normalize(&data).unwrap());
    }
}
