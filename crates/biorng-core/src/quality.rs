//! Quick statistical sanity checks for pool output.
//!
//! These are smoke tests for a stream of scalars that should be uniform on
//! `[0, 1)` and independent, not a certification battery. Four components,
//! each scored in `[0, 1]`:
//!
//! - **Uniformity**: 10-bin chi-square against the flat histogram.
//! - **Mean**: z-score of the sample mean against 1/2.
//! - **Variance**: relative deviation from 1/12.
//! - **Independence**: z-score of the lag-1 autocorrelation against 0.

use serde::Serialize;

/// Histogram bins for the chi-square test.
pub const BINS: usize = 10;

/// Chi-square critical value for 9 degrees of freedom at p = 0.001.
const CHI2_CRITICAL_DF9: f64 = 27.877;

const UNIFORM_MEAN: f64 = 0.5;
const UNIFORM_VARIANCE: f64 = 1.0 / 12.0;

/// Statistics for one run of pool output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    /// Values summarized.
    pub samples: usize,
    /// Sample mean (ideal 0.5).
    pub mean: f64,
    /// Population variance (ideal 1/12).
    pub variance: f64,
    /// [`BINS`]-bin chi-square against the flat histogram.
    pub chi_square: f64,
    /// Correlation of each value with its successor (ideal 0).
    pub lag1_autocorrelation: f64,
    /// Weighted score, 0 to 100.
    pub quality_score: f64,
    /// Letter grade A through F.
    pub grade: char,
}

/// Summarize a run of pool output.
pub fn summarize(values: &[f64]) -> QualityReport {
    if values.len() < 16 {
        return QualityReport {
            samples: values.len(),
            mean: 0.0,
            variance: 0.0,
            chi_square: 0.0,
            lag1_autocorrelation: 0.0,
            quality_score: 0.0,
            grade: 'F',
        };
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let chi_square = chi_square_uniform(values);
    let lag1 = lag1_autocorrelation(values, mean);

    let uniformity = 1.0 - ((chi_square - (BINS - 1) as f64).max(0.0)
        / (CHI2_CRITICAL_DF9 - (BINS - 1) as f64));
    let mean_z = (mean - UNIFORM_MEAN).abs() / (UNIFORM_VARIANCE / n).sqrt();
    let variance_dev = (variance - UNIFORM_VARIANCE).abs() / UNIFORM_VARIANCE;
    let lag_z = lag1.abs() * n.sqrt();

    let score = uniformity.clamp(0.0, 1.0) * 40.0
        + z_score_credit(mean_z) * 20.0
        + (1.0 - variance_dev * 5.0).clamp(0.0, 1.0) * 20.0
        + z_score_credit(lag_z) * 20.0;

    let grade = if score >= 80.0 {
        'A'
    } else if score >= 60.0 {
        'B'
    } else if score >= 40.0 {
        'C'
    } else if score >= 20.0 {
        'D'
    } else {
        'F'
    };

    QualityReport {
        samples: values.len(),
        mean,
        variance,
        chi_square,
        lag1_autocorrelation: lag1,
        quality_score: score,
        grade,
    }
}

/// Full credit within two standard errors, none beyond four.
fn z_score_credit(z: f64) -> f64 {
    (1.0 - (z - 2.0).max(0.0) / 2.0).clamp(0.0, 1.0)
}

/// Chi-square statistic of a [`BINS`]-bin histogram against uniform.
pub fn chi_square_uniform(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; BINS];
    for &v in values {
        let bin = ((v.clamp(0.0, 1.0) * BINS as f64) as usize).min(BINS - 1);
        counts[bin] += 1;
    }
    let expected = values.len() as f64 / BINS as f64;
    counts
        .iter()
        .map(|&c| {
            let d = c as f64 - expected;
            d * d / expected
        })
        .sum()
}

/// Lag-1 autocorrelation. A constant series is perfectly predictable and
/// reports 1.0.
fn lag1_autocorrelation(values: &[f64], mean: f64) -> f64 {
    let denom: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    if denom == 0.0 {
        return 1.0;
    }
    let num: f64 = values
        .windows(2)
        .map(|w| (w[0] - mean) * (w[1] - mean))
        .sum();
    num / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_short_input_grades_f() {
        let r = summarize(&[0.5; 8]);
        assert_eq!(r.samples, 8);
        assert_eq!(r.grade, 'F');
    }

    #[test]
    fn test_uniform_stream_scores_well() {
        let mut rng = StdRng::seed_from_u64(17);
        let values: Vec<f64> = (0..10_000).map(|_| rng.random::<f64>()).collect();
        let r = summarize(&values);
        assert!((r.mean - 0.5).abs() < 0.02);
        assert!((r.variance - UNIFORM_VARIANCE).abs() < 0.005);
        assert!(r.lag1_autocorrelation.abs() < 0.05);
        assert!(r.quality_score >= 60.0, "score {}", r.quality_score);
    }

    #[test]
    fn test_constant_stream_grades_f() {
        let r = summarize(&[0.3; 1000]);
        assert!(r.lag1_autocorrelation > 0.99);
        assert_eq!(r.grade, 'F', "score {}", r.quality_score);
    }

    #[test]
    fn test_ramp_is_flagged_as_dependent() {
        let values: Vec<f64> = (0..1000).map(|i| (i as f64 + 0.5) / 1000.0).collect();
        let r = summarize(&values);
        assert!(r.chi_square < 1e-9);
        assert!(r.lag1_autocorrelation > 0.9);
        assert!(r.quality_score <= 80.0 + 1e-9);
    }

    #[test]
    fn test_chi_square_counts_upper_edge() {
        // 1.0 lands in the last bin rather than overflowing.
        let mut values = vec![1.0; 10];
        values.extend((0..90).map(|i| (i % 9) as f64 / 10.0 + 0.05));
        assert!(chi_square_uniform(&values) < 1e-9);
    }
}
