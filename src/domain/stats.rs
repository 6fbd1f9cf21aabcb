//! Descriptive statistics shared by the analytics engines.
//!
//! Dispersion defaults to the population convention (divide by n) unless a
//! function says otherwise.

use statrs::consts::SQRT_2PI;
use statrs::function::erf::erfc_inv;

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population variance.
pub fn variance(xs: &[f64]) -> f64 {
    central_moment(xs, 2)
}

/// Population standard deviation.
pub fn std_dev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

/// Sample variance (divide by n - 1).
pub fn sample_variance(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64
}

/// Sample covariance (divide by n - 1). Slices must have equal length.
pub fn sample_covariance(xs: &[f64], ys: &[f64]) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.len() < 2 {
        return f64::NAN;
    }
    let (mx, my) = (mean(xs), mean(ys));
    xs.iter()
        .zip(ys)
        .map(|(x, y)| (x - mx) * (y - my))
        .sum::<f64>()
        / (xs.len() - 1) as f64
}

fn central_moment(xs: &[f64], k: i32) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(k)).sum::<f64>() / xs.len() as f64
}

/// Bias-adjusted sample skewness (adjusted Fisher-Pearson).
///
/// Zero for fewer than 3 observations or zero variance.
pub fn skewness(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if xs.len() < 3 {
        return 0.0;
    }
    let m2 = central_moment(xs, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    let g1 = central_moment(xs, 3) / m2.powf(1.5);
    g1 * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

/// Bias-adjusted sample excess kurtosis.
///
/// Zero for fewer than 4 observations or zero variance.
pub fn excess_kurtosis(xs: &[f64]) -> f64 {
    let n = xs.len() as f64;
    if xs.len() < 4 {
        return 0.0;
    }
    let m2 = central_moment(xs, 2);
    if m2 == 0.0 {
        return 0.0;
    }
    let g2 = central_moment(xs, 4) / (m2 * m2) - 3.0;
    ((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0))
}

/// Quantile of an ascending-sorted slice at probability `p`, linearly
/// interpolating between order statistics at rank `(n - 1) * p`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Inverse standard normal CDF.
pub fn normal_quantile(p: f64) -> f64 {
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}

/// Standard normal density.
pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / SQRT_2PI
}

pub fn sorted_ascending(xs: &[f64]) -> Vec<f64> {
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn population_std_known_values() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(std_dev(&xs), 2.0, epsilon = 1e-12);
        assert_relative_eq!(variance(&xs), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn sample_variance_uses_n_minus_one() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(sample_variance(&xs), 5.0 / 3.0, epsilon = 1e-12);
        assert!(sample_variance(&[1.0]).is_nan());
    }

    #[test]
    fn covariance_of_scaled_series() {
        let xs = [0.01, -0.02, 0.03, 0.005];
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x).collect();
        assert_relative_eq!(
            sample_covariance(&ys, &xs),
            3.0 * sample_variance(&xs),
            epsilon = 1e-15
        );
    }

    #[test]
    fn skewness_matches_reference() {
        // Adjusted Fisher-Pearson skewness of [1, 2, 3, 10].
        let xs = [1.0, 2.0, 3.0, 10.0];
        assert_relative_eq!(skewness(&xs), 1.763633, epsilon = 1e-6);
    }

    #[test]
    fn kurtosis_matches_reference() {
        // Bias-adjusted excess kurtosis of [1, 2, 3, 10].
        let xs = [1.0, 2.0, 3.0, 10.0];
        assert_relative_eq!(excess_kurtosis(&xs), 3.228, epsilon = 1e-9);
    }

    #[test]
    fn symmetric_data_has_zero_skew() {
        let xs = [-2.0, -1.0, 0.0, 1.0, 2.0];
        assert!(skewness(&xs).abs() < 1e-12);
    }

    #[test]
    fn constant_data_has_zero_higher_moments() {
        let xs = [0.0; 10];
        assert_eq!(skewness(&xs), 0.0);
        assert_eq!(excess_kurtosis(&xs), 0.0);
    }

    #[test]
    fn normal_quantile_known_values() {
        assert_relative_eq!(normal_quantile(0.5), 0.0, epsilon = 1e-12);
        assert_relative_eq!(normal_quantile(0.95), 1.6448536269514722, epsilon = 1e-9);
        assert_relative_eq!(normal_quantile(0.05), -1.6448536269514722, epsilon = 1e-9);
        assert_relative_eq!(normal_quantile(0.99), 2.3263478740408408, epsilon = 1e-9);
    }

    #[test]
    fn normal_pdf_at_zero() {
        assert_relative_eq!(normal_pdf(0.0), 0.3989422804014327, epsilon = 1e-15);
    }

    #[test]
    fn quantile_interpolates_linearly() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(quantile_sorted(&sorted, 0.5), 3.0);
        assert_relative_eq!(quantile_sorted(&sorted, 0.95), 4.8, epsilon = 1e-12);
        assert_relative_eq!(quantile_sorted(&sorted, 0.0), 1.0);
        assert_relative_eq!(quantile_sorted(&sorted, 1.0), 5.0);
    }
}
