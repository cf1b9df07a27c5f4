//! Descriptive statistics and the hypothesis tests used by profiling and
//! normalization. Inputs are non-null values.

use std::f64::consts::PI;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `ddof` delta degrees of freedom.
pub fn std(values: &[f64], ddof: usize) -> Option<f64> {
    let n = values.len();
    if n <= ddof {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (n - ddof) as f64).sqrt())
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Quantile with linear interpolation between closest ranks (numpy's default).
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted(values);
    Some(quantile_sorted(&sorted, q))
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Tukey fences `[Q1 - k*IQR, Q3 + k*IQR]`
pub fn iqr_bounds(values: &[f64], k: f64) -> Option<(f64, f64)> {
    let q1 = quantile(values, 0.25)?;
    let q3 = quantile(values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - k * iqr, q3 + k * iqr))
}

/// Central moment of order `k` (biased)
fn moment(values: &[f64], m: f64, k: i32) -> f64 {
    values.iter().map(|v| (v - m).powi(k)).sum::<f64>() / values.len() as f64
}

/// D'Agostino and Pearson's omnibus normality test.
///
/// Returns the p-value, or `None` with fewer than 8 values or zero variance.
pub fn normaltest(values: &[f64]) -> Option<f64> {
    if values.len() < 8 {
        return None;
    }
    let n = values.len() as f64;
    let m = mean(values)?;
    let m2 = moment(values, m, 2);
    if m2 == 0.0 {
        return None;
    }
    let skew = moment(values, m, 3) / m2.powf(1.5);
    let kurt = moment(values, m, 4) / (m2 * m2);

    let zs = skew_z(skew, n);
    let zk = kurtosis_z(kurt, n);
    let k2 = zs * zs + zk * zk;

    // Chi-squared survival function with two degrees of freedom
    let p = (-k2 / 2.0).exp();
    p.is_finite().then_some(p)
}

fn skew_z(b2: f64, n: f64) -> f64 {
    let y = b2 * (((n + 1.0) * (n + 3.0)) / (6.0 * (n - 2.0))).sqrt();
    let beta2 = (3.0 * (n * n + 27.0 * n - 70.0) * (n + 1.0) * (n + 3.0))
        / ((n - 2.0) * (n + 5.0) * (n + 7.0) * (n + 9.0));
    let w2 = -1.0 + (2.0 * (beta2 - 1.0)).sqrt();
    let delta = 1.0 / (0.5 * w2.ln()).sqrt();
    let alpha = (2.0 / (w2 - 1.0)).sqrt();
    let y = if y == 0.0 { 1.0 } else { y };
    delta * (y / alpha + ((y / alpha).powi(2) + 1.0).sqrt()).ln()
}

fn kurtosis_z(b2: f64, n: f64) -> f64 {
    let e = 3.0 * (n - 1.0) / (n + 1.0);
    let var_b2 = 24.0 * n * (n - 2.0) * (n - 3.0)
        / ((n + 1.0).powi(2) * (n + 3.0) * (n + 5.0));
    let x = (b2 - e) / var_b2.sqrt();
    let sqrt_beta1 = 6.0 * (n * n - 5.0 * n + 2.0) / ((n + 7.0) * (n + 9.0))
        * ((6.0 * (n + 3.0) * (n + 5.0)) / (n * (n - 2.0) * (n - 3.0))).sqrt();
    let a = 6.0
        + 8.0 / sqrt_beta1 * (2.0 / sqrt_beta1 + (1.0 + 4.0 / sqrt_beta1.powi(2)).sqrt());
    let term1 = 1.0 - 2.0 / (9.0 * a);
    let denom = 1.0 + x * (2.0 / (a - 4.0)).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    let term2 = denom.signum() * ((1.0 - 2.0 / a) / denom.abs()).powf(1.0 / 3.0);
    (term1 - term2) / (2.0 / (9.0 * a)).sqrt()
}

/// Two-sample Kolmogorov-Smirnov test; returns `(statistic, p_value)`.
///
/// The p-value uses the asymptotic Kolmogorov distribution with Stephens'
/// small-sample correction. Empty samples give `(0.0, 1.0)`.
pub fn ks_2samp(a: &[f64], b: &[f64]) -> (f64, f64) {
    if a.is_empty() || b.is_empty() {
        return (0.0, 1.0);
    }
    let a = sorted(a);
    let b = sorted(b);
    let (n1, n2) = (a.len() as f64, b.len() as f64);

    let (mut i, mut j) = (0usize, 0usize);
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let x = a[i].min(b[j]);
        while i < a.len() && a[i] <= x {
            i += 1;
        }
        while j < b.len() && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n1 - j as f64 / n2).abs());
    }

    let en = (n1 * n2 / (n1 + n2)).sqrt();
    let p = kolmogorov_sf((en + 0.12 + 0.11 / en) * d);
    (d, p)
}

/// Survival function of the Kolmogorov distribution.
fn kolmogorov_sf(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let p = if lambda < 1.18 {
        let y = (-PI * PI / (8.0 * lambda * lambda)).exp();
        let cdf = (2.0 * PI).sqrt() / lambda * (y + y.powi(9) + y.powi(25) + y.powi(49));
        1.0 - cdf
    } else {
        let x = (-2.0 * lambda * lambda).exp();
        2.0 * (x - x.powi(4) + x.powi(9) - x.powi(16))
    };
    p.clamp(0.0, 1.0)
}

/// Population Stability Index over `bins` equal-width bins.
///
/// Bin edges span the expected (baseline) sample; actual values outside that
/// range fall into the end bins.
pub fn psi(expected: &[f64], actual: &[f64], bins: usize) -> f64 {
    if expected.is_empty() || actual.is_empty() || bins == 0 {
        return 0.0;
    }
    let (mut lo, mut hi) = match (min(expected), max(expected)) {
        (Some(lo), Some(hi)) => (lo, hi),
        _ => return 0.0,
    };
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / bins as f64;

    let shares = |values: &[f64]| -> Vec<f64> {
        let mut counts = vec![0usize; bins];
        for v in values {
            let idx = ((v - lo) / width).floor();
            let idx = if idx < 0.0 { 0 } else { (idx as usize).min(bins - 1) };
            counts[idx] += 1;
        }
        counts
            .into_iter()
            .map(|c| c as f64 / values.len() as f64)
            .collect()
    };

    const EPS: f64 = 1e-8;
    shares(expected)
        .into_iter()
        .zip(shares(actual))
        .map(|(e, a)| (e - a) * ((e + EPS) / (a + EPS)).ln())
        .sum()
}

/// Winsorize both tails: the lowest `floor(lower * n)` values take the next
/// value up and the highest `floor(upper * n)` take the next value down.
pub fn winsorize(values: &[f64], lower: f64, upper: f64) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let low_count = (lower * n as f64).floor() as usize;
    let up_count = (upper * n as f64).floor() as usize;
    let mut out = values.to_vec();

    if low_count > 0 && low_count < n {
        let floor_value = values[order[low_count]];
        for &idx in &order[..low_count] {
            out[idx] = floor_value;
        }
    }
    if up_count > 0 && up_count < n {
        let upper_idx = n - up_count;
        let ceil_value = values[order[upper_idx - 1]];
        for &idx in &order[upper_idx..] {
            out[idx] = ceil_value;
        }
    }
    out
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_mean_std_median() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        assert!(approx(std(&values, 0).unwrap(), 2.0, 1e-12));
        assert!(approx(std(&values, 1).unwrap(), 2.138089935299395, 1e-12));
        assert_eq!(median(&values), Some(4.5));
        assert_eq!(std(&[1.0], 1), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.25), Some(1.75));
        assert_eq!(quantile(&values, 0.75), Some(3.25));
        assert_eq!(iqr_bounds(&values, 1.5), Some((-0.5, 5.5)));
    }

    #[test]
    fn test_normaltest_flags_skewed_data() {
        let normalish = [
            -1.2, -0.8, -0.5, -0.3, -0.1, 0.0, 0.1, 0.2, 0.4, 0.6, 0.9, 1.3, -0.2, 0.3, -0.6,
            0.7, -1.0, 1.1, 0.05, -0.05,
        ];
        let p = normaltest(&normalish).unwrap();
        assert!(p > 0.05, "p = {}", p);

        let mut skewed: Vec<f64> = vec![1.0; 30];
        skewed.extend([2.0, 2.0, 3.0, 50.0, 100.0]);
        let p = normaltest(&skewed).unwrap();
        assert!(p < 0.05, "p = {}", p);

        assert_eq!(normaltest(&[1.0; 10]), None);
        assert_eq!(normaltest(&[1.0, 2.0]), None);
    }

    #[test]
    fn test_ks_identical_and_shifted() {
        let a: Vec<f64> = (0..50).map(f64::from).collect();
        let (d, p) = ks_2samp(&a, &a);
        assert_eq!(d, 0.0);
        assert_eq!(p, 1.0);

        let b: Vec<f64> = (100..150).map(f64::from).collect();
        let (d, p) = ks_2samp(&a, &b);
        assert_eq!(d, 1.0);
        assert!(p < 0.001);
    }

    #[test]
    fn test_psi_identical_is_zero_and_shift_is_large() {
        let a: Vec<f64> = (0..100).map(f64::from).collect();
        assert!(approx(psi(&a, &a, 10), 0.0, 1e-12));

        let shifted: Vec<f64> = (60..160).map(f64::from).collect();
        assert!(psi(&a, &shifted, 10) > 0.2);

        assert_eq!(psi(&[], &a, 10), 0.0);
    }

    #[test]
    fn test_winsorize_clips_tails() {
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        let out = winsorize(&values, 0.05, 0.05);
        assert_eq!(out[0], 2.0);
        assert_eq!(out[19], 19.0);
        assert_eq!(&out[1..19], &values[1..19]);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.123456, 4), 0.1235);
        assert_eq!(round_to(-1.00004, 4), -1.0);
    }
}
