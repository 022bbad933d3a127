//! Pure statistical kernel. Every function is total: degenerate input
//! (short series, zero variance, singular regressors) yields 0, never NaN.

/// Arithmetic mean. 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (N-1 denominator). 0.0 for fewer than 2 points.
pub fn stddev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n - 1) as f64).sqrt()
}

/// Pearson correlation of two equal-length series.
/// 0.0 when n < 2, lengths differ, or either series is constant.
pub fn correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n < 2 || n != y.len() {
        return 0.0;
    }
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom <= 0.0 {
        return 0.0;
    }
    sxy / denom
}

/// Ordinary least squares of y on x: (slope, intercept, r_squared).
/// Zeros on degenerate input (n < 2, mismatched lengths, constant x).
pub fn linear_regression(x: &[f64], y: &[f64]) -> (f64, f64, f64) {
    let n = x.len();
    if n < 2 || n != y.len() {
        return (0.0, 0.0, 0.0);
    }
    let mx = mean(x);
    let my = mean(y);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx <= 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    let r2 = if syy > 0.0 { (sxy * sxy) / (sxx * syy) } else { 0.0 };
    (slope, intercept, r2)
}

/// Recursive EMA with alpha = 2/(period+1), seeded from values[0].
/// 0.0 for an empty slice; period < 1 is treated as 1.
pub fn ema(values: &[f64], period: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let alpha = 2.0 / (period.max(1) as f64 + 1.0);
    let mut e = values[0];
    for v in &values[1..] {
        e = alpha * v + (1.0 - alpha) * e;
    }
    e
}

/// ADF-style regression: Δy(t) on y(t-1). Returns (slope, standard_error).
/// A significantly negative slope/SE ratio indicates mean reversion.
/// Zeros on singular input (n < 3 or constant lagged series) — never NaN.
pub fn ols_adf_like(y: &[f64]) -> (f64, f64) {
    let n = y.len();
    if n < 3 {
        return (0.0, 0.0);
    }
    // x = y lagged once, d = first difference
    let m = n - 1;
    let mut mx = 0.0;
    let mut md = 0.0;
    for i in 0..m {
        mx += y[i];
        md += y[i + 1] - y[i];
    }
    mx /= m as f64;
    md /= m as f64;

    let mut sxd = 0.0;
    let mut sxx = 0.0;
    for i in 0..m {
        let dx = y[i] - mx;
        let dd = (y[i + 1] - y[i]) - md;
        sxd += dx * dd;
        sxx += dx * dx;
    }
    if sxx <= 0.0 {
        return (0.0, 0.0);
    }
    let slope = sxd / sxx;
    let intercept = md - slope * mx;

    // Residual variance needs m - 2 degrees of freedom.
    if m < 3 {
        return (slope, 0.0);
    }
    let mut sse = 0.0;
    for i in 0..m {
        let d = y[i + 1] - y[i];
        let e = d - (intercept + slope * y[i]);
        sse += e * e;
    }
    let se = (sse / (m - 2) as f64 / sxx).sqrt();
    (slope, se)
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── mean / stddev ──

    /// Scenario: mean of [1, 2, 3, 4] and of an empty slice.
    /// Expected: 2.5 for the populated slice, 0.0 for empty.
    #[test]
    fn test_mean_basic_and_empty() {
        assert!((mean(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < 1e-12);
        assert_eq!(mean(&[]), 0.0);
    }

    /// Scenario: stddev of [2, 4, 4, 4, 5, 5, 7, 9] (classic textbook series).
    /// Expected: Sample stddev = sqrt(32/7) ≈ 2.138 (N-1 denominator).
    #[test]
    fn test_stddev_sample() {
        let s = stddev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((s - (32.0_f64 / 7.0).sqrt()).abs() < 1e-12, "s = {}", s);
    }

    /// Scenario: stddev of a single element and of an empty slice.
    /// Expected: 0.0 for both — sample stddev needs at least 2 points.
    #[test]
    fn test_stddev_degenerate() {
        assert_eq!(stddev(&[5.0]), 0.0);
        assert_eq!(stddev(&[]), 0.0);
    }

    /// Scenario: stddev of a constant series.
    /// Expected: Exactly 0.0 — no variance, no NaN.
    #[test]
    fn test_stddev_constant() {
        assert_eq!(stddev(&[3.0; 10]), 0.0);
    }

    // ── correlation ──

    /// Scenario: Perfectly linear y = 2x + 1.
    /// Expected: Correlation is exactly +1.
    #[test]
    fn test_correlation_perfect_positive() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();
        assert!((correlation(&x, &y) - 1.0).abs() < 1e-12);
    }

    /// Scenario: y = -x.
    /// Expected: Correlation is exactly -1.
    #[test]
    fn test_correlation_perfect_negative() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| -v).collect();
        assert!((correlation(&x, &y) + 1.0).abs() < 1e-12);
    }

    /// Scenario: One series constant (zero variance), plus n<2 and mismatched lengths.
    /// Expected: 0.0 in every degenerate case — the denominator guard fires.
    #[test]
    fn test_correlation_degenerate() {
        assert_eq!(correlation(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(correlation(&[1.0], &[2.0]), 0.0);
        assert_eq!(correlation(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    // ── linear_regression ──

    /// Scenario: Exact line y = 3x - 2 over five points.
    /// Expected: slope 3, intercept -2, R² = 1.
    #[test]
    fn test_linreg_exact_line() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        let (slope, intercept, r2) = linear_regression(&x, &y);
        assert!((slope - 3.0).abs() < 1e-12);
        assert!((intercept + 2.0).abs() < 1e-12);
        assert!((r2 - 1.0).abs() < 1e-12);
    }

    /// Scenario: Constant x (vertical scatter) and an empty pair.
    /// Expected: All zeros — singular design matrix.
    #[test]
    fn test_linreg_degenerate() {
        assert_eq!(linear_regression(&[2.0, 2.0, 2.0], &[1.0, 5.0, 9.0]), (0.0, 0.0, 0.0));
        assert_eq!(linear_regression(&[], &[]), (0.0, 0.0, 0.0));
    }

    /// Scenario: Noisy but upward-sloping data.
    /// Expected: Positive slope, R² strictly between 0 and 1.
    #[test]
    fn test_linreg_noisy() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [1.1, 1.9, 3.2, 3.8, 5.3, 5.7];
        let (slope, _, r2) = linear_regression(&x, &y);
        assert!(slope > 0.8 && slope < 1.2, "slope = {}", slope);
        assert!(r2 > 0.9 && r2 < 1.0, "r2 = {}", r2);
    }

    // ── ema ──

    /// Scenario: EMA of a constant series.
    /// Expected: Equals the constant regardless of period.
    #[test]
    fn test_ema_constant() {
        assert!((ema(&[5.0; 20], 10) - 5.0).abs() < 1e-12);
    }

    /// Scenario: EMA([1, 2], period=3) — alpha = 2/(3+1) = 0.5, seeded from 1.
    /// Expected: 0.5*2 + 0.5*1 = 1.5 (hand-computed recursion).
    #[test]
    fn test_ema_hand_computed() {
        assert!((ema(&[1.0, 2.0], 3) - 1.5).abs() < 1e-12);
    }

    /// Scenario: Empty input; single element.
    /// Expected: 0.0 for empty; the element itself when seeded and never updated.
    #[test]
    fn test_ema_short_inputs() {
        assert_eq!(ema(&[], 10), 0.0);
        assert_eq!(ema(&[7.0], 10), 7.0);
    }

    /// Scenario: Rising series [1..10] with a short period.
    /// Expected: EMA lags the last value but exceeds the mean — recency weighting.
    #[test]
    fn test_ema_tracks_recent() {
        let vals: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let e = ema(&vals, 3);
        assert!(e > mean(&vals), "ema {} should exceed mean {}", e, mean(&vals));
        assert!(e < 10.0, "ema {} should lag the last value", e);
    }

    // ── ols_adf_like ──

    /// Scenario: Strongly mean-reverting AR(1) series y(t+1) = 0.2*y(t) + shock.
    /// Expected: Slope of Δy on lagged y is clearly negative (≈ -0.8) with finite SE.
    #[test]
    fn test_adf_mean_reverting() {
        // Deterministic AR(1) with phi = 0.2 from y0 = 10
        let mut y = vec![10.0];
        for _ in 0..30 {
            let last = *y.last().unwrap();
            y.push(0.2 * last + 0.1);
        }
        let (slope, se) = ols_adf_like(&y);
        assert!(slope < -0.5, "slope = {}", slope);
        assert!(se.is_finite());
    }

    /// Scenario: Constant series (lagged regressor has zero variance).
    /// Expected: (0, 0) — never NaN.
    #[test]
    fn test_adf_constant_series() {
        let (slope, se) = ols_adf_like(&[4.2; 15]);
        assert_eq!(slope, 0.0);
        assert_eq!(se, 0.0);
        assert!(!slope.is_nan() && !se.is_nan());
    }

    /// Scenario: Series shorter than 3 points.
    /// Expected: (0, 0) — not enough observations for the difference regression.
    #[test]
    fn test_adf_too_short() {
        assert_eq!(ols_adf_like(&[1.0, 2.0]), (0.0, 0.0));
        assert_eq!(ols_adf_like(&[]), (0.0, 0.0));
    }

    /// Scenario: Random-walk-like drifting series (pure trend).
    /// Expected: Slope near zero — differences do not depend on the level.
    #[test]
    fn test_adf_trending_series() {
        let y: Vec<f64> = (0..40).map(|i| 100.0 + i as f64 * 0.5).collect();
        let (slope, _) = ols_adf_like(&y);
        assert!(slope.abs() < 1e-9, "slope = {}", slope);
    }

    /// Scenario: correlation(x, y) against correlation(y, x).
    /// Expected: Identical — Pearson is symmetric.
    #[test]
    fn test_correlation_symmetric() {
        let x = [1.0, 3.0, 2.0, 5.0, 4.0];
        let y = [2.0, 1.0, 4.0, 3.0, 6.0];
        assert!((correlation(&x, &y) - correlation(&y, &x)).abs() < 1e-15);
    }

    /// Scenario: EMA with period 1 (alpha = 1).
    /// Expected: Tracks the latest value exactly.
    #[test]
    fn test_ema_period_one() {
        assert!((ema(&[1.0, 5.0, 2.0, 9.0], 1) - 9.0).abs() < 1e-12);
    }

    /// Scenario: Oscillating stationary series around a fixed level.
    /// Expected: ADF slope negative (level pulls the next difference back)
    /// with a positive standard error.
    #[test]
    fn test_adf_oscillating_stationary() {
        let y: Vec<f64> = (0..50)
            .map(|i| 10.0 + if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let (slope, se) = ols_adf_like(&y);
        assert!(slope < -1.0, "slope = {}", slope);
        assert!(se >= 0.0 && se.is_finite());
    }
}
