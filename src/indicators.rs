//! Trend overlays for accuracy charts.
//!
//! The trend line is a centered moving average: element `i` is the mean of
//! every sample within `radius` of `i`, clipped at both ends of the series
//! rather than padded with zeros.

/// Radius used for chart trend lines: 5% of the series, at least 1.
pub fn trend_window(len: usize) -> usize {
    (len / 20).max(1)
}

/// Centered moving average with edge clipping.
pub fn centered_moving_average(values: &[f64], radius: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = Vec::with_capacity(n);
    if n == 0 {
        return out;
    }

    // Running window [lo, hi), grown and shrunk one sample at a time.
    let mut sum = 0.0;
    let mut lo = 0usize;
    let mut hi = 0usize;
    for i in 0..n {
        let want_lo = i.saturating_sub(radius);
        let want_hi = (i + radius).min(n - 1) + 1;
        while hi < want_hi {
            sum += values[hi];
            hi += 1;
        }
        while lo < want_lo {
            sum -= values[lo];
            lo += 1;
        }
        out.push(sum / (hi - lo) as f64);
    }
    out
}

/// Trend series for a chart: centered moving average with the default radius.
pub fn smooth_trend(values: &[f64]) -> Vec<f64> {
    centered_moving_average(values, trend_window(values.len()))
}
