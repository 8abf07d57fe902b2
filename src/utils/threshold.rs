//! Automatic intensity thresholds for signal/background separation

/// Otsu's method for automatic threshold selection
///
/// Finds the histogram split maximizing the between-class variance. All
/// values take part, zeros included, and the threshold is returned at the
/// lower edge of the first bin of the upper class.
///
/// # Arguments
/// * `data` - Input data (e.g. flattened 3D image)
/// * `num_bins` - Number of histogram bins (typically 256)
///
/// # Returns
/// The optimal threshold value
pub fn otsu_threshold(data: &[f64], num_bins: usize) -> f64 {
    if data.is_empty() || num_bins == 0 {
        return 0.0;
    }

    let (min_val, max_val) = data
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if (max_val - min_val).abs() < 1e-10 {
        return min_val;
    }

    let bin_width = (max_val - min_val) / num_bins as f64;
    let mut histogram = vec![0usize; num_bins];
    for &v in data {
        let bin = (((v - min_val) / bin_width).floor() as usize).min(num_bins - 1);
        histogram[bin] += 1;
    }

    let total = data.len() as f64;
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut weight_low = 0.0;
    let mut weighted_low = 0.0;
    let mut best_variance = 0.0;
    let mut best_bin = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_low += count as f64;
        weighted_low += t as f64 * count as f64;
        let weight_high = total - weight_low;
        if weight_low == 0.0 {
            continue;
        }
        if weight_high == 0.0 {
            break;
        }

        let mean_low = weighted_low / weight_low;
        let mean_high = (weighted_total - weighted_low) / weight_high;
        let variance = weight_low * weight_high * (mean_low - mean_high).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_bin = t;
        }
    }

    min_val + (best_bin + 1) as f64 * bin_width
}

/// Threshold at the widest gap between consecutive sorted intensities
///
/// Only the sorted values between the `lower_cutoff` and `upper_cutoff`
/// quantiles are searched, which skips the long tails of background noise
/// and bright outliers. The threshold is the midpoint of the widest gap.
///
/// # Arguments
/// * `data` - Input data (e.g. smoothed magnitude image)
/// * `lower_cutoff`, `upper_cutoff` - Quantiles bounding the search, `0 <= lower < upper < 1`
///
/// # Returns
/// `None` when fewer than two values fall inside the search window
pub fn histogram_gap_threshold(data: &[f64], lower_cutoff: f64, upper_cutoff: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = data.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let lower = (lower_cutoff * n as f64).floor() as usize;
    let upper = ((upper_cutoff * n as f64).floor() as usize).min(n.saturating_sub(1));
    if upper <= lower {
        return None;
    }

    let window = &sorted[lower..=upper];
    let (gap_start, _) = window
        .windows(2)
        .enumerate()
        .map(|(i, w)| (i, w[1] - w[0]))
        .fold((0, f64::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    Some(0.5 * (window[gap_start] + window[gap_start + 1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bimodal() -> Vec<f64> {
        let mut data = Vec::new();
        for i in 0..100 {
            data.push(0.1 + 0.2 * (i as f64 / 100.0));
        }
        for i in 0..100 {
            data.push(0.7 + 0.2 * (i as f64 / 100.0));
        }
        data
    }

    #[test]
    fn test_otsu_threshold_bimodal() {
        let threshold = otsu_threshold(&bimodal(), 256);
        assert!(threshold > 0.29 && threshold < 0.71,
            "Threshold {} should be between the two clusters", threshold);
    }

    #[test]
    fn test_otsu_threshold_degenerate() {
        assert_eq!(otsu_threshold(&[], 256), 0.0);
        assert_eq!(otsu_threshold(&[5.0; 100], 256), 5.0);
    }

    #[test]
    fn test_gap_threshold_bimodal() {
        let threshold = histogram_gap_threshold(&bimodal(), 0.2, 0.85).unwrap();
        // Gap between 0.298 and 0.7
        assert!((threshold - 0.499).abs() < 1e-9, "got {}", threshold);
    }

    #[test]
    fn test_gap_threshold_ignores_tails() {
        // A far outlier above the upper quantile must not attract the threshold
        let mut data = bimodal();
        data.push(1000.0);
        let threshold = histogram_gap_threshold(&data, 0.2, 0.85).unwrap();
        assert!(threshold > 0.29 && threshold < 0.71);
    }

    #[test]
    fn test_gap_threshold_too_few_values() {
        assert_eq!(histogram_gap_threshold(&[], 0.2, 0.85), None);
        assert_eq!(histogram_gap_threshold(&[1.0], 0.2, 0.85), None);
        assert_eq!(histogram_gap_threshold(&[f64::NAN, 2.0], 0.2, 0.85), None);
    }
}
