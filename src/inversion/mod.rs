//! T1 estimation from the unified signal
//!
//! Inverts the MP2RAGE forward model over its monotonically decreasing
//! segment. Two strategies are available:
//! - Root finding: bisection of the forward model per value (exact to tolerance)
//! - Lookup table: interpolation in a precomputed table (fast, grid-limited)
//!
//! Values outside the achievable intensity range are clamped to the nearest
//! end of the T1 bracket and flagged rather than rejected.

pub mod lut;
pub mod root;

pub use lut::LookupTable;
pub use root::bisect_decreasing;

use tracing::debug;

use crate::error::{Mp2rageError, Result};
use crate::params::AcquisitionParameters;
use crate::signal::unified_intensity;

/// How the forward model is inverted
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InversionStrategy {
    /// Per-value bisection of the forward model
    RootFinding {
        /// Absolute T1 tolerance in seconds
        tolerance: f64,
        max_iterations: usize,
    },
    /// Interpolation in a table of `points` T1 samples
    LookupTable { points: usize },
}

impl InversionStrategy {
    pub fn root_finding() -> Self {
        InversionStrategy::RootFinding { tolerance: 1e-6, max_iterations: 200 }
    }

    pub fn lookup_table() -> Self {
        InversionStrategy::LookupTable { points: 4000 }
    }
}

impl Default for InversionStrategy {
    fn default() -> Self {
        Self::root_finding()
    }
}

/// Parameters for T1 inversion
#[derive(Clone, Debug, PartialEq)]
pub struct InversionConfig {
    /// Searched T1 range [min, max] in seconds (default [0.05, 5.0])
    pub t1_range: [f64; 2],
    /// Number of forward-model evaluations used to locate the monotonic
    /// segment inside `t1_range` (default 2000)
    pub scan_points: usize,
    pub strategy: InversionStrategy,
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            t1_range: [0.05, 5.0],
            scan_points: 2000,
            strategy: InversionStrategy::default(),
        }
    }
}

impl InversionConfig {
    pub fn with_strategy(strategy: InversionStrategy) -> Self {
        Self { strategy, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Mp2rageError::InvalidConfig(msg));
        let [lo, hi] = self.t1_range;
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && hi > lo) {
            return invalid(format!("T1 range [{}, {}] must be positive and increasing", lo, hi));
        }
        if self.scan_points < 3 {
            return invalid(format!("need at least 3 scan points, got {}", self.scan_points));
        }
        match self.strategy {
            InversionStrategy::RootFinding { tolerance, max_iterations } => {
                if !(tolerance.is_finite() && tolerance > 0.0) || max_iterations == 0 {
                    return invalid(format!(
                        "root finding needs a positive tolerance and iterations, got {} / {}",
                        tolerance, max_iterations
                    ));
                }
            }
            InversionStrategy::LookupTable { points } => {
                if points < 2 {
                    return invalid(format!("lookup table needs at least 2 points, got {}", points));
                }
            }
        }
        Ok(())
    }
}

/// Outcome of inverting one unified value
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InversionStatus {
    Valid,
    /// Above the achievable maximum; clamped to the shortest T1
    AboveRange,
    /// Below the achievable minimum; clamped to the longest T1
    BelowRange,
    /// NaN or infinite input; T1 set to 0
    NotFinite,
}

/// T1 estimate in seconds together with its validity
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct T1Estimate {
    pub t1: f64,
    pub status: InversionStatus,
}

impl T1Estimate {
    pub fn is_valid(&self) -> bool {
        self.status == InversionStatus::Valid
    }
}

#[derive(Clone, Debug)]
enum Method {
    RootFinding { tolerance: f64, max_iterations: usize },
    LookupTable(LookupTable),
}

/// Reusable inverse of the forward model for one parameter set.
///
/// Construction scans the forward model once (and builds the lookup table if
/// selected); `invert` is then cheap and the inverter can be shared across
/// threads.
#[derive(Clone, Debug)]
pub struct T1Inverter {
    params: AcquisitionParameters,
    strategy: InversionStrategy,
    /// T1 at the intensity maximum and minimum
    t1_bounds: [f64; 2],
    /// Achievable intensity [min, max]
    intensity_bounds: [f64; 2],
    method: Method,
}

impl T1Inverter {
    pub fn new(params: &AcquisitionParameters, config: &InversionConfig) -> Result<Self> {
        config.validate()?;
        let (t1_bounds, intensity_bounds) = monotonic_segment(params, config)?;
        debug!(
            t1_short = t1_bounds[0],
            t1_long = t1_bounds[1],
            intensity_min = intensity_bounds[0],
            intensity_max = intensity_bounds[1],
            "located monotonic segment of MP2RAGE signal"
        );

        let method = match config.strategy {
            InversionStrategy::RootFinding { tolerance, max_iterations } => {
                Method::RootFinding { tolerance, max_iterations }
            }
            InversionStrategy::LookupTable { points } => {
                Method::LookupTable(LookupTable::build(params, t1_bounds[0], t1_bounds[1], points))
            }
        };

        Ok(Self {
            params: params.clone(),
            strategy: config.strategy,
            t1_bounds,
            intensity_bounds,
            method,
        })
    }

    /// Estimate T1 for one unified value in [-0.5, 0.5]
    pub fn invert(&self, uni: f64) -> T1Estimate {
        let [t1_short, t1_long] = self.t1_bounds;
        let [min, max] = self.intensity_bounds;

        if !uni.is_finite() {
            return T1Estimate { t1: 0.0, status: InversionStatus::NotFinite };
        }
        if uni > max {
            return T1Estimate { t1: t1_short, status: InversionStatus::AboveRange };
        }
        if uni < min {
            return T1Estimate { t1: t1_long, status: InversionStatus::BelowRange };
        }

        let t1 = match &self.method {
            Method::RootFinding { tolerance, max_iterations } => bisect_decreasing(
                |t1| unified_intensity(&self.params, t1),
                uni,
                t1_short,
                t1_long,
                *tolerance,
                *max_iterations,
            ),
            Method::LookupTable(lut) => lut.lookup(uni),
        };
        T1Estimate { t1, status: InversionStatus::Valid }
    }

    pub fn parameters(&self) -> &AcquisitionParameters {
        &self.params
    }

    pub fn strategy(&self) -> InversionStrategy {
        self.strategy
    }

    /// T1 at the short and long end of the invertible segment (s)
    pub fn t1_bounds(&self) -> [f64; 2] {
        self.t1_bounds
    }

    /// Achievable unified intensity [min, max]
    pub fn intensity_bounds(&self) -> [f64; 2] {
        self.intensity_bounds
    }

    pub fn lookup_table(&self) -> Option<&LookupTable> {
        match &self.method {
            Method::LookupTable(lut) => Some(lut),
            Method::RootFinding { .. } => None,
        }
    }
}

/// Invert a single unified value with the default configuration.
///
/// Scans the forward model on every call; build a [`T1Inverter`] once when
/// inverting many values.
pub fn invert(uni: f64, params: &AcquisitionParameters) -> Result<T1Estimate> {
    Ok(T1Inverter::new(params, &InversionConfig::default())?.invert(uni))
}

/// `n` evenly spaced values from `start` to `end` inclusive
pub(crate) fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
    if let Some(last) = values.last_mut() {
        *last = end;
    }
    values
}

/// Index of the first sample not strictly below its predecessor.
///
/// Plateaus count: on a flat run the inverse is not unique.
fn first_non_decrease(values: &[f64]) -> Option<usize> {
    values.windows(2).position(|w| w[1] >= w[0])
}

/// Segment of the scanned T1 range between the intensity maximum and minimum.
///
/// Returns the T1 bounds [at max, at min] and intensity bounds [min, max].
fn monotonic_segment(
    params: &AcquisitionParameters,
    config: &InversionConfig,
) -> Result<([f64; 2], [f64; 2])> {
    let grid = linspace(config.t1_range[0], config.t1_range[1], config.scan_points);
    let intensity: Vec<f64> = grid.iter().map(|&t1| unified_intensity(params, t1)).collect();

    if let Some(i) = intensity.iter().position(|v| !v.is_finite()) {
        return Err(Mp2rageError::InvalidParameters(format!(
            "signal model is not finite at T1 = {} s",
            grid[i]
        )));
    }

    let mut i_max = 0;
    let mut i_min = 0;
    for (i, &v) in intensity.iter().enumerate() {
        if v > intensity[i_max] {
            i_max = i;
        }
        if v < intensity[i_min] {
            i_min = i;
        }
    }

    if i_max >= i_min {
        return Err(Mp2rageError::InvalidParameters(format!(
            "signal does not decrease with T1 over [{}, {}] s",
            config.t1_range[0], config.t1_range[1]
        )));
    }
    if let Some(w) = first_non_decrease(&intensity[i_max..=i_min]) {
        return Err(Mp2rageError::InvalidParameters(format!(
            "signal is not monotonic in T1 near {} s; T1 cannot be recovered uniquely",
            grid[i_max + w]
        )));
    }

    Ok((
        [grid[i_max], grid[i_min]],
        [intensity[i_min], intensity[i_max]],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SlabPartition;
    use approx::assert_abs_diff_eq;

    fn params_7t() -> AcquisitionParameters {
        AcquisitionParameters::new(
            6.723, [0.67, 3.855], [7.0, 6.0], SlabPartition::symmetric(150.0), [0.0062, 0.0062],
        )
        .unwrap()
    }

    fn params_3t() -> AcquisitionParameters {
        AcquisitionParameters::new(
            5.0, [0.7, 2.5], [4.0, 5.0], SlabPartition::partial_fourier(176.0, 0.75), [0.0071, 0.0071],
        )
        .unwrap()
    }

    const BRAIN_T1: [f64; 7] = [0.6, 0.85, 1.0, 1.35, 1.8, 2.2, 2.9];

    #[test]
    fn test_linspace() {
        let v = linspace(0.0, 1.0, 5);
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
    }

    #[test]
    fn test_first_non_decrease() {
        assert_eq!(first_non_decrease(&[0.4, 0.1, -0.2, -0.3]), None);
        assert_eq!(first_non_decrease(&[0.4, 0.1, 0.1, -0.3]), Some(1));
        assert_eq!(first_non_decrease(&[0.4, 0.1, 0.2]), Some(1));
        assert_eq!(first_non_decrease(&[0.4]), None);
    }

    #[test]
    fn test_segment_within_range() {
        let inverter = T1Inverter::new(&params_7t(), &InversionConfig::default()).unwrap();
        let [t1_short, t1_long] = inverter.t1_bounds();
        let [min, max] = inverter.intensity_bounds();
        assert!(t1_short >= 0.05 && t1_short < 0.6);
        assert!(t1_long > 2.9 && t1_long <= 5.0);
        assert!(min < max && min >= -0.5 && max <= 0.5);
    }

    #[test]
    fn test_root_finding_roundtrip() {
        for params in [params_7t(), params_3t()] {
            let inverter = T1Inverter::new(&params, &InversionConfig::default()).unwrap();
            for &t1 in &BRAIN_T1 {
                let est = inverter.invert(unified_intensity(&params, t1));
                assert!(est.is_valid());
                assert_abs_diff_eq!(est.t1, t1, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_lookup_table_roundtrip() {
        let params = params_7t();
        let config = InversionConfig::with_strategy(InversionStrategy::lookup_table());
        let inverter = T1Inverter::new(&params, &config).unwrap();
        let lut = inverter.lookup_table().expect("lookup table strategy builds a table");
        assert_eq!(lut.len(), 4000);
        for &t1 in &BRAIN_T1 {
            let est = inverter.invert(unified_intensity(&params, t1));
            assert!(est.is_valid());
            assert_abs_diff_eq!(est.t1, t1, epsilon = lut.spacing());
        }
    }

    #[test]
    fn test_strategies_agree() {
        let params = params_3t();
        let root = T1Inverter::new(&params, &InversionConfig::default()).unwrap();
        let table = T1Inverter::new(
            &params,
            &InversionConfig::with_strategy(InversionStrategy::LookupTable { points: 500 }),
        )
        .unwrap();
        let spacing = table.lookup_table().unwrap().spacing();
        assert!(root.lookup_table().is_none());

        let [min, max] = root.intensity_bounds();
        for i in 1..100 {
            let u = min + (max - min) * i as f64 / 100.0;
            let a = root.invert(u);
            let b = table.invert(u);
            assert!(a.is_valid() && b.is_valid());
            assert_abs_diff_eq!(a.t1, b.t1, epsilon = spacing);
        }
    }

    #[test]
    fn test_above_range_clamped() {
        let inverter = T1Inverter::new(&params_7t(), &InversionConfig::default()).unwrap();
        let [_, max] = inverter.intensity_bounds();
        let est = inverter.invert(max + 1e-3);
        assert_eq!(est.status, InversionStatus::AboveRange);
        assert!(!est.is_valid());
        assert_eq!(est.t1, inverter.t1_bounds()[0]);
    }

    #[test]
    fn test_below_range_clamped() {
        let inverter = T1Inverter::new(&params_7t(), &InversionConfig::default()).unwrap();
        let [min, _] = inverter.intensity_bounds();
        let est = inverter.invert(min - 1e-3);
        assert_eq!(est.status, InversionStatus::BelowRange);
        assert_eq!(est.t1, inverter.t1_bounds()[1]);
    }

    #[test]
    fn test_bounds_are_valid() {
        let inverter = T1Inverter::new(&params_7t(), &InversionConfig::default()).unwrap();
        let [min, max] = inverter.intensity_bounds();
        let [t1_short, t1_long] = inverter.t1_bounds();
        let hi = inverter.invert(max);
        let lo = inverter.invert(min);
        assert!(hi.is_valid() && lo.is_valid());
        assert_abs_diff_eq!(hi.t1, t1_short, epsilon = 1e-5);
        assert_abs_diff_eq!(lo.t1, t1_long, epsilon = 1e-5);
    }

    #[test]
    fn test_not_finite() {
        let inverter = T1Inverter::new(&params_7t(), &InversionConfig::default()).unwrap();
        let est = inverter.invert(f64::NAN);
        assert_eq!(est, T1Estimate { t1: 0.0, status: InversionStatus::NotFinite });
        assert_eq!(inverter.invert(f64::INFINITY).status, InversionStatus::NotFinite);
    }

    #[test]
    fn test_single_value_invert() {
        let params = params_3t();
        let est = invert(unified_intensity(&params, 1.35), &params).unwrap();
        assert!(est.is_valid());
        assert_abs_diff_eq!(est.t1, 1.35, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_config() {
        let params = params_7t();
        let bad_range = InversionConfig { t1_range: [2.0, 1.0], ..InversionConfig::default() };
        assert!(matches!(T1Inverter::new(&params, &bad_range), Err(Mp2rageError::InvalidConfig(_))));

        let bad_lut = InversionConfig::with_strategy(InversionStrategy::LookupTable { points: 1 });
        assert!(matches!(T1Inverter::new(&params, &bad_lut), Err(Mp2rageError::InvalidConfig(_))));

        let bad_tol = InversionConfig::with_strategy(InversionStrategy::RootFinding {
            tolerance: 0.0,
            max_iterations: 10,
        });
        assert!(bad_tol.validate().is_err());
    }

    #[test]
    fn test_narrow_range_inside_decreasing_segment() {
        let config = InversionConfig { t1_range: [1.0, 2.0], ..InversionConfig::default() };
        let inverter = T1Inverter::new(&params_7t(), &config).unwrap();
        assert_eq!(inverter.t1_bounds(), [1.0, 2.0]);
    }

    #[test]
    fn test_inverter_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<T1Inverter>();
    }
}
