//! Lookup table from unified intensity to T1
//!
//! The forward signal equation is tabulated on a uniform T1 grid over its
//! monotonically decreasing segment; inversion is a binary search followed by
//! linear interpolation. Interpolation error is bounded by the grid spacing.

use tracing::debug;

use crate::params::AcquisitionParameters;
use crate::signal::unified_intensity;

use super::linspace;

/// Tabulated intensity-to-T1 mapping for one parameter set
#[derive(Clone, Debug)]
pub struct LookupTable {
    /// T1 grid in seconds, ascending
    t1: Vec<f64>,
    /// Unified intensity at each grid point, non-increasing
    intensity: Vec<f64>,
}

impl LookupTable {
    /// Tabulate `points` T1 values in `[t1_short, t1_long]`.
    ///
    /// The caller guarantees the forward model is non-increasing on this
    /// interval (see [`super::T1Inverter::new`]) and `points >= 2`.
    pub(crate) fn build(params: &AcquisitionParameters, t1_short: f64, t1_long: f64, points: usize) -> Self {
        let t1 = linspace(t1_short, t1_long, points);
        let intensity: Vec<f64> = t1.iter().map(|&t| unified_intensity(params, t)).collect();
        debug!(
            points,
            t1_short,
            t1_long,
            intensity_max = intensity[0],
            intensity_min = intensity[points - 1],
            "built MP2RAGE lookup table"
        );
        Self { t1, intensity }
    }

    /// T1 for a unified value, clamped to the table ends outside its range
    pub fn lookup(&self, uni: f64) -> f64 {
        let last = self.t1.len() - 1;
        // First entry at or below `uni`
        let i = self.intensity.partition_point(|&v| v > uni);
        if i == 0 {
            return self.t1[0];
        }
        if i > last {
            return self.t1[last];
        }
        let (upper, lower) = (self.intensity[i - 1], self.intensity[i]);
        let frac = (upper - uni) / (upper - lower);
        self.t1[i - 1] + frac * (self.t1[i] - self.t1[i - 1])
    }

    pub fn t1_values(&self) -> &[f64] {
        &self.t1
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensity
    }

    pub fn len(&self) -> usize {
        self.t1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t1.is_empty()
    }

    /// T1 grid spacing in seconds
    pub fn spacing(&self) -> f64 {
        self.t1[1] - self.t1[0]
    }
}
