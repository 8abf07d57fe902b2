//! Unified T1-weighted (UNI) signal combination
//!
//! The two complex inversion images are combined as
//!
//! ```text
//! UNI = Re(S1 * conj(S2)) / (|S1|^2 + |S2|^2)
//! ```
//!
//! which cancels receive-coil sensitivity, proton density and T2* weighting
//! common to both inversions. The result always lies in [-0.5, 0.5].

use num_complex::Complex64;

use crate::params::PhaseScaling;

/// Upper end of the 12-bit range vendors store UNI images in
pub const UNI_SCANNER_MAX: f64 = 4095.0;

/// Scanner value corresponding to a unified signal of zero
pub const UNI_SCANNER_OFFSET: f64 = 2048.0;

/// Magnitude and phase of one voxel at both inversion times
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VoxelMeasurement {
    pub inv1_magnitude: f64,
    /// Radians
    pub inv1_phase: f64,
    pub inv2_magnitude: f64,
    /// Radians
    pub inv2_phase: f64,
}

impl VoxelMeasurement {
    pub fn new(inv1_magnitude: f64, inv1_phase: f64, inv2_magnitude: f64, inv2_phase: f64) -> Self {
        Self { inv1_magnitude, inv1_phase, inv2_magnitude, inv2_phase }
    }

    /// Build from raw phase values, converting them to radians with `scaling`
    pub fn from_raw(
        inv1_magnitude: f64,
        inv1_phase_raw: f64,
        inv2_magnitude: f64,
        inv2_phase_raw: f64,
        scaling: &PhaseScaling,
    ) -> Self {
        Self::new(
            inv1_magnitude,
            scaling.to_radians(inv1_phase_raw),
            inv2_magnitude,
            scaling.to_radians(inv2_phase_raw),
        )
    }

    /// Complex signals (S1, S2)
    pub fn signals(&self) -> (Complex64, Complex64) {
        (
            Complex64::from_polar(self.inv1_magnitude, self.inv1_phase),
            Complex64::from_polar(self.inv2_magnitude, self.inv2_phase),
        )
    }
}

/// Unified signal of a single voxel.
///
/// Returns 0 when both magnitudes are zero.
#[inline]
pub fn combine(measurement: &VoxelMeasurement) -> f64 {
    let (s1, s2) = measurement.signals();
    combine_signals(s1, s2)
}

/// Unified signal of two complex inversion signals
#[inline]
pub fn combine_signals(s1: Complex64, s2: Complex64) -> f64 {
    let denominator = s1.norm_sqr() + s2.norm_sqr();
    if denominator == 0.0 {
        return 0.0;
    }
    ((s1 * s2.conj()).re / denominator).clamp(-0.5, 0.5)
}

/// Unified signal of two real-valued (phase-free) signals
#[inline]
pub fn combine_real(s1: f64, s2: f64) -> f64 {
    let denominator = s1 * s1 + s2 * s2;
    if denominator == 0.0 {
        return 0.0;
    }
    (s1 * s2 / denominator).clamp(-0.5, 0.5)
}

/// Convert a unified value to the scanner's [0, 4095] range
#[inline]
pub fn to_scanner_units(uni: f64) -> f64 {
    (uni * UNI_SCANNER_MAX + UNI_SCANNER_OFFSET).clamp(0.0, UNI_SCANNER_MAX)
}

/// Convert a scanner UNI value back to [-0.5, 0.5]
#[inline]
pub fn from_scanner_units(value: f64) -> f64 {
    (value - UNI_SCANNER_OFFSET) / UNI_SCANNER_MAX
}
