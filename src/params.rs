//! MP2RAGE acquisition parameters
//!
//! Sequence timing, flip angles and readout geometry needed to evaluate the
//! MP2RAGE signal equation. Parameters are validated once on construction
//! (or deserialization) and are immutable afterwards.
//!
//! All times are in seconds, flip angles in degrees.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::{Mp2rageError, Result};

/// Inversion efficiency of the adiabatic inversion pulse as measured on a
/// Siemens system.
pub const DEFAULT_INVERSION_EFFICIENCY: f64 = 0.96;

/// Number of GRE excitations in a readout block before and after the
/// k-space centre.
///
/// For a slab of `n` partitions with partial Fourier factor `pf` the
/// partition is `before = n * (pf - 0.5)`, `after = n * 0.5`, so values may
/// be fractional.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlabPartition {
    pub before: f64,
    pub after: f64,
}

impl SlabPartition {
    pub fn new(before: f64, after: f64) -> Self {
        Self { before, after }
    }

    /// Centre-out split of `n` excitations, half before and half after the centre.
    pub fn symmetric(n: f64) -> Self {
        Self { before: n / 2.0, after: n / 2.0 }
    }

    /// Partition for a slab with the given partial Fourier factor in the slice direction.
    pub fn partial_fourier(slices_per_slab: f64, partial_fourier: f64) -> Self {
        Self {
            before: slices_per_slab * (partial_fourier - 0.5),
            after: slices_per_slab * 0.5,
        }
    }

    /// Total number of excitations per readout block
    pub fn total(&self) -> f64 {
        self.before + self.after
    }
}

/// Linear conversion from stored phase values to radians.
///
/// The unified signal only depends on the phase difference between the two
/// inversions, so only the slope affects results.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseScaling {
    /// Phase is already in radians
    Radians,
    /// radians = raw * slope + intercept
    Linear { slope: f64, intercept: f64 },
}

impl Default for PhaseScaling {
    fn default() -> Self {
        PhaseScaling::Radians
    }
}

impl PhaseScaling {
    /// Map the raw interval [min, max] linearly onto [-pi, pi].
    pub fn from_raw_range(min: f64, max: f64) -> Result<Self> {
        if !(min.is_finite() && max.is_finite()) || max <= min {
            return Err(Mp2rageError::InvalidParameters(format!(
                "phase range [{}, {}] must be finite and non-empty",
                min, max
            )));
        }
        let slope = 2.0 * PI / (max - min);
        Ok(PhaseScaling::Linear { slope, intercept: -PI - min * slope })
    }

    /// Siemens integer phase, stored in [-4096, 4096)
    pub fn siemens() -> Self {
        PhaseScaling::Linear { slope: PI / 4096.0, intercept: 0.0 }
    }

    #[inline]
    pub fn to_radians(&self, raw: f64) -> f64 {
        match *self {
            PhaseScaling::Radians => raw,
            PhaseScaling::Linear { slope, intercept } => raw * slope + intercept,
        }
    }

    fn validate(&self) -> Result<()> {
        if let PhaseScaling::Linear { slope, intercept } = *self {
            if !slope.is_finite() || slope == 0.0 || !intercept.is_finite() {
                return Err(Mp2rageError::InvalidParameters(format!(
                    "phase scaling slope {} / intercept {} must be finite with a non-zero slope",
                    slope, intercept
                )));
            }
        }
        Ok(())
    }
}

/// Sequence parameters of an MP2RAGE acquisition
///
/// Construct with [`AcquisitionParameters::new`] or deserialize from JSON
/// with [`AcquisitionParameters::from_json_str`]; both paths validate.
///
/// ```
/// use mp2rage_core::params::{AcquisitionParameters, SlabPartition};
///
/// let params = AcquisitionParameters::new(
///     5.0,
///     [0.7, 2.5],
///     [4.0, 5.0],
///     SlabPartition::partial_fourier(176.0, 0.75),
///     [0.0071, 0.0071],
/// ).unwrap();
/// assert_eq!(params.inversion_efficiency(), 0.96);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameters")]
pub struct AcquisitionParameters {
    mprage_tr: f64,
    inversion_times: [f64; 2],
    flip_angles_deg: [f64; 2],
    slices: SlabPartition,
    flash_tr: [f64; 2],
    inversion_efficiency: f64,
    phase_scaling: PhaseScaling,
}

/// Unvalidated serde mirror of [`AcquisitionParameters`]
#[derive(Deserialize)]
struct RawParameters {
    mprage_tr: f64,
    inversion_times: [f64; 2],
    flip_angles_deg: [f64; 2],
    slices: SlabPartition,
    flash_tr: [f64; 2],
    #[serde(default = "default_inversion_efficiency")]
    inversion_efficiency: f64,
    #[serde(default)]
    phase_scaling: PhaseScaling,
}

fn default_inversion_efficiency() -> f64 {
    DEFAULT_INVERSION_EFFICIENCY
}

impl TryFrom<RawParameters> for AcquisitionParameters {
    type Error = Mp2rageError;

    fn try_from(raw: RawParameters) -> Result<Self> {
        let params = AcquisitionParameters {
            mprage_tr: raw.mprage_tr,
            inversion_times: raw.inversion_times,
            flip_angles_deg: raw.flip_angles_deg,
            slices: raw.slices,
            flash_tr: raw.flash_tr,
            inversion_efficiency: raw.inversion_efficiency,
            phase_scaling: raw.phase_scaling,
        };
        params.validate()?;
        Ok(params)
    }
}

impl AcquisitionParameters {
    /// Create validated parameters with the default inversion efficiency and
    /// phase already in radians.
    ///
    /// # Arguments
    /// * `mprage_tr` - Time between successive inversion pulses (s)
    /// * `inversion_times` - Inversion times of the two readouts (s)
    /// * `flip_angles_deg` - Readout flip angles (degrees)
    /// * `slices` - Excitations before/after the k-space centre per readout block
    /// * `flash_tr` - GRE echo spacing of each readout block (s)
    pub fn new(
        mprage_tr: f64,
        inversion_times: [f64; 2],
        flip_angles_deg: [f64; 2],
        slices: SlabPartition,
        flash_tr: [f64; 2],
    ) -> Result<Self> {
        let params = Self {
            mprage_tr,
            inversion_times,
            flip_angles_deg,
            slices,
            flash_tr,
            inversion_efficiency: DEFAULT_INVERSION_EFFICIENCY,
            phase_scaling: PhaseScaling::Radians,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_inversion_efficiency(mut self, efficiency: f64) -> Result<Self> {
        self.inversion_efficiency = efficiency;
        self.validate()?;
        Ok(self)
    }

    pub fn with_phase_scaling(mut self, scaling: PhaseScaling) -> Result<Self> {
        self.phase_scaling = scaling;
        self.validate()?;
        Ok(self)
    }

    /// Parse and validate parameters from a JSON document
    ///
    /// Malformed JSON yields [`Mp2rageError::Config`]; well-formed but
    /// non-physical parameters yield [`Mp2rageError::InvalidParameters`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawParameters = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn mprage_tr(&self) -> f64 {
        self.mprage_tr
    }

    pub fn inversion_times(&self) -> [f64; 2] {
        self.inversion_times
    }

    pub fn flip_angles_deg(&self) -> [f64; 2] {
        self.flip_angles_deg
    }

    pub fn flip_angles_rad(&self) -> [f64; 2] {
        self.flip_angles_deg.map(f64::to_radians)
    }

    pub fn slices(&self) -> SlabPartition {
        self.slices
    }

    pub fn flash_tr(&self) -> [f64; 2] {
        self.flash_tr
    }

    pub fn inversion_efficiency(&self) -> f64 {
        self.inversion_efficiency
    }

    pub fn phase_scaling(&self) -> PhaseScaling {
        self.phase_scaling
    }

    /// Free-recovery delays [TD0, TD1, TD2] of one MP2RAGE cycle:
    /// inversion to first readout, between readouts, last readout to next inversion.
    pub fn recovery_delays(&self) -> [f64; 3] {
        let [ti1, ti2] = self.inversion_times;
        let [tr1, tr2] = self.flash_tr;
        let SlabPartition { before, after } = self.slices;
        [
            ti1 - before * tr1,
            ti2 - ti1 - (after * tr1 + before * tr2),
            self.mprage_tr - ti2 - after * tr2,
        ]
    }

    /// Check that all parameters are physical and the readout blocks fit
    /// into the inversion cycle.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Mp2rageError::InvalidParameters(msg));

        if !(self.mprage_tr.is_finite() && self.mprage_tr > 0.0) {
            return invalid(format!("MP2RAGE TR must be positive, got {}", self.mprage_tr));
        }
        let [ti1, ti2] = self.inversion_times;
        if !(ti1.is_finite() && ti2.is_finite() && ti1 > 0.0 && ti2 > 0.0) {
            return invalid(format!("inversion times must be positive, got [{}, {}]", ti1, ti2));
        }
        if ti2 <= ti1 {
            return invalid(format!("second inversion time {} must exceed the first {}", ti2, ti1));
        }
        for (i, &fa) in self.flip_angles_deg.iter().enumerate() {
            if !(fa.is_finite() && fa > 0.0 && fa < 180.0) {
                return invalid(format!("flip angle {} must lie in (0, 180) degrees, got {}", i + 1, fa));
            }
        }
        for (i, &tr) in self.flash_tr.iter().enumerate() {
            if !(tr.is_finite() && tr > 0.0) {
                return invalid(format!("readout TR {} must be positive, got {}", i + 1, tr));
            }
        }
        let SlabPartition { before, after } = self.slices;
        if !(before.is_finite() && after.is_finite() && before >= 0.0 && after >= 0.0)
            || before + after <= 0.0
        {
            return invalid(format!(
                "slab partition must be non-negative with at least one excitation, got {} + {}",
                before, after
            ));
        }
        let eff = self.inversion_efficiency;
        if !(eff.is_finite() && eff > 0.0 && eff <= 1.0) {
            return invalid(format!("inversion efficiency must lie in (0, 1], got {}", eff));
        }
        self.phase_scaling.validate()?;

        let [td0, td1, td2] = self.recovery_delays();
        if td0 < 0.0 {
            return invalid(format!(
                "first readout starts {:.4} s before the inversion pulse (TI1 too short)",
                -td0
            ));
        }
        if td1 < 0.0 {
            return invalid(format!(
                "readout blocks overlap by {:.4} s (inversion times too close)",
                -td1
            ));
        }
        if td2 < 0.0 {
            return invalid(format!(
                "second readout extends {:.4} s past the MP2RAGE TR",
                -td2
            ));
        }
        Ok(())
    }
}
