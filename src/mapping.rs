//! Voxel-wise UNI and T1 mapping over flattened volumes
//!
//! Inputs are flat slices of equal length (any voxel ordering, e.g. the
//! Fortran order used throughout `utils`). Voxels are independent and are
//! processed in parallel when the `parallel` feature is enabled.

use tracing::{info, warn};

use crate::error::{Mp2rageError, Result};
use crate::inversion::{InversionConfig, T1Estimate, T1Inverter};
use crate::params::{AcquisitionParameters, PhaseScaling};
use crate::uni::{combine, from_scanner_units, to_scanner_units, VoxelMeasurement};

/// UNI image, T1 map and validity mask of one dataset
#[derive(Clone, Debug, PartialEq)]
pub struct Mp2rageMaps {
    /// Unified T1-weighted image in [-0.5, 0.5]
    pub uni: Vec<f64>,
    /// T1 in seconds
    pub t1: Vec<f64>,
    /// 1 where the unified value was invertible, 0 where T1 was clamped
    pub valid: Vec<u8>,
}

impl Mp2rageMaps {
    pub fn len(&self) -> usize {
        self.uni.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uni.is_empty()
    }

    pub fn t1_milliseconds(&self) -> Vec<f64> {
        self.t1.iter().map(|&t| t * 1000.0).collect()
    }

    /// UNI in the vendor's [0, 4095] range
    pub fn uni_scanner_units(&self) -> Vec<f64> {
        self.uni.iter().map(|&u| to_scanner_units(u)).collect()
    }

    pub fn invalid_count(&self) -> usize {
        self.valid.iter().filter(|&&v| v == 0).count()
    }

    /// Zero all maps outside `mask`
    pub fn apply_mask(&self, mask: &[u8]) -> Result<Mp2rageMaps> {
        if mask.len() != self.len() {
            return Err(Mp2rageError::length_mismatch("mask", self.len(), mask.len()));
        }
        let keep = |i: usize| mask[i] != 0;
        Ok(Mp2rageMaps {
            uni: (0..self.len()).map(|i| if keep(i) { self.uni[i] } else { 0.0 }).collect(),
            t1: (0..self.len()).map(|i| if keep(i) { self.t1[i] } else { 0.0 }).collect(),
            valid: (0..self.len()).map(|i| if keep(i) { self.valid[i] } else { 0 }).collect(),
        })
    }
}

#[cfg(feature = "parallel")]
fn map_voxels<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Send + Sync,
{
    use rayon::prelude::*;
    (0..n).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
fn map_voxels<T, F>(n: usize, f: F) -> Vec<T>
where
    F: Fn(usize) -> T,
{
    (0..n).map(f).collect()
}

fn check_lengths(phase1: &[f64], mag1: &[f64], phase2: &[f64], mag2: &[f64]) -> Result<usize> {
    let n = mag1.len();
    for (name, len) in [("inv1 phase", phase1.len()), ("inv2 phase", phase2.len()), ("inv2 magnitude", mag2.len())] {
        if len != n {
            return Err(Mp2rageError::length_mismatch(name, n, len));
        }
    }
    Ok(n)
}

/// Unified T1-weighted image from both inversions
///
/// # Arguments
/// * `phase1`, `mag1` - First inversion phase (raw units) and magnitude
/// * `phase2`, `mag2` - Second inversion phase (raw units) and magnitude
/// * `scaling` - Conversion of the raw phase values to radians
pub fn compute_uni(
    phase1: &[f64],
    mag1: &[f64],
    phase2: &[f64],
    mag2: &[f64],
    scaling: &PhaseScaling,
) -> Result<Vec<f64>> {
    let n = check_lengths(phase1, mag1, phase2, mag2)?;
    Ok(map_voxels(n, |i| {
        combine(&VoxelMeasurement::from_raw(mag1[i], phase1[i], mag2[i], phase2[i], scaling))
    }))
}

/// UNI image and T1 map from the magnitude and phase of both inversions
///
/// Builds a [`T1Inverter`] for `params` and `config`; use
/// [`compute_t1_map_with_inverter`] to reuse one across datasets.
pub fn compute_t1_map(
    phase1: &[f64],
    mag1: &[f64],
    phase2: &[f64],
    mag2: &[f64],
    params: &AcquisitionParameters,
    config: &InversionConfig,
) -> Result<Mp2rageMaps> {
    check_lengths(phase1, mag1, phase2, mag2)?;
    let inverter = T1Inverter::new(params, config)?;
    compute_t1_map_with_inverter(phase1, mag1, phase2, mag2, &inverter)
}

/// Same as [`compute_t1_map`] with a prebuilt inverter
pub fn compute_t1_map_with_inverter(
    phase1: &[f64],
    mag1: &[f64],
    phase2: &[f64],
    mag2: &[f64],
    inverter: &T1Inverter,
) -> Result<Mp2rageMaps> {
    let scaling = inverter.parameters().phase_scaling();
    let uni = compute_uni(phase1, mag1, phase2, mag2, &scaling)?;
    Ok(invert_uni(uni, inverter))
}

/// T1 map from an existing UNI image stored in scanner units [0, 4095]
pub fn compute_t1_from_uni(
    uni_scanner: &[f64],
    params: &AcquisitionParameters,
    config: &InversionConfig,
) -> Result<Mp2rageMaps> {
    let inverter = T1Inverter::new(params, config)?;
    let uni = uni_scanner.iter().map(|&v| from_scanner_units(v)).collect();
    Ok(invert_uni(uni, &inverter))
}

fn invert_uni(uni: Vec<f64>, inverter: &T1Inverter) -> Mp2rageMaps {
    let estimates: Vec<T1Estimate> = map_voxels(uni.len(), |i| inverter.invert(uni[i]));
    let t1 = estimates.iter().map(|e| e.t1).collect();
    let valid = estimates.iter().map(|e| e.is_valid() as u8).collect();
    let maps = Mp2rageMaps { uni, t1, valid };

    let invalid = maps.invalid_count();
    info!(voxels = maps.len(), invalid, "computed MP2RAGE T1 map");
    if !maps.is_empty() && invalid * 2 > maps.len() {
        warn!(
            fraction = invalid as f64 / maps.len() as f64,
            "most voxels fell outside the invertible intensity range; check acquisition parameters"
        );
    }
    maps
}
