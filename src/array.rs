//! `ndarray` interface to UNI and T1 mapping
//!
//! Accepts arrays of any dimensionality; all four inputs must share one shape
//! and the outputs keep it.

use ndarray::{Array, ArrayView, Dimension, Zip};

use crate::error::{Mp2rageError, Result};
use crate::inversion::{InversionConfig, T1Estimate, T1Inverter};
use crate::params::AcquisitionParameters;
use crate::uni::{combine, VoxelMeasurement};

/// UNI image, T1 map (s) and validity mask with the shape of the inputs
#[derive(Clone, Debug)]
pub struct Mp2rageArrays<D: Dimension> {
    pub uni: Array<f64, D>,
    pub t1: Array<f64, D>,
    pub valid: Array<u8, D>,
}

fn check_shape<D: Dimension>(name: &'static str, expected: &[usize], view: &ArrayView<f64, D>) -> Result<()> {
    if view.shape() != expected {
        return Err(Mp2rageError::InvalidShape {
            name,
            expected: expected.to_vec(),
            found: view.shape().to_vec(),
        });
    }
    Ok(())
}

/// All inputs must have the shape of the first inversion magnitude
fn check_shapes<D: Dimension>(
    phase1: &ArrayView<f64, D>,
    mag1: &ArrayView<f64, D>,
    phase2: &ArrayView<f64, D>,
    mag2: &ArrayView<f64, D>,
) -> Result<()> {
    let shape = mag1.shape();
    check_shape("inv1 phase", shape, phase1)?;
    check_shape("inv2 phase", shape, phase2)?;
    check_shape("inv2 magnitude", shape, mag2)
}

/// Array version of [`crate::mapping::compute_t1_map`]
pub fn compute_t1_map_array<D: Dimension>(
    phase1: ArrayView<f64, D>,
    mag1: ArrayView<f64, D>,
    phase2: ArrayView<f64, D>,
    mag2: ArrayView<f64, D>,
    params: &AcquisitionParameters,
    config: &InversionConfig,
) -> Result<Mp2rageArrays<D>> {
    check_shapes(&phase1, &mag1, &phase2, &mag2)?;
    let inverter = T1Inverter::new(params, config)?;
    compute_t1_map_array_with_inverter(phase1, mag1, phase2, mag2, &inverter)
}

/// Array version of [`crate::mapping::compute_t1_map_with_inverter`]
pub fn compute_t1_map_array_with_inverter<D: Dimension>(
    phase1: ArrayView<f64, D>,
    mag1: ArrayView<f64, D>,
    phase2: ArrayView<f64, D>,
    mag2: ArrayView<f64, D>,
    inverter: &T1Inverter,
) -> Result<Mp2rageArrays<D>> {
    check_shapes(&phase1, &mag1, &phase2, &mag2)?;

    let scaling = inverter.parameters().phase_scaling();
    let uni = Zip::from(&mag1)
        .and(&phase1)
        .and(&mag2)
        .and(&phase2)
        .map_collect(|&m1, &p1, &m2, &p2| combine(&VoxelMeasurement::from_raw(m1, p1, m2, p2, &scaling)));

    let estimates = invert_all(&uni, inverter);
    Ok(Mp2rageArrays {
        t1: estimates.mapv(|e| e.t1),
        valid: estimates.mapv(|e| e.is_valid() as u8),
        uni,
    })
}

#[cfg(feature = "parallel")]
fn invert_all<D: Dimension>(uni: &Array<f64, D>, inverter: &T1Inverter) -> Array<T1Estimate, D> {
    Zip::from(uni).par_map_collect(|&u| inverter.invert(u))
}

#[cfg(not(feature = "parallel"))]
fn invert_all<D: Dimension>(uni: &Array<f64, D>, inverter: &T1Inverter) -> Array<T1Estimate, D> {
    uni.map(|&u| inverter.invert(u))
}
