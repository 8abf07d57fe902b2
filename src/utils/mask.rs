//! Mask generation utilities
//!
//! Signal mask separating the imaged object from background noise, and the
//! binary morphology it is built from. T1 values outside the object are
//! meaningless (the unified image is pure noise there), so maps are usually
//! masked before analysis.
//!
//! All volumes use Fortran (column-major) ordering: index = x + y*nx + z*nx*ny.

use tracing::{debug, warn};

use super::smoothing::{fwhm_to_sigma_voxels, gaussian_smooth_3d, DEFAULT_BOX_PASSES};
use super::threshold::{histogram_gap_threshold, otsu_threshold};
use crate::error::{Mp2rageError, Result};

/// How the intensity threshold of a signal mask is chosen
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MaskMethod {
    /// Midpoint of the widest gap between sorted smoothed intensities within
    /// the given quantiles
    Histogram { lower_cutoff: f64, upper_cutoff: f64 },
    /// Otsu threshold of the smoothed image
    Otsu { bins: usize },
    /// Voxels of the unsmoothed image strictly above this value; no smoothing
    /// or morphology
    Fixed(f64),
}

impl Default for MaskMethod {
    fn default() -> Self {
        MaskMethod::Histogram { lower_cutoff: 0.2, upper_cutoff: 0.85 }
    }
}

/// Parameters for signal mask estimation
#[derive(Clone, Debug, PartialEq)]
pub struct MaskParams {
    /// FWHM of the smoothing kernel in mm
    pub smooth_fwhm_mm: f64,
    /// Threshold selection
    pub method: MaskMethod,
    /// Radius in voxels of the spherical opening element (0 disables opening)
    pub opening_radius: usize,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            smooth_fwhm_mm: 2.5,
            method: MaskMethod::default(),
            opening_radius: 2,
        }
    }
}

impl MaskParams {
    pub fn with_method(method: MaskMethod) -> Self {
        Self { method, ..Default::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.smooth_fwhm_mm.is_finite() || self.smooth_fwhm_mm < 0.0 {
            return Err(Mp2rageError::InvalidConfig(format!(
                "smoothing FWHM must be finite and non-negative, got {}",
                self.smooth_fwhm_mm
            )));
        }
        match self.method {
            MaskMethod::Histogram { lower_cutoff, upper_cutoff } => {
                if !(0.0..1.0).contains(&lower_cutoff)
                    || !(0.0..1.0).contains(&upper_cutoff)
                    || lower_cutoff >= upper_cutoff
                {
                    return Err(Mp2rageError::InvalidConfig(format!(
                        "histogram cutoffs must satisfy 0 <= lower < upper < 1, got {} and {}",
                        lower_cutoff, upper_cutoff
                    )));
                }
            }
            MaskMethod::Otsu { bins } if bins < 2 => {
                return Err(Mp2rageError::InvalidConfig(format!(
                    "Otsu threshold needs at least 2 bins, got {}",
                    bins
                )));
            }
            MaskMethod::Fixed(value) if !value.is_finite() => {
                return Err(Mp2rageError::InvalidConfig(format!(
                    "fixed threshold must be finite, got {}",
                    value
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Binary mask of the imaged object
///
/// The image (usually the second inversion magnitude, which has the best
/// signal-to-noise ratio) is smoothed, thresholded, opened to detach thin
/// bridges of noise and reduced to its largest connected component.
///
/// # Arguments
/// * `image` - Magnitude image, length nx*ny*nz
/// * `dims` - Volume dimensions (nx, ny, nz)
/// * `voxel_size` - Voxel size in mm
/// * `params` - Smoothing, threshold and morphology settings
///
/// # Returns
/// Binary mask (1 inside the object)
pub fn compute_signal_mask(
    image: &[f64],
    dims: (usize, usize, usize),
    voxel_size: (f64, f64, f64),
    params: &MaskParams,
) -> Result<Vec<u8>> {
    let (nx, ny, nz) = dims;
    let n_total = nx * ny * nz;
    if image.len() != n_total {
        return Err(Mp2rageError::InvalidShape {
            name: "mask image",
            expected: vec![nx, ny, nz],
            found: vec![image.len()],
        });
    }
    let (vsx, vsy, vsz) = voxel_size;
    if [vsx, vsy, vsz].iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(Mp2rageError::InvalidConfig(format!(
            "voxel size must be positive, got {:?}",
            voxel_size
        )));
    }
    params.validate()?;

    let mask = match params.method {
        MaskMethod::Fixed(value) => image.iter().map(|&v| (v > value) as u8).collect(),
        method => {
            let sigma = fwhm_to_sigma_voxels(params.smooth_fwhm_mm, voxel_size);
            let smoothed = gaussian_smooth_3d(image, dims, sigma, DEFAULT_BOX_PASSES);

            let threshold = match method {
                MaskMethod::Otsu { bins } => Some(otsu_threshold(&smoothed, bins)),
                MaskMethod::Histogram { lower_cutoff, upper_cutoff } => {
                    histogram_gap_threshold(&smoothed, lower_cutoff, upper_cutoff)
                }
                MaskMethod::Fixed(_) => None,
            };

            match threshold {
                Some(threshold) => {
                    debug!(threshold, ?method, "signal mask threshold");
                    let raw: Vec<u8> = smoothed.iter().map(|&v| (v >= threshold) as u8).collect();
                    refine_mask(&raw, dims, params.opening_radius)
                }
                None => vec![0; n_total],
            }
        }
    };

    let count = mask.iter().filter(|&&m| m != 0).count();
    debug!(voxels = count, total = n_total, "computed signal mask");
    if count == 0 {
        warn!("signal mask is empty");
    }
    Ok(mask)
}

/// Opening followed by largest-component selection
///
/// Falls back to the unopened mask when the opening removes everything.
fn refine_mask(mask: &[u8], dims: (usize, usize, usize), radius: usize) -> Vec<u8> {
    let opened = binary_opening(mask, dims, radius);
    if opened.iter().any(|&m| m != 0) {
        largest_component(&opened, dims)
    } else {
        warn!(radius, "opening removed the whole mask; keeping the thresholded mask");
        largest_component(mask, dims)
    }
}

/// Zero `values` outside `mask`
pub fn apply_mask(values: &[f64], mask: &[u8]) -> Result<Vec<f64>> {
    if values.len() != mask.len() {
        return Err(Mp2rageError::length_mismatch("mask", values.len(), mask.len()));
    }
    Ok(values
        .iter()
        .zip(mask.iter())
        .map(|(&v, &m)| if m != 0 { v } else { 0.0 })
        .collect())
}

/// Offsets of a digital ball of the given radius
fn ball_offsets(radius: usize) -> Vec<(isize, isize, isize)> {
    let r = radius as isize;
    let mut offsets = Vec::new();
    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy + dz * dz <= r * r {
                    offsets.push((dx, dy, dz));
                }
            }
        }
    }
    offsets
}

/// Voxel index of (i, j, k) shifted by `offset`, if inside the volume
#[inline]
fn shifted(
    (i, j, k): (usize, usize, usize),
    (dx, dy, dz): (isize, isize, isize),
    (nx, ny, nz): (usize, usize, usize),
) -> Option<usize> {
    let ni = i.checked_add_signed(dx).filter(|&v| v < nx)?;
    let nj = j.checked_add_signed(dy).filter(|&v| v < ny)?;
    let nk = k.checked_add_signed(dz).filter(|&v| v < nz)?;
    Some(ni + nj * nx + nk * nx * ny)
}

/// Erosion with a spherical element; outside the volume counts as background
pub fn erode(mask: &[u8], dims: (usize, usize, usize), radius: usize) -> Vec<u8> {
    let (nx, ny, nz) = dims;
    let offsets = ball_offsets(radius);
    let mut eroded = vec![0u8; mask.len()];

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                let idx = i + j * nx + k * nx * ny;
                if mask[idx] == 0 {
                    continue;
                }
                let inside = offsets.iter().all(|&off| {
                    shifted((i, j, k), off, dims).is_some_and(|n| mask[n] != 0)
                });
                if inside {
                    eroded[idx] = 1;
                }
            }
        }
    }

    eroded
}

/// Dilation with a spherical element
pub fn dilate(mask: &[u8], dims: (usize, usize, usize), radius: usize) -> Vec<u8> {
    let (nx, ny, nz) = dims;
    let offsets = ball_offsets(radius);
    let mut dilated = vec![0u8; mask.len()];

    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                if mask[i + j * nx + k * nx * ny] == 0 {
                    continue;
                }
                for &off in &offsets {
                    if let Some(n) = shifted((i, j, k), off, dims) {
                        dilated[n] = 1;
                    }
                }
            }
        }
    }

    dilated
}

/// Morphological opening (erosion followed by dilation)
pub fn binary_opening(mask: &[u8], dims: (usize, usize, usize), radius: usize) -> Vec<u8> {
    if radius == 0 {
        return mask.to_vec();
    }
    dilate(&erode(mask, dims, radius), dims, radius)
}

/// Keep only the largest 6-connected foreground component
pub fn largest_component(mask: &[u8], dims: (usize, usize, usize)) -> Vec<u8> {
    let (nx, ny, nz) = dims;
    let mut visited = vec![false; mask.len()];
    let mut best: Vec<usize> = Vec::new();
    let mut n_components = 0usize;

    for start in 0..mask.len() {
        if visited[start] || mask[start] == 0 {
            continue;
        }
        n_components += 1;

        let mut component = Vec::new();
        let mut stack = vec![start];
        visited[start] = true;
        while let Some(idx) = stack.pop() {
            component.push(idx);
            let k = idx / (nx * ny);
            let j = (idx % (nx * ny)) / nx;
            let i = idx % nx;
            for off in [(-1, 0, 0), (1, 0, 0), (0, -1, 0), (0, 1, 0), (0, 0, -1), (0, 0, 1)] {
                if let Some(n) = shifted((i, j, k), off, (nx, ny, nz)) {
                    if !visited[n] && mask[n] != 0 {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        if component.len() > best.len() {
            best = component;
        }
    }

    if n_components > 1 {
        debug!(components = n_components, kept = best.len(), "kept largest mask component");
    }

    let mut result = vec![0u8; mask.len()];
    for idx in best {
        result[idx] = 1;
    }
    result
}
