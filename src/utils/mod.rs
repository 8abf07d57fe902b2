//! Image utilities for masking MP2RAGE maps

pub mod mask;
pub mod smoothing;
pub mod threshold;

pub use mask::{apply_mask, compute_signal_mask, MaskMethod, MaskParams};
pub use smoothing::{fwhm_to_sigma_voxels, gaussian_smooth_3d};
pub use threshold::{histogram_gap_threshold, otsu_threshold};
