//! MP2RAGE-Core: unified T1-weighted imaging and quantitative T1 mapping
//!
//! This crate combines the two inversion-time images of an MP2RAGE
//! acquisition into a receive-bias-free unified image (UNI) and converts it
//! to T1 by inverting the sequence's signal equation.
//!
//! # Modules
//! - `params`: Acquisition parameters, slab partitions, phase scaling
//! - `signal`: MP2RAGE forward model (readout signals and unified intensity)
//! - `uni`: Voxel-wise combination of the two inversions
//! - `inversion`: Unified intensity to T1 (root finding, lookup table)
//! - `mapping`: Whole-volume UNI/T1 mapping over flat slices
//! - `array`: The same over `ndarray` arrays
//! - `utils`: Smoothing, thresholds and signal masks
//! - `error`: Error type shared by all modules
//!
//! # Example
//! ```
//! use mp2rage_core::{AcquisitionParameters, InversionConfig, SlabPartition};
//! use mp2rage_core::mapping::compute_t1_map;
//!
//! let params = AcquisitionParameters::new(
//!     5.0, [0.7, 2.5], [4.0, 5.0],
//!     SlabPartition::partial_fourier(176.0, 0.75), [0.0071, 0.0071],
//! ).unwrap();
//!
//! let maps = compute_t1_map(
//!     &[std::f64::consts::PI], &[300.0], &[0.0], &[900.0],
//!     &params, &InversionConfig::default(),
//! ).unwrap();
//! assert!(maps.uni[0] < 0.0);
//! ```

// Core modules
pub mod error;
pub mod params;
pub mod signal;
pub mod uni;

// Algorithm modules
pub mod inversion;
pub mod mapping;
pub mod array;
pub mod utils;

pub use error::{Mp2rageError, Result};
pub use inversion::{InversionConfig, InversionStatus, InversionStrategy, T1Estimate, T1Inverter};
pub use mapping::Mp2rageMaps;
pub use params::{AcquisitionParameters, PhaseScaling, SlabPartition};
