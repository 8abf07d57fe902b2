//! Common test utilities for MP2RAGE-core integration tests

#![allow(dead_code)]

use std::f64::consts::PI;

use mp2rage_core::signal::readout_signals;
use mp2rage_core::AcquisitionParameters;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// T1 (s) of the inner, middle and outer shell of the phantom
pub const TISSUE_T1: [f64; 3] = [0.9, 1.4, 2.5];

/// Proton density scale of the simulated magnitudes
const M0: f64 = 1000.0;

/// Upper bound of the uniform background magnitude noise
pub const BACKGROUND_NOISE: f64 = 5.0;

/// Compute RMSE between two arrays, only within mask (non-zero values)
pub fn rmse(a: &[f64], b: &[f64], mask: &[u8]) -> f64 {
    let (sum_sq, count) = a
        .iter()
        .zip(b.iter())
        .zip(mask.iter())
        .filter(|(_, &m)| m > 0)
        .fold((0.0, 0usize), |(s, n), ((&x, &y), _)| (s + (x - y) * (x - y), n + 1));
    if count == 0 {
        return 0.0;
    }
    (sum_sq / count as f64).sqrt()
}

/// Largest relative error |a - b| / b within mask
pub fn max_relative_error(a: &[f64], b: &[f64], mask: &[u8]) -> f64 {
    a.iter()
        .zip(b.iter())
        .zip(mask.iter())
        .filter(|(_, &m)| m > 0)
        .map(|((&x, &y), _)| ((x - y) / y).abs())
        .fold(0.0, f64::max)
}

/// Compute Pearson correlation coefficient within mask
pub fn correlation(a: &[f64], b: &[f64], mask: &[u8]) -> f64 {
    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    let mut sum_ab = 0.0;
    let mut sum_a2 = 0.0;
    let mut sum_b2 = 0.0;
    let mut n = 0usize;

    for i in 0..a.len() {
        if mask[i] > 0 {
            sum_a += a[i];
            sum_b += b[i];
            sum_ab += a[i] * b[i];
            sum_a2 += a[i] * a[i];
            sum_b2 += b[i] * b[i];
            n += 1;
        }
    }

    if n == 0 {
        return 0.0;
    }

    let n = n as f64;
    let numerator = n * sum_ab - sum_a * sum_b;
    let denominator = ((n * sum_a2 - sum_a * sum_a) * (n * sum_b2 - sum_b * sum_b)).sqrt();

    if denominator == 0.0 {
        return 0.0;
    }

    numerator / denominator
}

/// Dice overlap of two binary masks
pub fn dice(a: &[u8], b: &[u8]) -> f64 {
    let both = a.iter().zip(b.iter()).filter(|(&x, &y)| x > 0 && y > 0).count();
    let total = a.iter().filter(|&&x| x > 0).count() + b.iter().filter(|&&y| y > 0).count();
    if total == 0 {
        return 1.0;
    }
    2.0 * both as f64 / total as f64
}

/// Synthetic MP2RAGE acquisition of a layered spherical phantom
///
/// Three concentric shells with the T1 values of `TISSUE_T1`, a smooth
/// receive bias field peaking at the centre, an independent random phase per
/// voxel shared by both inversions, and uniform noise in the background.
pub struct Phantom {
    pub phase1: Vec<f64>,
    pub mag1: Vec<f64>,
    pub phase2: Vec<f64>,
    pub mag2: Vec<f64>,
    /// Ground truth T1 in seconds (0 in the background)
    pub t1: Vec<f64>,
    /// Object mask
    pub mask: Vec<u8>,
    pub dims: (usize, usize, usize),
    pub voxel_size: (f64, f64, f64),
}

impl Phantom {
    /// Cubic phantom of side `n` voxels (1 mm isotropic)
    pub fn generate(params: &AcquisitionParameters, n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let signals: Vec<[f64; 2]> = TISSUE_T1.iter().map(|&t1| readout_signals(params, t1)).collect();

        let n_total = n * n * n;
        let center = (n as f64 - 1.0) / 2.0;
        let radius = 0.4 * n as f64;

        let mut phantom = Phantom {
            phase1: vec![0.0; n_total],
            mag1: vec![0.0; n_total],
            phase2: vec![0.0; n_total],
            mag2: vec![0.0; n_total],
            t1: vec![0.0; n_total],
            mask: vec![0; n_total],
            dims: (n, n, n),
            voxel_size: (1.0, 1.0, 1.0),
        };

        for k in 0..n {
            for j in 0..n {
                for i in 0..n {
                    let idx = i + j * n + k * n * n;
                    let (dx, dy, dz) = (i as f64 - center, j as f64 - center, k as f64 - center);
                    let r = (dx * dx + dy * dy + dz * dz).sqrt() / radius;

                    if r > 1.0 {
                        phantom.mag1[idx] = rng.gen_range(0.0..BACKGROUND_NOISE);
                        phantom.mag2[idx] = rng.gen_range(0.0..BACKGROUND_NOISE);
                        phantom.phase1[idx] = rng.gen_range(-PI..PI);
                        phantom.phase2[idx] = rng.gen_range(-PI..PI);
                        continue;
                    }

                    let tissue = if r < 0.45 { 0 } else if r < 0.75 { 1 } else { 2 };
                    let [s1, s2] = signals[tissue];
                    let bias = M0 * (1.2 - 0.4 * r * r);
                    let phi = rng.gen_range(-PI..PI);

                    phantom.mag1[idx] = bias * s1.abs();
                    phantom.mag2[idx] = bias * s2.abs();
                    phantom.phase1[idx] = if s1 < 0.0 { wrap(phi + PI) } else { phi };
                    phantom.phase2[idx] = if s2 < 0.0 { wrap(phi + PI) } else { phi };
                    phantom.t1[idx] = TISSUE_T1[tissue];
                    phantom.mask[idx] = 1;
                }
            }
        }

        phantom
    }

    pub fn len(&self) -> usize {
        self.t1.len()
    }

    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        let (nx, ny, _) = self.dims;
        i + j * nx + k * nx * ny
    }
}

/// Wrap an angle to [-pi, pi)
pub fn wrap(a: f64) -> f64 {
    (a + PI).rem_euclid(2.0 * PI) - PI
}

/// Result of running a T1 mapping test
#[derive(Debug)]
pub struct TestResult {
    pub name: String,
    pub rmse: f64,
    pub max_relative_error: f64,
    pub correlation: f64,
}

impl TestResult {
    pub fn new(name: &str, output: &[f64], ground_truth: &[f64], mask: &[u8]) -> Self {
        TestResult {
            name: name.to_string(),
            rmse: rmse(output, ground_truth, mask),
            max_relative_error: max_relative_error(output, ground_truth, mask),
            correlation: correlation(output, ground_truth, mask),
        }
    }

    pub fn print(&self) {
        println!("{:<15} RMSE={:.6}  maxrel={:.2e}  r={:.6}",
            self.name, self.rmse, self.max_relative_error, self.correlation);
    }
}
