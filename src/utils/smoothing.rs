//! Gaussian smoothing by repeated box filtering
//!
//! A Gaussian of standard deviation sigma is approximated by a few passes of
//! box filters whose widths are chosen so the summed variance matches
//! sigma^2. Each pass runs separably along x, y and z.
//!
//! Reference:
//! Kovesi, P. (2010). "Fast Almost-Gaussian Filtering."
//! Proc. Digital Image Computing: Techniques and Applications, 121-125.

/// FWHM of a Gaussian in units of its standard deviation, 2*sqrt(2*ln 2)
const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// Default number of box filter passes
pub const DEFAULT_BOX_PASSES: usize = 3;

/// Convert a kernel FWHM in mm to per-axis sigma in voxels
pub fn fwhm_to_sigma_voxels(fwhm_mm: f64, voxel_size: (f64, f64, f64)) -> [f64; 3] {
    let sigma_mm = fwhm_mm / FWHM_PER_SIGMA;
    let (vsx, vsy, vsz) = voxel_size;
    [sigma_mm / vsx, sigma_mm / vsy, sigma_mm / vsz]
}

/// Odd box widths for `passes` box filters approximating a Gaussian of `sigma` voxels
fn box_widths(sigma: f64, passes: usize) -> Vec<usize> {
    if sigma <= 0.0 || passes == 0 {
        return vec![1; passes];
    }
    let n = passes as f64;
    let ideal = (12.0 * sigma * sigma / n + 1.0).sqrt();

    let mut lower = ideal.floor() as usize;
    if lower % 2 == 0 {
        lower = lower.saturating_sub(1).max(1);
    }
    let upper = lower + 2;

    let w = lower as f64;
    let m = ((12.0 * sigma * sigma - n * w * w - 4.0 * n * w - 3.0 * n) / (-4.0 * w - 4.0))
        .round()
        .clamp(0.0, n) as usize;

    (0..passes).map(|i| if i < m { lower } else { upper }).collect()
}

/// Keep widths odd and no wider than half the axis
fn fit_width(width: usize, axis_len: usize) -> usize {
    let width = if width % 2 == 0 { width + 1 } else { width };
    let max = axis_len / 2;
    if width > max {
        if max % 2 == 0 { max + 1 } else { max }
    } else {
        width
    }
}

/// Moving average of odd `width` along `line`, in place.
///
/// Near the ends the window is truncated and the mean is taken over the
/// samples that exist.
fn box_filter_line(line: &mut [f64], prefix: &mut Vec<f64>, width: usize) {
    let n = line.len();
    if width < 3 || n < width {
        return;
    }
    let r = width / 2;

    prefix.clear();
    prefix.push(0.0);
    let mut acc = 0.0;
    for &v in line.iter() {
        acc += v;
        prefix.push(acc);
    }

    for (i, out) in line.iter_mut().enumerate() {
        let lo = i.saturating_sub(r);
        let hi = (i + r + 1).min(n);
        *out = (prefix[hi] - prefix[lo]) / (hi - lo) as f64;
    }
}

/// 3D Gaussian smoothing of a Fortran-ordered volume
///
/// # Arguments
/// * `data` - Input volume, index = x + y*nx + z*nx*ny
/// * `dims` - Volume dimensions (nx, ny, nz)
/// * `sigma` - Standard deviation per axis in voxels
/// * `passes` - Number of box filter passes (3 is usually sufficient)
///
/// # Returns
/// Smoothed volume
pub fn gaussian_smooth_3d(
    data: &[f64],
    dims: (usize, usize, usize),
    sigma: [f64; 3],
    passes: usize,
) -> Vec<f64> {
    let (nx, ny, nz) = dims;
    let lens = [nx, ny, nz];
    let strides = [1, nx, nx * ny];
    let n_total = nx * ny * nz;

    let widths: Vec<Vec<usize>> = (0..3)
        .map(|axis| {
            box_widths(sigma[axis], passes)
                .into_iter()
                .map(|w| fit_width(w, lens[axis]))
                .collect()
        })
        .collect();

    let mut result = data.to_vec();
    let mut prefix = Vec::new();

    for pass in 0..passes {
        for axis in 0..3 {
            let len = lens[axis];
            let width = widths[axis][pass];
            if len < 2 || width < 3 {
                continue;
            }
            let stride = strides[axis];
            let mut line = vec![0.0; len];

            // Every voxel whose coordinate along `axis` is zero starts a line
            for start in (0..n_total).filter(|&idx| (idx / stride) % len == 0) {
                for (t, v) in line.iter_mut().enumerate() {
                    *v = result[start + t * stride];
                }
                box_filter_line(&mut line, &mut prefix, width);
                for (t, &v) in line.iter().enumerate() {
                    result[start + t * stride] = v;
                }
            }
        }
    }

    result
}
