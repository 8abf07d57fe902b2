//! MP2RAGE forward signal model
//!
//! Closed-form steady-state signal of the two GRE readouts of an MP2RAGE
//! sequence as a function of T1, with M0 = 1 and perfect B1.
//!
//! Reference:
//! Marques, J.P., Kober, T., Krueger, G., van der Zwaag, W., Van de Moortele, P.F.,
//! Gruetter, R. (2010). "MP2RAGE, a self bias-field corrected sequence for improved
//! segmentation and T1-mapping at high field." NeuroImage, 49(2):1271-1281.
//! https://doi.org/10.1016/j.neuroimage.2009.10.002

use crate::params::{AcquisitionParameters, SlabPartition};
use crate::uni::combine_real;

/// Signals of the first and second readout at the k-space centre for tissue with the given T1 (s).
///
/// `t1` must be positive.
pub fn readout_signals(params: &AcquisitionParameters, t1: f64) -> [f64; 2] {
    let efficiency = params.inversion_efficiency();
    let flash_tr = params.flash_tr();
    let alpha = params.flip_angles_rad();
    let SlabPartition { before, after } = params.slices();
    let total = before + after;

    let e1 = flash_tr.map(|tr| (-tr / t1).exp());
    let e_td = params.recovery_delays().map(|td| (-td / t1).exp());
    let cos_e1 = [alpha[0].cos() * e1[0], alpha[1].cos() * e1[1]];

    // Longitudinal magnetization after `n` excitations of readout block `block`
    let excite = |mz: f64, block: usize, n: f64| {
        let decay = cos_e1[block].powf(n);
        mz * decay + (1.0 - e1[block]) * (1.0 - decay) / (1.0 - cos_e1[block])
    };
    // Free T1 recovery over delay `delay`
    let recover = |mz: f64, delay: usize| mz * e_td[delay] + (1.0 - e_td[delay]);

    let mut cycle = 1.0 - e_td[0];
    for block in 0..2 {
        cycle = recover(excite(cycle, block, total), block + 1);
    }
    let steady_state =
        cycle / (1.0 + efficiency * (cos_e1[0] * cos_e1[1]).powf(total) * e_td.iter().product::<f64>());

    let mut mz = excite(recover(-efficiency * steady_state, 0), 0, before);
    let first = alpha[0].sin() * mz;

    mz = excite(mz, 0, after);
    mz = excite(recover(mz, 1), 1, before);
    let second = alpha[1].sin() * mz;

    [first, second]
}

/// Unified (UNI) intensity predicted for tissue with the given T1 (s)
pub fn unified_intensity(params: &AcquisitionParameters, t1: f64) -> f64 {
    let [first, second] = readout_signals(params, t1);
    combine_real(first, second)
}
