//! Bracketed root finding for monotonic functions

/// Solve `f(x) = target` for a non-increasing `f` on `[lo, hi]` by bisection.
///
/// Requires `f(lo) >= target >= f(hi)`. Stops once the bracket is narrower
/// than `tol` or after `max_iter` halvings, and returns the bracket midpoint.
///
/// # Arguments
/// * `f` - Non-increasing function on the bracket
/// * `target` - Value to solve for
/// * `lo`, `hi` - Bracket with `lo < hi`
/// * `tol` - Absolute tolerance on x
/// * `max_iter` - Maximum number of bisections
pub fn bisect_decreasing<F>(f: F, target: f64, mut lo: f64, mut hi: f64, tol: f64, max_iter: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    for _ in 0..max_iter {
        if hi - lo <= tol {
            break;
        }
        let mid = 0.5 * (lo + hi);
        if f(mid) > target {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}
