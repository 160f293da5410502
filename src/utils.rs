use num_complex::Complex64;
use std::result;
use thiserror::Error;

/// Errors reported by the solver and the full-model entry points.
///
/// The phase formulas never fail: samples outside a phase's support, and
/// non-positive governing parameters, simply produce zeros.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LfError {
    /// A cycle or model parameter is out of range.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        name: &'static str,
        message: String,
    },

    /// The root finder could not satisfy the continuity / zero-net-flow constraints.
    #[error("failed to solve {quantity} after {iterations} iterations: {message}")]
    ConvergenceFailure {
        quantity: &'static str,
        iterations: usize,
        message: String,
    },
}
impl LfError {
    pub(crate) fn invalid<T>(name: &'static str, message: impl Into<String>) -> LfResult<T> {
        Err(LfError::InvalidParameter {
            name,
            message: message.into(),
        })
    }
    pub(crate) fn no_convergence<T>(
        quantity: &'static str,
        iterations: usize,
        message: impl Into<String>,
    ) -> LfResult<T> {
        Err(LfError::ConvergenceFailure {
            quantity,
            iterations,
            message: message.into(),
        })
    }
    /// Returns `true` for solver failures, where falling back to the
    /// non-oscillatory return phase may help.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, LfError::ConvergenceFailure { .. })
    }
}
pub type LfResult<T> = result::Result<T, LfError>;

/// Ramp-clamp primitive: `x` for `x > 0`, else `0`.
pub(crate) fn ramp(x: f64) -> f64 {
    if x > 0. {
        x
    } else {
        0.
    }
}

/// Integral of `exp(rate * s)` over `s` in `[0, duration]`.
pub(crate) fn exp_integral(rate: Complex64, duration: f64) -> Complex64 {
    if rate == Complex64::new(0., 0.) {
        return Complex64::new(duration, 0.);
    }
    ((rate * duration).exp() - 1.) / rate
}

/// Sample instants `n / sample_rate` for `n = 0 ..= round(length * sample_rate)`.
///
/// Each instant is computed from its index, so no rounding error accumulates
/// along the axis.
pub fn time_axis(length: f64, sample_rate: usize) -> Vec<f64> {
    if !(length >= 0.) || sample_rate == 0 {
        return Vec::new();
    }
    let fs = sample_rate as f64;
    let last = (length * fs).round() as usize;
    (0..=last).map(|n| n as f64 / fs).collect()
}
