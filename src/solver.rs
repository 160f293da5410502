use crate::utils::exp_integral;
use crate::*;
use num_complex::Complex64;
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Fraction of the bracket kept clear of a finite bracket end, where the
/// opening sinusoid crosses zero exactly at `te` and the amplitude diverges.
const BRACKET_MARGIN: f64 = 1e-9;

/// Root-finding configuration shared by the decay-rate and growth-rate solves.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverParms {
    /// Bracket width at which bisection stops, relative to the root plus the
    /// reciprocal of the governing duration.
    pub tolerance: f64,
    /// Largest dimensionless residual accepted at the final root. The flow
    /// residual is measured in units of `ee * tc`.
    pub residual_tolerance: f64,
    /// Bisection steps (and bracket expansions) allowed per solve.
    pub max_iterations: usize,
    /// Number of sub-intervals scanned for the first sign change of the area residual.
    pub scan_points: usize,
}
impl Default for SolverParms {
    fn default() -> Self {
        Self {
            tolerance: 1e-12,
            residual_tolerance: 1e-9,
            max_iterations: 200,
            scan_points: 64,
        }
    }
}

/// Shape of the return phase between `te` and `tc`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "strum", derive(strum::Display))]
pub enum ReturnPhase {
    /// Non-oscillatory exponential recovery to zero (classic LF return).
    #[default]
    Exponential,
    /// Damped oscillation of `order` half-periods over the return phase,
    /// continuous in value and slope at `te`.
    Oscillatory { order: f64 },
}
impl ReturnPhase {
    fn order(self) -> f64 {
        match self {
            ReturnPhase::Exponential => 0.,
            ReturnPhase::Oscillatory { order } => order,
        }
    }
}

/// The return phase as a function of `s = t - te`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReturnSegment {
    /// Abrupt closure (`ta = 0`): the flow derivative jumps back to zero at `te`.
    Abrupt,
    /// `Re{amplitude * exp(rate * s)} + offset`.
    Decaying {
        amplitude: Complex64,
        rate: Complex64,
        offset: f64,
    },
}
impl ReturnSegment {
    pub fn value(&self, s: f64) -> f64 {
        match *self {
            ReturnSegment::Abrupt => 0.,
            ReturnSegment::Decaying {
                amplitude,
                rate,
                offset,
            } => (amplitude * (rate * s).exp()).re + offset,
        }
    }
    pub fn slope(&self, s: f64) -> f64 {
        match *self {
            ReturnSegment::Abrupt => 0.,
            ReturnSegment::Decaying {
                amplitude, rate, ..
            } => (amplitude * rate * (rate * s).exp()).re,
        }
    }
    /// Integral of the segment over `s` in `[0, duration]`.
    pub fn area(&self, duration: f64) -> f64 {
        match *self {
            ReturnSegment::Abrupt => 0.,
            ReturnSegment::Decaying {
                amplitude,
                rate,
                offset,
            } => (amplitude * exp_integral(rate, duration)).re + offset * duration,
        }
    }
}

/// Solved waveform parameters of one cycle.
///
/// The flow derivative is
/// `e0 * exp(alpha * t) * sin(omega_g * t)` on `[0, te)` followed by the
/// return segment on `[te, tc]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeParms {
    /// Growth rate of the opening phase.
    pub alpha: f64,
    /// Angular frequency of the opening sinusoid.
    pub omega_g: f64,
    /// Opening amplitude.
    pub e0: f64,
    /// Excitation amplitude, the negative peak `-source(te)`.
    pub ee: f64,
    /// Decay rate of the return phase, `+inf` for abrupt closure.
    pub beta: f64,
    /// Oscillation order of the return phase, 0 when non-oscillatory.
    pub k: f64,
    pub te: f64,
    pub tc: f64,
    pub return_segment: ReturnSegment,
}
impl ShapeParms {
    pub fn opening_value(&self, t: f64) -> f64 {
        self.e0 * (self.alpha * t).exp() * (self.omega_g * t).sin()
    }
    pub fn opening_slope(&self, t: f64) -> f64 {
        let (sin, cos) = (self.omega_g * t).sin_cos();
        self.e0 * (self.alpha * t).exp() * (self.alpha * sin + self.omega_g * cos)
    }
    /// Value of the return phase at absolute time `t` (0 beyond `tc`).
    pub fn return_value(&self, t: f64) -> f64 {
        if t > self.tc {
            return 0.;
        }
        self.return_segment.value(t - self.te)
    }
    pub fn return_slope(&self, t: f64) -> f64 {
        if t > self.tc {
            return 0.;
        }
        self.return_segment.slope(t - self.te)
    }
    pub fn opening_area(&self) -> f64 {
        let rate = Complex64::new(self.alpha, self.omega_g);
        self.e0 * exp_integral(rate, self.te).im
    }
    pub fn return_area(&self) -> f64 {
        self.return_segment.area(self.tc - self.te)
    }
    /// Net area of the flow derivative over the cycle, the flow left at `tc`.
    pub fn net_area(&self) -> f64 {
        self.opening_area() + self.return_area()
    }
    /// Value and slope discontinuity of the flow derivative at `te`.
    pub fn closure(&self) -> Closure {
        let opening_slope = self.opening_slope(self.te);
        match self.return_segment {
            ReturnSegment::Abrupt => Closure {
                time: self.te,
                jump: self.ee,
                slope_jump: -opening_slope,
            },
            ReturnSegment::Decaying { .. } => Closure {
                time: self.te,
                jump: self.return_value(self.te) - self.opening_value(self.te),
                slope_jump: self.return_slope(self.te) - opening_slope,
            },
        }
    }
}

/// Solves `beta * ta = 1 - exp(-beta * duration)` for the return-phase decay rate.
///
/// # Arguments
/// * `ta` - effective duration of the return phase, 0 for abrupt closure
/// * `duration` - length of the return phase, `tc - te`
/// * `parms` - root-finding configuration
///
/// # Returns
/// * the positive root, or `f64::INFINITY` when `ta` is 0
//
// f(b) = b ta - 1 + exp(-b D)
// f(0) = 0, f is convex and f'(0) = ta - D < 0, so the positive root is unique.
// f(1/ta) = exp(-D/ta) > 0
// f(ln(D/ta)/D) = ln(D/ta) ta/D - 1 + ta/D < 0   (ln x < x - 1 with x = D/ta > 1)
pub fn decay_rate(ta: f64, duration: f64, parms: &SolverParms) -> LfResult<f64> {
    if ta == 0. {
        return Ok(f64::INFINITY);
    }
    if !(ta > 0.) || !(duration > ta) || !duration.is_finite() {
        return LfError::invalid(
            "ta",
            format!("must lie in [0, {duration}) for a return phase of {duration}"),
        );
    }
    let residual = |beta: f64| beta * ta - 1. + (-beta * duration).exp();
    let lo = (duration / ta).ln() / duration;
    let hi = 1. / ta;
    let (beta, _) = bisect(residual, lo, hi, false, 1. / duration, "decay rate", parms)?;
    Ok(beta)
}

/// Bisection on a bracket whose lower end has the sign given by `lo_positive`.
///
/// `scale` is the natural magnitude of the root (the reciprocal of the
/// governing duration); the bracket is narrowed to
/// `tolerance * (|root| + scale)`, so the stopping rule does not depend on
/// the unit of time.
fn bisect<F: Fn(f64) -> f64>(
    f: F,
    mut lo: f64,
    mut hi: f64,
    lo_positive: bool,
    scale: f64,
    quantity: &'static str,
    parms: &SolverParms,
) -> LfResult<(f64, usize)> {
    for iteration in 1..=parms.max_iterations {
        let mid = 0.5 * (lo + hi);
        let value = f(mid);
        if value.is_nan() {
            return LfError::no_convergence(
                quantity,
                iteration,
                format!("residual undefined at {mid}"),
            );
        }
        if (hi - lo).abs() <= parms.tolerance * (scale + mid.abs()) {
            if value.abs() <= parms.residual_tolerance {
                return Ok((mid, iteration));
            }
            return LfError::no_convergence(
                quantity,
                iteration,
                format!("bracket collapsed at {mid} with residual {value:e}"),
            );
        }
        if value == 0. {
            return Ok((mid, iteration));
        }
        if (value > 0.) == lo_positive {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    LfError::no_convergence(
        quantity,
        parms.max_iterations,
        format!("bracket [{lo}, {hi}] still wider than the tolerance"),
    )
}

/// Growth rate for which the opening sinusoid of frequency `omega_g` peaks at `tp`.
fn growth_rate_for(omega_g: f64, tp: f64) -> f64 {
    -omega_g / (omega_g * tp).tan()
}

/// Builds the shape for a trial growth rate, or `None` when `alpha` puts the
/// opening zero crossing outside `(0, te)`.
fn shape_for(
    alpha: f64,
    cycle: &CycleParms,
    beta: f64,
    k: f64,
    ee: f64,
) -> Option<ShapeParms> {
    let omega_g = opening_frequency(alpha, cycle.tp)?;
    let (sin, cos) = (omega_g * cycle.te).sin_cos();
    if !(sin < 0.) {
        return None;
    }
    let growth = (alpha * cycle.te).exp();
    let e0 = -ee / (growth * sin);
    let opening_slope = e0 * growth * (alpha * sin + omega_g * cos);
    let duration = cycle.return_duration();

    let return_segment = if beta.is_infinite() {
        ReturnSegment::Abrupt
    } else if k == 0. {
        //  a exp(-b s) + B,  with  a + B = -Ee  and  a exp(-b D) + B = 0
        let tail = (-beta * duration).exp();
        let a = -ee / (1. - tail);
        ReturnSegment::Decaying {
            amplitude: Complex64::new(a, 0.),
            rate: Complex64::new(-beta, 0.),
            offset: -a * tail,
        }
    } else {
        //  exp(-b s) (a1 cos(q s) - a2 sin(q s)) + B,   q = k pi / D
        //  value at 0:   a1 + B = -Ee
        //  slope at 0:   -b a1 - q a2 = S
        //  value at D:   exp(-b D) (a1 cos(q D) - a2 sin(q D)) + B = 0
        let q = k * PI / duration;
        let tail = (-beta * duration).exp();
        let (sin_d, cos_d) = (q * duration).sin_cos();
        let den = tail * (cos_d + beta * sin_d / q) - 1.;
        if den.abs() < f64::EPSILON {
            return None;
        }
        let a1 = (ee - tail * opening_slope * sin_d / q) / den;
        let a2 = -(opening_slope + beta * a1) / q;
        ReturnSegment::Decaying {
            amplitude: Complex64::new(a1, a2),
            rate: Complex64::new(-beta, q),
            offset: -ee - a1,
        }
    };

    Some(ShapeParms {
        alpha,
        omega_g,
        e0,
        ee,
        beta,
        k,
        te: cycle.te,
        tc: cycle.tc,
        return_segment,
    })
}

/// Solves the growth rate (and the derived opening and return coefficients)
/// so that the flow derivative of one cycle has zero net area.
///
/// # Arguments
/// * `cycle` - cycle timing
/// * `return_phase` - shape of the return phase
/// * `amplitude` - excitation amplitude `ee`, the magnitude of the negative peak at `te`
/// * `parms` - root-finding configuration
//
// The opening sinusoid must cross zero inside (0, te) and be negative at te:
//   omega_g te in (pi, 2 pi)
// Since alpha(omega_g) = -omega_g cot(omega_g tp) is increasing, that maps to
//   alpha in (alpha(pi/te), alpha(2 pi/te))        alpha(2 pi/te) = +inf when te <= 2 tp
pub fn solve_shape(
    cycle: &CycleParms,
    return_phase: ReturnPhase,
    amplitude: f64,
    parms: &SolverParms,
) -> LfResult<ShapeParms> {
    cycle.validate()?;
    if !(amplitude > 0.) || !amplitude.is_finite() {
        return LfError::invalid("amplitude", "must be positive");
    }
    let k = return_phase.order();
    if !(k >= 0.) || !k.is_finite() {
        return LfError::invalid("order", "must be a non-negative number");
    }
    if k > 0. && cycle.ta == 0. {
        return LfError::invalid("ta", "an oscillatory return phase needs ta > 0");
    }
    let beta = decay_rate(cycle.ta, cycle.return_duration(), parms)?;

    // net flow in units of ee * tc, independent of amplitude and time unit
    let flow_unit = amplitude * cycle.tc;
    let residual = |alpha: f64| {
        shape_for(alpha, cycle, beta, k, amplitude)
            .map(|shape| shape.net_area() / flow_unit)
            .filter(|area| area.is_finite())
            .unwrap_or(f64::NAN)
    };

    let (lower, upper) = alpha_bracket(cycle, &residual, parms).inspect_err(|err| {
        warn!(tp = cycle.tp, te = cycle.te, ta = cycle.ta, %err, "no growth-rate bracket");
    })?;
    let (alpha, iterations) = scan_and_bisect(&residual, lower, upper, 1. / cycle.tc, parms).inspect_err(|err| {
        warn!(tp = cycle.tp, te = cycle.te, ta = cycle.ta, %err, "growth-rate solve failed");
    })?;

    let Some(shape) = shape_for(alpha, cycle, beta, k, amplitude) else {
        return LfError::no_convergence("growth rate", iterations, "root left the admissible range");
    };
    debug!(
        alpha,
        beta,
        omega_g = shape.omega_g,
        e0 = shape.e0,
        iterations,
        "solved LF shape parameters"
    );
    Ok(shape)
}

/// Admissible growth-rate interval, nudged inwards from the ends where the
/// amplitude diverges.
fn alpha_bracket<F: Fn(f64) -> f64>(
    cycle: &CycleParms,
    residual: &F,
    parms: &SolverParms,
) -> LfResult<(f64, f64)> {
    let alpha_lo = growth_rate_for(PI / cycle.te, cycle.tp);
    let lower = alpha_lo + BRACKET_MARGIN * (alpha_lo.abs() + 1. / cycle.tc);

    if cycle.te > 2. * cycle.tp {
        let alpha_hi = growth_rate_for(2. * PI / cycle.te, cycle.tp);
        let upper = alpha_hi - BRACKET_MARGIN * (alpha_hi - alpha_lo);
        return Ok((lower, upper));
    }

    // unbounded above: double the span until the residual changes sign
    let start = residual(lower);
    let mut span = 1. / cycle.tc;
    for _ in 0..parms.max_iterations.min(64) {
        let upper = lower + span;
        let value = residual(upper);
        if value.is_finite() && (!start.is_finite() || (value > 0.) != (start > 0.)) {
            return Ok((lower, upper));
        }
        span *= 2.;
    }
    LfError::no_convergence(
        "growth rate",
        parms.max_iterations.min(64),
        "no sign change of the flow residual above the lower bracket end",
    )
}

/// Scans `[lower, upper]` for the first sign change of `residual`, then bisects it.
fn scan_and_bisect<F: Fn(f64) -> f64>(
    residual: &F,
    lower: f64,
    upper: f64,
    scale: f64,
    parms: &SolverParms,
) -> LfResult<(f64, usize)> {
    let n = parms.scan_points.max(2);
    let points: Vec<(f64, f64)> = (0..=n)
        .map(|i| {
            let alpha = lower + (upper - lower) * i as f64 / n as f64;
            (alpha, residual(alpha))
        })
        .filter(|(_, value)| value.is_finite())
        .collect();

    for pair in points.windows(2) {
        let ((a, fa), (b, fb)) = (pair[0], pair[1]);
        if fa == 0. {
            return Ok((a, 0));
        }
        if (fa > 0.) != (fb > 0.) || fb == 0. {
            return bisect(residual, a, b, fa > 0., scale, "growth rate", parms);
        }
    }
    LfError::no_convergence(
        "growth rate",
        0,
        format!("net flow residual keeps its sign on [{lower}, {upper}]"),
    )
}
