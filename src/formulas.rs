//! Closed-form phase formulas of the LF glottal source.
//!
//! Every formula maps a sequence of time samples to a sequence of the same
//! length. Samples outside a formula's support evaluate to zero, and so does
//! the whole sequence when a governing time parameter is non-positive.

use crate::utils::ramp;
use num_complex::Complex64;
use std::f64::consts::PI;

/// Upper bound on the bisection steps spent on the opening frequency.
/// The bracket `(0, pi)` is exhausted to machine precision well before this.
const OPENING_BISECTIONS: usize = 128;

fn zeros(t: &[f64]) -> Vec<f64> {
    vec![0.; t.len()]
}

fn usable(x: f64) -> bool {
    x > 0. && x.is_finite()
}

/// Returns the angular frequency `omega_g` of the opening sinusoid.
///
/// `omega_g` is the unique value in `(0, pi / tp)` for which
/// `exp(alpha * t) * sin(omega_g * t)` peaks at `t = tp`:
//
//  d/dt [exp(a t) sin(w t)] = exp(a t) (a sin(w t) + w cos(w t)) = 0   at t = tp
//  with x = w tp, c = a tp:   g(x) = c sin(x) + x cos(x) = 0
//  g > 0 near 0 when c > -1, g(pi) = -pi, and -x cot(x) is increasing on (0, pi),
//  so the root is unique.
///
/// Returns `None` when `alpha * tp <= -1` (the sinusoid cannot peak at `tp`)
/// or when `tp` is not positive.
pub fn opening_frequency(alpha: f64, tp: f64) -> Option<f64> {
    if !usable(tp) || !alpha.is_finite() {
        return None;
    }
    let c = alpha * tp;
    if c <= -1. {
        return None;
    }
    let (mut lo, mut hi) = (0_f64, PI);
    for _ in 0..OPENING_BISECTIONS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        if c * mid.sin() + mid * mid.cos() > 0. {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi) / tp)
}

/// Opening rise of the flow derivative, `exp(alpha * t) * sin(omega_g * t)` on `[0, te]`.
///
/// `omega_g` comes from [`opening_frequency`], so the rise peaks at `tp`.
/// The term is unscaled; the solver supplies the amplitude.
///
/// # Arguments
/// * `t` - time samples
/// * `tp` - instant of the positive peak of the flow derivative
/// * `te` - glottal closure instant, end of the support
/// * `alpha` - growth rate
pub fn open_term_k(t: &[f64], tp: f64, te: f64, alpha: f64) -> Vec<f64> {
    if !usable(te) {
        return zeros(t);
    }
    let Some(omega_g) = opening_frequency(alpha, tp) else {
        return zeros(t);
    };
    t.iter()
        .map(|&t| {
            if (0. ..=te).contains(&t) {
                (alpha * t).exp() * (omega_g * t).sin()
            } else {
                0.
            }
        })
        .collect()
}

/// Opening shaping term, `(1 - cos(pi * t / tp)) * exp(alpha * t)` on `[0, tp]`.
pub fn open_i5(t: &[f64], tp: f64, alpha: f64) -> Vec<f64> {
    if !usable(tp) || !alpha.is_finite() {
        return zeros(t);
    }
    t.iter()
        .map(|&t| {
            if (0. ..=tp).contains(&t) {
                (1. - (PI * t / tp).cos()) * (alpha * t).exp()
            } else {
                0.
            }
        })
        .collect()
}

/// [`open_i5`] scaled so that its largest sample is 1.
///
/// Left unscaled when no sample is positive.
pub fn open_i5_normalized(t: &[f64], tp: f64, alpha: f64) -> Vec<f64> {
    let mut out = open_i5(t, tp, alpha);
    let max = out.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max > 0. && max.is_finite() {
        out.iter_mut().for_each(|v| *v /= max);
    }
    out
}

/// Variants of the closing term.
///
/// All of them are windowed integrals of a (possibly decaying, possibly
/// oscillating) exponential over `[t - phase, t]`, clipped to the window
/// `[-omega, omega]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClosingTerm {
    /// Non-oscillatory, undamped case (`beta = 0`, `k = 0`): the length of the
    /// intersection, written as a difference of ramps.
    CriticallyDamped { phase: f64 },
    /// `sin(omega * pi * t)^order / (omega * pi)`, the integral of the
    /// `order = 1` cosine harmonic from 0.
    Harmonic { order: i32 },
    /// General case: integral of `exp(beta * (t - tau)) * cos(k * pi * tau / omega)`.
    Exponential { phase: f64, beta: f64, k: f64 },
}

/// Evaluates a [`ClosingTerm`] with window half-width (or frequency, for
/// [`ClosingTerm::Harmonic`]) `omega`.
//
// Formulas:
//  r(x) = x for x > 0, else 0
//  CriticallyDamped:
//    out = -r(t - w) + r(t + w) + r(t - d - w) - r(t - d + w)
//        = |[t - d, t] n [-w, w]|                                for d >= 0
//  Exponential:
//    c = -beta + i k pi / w
//    l = max(t - d, -w),  u = min(t, w)
//    out = exp(beta t) Re{ (exp(c u) - exp(c l)) / c }           for u > l, else 0
//        = int_l^u exp(beta (t - tau)) cos(k pi tau / w) dtau
//  With beta = 0 and k = 0 the exponential form degenerates to the interval length.
pub fn closing_term(t: &[f64], omega: f64, term: ClosingTerm) -> Vec<f64> {
    if !usable(omega) {
        return zeros(t);
    }
    match term {
        ClosingTerm::CriticallyDamped { phase } => {
            if !usable(phase) {
                return zeros(t);
            }
            t.iter()
                .map(|&t| {
                    -ramp(t - omega) + ramp(t + omega) + ramp(t - phase - omega)
                        - ramp(t - phase + omega)
                })
                .collect()
        }
        ClosingTerm::Harmonic { order } => {
            let w = omega * PI;
            t.iter()
                .map(|&t| if t == 0. { 0. } else { (w * t).sin().powi(order) / w })
                .collect()
        }
        ClosingTerm::Exponential { phase, beta, k } => {
            if beta == 0. && k == 0. {
                return closing_term(t, omega, ClosingTerm::CriticallyDamped { phase });
            }
            if !usable(phase) || !beta.is_finite() || !k.is_finite() {
                return zeros(t);
            }
            let c = Complex64::new(-beta, k * PI / omega);
            t.iter()
                .map(|&t| {
                    let lower = (t - phase).max(-omega);
                    let upper = t.min(omega);
                    if upper <= lower {
                        return 0.;
                    }
                    let integral = ((c * upper).exp() - (c * lower).exp()) / c;
                    (beta * t).exp() * integral.re
                })
                .collect()
        }
    }
}

/// Closing rectangular-difference term, see [`ClosingTerm::CriticallyDamped`].
pub fn close_i2_k0_xi0(t: &[f64], omega: f64, phase: f64) -> Vec<f64> {
    closing_term(t, omega, ClosingTerm::CriticallyDamped { phase })
}

/// Closing oscillatory term, see [`ClosingTerm::Harmonic`].
pub fn close_i2_kn0(t: &[f64], omega: f64, n: i32) -> Vec<f64> {
    closing_term(t, omega, ClosingTerm::Harmonic { order: n })
}

/// Closing exponential-sinusoid term, see [`ClosingTerm::Exponential`].
pub fn close_i4(t: &[f64], omega: f64, phase: f64, beta: f64, k: f64) -> Vec<f64> {
    closing_term(t, omega, ClosingTerm::Exponential { phase, beta, k })
}

/// Non-oscillatory closing exponential term, `close_i4` with `k = 0`.
pub fn close_i4_k0(t: &[f64], omega: f64, phase: f64, beta: f64) -> Vec<f64> {
    close_i4(t, omega, phase, beta, 0.)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(start: f64, stop: f64, step: f64) -> Vec<f64> {
        let n = ((stop - start) / step).round() as usize;
        (0..=n).map(|i| start + i as f64 * step).collect()
    }

    /// Midpoint-rule reference for the exponential closing term.
    fn closing_reference(t: f64, omega: f64, phase: f64, beta: f64, k: f64) -> f64 {
        let lower = (t - phase).max(-omega);
        let upper = t.min(omega);
        if upper <= lower {
            return 0.;
        }
        let steps = 20_000;
        let h = (upper - lower) / steps as f64;
        (0..steps)
            .map(|i| {
                let tau = lower + (i as f64 + 0.5) * h;
                (beta * (t - tau)).exp() * (k * PI * tau / omega).cos() * h
            })
            .sum()
    }

    #[test]
    fn test_opening_frequency() {
        let w = opening_frequency(0., 0.25).unwrap();
        assert!((w - PI / 0.5).abs() < 1e-12);
        // the derivative of exp(a t) sin(w t) vanishes at tp
        let (alpha, tp) = (3., 0.4);
        let w = opening_frequency(alpha, tp).unwrap();
        let slope = alpha * (w * tp).sin() + w * (w * tp).cos();
        assert!(slope.abs() < 1e-10);
        assert!(w > 0. && w < PI / tp);
        assert_eq!(opening_frequency(-2.5, 0.4), None);
        assert_eq!(opening_frequency(1., 0.), None);
        assert_eq!(opening_frequency(f64::NAN, 0.4), None);
    }

    #[test]
    fn test_open_term_k() {
        let t = grid(0., 1., 0.01);
        let out = open_term_k(&t, 0.2, 0.6, 0.6);
        assert_eq!(out.len(), t.len());
        assert_eq!(out[0], 0.);
        assert!(out[10] > 0.);
        // zero past the closure instant
        assert!(out[61..].iter().all(|&v| v == 0.));
        // positive rise peaks at tp
        let peak = (1..60).max_by(|&a, &b| out[a].total_cmp(&out[b])).unwrap();
        assert_eq!(peak, 20);
        assert!(open_term_k(&[-0.1], 0.2, 0.6, 0.6)[0] == 0.);
        assert!(open_term_k(&t, 0., 0.6, 0.6).iter().all(|&v| v == 0.));
        assert!(open_term_k(&t, 0.2, 0.6, -10.).iter().all(|&v| v == 0.));
    }

    #[test]
    fn test_open_i5() {
        let t = grid(0., 1., 0.01);
        let out = open_i5(&t, 0.2, 1.5);
        assert_eq!(out[0], 0.);
        assert!((out[20] - 2. * (1.5_f64 * 0.2).exp()).abs() < 1e-12);
        assert!(out[21..].iter().all(|&v| v == 0.));
        assert_eq!(open_i5(&[-0.05], 0.2, 1.5), vec![0.]);
        for tp in [0., -0.3] {
            let out = open_i5(&t, tp, 1.5);
            assert_eq!(out.len(), t.len());
            assert!(out.iter().all(|&v| v == 0.));
        }
        assert!(open_i5(&[], 0.2, 1.).is_empty());
    }

    #[test]
    fn test_open_i5_normalized() {
        let t = grid(0., 1., 0.01);
        let raw = open_i5(&t, 0.2, 1.5);
        let out = open_i5_normalized(&t, 0.2, 1.5);
        assert_eq!(out[20], 1.);
        assert!(out.iter().all(|&v| (0. ..=1.).contains(&v)));
        assert!((out[10] - raw[10] / raw[20]).abs() < 1e-15);
        // peak moves before tp for a strongly decaying exponential
        let out = open_i5_normalized(&t, 0.2, -40.);
        let peak = out.iter().position(|&v| v == 1.).unwrap();
        assert!(peak > 0 && peak < 20);
        assert!(open_i5_normalized(&t, 0., 1.5).iter().all(|&v| v == 0.));
        assert!(open_i5_normalized(&[], 0.2, 1.).is_empty());
    }

    #[test]
    fn test_close_i2_k0_xi0() {
        let t = grid(0., 1., 0.01);
        let (omega, phase) = (0.01, 0.6);
        let out = close_i2_k0_xi0(&t, omega, phase);
        assert_eq!(out.len(), t.len());
        assert!(out.iter().all(|v| v.is_finite()));
        for (&t, &v) in t.iter().zip(&out) {
            if t > phase + omega + 1e-9 {
                assert!(v.abs() < 1e-12, "t = {t}, v = {v}");
            }
            if t > omega + 1e-9 && t < phase - omega - 1e-9 {
                assert!((v - 2. * omega).abs() < 1e-12, "t = {t}, v = {v}");
            }
        }
        assert!((out[0] - omega).abs() < 1e-15);
    }

    #[test]
    fn test_close_i2_k0_xi0_structure() {
        let (omega, phase) = (0.05, 0.4);
        let t = grid(-0.2, 0.6, 0.01);
        let out = close_i2_k0_xi0(&t, omega, phase);
        // before phase - omega the trailing ramp pair has no support
        for (&t, &v) in t.iter().zip(&out) {
            if t < phase - omega {
                assert!((v - (-ramp(t - omega) + ramp(t + omega))).abs() < 1e-15);
            }
        }
        // symmetric about phase / 2
        let mirrored: Vec<f64> = t.iter().map(|&t| phase - t).collect();
        let back = close_i2_k0_xi0(&mirrored, omega, phase);
        for (a, b) in out.iter().zip(&back) {
            assert!((a - b).abs() < 1e-12);
        }
        // no support without a phase offset
        assert!(close_i2_k0_xi0(&t, omega, 0.).iter().all(|&v| v == 0.));
        assert!(close_i2_k0_xi0(&t, -omega, phase).iter().all(|&v| v == 0.));
    }

    #[test]
    fn test_close_i2_kn0() {
        for omega in [0.5, 1., 2., 7.3] {
            for n in 0..5 {
                assert_eq!(close_i2_kn0(&[0.], omega, n), vec![0.]);
            }
        }
        let out = close_i2_kn0(&[0.25], 2., 1);
        assert!((out[0] - 1. / (2. * PI)).abs() < 1e-15);
        let out = close_i2_kn0(&[0.1], 1., 3);
        let expected = (PI * 0.1).sin().powi(3) / PI;
        assert!((out[0] - expected).abs() < 1e-15);
        assert!(close_i2_kn0(&[0.1, 0.2], 0., 1).iter().all(|&v| v == 0.));
    }

    #[test]
    fn test_close_i4_matches_quadrature() {
        let t = grid(-0.3, 0.7, 0.05);
        for (omega, phase, beta, k) in [
            (0.2, 0.3, 2., 1.),
            (0.2, 0.5, -3., 2.),
            (0.1, 0.15, 0., 1.),
            (0.2, 0.3, 4., 0.),
        ] {
            let out = close_i4(&t, omega, phase, beta, k);
            for (&t, &v) in t.iter().zip(&out) {
                let reference = closing_reference(t, omega, phase, beta, k);
                assert!((v - reference).abs() < 1e-6, "t = {t}: {v} vs {reference}");
            }
        }
    }

    #[test]
    fn test_close_i4_degenerates_to_ramps() {
        let t = grid(-0.2, 1., 0.01);
        let ramps = close_i2_k0_xi0(&t, 0.05, 0.6);
        assert_eq!(close_i4(&t, 0.05, 0.6, 0., 0.), ramps);
        let nearly = close_i4(&t, 0.05, 0.6, 1e-6, 0.);
        for (a, b) in nearly.iter().zip(&ramps) {
            assert!((a - b).abs() < 1e-6);
        }
        assert!(close_i4(&t, 0., 0.6, 1., 1.).iter().all(|&v| v == 0.));
        assert_eq!(close_i4_k0(&t, 0.05, 0.6, 2.), close_i4(&t, 0.05, 0.6, 2., 0.));
    }
}
