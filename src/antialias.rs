//! Band-limiting of the discontinuity at the glottal closure instant.
//!
//! The raw flow derivative jumps (abrupt closure) or kinks (exponential
//! return) at `te`. Sampling such an edge aliases. Here the ideal unit step
//! and ramp at the edge are replaced by their convolutions with a short
//! cosine-series window, and the difference is added to the samples close
//! to the edge. Samples farther away than the window half-width are left
//! untouched.

use crate::utils::ramp;
use crate::*;
use std::f64::consts::PI;
use tracing::warn;

/// Cosine-series window used as the band-limiting kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "strum", derive(strum::Display, strum::EnumString, strum::EnumIter))]
pub enum Window {
    #[default]
    Hann,
    Blackman,
}
impl Window {
    /// Coefficients `a_k` of `sum_k a_k cos(k pi x / W)`.
    pub fn coefficients(self) -> &'static [f64] {
        match self {
            Window::Hann => &[0.5, 0.5],
            Window::Blackman => &[0.42, 0.5, 0.08],
        }
    }
    /// Unnormalized window value at offset `x`, for `|x| < half_width`.
    pub fn weight(self, x: f64, half_width: f64) -> f64 {
        self.coefficients()
            .iter()
            .enumerate()
            .map(|(k, a)| a * (k as f64 * PI * x / half_width).cos())
            .sum()
    }
}

/// Discontinuity of the flow derivative at the closure instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Closure {
    pub time: f64,
    /// Value after the edge minus value before it.
    pub jump: f64,
    /// Slope after the edge minus slope before it.
    pub slope_jump: f64,
}

/// Unit step smoothed by the window, evaluated at offsets `x` from the edge.
//
//  H(x) = 1 / (2 W a0) int_{-W}^{x} w(u) du,         w(u) = sum_k a_k cos(k pi u / W)
//       = sum_k a_k close_i4(x, W, 2W, 0, k) / (2 W a0)
//       = (x + W) / (2W) + sum_{k>=1} (a_k / a0) sin(k pi x / W) / (2 k pi)       |x| < W
//  H = 0 for x <= -W and 1 for x >= W.
pub fn smoothed_step(x: &[f64], window: Window, half_width: f64) -> Vec<f64> {
    let a = window.coefficients();
    let mut out: Vec<f64> = x.iter().map(|&x| if x >= 0. { 1. } else { 0. }).collect();
    let inside: Vec<usize> = (0..x.len()).filter(|&i| x[i].abs() < half_width).collect();
    let xs: Vec<f64> = inside.iter().map(|&i| x[i]).collect();
    let mut acc = vec![0.; xs.len()];
    for (k, ak) in a.iter().enumerate() {
        let term = close_i4(&xs, half_width, 2. * half_width, 0., k as f64);
        for (acc, term) in acc.iter_mut().zip(term) {
            *acc += ak * term;
        }
    }
    let norm = 2. * half_width * a[0];
    for (&i, acc) in inside.iter().zip(acc) {
        out[i] = acc / norm;
    }
    out
}

/// Unit ramp smoothed by the window, the running integral of [`smoothed_step`].
//
//  R(x) = (x + W)^2 / (4W)
//       + sum_{k>=1} (a_k / a0) / (2W) (W / (k pi))^2 ((-1)^k - cos(k pi x / W))     |x| < W
//  R = 0 for x <= -W and x for x >= W.
pub fn smoothed_ramp(x: &[f64], window: Window, half_width: f64) -> Vec<f64> {
    let a = window.coefficients();
    let w = half_width;
    x.iter()
        .map(|&x| {
            if x.abs() >= w {
                return ramp(x);
            }
            let mut r = (x + w).powi(2) / (4. * w);
            for (k, ak) in a.iter().enumerate().skip(1) {
                let kpi = k as f64 * PI;
                let sign = if k % 2 == 0 { 1. } else { -1. };
                r += ak / a[0] / (2. * w) * (w / kpi).powi(2) * (sign - (kpi * x / w).cos());
            }
            r
        })
        .collect()
}

/// Corrects the samples around a closure so that the edge is band-limited.
///
/// The corrections are redistributed with the window weights so that their
/// sum is zero, which leaves the net flow of the cycle unchanged.
///
/// # Arguments
/// * `source` - raw flow derivative samples
/// * `times` - sample instants, same length as `source`
/// * `closure` - position and size of the discontinuity
/// * `window` - band-limiting kernel
/// * `half_width` - kernel half-width (the reference time)
pub fn anti_alias(
    source: &[f64],
    times: &[f64],
    closure: &Closure,
    window: Window,
    half_width: f64,
) -> Vec<f64> {
    debug_assert_eq!(source.len(), times.len());
    let mut out = source.to_vec();
    if !(half_width > 0.)
        || !half_width.is_finite()
        || (closure.jump == 0. && closure.slope_jump == 0.)
    {
        return out;
    }
    let near: Vec<usize> = (0..times.len())
        .filter(|&i| (times[i] - closure.time).abs() < half_width)
        .collect();
    if near.len() < 2 {
        // a single sample cannot carry a zero-sum correction
        warn!(
            half_width,
            samples = near.len(),
            "closure window narrower than the sample spacing, edge left unsmoothed"
        );
        return out;
    }

    let x: Vec<f64> = near.iter().map(|&i| times[i] - closure.time).collect();
    let step = smoothed_step(&x, window, half_width);
    let smooth_ramp = smoothed_ramp(&x, window, half_width);
    let correction: Vec<f64> = x
        .iter()
        .zip(step.iter().zip(&smooth_ramp))
        .map(|(&x, (h, r))| {
            let u = if x >= 0. { 1. } else { 0. };
            closure.jump * (h - u) + closure.slope_jump * (r - ramp(x))
        })
        .collect();
    let weights: Vec<f64> = x.iter().map(|&x| window.weight(x, half_width)).collect();
    let total: f64 = correction.iter().sum();
    let weight_sum: f64 = weights.iter().sum();

    for ((&i, c), w) in near.iter().zip(correction).zip(weights) {
        out[i] += c - total * w / weight_sum;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_weight() {
        assert!((Window::Hann.weight(0., 1.) - 1.).abs() < 1e-15);
        assert!(Window::Hann.weight(0.999, 1.) < 1e-4);
        assert!((Window::Blackman.weight(0., 1.) - 1.).abs() < 1e-15);
        assert!(Window::Blackman.weight(0.5, 1.) > 0.);
    }

    #[test]
    fn test_smoothed_step() {
        for window in [Window::Hann, Window::Blackman] {
            let x = [-2., -1., -0.5, 0., 0.5, 0.999999, 1., 3.];
            let h = smoothed_step(&x, window, 1.);
            assert_eq!(h[0], 0.);
            assert_eq!(h[1], 0.);
            assert!((h[3] - 0.5).abs() < 1e-12);
            assert!((h[2] + h[4] - 1.).abs() < 1e-12);
            assert!((h[5] - 1.).abs() < 1e-6);
            assert_eq!(h[6], 1.);
            assert_eq!(h[7], 1.);
            // monotone
            let grid: Vec<f64> = (0..=200).map(|i| -1. + i as f64 * 0.01).collect();
            let h = smoothed_step(&grid, window, 1.);
            assert!(h.windows(2).all(|p| p[1] >= p[0] - 1e-12));
        }
    }

    #[test]
    fn test_smoothed_ramp() {
        for window in [Window::Hann, Window::Blackman] {
            let w = 0.3;
            let x: Vec<f64> = (0..=60).map(|i| -0.3 + i as f64 * 0.01).collect();
            let r = smoothed_ramp(&x, window, w);
            assert!(r[0].abs() < 1e-12);
            assert!((r[60] - 0.3).abs() < 1e-12);
            // R(x) - R(-x) = x
            assert!((r[40] - r[20] - 0.1).abs() < 1e-12);
            // derivative matches the smoothed step
            let h = smoothed_step(&x, window, w);
            for i in 1..60 {
                let slope = (r[i + 1] - r[i - 1]) / 0.02;
                assert!((slope - h[i]).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_anti_alias_step() {
        let times: Vec<f64> = (0..=100).map(|n| n as f64 / 100.).collect();
        let source: Vec<f64> = times.iter().map(|&t| if t < 0.6 { -1. } else { 0. }).collect();
        let closure = Closure {
            time: 0.6,
            jump: 1.,
            slope_jump: 0.,
        };
        let out = anti_alias(&source, &times, &closure, Window::Hann, 0.02);
        // only samples within the half-width move
        for (i, (a, b)) in source.iter().zip(&out).enumerate() {
            if !(59..=61).contains(&i) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
        assert!((out[60] - source[60]).abs() > 0.1);
        let moved: f64 = out.iter().zip(&source).map(|(a, b)| a - b).sum();
        assert!(moved.abs() < 1e-12);
        let max_step = |s: &[f64]| s.windows(2).map(|p| (p[1] - p[0]).abs()).fold(0., f64::max);
        assert!(max_step(&out) < 0.75 * max_step(&source));
    }

    #[test]
    fn test_anti_alias_noop() {
        let times = [0., 0.1, 0.2];
        let source = [1., 2., 3.];
        let closure = Closure {
            time: 0.1,
            jump: 0.,
            slope_jump: 0.,
        };
        assert_eq!(anti_alias(&source, &times, &closure, Window::Hann, 0.2), source);
        let closure = Closure {
            time: 5.,
            jump: 1.,
            slope_jump: 1.,
        };
        assert_eq!(anti_alias(&source, &times, &closure, Window::Blackman, 0.2), source);
        assert_eq!(anti_alias(&source, &times, &closure, Window::Hann, 0.), source);
    }

    #[test]
    fn test_anti_alias_narrow_window() {
        let times = [0., 0.1, 0.2];
        let source = [1., 2., 3.];
        let closure = Closure {
            time: 0.1,
            jump: 1.,
            slope_jump: 1.,
        };
        assert_eq!(anti_alias(&source, &times, &closure, Window::Hann, 0.05), source);
        let smoothed = anti_alias(&source, &times, &closure, Window::Hann, 0.15);
        assert!(smoothed.iter().zip(&source).filter(|(a, b)| a != b).count() >= 2);
        let total: f64 = smoothed.iter().sum();
        assert!((total - 6.).abs() < 1e-12);
    }
}
