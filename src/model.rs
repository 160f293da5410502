use crate::*;
use rand::Rng;
use tracing::debug;

/// Band-limiting window half-width used when a cycle sets no reference time,
/// in sample periods.
const DEFAULT_REFERENCE_PERIODS: f64 = 2.;

/// Timing of one glottal cycle.
///
/// All times are measured from the start of the cycle, in the same unit as
/// the reciprocal of [`ModelParms::sample_rate`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CycleParms {
    /// Instant of maximum opening speed, the positive peak of the flow derivative.
    pub tp: f64,
    /// Glottal closure instant, the negative peak of the flow derivative.
    pub te: f64,
    /// Effective duration of the return phase, 0 for abrupt closure.
    pub ta: f64,
    /// Cycle length.
    pub tc: f64,
    /// Half-width of the band-limiting window; two sample periods when absent.
    pub reference_time: Option<f64>,
}
impl CycleParms {
    pub fn new(tp: f64, te: f64, ta: f64, tc: f64) -> LfResult<Self> {
        let parms = Self {
            tp,
            te,
            ta,
            tc,
            reference_time: None,
        };
        parms.validate()?;
        Ok(parms)
    }
    /// Builds the timing from voice-quality ratios.
    ///
    /// # Arguments
    /// * `period` - cycle length
    /// * `open_quotient` - `te / period`, in `(0, 1)`
    /// * `speed_quotient` - ratio of the rising to the falling part of the open phase, `tp / (te - tp)`
    /// * `return_quotient` - `ta / period`
    pub fn from_quotients(
        period: f64,
        open_quotient: f64,
        speed_quotient: f64,
        return_quotient: f64,
    ) -> LfResult<Self> {
        if !(period > 0.) || !period.is_finite() {
            return LfError::invalid("period", "must be positive");
        }
        if !(open_quotient > 0. && open_quotient < 1.) {
            return LfError::invalid("open_quotient", "must lie in (0, 1)");
        }
        if !(speed_quotient > 0.) || !speed_quotient.is_finite() {
            return LfError::invalid("speed_quotient", "must be positive");
        }
        if !(return_quotient >= 0.) {
            return LfError::invalid("return_quotient", "must not be negative");
        }
        let te = open_quotient * period;
        let tp = te * speed_quotient / (1. + speed_quotient);
        Self::new(tp, te, return_quotient * period, period)
    }
    pub fn with_reference_time(self, reference_time: f64) -> Self {
        Self {
            reference_time: Some(reference_time),
            ..self
        }
    }
    /// Checks `0 < tp < te < tc` and `0 <= ta < tc - te`.
    pub fn validate(&self) -> LfResult<()> {
        for (name, value) in [("tp", self.tp), ("te", self.te), ("ta", self.ta), ("tc", self.tc)] {
            if !value.is_finite() {
                return LfError::invalid(name, "must be finite");
            }
        }
        if self.tp <= 0. {
            return LfError::invalid("tp", "must be positive");
        }
        if self.te <= self.tp {
            return LfError::invalid("te", "must be greater than tp");
        }
        if self.tc <= self.te {
            return LfError::invalid("tc", "must be greater than te");
        }
        if self.ta < 0. {
            return LfError::invalid("ta", "must not be negative");
        }
        if self.ta >= self.return_duration() {
            return LfError::invalid("ta", "must be shorter than the return phase tc - te");
        }
        if let Some(reference_time) = self.reference_time {
            if !(reference_time > 0.) || !reference_time.is_finite() {
                return LfError::invalid("reference_time", "must be positive");
            }
        }
        Ok(())
    }
    /// Length of the return phase, `tc - te`.
    pub fn return_duration(&self) -> f64 {
        self.tc - self.te
    }
    /// Stretches all cycle times by `factor`. The reference time is kept,
    /// since it relates to the sample rate rather than to the cycle.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            tp: self.tp * factor,
            te: self.te * factor,
            ta: self.ta * factor,
            tc: self.tc * factor,
            reference_time: self.reference_time,
        }
    }
}

/// Model configuration shared by all cycles.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelParms {
    /// Samples per unit of time.
    pub sample_rate: usize,
    pub return_phase: ReturnPhase,
    pub window: Window,
    /// Excitation amplitude `ee`, the magnitude of the negative peak at `te`.
    pub amplitude: f64,
    pub solver: SolverParms,
}
impl Default for ModelParms {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            return_phase: ReturnPhase::default(),
            window: Window::default(),
            amplitude: 1.,
            solver: SolverParms::default(),
        }
    }
}

/// Selects one of the sampled signals of an [`LfModelOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "strum", derive(strum::Display, strum::EnumString, strum::EnumIter))]
pub enum Signal {
    Source,
    VolumeVelocity,
    AntiAliasedSource,
}

/// Sampled waveforms of one cycle together with the solved shape.
#[derive(Debug, Clone, PartialEq)]
pub struct LfModelOutput {
    /// Sample instants shared by all signals.
    pub time: Vec<f64>,
    /// Flow derivative.
    pub source: Vec<f64>,
    /// Glottal flow, the running integral of `source`.
    pub volume_velocity: Vec<f64>,
    /// Flow derivative with the closure edge band-limited.
    pub anti_aliased_source: Vec<f64>,
    pub decay_rate: f64,
    pub growth_rate: f64,
    pub shape: ShapeParms,
}
impl LfModelOutput {
    pub fn len(&self) -> usize {
        self.time.len()
    }
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
    pub fn signal(&self, signal: Signal) -> &[f64] {
        match signal {
            Signal::Source => &self.source,
            Signal::VolumeVelocity => &self.volume_velocity,
            Signal::AntiAliasedSource => &self.anti_aliased_source,
        }
    }
    /// Iterates over the `(time, value)` pairs of a signal.
    pub fn samples(&self, signal: Signal) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.time.iter().copied().zip(self.signal(signal).iter().copied())
    }
}

/// Generates one cycle of the LF glottal source.
///
/// # Arguments
/// * `cycle` - cycle timing
/// * `parms` - model configuration
pub fn generate_cycle(cycle: &CycleParms, parms: &ModelParms) -> LfResult<LfModelOutput> {
    cycle.validate()?;
    if parms.sample_rate == 0 {
        return LfError::invalid("sample_rate", "must be positive");
    }
    if !(parms.amplitude > 0.) || !parms.amplitude.is_finite() {
        return LfError::invalid("amplitude", "must be positive");
    }
    let sample_period = 1. / parms.sample_rate as f64;
    if cycle.tc < 2. * sample_period {
        return LfError::invalid(
            "tc",
            format!("cycle of {} is shorter than two sample periods", cycle.tc),
        );
    }

    let shape = solve_shape(cycle, parms.return_phase, parms.amplitude, &parms.solver)?;
    let time = time_axis(cycle.tc, parms.sample_rate);
    let source = assemble_cycle(&time, cycle, &shape);
    let volume_velocity = integrate(&source, sample_period);
    let half_width = cycle
        .reference_time
        .unwrap_or(DEFAULT_REFERENCE_PERIODS * sample_period);
    if half_width <= sample_period {
        return LfError::invalid(
            "reference_time",
            format!("{half_width} does not exceed the sample period {sample_period}"),
        );
    }
    let anti_aliased_source = anti_alias(&source, &time, &shape.closure(), parms.window, half_width);
    debug!(
        samples = time.len(),
        alpha = shape.alpha,
        beta = shape.beta,
        half_width,
        "generated LF cycle"
    );

    Ok(LfModelOutput {
        time,
        source,
        volume_velocity,
        anti_aliased_source,
        decay_rate: shape.beta,
        growth_rate: shape.alpha,
        shape,
    })
}

/// Generates consecutive cycles and concatenates their anti-aliased sources.
///
/// The last sample of each cycle coincides with the first sample of the next
/// one and is dropped.
///
/// # Arguments
/// * `parms` - model configuration
/// * `cycles` - timing of each cycle
/// * `jitter_level` - relative random stretch of each cycle, in `[0, 1)`
/// * `rng` - random source for the jitter
pub fn generate_pulse_train<R: Rng>(
    parms: &ModelParms,
    cycles: &[CycleParms],
    jitter_level: f64,
    rng: &mut R,
) -> LfResult<Vec<f64>> {
    if !(0. ..1.).contains(&jitter_level) {
        return LfError::invalid("jitter_level", "must lie in [0, 1)");
    }
    let mut out = Vec::new();
    for cycle in cycles {
        let factor = if jitter_level > 0. {
            1. + jitter_level * rng.random_range(-1. ..=1.)
        } else {
            1.
        };
        let output = generate_cycle(&cycle.scaled(factor), parms)?;
        let body = &output.anti_aliased_source[..output.len() - 1];
        out.extend_from_slice(body);
    }
    debug!(cycles = cycles.len(), samples = out.len(), "generated pulse train");
    Ok(out)
}
