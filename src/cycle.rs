use crate::*;
use std::ops::Range;

/// Phase of the glottal cycle a sample belongs to.
///
/// A cycle starts in `Opening` and switches to `Closing` at `te`; there is
/// no transition back within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "strum", derive(strum::Display, strum::EnumString, strum::EnumIter))]
pub enum Phase {
    Opening,
    Closing,
}
impl Phase {
    pub fn at(t: f64, te: f64) -> Phase {
        if t < te {
            Phase::Opening
        } else {
            Phase::Closing
        }
    }
}

/// A contiguous run of samples in one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub phase: Phase,
    pub range: Range<usize>,
}

/// Splits a time axis into runs of equal phase.
pub fn segments(times: &[f64], te: f64) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(2);
    for (i, &t) in times.iter().enumerate() {
        let phase = Phase::at(t, te);
        match out.last_mut() {
            Some(segment) if segment.phase == phase => segment.range.end = i + 1,
            _ => out.push(Segment {
                phase,
                range: i..i + 1,
            }),
        }
    }
    out
}

/// Evaluates the flow derivative of one cycle on a time axis.
///
/// # Arguments
/// * `times` - sample instants, ascending
/// * `cycle` - cycle timing
/// * `shape` - solved shape parameters of the cycle
pub fn assemble_cycle(times: &[f64], cycle: &CycleParms, shape: &ShapeParms) -> Vec<f64> {
    let mut source = Vec::with_capacity(times.len());
    for segment in segments(times, cycle.te) {
        let t = &times[segment.range];
        match segment.phase {
            Phase::Opening => source.extend(
                open_term_k(t, cycle.tp, cycle.te, shape.alpha)
                    .into_iter()
                    .map(|v| shape.e0 * v),
            ),
            Phase::Closing => source.extend(t.iter().map(|&t| shape.return_value(t))),
        }
    }
    debug_assert_eq!(source.len(), times.len());
    source
}
