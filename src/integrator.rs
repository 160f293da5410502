/// Trapezoidal running integral of a sampled signal, starting at 0.
///
/// # Arguments
/// * `signal` - uniformly sampled values
/// * `sample_period` - time between two samples
//
// y[0] = 0
// y[n] = y[n-1] + (x[n-1] + x[n]) * T / 2
pub fn integrate(signal: &[f64], sample_period: f64) -> Vec<f64> {
    let mut acc = 0.;
    let mut previous: Option<f64> = None;
    signal
        .iter()
        .map(|&x| {
            if let Some(p) = previous {
                acc += 0.5 * (p + x) * sample_period;
            }
            previous = Some(x);
            acc
        })
        .collect()
}
