use hound::{SampleFormat, WavSpec, WavWriter};
use lfsyn::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::error::Error;

const DEMO_MODEL_PARMS: ModelParms = ModelParms {
    sample_rate: 44100,
    return_phase: ReturnPhase::Exponential,
    window: Window::Hann,
    amplitude: 1.,
    solver: SolverParms {
        tolerance: 1e-12,
        residual_tolerance: 1e-9,
        max_iterations: 200,
        scan_points: 64,
    },
};
const F0: f64 = 120.;
const DURATION: f64 = 1.;
const JITTER_LEVEL: f64 = 0.01;

fn main() -> Result<(), Box<dyn Error>> {
    let cycle = CycleParms::from_quotients(1. / F0, 0.6, 2.5, 0.02)?;
    let cycles = vec![cycle; (DURATION * F0) as usize];
    let mut rng = SmallRng::seed_from_u64(1);
    let train = generate_pulse_train(&DEMO_MODEL_PARMS, &cycles, JITTER_LEVEL, &mut rng)?;

    let peak = train.iter().fold(0., |m: f64, v| m.max(v.abs()));
    let spec = WavSpec {
        channels: 1,
        sample_rate: DEMO_MODEL_PARMS.sample_rate as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create("pulse_train.wav", spec)?;
    for sample in &train {
        writer.write_sample((0.5 * sample / peak) as f32)?;
    }
    writer.finalize()?;

    let single = generate_cycle(&cycle, &DEMO_MODEL_PARMS)?;
    println!(
        "{} samples, growth rate {:.2}, decay rate {:.2}",
        train.len(),
        single.growth_rate,
        single.decay_rate
    );

    Ok(())
}
