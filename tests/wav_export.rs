use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use lfsyn::*;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::io::Cursor;

#[test]
fn pulse_train_survives_wav_round_trip() {
    let parms = ModelParms {
        sample_rate: 16000,
        ..Default::default()
    };
    let cycle = CycleParms::from_quotients(0.008, 0.6, 2., 0.02).unwrap();
    let mut rng = SmallRng::seed_from_u64(7);
    let train = generate_pulse_train(&parms, &[cycle; 4], 0.05, &mut rng).unwrap();
    assert!(!train.is_empty());
    assert!(train.iter().all(|v| v.is_finite()));

    let spec = WavSpec {
        channels: 1,
        sample_rate: parms.sample_rate as u32,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut buffer, spec).unwrap();
        for &sample in &train {
            writer.write_sample(sample as f32).unwrap();
        }
        writer.finalize().unwrap();
    }

    buffer.set_position(0);
    let mut reader = WavReader::new(buffer).unwrap();
    assert_eq!(reader.spec(), spec);
    let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
    assert_eq!(samples.len(), train.len());
    for (a, b) in samples.iter().zip(&train) {
        assert_eq!(*a, *b as f32);
    }
}
