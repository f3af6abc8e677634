use std::{path::Path, time::Instant};

use rand::{Rng, SeedableRng};

use ffnet::matrix::FMatrix;
use ffnet::serialization;
use ffnet::{Activation, Network, StopReason, TrainConfig};

const OUT_ROOT: &str = "./out";
const SAMPLES: usize = 400;

fn main() {
    if !Path::new(OUT_ROOT).exists() {
        std::fs::create_dir_all(OUT_ROOT).unwrap();
    }

    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(89);

    // Noisy XOR corners, cycling through all four so both classes are
    // balanced.
    let mut data = Vec::with_capacity(SAMPLES);
    let mut labels = Vec::with_capacity(SAMPLES);
    for i in 0..SAMPLES {
        let a = (i >> 1) & 1;
        let b = i & 1;
        data.push(vec![
            a as f32 + rng.gen_range(-0.1..0.1),
            b as f32 + rng.gen_range(-0.1..0.1),
        ]);
        labels.push(a ^ b);
    }

    let mut network = Network::new(2, &[8], Activation::Sigmoid, &mut rng).unwrap();

    let config = TrainConfig {
        learning_rate: 0.5,
        batch_size: 16,
        max_epochs: 5000,
        convergence_threshold: 1e-7,
        decay: false,
    };

    println!("Training on {} noisy XOR samples", SAMPLES);
    println!(
        "Network: 2 -> 8 -> 2, batch size {}, learning rate {}",
        config.batch_size, config.learning_rate
    );

    let start = Instant::now();
    let report = network.train(&data, &labels, &config, &mut rng).unwrap();
    let duration = Instant::now() - start;

    match report.stop {
        StopReason::Converged => println!(
            "Converged after {} epochs ({:.3}s)",
            report.epochs,
            duration.as_secs_f32()
        ),
        StopReason::MaxEpochsReached => println!(
            "Stopped at the epoch budget of {} ({:.3}s)",
            report.epochs,
            duration.as_secs_f32()
        ),
    }

    if let Some(loss) = report.final_validation_loss() {
        println!("Final validation loss: {}", loss);
        assert!(!loss.is_nan());
    }

    let mut batch = FMatrix::zeros(SAMPLES, 2);
    for (r, row) in data.iter().enumerate() {
        batch[(r, 0)] = row[0];
        batch[(r, 1)] = row[1];
    }

    let predictions = network.predict(&batch).unwrap();
    let correct = predictions
        .iter()
        .zip(&labels)
        .filter(|(p, l)| p == l)
        .count();
    println!("Accuracy on the training data: {}/{}", correct, SAMPLES);

    let file_name = format!("{}/xor-checkpoint", OUT_ROOT);
    serialization::save_network(&file_name, &network).unwrap();

    let restored = serialization::load_network(&file_name).unwrap();
    assert_eq!(restored.predict(&batch).unwrap(), predictions);
    println!("Checkpoint saved to {}", file_name);
}
