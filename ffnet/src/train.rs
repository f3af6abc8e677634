use rand::prelude::SliceRandom;
use rand::Rng;

use crate::error::{NetworkError, Result};
use crate::matrix::FMatrix;
use crate::network::{Network, OUTPUT_UNITS};

/// Hyperparameters for one `Network::train` run.
#[derive(Clone, Debug)]
pub struct TrainConfig {
    pub learning_rate: f32,
    pub batch_size: usize,
    pub max_epochs: usize,
    pub convergence_threshold: f32,
    pub decay: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            learning_rate: 0.01,
            batch_size: 100,
            max_epochs: 1000,
            convergence_threshold: 1e-4,
            decay: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The validation loss settled within the convergence threshold.
    Converged,
    /// The epoch budget ran out first. A normal outcome, not an error.
    MaxEpochsReached,
}

#[derive(Debug)]
pub struct TrainReport {
    pub stop: StopReason,
    pub epochs: usize,
    /// Validation loss after each completed epoch, in order.
    pub validation_losses: Vec<f32>,
}

impl TrainReport {
    pub fn final_validation_loss(&self) -> Option<f32> {
        self.validation_losses.last().copied()
    }
}

fn gather_rows(data: &[Vec<f32>], indices: &[usize], width: usize) -> FMatrix {
    let mut batch = FMatrix::zeros(indices.len(), width);

    for (r, &index) in indices.iter().enumerate() {
        for c in 0..width {
            batch[(r, c)] = data[index][c];
        }
    }

    batch
}

fn gather_labels(labels: &[usize], indices: &[usize]) -> Vec<usize> {
    indices.iter().map(|&index| labels[index]).collect()
}

impl Network {
    /// Mini-batch gradient descent over `data`/`labels`.
    ///
    /// The paired rows are shuffled once; the first tenth of the permutation
    /// is held out for validation and stays fixed for the whole run, the
    /// rest is cut into consecutive mini-batches. Stops when the validation
    /// loss moves less than the configured threshold between epochs, or
    /// when the epoch budget runs out.
    pub fn train<R: Rng + ?Sized>(
        &mut self,
        data: &[Vec<f32>],
        labels: &[usize],
        config: &TrainConfig,
        rng: &mut R,
    ) -> Result<TrainReport> {
        if config.batch_size == 0 {
            return Err(NetworkError::InvalidHyperparameter { name: "batch_size" });
        }
        if config.max_epochs == 0 {
            return Err(NetworkError::InvalidHyperparameter { name: "max_epochs" });
        }
        if !(config.learning_rate > 0.0) {
            return Err(NetworkError::InvalidHyperparameter {
                name: "learning_rate",
            });
        }
        if labels.len() != data.len() {
            return Err(NetworkError::ShapeMismatch {
                what: "label count",
                expected: data.len(),
                found: labels.len(),
            });
        }
        for row in data {
            if row.len() != self.input_dim() {
                return Err(NetworkError::ShapeMismatch {
                    what: "feature vector width",
                    expected: self.input_dim(),
                    found: row.len(),
                });
            }
        }
        for &label in labels {
            if label >= OUTPUT_UNITS {
                return Err(NetworkError::InvalidLabel {
                    label,
                    classes: OUTPUT_UNITS,
                });
            }
        }

        let mut order: Vec<usize> = (0..data.len()).collect();
        order.shuffle(rng);

        // The head of the one-time permutation is the held-out slice for
        // every epoch; it is never re-drawn.
        let held_out = data.len() / 10;
        let (validation_indices, train_indices) = order.split_at(held_out);

        let validation_inputs = gather_rows(data, validation_indices, self.input_dim());
        let validation_labels = gather_labels(labels, validation_indices);

        let mut previous = {
            let pass = self.forward(&validation_inputs)?;
            self.loss(&pass, &validation_labels)?
        };

        let mut validation_losses = Vec::new();
        let mut step_count = 1usize;
        let mut rate = config.learning_rate;

        for epoch in 1..=config.max_epochs {
            for batch_indices in train_indices.chunks(config.batch_size) {
                let inputs = gather_rows(data, batch_indices, self.input_dim());
                let batch_labels = gather_labels(labels, batch_indices);

                let pass = self.forward(&inputs)?;
                let gradients = self.backward(&pass, &batch_labels)?;

                if config.decay {
                    self.update(&gradients, rate / config.batch_size as f32);
                } else {
                    self.update(&gradients, rate);
                }

                // One step per mini-batch across the whole run, never reset
                // per epoch.
                step_count += 1;
                if config.decay {
                    rate = config.learning_rate / (step_count as f32).sqrt();
                }
            }

            let current = {
                let pass = self.forward(&validation_inputs)?;
                self.loss(&pass, &validation_labels)?
            };
            validation_losses.push(current);

            if (previous - current).abs() < config.convergence_threshold {
                return Ok(TrainReport {
                    stop: StopReason::Converged,
                    epochs: epoch,
                    validation_losses,
                });
            }

            previous = current;
        }

        Ok(TrainReport {
            stop: StopReason::MaxEpochsReached,
            epochs: config.max_epochs,
            validation_losses,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{StopReason, TrainConfig};
    use crate::activation::Activation;
    use crate::error::NetworkError;
    use crate::matrix::FMatrix;
    use crate::network::Network;
    use rand::SeedableRng;

    // Two separable clusters with a little deterministic jitter.
    fn toy_dataset(count: usize) -> (Vec<Vec<f32>>, Vec<usize>) {
        let mut data = Vec::with_capacity(count);
        let mut labels = Vec::with_capacity(count);

        for i in 0..count {
            let jitter = (i % 5) as f32 * 0.01;
            if i % 2 == 0 {
                data.push(vec![0.1 + jitter, 0.2 + jitter]);
                labels.push(0);
            } else {
                data.push(vec![0.9 - jitter, 0.8 - jitter]);
                labels.push(1);
            }
        }

        (data, labels)
    }

    fn toy_network(seed: u64) -> (Network, rand_chacha::ChaCha8Rng) {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
        let network = Network::new(2, &[4], Activation::Sigmoid, &mut rng).unwrap();
        (network, rng)
    }

    #[test]
    fn non_positive_hyperparameters_are_rejected() {
        let (mut network, mut rng) = toy_network(7);
        let (data, labels) = toy_dataset(20);

        let cases = [
            (
                TrainConfig {
                    batch_size: 0,
                    ..TrainConfig::default()
                },
                "batch_size",
            ),
            (
                TrainConfig {
                    max_epochs: 0,
                    ..TrainConfig::default()
                },
                "max_epochs",
            ),
            (
                TrainConfig {
                    learning_rate: 0.0,
                    ..TrainConfig::default()
                },
                "learning_rate",
            ),
            (
                TrainConfig {
                    learning_rate: -1.0,
                    ..TrainConfig::default()
                },
                "learning_rate",
            ),
            (
                TrainConfig {
                    learning_rate: f32::NAN,
                    ..TrainConfig::default()
                },
                "learning_rate",
            ),
        ];

        for (config, name) in cases {
            assert_eq!(
                network.train(&data, &labels, &config, &mut rng).unwrap_err(),
                NetworkError::InvalidHyperparameter { name }
            );
        }
    }

    #[test]
    fn mismatched_label_count_is_rejected() {
        let (mut network, mut rng) = toy_network(7);
        let (data, _) = toy_dataset(20);

        assert_eq!(
            network
                .train(&data, &[0, 1], &TrainConfig::default(), &mut rng)
                .unwrap_err(),
            NetworkError::ShapeMismatch {
                what: "label count",
                expected: 20,
                found: 2,
            }
        );
    }

    #[test]
    fn wrong_feature_width_is_rejected() {
        let (mut network, mut rng) = toy_network(7);

        let data = vec![vec![1.0, 2.0, 3.0]];
        let labels = vec![0];

        assert_eq!(
            network
                .train(&data, &labels, &TrainConfig::default(), &mut rng)
                .unwrap_err(),
            NetworkError::ShapeMismatch {
                what: "feature vector width",
                expected: 2,
                found: 3,
            }
        );
    }

    #[test]
    fn out_of_range_labels_are_rejected_before_any_update() {
        let (mut network, mut rng) = toy_network(7);
        let (data, mut labels) = toy_dataset(20);
        labels[19] = 3;

        let before: Vec<FMatrix> = network
            .layers()
            .iter()
            .map(|l| l.weights().clone())
            .collect();

        assert_eq!(
            network
                .train(&data, &labels, &TrainConfig::default(), &mut rng)
                .unwrap_err(),
            NetworkError::InvalidLabel { label: 3, classes: 2 }
        );

        for (layer, old) in network.layers().iter().zip(&before) {
            assert_eq!(layer.weights(), old);
        }
    }

    #[test]
    fn training_terminates_and_predicts_valid_classes() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(64550);
        let mut network = Network::new(3, &[5, 4], Activation::Relu, &mut rng).unwrap();

        let data = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]];
        let labels = vec![1, 0];

        let config = TrainConfig {
            learning_rate: 0.1,
            batch_size: 2,
            max_epochs: 10000,
            convergence_threshold: 1e-4,
            decay: false,
        };

        let report = network.train(&data, &labels, &config, &mut rng).unwrap();
        assert!(report.epochs <= 10000);

        let batch = FMatrix::from([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let predictions = network.predict(&batch).unwrap();

        assert_eq!(predictions.len(), 2);
        assert!(predictions.iter().all(|&p| p < 2));
    }

    #[test]
    fn oversized_batch_collapses_to_a_single_batch() {
        let (mut network, mut rng) = toy_network(7);
        let (data, labels) = toy_dataset(20);

        let config = TrainConfig {
            batch_size: 1000,
            max_epochs: 3,
            convergence_threshold: 0.0,
            ..TrainConfig::default()
        };

        let report = network.train(&data, &labels, &config, &mut rng).unwrap();

        assert_eq!(report.stop, StopReason::MaxEpochsReached);
        assert_eq!(report.epochs, 3);
    }

    #[test]
    fn huge_threshold_converges_after_the_first_epoch() {
        let (mut network, mut rng) = toy_network(7);
        let (data, labels) = toy_dataset(30);

        let config = TrainConfig {
            convergence_threshold: f32::INFINITY,
            ..TrainConfig::default()
        };

        let report = network.train(&data, &labels, &config, &mut rng).unwrap();

        assert_eq!(report.stop, StopReason::Converged);
        assert_eq!(report.epochs, 1);
        assert_eq!(report.validation_losses.len(), 1);
    }

    #[test]
    fn zero_threshold_runs_out_the_epoch_budget() {
        let (mut network, mut rng) = toy_network(7);
        let (data, labels) = toy_dataset(30);

        let config = TrainConfig {
            max_epochs: 5,
            convergence_threshold: 0.0,
            ..TrainConfig::default()
        };

        let report = network.train(&data, &labels, &config, &mut rng).unwrap();

        assert_eq!(report.stop, StopReason::MaxEpochsReached);
        assert_eq!(report.epochs, 5);
        assert_eq!(report.validation_losses.len(), 5);
    }

    #[test]
    fn report_history_tracks_every_epoch() {
        let (mut network, mut rng) = toy_network(7);
        let (data, labels) = toy_dataset(40);

        let config = TrainConfig {
            batch_size: 8,
            max_epochs: 50,
            ..TrainConfig::default()
        };

        let report = network.train(&data, &labels, &config, &mut rng).unwrap();

        assert_eq!(report.validation_losses.len(), report.epochs);
        assert!(report
            .final_validation_loss()
            .is_some_and(|loss| loss.is_finite()));
    }

    #[test]
    fn decayed_run_terminates() {
        let (mut network, mut rng) = toy_network(7);
        let (data, labels) = toy_dataset(40);

        let config = TrainConfig {
            learning_rate: 0.5,
            batch_size: 8,
            max_epochs: 50,
            decay: true,
            ..TrainConfig::default()
        };

        let report = network.train(&data, &labels, &config, &mut rng).unwrap();

        assert!(report.epochs >= 1);
        assert!(report
            .final_validation_loss()
            .is_some_and(|loss| loss.is_finite()));
    }

    #[test]
    fn training_is_deterministic_for_a_fixed_seed() {
        fn run(seed: u64) -> Network {
            let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
            let mut network = Network::new(2, &[6, 3], Activation::Sigmoid, &mut rng).unwrap();

            let (data, labels) = toy_dataset(50);
            let config = TrainConfig {
                learning_rate: 0.2,
                batch_size: 8,
                max_epochs: 20,
                convergence_threshold: 0.0,
                decay: true,
            };

            network.train(&data, &labels, &config, &mut rng).unwrap();
            network
        }

        let a = run(93128);
        let b = run(93128);

        for (la, lb) in a.layers().iter().zip(b.layers()) {
            assert_eq!(la.weights(), lb.weights());
        }
    }
}
