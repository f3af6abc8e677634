use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::{NetworkError, Result};
use crate::matrix::FMatrix;

/// Width of the fixed binary-classification head.
pub const OUTPUT_UNITS: usize = 2;

// Keeps the initial pre-activations near the linear region of the sigmoid.
const WEIGHT_INIT_STD: f32 = 1e-3;

#[derive(Serialize, Deserialize, Debug)]
pub struct Layer {
    units: usize,
    activation: Activation,
    weights: FMatrix,
}

impl Layer {
    pub fn new<R: Rng + ?Sized>(
        units: usize,
        activation: Activation,
        inputs: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if units == 0 || inputs == 0 {
            return Err(NetworkError::EmptyLayer { units, inputs });
        }

        let normal = Normal::new(0.0, WEIGHT_INIT_STD).unwrap();
        let mut weights = FMatrix::zeros(units, inputs);
        for r in 0..units {
            for c in 0..inputs {
                weights[(r, c)] = normal.sample(rng);
            }
        }

        Ok(Layer {
            units,
            activation,
            weights,
        })
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn weights(&self) -> &FMatrix {
        &self.weights
    }

    #[cfg(test)]
    pub(crate) fn weights_mut(&mut self) -> &mut FMatrix {
        &mut self.weights
    }
}

/// Everything one forward call computes for one batch. Returned by value, so
/// no transient state lingers on the layers between non-sequential calls.
#[derive(Debug)]
pub struct ForwardPass {
    input: FMatrix,
    pre_activations: Vec<FMatrix>,
    outputs: Vec<FMatrix>,
}

impl ForwardPass {
    pub fn output(&self) -> &FMatrix {
        &self.outputs[self.outputs.len() - 1]
    }

    pub fn batch_size(&self) -> usize {
        self.input.rows()
    }

    fn layer_input(&self, i: usize) -> &FMatrix {
        if i == 0 {
            &self.input
        } else {
            &self.outputs[i - 1]
        }
    }
}

/// Per-layer weight gradients for one batch, each shaped exactly like the
/// weights of its layer.
#[derive(Debug)]
pub struct Gradients {
    per_layer: Vec<FMatrix>,
}

impl Gradients {
    pub fn layer(&self, i: usize) -> &FMatrix {
        &self.per_layer[i]
    }

    pub fn len(&self) -> usize {
        self.per_layer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_layer.is_empty()
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Network {
    input_dim: usize,
    layers: Vec<Layer>,
}

impl Network {
    /// Chains one layer per hidden width, then a fixed two-unit sigmoid
    /// head. Deterministic for a seeded rng.
    pub fn new<R: Rng + ?Sized>(
        input_dim: usize,
        hidden_sizes: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        let mut layers = Vec::with_capacity(hidden_sizes.len() + 1);

        let mut prev_width = input_dim;
        for &width in hidden_sizes {
            layers.push(Layer::new(width, activation, prev_width, rng)?);
            prev_width = width;
        }

        layers.push(Layer::new(
            OUTPUT_UNITS,
            Activation::Sigmoid,
            prev_width,
            rng,
        )?);

        Ok(Network { input_dim, layers })
    }

    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[cfg(test)]
    pub(crate) fn layer_weights_mut(&mut self, i: usize) -> &mut FMatrix {
        self.layers[i].weights_mut()
    }

    pub fn forward(&self, batch: &FMatrix) -> Result<ForwardPass> {
        if batch.cols() != self.input_dim {
            return Err(NetworkError::ShapeMismatch {
                what: "batch feature width",
                expected: self.input_dim,
                found: batch.cols(),
            });
        }

        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut outputs: Vec<FMatrix> = Vec::with_capacity(self.layers.len());

        for (i, layer) in self.layers.iter().enumerate() {
            let input = if i == 0 { batch } else { &outputs[i - 1] };
            let pre_activation = input.mul(layer.weights.transpose());
            let output = layer.activation.apply(&pre_activation);
            pre_activations.push(pre_activation);
            outputs.push(output);
        }

        Ok(ForwardPass {
            input: batch.clone(),
            pre_activations,
            outputs,
        })
    }

    fn one_hot(&self, gold_labels: &[usize], batch_size: usize) -> Result<FMatrix> {
        if gold_labels.len() != batch_size {
            return Err(NetworkError::ShapeMismatch {
                what: "gold label count",
                expected: batch_size,
                found: gold_labels.len(),
            });
        }

        let mut gold = FMatrix::zeros(batch_size, OUTPUT_UNITS);
        for (r, &label) in gold_labels.iter().enumerate() {
            if label >= OUTPUT_UNITS {
                return Err(NetworkError::InvalidLabel {
                    label,
                    classes: OUTPUT_UNITS,
                });
            }
            gold[(r, label)] = 1.0;
        }

        Ok(gold)
    }

    /// Gradients for every layer against the current weights. Walks the
    /// layers back to front; nothing is mutated here, so every downstream
    /// delta is propagated through pre-update weights.
    pub fn backward(&self, pass: &ForwardPass, gold_labels: &[usize]) -> Result<Gradients> {
        let gold = self.one_hot(gold_labels, pass.batch_size())?;

        let last = self.layers.len() - 1;
        let out_layer = &self.layers[last];

        let mut per_layer: Vec<FMatrix> = Vec::with_capacity(self.layers.len());

        // Head: delta = -(gold - output) ⊙ act'(pre-activation).
        let mut delta = pass.outputs[last].clone();
        delta.sub_ip(&gold);
        delta.hadamard_ip(out_layer.activation.derivative(&pass.pre_activations[last]));

        per_layer.push(delta.transpose().mul(pass.layer_input(last)));

        for i in (0..last).rev() {
            let downstream = &self.layers[i + 1];

            let mut layer_delta = delta.mul(&downstream.weights);
            layer_delta.hadamard_ip(
                self.layers[i]
                    .activation
                    .derivative(&pass.pre_activations[i]),
            );

            per_layer.push(layer_delta.transpose().mul(pass.layer_input(i)));
            delta = layer_delta;
        }

        per_layer.reverse();

        Ok(Gradients { per_layer })
    }

    /// Half the summed squared error against the one-hot gold matrix. Summed
    /// over the whole batch, not averaged by batch size.
    pub fn loss(&self, pass: &ForwardPass, gold_labels: &[usize]) -> Result<f32> {
        let gold = self.one_hot(gold_labels, pass.batch_size())?;
        let output = pass.output();

        let mut loss = 0.0;
        for r in 0..gold.rows() {
            for c in 0..OUTPUT_UNITS {
                loss += (gold[(r, c)] - output[(r, c)]).powi(2);
            }
        }

        Ok(0.5 * loss)
    }

    pub fn update(&mut self, gradients: &Gradients, learning_rate: f32) {
        assert_eq!(gradients.per_layer.len(), self.layers.len());

        for (layer, gradient) in self.layers.iter_mut().zip(&gradients.per_layer) {
            let mut step = gradient.clone();
            step.scalar_mul_ip(-learning_rate);
            layer.weights.add_ip(step);
        }
    }

    /// Per-row argmax over the two output columns; the first column wins
    /// ties.
    pub fn predict(&self, batch: &FMatrix) -> Result<Vec<usize>> {
        let pass = self.forward(batch)?;
        let output = pass.output();

        let mut predictions = Vec::with_capacity(output.rows());
        for r in 0..output.rows() {
            let mut best = 0;
            for c in 1..output.cols() {
                if output[(r, c)] > output[(r, best)] {
                    best = c;
                }
            }
            predictions.push(best);
        }

        Ok(predictions)
    }
}
