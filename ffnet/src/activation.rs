use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::matrix::FMatrix;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    Sigmoid,
    Relu,
}

// Branching on the sign keeps exp() on a non-positive argument, so neither
// side can overflow for large |x|.
fn sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

impl Activation {
    pub fn apply(&self, input: &FMatrix) -> FMatrix {
        let (rows, cols) = input.shape();
        let mut output = FMatrix::zeros(rows, cols);

        match self {
            Activation::Sigmoid => {
                output
                    .par_iter_mut()
                    .zip(input.par_iter())
                    .for_each(|(out_elem, in_elem)| {
                        *out_elem = sigmoid(*in_elem);
                    });
            }
            Activation::Relu => {
                output
                    .par_iter_mut()
                    .zip(input.par_iter())
                    .for_each(|(out_elem, in_elem)| {
                        *out_elem = if *in_elem >= 0.0 { *in_elem } else { 0.0 };
                    });
            }
        }

        output
    }

    /// Derivative with respect to the pre-activation value.
    pub fn derivative(&self, pre_activation: &FMatrix) -> FMatrix {
        let (rows, cols) = pre_activation.shape();
        let mut output = FMatrix::zeros(rows, cols);

        match self {
            Activation::Sigmoid => {
                output
                    .par_iter_mut()
                    .zip(pre_activation.par_iter())
                    .for_each(|(out_elem, z)| {
                        let s = sigmoid(*z);
                        *out_elem = s * (1.0 - s);
                    });
            }
            Activation::Relu => {
                // Zero counts as the active side.
                output
                    .par_iter_mut()
                    .zip(pre_activation.par_iter())
                    .for_each(|(out_elem, z)| {
                        *out_elem = if *z >= 0.0 { 1.0 } else { 0.0 };
                    });
            }
        }

        output
    }
}
