pub mod activation;
pub mod error;
pub mod matrix;
pub mod serialization;

mod network;
mod train;

pub use activation::Activation;
pub use network::{ForwardPass, Gradients, Layer, Network, OUTPUT_UNITS};
pub use train::{StopReason, TrainConfig, TrainReport};

#[cfg(test)]
mod test_utils;
