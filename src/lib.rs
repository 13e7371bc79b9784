//! # Learning-Rate Sweep Library
//!
//! This crate computes, for a fixed model and a single minibatch, the loss
//! values that would result from taking one gradient-descent step at each of
//! several candidate learning rates, without permanently mutating the model
//! or the optimizer. It ships the small PyTorch-like support stack the sweep
//! needs (tensors, a few `nn` modules, SGD/Adam optimizers) and the
//! snapshot/restore machinery that makes every trial start from an identical
//! pristine state.
//!
//! The entry point is [`sweep::loss_per_learning_rate`].

pub mod nn;
pub mod optim;
pub mod sweep;
pub mod tensor;
pub mod utils;

#[cfg(feature = "python")]
pub mod bindings;

// Re-export key components for easier use
pub use sweep::{loss_per_learning_rate, Checkpoint};
pub use tensor::{Tensor, TensorData, TensorError};

pub mod prelude {
    pub use crate::nn::{
        Criterion, FullyConnected, LeakyReLU, Linear, MSELoss, Module, ReLU, Sequential,
    };
    pub use crate::optim::{Adam, Optimizer, ParamGroup, SGD};
    pub use crate::sweep::{loss_per_learning_rate, Checkpoint};
    pub use crate::tensor::{Tensor, TensorData, TensorError};
}
