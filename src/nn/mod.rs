//! # Neural Network Module (`nn`)
//!
//! Provides building blocks for creating neural networks, similar to
//! `torch.nn`: modules (layers), loss criteria, and a functional interface.
//!
//! Modules here implement *manual* backprop: each layer caches what it needs
//! during `forward` and exposes a `backward` that accumulates parameter
//! gradients and returns the gradient with respect to its input. This keeps
//! the gradient capability self-contained without an autograd tape.

use crate::tensor::{Tensor, TensorError, TensorState};
use std::collections::BTreeMap;
use std::fmt::Debug;

// --- Submodules ---
pub mod functional;
pub mod loss;
pub mod modules;

// Re-export common items
pub use loss::{Criterion, MSELoss, Reduction};
pub use modules::{FullyConnected, LeakyReLU, Linear, ReLU};

// --- State Dictionary Type ---
// BTreeMap for deterministic key order (helpful for diffs/debugging).
// Values are deep `TensorState` snapshots, never aliases of live storage.
pub type StateDict = BTreeMap<String, TensorState>;

// --- Core Trait: Module ---

/// Base trait for all neural network modules (layers, containers, etc.).
/// Defines the `forward`/`backward` pair and parameter management.
/// `'static` bound needed for storing modules in collections.
pub trait Module: Debug + Send + Sync + 'static {
    /// Performs the forward pass of the module.
    ///
    /// In training mode the module caches whatever it needs for a later
    /// `backward` call; in eval mode nothing is recorded.
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError>;

    /// Performs the backward pass: accumulates gradients into this module's
    /// parameters and returns the gradient with respect to the input.
    ///
    /// # Arguments
    /// * `grad_output`: Gradient of the loss with respect to this module's
    ///   most recent forward output.
    fn backward(&self, grad_output: &Tensor) -> Result<Tensor, TensorError>;

    /// Returns the module's parameters (tensors that require gradients).
    /// The key is a descriptive name (e.g., "weight", "bias").
    /// Uses BTreeMap for deterministic order, useful for optimizers.
    fn parameters(&self) -> BTreeMap<String, Tensor>;

    /// Returns all tensors within the module, including parameters and
    /// buffers (tensors that are part of the state but not optimized).
    /// Default implementation just returns parameters.
    fn tensors(&self) -> BTreeMap<String, Tensor> {
        self.parameters()
    }

    /// Zeros the gradients of all parameters within the module.
    /// Tensor gradients use interior mutability, so `&self` suffices.
    fn zero_grad(&self) {
        for (_name, param) in self.parameters() {
            param.zero_grad();
        }
    }

    /// Sets the module (and submodules) to training mode: forward passes
    /// cache the activations needed by `backward`.
    fn train(&mut self) {}

    /// Sets the module (and submodules) to evaluation mode: forward passes
    /// are measurement-only and record nothing.
    fn eval(&mut self) {}

    /// Whether the module is currently in training mode. Modules start out
    /// in training mode.
    fn training(&self) -> bool {
        true
    }

    /// Captures a deep snapshot of every tensor in the module, gradients
    /// included.
    fn state_dict(&self) -> StateDict {
        self.tensors()
            .iter()
            .map(|(name, tensor)| (name.clone(), tensor.snapshot()))
            .collect()
    }

    /// Restores the module's tensors (data and gradients) from a state dict.
    /// Loading is strict: the dict's keys must exactly match the module's.
    fn load_state_dict(&mut self, state_dict: &StateDict) -> Result<(), TensorError> {
        let tensors = self.tensors();
        for key in state_dict.keys() {
            if !tensors.contains_key(key) {
                return Err(TensorError::InvalidArgument(format!(
                    "unexpected key in state dict: '{}'",
                    key
                )));
            }
        }
        for (key, tensor) in tensors {
            let state = state_dict.get(&key).ok_or_else(|| {
                TensorError::InvalidArgument(format!("missing key in state dict: '{}'", key))
            })?;
            state.apply_to(&tensor)?;
        }
        Ok(())
    }
}

// --- Sequential Container ---

/// A sequential container: the forward pass applies each module in order,
/// the backward pass walks them in reverse, chaining input gradients.
///
/// Modules are boxed (not `Arc`-shared) so `train`/`eval` can recurse with
/// `&mut self`.
#[derive(Debug)]
pub struct Sequential {
    modules: Vec<Box<dyn Module>>,
    training: bool,
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequential {
    /// Creates a new empty Sequential container.
    pub fn new() -> Self {
        Sequential {
            modules: Vec::new(),
            training: true,
        }
    }

    /// Creates a Sequential container from a vector of modules.
    pub fn from_modules(modules: Vec<Box<dyn Module>>) -> Self {
        Sequential {
            modules,
            training: true,
        }
    }

    /// Adds a module to the sequence.
    pub fn add_module(&mut self, module: Box<dyn Module>) {
        self.modules.push(module);
    }

    /// Number of contained modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        let mut current = input.clone();
        for module in &self.modules {
            current = module.forward(&current)?;
        }
        Ok(current)
    }

    fn backward(&self, grad_output: &Tensor) -> Result<Tensor, TensorError> {
        let mut grad = grad_output.clone();
        for module in self.modules.iter().rev() {
            grad = module.backward(&grad)?;
        }
        Ok(grad)
    }

    fn parameters(&self) -> BTreeMap<String, Tensor> {
        let mut params = BTreeMap::new();
        for (i, module) in self.modules.iter().enumerate() {
            for (name, param) in module.parameters() {
                // Prefix parameter names with module index for uniqueness
                params.insert(format!("{}.{}", i, name), param);
            }
        }
        params
    }

    fn tensors(&self) -> BTreeMap<String, Tensor> {
        let mut tensors = BTreeMap::new();
        for (i, module) in self.modules.iter().enumerate() {
            for (name, tensor) in module.tensors() {
                tensors.insert(format!("{}.{}", i, name), tensor);
            }
        }
        tensors
    }

    fn train(&mut self) {
        self.training = true;
        for module in &mut self.modules {
            module.train();
        }
    }

    fn eval(&mut self) {
        self.training = false;
        for module in &mut self.modules {
            module.eval();
        }
    }

    fn training(&self) -> bool {
        self.training
    }

    fn zero_grad(&self) {
        for module in &self.modules {
            module.zero_grad();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;
    use ndarray::arr2;

    #[test]
    fn sequential_parameters_are_index_prefixed() {
        let mut net = Sequential::new();
        net.add_module(Box::new(Linear::new(2, 3, true)));
        net.add_module(Box::new(ReLU::new()));
        net.add_module(Box::new(Linear::new(3, 1, false)));

        let params = net.parameters();
        assert!(params.contains_key("0.weight"));
        assert!(params.contains_key("0.bias"));
        assert!(params.contains_key("2.weight"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn state_dict_round_trip_restores_bits() {
        let mut net = Sequential::new();
        net.add_module(Box::new(Linear::new(2, 2, true)));

        let before = net.state_dict();
        for (_name, param) in net.parameters() {
            param.data_mut().fill(7.0);
        }
        net.load_state_dict(&before).unwrap();
        assert_eq!(net.state_dict(), before);
    }

    #[test]
    fn load_state_dict_rejects_unexpected_key() {
        let mut net = Sequential::new();
        net.add_module(Box::new(Linear::new(2, 2, false)));

        let mut dict = net.state_dict();
        dict.insert(
            "bogus".to_string(),
            tensor::zeros(&[1], false).snapshot(),
        );
        assert!(matches!(
            net.load_state_dict(&dict),
            Err(TensorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn sequential_forward_applies_in_order() {
        let mut net = Sequential::new();
        let mut layer = Linear::new(2, 1, false);
        layer
            .weight
            .data_mut()
            .assign(&arr2(&[[1.0, -1.0]]).into_dyn());
        net.add_module(Box::new(layer));
        net.add_module(Box::new(ReLU::new()));

        let x = Tensor::new(arr2(&[[3.0, 1.0]]).into_dyn(), false);
        let y = net.forward(&x).unwrap();
        assert_eq!(y.data()[[0, 0]], 2.0);

        let x_neg = Tensor::new(arr2(&[[1.0, 3.0]]).into_dyn(), false);
        let y_neg = net.forward(&x_neg).unwrap();
        assert_eq!(y_neg.data()[[0, 0]], 0.0);
    }
}
