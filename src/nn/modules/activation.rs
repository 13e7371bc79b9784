//! # Activation Function Modules

use crate::nn::functional as F;
use crate::nn::Module;
use crate::tensor::{Tensor, TensorData, TensorError};
use ndarray::ArrayD;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Applies the Leaky ReLU function element-wise:
/// `LeakyReLU(x) = x if x >= 0 else negative_slope * x`
#[derive(Debug)]
pub struct LeakyReLU {
    negative_slope: TensorData,
    cached_input: RwLock<Option<ArrayD<TensorData>>>,
    training: bool,
}

impl LeakyReLU {
    /// Creates a new LeakyReLU module with the given negative slope.
    pub fn new(negative_slope: TensorData) -> Self {
        LeakyReLU {
            negative_slope,
            cached_input: RwLock::new(None),
            training: true,
        }
    }
}

impl Module for LeakyReLU {
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        let output = F::leaky_relu(input, self.negative_slope)?;
        if self.training {
            *self
                .cached_input
                .write()
                .expect("LeakyReLU cache RwLock poisoned") = Some(input.data_clone());
        }
        Ok(output)
    }

    fn backward(&self, grad_output: &Tensor) -> Result<Tensor, TensorError> {
        let cached = self
            .cached_input
            .read()
            .expect("LeakyReLU cache RwLock poisoned")
            .clone()
            .ok_or_else(|| {
                TensorError::Generic(
                    "LeakyReLU backward called without a cached forward input".to_string(),
                )
            })?;
        let input = Tensor::new(cached, false);
        F::leaky_relu_backward(&input, grad_output, self.negative_slope)
    }

    /// Activations have no parameters.
    fn parameters(&self) -> BTreeMap<String, Tensor> {
        BTreeMap::new()
    }

    fn train(&mut self) {
        self.training = true;
    }

    fn eval(&mut self) {
        self.training = false;
    }

    fn training(&self) -> bool {
        self.training
    }
}

/// Applies the Rectified Linear Unit function element-wise:
/// `ReLU(x) = max(0, x)`. A LeakyReLU with slope zero.
#[derive(Debug)]
pub struct ReLU {
    inner: LeakyReLU,
}

impl ReLU {
    /// Creates a new ReLU module.
    pub fn new() -> Self {
        ReLU {
            inner: LeakyReLU::new(0.0),
        }
    }
}

impl Default for ReLU {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for ReLU {
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        self.inner.forward(input)
    }

    fn backward(&self, grad_output: &Tensor) -> Result<Tensor, TensorError> {
        self.inner.backward(grad_output)
    }

    fn parameters(&self) -> BTreeMap<String, Tensor> {
        BTreeMap::new()
    }

    fn train(&mut self) {
        self.inner.train();
    }

    fn eval(&mut self) {
        self.inner.eval();
    }

    fn training(&self) -> bool {
        self.inner.training()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn leaky_relu_backward_uses_cached_input_sign() {
        let act = LeakyReLU::new(0.01);
        let x = Tensor::new(arr2(&[[-1.0, 2.0]]).into_dyn(), false);
        act.forward(&x).unwrap();

        let grad_output = Tensor::new(arr2(&[[10.0, 10.0]]).into_dyn(), false);
        let grad_input = act.backward(&grad_output).unwrap();
        assert_relative_eq!(grad_input.data()[[0, 0]], 0.1);
        assert_relative_eq!(grad_input.data()[[0, 1]], 10.0);
    }

    #[test]
    fn relu_zeroes_negative_gradients() {
        let act = ReLU::new();
        let x = Tensor::new(arr2(&[[-1.0, 2.0]]).into_dyn(), false);
        act.forward(&x).unwrap();

        let grad_output = Tensor::new(arr2(&[[5.0, 5.0]]).into_dyn(), false);
        let grad_input = act.backward(&grad_output).unwrap();
        assert_relative_eq!(grad_input.data()[[0, 0]], 0.0);
        assert_relative_eq!(grad_input.data()[[0, 1]], 5.0);
    }
}
