//! # Fully-Connected Demo Network
//!
//! A stack of Linear layers, each followed by a Leaky ReLU activation
//! (the output layer included). This is the network the learning-rate sweep
//! demos and benchmarks drive; it is also a convenient multi-layer fixture
//! for exercising snapshot/restore over more than one parameter.

use crate::nn::modules::{LeakyReLU, Linear};
use crate::nn::{Module, Sequential};
use crate::tensor::{Tensor, TensorData, TensorError};
use std::collections::BTreeMap;

/// Fully-connected network: `Linear -> LeakyReLU -> ... -> Linear -> LeakyReLU`.
#[derive(Debug)]
pub struct FullyConnected {
    layers: Sequential,
}

impl FullyConnected {
    /// Creates a fully-connected network.
    ///
    /// # Arguments
    /// * `input_dim`: Size of each input sample.
    /// * `hidden_layer_dims`: Sizes of the hidden layers, in order (may be empty).
    /// * `output_dim`: Size of each output sample.
    /// * `negative_slope`: Negative slope of the Leaky ReLU activations.
    pub fn new(
        input_dim: usize,
        hidden_layer_dims: &[usize],
        output_dim: usize,
        negative_slope: TensorData,
    ) -> Self {
        let mut layers = Sequential::new();
        let mut in_dim = input_dim;
        for &hidden_dim in hidden_layer_dims {
            layers.add_module(Box::new(Linear::new(in_dim, hidden_dim, true)));
            layers.add_module(Box::new(LeakyReLU::new(negative_slope)));
            in_dim = hidden_dim;
        }
        // The output layer gets an activation too, like every other layer.
        layers.add_module(Box::new(Linear::new(in_dim, output_dim, true)));
        layers.add_module(Box::new(LeakyReLU::new(negative_slope)));
        FullyConnected { layers }
    }
}

impl Module for FullyConnected {
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        self.layers.forward(input)
    }

    fn backward(&self, grad_output: &Tensor) -> Result<Tensor, TensorError> {
        self.layers.backward(grad_output)
    }

    fn parameters(&self) -> BTreeMap<String, Tensor> {
        self.layers.parameters()
    }

    fn tensors(&self) -> BTreeMap<String, Tensor> {
        self.layers.tensors()
    }

    fn train(&mut self) {
        self.layers.train();
    }

    fn eval(&mut self) {
        self.layers.eval();
    }

    fn training(&self) -> bool {
        self.layers.training()
    }

    fn zero_grad(&self) {
        self.layers.zero_grad();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::randn;

    #[test]
    fn hidden_layers_shape_the_parameter_set() {
        let net = FullyConnected::new(8, &[64, 32], 4, 0.01);
        // Two hidden Linears and the output Linear, each with weight + bias.
        assert_eq!(net.parameters().len(), 6);

        let x = randn(&[16, 8], false);
        let y = net.forward(&x).unwrap();
        assert_eq!(y.shape(), &[16, 4]);
    }

    #[test]
    fn no_hidden_layers_degenerates_to_linear_plus_activation() {
        let net = FullyConnected::new(3, &[], 2, 0.01);
        assert_eq!(net.parameters().len(), 2);
    }

    #[test]
    fn output_layer_is_followed_by_the_activation() {
        let net = FullyConnected::new(1, &[], 1, 0.5);
        let params = net.parameters();
        params["0.weight"].data_mut().fill(-1.0);
        params["0.bias"].data_mut().fill(0.0);

        // Linear gives -2, the trailing LeakyReLU halves it.
        let x = Tensor::new(ndarray::arr2(&[[2.0]]).into_dyn(), false);
        let y = net.forward(&x).unwrap();
        assert_eq!(y.data()[[0, 0]], -1.0);
    }
}
