//! # Linear Layer Module

use crate::nn::Module;
use crate::tensor::{ops, rand_uniform, Tensor, TensorData, TensorError};
use ndarray::ArrayD;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Applies a linear transformation to the incoming data: `y = x A^T + b`.
///
/// Input shape: `(N, in_features)`, output shape: `(N, out_features)`.
#[derive(Debug)]
pub struct Linear {
    // Parameters of the layer
    pub weight: Tensor,       // Shape: (out_features, in_features)
    pub bias: Option<Tensor>, // Shape: (out_features)

    // Store dimensions for reference
    in_features: usize,
    out_features: usize,

    // Input cached by the training-mode forward pass, consumed by backward.
    cached_input: RwLock<Option<ArrayD<TensorData>>>,
    training: bool,
}

impl Linear {
    /// Creates a new Linear module.
    ///
    /// # Arguments
    /// * `in_features`: Size of each input sample.
    /// * `out_features`: Size of each output sample.
    /// * `bias`: Whether to include a bias term.
    ///
    /// Parameters are initialized with Kaiming uniform initialization,
    /// `U(-k, k)` with `k = 1 / sqrt(in_features)` (the PyTorch default).
    pub fn new(in_features: usize, out_features: usize, bias: bool) -> Self {
        let k = (1.0 / in_features as TensorData).sqrt();
        let weight = rand_uniform(&[out_features, in_features], -k, k, true);
        let bias_tensor = if bias {
            Some(rand_uniform(&[out_features], -k, k, true))
        } else {
            None
        };

        Linear {
            weight,
            bias: bias_tensor,
            in_features,
            out_features,
            cached_input: RwLock::new(None),
            training: true,
        }
    }

    /// Size of each input sample.
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Size of each output sample.
    pub fn out_features(&self) -> usize {
        self.out_features
    }
}

impl Module for Linear {
    /// Performs the forward pass: `input @ weight.T + bias`.
    fn forward(&self, input: &Tensor) -> Result<Tensor, TensorError> {
        // Input shape: (N, in_features)
        // Weight shape: (out_features, in_features)
        // Output = Input @ Weight.T + Bias, shape (N, out_features)
        let weight_t = ops::transpose(&self.weight, 0, 1)?;
        let output = ops::matmul(input, &weight_t)?;
        let output = if let Some(ref bias) = self.bias {
            ops::add(&output, bias)?
        } else {
            output
        };

        if self.training {
            *self
                .cached_input
                .write()
                .expect("Linear cache RwLock poisoned") = Some(input.data_clone());
        }
        Ok(output)
    }

    /// Accumulates `dW = grad_output^T @ input` and `db = sum_rows(grad_output)`
    /// into the parameter gradients, and returns `dX = grad_output @ weight`.
    fn backward(&self, grad_output: &Tensor) -> Result<Tensor, TensorError> {
        let cached = self
            .cached_input
            .read()
            .expect("Linear cache RwLock poisoned")
            .clone()
            .ok_or_else(|| {
                TensorError::Generic(
                    "Linear backward called without a cached forward input (module in eval mode?)"
                        .to_string(),
                )
            })?;
        let input = Tensor::new(cached, false);

        // dW: (out, N) @ (N, in) -> (out, in)
        let grad_output_t = ops::transpose(grad_output, 0, 1)?;
        let grad_weight = ops::matmul(&grad_output_t, &input)?;
        self.weight.accumulate_grad(&grad_weight.data())?;

        // db: reduce per-sample gradients over the batch dimension
        if let Some(ref bias) = self.bias {
            let grad_bias = ops::sum_rows(grad_output)?;
            bias.accumulate_grad(&grad_bias.data())?;
        }

        // dX: (N, out) @ (out, in) -> (N, in)
        ops::matmul(grad_output, &self.weight)
    }

    fn parameters(&self) -> BTreeMap<String, Tensor> {
        let mut params = BTreeMap::new();
        params.insert("weight".to_string(), self.weight.clone());
        if let Some(ref bias) = self.bias {
            params.insert("bias".to_string(), bias.clone());
        }
        params
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr1, arr2};

    fn fixed_layer() -> Linear {
        let mut layer = Linear::new(2, 1, true);
        layer
            .weight
            .data_mut()
            .assign(&arr2(&[[2.0, -1.0]]).into_dyn());
        if let Some(ref bias) = layer.bias {
            bias.data_mut().assign(&arr1(&[0.5]).into_dyn());
        }
        layer
    }

    #[test]
    fn forward_matches_hand_computation() {
        let layer = fixed_layer();
        let x = Tensor::new(arr2(&[[1.0, 3.0]]).into_dyn(), false);
        let y = layer.forward(&x).unwrap();
        // 2*1 + (-1)*3 + 0.5
        assert_relative_eq!(y.data()[[0, 0]], -0.5);
    }

    #[test]
    fn backward_accumulates_closed_form_gradients() {
        let layer = fixed_layer();
        let x = Tensor::new(arr2(&[[1.0, 3.0], [2.0, 0.0]]).into_dyn(), false);
        layer.forward(&x).unwrap();

        let grad_output = Tensor::new(arr2(&[[1.0], [1.0]]).into_dyn(), false);
        let grad_input = layer.backward(&grad_output).unwrap();

        // dW = G^T X = [[1+2, 3+0]] = [[3, 3]]
        let grad_weight = layer.weight.grad().unwrap();
        assert_relative_eq!(grad_weight[[0, 0]], 3.0);
        assert_relative_eq!(grad_weight[[0, 1]], 3.0);

        // db = sum over batch = 2
        let grad_bias = layer.bias.as_ref().unwrap().grad().unwrap();
        assert_relative_eq!(grad_bias[[0]], 2.0);

        // dX = G W = [[2, -1], [2, -1]]
        assert_relative_eq!(grad_input.data()[[0, 0]], 2.0);
        assert_relative_eq!(grad_input.data()[[1, 1]], -1.0);
    }

    #[test]
    fn eval_mode_skips_caching() {
        let mut layer = fixed_layer();
        layer.eval();
        let x = Tensor::new(arr2(&[[1.0, 3.0]]).into_dyn(), false);
        layer.forward(&x).unwrap();

        let grad_output = Tensor::new(arr2(&[[1.0]]).into_dyn(), false);
        assert!(layer.backward(&grad_output).is_err());
    }
}
