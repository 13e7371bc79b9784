//! # Neural Network Functional Interface (`nn::functional`)
//!
//! Provides stateless functions for common neural network operations,
//! mirroring `torch.nn.functional`. These functions operate directly on
//! tensors; the module structs in `nn::modules` and `nn::loss` delegate to
//! them and add the caching/backward bookkeeping.

use crate::tensor::{Tensor, TensorData, TensorError};

// --- Activation Functions ---

/// Applies the Rectified Linear Unit (ReLU) function element-wise.
/// `relu(x) = max(0, x)`
pub fn relu(input: &Tensor) -> Result<Tensor, TensorError> {
    leaky_relu(input, 0.0)
}

/// Applies the Leaky ReLU function element-wise.
/// `leaky_relu(x) = x if x >= 0 else negative_slope * x`
pub fn leaky_relu(input: &Tensor, negative_slope: TensorData) -> Result<Tensor, TensorError> {
    let result = input
        .data()
        .mapv(|x| if x >= 0.0 { x } else { negative_slope * x });
    Ok(Tensor::new(result, false))
}

/// Derivative of Leaky ReLU with respect to its input, evaluated at `input`.
/// `1` where the input was non-negative, `negative_slope` elsewhere.
pub fn leaky_relu_backward(
    input: &Tensor,
    grad_output: &Tensor,
    negative_slope: TensorData,
) -> Result<Tensor, TensorError> {
    if input.shape() != grad_output.shape() {
        return Err(TensorError::IncompatibleShapes {
            op: "leaky_relu_backward".to_string(),
            shape1: input.shape().to_vec(),
            shape2: grad_output.shape().to_vec(),
        });
    }
    let mask = input
        .data()
        .mapv(|x| if x >= 0.0 { 1.0 } else { negative_slope });
    let result = mask * &*grad_output.data();
    Ok(Tensor::new(result, false))
}

// --- Loss Functions ---

/// Mean squared error between `prediction` and `target`:
/// `mean((p_i - t_i)^2)` (or the sum, depending on `mean_reduce`).
pub fn mse_loss(
    prediction: &Tensor,
    target: &Tensor,
    mean_reduce: bool,
) -> Result<TensorData, TensorError> {
    if prediction.shape() != target.shape() {
        return Err(TensorError::IncompatibleShapes {
            op: "mse_loss".to_string(),
            shape1: prediction.shape().to_vec(),
            shape2: target.shape().to_vec(),
        });
    }
    let diff = &*prediction.data() - &*target.data();
    let total: TensorData = diff.iter().map(|d| d * d).sum();
    if mean_reduce {
        let n = prediction.size();
        if n == 0 {
            return Err(TensorError::Generic(
                "mse_loss of empty tensors is undefined".to_string(),
            ));
        }
        Ok(total / n as TensorData)
    } else {
        Ok(total)
    }
}

/// Gradient of the MSE loss with respect to `prediction`:
/// `2 * (p - t) / n` for mean reduction, `2 * (p - t)` for sum.
pub fn mse_loss_backward(
    prediction: &Tensor,
    target: &Tensor,
    mean_reduce: bool,
) -> Result<Tensor, TensorError> {
    if prediction.shape() != target.shape() {
        return Err(TensorError::IncompatibleShapes {
            op: "mse_loss_backward".to_string(),
            shape1: prediction.shape().to_vec(),
            shape2: target.shape().to_vec(),
        });
    }
    let scale = if mean_reduce {
        2.0 / prediction.size() as TensorData
    } else {
        2.0
    };
    let result = (&*prediction.data() - &*target.data()) * scale;
    Ok(Tensor::new(result, false))
}
