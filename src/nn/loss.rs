//! # Loss Criteria
//!
//! Loss functions need two inputs (prediction, target), which does not fit
//! the single-input `Module` trait. They get their own `Criterion` trait
//! instead: a forward pass producing a plain scalar, and a backward pass
//! producing the gradient of the loss with respect to the prediction. The
//! sweep evaluator and training loops consume criteria through this trait.

use crate::nn::functional as F;
use crate::tensor::{Tensor, TensorData, TensorError};
use std::fmt::Debug;

// --- Reduction Enum ---
/// Specifies the reduction to apply to the per-element losses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    /// The sum of the per-element losses divided by the number of elements.
    #[default]
    Mean,
    /// The per-element losses summed.
    Sum,
}

// --- Criterion Trait ---

/// A differentiable loss criterion mapping (prediction, target) to a scalar.
///
/// Criteria are stateless from the caller's perspective: `forward` may be
/// called any number of times, in any order, without affecting `backward`.
pub trait Criterion: Debug + Send + Sync {
    /// Computes the scalar loss.
    fn forward(&self, prediction: &Tensor, target: &Tensor) -> Result<TensorData, TensorError>;

    /// Computes the gradient of the loss with respect to `prediction`,
    /// with the same shape as `prediction`.
    fn backward(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor, TensorError>;
}

// --- Mean Squared Error Criterion ---

/// Measures the mean squared error (squared L2 norm) between each element in
/// the prediction and target. The loss is `mean((p_i - t_i)^2)` under the
/// default `Mean` reduction.
#[derive(Debug, Clone, Copy, Default)]
pub struct MSELoss {
    reduction: Reduction,
}

impl MSELoss {
    /// Creates an MSE criterion with the default `Mean` reduction.
    pub fn new() -> Self {
        MSELoss {
            reduction: Reduction::Mean,
        }
    }

    /// Creates an MSE criterion with an explicit reduction.
    pub fn with_reduction(reduction: Reduction) -> Self {
        MSELoss { reduction }
    }
}

impl Criterion for MSELoss {
    fn forward(&self, prediction: &Tensor, target: &Tensor) -> Result<TensorData, TensorError> {
        F::mse_loss(prediction, target, self.reduction == Reduction::Mean)
    }

    fn backward(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor, TensorError> {
        F::mse_loss_backward(prediction, target, self.reduction == Reduction::Mean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr2;

    #[test]
    fn mse_forward_is_stateless_across_calls() {
        let criterion = MSELoss::new();
        let p = Tensor::new(arr2(&[[2.0]]).into_dyn(), false);
        let t = Tensor::new(arr2(&[[0.0]]).into_dyn(), false);
        let first = criterion.forward(&p, &t).unwrap();
        let second = criterion.forward(&p, &t).unwrap();
        assert_eq!(first, second);
        assert_relative_eq!(first, 4.0);
    }

    #[test]
    fn sum_reduction_skips_the_mean() {
        let criterion = MSELoss::with_reduction(Reduction::Sum);
        let p = Tensor::new(arr2(&[[1.0, 1.0]]).into_dyn(), false);
        let t = Tensor::new(arr2(&[[0.0, 0.0]]).into_dyn(), false);
        assert_relative_eq!(criterion.forward(&p, &t).unwrap(), 2.0);
    }
}
