//! # Learning-Rate Sweep Evaluator
//!
//! Computes the loss values that would result from using each learning rate
//! in a given set, at a single step of gradient descent, without committing
//! any of those steps.
//!
//! The routine computes gradients once, captures a [`Checkpoint`] of the
//! model's and optimizer's full state, and then for every candidate rate:
//! overwrites the rate on every optimizer parameter group, applies exactly
//! one optimizer step, measures the loss under the updated parameters, and
//! rolls everything back to the checkpoint. Every trial therefore starts
//! from the identical pristine state, and the call as a whole leaves the
//! model and optimizer exactly as it found them (except for the documented
//! gradient population when `init_gradients` is true).

use crate::nn::{Criterion, Module, StateDict};
use crate::optim::{Optimizer, OptimizerState};
use crate::tensor::{Tensor, TensorData, TensorError};

// --- Checkpoint ---

/// A deep, immutable snapshot of everything a sweep trial can mutate: the
/// model's parameters and gradients, and the optimizer's full internal
/// state (learning rates, step count, auxiliary buffers).
///
/// A checkpoint never aliases live tensor storage, so restoring one cannot
/// be corrupted by later in-place updates.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Checkpoint {
    model: StateDict,
    optimizer: OptimizerState,
}

impl Checkpoint {
    /// Captures the current state of `model` and `optimizer`.
    pub fn capture(model: &dyn Module, optimizer: &dyn Optimizer) -> Self {
        Checkpoint {
            model: model.state_dict(),
            optimizer: optimizer.state_dict(),
        }
    }

    /// Restores `model` and `optimizer` to the captured state, bit for bit.
    pub fn restore(
        &self,
        model: &mut dyn Module,
        optimizer: &mut dyn Optimizer,
    ) -> Result<(), TensorError> {
        model.load_state_dict(&self.model)?;
        optimizer.load_state_dict(&self.optimizer)
    }

    /// The captured model state.
    pub fn model_state(&self) -> &StateDict {
        &self.model
    }

    /// The captured optimizer state.
    pub fn optimizer_state(&self) -> &OptimizerState {
        &self.optimizer
    }
}

// --- The Sweep ---

/// Computes the loss per learning rate.
///
/// # Arguments
/// * `model`: Network model.
/// * `x`: Input batch.
/// * `y`: Target batch.
/// * `criterion`: Loss criterion.
/// * `optimizer`: Optimizer bound to the trainable parameters of `model`.
///   The only constraint on `optimizer` is that every one of its parameter
///   groups carries a learning-rate value.
/// * `learning_rates`: Candidate learning rates (must be non-empty). The
///   returned losses correspond one-to-one, in order.
/// * `init_gradients`: Run the initial gradient computation. When `false`,
///   the gradients already present on `model` are used as-is; the caller is
///   responsible for their validity.
///
/// # Errors
/// `TensorError::InvalidArgument` if `learning_rates` is empty or a
/// parameter group has no learning rate; both are raised before any state
/// is touched. Errors from the forward/backward passes or the optimizer step
/// propagate unmodified; the model and optimizer are restored to the
/// checkpoint before such an error is returned, so a failed trial cannot
/// leak intermediate state.
///
/// # Notes
/// No modification is made to the state of `model` or `optimizer` across
/// the call, except that the parameter gradients of `model` are set when
/// `init_gradients` is `true` (they end up holding the gradients of the
/// initial pass, which the final restore deliberately preserves). The
/// model's train/eval mode is toggled internally but reinstated, so a
/// model passed in eval mode comes back in eval mode.
pub fn loss_per_learning_rate(
    model: &mut dyn Module,
    x: &Tensor,
    y: &Tensor,
    criterion: &dyn Criterion,
    optimizer: &mut dyn Optimizer,
    learning_rates: &[TensorData],
    init_gradients: bool,
) -> Result<Vec<TensorData>, TensorError> {
    // Sanity check on `learning_rates` argument
    if learning_rates.is_empty() {
        return Err(TensorError::InvalidArgument(
            "learning_rates is empty".to_string(),
        ));
    }

    // Sanity check on `optimizer` argument
    for (group_idx, group) in optimizer.param_groups().iter().enumerate() {
        if group.lr.is_none() {
            return Err(TensorError::InvalidArgument(format!(
                "optimizer is missing a learning rate in parameter group {}",
                group_idx
            )));
        }
    }

    // Compute initial parameter gradients, if required. Any previously
    // accumulated gradients are zeroed first so the parameters end up
    // holding exactly the gradients of this pass. The pass needs training
    // mode for backward caching; the caller's mode is reinstated after.
    if init_gradients {
        model.zero_grad();
        let was_training = model.training();
        model.train();
        let pass = compute_gradients(model, x, y, criterion);
        if !was_training {
            model.eval();
        }
        pass?;
    }

    // Save model and optimizer states; every trial rolls back to this.
    let checkpoint = Checkpoint::capture(model, optimizer);

    let mut losses = Vec::with_capacity(learning_rates.len());
    for &learning_rate in learning_rates {
        // Update learning rate in each parameter group
        for group in optimizer.param_groups_mut() {
            group.lr = Some(learning_rate);
        }

        // Mutate-and-measure, with the restore guaranteed on every path:
        // a failure mid-trial must not leak intermediate state to the
        // caller or into the next trial.
        let trial = run_trial(model, x, y, criterion, optimizer);
        checkpoint.restore(model, optimizer)?;
        losses.push(trial?);
    }

    Ok(losses)
}

/// Forward, criterion backward, model backward: populates the parameter
/// gradients for the minibatch.
fn compute_gradients(
    model: &mut dyn Module,
    x: &Tensor,
    y: &Tensor,
    criterion: &dyn Criterion,
) -> Result<(), TensorError> {
    let y_hat = model.forward(x)?;
    let grad_prediction = criterion.backward(&y_hat, y)?;
    model.backward(&grad_prediction)?;
    Ok(())
}

/// One trial: apply a single optimizer step at the current learning rate,
/// then measure the loss under the updated parameters in eval mode. The
/// model leaves in the mode it entered with.
fn run_trial(
    model: &mut dyn Module,
    x: &Tensor,
    y: &Tensor,
    criterion: &dyn Criterion,
    optimizer: &mut dyn Optimizer,
) -> Result<TensorData, TensorError> {
    // Update parameters
    optimizer.step()?;

    // Compute loss with updated parameters, without touching gradient state
    let was_training = model.training();
    model.eval();
    let result = model
        .forward(x)
        .and_then(|y_hat| criterion.forward(&y_hat, y));
    if was_training {
        model.train();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Linear, MSELoss};
    use crate::optim::SGD;
    use ndarray::arr2;

    #[test]
    fn checkpoint_restore_is_bit_for_bit() {
        let mut model = Linear::new(2, 2, true);
        let mut optimizer =
            SGD::new(model.parameters().into_values(), 0.1, Some(0.9), None, None, false)
                .unwrap();

        let x = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), false);
        let y = Tensor::new(arr2(&[[1.0, 0.0], [0.0, 1.0]]).into_dyn(), false);
        let criterion = MSELoss::new();

        // Populate gradients, then snapshot.
        let y_hat = model.forward(&x).unwrap();
        let grad = criterion.backward(&y_hat, &y).unwrap();
        model.backward(&grad).unwrap();
        let checkpoint = Checkpoint::capture(&model, &optimizer);

        // Trash everything, then restore.
        optimizer.step().unwrap();
        optimizer.step().unwrap();
        optimizer.param_groups_mut()[0].lr = Some(123.0);
        checkpoint
            .restore(&mut model, &mut optimizer)
            .unwrap();

        assert_eq!(Checkpoint::capture(&model, &optimizer), checkpoint);
    }

    #[test]
    fn restore_runs_even_when_a_trial_fails() {
        let mut model = Linear::new(1, 1, false);
        let mut optimizer =
            SGD::new(model.parameters().into_values(), 0.1, None, None, None, false).unwrap();

        let x = Tensor::new(arr2(&[[1.0]]).into_dyn(), false);
        // Wrong target shape: the criterion inside the trial fails, after
        // the optimizer step already moved the parameters.
        let y_bad = Tensor::new(arr2(&[[1.0], [2.0]]).into_dyn(), false);
        let criterion = MSELoss::new();

        let grad = arr2(&[[1.0]]).into_dyn();
        model.weight.set_grad(grad).unwrap();
        let before = Checkpoint::capture(&model, &optimizer);

        let result = loss_per_learning_rate(
            &mut model,
            &x,
            &y_bad,
            &criterion,
            &mut optimizer,
            &[0.5],
            false,
        );
        assert!(result.is_err());
        // Despite the mid-trial failure, the state was rolled back.
        assert_eq!(Checkpoint::capture(&model, &optimizer), before);
    }
}
