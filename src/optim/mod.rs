//! # Optimization Algorithms (`optim`)
//!
//! Provides implementations of common optimization algorithms used to update
//! model parameters.
//!
//! Optimizers hold their parameters in one or more [`ParamGroup`]s, each with
//! its own (optional) learning rate, and expose their full internal state
//! (group rates, step count, auxiliary buffers) as a deep, serializable
//! [`OptimizerState`]. The learning-rate sweep relies on that state dict to
//! roll an optimizer back after every trial step.

use crate::tensor::{Tensor, TensorData, TensorError, TensorState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// --- Submodules ---
pub mod adam;
pub mod sgd;

// Re-export optimizers
pub use adam::Adam;
pub use sgd::SGD;

// --- Parameter Groups ---

/// A group of parameters sharing one learning-rate setting.
///
/// The learning rate is optional: a group constructed without one (e.g.
/// because a scheduler is expected to fill it in) has `lr = None`, and any
/// attempt to step such a group fails with `InvalidArgument`.
#[derive(Clone, Debug)]
pub struct ParamGroup {
    /// Handles onto the model's parameter tensors (shared storage).
    pub params: Vec<Tensor>,
    /// The group's learning rate, if one has been set.
    pub lr: Option<TensorData>,
}

impl ParamGroup {
    /// Creates a parameter group.
    pub fn new<I>(params: I, lr: Option<TensorData>) -> Self
    where
        I: IntoIterator<Item = Tensor>,
    {
        ParamGroup {
            params: params.into_iter().collect(),
            lr,
        }
    }
}

// --- Optimizer State ---

/// A deep snapshot of an optimizer's full internal state: per-group learning
/// rates, the step count, and every auxiliary buffer (momentum, moment
/// estimates, ...). Buffers are keyed `"{kind}.{group}.{param}"` with stable
/// group/param indices, so the state survives capture/restore round trips
/// and serialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    pub group_lrs: Vec<Option<TensorData>>,
    pub step_count: usize,
    pub buffers: BTreeMap<String, TensorState>,
}

/// Builds the canonical buffer key for `kind` at (group, param) indices.
pub(crate) fn buffer_key(kind: &str, group: usize, param: usize) -> String {
    format!("{}.{}.{}", kind, group, param)
}

/// Parses a buffer key back into its (kind, group, param) components.
pub(crate) fn parse_buffer_key(key: &str) -> Result<(&str, usize, usize), TensorError> {
    let mut parts = key.rsplitn(3, '.');
    let param = parts
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| bad_buffer_key(key))?;
    let group = parts
        .next()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| bad_buffer_key(key))?;
    let kind = parts.next().ok_or_else(|| bad_buffer_key(key))?;
    Ok((kind, group, param))
}

fn bad_buffer_key(key: &str) -> TensorError {
    TensorError::InvalidArgument(format!("malformed optimizer buffer key: '{}'", key))
}

// --- Optimizer Trait ---

/// Base trait for all optimizers.
/// Defines the essential methods for updating parameters, managing gradients,
/// and snapshotting/restoring internal state.
pub trait Optimizer {
    /// Performs a single optimization step (parameter update), using the
    /// gradients currently stored on the managed parameters.
    fn step(&mut self) -> Result<(), TensorError>;

    /// Zeros the gradients of all parameters managed by the optimizer.
    /// Call this before computing gradients for a new batch/iteration.
    fn zero_grad(&mut self);

    /// The optimizer's parameter groups, in registration order.
    fn param_groups(&self) -> &[ParamGroup];

    /// Mutable access to the parameter groups, e.g. to change a group's
    /// learning rate in place.
    fn param_groups_mut(&mut self) -> &mut [ParamGroup];

    /// Captures a deep snapshot of the optimizer's full internal state.
    fn state_dict(&self) -> OptimizerState;

    /// Restores the optimizer's internal state from a snapshot.
    /// Fails if the snapshot does not match the optimizer's group/parameter
    /// structure.
    fn load_state_dict(&mut self, state: &OptimizerState) -> Result<(), TensorError>;
}

/// Shared validation for `load_state_dict`: the snapshot must carry one
/// learning rate per group, and every buffer key must point at an existing
/// (group, param) slot.
pub(crate) fn check_state_shape(
    groups: &[ParamGroup],
    state: &OptimizerState,
) -> Result<(), TensorError> {
    if state.group_lrs.len() != groups.len() {
        return Err(TensorError::InvalidArgument(format!(
            "optimizer state has {} group(s), optimizer has {}",
            state.group_lrs.len(),
            groups.len()
        )));
    }
    for key in state.buffers.keys() {
        let (_kind, group, param) = parse_buffer_key(key)?;
        let group_len = groups
            .get(group)
            .map(|g| g.params.len())
            .ok_or_else(|| {
                TensorError::InvalidArgument(format!(
                    "optimizer state buffer '{}' refers to unknown group {}",
                    key, group
                ))
            })?;
        if param >= group_len {
            return Err(TensorError::InvalidArgument(format!(
                "optimizer state buffer '{}' refers to unknown parameter {}",
                key, param
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_keys_round_trip() {
        let key = buffer_key("exp_avg_sq", 2, 17);
        assert_eq!(key, "exp_avg_sq.2.17");
        assert_eq!(parse_buffer_key(&key).unwrap(), ("exp_avg_sq", 2, 17));
    }

    #[test]
    fn malformed_buffer_keys_are_rejected() {
        assert!(parse_buffer_key("momentum").is_err());
        assert!(parse_buffer_key("momentum.x.0").is_err());
    }
}
