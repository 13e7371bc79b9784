//! # Stochastic Gradient Descent (SGD) Optimizer

use super::{buffer_key, check_state_shape, parse_buffer_key, Optimizer, OptimizerState, ParamGroup};
use crate::tensor::{Tensor, TensorData, TensorError};
use ndarray::ArrayD;
use std::collections::BTreeMap;

/// Implements the Stochastic Gradient Descent optimizer.
/// Supports momentum, dampening, weight decay, and Nesterov momentum.
pub struct SGD {
    groups: Vec<ParamGroup>,
    momentum: TensorData,
    dampening: TensorData,
    weight_decay: TensorData,
    nesterov: bool,
    // Momentum buffers, keyed by stable (group, param) indices so they
    // survive a state_dict round trip.
    momentum_buffers: BTreeMap<(usize, usize), ArrayD<TensorData>>,
}

impl SGD {
    /// Creates a new SGD optimizer instance with a single parameter group.
    ///
    /// # Arguments
    /// * `params`: An iterator over the parameters (Tensors that require grad) to optimize.
    /// * `lr`: Learning rate.
    /// * `momentum`: Momentum factor (default: 0).
    /// * `dampening`: Dampening for momentum (default: 0).
    /// * `weight_decay`: Weight decay (L2 penalty) (default: 0).
    /// * `nesterov`: Enables Nesterov momentum (requires momentum > 0, dampening = 0).
    pub fn new<I>(
        params: I,
        lr: TensorData,
        momentum: Option<TensorData>,
        dampening: Option<TensorData>,
        weight_decay: Option<TensorData>,
        nesterov: bool,
    ) -> Result<Self, TensorError>
    where
        I: IntoIterator<Item = Tensor>,
    {
        if lr < 0.0 {
            return Err(TensorError::InvalidArgument(
                "Invalid learning rate: cannot be negative".to_string(),
            ));
        }
        let group = ParamGroup::new(params, Some(lr));
        Self::with_groups(vec![group], momentum, dampening, weight_decay, nesterov)
    }

    /// Creates an SGD optimizer over explicit parameter groups, e.g. for
    /// per-layer learning rates or groups whose rate a scheduler fills in
    /// later.
    pub fn with_groups(
        groups: Vec<ParamGroup>,
        momentum: Option<TensorData>,
        dampening: Option<TensorData>,
        weight_decay: Option<TensorData>,
        nesterov: bool,
    ) -> Result<Self, TensorError> {
        let momentum_val = momentum.unwrap_or(0.0);
        let dampening_val = dampening.unwrap_or(0.0);
        let weight_decay_val = weight_decay.unwrap_or(0.0);

        if momentum_val < 0.0 {
            return Err(TensorError::InvalidArgument(
                "Invalid momentum value: cannot be negative".to_string(),
            ));
        }
        if weight_decay_val < 0.0 {
            return Err(TensorError::InvalidArgument(
                "Invalid weight_decay value: cannot be negative".to_string(),
            ));
        }
        if nesterov && (momentum_val <= 0.0 || dampening_val != 0.0) {
            return Err(TensorError::InvalidArgument(
                "Nesterov momentum requires momentum > 0 and dampening = 0".to_string(),
            ));
        }

        Ok(SGD {
            groups,
            momentum: momentum_val,
            dampening: dampening_val,
            weight_decay: weight_decay_val,
            nesterov,
            momentum_buffers: BTreeMap::new(),
        })
    }

    /// Simplified constructor with only lr (plain gradient descent).
    pub fn simple<I>(params: I, lr: TensorData) -> Result<Self, TensorError>
    where
        I: IntoIterator<Item = Tensor>,
    {
        Self::new(params, lr, None, None, None, false)
    }
}

impl Optimizer for SGD {
    fn step(&mut self) -> Result<(), TensorError> {
        for (group_idx, group) in self.groups.iter().enumerate() {
            let lr = group.lr.ok_or_else(|| {
                TensorError::InvalidArgument(format!(
                    "parameter group {} is missing a learning rate",
                    group_idx
                ))
            })?;

            for (param_idx, param) in group.params.iter().enumerate() {
                if !param.requires_grad {
                    continue;
                }
                // Skip parameters without computed gradients
                let mut grad = match param.grad() {
                    Some(g) => g,
                    None => continue,
                };

                // --- Weight Decay ---
                // grad = grad + param * weight_decay
                if self.weight_decay != 0.0 {
                    grad = grad + &(&*param.data() * self.weight_decay);
                }

                // --- Momentum ---
                if self.momentum != 0.0 {
                    let buf = self
                        .momentum_buffers
                        .entry((group_idx, param_idx))
                        .or_insert_with(|| ArrayD::zeros(grad.raw_dim()));

                    // buf = momentum * buf + (1 - dampening) * grad
                    *buf = &*buf * self.momentum + &grad * (1.0 - self.dampening);

                    if self.nesterov {
                        // grad = grad + momentum * buf
                        grad = grad + &(&*buf * self.momentum);
                    } else {
                        // The buffer is the effective gradient
                        grad = buf.clone();
                    }
                }

                // --- Parameter Update ---
                // param = param - lr * grad
                *param.data_mut() -= &(&grad * lr);
            }
        }
        Ok(())
    }

    fn zero_grad(&mut self) {
        for group in &self.groups {
            for param in &group.params {
                if param.requires_grad {
                    param.zero_grad();
                }
            }
        }
    }

    fn param_groups(&self) -> &[ParamGroup] {
        &self.groups
    }

    fn param_groups_mut(&mut self) -> &mut [ParamGroup] {
        &mut self.groups
    }

    fn state_dict(&self) -> OptimizerState {
        let buffers = self
            .momentum_buffers
            .iter()
            .map(|(&(group, param), buf)| {
                (
                    buffer_key("momentum", group, param),
                    crate::tensor::TensorState::from_array(buf),
                )
            })
            .collect();
        OptimizerState {
            group_lrs: self.groups.iter().map(|g| g.lr).collect(),
            step_count: 0, // SGD keeps no step counter
            buffers,
        }
    }

    fn load_state_dict(&mut self, state: &OptimizerState) -> Result<(), TensorError> {
        check_state_shape(&self.groups, state)?;
        for (group, lr) in self.groups.iter_mut().zip(&state.group_lrs) {
            group.lr = *lr;
        }
        let mut buffers = BTreeMap::new();
        for (key, tensor_state) in &state.buffers {
            let (kind, group, param) = parse_buffer_key(key)?;
            if kind != "momentum" {
                return Err(TensorError::InvalidArgument(format!(
                    "unknown SGD buffer kind: '{}'",
                    kind
                )));
            }
            buffers.insert((group, param), tensor_state.to_ndarray()?);
        }
        self.momentum_buffers = buffers;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    fn param_with_grad(value: TensorData, grad: TensorData) -> Tensor {
        let p = Tensor::new(arr1(&[value]).into_dyn(), true);
        p.set_grad(arr1(&[grad]).into_dyn()).unwrap();
        p
    }

    #[test]
    fn plain_step_is_lr_times_grad() {
        let p = param_with_grad(1.0, 0.5);
        let mut opt = SGD::simple([p.clone()], 0.1).unwrap();
        opt.step().unwrap();
        assert_relative_eq!(p.data()[[0]], 0.95);
    }

    #[test]
    fn momentum_buffer_accumulates_across_steps() {
        let p = param_with_grad(0.0, 1.0);
        let mut opt = SGD::new([p.clone()], 1.0, Some(0.5), None, None, false).unwrap();
        opt.step().unwrap(); // buf = 1.0, p = -1.0
        opt.step().unwrap(); // buf = 1.5, p = -2.5
        assert_relative_eq!(p.data()[[0]], -2.5);
    }

    #[test]
    fn state_dict_round_trips_momentum_buffers() {
        let p = param_with_grad(0.0, 1.0);
        let mut opt = SGD::new([p.clone()], 1.0, Some(0.5), None, None, false).unwrap();
        opt.step().unwrap();
        let saved = opt.state_dict();

        opt.step().unwrap();
        opt.load_state_dict(&saved).unwrap();
        assert_eq!(opt.state_dict(), saved);
    }

    #[test]
    fn missing_group_lr_fails_step() {
        let p = param_with_grad(1.0, 1.0);
        let mut opt = SGD::with_groups(
            vec![ParamGroup::new([p.clone()], None)],
            None,
            None,
            None,
            false,
        )
        .unwrap();
        let err = opt.step().unwrap_err();
        assert!(matches!(err, TensorError::InvalidArgument(_)));
        // The parameter must not have moved.
        assert_relative_eq!(p.data()[[0]], 1.0);
    }

    #[test]
    fn nesterov_requires_momentum() {
        let p = param_with_grad(1.0, 1.0);
        assert!(SGD::new([p], 0.1, None, None, None, true).is_err());
    }
}
