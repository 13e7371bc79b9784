//! # Adam Optimizer

use super::{buffer_key, check_state_shape, parse_buffer_key, Optimizer, OptimizerState, ParamGroup};
use crate::tensor::{Tensor, TensorData, TensorError, TensorState};
use ndarray::ArrayD;
use std::collections::BTreeMap;

/// Implements the Adam algorithm.
/// Reference: Adam: A Method for Stochastic Optimization - https://arxiv.org/abs/1412.6980
pub struct Adam {
    groups: Vec<ParamGroup>,
    betas: (TensorData, TensorData), // (beta1, beta2)
    eps: TensorData,
    weight_decay: TensorData,
    amsgrad: bool,

    // State stored per (group, param) index
    state: BTreeMap<(usize, usize), AdamParamState>,
    // Time step (number of calls to step())
    t: usize,
}

#[derive(Clone, Debug)]
struct AdamParamState {
    exp_avg: ArrayD<TensorData>,                 // 1st moment estimate - m_t
    exp_avg_sq: ArrayD<TensorData>,              // 2nd moment estimate - v_t
    max_exp_avg_sq: Option<ArrayD<TensorData>>,  // Max v_t, only if amsgrad
}

impl Adam {
    /// Creates a new Adam optimizer instance with a single parameter group.
    ///
    /// # Arguments
    /// * `params`: An iterator over the parameters to optimize.
    /// * `lr`: Learning rate (default: 1e-3).
    /// * `betas`: Coefficients for the running averages of the gradient and its square (default: (0.9, 0.999)).
    /// * `eps`: Term added to the denominator for numerical stability (default: 1e-8).
    /// * `weight_decay`: Weight decay (L2 penalty) (default: 0).
    /// * `amsgrad`: Whether to use the AMSGrad variant (default: false).
    pub fn new<I>(
        params: I,
        lr: Option<TensorData>,
        betas: Option<(TensorData, TensorData)>,
        eps: Option<TensorData>,
        weight_decay: Option<TensorData>,
        amsgrad: bool,
    ) -> Result<Self, TensorError>
    where
        I: IntoIterator<Item = Tensor>,
    {
        let lr_val = lr.unwrap_or(1e-3);
        if lr_val < 0.0 {
            return Err(TensorError::InvalidArgument(
                "Invalid learning rate: must be >= 0".to_string(),
            ));
        }
        let group = ParamGroup::new(params, Some(lr_val));
        Self::with_groups(vec![group], betas, eps, weight_decay, amsgrad)
    }

    /// Creates an Adam optimizer over explicit parameter groups.
    pub fn with_groups(
        groups: Vec<ParamGroup>,
        betas: Option<(TensorData, TensorData)>,
        eps: Option<TensorData>,
        weight_decay: Option<TensorData>,
        amsgrad: bool,
    ) -> Result<Self, TensorError> {
        let betas_val = betas.unwrap_or((0.9, 0.999));
        let eps_val = eps.unwrap_or(1e-8);
        let weight_decay_val = weight_decay.unwrap_or(0.0);

        // --- Input Validation ---
        if eps_val < 0.0 {
            return Err(TensorError::InvalidArgument(
                "Invalid epsilon value: must be >= 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&betas_val.0) {
            return Err(TensorError::InvalidArgument(
                "Invalid beta parameter at index 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&betas_val.1) {
            return Err(TensorError::InvalidArgument(
                "Invalid beta parameter at index 1".to_string(),
            ));
        }
        if weight_decay_val < 0.0 {
            return Err(TensorError::InvalidArgument(
                "Invalid weight_decay value: must be >= 0".to_string(),
            ));
        }

        Ok(Adam {
            groups,
            betas: betas_val,
            eps: eps_val,
            weight_decay: weight_decay_val,
            amsgrad,
            state: BTreeMap::new(),
            t: 0,
        })
    }

    /// The number of steps taken so far.
    pub fn step_count(&self) -> usize {
        self.t
    }
}

impl Optimizer for Adam {
    fn step(&mut self) -> Result<(), TensorError> {
        self.t += 1;
        let (beta1, beta2) = self.betas;

        // Bias correction terms
        let bias_correction1 = 1.0 - beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - beta2.powi(self.t as i32);

        for (group_idx, group) in self.groups.iter().enumerate() {
            let lr = group.lr.ok_or_else(|| {
                TensorError::InvalidArgument(format!(
                    "parameter group {} is missing a learning rate",
                    group_idx
                ))
            })?;
            let step_size = lr / bias_correction1;

            for (param_idx, param) in group.params.iter().enumerate() {
                if !param.requires_grad {
                    continue;
                }
                let mut grad = match param.grad() {
                    Some(g) => g,
                    None => continue,
                };

                // Weight decay: grad = grad + param * weight_decay
                if self.weight_decay != 0.0 {
                    grad = grad + &(&*param.data() * self.weight_decay);
                }

                let amsgrad = self.amsgrad;
                let state = self
                    .state
                    .entry((group_idx, param_idx))
                    .or_insert_with(|| AdamParamState {
                        exp_avg: ArrayD::zeros(grad.raw_dim()),
                        exp_avg_sq: ArrayD::zeros(grad.raw_dim()),
                        max_exp_avg_sq: if amsgrad {
                            Some(ArrayD::zeros(grad.raw_dim()))
                        } else {
                            None
                        },
                    });

                // m_t = beta1 * m_{t-1} + (1 - beta1) * g_t
                state.exp_avg = &state.exp_avg * beta1 + &grad * (1.0 - beta1);
                // v_t = beta2 * v_{t-1} + (1 - beta2) * g_t^2
                state.exp_avg_sq = &state.exp_avg_sq * beta2 + &(&grad * &grad) * (1.0 - beta2);

                // denom = sqrt(v_hat) + eps, with v_hat = v_t / bias_correction2
                let eps = self.eps;
                let denom = match state.max_exp_avg_sq.as_mut() {
                    Some(max_v) => {
                        // AMSGrad: track the running maximum of v_t
                        ndarray::Zip::from(&mut *max_v)
                            .and(&state.exp_avg_sq)
                            .for_each(|m, &v| *m = m.max(v));
                        max_v.mapv(|v| (v / bias_correction2).sqrt() + eps)
                    }
                    None => state
                        .exp_avg_sq
                        .mapv(|v| (v / bias_correction2).sqrt() + eps),
                };

                // param = param - step_size * m_t / denom
                let update = &state.exp_avg / &denom * step_size;
                *param.data_mut() -= &update;
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
        let mut buffers = BTreeMap::new();
        for (&(group, param), state) in &self.state {
            buffers.insert(
                buffer_key("exp_avg", group, param),
                TensorState::from_array(&state.exp_avg),
            );
            buffers.insert(
                buffer_key("exp_avg_sq", group, param),
                TensorState::from_array(&state.exp_avg_sq),
            );
            if let Some(ref max_v) = state.max_exp_avg_sq {
                buffers.insert(
                    buffer_key("max_exp_avg_sq", group, param),
                    TensorState::from_array(max_v),
                );
            }
        }
        OptimizerState {
            group_lrs: self.groups.iter().map(|g| g.lr).collect(),
            step_count: self.t,
            buffers,
        }
    }

    fn load_state_dict(&mut self, state: &OptimizerState) -> Result<(), TensorError> {
        check_state_shape(&self.groups, state)?;
        for (group, lr) in self.groups.iter_mut().zip(&state.group_lrs) {
            group.lr = *lr;
        }
        self.t = state.step_count;

        let mut rebuilt: BTreeMap<(usize, usize), AdamParamState> = BTreeMap::new();
        for (key, tensor_state) in &state.buffers {
            let (kind, group, param) = parse_buffer_key(key)?;
            let array = tensor_state.to_ndarray()?;
            let entry = rebuilt
                .entry((group, param))
                .or_insert_with(|| AdamParamState {
                    exp_avg: ArrayD::zeros(array.raw_dim()),
                    exp_avg_sq: ArrayD::zeros(array.raw_dim()),
                    max_exp_avg_sq: None,
                });
            match kind {
                "exp_avg" => entry.exp_avg = array,
                "exp_avg_sq" => entry.exp_avg_sq = array,
                "max_exp_avg_sq" => entry.max_exp_avg_sq = Some(array),
                other => {
                    return Err(TensorError::InvalidArgument(format!(
                        "unknown Adam buffer kind: '{}'",
                        other
                    )))
                }
            }
        }
        self.state = rebuilt;
        Ok(())
    }
}
