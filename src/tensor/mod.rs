//! # Tensor Module
//!
//! This module defines the core `Tensor` struct and related functionality:
//! storage, plain (non-tracking) math operations, and deep snapshots of
//! tensor state.
//!
//! There is deliberately no autograd tape here. Gradients live in a shared
//! slot on each tensor and are populated by the analytic backward passes of
//! the `nn` modules; the sweep evaluator only reads, snapshots, and restores
//! them.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

// --- Submodules ---
pub mod ops;

// --- Error Handling ---
#[derive(thiserror::Error, Debug)]
pub enum TensorError {
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("Incompatible shapes for operation {op}: {shape1:?} and {shape2:?}")]
    IncompatibleShapes {
        op: String,
        shape1: Vec<usize>,
        shape2: Vec<usize>,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("ndarray error: {0}")]
    NdarrayError(#[from] ndarray::ShapeError),
    #[error("Generic error: {0}")]
    Generic(String),
}

// Define a type alias for the underlying data type (e.g., f32)
pub type TensorData = f32;

/// # Tensor
///
/// The core data structure for numerical computation, similar to PyTorch's
/// Tensor. It wraps an `ndarray::ArrayD` for storage.
///
/// Both the data and the gradient slot sit behind `Arc<RwLock<...>>`, so
/// cloning a `Tensor` produces a second handle onto the *same* storage. This
/// is how optimizers hold the parameters of a model: the optimizer's clones
/// alias the model's tensors, and an in-place update through one handle is
/// visible through every other.
#[derive(Clone, Debug)]
pub struct Tensor {
    // `data` holds the actual numerical values.
    pub(crate) data: Arc<RwLock<ArrayD<TensorData>>>,

    // Shape information (redundant with ndarray but useful for quick access)
    shape: Vec<usize>,

    // Shared gradient slot. `None` until a backward pass populates it.
    // The slot itself is always allocated so that handles cloned before the
    // first backward pass still observe gradients written later.
    grad: Arc<RwLock<Option<ArrayD<TensorData>>>>,

    /// Does this tensor take part in gradient computation?
    pub requires_grad: bool,
}

impl Tensor {
    /// Creates a new Tensor from an `ndarray::ArrayD`.
    pub fn new(data: ArrayD<TensorData>, requires_grad: bool) -> Self {
        let shape = data.shape().to_vec();
        Tensor {
            data: Arc::new(RwLock::new(data)),
            shape,
            grad: Arc::new(RwLock::new(None)),
            requires_grad,
        }
    }

    /// Returns the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Provides read-only access to the underlying data.
    /// Note: This locks the RwLock for reading.
    pub fn data(&self) -> std::sync::RwLockReadGuard<'_, ArrayD<TensorData>> {
        self.data.read().expect("Tensor data RwLock poisoned")
    }

    /// Provides mutable access to the underlying data.
    /// Used by optimizers for in-place parameter updates and by state-dict
    /// loading. Note: This locks the RwLock for writing.
    pub fn data_mut(&self) -> std::sync::RwLockWriteGuard<'_, ArrayD<TensorData>> {
        self.data.write().expect("Tensor data RwLock poisoned")
    }

    /// Clones the underlying data into a new ArrayD.
    pub fn data_clone(&self) -> ArrayD<TensorData> {
        self.data().clone()
    }

    /// Retrieves a deep copy of the gradient, if one has been computed.
    pub fn grad(&self) -> Option<ArrayD<TensorData>> {
        self.grad
            .read()
            .expect("Tensor grad RwLock poisoned")
            .clone()
    }

    /// Overwrites the gradient with `grad`.
    pub fn set_grad(&self, grad: ArrayD<TensorData>) -> Result<(), TensorError> {
        if grad.shape() != self.shape.as_slice() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.clone(),
                got: grad.shape().to_vec(),
            });
        }
        *self.grad.write().expect("Tensor grad RwLock poisoned") = Some(grad);
        Ok(())
    }

    /// Accumulates `incoming` into the gradient slot, initializing it from
    /// `incoming` if no gradient exists yet. Used by the backward passes.
    pub fn accumulate_grad(&self, incoming: &ArrayD<TensorData>) -> Result<(), TensorError> {
        if !self.requires_grad {
            return Ok(());
        }
        if incoming.shape() != self.shape.as_slice() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.clone(),
                got: incoming.shape().to_vec(),
            });
        }
        let mut slot = self.grad.write().expect("Tensor grad RwLock poisoned");
        match slot.as_mut() {
            Some(existing) => *existing += incoming,
            None => *slot = Some(incoming.clone()),
        }
        Ok(())
    }

    /// Zeroes the gradient of the tensor if it exists.
    /// Commonly used by optimizers.
    pub fn zero_grad(&self) {
        let mut slot = self.grad.write().expect("Tensor grad RwLock poisoned");
        if let Some(grad) = slot.as_mut() {
            grad.fill(0.0 as TensorData);
        }
    }

    /// Clears the gradient slot entirely (back to "never computed").
    pub fn clear_grad(&self) {
        *self.grad.write().expect("Tensor grad RwLock poisoned") = None;
    }

    /// Extracts the value of a scalar tensor.
    pub fn item(&self) -> Result<TensorData, TensorError> {
        let data = self.data();
        if data.len() != 1 {
            return Err(TensorError::Generic(format!(
                "item() called on non-scalar tensor of shape {:?}",
                self.shape
            )));
        }
        data.iter()
            .next()
            .copied()
            .ok_or_else(|| TensorError::Generic("empty tensor".to_string()))
    }

    /// Captures a deep, independent copy of this tensor's data and gradient.
    pub fn snapshot(&self) -> TensorState {
        TensorState::from_tensor(self)
    }
}

// --- Tensor State Snapshot ---

/// A deep, serializable copy of a tensor's data and gradient.
///
/// `TensorState` never aliases live storage: `from_tensor` copies the data
/// out, and `apply_to` copies it back in. This is the building block for
/// model state dicts, optimizer state, and the sweep evaluator's checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TensorState {
    shape: Vec<usize>,
    // Flat row-major data for simple serialization
    data: Vec<TensorData>,
    grad: Option<Vec<TensorData>>,
}

impl TensorState {
    /// Creates a snapshot from a live tensor.
    pub fn from_tensor(tensor: &Tensor) -> Self {
        let data = tensor.data().iter().cloned().collect();
        let grad = tensor.grad().map(|g| g.iter().cloned().collect());
        TensorState {
            shape: tensor.shape().to_vec(),
            data,
            grad,
        }
    }

    /// Creates a snapshot directly from an array (no gradient).
    pub fn from_array(array: &ArrayD<TensorData>) -> Self {
        TensorState {
            shape: array.shape().to_vec(),
            data: array.iter().cloned().collect(),
            grad: None,
        }
    }

    /// The shape this state was captured with.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Rebuilds the data as an owned ndarray.
    pub fn to_ndarray(&self) -> Result<ArrayD<TensorData>, TensorError> {
        Ok(ArrayD::from_shape_vec(
            IxDyn(&self.shape),
            self.data.clone(),
        )?)
    }

    /// Writes this snapshot back into `target`, restoring both data and
    /// gradient. Fails if the shapes do not line up.
    pub fn apply_to(&self, target: &Tensor) -> Result<(), TensorError> {
        if target.shape() != self.shape.as_slice() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape.clone(),
                got: target.shape().to_vec(),
            });
        }
        target.data_mut().assign(&self.to_ndarray()?);
        match &self.grad {
            Some(grad) => {
                let grad_array = ArrayD::from_shape_vec(IxDyn(&self.shape), grad.clone())?;
                target.set_grad(grad_array)?;
            }
            None => target.clear_grad(),
        }
        Ok(())
    }
}

// --- Helper functions ---

/// Helper to create a tensor filled with zeros.
pub fn zeros(shape: &[usize], requires_grad: bool) -> Tensor {
    let data = ArrayD::zeros(IxDyn(shape));
    Tensor::new(data, requires_grad)
}

/// Helper to create a tensor filled with ones.
pub fn ones(shape: &[usize], requires_grad: bool) -> Tensor {
    let data = ArrayD::ones(IxDyn(shape));
    Tensor::new(data, requires_grad)
}

/// Helper to create a tensor with random values (uniform in `[low, high)`).
pub fn rand_uniform(
    shape: &[usize],
    low: TensorData,
    high: TensorData,
    requires_grad: bool,
) -> Tensor {
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    let data = ArrayD::random(IxDyn(shape), Uniform::new(low, high));
    Tensor::new(data, requires_grad)
}

/// Helper to create a tensor with random values (standard normal distribution).
pub fn randn(shape: &[usize], requires_grad: bool) -> Tensor {
    use ndarray_rand::rand_distr::StandardNormal;
    use ndarray_rand::RandomExt;

    let data = ArrayD::random(IxDyn(shape), StandardNormal);
    Tensor::new(data, requires_grad)
}

/// Like [`rand_uniform`], but drawing from a seeded RNG so the values are
/// reproducible across runs.
pub fn rand_uniform_seeded(
    shape: &[usize],
    low: TensorData,
    high: TensorData,
    seed: u64,
    requires_grad: bool,
) -> Tensor {
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let mut rng = StdRng::seed_from_u64(seed);
    let data = ArrayD::random_using(IxDyn(shape), Uniform::new(low, high), &mut rng);
    Tensor::new(data, requires_grad)
}

/// Like [`randn`], but drawing from a seeded RNG so the values are
/// reproducible across runs.
pub fn randn_seeded(shape: &[usize], seed: u64, requires_grad: bool) -> Tensor {
    use ndarray_rand::rand_distr::StandardNormal;
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let mut rng = StdRng::seed_from_u64(seed);
    let data = ArrayD::random_using(IxDyn(shape), StandardNormal, &mut rng);
    Tensor::new(data, requires_grad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn clones_share_data_and_grad() {
        let t = zeros(&[2, 2], true);
        let handle = t.clone();

        t.data_mut().fill(3.0);
        assert_eq!(handle.data()[[0, 0]], 3.0);

        // A gradient written after the clone is visible through the clone.
        t.set_grad(ArrayD::ones(IxDyn(&[2, 2]))).unwrap();
        assert!(handle.grad().is_some());
    }

    #[test]
    fn snapshot_is_independent_of_live_tensor() {
        let t = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), true);
        t.set_grad(ArrayD::ones(IxDyn(&[2, 2]))).unwrap();
        let state = t.snapshot();

        t.data_mut().fill(-1.0);
        t.zero_grad();

        state.apply_to(&t).unwrap();
        assert_eq!(t.data()[[1, 1]], 4.0);
        assert_eq!(t.grad().unwrap()[[0, 0]], 1.0);
    }

    #[test]
    fn apply_to_restores_absent_gradient() {
        let t = zeros(&[3], true);
        let state = t.snapshot();

        t.set_grad(ArrayD::ones(IxDyn(&[3]))).unwrap();
        state.apply_to(&t).unwrap();
        assert!(t.grad().is_none());
    }

    #[test]
    fn accumulate_initializes_then_adds() {
        let t = zeros(&[2], true);
        let g = ArrayD::ones(IxDyn(&[2]));
        t.accumulate_grad(&g).unwrap();
        t.accumulate_grad(&g).unwrap();
        assert_eq!(t.grad().unwrap()[[0]], 2.0);
    }

    #[test]
    fn seeded_random_tensors_are_reproducible() {
        let a = randn_seeded(&[4, 3], 42, false);
        let b = randn_seeded(&[4, 3], 42, false);
        assert_eq!(*a.data(), *b.data());

        let c = rand_uniform_seeded(&[4, 3], -1.0, 1.0, 7, false);
        let d = rand_uniform_seeded(&[4, 3], -1.0, 1.0, 8, false);
        assert_ne!(*c.data(), *d.data());
    }

    #[test]
    fn item_rejects_non_scalar() {
        let t = zeros(&[2, 2], false);
        assert!(t.item().is_err());
        let s = ones(&[1], false);
        assert_eq!(s.item().unwrap(), 1.0);
    }
}
