//! # Tensor Operations
//!
//! Plain mathematical operations for Tensors. Results are fresh tensors with
//! `requires_grad = false`; gradient bookkeeping is the responsibility of the
//! `nn` modules' backward passes, not of these ops.

use super::{Tensor, TensorData, TensorError};
use ndarray::{ArrayD, Ix1, Ix2};

/// Checks if tensor shapes can be broadcast together following NumPy
/// broadcasting rules.
pub fn can_broadcast(shape1: &[usize], shape2: &[usize]) -> bool {
    // Iterate from the right (least significant dimensions)
    let mut i1 = shape1.len() as isize - 1;
    let mut i2 = shape2.len() as isize - 1;

    while i1 >= 0 && i2 >= 0 {
        let s1 = shape1[i1 as usize];
        let s2 = shape2[i2 as usize];

        // Dimensions must be equal or one of them must be 1
        if s1 != s2 && s1 != 1 && s2 != 1 {
            return false;
        }

        i1 -= 1;
        i2 -= 1;
    }
    true
}

fn check_broadcast(op: &str, a: &Tensor, b: &Tensor) -> Result<(), TensorError> {
    if can_broadcast(a.shape(), b.shape()) {
        Ok(())
    } else {
        Err(TensorError::IncompatibleShapes {
            op: op.to_string(),
            shape1: a.shape().to_vec(),
            shape2: b.shape().to_vec(),
        })
    }
}

// --- Arithmetic Operations ---

/// Element-wise addition of two tensors (with broadcasting).
pub fn add(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    check_broadcast("add", a, b)?;
    let result = &*a.data() + &*b.data();
    Ok(Tensor::new(result, false))
}

/// Element-wise subtraction of two tensors (with broadcasting).
pub fn sub(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    check_broadcast("sub", a, b)?;
    let result = &*a.data() - &*b.data();
    Ok(Tensor::new(result, false))
}

/// Element-wise multiplication of two tensors (with broadcasting).
pub fn mul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    check_broadcast("mul", a, b)?;
    let result = &*a.data() * &*b.data();
    Ok(Tensor::new(result, false))
}

/// Multiplies every element by a scalar.
pub fn mul_scalar(a: &Tensor, scalar: TensorData) -> Result<Tensor, TensorError> {
    let result = &*a.data() * scalar;
    Ok(Tensor::new(result, false))
}

// --- Linear Algebra ---

/// Matrix multiplication of two 2-D tensors: `(n, k) @ (k, m) -> (n, m)`.
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor, TensorError> {
    let a_data = a.data();
    let b_data = b.data();

    let a2 = a_data
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| TensorError::IncompatibleShapes {
            op: "matmul".to_string(),
            shape1: a.shape().to_vec(),
            shape2: b.shape().to_vec(),
        })?;
    let b2 = b_data
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| TensorError::IncompatibleShapes {
            op: "matmul".to_string(),
            shape1: a.shape().to_vec(),
            shape2: b.shape().to_vec(),
        })?;

    if a2.ncols() != b2.nrows() {
        return Err(TensorError::IncompatibleShapes {
            op: "matmul".to_string(),
            shape1: a.shape().to_vec(),
            shape2: b.shape().to_vec(),
        });
    }

    let result = a2.dot(&b2).into_dyn();
    Ok(Tensor::new(result, false))
}

/// Swaps two axes of a tensor, producing an owned copy.
pub fn transpose(tensor: &Tensor, dim0: usize, dim1: usize) -> Result<Tensor, TensorError> {
    let data = tensor.data();
    let ndim = data.ndim();
    if dim0 >= ndim || dim1 >= ndim {
        return Err(TensorError::Generic(format!(
            "Transpose dims out of bounds: {}, {} for ndim {}",
            dim0, dim1, ndim
        )));
    }
    let mut axes: Vec<usize> = (0..ndim).collect();
    axes.swap(dim0, dim1);
    let result = data.view().permuted_axes(axes).to_owned();
    Ok(Tensor::new(result, false))
}

// --- Reductions ---

/// Means all elements, producing a scalar tensor of shape `[1]`.
pub fn mean(a: &Tensor) -> Result<Tensor, TensorError> {
    if a.size() == 0 {
        return Err(TensorError::Generic(
            "mean of empty tensor is undefined".to_string(),
        ));
    }
    let total = a.data().sum() / a.size() as TensorData;
    Ok(Tensor::new(
        ArrayD::from_elem(ndarray::IxDyn(&[1]), total),
        false,
    ))
}

/// Sums a 2-D tensor over its rows: `(n, m) -> (m)`.
/// Used to reduce per-sample bias gradients down to the bias shape.
pub fn sum_rows(a: &Tensor) -> Result<Tensor, TensorError> {
    let data = a.data();
    let a2 = data
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| TensorError::Generic(format!(
            "sum_rows expects a 2-D tensor, got shape {:?}",
            a.shape()
        )))?;
    let result: ndarray::Array<TensorData, Ix1> = a2.sum_axis(ndarray::Axis(0));
    Ok(Tensor::new(result.into_dyn(), false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;
    use ndarray::{arr1, arr2};

    #[test]
    fn add_broadcasts_bias_row() {
        let a = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), false);
        let b = Tensor::new(arr1(&[10.0, 20.0]).into_dyn(), false);
        let c = add(&a, &b).unwrap();
        assert_eq!(c.data()[[1, 1]], 24.0);
    }

    #[test]
    fn add_rejects_incompatible_shapes() {
        let a = tensor::zeros(&[2, 3], false);
        let b = tensor::zeros(&[2, 2], false);
        assert!(matches!(
            add(&a, &b),
            Err(TensorError::IncompatibleShapes { .. })
        ));
    }

    #[test]
    fn elementwise_arithmetic() {
        let a = Tensor::new(arr1(&[3.0, 4.0]).into_dyn(), false);
        let b = Tensor::new(arr1(&[1.0, 2.0]).into_dyn(), false);
        assert_eq!(sub(&a, &b).unwrap().data()[[1]], 2.0);
        assert_eq!(mul(&a, &b).unwrap().data()[[1]], 8.0);
        assert_eq!(mul_scalar(&a, -2.0).unwrap().data()[[0]], -6.0);
    }

    #[test]
    fn matmul_matches_hand_computation() {
        let a = Tensor::new(arr2(&[[1.0, 2.0]]).into_dyn(), false);
        let b = Tensor::new(arr2(&[[3.0], [4.0]]).into_dyn(), false);
        let c = matmul(&a, &b).unwrap();
        assert_eq!(c.shape(), &[1, 1]);
        assert_eq!(c.data()[[0, 0]], 11.0);
    }

    #[test]
    fn matmul_rejects_inner_dim_mismatch() {
        let a = tensor::zeros(&[2, 3], false);
        let b = tensor::zeros(&[2, 3], false);
        assert!(matmul(&a, &b).is_err());
    }

    #[test]
    fn transpose_swaps_axes() {
        let a = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), false);
        let t = transpose(&a, 0, 1).unwrap();
        assert_eq!(t.data()[[0, 1]], 3.0);
    }

    #[test]
    fn mean_of_all_elements() {
        let a = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), false);
        assert_eq!(mean(&a).unwrap().item().unwrap(), 2.5);
    }

    #[test]
    fn sum_rows_reduces_to_bias_shape() {
        let a = Tensor::new(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn(), false);
        let s = sum_rows(&a).unwrap();
        assert_eq!(s.shape(), &[2]);
        assert_eq!(s.data()[[0]], 4.0);
    }
}
