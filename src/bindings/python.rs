//! # Python Bindings (`lr_sweep`)
//!
//! This module uses PyO3 to expose the learning-rate sweep to Python. The
//! binding surface is deliberately small: build the fully-connected demo
//! network with an SGD optimizer and MSE criterion on the Rust side, sweep
//! it, and hand back a plain `list[float]`.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::nn::{FullyConnected, MSELoss, Module};
use crate::optim::SGD;
use crate::sweep::loss_per_learning_rate;
use crate::tensor::{Tensor, TensorData, TensorError};

use ndarray::ArrayD;

// --- Error Conversion ---

fn to_py_err(err: TensorError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

// --- Helpers ---

/// Builds a `(rows, cols)` tensor from a Python list of rows.
fn tensor_from_rows(rows: &[Vec<TensorData>], name: &str) -> PyResult<Tensor> {
    let n = rows.len();
    let cols = rows.first().map(|r| r.len()).unwrap_or(0);
    if n == 0 || cols == 0 {
        return Err(PyValueError::new_err(format!("{} must be non-empty", name)));
    }
    if rows.iter().any(|r| r.len() != cols) {
        return Err(PyValueError::new_err(format!(
            "{} rows must all have the same length",
            name
        )));
    }
    let flat: Vec<TensorData> = rows.iter().flatten().copied().collect();
    let data = ArrayD::from_shape_vec(ndarray::IxDyn(&[n, cols]), flat)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(Tensor::new(data, false))
}

// --- Functions ---

/// Sweeps learning rates for a freshly initialized fully-connected network
/// trained with SGD against an MSE criterion.
///
/// Returns one loss per candidate learning rate, in order.
#[pyfunction]
#[pyo3(signature = (input_dim, hidden_layer_dims, output_dim, x, y, learning_rates, negative_slope=0.01, momentum=0.0))]
#[allow(clippy::too_many_arguments)]
fn fully_connected_loss_per_learning_rate(
    input_dim: usize,
    hidden_layer_dims: Vec<usize>,
    output_dim: usize,
    x: Vec<Vec<TensorData>>,
    y: Vec<Vec<TensorData>>,
    learning_rates: Vec<TensorData>,
    negative_slope: TensorData,
    momentum: TensorData,
) -> PyResult<Vec<TensorData>> {
    let mut model = FullyConnected::new(input_dim, &hidden_layer_dims, output_dim, negative_slope);
    let x = tensor_from_rows(&x, "x")?;
    let y = tensor_from_rows(&y, "y")?;
    let criterion = MSELoss::new();

    // The sweep overwrites the rate per trial; the constructor rate is a
    // placeholder that is restored afterwards.
    let momentum = if momentum != 0.0 { Some(momentum) } else { None };
    let mut optimizer = SGD::new(
        model.parameters().into_values(),
        0.0,
        momentum,
        None,
        None,
        false,
    )
    .map_err(to_py_err)?;

    loss_per_learning_rate(
        &mut model,
        &x,
        &y,
        &criterion,
        &mut optimizer,
        &learning_rates,
        true,
    )
    .map_err(to_py_err)
}

// --- Module Definition ---

#[pymodule]
fn lr_sweep(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(
        fully_connected_loss_per_learning_rate,
        m
    )?)?;
    Ok(())
}
