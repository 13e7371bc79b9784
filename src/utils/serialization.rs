//! # State Serialization Utilities
//!
//! Functions for saving and loading model state dicts, optimizer state, and
//! whole sweep checkpoints. Uses `serde` for serialization and `bincode` as
//! the binary format.
//!
//! The on-disk representation is the same deep-copy state types the rest of
//! the library uses (`TensorState` / `StateDict` / `OptimizerState`), so a
//! file round trip restores exactly what a checkpoint restore would.

use crate::nn::{Module, StateDict};
use crate::optim::{Optimizer, OptimizerState};
use crate::sweep::Checkpoint;
use crate::tensor::TensorError;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

// --- Error Type ---
#[derive(thiserror::Error, Debug)]
pub enum SerializationError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization Error (Bincode): {0}")]
    Bincode(#[from] bincode::Error),
    #[error("Tensor error while loading state: {0}")]
    Tensor(#[from] TensorError),
}

// --- Module State ---

/// Saves the state dictionary of a module (parameters, buffers, and their
/// gradients) to a file.
pub fn save_module<P: AsRef<Path>>(module: &dyn Module, path: P) -> Result<(), SerializationError> {
    let state_dict = module.state_dict();
    let writer = BufWriter::new(File::create(path.as_ref())?);
    bincode::serialize_into(writer, &state_dict)?;
    Ok(())
}

/// Loads a state dictionary from a file into the module. Loading is strict:
/// the file's keys must exactly match the module's tensors.
pub fn load_module<P: AsRef<Path>>(
    module: &mut dyn Module,
    path: P,
) -> Result<(), SerializationError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let state_dict: StateDict = bincode::deserialize_from(reader)?;
    module.load_state_dict(&state_dict)?;
    Ok(())
}

// --- Optimizer State ---

/// Saves an optimizer's full internal state (group learning rates, step
/// count, auxiliary buffers) to a file.
pub fn save_optimizer<P: AsRef<Path>>(
    optimizer: &dyn Optimizer,
    path: P,
) -> Result<(), SerializationError> {
    let state = optimizer.state_dict();
    let writer = BufWriter::new(File::create(path.as_ref())?);
    bincode::serialize_into(writer, &state)?;
    Ok(())
}

/// Loads an optimizer's internal state from a file.
pub fn load_optimizer<P: AsRef<Path>>(
    optimizer: &mut dyn Optimizer,
    path: P,
) -> Result<(), SerializationError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let state: OptimizerState = bincode::deserialize_from(reader)?;
    optimizer.load_state_dict(&state)?;
    Ok(())
}

// --- Checkpoints ---

/// Saves a sweep checkpoint (model + optimizer state) to a file.
pub fn save_checkpoint<P: AsRef<Path>>(
    checkpoint: &Checkpoint,
    path: P,
) -> Result<(), SerializationError> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    bincode::serialize_into(writer, checkpoint)?;
    Ok(())
}

/// Loads a sweep checkpoint from a file.
pub fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Checkpoint, SerializationError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    Ok(bincode::deserialize_from(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::Linear;
    use crate::optim::{Optimizer, SGD};
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("lr_sweep_{}_{}", std::process::id(), name))
    }

    #[test]
    fn module_state_file_round_trip() {
        let mut model = Linear::new(3, 2, true);
        let path = temp_path("module.bin");
        save_module(&model, &path).unwrap();

        let before = model.state_dict();
        for (_name, param) in model.parameters() {
            param.data_mut().fill(9.0);
        }
        load_module(&mut model, &path).unwrap();
        assert_eq!(model.state_dict(), before);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn checkpoint_file_round_trip() {
        let model = Linear::new(2, 2, true);
        let mut optimizer =
            SGD::new(model.parameters().into_values(), 0.05, Some(0.9), None, None, false)
                .unwrap();
        for (_name, param) in model.parameters() {
            param
                .set_grad(ndarray::ArrayD::ones(ndarray::IxDyn(param.shape())))
                .unwrap();
        }
        optimizer.step().unwrap();

        let checkpoint = Checkpoint::capture(&model, &optimizer);
        let path = temp_path("checkpoint.bin");
        save_checkpoint(&checkpoint, &path).unwrap();
        let loaded = load_checkpoint(&path).unwrap();
        assert_eq!(loaded, checkpoint);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn optimizer_state_file_round_trip() {
        let model = Linear::new(2, 1, false);
        let mut optimizer =
            SGD::new(model.parameters().into_values(), 0.1, Some(0.5), None, None, false)
                .unwrap();
        model
            .weight
            .set_grad(ndarray::ArrayD::ones(ndarray::IxDyn(&[1, 2])))
            .unwrap();
        optimizer.step().unwrap();

        let saved = optimizer.state_dict();
        let path = temp_path("optimizer.bin");
        save_optimizer(&optimizer, &path).unwrap();

        optimizer.step().unwrap();
        load_optimizer(&mut optimizer, &path).unwrap();
        assert_eq!(optimizer.state_dict(), saved);

        std::fs::remove_file(path).ok();
    }
}
