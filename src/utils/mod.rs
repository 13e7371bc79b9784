//! # Utility Functions (`utils`)
//!
//! Provides helper functionality around the core library, currently
//! serialization of model, optimizer, and checkpoint state.

pub mod serialization;

pub use serialization::{
    load_checkpoint, load_module, load_optimizer, save_checkpoint, save_module, save_optimizer,
    SerializationError,
};
