//! # Neural Network Layer Modules

pub mod activation;
pub mod fully_connected;
pub mod linear;

pub use activation::{LeakyReLU, ReLU};
pub use fully_connected::FullyConnected;
pub use linear::Linear;
