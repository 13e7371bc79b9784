//! # Language Bindings
//!
//! Module specifically for PyO3 bindings setup (feature `python`).

pub mod python;
