//! Core traits and types for the powerflow engine.
//!
//! This module contains the result carrier, the error types and the stage
//! function traits that the pipeline is built from.

pub mod error;
pub mod outcome;
pub mod traits;

// Re-export core items
pub use error::{BoxError, Error, Fault, Result};
pub use outcome::Outcome;
pub use traits::{Processor, Sink};
