//! Command implementations for cwu.

pub mod generate;
pub mod unique;

pub use generate::{GenerateCommand, GenerateConfig, GenerateStats};
pub use unique::{UniqueCommand, UniqueStats};
