//! Tensor metadata and values the descriptor wrappers are built from

pub mod dimension;
pub mod matrix;
pub mod precision;

// Re-export main types for convenience
pub use dimension::Dimension;
pub use matrix::Matrix;
pub use precision::{Element, Precision};
