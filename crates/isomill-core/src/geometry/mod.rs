//! Planar region construction from parsed primitives.

pub mod builder;
pub mod shapes;
pub mod types;

pub use types::*;
