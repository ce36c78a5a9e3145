//! Photoplotter vector format: copper and outline layers.

pub mod parser;
pub mod types;

pub use types::*;
