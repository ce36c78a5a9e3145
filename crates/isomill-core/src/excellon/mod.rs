//! Drill-list format.

pub mod parser;
pub mod types;

pub use types::*;
