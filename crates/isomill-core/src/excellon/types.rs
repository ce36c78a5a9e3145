//! Drill-list types.

use serde::Serialize;

use crate::geometry::Point;

/// A single drill hole, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrillHole {
    /// Hole center.
    pub center: Point,
    /// Finished hole diameter.
    pub diameter: f64,
}

/// One tool from the drill file header, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DrillTool {
    /// Tool code (T1, T2, ...).
    pub code: u32,
    /// Drill diameter.
    pub diameter: f64,
}

/// Fully parsed drill list.
///
/// Hole order is input order. All values are normalized to millimeters
/// regardless of the file's declared unit system.
#[derive(Debug, Clone, Default)]
pub struct DrillFile {
    /// Drill holes in input order.
    pub holes: Vec<DrillHole>,
    /// Tool definitions sorted by code.
    pub tools: Vec<DrillTool>,
    /// Recoverable oddities encountered while parsing.
    pub warnings: Vec<String>,
}
