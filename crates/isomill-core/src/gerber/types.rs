//! Vector-layer primitives and the decode cursor.

use std::collections::BTreeMap;

use gerber_types::{Aperture, CoordinateFormat, QuadrantMode};

use crate::geometry::Point;

/// Arc sweep direction for circular interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcDirection {
    /// Clockwise interpolation (G02).
    Clockwise,
    /// Counter-clockwise interpolation (G03).
    CounterClockwise,
}

/// Interpolation state selected by G01/G02/G03.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    /// Linear interpolation (G01).
    Linear,
    /// Clockwise circular interpolation (G02).
    ClockwiseArc,
    /// Counter-clockwise circular interpolation (G03).
    CounterClockwiseArc,
}

/// Coordinate accumulation mode from the format declaration or G90/G91.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateMode {
    /// Coordinates are absolute positions.
    Absolute,
    /// Coordinates are deltas from the current position.
    Incremental,
}

/// Zero-omission convention for fixed-point coordinate fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroOmission {
    /// Leading zeros omitted; digits are right-aligned within the format.
    Leading,
    /// Trailing zeros omitted; digits are left-aligned within the format.
    Trailing,
}

/// One decoded drawing operation, in absolute millimeter coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    /// Straight stroked segment (D01 under linear interpolation).
    Draw {
        /// Segment start.
        from: Point,
        /// Segment end.
        to: Point,
        /// Selected aperture code.
        aperture: i32,
    },
    /// Arc stroked segment (D01 under circular interpolation).
    Arc {
        /// Arc start.
        from: Point,
        /// Arc end.
        to: Point,
        /// Center offset relative to the start point.
        center_offset: Point,
        /// Sweep direction.
        direction: ArcDirection,
        /// Selected aperture code.
        aperture: i32,
    },
    /// Aperture stamp (D03).
    Flash {
        /// Stamp position.
        at: Point,
        /// Selected aperture code.
        aperture: i32,
    },
}

/// Interpolation state threaded through the decode fold.
///
/// Every decode step consumes the prior cursor by value and returns its
/// successor together with the decoded primitive, if any. Nothing else in
/// the parser carries cross-command state.
#[derive(Debug, Clone)]
pub struct Cursor {
    /// Current drawing position.
    pub position: Point,
    /// Currently selected aperture code.
    pub aperture: Option<i32>,
    /// Active interpolation mode.
    pub interpolation: InterpolationMode,
    /// Active arc quadrant mode.
    pub quadrant: QuadrantMode,
    /// Absolute or incremental coordinate accumulation.
    pub coordinate_mode: CoordinateMode,
    /// Fixed-point zero-omission convention.
    pub zero_omission: ZeroOmission,
    /// Declared integer/decimal digit counts, if any.
    pub format: Option<CoordinateFormat>,
    /// Multiplier converting file units to millimeters.
    pub unit_scale: f64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            position: Point::new(0.0, 0.0),
            aperture: None,
            interpolation: InterpolationMode::Linear,
            quadrant: QuadrantMode::Multi,
            coordinate_mode: CoordinateMode::Absolute,
            zero_omission: ZeroOmission::Leading,
            format: None,
            unit_scale: 1.0,
        }
    }
}

/// Fully parsed vector layer: aperture table, ordered primitives, diagnostics.
///
/// Primitive order is input order; nothing is reordered or deduplicated.
#[derive(Debug, Clone, Default)]
pub struct GerberLayer {
    /// Aperture definitions keyed by D-code.
    pub apertures: BTreeMap<i32, Aperture>,
    /// Decoded drawing operations in input order.
    pub primitives: Vec<Primitive>,
    /// Recoverable oddities encountered while parsing.
    pub warnings: Vec<String>,
}
