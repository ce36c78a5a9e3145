//! Milling parameters supplied by the external configuration collaborator.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const DEFAULT_OFFSET_DISTANCE: f64 = 0.22;
const DEFAULT_NUM_PASSES: u32 = 3;
const DEFAULT_PASS_SPACING: f64 = 0.2;
const DEFAULT_SPINDLE_SPEED: f64 = 12_000.0;
const DEFAULT_CUT_DEPTH: f64 = -0.1;
const DEFAULT_EDGE_CUT_DEPTH: f64 = -0.2;
const DEFAULT_SAFE_HEIGHT: f64 = 3.0;
const DEFAULT_FEED_RATE: f64 = 450.0;
const DEFAULT_PLUNGE_FEED_RATE: f64 = 200.0;
const DEFAULT_HOLE_START: f64 = 0.1;
const DEFAULT_HOLE_DEPTH: f64 = -1.8;
const DEFAULT_SPINDLE_WARMUP: f64 = 1.5;

/// All numeric inputs to the toolpath and emission stages.
///
/// Distances are millimeters, feeds are millimeters per minute, the
/// spindle speed is revolutions per minute, and the spindle warm-up is
/// seconds. Depths below the copper surface are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MillingParams {
    /// First-pass offset from the copper edge.
    pub offset_distance: f64,
    /// Number of isolation passes.
    pub num_passes: u32,
    /// Spacing between consecutive passes.
    pub pass_spacing: f64,
    /// Spindle speed while cutting.
    pub spindle_speed: f64,
    /// Isolation cut depth (negative).
    pub cut_depth: f64,
    /// Board-edge marking depth (negative).
    pub edge_cut_depth: f64,
    /// Safe travel height above the workpiece (positive).
    pub safe_height: f64,
    /// Horizontal feed rate.
    pub feed_rate: f64,
    /// Plunge feed rate.
    pub plunge_feed_rate: f64,
    /// Drill-cycle retract plane above the workpiece.
    pub hole_start: f64,
    /// Drill-cycle bottom depth (negative, through the board).
    pub hole_depth: f64,
    /// Spindle spin-up dwell after the on-edge, in seconds.
    pub spindle_warmup: f64,
}

impl Default for MillingParams {
    fn default() -> Self {
        Self {
            offset_distance: DEFAULT_OFFSET_DISTANCE,
            num_passes: DEFAULT_NUM_PASSES,
            pass_spacing: DEFAULT_PASS_SPACING,
            spindle_speed: DEFAULT_SPINDLE_SPEED,
            cut_depth: DEFAULT_CUT_DEPTH,
            edge_cut_depth: DEFAULT_EDGE_CUT_DEPTH,
            safe_height: DEFAULT_SAFE_HEIGHT,
            feed_rate: DEFAULT_FEED_RATE,
            plunge_feed_rate: DEFAULT_PLUNGE_FEED_RATE,
            hole_start: DEFAULT_HOLE_START,
            hole_depth: DEFAULT_HOLE_DEPTH,
            spindle_warmup: DEFAULT_SPINDLE_WARMUP,
        }
    }
}

impl MillingParams {
    /// Check every parameter against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidParameter`] naming the first
    /// out-of-range parameter.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.offset_distance.is_finite() || self.offset_distance < 0.0 {
            return Err(invalid("offset_distance", "must be non-negative", self.offset_distance));
        }
        if self.num_passes < 1 {
            return Err(PipelineError::InvalidParameter(
                "num_passes must be at least 1".to_string(),
            ));
        }
        if !self.pass_spacing.is_finite() || self.pass_spacing < 0.0 {
            return Err(invalid("pass_spacing", "must be non-negative", self.pass_spacing));
        }
        if !self.spindle_speed.is_finite() || self.spindle_speed <= 0.0 {
            return Err(invalid("spindle_speed", "must be positive", self.spindle_speed));
        }
        if !self.cut_depth.is_finite() || self.cut_depth >= 0.0 {
            return Err(invalid("cut_depth", "must be negative", self.cut_depth));
        }
        if !self.edge_cut_depth.is_finite() || self.edge_cut_depth >= 0.0 {
            return Err(invalid("edge_cut_depth", "must be negative", self.edge_cut_depth));
        }
        if !self.safe_height.is_finite() || self.safe_height <= 0.0 {
            return Err(invalid("safe_height", "must be positive", self.safe_height));
        }
        if !self.feed_rate.is_finite() || self.feed_rate <= 0.0 {
            return Err(invalid("feed_rate", "must be positive", self.feed_rate));
        }
        if !self.plunge_feed_rate.is_finite() || self.plunge_feed_rate <= 0.0 {
            return Err(invalid("plunge_feed_rate", "must be positive", self.plunge_feed_rate));
        }
        if !self.hole_start.is_finite() || self.hole_start < 0.0 {
            return Err(invalid("hole_start", "must be non-negative", self.hole_start));
        }
        if !self.hole_depth.is_finite() || self.hole_depth >= 0.0 {
            return Err(invalid("hole_depth", "must be negative", self.hole_depth));
        }
        if !self.spindle_warmup.is_finite() || self.spindle_warmup < 0.0 {
            return Err(invalid("spindle_warmup", "must be non-negative", self.spindle_warmup));
        }
        Ok(())
    }

    /// Offset distance for pass `index`.
    #[must_use]
    pub fn pass_offset(&self, index: u32) -> f64 {
        f64::from(index).mul_add(self.pass_spacing, self.offset_distance)
    }
}

fn invalid(name: &str, constraint: &str, value: f64) -> PipelineError {
    PipelineError::InvalidParameter(format!("{name} {constraint}, got {value}"))
}
