#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::indexing_slicing)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `isomill` core — photoplotter fabrication files in, isolation-milling
//! motion program out.
//!
//! The pipeline runs in four owned stages: format parsers decode the
//! copper layer, board outline, and drill list; the geometry builder
//! unions primitives into planar regions; the toolpath generator offsets
//! the copper boundary once per pass; the motion emitter turns contours
//! and holes into an ordered command program. Each stage consumes
//! immutable input and fully materializes its output before the next
//! stage starts.

pub mod error;
pub mod excellon;
pub mod gerber;
pub mod geometry;
pub mod motion;
pub mod params;
pub mod planar;
pub mod toolpath;

use tracing::info;

use crate::excellon::{DrillFile, DrillHole};
use crate::geometry::{Outline, Region};
use crate::motion::MotionProgram;
use crate::toolpath::Toolpath;

pub use crate::error::PipelineError;
pub use crate::params::MillingParams;

/// Raw file contents for one board, read by the caller before the
/// pipeline runs.
#[derive(Debug, Clone, Copy)]
pub struct BoardInput<'a> {
    /// Copper-layer vector text.
    pub copper: &'a str,
    /// Board-outline vector text, when present.
    pub outline: Option<&'a str>,
    /// Drill-list text, when present.
    pub drill: Option<&'a str>,
}

/// Everything the pipeline produces for one board.
///
/// `copper`, `outline`, and `toolpath` are plain vertex-list data for the
/// preview collaborator; `program` renders the output file.
#[derive(Debug, Clone)]
pub struct BoardPlan {
    /// Unioned copper region.
    pub copper: Region,
    /// Board edge loops.
    pub outline: Outline,
    /// Drill holes in input order.
    pub holes: Vec<DrillHole>,
    /// Isolation passes.
    pub toolpath: Toolpath,
    /// The finished motion program.
    pub program: MotionProgram,
}

/// Run the full pipeline: parse, build geometry, offset, emit.
///
/// No output is produced unless every stage succeeds; a failing stage
/// aborts the run with its specific error.
///
/// # Errors
///
/// Propagates the failing stage's error: [`PipelineError::Parse`],
/// [`PipelineError::UnknownAperture`], [`PipelineError::UnknownTool`],
/// [`PipelineError::UnsupportedFeature`], [`PipelineError::OpenOutline`],
/// [`PipelineError::GeometryBuild`],
/// [`PipelineError::DegenerateGeometry`], or
/// [`PipelineError::InvalidParameter`].
pub fn plan_board(
    input: &BoardInput<'_>,
    params: &MillingParams,
) -> Result<BoardPlan, PipelineError> {
    params.validate()?;

    let copper_layer = gerber::parser::parse(input.copper.as_bytes())?;
    info!(
        apertures = copper_layer.apertures.len(),
        primitives = copper_layer.primitives.len(),
        warnings = copper_layer.warnings.len(),
        "copper layer parsed"
    );

    let outline_layer = match input.outline {
        Some(text) => Some(gerber::parser::parse(text.as_bytes())?),
        None => None,
    };

    let drill = match input.drill {
        Some(text) => excellon::parser::parse(text.as_bytes())?,
        None => DrillFile::default(),
    };

    let copper = geometry::builder::build_copper_region(&copper_layer)?;
    let outline = match &outline_layer {
        Some(layer) => geometry::builder::build_outline(layer)?,
        None => Outline::default(),
    };

    let toolpath = toolpath::generate(&copper, params)?;
    let program = motion::emit(&toolpath, &outline, &drill.holes, params)?;

    info!(
        islands = copper.islands.len(),
        contours = toolpath.contour_count(),
        holes = drill.holes.len(),
        commands = program.commands().len(),
        "motion program emitted"
    );

    Ok(BoardPlan {
        copper,
        outline,
        holes: drill.holes,
        toolpath,
        program,
    })
}
