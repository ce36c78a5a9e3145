//! Error types for the milling pipeline.

use thiserror::Error;

/// Errors surfaced by the parsing, geometry, toolpath, and emission stages.
///
/// Every variant is fatal for the stage that raises it: the pipeline aborts
/// with the specific failure and no partial motion program is produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A select, draw, or flash referenced an aperture index with no definition.
    #[error("unknown aperture: {0}")]
    UnknownAperture(String),

    /// A drill record referenced a tool code with no definition.
    #[error("unknown drill tool: {0}")]
    UnknownTool(String),

    /// The input uses a format or geometry feature this pipeline does not implement.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// A board outline loop failed to close within tolerance.
    #[error("open outline: {0}")]
    OpenOutline(String),

    /// A boolean union or offset failed to produce valid geometry.
    #[error("geometry build error: {0}")]
    GeometryBuild(String),

    /// The copper region is unusable for toolpath generation.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The input text could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// A milling parameter is outside its valid range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
