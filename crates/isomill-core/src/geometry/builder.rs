//! Region construction: copper union and outline loop chaining.

use gerber_types::Aperture;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::gerber::{GerberLayer, Primitive};
use crate::planar;

use super::shapes::{
    arc_centerline, arc_stroke_outlines, flash_outline, stroke_outline,
    OUTLINE_ARC_SEGMENT_LENGTH,
};
use super::types::{Outline, Point, Region, Ring};

/// Max endpoint mismatch for an outline loop to count as closed, in mm.
pub const OUTLINE_CLOSE_EPSILON: f64 = 0.01;

/// Build the copper region by unioning every primitive's boundary rings
/// in input order.
///
/// # Errors
///
/// Returns [`PipelineError::UnknownAperture`] for a primitive whose
/// aperture is missing from the table and
/// [`PipelineError::GeometryBuild`] when the union fails.
pub fn build_copper_region(layer: &GerberLayer) -> Result<Region, PipelineError> {
    let mut warnings = Vec::new();
    let mut rings = Vec::new();

    for primitive in &layer.primitives {
        match primitive {
            Primitive::Draw { from, to, aperture } => {
                let aperture = lookup_aperture(layer, *aperture)?;
                if let Some(ring) = stroke_outline(*from, *to, aperture, &mut warnings)? {
                    rings.push(ring);
                }
            }
            Primitive::Arc {
                from,
                to,
                center_offset,
                direction,
                aperture,
            } => {
                let aperture = lookup_aperture(layer, *aperture)?;
                rings.extend(arc_stroke_outlines(
                    *from,
                    *to,
                    *center_offset,
                    *direction,
                    aperture,
                    &mut warnings,
                )?);
            }
            Primitive::Flash { at, aperture } => {
                let aperture = lookup_aperture(layer, *aperture)?;
                if let Some(ring) = flash_outline(aperture, *at, &mut warnings)? {
                    rings.push(ring);
                }
            }
        }
    }

    for warning in &warnings {
        warn!("{warning}");
    }

    let shape_count = rings.len();
    let region = planar::union_all(rings)?;
    debug!(
        shapes = shape_count,
        islands = region.islands.len(),
        "copper region built"
    );
    Ok(region)
}

fn lookup_aperture(layer: &GerberLayer, code: i32) -> Result<&Aperture, PipelineError> {
    layer.apertures.get(&code).ok_or_else(|| {
        PipelineError::UnknownAperture(format!("aperture D{code} is not defined"))
    })
}

/// Chain outline draws and arcs into closed loops.
///
/// A new loop starts wherever continuity breaks; every loop must close
/// within [`OUTLINE_CLOSE_EPSILON`].
///
/// # Errors
///
/// Returns [`PipelineError::OpenOutline`] when a loop's endpoints do not
/// meet within tolerance or a loop degenerates below three points.
pub fn build_outline(layer: &GerberLayer) -> Result<Outline, PipelineError> {
    let mut warnings = Vec::new();
    let mut loops = Vec::new();
    let mut current: Vec<Point> = Vec::new();

    for primitive in &layer.primitives {
        let segment = match primitive {
            Primitive::Draw { from, to, .. } => vec![*from, *to],
            Primitive::Arc {
                from,
                to,
                center_offset,
                direction,
                ..
            } => {
                match arc_centerline(
                    *from,
                    *to,
                    *center_offset,
                    *direction,
                    OUTLINE_ARC_SEGMENT_LENGTH,
                    &mut warnings,
                ) {
                    Some(points) => points,
                    None => continue,
                }
            }
            Primitive::Flash { .. } => {
                warnings.push("flash on outline layer ignored".to_string());
                continue;
            }
        };

        let Some(first) = segment.first().copied() else {
            continue;
        };
        if let Some(last) = current.last().copied() {
            if last.distance(first) > OUTLINE_CLOSE_EPSILON {
                close_loop(&mut loops, std::mem::take(&mut current))?;
            }
        }
        if current.is_empty() {
            current.push(first);
        }
        current.extend(segment.iter().skip(1).copied());
    }

    if !current.is_empty() {
        close_loop(&mut loops, current)?;
    }

    for warning in &warnings {
        warn!("{warning}");
    }
    debug!(loops = loops.len(), "board outline built");
    Ok(Outline { loops })
}

fn close_loop(loops: &mut Vec<Ring>, mut points: Vec<Point>) -> Result<(), PipelineError> {
    let (Some(first), Some(last)) = (points.first().copied(), points.last().copied()) else {
        return Ok(());
    };
    let gap = first.distance(last);
    if gap > OUTLINE_CLOSE_EPSILON {
        return Err(PipelineError::OpenOutline(format!(
            "outline loop does not close: endpoint gap of {gap:.3} mm"
        )));
    }
    if points.len() > 1 {
        points.pop();
    }
    if points.len() < 3 {
        return Err(PipelineError::OpenOutline(format!(
            "outline loop has only {} distinct points",
            points.len()
        )));
    }
    loops.push(Ring::new(points));
    Ok(())
}
