//! Boundary-ring expansion for draws, arcs, and flashes.
//!
//! Every primitive contributes one or more closed rings describing the
//! copper it deposits; the builder unions them into the copper region.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use gerber_types::{Aperture, Polygon, Rectangular};

use crate::error::PipelineError;
use crate::gerber::ArcDirection;

use super::types::{Point, Ring};

const CIRCLE_SEGMENTS: u32 = 32;
const ENDCAP_SEGMENTS: u32 = 16;
const MIN_ARC_SEGMENTS: u32 = 16;
const MIN_SEGMENT_LENGTH_FLOOR: f64 = 0.01;
const RADIUS_MISMATCH_TOLERANCE: f64 = 1e-4;
const POINT_EQUALITY_EPSILON: f64 = 1e-9;

/// Max segment length when tessellating outline arcs, where no stroke
/// width is available to derive segment density.
pub(crate) const OUTLINE_ARC_SEGMENT_LENGTH: f64 = 0.1;

/// Expand a flashed aperture at `position` into its boundary ring.
///
/// Zero or negative dimensions degrade to a warning and no ring.
///
/// # Errors
///
/// Returns an error for non-finite dimensions, invalid polygon vertex
/// counts, and macro apertures.
pub fn flash_outline(
    aperture: &Aperture,
    position: Point,
    warnings: &mut Vec<String>,
) -> Result<Option<Ring>, PipelineError> {
    match aperture {
        Aperture::Circle(circle) => {
            let Some(diameter) = normalize_dimension(warnings, circle.diameter, "circle diameter")?
            else {
                return Ok(None);
            };
            Ok(Some(ngon_ring(
                position,
                diameter / 2.0,
                CIRCLE_SEGMENTS,
                0.0,
            )))
        }
        Aperture::Rectangle(rectangle) => {
            let Some((width, height)) = normalize_rect(warnings, rectangle, "rectangle")? else {
                return Ok(None);
            };
            Ok(Some(rect_ring(position, width, height)))
        }
        Aperture::Obround(obround) => {
            let Some((width, height)) = normalize_rect(warnings, obround, "obround")? else {
                return Ok(None);
            };
            Ok(Some(obround_ring(position, width, height)))
        }
        Aperture::Polygon(polygon) => flash_polygon(polygon, position, warnings),
        Aperture::Macro(name, _) => Err(PipelineError::UnsupportedFeature(format!(
            "macro aperture `{name}` cannot be flashed"
        ))),
    }
}

fn flash_polygon(
    polygon: &Polygon,
    position: Point,
    warnings: &mut Vec<String>,
) -> Result<Option<Ring>, PipelineError> {
    let Some(diameter) = normalize_dimension(warnings, polygon.diameter, "polygon diameter")?
    else {
        return Ok(None);
    };
    if polygon.vertices < 3 {
        return Err(PipelineError::GeometryBuild(format!(
            "polygon aperture has {} vertices; need at least 3",
            polygon.vertices
        )));
    }
    let rotation_degrees = polygon.rotation.unwrap_or(0.0);
    if !rotation_degrees.is_finite() {
        return Err(PipelineError::GeometryBuild(format!(
            "polygon rotation must be finite, got {rotation_degrees}"
        )));
    }
    Ok(Some(ngon_ring(
        position,
        diameter / 2.0,
        u32::from(polygon.vertices),
        rotation_degrees.to_radians(),
    )))
}

/// Expand a linear draw into its stroked boundary ring.
///
/// Circular apertures produce a stadium (rounded end caps); rect-like
/// apertures produce a plain quad with square end caps. Zero-length
/// circular draws degrade to a flash.
///
/// # Errors
///
/// Returns an error for invalid aperture parameters or macro apertures.
pub fn stroke_outline(
    from: Point,
    to: Point,
    aperture: &Aperture,
    warnings: &mut Vec<String>,
) -> Result<Option<Ring>, PipelineError> {
    let Some(width) = resolve_stroke_width(warnings, aperture)? else {
        return Ok(None);
    };

    let delta_x = to.x - from.x;
    let delta_y = to.y - from.y;
    let length_sq = delta_x.mul_add(delta_x, delta_y * delta_y);
    if length_sq <= f64::EPSILON {
        if matches!(aperture, Aperture::Circle(_)) {
            return flash_outline(aperture, from, warnings);
        }
        warnings.push("zero-length draw with non-circular aperture; skipping".to_string());
        return Ok(None);
    }

    let half_width = width / 2.0;
    if matches!(aperture, Aperture::Circle(_)) {
        return Ok(Some(stadium_ring(from, to, half_width)));
    }

    let inverse_length = 1.0 / length_sq.sqrt();
    let normal_x = -delta_y * inverse_length;
    let normal_y = delta_x * inverse_length;

    let start_left = Point::new(
        normal_x.mul_add(half_width, from.x),
        normal_y.mul_add(half_width, from.y),
    );
    let start_right = Point::new(
        (-normal_x).mul_add(half_width, from.x),
        (-normal_y).mul_add(half_width, from.y),
    );
    let end_right = Point::new(
        (-normal_x).mul_add(half_width, to.x),
        (-normal_y).mul_add(half_width, to.y),
    );
    let end_left = Point::new(
        normal_x.mul_add(half_width, to.x),
        normal_y.mul_add(half_width, to.y),
    );

    Ok(Some(Ring::new(vec![
        start_left,
        start_right,
        end_right,
        end_left,
    ])))
}

/// Expand an arc draw into stroked boundary rings, one per tessellated
/// centerline segment.
///
/// # Errors
///
/// Returns an error for invalid aperture parameters or macro apertures.
pub fn arc_stroke_outlines(
    from: Point,
    to: Point,
    center_offset: Point,
    direction: ArcDirection,
    aperture: &Aperture,
    warnings: &mut Vec<String>,
) -> Result<Vec<Ring>, PipelineError> {
    let Some(width) = resolve_stroke_width(warnings, aperture)? else {
        return Ok(Vec::new());
    };

    let max_segment = (width * 0.25).max(MIN_SEGMENT_LENGTH_FLOOR);
    let Some(points) = arc_centerline(from, to, center_offset, direction, max_segment, warnings)
    else {
        return Ok(Vec::new());
    };

    let mut rings = Vec::new();
    let mut iter = points.iter().copied();
    let Some(mut previous) = iter.next() else {
        return Ok(rings);
    };
    for current in iter {
        if let Some(ring) = stroke_outline(previous, current, aperture, warnings)? {
            rings.push(ring);
        }
        previous = current;
    }
    Ok(rings)
}

/// Tessellate an arc into centerline points.
///
/// Handles full circles (start equals end with a non-zero center offset)
/// and averages mismatched start/end radii with a warning. Returns `None`
/// for degenerate arcs.
pub(crate) fn arc_centerline(
    from: Point,
    to: Point,
    center_offset: Point,
    direction: ArcDirection,
    max_segment_length: f64,
    warnings: &mut Vec<String>,
) -> Option<Vec<Point>> {
    let center = Point::new(from.x + center_offset.x, from.y + center_offset.y);

    let radius_start = from.distance(center);
    if radius_start <= f64::EPSILON {
        warnings.push("arc has zero radius; skipping arc".to_string());
        return None;
    }

    let start_angle = (from.y - center.y).atan2(from.x - center.x);
    let (radius, sweep) = if points_approx_equal(from, to) {
        if center_offset.x.abs() <= POINT_EQUALITY_EPSILON
            && center_offset.y.abs() <= POINT_EQUALITY_EPSILON
        {
            warnings.push("arc start equals end with zero center offset; skipping arc".to_string());
            return None;
        }
        let full_sweep = match direction {
            ArcDirection::Clockwise => -TAU,
            ArcDirection::CounterClockwise => TAU,
        };
        (radius_start, full_sweep)
    } else {
        let radius_end = to.distance(center);
        let radius = if (radius_start - radius_end).abs() > RADIUS_MISMATCH_TOLERANCE {
            warnings.push(format!(
                "arc radii mismatch ({radius_start} vs {radius_end}); using average radius"
            ));
            (radius_start + radius_end) / 2.0
        } else {
            radius_start
        };
        if radius <= f64::EPSILON {
            warnings.push("arc has near-zero resolved radius; skipping arc".to_string());
            return None;
        }
        let end_angle = (to.y - center.y).atan2(to.x - center.x);
        (radius, compute_sweep(start_angle, end_angle, direction))
    };

    let arc_length = sweep.abs() * radius;
    let segments = segment_count_for_arc(arc_length, max_segment_length);
    let segment_count = segments.max(1);
    let mut points = Vec::new();
    for step in 0..=segment_count {
        let t = f64::from(step) / f64::from(segment_count);
        let angle = sweep.mul_add(t, start_angle);
        points.push(Point::new(
            radius.mul_add(angle.cos(), center.x),
            radius.mul_add(angle.sin(), center.y),
        ));
    }
    Some(points)
}

fn compute_sweep(start_angle: f64, end_angle: f64, direction: ArcDirection) -> f64 {
    let delta = end_angle - start_angle;
    match direction {
        ArcDirection::Clockwise => {
            if delta >= 0.0 {
                delta - TAU
            } else {
                delta
            }
        }
        ArcDirection::CounterClockwise => {
            if delta <= 0.0 {
                delta + TAU
            } else {
                delta
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn segment_count_for_arc(arc_length: f64, max_segment_length: f64) -> u32 {
    let raw = (arc_length / max_segment_length).ceil();
    if !raw.is_finite() || raw <= 0.0 {
        return MIN_ARC_SEGMENTS;
    }
    (raw as u32).max(MIN_ARC_SEGMENTS)
}

fn resolve_stroke_width(
    warnings: &mut Vec<String>,
    aperture: &Aperture,
) -> Result<Option<f64>, PipelineError> {
    match aperture {
        Aperture::Circle(circle) => normalize_dimension(warnings, circle.diameter, "circle diameter"),
        Aperture::Rectangle(rectangle) => {
            Ok(normalize_rect(warnings, rectangle, "rectangle")?
                .map(|(width, height)| width.min(height)))
        }
        Aperture::Obround(obround) => Ok(normalize_rect(warnings, obround, "obround")?
            .map(|(width, height)| width.min(height))),
        Aperture::Polygon(polygon) => {
            if polygon.vertices < 3 {
                return Err(PipelineError::GeometryBuild(format!(
                    "polygon aperture has {} vertices; need at least 3",
                    polygon.vertices
                )));
            }
            normalize_dimension(warnings, polygon.diameter, "polygon diameter")
        }
        Aperture::Macro(name, _) => Err(PipelineError::UnsupportedFeature(format!(
            "macro aperture `{name}` cannot stroke a draw"
        ))),
    }
}

fn normalize_rect(
    warnings: &mut Vec<String>,
    dimensions: &Rectangular,
    shape_name: &str,
) -> Result<Option<(f64, f64)>, PipelineError> {
    let width_label = format!("{shape_name} width");
    let height_label = format!("{shape_name} height");
    let Some(width) = normalize_dimension(warnings, dimensions.x, &width_label)? else {
        return Ok(None);
    };
    let Some(height) = normalize_dimension(warnings, dimensions.y, &height_label)? else {
        return Ok(None);
    };
    Ok(Some((width, height)))
}

fn normalize_dimension(
    warnings: &mut Vec<String>,
    value: f64,
    label: &str,
) -> Result<Option<f64>, PipelineError> {
    if !value.is_finite() {
        return Err(PipelineError::GeometryBuild(format!(
            "{label} must be finite, got {value}"
        )));
    }
    let mut normalized = value;
    if normalized < 0.0 {
        warnings.push(format!("{label} is negative ({normalized}); using absolute value"));
        normalized = normalized.abs();
    }
    if normalized <= f64::EPSILON {
        warnings.push(format!("{label} is zero; skipping"));
        return Ok(None);
    }
    Ok(Some(normalized))
}

fn points_approx_equal(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() <= POINT_EQUALITY_EPSILON && (a.y - b.y).abs() <= POINT_EQUALITY_EPSILON
}

/// Regular n-gon boundary, counter-clockwise from `rotation`.
fn ngon_ring(center: Point, radius: f64, sides: u32, rotation: f64) -> Ring {
    let mut points = Vec::new();
    for index in 0..sides.max(3) {
        let angle = (TAU * f64::from(index) / f64::from(sides.max(3))) + rotation;
        points.push(Point::new(
            radius.mul_add(angle.cos(), center.x),
            radius.mul_add(angle.sin(), center.y),
        ));
    }
    Ring::new(points)
}

/// Axis-aligned centered rectangle boundary, counter-clockwise.
fn rect_ring(center: Point, width: f64, height: f64) -> Ring {
    let half_width = width / 2.0;
    let half_height = height / 2.0;
    Ring::new(vec![
        Point::new(center.x - half_width, center.y - half_height),
        Point::new(center.x + half_width, center.y - half_height),
        Point::new(center.x + half_width, center.y + half_height),
        Point::new(center.x - half_width, center.y + half_height),
    ])
}

/// Obround boundary: a circle when square, otherwise a stadium along the
/// longer axis.
fn obround_ring(center: Point, width: f64, height: f64) -> Ring {
    if (width - height).abs() <= f64::EPSILON {
        return ngon_ring(center, width / 2.0, CIRCLE_SEGMENTS, 0.0);
    }
    if width > height {
        let half_body = (width - height) / 2.0;
        stadium_ring(
            Point::new(center.x - half_body, center.y),
            Point::new(center.x + half_body, center.y),
            height / 2.0,
        )
    } else {
        let half_body = (height - width) / 2.0;
        stadium_ring(
            Point::new(center.x, center.y - half_body),
            Point::new(center.x, center.y + half_body),
            width / 2.0,
        )
    }
}

/// Stadium (capsule) boundary around the segment `from`..`to`.
fn stadium_ring(from: Point, to: Point, radius: f64) -> Ring {
    let angle = (to.y - from.y).atan2(to.x - from.x);
    let mut points = Vec::new();
    push_arc_points(
        &mut points,
        to,
        radius,
        angle - FRAC_PI_2,
        angle + FRAC_PI_2,
        ENDCAP_SEGMENTS,
    );
    push_arc_points(
        &mut points,
        from,
        radius,
        angle + FRAC_PI_2,
        angle + PI + FRAC_PI_2,
        ENDCAP_SEGMENTS,
    );
    Ring::new(points)
}

fn push_arc_points(
    points: &mut Vec<Point>,
    center: Point,
    radius: f64,
    start_angle: f64,
    end_angle: f64,
    segments: u32,
) {
    let segment_count = segments.max(1);
    let step = (end_angle - start_angle) / f64::from(segment_count);
    for index in 0..=segment_count {
        let angle = step.mul_add(f64::from(index), start_angle);
        points.push(Point::new(
            radius.mul_add(angle.cos(), center.x),
            radius.mul_add(angle.sin(), center.y),
        ));
    }
}
