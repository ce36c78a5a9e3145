//! Boolean union and outward offsetting of planar regions.
//!
//! This is the only module that touches the polygon arithmetic library;
//! the rest of the pipeline sees `union`/`offset` over [`Region`] values.
//! All rings are normalized counter-clockwise and the outer/hole role is
//! tracked structurally. Offsetting produces round (arc) joins, flattened
//! to polylines at no more than [`ARC_FLATTEN_STEP`] radians per segment.

use std::panic::{catch_unwind, AssertUnwindSafe};

use cavalier_contours::polyline::{
    BooleanOp, PlineSource, PlineSourceMut, PlineVertex, Polyline,
};

use crate::error::PipelineError;
use crate::geometry::{Island, Point, Region, Ring};

const POSITION_EQUALITY_EPSILON: f64 = 1e-5;
const MIN_RING_AREA: f64 = 1e-6;
const ARC_FLATTEN_STEP: f64 = 5.0 * std::f64::consts::PI / 180.0;
const BULGE_EPSILON: f64 = 1e-9;
const TAU: f64 = std::f64::consts::TAU;

/// Union an ordered sequence of boundary rings into a region.
///
/// Rings are folded in input order, so identical input always produces an
/// identical region. Rings that collapse below the minimum area are
/// dropped.
///
/// # Errors
///
/// Returns [`PipelineError::GeometryBuild`] when a boolean operation
/// fails or panics inside the polygon arithmetic.
pub fn union_all<I>(rings: I) -> Result<Region, PipelineError>
where
    I: IntoIterator<Item = Ring>,
{
    let mut islands = Vec::new();
    for ring in rings {
        merge_island(
            &mut islands,
            Island {
                outer: ring,
                holes: Vec::new(),
            },
        )?;
    }
    Ok(Region { islands })
}

/// Union two regions island by island.
///
/// # Errors
///
/// Returns [`PipelineError::GeometryBuild`] when a boolean operation
/// fails or panics inside the polygon arithmetic.
pub fn union(a: &Region, b: &Region) -> Result<Region, PipelineError> {
    let mut islands = a.islands.clone();
    for island in &b.islands {
        merge_island(&mut islands, island.clone())?;
    }
    Ok(Region { islands })
}

/// Outward-offset a region by `distance`.
///
/// Island outers dilate by `distance`; holes shrink by `distance` and
/// vanish once too small. Dilated islands that collide are re-unioned so
/// the result never self-intersects.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] for negative distances and
/// [`PipelineError::GeometryBuild`] when the polygon arithmetic fails.
pub fn offset(region: &Region, distance: f64) -> Result<Region, PipelineError> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(PipelineError::InvalidParameter(format!(
            "offset distance must be non-negative and finite, got {distance}"
        )));
    }
    if distance == 0.0 {
        return Ok(region.clone());
    }

    let mut islands = Vec::new();
    for island in &region.islands {
        let outers = offset_ring(&island.outer, distance)?;
        let mut shrunk = Vec::new();
        for hole in &island.holes {
            shrunk.extend(offset_ring(hole, -distance)?);
        }

        let mut grown: Vec<Island> = outers
            .into_iter()
            .map(|outer| Island {
                outer,
                holes: Vec::new(),
            })
            .collect();
        for hole in shrunk {
            let Some(anchor) = hole.points.first().copied() else {
                continue;
            };
            if let Some(target) = grown
                .iter_mut()
                .find(|island| island.outer.contains_point(anchor))
            {
                target.holes.push(hole);
            }
        }

        for island in grown {
            merge_island(&mut islands, island)?;
        }
    }
    Ok(Region { islands })
}

/// Fold one island into the accumulated disjoint set.
///
/// Any existing island whose outer boundary joins the incoming one is
/// absorbed: outers are unioned, holes are re-parented and clipped by the
/// other side's outer, and enclosed gaps become new holes. The merged
/// island keeps the position of the earliest island it absorbed.
fn merge_island(islands: &mut Vec<Island>, incoming: Island) -> Result<(), PipelineError> {
    let outer = incoming.outer.into_ccw();
    if outer.area() < MIN_RING_AREA {
        return Ok(());
    }
    let mut merged = Island {
        outer,
        holes: normalize_holes(incoming.holes),
    };

    let mut retained = Vec::with_capacity(islands.len() + 1);
    let mut insert_at = None;

    for island in islands.drain(..) {
        if !merged
            .outer
            .bounds()
            .overlaps(&island.outer.bounds(), POSITION_EQUALITY_EPSILON)
        {
            retained.push(island);
            continue;
        }

        let mut joined = boolean(&merged.outer, &island.outer, BooleanOp::Or)?;
        let new_outer = if joined.pos.len() == 1 {
            joined.pos.pop()
        } else {
            resolve_containment(&merged.outer, &island.outer)
        };
        let Some(new_outer) = new_outer else {
            retained.push(island);
            continue;
        };

        let mut new_holes = Vec::new();
        for hole in island.holes {
            new_holes.extend(subtract_ring(&hole, &merged.outer)?);
        }
        for hole in merged.holes {
            new_holes.extend(subtract_ring(&hole, &island.outer)?);
        }
        new_holes.append(&mut joined.neg);
        if insert_at.is_none() {
            insert_at = Some(retained.len());
        }
        merged = Island {
            outer: new_outer,
            holes: new_holes,
        };
    }

    match insert_at {
        Some(index) => retained.insert(index, merged),
        None => retained.push(merged),
    }
    *islands = retained;
    Ok(())
}

fn normalize_holes(holes: Vec<Ring>) -> Vec<Ring> {
    holes
        .into_iter()
        .map(Ring::into_ccw)
        .filter(|ring| ring.area() >= MIN_RING_AREA)
        .collect()
}

/// Pick the covering ring when two rings never intersect: the larger one
/// wins if it contains the other's first vertex, otherwise the rings are
/// disjoint.
fn resolve_containment(a: &Ring, b: &Ring) -> Option<Ring> {
    let a_anchor = a.points.first().copied()?;
    let b_anchor = b.points.first().copied()?;
    if a.contains_point(b_anchor) && a.area() >= b.area() {
        return Some(a.clone());
    }
    if b.contains_point(a_anchor) && b.area() > a.area() {
        return Some(b.clone());
    }
    None
}

/// Remaining parts of `hole` after removing the area covered by `solid`.
fn subtract_ring(hole: &Ring, solid: &Ring) -> Result<Vec<Ring>, PipelineError> {
    if !hole.bounds().overlaps(&solid.bounds(), POSITION_EQUALITY_EPSILON) {
        return Ok(vec![hole.clone()]);
    }
    let out = boolean(hole, solid, BooleanOp::Not)?;
    if out.pos.is_empty() {
        if let Some(anchor) = hole.points.first().copied() {
            if !solid.contains_point(anchor) {
                // operands never intersected; the hole survives untouched
                return Ok(vec![hole.clone()]);
            }
        }
    }
    Ok(out.pos)
}

struct BoolRings {
    pos: Vec<Ring>,
    neg: Vec<Ring>,
}

/// Run one boolean operation between two rings, containing any panic from
/// the polygon arithmetic.
fn boolean(a: &Ring, b: &Ring, op: BooleanOp) -> Result<BoolRings, PipelineError> {
    let pline_a = ring_to_pline(a);
    let pline_b = ring_to_pline(b);
    if pline_a.vertex_count() < 3 || pline_b.vertex_count() < 3 {
        return Err(PipelineError::GeometryBuild(
            "boolean operand degenerated below three vertices".to_string(),
        ));
    }

    let result = catch_unwind(AssertUnwindSafe(|| pline_a.boolean(&pline_b, op))).map_err(
        |_| PipelineError::GeometryBuild("boolean operation panicked on degenerate input".to_string()),
    )?;

    Ok(BoolRings {
        pos: result
            .pos_plines
            .into_iter()
            .filter_map(|entry| finish_ring(&entry.pline))
            .collect(),
        neg: result
            .neg_plines
            .into_iter()
            .filter_map(|entry| finish_ring(&entry.pline))
            .collect(),
    })
}

/// Offset one counter-clockwise ring; `outward` is positive away from the
/// enclosed area and negative into it.
fn offset_ring(ring: &Ring, outward: f64) -> Result<Vec<Ring>, PipelineError> {
    let pline = ring_to_pline(ring);
    if pline.vertex_count() < 3 {
        return Ok(Vec::new());
    }

    // for a counter-clockwise polyline a positive library offset moves the
    // boundary inward, so outward growth negates the distance
    let results = catch_unwind(AssertUnwindSafe(|| pline.parallel_offset(-outward))).map_err(
        |_| PipelineError::GeometryBuild("parallel offset panicked on degenerate input".to_string()),
    )?;

    Ok(results.iter().filter_map(finish_ring).collect())
}

/// Flatten, orient, and area-filter one polyline result.
fn finish_ring(pline: &Polyline<f64>) -> Option<Ring> {
    let ring = flatten_pline(pline);
    if ring.area() < MIN_RING_AREA {
        return None;
    }
    Some(ring.into_ccw())
}

fn ring_to_pline(ring: &Ring) -> Polyline<f64> {
    let mut pline = Polyline::new();
    for point in &ring.points {
        pline.add_vertex(PlineVertex::new(point.x, point.y, 0.0));
    }
    pline.set_is_closed(true);
    pline.remove_repeat_pos(POSITION_EQUALITY_EPSILON);

    let count = pline.vertex_count();
    if count > 1 {
        if let (Some(first), Some(last)) = (pline.get(0), pline.get(count - 1)) {
            if (first.x - last.x).abs() < POSITION_EQUALITY_EPSILON
                && (first.y - last.y).abs() < POSITION_EQUALITY_EPSILON
            {
                pline.remove(count - 1);
            }
        }
    }
    pline
}

/// Convert a polyline back to a ring, linearizing bulge arcs.
fn flatten_pline(pline: &Polyline<f64>) -> Ring {
    let count = pline.vertex_count();
    let mut points = Vec::with_capacity(count);
    for index in 0..count {
        let vertex = pline.at(index);
        points.push(Point::new(vertex.x, vertex.y));
        if vertex.bulge.abs() > BULGE_EPSILON {
            let next = pline.at((index + 1) % count);
            append_arc_points(&mut points, vertex, next);
        }
    }
    Ring::new(points)
}

/// Linearize one bulge arc between two vertices, excluding both endpoints.
fn append_arc_points(points: &mut Vec<Point>, from: PlineVertex<f64>, to: PlineVertex<f64>) {
    let theta = 4.0 * from.bulge.atan();
    let chord_x = to.x - from.x;
    let chord_y = to.y - from.y;
    let chord = chord_x.mul_add(chord_x, chord_y * chord_y).sqrt();
    if chord < POSITION_EQUALITY_EPSILON {
        return;
    }

    let half_theta = theta / 2.0;
    let radius = (chord / (2.0 * half_theta.sin())).abs();
    // signed apothem puts the center on the far side once the sweep
    // exceeds a half turn
    let apothem = radius * half_theta.cos();
    let side = if from.bulge >= 0.0 { 1.0 } else { -1.0 };
    let mid_x = (from.x + to.x) / 2.0;
    let mid_y = (from.y + to.y) / 2.0;
    let normal_x = -chord_y / chord;
    let normal_y = chord_x / chord;
    let center_x = normal_x.mul_add(apothem * side, mid_x);
    let center_y = normal_y.mul_add(apothem * side, mid_y);

    let start_angle = (from.y - center_y).atan2(from.x - center_x);
    let mut end_angle = (to.y - center_y).atan2(to.x - center_x);
    if from.bulge > 0.0 {
        if end_angle <= start_angle {
            end_angle += TAU;
        }
    } else if end_angle >= start_angle {
        end_angle -= TAU;
    }

    let sweep = end_angle - start_angle;
    let steps = arc_steps(sweep);
    for step in 1..steps {
        let t = f64::from(step) / f64::from(steps);
        let angle = sweep.mul_add(t, start_angle);
        points.push(Point::new(
            radius.mul_add(angle.cos(), center_x),
            radius.mul_add(angle.sin(), center_y),
        ));
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn arc_steps(sweep: f64) -> u32 {
    let raw = (sweep.abs() / ARC_FLATTEN_STEP).ceil();
    if !raw.is_finite() || raw < 2.0 {
        2
    } else if raw > 720.0 {
        720
    } else {
        raw as u32
    }
}
