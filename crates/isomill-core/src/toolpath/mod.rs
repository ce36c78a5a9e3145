//! Isolation toolpath generation: concentric outward offsets of the
//! copper region.

use serde::Serialize;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::geometry::{Point, Region};
use crate::params::MillingParams;
use crate::planar;

const MIN_COPPER_AREA: f64 = 1e-6;

/// One continuous isolation cut at a fixed offset distance.
///
/// Created by [`generate`], consumed once by the motion emitter, never
/// mutated afterward.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contour {
    /// Cut vertices in traversal order.
    pub points: Vec<Point>,
    /// True when the last vertex connects back to the first.
    pub closed: bool,
}

/// All contours cut at one offset distance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolpathPass {
    /// Pass index, starting at zero next to the copper.
    pub index: u32,
    /// Offset distance from the copper boundary.
    pub offset: f64,
    /// Contours in island discovery order: each island's outer boundary,
    /// then that island's hole cuts.
    pub contours: Vec<Contour>,
}

/// Ordered passes, nearest to the copper first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toolpath {
    /// Passes in cutting order.
    pub passes: Vec<ToolpathPass>,
}

impl Toolpath {
    /// Total number of contours across all passes.
    #[must_use]
    pub fn contour_count(&self) -> usize {
        self.passes.iter().map(|pass| pass.contours.len()).sum()
    }
}

/// Generate the isolation toolpath for a copper region.
///
/// Pass `i` offsets the copper boundary outward by
/// `offset_distance + i * pass_spacing`. Disjoint islands produce
/// independent contours; islands whose offset boundaries collide are
/// re-unioned within the pass, so no pass emits self-intersecting output.
/// Island order within a pass follows the region's discovery order and is
/// never re-sorted.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateGeometry`] for an empty or
/// near-zero-area region and rings below three points,
/// [`PipelineError::InvalidParameter`] for out-of-range offset
/// parameters, and [`PipelineError::GeometryBuild`] when offsetting
/// fails.
pub fn generate(region: &Region, params: &MillingParams) -> Result<Toolpath, PipelineError> {
    if params.num_passes < 1 {
        return Err(PipelineError::InvalidParameter(
            "num_passes must be at least 1".to_string(),
        ));
    }
    if region.is_empty() {
        return Err(PipelineError::DegenerateGeometry(
            "copper region is empty".to_string(),
        ));
    }
    for ring in region.rings() {
        if ring.points.len() < 3 {
            return Err(PipelineError::DegenerateGeometry(format!(
                "copper boundary ring has only {} points",
                ring.points.len()
            )));
        }
    }
    if region.total_area() < MIN_COPPER_AREA {
        return Err(PipelineError::DegenerateGeometry(
            "copper region has near-zero area".to_string(),
        ));
    }

    info!(
        passes = params.num_passes,
        offset = params.offset_distance,
        spacing = params.pass_spacing,
        "generating isolation toolpath"
    );

    let mut passes = Vec::with_capacity(usize::try_from(params.num_passes).unwrap_or_default());
    for index in 0..params.num_passes {
        let offset = params.pass_offset(index);
        let shifted = planar::offset(region, offset)?;

        let mut contours = Vec::new();
        for island in &shifted.islands {
            contours.push(Contour {
                points: island.outer.points.clone(),
                closed: true,
            });
            for hole in &island.holes {
                contours.push(Contour {
                    points: hole.points.clone(),
                    closed: true,
                });
            }
        }
        debug!(pass = index, contours = contours.len(), "pass complete");
        passes.push(ToolpathPass {
            index,
            offset,
            contours,
        });
    }

    Ok(Toolpath { passes })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use crate::geometry::Ring;
    use crate::planar::union_all;

    use super::*;

    fn square_region(min_x: f64, min_y: f64, size: f64) -> Region {
        region_of(vec![square(min_x, min_y, size)])
    }

    fn square(min_x: f64, min_y: f64, size: f64) -> Ring {
        Ring::new(vec![
            Point::new(min_x, min_y),
            Point::new(min_x + size, min_y),
            Point::new(min_x + size, min_y + size),
            Point::new(min_x, min_y + size),
        ])
    }

    fn region_of(rings: Vec<Ring>) -> Region {
        match union_all(rings) {
            Ok(region) => region,
            Err(err) => panic!("expected union to succeed, got {err}"),
        }
    }

    fn generate_ok(region: &Region, params: &MillingParams) -> Toolpath {
        match generate(region, params) {
            Ok(toolpath) => toolpath,
            Err(err) => panic!("expected toolpath generation to succeed, got {err}"),
        }
    }

    #[test]
    fn ut_tps_001_pass_offsets_step_from_the_initial_distance() {
        let region = square_region(0.0, 0.0, 10.0);
        let params = MillingParams {
            offset_distance: 0.22,
            num_passes: 3,
            pass_spacing: 0.2,
            ..MillingParams::default()
        };
        let toolpath = generate_ok(&region, &params);
        assert_eq!(toolpath.passes.len(), 3);

        let offsets: Vec<f64> = toolpath.passes.iter().map(|pass| pass.offset).collect();
        assert!((offsets.first().copied().unwrap_or(0.0) - 0.22).abs() < 1e-12);
        assert!((offsets.get(1).copied().unwrap_or(0.0) - 0.42).abs() < 1e-12);
        assert!((offsets.get(2).copied().unwrap_or(0.0) - 0.62).abs() < 1e-12);
    }

    #[test]
    fn ut_tps_002_later_passes_strictly_enclose_earlier_passes() {
        let region = square_region(0.0, 0.0, 10.0);
        let params = MillingParams {
            num_passes: 3,
            ..MillingParams::default()
        };
        let toolpath = generate_ok(&region, &params);

        for window in toolpath.passes.windows(2) {
            let (Some(inner), Some(outer)) = (window.first(), window.last()) else {
                panic!("expected a pass pair");
            };
            let Some(outer_contour) = outer.contours.first() else {
                panic!("outer pass has no contour");
            };
            let outer_ring = Ring::new(outer_contour.points.clone());
            for contour in &inner.contours {
                for point in &contour.points {
                    assert!(
                        outer_ring.contains_point(*point),
                        "pass {} must enclose pass {}",
                        outer.index,
                        inner.index
                    );
                }
            }
        }
    }

    #[test]
    fn ut_tps_003_islands_separate_early_and_merge_when_offsets_collide() {
        let region = region_of(vec![square(0.0, 0.0, 2.0), square(3.0, 0.0, 2.0)]);
        let params = MillingParams {
            offset_distance: 0.22,
            num_passes: 2,
            pass_spacing: 0.4,
            ..MillingParams::default()
        };
        let toolpath = generate_ok(&region, &params);

        let Some(first_pass) = toolpath.passes.first() else {
            panic!("expected two passes");
        };
        let Some(second_pass) = toolpath.passes.last() else {
            panic!("expected two passes");
        };
        assert_eq!(
            first_pass.contours.len(),
            2,
            "0.44 mm of combined growth must not bridge the 1 mm gap"
        );
        assert_eq!(
            second_pass.contours.len(),
            1,
            "1.24 mm of combined growth must merge the islands"
        );
    }

    #[test]
    fn ut_tps_004_all_contours_are_closed() {
        let region = square_region(0.0, 0.0, 5.0);
        let toolpath = generate_ok(&region, &MillingParams::default());
        for pass in &toolpath.passes {
            for contour in &pass.contours {
                assert!(contour.closed);
                assert!(contour.points.len() >= 3);
            }
        }
    }

    #[test]
    fn bc_tps_001_empty_region_is_degenerate() {
        let result = generate(&Region::default(), &MillingParams::default());
        assert!(matches!(result, Err(PipelineError::DegenerateGeometry(_))));
    }

    #[test]
    fn bc_tps_002_zero_pass_count_is_rejected() {
        let region = square_region(0.0, 0.0, 5.0);
        let params = MillingParams {
            num_passes: 0,
            ..MillingParams::default()
        };
        let result = generate(&region, &params);
        assert!(matches!(result, Err(PipelineError::InvalidParameter(_))));
    }
}
