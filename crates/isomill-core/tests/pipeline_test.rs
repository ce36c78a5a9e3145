//! End-to-end pipeline scenarios.

#![allow(clippy::panic)]

use isomill_core::motion::MotionCommand;
use isomill_core::{plan_board, BoardInput, BoardPlan, MillingParams, PipelineError};

/// Two parallel traces, 0.25 mm wide, centerlines 1.0 mm apart.
const PARALLEL_TRACES: &str = "%FSLAX46Y46*%\n%MOMM*%\n%ADD10C,0.250000*%\nG01*\nD10*\nX0Y0D02*\nX10000000Y0D01*\nX0Y1000000D02*\nX10000000Y1000000D01*\nM02*\n";

/// One 4 x 3 mm rectangular pad at (5, 5).
const SINGLE_PAD: &str =
    "%FSLAX46Y46*%\n%MOMM*%\n%ADD11R,4.0X3.0*%\nD11*\nX5000000Y5000000D03*\nM02*\n";

/// One 0.8 mm hole at (5, 5).
const SINGLE_HOLE: &str = "M48\nMETRIC\nT1C0.8\n%\nT1\nX5.0Y5.0\nM30\n";

/// A 20 x 15 mm rectangular board outline.
const BOARD_OUTLINE: &str = "%FSLAX46Y46*%\n%MOMM*%\n%ADD10C,0.100000*%\nG01*\nD10*\nX0Y0D02*\nX20000000Y0D01*\nX20000000Y15000000D01*\nX0Y15000000D01*\nX0Y0D01*\nM02*\n";

fn plan_ok(input: &BoardInput<'_>, params: &MillingParams) -> BoardPlan {
    match plan_board(input, params) {
        Ok(plan) => plan,
        Err(err) => panic!("expected the pipeline to succeed, got {err}"),
    }
}

fn single_pass(offset_distance: f64) -> MillingParams {
    MillingParams {
        offset_distance,
        num_passes: 1,
        ..MillingParams::default()
    }
}

#[test]
fn separate_traces_get_separate_contours_at_a_small_offset() {
    let input = BoardInput {
        copper: PARALLEL_TRACES,
        outline: None,
        drill: None,
    };
    let plan = plan_ok(&input, &single_pass(0.22));
    assert_eq!(plan.copper.islands.len(), 2);
    assert_eq!(
        plan.toolpath.contour_count(),
        2,
        "0.22 mm offsets leave a 1 mm centerline gap uncrossed"
    );
}

#[test]
fn traces_merge_into_one_contour_once_offsets_overlap() {
    let input = BoardInput {
        copper: PARALLEL_TRACES,
        outline: None,
        drill: None,
    };
    let plan = plan_ok(&input, &single_pass(0.5));
    assert_eq!(
        plan.toolpath.contour_count(),
        1,
        "0.5 mm offsets overlap between the traces and must re-union"
    );
}

#[test]
fn pad_and_drill_program_has_one_spindle_pair_in_cutting_order() {
    let input = BoardInput {
        copper: SINGLE_PAD,
        outline: None,
        drill: Some(SINGLE_HOLE),
    };
    let plan = plan_ok(&input, &single_pass(0.22));
    assert_eq!(plan.holes.len(), 1);
    assert_eq!(plan.toolpath.contour_count(), 1);

    let mut kinds = Vec::new();
    for command in plan.program.commands() {
        let kind = match command {
            MotionCommand::Rapid { .. } => "rapid",
            MotionCommand::Feed { z: Some(_), .. } => "plunge",
            MotionCommand::Feed { .. } => "traverse",
            MotionCommand::SpindleOn { .. } => "spindle-on",
            MotionCommand::SpindleOff => "spindle-off",
            MotionCommand::Dwell { .. } => "dwell",
            MotionCommand::DrillCycle { .. } => "drill-cycle",
            MotionCommand::ProgramEnd => "program-end",
        };
        if kinds.last() != Some(&kind) {
            kinds.push(kind);
        }
    }
    assert_eq!(
        kinds,
        vec![
            "rapid",
            "spindle-on",
            "dwell",
            "plunge",
            "traverse",
            "rapid",
            "drill-cycle",
            "rapid",
            "spindle-off",
            "rapid",
            "program-end",
        ],
    );

    let on_edges = plan
        .program
        .commands()
        .iter()
        .filter(|command| matches!(command, MotionCommand::SpindleOn { .. }))
        .count();
    let off_edges = plan
        .program
        .commands()
        .iter()
        .filter(|command| matches!(command, MotionCommand::SpindleOff))
        .count();
    assert_eq!((on_edges, off_edges), (1, 1));
}

#[test]
fn rendered_program_carries_exact_offset_edge_coordinates() {
    let input = BoardInput {
        copper: SINGLE_PAD,
        outline: None,
        drill: None,
    };
    let plan = plan_ok(&input, &single_pass(0.22));
    let text = plan.program.render();

    // pad edges are at x = 3/7 and y = 3.5/6.5; a 0.22 mm offset moves the
    // straight stretches to 2.78/7.22 and 3.28/6.72 exactly
    assert!(text.contains("X2.780"), "missing left offset edge in:\n{text}");
    assert!(text.contains("X7.220"), "missing right offset edge in:\n{text}");
    assert!(text.contains("Y3.280"), "missing bottom offset edge in:\n{text}");
    assert!(text.contains("Y6.720"), "missing top offset edge in:\n{text}");
    assert!(text.starts_with("G21"));
    assert!(text.ends_with("M30\n"));
}

#[test]
fn outline_and_drills_join_the_full_program() {
    let input = BoardInput {
        copper: SINGLE_PAD,
        outline: Some(BOARD_OUTLINE),
        drill: Some(SINGLE_HOLE),
    };
    let params = MillingParams::default();
    let plan = plan_ok(&input, &params);

    assert_eq!(plan.outline.loops.len(), 1);
    let text = plan.program.render();
    assert!(
        text.contains("Z-0.200"),
        "outline must cut at the edge depth in:\n{text}"
    );
    assert!(
        text.contains("G81 X5.000 Y5.000 Z-1.800 R0.100 F200.0"),
        "missing drill cycle in:\n{text}"
    );
}

#[test]
fn identical_input_yields_identical_regions_and_toolpaths() {
    let input = BoardInput {
        copper: PARALLEL_TRACES,
        outline: None,
        drill: None,
    };
    let params = MillingParams::default();
    let first = plan_ok(&input, &params);
    let second = plan_ok(&input, &params);
    assert_eq!(first.copper, second.copper);
    assert_eq!(first.toolpath, second.toolpath);
}

#[test]
fn preview_geometry_serializes_as_plain_vertex_lists() {
    let input = BoardInput {
        copper: SINGLE_PAD,
        outline: None,
        drill: None,
    };
    let plan = plan_ok(&input, &single_pass(0.22));
    let copper_json = match serde_json::to_string(&plan.copper) {
        Ok(json) => json,
        Err(err) => panic!("copper region must serialize, got {err}"),
    };
    assert!(copper_json.contains("\"islands\""));
    let toolpath_json = match serde_json::to_string(&plan.toolpath) {
        Ok(json) => json,
        Err(err) => panic!("toolpath must serialize, got {err}"),
    };
    assert!(toolpath_json.contains("\"contours\""));
}

#[test]
fn undefined_aperture_reference_aborts_with_no_program() {
    let malformed =
        "%FSLAX46Y46*%\n%MOMM*%\n%ADD10C,0.25*%\nD11*\nX0Y0D02*\nX1000000Y0D01*\nM02*\n";
    let input = BoardInput {
        copper: malformed,
        outline: None,
        drill: None,
    };
    let result = plan_board(&input, &MillingParams::default());
    assert!(
        matches!(result, Err(PipelineError::UnknownAperture(_))),
        "an undefined aperture must abort the run"
    );
}

#[test]
fn empty_copper_layer_is_degenerate() {
    let empty = "%FSLAX46Y46*%\n%MOMM*%\n%ADD10C,0.25*%\nM02*\n";
    let input = BoardInput {
        copper: empty,
        outline: None,
        drill: None,
    };
    let result = plan_board(&input, &MillingParams::default());
    assert!(matches!(result, Err(PipelineError::DegenerateGeometry(_))));
}
