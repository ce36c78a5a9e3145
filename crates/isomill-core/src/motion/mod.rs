//! Motion program assembly and rendering.
//!
//! The emitter turns contours, outline loops, and drill holes into a
//! fixed command vocabulary: rapid positioning, linear feed, spindle
//! on/off, dwell, drill cycle, and program end. The program is built once
//! and rendered once; commands are never mutated after emission.

use crate::error::PipelineError;
use crate::excellon::DrillHole;
use crate::geometry::{Outline, Point};
use crate::params::MillingParams;
use crate::toolpath::Toolpath;

/// Decimal places in every emitted coordinate.
pub const COORD_DECIMALS: usize = 3;
const COORD_SCALE: f64 = 1000.0;

/// One tool-motion command.
///
/// Coordinates are absolute; omitted axes are modal. Every vertex of a
/// contour is emitted from its absolute coordinate, so rounding error
/// never accumulates along a cut.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionCommand {
    /// Rapid positioning move (G0).
    Rapid {
        /// Target X, when commanded.
        x: Option<f64>,
        /// Target Y, when commanded.
        y: Option<f64>,
        /// Target Z, when commanded.
        z: Option<f64>,
    },
    /// Linear feed move (G1).
    Feed {
        /// Target X, when commanded.
        x: Option<f64>,
        /// Target Y, when commanded.
        y: Option<f64>,
        /// Target Z, when commanded.
        z: Option<f64>,
        /// Feed rate word; modal when omitted.
        feed: Option<f64>,
    },
    /// Spindle on, clockwise, at the given speed (M3).
    SpindleOn {
        /// Spindle speed in revolutions per minute.
        rpm: f64,
    },
    /// Spindle off (M5).
    SpindleOff,
    /// Dwell for the given duration (G4).
    Dwell {
        /// Pause length in seconds.
        seconds: f64,
    },
    /// Canned drill cycle at one hole (G81).
    DrillCycle {
        /// Hole center X.
        x: f64,
        /// Hole center Y.
        y: f64,
        /// Bottom of the hole (negative).
        depth: f64,
        /// Retract plane above the workpiece.
        retract: f64,
        /// Plunge feed rate.
        feed: f64,
    },
    /// Program end (M30).
    ProgramEnd,
}

/// An ordered, immutable motion command sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionProgram {
    commands: Vec<MotionCommand>,
}

impl MotionProgram {
    /// Read-only view of the command sequence.
    #[must_use]
    pub fn commands(&self) -> &[MotionCommand] {
        &self.commands
    }

    /// Render the program as machine-readable ASCII text.
    ///
    /// Output starts with a fixed unit/positioning preamble; every
    /// coordinate carries [`COORD_DECIMALS`] decimal places.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("G21 ; millimeter units\n");
        out.push_str("G90 ; absolute positioning\n");
        for command in &self.commands {
            render_command(&mut out, command);
        }
        out
    }
}

fn render_command(out: &mut String, command: &MotionCommand) {
    match command {
        MotionCommand::Rapid { x, y, z } => {
            let mut line = String::from("G0");
            push_axis(&mut line, 'X', *x);
            push_axis(&mut line, 'Y', *y);
            push_axis(&mut line, 'Z', *z);
            out.push_str(&line);
            out.push('\n');
        }
        MotionCommand::Feed { x, y, z, feed } => {
            let mut line = String::from("G1");
            push_axis(&mut line, 'X', *x);
            push_axis(&mut line, 'Y', *y);
            push_axis(&mut line, 'Z', *z);
            if let Some(feed) = feed {
                line.push_str(&format!(" F{feed:.1}"));
            }
            out.push_str(&line);
            out.push('\n');
        }
        MotionCommand::SpindleOn { rpm } => {
            out.push_str(&format!("M3 S{rpm:.0}\n"));
        }
        MotionCommand::SpindleOff => out.push_str("M5\n"),
        MotionCommand::Dwell { seconds } => {
            out.push_str(&format!("G4 P{seconds:.1}\n"));
        }
        MotionCommand::DrillCycle {
            x,
            y,
            depth,
            retract,
            feed,
        } => {
            out.push_str(&format!(
                "G81 X{} Y{} Z{} R{} F{feed:.1}\n",
                format_coord(*x),
                format_coord(*y),
                format_coord(*depth),
                format_coord(*retract),
            ));
        }
        MotionCommand::ProgramEnd => out.push_str("M30\n"),
    }
}

fn push_axis(line: &mut String, word: char, value: Option<f64>) {
    if let Some(value) = value {
        line.push(' ');
        line.push(word);
        line.push_str(&format_coord(value));
    }
}

/// Round to the emission precision and normalize negative zero.
fn format_coord(value: f64) -> String {
    let quantized = (value * COORD_SCALE).round() / COORD_SCALE + 0.0;
    format!("{quantized:.prec$}", prec = COORD_DECIMALS)
}

/// Assemble the motion program for a toolpath, outline, and drill list.
///
/// The spindle switches on lazily before the first cutting motion and off
/// exactly once after the last; a program with any cutting carries
/// exactly one on-edge and one off-edge. Isolation contours cut at
/// `cut_depth`, outline loops at `edge_cut_depth`, and each drill hole
/// becomes one drill cycle.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidParameter`] when the milling
/// parameters fail validation.
pub fn emit(
    toolpath: &Toolpath,
    outline: &Outline,
    holes: &[DrillHole],
    params: &MillingParams,
) -> Result<MotionProgram, PipelineError> {
    params.validate()?;

    let mut commands = vec![MotionCommand::Rapid {
        x: None,
        y: None,
        z: Some(params.safe_height),
    }];
    let mut spindle_on = false;

    for pass in &toolpath.passes {
        for contour in &pass.contours {
            mill_polyline(
                &mut commands,
                &mut spindle_on,
                &contour.points,
                contour.closed,
                params.cut_depth,
                params,
            );
        }
    }

    for ring in &outline.loops {
        mill_polyline(
            &mut commands,
            &mut spindle_on,
            &ring.points,
            true,
            params.edge_cut_depth,
            params,
        );
    }

    for hole in holes {
        commands.push(MotionCommand::Rapid {
            x: Some(hole.center.x),
            y: Some(hole.center.y),
            z: None,
        });
        ensure_spindle(&mut commands, &mut spindle_on, params);
        commands.push(MotionCommand::DrillCycle {
            x: hole.center.x,
            y: hole.center.y,
            depth: params.hole_depth,
            retract: params.hole_start,
            feed: params.plunge_feed_rate,
        });
    }
    if !holes.is_empty() {
        commands.push(MotionCommand::Rapid {
            x: None,
            y: None,
            z: Some(params.safe_height),
        });
    }

    if spindle_on {
        commands.push(MotionCommand::SpindleOff);
    }
    commands.push(MotionCommand::Rapid {
        x: Some(0.0),
        y: Some(0.0),
        z: None,
    });
    commands.push(MotionCommand::ProgramEnd);

    Ok(MotionProgram { commands })
}

/// Cut one polyline: rapid to the start, plunge, traverse, retract.
fn mill_polyline(
    commands: &mut Vec<MotionCommand>,
    spindle_on: &mut bool,
    points: &[Point],
    closed: bool,
    depth: f64,
    params: &MillingParams,
) {
    let Some(first) = points.first().copied() else {
        return;
    };
    if points.len() < 2 {
        return;
    }

    commands.push(MotionCommand::Rapid {
        x: Some(first.x),
        y: Some(first.y),
        z: None,
    });
    ensure_spindle(commands, spindle_on, params);
    commands.push(MotionCommand::Feed {
        x: None,
        y: None,
        z: Some(depth),
        feed: Some(params.plunge_feed_rate),
    });

    let mut feed_word = Some(params.feed_rate);
    for point in points.iter().skip(1) {
        commands.push(MotionCommand::Feed {
            x: Some(point.x),
            y: Some(point.y),
            z: None,
            feed: feed_word.take(),
        });
    }
    if closed {
        commands.push(MotionCommand::Feed {
            x: Some(first.x),
            y: Some(first.y),
            z: None,
            feed: feed_word.take(),
        });
    }

    commands.push(MotionCommand::Rapid {
        x: None,
        y: None,
        z: Some(params.safe_height),
    });
}

fn ensure_spindle(
    commands: &mut Vec<MotionCommand>,
    spindle_on: &mut bool,
    params: &MillingParams,
) {
    if !*spindle_on {
        commands.push(MotionCommand::SpindleOn {
            rpm: params.spindle_speed,
        });
        if params.spindle_warmup > 0.0 {
            commands.push(MotionCommand::Dwell {
                seconds: params.spindle_warmup,
            });
        }
        *spindle_on = true;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use crate::geometry::Ring;
    use crate::toolpath::{Contour, ToolpathPass};

    use super::*;

    fn square_contour() -> Contour {
        Contour {
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
            ],
            closed: true,
        }
    }

    fn single_pass_toolpath() -> Toolpath {
        Toolpath {
            passes: vec![ToolpathPass {
                index: 0,
                offset: 0.22,
                contours: vec![square_contour()],
            }],
        }
    }

    fn emit_ok(
        toolpath: &Toolpath,
        outline: &Outline,
        holes: &[DrillHole],
        params: &MillingParams,
    ) -> MotionProgram {
        match emit(toolpath, outline, holes, params) {
            Ok(program) => program,
            Err(err) => panic!("expected emit to succeed, got {err}"),
        }
    }

    fn spindle_edges(program: &MotionProgram) -> (usize, usize) {
        let on = program
            .commands()
            .iter()
            .filter(|command| matches!(command, MotionCommand::SpindleOn { .. }))
            .count();
        let off = program
            .commands()
            .iter()
            .filter(|command| matches!(command, MotionCommand::SpindleOff))
            .count();
        (on, off)
    }

    #[test]
    fn ut_mot_001_single_contour_has_one_spindle_pair() {
        let params = MillingParams::default();
        let program = emit_ok(&single_pass_toolpath(), &Outline::default(), &[], &params);
        assert_eq!(spindle_edges(&program), (1, 1));

        let first_feed = program
            .commands()
            .iter()
            .position(|command| matches!(command, MotionCommand::Feed { .. }));
        let spindle_on = program
            .commands()
            .iter()
            .position(|command| matches!(command, MotionCommand::SpindleOn { .. }));
        let (Some(first_feed), Some(spindle_on)) = (first_feed, spindle_on) else {
            panic!("expected both a feed and a spindle-on");
        };
        assert!(spindle_on < first_feed, "spindle must start before cutting");
    }

    #[test]
    fn ut_mot_002_render_rounds_to_three_decimals_and_drops_negative_zero() {
        assert_eq!(format_coord(1.234_567), "1.235");
        assert_eq!(format_coord(-0.000_4), "0.000");
        assert_eq!(format_coord(-1.5), "-1.500");
        assert_eq!(format_coord(10.0), "10.000");
    }

    #[test]
    fn ut_mot_003_drill_cycle_renders_all_words() {
        let params = MillingParams::default();
        let holes = [DrillHole {
            center: Point::new(5.0, 6.0),
            diameter: 0.8,
        }];
        let program = emit_ok(
            &Toolpath { passes: Vec::new() },
            &Outline::default(),
            &holes,
            &params,
        );
        let text = program.render();
        assert!(
            text.contains("G81 X5.000 Y6.000 Z-1.800 R0.100 F200.0"),
            "missing drill cycle line in:\n{text}"
        );
    }

    #[test]
    fn ut_mot_004_plunge_uses_the_plunge_feed_rate() {
        let params = MillingParams::default();
        let program = emit_ok(&single_pass_toolpath(), &Outline::default(), &[], &params);
        let plunge = program.commands().iter().find(|command| {
            matches!(
                command,
                MotionCommand::Feed { z: Some(_), .. }
            )
        });
        let Some(MotionCommand::Feed { z: Some(depth), feed: Some(feed), .. }) = plunge else {
            panic!("expected a plunge feed");
        };
        assert!((depth - params.cut_depth).abs() < f64::EPSILON);
        assert!((feed - params.plunge_feed_rate).abs() < f64::EPSILON);
    }

    #[test]
    fn ut_mot_005_program_order_is_rapid_spindle_plunge_traverse_retract_drill_end() {
        let params = MillingParams::default();
        let holes = [DrillHole {
            center: Point::new(5.0, 5.0),
            diameter: 0.8,
        }];
        let program = emit_ok(&single_pass_toolpath(), &Outline::default(), &holes, &params);

        let mut kinds = Vec::new();
        for command in program.commands() {
            let kind = match command {
                MotionCommand::Rapid { .. } => "rapid",
                MotionCommand::Feed { z: Some(_), .. } => "plunge",
                MotionCommand::Feed { .. } => "traverse",
                MotionCommand::SpindleOn { .. } => "on",
                MotionCommand::SpindleOff => "off",
                MotionCommand::Dwell { .. } => "dwell",
                MotionCommand::DrillCycle { .. } => "drill",
                MotionCommand::ProgramEnd => "end",
            };
            if kinds.last() != Some(&kind) {
                kinds.push(kind);
            }
        }
        assert_eq!(
            kinds,
            vec![
                "rapid", "on", "dwell", "plunge", "traverse", "rapid", "drill", "rapid", "off",
                "rapid", "end",
            ],
        );
    }

    #[test]
    fn ut_mot_006_no_cutting_means_no_spindle_commands() {
        let params = MillingParams::default();
        let program = emit_ok(
            &Toolpath { passes: Vec::new() },
            &Outline::default(),
            &[],
            &params,
        );
        assert_eq!(spindle_edges(&program), (0, 0));
    }

    #[test]
    fn ut_mot_007_outline_loops_cut_at_the_edge_depth() {
        let params = MillingParams::default();
        let outline = Outline {
            loops: vec![Ring::new(vec![
                Point::new(0.0, 0.0),
                Point::new(20.0, 0.0),
                Point::new(20.0, 15.0),
                Point::new(0.0, 15.0),
            ])],
        };
        let program = emit_ok(&Toolpath { passes: Vec::new() }, &outline, &[], &params);
        let has_edge_plunge = program.commands().iter().any(|command| {
            matches!(
                command,
                MotionCommand::Feed { z: Some(depth), .. }
                    if (depth - params.edge_cut_depth).abs() < f64::EPSILON
            )
        });
        assert!(has_edge_plunge, "outline must plunge to the edge depth");
    }

    #[test]
    fn ut_mot_008_closed_contours_return_to_their_start_point() {
        let params = MillingParams::default();
        let program = emit_ok(&single_pass_toolpath(), &Outline::default(), &[], &params);
        let last_xy_feed = program
            .commands()
            .iter()
            .filter_map(|command| match command {
                MotionCommand::Feed {
                    x: Some(x),
                    y: Some(y),
                    ..
                } => Some((*x, *y)),
                _ => None,
            })
            .last();
        let Some((x, y)) = last_xy_feed else {
            panic!("expected traversal feeds");
        };
        assert!((x - 0.0).abs() < f64::EPSILON);
        assert!((y - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bc_mot_001_invalid_parameters_are_rejected() {
        let params = MillingParams {
            cut_depth: 0.5,
            ..MillingParams::default()
        };
        let result = emit(
            &single_pass_toolpath(),
            &Outline::default(),
            &[],
            &params,
        );
        assert!(matches!(result, Err(PipelineError::InvalidParameter(_))));
    }
}
