//! Drill-list parser.

use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::gerber::ZeroOmission;
use crate::geometry::Point;

use super::types::{DrillFile, DrillHole, DrillTool};

const MM_PER_INCH: f64 = 25.4;
const METRIC_DIGITS: (u8, u8) = (3, 3);
const INCH_DIGITS: (u8, u8) = (2, 4);

#[derive(Debug)]
struct ParserState {
    unit_scale: f64,
    integer_digits: u8,
    decimal_digits: u8,
    omission: ZeroOmission,
    tools: BTreeMap<u32, f64>,
    current_tool: Option<u32>,
    last_x: Option<f64>,
    last_y: Option<f64>,
    holes: Vec<DrillHole>,
    warnings: Vec<String>,
    declared_units: bool,
    in_header: bool,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            unit_scale: 1.0,
            integer_digits: METRIC_DIGITS.0,
            decimal_digits: METRIC_DIGITS.1,
            omission: ZeroOmission::Leading,
            tools: BTreeMap::new(),
            current_tool: None,
            last_x: None,
            last_y: None,
            holes: Vec::new(),
            warnings: Vec::new(),
            declared_units: false,
            in_header: false,
        }
    }
}

/// Parse a drill list from raw bytes.
///
/// All output values are normalized to millimeters. Hole order is input
/// order.
///
/// # Errors
///
/// Returns [`PipelineError::Parse`] for empty, non-UTF-8, or malformed
/// input and non-positive tool diameters,
/// [`PipelineError::UnknownTool`] when a selection or coordinate record
/// references no defined tool, and [`PipelineError::UnsupportedFeature`]
/// for routed paths, slots, and incremental input mode.
pub fn parse(data: &[u8]) -> Result<DrillFile, PipelineError> {
    if data.is_empty() {
        return Err(PipelineError::Parse("empty input".to_string()));
    }

    let content = std::str::from_utf8(data)
        .map_err(|err| PipelineError::Parse(format!("invalid UTF-8 input: {err}")))?;

    let mut state = ParserState::default();

    for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        let normalized = line.to_ascii_uppercase();

        if normalized == "M48" {
            state.in_header = true;
            continue;
        }
        if normalized == "%" {
            state.in_header = false;
            continue;
        }
        if normalized == "M30" || normalized == "M95" {
            break;
        }
        if normalized == "M71" {
            apply_units("METRIC", &mut state);
            continue;
        }
        if normalized == "M72" {
            apply_units("INCH", &mut state);
            continue;
        }
        if normalized.starts_with("FMAT") || normalized.starts_with("G90") {
            continue;
        }
        if normalized.starts_with("ICI") {
            if normalized.contains("ON") {
                return Err(PipelineError::UnsupportedFeature(
                    "incremental drill input (ICI,ON) is not supported".to_string(),
                ));
            }
            continue;
        }
        if is_routing_command(&normalized) {
            return Err(PipelineError::UnsupportedFeature(format!(
                "routed path or slot `{normalized}` is not supported"
            )));
        }
        if apply_units(&normalized, &mut state) {
            continue;
        }
        if let Some((code, diameter)) = parse_tool_definition(&normalized)? {
            register_tool(&mut state, code, diameter)?;
            continue;
        }
        if let Some(code) = parse_tool_selection(&normalized)? {
            apply_tool_selection(&mut state, code)?;
            continue;
        }
        if state.in_header {
            // remaining header lines (VER, DETECT, ATC, ...) carry no geometry
            continue;
        }
        if let Some((x_raw, y_raw)) = parse_coordinate_record(&normalized)? {
            push_hole(&mut state, x_raw, y_raw)?;
        }
    }

    let tools = state
        .tools
        .iter()
        .map(|(&code, &diameter)| DrillTool { code, diameter })
        .collect();

    Ok(DrillFile {
        holes: state.holes,
        tools,
        warnings: state.warnings,
    })
}

/// Apply a `METRIC`/`INCH` directive. Returns true when the line was one.
fn apply_units(line: &str, state: &mut ParserState) -> bool {
    let (scale, digits, suffix) = if let Some(rest) = line.strip_prefix("METRIC") {
        (1.0, METRIC_DIGITS, rest)
    } else if let Some(rest) = line.strip_prefix("INCH") {
        (MM_PER_INCH, INCH_DIGITS, rest)
    } else {
        return false;
    };

    if state.declared_units && (state.unit_scale - scale).abs() > f64::EPSILON {
        state
            .warnings
            .push("mixed unit declarations; last declaration wins".to_string());
    }
    state.unit_scale = scale;
    state.integer_digits = digits.0;
    state.decimal_digits = digits.1;
    state.declared_units = true;

    if suffix.contains(",LZ") {
        state.omission = ZeroOmission::Leading;
    } else if suffix.contains(",TZ") {
        state.omission = ZeroOmission::Trailing;
    }

    true
}

fn register_tool(state: &mut ParserState, code: u32, diameter: f64) -> Result<(), PipelineError> {
    let diameter = diameter * state.unit_scale;
    if diameter <= 0.0 {
        return Err(PipelineError::Parse(format!(
            "tool T{code} has non-positive diameter {diameter}"
        )));
    }
    if state.tools.insert(code, diameter).is_some() {
        state.warnings.push(format!(
            "duplicate definition for tool T{code}; last definition wins"
        ));
    }
    Ok(())
}

fn apply_tool_selection(state: &mut ParserState, code: u32) -> Result<(), PipelineError> {
    if code == 0 {
        state.current_tool = None;
        return Ok(());
    }
    if !state.tools.contains_key(&code) {
        return Err(PipelineError::UnknownTool(format!(
            "tool T{code} selected but never defined"
        )));
    }
    state.current_tool = Some(code);
    Ok(())
}

fn push_hole(
    state: &mut ParserState,
    x_raw: Option<String>,
    y_raw: Option<String>,
) -> Result<(), PipelineError> {
    let Some(code) = state.current_tool else {
        return Err(PipelineError::UnknownTool(
            "coordinate record before any tool selection".to_string(),
        ));
    };
    let Some(diameter) = state.tools.get(&code).copied() else {
        return Err(PipelineError::UnknownTool(format!(
            "tool T{code} selected but never defined"
        )));
    };

    let x = decode_axis(x_raw.as_deref(), state.last_x, state, "X")?;
    let y = decode_axis(y_raw.as_deref(), state.last_y, state, "Y")?;
    state.last_x = Some(x);
    state.last_y = Some(y);

    state.holes.push(DrillHole {
        center: Point::new(x, y),
        diameter,
    });
    Ok(())
}

fn decode_axis(
    raw: Option<&str>,
    last: Option<f64>,
    state: &ParserState,
    axis: &str,
) -> Result<f64, PipelineError> {
    match raw {
        Some(raw) => decode_coordinate(raw, state),
        None => last.ok_or_else(|| {
            PipelineError::Parse(format!("coordinate record has no {axis} value"))
        }),
    }
}

/// Split a coordinate record into raw X/Y fields; either axis may be modal.
fn parse_coordinate_record(
    line: &str,
) -> Result<Option<(Option<String>, Option<String>)>, PipelineError> {
    if !line.starts_with('X') && !line.starts_with('Y') {
        return Ok(None);
    }

    let mut x_raw: Option<String> = None;
    let mut y_raw: Option<String> = None;
    let mut current: Option<(char, usize)> = None;

    for (index, ch) in line.char_indices() {
        if ch.is_ascii_alphabetic() {
            if let Some((letter, start)) = current.take() {
                store_axis(&mut x_raw, &mut y_raw, letter, line, start, index)?;
            }
            current = Some((ch, index + ch.len_utf8()));
        }
    }
    if let Some((letter, start)) = current {
        store_axis(&mut x_raw, &mut y_raw, letter, line, start, line.len())?;
    }

    Ok(Some((x_raw, y_raw)))
}

fn store_axis(
    x_raw: &mut Option<String>,
    y_raw: &mut Option<String>,
    letter: char,
    line: &str,
    start: usize,
    end: usize,
) -> Result<(), PipelineError> {
    let value = line.get(start..end).unwrap_or("").to_string();
    match letter {
        'X' => *x_raw = Some(value),
        'Y' => *y_raw = Some(value),
        other => {
            return Err(PipelineError::Parse(format!(
                "unexpected field `{other}` in coordinate record `{line}`"
            )));
        }
    }
    Ok(())
}

/// Decode one coordinate field into millimeters.
fn decode_coordinate(raw: &str, state: &ParserState) -> Result<f64, PipelineError> {
    if raw.contains('.') {
        return Ok(parse_f64(raw, "coordinate")? * state.unit_scale);
    }

    let (sign, digits) = split_sign(raw);
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(PipelineError::Parse(format!(
            "invalid coordinate value `{raw}`"
        )));
    }

    let divisor = 10_f64.powi(i32::from(state.decimal_digits));
    let value = match state.omission {
        ZeroOmission::Leading => parse_f64(digits, "coordinate")? / divisor,
        ZeroOmission::Trailing => {
            let width = usize::from(state.integer_digits) + usize::from(state.decimal_digits);
            let padded = format!("{digits:0<width$}");
            parse_f64(&padded, "coordinate")? / divisor
        }
    };

    Ok(sign * value * state.unit_scale)
}

/// `T<code>C<diameter>` with optional feed/speed suffixes after the diameter.
fn parse_tool_definition(line: &str) -> Result<Option<(u32, f64)>, PipelineError> {
    let Some(after_t) = line.strip_prefix('T') else {
        return Ok(None);
    };
    let Some((code_raw, after_c)) = after_t.split_once('C') else {
        return Ok(None);
    };
    if code_raw.is_empty() || !code_raw.chars().all(|ch| ch.is_ascii_digit()) {
        return Ok(None);
    }

    let end = after_c
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.' || ch == '+' || ch == '-'))
        .unwrap_or(after_c.len());
    let (diameter_raw, _) = after_c.split_at(end);
    if diameter_raw.is_empty() {
        return Err(PipelineError::Parse(format!(
            "invalid tool definition `{line}`"
        )));
    }

    let code = parse_u32(code_raw, "tool code")?;
    let diameter = parse_f64(diameter_raw, "tool diameter")?;
    Ok(Some((code, diameter)))
}

/// Bare `T<code>` selection.
fn parse_tool_selection(line: &str) -> Result<Option<u32>, PipelineError> {
    let Some(code_raw) = line.strip_prefix('T') else {
        return Ok(None);
    };
    if code_raw.is_empty() || !code_raw.chars().all(|ch| ch.is_ascii_digit()) {
        return Ok(None);
    }
    parse_u32(code_raw, "tool code").map(Some)
}

fn is_routing_command(line: &str) -> bool {
    line.starts_with("G00")
        || line.starts_with("G01")
        || line.starts_with("G02")
        || line.starts_with("G03")
        || line.contains("G85")
}

fn split_sign(raw: &str) -> (f64, &str) {
    match (raw.strip_prefix('-'), raw.strip_prefix('+')) {
        (Some(rest), _) => (-1.0, rest),
        (None, Some(rest)) => (1.0, rest),
        (None, None) => (1.0, raw),
    }
}

fn parse_u32(raw: &str, label: &str) -> Result<u32, PipelineError> {
    raw.parse::<u32>()
        .map_err(|err| PipelineError::Parse(format!("invalid {label} `{raw}`: {err}")))
}

fn parse_f64(raw: &str, label: &str) -> Result<f64, PipelineError> {
    raw.parse::<f64>()
        .map_err(|err| PipelineError::Parse(format!("invalid {label} `{raw}`: {err}")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-9;

    fn parse_ok(input: &[u8]) -> DrillFile {
        match parse(input) {
            Ok(file) => file,
            Err(err) => panic!("expected parse to succeed, got {err}"),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPSILON,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn ut_exc_001_metric_decimal_file_extracts_tools_and_holes() {
        let file = parse_ok(b"M48\nMETRIC\nT1C0.8\nT2C1.0\n%\nT1\nX1.0Y2.0\nX3.0Y4.0\nT2\nX5.0Y6.0\nM30\n");
        assert_eq!(file.tools.len(), 2);
        assert_eq!(file.holes.len(), 3);

        let Some(first) = file.holes.first() else {
            panic!("first hole missing");
        };
        assert_close(first.center.x, 1.0);
        assert_close(first.center.y, 2.0);
        assert_close(first.diameter, 0.8);

        let Some(last) = file.holes.last() else {
            panic!("last hole missing");
        };
        assert_close(last.diameter, 1.0);
    }

    #[test]
    fn ut_exc_002_implied_metric_coordinates_use_three_three() {
        let file = parse_ok(b"M48\nMETRIC\nT1C0.8\n%\nT1\nX12345Y6789\nM30\n");
        let Some(hole) = file.holes.first() else {
            panic!("hole missing");
        };
        assert_close(hole.center.x, 12.345);
        assert_close(hole.center.y, 6.789);
    }

    #[test]
    fn ut_exc_003_inch_values_convert_to_millimeters() {
        let file = parse_ok(b"M48\nINCH\nT1C0.032\n%\nT1\nX10000Y20000\nM30\n");
        let Some(hole) = file.holes.first() else {
            panic!("hole missing");
        };
        assert_close(hole.center.x, 25.4);
        assert_close(hole.center.y, 50.8);
        assert_close(hole.diameter, 0.8128);
    }

    #[test]
    fn ut_exc_004_leading_omission_right_aligns_digits() {
        let file = parse_ok(b"M48\nMETRIC,LZ\nT1C1.0\n%\nT1\nX1500Y2500\nM30\n");
        let Some(hole) = file.holes.first() else {
            panic!("hole missing");
        };
        assert_close(hole.center.x, 1.5);
        assert_close(hole.center.y, 2.5);
    }

    #[test]
    fn ut_exc_005_trailing_omission_left_aligns_digits() {
        let file = parse_ok(b"M48\nMETRIC,TZ\nT1C1.0\n%\nT1\nX1500Y2500\nM30\n");
        let Some(hole) = file.holes.first() else {
            panic!("hole missing");
        };
        assert_close(hole.center.x, 150.0);
        assert_close(hole.center.y, 250.0);
    }

    #[test]
    fn ut_exc_006_missing_axis_is_modal() {
        let file = parse_ok(b"M48\nMETRIC\nT1C0.8\n%\nT1\nX10.0Y5.0\nY7.5\nM30\n");
        assert_eq!(file.holes.len(), 2);
        let Some(second) = file.holes.last() else {
            panic!("second hole missing");
        };
        assert_close(second.center.x, 10.0);
        assert_close(second.center.y, 7.5);
    }

    #[test]
    fn ut_exc_007_duplicate_tool_definition_warns_and_last_wins() {
        let file = parse_ok(b"M48\nMETRIC\nT1C0.8\nT1C1.0\n%\nT1\nX1.0Y1.0\nM30\n");
        assert_eq!(file.tools.len(), 1);
        let Some(hole) = file.holes.first() else {
            panic!("hole missing");
        };
        assert_close(hole.diameter, 1.0);
        assert!(file
            .warnings
            .iter()
            .any(|warning| warning.contains("duplicate definition")));
    }

    #[test]
    fn ut_exc_008_tool_definitions_in_body_are_accepted() {
        let file = parse_ok(b"METRIC\nT1C0.8\nT1\nX1.0Y1.0\nM30\n");
        assert_eq!(file.tools.len(), 1);
        assert_eq!(file.holes.len(), 1);
    }

    #[test]
    fn bc_exc_001_empty_input_fails() {
        assert!(matches!(parse(&[]), Err(PipelineError::Parse(_))));
    }

    #[test]
    fn bc_exc_002_selecting_undefined_tool_fails() {
        let result = parse(b"M48\nMETRIC\nT1C0.8\n%\nT9\nX1.0Y1.0\nM30\n");
        assert!(matches!(result, Err(PipelineError::UnknownTool(_))));
    }

    #[test]
    fn bc_exc_003_coordinates_before_tool_selection_fail() {
        let result = parse(b"M48\nMETRIC\nT1C0.8\n%\nX1.0Y1.0\nM30\n");
        assert!(matches!(result, Err(PipelineError::UnknownTool(_))));
    }

    #[test]
    fn bc_exc_004_non_positive_tool_diameter_fails() {
        let result = parse(b"M48\nMETRIC\nT1C0.0\n%\nT1\nX1.0Y1.0\nM30\n");
        assert!(matches!(result, Err(PipelineError::Parse(_))));
    }

    #[test]
    fn bc_exc_005_slot_command_is_unsupported() {
        let result = parse(b"M48\nMETRIC\nT1C0.8\n%\nT1\nX1.0Y1.0G85X2.0Y1.0\nM30\n");
        assert!(matches!(result, Err(PipelineError::UnsupportedFeature(_))));
    }

    #[test]
    fn bc_exc_006_incremental_input_is_unsupported() {
        let result = parse(b"M48\nMETRIC\nICI,ON\nT1C0.8\n%\nT1\nX1.0Y1.0\nM30\n");
        assert!(matches!(result, Err(PipelineError::UnsupportedFeature(_))));
    }

    #[test]
    fn bc_exc_007_deselected_tool_rejects_following_holes() {
        let result = parse(b"M48\nMETRIC\nT1C0.8\n%\nT1\nX1.0Y1.0\nT0\nX2.0Y2.0\nM30\n");
        assert!(matches!(result, Err(PipelineError::UnknownTool(_))));
    }

    #[test]
    fn bc_exc_008_header_only_file_yields_no_holes() {
        let file = parse_ok(b"M48\nMETRIC\nT1C0.8\n%\nM30\n");
        assert_eq!(file.tools.len(), 1);
        assert_eq!(file.holes.len(), 0);
    }
}
