//! Photoplotter vector-format parser for copper and outline layers.
//!
//! Decoding is an explicit fold over the command stream: every step takes
//! the prior [`Cursor`] by value and returns the successor cursor together
//! with the decoded [`Primitive`], if the command produced one.

use std::collections::BTreeMap;

use gerber_types::{Aperture, Circle, CoordinateFormat, Polygon, QuadrantMode, Rectangular};

use crate::error::PipelineError;
use crate::geometry::Point;

use super::types::{
    ArcDirection, CoordinateMode, Cursor, GerberLayer, InterpolationMode, Primitive, ZeroOmission,
};

const MM_PER_INCH: f64 = 25.4;
const DEFAULT_INTEGER_DIGITS: u8 = 4;
const DEFAULT_DECIMAL_DIGITS: u8 = 6;

/// Parse a copper or outline vector layer from raw bytes.
///
/// The returned layer preserves input order for primitives and collects
/// recoverable oddities as warnings.
///
/// # Errors
///
/// Returns [`PipelineError::Parse`] for empty, non-UTF-8, or malformed
/// input, [`PipelineError::UnknownAperture`] when a select, draw, or flash
/// references an undefined aperture, and
/// [`PipelineError::UnsupportedFeature`] for format features outside the
/// supported subset (region mode, clear polarity, single-quadrant arcs,
/// macro-aperture use).
pub fn parse(data: &[u8]) -> Result<GerberLayer, PipelineError> {
    if data.is_empty() {
        return Err(PipelineError::Parse("empty input".to_string()));
    }

    let content = std::str::from_utf8(data)
        .map_err(|err| PipelineError::Parse(format!("invalid UTF-8 input: {err}")))?;

    let mut apertures = BTreeMap::new();
    let mut primitives = Vec::new();
    let mut warnings = Vec::new();
    let mut cursor = Cursor::default();
    let mut in_macro = false;

    'lines: for raw_line in content.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if in_macro {
            if line.ends_with('%') {
                in_macro = false;
            }
            continue;
        }

        if let Some(stripped) = line.strip_prefix('%') {
            for segment in stripped.split('%') {
                let segment = segment.trim();
                if segment.is_empty() {
                    continue;
                }
                if let Some(name_raw) = segment.strip_prefix("AM") {
                    let name = name_raw.trim_end_matches('*');
                    warnings.push(format!("aperture macro `{name}` recorded by name only"));
                    if !line.ends_with('%') {
                        in_macro = true;
                    }
                    continue;
                }
                cursor = apply_extended(segment, cursor, &mut apertures, &mut warnings)?;
            }
            continue;
        }

        for chunk in line.split('*') {
            let command = chunk.trim();
            if command.is_empty() {
                continue;
            }
            if matches!(command, "M00" | "M01" | "M02" | "M2" | "M30") {
                break 'lines;
            }
            let (primitive, next) = apply_command(command, cursor, &apertures, &mut warnings)?;
            cursor = next;
            if let Some(primitive) = primitive {
                primitives.push(primitive);
            }
        }
    }

    Ok(GerberLayer {
        apertures,
        primitives,
        warnings,
    })
}

/// Apply one `%...%` extended command to the cursor and aperture table.
fn apply_extended(
    segment: &str,
    mut cursor: Cursor,
    apertures: &mut BTreeMap<i32, Aperture>,
    warnings: &mut Vec<String>,
) -> Result<Cursor, PipelineError> {
    let body = segment.trim_end_matches('*');

    if body.starts_with("FS") {
        apply_format_specification(body, &mut cursor, warnings)?;
        return Ok(cursor);
    }

    if body.starts_with("AD") {
        apply_aperture_definition(body, &cursor, apertures, warnings)?;
        return Ok(cursor);
    }

    match body {
        "MOMM" => cursor.unit_scale = 1.0,
        "MOIN" => cursor.unit_scale = MM_PER_INCH,
        "LPD" | "IPPOS" => {}
        "LPC" => {
            return Err(PipelineError::UnsupportedFeature(
                "clear layer polarity (%LPC) is not supported".to_string(),
            ));
        }
        "IPNEG" => {
            return Err(PipelineError::UnsupportedFeature(
                "negative image polarity (%IPNEG) is not supported".to_string(),
            ));
        }
        other => {
            if other.starts_with("SR") {
                if other != "SR" && !other.starts_with("SRX1Y1") {
                    return Err(PipelineError::UnsupportedFeature(format!(
                        "step and repeat `{other}` is not supported"
                    )));
                }
            } else if other.starts_with("MI") || other.starts_with("SF") || other.starts_with("AS")
            {
                return Err(PipelineError::UnsupportedFeature(format!(
                    "image transform `{other}` is not supported"
                )));
            } else if other.starts_with("TF")
                || other.starts_with("TA")
                || other.starts_with("TO")
                || other.starts_with("TD")
                || other.starts_with("IN")
                || other.starts_with("LN")
                || other.starts_with("OF")
            {
                // attributes and deprecated image names carry no geometry
            } else {
                warnings.push(format!("ignoring unknown extended command `{other}`"));
            }
        }
    }

    Ok(cursor)
}

/// Decode a `%FS...%` format specification into the cursor.
fn apply_format_specification(
    body: &str,
    cursor: &mut Cursor,
    warnings: &mut Vec<String>,
) -> Result<(), PipelineError> {
    let mut rest = body.strip_prefix("FS").unwrap_or(body);

    cursor.zero_omission = if let Some(tail) = rest.strip_prefix('L') {
        rest = tail;
        ZeroOmission::Leading
    } else if let Some(tail) = rest.strip_prefix('T') {
        rest = tail;
        ZeroOmission::Trailing
    } else if let Some(tail) = rest.strip_prefix('D') {
        rest = tail;
        ZeroOmission::Leading
    } else {
        warnings.push(format!("format `{body}` has no zero-omission flag; assuming leading"));
        ZeroOmission::Leading
    };

    cursor.coordinate_mode = if let Some(tail) = rest.strip_prefix('A') {
        rest = tail;
        CoordinateMode::Absolute
    } else if let Some(tail) = rest.strip_prefix('I') {
        rest = tail;
        CoordinateMode::Incremental
    } else {
        warnings.push(format!("format `{body}` has no coordinate mode; assuming absolute"));
        CoordinateMode::Absolute
    };

    let digits = rest.strip_prefix('X').ok_or_else(|| {
        PipelineError::Parse(format!("malformed format specification `{body}`"))
    })?;
    let mut chars = digits.chars();
    let x_integer = format_digit(chars.next(), body)?;
    let x_decimal = format_digit(chars.next(), body)?;
    if chars.next() != Some('Y') {
        return Err(PipelineError::Parse(format!(
            "malformed format specification `{body}`"
        )));
    }
    let y_integer = format_digit(chars.next(), body)?;
    let y_decimal = format_digit(chars.next(), body)?;
    if (y_integer, y_decimal) != (x_integer, x_decimal) {
        warnings.push(format!(
            "mismatched X/Y digit counts in `{body}`; using the X format"
        ));
    }

    cursor.format = Some(CoordinateFormat::new(
        gerber_zero_omission(cursor.zero_omission),
        gerber_coordinate_mode(cursor.coordinate_mode),
        x_integer,
        x_decimal,
    ));
    Ok(())
}

fn gerber_zero_omission(value: ZeroOmission) -> gerber_types::ZeroOmission {
    match value {
        ZeroOmission::Leading => gerber_types::ZeroOmission::Leading,
        ZeroOmission::Trailing => gerber_types::ZeroOmission::Trailing,
    }
}

fn gerber_coordinate_mode(value: CoordinateMode) -> gerber_types::CoordinateMode {
    match value {
        CoordinateMode::Absolute => gerber_types::CoordinateMode::Absolute,
        CoordinateMode::Incremental => gerber_types::CoordinateMode::Incremental,
    }
}

fn format_digit(ch: Option<char>, body: &str) -> Result<u8, PipelineError> {
    ch.and_then(|c| c.to_digit(10))
        .map(|value| u8::try_from(value).unwrap_or(u8::MAX))
        .ok_or_else(|| PipelineError::Parse(format!("malformed format specification `{body}`")))
}

/// Decode a `%AD...%` aperture definition into the table.
fn apply_aperture_definition(
    body: &str,
    cursor: &Cursor,
    apertures: &mut BTreeMap<i32, Aperture>,
    warnings: &mut Vec<String>,
) -> Result<(), PipelineError> {
    let rest = body.strip_prefix("ADD").ok_or_else(|| {
        PipelineError::Parse(format!("malformed aperture definition `{body}`"))
    })?;
    let split = rest
        .find(|ch: char| !ch.is_ascii_digit())
        .ok_or_else(|| PipelineError::Parse(format!("aperture definition `{body}` has no shape")))?;
    let (code_raw, shape_raw) = rest.split_at(split);
    let code = parse_i32(code_raw, "aperture code")?;

    let (shape, params_raw) = match shape_raw.split_once(',') {
        Some((shape, params)) => (shape, Some(params)),
        None => (shape_raw, None),
    };

    let mut params = Vec::new();
    if let Some(raw) = params_raw {
        for field in raw.split('X') {
            params.push(parse_f64(field, "aperture parameter")?);
        }
    }
    let mut values = params.iter().copied();
    let scale = cursor.unit_scale;

    let aperture = match shape {
        "C" => {
            let Some(diameter) = values.next() else {
                return Err(PipelineError::Parse(format!(
                    "circle aperture D{code} has no diameter"
                )));
            };
            if values.next().is_some() {
                warnings.push(format!("aperture D{code}: hole dimension ignored"));
            }
            Aperture::Circle(Circle::new(diameter * scale))
        }
        "R" | "O" => {
            let Some(width) = values.next() else {
                return Err(PipelineError::Parse(format!(
                    "aperture D{code} has no dimensions"
                )));
            };
            let height = match values.next() {
                Some(height) => height,
                None => {
                    warnings.push(format!("aperture D{code} has one dimension; assuming square"));
                    width
                }
            };
            if values.next().is_some() {
                warnings.push(format!("aperture D{code}: hole dimension ignored"));
            }
            let rect = Rectangular::new(width * scale, height * scale);
            if shape == "R" {
                Aperture::Rectangle(rect)
            } else {
                Aperture::Obround(rect)
            }
        }
        "P" => {
            let Some(diameter) = values.next() else {
                return Err(PipelineError::Parse(format!(
                    "polygon aperture D{code} has no diameter"
                )));
            };
            let Some(vertex_count) = values.next() else {
                return Err(PipelineError::Parse(format!(
                    "polygon aperture D{code} has no vertex count"
                )));
            };
            if vertex_count.fract() != 0.0 || !(3.0..=12.0).contains(&vertex_count) {
                return Err(PipelineError::Parse(format!(
                    "polygon aperture D{code} has invalid vertex count {vertex_count}"
                )));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let sides = vertex_count as u8;
            let mut polygon = Polygon::new(diameter * scale, sides);
            if let Some(rotation) = values.next() {
                polygon = polygon.with_rotation(rotation);
            }
            if values.next().is_some() {
                warnings.push(format!("aperture D{code}: hole dimension ignored"));
            }
            Aperture::Polygon(polygon)
        }
        name => {
            warnings.push(format!(
                "aperture D{code} references macro `{name}`; drawing with it will fail"
            ));
            Aperture::Macro(name.to_string(), None)
        }
    };

    if apertures.insert(code, aperture).is_some() {
        warnings.push(format!(
            "duplicate definition for aperture D{code}; last definition wins"
        ));
    }
    Ok(())
}

/// Apply one word command (G/D codes with optional coordinates).
///
/// This is the fold step: the cursor travels in and out by value.
fn apply_command(
    command: &str,
    mut cursor: Cursor,
    apertures: &BTreeMap<i32, Aperture>,
    warnings: &mut Vec<String>,
) -> Result<(Option<Primitive>, Cursor), PipelineError> {
    if command.starts_with("G04") {
        return Ok((None, cursor));
    }

    let mut rest = command;
    while let Some(tail) = rest.strip_prefix('G') {
        let split = tail
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(tail.len());
        let (code_raw, after) = tail.split_at(split);
        let code = parse_u32(code_raw, "function code")?;
        match code {
            1 => cursor.interpolation = InterpolationMode::Linear,
            2 => cursor.interpolation = InterpolationMode::ClockwiseArc,
            3 => cursor.interpolation = InterpolationMode::CounterClockwiseArc,
            4 => return Ok((None, cursor)),
            36 | 37 => {
                return Err(PipelineError::UnsupportedFeature(
                    "region mode (G36/G37) is not supported".to_string(),
                ));
            }
            54 | 55 => {}
            70 => cursor.unit_scale = MM_PER_INCH,
            71 => cursor.unit_scale = 1.0,
            74 => cursor.quadrant = QuadrantMode::Single,
            75 => cursor.quadrant = QuadrantMode::Multi,
            90 => cursor.coordinate_mode = CoordinateMode::Absolute,
            91 => cursor.coordinate_mode = CoordinateMode::Incremental,
            other => warnings.push(format!("ignoring unsupported function code G{other}")),
        }
        rest = after;
    }

    if rest.is_empty() {
        return Ok((None, cursor));
    }

    let fields = split_fields(rest, command)?;
    let mut x_raw = None;
    let mut y_raw = None;
    let mut i_raw = None;
    let mut j_raw = None;
    let mut op_raw = None;
    for (letter, value) in fields {
        match letter {
            'X' => x_raw = Some(value),
            'Y' => y_raw = Some(value),
            'I' => i_raw = Some(value),
            'J' => j_raw = Some(value),
            'D' => op_raw = Some(value),
            other => {
                return Err(PipelineError::Parse(format!(
                    "unexpected field `{other}` in `{command}`"
                )));
            }
        }
    }

    let Some(op_raw) = op_raw else {
        return Err(PipelineError::Parse(format!(
            "command `{command}` has no operation code"
        )));
    };
    let op = parse_i32(op_raw, "operation code")?;

    if op >= 10 {
        if x_raw.is_some() || y_raw.is_some() {
            warnings.push(format!("coordinates ignored on aperture select `{command}`"));
        }
        if !apertures.contains_key(&op) {
            return Err(PipelineError::UnknownAperture(format!(
                "aperture D{op} is not defined"
            )));
        }
        cursor.aperture = Some(op);
        return Ok((None, cursor));
    }

    let fixed_point = [x_raw, y_raw, i_raw, j_raw]
        .iter()
        .flatten()
        .any(|raw| !raw.contains('.'));
    if fixed_point && cursor.format.is_none() {
        warnings.push(format!(
            "no coordinate format declared before `{command}`; assuming {DEFAULT_INTEGER_DIGITS}.{DEFAULT_DECIMAL_DIGITS}"
        ));
        cursor.format = Some(CoordinateFormat::new(
            gerber_zero_omission(cursor.zero_omission),
            gerber_coordinate_mode(cursor.coordinate_mode),
            DEFAULT_INTEGER_DIGITS,
            DEFAULT_DECIMAL_DIGITS,
        ));
    }

    let to = Point::new(
        decode_axis(x_raw, cursor.position.x, &cursor)?,
        decode_axis(y_raw, cursor.position.y, &cursor)?,
    );

    match op {
        2 => {
            cursor.position = to;
            Ok((None, cursor))
        }
        3 => {
            let aperture = stroke_aperture(&cursor, apertures)?;
            cursor.position = to;
            Ok((Some(Primitive::Flash { at: to, aperture }), cursor))
        }
        1 => {
            let aperture = stroke_aperture(&cursor, apertures)?;
            let primitive = match cursor.interpolation {
                InterpolationMode::Linear => Primitive::Draw {
                    from: cursor.position,
                    to,
                    aperture,
                },
                InterpolationMode::ClockwiseArc | InterpolationMode::CounterClockwiseArc => {
                    if matches!(cursor.quadrant, QuadrantMode::Single) {
                        return Err(PipelineError::UnsupportedFeature(
                            "single-quadrant arc mode (G74) is not supported".to_string(),
                        ));
                    }
                    if i_raw.is_none() && j_raw.is_none() {
                        return Err(PipelineError::Parse(format!(
                            "arc draw `{command}` has no center offset"
                        )));
                    }
                    let center_offset = Point::new(
                        decode_offset(i_raw, &cursor)?,
                        decode_offset(j_raw, &cursor)?,
                    );
                    let direction = if matches!(
                        cursor.interpolation,
                        InterpolationMode::ClockwiseArc
                    ) {
                        ArcDirection::Clockwise
                    } else {
                        ArcDirection::CounterClockwise
                    };
                    Primitive::Arc {
                        from: cursor.position,
                        to,
                        center_offset,
                        direction,
                        aperture,
                    }
                }
            };
            cursor.position = to;
            Ok((Some(primitive), cursor))
        }
        other => Err(PipelineError::Parse(format!(
            "unknown operation code D{other} in `{command}`"
        ))),
    }
}

/// Resolve the cursor's aperture for a draw or flash.
fn stroke_aperture(
    cursor: &Cursor,
    apertures: &BTreeMap<i32, Aperture>,
) -> Result<i32, PipelineError> {
    let Some(code) = cursor.aperture else {
        return Err(PipelineError::UnknownAperture(
            "no aperture selected before draw or flash".to_string(),
        ));
    };
    match apertures.get(&code) {
        None => Err(PipelineError::UnknownAperture(format!(
            "aperture D{code} is not defined"
        ))),
        Some(Aperture::Macro(name, _)) => Err(PipelineError::UnsupportedFeature(format!(
            "macro aperture `{name}` cannot be drawn or flashed"
        ))),
        Some(_) => Ok(code),
    }
}

/// Split a coordinate block into (letter, value) fields.
fn split_fields<'a>(
    block: &'a str,
    command: &str,
) -> Result<Vec<(char, &'a str)>, PipelineError> {
    let mut fields = Vec::new();
    let mut current: Option<(char, usize)> = None;
    for (index, ch) in block.char_indices() {
        if ch.is_ascii_alphabetic() {
            if let Some((letter, start)) = current.take() {
                fields.push((letter, block.get(start..index).unwrap_or("")));
            }
            current = Some((ch.to_ascii_uppercase(), index + ch.len_utf8()));
        } else if current.is_none() {
            return Err(PipelineError::Parse(format!(
                "unexpected character `{ch}` in `{command}`"
            )));
        }
    }
    if let Some((letter, start)) = current {
        fields.push((letter, block.get(start..).unwrap_or("")));
    }
    Ok(fields)
}

/// Decode one axis value, falling back to the modal current value.
fn decode_axis(
    raw: Option<&str>,
    current: f64,
    cursor: &Cursor,
) -> Result<f64, PipelineError> {
    let Some(raw) = raw else {
        return Ok(current);
    };
    let value = decode_coordinate(raw, cursor)?;
    match cursor.coordinate_mode {
        CoordinateMode::Absolute => Ok(value),
        CoordinateMode::Incremental => Ok(current + value),
    }
}

/// Decode an arc center offset; offsets are always relative values.
fn decode_offset(raw: Option<&str>, cursor: &Cursor) -> Result<f64, PipelineError> {
    match raw {
        Some(raw) => decode_coordinate(raw, cursor),
        None => Ok(0.0),
    }
}

/// Decode one coordinate field into millimeters.
///
/// Values containing a decimal point are taken verbatim in file units;
/// everything else is fixed-point per the declared format and
/// zero-omission convention.
fn decode_coordinate(raw: &str, cursor: &Cursor) -> Result<f64, PipelineError> {
    if raw.is_empty() {
        return Err(PipelineError::Parse("empty coordinate value".to_string()));
    }

    if raw.contains('.') {
        return Ok(parse_f64(raw, "coordinate")? * cursor.unit_scale);
    }

    let (sign, digits) = split_sign(raw);
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(PipelineError::Parse(format!(
            "invalid coordinate value `{raw}`"
        )));
    }

    let Some(format) = &cursor.format else {
        return Err(PipelineError::Parse(format!(
            "coordinate `{raw}` before any format declaration"
        )));
    };
    let divisor = 10_f64.powi(i32::from(format.decimal));

    let value = match cursor.zero_omission {
        ZeroOmission::Leading => parse_f64(digits, "coordinate")? / divisor,
        ZeroOmission::Trailing => {
            let width = usize::from(format.integer) + usize::from(format.decimal);
            let padded = format!("{digits:0<width$}");
            parse_f64(&padded, "coordinate")? / divisor
        }
    };

    Ok(sign * value * cursor.unit_scale)
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

fn parse_i32(raw: &str, label: &str) -> Result<i32, PipelineError> {
    raw.parse::<i32>()
        .map_err(|err| PipelineError::Parse(format!("invalid {label} `{raw}`: {err}")))
}

fn parse_f64(raw: &str, label: &str) -> Result<f64, PipelineError> {
    raw.parse::<f64>()
        .map_err(|err| PipelineError::Parse(format!("invalid {label} `{raw}`: {err}")))
}
