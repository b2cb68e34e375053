// Paint resolution for one geometry element.
//
// Supported subset:
// - presentation attributes + style="" for: fill, fill-opacity, fill-rule,
//   stroke, stroke-opacity, stroke-width, stroke-linecap, stroke-linejoin,
//   stroke-miterlimit, opacity
// - colors: #rgb, #rgba, #rrggbb, #rrggbbaa, rgb()/rgba(), none, transparent
//   and a small named set
// - no inheritance from ancestors; each element is resolved on its own

use crate::diagnostics::{Severity, WarningSink, codes};
use crate::tree::Node;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// 0.0..=1.0
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 1.0,
    };
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0.0,
    };

    const fn rgb(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b, a: 1.0 }
    }

    /// `#rrggbb`, lowercase. Alpha is carried separately by the output schema.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillType {
    #[default]
    NonZero,
    EvenOdd,
}

impl FillType {
    pub fn as_str(self) -> &'static str {
        match self {
            FillType::NonZero => "nonZero",
            FillType::EvenOdd => "evenOdd",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "butt" => Some(LineCap::Butt),
            "round" => Some(LineCap::Round),
            "square" => Some(LineCap::Square),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineCap::Butt => "butt",
            LineCap::Round => "round",
            LineCap::Square => "square",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "miter" => Some(LineJoin::Miter),
            "round" => Some(LineJoin::Round),
            "bevel" => Some(LineJoin::Bevel),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineJoin::Miter => "miter",
            LineJoin::Round => "round",
            LineJoin::Bevel => "bevel",
        }
    }
}

/// Raw, unvalidated style values of one element after the two-stage merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleAttributes {
    pub fill: Option<String>,
    pub fill_opacity: Option<String>,
    pub fill_rule: Option<String>,
    pub stroke: Option<String>,
    pub stroke_opacity: Option<String>,
    pub stroke_width: Option<String>,
    pub stroke_linecap: Option<String>,
    pub stroke_linejoin: Option<String>,
    pub stroke_miterlimit: Option<String>,
    pub opacity: Option<String>,
}

impl StyleAttributes {
    /// Presentation attributes first, then `style=""` declarations on top.
    pub fn from_node(node: &Node) -> Self {
        let mut out = StyleAttributes::default();
        for (name, value) in node.attrs() {
            out.set(name, value);
        }
        if let Some(style) = node.attr("style") {
            out.merge_declarations(style);
        }
        out
    }

    /// Applies `name: value; ...` declarations. Later declarations win.
    pub fn merge_declarations(&mut self, style: &str) {
        for decl in style.split(';') {
            let Some((name, value)) = decl.split_once(':') else {
                continue;
            };
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || value.is_empty() {
                continue;
            }
            self.set(name, value);
        }
    }

    fn set(&mut self, name: &str, value: &str) -> bool {
        let slot = match name {
            "fill" => &mut self.fill,
            "fill-opacity" => &mut self.fill_opacity,
            "fill-rule" => &mut self.fill_rule,
            "stroke" => &mut self.stroke,
            "stroke-opacity" => &mut self.stroke_opacity,
            "stroke-width" => &mut self.stroke_width,
            "stroke-linecap" => &mut self.stroke_linecap,
            "stroke-linejoin" => &mut self.stroke_linejoin,
            "stroke-miterlimit" => &mut self.stroke_miterlimit,
            "opacity" => &mut self.opacity,
            _ => return false,
        };
        *slot = Some(value.trim().to_string());
        true
    }
}

/// Validated paint for one output path. Alphas are clamped to 0..=1.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub fill_color: Option<Color>,
    pub fill_alpha: f64,
    pub stroke_color: Option<Color>,
    pub stroke_alpha: f64,
    pub stroke_width: Option<f64>,
    pub fill_type: FillType,
    pub line_cap: Option<LineCap>,
    pub line_join: Option<LineJoin>,
    pub miter_limit: Option<f64>,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            fill_color: Some(Color::BLACK),
            fill_alpha: 1.0,
            stroke_color: None,
            stroke_alpha: 1.0,
            stroke_width: None,
            fill_type: FillType::NonZero,
            line_cap: None,
            line_join: None,
            miter_limit: None,
        }
    }
}

pub fn resolve_paint(style: &StyleAttributes, sink: &mut WarningSink) -> Paint {
    let mut paint = Paint::default();
    let opacity = parse_opacity(style.opacity.as_deref());

    let fill = style.fill.as_deref().unwrap_or("#000");
    match parse_color(fill) {
        Some(color) => {
            paint.fill_color = Some(color);
            paint.fill_alpha =
                compose_alpha(color.a, parse_opacity(style.fill_opacity.as_deref()), opacity);
        }
        None => {
            sink.push(
                codes::COLOR_UNPARSEABLE,
                format!("Unparseable fill color: \"{}\". Using black.", fill),
                Severity::Warn,
                Some(json!({ "fill": fill })),
            );
            paint.fill_color = Some(Color::BLACK);
            paint.fill_alpha = 1.0;
        }
    }

    if let Some(stroke) = style.stroke.as_deref().filter(|s| !s.eq_ignore_ascii_case("none")) {
        match parse_color(stroke) {
            Some(color) => {
                paint.stroke_color = Some(color);
                paint.stroke_alpha = compose_alpha(
                    color.a,
                    parse_opacity(style.stroke_opacity.as_deref()),
                    opacity,
                );
                paint.stroke_width = style
                    .stroke_width
                    .as_deref()
                    .and_then(parse_float_prefix)
                    .map(|w| w.max(0.0));
            }
            None => sink.push(
                codes::COLOR_UNPARSEABLE,
                format!("Unparseable stroke color: \"{}\". Dropping stroke.", stroke),
                Severity::Warn,
                Some(json!({ "stroke": stroke })),
            ),
        }
    }

    if style
        .fill_rule
        .as_deref()
        .is_some_and(|r| r.eq_ignore_ascii_case("evenodd"))
    {
        paint.fill_type = FillType::EvenOdd;
    }

    if let Some(raw) = style.stroke_linecap.as_deref().filter(|v| !v.is_empty()) {
        let value = raw.to_ascii_lowercase();
        paint.line_cap = LineCap::parse(&value);
        if paint.line_cap.is_none() {
            sink.push(
                codes::STROKE_LINECAP_UNSUPPORTED,
                format!("Unsupported stroke-linecap: \"{}\".", value),
                Severity::Info,
                Some(json!({ "value": value })),
            );
        }
    }

    if let Some(raw) = style.stroke_linejoin.as_deref().filter(|v| !v.is_empty()) {
        let value = raw.to_ascii_lowercase();
        paint.line_join = LineJoin::parse(&value);
        if paint.line_join.is_none() {
            sink.push(
                codes::STROKE_LINEJOIN_UNSUPPORTED,
                format!("Unsupported stroke-linejoin: \"{}\".", value),
                Severity::Info,
                Some(json!({ "value": value })),
            );
        }
    }

    paint.miter_limit = style
        .stroke_miterlimit
        .as_deref()
        .and_then(parse_float_prefix)
        .filter(|m| *m > 0.0);

    paint
}

fn compose_alpha(color: f64, local: f64, element: f64) -> f64 {
    (clamp01(color) * clamp01(local) * clamp01(element)).clamp(0.0, 1.0)
}

fn clamp01(v: f64) -> f64 {
    if v.is_nan() { 1.0 } else { v.clamp(0.0, 1.0) }
}

// Missing or unparseable opacity is fully opaque; `50%` is 0.5.
fn parse_opacity(value: Option<&str>) -> f64 {
    let Some(v) = value.map(str::trim) else {
        return 1.0;
    };
    let parsed = match v.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok().map(|p| p / 100.0),
        None => parse_float_prefix(v),
    };
    parsed.map(clamp01).unwrap_or(1.0)
}

pub fn parse_color(input: &str) -> Option<Color> {
    let v = input.trim();
    if v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("transparent") {
        return Some(Color::TRANSPARENT);
    }
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(color) = parse_rgb_function(v) {
        return Some(color);
    }
    match v.to_ascii_lowercase().as_str() {
        "black" => Some(Color::BLACK),
        "white" => Some(Color::rgb(255, 255, 255)),
        "red" => Some(Color::rgb(255, 0, 0)),
        "green" => Some(Color::rgb(0, 128, 0)),
        "blue" => Some(Color::rgb(0, 0, 255)),
        "gray" => Some(Color::rgb(128, 128, 128)),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let (r, g, b, a) = match hex.len() {
        3 => (nibble(0)?, nibble(1)?, nibble(2)?, 255),
        4 => (nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?),
        6 => (byte(0)?, byte(2)?, byte(4)?, 255),
        8 => (byte(0)?, byte(2)?, byte(4)?, byte(6)?),
        _ => return None,
    };
    Some(Color {
        r,
        g,
        b,
        a: a as f64 / 255.0,
    })
}

fn parse_rgb_function(v: &str) -> Option<Color> {
    let lower = v.to_ascii_lowercase();
    let body = lower
        .strip_prefix("rgba")
        .or_else(|| lower.strip_prefix("rgb"))?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')?;

    let parts: Vec<&str> = if body.contains(',') {
        body.split(',').map(str::trim).collect()
    } else {
        body.split(|c: char| c.is_ascii_whitespace() || c == '/')
            .filter(|p| !p.is_empty())
            .collect()
    };
    if parts.len() < 3 {
        return None;
    }

    let channel = |p: &str| -> Option<u8> {
        let value = match p.strip_suffix('%') {
            Some(pct) => pct.trim().parse::<f64>().ok()? * 255.0 / 100.0,
            None => p.parse::<f64>().ok()?,
        };
        if !value.is_finite() {
            return None;
        }
        Some(value.clamp(0.0, 255.0).round() as u8)
    };
    let alpha = match parts.get(3) {
        Some(p) => {
            let a = match p.strip_suffix('%') {
                Some(pct) => pct.trim().parse::<f64>().ok()? / 100.0,
                None => p.parse::<f64>().ok()?,
            };
            if a.is_nan() {
                return None;
            }
            a.clamp(0.0, 1.0)
        }
        None => 1.0,
    };

    Some(Color {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a: alpha,
    })
}

/// Leading decimal number of `input`, ignoring whatever follows (`"2px"` -> 2).
pub fn parse_float_prefix(input: &str) -> Option<f64> {
    let s = input.trim();
    let end = numeric_prefix_len(s)?;
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// A length made of one number and an optional unit suffix (`12`, `12.5px`,
/// `100%`). The unit is dropped without conversion.
pub fn parse_length(input: &str) -> Option<f64> {
    let s = input.trim();
    let end = numeric_prefix_len(s)?;
    if !s[end..].bytes().all(|b| b.is_ascii_alphabetic() || b == b'%') {
        return None;
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

// Byte length of the number at the start of `s`; an exponent only counts when
// digits follow it, so `1em` stops after `1`.
fn numeric_prefix_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut j = frac_start;
        while bytes.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        if j > frac_start || has_digits {
            has_digits |= j > frac_start;
            end = j;
        }
    }
    if !has_digits {
        return None;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut j = end + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while bytes.get(j).is_some_and(u8::is_ascii_digit) {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }
    Some(end)
}
