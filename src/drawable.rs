// VectorDrawable output model and its XML writer.

use crate::options::Viewport;
use crate::precision::canonicalize_number;
use crate::style::{FillType, LineCap, LineJoin, Paint};

const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";
const ATTR_DECIMALS: u8 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorPathRecord {
    pub path_data: String,
    pub fill_color: Option<String>,
    pub fill_alpha: f64,
    pub stroke_color: Option<String>,
    pub stroke_alpha: f64,
    pub stroke_width: Option<f64>,
    pub fill_type: FillType,
    pub stroke_line_cap: Option<LineCap>,
    pub stroke_line_join: Option<LineJoin>,
    pub stroke_miter_limit: Option<f64>,
}

impl VectorPathRecord {
    pub fn new(path_data: String, paint: &Paint) -> Self {
        Self {
            path_data,
            fill_color: paint.fill_color.map(|c| c.to_hex()),
            fill_alpha: paint.fill_alpha.clamp(0.0, 1.0),
            stroke_color: paint.stroke_color.map(|c| c.to_hex()),
            stroke_alpha: paint.stroke_alpha.clamp(0.0, 1.0),
            stroke_width: paint.stroke_width,
            fill_type: paint.fill_type,
            stroke_line_cap: paint.line_cap,
            stroke_line_join: paint.line_join,
            stroke_miter_limit: paint.miter_limit,
        }
    }

    /// Attributes in output order; fields at their schema default are omitted.
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![("pathData", self.path_data.clone())];
        if let Some(color) = &self.fill_color {
            out.push(("fillColor", color.clone()));
        }
        if let Some(alpha) = partial_alpha(self.fill_alpha) {
            out.push(("fillAlpha", alpha));
        }
        if let Some(color) = &self.stroke_color {
            out.push(("strokeColor", color.clone()));
            if let Some(alpha) = partial_alpha(self.stroke_alpha) {
                out.push(("strokeAlpha", alpha));
            }
        }
        if let Some(width) = self.stroke_width.and_then(positive_attr) {
            out.push(("strokeWidth", width));
        }
        if self.fill_type == FillType::EvenOdd {
            out.push(("fillType", self.fill_type.as_str().to_string()));
        }
        if let Some(cap) = self.stroke_line_cap {
            out.push(("strokeLineCap", cap.as_str().to_string()));
        }
        if let Some(join) = self.stroke_line_join {
            out.push(("strokeLineJoin", join.as_str().to_string()));
        }
        if let Some(limit) = self.stroke_miter_limit.and_then(positive_attr) {
            out.push(("strokeMiterLimit", limit));
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputDocument {
    pub viewport: Viewport,
    pub size_dp: f64,
    pub paths: Vec<VectorPathRecord>,
}

impl OutputDocument {
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        out.push_str("<vector xmlns:android=\"");
        out.push_str(ANDROID_NS);
        out.push('"');
        let size = format!("{}dp", fmt_attr(self.size_dp));
        push_attr(&mut out, "viewportWidth", &fmt_attr(self.viewport.width));
        push_attr(&mut out, "viewportHeight", &fmt_attr(self.viewport.height));
        push_attr(&mut out, "width", &size);
        push_attr(&mut out, "height", &size);
        out.push_str(">\n");
        for path in &self.paths {
            out.push_str("  <path");
            for (name, value) in path.attributes() {
                push_attr(&mut out, name, &value);
            }
            out.push_str(" />\n");
        }
        out.push_str("</vector>");
        out
    }
}

fn fmt_attr(value: f64) -> String {
    canonicalize_number(value, ATTR_DECIMALS).unwrap_or_else(|| "0".to_string())
}

// Decided on the rounded text, so 0.9996 counts as opaque.
fn partial_alpha(alpha: f64) -> Option<String> {
    let text = fmt_attr(alpha);
    (text != "1").then_some(text)
}

fn positive_attr(value: f64) -> Option<String> {
    if value <= 0.0 {
        return None;
    }
    let text = fmt_attr(value);
    (text != "0").then_some(text)
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push_str(" android:");
    out.push_str(name);
    out.push_str("=\"");
    escape_xml_attr(value, out);
    out.push('"');
}

fn escape_xml_attr(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
