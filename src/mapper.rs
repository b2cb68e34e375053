use crate::affine::Matrix;
use crate::diagnostics::{Severity, WarningSink, codes};
use crate::drawable::{OutputDocument, VectorPathRecord};
use crate::options::{ConvertOptions, Viewport};
use crate::path::{PathTransformer, serialize_path};
use crate::precision::canonicalize;
use crate::shapes::shape_to_path;
use crate::style::{StyleAttributes, parse_length, resolve_paint};
use crate::tree::{ElementKind, GeometryClass, GeometryTree, NodeId, ShapeKind, UnsupportedKind};
use serde_json::json;
use std::collections::BTreeMap;

pub struct MapContext<'a> {
    pub options: &'a ConvertOptions,
    pub transformer: Option<&'a dyn PathTransformer>,
    /// Composed matrices for shapes, from normalization.
    pub shape_transforms: &'a BTreeMap<NodeId, Matrix>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapOutput {
    pub document: OutputDocument,
    pub path_count: usize,
    pub skipped_count: usize,
    pub viewport: Viewport,
}

/// Maps a normalized tree to the output document.
///
/// Unsupported constructs are reported once up front; the traversal itself
/// then skips them silently together with `defs` and text.
pub fn map_document(tree: &GeometryTree, ctx: &MapContext<'_>, sink: &mut WarningSink) -> MapOutput {
    scan_unsupported(tree, sink);
    let viewport = resolve_viewport(tree, ctx.options, sink);

    let mut paths = Vec::new();
    let mut skipped = 0usize;
    let mut stack = vec![tree.root()];

    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        match node.kind.geometry() {
            GeometryClass::Path => {
                let d = node.attr("d").map(str::trim).unwrap_or("");
                if d.is_empty() {
                    sink.push(
                        codes::PATH_EMPTY,
                        "<path> has empty \"d\". Skipped.",
                        Severity::Warn,
                        None,
                    );
                    skipped += 1;
                } else {
                    paths.push(build_record(tree, id, d.to_string(), ctx, sink));
                }
                continue;
            }
            GeometryClass::Shape(kind) => {
                match shape_data(tree, id, kind, ctx, sink) {
                    Some(d) => paths.push(build_record(tree, id, d, ctx, sink)),
                    None => skipped += 1,
                }
                continue;
            }
            GeometryClass::Unsupported(_) | GeometryClass::Text => continue,
            GeometryClass::Group if node.kind == ElementKind::Defs => continue,
            GeometryClass::Group | GeometryClass::Other => {}
        }
        stack.extend(node.children().iter().rev().copied());
    }

    log::debug!(
        target: "vdkit::mapper",
        "mapped {} paths, skipped {}, viewport {}x{}",
        paths.len(),
        skipped,
        viewport.width,
        viewport.height
    );

    MapOutput {
        path_count: paths.len(),
        skipped_count: skipped,
        viewport,
        document: OutputDocument {
            viewport,
            size_dp: ctx.options.default_size_dp,
            paths,
        },
    }
}

fn build_record(
    tree: &GeometryTree,
    id: NodeId,
    d: String,
    ctx: &MapContext<'_>,
    sink: &mut WarningSink,
) -> VectorPathRecord {
    let style = StyleAttributes::from_node(tree.node(id));
    let paint = resolve_paint(&style, sink);
    VectorPathRecord::new(canonicalize(&d, ctx.options.decimals), &paint)
}

fn shape_data(
    tree: &GeometryTree,
    id: NodeId,
    kind: ShapeKind,
    ctx: &MapContext<'_>,
    sink: &mut WarningSink,
) -> Option<String> {
    if !ctx.options.convert_shapes {
        sink.push(
            codes::SHAPE_SKIPPED,
            format!("<{}> not converted (shape conversion disabled).", kind.tag()),
            Severity::Info,
            Some(json!({ "element": kind.tag() })),
        );
        return None;
    }
    let Some(segs) = shape_to_path(tree.node(id), kind, sink) else {
        sink.push(
            codes::SHAPE_DEGENERATE,
            format!("<{}> has no drawable geometry. Skipped.", kind.tag()),
            Severity::Info,
            Some(json!({ "element": kind.tag() })),
        );
        return None;
    };
    let d = serialize_path(&segs);

    let Some(matrix) = ctx.shape_transforms.get(&id).copied() else {
        return Some(d);
    };
    match ctx.transformer {
        Some(transformer) => match transformer.transform(&d, matrix) {
            Ok(out) => Some(out),
            Err(reason) => {
                sink.push(
                    codes::PATH_TRANSFORM_FAILED,
                    format!("Failed to apply transform to <{}>: {}", kind.tag(), reason),
                    Severity::Warn,
                    Some(json!({ "reason": reason })),
                );
                Some(d)
            }
        },
        None => {
            sink.push(
                codes::PATH_TRANSFORM_UNAVAILABLE,
                "No path transformer available; transform not applied.",
                Severity::Warn,
                Some(json!({ "matrix": matrix.to_array() })),
            );
            Some(d)
        }
    }
}

fn scan_unsupported(tree: &GeometryTree, sink: &mut WarningSink) {
    let mut counts: BTreeMap<UnsupportedKind, usize> = BTreeMap::new();
    for id in tree.descendants(tree.root()) {
        if let GeometryClass::Unsupported(u) = tree.node(id).kind.geometry() {
            *counts.entry(u).or_default() += 1;
        }
    }
    let text = tree.count_kind(&ElementKind::Text);

    for kind in UnsupportedKind::ALL {
        let Some(&count) = counts.get(&kind) else {
            continue;
        };
        if kind == UnsupportedKind::ClipPath {
            sink.push(
                codes::CLIPPATH_LIMITED,
                "clipPath has limited support in VectorDrawable; shapes may not clip as expected.",
                Severity::Info,
                Some(json!({ "count": count })),
            );
        } else {
            sink.push(
                unsupported_code(kind),
                format!("Unsupported SVG feature <{}> detected; skipped.", kind.tag()),
                Severity::Warn,
                Some(json!({ "count": count })),
            );
        }
    }
    if text > 0 {
        sink.push(
            codes::UNSUPPORTED_TEXT,
            "Unsupported SVG feature <text> detected; convert text to paths before export.",
            Severity::Warn,
            Some(json!({ "count": text })),
        );
    }
}

fn unsupported_code(kind: UnsupportedKind) -> &'static str {
    match kind {
        UnsupportedKind::LinearGradient => codes::UNSUPPORTED_LINEARGRADIENT,
        UnsupportedKind::RadialGradient => codes::UNSUPPORTED_RADIALGRADIENT,
        UnsupportedKind::Pattern => codes::UNSUPPORTED_PATTERN,
        UnsupportedKind::Filter => codes::UNSUPPORTED_FILTER,
        UnsupportedKind::Mask => codes::UNSUPPORTED_MASK,
        UnsupportedKind::ForeignObject => codes::UNSUPPORTED_FOREIGNOBJECT,
        UnsupportedKind::ClipPath => codes::CLIPPATH_LIMITED,
    }
}

fn resolve_viewport(tree: &GeometryTree, options: &ConvertOptions, sink: &mut WarningSink) -> Viewport {
    let root = tree.node(tree.root());
    if let Some(vb) = root.attr("viewBox").and_then(parse_view_box) {
        return vb;
    }

    let width = root.attr("width").and_then(parse_length);
    let height = root.attr("height").and_then(parse_length);
    if let (Some(width), Some(height)) = (width, height) {
        let vp = Viewport::new(width, height);
        if vp.is_valid() {
            sink.push(
                codes::NO_VIEWBOX,
                "No viewBox on <svg>; using width/height as viewport.",
                Severity::Info,
                Some(json!({ "width": width, "height": height })),
            );
            return vp;
        }
    }

    let def = options.default_viewport;
    sink.push(
        codes::VIEWPORT_FALLBACK,
        format!(
            "Missing viewBox/size; using fallback viewport {}x{}.",
            def.width, def.height
        ),
        Severity::Warn,
        Some(json!({ "width": def.width, "height": def.height })),
    );
    def
}

// "minX minY width height"; only the size is used.
fn parse_view_box(input: &str) -> Option<Viewport> {
    let parts: Vec<f64> = input
        .split(|c: char| c == ',' || c.is_ascii_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<f64>().ok())
        .collect::<Option<Vec<_>>>()?;
    if parts.len() != 4 {
        return None;
    }
    Some(Viewport::new(parts[2], parts[3])).filter(Viewport::is_valid)
}
