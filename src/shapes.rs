use crate::diagnostics::{Severity, WarningSink, codes};
use crate::path::{PathSeg, parse_number_list};
use crate::style::parse_length;
use crate::tree::{Node, ShapeKind};
use serde_json::json;

/// Reduces a primitive shape to path segments in its own user space.
///
/// Returns `None` when the shape is degenerate (non-positive size or radius,
/// fewer than two points); the caller counts it as skipped. Rounded rect
/// corners are dropped with a Warn diagnostic.
pub fn shape_to_path(node: &Node, kind: ShapeKind, sink: &mut WarningSink) -> Option<Vec<PathSeg>> {
    match kind {
        ShapeKind::Rect => rect_to_path(node, sink),
        ShapeKind::Circle => {
            let r = length(node, "r")?;
            ellipse_to_path_impl(coord(node, "cx"), coord(node, "cy"), r, r)
        }
        ShapeKind::Ellipse => {
            let rx = length(node, "rx")?;
            let ry = length(node, "ry")?;
            ellipse_to_path_impl(coord(node, "cx"), coord(node, "cy"), rx, ry)
        }
        ShapeKind::Line => Some(vec![
            PathSeg::MoveTo(coord(node, "x1"), coord(node, "y1")),
            PathSeg::LineTo(coord(node, "x2"), coord(node, "y2")),
        ]),
        ShapeKind::Polyline => poly_points_to_path(node, false),
        ShapeKind::Polygon => poly_points_to_path(node, true),
    }
}

fn rect_to_path(node: &Node, sink: &mut WarningSink) -> Option<Vec<PathSeg>> {
    let x = coord(node, "x");
    let y = coord(node, "y");
    let w = length(node, "width")?;
    let h = length(node, "height")?;
    if w <= 0.0 || h <= 0.0 {
        return None;
    }

    let rx = node.attr("rx").and_then(parse_length);
    let ry = node.attr("ry").and_then(parse_length);
    if rx.is_some_and(|v| v > 0.0) || ry.is_some_and(|v| v > 0.0) {
        sink.push(
            codes::RECT_ROUNDED_IGNORED,
            "Rounded rect rx/ry ignored; exporting sharp corners.",
            Severity::Warn,
            Some(json!({ "rx": rx, "ry": ry })),
        );
    }

    Some(vec![
        PathSeg::MoveTo(x, y),
        PathSeg::LineTo(x + w, y),
        PathSeg::LineTo(x + w, y + h),
        PathSeg::LineTo(x, y + h),
        PathSeg::Close,
    ])
}

// Two half-ellipse arcs through the horizontal extremes.
fn ellipse_to_path_impl(cx: f64, cy: f64, rx: f64, ry: f64) -> Option<Vec<PathSeg>> {
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    let half = |x: f64| PathSeg::ArcTo {
        rx,
        ry,
        rotation: 0.0,
        large_arc: true,
        sweep: false,
        x,
        y: cy,
    };
    Some(vec![
        PathSeg::MoveTo(cx + rx, cy),
        half(cx - rx),
        half(cx + rx),
        PathSeg::Close,
    ])
}

fn poly_points_to_path(node: &Node, close: bool) -> Option<Vec<PathSeg>> {
    let points = parse_points(node.attr("points")?);
    if points.len() < 2 {
        return None;
    }
    let mut segs = Vec::with_capacity(points.len() + 1);
    segs.push(PathSeg::MoveTo(points[0].0, points[0].1));
    for (x, y) in points.into_iter().skip(1) {
        segs.push(PathSeg::LineTo(x, y));
    }
    if close {
        segs.push(PathSeg::Close);
    }
    Some(segs)
}

// A trailing unpaired number is ignored.
fn parse_points(input: &str) -> Vec<(f64, f64)> {
    parse_number_list(input)
        .chunks_exact(2)
        .map(|p| (p[0], p[1]))
        .collect()
}

fn coord(node: &Node, name: &str) -> f64 {
    node.attr(name).and_then(parse_length).unwrap_or(0.0)
}

fn length(node: &Node, name: &str) -> Option<f64> {
    node.attr(name).and_then(parse_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::serialize_path;
    use crate::tree::ElementKind;

    fn convert(node: Node, kind: ShapeKind) -> (Option<String>, WarningSink) {
        let mut sink = WarningSink::new();
        let d = shape_to_path(&node, kind, &mut sink).map(|segs| serialize_path(&segs));
        (d, sink)
    }

    #[test]
    fn rect_is_four_segment_closed_path() {
        let node = Node::new(ElementKind::Rect)
            .with_attr("width", "10")
            .with_attr("height", "10");
        let (d, sink) = convert(node, ShapeKind::Rect);
        assert_eq!(d.as_deref(), Some("M 0 0 L 10 0 L 10 10 L 0 10 Z"));
        assert!(sink.is_empty());
    }

    #[test]
    fn rounded_rect_warns_once() {
        let node = Node::new(ElementKind::Rect)
            .with_attr("x", "1")
            .with_attr("y", "2")
            .with_attr("width", "10")
            .with_attr("height", "10")
            .with_attr("rx", "2");
        let (d, sink) = convert(node, ShapeKind::Rect);
        assert_eq!(d.as_deref(), Some("M 1 2 L 11 2 L 11 12 L 1 12 Z"));
        assert_eq!(sink.len(), 1);
        let diag = &sink.as_slice()[0];
        assert_eq!(diag.code, codes::RECT_ROUNDED_IGNORED);
        assert_eq!(diag.severity, Severity::Warn);
        assert_eq!(diag.meta, Some(json!({ "rx": 2.0, "ry": null })));
    }

    #[test]
    fn zero_radius_rect_does_not_warn() {
        let node = Node::new(ElementKind::Rect)
            .with_attr("width", "4")
            .with_attr("height", "4")
            .with_attr("rx", "0");
        let (_, sink) = convert(node, ShapeKind::Rect);
        assert!(sink.is_empty());
    }

    #[test]
    fn degenerate_shapes_are_dropped() {
        let cases = [
            (Node::new(ElementKind::Rect).with_attr("width", "0").with_attr("height", "5"), ShapeKind::Rect),
            (Node::new(ElementKind::Rect).with_attr("width", "-3").with_attr("height", "5"), ShapeKind::Rect),
            (Node::new(ElementKind::Circle).with_attr("r", "0"), ShapeKind::Circle),
            (Node::new(ElementKind::Circle), ShapeKind::Circle),
            (Node::new(ElementKind::Ellipse).with_attr("rx", "3"), ShapeKind::Ellipse),
            (Node::new(ElementKind::Polyline).with_attr("points", "1 2 3"), ShapeKind::Polyline),
            (Node::new(ElementKind::Polygon), ShapeKind::Polygon),
        ];
        for (node, kind) in cases {
            let (d, sink) = convert(node, kind);
            assert_eq!(d, None, "{:?}", kind);
            assert!(sink.is_empty());
        }
    }

    #[test]
    fn circle_and_ellipse_use_two_arcs() {
        let node = Node::new(ElementKind::Circle)
            .with_attr("cx", "12")
            .with_attr("cy", "12")
            .with_attr("r", "10");
        let (d, _) = convert(node, ShapeKind::Circle);
        assert_eq!(
            d.as_deref(),
            Some("M 22 12 A 10 10 0 1 0 2 12 A 10 10 0 1 0 22 12 Z")
        );

        let node = Node::new(ElementKind::Ellipse)
            .with_attr("rx", "4")
            .with_attr("ry", "2");
        let (d, _) = convert(node, ShapeKind::Ellipse);
        assert_eq!(d.as_deref(), Some("M 4 0 A 4 2 0 1 0 -4 0 A 4 2 0 1 0 4 0 Z"));
    }

    #[test]
    fn line_is_open_two_point_path() {
        let node = Node::new(ElementKind::Line)
            .with_attr("x1", "1")
            .with_attr("y1", "2")
            .with_attr("x2", "3px")
            .with_attr("y2", "4");
        let (d, _) = convert(node, ShapeKind::Line);
        assert_eq!(d.as_deref(), Some("M 1 2 L 3 4"));
    }

    #[test]
    fn polygon_closes_and_polyline_does_not() {
        let pts = "0,0 10,0 10,10 7";
        let (d, _) = convert(
            Node::new(ElementKind::Polygon).with_attr("points", pts),
            ShapeKind::Polygon,
        );
        assert_eq!(d.as_deref(), Some("M 0 0 L 10 0 L 10 10 Z"));
        let (d, _) = convert(
            Node::new(ElementKind::Polyline).with_attr("points", pts),
            ShapeKind::Polyline,
        );
        assert_eq!(d.as_deref(), Some("M 0 0 L 10 0 L 10 10"));
    }

    #[test]
    fn points_follow_the_number_list_grammar() {
        let (d, _) = convert(
            Node::new(ElementKind::Polyline).with_attr("points", "0,0 10-5-2.5.5"),
            ShapeKind::Polyline,
        );
        assert_eq!(d.as_deref(), Some("M 0 0 L 10 -5 L -2.5 0.5"));

        // points after a malformed token are dropped
        let (d, _) = convert(
            Node::new(ElementKind::Polygon).with_attr("points", "0 0 4 0 4 4 oops 9 9"),
            ShapeKind::Polygon,
        );
        assert_eq!(d.as_deref(), Some("M 0 0 L 4 0 L 4 4 Z"));
    }
}
