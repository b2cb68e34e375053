use crate::diagnostics::{Severity, WarningSink, codes};
use crate::error::VdkitError;
use crate::tree::{ElementKind, GeometryTree, Node, NodeId};
use serde::Serialize;
use serde_json::json;

const FORBIDDEN_ELEMENTS: [&str; 3] = ["script", "foreignObject", "link"];

#[derive(Debug, Clone)]
pub struct ParsedSvg {
    pub tree: GeometryTree,
    pub source: SourceSize,
}

/// The root's `width`, `height` and `viewBox` as written in the source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSize {
    pub width: Option<String>,
    pub height: Option<String>,
    pub view_box: Option<String>,
}

impl SourceSize {
    pub fn of(tree: &GeometryTree) -> Self {
        let root = tree.node(tree.root());
        let attr = |name: &str| root.attr(name).map(str::to_string);
        Self {
            width: attr("width"),
            height: attr("height"),
            view_box: attr("viewBox"),
        }
    }
}

/// Parses SVG text into a sanitized arena tree.
///
/// Only element nodes are kept. `<script>`, `<foreignObject>` and `<link>`
/// subtrees and `on*` attributes are removed, each with an Info diagnostic.
/// Attributes are keyed by local name, so `xlink:href` becomes `href`.
pub fn parse_svg(text: &str, sink: &mut WarningSink) -> Result<ParsedSvg, VdkitError> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let doc = roxmltree::Document::parse_with_options(text, options)?;
    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(VdkitError::Structural(format!(
            "root element is <{}>, expected <svg>",
            root.tag_name().name()
        )));
    }

    let mut tree = GeometryTree::new(convert_element(root, sink));
    let mut stack: Vec<(roxmltree::Node<'_, '_>, NodeId)> = root
        .children()
        .filter(|n| n.is_element())
        .map(|n| (n, tree.root()))
        .collect();
    stack.reverse();

    while let Some((node, parent)) = stack.pop() {
        let name = node.tag_name().name();
        if FORBIDDEN_ELEMENTS.iter().any(|f| f.eq_ignore_ascii_case(name)) {
            sink.push(
                codes::SANITIZED_ELEMENT,
                format!("Removed <{}> element for safety.", name),
                Severity::Info,
                Some(json!({ "element": name })),
            );
            continue;
        }
        let id = tree.append(parent, convert_element(node, sink));
        let first = stack.len();
        stack.extend(node.children().filter(|n| n.is_element()).map(|n| (n, id)));
        stack[first..].reverse();
    }

    log::debug!(target: "vdkit::parse", "parsed {} elements", tree.len());
    Ok(ParsedSvg {
        source: SourceSize::of(&tree),
        tree,
    })
}

fn convert_element(node: roxmltree::Node<'_, '_>, sink: &mut WarningSink) -> Node {
    let tag = node.tag_name().name();
    let mut out = Node::new(ElementKind::from_tag(tag));
    for attr in node.attributes() {
        let name = attr.name();
        if is_event_handler(name) {
            sink.push(
                codes::SANITIZED_HANDLER,
                format!("Removed inline handler \"{}\" on <{}>.", name, tag),
                Severity::Info,
                Some(json!({ "attribute": name, "element": tag })),
            );
            continue;
        }
        out.set_attr(name, attr.value());
    }
    out
}

fn is_event_handler(name: &str) -> bool {
    name.as_bytes()
        .get(..2)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"on"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn builds_tree_in_document_order() {
        let mut sink = WarningSink::new();
        let parsed = parse_svg(
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="48">
                 <!-- comment -->
                 <g transform="scale(2)"><path d="M0 0"/><rect width="1" height="1"/></g>
                 <circle r="3"/>
               </svg>"#,
            &mut sink,
        )
        .unwrap();
        assert!(sink.is_empty());
        let tree = &parsed.tree;
        let tags: Vec<&str> = tree
            .descendants(tree.root())
            .map(|id| tree.node(id).kind.tag())
            .collect();
        assert_eq!(tags, vec!["svg", "g", "path", "rect", "circle"]);
        assert_eq!(parsed.source.view_box.as_deref(), Some("0 0 24 24"));
        assert_eq!(parsed.source.width.as_deref(), Some("48"));
        assert_eq!(parsed.source.height, None);
    }

    #[test]
    fn removes_scripts_links_foreign_objects_and_handlers() {
        let mut sink = WarningSink::new();
        let parsed = parse_svg(
            r#"<svg xmlns="http://www.w3.org/2000/svg" onload="x()">
                 <script>alert(1)</script>
                 <foreignObject><div/></foreignObject>
                 <link href="a.css"/>
                 <path d="M0 0" onClick="y()"/>
               </svg>"#,
            &mut sink,
        )
        .unwrap();
        assert_eq!(parsed.tree.len(), 2);
        assert_eq!(sink.count_code(codes::SANITIZED_ELEMENT), 3);
        assert_eq!(sink.count_code(codes::SANITIZED_HANDLER), 2);
        assert_eq!(sink.max_severity(), Some(Severity::Info));
        let path = parsed.tree.node(NodeId(1));
        assert!(!path.has_attr("onClick"));
        assert_eq!(path.attr("d"), Some("M0 0"));
    }

    #[test]
    fn namespaced_attributes_use_local_names() {
        let mut sink = WarningSink::new();
        let parsed = parse_svg(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
                  <use xlink:href="#a"/>
                </svg>"##,
            &mut sink,
        )
        .unwrap();
        assert_eq!(parsed.tree.node(NodeId(1)).attr("href"), Some("#a"));
    }

    #[test]
    fn rejects_malformed_and_foreign_roots() {
        let mut sink = WarningSink::new();
        assert!(matches!(
            parse_svg("<svg><g></svg>", &mut sink),
            Err(VdkitError::Xml(_))
        ));
        assert!(matches!(
            parse_svg("<html/>", &mut sink),
            Err(VdkitError::Structural(_))
        ));
    }

    #[test]
    fn non_ascii_names_do_not_trip_the_sanitizer() {
        let mut sink = WarningSink::new();
        let parsed = parse_svg(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" 中x=\"1\" é=\"2\"><path d=\"M0 0\" ö=\"3\"/><ünknown/></svg>",
            &mut sink,
        )
        .unwrap();
        assert!(sink.is_empty());
        assert_eq!(parsed.tree.len(), 3);
        let root = parsed.tree.node(parsed.tree.root());
        assert_eq!(root.attr("中x"), Some("1"));
        assert_eq!(root.attr("é"), Some("2"));
        assert_eq!(parsed.tree.node(NodeId(1)).attr("ö"), Some("3"));
        assert_eq!(
            parsed.tree.node(NodeId(2)).kind,
            ElementKind::Other("ünknown".to_string())
        );
    }

    #[test]
    fn mixed_case_handlers_removed_on_nested_elements() {
        let mut sink = WarningSink::new();
        let parsed = parse_svg(
            r#"<svg xmlns="http://www.w3.org/2000/svg">
                 <g ONMOUSEOVER="a()"><g oNfOcUs="b()"><path d="M0 0" OnError="c()" one="1"/></g></g>
                 <SCRIPT>d()</SCRIPT>
               </svg>"#,
            &mut sink,
        )
        .unwrap();
        assert_eq!(sink.count_code(codes::SANITIZED_HANDLER), 4);
        assert_eq!(sink.count_code(codes::SANITIZED_ELEMENT), 1);
        let path = parsed.tree.node(NodeId(3));
        assert_eq!(path.kind, ElementKind::Path);
        assert!(!path.has_attr("OnError"));
        // any "on" prefix counts, "one" included
        assert!(!path.has_attr("one"));
        assert!(parsed.tree.descendants(parsed.tree.root()).all(|id| {
            parsed.tree.node(id).attrs().all(|(name, _)| !is_event_handler(name))
        }));
    }

    #[test]
    fn prefixed_svg_root() {
        let mut sink = WarningSink::new();
        let parsed = parse_svg(
            r#"<s:svg xmlns:s="http://www.w3.org/2000/svg" s:viewBox="0 0 4 4"><s:path d="M1 1"/></s:svg>"#,
            &mut sink,
        )
        .unwrap();
        assert_eq!(parsed.source.view_box.as_deref(), Some("0 0 4 4"));
        assert_eq!(parsed.tree.node(NodeId(1)).kind, ElementKind::Path);
    }

    #[test]
    fn accepts_doctype() {
        let mut sink = WarningSink::new();
        let text = r#"<?xml version="1.0"?>
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<svg xmlns="http://www.w3.org/2000/svg"><path d="M1 1"/></svg>"#;
        assert_eq!(parse_svg(text, &mut sink).unwrap().tree.len(), 2);
    }

    proptest! {
        #[test]
        fn any_attribute_name_is_handled(name in "[\\p{L}_][\\p{L}\\p{N}_.-]{0,8}") {
            let mut sink = WarningSink::new();
            let text = format!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" {name}="1"><path {name}="2" d="M0 0"/></svg>"#
            );
            if let Ok(parsed) = parse_svg(&text, &mut sink) {
                let kept = parsed.tree.node(parsed.tree.root()).has_attr(&name);
                prop_assert_eq!(kept, !is_event_handler(&name));
            }
        }

        #[test]
        fn arbitrary_text_never_panics(text in "\\PC{0,200}") {
            let mut sink = WarningSink::new();
            let _ = parse_svg(&text, &mut sink);
        }
    }
}
