use crate::affine::{Matrix, compose, parse_transform};
use crate::diagnostics::{Severity, WarningSink, codes};
use crate::error::VdkitError;
use crate::path::PathTransformer;
use crate::tree::{GeometryClass, GeometryTree, NodeId};
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    pub convert_shapes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeReport {
    pub flattened_paths: usize,
    /// Composed matrices of shapes that still need baking once they are
    /// rasterized. Only filled when shape conversion is enabled.
    pub shape_transforms: BTreeMap<NodeId, Matrix>,
}

/// Bakes every inherited `transform` into path coordinates.
///
/// Walks depth first from the root with an accumulated matrix. Containers pass
/// their composed matrix down and lose their own `transform`. Paths are
/// rewritten by `transformer` into absolute, expanded commands in root space
/// and lose their `transform`. Shapes keep theirs when shape conversion is off
/// (with an Info diagnostic); otherwise their composed matrix is recorded in the
/// report and the attribute is dropped.
///
/// A root that is not a container fails before anything is touched.
pub fn normalize_tree(
    tree: &mut GeometryTree,
    options: NormalizeOptions,
    transformer: Option<&dyn PathTransformer>,
    sink: &mut WarningSink,
) -> Result<NormalizeReport, VdkitError> {
    let root_kind = &tree.node(tree.root()).kind;
    if !root_kind.is_root_container() {
        return Err(VdkitError::Structural(format!(
            "root element <{}> is not a container",
            root_kind.tag()
        )));
    }

    let mut report = NormalizeReport::default();
    let mut stack: Vec<(NodeId, Matrix)> = vec![(tree.root(), Matrix::identity())];

    while let Some((id, inherited)) = stack.pop() {
        let own = tree.node(id).attr("transform").map(parse_transform);
        let ctm = compose(inherited, own.unwrap_or_default());

        match tree.node(id).kind.geometry() {
            GeometryClass::Path => {
                flatten_path(tree, id, ctm, transformer, sink);
                report.flattened_paths += 1;
                continue;
            }
            GeometryClass::Shape(kind) => {
                if options.convert_shapes {
                    tree.node_mut(id).remove_attr("transform");
                    if !ctm.is_identity() {
                        report.shape_transforms.insert(id, ctm);
                    }
                } else if own.is_some_and(|m| !m.is_identity()) {
                    sink.push(
                        codes::SHAPE_TRANSFORM_RETAINED,
                        format!(
                            "<{}> retains its transform; enable shape conversion to bake it into path data.",
                            kind.tag()
                        ),
                        Severity::Info,
                        Some(json!({ "element": kind.tag() })),
                    );
                }
            }
            GeometryClass::Group | GeometryClass::Unsupported(_) => {
                tree.node_mut(id).remove_attr("transform");
            }
            GeometryClass::Text | GeometryClass::Other => {}
        }

        let children = tree.node(id).children();
        stack.extend(children.iter().rev().map(|child| (*child, ctm)));
    }

    log::debug!(
        target: "vdkit::normalize",
        "flattened {} paths, {} shapes pending",
        report.flattened_paths,
        report.shape_transforms.len()
    );
    Ok(report)
}

fn flatten_path(
    tree: &mut GeometryTree,
    id: NodeId,
    ctm: Matrix,
    transformer: Option<&dyn PathTransformer>,
    sink: &mut WarningSink,
) {
    let node = tree.node_mut(id);
    node.remove_attr("transform");
    let Some(d) = node.attr("d").filter(|d| !d.trim().is_empty()) else {
        return;
    };

    match transformer {
        Some(transformer) => match transformer.transform(d, ctm) {
            Ok(out) => node.set_attr("d", &out),
            Err(reason) => sink.push(
                codes::PATH_TRANSFORM_FAILED,
                format!("Failed to apply transform to path: {}", reason),
                Severity::Warn,
                Some(json!({ "reason": reason })),
            ),
        },
        None if !ctm.is_identity() => sink.push(
            codes::PATH_TRANSFORM_UNAVAILABLE,
            "No path transformer available; transform not applied.",
            Severity::Warn,
            Some(json!({ "matrix": ctm.to_array() })),
        ),
        None => {}
    }
}
