// Arena-backed element tree.
//
// Nodes live in one Vec and refer to their children by index. Nothing points
// back to a parent, so passes that edit nodes address them by `NodeId`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Svg,
    Group,
    Anchor,
    Symbol,
    Defs,
    Use,
    ClipPath,
    Mask,
    Path,
    Rect,
    Circle,
    Ellipse,
    Line,
    Polyline,
    Polygon,
    Text,
    Tspan,
    LinearGradient,
    RadialGradient,
    Pattern,
    Filter,
    ForeignObject,
    Other(String),
}

impl ElementKind {
    pub fn from_tag(name: &str) -> Self {
        match name {
            "svg" => ElementKind::Svg,
            "g" => ElementKind::Group,
            "a" => ElementKind::Anchor,
            "symbol" => ElementKind::Symbol,
            "defs" => ElementKind::Defs,
            "use" => ElementKind::Use,
            "clipPath" => ElementKind::ClipPath,
            "mask" => ElementKind::Mask,
            "path" => ElementKind::Path,
            "rect" => ElementKind::Rect,
            "circle" => ElementKind::Circle,
            "ellipse" => ElementKind::Ellipse,
            "line" => ElementKind::Line,
            "polyline" => ElementKind::Polyline,
            "polygon" => ElementKind::Polygon,
            "text" => ElementKind::Text,
            "tspan" => ElementKind::Tspan,
            "linearGradient" => ElementKind::LinearGradient,
            "radialGradient" => ElementKind::RadialGradient,
            "pattern" => ElementKind::Pattern,
            "filter" => ElementKind::Filter,
            "foreignObject" => ElementKind::ForeignObject,
            other => ElementKind::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            ElementKind::Svg => "svg",
            ElementKind::Group => "g",
            ElementKind::Anchor => "a",
            ElementKind::Symbol => "symbol",
            ElementKind::Defs => "defs",
            ElementKind::Use => "use",
            ElementKind::ClipPath => "clipPath",
            ElementKind::Mask => "mask",
            ElementKind::Path => "path",
            ElementKind::Rect => "rect",
            ElementKind::Circle => "circle",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Line => "line",
            ElementKind::Polyline => "polyline",
            ElementKind::Polygon => "polygon",
            ElementKind::Text => "text",
            ElementKind::Tspan => "tspan",
            ElementKind::LinearGradient => "linearGradient",
            ElementKind::RadialGradient => "radialGradient",
            ElementKind::Pattern => "pattern",
            ElementKind::Filter => "filter",
            ElementKind::ForeignObject => "foreignObject",
            ElementKind::Other(name) => name,
        }
    }

    /// Kinds accepted as the root of a conversion.
    pub fn is_root_container(&self) -> bool {
        matches!(
            self,
            ElementKind::Svg | ElementKind::Group | ElementKind::Symbol
        )
    }

    /// Classified view used by the passes.
    pub fn geometry(&self) -> GeometryClass {
        match self {
            ElementKind::Svg
            | ElementKind::Group
            | ElementKind::Anchor
            | ElementKind::Symbol
            | ElementKind::Defs
            | ElementKind::Use => GeometryClass::Group,
            ElementKind::Path => GeometryClass::Path,
            ElementKind::Rect => GeometryClass::Shape(ShapeKind::Rect),
            ElementKind::Circle => GeometryClass::Shape(ShapeKind::Circle),
            ElementKind::Ellipse => GeometryClass::Shape(ShapeKind::Ellipse),
            ElementKind::Line => GeometryClass::Shape(ShapeKind::Line),
            ElementKind::Polyline => GeometryClass::Shape(ShapeKind::Polyline),
            ElementKind::Polygon => GeometryClass::Shape(ShapeKind::Polygon),
            ElementKind::LinearGradient => GeometryClass::Unsupported(UnsupportedKind::LinearGradient),
            ElementKind::RadialGradient => GeometryClass::Unsupported(UnsupportedKind::RadialGradient),
            ElementKind::Pattern => GeometryClass::Unsupported(UnsupportedKind::Pattern),
            ElementKind::Filter => GeometryClass::Unsupported(UnsupportedKind::Filter),
            ElementKind::Mask => GeometryClass::Unsupported(UnsupportedKind::Mask),
            ElementKind::ForeignObject => GeometryClass::Unsupported(UnsupportedKind::ForeignObject),
            ElementKind::ClipPath => GeometryClass::Unsupported(UnsupportedKind::ClipPath),
            ElementKind::Text | ElementKind::Tspan => GeometryClass::Text,
            ElementKind::Other(_) => GeometryClass::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Rect,
    Circle,
    Ellipse,
    Line,
    Polyline,
    Polygon,
}

impl ShapeKind {
    pub fn tag(self) -> &'static str {
        match self {
            ShapeKind::Rect => "rect",
            ShapeKind::Circle => "circle",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Line => "line",
            ShapeKind::Polyline => "polyline",
            ShapeKind::Polygon => "polygon",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnsupportedKind {
    LinearGradient,
    RadialGradient,
    Pattern,
    Filter,
    Mask,
    ForeignObject,
    ClipPath,
}

impl UnsupportedKind {
    pub const ALL: [UnsupportedKind; 7] = [
        UnsupportedKind::LinearGradient,
        UnsupportedKind::RadialGradient,
        UnsupportedKind::Pattern,
        UnsupportedKind::Filter,
        UnsupportedKind::Mask,
        UnsupportedKind::ForeignObject,
        UnsupportedKind::ClipPath,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            UnsupportedKind::LinearGradient => "linearGradient",
            UnsupportedKind::RadialGradient => "radialGradient",
            UnsupportedKind::Pattern => "pattern",
            UnsupportedKind::Filter => "filter",
            UnsupportedKind::Mask => "mask",
            UnsupportedKind::ForeignObject => "foreignObject",
            UnsupportedKind::ClipPath => "clipPath",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryClass {
    Path,
    Shape(ShapeKind),
    Group,
    Unsupported(UnsupportedKind),
    Text,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: ElementKind,
    attrs: Vec<(String, String)>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attr(name).is_some()
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self.attrs.iter().position(|(k, _)| k == name)?;
        Some(self.attrs.remove(idx).1)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryTree {
    nodes: Vec<Node>,
}

impl GeometryTree {
    pub fn new(root: Node) -> Self {
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends `node` as the last child of `parent`.
    ///
    /// # Panics
    /// When `parent` is not an id issued by this tree.
    pub fn append(&mut self, parent: NodeId, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Pre-order, document-order walk from `from` (inclusive).
    pub fn descendants(&self, from: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![from],
        }
    }

    pub fn count_kind(&self, kind: &ElementKind) -> usize {
        self.descendants(self.root())
            .filter(|id| &self.node(*id).kind == kind)
            .count()
    }
}

pub struct Descendants<'a> {
    tree: &'a GeometryTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.node(id).children.iter().rev().copied());
        Some(id)
    }
}
