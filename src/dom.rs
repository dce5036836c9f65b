//! Rendered-tree model the engine operates on.
//!
//! The host owns a [`Document`] and mirrors its rendered page into it: element
//! and text nodes, attributes, class lists, inline style properties and the
//! layout rect of every element (viewport coordinates, as a layout pass would
//! produce them). Structural and text changes are recorded in a drainable
//! mutation journal; attribute and style writes are not journaled, so the
//! engine's own tagging never feeds back into its rescan pipeline.

use indextree::{Arena, NodeId};

/// Axis-aligned box in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.left() && x <= self.right() && y >= self.top() && y <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.top() < other.bottom()
            && self.bottom() > other.top()
    }
}

/// Scroll offsets and inner size of the viewing window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height, scroll_x: 0.0, scroll_y: 0.0 }
    }

    /// The visible region in viewport coordinates.
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone, Default)]
pub struct ElementData {
    pub tag: String,
    pub rect: Rect,
    pub display_none: bool,
    pub visibility_hidden: bool,
    attrs: Vec<(String, String)>,
    classes: Vec<String>,
    style: Vec<(String, String)>,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self { tag: tag.to_string(), ..Self::default() }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(key, _)| key == name)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            entry.1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    pub fn style_property(&self, name: &str) -> Option<&str> {
        self.style
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_style_property(&mut self, name: &str, value: &str) {
        if let Some(entry) = self.style.iter_mut().find(|(key, _)| key == name) {
            entry.1 = value.to_string();
        } else {
            self.style.push((name.to_string(), value.to_string()));
        }
    }

    pub fn remove_style_property(&mut self, name: &str) {
        self.style.retain(|(key, _)| key != name);
    }

    /// True when the element does not render (display:none or visibility:hidden).
    pub fn is_hidden(&self) -> bool {
        self.display_none || self.visibility_hidden
    }
}

/// One entry in the mutation journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// A node was inserted (subtree roots only).
    Added(NodeId),
    /// The content of a text node changed.
    TextChanged(NodeId),
    /// A node and its subtree were removed.
    Removed(NodeId),
}

impl Mutation {
    pub fn node(&self) -> NodeId {
        match self {
            Self::Added(id) | Self::TextChanged(id) | Self::Removed(id) => *id,
        }
    }
}

/// Arena-backed document tree with a drainable mutation journal.
#[derive(Debug)]
pub struct Document {
    arena: Arena<NodeKind>,
    root: NodeId,
    viewport: Viewport,
    /// Whether the host platform can report viewport intersections.
    /// When false the visibility tracker degrades to the full tagged set.
    pub intersection_supported: bool,
    journal: Vec<Mutation>,
}

impl Document {
    pub fn new(viewport: Viewport) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeKind::Element(ElementData::new("body")));
        Self { arena, root, viewport, intersection_supported: true, journal: Vec::new() }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// True while the node is attached to the tree.
    pub fn alive(&self, id: NodeId) -> bool {
        self.arena.get(id).is_some_and(|node| !node.is_removed())
    }

    pub fn create_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.arena.new_node(NodeKind::Element(ElementData::new(tag)));
        parent.append(id, &mut self.arena);
        self.journal.push(Mutation::Added(id));
        id
    }

    pub fn create_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.arena.new_node(NodeKind::Text(text.to_string()));
        parent.append(id, &mut self.arena);
        self.journal.push(Mutation::Added(id));
        id
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(NodeKind::Text(content)) = self.node_mut(id) {
            if content != text {
                *content = text.to_string();
                self.journal.push(Mutation::TextChanged(id));
            }
        }
    }

    pub fn remove(&mut self, id: NodeId) {
        if !self.alive(id) {
            return;
        }
        self.journal.push(Mutation::Removed(id));
        id.remove_subtree(&mut self.arena);
    }

    /// Drains the mutation journal, oldest first.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.journal)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.node(id)? {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match self.node_mut(id)? {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.node(id)? {
            NodeKind::Text(content) => Some(content.as_str()),
            NodeKind::Element(_) => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id), Some(NodeKind::Text(_)))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id)?.parent()
    }

    /// Nearest element ancestor, the node itself included when it is one.
    pub fn parent_element(&self, id: NodeId) -> Option<NodeId> {
        if !self.alive(id) {
            return None;
        }
        id.ancestors(&self.arena).find(|&anc| self.element(anc).is_some())
    }

    /// Walks ancestors (self included) and returns the first element matching
    /// the predicate.
    pub fn closest<F>(&self, id: NodeId, predicate: F) -> Option<NodeId>
    where
        F: Fn(&ElementData) -> bool,
    {
        if !self.alive(id) {
            return None;
        }
        id.ancestors(&self.arena)
            .find(|&anc| self.element(anc).is_some_and(&predicate))
    }

    /// All nodes under `root` in document order, `root` included.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        if !self.alive(root) {
            return Vec::new();
        }
        root.descendants(&self.arena).collect()
    }

    /// Text nodes under `root` in document order.
    pub fn text_nodes(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.is_text(id))
            .collect()
    }

    /// Element nodes under `root` in document order, `root` included.
    pub fn elements(&self, root: NodeId) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|&id| self.element(id).is_some())
            .collect()
    }

    /// The deepest visible element whose layout rect contains the point.
    pub fn element_at(&self, x: f64, y: f64) -> Option<NodeId> {
        let mut hit = None;
        let mut hit_depth = 0;
        for id in self.descendants(self.root) {
            let Some(data) = self.element(id) else { continue };
            if data.is_hidden() || !data.rect.contains(x, y) {
                continue;
            }
            let depth = id.ancestors(&self.arena).count();
            if depth >= hit_depth {
                hit = Some(id);
                hit_depth = depth;
            }
        }
        hit
    }

    fn node(&self, id: NodeId) -> Option<&NodeKind> {
        let node = self.arena.get(id)?;
        if node.is_removed() { None } else { Some(node.get()) }
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeKind> {
        let node = self.arena.get_mut(id)?;
        if node.is_removed() { None } else { Some(node.get_mut()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::new(Viewport::new(1024.0, 768.0))
    }

    #[test]
    fn test_parent_element_of_text_node() {
        let mut doc = doc();
        let div = doc.create_element(doc.root(), "div");
        let text = doc.create_text(div, "hello");
        assert_eq!(doc.parent_element(text), Some(div));
        assert_eq!(doc.parent_element(div), Some(div));
    }

    #[test]
    fn test_closest_walks_ancestors() {
        let mut doc = doc();
        let outer = doc.create_element(doc.root(), "section");
        let inner = doc.create_element(outer, "span");
        let text = doc.create_text(inner, "x");
        doc.element_mut(outer).unwrap().set_attr("data-x", "");
        assert_eq!(doc.closest(text, |el| el.has_attr("data-x")), Some(outer));
        assert_eq!(doc.closest(text, |el| el.tag == "em"), None);
    }

    #[test]
    fn test_element_at_prefers_deepest() {
        let mut doc = doc();
        let outer = doc.create_element(doc.root(), "div");
        let inner = doc.create_element(outer, "span");
        doc.element_mut(doc.root()).unwrap().rect = Rect::new(0.0, 0.0, 1024.0, 768.0);
        doc.element_mut(outer).unwrap().rect = Rect::new(10.0, 10.0, 200.0, 100.0);
        doc.element_mut(inner).unwrap().rect = Rect::new(20.0, 20.0, 50.0, 20.0);
        assert_eq!(doc.element_at(30.0, 30.0), Some(inner));
        assert_eq!(doc.element_at(150.0, 50.0), Some(outer));
        assert_eq!(doc.element_at(900.0, 700.0), Some(doc.root()));
    }

    #[test]
    fn test_element_at_skips_hidden() {
        let mut doc = doc();
        let div = doc.create_element(doc.root(), "div");
        doc.element_mut(div).unwrap().rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        doc.element_mut(div).unwrap().display_none = true;
        assert_eq!(doc.element_at(50.0, 50.0), None);
    }

    #[test]
    fn test_journal_records_structure_and_text_only() {
        let mut doc = doc();
        let div = doc.create_element(doc.root(), "div");
        let text = doc.create_text(div, "a");
        doc.element_mut(div).unwrap().set_attr("data-lens-encoded", "");
        doc.set_text(text, "b");
        doc.set_text(text, "b"); // unchanged, not journaled
        doc.remove(div);
        assert_eq!(
            doc.take_mutations(),
            vec![
                Mutation::Added(div),
                Mutation::Added(text),
                Mutation::TextChanged(text),
                Mutation::Removed(div),
            ]
        );
        assert!(doc.take_mutations().is_empty());
        assert!(!doc.alive(div));
        assert!(!doc.alive(text));
    }

    #[test]
    fn test_rect_edges_and_containment() {
        let rect = Rect::new(10.0, 20.0, 100.0, 50.0);
        assert_eq!(rect.right(), 110.0);
        assert_eq!(rect.bottom(), 70.0);
        assert!(rect.contains(10.0, 20.0));
        assert!(rect.contains(110.0, 70.0));
        assert!(!rect.contains(111.0, 70.0));
    }
}
