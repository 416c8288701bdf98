//! Arena-backed HTML tree.
//!
//! Nodes live in one `Vec` and are addressed by [`NodeId`]. Passes that
//! restructure content build a new child list for a node and swap it in with
//! [`Document::set_children`]; nothing is spliced while a list is being walked.

mod entities;
mod parser;
mod prepare;
mod serializer;

use thiserror::Error;

use crate::attrs::Attributes;

/// Error parsing HTML into a [`Document`].
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("HTML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("HTML encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}

/// Index of a node in its [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// An element's tag name and ordered attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
        }
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(key, _)| key == name) {
            slot.1 = value;
        } else {
            self.attrs.push((name.to_owned(), value));
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|(key, _)| key == name)?;
        Some(self.attrs.remove(index).1)
    }

    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let classes = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_owned(),
        };
        self.set_attr("class", classes);
    }

    /// Merge parsed attributes: the id is replaced, classes are appended and
    /// other pairs overwrite same-named attributes.
    pub fn merge(&mut self, attrs: &Attributes) {
        if let Some(id) = &attrs.id {
            self.set_attr("id", id.as_str());
        }
        for class in &attrs.classes {
            self.add_class(class);
        }
        for (key, value) in &attrs.pairs {
            self.set_attr(key, value.as_str());
        }
    }
}

/// Payload of a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeData {
    /// The root. Holds top-level content.
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Clone, Debug)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An HTML fragment as a tree.
#[derive(Clone, Debug)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Parse an HTML fragment.
    ///
    /// The parser is lenient about HTML: void elements need no closing tag,
    /// unmatched end tags are ignored and elements still open at the end are
    /// closed implicitly.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError`] for markup the tokenizer cannot read.
    pub fn parse(html: &str) -> Result<Self, TreeError> {
        let mut doc = Self::new();
        parser::parse_into(&mut doc, html)?;
        Ok(doc)
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    #[must_use]
    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(element) => Some(element),
            _ => None,
        }
    }

    /// Tag name of an element node.
    #[must_use]
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.tag.as_str())
    }

    /// Content of a text node.
    #[must_use]
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.nodes[id.0].data = NodeData::Text(text.into());
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Create a detached element.
    pub fn create_element(&mut self, element: Element) -> NodeId {
        self.push(NodeData::Element(element))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeData::Text(text.into()))
    }

    /// Append `child` to `parent`.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Append text, merging into a trailing text child.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        if let Some(&last) = self.nodes[parent.0].children.last()
            && let NodeData::Text(existing) = &mut self.nodes[last.0].data
        {
            existing.push_str(text);
            return;
        }
        let child = self.create_text(text);
        self.append(parent, child);
    }

    /// Detach and return all children of `id`.
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.0].children);
        for &child in &children {
            self.nodes[child.0].parent = None;
        }
        children
    }

    /// Replace the child list of `id`.
    ///
    /// Children that are dropped stay in the arena but are unreachable.
    pub fn set_children(&mut self, id: NodeId, children: Vec<NodeId>) {
        for old in std::mem::take(&mut self.nodes[id.0].children) {
            self.nodes[old.0].parent = None;
        }
        for &child in &children {
            self.nodes[child.0].parent = Some(id);
        }
        self.nodes[id.0].children = children;
    }

    /// All nodes below `id`, in document order (excluding `id`).
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// Elements below `id` carrying `class`, in document order.
    #[must_use]
    pub fn find_by_class(&self, id: NodeId, class: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.element(node).is_some_and(|el| el.has_class(class)))
            .collect()
    }

    /// Concatenated text of all text nodes below `id`.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|node| self.text(node))
            .collect()
    }

    /// Deep-copy `from` (a node of `other`) into this document, detached.
    ///
    /// Importing `other.root()` yields a fresh element-less container; use
    /// [`import_children`](Self::import_children) to copy top-level content.
    pub fn import(&mut self, other: &Self, from: NodeId) -> NodeId {
        let copy = self.push(other.data(from).clone());
        let mut stack = vec![(from, copy)];
        while let Some((source, target)) = stack.pop() {
            for &child in other.children(source) {
                let child_copy = self.push(other.data(child).clone());
                self.append(target, child_copy);
                stack.push((child, child_copy));
            }
        }
        copy
    }

    /// Deep-copy the top-level content of `other`, detached.
    pub fn import_children(&mut self, other: &Self) -> Vec<NodeId> {
        other
            .children(other.root())
            .iter()
            .map(|&child| self.import(other, child))
            .collect()
    }

    /// Serialize all top-level content.
    #[must_use]
    pub fn serialize(&self) -> String {
        self.serialize_children(self.root())
    }

    /// Serialize the children of `id` (its inner HTML).
    #[must_use]
    pub fn serialize_children(&self, id: NodeId) -> String {
        let mut out = String::with_capacity(1024);
        for &child in self.children(id) {
            serializer::write_node(self, child, &mut out);
        }
        out
    }

    /// Serialize `id` itself (its outer HTML).
    #[must_use]
    pub fn serialize_node(&self, id: NodeId) -> String {
        let mut out = String::new();
        serializer::write_node(self, id, &mut out);
        out
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        NodeId(self.nodes.len() - 1)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Elements that never have content.
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose text content is not entity-encoded.
pub(crate) fn is_raw_text_element(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style")
}
