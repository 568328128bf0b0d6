//! Abstract node interface: the tree that a [`crate::parser`] pass builds.

use std::any::Any;
use std::fmt;

use crate::query::Query;

/// Owned, dynamically-dispatched node. Every parent exclusively owns its
/// children; there are no back-references, so the tree can never cycle.
pub type NodeBox = Box<dyn Node>;

/// Capability predicates a concrete node type answers for itself, plus
/// the shared `children`/`text`/`prepare` contract.
///
/// Implementations are expected to be small value types (a tag name, an
/// attribute map, a child list) — the trait only fixes the *shape* the
/// rest of the engine (parser, query, renderer) needs to see.
pub trait Node: fmt::Debug {
    /// Enables `Query::by_type::<T>()`; concrete node types implement
    /// this as `self`.
    fn as_any(&self) -> &dyn Any;

    /// Type name used by synthetic-token bookkeeping and by tests; not
    /// necessarily the same as the lexer's token type strings, though
    /// concrete directives conventionally keep them aligned.
    fn kind(&self) -> &str;

    fn is_text_node(&self) -> bool {
        false
    }

    fn is_container(&self) -> bool {
        false
    }

    fn is_raw(&self) -> bool {
        false
    }

    fn is_block_tag(&self) -> bool {
        false
    }

    fn is_linebreak_node(&self) -> bool {
        false
    }

    fn is_document(&self) -> bool {
        false
    }

    fn allows_paragraphs(&self) -> bool {
        false
    }

    /// Direct children, in document order. Empty for non-containers.
    fn children(&self) -> &[NodeBox] {
        &[]
    }

    fn children_mut(&mut self) -> &mut Vec<NodeBox> {
        panic!("{} is not a container", self.kind())
    }

    /// Own text content; containers concatenate their children's text
    /// recursively. Leaf non-text nodes return an empty string.
    fn text(&self) -> String {
        if self.is_container() {
            self.children().iter().map(|c| c.text()).collect()
        } else {
            String::new()
        }
    }

    /// Render this node (and, for containers, its subtree) into the
    /// named output format. The core contract only requires that
    /// `render` be able to concatenate whatever this yields; the engine
    /// does not interpret `format` itself.
    fn prepare(&self, format: &str) -> Vec<String>;

    /// Root of a traversal over this node and (for containers) its
    /// descendants, in pre-order document order.
    fn query(&self) -> Query<'_>
    where
        Self: Sized,
    {
        Query::from_node(self)
    }
}

/// Entry point for querying a node reached only through a trait object
/// (e.g. an item already pulled out of a [`NodeBox`] slice), where the
/// `Self: Sized` bound on [`Node::query`] doesn't apply.
pub fn query(node: &dyn Node) -> Query<'_> {
    Query::from_node(node)
}

/// Entry point for querying a whole list of sibling nodes (e.g. a
/// [`Document`]'s top-level children) as one traversal.
pub fn query_over(nodes: &[NodeBox]) -> Query<'_> {
    Query::from_nodes(nodes)
}

/// Plain text leaf — the node type the built-in [`crate::rule::RawDirective`]
/// produces.
#[derive(Debug, Clone)]
pub struct Text {
    value: String,
}

impl Text {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Node for Text {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "text"
    }

    fn is_text_node(&self) -> bool {
        true
    }

    fn is_raw(&self) -> bool {
        true
    }

    fn text(&self) -> String {
        self.value.clone()
    }

    fn prepare(&self, _format: &str) -> Vec<String> {
        vec![self.value.clone()]
    }
}

/// A generic ordered container of child nodes, tagged with a `kind`
/// string. Concrete dialects typically define their own node types
/// instead of using this directly, but it is convenient for tests and
/// for the built-in [`Document`] root.
#[derive(Debug, Default)]
pub struct Container {
    kind: String,
    pub children: Vec<NodeBox>,
    block_tag: bool,
    allows_paragraphs: bool,
}

impl Container {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            children: Vec::new(),
            block_tag: false,
            allows_paragraphs: false,
        }
    }

    pub fn block_tag(mut self, value: bool) -> Self {
        self.block_tag = value;
        self
    }

    pub fn allows_paragraphs(mut self, value: bool) -> Self {
        self.allows_paragraphs = value;
        self
    }
}

impl Node for Container {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn is_container(&self) -> bool {
        true
    }

    fn is_block_tag(&self) -> bool {
        self.block_tag
    }

    fn allows_paragraphs(&self) -> bool {
        self.allows_paragraphs
    }

    fn children(&self) -> &[NodeBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<NodeBox> {
        &mut self.children
    }

    fn prepare(&self, format: &str) -> Vec<String> {
        self.children.iter().flat_map(|c| c.prepare(format)).collect()
    }
}

/// The tree root. Constructed via the `define-document-node` event;
/// defaults to a plain [`Container`] named `"document"` when no listener
/// overrides it.
#[derive(Debug, Default)]
pub struct Document {
    pub children: Vec<NodeBox>,
}

impl Document {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
        }
    }
}

impl Node for Document {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "document"
    }

    fn is_container(&self) -> bool {
        true
    }

    fn is_document(&self) -> bool {
        true
    }

    fn allows_paragraphs(&self) -> bool {
        true
    }

    fn children(&self) -> &[NodeBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<NodeBox> {
        &mut self.children
    }

    fn prepare(&self, format: &str) -> Vec<String> {
        self.children.iter().flat_map(|c| c.prepare(format)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn container_text_concatenates_children() {
        let mut doc = Document::new();
        doc.children.push(Box::new(Text::new("a")));
        doc.children.push(Box::new(Text::new("b")));
        assert_eq!(doc.text(), "ab");
    }

    #[test]
    fn text_node_predicates() {
        let t = Text::new("x");
        assert!(t.is_text_node());
        assert!(!t.is_container());
    }
}
