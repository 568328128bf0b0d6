//! Tree-query traversal helper (C6's other half).

use crate::node::{Node, NodeBox};

/// A query over a set of root nodes, either recursive (pre-order over
/// each root's whole subtree) or flat (the roots themselves only, used
/// by [`Node::children`]-style non-recursive queries).
pub struct Query<'a> {
    roots: Vec<&'a dyn Node>,
    recurse: bool,
}

impl<'a> Query<'a> {
    /// The root query for a single node: `self`, then its descendants in
    /// pre-order.
    pub fn from_node(node: &'a dyn Node) -> Self {
        Self {
            roots: vec![node],
            recurse: true,
        }
    }

    /// A flat, non-recursive query over an explicit list of nodes (used
    /// for `.children`, and for querying a `Document`'s top-level
    /// children as one traversal).
    pub fn from_nodes(nodes: &'a [NodeBox]) -> Self {
        Self {
            roots: nodes.iter().map(|n| n.as_ref()).collect(),
            recurse: false,
        }
    }

    /// Lazy pre-order traversal: each root, then (when recursive) its
    /// descendants depth-first, left to right.
    pub fn all(&self) -> QueryIter<'a> {
        QueryIter {
            stack: self.roots.iter().rev().copied().collect(),
            recurse: self.recurse,
        }
    }

    /// Filters [`Self::all`] down to nodes whose concrete type is `T`.
    pub fn by_type<T: Node + 'static>(&self) -> impl Iterator<Item = &'a T> {
        self.all().filter_map(|n| n.as_any().downcast_ref::<T>())
    }

    /// Filters [`Self::all`] down to text nodes.
    pub fn text_nodes(&self) -> impl Iterator<Item = &'a dyn Node> {
        self.all().filter(|n| n.is_text_node())
    }

    /// Whether this query matches anything at all.
    pub fn has_any(&self) -> bool {
        self.all().next().is_some()
    }
}

/// Iterator driving [`Query::all`]; a plain explicit-stack depth-first
/// walk so traversal never materializes more than O(tree depth) at once.
pub struct QueryIter<'a> {
    stack: Vec<&'a dyn Node>,
    recurse: bool,
}

impl<'a> Iterator for QueryIter<'a> {
    type Item = &'a dyn Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if self.recurse && node.is_container() {
            for child in node.children().iter().rev() {
                self.stack.push(child.as_ref());
            }
        }
        Some(node)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::{Container, Document, Text};

    fn sample() -> Document {
        let mut doc = Document::new();
        let mut strong = Container::new("strong");
        strong.children.push(Box::new(Text::new("x")));
        doc.children.push(Box::new(strong));
        doc.children.push(Box::new(Text::new("y")));
        doc
    }

    #[test]
    fn all_is_preorder() {
        let doc = sample();
        let kinds: Vec<&str> = doc.query().all().map(|n| n.kind()).collect();
        assert_eq!(kinds, vec!["document", "strong", "text", "text"]);
    }

    #[test]
    fn children_is_non_recursive() {
        let doc = sample();
        let q = Query::from_nodes(&doc.children);
        let kinds: Vec<&str> = q.all().map(|n| n.kind()).collect();
        assert_eq!(kinds, vec!["strong", "text"]);
    }

    #[test]
    fn by_type_matches_isinstance_filter() {
        let doc = sample();
        let text_values: Vec<&str> = doc.query().by_type::<Text>().map(|t| t.value()).collect();
        assert_eq!(text_values, vec!["x", "y"]);
    }

    #[test]
    fn has_any_reflects_matches() {
        let doc = Document::new();
        assert!(!Query::from_nodes(&doc.children).has_any());
    }
}
