//! Tree dump/load (C10): a cache-facing compatibility surface for a
//! container's top-level children, keeping the `'!'`/`'@'` discriminator
//! contract of `dump_tree`/`load_tree` — `'!'` for a tree whose children
//! are all text (dumped as one run of plain UTF-8), `'@'` for a tree
//! that also holds non-text ("dynamic") nodes (dumped as a structured,
//! ordered list of text runs and nodes).
//!
//! Reconstructing a dynamic node from its dumped form needs some
//! encoding for arbitrary node shapes; rather than inventing a second,
//! narrower format for that, each dynamic chunk is dumped using the
//! same recursive node encoding, nested one level inside the outer
//! `(format, chunks)` payload.

use serde::{Deserialize, Serialize};

use crate::node::{Container, Document, NodeBox, Text};

/// One element of a dumped children list: a run of coalesced plain text,
/// or a single non-text node encoded recursively.
#[derive(Serialize, Deserialize)]
enum JsonChunk {
    Text(String),
    Node(Dump),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "d")]
enum Dump {
    #[serde(rename = "!")]
    Leaf { value: String },
    #[serde(rename = "@")]
    Container {
        kind: String,
        block_tag: bool,
        allows_paragraphs: bool,
        children: Vec<Dump>,
    },
}

fn dump_node(node: &dyn crate::node::Node) -> Dump {
    if node.is_text_node() {
        Dump::Leaf { value: node.text() }
    } else {
        Dump::Container {
            kind: node.kind().to_string(),
            block_tag: node.is_block_tag(),
            allows_paragraphs: node.allows_paragraphs(),
            children: node.children().iter().map(|c| dump_node(c.as_ref())).collect(),
        }
    }
}

fn load_node(dump: Dump) -> NodeBox {
    match dump {
        Dump::Leaf { value } => Box::new(Text::new(value)),
        Dump::Container {
            kind,
            block_tag,
            allows_paragraphs,
            children,
        } => {
            if kind == "document" {
                let mut doc = Document::new();
                doc.children = children.into_iter().map(load_node).collect();
                Box::new(doc)
            } else {
                let mut container = Container::new(kind).block_tag(block_tag).allows_paragraphs(allows_paragraphs);
                container.children = children.into_iter().map(load_node).collect();
                Box::new(container)
            }
        }
    }
}

/// One element of a [`LoadedTree`]'s instruction list: either a run of
/// plain text, or a reconstructed dynamic node.
pub enum Chunk {
    Text(String),
    Node(NodeBox),
}

/// Mirrors `load_tree`'s tri-state return: the dumped form always
/// yields `instructions` (and the `format` it was dumped with) and
/// leaves `node` empty. A caller that already holds a live [`NodeBox`]
/// rather than a dumped string never needs to call this at all — Rust's
/// static typing keeps the two cases apart at the call site instead of
/// branching on the runtime shape of one dynamically-typed argument.
pub struct LoadedTree {
    pub instructions: Option<Vec<Chunk>>,
    pub node: Option<NodeBox>,
    pub format: Option<String>,
}

/// Dumps `tree`'s top-level children for `format`, coalescing runs of
/// consecutive text nodes into single text chunks. A tree whose
/// children are entirely text is dumped as `'!' + format + '\0' +
/// utf8-text`; a tree with any non-text child is dumped as `'@'`
/// followed by a JSON encoding of `(format, chunks)`.
pub fn dump_tree(tree: &dyn crate::node::Node, format: &str) -> String {
    let mut chunks = Vec::new();
    let mut text_buffer = String::new();
    let mut is_dynamic = false;

    for child in tree.children() {
        if child.is_text_node() {
            text_buffer.push_str(&child.text());
        } else {
            if !text_buffer.is_empty() {
                chunks.push(JsonChunk::Text(std::mem::take(&mut text_buffer)));
            }
            chunks.push(JsonChunk::Node(dump_node(child.as_ref())));
            is_dynamic = true;
        }
    }
    if !text_buffer.is_empty() {
        chunks.push(JsonChunk::Text(text_buffer));
    }

    if !is_dynamic {
        let text: String = chunks
            .into_iter()
            .map(|c| match c {
                JsonChunk::Text(t) => t,
                JsonChunk::Node(_) => unreachable!("is_dynamic is false"),
            })
            .collect();
        format!("!{format}\0{text}")
    } else {
        let encoded = serde_json::to_string(&(format, chunks))
            .expect("chunk list contains no non-serializable data");
        format!("@{encoded}")
    }
}

/// Loads a string previously produced by [`dump_tree`].
pub fn load_tree(dumped: &str) -> LoadedTree {
    let mut chars = dumped.chars();
    match chars.next() {
        Some('!') => {
            let rest = &dumped[1..];
            let sep = rest.find('\0').expect("'!'-dumped string always has a NUL separator");
            let format = rest[..sep].to_string();
            let text = rest[sep + 1..].to_string();
            LoadedTree {
                instructions: Some(vec![Chunk::Text(text)]),
                node: None,
                format: Some(format),
            }
        }
        Some('@') => {
            let (format, chunks): (String, Vec<JsonChunk>) = serde_json::from_str(&dumped[1..])
                .expect("'@'-dumped payload must be the (format, chunks) encoding dump_tree produced");
            let instructions = chunks
                .into_iter()
                .map(|c| match c {
                    JsonChunk::Text(t) => Chunk::Text(t),
                    JsonChunk::Node(d) => Chunk::Node(load_node(d)),
                })
                .collect();
            LoadedTree {
                instructions: Some(instructions),
                node: None,
                format: Some(format),
            }
        }
        _ => panic!("dumped tree string must start with '!' or '@'"),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::Container;

    #[test]
    fn pure_text_tree_dumps_with_bang_discriminator() {
        let mut doc = Document::new();
        doc.children.push(Box::new(Text::new("hello ")));
        doc.children.push(Box::new(Text::new("world")));

        let dumped = dump_tree(&doc, "plain");
        assert_eq!(dumped, "!plain\0hello world");

        let loaded = load_tree(&dumped);
        assert_eq!(loaded.format.as_deref(), Some("plain"));
        assert!(loaded.node.is_none());
        match loaded.instructions.unwrap().as_slice() {
            [Chunk::Text(t)] => assert_eq!(t, "hello world"),
            other => panic!("expected a single coalesced text chunk, got {} chunks", other.len()),
        }
    }

    #[test]
    fn tree_with_dynamic_node_dumps_with_at_discriminator() {
        let mut doc = Document::new();
        doc.children.push(Box::new(Text::new("hi ")));
        doc.children.push(Box::new(Container::new("var")));
        doc.children.push(Box::new(Text::new("!")));

        let dumped = dump_tree(&doc, "plain");
        assert!(dumped.starts_with('@'));

        let loaded = load_tree(&dumped);
        assert_eq!(loaded.format.as_deref(), Some("plain"));
        let instructions = loaded.instructions.unwrap();
        assert_eq!(instructions.len(), 3);
        assert!(matches!(&instructions[0], Chunk::Text(t) if t == "hi "));
        assert!(matches!(&instructions[1], Chunk::Node(n) if n.kind() == "var"));
        assert!(matches!(&instructions[2], Chunk::Text(t) if t == "!"));
    }

    #[test]
    fn empty_tree_dumps_as_empty_text() {
        let doc = Document::new();
        let dumped = dump_tree(&doc, "plain");
        assert_eq!(dumped, "!plain\0");
    }
}
