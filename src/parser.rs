//! Stream-driven parser / dispatcher (C5): turns a [`TokenStream`] into a
//! node tree by handing each token back to the directive that produced
//! it.

use crate::error::{DmltError, Result};
use crate::node::NodeBox;
use crate::token::TokenStream;

/// One dispatch step: look up `stream.current`'s owning directive and
/// call `parse_eoc` (if the token is a forced close and the directive
/// implements it) or `parse`.
///
/// A missing directive reference on a non-eof token is a programmer
/// error — every non-synthetic token must carry the directive that
/// produced it, and every synthetic forced-close token must be routed
/// through a directive's `parse_eoc`, never reach here directive-less.
pub fn dispatch_node(stream: &mut TokenStream) -> Result<Option<NodeBox>> {
    if stream.current().is_eof() {
        return Ok(None);
    }
    let directive = stream
        .current()
        .directive()
        .cloned()
        .ok_or_else(|| {
            DmltError::Programming(format!(
                "missing directive in stream for token `{}`",
                stream.current().kind()
            ))
        })?;

    if stream.current().end_of_context() {
        Ok(directive.parse_eoc(stream))
    } else {
        Ok(directive.parse(stream))
    }
}

/// Drives dispatch to completion, appending each non-`none` result to
/// `document`'s children. If `parse` (or `parse_eoc`) returns `none`
/// without consuming a token, advances one token to guarantee progress.
pub fn parse_into(stream: &mut TokenStream, document: &mut Vec<NodeBox>) -> Result<()> {
    while !stream.current().is_eof() {
        let before = stream.current().clone();
        match dispatch_node(stream)? {
            Some(node) => document.push(node),
            None => {
                // Guarantee progress: if the directive didn't move the
                // stream forward, force it ourselves.
                if stream.current().kind() == before.kind()
                    && stream.current().value() == before.value()
                {
                    stream.next();
                }
            }
        }
    }
    Ok(())
}

/// Whether `current`'s type is in `until` — the sentinel set
/// `parse_child_nodes`/`filter_stream` stop before (and never consume).
pub fn at_sentinel(stream: &TokenStream, until: &[&str]) -> bool {
    until.iter().any(|u| stream.test(u, None))
}

/// Consumes nodes from `stream` by dispatch until `current.kind` matches
/// `until`, or `eof`. The terminator itself is never consumed — the
/// caller (typically the directive that owns the sentinel) does that.
pub fn parse_child_nodes(stream: &mut TokenStream, until: &[&str]) -> Result<Vec<NodeBox>> {
    let mut children = Vec::new();
    while !stream.current().is_eof() && !at_sentinel(stream, until) {
        let before = stream.current().clone();
        if let Some(node) = dispatch_node(stream)? {
            children.push(node);
        } else if stream.current().kind() == before.kind() && stream.current().value() == before.value()
        {
            stream.next();
        }
    }
    Ok(children)
}

/// Extracts raw string values up to the same kind of sentinel set used
/// by [`parse_child_nodes`], for recovery paths that want the
/// unstructured text of a malformed region rather than a node tree.
/// When `pop_none` is set, synthetic no-directive tokens (`value ==
/// none`) are skipped rather than treated as empty strings.
pub fn filter_stream(stream: &mut TokenStream, until: &[&str], pop_none: bool) -> Vec<String> {
    let mut values = Vec::new();
    while !stream.current().is_eof() && !at_sentinel(stream, until) {
        let value = stream.current().value().map(str::to_string);
        stream.next();
        match value {
            Some(v) => values.push(v),
            None if !pop_none => values.push(String::new()),
            None => {}
        }
    }
    values
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rule::{Directive, RawDirective};
    use crate::token::{Token, TokenType};
    use std::rc::Rc;

    #[test]
    fn dispatch_uses_parse_eoc_on_forced_close() {
        struct Recovering;
        impl Directive for Recovering {
            fn rules(&self) -> Vec<crate::rule::Rule> {
                Vec::new()
            }
            fn parse(&self, stream: &mut TokenStream) -> Option<NodeBox> {
                stream.next();
                Some(Box::new(crate::node::Text::new("normal")))
            }
            fn parse_eoc(&self, stream: &mut TokenStream) -> Option<NodeBox> {
                stream.next();
                Some(Box::new(crate::node::Text::new("recovered")))
            }
        }
        let directive: Rc<dyn Directive> = Rc::new(Recovering);
        let tok = Token::new(
            TokenType::from("b"),
            None,
            Some(directive),
            true,
        );
        let mut stream = TokenStream::from_tuple_iter(vec![tok].into_iter());
        let node = dispatch_node(&mut stream).unwrap().unwrap();
        assert_eq!(node.text(), "recovered");
    }

    #[test]
    fn dispatch_falls_through_to_parse_when_parse_eoc_is_not_overridden() {
        struct OneShot;
        impl Directive for OneShot {
            fn rules(&self) -> Vec<crate::rule::Rule> {
                Vec::new()
            }
            fn parse(&self, stream: &mut TokenStream) -> Option<NodeBox> {
                stream.next();
                Some(Box::new(crate::node::Text::new("linebreak")))
            }
        }
        let directive: Rc<dyn Directive> = Rc::new(OneShot);
        // A standalone `one = true` rule's token always carries
        // `end_of_context = true`, even though it never opened a
        // context to later force-close.
        let tok = Token::new(TokenType::from("nl"), None, Some(directive), true);
        let mut stream = TokenStream::from_tuple_iter(vec![tok].into_iter());
        let node = dispatch_node(&mut stream).unwrap().unwrap();
        assert_eq!(node.text(), "linebreak");
    }

    #[test]
    fn parse_into_guarantees_progress_on_none() {
        struct NoOp;
        impl Directive for NoOp {
            fn rules(&self) -> Vec<crate::rule::Rule> {
                Vec::new()
            }
            fn parse(&self, _stream: &mut TokenStream) -> Option<NodeBox> {
                None
            }
        }
        let directive: Rc<dyn Directive> = Rc::new(NoOp);
        let tokens = vec![Token::new(
            TokenType::from("skip"),
            None,
            Some(directive),
            false,
        )];
        let mut stream = TokenStream::from_tuple_iter(tokens.into_iter());
        let mut document = Vec::new();
        parse_into(&mut stream, &mut document).unwrap();
        assert!(document.is_empty());
        assert!(stream.current().is_eof());
    }

    #[test]
    fn raw_directive_parse_consumes_and_returns_text() {
        let directive = RawDirective;
        let directive_ref: Rc<dyn Directive> = Rc::new(RawDirective);
        let tok = Token::new(
            TokenType::from("raw"),
            Some("hello".to_string()),
            Some(directive_ref),
            false,
        );
        let mut stream = TokenStream::from_tuple_iter(vec![tok].into_iter());
        let node = directive.parse(&mut stream).unwrap();
        assert_eq!(node.text(), "hello");
        assert!(stream.current().is_eof());
    }
}
