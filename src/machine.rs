//! Orchestrator (C7): wires the lexer, event bus, stream and parser
//! together into a single `tokenize` → `parse` → `render` pipeline.

use crate::context::Context;
use crate::error::{DmltError, Result};
use crate::event_bus::EventBus;
use crate::lexer::{Lexer, LexerConfig};
use crate::node::{Document, NodeBox};
use crate::parser::parse_into;
use crate::rule::DirectiveRef;
use crate::token::{Token, TokenStream, TokenType};

/// Builder-style configuration, matching the normative configuration
/// table: which directives are active, escape handling, restrictive
/// mode, synthetic-token suffixes, and whether the machine runs in
/// inline mode (no document-level block structure).
#[derive(Clone)]
pub struct MachineConfig {
    pub directives: Vec<DirectiveRef>,
    pub escape_character: char,
    pub escape_enabled: bool,
    pub restrictive_mode: bool,
    pub begin_suffix: String,
    pub end_suffix: String,
    pub inline: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            directives: Vec::new(),
            escape_character: '\\',
            escape_enabled: false,
            restrictive_mode: false,
            begin_suffix: "_begin".to_string(),
            end_suffix: "_end".to_string(),
            inline: false,
        }
    }
}

impl MachineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directive(mut self, directive: DirectiveRef) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn escape_character(mut self, c: char) -> Self {
        self.escape_character = c;
        self
    }

    pub fn escape_enabled(mut self, value: bool) -> Self {
        self.escape_enabled = value;
        self
    }

    pub fn restrictive_mode(mut self, value: bool) -> Self {
        self.restrictive_mode = value;
        self
    }

    pub fn inline(mut self, value: bool) -> Self {
        self.inline = value;
        self
    }

    fn lexer_config(&self) -> LexerConfig {
        LexerConfig {
            escape_character: self.escape_character,
            escape_enabled: self.escape_enabled,
            restrictive_mode: self.restrictive_mode,
            begin_suffix: self.begin_suffix.clone(),
            end_suffix: self.end_suffix.clone(),
        }
    }

    fn context(&self) -> Context {
        Context::new(self.escape_enabled, self.restrictive_mode)
    }
}

/// Ties together a configuration and an [`EventBus`] to turn source text
/// into a token stream, a node tree, and (optionally) rendered output.
///
/// `raw` directive resolution happens once per machine, memoized on
/// first use: the `define-raw-directive` event is consulted via
/// [`EventBus::resolve_raw_directive`], falling back to the built-in
/// [`crate::rule::RawDirective`] when nothing overrides it.
pub struct MarkupMachine {
    config: MachineConfig,
    events: EventBus,
    raw_name: TokenType,
    raw_directive: DirectiveRef,
}

impl MarkupMachine {
    pub fn new(config: MachineConfig, events: EventBus) -> Self {
        let raw_directive = events
            .resolve_raw_directive()
            .unwrap_or_else(|| std::rc::Rc::new(crate::rule::RawDirective));
        let raw_name = TokenType::from(raw_directive.name().to_string());
        Self {
            config,
            events,
            raw_name,
            raw_directive,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Runs the lexer to completion, surfacing the first error (if any)
    /// at this call rather than lazily at iteration time, then applies
    /// the `process-stream` filter chain.
    pub fn tokenize(&self, text: &str) -> Result<TokenStream> {
        log::debug!(
            "tokenizing {} bytes with {} directives",
            text.len(),
            self.config.directives.len()
        );
        let lexer = Lexer::new(
            text,
            &self.config.directives,
            self.raw_name.clone(),
            self.raw_directive.clone(),
            self.config.lexer_config(),
        );
        let tokens: Vec<Token> = lexer.collect::<Result<Vec<_>>>()?;
        let stream = TokenStream::from_tuple_iter(tokens.into_iter());
        Ok(self.events.run_process_stream(stream, &self.config.context()))
    }

    /// Builds the node tree for already-tokenized input, applying the
    /// `process-doc-tree` filter chain afterwards.
    pub fn parse(&self, mut stream: TokenStream) -> Result<NodeBox> {
        let mut document = self
            .events
            .resolve_document_node()
            .unwrap_or_else(|| Box::new(Document::new()));

        parse_into(&mut stream, document.children_mut())?;

        if !stream.current().is_eof() {
            return Err(DmltError::Programming(
                "parser finished before reaching end of stream".to_string(),
            ));
        }

        Ok(self
            .events
            .run_process_doc_tree(document, &self.config.context()))
    }

    /// Convenience: `tokenize` followed by `parse`.
    pub fn parse_text(&self, text: &str) -> Result<NodeBox> {
        let stream = self.tokenize(text)?;
        self.parse(stream)
    }

    /// Renders a tree by concatenating `Node::prepare(format)` over the
    /// whole document.
    pub fn render(&self, tree: &dyn crate::node::Node, format: &str) -> String {
        tree.prepare(format).concat()
    }

    /// `tokenize` + `parse` + `render` in one call.
    pub fn run(&self, text: &str, format: &str) -> Result<String> {
        let tree = self.parse_text(text)?;
        Ok(self.render(tree.as_ref(), format))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::node::NodeBox;
    use crate::rule::{Directive, Rule};
    use std::rc::Rc;

    struct BoldTag;
    impl Directive for BoldTag {
        fn rules(&self) -> Vec<Rule> {
            vec![
                Rule::new(r"\[b\]").enter("b").build(),
                Rule::new(r"\[/b\]").leave("b").build(),
            ]
        }

        fn parse(&self, stream: &mut TokenStream) -> Option<NodeBox> {
            stream.next();
            let mut container = crate::node::Container::new("b");
            loop {
                if stream.test("b_end", None) {
                    stream.next();
                    break;
                }
                if stream.current().is_eof() {
                    break;
                }
                if let Some(node) = crate::parser::dispatch_node(stream).ok().flatten() {
                    container.children.push(node);
                }
            }
            Some(Box::new(container))
        }
    }

    #[test]
    fn run_renders_paired_tag_and_raw_text() {
        let config = MachineConfig::new().directive(Rc::new(BoldTag));
        let machine = MarkupMachine::new(config, EventBus::new());
        let rendered = machine.run("[b]x[/b]", "text").unwrap();
        assert_eq!(rendered, "x");
    }

    #[test]
    fn tokenize_surfaces_missing_context_eagerly() {
        let config = MachineConfig::new().directive(Rc::new(BoldTag));
        let machine = MarkupMachine::new(config, EventBus::new());
        let err = machine.tokenize("[/b]").unwrap_err();
        assert!(matches!(err, DmltError::MissingContext(_)));
    }

    #[test]
    fn raw_only_input_round_trips() {
        let machine = MarkupMachine::new(MachineConfig::new(), EventBus::new());
        let rendered = machine.run("just plain text", "text").unwrap();
        assert_eq!(rendered, "just plain text");
    }
}
