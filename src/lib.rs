//! A reusable engine for building parsers of lightweight, declaratively
//! defined markup languages: a context-stack lexer driven by ordered
//! rule tables, a stream-driven dispatcher that turns tokens into a
//! typed node tree, an extension event bus, and a tree-query helper.
//!
//! A dialect is built by implementing [`rule::Directive`] for each tag
//! or construct it wants to recognize, registering those directives
//! with a [`machine::MachineConfig`], and driving the whole pipeline
//! through [`machine::MarkupMachine`].

pub mod context;
pub mod error;
pub mod event_bus;
pub mod lexer;
pub mod machine;
pub mod node;
pub mod parser;
pub mod query;
pub mod rule;
pub mod serialize;
pub mod token;

pub use error::{DmltError, Result};
pub use event_bus::EventBus;
pub use lexer::{Lexer, LexerConfig};
pub use machine::{MachineConfig, MarkupMachine};
pub use node::{Container, Document, Node, NodeBox, Text};
pub use query::Query;
pub use rule::{bygroups, Directive, DirectiveRef, RawDirective, Rule, TokenSpec, TokenTuple};
pub use token::{Token, TokenStream, TokenType, EOF};
