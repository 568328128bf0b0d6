//! Crate-wide error taxonomy.
//!
//! The original implementation this engine is modeled on raised three
//! concrete exception classes (`StackEmpty`, `MissingContext`,
//! `EventNotFound`) plus a couple of ad-hoc `TypeError`/`ValueError` calls
//! for everything else. Those are unified here into one enum so every
//! fallible entry point can propagate with `?`.

use thiserror::Error;

use crate::token::TokenType;

/// Everything that can go wrong driving a [`crate::machine::MarkupMachine`].
#[derive(Debug, Error)]
pub enum DmltError {
    /// An operation tried to pop or inspect the top of an empty context
    /// stack. The stack is seeded with a sentinel entry specifically so
    /// this should never be reachable from well-formed rule tables; if it
    /// is, that's a bug in the directive set, not a parse failure.
    #[error("attempted to modify an empty context stack")]
    StackEmpty,

    /// A rule's `leave` named a context that was never opened.
    #[error("cannot leave context {0:?}: it was never opened on the context stack")]
    MissingContext(TokenType),

    /// `TokenStream::expect` saw a token that didn't match.
    #[error("unexpected token: expected {expected:?}, found {actual:?}")]
    UnexpectedToken {
        expected: TokenType,
        actual: TokenType,
    },

    /// `connect` named an event that was never `define`d.
    #[error("no event named {0:?} is registered")]
    EventNotFound(String),

    /// An internal invariant was violated — e.g. a non-eof token reached
    /// the dispatcher with no owning directive. These should never
    /// surface from correctly-built directive tables.
    #[error("programming error: {0}")]
    Programming(String),
}

pub type Result<T> = std::result::Result<T, DmltError>;
