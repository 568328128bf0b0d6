//! Immutable token records and the lookahead/push-back stream over them.

use std::fmt;
use std::rc::Rc;

use crate::error::{DmltError, Result};
use crate::rule::DirectiveRef;

/// A token's type name. Reserved names (`eof`, `<name>_begin`,
/// `<name>_end`) are plain values of this same type, not a separate
/// enum — dialects mint their own names at rule-declaration time, so the
/// set of possible types is open, not closed.
pub type TokenType = Rc<str>;

/// `"eof"`, the sentinel type `TokenStream::current` holds once the
/// underlying source is exhausted.
pub const EOF: &str = "eof";

/// An immutable four-field record: `(type, value, directive, end_of_context)`.
///
/// Equality is structural over exactly those fields. Rust's type system
/// already guarantees a `Token` can only ever be compared to another
/// `Token` — the source's runtime "comparing to a non-token is a type
/// error" becomes a compile error here, which is the same guarantee one
/// stage earlier.
#[derive(Clone)]
pub struct Token {
    kind: TokenType,
    value: Option<String>,
    directive: Option<DirectiveRef>,
    end_of_context: bool,
}

impl Token {
    pub fn new(
        kind: impl Into<TokenType>,
        value: Option<String>,
        directive: Option<DirectiveRef>,
        end_of_context: bool,
    ) -> Self {
        Self {
            kind: kind.into(),
            value,
            directive,
            end_of_context,
        }
    }

    /// The `eof` sentinel: `("eof", none, none, false)`.
    pub fn eof() -> Self {
        Self::new(EOF, None, None, false)
    }

    pub fn kind(&self) -> &TokenType {
        &self.kind
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn directive(&self) -> Option<&DirectiveRef> {
        self.directive.as_ref()
    }

    pub fn end_of_context(&self) -> bool {
        self.end_of_context
    }

    pub fn is_eof(&self) -> bool {
        &*self.kind == EOF
    }

    /// Whether `kind` matches `ty`, and, when given, `value` matches
    /// `val` too. Backs both `TokenStream::test` and `expect`.
    pub fn matches(&self, ty: &str, val: Option<&str>) -> bool {
        &*self.kind == ty && val.map_or(true, |v| self.value.as_deref() == Some(v))
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("end_of_context", &self.end_of_context)
            .finish()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.value == other.value
            && self.end_of_context == other.end_of_context
            && match (&self.directive, &other.directive) {
                (None, None) => true,
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                _ => false,
            }
    }
}

/// A mutable lookahead/push-back stream of [`Token`]s, pulled lazily from
/// a source iterator.
///
/// `current` is always defined; once the source is exhausted it holds
/// the `eof` sentinel and stays there until something is pushed ahead of
/// it. `look()` peeks the next token without disturbing `current`.
pub struct TokenStream {
    inner: Box<dyn Iterator<Item = Token>>,
    /// LIFO push-back buffer; the *last* element is the next token due.
    pushback: Vec<Token>,
    /// One-token lookahead cache, populated on demand from `inner`.
    lookahead: Option<Token>,
    current: Token,
}

impl TokenStream {
    /// Canonical constructor: wraps a lazy source of tokens (as produced
    /// by the lexer) and pulls the first one to seed `current`.
    pub fn from_tuple_iter(iter: impl Iterator<Item = Token> + 'static) -> Self {
        let mut stream = Self {
            inner: Box::new(iter),
            pushback: Vec::new(),
            lookahead: None,
            current: Token::eof(),
        };
        stream.current = stream.pull();
        stream
    }

    fn pull(&mut self) -> Token {
        if let Some(tok) = self.pushback.pop() {
            return tok;
        }
        if let Some(tok) = self.lookahead.take() {
            return tok;
        }
        self.inner.next().unwrap_or_else(Token::eof)
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Advances to the next token.
    pub fn next(&mut self) {
        self.current = self.pull();
    }

    /// The next token, without consuming it or disturbing `current`.
    pub fn look(&mut self) -> &Token {
        if let Some(tok) = self.pushback.last() {
            return tok;
        }
        self.lookahead
            .get_or_insert_with(|| self.inner.next().unwrap_or_else(Token::eof))
    }

    /// Inserts `tok` ahead of whatever is still queued, so it becomes
    /// the very next token.
    pub fn push(&mut self, tok: Token) {
        self.pushback.push(tok);
    }

    /// Pushes `current` back (to be seen again right after `tok`) and
    /// makes `tok` current immediately.
    pub fn shift(&mut self, tok: Token) {
        let previous = std::mem::replace(&mut self.current, tok);
        self.pushback.push(previous);
    }

    /// Advances `n` positions.
    pub fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.next();
        }
    }

    /// Non-consuming match against `current`.
    pub fn test(&self, ty: &str, val: Option<&str>) -> bool {
        self.current.matches(ty, val)
    }

    /// Returns `current` and advances if it matches; fails otherwise.
    pub fn expect(&mut self, ty: &str, val: Option<&str>) -> Result<Token> {
        if self.current.matches(ty, val) {
            let tok = self.current.clone();
            self.next();
            Ok(tok)
        } else {
            Err(DmltError::UnexpectedToken {
                expected: TokenType::from(ty),
                actual: self.current.kind().clone(),
            })
        }
    }

    /// Renders the remaining stream for inspection without losing any
    /// tokens: the underlying source is drained once and folded back
    /// into the push-back buffer, so iteration afterwards behaves
    /// exactly as if `debug` had never been called.
    pub fn debug(&mut self) -> String {
        let mut drained: Vec<Token> = Vec::new();
        if let Some(tok) = self.lookahead.take() {
            drained.push(tok);
        }
        drained.extend(self.inner.by_ref());

        let mut rendered = format!("{:?}", self.current);
        for tok in self.pushback.iter().rev() {
            rendered.push('\n');
            rendered.push_str(&format!("{tok:?}"));
        }
        for tok in &drained {
            rendered.push('\n');
            rendered.push_str(&format!("{tok:?}"));
        }

        let mut restored: Vec<Token> = drained.into_iter().rev().collect();
        restored.append(&mut self.pushback);
        self.pushback = restored;

        rendered
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn stream_of(kinds: &[&str]) -> TokenStream {
        let tokens: Vec<Token> = kinds
            .iter()
            .map(|k| Token::new(*k, None, None, false))
            .collect();
        TokenStream::from_tuple_iter(tokens.into_iter())
    }

    #[test]
    fn expect_advances_on_match() {
        let mut stream = stream_of(&["a", "b"]);
        let tok = stream.expect("a", None).unwrap();
        assert_eq!(&**tok.kind(), "a");
        assert_eq!(&**stream.current().kind(), "b");
    }

    #[test]
    fn expect_fails_on_mismatch() {
        let mut stream = stream_of(&["a"]);
        let err = stream.expect("z", None).unwrap_err();
        assert!(matches!(err, DmltError::UnexpectedToken { .. }));
    }

    #[test]
    fn look_does_not_mutate_current() {
        let mut stream = stream_of(&["a", "b"]);
        assert_eq!(&**stream.look().kind(), "b");
        assert_eq!(&**stream.current().kind(), "a");
    }

    #[test]
    fn push_then_next_surfaces_pushed_token() {
        let mut stream = stream_of(&["a", "b"]);
        stream.push(Token::new("c", None, None, false));
        stream.next();
        assert_eq!(&**stream.current().kind(), "c");
    }

    #[test]
    fn shift_then_next_returns_previous_current() {
        let mut stream = stream_of(&["a", "b"]);
        stream.shift(Token::new("c", None, None, false));
        assert_eq!(&**stream.current().kind(), "c");
        stream.next();
        assert_eq!(&**stream.current().kind(), "a");
    }

    #[test]
    fn exhausted_stream_stays_at_eof() {
        let mut stream = stream_of(&["a"]);
        stream.next();
        assert!(stream.current().is_eof());
        stream.next();
        assert!(stream.current().is_eof());
    }

    #[test]
    fn debug_does_not_consume_tokens() {
        let mut stream = stream_of(&["a", "b", "c"]);
        let rendered = stream.debug();
        assert!(rendered.contains("\"a\""));
        assert!(rendered.contains("\"b\""));
        assert!(rendered.contains("\"c\""));
        assert_eq!(&**stream.current().kind(), "a");
        stream.next();
        assert_eq!(&**stream.current().kind(), "b");
        stream.next();
        assert_eq!(&**stream.current().kind(), "c");
        stream.next();
        assert!(stream.current().is_eof());
    }
}
