//! Declarative pattern + handler binding (rules and directives).

use std::fmt;
use std::rc::Rc;

use regex::Regex;

use crate::node::NodeBox;
use crate::token::{Token, TokenStream, TokenType};

/// A fully resolved token tuple, as produced by a [`Splitter`] or by the
/// lexer's own synthetic emissions. Mirrors the four-field shape of
/// [`Token`](crate::token::Token) before it is wrapped up.
pub struct TokenTuple {
    pub kind: TokenType,
    pub value: Option<String>,
    pub directive: Option<DirectiveRef>,
    pub end_of_context: bool,
}

impl TokenTuple {
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
}

/// A splitter is the "bygroups" case: given a regex match it yields one
/// token per declared capture, rather than a single fixed token type.
pub type Splitter = Rc<dyn Fn(&regex::Captures) -> Vec<TokenTuple>>;

/// What a rule emits for the text it matched, beyond the synthetic
/// enter/leave markers.
#[derive(Clone)]
pub enum TokenSpec {
    /// Emit one token of this fixed type, carrying the whole match as its
    /// value.
    Fixed(TokenType),
    /// Emit a splitter-defined sequence of sub-tokens instead.
    Split(Splitter),
    /// Emit no token directly; only enter/leave markers (if any) fire.
    None,
}

impl fmt::Debug for TokenSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSpec::Fixed(t) => write!(f, "Fixed({t:?})"),
            TokenSpec::Split(_) => write!(f, "Split(..)"),
            TokenSpec::None => write!(f, "None"),
        }
    }
}

/// Builds a [`TokenSpec::Split`] from a list of token type names, one per
/// capture group, mirroring the source's `bygroups(*names)` helper.
pub fn bygroups(names: &[&str]) -> TokenSpec {
    let names: Vec<TokenType> = names.iter().map(|n| TokenType::from(*n)).collect();
    TokenSpec::Split(Rc::new(move |caps: &regex::Captures| {
        names
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                caps.get(i + 1).map(|m| {
                    TokenTuple::new(name.clone(), Some(m.as_str().to_string()), None, false)
                })
            })
            .collect()
    }))
}

/// One parsing rule: a pattern anchored at the lexer's current scan
/// position, the token(s) it emits, and the context stack transition it
/// drives (see the lexer's enter/leave table).
pub struct Rule {
    pub(crate) pattern: Regex,
    pub token: TokenSpec,
    pub enter: Option<TokenType>,
    pub leave: Option<TokenType>,
    pub one: bool,
}

impl Rule {
    /// `regexp` is compiled as-is; implementations matching it always
    /// anchor at the current scan offset by slicing the remaining input,
    /// so the pattern itself need not contain an explicit `^`.
    pub fn new(regexp: &str) -> RuleBuilder {
        RuleBuilder {
            pattern: regexp.to_string(),
            token: TokenSpec::None,
            enter: None,
            leave: None,
            one: false,
        }
    }

    /// Matches the pattern as if anchored at `pos`: a match that starts
    /// anywhere past `pos` does not count.
    pub(crate) fn match_at<'t>(&self, text: &'t str, pos: usize) -> Option<regex::Match<'t>> {
        self.pattern.find(&text[pos..]).filter(|m| m.start() == 0)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<rule({:?}, {:?} -> {:?})>",
            self.token, self.enter, self.leave
        )
    }
}

/// Fluent constructor for [`Rule`], mirroring the source's
/// `rule(regexp, token=None, enter=None, leave=None, one=False)`
/// constructor call.
pub struct RuleBuilder {
    pattern: String,
    token: TokenSpec,
    enter: Option<TokenType>,
    leave: Option<TokenType>,
    one: bool,
}

impl RuleBuilder {
    pub fn token(mut self, spec: TokenSpec) -> Self {
        self.token = spec;
        self
    }

    pub fn enter(mut self, name: &str) -> Self {
        self.enter = Some(TokenType::from(name));
        self
    }

    pub fn leave(mut self, name: &str) -> Self {
        self.leave = Some(TokenType::from(name));
        self
    }

    pub fn one(mut self, one: bool) -> Self {
        self.one = one;
        self
    }

    pub fn build(self) -> Rule {
        Rule {
            pattern: Regex::new(&self.pattern)
                .unwrap_or_else(|e| panic!("invalid rule pattern {:?}: {e}", self.pattern)),
            token: self.token,
            enter: self.enter,
            leave: self.leave,
            one: self.one,
        }
    }
}

/// A polymorphic handler owning one or more [`Rule`]s.
///
/// `parse` is invoked with its own token current on the stream and must
/// consume at least one token. `parse_eoc` is the recovery hook invoked
/// instead when the current token is a forced close (`end_of_context`).
pub trait Directive {
    fn rules(&self) -> Vec<Rule>;

    fn parse(&self, stream: &mut TokenStream) -> Option<NodeBox>;

    /// Default recovery hook: directives that never override this fall
    /// through to ordinary `parse`, matching the source's dispatcher,
    /// which only special-cases a forced close when the directive
    /// actually defines its own `parse_eoc`.
    fn parse_eoc(&self, stream: &mut TokenStream) -> Option<NodeBox> {
        self.parse(stream)
    }

    /// Human-readable name, used for `Debug` rendering and error
    /// messages; defaults to the Rust type name.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

pub type DirectiveRef = Rc<dyn Directive>;

/// The built-in fallback directive: owns no rules, and is the source of
/// every token emitted for text that matched nothing else.
pub struct RawDirective;

impl Directive for RawDirective {
    fn rules(&self) -> Vec<Rule> {
        Vec::new()
    }

    fn parse(&self, stream: &mut TokenStream) -> Option<NodeBox> {
        let value = stream.current().value().unwrap_or_default().to_string();
        stream.next();
        Some(Box::new(crate::node::Text::new(value)))
    }

    fn name(&self) -> &str {
        "raw"
    }
}
