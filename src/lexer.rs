//! Context-stack tokenizer (C4) — the algorithmic heart of the engine.
//!
//! `Lexer` is a genuine [`Iterator`]: each `next()` call advances the
//! scan position by exactly as much as it takes to produce the next
//! queued token (a single rule match can enqueue several). Errors
//! (currently only a missing-context leave) stop the iterator after
//! yielding the error once, mirroring how an exception raised inside a
//! Python generator halts it the moment a consumer pulls past that
//! point.

use std::collections::VecDeque;

use crate::error::{DmltError, Result};
use crate::rule::{DirectiveRef, Rule, TokenSpec};
use crate::token::{Token, TokenType};

fn concat(base: &str, suffix: &str) -> TokenType {
    TokenType::from(format!("{base}{suffix}"))
}

/// Lexer configuration, mirroring the normative table in
/// [`crate::machine`]'s configuration section.
#[derive(Debug, Clone)]
pub struct LexerConfig {
    pub escape_character: char,
    pub escape_enabled: bool,
    pub restrictive_mode: bool,
    pub begin_suffix: String,
    pub end_suffix: String,
}

impl Default for LexerConfig {
    fn default() -> Self {
        Self {
            escape_character: '\\',
            escape_enabled: false,
            restrictive_mode: false,
            begin_suffix: "_begin".to_string(),
            end_suffix: "_end".to_string(),
        }
    }
}

pub struct Lexer<'a> {
    text: &'a str,
    pos: usize,
    end: usize,
    escaped: bool,
    text_buffer: String,
    /// Open-context stack; the *last* element is the most recently
    /// opened context (the source's deque, appended/removed at index 0).
    /// Seeded with an empty-string sentinel so `stack.last()` is never
    /// `None`.
    stack: Vec<TokenType>,
    rules: Vec<(Rule, DirectiveRef)>,
    raw_name: TokenType,
    raw_directive: DirectiveRef,
    config: LexerConfig,
    pending: VecDeque<Token>,
    finished: bool,
    /// Set once `step` fails; surfaced only after every token already
    /// queued ahead of the failure (e.g. a text-buffer flush that ran
    /// immediately before the failing rule application) has been
    /// yielded, so a consumer sees the same prefix of tokens a lazy
    /// generator would have produced before raising.
    error: Option<DmltError>,
}

impl<'a> Lexer<'a> {
    pub fn new(
        text: &'a str,
        directives: &[DirectiveRef],
        raw_name: TokenType,
        raw_directive: DirectiveRef,
        config: LexerConfig,
    ) -> Self {
        let mut rules = Vec::new();
        for directive in directives {
            for rule in directive.rules() {
                rules.push((rule, directive.clone()));
            }
        }
        Self {
            text,
            pos: 0,
            end: text.len(),
            escaped: false,
            text_buffer: String::new(),
            stack: vec![TokenType::from("")],
            rules,
            raw_name,
            raw_directive,
            config,
            pending: VecDeque::new(),
            finished: false,
            error: None,
        }
    }

    fn flush_text_buffer(&mut self) {
        if !self.text_buffer.is_empty() {
            let text = std::mem::take(&mut self.text_buffer);
            self.pending.push_back(Token::new(
                self.raw_name.clone(),
                Some(text),
                Some(self.raw_directive.clone()),
                false,
            ));
        }
    }

    fn remove_first_occurrence(&mut self, name: &TokenType) {
        if let Some(idx) = self.stack.iter().rposition(|s| s == name) {
            self.stack.remove(idx);
        }
    }

    fn run_splitter_or_fixed(&mut self, idx: usize, matched: &str, directive: &DirectiveRef) {
        let spec = self.rules[idx].0.token.clone();
        match spec {
            TokenSpec::Split(splitter) => {
                let caps = self
                    .rules[idx]
                    .0
                    .pattern
                    .captures(matched)
                    .expect("a splitter rule must re-match the text it just matched");
                for tuple in splitter(&caps) {
                    self.pending.push_back(Token::new(
                        tuple.kind,
                        tuple.value,
                        tuple.directive.or_else(|| Some(directive.clone())),
                        tuple.end_of_context,
                    ));
                }
            }
            TokenSpec::Fixed(ty) => {
                self.pending.push_back(Token::new(
                    ty,
                    Some(matched.to_string()),
                    Some(directive.clone()),
                    false,
                ));
            }
            TokenSpec::None => {}
        }
    }

    fn no_rule_matched(&mut self) {
        let ch = self.text[self.pos..]
            .chars()
            .next()
            .expect("pos < end implies a char remains");

        if self.config.escape_enabled {
            if ch == self.config.escape_character {
                if self.escaped {
                    self.escaped = false;
                    self.text_buffer.push(ch);
                } else {
                    self.escaped = true;
                }
            } else {
                if self.escaped {
                    self.text_buffer.push(self.config.escape_character);
                }
                self.escaped = false;
                self.text_buffer.push(ch);
            }
        } else {
            self.text_buffer.push(ch);
        }
        self.pos += ch.len_utf8();
    }

    /// One position-step of the main algorithm: try every rule in
    /// order; the first anchored match wins and is fully applied
    /// (possibly enqueuing several tokens). If nothing matches, consume
    /// one character per the escape-handling rules.
    fn step(&mut self) -> Result<()> {
        if self.pos >= self.end {
            if self.escaped {
                self.text_buffer.push(self.config.escape_character);
                self.escaped = false;
            }
            self.flush_text_buffer();
            self.finished = true;
            return Ok(());
        }

        for idx in 0..self.rules.len() {
            let found = self.rules[idx].0.match_at(self.text, self.pos);
            let Some(m) = found else { continue };
            let matched = m.as_str().to_string();
            let match_len = m.end();

            if self.escaped {
                // Escape consumes this match's syntactic meaning: the
                // matched text is appended verbatim, with no flush and
                // no enter/leave handling at all.
                self.text_buffer.push_str(&matched);
                self.escaped = false;
                self.pos += match_len;
                return Ok(());
            }

            log::trace!("rule {idx} matched {matched:?} at position {}", self.pos);
            self.flush_text_buffer();
            self.apply_rule(idx, &matched)?;
            self.pos += match_len;
            return Ok(());
        }

        self.no_rule_matched();
        Ok(())
    }

    fn apply_rule(&mut self, idx: usize, matched: &str) -> Result<()> {
        let directive = self.rules[idx].1.clone();
        let (enter, leave, one) = {
            let rule = &self.rules[idx].0;
            (rule.enter.clone(), rule.leave.clone(), rule.one)
        };

        if enter.is_some() || leave.is_some() {
            let enter_not_in_stack = enter
                .as_ref()
                .map_or(true, |e| !self.stack.iter().any(|s| s == e));

            if enter_not_in_stack && one {
                let begin_token = if leave.is_some() {
                    concat(enter.as_deref().unwrap_or(""), &self.config.begin_suffix)
                } else {
                    enter.clone().unwrap_or_else(|| TokenType::from(""))
                };
                self.pending.push_back(Token::new(
                    begin_token,
                    Some(matched.to_string()),
                    Some(directive.clone()),
                    true,
                ));

                if let Some(leave_name) = &leave {
                    // Preserved quirk: the splitter/fixed-token dispatch
                    // below always runs once more unconditionally, so a
                    // rule with both `one=true`, `leave` set, and a
                    // splitter token emits its sub-tokens twice.
                    self.run_splitter_or_fixed(idx, matched, &directive);
                    let end_token = concat(leave_name, &self.config.end_suffix);
                    self.pending.push_back(Token::new(
                        end_token,
                        Some(matched.to_string()),
                        Some(directive.clone()),
                        false,
                    ));
                }
            } else if leave
                .as_ref()
                .is_some_and(|l| self.stack.iter().any(|s| s == l))
            {
                let leave_name = leave.clone().unwrap();
                if self.config.restrictive_mode {
                    while self.stack.last().is_some_and(|top| top != &leave_name) {
                        let top = self.stack.pop().expect("loop condition guarantees Some");
                        log::debug!("restrictive mode forcing close of {top:?} before {leave_name:?}");
                        self.pending.push_back(Token::new(top, None, None, true));
                    }
                    self.stack.pop();
                } else {
                    self.remove_first_occurrence(&leave_name);
                }
                let end_token = concat(&leave_name, &self.config.end_suffix);
                self.pending.push_back(Token::new(
                    end_token,
                    Some(matched.to_string()),
                    Some(directive.clone()),
                    true,
                ));
            } else if let Some(enter_name) = enter.clone().filter(|_| !one) {
                self.stack.push(enter_name.clone());
                let begin_token = concat(&enter_name, &self.config.begin_suffix);
                self.pending.push_back(Token::new(
                    begin_token,
                    Some(matched.to_string()),
                    Some(directive.clone()),
                    false,
                ));
            } else if let Some(leave_name) = leave.clone() {
                return Err(DmltError::MissingContext(leave_name));
            }
        }

        self.run_splitter_or_fixed(idx, matched, &directive);
        Ok(())
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return Some(Ok(tok));
            }
            if self.finished {
                return self.error.take().map(Err);
            }
            if let Err(e) = self.step() {
                self.finished = true;
                self.error = Some(e);
                // Loop back: anything `step` already queued before
                // failing (e.g. a buffer flush) must drain first.
                continue;
            }
        }
    }
}
