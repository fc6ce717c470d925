use std::fmt::{Display, Formatter};

use crate::util::Position;

#[derive(Debug, Clone)]
/// An `Error` token surfaced in-stream by the lexer (unterminated string,
/// unterminated block comment, and similar). The lexer never throws; callers
/// observe this via `next_token` and decide policy.
pub struct LexError {
    pub at: Position,
    pub message: String,
}

impl LexError {
    pub fn new(at: Position, message: String) -> Self {
        Self { at, message }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LexError: {} at {}", self.message, self.at)
    }
}

impl std::error::Error for LexError {}

#[derive(Debug, Clone)]
/// A grammar construction or analysis failure: unresolved function name,
/// unknown option, or a non-LL(1) grammar. The grammar is unusable once this
/// is raised.
pub struct GrammarError {
    pub what: String,
    pub message: String,
}

impl GrammarError {
    pub fn new(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            message: message.into(),
        }
    }
}

impl Display for GrammarError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GrammarError: {}-{}", self.what, self.message)
    }
}

impl std::error::Error for GrammarError {}

#[derive(Debug, Clone)]
/// A fatal parse failure: unexpected token under the current nonterminal, or
/// an action-initiated abort. The parser never attempts recovery.
pub struct ParseError {
    pub at: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(at: Position, message: String) -> Self {
        Self { at, message }
    }
}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SyntaxError: {} at {}", self.message, self.at)
    }
}

impl std::error::Error for ParseError {}
