use crate::lexer::{CharStream, Lexer};
use crate::token::Token;

/// A pull source of tokens the parser drives. Implemented directly over a
/// [`Lexer`] via [`LexerTokenSource`]; a host that pre-tokenizes (or streams
/// tokens from elsewhere) can implement it directly instead.
pub trait TokenSource {
    /// The current lookahead token, without consuming it.
    fn peek(&mut self) -> &Token;

    /// Consume and return the current lookahead token, advancing to the next one.
    fn advance(&mut self) -> Token;
}

/// Adapts a [`Lexer`] into a [`TokenSource`] by holding one token of
/// lookahead, since the lexer itself only exposes `next_token`.
pub struct LexerTokenSource<S: CharStream> {
    lexer: Lexer<S>,
    current: Token,
}

impl<S: CharStream> LexerTokenSource<S> {
    pub fn new(mut lexer: Lexer<S>) -> Self {
        let current = lexer.next_token();
        Self { lexer, current }
    }

    /// Read a raw string via the underlying lexer's `rollup_to`, bypassing
    /// the lookahead buffer. Intended for grammar actions (the `rollup_to`
    /// standard action) that need to consume content the normal token
    /// stream would never tokenize correctly, e.g. a regex literal body.
    pub fn rollup_to(&mut self, marker: char) -> Token {
        let token = self.lexer.rollup_to(marker);
        self.current = self.lexer.next_token();
        token
    }
}

impl<S: CharStream> TokenSource for LexerTokenSource<S> {
    fn peek(&mut self) -> &Token {
        &self.current
    }

    fn advance(&mut self) -> Token {
        let matched = self.current.clone();
        self.current = self.lexer.next_token();
        matched
    }
}
