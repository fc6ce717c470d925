mod keyword;

pub use keyword::{KeywordMatchState, KeywordMatcher};

use crate::token::{
    Token, TokenCode, CODE_BACKQUOTED, CODE_DQUOTED, CODE_END, CODE_ERROR, CODE_EXHAUSTED,
    CODE_FLOAT, CODE_HEX_NUMBER, CODE_IDENTIFIER, CODE_INTEGER, CODE_NEWLINE,
    CODE_RAW_STRING, CODE_SLASH, CODE_SQUOTED, CODE_WHITESPACE,
};
use crate::util::{Log, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Fresh,
    Init,
    Whitespace,
    NewLine,
    Identifier,
    Keyword,
    SymbolicKeyword,
    PlusMinus,
    Zero,
    Number,
    DecimalInteger,
    HexInteger,
    Float,
    SciFloat,
    QuotedStr,
    QuotedStrEscape,
    HashPling,
    Slash,
    BlockComment,
    LineComment,
    Star,
}

#[derive(Debug, Clone, Default)]
/// Boolean and callback-driven lexer configuration, see `SPEC_FULL.md` §B.
pub struct LexerOptions {
    pub ignore_whitespace: bool,
    pub ignore_new_lines: bool,
    pub case_sensitive: bool,
    pub hashpling: bool,
    pub signed_numbers: bool,
}

impl LexerOptions {
    pub fn ignore_all_whitespace(&mut self) {
        self.ignore_whitespace = true;
        self.ignore_new_lines = true;
    }
}

/// A pull source of characters. Implemented for anything iterating `char`,
/// so a `str`'s `Chars` iterator, a `BufRead`-backed decoder, or a network
/// stream decoder are all valid lexer inputs.
pub trait CharStream {
    fn read(&mut self) -> Option<char>;
}

impl<I: Iterator<Item = char>> CharStream for I {
    fn read(&mut self) -> Option<char> {
        self.next()
    }
}

/// Cooperative character-stream lexer. Converts a character stream into a
/// token stream one token at a time; never blocks beyond its own `read`.
pub struct Lexer<S: CharStream> {
    stream: S,
    pushback: Vec<char>,
    position: crate::util::LivePosition,
    keywords: Vec<(String, TokenCode)>,
    pub options: LexerOptions,
    on_newline: Option<Box<dyn FnMut(usize)>>,
    last_token: Option<Token>,
    debug: Log<&'static str>,
}

impl<S: CharStream> Lexer<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pushback: Vec::new(),
            position: Default::default(),
            keywords: Vec::new(),
            options: LexerOptions::default(),
            on_newline: None,
            last_token: None,
            debug: Log::None,
        }
    }

    pub fn set_debug(&mut self, log: Log<&'static str>) {
        self.debug = log;
    }

    pub fn set_on_newline(&mut self, f: impl FnMut(usize) + 'static) {
        self.on_newline = Some(Box::new(f));
    }

    /// Register a keyword. Repeated registration of the same text with a
    /// different code is a caller bug and overwrites the earlier entry,
    /// since a grammar always hashes equal keyword text to one code.
    pub fn add_keyword(&mut self, code: TokenCode, text: impl Into<String>) {
        let text = text.into();
        if let Some(existing) = self.keywords.iter_mut().find(|(t, _)| *t == text) {
            existing.1 = code;
        } else {
            self.keywords.push((text, code));
        }
    }

    fn read_raw(&mut self) -> Option<char> {
        if let Some(c) = self.pushback.pop() {
            Some(c)
        } else {
            self.stream.read()
        }
    }

    fn unread(&mut self, c: char) {
        self.pushback.push(c);
    }

    /// Read the next character, advancing position tracking and firing the
    /// `on_newline` hook; does not apply token filtering.
    fn advance(&mut self) -> Option<char> {
        let c = self.read_raw()?;
        if let Some(new_line) = self.position.advance(c) {
            if let Some(cb) = self.on_newline.as_mut() {
                cb(new_line);
            }
        }
        Some(c)
    }

    fn current_position(&self) -> Position {
        self.position.position()
    }

    /// Read one token, honoring the configured filtering options. Returns
    /// `End` exactly once, then `Exhausted` on every subsequent call.
    pub fn next_token(&mut self) -> Token {
        loop {
            let token = self.lex_one();
            if self.should_emit(&token) {
                self.debug.trace_token("LexerSuccess", &token.text, token.position());
                return token;
            }
        }
    }

    fn should_emit(&self, token: &Token) -> bool {
        if token.code == CODE_WHITESPACE && self.options.ignore_whitespace {
            return false;
        }
        if token.code == CODE_NEWLINE && self.options.ignore_new_lines {
            return false;
        }
        true
    }

    fn lex_one(&mut self) -> Token {
        if let Some(last) = &self.last_token {
            if last.is_end() {
                let exhausted = Token::new(CODE_EXHAUSTED, "$$$$", self.current_position());
                self.last_token = Some(exhausted.clone());
                return exhausted;
            }
            if last.is_exhausted() {
                return self.last_token.clone().unwrap();
            }
        }

        let start = self.current_position();
        let first_line_first_column = start.line == 1 && start.column == 0;
        let mut state = LexState::Fresh;
        let mut buffer = String::new();
        let mut kw_matcher: Option<KeywordMatcher> = None;
        let mut kw_last_full: Option<(TokenCode, usize)> = None;

        let token = loop {
            match state {
                LexState::Fresh => match self.advance() {
                    None => {
                        break Token::new(CODE_END, "$$", start);
                    }
                    Some(c) => {
                        self.unread(c);
                        state = LexState::Init;
                    }
                },
                LexState::Init => {
                    let c = match self.advance() {
                        None => break Token::new(CODE_END, "$$", start),
                        Some(c) => c,
                    };
                    if c == '\r' || c == '\n' {
                        buffer.push(c);
                        state = LexState::NewLine;
                    } else if c.is_whitespace() {
                        buffer.push(c);
                        state = LexState::Whitespace;
                    } else if c == '#' && self.options.hashpling && first_line_first_column {
                        state = LexState::HashPling;
                    } else if c.is_alphabetic() || c == '_' {
                        buffer.push(c);
                        state = LexState::Identifier;
                    } else {
                        // Mirrors `_lexer_state_init_handler` (lexer.c ~657):
                        // try a keyword match on every other lead character
                        // before falling back to the raw-punctuation/number/
                        // string dispatch, so a grammar-declared symbolic
                        // keyword (`"=="`, `">="`, `"->"`, ...) is reachable.
                        let mut matcher = KeywordMatcher::new();
                        let kw_state = matcher.feed(c, &self.keywords, self.options.case_sensitive);
                        if kw_state == KeywordMatchState::NoMatch {
                            if c == '0' {
                                buffer.push(c);
                                state = LexState::Zero;
                            } else if c.is_ascii_digit() {
                                buffer.push(c);
                                state = LexState::Number;
                            } else if (c == '+' || c == '-') && self.options.signed_numbers {
                                buffer.push(c);
                                state = LexState::PlusMinus;
                            } else if c == '\'' || c == '"' || c == '`' {
                                state = LexState::QuotedStr;
                                buffer.push(c);
                            } else if c == '/' {
                                state = LexState::Slash;
                            } else {
                                break Token::new(c as TokenCode, c.to_string(), start);
                            }
                        } else {
                            buffer.push(c);
                            if matches!(
                                kw_state,
                                KeywordMatchState::FullMatch | KeywordMatchState::FullMatchAndPrefixes
                            ) {
                                kw_last_full = matcher.code().map(|code| (code, buffer.len()));
                            }
                            kw_matcher = Some(matcher);
                            state = LexState::SymbolicKeyword;
                        }
                    }
                }
                LexState::NewLine => match self.advance() {
                    Some(c) if c.is_whitespace() && c != '\n' && c != '\r' => {
                        self.unread(c);
                        break Token::new(CODE_NEWLINE, buffer, start);
                    }
                    Some(c) if c == '\n' || c == '\r' => {
                        buffer.push(c);
                    }
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        break Token::new(CODE_NEWLINE, buffer, start);
                    }
                },
                LexState::Whitespace => match self.advance() {
                    Some(c) if c.is_whitespace() && c != '\n' && c != '\r' => buffer.push(c),
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        break Token::new(CODE_WHITESPACE, buffer, start);
                    }
                },
                LexState::HashPling => {
                    // consume the rest of the line as a line comment.
                    loop {
                        match self.advance() {
                            None | Some('\n') | Some('\r') => break,
                            Some(_) => {}
                        }
                    }
                    state = LexState::Init;
                    return self.lex_one_continue(start);
                }
                LexState::Identifier => match self.advance() {
                    Some(c) if c.is_alphanumeric() || c == '_' => {
                        buffer.push(c);
                        match keyword::classify(&buffer, &self.keywords, self.options.case_sensitive) {
                            KeywordMatchState::NoMatch | KeywordMatchState::MatchLost => {
                                state = LexState::Identifier;
                            }
                            _ => state = LexState::Keyword,
                        }
                    }
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        break self.finish_identifier_or_keyword(buffer, start);
                    }
                },
                LexState::Keyword => match self.advance() {
                    Some(c) if c.is_alphanumeric() || c == '_' => {
                        let mut grown = buffer.clone();
                        grown.push(c);
                        match keyword::classify(&grown, &self.keywords, self.options.case_sensitive) {
                            KeywordMatchState::NoMatch => {
                                buffer = grown;
                                state = LexState::Identifier;
                            }
                            _ => {
                                buffer = grown;
                                state = LexState::Keyword;
                            }
                        }
                    }
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        break self.finish_identifier_or_keyword(buffer, start);
                    }
                },
                LexState::SymbolicKeyword => match self.advance() {
                    None => break self.finish_symbolic_keyword(buffer, kw_last_full, start),
                    Some(c) => {
                        let kw_state = kw_matcher
                            .as_mut()
                            .expect("SymbolicKeyword state always carries a matcher")
                            .feed(c, &self.keywords, self.options.case_sensitive);
                        match kw_state {
                            KeywordMatchState::NoMatch | KeywordMatchState::MatchLost => {
                                self.unread(c);
                                break self.finish_symbolic_keyword(buffer, kw_last_full, start);
                            }
                            _ => {
                                buffer.push(c);
                                if matches!(
                                    kw_state,
                                    KeywordMatchState::FullMatch | KeywordMatchState::FullMatchAndPrefixes
                                ) {
                                    kw_last_full = kw_matcher
                                        .as_ref()
                                        .and_then(|m| m.code())
                                        .map(|code| (code, buffer.len()));
                                }
                            }
                        }
                    }
                },
                LexState::PlusMinus => match self.advance() {
                    Some(c) if c == '0' => {
                        buffer.push(c);
                        state = LexState::Zero;
                    }
                    Some(c) if c.is_ascii_digit() => {
                        buffer.push(c);
                        state = LexState::Number;
                    }
                    other => {
                        // Not followed by a digit after all: only the sign
                        // character was consumed as a token.
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        let sign = buffer.chars().next().unwrap();
                        for c in buffer.chars().skip(1).rev() {
                            self.unread(c);
                        }
                        break Token::new(sign as TokenCode, sign.to_string(), start);
                    }
                },
                LexState::Zero => match self.advance() {
                    Some('x') | Some('X') => {
                        buffer.push('x');
                        state = LexState::HexInteger;
                    }
                    Some('.') => {
                        buffer.push('.');
                        state = LexState::Float;
                    }
                    Some(c) if c.is_ascii_digit() => {
                        // leading zeroes are stripped from decimal integers.
                        state = LexState::DecimalInteger;
                        self.unread(c);
                    }
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        break Token::new(CODE_INTEGER, "0", start);
                    }
                },
                LexState::Number | LexState::DecimalInteger => match self.advance() {
                    Some(c) if c.is_ascii_digit() => buffer.push(c),
                    Some('.') => {
                        buffer.push('.');
                        state = LexState::Float;
                    }
                    Some('e') | Some('E') => {
                        buffer.push('e');
                        state = LexState::SciFloat;
                    }
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        let text = if state == LexState::DecimalInteger {
                            buffer.trim_start_matches('0').to_string()
                        } else {
                            buffer.clone()
                        };
                        let text = if text.is_empty() { "0".to_string() } else { text };
                        break Token::new(CODE_INTEGER, text, start);
                    }
                },
                LexState::HexInteger => match self.advance() {
                    Some(c) if c.is_ascii_hexdigit() => buffer.push(c),
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        break Token::new(CODE_HEX_NUMBER, buffer, start);
                    }
                },
                LexState::Float => match self.advance() {
                    Some(c) if c.is_ascii_digit() => buffer.push(c),
                    Some('e') | Some('E') => {
                        buffer.push('e');
                        state = LexState::SciFloat;
                    }
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        break Token::new(CODE_FLOAT, buffer, start);
                    }
                },
                LexState::SciFloat => match self.advance() {
                    Some(c) if (c == '+' || c == '-') && buffer.ends_with('e') => buffer.push(c),
                    Some(c) if c.is_ascii_digit() => buffer.push(c),
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        break Token::new(CODE_FLOAT, buffer, start);
                    }
                },
                LexState::QuotedStr => {
                    let quote = buffer.chars().next().unwrap();
                    match self.advance() {
                        None => {
                            break Token::new(
                                CODE_ERROR,
                                format!("Unterminated string starting with {}", quote),
                                start,
                            );
                        }
                        Some(c) if c == '\\' => {
                            state = LexState::QuotedStrEscape;
                        }
                        Some(c) if c == quote => {
                            let code = match quote {
                                '\'' => CODE_SQUOTED,
                                '"' => CODE_DQUOTED,
                                '`' => CODE_BACKQUOTED,
                                _ => unreachable!(),
                            };
                            break Token::new(code, buffer[1..].to_string(), start);
                        }
                        Some(c) => buffer.push(c),
                    }
                }
                LexState::QuotedStrEscape => match self.advance() {
                    None => {
                        break Token::new(CODE_ERROR, "Unterminated string".to_string(), start);
                    }
                    Some(c) => {
                        buffer.push(match c {
                            'n' => '\n',
                            'r' => '\r',
                            't' => '\t',
                            other => other,
                        });
                        state = LexState::QuotedStr;
                    }
                },
                LexState::Slash => match self.advance() {
                    Some('/') => state = LexState::LineComment,
                    Some('*') => state = LexState::BlockComment,
                    other => {
                        if let Some(c) = other {
                            self.unread(c);
                        }
                        break Token::new(CODE_SLASH, "/", start);
                    }
                },
                LexState::LineComment => match self.advance() {
                    None | Some('\n') | Some('\r') => {
                        if let Some(c) = self.pushback.last().copied() {
                            // '\n'/'\r' already consumed above was not pushed
                            // back; restart lexing so the newline itself is
                            // tokenized normally on the next call.
                            let _ = c;
                        }
                        state = LexState::Init;
                        return self.lex_one_continue(start);
                    }
                    Some(_) => {}
                },
                LexState::BlockComment => match self.advance() {
                    None => {
                        break Token::new(CODE_ERROR, "Unterminated block comment".to_string(), start);
                    }
                    Some('*') => state = LexState::Star,
                    Some(_) => {}
                },
                LexState::Star => match self.advance() {
                    None => {
                        break Token::new(CODE_ERROR, "Unterminated block comment".to_string(), start);
                    }
                    Some('/') => {
                        state = LexState::Init;
                        return self.lex_one_continue(start);
                    }
                    Some('*') => {}
                    Some(_) => state = LexState::BlockComment,
                },
            }
        };

        self.last_token = Some(token.clone());
        token
    }

    /// After a comment is fully consumed the state machine restarts at
    /// `Init` from a fresh start position rather than recursing, so a long
    /// run of comments does not grow the call stack.
    fn lex_one_continue(&mut self, _previous_start: Position) -> Token {
        self.lex_one()
    }

    fn finish_identifier_or_keyword(&mut self, buffer: String, start: Position) -> Token {
        match keyword::code_for(&buffer, &self.keywords, self.options.case_sensitive) {
            Some(code) => Token::new(code, buffer, start),
            None => Token::new(CODE_IDENTIFIER, buffer, start),
        }
    }

    /// Resolve a `SymbolicKeyword` run once growth stops: emit the longest
    /// confirmed keyword match, pushing back whatever was read past it, or
    /// fall back to the bare lead character as ASCII punctuation if no
    /// keyword was ever confirmed. Mirrors the rollback
    /// `_lexer_state_keyword_handler` performs on `KMSMatchLost`/`KMSNoMatch`
    /// (lexer.c ~745) before re-resolving the trimmed buffer.
    fn finish_symbolic_keyword(
        &mut self,
        buffer: String,
        last_full: Option<(TokenCode, usize)>,
        start: Position,
    ) -> Token {
        match last_full {
            Some((code, len)) if len == buffer.len() => Token::new(code, buffer, start),
            Some((code, len)) => {
                for c in buffer[len..].chars().rev() {
                    self.unread(c);
                }
                Token::new(code, buffer[..len].to_string(), start)
            }
            None => {
                let mut chars = buffer.chars();
                let first = chars.next().expect("SymbolicKeyword buffer always has the lead character");
                for c in chars.rev() {
                    self.unread(c);
                }
                Token::new(first as TokenCode, first.to_string(), start)
            }
        }
    }

    /// Consume characters until (and excluding) an unescaped `marker`,
    /// honoring `\` as an escape for both the marker and any other
    /// character. Used by grammar actions reading raw content, e.g. a regex
    /// literal's body.
    pub fn rollup_to(&mut self, marker: char) -> Token {
        let start = self.current_position();
        let mut buffer = String::new();
        loop {
            match self.advance() {
                None => {
                    return Token::new(
                        CODE_ERROR,
                        format!("Unterminated '{}'", marker),
                        start,
                    );
                }
                Some(c) if c == '\\' => match self.advance() {
                    None => {
                        return Token::new(
                            CODE_ERROR,
                            format!("Unterminated '{}'", marker),
                            start,
                        );
                    }
                    Some(escaped) => buffer.push(escaped),
                },
                Some(c) if c == marker => {
                    let token = Token::new(CODE_RAW_STRING, buffer, start);
                    self.last_token = Some(token.clone());
                    return token;
                }
                Some(c) => buffer.push(c),
            }
        }
    }

    /// Repeatedly read tokens, offering each to `callback`; stops when the
    /// callback returns `false` or the stream is exhausted.
    pub fn tokenize(&mut self, mut callback: impl FnMut(&Token) -> bool) {
        loop {
            let token = self.next_token();
            let is_exhausted = token.is_exhausted();
            if !callback(&token) || is_exhausted {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str, options: LexerOptions) -> Vec<Token> {
        lex_with_keywords(src, options, &[])
    }

    fn lex_with_keywords(src: &str, options: LexerOptions, keywords: &[(&str, TokenCode)]) -> Vec<Token> {
        let mut lexer = Lexer::new(src.chars());
        lexer.options = options;
        for (text, code) in keywords {
            lexer.add_keyword(*code, *text);
        }
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token();
            let done = t.is_exhausted();
            out.push(t);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn identifier_then_integer() {
        let mut opts = LexerOptions::default();
        opts.ignore_all_whitespace();
        let tokens = lex("abc 123", opts);
        assert_eq!(tokens[0].code, CODE_IDENTIFIER);
        assert_eq!(tokens[0].text, "abc");
        assert_eq!(tokens[1].code, CODE_INTEGER);
        assert_eq!(tokens[1].text, "123");
        assert_eq!(tokens[2].code, CODE_END);
        assert_eq!(tokens[3].code, CODE_EXHAUSTED);
    }

    #[test]
    fn hex_number_then_plus() {
        let mut opts = LexerOptions::default();
        opts.ignore_all_whitespace();
        let tokens = lex("0x1F + 2", opts);
        assert_eq!(tokens[0].code, CODE_HEX_NUMBER);
        assert_eq!(tokens[0].text, "0x1F");
        assert_eq!(tokens[1].code, '+' as TokenCode);
        assert_eq!(tokens[2].code, CODE_INTEGER);
        assert_eq!(tokens[2].text, "2");
    }

    #[test]
    fn symbolic_keyword_is_matched_at_end_of_input() {
        let mut opts = LexerOptions::default();
        opts.ignore_all_whitespace();
        let tokens = lex_with_keywords(">=", opts, &[(">=", 200), (">", 201)]);
        assert_eq!(tokens[0].code, 200);
        assert_eq!(tokens[0].text, ">=");
        assert_eq!(tokens[1].code, CODE_END);
    }

    #[test]
    fn symbolic_keyword_backs_off_to_shorter_confirmed_match() {
        // ">=" and "==" are both registered, but the input only confirms
        // "==": the lexer must back off past the extra "=" it speculatively
        // consumed while checking for "==" and hand it back as its own token.
        let mut opts = LexerOptions::default();
        opts.ignore_all_whitespace();
        let tokens = lex_with_keywords("== =", opts, &[("==", 200), ("=", 201)]);
        assert_eq!(tokens[0].code, 200);
        assert_eq!(tokens[0].text, "==");
        assert_eq!(tokens[1].code, 201);
        assert_eq!(tokens[1].text, "=");
        assert_eq!(tokens[2].code, CODE_END);
    }

    #[test]
    fn symbolic_keyword_without_a_registered_prefix_backs_off_to_raw_punctuation() {
        // Only ">=" is registered; ">x" can never complete it, so the lexer
        // must hand back the bare ">" as ASCII punctuation and leave "x" for
        // the next token.
        let mut opts = LexerOptions::default();
        opts.ignore_all_whitespace();
        let tokens = lex_with_keywords(">x", opts, &[(">=", 200)]);
        assert_eq!(tokens[0].code, '>' as TokenCode);
        assert_eq!(tokens[0].text, ">");
        assert_eq!(tokens[1].code, CODE_IDENTIFIER);
        assert_eq!(tokens[1].text, "x");
    }

    #[test]
    fn symbolic_keyword_with_no_keywords_registered_is_unaffected() {
        let mut opts = LexerOptions::default();
        opts.ignore_all_whitespace();
        let tokens = lex("== =", opts);
        assert_eq!(tokens[0].code, '=' as TokenCode);
        assert_eq!(tokens[1].code, '=' as TokenCode);
        assert_eq!(tokens[2].code, '=' as TokenCode);
    }

    #[test]
    fn block_comment_is_skipped() {
        let opts = LexerOptions::default();
        let tokens = lex("/* comment */ x", opts);
        assert_eq!(tokens[0].code, CODE_WHITESPACE);
        assert_eq!(tokens[1].code, CODE_IDENTIFIER);
        assert_eq!(tokens[1].text, "x");
    }

    #[test]
    fn empty_input_is_end_then_exhausted() {
        let tokens = lex("", LexerOptions::default());
        assert_eq!(tokens[0].code, CODE_END);
        assert_eq!(tokens[1].code, CODE_EXHAUSTED);
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let tokens = lex("\"abc", LexerOptions::default());
        assert_eq!(tokens[0].code, CODE_ERROR);
    }
}
