use crate::token::TokenCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Disambiguates a growing token buffer against the registered keyword list.
/// The lexer uses this after every character appended to an identifier-or-
/// keyword-shaped run to decide whether to keep growing, emit a keyword, or
/// fall back to an identifier.
pub enum KeywordMatchState {
    NoMatch,
    PrefixMatched,
    PrefixesMatched,
    FullMatch,
    FullMatchAndPrefixes,
    IdentifierFullMatch,
    IdentifierFullMatchAndPrefixes,
    MatchLost,
}

fn looks_like_identifier(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn starts_with_ci(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a.starts_with(b)
    } else {
        // `a.get(..b.len())` returns `None` rather than panicking when
        // `b.len()` doesn't land on a char boundary of `a` (possible
        // whenever either string holds multi-byte characters).
        match a.get(..b.len()) {
            Some(prefix) => prefix.eq_ignore_ascii_case(b),
            None => false,
        }
    }
}

/// Count how many registered keywords `buffer` is a prefix of, separating
/// out the keyword it matches exactly (if any). Mirrors
/// `_kw_matches_match_reducer` (lexer.c ~289), which folds over the keyword
/// list counting every keyword `buffer` is a prefix of — including an exact
/// match, which counts toward the tally as well as setting `code`.
fn count_matches(buffer: &str, keywords: &[(String, TokenCode)], case_sensitive: bool) -> (Option<TokenCode>, usize) {
    let eq = |a: &str, b: &str| {
        if case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    };

    let mut code = None;
    let mut prefix_count = 0usize;
    for (text, kw_code) in keywords {
        if eq(text, buffer) {
            code = Some(*kw_code);
        } else if buffer.len() <= text.len() && starts_with_ci(text, buffer, case_sensitive) {
            prefix_count += 1;
        }
    }
    (code, prefix_count)
}

/// Classify `buffer` against `keywords` in isolation, ignoring ASCII case
/// when `case_sensitive` is false. This is the state-free half of
/// `_kw_matches_match` (lexer.c ~303): it reports what `buffer` matches on
/// its own, but — not knowing what the buffer matched one character ago —
/// can never report `MatchLost`. Use [`KeywordMatcher`] when that history
/// matters.
pub fn classify(buffer: &str, keywords: &[(String, TokenCode)], case_sensitive: bool) -> KeywordMatchState {
    let (code, prefix_count) = count_matches(buffer, keywords, case_sensitive);
    let identifier_shaped = looks_like_identifier(buffer);
    match (code, prefix_count) {
        (None, 0) => KeywordMatchState::NoMatch,
        (None, 1) => KeywordMatchState::PrefixMatched,
        (None, _) => KeywordMatchState::PrefixesMatched,
        (Some(_), 0) if identifier_shaped => KeywordMatchState::IdentifierFullMatch,
        (Some(_), 0) => KeywordMatchState::FullMatch,
        (Some(_), _) if identifier_shaped => KeywordMatchState::IdentifierFullMatchAndPrefixes,
        (Some(_), _) => KeywordMatchState::FullMatchAndPrefixes,
    }
}

/// Stateful port of `_kw_matches_t` (lexer.c ~50) / `_kw_matches_match`
/// (lexer.c ~303): unlike [`classify`], which only ever sees the current
/// buffer, this remembers the previous classification so it can report
/// `KeywordMatchState::MatchLost` — the buffer was a confirmed keyword (or
/// an identifier-shaped one) with other keywords still reachable by further
/// growth, and the character just appended ruled all of them out at once.
pub struct KeywordMatcher {
    buffer: String,
    code: Option<TokenCode>,
    state: KeywordMatchState,
}

impl KeywordMatcher {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            code: None,
            state: KeywordMatchState::NoMatch,
        }
    }

    /// Append `c` to the growing buffer and report its classification,
    /// following `_kw_matches_match`'s transition table exactly: plain
    /// `NoMatch` only turns into `MatchLost` when the buffer had reached
    /// `FullMatchAndPrefixes` or `IdentifierFullMatch` one character ago,
    /// and a `MatchLost` buffer that starts matching again resolves only to
    /// `FullMatch` or back to `NoMatch`, never to the "and prefixes"
    /// variants (a keyword can be lost at most once per run).
    pub fn feed(&mut self, c: char, keywords: &[(String, TokenCode)], case_sensitive: bool) -> KeywordMatchState {
        self.buffer.push(c);
        let (code, prefix_count) = count_matches(&self.buffer, keywords, case_sensitive);

        let mut state = match (code, prefix_count) {
            (None, 0) => {
                if matches!(
                    self.state,
                    KeywordMatchState::FullMatchAndPrefixes | KeywordMatchState::IdentifierFullMatch
                ) {
                    KeywordMatchState::MatchLost
                } else {
                    KeywordMatchState::NoMatch
                }
            }
            (None, 1) => KeywordMatchState::PrefixMatched,
            (None, _) => KeywordMatchState::PrefixesMatched,
            (Some(_), 0) => KeywordMatchState::FullMatch,
            (Some(_), _) if self.state == KeywordMatchState::MatchLost => KeywordMatchState::FullMatch,
            (Some(_), _) => KeywordMatchState::FullMatchAndPrefixes,
            // matches > 1, no exact match, recovering from a lost match.
        };
        if code.is_none() && prefix_count > 1 && self.state == KeywordMatchState::MatchLost {
            state = KeywordMatchState::NoMatch;
        }

        if state == KeywordMatchState::FullMatch && looks_like_identifier(&self.buffer) {
            state = KeywordMatchState::IdentifierFullMatch;
        }

        self.code = code;
        self.state = state;
        state
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// The token code of the keyword last confirmed by a `FullMatch`-family
    /// state, if any.
    pub fn code(&self) -> Option<TokenCode> {
        self.code
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new()
    }
}

pub fn code_for(buffer: &str, keywords: &[(String, TokenCode)], case_sensitive: bool) -> Option<TokenCode> {
    keywords.iter().find_map(|(text, code)| {
        let matches = if case_sensitive {
            text == buffer
        } else {
            text.eq_ignore_ascii_case(buffer)
        };
        matches.then_some(*code)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disambiguates_identifier_prefix_from_keyword() {
        let keywords = vec![("in".to_string(), 200), ("instanceof".to_string(), 201)];
        assert_eq!(
            classify("in", &keywords, true),
            KeywordMatchState::IdentifierFullMatchAndPrefixes
        );
        assert_eq!(classify("ins", &keywords, true), KeywordMatchState::PrefixMatched);
        assert_eq!(classify("inx", &keywords, true), KeywordMatchState::NoMatch);
    }

    #[test]
    fn symbolic_keyword_full_match_has_no_identifier_flag() {
        let keywords = vec![("=".to_string(), 200), ("==".to_string(), 201)];
        assert_eq!(
            classify("=", &keywords, true),
            KeywordMatchState::FullMatchAndPrefixes
        );
        assert_eq!(classify("==", &keywords, true), KeywordMatchState::FullMatch);
    }

    #[test]
    fn matcher_reports_match_lost_when_an_identifier_keyword_is_overshot() {
        // "in" is itself a keyword, but growing past it into "in3" makes it
        // an ordinary identifier: the confirmed `IdentifierFullMatch` is
        // exactly the state `_kw_matches_match` treats as recoverably lost.
        let keywords = vec![("in".to_string(), 200)];
        let mut matcher = KeywordMatcher::new();
        assert_eq!(matcher.feed('i', &keywords, true), KeywordMatchState::PrefixMatched);
        assert_eq!(matcher.feed('n', &keywords, true), KeywordMatchState::IdentifierFullMatch);
        assert_eq!(matcher.feed('3', &keywords, true), KeywordMatchState::MatchLost);
    }

    #[test]
    fn matcher_reports_match_lost_when_a_keyword_with_live_extensions_is_overshot() {
        // "=" is a confirmed keyword on its own, but "==" is still a live
        // extension of it (`FullMatchAndPrefixes`); losing that extension
        // entirely on the next character is the other state `MatchLost`
        // recovers from.
        let keywords = vec![("=".to_string(), 200), ("==".to_string(), 201)];
        let mut matcher = KeywordMatcher::new();
        assert_eq!(
            matcher.feed('=', &keywords, true),
            KeywordMatchState::FullMatchAndPrefixes
        );
        assert_eq!(matcher.feed('x', &keywords, true), KeywordMatchState::MatchLost);
    }

    #[test]
    fn matcher_reports_plain_no_match_when_an_isolated_full_match_is_overshot() {
        // "==" has no competing keyword, so once it fully matches there is
        // no live extension to lose: `_kw_matches_match` only special-cases
        // `FullMatchAndPrefixes`/`IdentifierFullMatch`, so overshooting a
        // lone `FullMatch` resolves to plain `NoMatch`, not `MatchLost`.
        let keywords = vec![("==".to_string(), 200)];
        let mut matcher = KeywordMatcher::new();
        assert_eq!(matcher.feed('=', &keywords, true), KeywordMatchState::PrefixMatched);
        assert_eq!(matcher.feed('=', &keywords, true), KeywordMatchState::FullMatch);
        assert_eq!(matcher.feed('=', &keywords, true), KeywordMatchState::NoMatch);
    }

    #[test]
    fn case_insensitive_matching() {
        let keywords = vec![("If".to_string(), 200)];
        assert_eq!(
            classify("if", &keywords, false),
            KeywordMatchState::IdentifierFullMatch
        );
        assert_eq!(classify("if", &keywords, true), KeywordMatchState::NoMatch);
    }

    #[test]
    fn case_insensitive_match_does_not_panic_on_multibyte_buffers() {
        // "é" is two bytes in UTF-8; a naive `a[..b.len()]` slice on a
        // shorter multibyte buffer would land mid-character and panic.
        let keywords = vec![("é".to_string(), 200)];
        assert_eq!(classify("éé", &keywords, false), KeywordMatchState::NoMatch);
        assert_eq!(classify("é", &keywords, false), KeywordMatchState::FullMatch);
    }
}
