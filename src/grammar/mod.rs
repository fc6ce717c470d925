mod action;
mod analyzer;
mod rule;

pub use action::{ActionInvocation, ActionFn, FunctionResolver, GrammarAction};
pub use rule::{ElementMeta, Nonterminal, Rule, RuleEntry, RuleEntryKind};

use std::collections::HashMap;

use once_cell::unsync::OnceCell;

use crate::error::GrammarError;
use crate::lexer::LexerOptions;
use crate::token::{Token, TokenCode, CODE_DQUOTED, KEYWORD_CODE_BASE};
use crate::util::Position;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrammarStrategy {
    LL1,
}

pub(crate) struct Analysis {
    pub nullable: HashMap<String, bool>,
    pub first: HashMap<String, std::collections::HashSet<TokenCode>>,
    pub follow: HashMap<String, std::collections::HashSet<TokenCode>>,
    /// `parse_table[N][t]` is the index into `nonterminal(N).rules` to expand
    /// when the nonterminal `N` is on top of the rule-entry stack and the
    /// lookahead terminal is `t`.
    pub parse_table: HashMap<String, HashMap<TokenCode, usize>>,
}

/// Declarative grammar: nonterminals, alternative rules, rule entries, the
/// keyword table, lexer options, and the function-name prefix, as described
/// in `SPEC_FULL.md` §D / spec §3. Effectively immutable once [`Grammar::analyze`]
/// succeeds; concurrent parses may then share one `Grammar` safely as long
/// as the host's resolved functions are themselves safe to share.
pub struct Grammar<V: Value> {
    pub(crate) nonterminal_order: Vec<String>,
    pub(crate) nonterminals: HashMap<String, Nonterminal<V>>,
    keyword_table: HashMap<TokenCode, Token>,
    keyword_codes: HashMap<String, TokenCode>,
    next_keyword_code: TokenCode,
    pub lexer_options: LexerOptions,
    pub prefix: Option<String>,
    pub strategy: GrammarStrategy,
    entrypoint: Option<String>,
    pub meta: ElementMeta<V>,
    pub(crate) analysis: OnceCell<Analysis>,
}

impl<V: Value> Grammar<V> {
    pub fn new() -> Self {
        Self {
            nonterminal_order: Vec::new(),
            nonterminals: HashMap::new(),
            keyword_table: HashMap::new(),
            keyword_codes: HashMap::new(),
            next_keyword_code: KEYWORD_CODE_BASE,
            lexer_options: LexerOptions::default(),
            prefix: None,
            strategy: GrammarStrategy::LL1,
            entrypoint: None,
            meta: ElementMeta::default(),
            analysis: OnceCell::new(),
        }
    }

    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    pub fn nonterminal(&self, name: &str) -> Option<&Nonterminal<V>> {
        self.nonterminals.get(name)
    }

    /// Create (or return the existing) nonterminal named `name`. The first
    /// nonterminal ever created becomes the grammar's entrypoint.
    pub fn create_nonterminal(&mut self, name: impl Into<String>) -> &mut Nonterminal<V> {
        let name = name.into();
        if !self.nonterminals.contains_key(&name) {
            if self.entrypoint.is_none() {
                self.entrypoint = Some(name.clone());
            }
            self.nonterminal_order.push(name.clone());
            self.nonterminals
                .insert(name.clone(), Nonterminal::new(name.clone()));
        }
        self.nonterminals.get_mut(&name).unwrap()
    }

    fn keyword_code(&mut self, text: &str) -> TokenCode {
        if let Some(code) = self.keyword_codes.get(text) {
            return *code;
        }
        let code = self.next_keyword_code;
        self.next_keyword_code += 1;
        self.keyword_codes.insert(text.to_string(), code);
        self.keyword_table
            .insert(code, Token::new(code, text.to_string(), Position::new(0, 0)));
        code
    }

    pub fn keyword_table(&self) -> &HashMap<TokenCode, Token> {
        &self.keyword_table
    }

    /// Append a terminal entry to `rule` for `token`. A `DQuoted` token whose
    /// text is not the bare `"` is treated as keyword literal text and
    /// hashed to a stable code >= 200 via [`Grammar::keyword_code`]; any
    /// other token contributes its own code directly.
    pub fn add_terminal_entry(&mut self, rule: &mut Rule<V>, token: &Token) {
        let code = if token.code == CODE_DQUOTED && token.text != "\"" {
            self.keyword_code(&token.text)
        } else {
            token.code
        };
        rule.entries.push(RuleEntry::terminal(code));
    }

    /// Resolve `name` and attach it as an action on `meta`, per the prefix
    /// order in [`FunctionResolver::resolve`]. Failure is a grammar
    /// construction error, never a parse-time error.
    pub fn add_resolved_action(
        &mut self,
        meta: &mut ElementMeta<V>,
        name: &str,
        literal: Option<Token>,
        resolver: &dyn FunctionResolver<V>,
    ) -> Result<(), GrammarError> {
        let function = resolver.resolve(name, self.prefix.as_deref()).ok_or_else(|| {
            GrammarError::new("UnresolvedFunction", format!("cannot resolve action '{}'", name))
        })?;
        meta.add_action(GrammarAction {
            name: name.to_string(),
            literal,
            function,
        });
        Ok(())
    }

    /// `ge_set_option`: option names starting with `_` are stored as
    /// configuration variables on `meta`; any other name is resolved to a
    /// function and appended to `meta`'s action list.
    pub fn set_option(
        &mut self,
        meta: &mut ElementMeta<V>,
        name: &Token,
        value: &Token,
        resolver: &dyn FunctionResolver<V>,
    ) -> Result<(), GrammarError> {
        if name.text.starts_with('_') {
            meta.set_variable(name.text.clone(), value.clone());
            Ok(())
        } else {
            self.add_resolved_action(meta, &name.text, Some(value.clone()), resolver)
        }
    }

    /// Grammar-level options (`_strategy`, `_prefix`, `_lib`, `_ignore`,
    /// `_case_sensitive`, `_hashpling`, `_signed_numbers`). Unlike element
    /// options, unknown names here are a construction error.
    pub fn set_grammar_option(&mut self, name: &Token, value: &Token) -> Result<(), GrammarError> {
        match name.text.as_str() {
            "_strategy" => {
                if value.text != "LL(1)" {
                    return Err(GrammarError::new(
                        "UnsupportedStrategy",
                        format!("only LL(1) is supported, got '{}'", value.text),
                    ));
                }
                self.strategy = GrammarStrategy::LL1;
            }
            "_prefix" => self.prefix = Some(value.text.clone()),
            "_lib" => self.meta.set_variable("_lib", value.clone()),
            "_ignore" => match value.text.as_str() {
                "whitespace" => self.lexer_options.ignore_whitespace = true,
                "newlines" => self.lexer_options.ignore_new_lines = true,
                "all_whitespace" => self.lexer_options.ignore_all_whitespace(),
                other => {
                    return Err(GrammarError::new(
                        "UnknownOption",
                        format!("unknown _ignore value '{}'", other),
                    ))
                }
            },
            "_case_sensitive" => self.lexer_options.case_sensitive = value.text == "true",
            "_hashpling" => self.lexer_options.hashpling = value.text == "true",
            "_signed_numbers" => self.lexer_options.signed_numbers = value.text == "true",
            other => {
                return Err(GrammarError::new(
                    "UnknownOption",
                    format!("unknown grammar option '{}'", other),
                ))
            }
        }
        Ok(())
    }

    /// Render a readable grammar listing (nonterminals, rules, entries),
    /// grounded in the teacher's own `IProduction::build_grammar`. Debugging
    /// aid, not a parser.
    pub fn describe(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        for name in &self.nonterminal_order {
            let nt = &self.nonterminals[name];
            let _ = writeln!(out, "{} ->", name);
            for rule in &nt.rules {
                let parts: Vec<String> = rule
                    .entries
                    .iter()
                    .map(|e| match &e.kind {
                        RuleEntryKind::Terminal(code) => format!("#{}", code),
                        RuleEntryKind::NonTerminalRef(n) => n.clone(),
                        RuleEntryKind::Empty => "ε".to_string(),
                    })
                    .collect();
                let _ = writeln!(out, "    | {}", parts.join(" "));
            }
        }
        out
    }
}

impl<V: Value> Default for Grammar<V> {
    fn default() -> Self {
        Self::new()
    }
}
