use std::collections::HashMap;

use crate::grammar::action::GrammarAction;
use crate::token::{Token, TokenCode};
use crate::value::Value;

/// Actions and configuration variables shared by every grammar element
/// (grammar, nonterminal, rule, and rule entry). Option names starting with
/// `_` land in `variables`; everything else resolves to a function and is
/// appended to `actions` (see `Grammar::set_option`).
pub struct ElementMeta<V: Value> {
    pub actions: Vec<GrammarAction<V>>,
    pub variables: HashMap<String, Token>,
}

impl<V: Value> Default for ElementMeta<V> {
    fn default() -> Self {
        Self {
            actions: Vec::new(),
            variables: HashMap::new(),
        }
    }
}

impl<V: Value> ElementMeta<V> {
    pub fn add_action(&mut self, action: GrammarAction<V>) {
        self.actions.push(action);
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Token) {
        self.variables.insert(name.into(), value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEntryKind {
    Terminal(TokenCode),
    NonTerminalRef(String),
    /// An epsilon entry. A rule with an `Empty` entry is nullable; per
    /// `SPEC_FULL.md`, this is the construction-time counterpart of
    /// `rule_entry_empty` in the grammar this front-end is built from.
    Empty,
}

pub struct RuleEntry<V: Value> {
    pub kind: RuleEntryKind,
    pub meta: ElementMeta<V>,
}

impl<V: Value> RuleEntry<V> {
    pub fn terminal(code: TokenCode) -> Self {
        Self {
            kind: RuleEntryKind::Terminal(code),
            meta: ElementMeta::default(),
        }
    }

    pub fn non_terminal(name: impl Into<String>) -> Self {
        Self {
            kind: RuleEntryKind::NonTerminalRef(name.into()),
            meta: ElementMeta::default(),
        }
    }

    pub fn empty() -> Self {
        Self {
            kind: RuleEntryKind::Empty,
            meta: ElementMeta::default(),
        }
    }
}

pub struct Rule<V: Value> {
    pub entries: Vec<RuleEntry<V>>,
    pub meta: ElementMeta<V>,
}

impl<V: Value> Rule<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            meta: ElementMeta::default(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.kind, RuleEntryKind::Empty))
    }
}

impl<V: Value> Default for Rule<V> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Nonterminal<V: Value> {
    pub name: String,
    pub rules: Vec<Rule<V>>,
    pub meta: ElementMeta<V>,
}

impl<V: Value> Nonterminal<V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            meta: ElementMeta::default(),
        }
    }
}
