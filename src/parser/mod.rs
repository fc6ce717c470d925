mod source;

pub use source::{LexerTokenSource, TokenSource};

use std::collections::HashMap;

use crate::error::ParseError;
use crate::grammar::{ActionInvocation, Grammar, RuleEntryKind};
use crate::token::{Token, CODE_EMPTY, CODE_END};
use crate::util::Log;
use crate::value::Value;

#[derive(Debug, Clone)]
enum Frame {
    End,
    NonTerminal(String),
    EntryTerminal {
        nonterminal: String,
        rule_index: usize,
        entry_index: usize,
    },
    PostEntry {
        nonterminal: String,
        rule_index: usize,
        entry_index: usize,
    },
    PostRule {
        #[allow(dead_code)]
        nonterminal: String,
        #[allow(dead_code)]
        rule_index: usize,
    },
}

/// Predictive LL(1) driver: an explicit rule-entry stack (`frames`), a
/// user-visible data stack (`data_stack`) that grammar actions push/pop,
/// and a key-value map (`vars`) for cross-action state, exactly the state
/// described in spec §4.4.
pub struct Parser<'g, V: Value> {
    grammar: &'g Grammar<V>,
    source: &'g mut dyn TokenSource,
    frames: Vec<Frame>,
    pub data_stack: Vec<V>,
    vars: HashMap<String, V>,
    last_token: Option<Token>,
    pub in_statement: bool,
    debug: Log<&'static str>,
}

impl<'g, V: Value> Parser<'g, V> {
    pub fn new(grammar: &'g Grammar<V>, source: &'g mut dyn TokenSource) -> Self {
        Self {
            grammar,
            source,
            frames: Vec::new(),
            data_stack: Vec::new(),
            vars: HashMap::new(),
            last_token: None,
            in_statement: false,
            debug: Log::None,
        }
    }

    pub fn set_debug(&mut self, log: Log<&'static str>) {
        self.debug = log;
    }

    pub fn grammar(&self) -> &Grammar<V> {
        self.grammar
    }

    pub fn last_token(&self) -> Option<&Token> {
        self.last_token.as_ref()
    }

    pub fn push(&mut self, value: V) {
        self.data_stack.push(value);
    }

    pub fn pop(&mut self) -> Option<V> {
        self.data_stack.pop()
    }

    pub fn set(&mut self, name: impl Into<String>, value: V) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&V> {
        self.vars.get(name)
    }

    /// Drive the parse to completion (or the first error). Actions
    /// accumulate whatever result they compute onto `data_stack` or `vars`;
    /// this method itself returns nothing but `Ok(())`/`Err`.
    pub fn parse(&mut self) -> Result<(), ParseError> {
        let entrypoint = self
            .grammar
            .entrypoint()
            .expect("grammar has no entrypoint nonterminal")
            .to_string();
        self.frames.push(Frame::End);
        self.frames.push(Frame::NonTerminal(entrypoint));

        while let Some(frame) = self.frames.pop() {
            match frame {
                Frame::End => {
                    let token = self.source.peek().clone();
                    if token.code != CODE_END {
                        return Err(ParseError::new(
                            token.position(),
                            format!("expected end of input, got {:?}", token.text),
                        ));
                    }
                    self.debug.trace_result("parse complete");
                    return Ok(());
                }
                Frame::NonTerminal(name) => self.expand_nonterminal(&name)?,
                Frame::EntryTerminal {
                    nonterminal,
                    rule_index,
                    entry_index,
                } => self.match_terminal(&nonterminal, rule_index, entry_index)?,
                Frame::PostEntry {
                    nonterminal,
                    rule_index,
                    entry_index,
                } => {
                    self.run_actions(&nonterminal, rule_index, ActionSite::Entry(entry_index))
                        .map_err(|e| self.exception_to_parse_error(e))?;
                }
                Frame::PostRule { .. } => {}
            }
        }
        Err(ParseError::new(
            self.source.peek().position(),
            "parser terminated before reaching end of input".to_string(),
        ))
    }

    fn exception_to_parse_error(&self, exception: V::Exception) -> ParseError {
        ParseError::new(
            self.last_token
                .as_ref()
                .map(Token::position)
                .unwrap_or(crate::util::Position::new(0, 0)),
            format!("{:?}", exception),
        )
    }

    fn expand_nonterminal(&mut self, name: &str) -> Result<(), ParseError> {
        let token = self.source.peek().clone();
        if token.is_error() {
            return Err(ParseError::new(token.position(), token.text));
        }
        let analysis = self.grammar.analysis();
        let rule_index = analysis
            .parse_table
            .get(name)
            .and_then(|t| t.get(&token.code))
            .copied();

        let rule_index = match rule_index {
            Some(i) => i,
            None if *analysis.nullable.get(name).unwrap_or(&false) => {
                let nt = self
                    .grammar
                    .nonterminal(name)
                    .unwrap_or_else(|| panic!("unknown nonterminal '{}'", name));
                nt.rules
                    .iter()
                    .position(|r| r.entries.iter().all(|e| matches!(e.kind, RuleEntryKind::Empty)))
                    .ok_or_else(|| {
                        ParseError::new(
                            token.position(),
                            format!("nonterminal '{}' is nullable but has no epsilon rule", name),
                        )
                    })?
            }
            None => {
                return Err(ParseError::new(
                    token.position(),
                    format!("unexpected token {:?} while parsing '{}'", token.text, name),
                ))
            }
        };

        self.debug
            .trace_verbose(&format!("entering {} via rule {}", name, rule_index));

        self.run_actions(name, rule_index, ActionSite::Nonterminal)
            .map_err(|e| self.exception_to_parse_error(e))?;
        self.run_actions(name, rule_index, ActionSite::Rule)
            .map_err(|e| self.exception_to_parse_error(e))?;

        let entry_count = self.grammar.nonterminal(name).unwrap().rules[rule_index]
            .entries
            .len();
        self.frames.push(Frame::PostRule {
            nonterminal: name.to_string(),
            rule_index,
        });
        for i in (0..entry_count).rev() {
            let kind = &self.grammar.nonterminal(name).unwrap().rules[rule_index].entries[i].kind;
            match kind {
                RuleEntryKind::Terminal(_) => self.frames.push(Frame::EntryTerminal {
                    nonterminal: name.to_string(),
                    rule_index,
                    entry_index: i,
                }),
                RuleEntryKind::NonTerminalRef(ref_name) => {
                    self.frames.push(Frame::PostEntry {
                        nonterminal: name.to_string(),
                        rule_index,
                        entry_index: i,
                    });
                    self.frames.push(Frame::NonTerminal(ref_name.clone()));
                }
                RuleEntryKind::Empty => {}
            }
        }
        Ok(())
    }

    fn match_terminal(
        &mut self,
        nonterminal: &str,
        rule_index: usize,
        entry_index: usize,
    ) -> Result<(), ParseError> {
        let expected_code = match &self.grammar.nonterminal(nonterminal).unwrap().rules[rule_index]
            .entries[entry_index]
            .kind
        {
            RuleEntryKind::Terminal(code) => *code,
            _ => unreachable!("EntryTerminal frame must target a terminal entry"),
        };
        let token = self.source.peek().clone();
        if token.is_error() {
            return Err(ParseError::new(token.position(), token.text));
        }
        if expected_code == CODE_EMPTY || token.code == expected_code {
            let matched = self.source.advance();
            self.last_token = Some(matched);
            self.run_actions(nonterminal, rule_index, ActionSite::Entry(entry_index))
                .map_err(|e| self.exception_to_parse_error(e))?;
            Ok(())
        } else {
            Err(ParseError::new(
                token.position(),
                format!(
                    "expected token code {}, got {} ({:?})",
                    expected_code, token.code, token.text
                ),
            ))
        }
    }

    fn run_actions(
        &mut self,
        nonterminal: &str,
        rule_index: usize,
        site: ActionSite,
    ) -> Result<(), V::Exception> {
        let actions = {
            let nt = self.grammar.nonterminal(nonterminal).unwrap();
            match site {
                ActionSite::Nonterminal => nt.meta.actions.clone(),
                ActionSite::Rule => nt.rules[rule_index].meta.actions.clone(),
                ActionSite::Entry(i) => nt.rules[rule_index].entries[i].meta.actions.clone(),
            }
        };
        for action in actions {
            let invocation = ActionInvocation {
                last_token: self.last_token.clone(),
                literal: action.literal.clone(),
            };
            (action.function)(self, invocation)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum ActionSite {
    Nonterminal,
    Rule,
    Entry(usize),
}
