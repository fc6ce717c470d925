//! Obelix front-end: a table-driven lexer, an LL(1) grammar model and
//! analyzer, a rule-action-driven predictive parser, and a partially-
//! reducing AST evaluator.
//!
//! # Overview
//!
//! The pipeline runs source text through four stages, each a module here:
//!
//! - [`lexer`] — a cooperative character-stream state machine
//!   ([`lexer::Lexer`]) that emits [`token::Token`]s one at a time, with
//!   keyword-vs-identifier disambiguation, configurable whitespace/newline
//!   filtering, and a `rollup_to` escape hatch for raw-content literals.
//! - [`grammar`] — a declarative [`grammar::Grammar`] of nonterminals, rules,
//!   and rule entries, each carrying named semantic actions; [`Grammar::analyze`](grammar::Grammar::analyze)
//!   computes FIRST/FOLLOW sets, checks the grammar is LL(1), and builds a
//!   per-nonterminal parse table.
//! - [`parser`] — a predictive [`parser::Parser`] that drives an explicit
//!   rule-entry stack against the parse table, firing each rule's and
//!   entry's actions in declaration order and exposing a user-visible data
//!   stack those actions push/pop values on.
//! - [`ast`] — an [`ast::AstNode`] enum whose `call` either fully reduces to
//!   a constant, raises an exception, or returns a smaller node of the same
//!   kind with whatever sub-expressions could already be folded.
//!
//! None of the four stages know about each other's host: the value model,
//! the function resolver a grammar's actions are wired against, and the
//! evaluation context an AST node is called with are all supplied by the
//! embedder through the traits in [`value`] ([`value::Value`],
//! [`value::Context`]) and [`grammar::FunctionResolver`]. This crate never
//! constructs a concrete value itself.
//!
//! # Example
//!
//! Wiring the pieces together for a grammar that recognizes `a*` looks
//! roughly like this (a host's [`value::Value`]/[`value::Context`]
//! implementation and function table are elided):
//!
//! ```ignore
//! use obelix_front::grammar::{FunctionResolver, Grammar};
//! use obelix_front::lexer::Lexer;
//! use obelix_front::parser::{LexerTokenSource, Parser};
//!
//! let mut grammar: Grammar<MyValue> = Grammar::new();
//! // `s -> 'a' s | ε`
//! let a_token = obelix_front::token::Token::new('a' as _, "a", obelix_front::Position::new(1, 0));
//! {
//!     let nt = grammar.create_nonterminal("s");
//!     let mut rule = obelix_front::grammar::Rule::new();
//!     grammar.add_terminal_entry(&mut rule, &a_token);
//!     rule.entries.push(obelix_front::grammar::RuleEntry::non_terminal("s"));
//!     nt.rules.push(rule);
//!     nt.rules.push(obelix_front::grammar::Rule::new()); // epsilon alternative
//! }
//! grammar.analyze().unwrap();
//!
//! let lexer = Lexer::new("aa".chars());
//! let mut source = LexerTokenSource::new(lexer);
//! let mut parser = Parser::new(&grammar, &mut source);
//! parser.parse().unwrap();
//! ```
//!
//! # License
//! Provided under the MIT license.

pub mod ast;
pub mod error;
pub mod grammar;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod util;
pub mod value;

pub use ast::{AstNode, CallResult};
pub use error::{GrammarError, LexError, ParseError};
pub use grammar::{FunctionResolver, Grammar, Nonterminal, Rule, RuleEntry};
pub use lexer::{CharStream, Lexer, LexerOptions};
pub use parser::{LexerTokenSource, Parser, TokenSource};
pub use token::{Token, TokenCode};
pub use util::{Log, Position};
pub use value::{Context, ExceptionKind, Value, ValueIter};
