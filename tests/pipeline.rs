//! Whole-pipeline integration tests: tokenize -> parse -> evaluate over a
//! small arithmetic grammar built directly against the public construction
//! API (`Grammar::create_nonterminal`, `Rule`, `RuleEntry`), mirroring how a
//! host would wire a concrete grammar onto this crate.

use std::collections::HashMap;
use std::rc::Rc;

use obelix_front::ast::{AstNode, CallResult};
use obelix_front::grammar::{ActionFn, ActionInvocation, FunctionResolver, Grammar, Rule, RuleEntry};
use obelix_front::lexer::Lexer;
use obelix_front::parser::{LexerTokenSource, Parser};
use obelix_front::token::{Token, TokenCode, CODE_DQUOTED, CODE_INTEGER};
use obelix_front::value::{Context, ExceptionKind, Value, ValueIter};

#[derive(Debug, Clone, PartialEq)]
enum IntValue {
    Int(i64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone)]
struct IntException(ExceptionKind, String);

struct NeverIter;
impl ValueIter<IntValue> for NeverIter {
    fn next(&mut self) -> Result<IntValue, IntException> {
        Err(IntValue::exception(ExceptionKind::Exhausted, "no iteration"))
    }
}

impl Value for IntValue {
    type Exception = IntException;
    type Iter = NeverIter;

    fn from_token(token: &Token) -> Result<Self, Self::Exception> {
        token
            .text
            .parse::<i64>()
            .map(IntValue::Int)
            .map_err(|_| IntValue::exception(ExceptionKind::TypeError, "not an integer"))
    }

    fn as_bool(&self) -> Result<bool, Self::Exception> {
        match self {
            IntValue::Bool(b) => Ok(*b),
            IntValue::Int(n) => Ok(*n != 0),
            IntValue::Null => Ok(false),
        }
    }

    fn values_equal(&self, other: &Self) -> bool {
        self == other
    }

    fn execute(&self, op_name: &str, args: &[Self]) -> Result<Self, Self::Exception> {
        match (self, op_name, args) {
            (IntValue::Int(a), "+", [IntValue::Int(b)]) => Ok(IntValue::Int(a + b)),
            (IntValue::Int(a), "-", [IntValue::Int(b)]) => Ok(IntValue::Int(a - b)),
            (IntValue::Int(a), "*", [IntValue::Int(b)]) => Ok(IntValue::Int(a * b)),
            (IntValue::Int(a), "/", [IntValue::Int(b)]) => {
                if *b == 0 {
                    Err(IntValue::exception(ExceptionKind::Runtime, "division by zero"))
                } else {
                    Ok(IntValue::Int(a / b))
                }
            }
            _ => Err(IntValue::exception(ExceptionKind::TypeError, "bad operands")),
        }
    }

    fn is_callable(&self) -> bool {
        false
    }

    fn iter(&self) -> Result<Self::Iter, Self::Exception> {
        Ok(NeverIter)
    }

    fn exception(kind: ExceptionKind, message: impl Into<String>) -> Self::Exception {
        IntException(kind, message.into())
    }

    fn exception_kind(exception: &Self::Exception) -> ExceptionKind {
        exception.0
    }

    fn render(&self) -> String {
        match self {
            IntValue::Int(n) => n.to_string(),
            IntValue::Bool(b) => b.to_string(),
            IntValue::Null => "null".to_string(),
        }
    }

    fn null() -> Self {
        IntValue::Null
    }

    fn from_bool(value: bool) -> Self {
        IntValue::Bool(value)
    }

    fn as_return(self) -> Self::Exception {
        IntException(ExceptionKind::Return, self.render())
    }

    fn as_exit(self) -> Self::Exception {
        IntException(ExceptionKind::Exit, self.render())
    }
}

struct NoContext;
impl Context<IntValue> for NoContext {
    fn get(&self, qualified_name: &str) -> Result<IntValue, IntException> {
        Err(IntValue::exception(ExceptionKind::Name, format!("undefined '{}'", qualified_name)))
    }
    fn set(&mut self, _qualified_name: &str, _value: IntValue) -> Result<(), IntException> {
        Ok(())
    }
}

/// A name -> function table standing in for the host's function resolver
/// (spec §4.1). Grammar construction resolves each action name against this
/// once, up front; the parser itself never does a name lookup.
#[derive(Default)]
struct ActionTable(HashMap<String, ActionFn<IntValue>>);

impl ActionTable {
    fn register(&mut self, name: &str, f: ActionFn<IntValue>) {
        self.0.insert(name.to_string(), f);
    }
}

impl FunctionResolver<IntValue> for ActionTable {
    fn lookup(&self, name: &str) -> Option<ActionFn<IntValue>> {
        self.0.get(name).cloned()
    }
}

fn binary_action(op: &'static str) -> ActionFn<IntValue> {
    Rc::new(move |parser: &mut Parser<IntValue>, _inv: ActionInvocation| {
        let rhs = parser.pop().expect("rhs operand missing from data stack");
        let lhs = parser.pop().expect("lhs operand missing from data stack");
        let result = lhs.execute(op, &[rhs])?;
        parser.push(result);
        Ok(())
    })
}

fn push_int_action() -> ActionFn<IntValue> {
    Rc::new(|parser: &mut Parser<IntValue>, inv: ActionInvocation| {
        let token = inv.last_token.expect("push_int fired without a matched token");
        parser.push(IntValue::from_token(&token)?);
        Ok(())
    })
}

fn incr_counter_action() -> ActionFn<IntValue> {
    Rc::new(|parser: &mut Parser<IntValue>, _inv: ActionInvocation| {
        let current = match parser.get("count") {
            Some(IntValue::Int(n)) => *n,
            _ => 0,
        };
        parser.set("count", IntValue::Int(current + 1));
        Ok(())
    })
}

/// `Expr -> Term ExprTail`
/// `ExprTail -> '+' Term ExprTail | '-' Term ExprTail | ε`
/// `Term -> Factor TermTail`
/// `TermTail -> '*' Factor TermTail | '/' Factor TermTail | ε`
/// `Factor -> Integer | '(' Expr ')'`
///
/// Standard removal of left recursion for left-associative `+ - * /`; each
/// operator's action fires once its right-hand operand's nonterminal entry
/// has finished reducing, combining it with whatever the data stack already
/// holds from parsing so far (spec §4.4's "entry actions fire with the
/// matched/entered element fully resolved").
fn build_arithmetic_grammar(table: &ActionTable) -> Grammar<IntValue> {
    let mut grammar: Grammar<IntValue> = Grammar::new();
    grammar.lexer_options.ignore_all_whitespace();

    {
        let mut rule = Rule::new();
        rule.entries.push(RuleEntry::non_terminal("Term"));
        rule.entries.push(RuleEntry::non_terminal("ExprTail"));
        grammar.create_nonterminal("Expr").rules.push(rule);
    }

    {
        let mut plus_entry = RuleEntry::non_terminal("Term");
        grammar
            .add_resolved_action(&mut plus_entry.meta, "infix_add", None, table)
            .unwrap();
        let mut rule_plus = Rule::new();
        rule_plus.entries.push(RuleEntry::terminal('+' as TokenCode));
        rule_plus.entries.push(plus_entry);
        rule_plus.entries.push(RuleEntry::non_terminal("ExprTail"));

        let mut minus_entry = RuleEntry::non_terminal("Term");
        grammar
            .add_resolved_action(&mut minus_entry.meta, "infix_sub", None, table)
            .unwrap();
        let mut rule_minus = Rule::new();
        rule_minus.entries.push(RuleEntry::terminal('-' as TokenCode));
        rule_minus.entries.push(minus_entry);
        rule_minus.entries.push(RuleEntry::non_terminal("ExprTail"));

        let mut rule_epsilon = Rule::new();
        rule_epsilon.entries.push(RuleEntry::empty());

        let nt = grammar.create_nonterminal("ExprTail");
        nt.rules.push(rule_plus);
        nt.rules.push(rule_minus);
        nt.rules.push(rule_epsilon);
    }

    {
        let mut rule = Rule::new();
        rule.entries.push(RuleEntry::non_terminal("Factor"));
        rule.entries.push(RuleEntry::non_terminal("TermTail"));
        grammar.create_nonterminal("Term").rules.push(rule);
    }

    {
        let mut star_entry = RuleEntry::non_terminal("Factor");
        grammar
            .add_resolved_action(&mut star_entry.meta, "infix_mul", None, table)
            .unwrap();
        let mut rule_star = Rule::new();
        rule_star.entries.push(RuleEntry::terminal('*' as TokenCode));
        rule_star.entries.push(star_entry);
        rule_star.entries.push(RuleEntry::non_terminal("TermTail"));

        let mut slash_entry = RuleEntry::non_terminal("Factor");
        grammar
            .add_resolved_action(&mut slash_entry.meta, "infix_div", None, table)
            .unwrap();
        let mut rule_slash = Rule::new();
        rule_slash.entries.push(RuleEntry::terminal('/' as TokenCode));
        rule_slash.entries.push(slash_entry);
        rule_slash.entries.push(RuleEntry::non_terminal("TermTail"));

        let mut rule_epsilon = Rule::new();
        rule_epsilon.entries.push(RuleEntry::empty());

        let nt = grammar.create_nonterminal("TermTail");
        nt.rules.push(rule_star);
        nt.rules.push(rule_slash);
        nt.rules.push(rule_epsilon);
    }

    {
        let mut integer_entry = RuleEntry::terminal(CODE_INTEGER);
        grammar
            .add_resolved_action(&mut integer_entry.meta, "push_int", None, table)
            .unwrap();
        let mut rule_integer = Rule::new();
        rule_integer.entries.push(integer_entry);

        let mut rule_paren = Rule::new();
        rule_paren.entries.push(RuleEntry::terminal('(' as TokenCode));
        rule_paren.entries.push(RuleEntry::non_terminal("Expr"));
        rule_paren.entries.push(RuleEntry::terminal(')' as TokenCode));

        let nt = grammar.create_nonterminal("Factor");
        nt.rules.push(rule_integer);
        nt.rules.push(rule_paren);
    }

    grammar
}

fn evaluate(source: &str) -> IntValue {
    let mut table = ActionTable::default();
    table.register("infix_add", binary_action("+"));
    table.register("infix_sub", binary_action("-"));
    table.register("infix_mul", binary_action("*"));
    table.register("infix_div", binary_action("/"));
    table.register("push_int", push_int_action());

    let mut grammar = build_arithmetic_grammar(&table);
    grammar.analyze().expect("arithmetic grammar must be LL(1)");

    let mut lexer = Lexer::new(source.chars());
    lexer.options = grammar.lexer_options.clone();
    let mut token_source = LexerTokenSource::new(lexer);
    let mut parser = Parser::new(&grammar, &mut token_source);
    parser.parse().expect("parse must succeed");

    assert_eq!(parser.data_stack.len(), 1, "exactly one reduced value should remain");
    parser.data_stack.pop().unwrap()
}

#[test]
fn tokenizes_arithmetic_expression_skipping_whitespace() {
    let mut lexer = Lexer::new("12 + 3 * (4 - 1)".chars());
    lexer.options.ignore_all_whitespace();
    let mut codes = Vec::new();
    let mut texts = Vec::new();
    loop {
        let token = lexer.next_token();
        if token.is_exhausted() {
            break;
        }
        codes.push(token.code);
        texts.push(token.text.clone());
        if token.is_end() {
            break;
        }
    }
    assert_eq!(texts, vec!["12", "+", "3", "*", "(", "4", "-", "1", ")", "$$"]);
    assert_eq!(*codes.last().unwrap(), obelix_front::token::CODE_END);
}

#[test]
fn parses_and_reduces_operator_precedence_correctly() {
    assert_eq!(evaluate("12 + 3 * (4 - 1)"), IntValue::Int(21));
    assert_eq!(evaluate("2 * 3 + 4 * 5"), IntValue::Int(26));
    assert_eq!(evaluate("10 - 2 - 3"), IntValue::Int(5));
    assert_eq!(evaluate("(1 + 2) * (3 + 4)"), IntValue::Int(21));
}

#[test]
fn division_by_zero_is_a_runtime_exception_not_a_crash() {
    let mut table = ActionTable::default();
    table.register("infix_add", binary_action("+"));
    table.register("infix_sub", binary_action("-"));
    table.register("infix_mul", binary_action("*"));
    table.register("infix_div", binary_action("/"));
    table.register("push_int", push_int_action());

    let mut grammar = build_arithmetic_grammar(&table);
    grammar.analyze().unwrap();

    let mut lexer = Lexer::new("1 / 0".chars());
    lexer.options = grammar.lexer_options.clone();
    let mut token_source = LexerTokenSource::new(lexer);
    let mut parser = Parser::new(&grammar, &mut token_source);
    let err = parser.parse().expect_err("division by zero must abort the parse, not panic");
    assert!(err.message.contains("division by zero"));
}

#[test]
fn evaluated_result_round_trips_through_the_ast_evaluator() {
    let result = evaluate("2 + 2");
    let mut ctx = NoContext;
    match AstNode::Const(result.clone()).call(&mut ctx) {
        CallResult::Const(reduced) => assert!(reduced.values_equal(&result)),
        _ => panic!("Const::call must always return a fresh Const of the same value"),
    }
}

#[test]
fn nonterminal_with_overlapping_first_sets_is_rejected_as_not_ll1() {
    let mut grammar: Grammar<IntValue> = Grammar::new();
    let nt = grammar.create_nonterminal("Ambiguous");
    let mut rule_a = Rule::new();
    rule_a.entries.push(RuleEntry::terminal(CODE_INTEGER));
    let mut rule_b = Rule::new();
    rule_b.entries.push(RuleEntry::terminal(CODE_INTEGER));
    nt.rules.push(rule_a);
    nt.rules.push(rule_b);

    assert!(grammar.analyze().is_err(), "two rules with identical FIRST sets must fail LL(1) analysis");
}

#[test]
fn nullable_grammar_accepts_empty_input_and_counts_repetitions() {
    // `S -> 'a' S | ε`, the concrete scenario from spec §8. `'a'` is
    // identifier-shaped, so per §4.2 its keyword token only ever emits after
    // a non-identifier terminator; the two repetitions are written
    // space-separated ("a a") rather than run together ("aa") so each one
    // lexes as its own token instead of a single two-letter identifier.
    let mut table = ActionTable::default();
    table.register("incr", incr_counter_action());

    let mut grammar: Grammar<IntValue> = Grammar::new();
    let a_literal = Token::new(CODE_DQUOTED, "a", obelix_front::util::Position::new(1, 0));
    let mut rule_a = Rule::new();
    grammar.add_terminal_entry(&mut rule_a, &a_literal);
    grammar
        .add_resolved_action(&mut rule_a.entries[0].meta, "incr", None, &table)
        .unwrap();
    rule_a.entries.push(RuleEntry::non_terminal("S"));
    let mut rule_epsilon = Rule::new();
    rule_epsilon.entries.push(RuleEntry::empty());
    let nt = grammar.create_nonterminal("S");
    nt.rules.push(rule_a);
    nt.rules.push(rule_epsilon);

    grammar.analyze().expect("S -> 'a' S | ε is LL(1)");

    let a_code = grammar
        .keyword_table()
        .values()
        .find(|t| t.text == "a")
        .expect("'a' must have been hashed into the keyword table")
        .code;

    let mut lexer = Lexer::new("".chars());
    lexer.options.ignore_whitespace = true;
    lexer.add_keyword(a_code, "a");
    let mut token_source = LexerTokenSource::new(lexer);
    let mut parser = Parser::new(&grammar, &mut token_source);
    parser.parse().expect("empty input must be accepted by the nullable rule");
    assert!(parser.get("count").is_none());

    let mut lexer = Lexer::new("a a".chars());
    lexer.options.ignore_whitespace = true;
    lexer.add_keyword(a_code, "a");
    let mut token_source = LexerTokenSource::new(lexer);
    let mut parser = Parser::new(&grammar, &mut token_source);
    parser.parse().expect("\"a a\" must be accepted");
    assert_eq!(parser.get("count"), Some(&IntValue::Int(2)));
}
