use std::fmt::Debug;

use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Exception kinds the evaluator and the host function table can raise. The
/// source encodes `Return`/`Exit`/loop-break as ordinary exceptions; here
/// they are distinct variants so callers never need to string-match a
/// message to tell control flow from a real error.
pub enum ExceptionKind {
    SyntaxError,
    TypeError,
    NotCallable,
    Exhausted,
    Return,
    Exit,
    InternalError,
    IOError,
    ProtocolError,
    Name,
    Runtime,
}

/// The value model is an external collaborator (see `SPEC_FULL.md` §4.1):
/// this crate never constructs or inspects concrete values, it only calls
/// through this trait. A host implements it once for its own tagged-value
/// representation.
pub trait Value: Debug + Clone {
    type Exception: Debug + Clone;
    type Iter: ValueIter<Self>;

    /// Convert literal token text to a value per the token's code, e.g. an
    /// `Integer` token's text parsed as an integer value.
    fn from_token(token: &Token) -> Result<Self, Self::Exception>;

    fn as_bool(&self) -> Result<bool, Self::Exception>;

    fn values_equal(&self, other: &Self) -> bool;

    /// `value.execute(op_name, args) -> value | exception`, the sole
    /// dispatch surface for infix/prefix operators and function calls.
    fn execute(&self, op_name: &str, args: &[Self]) -> Result<Self, Self::Exception>;

    fn is_callable(&self) -> bool;

    fn iter(&self) -> Result<Self::Iter, Self::Exception>;

    fn exception(kind: ExceptionKind, message: impl Into<String>) -> Self::Exception;

    fn exception_kind(exception: &Self::Exception) -> ExceptionKind;

    /// Render the value the way `toString` would for a `Const` AST node.
    fn render(&self) -> String;

    /// The value an empty `Block` or a `Pass` statement reduces to; mirrors
    /// the teacher's `NodeImpl::null` convention for a default placeholder.
    fn null() -> Self;

    fn from_bool(value: bool) -> Self;

    /// Wrap `self` as the payload of a `Return`-kind exception, so an
    /// enclosing `Block` or `Loop` short-circuits without string-matching a
    /// message (see `SPEC_FULL.md`'s "Control-flow as exceptions" note).
    fn as_return(self) -> Self::Exception;

    /// As [`Value::as_return`], for `leave`/`Exit` control flow.
    fn as_exit(self) -> Self::Exception;
}

/// `iter.next() -> value | ExhaustedException`.
pub trait ValueIter<V: Value> {
    fn next(&mut self) -> Result<V, V::Exception>;
}

/// Name lookup and assignment for the evaluation context an AST node's
/// `call` receives. A host's scope chain, closure environment, or module
/// namespace all implement this the same way.
pub trait Context<V: Value> {
    fn get(&self, qualified_name: &str) -> Result<V, V::Exception>;
    fn set(&mut self, qualified_name: &str, value: V) -> Result<(), V::Exception>;
}
