//! The partially-reducing AST evaluator (spec §4.5). Grammar actions build
//! `AstNode` values on the parser's data stack; the host drives evaluation
//! by repeatedly calling `AstNode::call` on the root until it settles into
//! a `Const` or an `Exception` — each call either finishes the node or
//! returns a smaller version of the same node with whatever sub-expressions
//! could be reduced already folded down.

use std::borrow::Cow;

use crate::value::{Context, ExceptionKind, Value};

/// What one `call` on an `AstNode` produced.
#[derive(Clone)]
pub enum CallResult<V: Value> {
    Const(V),
    Node(AstNode<V>),
    Exception(V::Exception),
}

/// An expression or statement node. Every variant's `call` returns one of
/// the three `CallResult` shapes; composite nodes reduce their children
/// first and only invoke their own operation once every child is `Const`.
#[derive(Clone)]
pub enum AstNode<V: Value> {
    Const(V),
    Variable {
        name: String,
    },
    Prefix {
        op: String,
        operand: Box<AstNode<V>>,
    },
    Infix {
        left: Box<AstNode<V>>,
        op: String,
        right: Box<AstNode<V>>,
    },
    Ternary {
        condition: Box<AstNode<V>>,
        when_true: Box<AstNode<V>>,
        when_false: Box<AstNode<V>>,
    },
    Call {
        function: Box<AstNode<V>>,
        args: Vec<AstNode<V>>,
    },
    Generator {
        source: Box<AstNode<V>>,
        iter: Option<std::rc::Rc<std::cell::RefCell<V::Iter>>>,
    },
    Block {
        statements: Vec<AstNode<V>>,
        name: Option<String>,
    },
    Assignment {
        target: String,
        value: Box<AstNode<V>>,
        declare: bool,
    },
    Loop {
        condition: Box<AstNode<V>>,
        body: Box<AstNode<V>>,
    },
    Pass,
    Return {
        value: Box<AstNode<V>>,
        is_error: bool,
    },
}

/// A child's reduction, stripped of the `Exception` case (the caller has
/// already propagated that). Lets composite nodes share the "reduce every
/// child, then either rebuild or operate" shape without repeating the
/// three-way match at every call site.
enum Reduced<V: Value> {
    Const(V),
    Node(AstNode<V>),
}

impl<V: Value> Reduced<V> {
    fn into_node(self) -> AstNode<V> {
        match self {
            Reduced::Const(v) => AstNode::Const(v),
            Reduced::Node(n) => n,
        }
    }
}

fn reduce<V: Value>(node: &AstNode<V>, ctx: &mut dyn Context<V>) -> Result<Reduced<V>, V::Exception> {
    match node.call(ctx) {
        CallResult::Const(v) => Ok(Reduced::Const(v)),
        CallResult::Node(n) => Ok(Reduced::Node(n)),
        CallResult::Exception(e) => Err(e),
    }
}

impl<V: Value> AstNode<V> {
    pub fn call(&self, ctx: &mut dyn Context<V>) -> CallResult<V> {
        match self {
            AstNode::Const(v) => CallResult::Const(v.clone()),

            AstNode::Variable { name } => match ctx.get(name) {
                Ok(v) => CallResult::Const(v),
                Err(e) => CallResult::Exception(e),
            },

            AstNode::Prefix { op, operand } => {
                let r = match reduce(operand, ctx) {
                    Ok(r) => r,
                    Err(e) => return CallResult::Exception(e),
                };
                match r {
                    Reduced::Node(n) => CallResult::Node(AstNode::Prefix {
                        op: op.clone(),
                        operand: Box::new(n),
                    }),
                    Reduced::Const(v) => {
                        if op == "+" {
                            // Unary plus is an identity; no operator dispatch needed.
                            return CallResult::Const(v);
                        }
                        match v.execute(op, &[]) {
                            Ok(res) => CallResult::Const(res),
                            Err(e) => CallResult::Exception(e),
                        }
                    }
                }
            }

            AstNode::Infix { left, op, right } => {
                let left_r = match reduce(left, ctx) {
                    Ok(r) => r,
                    Err(e) => return CallResult::Exception(e),
                };
                let right_r = match reduce(right, ctx) {
                    Ok(r) => r,
                    Err(e) => return CallResult::Exception(e),
                };
                match (left_r, right_r) {
                    (Reduced::Const(lv), Reduced::Const(rv)) => match lv.execute(op, &[rv]) {
                        Ok(v) => CallResult::Const(v),
                        Err(e) => CallResult::Exception(e),
                    },
                    (l, r) => CallResult::Node(AstNode::Infix {
                        left: Box::new(l.into_node()),
                        op: op.clone(),
                        right: Box::new(r.into_node()),
                    }),
                }
            }

            AstNode::Ternary {
                condition,
                when_true,
                when_false,
            } => {
                let r = match reduce(condition, ctx) {
                    Ok(r) => r,
                    Err(e) => return CallResult::Exception(e),
                };
                match r {
                    Reduced::Node(n) => CallResult::Node(AstNode::Ternary {
                        condition: Box::new(n),
                        when_true: when_true.clone(),
                        when_false: when_false.clone(),
                    }),
                    Reduced::Const(v) => match v.as_bool() {
                        Ok(true) => when_true.call(ctx),
                        Ok(false) => when_false.call(ctx),
                        Err(e) => CallResult::Exception(e),
                    },
                }
            }

            AstNode::Call { function, args } => {
                let function_r = match reduce(function, ctx) {
                    Ok(r) => r,
                    Err(e) => return CallResult::Exception(e),
                };
                let fv = match function_r {
                    Reduced::Node(n) => {
                        return CallResult::Node(AstNode::Call {
                            function: Box::new(n),
                            args: args.clone(),
                        })
                    }
                    Reduced::Const(v) => v,
                };

                let mut reduced_args = Vec::with_capacity(args.len());
                let mut values = Vec::with_capacity(args.len());
                let mut all_resolved = true;
                for arg in args {
                    match reduce(arg, ctx) {
                        Err(e) => return CallResult::Exception(e),
                        Ok(Reduced::Const(v)) => {
                            values.push(v.clone());
                            reduced_args.push(AstNode::Const(v));
                        }
                        Ok(Reduced::Node(n)) => {
                            all_resolved = false;
                            reduced_args.push(n);
                        }
                    }
                }

                if !all_resolved {
                    return CallResult::Node(AstNode::Call {
                        function: Box::new(AstNode::Const(fv)),
                        args: reduced_args,
                    });
                }

                if !fv.is_callable() {
                    return CallResult::Exception(V::exception(
                        ExceptionKind::NotCallable,
                        format!("{} is not callable", fv.render()),
                    ));
                }
                // Invocation is itself just a dispatch through `execute`, using
                // the reserved "()" op name a host's callable values recognize.
                match fv.execute("()", &values) {
                    Ok(v) => CallResult::Const(v),
                    Err(e) => CallResult::Exception(e),
                }
            }

            AstNode::Generator { source, iter } => {
                // Once `iter` is set, every call just pulls the next value; the
                // caller is expected to keep reusing this same node (the
                // `Rc<RefCell<_>>` is what lets repeated calls share state
                // across an otherwise immutable, cloneable tree).
                if let Some(iter) = iter {
                    return match iter.borrow_mut().next() {
                        Ok(v) => CallResult::Const(v),
                        Err(e) => CallResult::Exception(e),
                    };
                }
                let r = match reduce(source, ctx) {
                    Ok(r) => r,
                    Err(e) => return CallResult::Exception(e),
                };
                match r {
                    Reduced::Node(n) => CallResult::Node(AstNode::Generator {
                        source: Box::new(n),
                        iter: None,
                    }),
                    // The iterator is only created here; its first value is
                    // pulled on the next call, once this node carries it.
                    Reduced::Const(v) => match v.iter() {
                        Ok(it) => CallResult::Node(AstNode::Generator {
                            source: Box::new(AstNode::Const(v)),
                            iter: Some(std::rc::Rc::new(std::cell::RefCell::new(it))),
                        }),
                        Err(e) => CallResult::Exception(e),
                    },
                }
            }

            AstNode::Block { statements, name } => {
                let mut last_value: Option<V> = None;
                for (i, stmt) in statements.iter().enumerate() {
                    match stmt.call(ctx) {
                        CallResult::Exception(e) => return CallResult::Exception(e),
                        CallResult::Const(v) => last_value = Some(v),
                        CallResult::Node(n) => {
                            let mut rebuilt = Vec::with_capacity(statements.len());
                            rebuilt.extend(statements[..i].iter().cloned());
                            rebuilt.push(n);
                            rebuilt.extend(statements[i + 1..].iter().cloned());
                            return CallResult::Node(AstNode::Block {
                                statements: rebuilt,
                                name: name.clone(),
                            });
                        }
                    }
                }
                CallResult::Const(last_value.unwrap_or_else(V::null))
            }

            AstNode::Assignment {
                target,
                value,
                declare,
            } => {
                let r = match reduce(value, ctx) {
                    Ok(r) => r,
                    Err(e) => {
                        if V::exception_kind(&e) == ExceptionKind::Exhausted {
                            // A `for`-style assignment whose source generator ran
                            // dry reports failure through the assignment's own
                            // result rather than as a propagating exception.
                            return CallResult::Const(V::from_bool(false));
                        }
                        return CallResult::Exception(e);
                    }
                };
                match r {
                    Reduced::Node(n) => CallResult::Node(AstNode::Assignment {
                        target: target.clone(),
                        value: Box::new(n),
                        declare: *declare,
                    }),
                    Reduced::Const(v) => match ctx.set(target, v) {
                        Ok(()) => CallResult::Const(V::from_bool(true)),
                        Err(e) => CallResult::Exception(e),
                    },
                }
            }

            AstNode::Loop { condition, body } => {
                let mut condition_node = condition.clone();
                let mut body_node = body.clone();
                loop {
                    let cond_r = match reduce(&condition_node, ctx) {
                        Ok(r) => r,
                        Err(e) => return CallResult::Exception(e),
                    };
                    let cond_v = match cond_r {
                        Reduced::Node(n) => {
                            return CallResult::Node(AstNode::Loop {
                                condition: Box::new(n),
                                body: body_node,
                            })
                        }
                        Reduced::Const(v) => v,
                    };
                    match cond_v.as_bool() {
                        Err(e) => return CallResult::Exception(e),
                        Ok(false) => return CallResult::Const(cond_v),
                        Ok(true) => {}
                    }
                    match body_node.call(ctx) {
                        CallResult::Exception(e) => return CallResult::Exception(e),
                        CallResult::Const(_) => {
                            condition_node = condition.clone();
                            body_node = body.clone();
                        }
                        CallResult::Node(n) => {
                            return CallResult::Node(AstNode::Loop {
                                condition: condition_node,
                                body: Box::new(n),
                            })
                        }
                    }
                }
            }

            AstNode::Pass => CallResult::Const(V::null()),

            AstNode::Return { value, is_error } => {
                let r = match reduce(value, ctx) {
                    Ok(r) => r,
                    Err(e) => return CallResult::Exception(e),
                };
                match r {
                    Reduced::Node(n) => CallResult::Node(AstNode::Return {
                        value: Box::new(n),
                        is_error: *is_error,
                    }),
                    Reduced::Const(v) => {
                        let exception = if *is_error { v.as_exit() } else { v.as_return() };
                        CallResult::Exception(exception)
                    }
                }
            }
        }
    }

    fn label(&self) -> String {
        match self {
            AstNode::Const(v) => format!("Const({})", v.render()),
            AstNode::Variable { name } => format!("Variable({})", name),
            AstNode::Prefix { op, .. } => format!("Prefix({})", op),
            AstNode::Infix { op, .. } => format!("Infix({})", op),
            AstNode::Ternary { .. } => "Ternary".to_string(),
            AstNode::Call { args, .. } => format!("Call({} args)", args.len()),
            AstNode::Generator { iter, .. } => {
                format!("Generator(started={})", iter.is_some())
            }
            AstNode::Block { name, statements } => match name {
                Some(n) => format!("Block({}, {} stmts)", n, statements.len()),
                None => format!("Block({} stmts)", statements.len()),
            },
            AstNode::Assignment { target, declare, .. } => {
                format!("Assignment({}{})", if *declare { "let " } else { "" }, target)
            }
            AstNode::Loop { .. } => "Loop".to_string(),
            AstNode::Pass => "Pass".to_string(),
            AstNode::Return { is_error, .. } => {
                if *is_error {
                    "Return(error)".to_string()
                } else {
                    "Return".to_string()
                }
            }
        }
    }

    /// Sub-nodes for diagnostic tree printing only; not used by `call`.
    fn child_nodes(&self) -> Vec<AstNode<V>> {
        match self {
            AstNode::Const(_) | AstNode::Variable { .. } | AstNode::Pass => Vec::new(),
            AstNode::Prefix { operand, .. } => vec![(**operand).clone()],
            AstNode::Infix { left, right, .. } => vec![(**left).clone(), (**right).clone()],
            AstNode::Ternary {
                condition,
                when_true,
                when_false,
            } => vec![(**condition).clone(), (**when_true).clone(), (**when_false).clone()],
            AstNode::Call { function, args } => {
                let mut children = vec![(**function).clone()];
                children.extend(args.iter().cloned());
                children
            }
            AstNode::Generator { source, .. } => vec![(**source).clone()],
            AstNode::Block { statements, .. } => statements.clone(),
            AstNode::Assignment { value, .. } => vec![(**value).clone()],
            AstNode::Loop { condition, body } => vec![(**condition).clone(), (**body).clone()],
            AstNode::Return { value, .. } => vec![(**value).clone()],
        }
    }

    /// Print this node and its unevaluated shape as a tree, for debugging a
    /// grammar's action wiring rather than a running evaluation.
    pub fn print(&self) -> std::io::Result<()> {
        ptree::print_tree(self)
    }
}

impl<V: Value> ptree::TreeItem for AstNode<V> {
    type Child = AstNode<V>;

    fn write_self<W: std::io::Write>(&self, f: &mut W, style: &ptree::Style) -> std::io::Result<()> {
        write!(f, "{}", style.paint(self.label()))
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::from(self.child_nodes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueIter;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq)]
    enum NumValue {
        Int(i64),
        Bool(bool),
        Null,
    }

    #[derive(Debug, Clone)]
    struct NumException(ExceptionKind, String);

    struct EmptyIter;
    impl ValueIter<NumValue> for EmptyIter {
        fn next(&mut self) -> Result<NumValue, NumException> {
            Err(NumValue::exception(ExceptionKind::Exhausted, "exhausted"))
        }
    }

    impl Value for NumValue {
        type Exception = NumException;
        type Iter = EmptyIter;

        fn from_token(token: &crate::token::Token) -> Result<Self, Self::Exception> {
            token
                .text
                .parse::<i64>()
                .map(NumValue::Int)
                .map_err(|_| NumValue::exception(ExceptionKind::TypeError, "not a number"))
        }

        fn as_bool(&self) -> Result<bool, Self::Exception> {
            match self {
                NumValue::Bool(b) => Ok(*b),
                NumValue::Int(n) => Ok(*n != 0),
                NumValue::Null => Ok(false),
            }
        }

        fn values_equal(&self, other: &Self) -> bool {
            self == other
        }

        fn execute(&self, op_name: &str, args: &[Self]) -> Result<Self, Self::Exception> {
            match (self, op_name, args) {
                (NumValue::Int(a), "+", [NumValue::Int(b)]) => Ok(NumValue::Int(a + b)),
                (NumValue::Int(a), "-", [NumValue::Int(b)]) => Ok(NumValue::Int(a - b)),
                (NumValue::Int(a), "-", []) => Ok(NumValue::Int(-a)),
                _ => Err(NumValue::exception(ExceptionKind::TypeError, "bad operands")),
            }
        }

        fn is_callable(&self) -> bool {
            false
        }

        fn iter(&self) -> Result<Self::Iter, Self::Exception> {
            Ok(EmptyIter)
        }

        fn exception(kind: ExceptionKind, message: impl Into<String>) -> Self::Exception {
            NumException(kind, message.into())
        }

        fn exception_kind(exception: &Self::Exception) -> ExceptionKind {
            exception.0
        }

        fn render(&self) -> String {
            match self {
                NumValue::Int(n) => n.to_string(),
                NumValue::Bool(b) => b.to_string(),
                NumValue::Null => "null".to_string(),
            }
        }

        fn null() -> Self {
            NumValue::Null
        }

        fn from_bool(value: bool) -> Self {
            NumValue::Bool(value)
        }

        fn as_return(self) -> Self::Exception {
            NumException(ExceptionKind::Return, self.render())
        }

        fn as_exit(self) -> Self::Exception {
            NumException(ExceptionKind::Exit, self.render())
        }
    }

    struct MapContext(HashMap<String, NumValue>);
    impl Context<NumValue> for MapContext {
        fn get(&self, qualified_name: &str) -> Result<NumValue, NumException> {
            self.0
                .get(qualified_name)
                .cloned()
                .ok_or_else(|| NumValue::exception(ExceptionKind::Name, "undefined"))
        }
        fn set(&mut self, qualified_name: &str, value: NumValue) -> Result<(), NumException> {
            self.0.insert(qualified_name.to_string(), value);
            Ok(())
        }
    }

    #[test]
    fn infix_fully_reduces_when_both_sides_are_const() {
        let mut ctx = MapContext(HashMap::new());
        let node = AstNode::Infix {
            left: Box::new(AstNode::Const(NumValue::Int(2))),
            op: "+".to_string(),
            right: Box::new(AstNode::Const(NumValue::Int(3))),
        };
        match node.call(&mut ctx) {
            CallResult::Const(NumValue::Int(5)) => {}
            _ => panic!("expected Const(5)"),
        }
    }

    #[test]
    fn infix_with_unresolved_variable_returns_partially_reduced_node() {
        let mut ctx = MapContext(HashMap::new());
        let node = AstNode::Infix {
            left: Box::new(AstNode::Variable { name: "x".to_string() }),
            op: "+".to_string(),
            right: Box::new(AstNode::Const(NumValue::Int(3))),
        };
        match node.call(&mut ctx) {
            CallResult::Exception(e) => assert_eq!(NumValue::exception_kind(&e), ExceptionKind::Name),
            _ => panic!("expected Exception, variable is undefined"),
        }

        let node = AstNode::Assignment {
            target: "x".to_string(),
            value: Box::new(AstNode::Const(NumValue::Int(2))),
            declare: true,
        };
        let _ = node.call(&mut ctx);
        let node = AstNode::Infix {
            left: Box::new(AstNode::Variable { name: "x".to_string() }),
            op: "+".to_string(),
            right: Box::new(AstNode::Const(NumValue::Int(3))),
        };
        match node.call(&mut ctx) {
            CallResult::Const(NumValue::Int(5)) => {}
            other => panic!("expected Const(5) once x is bound, got {:?}", other.is_const()),
        }
    }

    #[test]
    fn loop_runs_to_completion_in_one_call_when_fully_resolvable() {
        let mut ctx = MapContext(HashMap::new());
        ctx.0.insert("n".to_string(), NumValue::Int(3));
        let loop_node = AstNode::Loop {
            condition: Box::new(AstNode::Variable { name: "n".to_string() }),
            body: Box::new(AstNode::Assignment {
                target: "n".to_string(),
                value: Box::new(AstNode::Infix {
                    left: Box::new(AstNode::Variable { name: "n".to_string() }),
                    op: "-".to_string(),
                    right: Box::new(AstNode::Const(NumValue::Int(1))),
                }),
                declare: false,
            }),
        };
        match loop_node.call(&mut ctx) {
            CallResult::Const(NumValue::Int(0)) => {}
            other => panic!("expected the loop to settle once n hits 0, got {:?}", other.is_const()),
        }
        assert!(matches!(ctx.0.get("n"), Some(NumValue::Int(0))));
    }

    #[test]
    fn return_wraps_resolved_value_as_control_flow_exception() {
        let mut ctx = MapContext(HashMap::new());
        let node = AstNode::Return {
            value: Box::new(AstNode::Const(NumValue::Int(7))),
            is_error: false,
        };
        match node.call(&mut ctx) {
            CallResult::Exception(e) => assert_eq!(NumValue::exception_kind(&e), ExceptionKind::Return),
            _ => panic!("expected a Return-kind exception"),
        }
    }

    impl<V: Value> CallResult<V> {
        fn is_const(&self) -> bool {
            matches!(self, CallResult::Const(_))
        }
    }
}
