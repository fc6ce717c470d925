use std::rc::Rc;

use crate::parser::Parser;
use crate::token::Token;
use crate::value::Value;

/// The matched/literal token data an action sees when it fires. `last_token`
/// is the token most recently matched anywhere in the parse (if any);
/// `literal` is the optional data argument attached to the action at
/// grammar-build time.
#[derive(Clone)]
pub struct ActionInvocation {
    pub last_token: Option<Token>,
    pub literal: Option<Token>,
}

/// A resolved grammar action: a function the parser calls as it visits the
/// element the action is attached to. Grammars resolve actions by name once
/// at build time (see [`FunctionResolver`]); the parser never does name
/// lookups.
pub type ActionFn<V> = Rc<dyn Fn(&mut Parser<V>, ActionInvocation) -> Result<(), <V as Value>::Exception>>;

#[derive(Clone)]
pub struct GrammarAction<V: Value> {
    pub name: String,
    pub literal: Option<Token>,
    pub function: ActionFn<V>,
}

/// `resolve(name) -> function`, with the three-tier prefix order described
/// in `SPEC_FULL.md` §C.3: `prefix+name` (unless `name` already starts with
/// `prefix`), then `parser_+name` (unless already so prefixed), then bare
/// `name`. A host implements this once over its own function table.
pub trait FunctionResolver<V: Value> {
    fn lookup(&self, name: &str) -> Option<ActionFn<V>>;

    fn resolve(&self, name: &str, prefix: Option<&str>) -> Option<ActionFn<V>> {
        if let Some(prefix) = prefix {
            if !name.starts_with(prefix) {
                let prefixed = format!("{}{}", prefix, name);
                if let Some(f) = self.lookup(&prefixed) {
                    return Some(f);
                }
            }
        }
        if !name.starts_with("parser_") {
            let parser_prefixed = format!("parser_{}", name);
            if let Some(f) = self.lookup(&parser_prefixed) {
                return Some(f);
            }
        }
        self.lookup(name)
    }
}
