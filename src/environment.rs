use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::LoxError;
use crate::expr::Depth;
use crate::token::Token;
use crate::value::Value;

/// One lexical frame: a name-to-cell map plus a link to the enclosing
/// frame.  A cell holding `None` is declared but uninitialized, which is
/// distinct from the name being absent entirely.
pub struct Environment {
    values: HashMap<String, Option<Value>>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Insert an uninitialized cell in this frame.
    pub fn declare(&mut self, name: &str) {
        self.values.insert(name.to_string(), None);
    }

    /// Insert or overwrite an initialized cell in this frame.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), Some(value));
    }

    fn get_local(&self, name: &Token) -> crate::Result<Value> {
        match self.values.get(&name.lexeme) {
            Some(Some(value)) => Ok(value.clone()),

            Some(None) => Err(LoxError::runtime(
                name,
                format!("using uninitialized variable '{}'", name.lexeme),
            )),

            None => Err(LoxError::runtime(
                name,
                format!("undefined variable '{}'", name.lexeme),
            )),
        }
    }

    fn assign_local(&mut self, name: &Token, value: Value) -> crate::Result<()> {
        if self.values.contains_key(&name.lexeme) {
            self.values.insert(name.lexeme.clone(), Some(value));

            Ok(())
        } else {
            Err(LoxError::runtime(
                name,
                format!("undefined variable '{}'", name.lexeme),
            ))
        }
    }

    /// Walk `hops` links up the static chain, stopping at the root if the
    /// chain is shorter.
    fn ancestor(env: &Rc<RefCell<Environment>>, hops: usize) -> Rc<RefCell<Environment>> {
        let mut frame: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..hops {
            let parent = match frame.borrow().enclosing.as_ref() {
                Some(parent) => Rc::clone(parent),
                None => break,
            };

            frame = parent;
        }

        frame
    }

    /// The root frame of the chain, where globals live.
    fn root(env: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        let mut frame: Rc<RefCell<Environment>> = Rc::clone(env);

        loop {
            let parent = match frame.borrow().enclosing.as_ref() {
                Some(parent) => Rc::clone(parent),
                None => break,
            };

            frame = parent;
        }

        frame
    }

    /// Read a cell at the resolved depth.  `Depth::Global` walks to the
    /// root frame and performs the lookup there.
    pub fn get_at(env: &Rc<RefCell<Environment>>, depth: Depth, name: &Token) -> crate::Result<Value> {
        let frame = match depth {
            Depth::Local(hops) => Self::ancestor(env, hops),
            Depth::Global => Self::root(env),
        };

        let result = frame.borrow().get_local(name);

        result
    }

    /// Replace a cell at the resolved depth; fails if it does not exist
    /// there.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        depth: Depth,
        name: &Token,
        value: Value,
    ) -> crate::Result<()> {
        let frame = match depth {
            Depth::Local(hops) => Self::ancestor(env, hops),
            Depth::Global => Self::root(env),
        };

        let result = frame.borrow_mut().assign_local(name, value);

        result
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::IDENTIFIER, name.to_string(), None, 1)
    }

    #[test]
    fn declared_but_uninitialized_is_distinct_from_undefined() {
        let env = Rc::new(RefCell::new(Environment::new()));

        env.borrow_mut().declare("a");

        let uninitialized = Environment::get_at(&env, Depth::Local(0), &ident("a"));
        assert!(matches!(uninitialized, Err(LoxError::Runtime { message, .. })
            if message.contains("uninitialized")));

        let undefined = Environment::get_at(&env, Depth::Local(0), &ident("b"));
        assert!(matches!(undefined, Err(LoxError::Runtime { message, .. })
            if message.contains("undefined")));
    }

    #[test]
    fn get_at_walks_the_static_chain() {
        let root = Rc::new(RefCell::new(Environment::new()));
        root.borrow_mut().define("x", Value::Number(1.0));

        let child = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(&root))));
        child.borrow_mut().define("x", Value::Number(2.0));

        let inner = Environment::get_at(&child, Depth::Local(0), &ident("x")).unwrap();
        let outer = Environment::get_at(&child, Depth::Local(1), &ident("x")).unwrap();

        assert!(inner.equals(&Value::Number(2.0)));
        assert!(outer.equals(&Value::Number(1.0)));
    }

    #[test]
    fn global_depth_reaches_the_root_from_any_frame() {
        let root = Rc::new(RefCell::new(Environment::new()));
        root.borrow_mut().define("g", Value::Number(7.0));

        let child = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(&root))));
        let grandchild = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(&child))));

        let value = Environment::get_at(&grandchild, Depth::Global, &ident("g")).unwrap();
        assert!(value.equals(&Value::Number(7.0)));

        Environment::assign_at(&grandchild, Depth::Global, &ident("g"), Value::Number(8.0)).unwrap();

        let value = Environment::get_at(&root, Depth::Local(0), &ident("g")).unwrap();
        assert!(value.equals(&Value::Number(8.0)));
    }
}
