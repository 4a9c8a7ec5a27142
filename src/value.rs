use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::expr::FnExpr;

pub type NativeFnPtr = fn(&[Value]) -> std::result::Result<Value, String>;

/// Host-provided callable.  The implementation returns either a value or
/// a bare message; the evaluator attaches the call-site token.
pub struct NativeFn {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFnPtr,
}

/// A user function: shared declaration plus the environment it closed
/// over.  Binding to a receiver shares the declaration and swaps in a
/// fresh closure frame that defines `this`.
pub struct LoxFn {
    pub name: Option<String>,
    pub declaration: Rc<FnExpr>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
    pub is_property: bool,
}

impl LoxFn {
    pub fn arity(&self) -> usize {
        self.declaration.parameters.len()
    }

    /// Produce the bound form of this method for the given receiver.
    pub fn bind(&self, receiver: Value) -> LoxFn {
        let mut frame = Environment::with_enclosing(Rc::clone(&self.closure));
        frame.define("this", receiver);

        LoxFn {
            name: self.name.clone(),
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(frame)),
            is_initializer: self.is_initializer,
            is_property: self.is_property,
        }
    }
}

#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Function(Rc<LoxFn>),
    Native(Rc<NativeFn>),
    Class(Rc<LoxClass>),
    Instance(Rc<LoxInstance>),
}

impl Value {
    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Value equality for nil/bool/number/string, identity for the rest.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,

            (Value::Bool(a), Value::Bool(b)) => a == b,

            (Value::Number(a), Value::Number(b)) => a == b,

            (Value::Str(a), Value::Str(b)) => a == b,

            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),

            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),

            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),

            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),

            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// REPL form: identical to display except strings come back quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{:?}", s),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            // Shortest round-trip decimal; integer-valued floats print
            // without a trailing `.0`.
            Value::Number(n) => write!(f, "{}", n),

            Value::Str(s) => write!(f, "{}", s),

            Value::Function(function) => match &function.name {
                Some(name) => write!(f, "<fn '{}'>", name),
                None => write!(f, "<anonymous fn>"),
            },

            Value::Native(native) => write!(f, "<native fn '{}'>", native.name),

            Value::Class(class) => write!(f, "{}", class),

            Value::Instance(instance) => write!(f, "{}", instance),
        }
    }
}
