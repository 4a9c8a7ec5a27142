use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::value::{LoxFn, Value};

/// Runtime class object.
///
/// Class methods live on the metaclass, so a class is itself an instance
/// of its metaclass and static members travel through the same get/set
/// protocol as instance members.  `fields` holds the class's static
/// fields.  Metaclasses have no metaclass of their own.
pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub metaclass: Option<Rc<LoxClass>>,
    methods: HashMap<String, Rc<LoxFn>>,
    fields: RefCell<HashMap<String, Value>>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<LoxClass>>,
        methods: HashMap<String, Rc<LoxFn>>,
        metaclass: Option<Rc<LoxClass>>,
    ) -> Self {
        LoxClass {
            name,
            superclass,
            metaclass,
            methods,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Method lookup, walking the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFn>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    pub fn initializer(&self) -> Option<Rc<LoxFn>> {
        self.find_method("init")
    }

    /// Constructing a class takes as many arguments as its initializer.
    pub fn arity(&self) -> usize {
        self.initializer().map_or(0, |init| init.arity())
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Display for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class '{}'>", self.name)
    }
}

pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    fields: RefCell<HashMap<String, Value>>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        self.fields.borrow().get(name).cloned()
    }

    /// Fields spring into existence on first assignment.
    pub fn set_field(&self, name: &str, value: Value) {
        self.fields.borrow_mut().insert(name.to_string(), value);
    }
}

impl fmt::Display for LoxInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<instance of class '{}'>", self.class.name)
    }
}
