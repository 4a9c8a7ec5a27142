use std::rc::Rc;

use crate::expr::{Expr, FnExpr};
use crate::token::Token;

/// A method in a class body.  `is_property` marks the paren-less form
/// (invoked on access); `is_initializer` marks an instance method named
/// `init`.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: Token,
    pub function: Rc<FnExpr>,
    pub is_property: bool,
    pub is_initializer: bool,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(Expr),

    Print(Expr),

    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    Block(Vec<Stmt>),

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    While {
        condition: Expr,
        body: Box<Stmt>,
    },

    Break {
        keyword: Token,
    },

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Function {
        name: Token,
        function: Rc<FnExpr>,
    },

    Class {
        name: Token,
        // Always an `Expr::Variable` naming the superclass.
        superclass: Option<Expr>,
        methods: Vec<MethodDecl>,
        class_methods: Vec<MethodDecl>,
    },
}
