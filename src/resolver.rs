//! Static resolution pass.
//!
//! A single AST walk that:
//! 1. **Builds lexical scopes**: a stack of maps tracking declared and
//!    defined names, with a synthetic outermost scope standing in for the
//!    globals.
//! 2. **Enforces static rules**: redeclaration in the same local scope,
//!    reading a variable in its own initializer, `return` outside a
//!    function, value returns from initializers, `this`/`super` misuse,
//!    self-inheritance, and unused locals.
//! 3. **Records binding distances**: every `Variable`, `Assign`, `This`,
//!    and `Super` node carries a depth cell; the resolver writes either
//!    `Depth::Local(n)` (n frames up the static chain) or `Depth::Global`
//!    into it so the evaluator never searches for a name.
//!
//! Errors accumulate; resolution always walks the whole tree.

use std::collections::HashMap;
use std::mem;

use log::{debug, info};

use crate::error::LoxError;
use crate::expr::{Depth, DepthCell, Expr, FnExpr};
use crate::stmt::{MethodDecl, Stmt};
use crate::token::Token;

/// What kind of function body encloses the current node.  Used to
/// validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    /// Not inside any class
    None,

    /// Inside a class declaration _without_ a superclass
    Class,

    /// Inside a class declaration _with_ a superclass
    Subclass,
}

/// One name in a scope.  `token` is `None` for the synthetic `this` and
/// `super` bindings, which are exempt from the unused-local check.
struct Local {
    token: Option<Token>,
    defined: bool,
    usages: usize,
}

pub struct Resolver {
    // scopes[0] is the synthetic global scope; it is never popped and its
    // names resolve to `Depth::Global`.
    scopes: Vec<HashMap<String, Local>>,
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<LoxError>,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: vec![HashMap::new()],
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    /// Walk all top-level statements.  Returns every static error found.
    pub fn resolve(mut self, statements: &[Stmt]) -> Vec<LoxError> {
        info!("Resolving {} top-level statement(s)", statements.len());

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        self.errors
    }

    /// Resolve a bare expression (REPL mode).
    pub fn resolve_expression(mut self, expr: &Expr) -> Vec<LoxError> {
        self.resolve_expr(expr);

        self.errors
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::Var { name, initializer } => {
                self.declare(name);

                if let Some(expr) = initializer {
                    self.resolve_expr(expr);
                }

                self.define(name);

                if initializer.is_some() {
                    self.mark_initialized(name);
                }
            }

            Stmt::Block(statements) => {
                self.begin_scope();

                for s in statements {
                    self.resolve_stmt(s);
                }

                self.end_scope();
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }

            Stmt::Break { .. } => {
                // Loop nesting is validated by the parser.
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "'return' used outside of a function");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "can't return a value from an initializer");
                    }

                    self.resolve_expr(expr);
                }
            }

            Stmt::Function { name, function } => {
                // Declared and defined up front so the body can recurse.
                self.declare(name);
                self.define(name);
                self.mark_initialized(name);

                self.resolve_function(function, FunctionType::Function);
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
            } => {
                self.resolve_class(name, superclass.as_ref(), methods, class_methods);
            }
        }
    }

    fn resolve_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[MethodDecl],
        class_methods: &[MethodDecl],
    ) {
        self.declare(name);
        self.define(name);
        self.mark_initialized(name);

        let enclosing_class: ClassType = self.current_class;

        self.current_class = if superclass.is_some() {
            ClassType::Subclass
        } else {
            ClassType::Class
        };

        if let Some(superclass) = superclass {
            if let Expr::Variable { name: super_name, .. } = superclass {
                if super_name.lexeme == name.lexeme {
                    self.error(super_name, "a class can't inherit from itself");
                }
            }

            self.resolve_expr(superclass);

            // `super` lives one scope outside `this`.
            self.begin_scope();
            self.define_synthetic("super");
        }

        self.begin_scope();
        self.define_synthetic("this");

        for method in methods {
            if method.is_initializer && method.is_property {
                self.error(&method.name, "initializer can't be a property");
            }

            let kind = if method.is_initializer {
                FunctionType::Initializer
            } else {
                FunctionType::Method
            };

            self.resolve_function(&method.function, kind);
        }

        // Class methods are methods of the metaclass; `this` inside them
        // names the class itself.
        for method in class_methods {
            self.resolve_function(&method.function, FunctionType::Method);
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
    }

    /// Enter a fresh scope for a function's parameters + body.
    fn resolve_function(&mut self, function: &FnExpr, kind: FunctionType) {
        let enclosing: FunctionType = mem::replace(&mut self.current_function, kind);

        self.begin_scope();

        for param in &function.parameters {
            self.declare(param);
            self.define(param);
        }

        for stmt in &function.body {
            self.resolve_stmt(stmt);
        }

        self.end_scope();

        self.current_function = enclosing;
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner);
            }

            Expr::Unary { right, .. } => {
                self.resolve_expr(right);
            }

            Expr::Binary { left, right, .. }
            | Expr::Logical { left, right, .. }
            | Expr::Comma { left, right } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }

            Expr::Variable { name, depth } => {
                // Reading a name that is declared but not yet defined in
                // the current scope means the initializer refers to the
                // variable being initialized.
                if let Some(scope) = self.scopes.last() {
                    if let Some(local) = scope.get(&name.lexeme) {
                        if !local.defined {
                            self.errors.push(LoxError::resolve(
                                name,
                                format!("cannot refer to '{}' in its own initializer", name.lexeme),
                            ));
                        }
                    }
                }

                self.resolve_local(name, depth);
            }

            Expr::Assign { name, value, depth } => {
                self.resolve_expr(value);
                self.resolve_local(name, depth);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            Expr::Get { object, .. } => {
                self.resolve_expr(object);
            }

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }

            Expr::This { keyword, depth } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "cannot use 'this' outside of a class");
                }

                self.resolve_local(keyword, depth);
            }

            Expr::Super { keyword, depth, .. } => {
                match self.current_class {
                    ClassType::None => {
                        self.error(keyword, "cannot use 'super' outside of a class");
                    }

                    ClassType::Class => {
                        self.error(keyword, "cannot use 'super' in a class with no superclass");
                    }

                    ClassType::Subclass => {}
                }

                self.resolve_local(keyword, depth);
            }

            Expr::Function(function) => {
                self.resolve_function(function, FunctionType::Function);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pop the innermost scope and report locals that were never used.
    fn end_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for (name, local) in &scope {
                if local.usages == 0 && !name.starts_with('_') {
                    if let Some(token) = &local.token {
                        self.errors.push(LoxError::resolve(
                            token,
                            format!("local variable '{}' is never used", name),
                        ));
                    }
                }
            }
        }
    }

    fn declare(&mut self, name: &Token) {
        let is_global: bool = self.scopes.len() == 1;

        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) && !is_global {
                self.errors.push(LoxError::resolve(
                    name,
                    format!("'{}' already declared in this scope", name.lexeme),
                ));
            }

            scope.insert(
                name.lexeme.clone(),
                Local {
                    token: Some(name.clone()),
                    defined: false,
                    usages: 0,
                },
            );
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            match scope.get_mut(&name.lexeme) {
                Some(local) => local.defined = true,

                None => {
                    scope.insert(
                        name.lexeme.clone(),
                        Local {
                            token: Some(name.clone()),
                            defined: true,
                            usages: 0,
                        },
                    );
                }
            }
        }
    }

    /// An initialized definition counts as a use; only bare `var x;`
    /// declarations and parameters can end a scope unused.
    fn mark_initialized(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if let Some(local) = scope.get_mut(&name.lexeme) {
                local.usages += 1;
            }
        }
    }

    /// Insert a name the evaluator binds itself (`this`, `super`).
    fn define_synthetic(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Local {
                    token: None,
                    defined: true,
                    usages: 0,
                },
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Binding-distance helper
    // ─────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at some hop count, or as a
    /// global.  Resolution against the synthetic outermost scope also
    /// yields `Depth::Global`: the evaluator walks to the root frame and
    /// looks the name up there.
    fn resolve_local(&mut self, name: &Token, depth: &DepthCell) {
        let scope_count: usize = self.scopes.len();

        for (hops, scope) in self.scopes.iter_mut().rev().enumerate() {
            if let Some(local) = scope.get_mut(&name.lexeme) {
                local.usages += 1;

                let resolved: Depth = if hops + 1 == scope_count {
                    Depth::Global
                } else {
                    Depth::Local(hops)
                };

                debug!("Resolved '{}' as {:?}", name.lexeme, resolved);

                depth.set(Some(resolved));

                return;
            }
        }

        debug!("Resolved '{}' as undeclared global", name.lexeme);

        depth.set(Some(Depth::Global));
    }

    fn error<S: Into<String>>(&mut self, token: &Token, message: S) {
        self.errors.push(LoxError::resolve(token, message));
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
