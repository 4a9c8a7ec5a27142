//! Tree-walking evaluator.
//!
//! Statements and expressions are interpreted directly off the resolved
//! AST.  Non-local control flow (`break`, `return`) travels as `Unwind`
//! signals through the same `Result` channel as runtime errors, but the
//! two are distinct: signals are part of normal execution and are caught
//! by the nearest loop or call frame, while errors propagate to the
//! driver.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::expr::{Depth, DepthCell, Expr, LiteralValue};
use crate::stmt::{MethodDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::{LoxFn, NativeFn, Value};

/// Why evaluation of the current construct stopped early.
pub enum Unwind {
    /// `break` travelling to the nearest enclosing loop.
    Break(Token),

    /// `return` travelling to the nearest enclosing call frame.
    Return { keyword: Token, value: Value },

    /// A genuine runtime failure.
    Error(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(err: LoxError) -> Self {
        Unwind::Error(err)
    }
}

type EvalResult<T> = std::result::Result<T, Unwind>;

pub struct Interpreter {
    environment: Rc<RefCell<Environment>>,
    output: Rc<RefCell<dyn Write>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(io::stdout())))
    }

    /// Build an interpreter whose `print` statements write to the given
    /// sink instead of stdout.
    pub fn with_output(output: Rc<RefCell<dyn Write>>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::Native(Rc::new(NativeFn {
                name: "clock",
                arity: 0,
                func: clock_native,
            })),
        );

        Interpreter {
            environment: globals,
            output,
        }
    }

    /// Execute a resolved program, stopping at the first runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> crate::Result<()> {
        info!("Interpreting {} statement(s)", statements.len());

        for statement in statements {
            if let Err(unwind) = self.execute(statement) {
                return Err(Self::into_error(unwind));
            }
        }

        Ok(())
    }

    /// Evaluate a resolved bare expression (REPL mode).
    pub fn interpret_expression(&mut self, expr: &Expr) -> crate::Result<Value> {
        self.evaluate(expr).map_err(Self::into_error)
    }

    /// Signals that escape every loop and call frame are reported as
    /// runtime errors rather than crashing the session.
    fn into_error(unwind: Unwind) -> LoxError {
        match unwind {
            Unwind::Error(err) => err,

            Unwind::Break(keyword) => LoxError::runtime(&keyword, "'break' outside of a loop"),

            Unwind::Return { keyword, .. } => {
                LoxError::runtime(&keyword, "'return' outside of a function")
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> EvalResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.output.borrow_mut(), "{}", value).map_err(LoxError::from)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                match initializer {
                    Some(expr) => {
                        let value: Value = self.evaluate(expr)?;

                        self.environment.borrow_mut().define(&name.lexeme, value);
                    }

                    None => {
                        self.environment.borrow_mut().declare(&name.lexeme);
                    }
                }

                Ok(())
            }

            Stmt::Block(statements) => {
                let frame = Environment::with_enclosing(Rc::clone(&self.environment));

                self.execute_block(statements, Rc::new(RefCell::new(frame)))
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body) {
                        Ok(()) => {}

                        Err(Unwind::Break(_)) => break,

                        Err(other) => return Err(other),
                    }
                }

                Ok(())
            }

            Stmt::Break { keyword } => Err(Unwind::Break(keyword.clone())),

            Stmt::Return { keyword, value } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(Unwind::Return {
                    keyword: keyword.clone(),
                    value,
                })
            }

            Stmt::Function { name, function } => {
                let function = Value::Function(Rc::new(LoxFn {
                    name: Some(name.lexeme.clone()),
                    declaration: Rc::clone(function),
                    closure: Rc::clone(&self.environment),
                    is_initializer: false,
                    is_property: false,
                }));

                self.environment.borrow_mut().define(&name.lexeme, function);

                Ok(())
            }

            Stmt::Class {
                name,
                superclass,
                methods,
                class_methods,
            } => self.execute_class(name, superclass.as_ref(), methods, class_methods),
        }
    }

    fn execute_block(
        &mut self,
        statements: &[Stmt],
        frame: Rc<RefCell<Environment>>,
    ) -> EvalResult<()> {
        let previous: Rc<RefCell<Environment>> = std::mem::replace(&mut self.environment, frame);

        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[MethodDecl],
        class_methods: &[MethodDecl],
    ) -> EvalResult<()> {
        let superclass_value: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;

                match value {
                    Value::Class(class) => Some(class),

                    _ => {
                        let blame: &Token = match expr {
                            Expr::Variable { name, .. } => name,
                            _ => name,
                        };

                        return Err(LoxError::runtime(blame, "superclass must be a class").into());
                    }
                }
            }

            None => None,
        };

        // Method closures capture a frame binding `super` when inheriting.
        let method_env: Rc<RefCell<Environment>> = match &superclass_value {
            Some(superclass) => {
                let mut frame = Environment::with_enclosing(Rc::clone(&self.environment));
                frame.define("super", Value::Class(Rc::clone(superclass)));

                Rc::new(RefCell::new(frame))
            }

            None => Rc::clone(&self.environment),
        };

        // The metaclass carries the class methods and inherits from the
        // superclass's metaclass, so statics resolve like instance
        // methods one level up.
        let metaclass = Rc::new(LoxClass::new(
            format!("{} metaclass", name.lexeme),
            superclass_value
                .as_ref()
                .and_then(|superclass| superclass.metaclass.clone()),
            self.method_table(class_methods, &method_env),
            None,
        ));

        let class = Rc::new(LoxClass::new(
            name.lexeme.clone(),
            superclass_value,
            self.method_table(methods, &method_env),
            Some(metaclass),
        ));

        info!("Defined class '{}'", name.lexeme);

        self.environment
            .borrow_mut()
            .define(&name.lexeme, Value::Class(class));

        Ok(())
    }

    fn method_table(
        &self,
        declarations: &[MethodDecl],
        closure: &Rc<RefCell<Environment>>,
    ) -> HashMap<String, Rc<LoxFn>> {
        declarations
            .iter()
            .map(|decl| {
                (
                    decl.name.lexeme.clone(),
                    Rc::new(LoxFn {
                        name: Some(decl.name.lexeme.clone()),
                        declaration: Rc::clone(&decl.function),
                        closure: Rc::clone(closure),
                        is_initializer: decl.is_initializer,
                        is_property: decl.is_property,
                    }),
                )
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────

    fn evaluate(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::Str(s.clone()),
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let value: Value = self.evaluate(right)?;

                match operator.token_type {
                    TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

                    TokenType::MINUS => match value.as_number() {
                        Some(n) => Ok(Value::Number(-n)),

                        None => Err(LoxError::runtime(
                            operator,
                            "unary - operand must be a number",
                        )
                        .into()),
                    },

                    _ => Err(LoxError::runtime(operator, "invalid unary operator").into()),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left_value: Value = self.evaluate(left)?;
                let right_value: Value = self.evaluate(right)?;

                self.binary_op(&left_value, operator, &right_value)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_value: Value = self.evaluate(left)?;

                match operator.token_type {
                    TokenType::OR => {
                        if left_value.is_truthy() {
                            Ok(left_value)
                        } else {
                            self.evaluate(right)
                        }
                    }

                    TokenType::AND => {
                        if !left_value.is_truthy() {
                            Ok(left_value)
                        } else {
                            self.evaluate(right)
                        }
                    }

                    _ => Err(LoxError::runtime(operator, "invalid logical operator").into()),
                }
            }

            Expr::Comma { left, right } => {
                self.evaluate(left)?;

                self.evaluate(right)
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { name, depth } => {
                let resolved: Depth = self.resolved_depth(depth, name)?;

                Ok(Environment::get_at(&self.environment, resolved, name)?)
            }

            Expr::Assign { name, value, depth } => {
                let value: Value = self.evaluate(value)?;
                let resolved: Depth = self.resolved_depth(depth, name)?;

                Environment::assign_at(&self.environment, resolved, name, value.clone())?;

                Ok(value)
            }

            Expr::This { keyword, depth } => {
                let resolved: Depth = self.resolved_depth(depth, keyword)?;

                Ok(Environment::get_at(&self.environment, resolved, keyword)?)
            }

            Expr::Super {
                keyword,
                method,
                depth,
            } => self.evaluate_super(keyword, method, depth),

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_value: Value = self.evaluate(callee)?;

                let mut argument_values: Vec<Value> = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    argument_values.push(self.evaluate(argument)?);
                }

                self.call_value(&callee_value, paren, argument_values)
            }

            Expr::Get { object, name } => {
                let object_value: Value = self.evaluate(object)?;

                self.get_property(&object_value, name)
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let object_value: Value = self.evaluate(object)?;

                match &object_value {
                    Value::Instance(instance) => {
                        let value: Value = self.evaluate(value)?;

                        instance.set_field(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    // A class is an instance of its metaclass; assigning
                    // through it creates a static field.
                    Value::Class(class) => {
                        let value: Value = self.evaluate(value)?;

                        class.set_field(&name.lexeme, value.clone());

                        Ok(value)
                    }

                    _ => {
                        Err(LoxError::runtime(name, "only instances and classes have fields")
                            .into())
                    }
                }
            }

            Expr::Function(declaration) => Ok(Value::Function(Rc::new(LoxFn {
                name: None,
                declaration: Rc::clone(declaration),
                closure: Rc::clone(&self.environment),
                is_initializer: false,
                is_property: false,
            }))),
        }
    }

    fn binary_op(&self, left: &Value, operator: &Token, right: &Value) -> EvalResult<Value> {
        match operator.token_type {
            TokenType::PLUS => {
                if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
                    return Ok(Value::Number(a + b));
                }

                // String on either side stringifies the other operand.
                if left.as_string().is_some() || right.as_string().is_some() {
                    return Ok(Value::Str(format!("{}{}", left, right)));
                }

                Err(LoxError::runtime(operator, "+ operands must be numbers or strings").into())
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left.equals(right))),

            TokenType::BANG_EQUAL => Ok(Value::Bool(!left.equals(right))),

            TokenType::MINUS
            | TokenType::SLASH
            | TokenType::STAR
            | TokenType::GREATER
            | TokenType::GREATER_EQUAL
            | TokenType::LESS
            | TokenType::LESS_EQUAL => {
                let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
                    return Err(LoxError::runtime(
                        operator,
                        format!("{} operands must be numbers", operator.lexeme),
                    )
                    .into());
                };

                match operator.token_type {
                    TokenType::MINUS => Ok(Value::Number(a - b)),

                    TokenType::STAR => Ok(Value::Number(a * b)),

                    TokenType::SLASH => {
                        if b == 0.0 {
                            Err(LoxError::runtime(operator, "division by zero").into())
                        } else {
                            Ok(Value::Number(a / b))
                        }
                    }

                    TokenType::GREATER => Ok(Value::Bool(a > b)),

                    TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),

                    TokenType::LESS => Ok(Value::Bool(a < b)),

                    TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),

                    _ => unreachable!("numeric operator"),
                }
            }

            _ => Err(LoxError::runtime(operator, "invalid binary operator").into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Calls, properties, super
    // ─────────────────────────────────────────────────────────────────────

    fn call_value(
        &mut self,
        callee: &Value,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> EvalResult<Value> {
        match callee {
            Value::Native(native) => {
                if arguments.len() != native.arity {
                    return Err(self.arity_error(paren, native.arity, arguments.len()));
                }

                debug!("Calling native fn '{}'", native.name);

                (native.func)(&arguments).map_err(|msg| LoxError::runtime(paren, msg).into())
            }

            Value::Function(function) => {
                if arguments.len() != function.arity() {
                    return Err(self.arity_error(paren, function.arity(), arguments.len()));
                }

                self.call_function(function, arguments, paren)
            }

            // Calling a class constructs an instance.
            Value::Class(class) => {
                if arguments.len() != class.arity() {
                    return Err(self.arity_error(paren, class.arity(), arguments.len()));
                }

                let instance = Value::Instance(Rc::new(LoxInstance::new(Rc::clone(class))));

                if let Some(initializer) = class.initializer() {
                    let bound: LoxFn = initializer.bind(instance.clone());

                    self.call_function(&bound, arguments, paren)?;
                }

                Ok(instance)
            }

            _ => Err(LoxError::runtime(paren, "can only call functions and classes").into()),
        }
    }

    fn call_function(
        &mut self,
        function: &LoxFn,
        arguments: Vec<Value>,
        blame: &Token,
    ) -> EvalResult<Value> {
        let mut frame = Environment::with_enclosing(Rc::clone(&function.closure));

        for (parameter, argument) in function.declaration.parameters.iter().zip(arguments) {
            frame.define(&parameter.lexeme, argument);
        }

        let result = self.execute_block(&function.declaration.body, Rc::new(RefCell::new(frame)));

        let returned: Value = match result {
            Ok(()) => Value::Nil,

            Err(Unwind::Return { value, .. }) => value,

            Err(other) => return Err(other),
        };

        // An initializer yields the receiver no matter what the body did.
        if function.is_initializer {
            let this_token = Token::new(TokenType::THIS, "this".to_string(), None, blame.line);

            return Ok(Environment::get_at(
                &function.closure,
                Depth::Local(0),
                &this_token,
            )?);
        }

        Ok(returned)
    }

    fn get_property(&mut self, object: &Value, name: &Token) -> EvalResult<Value> {
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.field(&name.lexeme) {
                    return Ok(value);
                }

                if let Some(method) = instance.class.find_method(&name.lexeme) {
                    return self.bind_method(&method, object.clone(), name);
                }

                Err(LoxError::runtime(
                    name,
                    format!("undefined property '{}'", name.lexeme),
                )
                .into())
            }

            // Statics: the class is an instance of its metaclass.
            Value::Class(class) => {
                if let Some(value) = class.field(&name.lexeme) {
                    return Ok(value);
                }

                let method = class
                    .metaclass
                    .as_ref()
                    .and_then(|metaclass| metaclass.find_method(&name.lexeme));

                if let Some(method) = method {
                    return self.bind_method(&method, object.clone(), name);
                }

                Err(LoxError::runtime(
                    name,
                    format!("undefined property '{}'", name.lexeme),
                )
                .into())
            }

            _ => {
                Err(LoxError::runtime(name, "only instances and classes have properties").into())
            }
        }
    }

    /// Bind a method to its receiver.  Property getters are invoked on
    /// the spot.
    fn bind_method(&mut self, method: &LoxFn, receiver: Value, blame: &Token) -> EvalResult<Value> {
        let bound: LoxFn = method.bind(receiver);

        if bound.is_property {
            self.call_function(&bound, Vec::new(), blame)
        } else {
            Ok(Value::Function(Rc::new(bound)))
        }
    }

    fn evaluate_super(
        &mut self,
        keyword: &Token,
        method: &Token,
        depth: &DepthCell,
    ) -> EvalResult<Value> {
        let resolved: Depth = self.resolved_depth(depth, keyword)?;

        let superclass_value = Environment::get_at(&self.environment, resolved, keyword)?;

        let superclass = match superclass_value {
            Value::Class(class) => class,

            _ => return Err(LoxError::runtime(keyword, "'super' is not a class").into()),
        };

        // `this` sits one frame inside the `super` frame.
        let hops: usize = match resolved {
            Depth::Local(hops) if hops >= 1 => hops,

            _ => return Err(LoxError::runtime(keyword, "'super' is not bound here").into()),
        };

        let this_token = Token::new(TokenType::THIS, "this".to_string(), None, keyword.line);
        let receiver = Environment::get_at(&self.environment, Depth::Local(hops - 1), &this_token)?;

        match superclass.find_method(&method.lexeme) {
            Some(found) => self.bind_method(&found, receiver, method),

            None => Err(LoxError::runtime(
                method,
                format!("undefined property '{}'", method.lexeme),
            )
            .into()),
        }
    }

    fn resolved_depth(&self, depth: &DepthCell, token: &Token) -> EvalResult<Depth> {
        depth.get().ok_or_else(|| {
            Unwind::Error(LoxError::runtime(
                token,
                format!("unresolved reference to '{}'", token.lexeme),
            ))
        })
    }

    fn arity_error(&self, paren: &Token, expected: usize, got: usize) -> Unwind {
        Unwind::Error(LoxError::runtime(
            paren,
            format!("expected {} arguments but got {}", expected, got),
        ))
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn clock_native(_args: &[Value]) -> std::result::Result<Value, String> {
    let timestamp: f64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
