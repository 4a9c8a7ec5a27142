use std::rc::Rc;

use log::{debug, info};

use crate::error::LoxError;
use crate::expr::{DepthCell, Expr, FnExpr, LiteralValue};
use crate::stmt::{MethodDecl, Stmt};
use crate::token::{Literal, Token, TokenType};

type ParseResult<T> = std::result::Result<T, LoxError>;

/// Recursive-descent parser with panic-mode recovery.
///
/// Every statement is parsed inside a recovery boundary: an error unwinds
/// to the statement level via `Result`, gets recorded, and the parser
/// synchronizes to the next statement boundary before continuing.  The
/// whole token stream is always consumed; the caller decides what to do
/// with the accumulated errors.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<LoxError>,
    // Lexical loop nesting, so `break` outside a loop is a syntax error.
    loop_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
            loop_depth: 0,
        }
    }

    /// Parse a whole program as a statement list.
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<LoxError>) {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
        }

        info!(
            "Parsed {} statement(s) with {} error(s)",
            statements.len(),
            self.errors.len()
        );

        (statements, self.errors)
    }

    /// Parse the token stream as a single expression (REPL mode).
    pub fn parse_expression(mut self) -> (Option<Expr>, Vec<LoxError>) {
        match self.expression() {
            Ok(expr) => {
                if !self.is_at_end() {
                    let token: Token = self.peek().clone();
                    let err = self.error_at(&token, "unexpected trailing input");

                    self.errors.push(err);
                }

                (Some(expr), self.errors)
            }

            Err(err) => {
                self.errors.push(err);

                (None, self.errors)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Recovery boundary
    // ─────────────────────────────────────────────────────────────────────

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.declaration() {
            Ok(stmt) => Some(stmt),

            Err(err) => {
                debug!("Parse error, synchronizing: {}", err);

                self.errors.push(err);
                self.synchronize();

                None
            }
        }
    }

    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::SEMICOLON {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN => return,

                _ => {}
            }

            self.advance();
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Declarations
    // ─────────────────────────────────────────────────────────────────────

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.match_tokens(&[TokenType::CLASS]) {
            return self.class_declaration();
        }

        if self.match_tokens(&[TokenType::FUN]) {
            return self.function_declaration();
        }

        if self.match_tokens(&[TokenType::VAR]) {
            return self.var_declaration();
        }

        self.statement()
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "expected class name")?;

        let superclass: Option<Expr> = if self.match_tokens(&[TokenType::LESS]) {
            let super_name = self.consume(TokenType::IDENTIFIER, "expected superclass name")?;

            Some(Expr::Variable {
                name: super_name,
                depth: DepthCell::default(),
            })
        } else {
            None
        };

        self.consume(TokenType::LEFT_BRACE, "expected '{' before class body")?;

        let mut methods: Vec<MethodDecl> = Vec::new();
        let mut class_methods: Vec<MethodDecl> = Vec::new();

        while !self.is_at_end() && !self.check(TokenType::RIGHT_BRACE) {
            let is_class_method: bool = self.match_tokens(&[TokenType::CLASS]);
            let method = self.method_declaration(is_class_method)?;

            if is_class_method {
                class_methods.push(method);
            } else {
                methods.push(method);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "expected '}' after class body")?;

        Ok(Stmt::Class {
            name,
            superclass,
            methods,
            class_methods,
        })
    }

    fn method_declaration(&mut self, is_class_method: bool) -> ParseResult<MethodDecl> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "expected method or property name")?;

        // A method without a parameter list is a property getter.
        let (parameters, is_property) = if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            (self.parameter_list()?, false)
        } else {
            (Vec::new(), true)
        };

        self.consume(TokenType::LEFT_BRACE, "expected '{' before method body")?;
        let body: Vec<Stmt> = self.block_statements()?;

        let is_initializer: bool = !is_class_method && name.lexeme == "init";

        Ok(MethodDecl {
            name,
            function: Rc::new(FnExpr { parameters, body }),
            is_property,
            is_initializer,
        })
    }

    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "expected function name")?;
        let function: Rc<FnExpr> = self.function_expression()?;

        Ok(Stmt::Function { name, function })
    }

    fn function_expression(&mut self) -> ParseResult<Rc<FnExpr>> {
        self.consume(TokenType::LEFT_PAREN, "expected '(' after 'fun'")?;
        let parameters: Vec<Token> = self.parameter_list()?;

        self.consume(TokenType::LEFT_BRACE, "expected '{' before function body")?;
        let body: Vec<Stmt> = self.block_statements()?;

        Ok(Rc::new(FnExpr { parameters, body }))
    }

    fn parameter_list(&mut self) -> ParseResult<Vec<Token>> {
        let mut parameters: Vec<Token> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if parameters.len() >= 255 {
                    let token: Token = self.peek().clone();
                    let err = self.error_at(&token, "can't have more than 255 parameters");

                    self.errors.push(err);
                }

                parameters.push(self.consume(TokenType::IDENTIFIER, "expected parameter name")?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "expected ')' after parameters")?;

        Ok(parameters)
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "expected variable name")?;

        let initializer: Option<Expr> = if self.match_tokens(&[TokenType::EQUAL]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "expected ';' after variable declaration")?;

        Ok(Stmt::Var { name, initializer })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_tokens(&[TokenType::FOR]) {
            return self.for_statement();
        }

        if self.match_tokens(&[TokenType::IF]) {
            return self.if_statement();
        }

        if self.match_tokens(&[TokenType::PRINT]) {
            return self.print_statement();
        }

        if self.match_tokens(&[TokenType::RETURN]) {
            return self.return_statement();
        }

        if self.match_tokens(&[TokenType::WHILE]) {
            return self.while_statement();
        }

        if self.match_tokens(&[TokenType::BREAK]) {
            return self.break_statement();
        }

        if self.match_tokens(&[TokenType::LEFT_BRACE]) {
            return Ok(Stmt::Block(self.block_statements()?));
        }

        self.expression_statement()
    }

    /// `for` desugars into a block wrapping a `while`: the increment is
    /// appended to the body, the initializer prepended to the loop.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "expected '(' after 'for'")?;

        let initializer: Option<Stmt> = if self.match_tokens(&[TokenType::SEMICOLON]) {
            None
        } else if self.match_tokens(&[TokenType::VAR]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "expected ';' after loop condition")?;

        let increment: Option<Expr> = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "expected ')' after for clauses")?;

        self.loop_depth += 1;
        let body_result = self.statement();
        self.loop_depth -= 1;

        let mut body: Stmt = body_result?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition: Expr = condition.unwrap_or(Expr::Literal(LiteralValue::True));
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "expected '(' after 'if'")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "expected ')' after if condition")?;

        let then_branch = Box::new(self.statement()?);

        let else_branch: Option<Box<Stmt>> = if self.match_tokens(&[TokenType::ELSE]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "expected '(' after 'while'")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "expected ')' after while condition")?;

        self.loop_depth += 1;
        let body_result = self.statement();
        self.loop_depth -= 1;

        Ok(Stmt::While {
            condition,
            body: Box::new(body_result?),
        })
    }

    fn break_statement(&mut self) -> ParseResult<Stmt> {
        let keyword: Token = self.previous().clone();

        if self.loop_depth == 0 {
            let err = self.error_at(&keyword, "'break' can only be used inside a loop");

            self.errors.push(err);
        }

        self.consume(TokenType::SEMICOLON, "expected ';' after 'break'")?;

        Ok(Stmt::Break { keyword })
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword: Token = self.previous().clone();

        let value: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "expected ';' after return value")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() && !self.check(TokenType::RIGHT_BRACE) {
            if let Some(stmt) = self.parse_statement() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "expected '}' after block")?;

        Ok(statements)
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "expected ';' after value")?;

        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "expected ';' after expression")?;

        Ok(Stmt::Expression(expr))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expressions, lowest to highest precedence
    // ─────────────────────────────────────────────────────────────────────

    fn expression(&mut self) -> ParseResult<Expr> {
        self.comma()
    }

    fn comma(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.assignment()?;

        while self.match_tokens(&[TokenType::COMMA]) {
            let right = self.assignment()?;

            expr = Expr::Comma {
                left: Box::new(expr),
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr: Expr = self.ternary()?;

        if self.match_tokens(&[TokenType::EQUAL]) {
            let equals: Token = self.previous().clone();
            let value = self.assignment()?;

            return Ok(match expr {
                Expr::Variable { name, .. } => Expr::Assign {
                    name,
                    value: Box::new(value),
                    depth: DepthCell::default(),
                },

                Expr::Get { object, name } => Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                },

                other => {
                    let err = self.error_at(&equals, "invalid assignment target");

                    self.errors.push(err);

                    other
                }
            });
        }

        Ok(expr)
    }

    fn ternary(&mut self) -> ParseResult<Expr> {
        let expr: Expr = self.or()?;

        if self.match_tokens(&[TokenType::QUESTION]) {
            let then_branch = self.expression()?;
            self.consume(TokenType::COLON, "expected ':' after then branch")?;
            let else_branch = self.ternary()?;

            return Ok(Expr::Ternary {
                condition: Box::new(expr),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.and()?;

        while self.match_tokens(&[TokenType::OR]) {
            let operator: Token = self.previous().clone();
            let right = self.and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.match_tokens(&[TokenType::AND]) {
            let operator: Token = self.previous().clone();
            let right = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.comparison()?;

        while self.match_tokens(&[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL]) {
            let operator: Token = self.previous().clone();
            let right = self.comparison()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.term()?;

        while self.match_tokens(&[
            TokenType::GREATER,
            TokenType::GREATER_EQUAL,
            TokenType::LESS,
            TokenType::LESS_EQUAL,
        ]) {
            let operator: Token = self.previous().clone();
            let right = self.term()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.factor()?;

        while self.match_tokens(&[TokenType::MINUS, TokenType::PLUS]) {
            let operator: Token = self.previous().clone();
            let right = self.factor()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.unary()?;

        while self.match_tokens(&[TokenType::SLASH, TokenType::STAR]) {
            let operator: Token = self.previous().clone();
            let right = self.unary()?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_tokens(&[TokenType::BANG, TokenType::MINUS]) {
            let operator: Token = self.previous().clone();
            let right = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.match_tokens(&[TokenType::LEFT_PAREN]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tokens(&[TokenType::DOT]) {
                let name = self.consume(TokenType::IDENTIFIER, "expected property name after '.'")?;

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= 255 {
                    let token: Token = self.peek().clone();
                    let err = self.error_at(&token, "can't have more than 255 arguments");

                    self.errors.push(err);
                }

                // One precedence level below `comma`, so commas separate
                // arguments instead of folding them into one expression.
                arguments.push(self.assignment()?);

                if !self.match_tokens(&[TokenType::COMMA]) {
                    break;
                }
            }
        }

        let paren: Token = self.consume(TokenType::RIGHT_PAREN, "expected ')' after arguments")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.match_tokens(&[TokenType::FALSE]) {
            return Ok(Expr::Literal(LiteralValue::False));
        }

        if self.match_tokens(&[TokenType::TRUE]) {
            return Ok(Expr::Literal(LiteralValue::True));
        }

        if self.match_tokens(&[TokenType::NIL]) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        if self.match_tokens(&[TokenType::NUMBER, TokenType::STRING]) {
            let token: Token = self.previous().clone();

            return match token.literal {
                Some(Literal::Number(n)) => Ok(Expr::Literal(LiteralValue::Number(n))),

                Some(Literal::Str(s)) => Ok(Expr::Literal(LiteralValue::Str(s))),

                None => Err(self.error_at(&token, "literal token carries no value")),
            };
        }

        if self.match_tokens(&[TokenType::THIS]) {
            return Ok(Expr::This {
                keyword: self.previous().clone(),
                depth: DepthCell::default(),
            });
        }

        if self.match_tokens(&[TokenType::SUPER]) {
            let keyword: Token = self.previous().clone();
            self.consume(TokenType::DOT, "expected '.' after 'super'")?;
            let method = self.consume(TokenType::IDENTIFIER, "expected superclass method name")?;

            return Ok(Expr::Super {
                keyword,
                method,
                depth: DepthCell::default(),
            });
        }

        if self.match_tokens(&[TokenType::IDENTIFIER]) {
            return Ok(Expr::Variable {
                name: self.previous().clone(),
                depth: DepthCell::default(),
            });
        }

        if self.match_tokens(&[TokenType::FUN]) {
            return Ok(Expr::Function(self.function_expression()?));
        }

        if self.match_tokens(&[TokenType::LEFT_PAREN]) {
            let expr = self.expression()?;
            self.consume(TokenType::RIGHT_PAREN, "expected ')' after expression")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        let token: Token = self.peek().clone();

        Err(self.error_at(&token, "expected expression"))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Token cursor helpers
    // ─────────────────────────────────────────────────────────────────────

    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(token_type) {
            self.advance();

            return Ok(self.previous().clone());
        }

        let token: Token = self.peek().clone();

        Err(self.error_at(&token, message))
    }

    fn error_at(&self, token: &Token, message: &str) -> LoxError {
        if token.token_type == TokenType::EOF {
            LoxError::syntax(token.line, format!("at end: {}", message))
        } else {
            LoxError::syntax(token.line, format!("at '{}': {}", token.lexeme, message))
        }
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(*token_type) {
                self.advance();

                return true;
            }
        }

        false
    }

    #[inline]
    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == token_type
    }

    #[inline]
    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    #[inline]
    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    #[inline]
    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }
}
