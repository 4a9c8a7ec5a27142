//! Centralised error hierarchy for the **Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables
//! a uniform `Result<T>` alias throughout the crate while preserving the line
//! and lexeme information the diagnostics need.
//!
//! The module **does not** print diagnostics itself.

use std::io;

use log::debug;
use thiserror::Error;

use crate::token::Token;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical or syntactic error from the scanner or parser.
    #[error("[line {line}] syntax error: {message}")]
    Syntax {
        /// Human-readable description.
        message: String,

        /// 1-based line where the error occurred.
        line: usize,
    },

    /// Static-analysis failure (binding, scoping, `this`/`super` misuse).
    #[error("[line {line}] resolver error at '{lexeme}': {message}")]
    Resolve {
        message: String,
        lexeme: String,
        line: usize,
    },

    /// Runtime evaluation error.
    #[error("[line {line}] runtime error at '{lexeme}': {message}")]
    Runtime {
        message: String,
        lexeme: String,
        line: usize,
    },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LoxError {
    /// Helper constructor for the **scanner** and **parser**.
    pub fn syntax<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("syntax error: line={}, msg={}", line, message);

        LoxError::Syntax { message, line }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!(
            "resolver error: line={}, at={}, msg={}",
            token.line, token.lexeme, message
        );

        LoxError::Resolve {
            message,
            lexeme: token.lexeme.clone(),
            line: token.line,
        }
    }

    /// Helper constructor for the **evaluator**.
    pub fn runtime<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        debug!(
            "runtime error: line={}, at={}, msg={}",
            token.line, token.lexeme, message
        );

        LoxError::Runtime {
            message,
            lexeme: token.lexeme.clone(),
            line: token.line,
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
