use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use treelox as lox;

use anyhow::Context;
use clap::Parser as ClapParser;
use log::{debug, info};

use lox::expr::Expr;
use lox::interpreter::Interpreter;
use lox::parser::Parser;
use lox::resolver::Resolver;
use lox::scanner::Scanner;
use lox::token::Token;
use lox::LoxError;

#[derive(ClapParser, Debug)]
#[command(name = "lox", version, about = "Tree-walking interpreter for the Lox language", long_about = None)]
pub struct Cli {
    /// Script to execute; omit to start a REPL.
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,

        Err(err) => {
            let _ = err.print();

            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    ExitCode::SUCCESS
                }

                _ => ExitCode::from(64),
            };
        }
    };

    match args.script {
        Some(path) => run_file(&path),

        None => run_prompt(),
    }
}

fn run_file(path: &Path) -> ExitCode {
    let source: String = match read_source(path) {
        Ok(source) => source,

        Err(err) => {
            eprintln!("{:#}", err);

            return ExitCode::from(1);
        }
    };

    let mut interpreter = Interpreter::new();

    if run(&source, &mut interpreter, false) {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(65)
    }
}

fn read_source(path: &Path) -> anyhow::Result<String> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let mut buf: String = String::new();
    let mut reader: BufReader<File> = BufReader::new(file);

    reader
        .read_to_string(&mut buf)
        .with_context(|| format!("failed to read {}", path.display()))?;

    Ok(buf)
}

fn run_prompt() -> ExitCode {
    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();

    loop {
        eprint!("> ");
        let _ = io::stderr().flush();

        let mut line: String = String::new();

        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,

            Ok(_) => {}

            Err(err) => {
                eprintln!("read stdin failed: {}", err);

                return ExitCode::from(1);
            }
        }

        // Errors are reported and the session continues.
        run(&line, &mut interpreter, true);
    }

    ExitCode::SUCCESS
}

/// Drive the pipeline: scan, parse, resolve, evaluate.  Any stage that
/// produces errors reports them all and stops.  Returns whether the
/// source ran cleanly.
fn run(source: &str, interpreter: &mut Interpreter, allow_expr: bool) -> bool {
    let (tokens, scan_errors) = Scanner::new(source).scan_tokens();

    if !scan_errors.is_empty() {
        report(&scan_errors);

        return false;
    }

    let (statements, parse_errors) = Parser::new(tokens.clone()).parse();

    if !parse_errors.is_empty() {
        // In the REPL, a line that fails to parse as statements may still
        // be a lone expression; evaluate it and show its repr form.
        if allow_expr {
            if let Some(ran) = run_expression(tokens, interpreter) {
                return ran;
            }
        }

        report(&parse_errors);

        return false;
    }

    let resolve_errors = Resolver::new().resolve(&statements);

    if !resolve_errors.is_empty() {
        report(&resolve_errors);

        return false;
    }

    debug!("Pipeline clean, evaluating");

    match interpreter.interpret(&statements) {
        Ok(()) => true,

        Err(err) => {
            eprintln!("{}", err);

            false
        }
    }
}

/// REPL fallback: re-parse the line as a single expression.  `None` means
/// it is not an expression either and the statement errors should stand.
fn run_expression(tokens: Vec<Token>, interpreter: &mut Interpreter) -> Option<bool> {
    let (expr, errors) = Parser::new(tokens).parse_expression();

    let expr: Expr = expr?;

    if !errors.is_empty() {
        return None;
    }

    info!("REPL line parsed as a bare expression");

    let resolve_errors = Resolver::new().resolve_expression(&expr);

    if !resolve_errors.is_empty() {
        report(&resolve_errors);

        return Some(false);
    }

    match interpreter.interpret_expression(&expr) {
        Ok(value) => {
            println!("{}", value.repr());

            Some(true)
        }

        Err(err) => {
            eprintln!("{}", err);

            Some(false)
        }
    }
}

fn report(errors: &[LoxError]) {
    for err in errors {
        eprintln!("{}", err);
    }
}
