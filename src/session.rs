//! One interpreter session: feeds source text through every stage and
//! aggregates the outcome, leaving printing and exit codes to the driver.

use std::io::{self, Write};

use log::{debug, info};
use thiserror::Error;

use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner;

/// Why a run stopped.
#[derive(Debug, Error)]
pub enum Failure {
    /// Lexical, syntax or resolution errors; nothing was executed.
    #[error("{} static error(s)", .0.len())]
    Static(Vec<LoxError>),

    /// Execution stopped at this error; output before it was kept.
    #[error(transparent)]
    Runtime(LoxError),
}

impl Failure {
    /// Conventional sysexits code: 65 (data error) or 70 (software error).
    pub fn exit_code(&self) -> i32 {
        match self {
            Failure::Static(_) => 65,
            Failure::Runtime(_) => 70,
        }
    }

    /// Every diagnostic carried, in report order.
    pub fn errors(&self) -> Vec<&LoxError> {
        match self {
            Failure::Static(errors) => errors.iter().collect(),
            Failure::Runtime(error) => vec![error],
        }
    }
}

/// Global state persists across [`Session::run`] calls, so a REPL can define
/// a function on one line and call it on the next.
pub struct Session<W: Write = io::Stdout> {
    interpreter: Interpreter<W>,
}

impl Session<io::Stdout> {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }
}

impl Default for Session<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Session<W> {
    pub fn with_output(out: W) -> Self {
        Self::with_interpreter(Interpreter::with_output(out))
    }

    pub fn with_interpreter(interpreter: Interpreter<W>) -> Self {
        Session { interpreter }
    }

    pub fn interpreter(&mut self) -> &mut Interpreter<W> {
        &mut self.interpreter
    }

    pub fn output(&self) -> &W {
        self.interpreter.output()
    }

    /// Scan, parse, resolve and execute `source`.
    ///
    /// Lexical and syntax errors are reported together; resolution only runs
    /// on a clean parse and execution only on a clean resolution.
    pub fn run(&mut self, source: &str) -> Result<(), Failure> {
        info!("Running {} bytes of source", source.len());

        let (tokens, mut errors) = scanner::scan(source);

        let (statements, parse_errors) = Parser::new(&tokens).parse();
        errors.extend(parse_errors);

        if !errors.is_empty() {
            debug!("Stopping before resolution: {} error(s)", errors.len());
            return Err(Failure::Static(errors));
        }

        let (locals, resolve_errors) = Resolver::new().resolve(&statements);

        if !resolve_errors.is_empty() {
            debug!("Stopping before execution: {} error(s)", resolve_errors.len());
            return Err(Failure::Static(resolve_errors));
        }

        self.interpreter.add_locals(locals);

        self.interpreter
            .interpret(&statements)
            .map_err(Failure::Runtime)
    }
}
