// ABOUTME: Error taxonomy and diagnostics sink for the scan/parse/resolve/run pipeline

use crate::token::Token;
use thiserror::Error;

/// Accumulates diagnostics across a pipeline stage rather than aborting on the
/// first problem. Scanning, parsing, and resolving each take `&mut Diagnostics`
/// and keep going after recording an error (spec: scan/parse/resolve errors are
/// reported but do not throw through the whole pipeline).
#[derive(Debug, Default)]
pub struct Diagnostics {
    had_error: bool,
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Records `[line N] Error: message`.
    pub fn error(&mut self, line: usize, message: impl AsRef<str>) {
        self.report(line, "", message);
    }

    /// Records an error located at a specific token, using its lexeme as the
    /// `<where>` clause.
    pub fn error_at(&mut self, token: &Token, message: impl AsRef<str>) {
        let where_clause = format!(" at token {}", token.lexeme);
        self.report(token.line, &where_clause, message);
    }

    fn report(&mut self, line: usize, where_clause: &str, message: impl AsRef<str>) {
        let line_msg = format!("[line {}] Error{}: {}", line, where_clause, message.as_ref());
        self.messages.push(line_msg);
        self.had_error = true;
    }

    /// Writes every accumulated message to stderr, one per line.
    pub fn emit(&self) {
        for message in &self.messages {
            eprintln!("{}", message);
        }
    }
}

/// Runtime error categories, tied to the token that triggered them for
/// location reporting (spec §4.5, §7).
#[derive(Debug, Clone, Error)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    NotANumber,

    #[error("Operands must be numbers.")]
    OperandsNotNumbers,

    #[error("Operands must be two numbers or two strings.")]
    InvalidAddOperands,

    #[error("Division by zero.")]
    ZeroDivision,

    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),

    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),

    #[error("Can only call functions and classes.")]
    NotCallable,

    #[error("Expected {expected} arguments but got {actual}.")]
    ArityMismatch { expected: usize, actual: usize },

    #[error("Only instances have properties.")]
    NotAnInstance,
}

#[derive(Debug, Clone, Error)]
#[error("[line {line}] Error: {kind}")]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub line: usize,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, token: &Token) -> Self {
        RuntimeError {
            kind,
            line: token.line,
        }
    }
}

/// Non-error, non-value outcome of executing a statement: the protocol for
/// non-local exit used by `return`, `break`, and `continue` (spec §4.5, §9).
/// Not part of `RuntimeError` — these unwind through arbitrary frames but are
/// never reported as diagnostics.
#[derive(Debug, Clone)]
pub enum Signal {
    Return(crate::value::Value),
    Break,
    Continue,
}
