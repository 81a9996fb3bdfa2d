// ABOUTME: Public pipeline entry points wiring scanner -> parser -> resolver -> interpreter

pub mod ast;
pub mod ast_printer;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use error::Diagnostics;
use interpreter::Interpreter;
use parser::Parser;

/// Outcome of running a unit of source through the full pipeline, mapped to
/// process exit codes by the caller (spec §4.6, sysexits convention: 0 ok,
/// 65 scan/parse/resolve error, 70 runtime error).
pub enum RunOutcome {
    Ok,
    StaticError,
    RuntimeError,
}

/// Runs one unit of source to completion, printing `print` statement output
/// to stdout and diagnostics to stderr as a side effect.
pub fn run(source: &str) -> RunOutcome {
    let mut diagnostics = Diagnostics::new();
    let tokens = scanner::Scanner::new(source).scan_tokens(&mut diagnostics);
    let statements = Parser::new(tokens, &mut diagnostics).parse();

    if diagnostics.had_error() {
        diagnostics.emit();
        return RunOutcome::StaticError;
    }

    let side_table = resolver::resolve(&statements, &mut diagnostics);
    if diagnostics.had_error() {
        diagnostics.emit();
        return RunOutcome::StaticError;
    }

    let mut interpreter = Interpreter::new(side_table);
    if interpreter.interpret(&statements) {
        return RunOutcome::RuntimeError;
    }
    RunOutcome::Ok
}

/// Runs one unit of source within a REPL session, reusing `interpreter` and
/// its `side_table` accumulation across successive inputs so that top-level
/// `var`/`fun`/`class` declarations persist between lines (spec §4.6).
pub fn run_repl_line(source: &str, interpreter: &mut Interpreter) -> RunOutcome {
    let mut diagnostics = Diagnostics::new();
    let tokens = scanner::Scanner::new(source).scan_tokens(&mut diagnostics);
    let statements = Parser::new(tokens, &mut diagnostics).parse();

    if diagnostics.had_error() {
        diagnostics.emit();
        return RunOutcome::StaticError;
    }

    let side_table = resolver::resolve(&statements, &mut diagnostics);
    if diagnostics.had_error() {
        diagnostics.emit();
        return RunOutcome::StaticError;
    }

    interpreter.extend_side_table(side_table);
    if interpreter.interpret(&statements) {
        return RunOutcome::RuntimeError;
    }
    RunOutcome::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_source_runs_clean() {
        assert!(matches!(run("print 1 + 1;"), RunOutcome::Ok));
    }

    #[test]
    fn a_scan_error_is_reported_as_a_static_error() {
        assert!(matches!(run("\"unterminated"), RunOutcome::StaticError));
    }

    #[test]
    fn a_parse_error_is_reported_as_a_static_error() {
        assert!(matches!(run("var ;"), RunOutcome::StaticError));
    }

    #[test]
    fn a_runtime_error_is_reported_distinctly_from_a_static_error() {
        assert!(matches!(run("print 1 / 0;"), RunOutcome::RuntimeError));
    }
}
