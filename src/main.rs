// ABOUTME: CLI entry point: runs a script file or starts an interactive REPL

use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::{Config, DefaultEditor, Editor};
use std::path::PathBuf;
use std::process::ExitCode;
use std::collections::HashMap;
use tessera::interpreter::Interpreter;
use tessera::scanner::paren_brace_balance;
use tessera::{run, run_repl_line, RunOutcome};

const EX_OK: u8 = 0;
const EX_DATAERR: u8 = 65;
const EX_SOFTWARE: u8 = 70;

/// A tree-walking interpreter for a small dynamically-typed, class-based
/// scripting language.
#[derive(ClapParser, Debug)]
#[command(name = "tessera")]
#[command(version)]
#[command(about = "A tree-walking interpreter for a small scripting language")]
struct CliArgs {
    /// Script file to execute. If omitted, starts an interactive REPL.
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    match args.script {
        Some(path) => run_file(&path),
        None => run_prompt(),
    }
}

fn run_file(path: &PathBuf) -> ExitCode {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            eprintln!("Cannot read script file {}: {}", path.display(), err);
            return ExitCode::from(EX_DATAERR);
        }
    };

    match run(&contents) {
        RunOutcome::Ok => ExitCode::from(EX_OK),
        RunOutcome::StaticError => ExitCode::from(EX_DATAERR),
        RunOutcome::RuntimeError => ExitCode::from(EX_SOFTWARE),
    }
}

fn run_prompt() -> ExitCode {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), _> = match DefaultEditor::with_config(config) {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Failed to initialize REPL: {}", err);
            return ExitCode::from(EX_SOFTWARE);
        }
    };

    let history_file = ".tessera_history";
    let _ = rl.load_history(history_file);

    let mut interpreter = Interpreter::new(HashMap::new());

    let mut pending = String::new();
    loop {
        let prompt = if pending.is_empty() { "> " } else { "... " };
        match rl.readline(prompt) {
            Ok(line) => {
                if !pending.is_empty() {
                    pending.push('\n');
                }
                pending.push_str(&line);

                // Keep reading lines while parens/braces are unbalanced, so a
                // multi-line block or function body can be entered as one unit.
                if paren_brace_balance(&pending) > 0 {
                    continue;
                }

                let source = std::mem::take(&mut pending);
                if source.trim().is_empty() {
                    continue;
                }
                run_repl_line(&source, &mut interpreter);
            }
            Err(ReadlineError::Interrupted) => {
                pending.clear();
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    ExitCode::from(EX_OK)
}
