// ABOUTME: End-to-end checks running whole programs through the public pipeline

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use tessera::error::Diagnostics;
use tessera::interpreter::Interpreter;
use tessera::parser::Parser;
use tessera::resolver;
use tessera::scanner::Scanner;
use tessera::{run, RunOutcome};

#[derive(Clone, Default)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn run_capturing(source: &str) -> (String, bool) {
    let mut diagnostics = Diagnostics::new();
    let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
    let statements = Parser::new(tokens, &mut diagnostics).parse();
    let side_table = resolver::resolve(&statements, &mut diagnostics);
    assert!(
        !diagnostics.had_error(),
        "unexpected static errors: {:?}",
        diagnostics.messages()
    );
    let sink = SharedBuffer::default();
    let mut interpreter = Interpreter::with_output(side_table, Box::new(sink.clone()));
    let had_error = interpreter.interpret(&statements);
    let printed = String::from_utf8(sink.0.borrow().clone()).expect("program output is valid utf-8");
    (printed, had_error)
}

#[test]
fn closure_counter_increments_across_calls() {
    let source = r#"
        fun make_counter() {
            var count = 0;
            fun increment() {
                count = count + 1;
                return count;
            }
            return increment;
        }
        var counter = make_counter();
        print counter();
        print counter();
        print counter();
    "#;
    let (output, had_error) = run_capturing(source);
    assert!(!had_error);
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn lexical_scoping_captures_the_defining_environment_not_the_calling_one() {
    // A classic "closures capture lexically, not dynamically" check: `showA`
    // always prints the global `a`, even when called from inside a block that
    // shadows `a` locally.
    let source = r#"
        var a = "global";
        fun showA() {
            print a;
        }
        showA();
        {
            var a = "block";
            showA();
        }
    "#;
    let (output, had_error) = run_capturing(source);
    assert!(!had_error);
    assert_eq!(output, "global\nglobal\n");
}

#[test]
fn class_instance_construction_runs_init_and_dispatches_methods() {
    let source = r#"
        class Greeter {
            init(name) {
                this.name = name;
            }
            greet() {
                return "Hi, " + this.name;
            }
        }
        var g = Greeter("Ada");
        print g.greet();
    "#;
    let (output, had_error) = run_capturing(source);
    assert!(!had_error);
    assert_eq!(output, "Hi, Ada\n");
}

#[test]
fn break_stops_a_while_loop_at_the_expected_iteration() {
    let source = r#"
        var i = 0;
        while (true) {
            i = i + 1;
            if (i == 3) break;
        }
        print i;
    "#;
    let (output, had_error) = run_capturing(source);
    assert!(!had_error);
    assert_eq!(output, "3\n");
}

#[test]
fn continue_inside_a_for_loop_still_advances_the_loop_variable() {
    // Regression test: the `for`-desugared increment must run even when the
    // body exits via `continue`, otherwise the loop variable never advances
    // and the loop hangs.
    let source = r#"
        var out = "";
        for (var i = 0; i < 5; i = i + 1) {
            if (i == 2) continue;
            out = out + i;
        }
        print out;
    "#;
    let (output, had_error) = run_capturing(source);
    assert!(!had_error);
    assert_eq!(output, "0134\n");
}

#[test]
fn string_and_number_operands_of_plus_coerce_to_string() {
    let (output, had_error) = run_capturing(r#"print "n=" + 1 + 2;"#);
    assert!(!had_error);
    assert_eq!(output, "n=12\n");
}

#[test]
fn ternary_and_short_circuit_or_return_the_expected_values() {
    let source = r#"
        print true ? "a" : "b";
        print nil or "x";
    "#;
    let (output, had_error) = run_capturing(source);
    assert!(!had_error);
    assert_eq!(output, "a\ntrue\n");
}

#[test]
fn division_by_zero_is_reported_as_a_runtime_error_not_a_panic() {
    let (_output, had_error) = run_capturing("print 1 / 0;");
    assert!(had_error);
}

#[test]
fn more_than_255_arguments_is_a_static_error() {
    let mut args = String::new();
    for i in 0..256 {
        if i > 0 {
            args.push(',');
        }
        args.push_str(&i.to_string());
    }
    let source = format!("fun f() {{}} f({});", args);
    assert!(matches!(run(&source), RunOutcome::StaticError));
}

#[test]
fn returning_at_the_top_level_is_a_static_error() {
    assert!(matches!(run("return 1;"), RunOutcome::StaticError));
}

#[test]
fn an_unterminated_string_is_a_static_error() {
    assert!(matches!(run("print \"unterminated;"), RunOutcome::StaticError));
}

#[test]
fn an_unterminated_block_comment_is_a_static_error() {
    assert!(matches!(run("/* never closed"), RunOutcome::StaticError));
}

#[test]
fn a_runtime_error_in_one_top_level_statement_does_not_abort_the_rest() {
    let source = r#"
        print 1 / 0;
        print "still ran";
    "#;
    let (output, had_error) = run_capturing(source);
    assert!(had_error);
    assert_eq!(output, "still ran\n");
}
