// ABOUTME: Tree-walking evaluator: AST plus resolver side-table to side effects and values

use crate::ast::{Expr, ExprKind, Stmt};
use crate::environment::Environment;
use crate::error::{RuntimeError, RuntimeErrorKind, Signal};
use crate::resolver::SideTable;
use crate::token::{Token, TokenKind};
use crate::value::{Callable, Class, Function, Instance, NativeFunction, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

pub struct Interpreter {
    pub globals: Rc<Environment>,
    environment: Rc<Environment>,
    side_table: SideTable,
    output: Box<dyn Write>,
}

impl Interpreter {
    /// Merges additional resolver output into the running side-table. Used
    /// by the REPL, where each line is scanned/parsed/resolved independently
    /// but shares one long-lived interpreter and global environment.
    pub fn extend_side_table(&mut self, side_table: SideTable) {
        self.side_table.extend(side_table);
    }

    pub fn new(side_table: SideTable) -> Self {
        Self::with_output(side_table, Box::new(std::io::stdout()))
    }

    /// Builds an interpreter that writes `print` output to `output` instead
    /// of stdout, so tests can assert on program output directly.
    pub fn with_output(side_table: SideTable, output: Box<dyn Write>) -> Self {
        let globals = Environment::new();
        globals.define(
            "clock",
            Value::Callable(Callable::Native(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: native_clock,
            }))),
        );
        Interpreter {
            environment: globals.clone(),
            globals,
            side_table,
            output,
        }
    }

    /// Executes each top-level statement independently: a runtime error
    /// aborts only the statement that raised it, not the remaining program
    /// (spec §7, "each top-level statement is attempted independently").
    /// Returns whether any statement raised a runtime error.
    pub fn interpret(&mut self, statements: &[Stmt]) -> bool {
        let mut had_error = false;
        for stmt in statements {
            if let Err(err) = self.execute_stmt(stmt) {
                eprintln!("{}", err);
                had_error = true;
            }
        }
        had_error
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<Option<Signal>, RuntimeError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(None)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.output, "{}", value).expect("write to output sink succeeds");
                Ok(None)
            }
            Stmt::Var(name, init) => {
                let value = match init {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Nil,
                };
                self.environment.define(name.lexeme.clone(), value);
                Ok(None)
            }
            Stmt::Block(statements) => {
                let block_env = Environment::with_parent(self.environment.clone());
                self.execute_block(statements, block_env)
            }
            Stmt::If(condition, then_branch, else_branch) => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_stmt(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute_stmt(else_branch)
                } else {
                    Ok(None)
                }
            }
            Stmt::While(condition, body, increment) => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute_stmt(body)? {
                        Some(Signal::Break) => break,
                        Some(Signal::Continue) | None => {}
                        Some(Signal::Return(value)) => return Ok(Some(Signal::Return(value))),
                    }
                    // `for`'s desugared increment runs after every iteration
                    // of `body`, including one that exited via `continue`,
                    // and before the condition is re-checked.
                    if let Some(increment) = increment {
                        self.evaluate(increment)?;
                    }
                }
                Ok(None)
            }
            Stmt::Function(decl) => {
                let name = decl
                    .name
                    .as_ref()
                    .expect("top-level function declarations always carry a name");
                let function = Function::from_decl(decl, self.environment.clone(), false);
                self.environment
                    .define(name.lexeme.clone(), Value::Callable(Callable::Function(Rc::new(function))));
                Ok(None)
            }
            Stmt::Return(_, value) => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                Ok(Some(Signal::Return(value)))
            }
            Stmt::Break(_) => Ok(Some(Signal::Break)),
            Stmt::Continue(_) => Ok(Some(Signal::Continue)),
            Stmt::Class(name, methods) => self.execute_class_decl(name, methods),
        }
    }

    fn execute_class_decl(
        &mut self,
        name: &Token,
        methods: &[Rc<crate::ast::FunctionDecl>],
    ) -> Result<Option<Signal>, RuntimeError> {
        // Two-step define-then-assign (rather than defining the class value
        // directly) so methods that close over the defining environment would
        // see the class name bound, same as a recursive function declaration.
        self.environment.define(name.lexeme.clone(), Value::Nil);

        let mut method_table = HashMap::new();
        for method_decl in methods {
            let method_name = method_decl
                .name
                .as_ref()
                .expect("class methods always carry a name");
            let is_initializer = method_name.lexeme == "init";
            let function = Function::from_decl(method_decl, self.environment.clone(), is_initializer);
            method_table.insert(method_name.lexeme.clone(), Rc::new(function));
        }

        let class = Rc::new(Class {
            name: name.lexeme.clone(),
            methods: method_table,
            superclass: None,
        });
        self.environment
            .assign(name, Value::Callable(Callable::Class(class)))?;
        Ok(None)
    }

    /// Runs `statements` in `env`, restoring the previous environment on
    /// every exit path: normal completion, a control signal, or an error
    /// (spec §4.5, "Block execution").
    fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<Environment>,
    ) -> Result<Option<Signal>, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = (|| {
            for stmt in statements {
                if let Some(signal) = self.execute_stmt(stmt)? {
                    return Ok(Some(signal));
                }
            }
            Ok(None)
        })();
        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(value) => Ok(value.clone()),
            ExprKind::Variable(name) => self.lookup_variable(expr.id, name),
            ExprKind::Grouping(inner) => self.evaluate(inner),
            ExprKind::Unary(op, right) => self.evaluate_unary(op, right),
            ExprKind::Binary(left, op, right) => self.evaluate_binary(left, op, right),
            ExprKind::Sequence(items) => {
                let mut result = Value::Nil;
                for item in items {
                    result = self.evaluate(item)?;
                }
                Ok(result)
            }
            ExprKind::Ternary(pred, then_branch, else_branch) => {
                if self.evaluate(pred)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    match else_branch {
                        Some(else_branch) => self.evaluate(else_branch),
                        None => Ok(Value::Nil),
                    }
                }
            }
            ExprKind::Assignment(name, value) => {
                let value = self.evaluate(value)?;
                self.assign_variable(expr.id, name, value.clone())?;
                Ok(value)
            }
            ExprKind::Call(callee, paren, arguments) => self.evaluate_call(callee, paren, arguments),
            ExprKind::Lambda(decl) => Ok(Value::Callable(Callable::Function(Rc::new(
                Function::from_decl(decl, self.environment.clone(), false),
            )))),
            ExprKind::Get(object, name) => self.evaluate_get(object, name),
            ExprKind::Set(object, name, value) => self.evaluate_set(object, name, value),
        }
    }

    fn evaluate_unary(&mut self, op: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        match op.kind {
            TokenKind::Bang => Ok(Value::Bool(!self.evaluate(right)?.is_truthy())),
            TokenKind::Minus => match self.evaluate(right)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new(RuntimeErrorKind::NotANumber, op)),
            },
            // Prefix/postfix ++/-- compute `x ± 1` but never write back to the
            // operand's binding (spec §4.5, a preserved source quirk).
            TokenKind::PlusPlus | TokenKind::MinusMinus => match self.evaluate(right)? {
                Value::Number(n) => {
                    let delta = if op.kind == TokenKind::PlusPlus { 1.0 } else { -1.0 };
                    Ok(Value::Number(n + delta))
                }
                _ => Err(RuntimeError::new(RuntimeErrorKind::NotANumber, op)),
            },
            _ => unreachable!("parser only produces unary ops from !, -, ++, --"),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value, RuntimeError> {
        match op.kind {
            TokenKind::And => {
                let left = self.evaluate(left)?;
                if !left.is_truthy() {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.evaluate(right)?.is_truthy()))
            }
            TokenKind::Or => {
                let left = self.evaluate(left)?;
                if left.is_truthy() {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.evaluate(right)?.is_truthy()))
            }
            _ => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                match op.kind {
                    TokenKind::BangEqual => Ok(Value::Bool(!Value::values_equal(&left, &right))),
                    TokenKind::EqualEqual => Ok(Value::Bool(Value::values_equal(&left, &right))),
                    TokenKind::Greater | TokenKind::GreaterEqual | TokenKind::Less | TokenKind::LessEqual => {
                        let (a, b) = self.as_numbers(&left, &right, op)?;
                        Ok(Value::Bool(match op.kind {
                            TokenKind::Greater => a > b,
                            TokenKind::GreaterEqual => a >= b,
                            TokenKind::Less => a < b,
                            TokenKind::LessEqual => a <= b,
                            _ => unreachable!(),
                        }))
                    }
                    TokenKind::Plus => self.add(&left, &right, op),
                    TokenKind::Minus => {
                        let (a, b) = self.as_numbers(&left, &right, op)?;
                        Ok(Value::Number(a - b))
                    }
                    TokenKind::Star => {
                        let (a, b) = self.as_numbers(&left, &right, op)?;
                        Ok(Value::Number(a * b))
                    }
                    TokenKind::Slash => {
                        let (a, b) = self.as_numbers(&left, &right, op)?;
                        if b == 0.0 {
                            Err(RuntimeError::new(RuntimeErrorKind::ZeroDivision, op))
                        } else {
                            Ok(Value::Number(a / b))
                        }
                    }
                    _ => unreachable!("parser only produces binary ops from this operator set"),
                }
            }
        }
    }

    fn as_numbers(&self, left: &Value, right: &Value, op: &Token) -> Result<(f64, f64), RuntimeError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
            _ => Err(RuntimeError::new(RuntimeErrorKind::OperandsNotNumbers, op)),
        }
    }

    /// Number+Number adds; String+String concatenates; if exactly one side is
    /// a String, the other is stringified and concatenated; otherwise an
    /// error (spec §4.5).
    fn add(&self, left: &Value, right: &Value, op: &Token) -> Result<Value, RuntimeError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(Rc::new(format!("{}{}", left, right))))
            }
            _ => Err(RuntimeError::new(RuntimeErrorKind::InvalidAddOperands, op)),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &Option<Box<Expr>>,
    ) -> Result<Value, RuntimeError> {
        let callee_value = self.evaluate(callee)?;
        let mut args = Vec::new();
        if let Some(arguments) = arguments {
            match &arguments.kind {
                ExprKind::Sequence(items) => {
                    for item in items {
                        args.push(self.evaluate(item)?);
                    }
                }
                _ => args.push(self.evaluate(arguments)?),
            }
        }
        let callable = match callee_value {
            Value::Callable(callable) => callable,
            _ => return Err(RuntimeError::new(RuntimeErrorKind::NotCallable, paren)),
        };
        self.call(&callable, args, paren)
    }

    fn call(&mut self, callable: &Callable, args: Vec<Value>, paren: &Token) -> Result<Value, RuntimeError> {
        let arity = callable.arity();
        if args.len() != arity {
            return Err(RuntimeError::new(
                RuntimeErrorKind::ArityMismatch {
                    expected: arity,
                    actual: args.len(),
                },
                paren,
            ));
        }
        match callable {
            Callable::Native(native) => Ok((native.func)(&args)),
            Callable::Function(function) => self.call_function(function, args),
            Callable::Class(class) => {
                let instance = Rc::new(Instance {
                    class: class.clone(),
                    fields: RefCell::new(HashMap::new()),
                });
                if let Some(init) = class.find_method("init") {
                    let bound = Rc::new(init.bind(instance.clone()));
                    self.call_function(&bound, args)?;
                }
                Ok(Value::Instance(instance))
            }
        }
    }

    /// Runs a function body in a fresh environment parented by its closure.
    /// On normal completion returns `Nil` unless the function is an
    /// initializer, in which case it returns the bound `this`; on a `Return`
    /// signal, returns the value unless it is an initializer, which still
    /// returns `this` (spec §4.5, "Function value call semantics").
    fn call_function(&mut self, function: &Rc<Function>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let call_env = Environment::with_parent(function.closure.clone());
        for (param, arg) in function.params.iter().zip(args) {
            call_env.define(param.clone(), arg);
        }
        let signal = self.execute_block(&function.body, call_env)?;
        if function.is_initializer {
            return Ok(function
                .closure
                .get_immediate("this")
                .expect("an initializer's closure always has `this` bound"));
        }
        match signal {
            Some(Signal::Return(value)) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }

    fn evaluate_get(&mut self, object: &Expr, name: &Token) -> Result<Value, RuntimeError> {
        let object = self.evaluate(object)?;
        match object {
            Value::Instance(instance) => {
                if let Some(value) = instance.fields.borrow().get(&name.lexeme) {
                    return Ok(value.clone());
                }
                if let Some(method) = instance.class.find_method(&name.lexeme) {
                    let bound = method.bind(instance);
                    return Ok(Value::Callable(Callable::Function(Rc::new(bound))));
                }
                Err(RuntimeError::new(
                    RuntimeErrorKind::UndefinedProperty(name.lexeme.clone()),
                    name,
                ))
            }
            _ => Err(RuntimeError::new(RuntimeErrorKind::NotAnInstance, name)),
        }
    }

    fn evaluate_set(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Value, RuntimeError> {
        let object = self.evaluate(object)?;
        match object {
            Value::Instance(instance) => {
                let value = self.evaluate(value)?;
                instance
                    .fields
                    .borrow_mut()
                    .insert(name.lexeme.clone(), value.clone());
                Ok(value)
            }
            _ => Err(RuntimeError::new(RuntimeErrorKind::NotAnInstance, name)),
        }
    }

    fn lookup_variable(&self, expr_id: crate::ast::ExprId, name: &Token) -> Result<Value, RuntimeError> {
        match self.side_table.get(&expr_id) {
            Some(&hops) => Ok(self.environment.get_at(hops, &name.lexeme)),
            None => self.globals.get(name),
        }
    }

    fn assign_variable(
        &mut self,
        expr_id: crate::ast::ExprId,
        name: &Token,
        value: Value,
    ) -> Result<(), RuntimeError> {
        match self.side_table.get(&expr_id) {
            Some(&hops) => {
                self.environment.assign_at(hops, &name.lexeme, value);
                Ok(())
            }
            None => self.globals.assign(name, value),
        }
    }
}

fn native_clock(_args: &[Value]) -> Value {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the Unix epoch")
        .as_secs_f64();
    Value::Number(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::parser::Parser;
    use crate::resolver;
    use crate::scanner::Scanner;

    /// A `Write` sink backed by a shared buffer, so a test can keep reading
    /// captured output after handing the sink's other half to an Interpreter.
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

    fn run_and_had_error(source: &str) -> bool {
        run_capturing(source).1
    }

    /// Runs `source` to completion and returns everything it printed,
    /// alongside whether any statement raised a runtime error.
    fn run_capturing(source: &str) -> (String, bool) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        let side_table = resolver::resolve(&statements, &mut diagnostics);
        assert!(!diagnostics.had_error(), "unexpected pipeline errors: {:?}", diagnostics.messages());
        let sink = SharedBuffer::default();
        let mut interpreter = Interpreter::with_output(side_table, Box::new(sink.clone()));
        let had_error = interpreter.interpret(&statements);
        let printed = String::from_utf8(sink.0.borrow().clone()).expect("program output is valid utf-8");
        (printed, had_error)
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        assert!(run_and_had_error("print 1 / 0;"));
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        assert!(run_and_had_error("var x = 1; x();"));
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error() {
        assert!(run_and_had_error("fun f(a) { return a; } f(1, 2);"));
    }

    #[test]
    fn undefined_property_is_a_runtime_error() {
        assert!(run_and_had_error("class C {} var c = C(); print c.missing;"));
    }

    #[test]
    fn prefix_increment_does_not_write_back() {
        let (output, had_error) = run_capturing("var x = 1; ++x; print x;");
        assert!(!had_error);
        assert_eq!(output, "1\n");
    }

    #[test]
    fn closures_capture_their_own_counter() {
        let source = "
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
        ";
        let (output, had_error) = run_capturing(source);
        assert!(!had_error);
        assert_eq!(output, "1\n2\n3\n");
    }

    #[test]
    fn class_with_initializer_and_method_dispatch() {
        let source = "
            class Greeter {
                init(name) {
                    this.name = name;
                }
                greet() {
                    return \"Hi, \" + this.name;
                }
            }
            var g = Greeter(\"Ada\");
            print g.greet();
        ";
        let (output, had_error) = run_capturing(source);
        assert!(!had_error);
        assert_eq!(output, "Hi, Ada\n");
    }

    #[test]
    fn continue_in_a_for_loop_still_runs_the_increment() {
        let source = "
            var out = \"\";
            for (var i = 0; i < 5; i = i + 1) {
                if (i == 2) continue;
                out = out + i;
            }
            print out;
        ";
        let (output, had_error) = run_capturing(source);
        assert!(!had_error);
        assert_eq!(output, "0134\n");
    }

    #[test]
    fn break_exits_a_while_loop_early() {
        let source = "
            var i = 0;
            while (true) {
                i = i + 1;
                if (i == 3) break;
            }
            print i;
        ";
        let (output, had_error) = run_capturing(source);
        assert!(!had_error);
        assert_eq!(output, "3\n");
    }

    #[test]
    fn string_and_number_addition_coerces_to_string() {
        let (output, had_error) = run_capturing("print \"n=\" + 1 + 2;");
        assert!(!had_error);
        assert_eq!(output, "n=12\n");
    }

    #[test]
    fn logical_operators_return_booleans_not_operands() {
        let (output, had_error) = run_capturing("print nil or \"x\";");
        assert!(!had_error);
        assert_eq!(output, "true\n");
    }
}
