// ABOUTME: Single pass over the AST recording lexical depth per name reference

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Stmt};
use crate::error::Diagnostics;
use crate::token::Token;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
}

/// Maps expression identity to the number of enclosing environment frames to
/// skip to reach the frame that defines the referenced name. Present only
/// for `Variable`/`Assignment` expressions that resolve to a local binding;
/// absence means "look up in globals" (spec §3.6).
pub type SideTable = HashMap<ExprId, usize>;

struct Resolver<'d> {
    scopes: Vec<HashMap<String, bool>>,
    side_table: SideTable,
    current_function: FunctionKind,
    loop_depth: usize,
    diagnostics: &'d mut Diagnostics,
}

pub fn resolve(statements: &[Stmt], diagnostics: &mut Diagnostics) -> SideTable {
    let mut resolver = Resolver {
        scopes: Vec::new(),
        side_table: HashMap::new(),
        current_function: FunctionKind::None,
        loop_depth: 0,
        diagnostics,
    };
    resolver.resolve_stmts(statements);
    resolver.side_table
}

impl<'d> Resolver<'d> {
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.contains_key(&name.lexeme) {
            self.diagnostics
                .error_at(name, "Already a variable with this name in this scope.");
        }
        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn resolve_local(&mut self, expr_id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.side_table.insert(expr_id, depth);
                return;
            }
        }
        // Not found in any local scope: resolves against globals.
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Var(name, init) => {
                self.declare(name);
                if let Some(init) = init {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::If(condition, then_branch, else_branch) => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While(condition, body, increment) => {
                self.resolve_expr(condition);
                self.loop_depth += 1;
                self.resolve_stmt(body);
                if let Some(increment) = increment {
                    self.resolve_expr(increment);
                }
                self.loop_depth -= 1;
            }
            Stmt::Function(decl) => {
                if let Some(name) = &decl.name {
                    self.declare(name);
                    self.define(name);
                }
                self.resolve_function(decl, FunctionKind::Function);
            }
            Stmt::Return(keyword, value) => {
                if self.current_function == FunctionKind::None {
                    self.diagnostics
                        .error_at(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
            Stmt::Break(keyword) => {
                if self.loop_depth == 0 {
                    self.diagnostics.error_at(keyword, "Can't use 'break' outside a loop.");
                }
            }
            Stmt::Continue(keyword) => {
                if self.loop_depth == 0 {
                    self.diagnostics
                        .error_at(keyword, "Can't use 'continue' outside a loop.");
                }
            }
            Stmt::Class(name, methods) => {
                self.declare(name);
                self.define(name);
                self.begin_scope();
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert("this".to_string(), true);
                }
                for method in methods {
                    self.resolve_function(method, FunctionKind::Function);
                }
                self.end_scope();
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionKind) {
        let enclosing_function = self.current_function;
        self.current_function = kind;
        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();
        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Variable(name) => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.diagnostics.error_at(
                            name,
                            "Can't read local variable in its own initializer.",
                        );
                    }
                }
                self.resolve_local(expr.id, name);
            }
            ExprKind::Grouping(inner) => self.resolve_expr(inner),
            ExprKind::Unary(_, right) => self.resolve_expr(right),
            ExprKind::Binary(left, _, right) => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Sequence(items) => {
                for item in items {
                    self.resolve_expr(item);
                }
            }
            ExprKind::Ternary(pred, then_branch, else_branch) => {
                self.resolve_expr(pred);
                self.resolve_expr(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_expr(else_branch);
                }
            }
            ExprKind::Assignment(name, value) => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, name);
            }
            ExprKind::Call(callee, _, arguments) => {
                self.resolve_expr(callee);
                if let Some(arguments) = arguments {
                    self.resolve_expr(arguments);
                }
            }
            ExprKind::Lambda(decl) => {
                self.resolve_function(decl, FunctionKind::Function);
            }
            ExprKind::Get(object, _) => self.resolve_expr(object),
            ExprKind::Set(object, _, value) => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve_source(source: &str) -> (SideTable, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        let side_table = resolve(&statements, &mut diagnostics);
        (side_table, diagnostics)
    }

    #[test]
    fn records_hops_for_a_local_reference() {
        let (side_table, diagnostics) = resolve_source("{ var x = 1; { print x; } }");
        assert!(!diagnostics.had_error());
        assert!(!side_table.is_empty());
    }

    #[test]
    fn global_reference_has_no_side_table_entry() {
        let (side_table, diagnostics) =
            resolve_source("var x = 1; fun f() { print x; }");
        assert!(!diagnostics.had_error());
        assert!(side_table.is_empty());
    }

    #[test]
    fn self_referential_initializer_is_an_error() {
        let (_, diagnostics) = resolve_source("{ var a = a; }");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn redeclaration_in_local_scope_is_an_error() {
        let (_, diagnostics) = resolve_source("{ var a = 1; var a = 2; }");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn redeclaration_at_global_scope_is_allowed() {
        let (_, diagnostics) = resolve_source("var a = 1; var a = 2;");
        assert!(!diagnostics.had_error());
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let (_, diagnostics) = resolve_source("return 1;");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn return_inside_function_is_fine() {
        let (_, diagnostics) = resolve_source("fun f() { return 1; }");
        assert!(!diagnostics.had_error());
    }

    #[test]
    fn break_outside_loop_is_an_error() {
        let (_, diagnostics) = resolve_source("break;");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn break_inside_while_is_fine() {
        let (_, diagnostics) = resolve_source("while (true) { break; }");
        assert!(!diagnostics.had_error());
    }
}
