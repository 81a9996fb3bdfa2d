// ABOUTME: Parenthesized textual rendering of an expression tree, for tests only

use crate::ast::{Expr, ExprKind};

/// Renders `expr` as a fully-parenthesized prefix expression, e.g.
/// `1 + 2 * 3` prints as `(+ 1 (* 2 3))`. Used only to assert parser shape in
/// tests (spec §8.2); never reachable from the CLI or REPL.
pub fn print(expr: &Expr) -> String {
    match &expr.kind {
        ExprKind::Literal(value) => format!("{}", value),
        ExprKind::Variable(name) => name.lexeme.clone(),
        ExprKind::Grouping(inner) => parenthesize("group", &[inner]),
        ExprKind::Unary(op, right) => parenthesize(&op.lexeme, &[right]),
        ExprKind::Binary(left, op, right) => parenthesize(&op.lexeme, &[left, right]),
        ExprKind::Sequence(items) => {
            let rendered: Vec<&Expr> = items.iter().collect();
            parenthesize(",", &rendered)
        }
        ExprKind::Ternary(pred, then_branch, else_branch) => match else_branch {
            Some(else_branch) => parenthesize("?:", &[pred, then_branch, else_branch]),
            None => parenthesize("?:", &[pred, then_branch]),
        },
        ExprKind::Assignment(name, value) => {
            format!("(= {} {})", name.lexeme, print(value))
        }
        ExprKind::Call(callee, _, arguments) => match arguments {
            Some(arguments) => format!("(call {} {})", print(callee), print(arguments)),
            None => format!("(call {})", print(callee)),
        },
        ExprKind::Lambda(decl) => format!("(lambda ({}))", decl.params.len()),
        ExprKind::Get(object, name) => format!("(. {} {})", print(object), name.lexeme),
        ExprKind::Set(object, name, value) => {
            format!("(= (. {} {}) {})", print(object), name.lexeme, print(value))
        }
    }
}

fn parenthesize(name: &str, exprs: &[&Expr]) -> String {
    let mut out = format!("({}", name);
    for expr in exprs {
        out.push(' ');
        out.push_str(&print(expr));
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn parse_single_expr(source: &str) -> Expr {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        match statements.into_iter().next() {
            Some(crate::ast::Stmt::Expression(expr)) => expr,
            other => panic!("expected a single expression statement, got {:?}", other),
        }
    }

    #[test]
    fn binary_precedence_is_visible_in_the_parenthesization() {
        let expr = parse_single_expr("1 + 2 * 3;");
        assert_eq!(print(&expr), "(+ 1 (* 2 3))");
    }

    #[test]
    fn grouping_is_rendered_explicitly() {
        let expr = parse_single_expr("(1 + 2) * 3;");
        assert_eq!(print(&expr), "(* (group (+ 1 2)) 3)");
    }
}
