// ABOUTME: Passive AST data: expression and statement variants produced by the parser

use crate::token::Token;
use crate::value::Value;

/// Stable identity for an expression node, assigned at parse time and used
/// by the resolver's side-table (spec §3.6, §9: "stable handle per node").
pub type ExprId = u32;

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Value),
    Variable(Token),
    Grouping(Box<Expr>),
    Unary(Token, Box<Expr>),
    Binary(Box<Expr>, Token, Box<Expr>),
    Sequence(Vec<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Option<Box<Expr>>),
    Assignment(Token, Box<Expr>),
    Call(Box<Expr>, Token, Option<Box<Expr>>),
    Lambda(Box<FunctionDecl>),
    Get(Box<Expr>, Token),
    Set(Box<Expr>, Token, Box<Expr>),
}

/// Shared shape of a named function declaration and an anonymous lambda
/// literal (spec §3.2: "Lambda(function_literal) - an anonymous Function
/// declaration").
#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Option<Token>,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(Expr),
    Print(Expr),
    Var(Token, Option<Expr>),
    Block(Vec<Stmt>),
    If(Expr, Box<Stmt>, Option<Box<Stmt>>),
    /// `increment` is only populated by `for`'s desugaring: it must run after
    /// every iteration of `body`, including one that exits via `continue`, so
    /// it cannot be folded into `body` as an ordinary trailing statement (a
    /// `continue` there would skip it and the loop variable would never
    /// advance).
    While(Expr, Box<Stmt>, Option<Expr>),
    Function(std::rc::Rc<FunctionDecl>),
    Return(Token, Option<Expr>),
    Break(Token),
    Continue(Token),
    Class(Token, Vec<std::rc::Rc<FunctionDecl>>),
}
