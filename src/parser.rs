// ABOUTME: Hand-written recursive-descent parser turning tokens into statements

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Stmt};
use crate::error::Diagnostics;
use crate::token::{Token, TokenKind};
use crate::value::Value;
use std::rc::Rc;

const MAX_PARAMS: usize = 255;

/// Internal control-flow signal for "abandon this production, synchronize at
/// the nearest statement boundary". The diagnostic message itself is already
/// recorded on `Diagnostics` before this is returned.
struct ParseError;

pub struct Parser<'d> {
    tokens: Vec<Token>,
    current: usize,
    next_id: ExprId,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    pub fn new(tokens: Vec<Token>, diagnostics: &'d mut Diagnostics) -> Self {
        Parser {
            tokens,
            current: 0,
            next_id: 0,
            diagnostics,
        }
    }

    /// `program → declaration* END`
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        statements
    }

    fn next_id(&mut self) -> ExprId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        let id = self.next_id();
        Expr { id, kind }
    }

    // ---- declarations ----------------------------------------------------

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_kind(&[TokenKind::Class]) {
            self.class_decl()
        } else if self.match_kind(&[TokenKind::Fun]) {
            self.fun_decl("function")
        } else if self.match_kind(&[TokenKind::Var]) {
            self.var_decl()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    /// `class_decl → "class" IDENT "{" fun_decl* "}"` (methods omit "fun")
    fn class_decl(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?.clone();
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.function("method")?));
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;
        Ok(Stmt::Class(name, methods))
    }

    fn fun_decl(&mut self, kind: &str) -> Result<Stmt, ParseError> {
        Ok(Stmt::Function(Rc::new(self.function(kind)?)))
    }

    /// `IDENT "(" params? ")" block` shared by top-level functions and methods.
    fn function(&mut self, kind: &str) -> Result<FunctionDecl, ParseError> {
        let name = self
            .consume(TokenKind::Identifier, &format!("Expect {} name.", kind))?
            .clone();
        self.consume(
            TokenKind::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;
        let params = self.parameter_list()?;
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, &format!("Expect '{{' before {} body.", kind))?;
        let body = self.block_body()?;
        Ok(FunctionDecl {
            name: Some(name),
            params,
            body,
        })
    }

    fn parameter_list(&mut self) -> Result<Vec<Token>, ParseError> {
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_PARAMS {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                params.push(
                    self.consume(TokenKind::Identifier, "Expect parameter name.")?
                        .clone(),
                );
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        Ok(params)
    }

    /// `var_decl → "var" IDENT ("=" sequence)? ";"`
    fn var_decl(&mut self) -> Result<Stmt, ParseError> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?.clone();
        let init = if self.match_kind(&[TokenKind::Equal]) {
            Some(self.sequence()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var(name, init))
    }

    // ---- statements --------------------------------------------------------

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.match_kind(&[TokenKind::Print]) {
            return self.print_stmt();
        }
        if self.match_kind(&[TokenKind::If]) {
            return self.if_stmt();
        }
        if self.match_kind(&[TokenKind::While]) {
            return self.while_stmt();
        }
        if self.match_kind(&[TokenKind::For]) {
            return self.for_stmt();
        }
        if self.match_kind(&[TokenKind::Return]) {
            return self.return_stmt();
        }
        if self.match_kind(&[TokenKind::Break]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Semicolon, "Expect ';' after 'break'.")?;
            return Ok(Stmt::Break(keyword));
        }
        if self.match_kind(&[TokenKind::Continue]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Semicolon, "Expect ';' after 'continue'.")?;
            return Ok(Stmt::Continue(keyword));
        }
        if self.match_kind(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block_body()?));
        }
        self.expression_stmt()
    }

    fn print_stmt(&mut self) -> Result<Stmt, ParseError> {
        let value = self.sequence()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn if_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_kind(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If(condition, then_branch, else_branch))
    }

    fn while_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after while condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While(condition, body, None))
    }

    /// Desugars `for (init; cond; inc) body` into
    /// `{ init; while (cond) body; }` with `inc` carried on the `While` node
    /// as its per-iteration increment, run after `body` (even one that exits
    /// via `continue`) and before the condition is re-checked; a missing
    /// `cond` becomes `true`.
    fn for_stmt(&mut self) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_kind(&[TokenKind::Semicolon]) {
            None
        } else if self.match_kind(&[TokenKind::Var]) {
            Some(self.var_decl()?)
        } else {
            Some(self.expression_stmt()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            self.expression()?
        } else {
            self.expr(ExprKind::Literal(Value::Bool(true)))
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenKind::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let body = self.statement()?;

        let mut loop_stmt = Stmt::While(condition, Box::new(body), increment);
        if let Some(initializer) = initializer {
            loop_stmt = Stmt::Block(vec![initializer, loop_stmt]);
        }
        Ok(loop_stmt)
    }

    fn return_stmt(&mut self) -> Result<Stmt, ParseError> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.sequence()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return(keyword, value))
    }

    fn block_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_stmt(&mut self) -> Result<Stmt, ParseError> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(value))
    }

    // ---- expressions --------------------------------------------------------

    /// `sequence → expression ( "," expression )*`. Collapses to the bare
    /// expression when there is only one (a length-1 Sequence would evaluate
    /// identically, so the indirection is pointless).
    fn sequence(&mut self) -> Result<Expr, ParseError> {
        let first = self.expression()?;
        if !self.check(TokenKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.match_kind(&[TokenKind::Comma]) {
            items.push(self.expression()?);
        }
        Ok(self.expr(ExprKind::Sequence(items)))
    }

    /// `expression → lambda | assignment`
    fn expression(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(&[TokenKind::Lambda]) {
            return self.lambda();
        }
        self.assignment()
    }

    fn lambda(&mut self) -> Result<Expr, ParseError> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'lambda'.")?;
        let params = self.parameter_list()?;
        self.consume(TokenKind::RightParen, "Expect ')' after lambda parameters.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before lambda body.")?;
        let body = self.block_body()?;
        Ok(self.expr(ExprKind::Lambda(Box::new(FunctionDecl {
            name: None,
            params,
            body,
        }))))
    }

    /// `assignment → logic_or ( ("="|"+="|"-="|"*="|"/=") assignment )?
    ///             | logic_or "?" expression (":" expression)?`
    fn assignment(&mut self) -> Result<Expr, ParseError> {
        let expr = self.logic_or()?;

        if self.match_kind(&[TokenKind::Question]) {
            let then_branch = Box::new(self.expression()?);
            let else_branch = if self.match_kind(&[TokenKind::Colon]) {
                Some(Box::new(self.expression()?))
            } else {
                None
            };
            return Ok(self.expr(ExprKind::Ternary(Box::new(expr), then_branch, else_branch)));
        }

        let compound_op = match self.peek().kind {
            TokenKind::Equal
            | TokenKind::PlusEqual
            | TokenKind::MinusEqual
            | TokenKind::StarEqual
            | TokenKind::SlashEqual => Some(self.advance().clone()),
            _ => None,
        };

        let Some(equals) = compound_op else {
            return Ok(expr);
        };

        let value = self.assignment()?;

        // `x += e` desugars to `x = x + e` (and the property form below to
        // `obj.field = obj.field + e`), etc.
        let binary_op_for = |equals: &Token| match equals.kind {
            TokenKind::PlusEqual => TokenKind::Plus,
            TokenKind::MinusEqual => TokenKind::Minus,
            TokenKind::StarEqual => TokenKind::Star,
            TokenKind::SlashEqual => TokenKind::Slash,
            _ => unreachable!(),
        };

        let expr_id = expr.id;
        match expr.kind {
            ExprKind::Variable(name) => {
                let assigned_value = match equals.kind {
                    TokenKind::Equal => value,
                    _ => {
                        let op_kind = binary_op_for(&equals);
                        let op_token = Token::new(op_kind, equals.lexeme.trim_end_matches('='), equals.line);
                        let left = self.expr(ExprKind::Variable(name.clone()));
                        self.expr(ExprKind::Binary(Box::new(left), op_token, Box::new(value)))
                    }
                };
                Ok(self.expr(ExprKind::Assignment(name, Box::new(assigned_value))))
            }
            ExprKind::Get(object, name) => {
                let assigned_value = match equals.kind {
                    TokenKind::Equal => value,
                    _ => {
                        let op_kind = binary_op_for(&equals);
                        let op_token = Token::new(op_kind, equals.lexeme.trim_end_matches('='), equals.line);
                        let left = self.expr(ExprKind::Get(object.clone(), name.clone()));
                        self.expr(ExprKind::Binary(Box::new(left), op_token, Box::new(value)))
                    }
                };
                Ok(self.expr(ExprKind::Set(object, name, Box::new(assigned_value))))
            }
            other => {
                self.diagnostics.error_at(&equals, "Invalid assignment target.");
                Ok(Expr { id: expr_id, kind: other })
            }
        }
    }

    fn logic_or(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.logic_and()?;
        while self.match_kind(&[TokenKind::Or]) {
            let op = self.previous().clone();
            let right = self.logic_and()?;
            expr = self.expr(ExprKind::Binary(Box::new(expr), op, Box::new(right)));
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.equality()?;
        while self.match_kind(&[TokenKind::And]) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = self.expr(ExprKind::Binary(Box::new(expr), op, Box::new(right)));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.comparison()?;
        while self.match_kind(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let op = self.previous().clone();
            let right = self.comparison()?;
            expr = self.expr(ExprKind::Binary(Box::new(expr), op, Box::new(right)));
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.term()?;
        while self.match_kind(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let op = self.previous().clone();
            let right = self.term()?;
            expr = self.expr(ExprKind::Binary(Box::new(expr), op, Box::new(right)));
        }
        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.factor()?;
        while self.match_kind(&[TokenKind::Minus, TokenKind::Plus]) {
            let op = self.previous().clone();
            let right = self.factor()?;
            expr = self.expr(ExprKind::Binary(Box::new(expr), op, Box::new(right)));
        }
        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.unary()?;
        while self.match_kind(&[TokenKind::Slash, TokenKind::Star]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            expr = self.expr(ExprKind::Binary(Box::new(expr), op, Box::new(right)));
        }
        Ok(expr)
    }

    /// `unary → ("!"|"-"|"++"|"--") unary | call`
    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(&[
            TokenKind::Bang,
            TokenKind::Minus,
            TokenKind::PlusPlus,
            TokenKind::MinusMinus,
        ]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            return Ok(self.expr(ExprKind::Unary(op, Box::new(right))));
        }
        self.call()
    }

    /// `call → primary ( "(" arguments? ")" | "." IDENT )*`
    fn call(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.match_kind(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_kind(&[TokenKind::Dot]) {
                let name = self
                    .consume(TokenKind::Identifier, "Expect property name after '.'.")?
                    .clone();
                expr = self.expr(ExprKind::Get(Box::new(expr), name));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr, ParseError> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_PARAMS {
                    self.error_at_current("Can't have more than 255 arguments.");
                }
                args.push(self.expression()?);
                if !self.match_kind(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self
            .consume(TokenKind::RightParen, "Expect ')' after arguments.")?
            .clone();
        let arguments = if args.is_empty() {
            None
        } else {
            Some(Box::new(self.expr(ExprKind::Sequence(args))))
        };
        Ok(self.expr(ExprKind::Call(Box::new(callee), paren, arguments)))
    }

    /// `primary → "true"|"false"|"nil" | NUMBER | STRING
    ///          | IDENT ("++"|"--")? | "(" expression ")"`
    fn primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_kind(&[TokenKind::False]) {
            return Ok(self.expr(ExprKind::Literal(Value::Bool(false))));
        }
        if self.match_kind(&[TokenKind::True]) {
            return Ok(self.expr(ExprKind::Literal(Value::Bool(true))));
        }
        if self.match_kind(&[TokenKind::Nil]) {
            return Ok(self.expr(ExprKind::Literal(Value::Nil)));
        }
        if self.match_kind(&[TokenKind::Number]) {
            let lexeme = self.previous().lexeme.clone();
            let n: f64 = lexeme.parse().expect("scanner guarantees a well-formed number lexeme");
            let literal = self.expr(ExprKind::Literal(Value::Number(n)));
            if self.match_kind(&[TokenKind::PlusPlus, TokenKind::MinusMinus]) {
                let op = self.previous().clone();
                return Ok(self.expr(ExprKind::Unary(op, Box::new(literal))));
            }
            return Ok(literal);
        }
        if self.match_kind(&[TokenKind::String]) {
            let s = self.previous().lexeme.clone();
            return Ok(self.expr(ExprKind::Literal(Value::String(Rc::new(s)))));
        }
        if self.match_kind(&[TokenKind::This]) {
            let this_tok = self.previous().clone();
            return Ok(self.expr(ExprKind::Variable(this_tok)));
        }
        if self.match_kind(&[TokenKind::Identifier]) {
            let name = self.previous().clone();
            let var_expr = self.expr(ExprKind::Variable(name));
            if self.match_kind(&[TokenKind::PlusPlus, TokenKind::MinusMinus]) {
                let op = self.previous().clone();
                return Ok(self.expr(ExprKind::Unary(op, Box::new(var_expr))));
            }
            return Ok(var_expr);
        }
        if self.match_kind(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(self.expr(ExprKind::Grouping(Box::new(expr))));
        }

        self.error_at_current("Expect expression.");
        Err(ParseError)
    }

    // ---- token stream helpers ---------------------------------------------

    fn match_kind(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|k| self.check(*k)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::End
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<&Token, ParseError> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        self.error_at_current(message);
        Err(ParseError)
    }

    fn error_at_current(&mut self, message: &str) {
        let token = self.peek().clone();
        self.diagnostics.error_at(&token, message);
    }

    /// Consumes tokens until a `;` has just been consumed or the next token
    /// starts a new declaration/statement (spec §4.2).
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            if matches!(
                self.peek().kind,
                TokenKind::Class
                    | TokenKind::For
                    | TokenKind::Fun
                    | TokenKind::If
                    | TokenKind::Print
                    | TokenKind::Return
                    | TokenKind::Var
                    | TokenKind::While
            ) {
                return;
            }
            self.advance();
        }
    }
}
