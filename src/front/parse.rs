//! The parser.
//!
//! Builds a tree of raw, unresolved names ([`raw::Program`]) via recursive
//! descent over the token stream. Name/shape resolution (binding each
//! identifier to a [`super::ast::SymbolId`]) happens afterwards in
//! [`super::resolve`] — the two passes are kept separate so neither has to
//! carry the other's concerns, the way `original_source`'s `ply_parser.py`
//! and `namer.py` are separate modules.

use std::fmt::Debug;

use derive_more::derive::Display;

use super::ast::{BinaryOp, UnaryOp};
use super::lex::{Lexer, Token, TokenKind};
use crate::common::{Id, Span};

/// The unresolved tree the parser produces. Mirrors `super::ast` shape for
/// shape/init/block-structure, but identifiers are plain names rather than
/// `SymbolId`s.
pub mod raw {
    use super::*;

    #[derive(Debug)]
    pub struct Program {
        pub globals: Vec<Global>,
        pub functions: Vec<Function>,
    }

    #[derive(Debug)]
    pub struct Global {
        pub name: Id,
        pub span: Span,
        pub dims: Vec<usize>,
        pub init: GlobalInit,
    }

    #[derive(Debug)]
    pub enum GlobalInit {
        None,
        Scalar(i32),
        Array(Vec<i32>),
    }

    #[derive(Debug)]
    pub struct Function {
        pub name: Id,
        pub span: Span,
        pub params: Vec<Param>,
        pub body: Option<Block>,
    }

    #[derive(Debug)]
    pub struct Param {
        pub name: Id,
        /// Empty for scalar. A leading `0` means "first dimension
        /// unspecified" (`int a[][4]`).
        pub dims: Vec<usize>,
    }

    #[derive(Debug, Default)]
    pub struct Block {
        pub items: Vec<BlockItem>,
    }

    #[derive(Debug)]
    pub enum BlockItem {
        Decl(Decl),
        Stmt(Stmt),
    }

    #[derive(Debug)]
    pub struct Decl {
        pub name: Id,
        pub span: Span,
        pub dims: Vec<usize>,
        pub init: Option<DeclInit>,
    }

    #[derive(Debug)]
    pub enum DeclInit {
        Scalar(Expr),
        Array(Vec<i32>),
    }

    #[derive(Debug)]
    pub enum Stmt {
        Expr(Expr),
        Block(Block),
        If { cond: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>> },
        While { cond: Expr, body: Box<Stmt> },
        DoWhile { body: Box<Stmt>, cond: Expr },
        For {
            init: Option<Box<ForInit>>,
            cond: Option<Expr>,
            update: Option<Expr>,
            body: Box<Stmt>,
        },
        Break(Span),
        Continue(Span),
        Return(Span, Option<Expr>),
        Empty,
    }

    #[derive(Debug)]
    pub enum ForInit {
        Decl(Decl),
        Expr(Expr),
    }

    #[derive(Debug)]
    pub enum Expr {
        Int(i32),
        Ident(Id, Span),
        Index { base: Box<Expr>, index: Box<Expr>, span: Span },
        Unary { op: UnaryOp, expr: Box<Expr> },
        Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
        Assign { lhs: Box<Expr>, rhs: Box<Expr>, span: Span },
        Call { name: Id, args: Vec<Expr>, span: Span },
        Cond { cond: Box<Expr>, then_expr: Box<Expr>, else_expr: Box<Expr> },
    }
}

#[derive(Display)]
#[display("{span}: parse error: {message}")]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl Debug for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::error::Error for ParseError {}

pub fn parse(input: &str) -> Result<raw::Program, ParseError> {
    let tokens = Lexer::new(input).tokenize().map_err(|e| ParseError {
        span: e.span,
        message: format!("{e}"),
    })?;
    Parser { tokens, pos: 0 }.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    fn peek(&self) -> Token {
        self.tokens[self.pos]
    }

    fn kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err<T>(&self, message: impl Into<String>) -> PResult<T> {
        Err(ParseError { span: self.peek().span, message: message.into() })
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.kind() == kind {
            Ok(self.bump())
        } else {
            self.err(format!("expected {kind}, found {}", self.peek()))
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.kind() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> PResult<(Id, Span)> {
        let tok = self.expect(TokenKind::Ident)?;
        Ok((tok.ident.unwrap(), tok.span))
    }

    fn expect_int(&mut self) -> PResult<i32> {
        let tok = self.expect(TokenKind::Int)?;
        Ok(tok.int.unwrap())
    }

    // program := (global_decl | function)*
    fn parse_program(&mut self) -> PResult<raw::Program> {
        let mut globals = Vec::new();
        let mut functions = Vec::new();
        while self.kind() != TokenKind::Eof {
            self.expect(TokenKind::KwInt)?;
            let (name, span) = self.expect_ident()?;
            if self.kind() == TokenKind::LParen {
                functions.push(self.parse_function_rest(name, span)?);
            } else {
                globals.push(self.parse_global_rest(name, span)?);
            }
        }
        Ok(raw::Program { globals, functions })
    }

    fn parse_dims(&mut self) -> PResult<Vec<usize>> {
        let mut dims = Vec::new();
        while self.eat(TokenKind::LBracket) {
            if self.eat(TokenKind::RBracket) {
                dims.push(0);
            } else {
                let n = self.expect_int()?;
                self.expect(TokenKind::RBracket)?;
                dims.push(n.max(0) as usize);
            }
        }
        Ok(dims)
    }

    fn parse_int_const(&mut self) -> PResult<i32> {
        if self.eat(TokenKind::Minus) {
            Ok(-self.expect_int()?)
        } else {
            self.expect_int()
        }
    }

    // Global declaration tail, after `int NAME` has been consumed.
    fn parse_global_rest(&mut self, name: Id, span: Span) -> PResult<raw::Global> {
        let dims = self.parse_dims()?;
        let init = if self.eat(TokenKind::Assign) {
            if dims.is_empty() {
                raw::GlobalInit::Scalar(self.parse_int_const()?)
            } else {
                raw::GlobalInit::Array(self.parse_int_list()?)
            }
        } else {
            raw::GlobalInit::None
        };
        self.expect(TokenKind::Semi)?;
        Ok(raw::Global { name, span, dims, init })
    }

    fn parse_int_list(&mut self) -> PResult<Vec<i32>> {
        self.expect(TokenKind::LBrace)?;
        let mut values = Vec::new();
        if self.kind() != TokenKind::RBrace {
            values.push(self.parse_int_const()?);
            while self.eat(TokenKind::Comma) {
                values.push(self.parse_int_const()?);
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(values)
    }

    // Function declaration/definition tail, after `int NAME` has been
    // consumed and the next token is known to be `(`.
    fn parse_function_rest(&mut self, name: Id, span: Span) -> PResult<raw::Function> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.kind() != TokenKind::RParen {
            params.push(self.parse_param()?);
            while self.eat(TokenKind::Comma) {
                params.push(self.parse_param()?);
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = if self.eat(TokenKind::Semi) {
            None
        } else {
            Some(self.parse_block()?)
        };
        Ok(raw::Function { name, span, params, body })
    }

    fn parse_param(&mut self) -> PResult<raw::Param> {
        self.expect(TokenKind::KwInt)?;
        let (name, _) = self.expect_ident()?;
        let dims = self.parse_dims()?;
        Ok(raw::Param { name, dims })
    }

    fn parse_block(&mut self) -> PResult<raw::Block> {
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        while self.kind() != TokenKind::RBrace {
            items.push(self.parse_block_item()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(raw::Block { items })
    }

    fn parse_block_item(&mut self) -> PResult<raw::BlockItem> {
        if self.kind() == TokenKind::KwInt {
            Ok(raw::BlockItem::Decl(self.parse_decl()?))
        } else {
            Ok(raw::BlockItem::Stmt(self.parse_stmt()?))
        }
    }

    // Assumes the current token is `int`.
    fn parse_decl(&mut self) -> PResult<raw::Decl> {
        self.expect(TokenKind::KwInt)?;
        let (name, span) = self.expect_ident()?;
        let dims = self.parse_dims()?;
        let init = if self.eat(TokenKind::Assign) {
            if dims.is_empty() {
                Some(raw::DeclInit::Scalar(self.parse_expr()?))
            } else {
                Some(raw::DeclInit::Array(self.parse_int_list()?))
            }
        } else {
            None
        };
        self.expect(TokenKind::Semi)?;
        Ok(raw::Decl { name, span, dims, init })
    }

    fn parse_stmt(&mut self) -> PResult<raw::Stmt> {
        match self.kind() {
            TokenKind::LBrace => Ok(raw::Stmt::Block(self.parse_block()?)),
            TokenKind::Semi => {
                self.bump();
                Ok(raw::Stmt::Empty)
            }
            TokenKind::KwIf => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let then_branch = Box::new(self.parse_stmt()?);
                let else_branch = if self.eat(TokenKind::KwElse) {
                    Some(Box::new(self.parse_stmt()?))
                } else {
                    None
                };
                Ok(raw::Stmt::If { cond, then_branch, else_branch })
            }
            TokenKind::KwWhile => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(raw::Stmt::While { cond, body })
            }
            TokenKind::KwDo => {
                self.bump();
                let body = Box::new(self.parse_stmt()?);
                self.expect(TokenKind::KwWhile)?;
                self.expect(TokenKind::LParen)?;
                let cond = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Semi)?;
                Ok(raw::Stmt::DoWhile { body, cond })
            }
            TokenKind::KwFor => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let init = if self.kind() == TokenKind::Semi {
                    None
                } else if self.kind() == TokenKind::KwInt {
                    Some(Box::new(raw::ForInit::Decl(self.parse_decl()?)))
                } else {
                    let e = self.parse_expr()?;
                    self.expect(TokenKind::Semi)?;
                    Some(Box::new(raw::ForInit::Expr(e)))
                };
                if init.is_none() {
                    self.expect(TokenKind::Semi)?;
                }
                let cond = if self.kind() == TokenKind::Semi { None } else { Some(self.parse_expr()?) };
                self.expect(TokenKind::Semi)?;
                let update = if self.kind() == TokenKind::RParen { None } else { Some(self.parse_expr()?) };
                self.expect(TokenKind::RParen)?;
                let body = Box::new(self.parse_stmt()?);
                Ok(raw::Stmt::For { init, cond, update, body })
            }
            TokenKind::KwBreak => {
                let span = self.bump().span;
                self.expect(TokenKind::Semi)?;
                Ok(raw::Stmt::Break(span))
            }
            TokenKind::KwContinue => {
                let span = self.bump().span;
                self.expect(TokenKind::Semi)?;
                Ok(raw::Stmt::Continue(span))
            }
            TokenKind::KwReturn => {
                let span = self.bump().span;
                let value = if self.kind() == TokenKind::Semi { None } else { Some(self.parse_expr()?) };
                self.expect(TokenKind::Semi)?;
                Ok(raw::Stmt::Return(span, value))
            }
            _ => {
                let e = self.parse_expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(raw::Stmt::Expr(e))
            }
        }
    }

    // expr := assignment
    fn parse_expr(&mut self) -> PResult<raw::Expr> {
        self.parse_assignment()
    }

    // assignment := conditional ("=" assignment)?   (right-associative)
    fn parse_assignment(&mut self) -> PResult<raw::Expr> {
        let lhs = self.parse_conditional()?;
        if self.kind() == TokenKind::Assign {
            let span = self.bump().span;
            let rhs = self.parse_assignment()?;
            Ok(raw::Expr::Assign { lhs: Box::new(lhs), rhs: Box::new(rhs), span })
        } else {
            Ok(lhs)
        }
    }

    // conditional := logic_or ("?" expr ":" conditional)?
    fn parse_conditional(&mut self) -> PResult<raw::Expr> {
        let cond = self.parse_logic_or()?;
        if self.eat(TokenKind::Question) {
            let then_expr = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let else_expr = self.parse_conditional()?;
            Ok(raw::Expr::Cond {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            })
        } else {
            Ok(cond)
        }
    }

    fn parse_logic_or(&mut self) -> PResult<raw::Expr> {
        let mut lhs = self.parse_logic_and()?;
        while self.eat(TokenKind::OrOr) {
            let rhs = self.parse_logic_and()?;
            lhs = raw::Expr::Binary { op: BinaryOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_logic_and(&mut self) -> PResult<raw::Expr> {
        let mut lhs = self.parse_equality()?;
        while self.eat(TokenKind::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = raw::Expr::Binary { op: BinaryOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<raw::Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.kind() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::Ne => BinaryOp::Ne,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = raw::Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<raw::Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.kind() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Ge => BinaryOp::Ge,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = raw::Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<raw::Expr> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.kind() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_term()?;
            lhs = raw::Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> PResult<raw::Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.kind() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = raw::Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<raw::Expr> {
        let op = match self.kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::LogicNot),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let expr = Box::new(self.parse_unary()?);
            Ok(raw::Expr::Unary { op, expr })
        } else {
            self.parse_postfix()
        }
    }

    fn parse_postfix(&mut self) -> PResult<raw::Expr> {
        let mut expr = self.parse_primary()?;
        while self.kind() == TokenKind::LBracket {
            let span = self.bump().span;
            let index = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            expr = raw::Expr::Index { base: Box::new(expr), index: Box::new(index), span };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<raw::Expr> {
        match self.kind() {
            TokenKind::Int => Ok(raw::Expr::Int(self.bump().int.unwrap())),
            TokenKind::LParen => {
                self.bump();
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            TokenKind::Ident => {
                let (name, span) = self.expect_ident()?;
                if self.eat(TokenKind::LParen) {
                    let mut args = Vec::new();
                    if self.kind() != TokenKind::RParen {
                        args.push(self.parse_expr()?);
                        while self.eat(TokenKind::Comma) {
                            args.push(self.parse_expr()?);
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    Ok(raw::Expr::Call { name, args, span })
                } else {
                    Ok(raw::Expr::Ident(name, span))
                }
            }
            _ => self.err(format!("expected an expression, found {}", self.peek())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_main_returning_literal() {
        let prog = parse("int main() { return 0; }").unwrap();
        assert_eq!(prog.functions.len(), 1);
        assert_eq!(*prog.functions[0].name, "main");
    }

    #[test]
    fn parses_global_array_with_initializer() {
        let prog = parse("int a[2][3] = {1,2,3,4,5,6}; int main() { return 0; }").unwrap();
        assert_eq!(prog.globals[0].dims, vec![2, 3]);
        match &prog.globals[0].init {
            raw::GlobalInit::Array(vals) => assert_eq!(vals.len(), 6),
            _ => panic!("expected array initializer"),
        }
    }

    #[test]
    fn parses_nested_index_expression() {
        let prog = parse("int main() { int a[2][3]; return a[1][2]; }").unwrap();
        let body = prog.functions[0].body.as_ref().unwrap();
        match &body.items[1] {
            raw::BlockItem::Stmt(raw::Stmt::Return(_, Some(raw::Expr::Index { .. }))) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn ternary_is_right_associative_with_assignment_lower() {
        let prog = parse("int main() { int x; x = 1 ? 2 : 3; return x; }").unwrap();
        assert!(prog.functions[0].body.is_some());
    }

    #[test]
    fn reports_error_on_missing_semicolon() {
        assert!(parse("int main() { return 0 }").is_err());
    }
}
