//! The lexer.

use derive_more::Display;
use regex::Regex;

use crate::common::{Id, Span};

/// Token classes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Display)]
pub enum TokenKind {
    #[display("identifier")]
    Ident,
    #[display("integer literal")]
    Int,
    #[display("'int'")]
    KwInt,
    #[display("'if'")]
    KwIf,
    #[display("'else'")]
    KwElse,
    #[display("'while'")]
    KwWhile,
    #[display("'do'")]
    KwDo,
    #[display("'for'")]
    KwFor,
    #[display("'break'")]
    KwBreak,
    #[display("'continue'")]
    KwContinue,
    #[display("'return'")]
    KwReturn,
    #[display("'('")]
    LParen,
    #[display("')'")]
    RParen,
    #[display("'{{'")]
    LBrace,
    #[display("'}}'")]
    RBrace,
    #[display("'['")]
    LBracket,
    #[display("']'")]
    RBracket,
    #[display("';'")]
    Semi,
    #[display("','")]
    Comma,
    #[display("'?'")]
    Question,
    #[display("':'")]
    Colon,
    #[display("'='")]
    Assign,
    #[display("'+'")]
    Plus,
    #[display("'-'")]
    Minus,
    #[display("'*'")]
    Star,
    #[display("'/'")]
    Slash,
    #[display("'%'")]
    Percent,
    #[display("'=='")]
    EqEq,
    #[display("'!='")]
    Ne,
    #[display("'<'")]
    Lt,
    #[display("'>'")]
    Gt,
    #[display("'<='")]
    Le,
    #[display("'>='")]
    Ge,
    #[display("'&&'")]
    AndAnd,
    #[display("'||'")]
    OrOr,
    #[display("'!'")]
    Bang,
    #[display("'~'")]
    Tilde,
    #[display("end of input")]
    Eof,
}

/// A single lexed token: its class, its span, and — for `Ident`/`Int` — the
/// payload the parser needs.
#[derive(Clone, Copy, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub ident: Option<Id>,
    pub int: Option<i32>,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.ident, self.int) {
            (Some(id), _) => write!(f, "identifier '{id}'"),
            (_, Some(n)) => write!(f, "integer literal '{n}'"),
            _ => write!(f, "{}", self.kind),
        }
    }
}

#[derive(Debug)]
pub struct LexError {
    pub span: Span,
    pub ch: char,
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: unexpected character {:?}", self.span, self.ch)
    }
}

impl std::error::Error for LexError {}

/// Keywords, checked after the identifier regex matches (so `iffy` lexes as
/// one `Ident`, not `KwIf` followed by `Ident("fy")`).
const KEYWORDS: &[(&str, TokenKind)] = &[
    ("int", TokenKind::KwInt),
    ("if", TokenKind::KwIf),
    ("else", TokenKind::KwElse),
    ("while", TokenKind::KwWhile),
    ("do", TokenKind::KwDo),
    ("for", TokenKind::KwFor),
    ("break", TokenKind::KwBreak),
    ("continue", TokenKind::KwContinue),
    ("return", TokenKind::KwReturn),
];

/// Fixed punctuation/operator tokens, tried longest-first so `<=` isn't
/// lexed as `<` followed by `=`.
const SYMBOLS: &[(&str, TokenKind)] = &[
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::Ne),
    ("<=", TokenKind::Le),
    (">=", TokenKind::Ge),
    ("&&", TokenKind::AndAnd),
    ("||", TokenKind::OrOr),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    (";", TokenKind::Semi),
    (",", TokenKind::Comma),
    ("?", TokenKind::Question),
    (":", TokenKind::Colon),
    ("=", TokenKind::Assign),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
    ("!", TokenKind::Bang),
    ("~", TokenKind::Tilde),
];

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    line: u32,
    col: u32,
    whitespace: Regex,
    ident: Regex,
    int: Regex,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Lexer {
            input,
            pos: 0,
            line: 1,
            col: 1,
            whitespace: Regex::new(r"\A(?:[ \t\r\n]|//[^\n]*)*").unwrap(),
            ident: Regex::new(r"\A[A-Za-z_][A-Za-z0-9_]*").unwrap(),
            int: Regex::new(r"\A(?:0[xX][0-9a-fA-F]+|[0-9]+)").unwrap(),
        }
    }

    pub fn end_of_input(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn advance(&mut self, n: usize) {
        for ch in self.input[self.pos..self.pos + n].chars() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos += n;
    }

    fn skip_whitespace(&mut self) {
        if let Some(m) = self.whitespace.find(&self.input[self.pos..]) {
            self.advance(m.end());
        }
    }

    /// Get the next token, or `None` at end of input.
    pub fn next(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();
        if self.end_of_input() {
            return Ok(None);
        }
        let span = Span::new(self.line, self.col);
        let rest = &self.input[self.pos..];

        if let Some(m) = self.int.find(rest) {
            let text = m.as_str();
            let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16).unwrap_or(0) as i32
            } else {
                text.parse::<i64>().unwrap_or(0) as i32
            };
            self.advance(m.end());
            return Ok(Some(Token { kind: TokenKind::Int, span, ident: None, int: Some(value) }));
        }

        if let Some(m) = self.ident.find(rest) {
            let text = m.as_str();
            self.advance(m.end());
            if let Some(&(_, kind)) = KEYWORDS.iter().find(|&&(kw, _)| kw == text) {
                return Ok(Some(Token { kind, span, ident: None, int: None }));
            }
            return Ok(Some(Token {
                kind: TokenKind::Ident,
                span,
                ident: Some(internment::Intern::new(text.to_string())),
                int: None,
            }));
        }

        for &(sym, kind) in SYMBOLS {
            if rest.starts_with(sym) {
                self.advance(sym.len());
                return Ok(Some(Token { kind, span, ident: None, int: None }));
            }
        }

        let ch = rest.chars().next().unwrap();
        Err(LexError { span, ch })
    }

    /// Tokenize the entire input, appending a trailing `Eof` token so the
    /// parser never has to special-case running off the end of the vector.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next()? {
            tokens.push(tok);
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(self.line, self.col),
            ident: None,
            int: None,
        });
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).tokenize().unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_vs_identifiers() {
        assert_eq!(kinds("if iffy"), vec![TokenKind::KwIf, TokenKind::Ident, TokenKind::Eof]);
    }

    #[test]
    fn longest_match_operators() {
        assert_eq!(
            kinds("a <= b"),
            vec![TokenKind::Ident, TokenKind::Le, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn comments_and_whitespace_skipped() {
        assert_eq!(
            kinds("1 // a comment\n + 2"),
            vec![TokenKind::Int, TokenKind::Plus, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn hex_literal() {
        let toks = Lexer::new("0x2A").tokenize().unwrap();
        assert_eq!(toks[0].int, Some(42));
    }

    #[test]
    fn unexpected_character_errors() {
        assert!(Lexer::new("@").tokenize().is_err());
    }
}
