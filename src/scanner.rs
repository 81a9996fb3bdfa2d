// ABOUTME: Source text to token stream conversion; fixes the token contract the parser consumes

use crate::error::Diagnostics;
use crate::token::{keyword_kind, Token, TokenKind};

/// Single forward pass over the source string. Byte-oriented (ASCII); never
/// aborts on a malformed lexeme, it records a diagnostic and keeps scanning.
pub struct Scanner<'a> {
    source: &'a [u8],
    start: usize,
    current: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Scanner {
            source: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn scan_tokens(mut self, diagnostics: &mut Diagnostics) -> Vec<Token> {
        let mut tokens = Vec::new();
        while !self.is_at_end() {
            self.start = self.current;
            if let Some(token) = self.scan_token(diagnostics) {
                tokens.push(token);
            }
        }
        tokens.push(Token::new(TokenKind::End, "", self.line));
        tokens
    }

    fn scan_token(&mut self, diagnostics: &mut Diagnostics) -> Option<Token> {
        let c = self.advance();
        match c {
            b'(' => self.make(TokenKind::LeftParen),
            b')' => self.make(TokenKind::RightParen),
            b'{' => self.make(TokenKind::LeftBrace),
            b'}' => self.make(TokenKind::RightBrace),
            b',' => self.make(TokenKind::Comma),
            b'.' => self.make(TokenKind::Dot),
            b';' => self.make(TokenKind::Semicolon),
            b':' => self.make(TokenKind::Colon),
            b'?' => self.make(TokenKind::Question),
            b'+' => {
                if self.match_char(b'+') {
                    self.make(TokenKind::PlusPlus)
                } else if self.match_char(b'=') {
                    self.make(TokenKind::PlusEqual)
                } else {
                    self.make(TokenKind::Plus)
                }
            }
            b'-' => {
                if self.match_char(b'-') {
                    self.make(TokenKind::MinusMinus)
                } else if self.match_char(b'=') {
                    self.make(TokenKind::MinusEqual)
                } else {
                    self.make(TokenKind::Minus)
                }
            }
            b'*' => {
                if self.match_char(b'=') {
                    self.make(TokenKind::StarEqual)
                } else {
                    self.make(TokenKind::Star)
                }
            }
            b'/' => {
                if self.match_char(b'/') {
                    while self.peek() != Some(b'\n') && !self.is_at_end() {
                        self.advance();
                    }
                    None
                } else if self.match_char(b'*') {
                    self.block_comment(diagnostics);
                    None
                } else if self.match_char(b'=') {
                    self.make(TokenKind::SlashEqual)
                } else {
                    self.make(TokenKind::Slash)
                }
            }
            b'!' => {
                let kind = if self.match_char(b'=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                };
                self.make(kind)
            }
            b'=' => {
                let kind = if self.match_char(b'=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                };
                self.make(kind)
            }
            b'<' => {
                let kind = if self.match_char(b'=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                };
                self.make(kind)
            }
            b'>' => {
                let kind = if self.match_char(b'=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                };
                self.make(kind)
            }
            b' ' | b'\t' | b'\r' => None,
            b'\n' => {
                self.line += 1;
                None
            }
            b'"' => self.string(diagnostics),
            b'0'..=b'9' => self.number(),
            c if c.is_ascii_alphabetic() => self.identifier(),
            other => {
                diagnostics.error(self.line, format!("Unexpected character '{}'.", other as char));
                None
            }
        }
    }

    fn block_comment(&mut self, diagnostics: &mut Diagnostics) {
        let opening_line = self.line;
        loop {
            if self.is_at_end() {
                diagnostics.error(opening_line, "Unterminated block comment.");
                return;
            }
            if self.peek() == Some(b'\n') {
                self.line += 1;
                self.advance();
                continue;
            }
            if self.peek() == Some(b'*') && self.peek_next() == Some(b'/') {
                self.advance();
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn string(&mut self, diagnostics: &mut Diagnostics) -> Option<Token> {
        let opening_line = self.line;
        while self.peek() != Some(b'"') {
            if self.is_at_end() {
                diagnostics.error(opening_line, "Unterminated string.");
                return Some(Token::new(TokenKind::String, "", opening_line));
            }
            if self.peek() == Some(b'\\') {
                self.advance();
                if self.is_at_end() {
                    diagnostics.error(opening_line, "Unterminated string.");
                    return Some(Token::new(TokenKind::String, "", opening_line));
                }
            }
            if self.peek() == Some(b'\n') {
                self.line += 1;
            }
            self.advance();
        }
        self.advance(); // closing quote
        let lexeme = &self.source[self.start + 1..self.current - 1];
        Some(Token::new(
            TokenKind::String,
            String::from_utf8_lossy(lexeme).into_owned(),
            opening_line,
        ))
    }

    fn number(&mut self) -> Option<Token> {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        if self.peek() == Some(b'.') && matches!(self.peek_next(), Some(b'0'..=b'9')) {
            self.advance();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.advance();
            }
        }
        self.make(TokenKind::Number)
    }

    fn identifier(&mut self) -> Option<Token> {
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric()) {
            self.advance();
        }
        let lexeme = self.lexeme_str();
        let kind = keyword_kind(&lexeme).unwrap_or(TokenKind::Identifier);
        Some(Token::new(kind, lexeme, self.line))
    }

    fn make(&self, kind: TokenKind) -> Option<Token> {
        Some(Token::new(kind, self.lexeme_str(), self.line))
    }

    fn lexeme_str(&self) -> String {
        String::from_utf8_lossy(&self.source[self.start..self.current]).into_owned()
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> Option<u8> {
        self.source.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.source.get(self.current + 1).copied()
    }

    fn match_char(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }
}

/// Re-scans `source` and returns the net depth of `(`/`{` over `)`/`}`,
/// used by the REPL's multi-line continuation detection (spec §6.1).
pub fn paren_brace_balance(source: &str) -> i64 {
    let mut diagnostics = Diagnostics::new();
    let tokens = Scanner::new(source).scan_tokens(&mut diagnostics);
    let mut balance: i64 = 0;
    for token in &tokens {
        match token.kind {
            TokenKind::LeftParen | TokenKind::LeftBrace => balance += 1,
            TokenKind::RightParen | TokenKind::RightBrace => balance -= 1,
            _ => {}
        }
    }
    balance
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut diagnostics = Diagnostics::new();
        Scanner::new(source)
            .scan_tokens(&mut diagnostics)
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn scans_punctuation_max_munch() {
        assert_eq!(
            kinds("!= = == < <= > >= ++ -- += -= *= /="),
            vec![
                TokenKind::BangEqual,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::PlusEqual,
                TokenKind::MinusEqual,
                TokenKind::StarEqual,
                TokenKind::SlashEqual,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            kinds("1 // a comment\n2"),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::End]
        );
    }

    #[test]
    fn skips_block_comments_without_nesting() {
        assert_eq!(
            kinds("1 /* a /* nested */ 2"),
            vec![
                TokenKind::Number,
                TokenKind::Number,
                TokenKind::End
            ]
        );
    }

    #[test]
    fn reports_unterminated_block_comment() {
        let mut diagnostics = Diagnostics::new();
        Scanner::new("/* never closes").scan_tokens(&mut diagnostics);
        assert!(diagnostics.had_error());
    }

    #[test]
    fn trailing_dot_with_no_digits_is_not_consumed() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("42.").scan_tokens(&mut diagnostics);
        assert_eq!(tokens[0].lexeme, "42");
        assert_eq!(tokens[1].kind, TokenKind::Dot);
    }

    #[test]
    fn leading_dot_number_not_consumed_as_number() {
        // Unlike the bare ".5" dialects, a leading dot with no preceding digit
        // is a DOT token followed by a NUMBER, matching the C-family grammar.
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(".5").scan_tokens(&mut diagnostics);
        assert_eq!(tokens[0].kind, TokenKind::Dot);
        assert_eq!(tokens[1].kind, TokenKind::Number);
    }

    #[test]
    fn unterminated_string_reports_error_with_empty_lexeme() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("\"abc").scan_tokens(&mut diagnostics);
        assert!(diagnostics.had_error());
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert!(tokens[0].lexeme.is_empty());
    }

    #[test]
    fn string_escape_is_not_interpreted() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("\"a\\nb\"").scan_tokens(&mut diagnostics);
        assert!(!diagnostics.had_error());
        assert_eq!(tokens[0].lexeme, "a\\nb");
    }

    #[test]
    fn keywords_and_identifiers() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("class fun orchard").scan_tokens(&mut diagnostics);
        assert_eq!(tokens[0].kind, TokenKind::Class);
        assert_eq!(tokens[1].kind, TokenKind::Fun);
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].lexeme, "orchard");
    }

    #[test]
    fn always_emits_trailing_end_token() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("").scan_tokens(&mut diagnostics);
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::End);
    }

    #[test]
    fn line_counting_across_newlines() {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new("1\n2\n3").scan_tokens(&mut diagnostics);
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].line, 3);
    }
}
