use log::{debug, info};
use phf::phf_map;

use crate::error::LoxError;
use crate::token::{Literal, Token, TokenType};

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::AND,
    "break" => TokenType::BREAK,
    "class" => TokenType::CLASS,
    "else" => TokenType::ELSE,
    "false" => TokenType::FALSE,
    "fun" => TokenType::FUN,
    "for" => TokenType::FOR,
    "if" => TokenType::IF,
    "nil" => TokenType::NIL,
    "or" => TokenType::OR,
    "print" => TokenType::PRINT,
    "return" => TokenType::RETURN,
    "super" => TokenType::SUPER,
    "this" => TokenType::THIS,
    "true" => TokenType::TRUE,
    "var" => TokenType::VAR,
    "while" => TokenType::WHILE,
};

/// Single forward pass over the source bytes.  Produces the full token
/// sequence (always terminated by an `EOF` token) together with every
/// lexical error encountered; scanning continues past errors.
pub struct Scanner<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    errors: Vec<LoxError>,
    start: usize,
    curr_ptr: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        info!("Initializing Scanner with {} bytes", source.len());

        Self {
            source,
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            curr_ptr: 0,
            line: 1,
        }
    }

    pub fn scan_tokens(mut self) -> (Vec<Token>, Vec<LoxError>) {
        while !self.is_at_end() {
            self.start = self.curr_ptr;
            self.scan_token();
        }

        self.tokens
            .push(Token::new(TokenType::EOF, String::new(), None, self.line));

        info!(
            "Scanned {} token(s) with {} error(s)",
            self.tokens.len(),
            self.errors.len()
        );

        (self.tokens, self.errors)
    }

    fn scan_token(&mut self) {
        let byte: u8 = self.advance();

        match byte {
            b'(' => self.add_token(TokenType::LEFT_PAREN),

            b')' => self.add_token(TokenType::RIGHT_PAREN),

            b'{' => self.add_token(TokenType::LEFT_BRACE),

            b'}' => self.add_token(TokenType::RIGHT_BRACE),

            b',' => self.add_token(TokenType::COMMA),

            b'.' => self.add_token(TokenType::DOT),

            b'-' => self.add_token(TokenType::MINUS),

            b'+' => self.add_token(TokenType::PLUS),

            b';' => self.add_token(TokenType::SEMICOLON),

            b'*' => self.add_token(TokenType::STAR),

            b'?' => self.add_token(TokenType::QUESTION),

            b':' => self.add_token(TokenType::COLON),

            b'!' => {
                let token_type: TokenType = if self.match_byte(b'=') {
                    TokenType::BANG_EQUAL
                } else {
                    TokenType::BANG
                };
                self.add_token(token_type);
            }

            b'=' => {
                let token_type: TokenType = if self.match_byte(b'=') {
                    TokenType::EQUAL_EQUAL
                } else {
                    TokenType::EQUAL
                };
                self.add_token(token_type);
            }

            b'<' => {
                let token_type: TokenType = if self.match_byte(b'=') {
                    TokenType::LESS_EQUAL
                } else {
                    TokenType::LESS
                };
                self.add_token(token_type);
            }

            b'>' => {
                let token_type: TokenType = if self.match_byte(b'=') {
                    TokenType::GREATER_EQUAL
                } else {
                    TokenType::GREATER
                };
                self.add_token(token_type);
            }

            b' ' | b'\r' | b'\t' => {}

            b'\n' => {
                self.line += 1;
            }

            b'/' => {
                if self.match_byte(b'/') {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.match_byte(b'*') {
                    self.parse_block_comment();
                } else {
                    self.add_token(TokenType::SLASH);
                }
            }

            b'"' => {
                self.parse_string();
            }

            b'0'..=b'9' => {
                self.parse_number();
            }

            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                self.parse_identifier();
            }

            _ => {
                debug!(
                    "Unexpected character '{}' at line {}",
                    byte as char, self.line
                );

                self.errors.push(LoxError::syntax(
                    self.line,
                    format!("unexpected character '{}'", byte as char),
                ));
            }
        }
    }

    // Block comments nest; the scanner tracks the depth rather than
    // recursing.  Hitting EOF inside one simply ends the scan.
    fn parse_block_comment(&mut self) {
        let mut depth: usize = 1;

        while depth > 0 && !self.is_at_end() {
            if self.peek() == b'/' && self.peek_next() == b'*' {
                self.advance();
                self.advance();

                depth += 1;
            } else if self.peek() == b'*' && self.peek_next() == b'/' {
                self.advance();
                self.advance();

                depth -= 1;
            } else {
                if self.peek() == b'\n' {
                    self.line += 1;
                }

                self.advance();
            }
        }
    }

    fn parse_string(&mut self) {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            debug!("Unterminated string at line {}", self.line);

            self.errors
                .push(LoxError::syntax(self.line, "unterminated string"));

            return;
        }

        // Consume the closing quote.
        self.advance();

        let value: String = self.source[self.start + 1..self.curr_ptr - 1].to_string();

        self.add_literal_token(TokenType::STRING, Literal::Str(value));
    }

    fn parse_number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let number: f64 = self.source[self.start..self.curr_ptr]
            .parse()
            .unwrap_or(0.0);

        self.add_literal_token(TokenType::NUMBER, Literal::Number(number));
    }

    fn parse_identifier(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }

        let text: &str = &self.source[self.start..self.curr_ptr];

        match KEYWORDS.get(text) {
            Some(token_type) => self.add_token(*token_type),

            None => self.add_token(TokenType::IDENTIFIER),
        }
    }

    #[inline]
    fn add_token(&mut self, token_type: TokenType) {
        let lexeme: String = self.source[self.start..self.curr_ptr].to_string();

        self.tokens
            .push(Token::new(token_type, lexeme, None, self.line));
    }

    #[inline]
    fn add_literal_token(&mut self, token_type: TokenType, literal: Literal) {
        let lexeme: String = self.source[self.start..self.curr_ptr].to_string();

        self.tokens
            .push(Token::new(token_type, lexeme, Some(literal), self.line));
    }

    #[inline]
    fn advance(&mut self) -> u8 {
        let byte: u8 = self.source.as_bytes()[self.curr_ptr];

        self.curr_ptr += 1;

        byte
    }

    #[inline]
    fn match_byte(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source.as_bytes()[self.curr_ptr] != expected {
            false
        } else {
            self.curr_ptr += 1;

            true
        }
    }

    #[inline]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source.as_bytes()[self.curr_ptr]
        }
    }

    #[inline]
    fn peek_next(&self) -> u8 {
        if self.curr_ptr + 1 >= self.source.len() {
            0
        } else {
            self.source.as_bytes()[self.curr_ptr + 1]
        }
    }

    #[inline]
    fn is_at_end(&self) -> bool {
        self.curr_ptr >= self.source.len()
    }
}
