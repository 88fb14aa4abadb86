//! FILENAME: sequencer/src/lexer.rs
//! PURPOSE: Scans a raw pattern string and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the pattern pipeline. It handles
//! escape sequences and whole `{n}` repeat markers; everything else is a
//! single-character token. Every character that is not an operator is a
//! literal, including whitespace.
//!
//! RESERVED CHARACTERS: [ ] ( ) | ? { } \
//! ESCAPES: any reserved character, plus \t \n \r

use crate::token::Token;
use std::iter::Peekable;
use std::str::Chars;

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input: input.chars().peekable(),
        }
    }

    /// Advances the lexer and returns the next token.
    pub fn next_token(&mut self) -> Token {
        match self.input.next() {
            Some('[') => Token::LBracket,
            Some(']') => Token::RBracket,
            Some('(') => Token::LParen,
            Some(')') => Token::RParen,
            Some('|') => Token::Pipe,
            Some('?') => Token::Question,
            Some('{') => self.read_repeat(),
            // A bare closing brace has no opening partner to pair with.
            Some('}') => Token::Illegal('}'),
            Some('\\') => self.read_escape(),
            Some(ch) => Token::Literal(ch),
            None => Token::EOF,
        }
    }

    /// Reads the remainder of a `{n}` marker. The opening brace is already
    /// consumed. Anything but digits followed by a closing brace, or a
    /// count that does not fit in u64, is illegal.
    fn read_repeat(&mut self) -> Token {
        let mut digits = String::new();
        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.input.next();
            } else {
                break;
            }
        }
        if digits.is_empty() || self.input.next() != Some('}') {
            return Token::Illegal('{');
        }
        match digits.parse::<u64>() {
            Ok(count) => Token::Repeat(count),
            Err(_) => Token::Illegal('{'),
        }
    }

    fn read_escape(&mut self) -> Token {
        match self.input.next() {
            Some('t') => Token::Escaped('\t'),
            Some('n') => Token::Escaped('\n'),
            Some('r') => Token::Escaped('\r'),
            Some(ch) => Token::Escaped(ch),
            // A trailing backslash escapes nothing.
            None => Token::Illegal('\\'),
        }
    }
}
