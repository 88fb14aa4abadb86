//! FILENAME: sequencer/src/parser.rs
//! PURPOSE: Recursive descent parser that converts a stream of Tokens into
//! a Pattern tree.
//! CONTEXT: Second stage of the pattern pipeline. The one rule that differs
//! from ordinary regular-expression habits: `?` makes the ENTIRE preceding
//! sequence at the current nesting level optional, not just the last atom,
//! so `ab?` denotes {"ab", ""} and `ab?c` denotes {"abc", "c"}. `{n}` binds
//! tighter and repeats only the preceding atom.
//!
//! GRAMMAR:
//!   pattern     --> alternation
//!   alternation --> sequence ( "|" sequence )*
//!   sequence    --> ( term | "?" )*      // "?" folds the sequence so far
//!   term        --> atom ( REPEAT )*
//!   atom        --> LITERAL | ESCAPED | class | "(" pattern ")"
//!   class       --> "[" class_item+ "]"
//!   class_item  --> char | char "-" char

use thiserror::Error;

use crate::ast::Pattern;
use crate::lexer::Lexer;
use crate::token::Token;

/// Pattern syntax errors with descriptive messages.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatternError {
    #[error("unexpected end of pattern")]
    UnexpectedEnd,

    #[error("unexpected '{0}'")]
    UnexpectedToken(String),

    #[error("nothing precedes '{0}'")]
    DanglingOperator(char),

    #[error("empty value set")]
    EmptyClass,

    #[error("invalid range: '{start}' does not precede '{end}'")]
    InvalidRange { start: char, end: char },
}

pub type PatternResult<T> = Result<T, PatternError>;

/// Parses a complete pattern string.
pub fn parse(input: &str) -> PatternResult<Pattern> {
    Parser::new(input).parse()
}

/// The Parser struct holds the lexer and current token state.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    /// Creates a new parser from an input string.
    /// Automatically advances to the first token.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser { lexer, current_token }
    }

    /// Parses the entire input and returns the pattern tree. The empty
    /// input is a valid pattern denoting exactly the empty string.
    pub fn parse(&mut self) -> PatternResult<Pattern> {
        let pattern = self.parse_alternation()?;
        if self.current_token != Token::EOF {
            return Err(PatternError::UnexpectedToken(
                self.current_token.to_string(),
            ));
        }
        Ok(pattern)
    }

    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    fn parse_alternation(&mut self) -> PatternResult<Pattern> {
        let mut branches = vec![self.parse_sequence()?];
        while self.current_token == Token::Pipe {
            self.advance();
            branches.push(self.parse_sequence()?);
        }
        if branches.len() == 1 {
            Ok(branches.pop().unwrap_or(Pattern::Empty))
        } else {
            Ok(Pattern::Alternation(branches))
        }
    }

    fn parse_sequence(&mut self) -> PatternResult<Pattern> {
        let mut parts: Vec<Pattern> = Vec::new();
        loop {
            match &self.current_token {
                Token::Question => {
                    if parts.is_empty() {
                        return Err(PatternError::DanglingOperator('?'));
                    }
                    self.advance();
                    // Fold everything seen so far into one optional group.
                    let preceding = concat(std::mem::take(&mut parts));
                    parts.push(Pattern::Optional(Box::new(preceding)));
                }
                Token::EOF | Token::Pipe | Token::RParen => break,
                _ => parts.push(self.parse_term()?),
            }
        }
        Ok(concat(parts))
    }

    fn parse_term(&mut self) -> PatternResult<Pattern> {
        let mut term = self.parse_atom()?;
        while let Token::Repeat(count) = self.current_token {
            self.advance();
            term = Pattern::Repeat { pattern: Box::new(term), count };
        }
        Ok(term)
    }

    fn parse_atom(&mut self) -> PatternResult<Pattern> {
        match self.current_token.clone() {
            Token::Literal(c) | Token::Escaped(c) => {
                self.advance();
                Ok(Pattern::Literal(c))
            }
            Token::LBracket => {
                self.advance();
                self.parse_class()
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_alternation()?;
                if self.current_token != Token::RParen {
                    return Err(match self.current_token {
                        Token::EOF => PatternError::UnexpectedEnd,
                        ref t => PatternError::UnexpectedToken(t.to_string()),
                    });
                }
                self.advance();
                Ok(inner)
            }
            Token::Repeat(_) => Err(PatternError::DanglingOperator('{')),
            Token::EOF => Err(PatternError::UnexpectedEnd),
            token => Err(PatternError::UnexpectedToken(token.to_string())),
        }
    }

    /// Parses the members of a `[...]` value set. The opening bracket is
    /// already consumed. A plain `-` between two members forms an inclusive
    /// range; an escaped `\-`, or a dash first or last, stays literal.
    fn parse_class(&mut self) -> PatternResult<Pattern> {
        // Collect raw members first; range folding needs one token of
        // lookahead past each dash.
        let mut raw: Vec<(char, bool)> = Vec::new();
        loop {
            match self.current_token {
                Token::RBracket => {
                    self.advance();
                    break;
                }
                Token::EOF => return Err(PatternError::UnexpectedEnd),
                Token::Literal(c) => {
                    raw.push((c, false));
                    self.advance();
                }
                Token::Escaped(c) => {
                    raw.push((c, true));
                    self.advance();
                }
                // Operators lose their meaning inside a set.
                Token::LParen => {
                    raw.push(('(', false));
                    self.advance();
                }
                Token::RParen => {
                    raw.push((')', false));
                    self.advance();
                }
                Token::Pipe => {
                    raw.push(('|', false));
                    self.advance();
                }
                Token::Question => {
                    raw.push(('?', false));
                    self.advance();
                }
                Token::LBracket => {
                    raw.push(('[', false));
                    self.advance();
                }
                ref token => {
                    return Err(PatternError::UnexpectedToken(token.to_string()))
                }
            }
        }

        let mut members: Vec<char> = Vec::new();
        let mut i = 0;
        while i < raw.len() {
            let is_range = i + 2 < raw.len() && raw[i + 1] == ('-', false);
            if is_range {
                let (start, end) = (raw[i].0, raw[i + 2].0);
                if start > end {
                    return Err(PatternError::InvalidRange { start, end });
                }
                for c in start..=end {
                    push_unique(&mut members, c);
                }
                i += 3;
            } else {
                push_unique(&mut members, raw[i].0);
                i += 1;
            }
        }

        if members.is_empty() {
            return Err(PatternError::EmptyClass);
        }
        Ok(Pattern::Class(members))
    }
}

fn concat(mut parts: Vec<Pattern>) -> Pattern {
    match parts.len() {
        0 => Pattern::Empty,
        1 => parts.pop().unwrap_or(Pattern::Empty),
        _ => Pattern::Concat(parts),
    }
}

fn push_unique(members: &mut Vec<char>, c: char) {
    if !members.contains(&c) {
        members.push(c);
    }
}
