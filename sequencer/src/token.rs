//! FILENAME: sequencer/src/token.rs
//! PURPOSE: Token definitions for the pattern lexer.
//! CONTEXT: Tokens are the atomic units produced by the lexer and consumed
//! by the parser. Unlike a formula language, whitespace is significant in a
//! pattern, so there is no whitespace skipping and a space is an ordinary
//! `Literal` token.

/// Tokens recognized by the pattern lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    /// A plain character with no special meaning at the current position.
    Literal(char),
    /// A backslash-escaped character. Escaped characters never act as
    /// operators, which is how `\-` stays a dash inside a value set.
    Escaped(char),

    // Delimiters
    LBracket,
    RBracket,
    LParen,
    RParen,

    // Operators
    Pipe,
    Question,
    /// A complete `{n}` repeat marker, count already parsed.
    Repeat(u64),

    // Special
    EOF,
    Illegal(char),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Literal(c) => write!(f, "{}", c),
            Token::Escaped(c) => write!(f, "\\{}", c),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Pipe => write!(f, "|"),
            Token::Question => write!(f, "?"),
            Token::Repeat(n) => write!(f, "{{{}}}", n),
            Token::EOF => write!(f, "EOF"),
            Token::Illegal(c) => write!(f, "ILLEGAL({})", c),
        }
    }
}
