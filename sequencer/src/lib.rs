//! FILENAME: sequencer/src/lib.rs
//! PURPOSE: Library root for the pattern-driven value generator.
//! CONTEXT: This module exposes the lexer, parser, AST and generators
//! needed to turn a pattern string into the finite sequence of strings it
//! denotes, plus a RowStream adapter so patterns plug into the pipeline
//! like any other source.
//!
//! PIPELINE: Pattern String --> Lexer --> Tokens --> Parser --> Pattern
//!           --> Enumerator / random_value --> SequenceStream
//!
//! SUPPORTED SYNTAX:
//! - Concatenation: ab
//! - Alternation: a|b
//! - Optional: p? (makes the whole preceding sequence optional)
//! - Value sets: [abc], ranges [a-z0-9]
//! - Grouping: (ab|cd)e
//! - Exact repeats: [ab]{4}
//! - Escapes: \[ \] \( \) \| \? \{ \} \\ and \t \n \r

pub mod ast;
pub mod generator;
pub mod lexer;
pub mod parser;
pub mod stream;
pub mod token;

// Register the separate tests module
#[cfg(test)]
mod tests;

// Re-export commonly used types for convenience
pub use ast::Pattern;
pub use generator::{random_value, Enumerator};
pub use lexer::Lexer;
pub use parser::{parse, Parser, PatternError, PatternResult};
pub use stream::SequenceStream;
pub use token::Token;
