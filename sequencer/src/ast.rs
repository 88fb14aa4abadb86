//! FILENAME: sequencer/src/ast.rs
//! PURPOSE: The combinator tree a parsed pattern becomes.
//! CONTEXT: Every node denotes a finite sequence of strings. The tree is
//! stateless; enumeration and sampling build their own cursors over it
//! (see generator.rs), so one parsed pattern serves any number of
//! concurrent consumers.

/// One node of a parsed pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Exactly one string: the empty one.
    Empty,
    /// Exactly one string: this character.
    Literal(char),
    /// One string per member, in written order. Ranges are already
    /// expanded and duplicate members collapsed by the parser.
    Class(Vec<char>),
    /// The cross product of its parts, in order.
    Concat(Vec<Pattern>),
    /// The union of its branches: every string of the first branch, then
    /// every string of the second, and so on.
    Alternation(Vec<Pattern>),
    /// Every string of the inner pattern, then the empty string.
    Optional(Box<Pattern>),
    /// The inner pattern concatenated with itself `count` times, each copy
    /// varying independently.
    Repeat { pattern: Box<Pattern>, count: u64 },
}

impl Pattern {
    /// The exact number of strings this pattern denotes, or `None` when the
    /// count does not fit in u64. Callers must treat `None` as "too many to
    /// materialize", not as an error; lazy enumeration still works.
    pub fn cardinality(&self) -> Option<u64> {
        match self {
            Pattern::Empty | Pattern::Literal(_) => Some(1),
            Pattern::Class(chars) => Some(chars.len() as u64),
            Pattern::Concat(parts) => parts
                .iter()
                .try_fold(1u64, |acc, p| acc.checked_mul(p.cardinality()?)),
            Pattern::Alternation(branches) => branches
                .iter()
                .try_fold(0u64, |acc, p| acc.checked_add(p.cardinality()?)),
            Pattern::Optional(inner) => inner.cardinality()?.checked_add(1),
            Pattern::Repeat { pattern, count } => {
                let base = pattern.cardinality()?;
                match (base, *count) {
                    (_, 0) => Some(1),
                    (0, _) => Some(0),
                    (1, _) => Some(1),
                    // base >= 2: any exponent beyond 63 overflows u64.
                    (_, count) => {
                        let exponent = u32::try_from(count).ok().filter(|&c| c <= 63)?;
                        base.checked_pow(exponent)
                    }
                }
            }
        }
    }
}
