//! FILENAME: sequencer/src/generator.rs
//! PURPOSE: Produces the strings a pattern denotes, exhaustively or at
//! random.
//! CONTEXT: Enumeration is an odometer over the pattern tree: the rightmost
//! position advances fastest and carries leftward, alternation branches run
//! in written order, and an optional group yields its inner strings before
//! the empty string. Random sampling draws uniformly at each NODE (a 50/50
//! coin for `a|b` no matter how many strings each side denotes), so sample
//! frequencies deliberately do not match enumeration frequencies; callers
//! that need per-string uniformity must enumerate.

use rand::Rng;

use crate::ast::Pattern;

/// Lazily enumerates every string of a pattern, in deterministic order.
/// The enumerator owns its cursor; independent enumerations never share
/// state.
pub struct Enumerator {
    root: Node,
    started: bool,
    exhausted: bool,
}

impl Enumerator {
    pub fn new(pattern: &Pattern) -> Self {
        Enumerator {
            root: Node::build(pattern),
            started: false,
            exhausted: false,
        }
    }

    fn current(&self) -> String {
        let mut out = String::new();
        self.root.current(&mut out);
        out
    }
}

impl Iterator for Enumerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(self.current());
        }
        if self.root.advance() {
            Some(self.current())
        } else {
            self.exhausted = true;
            None
        }
    }
}

/// Draws one string, sampling each node independently.
pub fn random_value(pattern: &Pattern, rng: &mut impl Rng) -> String {
    let mut out = String::new();
    sample_into(pattern, rng, &mut out);
    out
}

fn sample_into(pattern: &Pattern, rng: &mut impl Rng, out: &mut String) {
    match pattern {
        Pattern::Empty => {}
        Pattern::Literal(c) => out.push(*c),
        Pattern::Class(chars) => {
            if !chars.is_empty() {
                out.push(chars[rng.gen_range(0..chars.len())]);
            }
        }
        Pattern::Concat(parts) => {
            for part in parts {
                sample_into(part, rng, out);
            }
        }
        Pattern::Alternation(branches) => {
            if !branches.is_empty() {
                let i = rng.gen_range(0..branches.len());
                sample_into(&branches[i], rng, out);
            }
        }
        Pattern::Optional(inner) => {
            if rng.gen_bool(0.5) {
                sample_into(inner, rng, out);
            }
        }
        Pattern::Repeat { pattern, count } => {
            for _ in 0..*count {
                sample_into(pattern, rng, out);
            }
        }
    }
}

// ============================================================================
// Enumeration cursor
// ============================================================================

/// A pattern node paired with its cursor position. `advance` steps to the
/// next combination and returns true, or wraps back to the first
/// combination and returns false so the position to its left can carry.
enum Node {
    Literal(char),
    Empty,
    Class { chars: Vec<char>, index: usize },
    Concat { children: Vec<Node> },
    Alternation { branches: Vec<Pattern>, index: usize, child: Box<Node> },
    Optional { child: Box<Node>, at_empty: bool },
}

impl Node {
    fn build(pattern: &Pattern) -> Node {
        match pattern {
            Pattern::Empty => Node::Empty,
            Pattern::Literal(c) => Node::Literal(*c),
            Pattern::Class(chars) => Node::Class { chars: chars.clone(), index: 0 },
            Pattern::Concat(parts) => Node::Concat {
                children: parts.iter().map(Node::build).collect(),
            },
            Pattern::Alternation(branches) => {
                let child = match branches.first() {
                    Some(first) => Node::build(first),
                    None => Node::Empty,
                };
                Node::Alternation {
                    branches: branches.clone(),
                    index: 0,
                    child: Box::new(child),
                }
            }
            Pattern::Optional(inner) => Node::Optional {
                child: Box::new(Node::build(inner)),
                at_empty: false,
            },
            // A repeat is enumerated as `count` independent copies.
            Pattern::Repeat { pattern, count } => Node::Concat {
                children: (0..*count).map(|_| Node::build(pattern)).collect(),
            },
        }
    }

    fn current(&self, out: &mut String) {
        match self {
            Node::Literal(c) => out.push(*c),
            Node::Empty => {}
            Node::Class { chars, index } => {
                if let Some(c) = chars.get(*index) {
                    out.push(*c);
                }
            }
            Node::Concat { children } => {
                for child in children {
                    child.current(out);
                }
            }
            Node::Alternation { child, .. } => child.current(out),
            Node::Optional { child, at_empty } => {
                if !at_empty {
                    child.current(out);
                }
            }
        }
    }

    fn advance(&mut self) -> bool {
        match self {
            Node::Literal(_) | Node::Empty => false,
            Node::Class { chars, index } => {
                if *index + 1 < chars.len() {
                    *index += 1;
                    true
                } else {
                    *index = 0;
                    false
                }
            }
            Node::Concat { children } => {
                // Odometer: rightmost child advances; a wrapped child
                // resets itself and the carry moves left.
                for child in children.iter_mut().rev() {
                    if child.advance() {
                        return true;
                    }
                }
                false
            }
            Node::Alternation { branches, index, child } => {
                if child.advance() {
                    return true;
                }
                if *index + 1 < branches.len() {
                    *index += 1;
                    **child = Node::build(&branches[*index]);
                    true
                } else {
                    *index = 0;
                    if let Some(first) = branches.first() {
                        **child = Node::build(first);
                    }
                    false
                }
            }
            Node::Optional { child, at_empty } => {
                if *at_empty {
                    // Wraps from the trailing empty back to the inner
                    // pattern's first string.
                    *at_empty = false;
                    false
                } else if child.advance() {
                    true
                } else {
                    *at_empty = true;
                    true
                }
            }
        }
    }
}
