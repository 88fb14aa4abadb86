//! FILENAME: sequencer/src/tests.rs
//! PURPOSE: Consolidated unit tests for the sequencer crate.

use crate::ast::Pattern;
use crate::generator::{random_value, Enumerator};
use crate::lexer::Lexer;
use crate::parser::{parse, PatternError};
use crate::token::Token;

use rand::rngs::StdRng;
use rand::SeedableRng;

fn values(input: &str) -> Vec<String> {
    Enumerator::new(&parse(input).unwrap()).collect()
}

// ========================================
// LEXER TESTS
// ========================================

#[test]
fn lexer_tokenizes_plain_characters() {
    let mut lexer = Lexer::new("ab c");
    assert_eq!(lexer.next_token(), Token::Literal('a'));
    assert_eq!(lexer.next_token(), Token::Literal('b'));
    assert_eq!(lexer.next_token(), Token::Literal(' '));
    assert_eq!(lexer.next_token(), Token::Literal('c'));
    assert_eq!(lexer.next_token(), Token::EOF);
}

#[test]
fn lexer_tokenizes_operators_and_delimiters() {
    let mut lexer = Lexer::new("[]()|?");
    assert_eq!(lexer.next_token(), Token::LBracket);
    assert_eq!(lexer.next_token(), Token::RBracket);
    assert_eq!(lexer.next_token(), Token::LParen);
    assert_eq!(lexer.next_token(), Token::RParen);
    assert_eq!(lexer.next_token(), Token::Pipe);
    assert_eq!(lexer.next_token(), Token::Question);
    assert_eq!(lexer.next_token(), Token::EOF);
}

#[test]
fn lexer_reads_whole_repeat_markers() {
    let mut lexer = Lexer::new("a{12}");
    assert_eq!(lexer.next_token(), Token::Literal('a'));
    assert_eq!(lexer.next_token(), Token::Repeat(12));
    assert_eq!(lexer.next_token(), Token::EOF);
}

#[test]
fn lexer_flags_malformed_repeat_markers() {
    assert_eq!(Lexer::new("{}").next_token(), Token::Illegal('{'));
    assert_eq!(Lexer::new("{a}").next_token(), Token::Illegal('{'));
    assert_eq!(Lexer::new("{3").next_token(), Token::Illegal('{'));
    assert_eq!(Lexer::new("}").next_token(), Token::Illegal('}'));
}

#[test]
fn lexer_maps_whitespace_escapes() {
    let mut lexer = Lexer::new("\\t\\n\\r");
    assert_eq!(lexer.next_token(), Token::Escaped('\t'));
    assert_eq!(lexer.next_token(), Token::Escaped('\n'));
    assert_eq!(lexer.next_token(), Token::Escaped('\r'));
    assert_eq!(lexer.next_token(), Token::EOF);
}

#[test]
fn lexer_escapes_reserved_characters() {
    let mut lexer = Lexer::new("\\[\\?\\\\");
    assert_eq!(lexer.next_token(), Token::Escaped('['));
    assert_eq!(lexer.next_token(), Token::Escaped('?'));
    assert_eq!(lexer.next_token(), Token::Escaped('\\'));
}

#[test]
fn lexer_flags_trailing_backslash() {
    let mut lexer = Lexer::new("a\\");
    assert_eq!(lexer.next_token(), Token::Literal('a'));
    assert_eq!(lexer.next_token(), Token::Illegal('\\'));
}

// ========================================
// PARSER TESTS - TREE SHAPES
// ========================================

#[test]
fn parser_parses_single_literal() {
    assert_eq!(parse("a").unwrap(), Pattern::Literal('a'));
}

#[test]
fn parser_parses_empty_input_as_empty_pattern() {
    assert_eq!(parse("").unwrap(), Pattern::Empty);
}

#[test]
fn parser_parses_concatenation() {
    assert_eq!(
        parse("ab").unwrap(),
        Pattern::Concat(vec![Pattern::Literal('a'), Pattern::Literal('b')])
    );
}

#[test]
fn parser_question_wraps_the_whole_preceding_sequence() {
    assert_eq!(
        parse("ab?").unwrap(),
        Pattern::Optional(Box::new(Pattern::Concat(vec![
            Pattern::Literal('a'),
            Pattern::Literal('b'),
        ])))
    );
}

#[test]
fn parser_resumes_concatenation_after_question() {
    assert_eq!(
        parse("ab?c").unwrap(),
        Pattern::Concat(vec![
            Pattern::Optional(Box::new(Pattern::Concat(vec![
                Pattern::Literal('a'),
                Pattern::Literal('b'),
            ]))),
            Pattern::Literal('c'),
        ])
    );
}

#[test]
fn parser_parses_alternation_branches_in_order() {
    assert_eq!(
        parse("a|bc").unwrap(),
        Pattern::Alternation(vec![
            Pattern::Literal('a'),
            Pattern::Concat(vec![Pattern::Literal('b'), Pattern::Literal('c')]),
        ])
    );
}

#[test]
fn parser_allows_an_empty_alternation_branch() {
    assert_eq!(
        parse("a|").unwrap(),
        Pattern::Alternation(vec![Pattern::Literal('a'), Pattern::Empty])
    );
}

#[test]
fn parser_repeat_binds_to_the_last_atom_only() {
    assert_eq!(
        parse("ab{3}").unwrap(),
        Pattern::Concat(vec![
            Pattern::Literal('a'),
            Pattern::Repeat {
                pattern: Box::new(Pattern::Literal('b')),
                count: 3,
            },
        ])
    );
}

#[test]
fn parser_parses_grouping() {
    assert_eq!(
        parse("(a|b)c").unwrap(),
        Pattern::Concat(vec![
            Pattern::Alternation(vec![Pattern::Literal('a'), Pattern::Literal('b')]),
            Pattern::Literal('c'),
        ])
    );
}

#[test]
fn parser_parses_escaped_operator_as_literal() {
    assert_eq!(parse("\\?").unwrap(), Pattern::Literal('?'));
}

// ========================================
// PARSER TESTS - VALUE SETS
// ========================================

#[test]
fn parser_expands_class_ranges() {
    assert_eq!(parse("[a-c]").unwrap(), Pattern::Class(vec!['a', 'b', 'c']));
    assert_eq!(
        parse("[a-c2-4]").unwrap(),
        Pattern::Class(vec!['a', 'b', 'c', '2', '3', '4'])
    );
}

#[test]
fn parser_deduplicates_class_members() {
    assert_eq!(parse("[aab-c]").unwrap(), Pattern::Class(vec!['a', 'b', 'c']));
}

#[test]
fn parser_keeps_escaped_dash_literal() {
    assert_eq!(parse("[a\\-c]").unwrap(), Pattern::Class(vec!['a', '-', 'c']));
}

#[test]
fn parser_keeps_edge_dash_literal() {
    assert_eq!(parse("[-a]").unwrap(), Pattern::Class(vec!['-', 'a']));
    assert_eq!(parse("[a-]").unwrap(), Pattern::Class(vec!['a', '-']));
}

#[test]
fn parser_treats_operators_as_plain_members_inside_class() {
    assert_eq!(
        parse("[a|?(]").unwrap(),
        Pattern::Class(vec!['a', '|', '?', '('])
    );
}

// ========================================
// PARSER TESTS - ERRORS
// ========================================

#[test]
fn parser_rejects_leading_question() {
    assert_eq!(parse("?a"), Err(PatternError::DanglingOperator('?')));
}

#[test]
fn parser_rejects_leading_repeat() {
    assert_eq!(parse("{3}a"), Err(PatternError::DanglingOperator('{')));
}

#[test]
fn parser_rejects_empty_class() {
    assert_eq!(parse("[]"), Err(PatternError::EmptyClass));
}

#[test]
fn parser_rejects_reversed_range() {
    assert_eq!(
        parse("[z-a]"),
        Err(PatternError::InvalidRange { start: 'z', end: 'a' })
    );
}

#[test]
fn parser_rejects_unclosed_group_and_class() {
    assert_eq!(parse("(ab"), Err(PatternError::UnexpectedEnd));
    assert_eq!(parse("[ab"), Err(PatternError::UnexpectedEnd));
}

#[test]
fn parser_rejects_stray_closing_paren() {
    assert!(matches!(parse("a)b"), Err(PatternError::UnexpectedToken(_))));
}

// ========================================
// CARDINALITY TESTS
// ========================================

#[test]
fn cardinality_counts_classes_and_products() {
    assert_eq!(parse("[abc]").unwrap().cardinality(), Some(3));
    assert_eq!(parse("a?").unwrap().cardinality(), Some(2));
    assert_eq!(parse("[ab][cd]").unwrap().cardinality(), Some(4));
    assert_eq!(parse("a|bc|d").unwrap().cardinality(), Some(3));
}

#[test]
fn cardinality_multiplies_repeats() {
    assert_eq!(parse("[ab]{10}").unwrap().cardinality(), Some(1024));
    assert_eq!(parse("a{0}").unwrap().cardinality(), Some(1));
    assert_eq!(parse("a{500}").unwrap().cardinality(), Some(1));
}

#[test]
fn cardinality_reports_overflow_as_none() {
    assert_eq!(parse("[ab]{64}").unwrap().cardinality(), None);
    assert_eq!(parse("[ab]{63}").unwrap().cardinality(), Some(1u64 << 63));
}

// ========================================
// ENUMERATION TESTS
// ========================================

#[test]
fn enumeration_walks_a_class_in_written_order() {
    assert_eq!(values("[abc]"), vec!["a", "b", "c"]);
}

#[test]
fn enumeration_puts_the_empty_string_last_for_optional() {
    assert_eq!(values("a?"), vec!["a", ""]);
}

#[test]
fn enumeration_varies_the_rightmost_position_fastest() {
    assert_eq!(values("[ab][cd]"), vec!["ac", "ad", "bc", "bd"]);
}

#[test]
fn enumeration_of_optional_prefix_keeps_the_suffix() {
    assert_eq!(values("ab?c"), vec!["abc", "c"]);
}

#[test]
fn enumeration_follows_alternation_branch_order() {
    assert_eq!(values("(a|bc)d"), vec!["ad", "bcd"]);
    assert_eq!(values("a|"), vec!["a", ""]);
}

#[test]
fn enumeration_of_a_repeat_varies_each_copy() {
    assert_eq!(values("[ab]{2}"), vec!["aa", "ab", "ba", "bb"]);
}

#[test]
fn enumeration_of_the_empty_pattern_is_one_empty_string() {
    assert_eq!(values(""), vec![""]);
    assert_eq!(values("a{0}"), vec![""]);
}

#[test]
fn enumeration_length_matches_cardinality() {
    for input in ["[ab]c?", "(a|bc){2}", "[0-3][0-3]", "x?y?z?"] {
        let pattern = parse(input).unwrap();
        let count = Enumerator::new(&pattern).count() as u64;
        assert_eq!(pattern.cardinality(), Some(count), "pattern {input}");
    }
}

// ========================================
// RANDOM SAMPLING TESTS
// ========================================

#[test]
fn random_values_stay_inside_the_language() {
    let pattern = parse("[ab]c?").unwrap();
    let language: Vec<String> = Enumerator::new(&pattern).collect();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let sample = random_value(&pattern, &mut rng);
        assert!(language.contains(&sample), "unexpected value {sample:?}");
    }
}

#[test]
fn random_values_replay_for_equal_seeds() {
    let pattern = parse("[a-z]{4}(-[0-9])?").unwrap();
    let mut first = StdRng::seed_from_u64(42);
    let mut second = StdRng::seed_from_u64(42);
    for _ in 0..10 {
        assert_eq!(
            random_value(&pattern, &mut first),
            random_value(&pattern, &mut second)
        );
    }
}
