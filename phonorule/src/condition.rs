// Affix branch conditions.
//
//     Starts with: <pattern>       the stem begins with a match of <pattern>
//     Ends with: <pattern>         the stem ends with a match of <pattern>
//     Has syllables: [op]N         stem syllable count compared with N
//                                  (op is one of = < <= > >=, default =)
//     L<n> is: <pattern>           the n-th stem letter matches <pattern>
//
// An empty condition always holds. Conditions are evaluated against the stem
// (the whole word when no stem is marked); patterns never match outside it.

use std::fmt;

use crate::error::{EngineError, Result};
use crate::matcher::Matcher;
use crate::parser::parse_context;
use crate::pattern::{PatternElement, Sequence};

/// Comparator of a `Has syllables:` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn holds(self, actual: usize, expected: usize) -> bool {
        match self {
            Comparison::Eq => actual == expected,
            Comparison::Lt => actual < expected,
            Comparison::Le => actual <= expected,
            Comparison::Gt => actual > expected,
            Comparison::Ge => actual >= expected,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// A guard on one affix branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Always,
    StartsWith(Vec<PatternElement>),
    EndsWith(Vec<PatternElement>),
    HasSyllables(Comparison, usize),
    LetterIs(usize, Vec<PatternElement>),
}

/// Strip an ASCII-case-insensitive `prefix`, returning the rest.
fn strip_keyword<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

impl Condition {
    /// Parse condition text found at character offset `base_column`.
    pub(crate) fn parse(text: &str, base_column: usize) -> Result<Condition> {
        let leading = text.chars().take_while(|c| c.is_whitespace()).count();
        let trimmed = text.trim();
        let column = base_column + leading;
        if trimmed.is_empty() {
            return Ok(Condition::Always);
        }
        // Character offset of `rest` inside `trimmed`, as a column.
        let operand_column =
            |rest: &str| column + trimmed.chars().count() - rest.chars().count();

        if let Some(rest) = strip_keyword(trimmed, "starts with:") {
            return Ok(Condition::StartsWith(parse_context(rest, operand_column(rest))?));
        }
        if let Some(rest) = strip_keyword(trimmed, "ends with:") {
            return Ok(Condition::EndsWith(parse_context(rest, operand_column(rest))?));
        }
        if let Some(rest) = strip_keyword(trimmed, "has syllables:") {
            let at = operand_column(rest);
            let rest = rest.trim();
            let (comparison, digits) = [
                (">=", Comparison::Ge),
                ("<=", Comparison::Le),
                (">", Comparison::Gt),
                ("<", Comparison::Lt),
                ("=", Comparison::Eq),
            ]
            .iter()
            .find_map(|(op, cmp)| rest.strip_prefix(op).map(|r| (*cmp, r.trim())))
            .unwrap_or((Comparison::Eq, rest));
            let count = digits.parse::<usize>().map_err(|_| {
                EngineError::syntax(at + 1, digits, "expected a syllable count")
            })?;
            return Ok(Condition::HasSyllables(comparison, count));
        }
        if let Some(rest) = trimmed.strip_prefix('L') {
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            let after = rest[digits.len()..].trim_start();
            if let (Ok(n), Some(operand)) = (digits.parse::<usize>(), strip_keyword(after, "is:")) {
                if n == 0 {
                    return Err(EngineError::syntax(column + 1, "L0", "stem letters count from 1"));
                }
                return Ok(Condition::LetterIs(n, parse_context(operand, operand_column(operand))?));
            }
        }
        Err(EngineError::syntax(
            column + 1,
            trimmed.split_whitespace().next().unwrap_or(trimmed),
            "expected `Starts with:`, `Ends with:`, `Has syllables:` or `L<n> is:`",
        ))
    }

    /// Evaluate against the matcher's word.
    pub fn holds(&self, matcher: &Matcher<'_>) -> bool {
        let word = matcher.word();
        let stem = word.stem_range();
        match self {
            Condition::Always => true,
            Condition::StartsWith(pattern) => matcher
                .match_at(pattern, stem.start)
                .is_some_and(|m| m.end <= stem.end),
            Condition::EndsWith(pattern) => matcher
                .match_ending_at(pattern, stem.end, stem.start)
                .is_some(),
            Condition::HasSyllables(comparison, count) => {
                comparison.holds(word.syllables_in(stem).len(), *count)
            }
            Condition::LetterIs(n, pattern) => matcher.stem_letter(*n).is_some_and(|i| {
                matcher
                    .match_at(pattern, i)
                    .is_some_and(|m| m.end == i + 1)
            }),
        }
    }

    /// The pattern the condition tests, if any.
    pub fn pattern(&self) -> Option<&[PatternElement]> {
        match self {
            Condition::StartsWith(p) | Condition::EndsWith(p) | Condition::LetterIs(_, p) => {
                Some(p)
            }
            Condition::Always | Condition::HasSyllables(..) => None,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => Ok(()),
            Condition::StartsWith(p) => write!(f, "Starts with: {}", Sequence(p)),
            Condition::EndsWith(p) => write!(f, "Ends with: {}", Sequence(p)),
            Condition::HasSyllables(cmp, n) => write!(f, "Has syllables: {}{n}", cmp.symbol()),
            Condition::LetterIs(n, p) => write!(f, "L{n} is: {}", Sequence(p)),
        }
    }
}
