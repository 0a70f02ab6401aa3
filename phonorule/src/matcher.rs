// Pattern matcher: evaluates pattern trees against a word.
//
// A `Matcher` borrows one word plus the inventory and config it was built
// for, and precomputes the word's stem letters (segments of the stem that
// satisfy the configured stem-letter class, left to right). All matching is
// read-only, so `Matches` iterators are `Clone` and any number of them can
// walk the same word independently.
//
// Matching is committed: a list takes its first alternative that matches at
// the current position, and an optional group takes "present" whenever its
// body matches, even if the rest of the pattern then fails. The wildcard is
// the only element that searches; it tries the shortest run first and
// extends until the remainder of its sequence matches. This keeps the cost
// linear in pattern size times word length for wildcard-free patterns.
//
// Inside a rule, the environment decides which edge a boundary means: `#`
// and `$` in the left environment hold only at the word or stem start, and in
// the right environment only at the end. Elsewhere either edge holds.
//
// A `MatchResult` records one `Capture` per top-level element (zero-width
// elements included, so captures index like the pattern) with the gap span it
// consumed and, for lists, the alternative chosen. The applier aligns
// replacement slots with these captures.

use std::ops::Range;

use smallvec::SmallVec;

use crate::config::EngineConfig;
use crate::features::is_stress;
use crate::inventory::{Inventory, Phone};
use crate::pattern::{Boundary, DescriptorTerm, PatternElement, Rule};
use crate::word::{Segment, Word};

/// What one top-level element consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub start: usize,
    pub end: usize,
    /// Index of the chosen alternative when the element is a list.
    pub alternative: Option<usize>,
}

impl Capture {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

pub type Captures = SmallVec<[Capture; 4]>;

/// A successful match of a pattern (or a rule target) at `start..end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub start: usize,
    pub end: usize,
    pub captures: Captures,
}

impl MatchResult {
    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Which edge a word or stem boundary may match at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Either,
    Left,
    Right,
}

/// Read-only matching context for one word.
#[derive(Debug, Clone)]
pub struct Matcher<'a> {
    inventory: &'a Inventory,
    config: &'a EngineConfig,
    word: &'a Word,
    stem_letters: SmallVec<[usize; 8]>,
}

impl<'a> Matcher<'a> {
    pub fn new(inventory: &'a Inventory, config: &'a EngineConfig, word: &'a Word) -> Self {
        let features = inventory.features();
        let stem_letters = word
            .stem_range()
            .filter(|&i| {
                features
                    .satisfies(&config.stem_letter_class, word.segments()[i].phoneme().descriptors())
                    .unwrap_or(false)
            })
            .collect();
        Matcher {
            inventory,
            config,
            word,
            stem_letters,
        }
    }

    pub fn inventory(&self) -> &'a Inventory {
        self.inventory
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    pub fn word(&self) -> &'a Word {
        self.word
    }

    /// Segment index of the `n`-th stem letter (1-based).
    pub fn stem_letter(&self, n: usize) -> Option<usize> {
        n.checked_sub(1)
            .and_then(|i| self.stem_letters.get(i))
            .copied()
    }

    /// Number of stem letters in the word.
    pub fn stem_letter_count(&self) -> usize {
        self.stem_letters.len()
    }

    /// Match `pattern` starting exactly at gap `pos`.
    pub fn match_at(&self, pattern: &[PatternElement], pos: usize) -> Option<MatchResult> {
        self.match_from(pattern, pos, Side::Either)
    }

    fn match_from(&self, pattern: &[PatternElement], pos: usize, side: Side) -> Option<MatchResult> {
        let mut captures = Captures::new();
        let end = self.match_seq(pattern, pos, None, side, &mut captures)?;
        Some(MatchResult {
            start: pos,
            end,
            captures,
        })
    }

    /// Match `pattern` over a span ending exactly at gap `end`, trying the
    /// nearest start first and never starting before `min_start`.
    pub fn match_ending_at(
        &self,
        pattern: &[PatternElement],
        end: usize,
        min_start: usize,
    ) -> Option<MatchResult> {
        self.match_ending(pattern, end, min_start, Side::Either)
    }

    fn match_ending(
        &self,
        pattern: &[PatternElement],
        end: usize,
        min_start: usize,
        side: Side,
    ) -> Option<MatchResult> {
        (min_start..=end).rev().find_map(|start| {
            let mut captures = Captures::new();
            self.match_seq(pattern, start, Some(end), side, &mut captures)
                .map(|_| MatchResult {
                    start,
                    end,
                    captures,
                })
        })
    }

    /// Every anchor at or after `anchor` where `pattern` matches, in order.
    pub fn matches<'m>(&'m self, pattern: &'m [PatternElement], anchor: usize) -> Matches<'m, 'a> {
        Matches {
            matcher: self,
            pattern,
            next: anchor,
        }
    }

    /// Match a rule at gap `pos`: the target from `pos`, the left environment
    /// ending at `pos`, and the right environment from the target's end.
    pub fn rule_match_at(&self, rule: &Rule, pos: usize) -> Option<MatchResult> {
        let found = self.match_at(rule.target(), pos)?;
        if let Some(env) = rule.environment() {
            if !env.left.is_empty() && self.match_ending(&env.left, pos, 0, Side::Left).is_none() {
                return None;
            }
            if !env.right.is_empty() && self.match_from(&env.right, found.end, Side::Right).is_none()
            {
                return None;
            }
        }
        Some(found)
    }

    /// True if `rule` matches anywhere in the word.
    pub fn rule_matches_anywhere(&self, rule: &Rule) -> bool {
        (0..=self.word.len()).any(|pos| self.rule_match_at(rule, pos).is_some())
    }

    /// Match a sequence, pushing one capture per element. With `goal`, the
    /// sequence must end exactly there.
    fn match_seq(
        &self,
        elems: &[PatternElement],
        pos: usize,
        goal: Option<usize>,
        side: Side,
        captures: &mut Captures,
    ) -> Option<usize> {
        let Some((first, rest)) = elems.split_first() else {
            return match goal {
                Some(g) if g != pos => None,
                _ => Some(pos),
            };
        };
        if let PatternElement::Wildcard = first {
            let mark = captures.len();
            for end in pos..=self.word.len() {
                captures.push(Capture {
                    start: pos,
                    end,
                    alternative: None,
                });
                if let Some(done) = self.match_seq(rest, end, goal, side, captures) {
                    return Some(done);
                }
                captures.truncate(mark);
            }
            return None;
        }
        let (end, alternative) = self.match_element(first, pos, side)?;
        captures.push(Capture {
            start: pos,
            end,
            alternative,
        });
        self.match_seq(rest, end, goal, side, captures)
    }

    /// A nested sequence (list alternative, optional body); no captures kept.
    fn match_nested(&self, elems: &[PatternElement], pos: usize, side: Side) -> Option<usize> {
        let mut scratch = Captures::new();
        self.match_seq(elems, pos, None, side, &mut scratch)
    }

    fn match_element(
        &self,
        elem: &PatternElement,
        pos: usize,
        side: Side,
    ) -> Option<(usize, Option<usize>)> {
        let len = self.word.len();
        match elem {
            PatternElement::Literal(run) => self.match_literal(run, pos).map(|end| (end, None)),
            PatternElement::Class(terms) => {
                let segment = self.word.segment(pos)?;
                self.terms_hold(terms, segment).then_some((pos + 1, None))
            }
            PatternElement::Abbreviation(letter) => {
                let segment = self.word.segment(pos)?;
                self.abbreviation_holds(*letter, segment)
                    .then_some((pos + 1, None))
            }
            PatternElement::List(alternatives) => {
                alternatives.iter().enumerate().find_map(|(i, alternative)| {
                    self.match_nested(alternative, pos, side).map(|end| (end, Some(i)))
                })
            }
            PatternElement::Optional(body) => {
                Some((self.match_nested(body, pos, side).unwrap_or(pos), None))
            }
            PatternElement::Not(inner) => {
                if pos >= len {
                    return None;
                }
                let single = self
                    .match_element(inner, pos, side)
                    .is_some_and(|(end, _)| end == pos + 1);
                (!single).then_some((pos + 1, None))
            }
            PatternElement::Boundary(boundary) => {
                let holds = match boundary {
                    Boundary::Word => at_edge(side, pos, 0..len),
                    Boundary::Stem => at_edge(side, pos, self.word.stem_range()),
                    Boundary::Syllable => self.word.is_syllable_edge(pos),
                };
                holds.then_some((pos, None))
            }
            PatternElement::Stress => self
                .word
                .segment(pos)
                .is_some_and(Segment::is_stressed)
                .then_some((pos, None)),
            // Only reachable nested under `!`, which the parser rejects.
            PatternElement::Wildcard => Some((pos, None)),
            PatternElement::StemLetter(n) => {
                let letter = self.word.segment(self.stem_letter(*n)?)?;
                let segment = self.word.segment(pos)?;
                (segment.symbol() == letter.symbol()).then_some((pos + 1, None))
            }
        }
    }

    /// Consume segments whose phoneme or allophone symbols spell `run`.
    fn match_literal(&self, run: &str, pos: usize) -> Option<usize> {
        let mut rest = run;
        let mut i = pos;
        while !rest.is_empty() {
            let phoneme = self.word.segment(i)?.phoneme();
            let written = std::iter::once(phoneme.symbol())
                .chain(phoneme.allophones().iter().map(Phone::symbol))
                .filter(|s| !s.is_empty() && rest.starts_with(*s))
                .max_by_key(|s| s.len())?;
            rest = &rest[written.len()..];
            i += 1;
        }
        Some(i)
    }

    /// True if every term holds for `segment`. Unknown names never hold.
    pub fn terms_hold(&self, terms: &[DescriptorTerm], segment: &Segment) -> bool {
        terms.iter().all(|term| {
            let name = term.name();
            let holds = if is_stress(name) {
                segment.is_stressed()
            } else {
                self.inventory
                    .features()
                    .satisfies(name, segment.phoneme().descriptors())
                    .unwrap_or(false)
            };
            holds != term.is_negated()
        })
    }

    fn abbreviation_holds(&self, letter: char, segment: &Segment) -> bool {
        self.config.abbreviation(letter).is_some_and(|class| {
            self.inventory
                .features()
                .satisfies(class, segment.phoneme().descriptors())
                .unwrap_or(false)
        })
    }
}

fn at_edge(side: Side, pos: usize, span: Range<usize>) -> bool {
    match side {
        Side::Either => pos == span.start || pos == span.end,
        Side::Left => pos == span.start,
        Side::Right => pos == span.end,
    }
}

/// Lazy iterator over the anchors where a pattern matches.
#[derive(Debug, Clone)]
pub struct Matches<'m, 'a> {
    matcher: &'m Matcher<'a>,
    pattern: &'m [PatternElement],
    next: usize,
}

impl Iterator for Matches<'_, '_> {
    type Item = MatchResult;

    fn next(&mut self) -> Option<MatchResult> {
        while self.next <= self.matcher.word.len() {
            let pos = self.next;
            self.next += 1;
            if let Some(found) = self.matcher.match_at(self.pattern, pos) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::default_inventory;
    use crate::parser::{parse_context, parse_rule};

    struct Fixture {
        inventory: Inventory,
        config: EngineConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                inventory: default_inventory(),
                config: EngineConfig::default(),
            }
        }

        fn word(&self, notation: &str) -> Word {
            Word::parse(&self.inventory, notation).unwrap()
        }

        fn starts(&self, pattern: &str, notation: &str) -> Vec<usize> {
            let word = self.word(notation);
            let pattern = parse_context(pattern, 0).unwrap();
            let matcher = Matcher::new(&self.inventory, &self.config, &word);
            matcher.matches(&pattern, 0).map(|m| m.start).collect()
        }
    }

    #[test]
    fn test_literal_and_class() {
        let fx = Fixture::new();
        assert_eq!(fx.starts("a", "tata"), vec![1, 3]);
        assert_eq!(fx.starts("[vowel]", "tata"), vec![1, 3]);
        assert_eq!(fx.starts("[consonant, !voiced]", "tada"), vec![0]);
        assert_eq!(fx.starts("[]", "ta"), vec![0, 1]);
    }

    #[test]
    fn test_literal_matches_allophone_spelling() {
        let fx = Fixture::new();
        assert_eq!(fx.starts("pʰa", "pa"), vec![0]);
        assert_eq!(fx.starts("pa", "pa"), vec![0]);
    }

    #[test]
    fn test_boundaries_are_zero_width() {
        let fx = Fixture::new();
        let word = fx.word("ta.ka");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        let pattern = parse_context("#", 0).unwrap();
        let found: Vec<_> = matcher.matches(&pattern, 0).map(|m| m.span()).collect();
        assert_eq!(found, vec![0..0, 4..4]);
        assert_eq!(fx.starts("%k", "ta.ka"), vec![2]);
        assert_eq!(fx.starts("$t", "ka<ta>"), vec![2]);
    }

    #[test]
    fn test_list_commits_to_first_alternative() {
        let fx = Fixture::new();
        let word = fx.word("sta");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        // `s` wins at 0 and is not revisited when `a` then fails.
        let pattern = parse_context("{s, st}a", 0).unwrap();
        assert!(matcher.match_at(&pattern, 0).is_none());
        let pattern = parse_context("{st, s}a", 0).unwrap();
        let found = matcher.match_at(&pattern, 0).unwrap();
        assert_eq!(found.captures[0].alternative, Some(0));
        assert_eq!(found.end, 3);
    }

    #[test]
    fn test_optional_prefers_present() {
        let fx = Fixture::new();
        let word = fx.word("ira");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        let pattern = parse_context("i([consonant])a", 0).unwrap();
        let found = matcher.match_at(&pattern, 0).unwrap();
        assert_eq!(found.captures[1].span(), 1..2);
        let word = fx.word("ia");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        assert_eq!(matcher.match_at(&pattern, 0).unwrap().end, 2);
    }

    #[test]
    fn test_negation() {
        let fx = Fixture::new();
        assert_eq!(fx.starts("![vowel]", "asta"), vec![1, 2]);
        assert_eq!(fx.starts("!s", "asta"), vec![0, 2, 3]);
        assert_eq!(fx.starts("!#", "ta"), vec![0, 1]);
        assert_eq!(fx.starts("!{s,t}", "asta"), vec![0, 3]);
    }

    #[test]
    fn test_wildcard_is_shortest_first() {
        let fx = Fixture::new();
        let word = fx.word("takata");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        let pattern = parse_context("t...a", 0).unwrap();
        let found = matcher.match_at(&pattern, 0).unwrap();
        assert_eq!(found.end, 2);
        assert_eq!(found.captures[1].span(), 1..1);
        let pattern = parse_context("t...#", 0).unwrap();
        assert_eq!(matcher.match_at(&pattern, 0).unwrap().end, 6);
    }

    #[test]
    fn test_abbreviations() {
        let fx = Fixture::new();
        assert_eq!(fx.starts("CV", "astama"), vec![2, 4]);
        assert_eq!(fx.starts("N", "mana"), vec![0, 2]);
    }

    #[test]
    fn test_stem_letters() {
        let fx = Fixture::new();
        let word = fx.word("ka<tab>");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        assert_eq!(matcher.stem_letter(1), Some(2));
        assert_eq!(matcher.stem_letter(2), Some(4));
        assert_eq!(matcher.stem_letter(3), None);
        assert_eq!(matcher.stem_letter(0), None);
        assert_eq!(matcher.stem_letter_count(), 2);
        let pattern = parse_context("L2", 0).unwrap();
        let found: Vec<_> = matcher.matches(&pattern, 0).map(|m| m.start).collect();
        assert_eq!(found, vec![4]);
    }

    #[test]
    fn test_stress_mark() {
        let fx = Fixture::new();
        assert_eq!(fx.starts("'a", "tat'a"), vec![3]);
        assert_eq!(fx.starts("[vowel, stressed]", "tat'a"), vec![3]);
        assert_eq!(fx.starts("[vowel, !stress]", "tat'a"), vec![1]);
    }

    #[test]
    fn test_rule_match_uses_environments() {
        let fx = Fixture::new();
        let word = fx.word("asa");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        let rule = parse_rule("s -> h / a_a").unwrap();
        assert_eq!(matcher.rule_match_at(&rule, 1).unwrap().span(), 1..2);
        assert!(matcher.rule_match_at(&rule, 0).is_none());
        let rule = parse_rule("s -> h / #_").unwrap();
        assert!(!matcher.rule_matches_anywhere(&rule));
    }

    #[test]
    fn test_environment_boundaries_hold_at_their_own_edge() {
        let fx = Fixture::new();
        let word = fx.word("ta");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        let starts = |rule: &str| -> Vec<usize> {
            let rule = parse_rule(rule).unwrap();
            (0..=word.len())
                .filter(|&pos| matcher.rule_match_at(&rule, pos).is_some())
                .collect()
        };
        assert_eq!(starts("0 -> e / _#"), vec![2]);
        assert_eq!(starts("0 -> e / #_"), vec![0]);
        assert_eq!(starts("0 -> e / _{#, t}"), vec![0, 2]);
        // Outside a rule either edge still holds.
        assert_eq!(fx.starts("#", "ta"), vec![0, 2]);
    }

    #[test]
    fn test_left_environment_with_wildcard_ends_at_focus() {
        let fx = Fixture::new();
        let word = fx.word("tapasa");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        let left = parse_context("#t...", 0).unwrap();
        let found = matcher.match_ending_at(&left, 4, 0).unwrap();
        assert_eq!(found.span(), 0..4);
    }

    #[test]
    fn test_matches_iterator_is_restartable() {
        let fx = Fixture::new();
        let word = fx.word("tatata");
        let matcher = Matcher::new(&fx.inventory, &fx.config, &word);
        let pattern = parse_context("ta", 0).unwrap();
        let mut iter = matcher.matches(&pattern, 0);
        iter.next();
        let copy = iter.clone();
        assert_eq!(iter.count(), 2);
        assert_eq!(copy.map(|m| m.start).collect::<Vec<_>>(), vec![2, 4]);
    }
}
