// Pattern tree: the closed set of element kinds rules and affixes are built
// from, plus the `Rule` type and normalized serialization.
//
// A pattern is a plain `Vec<PatternElement>`. Elements are either *slots*
// (they consume segments: literals, classes, lists, optionals, negations,
// wildcards, stem letters) or *zero-width* assertions (boundaries and the
// stress mark). Target and replacement slots are aligned by index when a
// replacement needs to correlate with what was matched (`{p,t,k} ->
// {b,d,g}`, `[voiceless] -> [voiced]`).
//
// `Display` produces the normalized notation: single spaces around `->` and
// `/`, no spaces inside brackets except after commas, and a space only
// between two adjacent literal runs (which would otherwise merge).

use std::fmt;

/// One term inside `[...]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DescriptorTerm {
    /// `name`: the class or tag must hold.
    Has(String),
    /// `!name`: the class or tag must not hold.
    Lacks(String),
    /// `from:to`, a replacement-only declared feature pairing.
    Becomes { from: String, to: String },
}

impl DescriptorTerm {
    /// The name tested when the term is evaluated (the source side of a pair).
    pub fn name(&self) -> &str {
        match self {
            DescriptorTerm::Has(name) | DescriptorTerm::Lacks(name) => name,
            DescriptorTerm::Becomes { from, .. } => from,
        }
    }

    pub fn is_negated(&self) -> bool {
        matches!(self, DescriptorTerm::Lacks(_))
    }
}

impl fmt::Display for DescriptorTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorTerm::Has(name) => write!(f, "{name}"),
            DescriptorTerm::Lacks(name) => write!(f, "!{name}"),
            DescriptorTerm::Becomes { from, to } => write!(f, "{from}:{to}"),
        }
    }
}

/// Zero-width boundary anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boundary {
    /// `#`, start or end of the word.
    Word,
    /// `$`, start or end of the stem.
    Stem,
    /// `%`, a syllable boundary (word edges included).
    Syllable,
}

impl Boundary {
    pub fn symbol(self) -> char {
        match self {
            Boundary::Word => '#',
            Boundary::Stem => '$',
            Boundary::Syllable => '%',
        }
    }
}

/// One node of a parsed pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternElement {
    /// A run of phoneme symbols written without separators (`s`, `st`).
    Literal(String),
    /// `[a, !b]`; an empty list matches any single segment.
    Class(Vec<DescriptorTerm>),
    /// A single uppercase letter standing for a class (`C`, `V`, `N`).
    Abbreviation(char),
    /// `{x, y}`: alternatives tried left to right.
    List(Vec<Vec<PatternElement>>),
    /// `(x)`: tried present, then absent.
    Optional(Vec<PatternElement>),
    /// `!x`: one segment that `x` does not match.
    Not(Box<PatternElement>),
    Boundary(Boundary),
    /// `'`: the next segment is stressed.
    Stress,
    /// `...`: any run of segments, shortest first.
    Wildcard,
    /// `L<n>`: the n-th stem letter (1-based).
    StemLetter(usize),
}

impl PatternElement {
    /// Boundaries and stress marks consume nothing and take no slot.
    pub fn is_zero_width(&self) -> bool {
        matches!(self, PatternElement::Boundary(_) | PatternElement::Stress)
    }

    /// Number of elements in this subtree, this one included.
    pub fn size(&self) -> usize {
        match self {
            PatternElement::List(alts) => 1 + alts.iter().map(|a| sequence_size(a)).sum::<usize>(),
            PatternElement::Optional(seq) => 1 + sequence_size(seq),
            PatternElement::Not(inner) => 1 + inner.size(),
            _ => 1,
        }
    }
}

/// Total element count of a sequence, nested elements included.
pub fn sequence_size(elems: &[PatternElement]) -> usize {
    elems.iter().map(PatternElement::size).sum()
}

/// Indices of the slot (non-zero-width) elements of a sequence.
pub fn slot_indices(elems: &[PatternElement]) -> Vec<usize> {
    elems
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_zero_width())
        .map(|(i, _)| i)
        .collect()
}

impl fmt::Display for PatternElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternElement::Literal(run) => write!(f, "{run}"),
            PatternElement::Class(terms) => {
                write!(f, "[")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{term}")?;
                }
                write!(f, "]")
            }
            PatternElement::Abbreviation(c) => write!(f, "{c}"),
            PatternElement::List(alts) => {
                write!(f, "{{")?;
                for (i, alt) in alts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", Sequence(alt))?;
                }
                write!(f, "}}")
            }
            PatternElement::Optional(seq) => write!(f, "({})", Sequence(seq)),
            PatternElement::Not(inner) => write!(f, "!{inner}"),
            PatternElement::Boundary(b) => write!(f, "{}", b.symbol()),
            PatternElement::Stress => write!(f, "'"),
            PatternElement::Wildcard => write!(f, "..."),
            PatternElement::StemLetter(n) => write!(f, "L{n}"),
        }
    }
}

/// Display adapter for an element sequence; the empty sequence prints `0`.
pub struct Sequence<'a>(pub &'a [PatternElement]);

impl fmt::Display for Sequence<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "0");
        }
        write_elements(f, self.0)
    }
}

/// Writes elements back to back, with a space wherever a literal run would
/// otherwise join the literal text printed before it.
fn write_elements(f: &mut fmt::Formatter<'_>, elems: &[PatternElement]) -> fmt::Result {
    let mut previous_literal = false;
    for elem in elems {
        if previous_literal && matches!(elem, PatternElement::Literal(_)) {
            write!(f, " ")?;
        }
        write!(f, "{elem}")?;
        previous_literal = ends_in_literal(elem);
    }
    Ok(())
}

/// True when the printed form of `elem` ends in a bare literal run (`s`, `!s`).
fn ends_in_literal(elem: &PatternElement) -> bool {
    match elem {
        PatternElement::Literal(_) => true,
        PatternElement::Not(inner) => ends_in_literal(inner),
        _ => false,
    }
}

/// Left and right context around the `_` focus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Environment {
    pub left: Vec<PatternElement>,
    pub right: Vec<PatternElement>,
}

/// A parsed sound-change rule: `target -> replacement / left_right`.
///
/// Immutable once parsed. Equality ignores the source text, so a rule equals
/// the re-parse of its own normalized form.
#[derive(Debug, Clone)]
pub struct Rule {
    source: String,
    target: Vec<PatternElement>,
    replacement: Vec<PatternElement>,
    environment: Option<Environment>,
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
            && self.replacement == other.replacement
            && self.environment == other.environment
    }
}

impl Eq for Rule {}

impl Rule {
    pub(crate) fn new(
        source: impl Into<String>,
        target: Vec<PatternElement>,
        replacement: Vec<PatternElement>,
        environment: Option<Environment>,
    ) -> Self {
        Rule {
            source: source.into(),
            target,
            replacement,
            environment,
        }
    }

    /// The text the rule was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Empty for epenthesis (`0 -> x`).
    pub fn target(&self) -> &[PatternElement] {
        &self.target
    }

    /// Empty for deletion (`x -> 0`).
    pub fn replacement(&self) -> &[PatternElement] {
        &self.replacement
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    pub fn is_deletion(&self) -> bool {
        self.replacement.is_empty()
    }

    pub fn is_epenthesis(&self) -> bool {
        self.target.is_empty()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", Sequence(&self.target), Sequence(&self.replacement))?;
        if let Some(env) = &self.environment {
            write!(f, " / ")?;
            write_elements(f, &env.left)?;
            write!(f, "_")?;
            write_elements(f, &env.right)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> PatternElement {
        PatternElement::Literal(s.to_string())
    }

    #[test]
    fn test_sequence_display_separates_literals() {
        let seq = vec![lit("s"), lit("t"), PatternElement::Abbreviation('V'), lit("r")];
        assert_eq!(Sequence(&seq).to_string(), "s tVr");
    }

    #[test]
    fn test_negated_literal_stays_apart_from_next_literal() {
        let seq = vec![PatternElement::Not(Box::new(lit("s"))), lit("t")];
        assert_eq!(Sequence(&seq).to_string(), "!s t");
        let seq = vec![PatternElement::Not(Box::new(lit("s"))), PatternElement::Abbreviation('V')];
        assert_eq!(Sequence(&seq).to_string(), "!sV");
    }

    #[test]
    fn test_empty_sequence_displays_zero() {
        assert_eq!(Sequence(&[]).to_string(), "0");
    }

    #[test]
    fn test_class_display() {
        let class = PatternElement::Class(vec![
            DescriptorTerm::Has("vowel".into()),
            DescriptorTerm::Lacks("back".into()),
            DescriptorTerm::Becomes {
                from: "front".into(),
                to: "back".into(),
            },
        ]);
        assert_eq!(class.to_string(), "[vowel, !back, front:back]");
    }

    #[test]
    fn test_zero_width_and_slots() {
        let seq = vec![
            PatternElement::Boundary(Boundary::Word),
            lit("a"),
            PatternElement::Stress,
            PatternElement::StemLetter(1),
        ];
        assert_eq!(slot_indices(&seq), vec![1, 3]);
    }

    #[test]
    fn test_sizes_count_nested_elements() {
        let list = PatternElement::List(vec![vec![lit("a")], vec![lit("b"), lit("c")]]);
        assert_eq!(list.size(), 4);
        let opt = PatternElement::Optional(vec![list]);
        assert_eq!(sequence_size(&[opt, lit("x")]), 6);
    }

    #[test]
    fn test_rule_display_with_environment() {
        let rule = Rule::new(
            "w->0/{k,ɡ}_",
            vec![lit("w")],
            vec![],
            Some(Environment {
                left: vec![PatternElement::List(vec![vec![lit("k")], vec![lit("ɡ")]])],
                right: vec![],
            }),
        );
        assert_eq!(rule.to_string(), "w -> 0 / {k, ɡ}_");
        assert!(rule.is_deletion());
        assert!(!rule.is_epenthesis());
    }
}
