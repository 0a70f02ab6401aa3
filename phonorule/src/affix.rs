// Affix specifications: the nine attachment strategies and their notation.
//
//     affix  := kind ["(" param ")"] ":" branch (";" branch)*
//     branch := material ["|" condition]
//
//     prefix: ke                       suffix: -ne
//     circumfix: ke-t | Starts with: C; k-t | Starts with: V
//     infix(after syllable 1): um      infix(before syllable 2): -um-
//     duplifix(1, left): 0             duplifix(all, right): a
//     transfix: L1aL2aL3               transfix(partial): L1iL2
//     simulfix: a -> o / _#
//     disfix: 2                        disfix: 1-2
//     suprafix(tone): high
//
// Branches are tried in order and the first whose condition holds is used.
// Material is plain phonemes, `L<n>` stem letters and stress marks; `0`
// means no material. Parsing is pure; application lives in `affixation.rs`.

use std::fmt;

use crate::condition::Condition;
use crate::error::{EngineError, Result};
use crate::parser::{parse_material, parse_rule_at};
use crate::pattern::{PatternElement, Rule, Sequence};

/// A sequence of material elements.
pub type Material = Vec<PatternElement>;

/// One condition-guarded alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch<M> {
    pub material: M,
    pub condition: Condition,
}

/// Circumfix material on either side of the stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Circumfix {
    pub before: Material,
    pub after: Material,
}

/// Where an infix goes relative to a stem syllable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixPosition {
    /// After the n-th syllable; `After(0)` is the start of the stem.
    After(usize),
    /// Before the n-th syllable (1-based).
    Before(usize),
}

/// How many stem syllables a duplifix copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicationSpan {
    Syllables(usize),
    All,
}

/// Which stem edge a duplifix copies from and attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Left,
    Right,
}

/// Inclusive 1-based range of stem syllables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyllableRange {
    pub first: usize,
    pub last: usize,
}

/// The strategy and its branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AffixKind {
    Prefix(Vec<Branch<Material>>),
    Suffix(Vec<Branch<Material>>),
    Circumfix(Vec<Branch<Circumfix>>),
    Infix {
        position: InfixPosition,
        branches: Vec<Branch<Material>>,
    },
    Duplifix {
        span: DuplicationSpan,
        edge: Edge,
        /// Linking material between the copy and the stem.
        branches: Vec<Branch<Material>>,
    },
    Transfix {
        partial: bool,
        branches: Vec<Branch<Material>>,
    },
    Simulfix(Vec<Branch<Rule>>),
    Disfix(Vec<Branch<SyllableRange>>),
    Suprafix {
        parameter: Option<String>,
        branches: Vec<Branch<String>>,
    },
}

/// A parsed affix specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affix {
    source: String,
    kind: AffixKind,
}

impl Affix {
    /// The text the affix was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn kind(&self) -> &AffixKind {
        &self.kind
    }

    /// Lower-case name of the strategy.
    pub fn strategy(&self) -> &'static str {
        match self.kind {
            AffixKind::Prefix(_) => "prefix",
            AffixKind::Suffix(_) => "suffix",
            AffixKind::Circumfix(_) => "circumfix",
            AffixKind::Infix { .. } => "infix",
            AffixKind::Duplifix { .. } => "duplifix",
            AffixKind::Transfix { .. } => "transfix",
            AffixKind::Simulfix(_) => "simulfix",
            AffixKind::Disfix(_) => "disfix",
            AffixKind::Suprafix { .. } => "suprafix",
        }
    }
}

/// A piece of the affix text with its character offset.
#[derive(Debug, Clone, Copy)]
struct Piece<'t> {
    text: &'t str,
    column: usize,
}

impl<'t> Piece<'t> {
    fn new(text: &'t str, column: usize) -> Self {
        Piece { text, column }
    }

    /// Split at the first `c`; the right piece excludes `c`.
    fn split_once(self, c: char) -> Option<(Piece<'t>, Piece<'t>)> {
        let (left, right) = self.text.split_once(c)?;
        let right_column = self.column + left.chars().count() + 1;
        Some((Piece::new(left, self.column), Piece::new(right, right_column)))
    }

    fn split(self, c: char) -> Vec<Piece<'t>> {
        let mut pieces = Vec::new();
        let mut column = self.column;
        for part in self.text.split(c) {
            pieces.push(Piece::new(part, column));
            column += part.chars().count() + 1;
        }
        pieces
    }

    /// Trim whitespace, keeping the column of the first kept character.
    fn trim(self) -> Piece<'t> {
        let leading = self.text.chars().take_while(|c| c.is_whitespace()).count();
        Piece::new(self.text.trim(), self.column + leading)
    }

    fn error(self, message: &str) -> EngineError {
        let token = if self.text.is_empty() {
            "end of input".to_string()
        } else {
            self.text.to_string()
        };
        EngineError::syntax(self.column + 1, token, message)
    }
}

/// Parse an affix specification.
pub fn parse_affix(text: &str) -> Result<Affix> {
    let whole = Piece::new(text, 0);
    let Some((header, body)) = whole.split_once(':') else {
        return Err(whole.trim().error("expected `kind: material`"));
    };
    let header = header.trim();
    let (name, parameter) = match header.split_once('(') {
        Some((name, rest)) => {
            let rest = rest.trim();
            let Some(inner) = rest.text.strip_suffix(')') else {
                return Err(rest.error("unclosed `(` in affix header"));
            };
            (name.trim(), Some(Piece::new(inner, rest.column).trim()))
        }
        None => (header, None),
    };

    let branches = body.split(';');
    let kind = match name.text.to_ascii_lowercase().as_str() {
        "prefix" => {
            no_parameter(parameter)?;
            AffixKind::Prefix(parse_branches(&branches, |m| {
                material(strip_hyphens(m, false, true))
            })?)
        }
        "suffix" => {
            no_parameter(parameter)?;
            AffixKind::Suffix(parse_branches(&branches, |m| {
                material(strip_hyphens(m, true, false))
            })?)
        }
        "circumfix" => {
            no_parameter(parameter)?;
            AffixKind::Circumfix(parse_branches(&branches, |m| {
                let m = m.trim();
                let Some((before, after)) = m.split_once('-') else {
                    return Err(m.error("a circumfix needs `-` where the stem goes"));
                };
                Ok(Circumfix {
                    before: material_or_empty(before)?,
                    after: material_or_empty(after)?,
                })
            })?)
        }
        "infix" => {
            let Some(parameter) = parameter else {
                return Err(name.error("an infix needs `(after syllable N)` or `(before syllable N)`"));
            };
            let position = parse_infix_position(parameter)?;
            AffixKind::Infix {
                position,
                branches: parse_branches(&branches, |m| material(strip_hyphens(m, true, true)))?,
            }
        }
        "duplifix" => {
            let (span, edge) = match parameter {
                Some(parameter) => parse_duplication(parameter)?,
                None => (DuplicationSpan::All, Edge::Left),
            };
            AffixKind::Duplifix {
                span,
                edge,
                branches: parse_branches(&branches, material)?,
            }
        }
        "transfix" => {
            let partial = match parameter {
                None => false,
                Some(p) if p.text.eq_ignore_ascii_case("partial") => true,
                Some(p) => return Err(p.error("expected `partial`")),
            };
            AffixKind::Transfix {
                partial,
                branches: parse_branches(&branches, material)?,
            }
        }
        "simulfix" => {
            no_parameter(parameter)?;
            AffixKind::Simulfix(parse_branches(&branches, |m| {
                let m = m.trim();
                parse_rule_at(m.text, m.column)
            })?)
        }
        "disfix" => {
            no_parameter(parameter)?;
            AffixKind::Disfix(parse_branches(&branches, parse_syllable_range)?)
        }
        "suprafix" => AffixKind::Suprafix {
            parameter: parameter.map(|p| p.text.to_string()),
            branches: parse_branches(&branches, |m| Ok(m.trim().text.to_string()))?,
        },
        _ => return Err(name.error("unknown affix kind")),
    };
    Ok(Affix {
        source: text.trim().to_string(),
        kind,
    })
}

fn no_parameter(parameter: Option<Piece<'_>>) -> Result<()> {
    match parameter {
        Some(p) => Err(p.error("this affix kind takes no parameter")),
        None => Ok(()),
    }
}

fn parse_branches<'t, M>(
    pieces: &[Piece<'t>],
    mut parse_material_piece: impl FnMut(Piece<'t>) -> Result<M>,
) -> Result<Vec<Branch<M>>> {
    let mut branches = Vec::with_capacity(pieces.len());
    for &piece in pieces {
        let (material_piece, condition) = match piece.split_once('|') {
            Some((m, c)) => (m, Condition::parse(c.text, c.column)?),
            None => (piece, Condition::Always),
        };
        if material_piece.trim().text.is_empty() {
            return Err(material_piece.trim().error("expected affix material or `0`"));
        }
        branches.push(Branch {
            material: parse_material_piece(material_piece)?,
            condition,
        });
    }
    Ok(branches)
}

fn material(piece: Piece<'_>) -> Result<Material> {
    parse_material(piece.text, piece.column)
}

/// Like `material`, but a blank side of a circumfix means no material.
fn material_or_empty(piece: Piece<'_>) -> Result<Material> {
    if piece.text.trim().is_empty() {
        Ok(Vec::new())
    } else {
        material(piece)
    }
}

/// Drop a conventional leading and/or trailing hyphen (`-ne`, `ke-`, `-um-`).
fn strip_hyphens(piece: Piece<'_>, leading: bool, trailing: bool) -> Piece<'_> {
    let mut piece = piece.trim();
    if let (true, Some(rest)) = (leading, piece.text.strip_prefix('-')) {
        piece = Piece::new(rest, piece.column + 1);
    }
    if let (true, Some(rest)) = (trailing, piece.text.strip_suffix('-')) {
        piece = Piece::new(rest, piece.column);
    }
    piece
}

fn parse_count(piece: Piece<'_>) -> Result<usize> {
    let piece = piece.trim();
    piece
        .text
        .parse::<usize>()
        .map_err(|_| piece.error("expected a number"))
}

fn parse_infix_position(parameter: Piece<'_>) -> Result<InfixPosition> {
    let words: Vec<&str> = parameter.text.split_whitespace().collect();
    let position = match words.as_slice() {
        [side, syllable, n] if syllable.eq_ignore_ascii_case("syllable") => {
            let n = n
                .parse::<usize>()
                .map_err(|_| parameter.error("expected a syllable number"))?;
            match side.to_ascii_lowercase().as_str() {
                "after" => InfixPosition::After(n),
                "before" if n >= 1 => InfixPosition::Before(n),
                "before" => return Err(parameter.error("syllables count from 1")),
                _ => return Err(parameter.error("expected `after` or `before`")),
            }
        }
        _ => return Err(parameter.error("expected `after syllable N` or `before syllable N`")),
    };
    Ok(position)
}

fn parse_duplication(parameter: Piece<'_>) -> Result<(DuplicationSpan, Edge)> {
    let (count, edge) = match parameter.split_once(',') {
        Some((count, edge)) => (count.trim(), Some(edge.trim())),
        None => (parameter, None),
    };
    let span = if count.text.eq_ignore_ascii_case("all") {
        DuplicationSpan::All
    } else {
        match parse_count(count)? {
            0 => return Err(count.error("copy at least one syllable")),
            n => DuplicationSpan::Syllables(n),
        }
    };
    let edge = match edge {
        None => Edge::Left,
        Some(e) if e.text.eq_ignore_ascii_case("left") => Edge::Left,
        Some(e) if e.text.eq_ignore_ascii_case("right") => Edge::Right,
        Some(e) => return Err(e.error("expected `left` or `right`")),
    };
    Ok((span, edge))
}

fn parse_syllable_range(piece: Piece<'_>) -> Result<SyllableRange> {
    let piece = piece.trim();
    let (first, last) = match piece.split_once('-') {
        Some((first, last)) => (parse_count(first)?, parse_count(last)?),
        None => {
            let n = parse_count(piece)?;
            (n, n)
        }
    };
    if first == 0 || last < first {
        return Err(piece.error("expected syllables `N` or `N-M` with 1 <= N <= M"));
    }
    Ok(SyllableRange { first, last })
}

fn write_branches<M>(
    f: &mut fmt::Formatter<'_>,
    branches: &[Branch<M>],
    mut write_material: impl FnMut(&mut fmt::Formatter<'_>, &M) -> fmt::Result,
) -> fmt::Result {
    for (i, branch) in branches.iter().enumerate() {
        if i > 0 {
            write!(f, "; ")?;
        }
        write_material(f, &branch.material)?;
        if branch.condition != Condition::Always {
            write!(f, " | {}", branch.condition)?;
        }
    }
    Ok(())
}

fn write_sequence(f: &mut fmt::Formatter<'_>, m: &Material) -> fmt::Result {
    write!(f, "{}", Sequence(m))
}

impl fmt::Display for Affix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            AffixKind::Prefix(b) => {
                write!(f, "prefix: ")?;
                write_branches(f, b, write_sequence)
            }
            AffixKind::Suffix(b) => {
                write!(f, "suffix: ")?;
                write_branches(f, b, write_sequence)
            }
            AffixKind::Circumfix(b) => {
                write!(f, "circumfix: ")?;
                write_branches(f, b, |f, c| {
                    write!(f, "{}-{}", Sequence(&c.before), Sequence(&c.after))
                })
            }
            AffixKind::Infix { position, branches } => {
                match position {
                    InfixPosition::After(n) => write!(f, "infix(after syllable {n}): ")?,
                    InfixPosition::Before(n) => write!(f, "infix(before syllable {n}): ")?,
                }
                write_branches(f, branches, write_sequence)
            }
            AffixKind::Duplifix {
                span,
                edge,
                branches,
            } => {
                let edge = match edge {
                    Edge::Left => "left",
                    Edge::Right => "right",
                };
                match span {
                    DuplicationSpan::All => write!(f, "duplifix(all, {edge}): ")?,
                    DuplicationSpan::Syllables(n) => write!(f, "duplifix({n}, {edge}): ")?,
                }
                write_branches(f, branches, write_sequence)
            }
            AffixKind::Transfix { partial, branches } => {
                write!(f, "{}: ", if *partial { "transfix(partial)" } else { "transfix" })?;
                write_branches(f, branches, write_sequence)
            }
            AffixKind::Simulfix(b) => {
                write!(f, "simulfix: ")?;
                write_branches(f, b, |f, rule| write!(f, "{rule}"))
            }
            AffixKind::Disfix(b) => {
                write!(f, "disfix: ")?;
                write_branches(f, b, |f, r| {
                    if r.first == r.last {
                        write!(f, "{}", r.first)
                    } else {
                        write!(f, "{}-{}", r.first, r.last)
                    }
                })
            }
            AffixKind::Suprafix {
                parameter,
                branches,
            } => {
                match parameter {
                    Some(p) => write!(f, "suprafix({p}): ")?,
                    None => write!(f, "suprafix: ")?,
                }
                write_branches(f, branches, |f, s| write!(f, "{s}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> PatternElement {
        PatternElement::Literal(s.to_string())
    }

    #[test]
    fn test_prefix_and_suffix() {
        let affix = parse_affix("prefix: ke-").unwrap();
        assert_eq!(affix.strategy(), "prefix");
        match affix.kind() {
            AffixKind::Prefix(branches) => assert_eq!(branches[0].material, vec![lit("ke")]),
            other => panic!("unexpected {other:?}"),
        }
        let affix = parse_affix("suffix: -ne").unwrap();
        assert!(matches!(affix.kind(), AffixKind::Suffix(b) if b[0].material == vec![lit("ne")]));
    }

    #[test]
    fn test_circumfix_branches_in_order() {
        let affix = parse_affix("circumfix: ke-t | Starts with: C; k-t | Starts with: V").unwrap();
        let AffixKind::Circumfix(branches) = affix.kind() else {
            panic!("not a circumfix");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].material.before, vec![lit("ke")]);
        assert_eq!(branches[0].material.after, vec![lit("t")]);
        assert_eq!(
            branches[1].condition,
            Condition::StartsWith(vec![PatternElement::Abbreviation('V')])
        );
    }

    #[test]
    fn test_parameters() {
        assert!(matches!(
            parse_affix("infix(after syllable 1): -um-").unwrap().kind(),
            AffixKind::Infix { position: InfixPosition::After(1), .. }
        ));
        assert!(matches!(
            parse_affix("duplifix(2, right): 0").unwrap().kind(),
            AffixKind::Duplifix { span: DuplicationSpan::Syllables(2), edge: Edge::Right, .. }
        ));
        assert!(matches!(
            parse_affix("transfix(partial): L1iL2").unwrap().kind(),
            AffixKind::Transfix { partial: true, .. }
        ));
        assert!(matches!(
            parse_affix("disfix: 1-2").unwrap().kind(),
            AffixKind::Disfix(b) if b[0].material == SyllableRange { first: 1, last: 2 }
        ));
        assert!(matches!(
            parse_affix("suprafix(tone): high").unwrap().kind(),
            AffixKind::Suprafix { parameter: Some(p), .. } if p == "tone"
        ));
    }

    #[test]
    fn test_simulfix_embeds_a_rule() {
        let affix = parse_affix("simulfix: a -> o / _#").unwrap();
        let AffixKind::Simulfix(branches) = affix.kind() else {
            panic!("not a simulfix");
        };
        assert_eq!(branches[0].material.to_string(), "a -> o / _#");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            parse_affix("glomfix: a"),
            Err(EngineError::Syntax { column: 1, .. })
        ));
        assert!(matches!(
            parse_affix("circumfix: ket"),
            Err(EngineError::Syntax { column: 12, .. })
        ));
        assert!(matches!(
            parse_affix("prefix: k[vowel]"),
            Err(EngineError::Syntax { column: 10, .. })
        ));
        assert!(parse_affix("infix: um").is_err());
        assert!(matches!(
            parse_affix("circumfix: ke-").unwrap().kind(),
            AffixKind::Circumfix(b) if b[0].material.after.is_empty()
        ));
        assert!(parse_affix("prefix(1): ke").is_err());
        assert!(parse_affix("disfix: 3-2").is_err());
        assert!(parse_affix("suffix: ne;").is_err());
        assert!(parse_affix("simulfix: a o").is_err());
        assert!(parse_affix("prefix ke").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for text in [
            "prefix: ke",
            "circumfix: ke-t | Starts with: C; k-t | Starts with: V",
            "infix(before syllable 2): um",
            "duplifix(all, right): 0",
            "transfix: L1aL2aL3",
            "simulfix: a -> o / _#",
            "disfix: 2",
            "suprafix: high",
        ] {
            let affix = parse_affix(text).unwrap();
            assert_eq!(affix.to_string(), text);
            assert_eq!(parse_affix(&affix.to_string()).unwrap(), affix);
        }
    }
}
