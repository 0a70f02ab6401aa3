// Affix application: one function per attachment strategy.
//
// The first branch whose condition holds on the input word supplies the
// material. Literal material is segmented against the inventory, `L<n>`
// copies the n-th stem letter and `'` stresses the next produced segment.
//
// The stem of the result is the input's stem wherever it ended up, or the
// whole input when no stem was marked, so affixes stack: a suffix added on
// top of a prefixed word still attaches outside the first affix. Transfix
// and simulfix rewrite the stem in place, so their material joins the stem.
//
// Syllable numbers in infix, duplifix and disfix parameters count stem
// syllables from 1. A parameter naming a syllable the stem does not have is
// a `Bounds` error, never a silent no-op.

use tracing::debug;

use crate::affix::{
    Affix, AffixKind, Branch, DuplicationSpan, Edge, InfixPosition, Material, SyllableRange,
};
use crate::applier::{materialize, missing_letter};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::inventory::Inventory;
use crate::matcher::Matcher;
use crate::pattern::{PatternElement, Rule};
use crate::word::{Edit, Segment, Word, WordBuilder};

/// Attach `affix` to `word`.
pub fn apply_affix(
    inventory: &Inventory,
    config: &EngineConfig,
    affix: &Affix,
    word: &Word,
) -> Result<Word> {
    let matcher = Matcher::new(inventory, config, word);
    let out = match affix.kind() {
        AffixKind::Prefix(branches) => {
            let material = segments(&matcher, select(branches, &matcher, affix)?)?;
            let mut builder = WordBuilder::new();
            builder.push_segments(material);
            push_with_stem(&mut builder, word);
            builder.finish()
        }
        AffixKind::Suffix(branches) => {
            let material = segments(&matcher, select(branches, &matcher, affix)?)?;
            let mut builder = WordBuilder::new();
            push_with_stem(&mut builder, word);
            builder.push_segments(material);
            builder.finish()
        }
        AffixKind::Circumfix(branches) => {
            let parts = select(branches, &matcher, affix)?;
            let before = segments(&matcher, &parts.before)?;
            let after = segments(&matcher, &parts.after)?;
            let mut builder = WordBuilder::new();
            builder.push_segments(before);
            push_with_stem(&mut builder, word);
            builder.push_segments(after);
            builder.finish()
        }
        AffixKind::Infix { position, branches } => {
            let material = segments(&matcher, select(branches, &matcher, affix)?)?;
            infix(word, *position, material)?
        }
        AffixKind::Duplifix {
            span,
            edge,
            branches,
        } => {
            let link = segments(&matcher, select(branches, &matcher, affix)?)?;
            duplifix(word, *span, *edge, link)?
        }
        AffixKind::Transfix { partial, branches } => {
            let template = select(branches, &matcher, affix)?;
            transfix(&matcher, template, *partial)?
        }
        AffixKind::Simulfix(branches) => simulfix(&matcher, select(branches, &matcher, affix)?)?,
        AffixKind::Disfix(branches) => disfix(word, *select(branches, &matcher, affix)?)?,
        AffixKind::Suprafix { .. } => return Err(EngineError::NotImplemented("suprafix")),
    };
    debug!(affix = %affix, before = %word, after = %out, "affix applied");
    Ok(out)
}

/// The material of the first branch whose condition holds.
fn select<'b, M>(branches: &'b [Branch<M>], matcher: &Matcher<'_>, affix: &Affix) -> Result<&'b M> {
    branches
        .iter()
        .find(|branch| branch.condition.holds(matcher))
        .map(|branch| &branch.material)
        .ok_or_else(|| EngineError::NoApplicableAffixRule {
            affix: affix.source().to_string(),
            word: matcher.word().to_string(),
        })
}

/// Materialize affix material against the input word.
fn segments(matcher: &Matcher<'_>, material: &Material) -> Result<Vec<Segment>> {
    let word = matcher.word();
    let mut out: Vec<Segment> = Vec::new();
    let mut stress_next = false;
    for elem in material {
        let start = out.len();
        match elem {
            PatternElement::Literal(text) => {
                out.extend(
                    matcher
                        .inventory()
                        .segment(text)?
                        .into_iter()
                        .map(Segment::from),
                );
            }
            PatternElement::StemLetter(n) => {
                let segment = matcher
                    .stem_letter(*n)
                    .and_then(|i| word.segment(i))
                    .ok_or_else(|| missing_letter(*n, matcher))?;
                out.push(segment.with_stress(false));
            }
            PatternElement::Stress => {
                stress_next = true;
                continue;
            }
            _ => {}
        }
        if stress_next && out.len() > start {
            out[start] = out[start].with_stress(true);
            stress_next = false;
        }
    }
    Ok(out)
}

fn syllable_bounds(word: &Word, message: String) -> EngineError {
    let stem = word.stem_range();
    EngineError::Bounds {
        start: stem.start,
        end: stem.end,
        len: word.len(),
        message,
    }
}

/// Copy `word` into `builder`, marking its stem (or the whole word) as the
/// stem of the result.
fn push_with_stem(builder: &mut WordBuilder, word: &Word) {
    let stem = word.stem_range();
    builder.push_span(word, 0..stem.start);
    builder.stem_start();
    builder.push_span(word, stem.clone());
    builder.stem_end();
    builder.push_span(word, stem.end..word.len());
}

/// Keep an existing stem; otherwise the whole word becomes the stem.
fn with_whole_stem(word: &Word) -> Result<Word> {
    match word.stem() {
        Some(_) => Ok(word.clone()),
        None => word.clone().with_stem(0, word.len()),
    }
}

fn infix(word: &Word, position: InfixPosition, material: Vec<Segment>) -> Result<Word> {
    let stem = word.stem_range();
    let syllables = word.syllables_in(stem.clone());
    let gap = match position {
        InfixPosition::After(0) => Some(stem.start),
        InfixPosition::After(n) => syllables.get(n - 1).map(|s| s.end),
        InfixPosition::Before(n) => syllables.get(n - 1).map(|s| s.start),
    };
    let Some(gap) = gap else {
        return Err(syllable_bounds(
            word,
            format!("stem has {} syllables, no {position:?}", syllables.len()),
        ));
    };
    let base = with_whole_stem(word)?;
    Ok(base.splice(&[Edit {
        start: gap,
        end: gap,
        segments: material,
    }]))
}

fn duplifix(word: &Word, span: DuplicationSpan, edge: Edge, link: Vec<Segment>) -> Result<Word> {
    let stem = word.stem_range();
    let syllables = word.syllables_in(stem.clone());
    let count = match span {
        DuplicationSpan::All => syllables.len(),
        DuplicationSpan::Syllables(n) => n,
    };
    if count == 0 || count > syllables.len() {
        return Err(syllable_bounds(
            word,
            format!(
                "cannot copy {count} syllables from a stem of {}",
                syllables.len()
            ),
        ));
    }
    let mut builder = WordBuilder::new();
    builder.push_span(word, 0..stem.start);
    match edge {
        Edge::Left => {
            let copy = stem.start..syllables[count - 1].end;
            builder.push_span(word, copy);
            builder.push_segments(link);
            builder.syllable_break();
            builder.stem_start();
            builder.push_span(word, stem.clone());
            builder.stem_end();
        }
        Edge::Right => {
            let copy = syllables[syllables.len() - count].start..stem.end;
            builder.stem_start();
            builder.push_span(word, stem.clone());
            builder.stem_end();
            builder.syllable_break();
            builder.push_segments(link);
            builder.push_span(word, copy);
        }
    }
    builder.push_span(word, stem.end..word.len());
    Ok(builder.finish())
}

fn transfix(matcher: &Matcher<'_>, template: &Material, partial: bool) -> Result<Word> {
    let word = matcher.word();
    let stem = word.stem_range();
    let replaced_end = if partial {
        let highest = template
            .iter()
            .filter_map(|elem| match elem {
                PatternElement::StemLetter(n) => Some(*n),
                _ => None,
            })
            .max();
        match highest {
            Some(n) => {
                let i = matcher
                    .stem_letter(n)
                    .ok_or_else(|| missing_letter(n, matcher))?;
                i + 1
            }
            None => stem.start,
        }
    } else {
        stem.end
    };
    let material = segments(matcher, template)?;
    let mut builder = WordBuilder::new();
    builder.push_span(word, 0..stem.start);
    builder.stem_start();
    builder.push_segments(material);
    builder.push_span(word, replaced_end..stem.end);
    builder.stem_end();
    builder.push_span(word, stem.end..word.len());
    Ok(builder.finish())
}

/// Apply `rule` at its first match lying wholly inside the stem.
fn simulfix(matcher: &Matcher<'_>, rule: &Rule) -> Result<Word> {
    let word = matcher.word();
    let stem = word.stem_range();
    let found = (stem.start..=stem.end)
        .filter_map(|pos| matcher.rule_match_at(rule, pos))
        .find(|found| found.end <= stem.end)
        .ok_or_else(|| {
            syllable_bounds(word, format!("`{rule}` does not match inside the stem"))
        })?;
    let replacement = materialize(matcher, rule, &found)?;
    let base = with_whole_stem(word)?;
    Ok(base.splice(&[Edit {
        start: found.start,
        end: found.end,
        segments: replacement,
    }]))
}

fn disfix(word: &Word, range: SyllableRange) -> Result<Word> {
    let stem = word.stem_range();
    let syllables = word.syllables_in(stem);
    if range.last > syllables.len() {
        return Err(syllable_bounds(
            word,
            format!(
                "stem has {} syllables, cannot remove {}..={}",
                syllables.len(),
                range.first,
                range.last
            ),
        ));
    }
    let base = with_whole_stem(word)?;
    Ok(base.splice(&[Edit {
        start: syllables[range.first - 1].start,
        end: syllables[range.last - 1].end,
        segments: Vec::new(),
    }]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affix::parse_affix;
    use crate::inventory::default_inventory;

    fn attach(spec: &str, notation: &str) -> Result<Word> {
        let inventory = default_inventory();
        let config = EngineConfig::default();
        let word = Word::parse(&inventory, notation).unwrap();
        apply_affix(&inventory, &config, &parse_affix(spec).unwrap(), &word)
    }

    fn shown(spec: &str, notation: &str) -> String {
        attach(spec, notation).unwrap().to_string()
    }

    #[test]
    fn test_prefix_and_suffix_mark_the_stem() {
        assert_eq!(shown("prefix: ke-", "tuk"), "ke<tuk>");
        assert_eq!(shown("suffix: -ne", "ta.ka"), "<ta.ka>ne");
        assert_eq!(shown("suffix: -ne", "ke<tuk>"), "ke<tuk>ne");
    }

    #[test]
    fn test_circumfix_picks_branch_by_condition() {
        let spec = "circumfix: ke-t | Starts with: C; k-t | Starts with: V";
        assert_eq!(attach(spec, "tuk").unwrap().text(), "ketukt");
        assert_eq!(attach(spec, "uk").unwrap().text(), "kukt");
    }

    #[test]
    fn test_no_applicable_branch() {
        let err = attach("prefix: a | Starts with: V", "tuk").unwrap_err();
        assert!(matches!(err, EngineError::NoApplicableAffixRule { .. }));
    }

    #[test]
    fn test_infix_positions() {
        assert_eq!(shown("infix(after syllable 1): -um-", "ta.ka"), "<taum.ka>");
        assert_eq!(shown("infix(after syllable 0): um", "ta.ka"), "um<ta.ka>");
        assert_eq!(shown("infix(before syllable 2): um", "ta.ka"), "<taum.ka>");
        assert!(matches!(
            attach("infix(after syllable 3): um", "ta.ka"),
            Err(EngineError::Bounds { .. })
        ));
    }

    #[test]
    fn test_duplifix() {
        assert_eq!(shown("duplifix(1, left): 0", "ta.ka"), "ta.<ta.ka>");
        assert_eq!(shown("duplifix(all, left): 0", "ta.ka"), "ta.ka.<ta.ka>");
        assert_eq!(shown("duplifix(1, right): 0", "ta.ka"), "<ta.ka>.ka");
        assert_eq!(shown("duplifix(1, left): i", "ta.ka"), "tai.<ta.ka>");
        assert!(matches!(
            attach("duplifix(3, left): 0", "ta.ka"),
            Err(EngineError::Bounds { .. })
        ));
    }

    #[test]
    fn test_transfix() {
        assert_eq!(shown("transfix: L1aL2aL3", "ktb"), "<katab>");
        assert_eq!(shown("transfix(partial): L1iL2", "ktba"), "<kitba>");
        assert!(matches!(
            attach("transfix: L1aL2aL3aL4", "ktb"),
            Err(EngineError::Bounds { .. })
        ));
    }

    #[test]
    fn test_simulfix_changes_inside_stem_only() {
        assert_eq!(shown("simulfix: a -> o", "ta.ka"), "<to.ka>");
        assert_eq!(shown("simulfix: a -> o", "ta<ka>"), "ta<ko>");
        assert!(matches!(
            attach("simulfix: i -> e", "ta.ka"),
            Err(EngineError::Bounds { .. })
        ));
    }

    #[test]
    fn test_disfix_removes_stem_syllables() {
        assert_eq!(shown("disfix: 2", "ta.ka.ma"), "<ta.ma>");
        assert_eq!(shown("disfix: 1-2", "ta.ka.ma"), "<ma>");
        assert!(matches!(
            attach("disfix: 4", "ta.ka.ma"),
            Err(EngineError::Bounds { .. })
        ));
    }

    #[test]
    fn test_stress_in_material() {
        let word = attach("prefix: 'ke", "tuk").unwrap();
        assert!(word.segments()[0].is_stressed());
        assert!(!word.segments()[1].is_stressed());
    }

    #[test]
    fn test_unknown_phoneme_in_material() {
        assert!(matches!(
            attach("prefix: q", "tuk"),
            Err(EngineError::UnknownPhoneme(_))
        ));
    }

    #[test]
    fn test_suprafix_is_not_implemented() {
        assert!(matches!(
            attach("suprafix(tone): high", "tuk"),
            Err(EngineError::NotImplemented("suprafix"))
        ));
    }
}
