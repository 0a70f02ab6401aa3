// Rule application: one left-to-right, non-overlapping pass per rule.
//
// The scan walks gaps 0..=len of the *input* word. At each gap it asks the
// matcher for a rule match (target plus both environments, all evaluated on
// the input, never on partial output). A match with a nonempty span becomes
// an edit and scanning resumes at its end. A zero-width match (epenthesis,
// or an optional target found absent) inserts at that gap and the scan then
// steps past the next input segment, so a gap is never filled twice.
//
// Replacement slots are aligned with target slots by index (zero-width
// elements take no slot). Each replacement slot materializes as:
//
//   literal          its segmentation into registered phonemes
//   L<n>             a copy of the n-th stem letter
//   class / abbrev.  a feature change on the aligned matched segment(s)
//   list             the alternative at the index the aligned target list chose
//
// A feature change drops the target class's tags that the replacement does
// not repeat (when it names any tags at all), applies the replacement's
// removals and pairs, adds its tags (displacing contrasting tags such as
// voiced/voiceless), then picks the registered phoneme with exactly that
// descriptor set, or failing that the one containing it with the fewest
// extra tags. If neither exists the segment is kept and a warning is logged.
//
// A replacement that cannot be built for a match (a literal outside the
// inventory, a stem letter the word lacks) leaves that match's span as it was
// and logs a warning. `Engine::rule` rejects unknown literals before any of
// this runs.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::features::{contrasts, is_stress};
use crate::inventory::Inventory;
use crate::matcher::{Capture, MatchResult, Matcher};
use crate::pattern::{DescriptorTerm, PatternElement, Rule, slot_indices};
use crate::word::{Edit, Segment, Word};

/// The result of applying a rule to one word of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub word: Word,
    /// False when the rule found nothing to change.
    pub changed: bool,
}

/// Apply `rule` once across `word`.
pub fn apply_rule(inventory: &Inventory, config: &EngineConfig, rule: &Rule, word: &Word) -> Word {
    let matcher = Matcher::new(inventory, config, word);
    let len = word.len();
    let mut edits = Vec::new();
    let mut pos = 0;
    while pos <= len {
        let Some(found) = matcher.rule_match_at(rule, pos) else {
            pos += 1;
            continue;
        };
        let segments = match materialize(&matcher, rule, &found) {
            Ok(segments) => segments,
            Err(err) => {
                warn!(rule = %rule, word = %word, error = %err, "replacement unresolved; span kept");
                pos = found.end.max(pos + 1);
                continue;
            }
        };
        trace!(rule = %rule, start = found.start, end = found.end, "rule matched");
        if found.end > found.start {
            edits.push(Edit {
                start: found.start,
                end: found.end,
                segments,
            });
            pos = found.end;
        } else {
            if !segments.is_empty() {
                edits.push(Edit {
                    start: pos,
                    end: pos,
                    segments,
                });
            }
            pos += 1;
        }
    }
    if edits.is_empty() {
        return word.clone();
    }
    let out = word.splice(&edits);
    if out != *word {
        debug!(rule = %rule, before = %word, after = %out, "rule applied");
    }
    out
}

/// Apply `rules` one after another, each to the previous result.
pub fn apply_rules<'r>(
    inventory: &Inventory,
    config: &EngineConfig,
    rules: impl IntoIterator<Item = &'r Rule>,
    word: &Word,
) -> Word {
    rules.into_iter().fold(word.clone(), |current, rule| {
        apply_rule(inventory, config, rule, &current)
    })
}

/// Build the replacement segments for one match.
pub(crate) fn materialize(
    matcher: &Matcher<'_>,
    rule: &Rule,
    found: &MatchResult,
) -> Result<Vec<Segment>> {
    let target = rule.target();
    let target_slots = slot_indices(target);
    let mut out = Vec::new();
    let mut stress_next = false;
    let mut slot = 0;
    for elem in rule.replacement() {
        if let PatternElement::Stress = elem {
            stress_next = true;
            continue;
        }
        let aligned = target_slots
            .get(slot)
            .map(|&i| (&target[i], &found.captures[i]));
        slot += 1;
        let produced = emit(matcher, elem, aligned)?;
        if stress_next && !produced.is_empty() {
            stress_next = false;
            out.push(produced[0].with_stress(true));
            out.extend(produced.into_iter().skip(1));
        } else {
            out.extend(produced);
        }
    }
    Ok(out)
}

pub(crate) fn missing_letter(n: usize, matcher: &Matcher<'_>) -> EngineError {
    let stem = matcher.word().stem_range();
    EngineError::Bounds {
        start: stem.start,
        end: stem.end,
        len: matcher.word().len(),
        message: format!(
            "stem has {} letters, L{n} does not exist",
            matcher.stem_letter_count()
        ),
    }
}

fn emit(
    matcher: &Matcher<'_>,
    elem: &PatternElement,
    aligned: Option<(&PatternElement, &Capture)>,
) -> Result<Vec<Segment>> {
    let word = matcher.word();
    let segments = match elem {
        PatternElement::Literal(run) => {
            let phonemes = matcher.inventory().segment(run)?;
            // A one-for-one replacement inherits the matched stress.
            let matched = aligned.map(|(_, capture)| &word.segments()[capture.span()]);
            match matched {
                Some(matched) if matched.len() == phonemes.len() => phonemes
                    .into_iter()
                    .zip(matched)
                    .map(|(phoneme, old)| Segment::new(phoneme, old.is_stressed()))
                    .collect(),
                _ => phonemes.into_iter().map(Segment::from).collect(),
            }
        }
        PatternElement::StemLetter(n) => {
            let i = matcher
                .stem_letter(*n)
                .ok_or_else(|| missing_letter(*n, matcher))?;
            vec![word.segments()[i].clone()]
        }
        PatternElement::Class(_) | PatternElement::Abbreviation(_) => {
            let Some((target, capture)) = aligned else {
                return Ok(Vec::new());
            };
            let Some(terms) = class_terms(matcher.config(), elem) else {
                return Ok(word.segments()[capture.span()].to_vec());
            };
            let removed = class_terms(matcher.config(), target).unwrap_or_default();
            word.segments()[capture.span()]
                .iter()
                .map(|segment| change_features(matcher.inventory(), segment, &removed, &terms))
                .collect()
        }
        PatternElement::List(alternatives) => {
            let chosen = aligned.and_then(|(_, capture)| capture.alternative);
            match chosen.and_then(|i| alternatives.get(i)) {
                Some(alternative) => {
                    let mut out = Vec::new();
                    let mut stress_next = false;
                    for inner in alternative {
                        if let PatternElement::Stress = inner {
                            stress_next = true;
                            continue;
                        }
                        for (k, segment) in emit(matcher, inner, aligned)?.into_iter().enumerate() {
                            out.push(if k == 0 && stress_next {
                                segment.with_stress(true)
                            } else {
                                segment
                            });
                        }
                        stress_next = false;
                    }
                    out
                }
                None => {
                    return Err(EngineError::AmbiguousCorrelation {
                        target: aligned.map(|(t, _)| t.to_string()).unwrap_or_default(),
                        replacement: elem.to_string(),
                        message: "replacement list has no chosen alternative to follow".into(),
                    });
                }
            }
        }
        // Rejected by the parser in replacements.
        PatternElement::Optional(_)
        | PatternElement::Not(_)
        | PatternElement::Boundary(_)
        | PatternElement::Stress
        | PatternElement::Wildcard => Vec::new(),
    };
    Ok(segments)
}

/// Descriptor terms of a class or abbreviation element.
fn class_terms(config: &EngineConfig, elem: &PatternElement) -> Option<Vec<DescriptorTerm>> {
    match elem {
        PatternElement::Class(terms) => Some(terms.clone()),
        PatternElement::Abbreviation(letter) => config
            .abbreviation(*letter)
            .map(|class| vec![DescriptorTerm::Has(class.to_string())]),
        _ => None,
    }
}

/// Rewrite one segment's descriptors as `[target] -> [replacement]` asks.
fn change_features(
    inventory: &Inventory,
    segment: &Segment,
    target: &[DescriptorTerm],
    replacement: &[DescriptorTerm],
) -> Segment {
    let features = inventory.features();
    let expand = |name: &str| -> Vec<String> {
        features
            .expand(name)
            .map(|tags| tags.into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    };
    let kept: BTreeSet<String> = replacement
        .iter()
        .filter_map(|term| match term {
            DescriptorTerm::Has(name) if !is_stress(name) => Some(expand(name)),
            _ => None,
        })
        .flatten()
        .collect();

    let mut stressed = segment.is_stressed();
    let mut wanted = segment.phoneme().descriptors().clone();
    // A replacement made only of removals or stress keeps the target's tags.
    if !kept.is_empty() {
        for term in target {
            if let DescriptorTerm::Has(name) = term {
                if is_stress(name) {
                    continue;
                }
                for tag in expand(name) {
                    if !kept.contains(&tag) {
                        wanted.remove(&tag);
                    }
                }
            }
        }
    }
    let add = |wanted: &mut BTreeSet<String>, tag: String| {
        for other in contrasts(&tag) {
            wanted.remove(other);
        }
        wanted.insert(tag);
    };
    for term in replacement {
        match term {
            DescriptorTerm::Has(name) if is_stress(name) => stressed = true,
            DescriptorTerm::Lacks(name) if is_stress(name) => stressed = false,
            DescriptorTerm::Has(name) => {
                for tag in expand(name) {
                    add(&mut wanted, tag);
                }
            }
            DescriptorTerm::Lacks(name) => {
                for tag in expand(name) {
                    wanted.remove(&tag);
                }
            }
            DescriptorTerm::Becomes { from, to } => {
                for tag in expand(from) {
                    wanted.remove(&tag);
                }
                for tag in expand(to) {
                    add(&mut wanted, tag);
                }
            }
        }
    }

    if wanted == *segment.phoneme().descriptors() {
        return segment.with_stress(stressed);
    }
    match inventory.closest_with(&wanted) {
        Some(phoneme) => Segment::new(Arc::clone(phoneme), stressed),
        None => {
            warn!(
                phoneme = %segment.phoneme(),
                descriptors = ?wanted,
                "no phoneme has the changed descriptors; keeping the original"
            );
            segment.with_stress(stressed)
        }
    }
}
