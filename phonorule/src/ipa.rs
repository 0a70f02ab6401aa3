// Built-in IPA chart: derives descriptor tags from IPA symbols.
//
// The chart is embedded at compile time from `data/ipa_chart.json` (the same
// `include_str!` approach used for other embedded data files) and parsed once
// on first use. A symbol's descriptors are the union of each character's
// descriptors: base letters contribute their place/manner/height tags,
// modifier letters and combining marks add secondary features (`ʰ` →
// aspirated, `ː` → long). Tie bars (`t͡ʃ`) contribute nothing.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::features::DescriptorSet;

/// Parsed form of `data/ipa_chart.json`.
#[derive(Debug, Deserialize)]
pub struct IpaChart {
    letters: BTreeMap<char, Vec<String>>,
    modifiers: BTreeMap<char, Vec<String>>,
    #[serde(default)]
    ties: Vec<char>,
}

impl IpaChart {
    /// Parse a chart from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// True if `c` is a base letter (a segment can start with it).
    pub fn is_letter(&self, c: char) -> bool {
        self.letters.contains_key(&c)
    }

    /// True if `c` attaches to the preceding letter.
    pub fn is_modifier(&self, c: char) -> bool {
        self.modifiers.contains_key(&c) || self.ties.contains(&c)
    }

    /// Descriptor set of a whole IPA symbol. Fails on the first character the
    /// chart does not know.
    pub fn describe(&self, symbol: &str) -> Result<DescriptorSet> {
        if symbol.is_empty() {
            return Err(EngineError::UnknownPhoneme(String::new()));
        }
        let mut descriptors = DescriptorSet::new();
        for c in symbol.chars() {
            if self.ties.contains(&c) {
                continue;
            }
            let tags = self
                .letters
                .get(&c)
                .or_else(|| self.modifiers.get(&c))
                .ok_or_else(|| EngineError::UnknownPhoneme(symbol.to_string()))?;
            descriptors.extend(tags.iter().cloned());
        }
        Ok(descriptors)
    }
}

/// The embedded chart.
///
/// Panics if the embedded JSON is malformed (should never happen in a
/// released build).
pub fn chart() -> &'static IpaChart {
    static CHART: OnceLock<IpaChart> = OnceLock::new();
    CHART.get_or_init(|| {
        IpaChart::from_json(include_str!("../../data/ipa_chart.json"))
            .expect("embedded ipa_chart.json is malformed")
    })
}

/// Descriptor set of `symbol` according to the embedded chart.
pub fn describe(symbol: &str) -> Result<DescriptorSet> {
    chart().describe(symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(symbol: &str) -> Vec<String> {
        describe(symbol).unwrap().into_iter().collect()
    }

    #[test]
    fn test_aspirated_plosive() {
        assert_eq!(
            tags("pʰ"),
            vec!["aspirated", "bilabial", "consonant", "plosive", "voiceless"]
        );
    }

    #[test]
    fn test_vowel_descriptors() {
        let a = describe("a").unwrap();
        assert!(a.contains("vowel"));
        assert!(a.contains("front"));
        assert!(!a.contains("back"));
    }

    #[test]
    fn test_tie_bar_is_ignored() {
        let affricate = describe("t͡ʃ").unwrap();
        assert!(affricate.contains("plosive"));
        assert!(affricate.contains("postalveolar"));
    }

    #[test]
    fn test_unknown_character_fails() {
        assert!(matches!(describe("a☃"), Err(EngineError::UnknownPhoneme(s)) if s == "a☃"));
        assert!(describe("").is_err());
    }

    #[test]
    fn test_letter_and_modifier_classification() {
        let chart = chart();
        assert!(chart.is_letter('ŋ'));
        assert!(chart.is_modifier('ː'));
        assert!(chart.is_modifier('\u{0361}'));
        assert!(!chart.is_letter('ː'));
    }
}
