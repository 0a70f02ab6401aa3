// Symbol table: phones, phonemes, and the frozen phoneme inventory.
//
// A `Phone` is a concrete sound (IPA symbol + descriptors). A `Phoneme` groups
// one or more allophone phones and carries the intersection of their
// descriptors, so every allophone's descriptor set is a superset of the
// phoneme's. Both are immutable values with no setters.
//
// `Inventory` is the read-only lookup table the matcher consults: symbol →
// phoneme (allophone symbols resolve to their phoneme), descriptor-term
// expressions → matching phonemes, and notation text → phoneme sequence by
// longest match. It is assembled through `InventoryBuilder` and frozen by
// `build()`; after that it is shared behind an `Arc` and never mutated.
//
// The JSON form mirrors the builder calls (extra descriptors, named classes,
// phonemes with optional allophones). Phones without explicit descriptors are
// described by the embedded IPA chart (`ipa.rs`). `default_inventory()`
// embeds `data/default_inventory.json` at compile time.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::error::{EngineError, Result};
use crate::features::{DescriptorClass, DescriptorSet, FeatureModel};
use crate::ipa;
use crate::pattern::DescriptorTerm;

/// A concrete speech sound. Identity is the symbol.
#[derive(Debug, Clone, Eq)]
pub struct Phone {
    symbol: String,
    descriptors: DescriptorSet,
}

impl PartialEq for Phone {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Phone {
    pub fn new<I, S>(symbol: impl Into<String>, descriptors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Phone {
            symbol: symbol.into(),
            descriptors: descriptors.into_iter().map(Into::into).collect(),
        }
    }

    /// Describe `symbol` with the built-in IPA chart.
    pub fn from_ipa(symbol: &str) -> Result<Self> {
        Ok(Phone {
            symbol: symbol.to_string(),
            descriptors: ipa::describe(symbol)?,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn descriptors(&self) -> &DescriptorSet {
        &self.descriptors
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.symbol)
    }
}

/// An abstract sound unit grouping its allophones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phoneme {
    symbol: String,
    allophones: Vec<Phone>,
    descriptors: DescriptorSet,
}

impl Phoneme {
    /// Build a phoneme from a nonempty allophone list. Its descriptors are the
    /// intersection of the allophones' descriptors.
    pub fn new(symbol: impl Into<String>, allophones: Vec<Phone>) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(EngineError::InvalidInventory(
                "phoneme symbol is empty".to_string(),
            ));
        }
        let Some((first, rest)) = allophones.split_first() else {
            return Err(EngineError::InvalidInventory(format!(
                "phoneme /{symbol}/ has no allophones"
            )));
        };
        let mut descriptors = first.descriptors.clone();
        for phone in rest {
            descriptors.retain(|d| phone.descriptors.contains(d));
        }
        Ok(Phoneme {
            symbol,
            allophones,
            descriptors,
        })
    }

    /// A phoneme with a single allophone of the same symbol, described by the
    /// IPA chart.
    pub fn from_ipa(symbol: &str) -> Result<Self> {
        Phoneme::new(symbol, vec![Phone::from_ipa(symbol)?])
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn allophones(&self) -> &[Phone] {
        &self.allophones
    }

    pub fn descriptors(&self) -> &DescriptorSet {
        &self.descriptors
    }

    /// True if `symbol` is the phoneme's own symbol or one of its allophones.
    pub fn is_written(&self, symbol: &str) -> bool {
        self.symbol == symbol || self.allophones.iter().any(|p| p.symbol == symbol)
    }
}

impl fmt::Display for Phoneme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/", self.symbol)
    }
}

/// Accumulates descriptors, classes, and phonemes before freezing.
#[derive(Debug, Clone, Default)]
pub struct InventoryBuilder {
    features: FeatureModel,
    phonemes: Vec<Phoneme>,
    by_symbol: FxHashMap<String, usize>,
}

impl InventoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extend the descriptor vocabulary.
    pub fn register_descriptor(&mut self, tag: impl Into<String>) -> &mut Self {
        self.features.register_descriptor(tag);
        self
    }

    /// Register a named class; its tags must be in the vocabulary.
    pub fn register_descriptor_class<I, S>(&mut self, name: &str, tags: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features
            .register_class(DescriptorClass::new(name, tags))?;
        Ok(self)
    }

    /// Register a phoneme. Its descriptors must be in the vocabulary, and
    /// neither its symbol nor any allophone symbol may already be taken.
    pub fn register_phoneme(&mut self, phoneme: Phoneme) -> Result<&mut Self> {
        for phone in &phoneme.allophones {
            if let Some(unknown) = phone
                .descriptors
                .iter()
                .find(|d| !self.features.is_descriptor(d))
            {
                return Err(EngineError::UnknownDescriptor(unknown.clone()));
            }
        }
        let symbols = || {
            std::iter::once(phoneme.symbol.as_str())
                .chain(phoneme.allophones.iter().map(|p| p.symbol.as_str()))
        };
        // Nothing is recorded until every symbol is known to be free.
        if let Some((symbol, &existing)) = symbols()
            .find_map(|symbol| self.by_symbol.get(symbol).map(|index| (symbol, index)))
        {
            return Err(EngineError::InvalidInventory(format!(
                "symbol `{symbol}` already belongs to /{}/",
                self.phonemes[existing].symbol
            )));
        }
        let index = self.phonemes.len();
        for symbol in symbols() {
            self.by_symbol.insert(symbol.to_string(), index);
        }
        self.phonemes.push(phoneme);
        Ok(self)
    }

    /// Freeze into an immutable inventory.
    pub fn build(self) -> Inventory {
        let max_symbol_chars = self
            .by_symbol
            .keys()
            .map(|s| s.chars().count())
            .max()
            .unwrap_or(0);
        Inventory {
            features: self.features,
            phonemes: self.phonemes.into_iter().map(Arc::new).collect(),
            by_symbol: self.by_symbol,
            max_symbol_chars,
        }
    }
}

/// JSON form of an inventory.
#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    descriptors: Vec<String>,
    #[serde(default)]
    classes: BTreeMap<String, Vec<String>>,
    phonemes: Vec<PhonemeDef>,
}

#[derive(Debug, Deserialize)]
struct PhonemeDef {
    symbol: String,
    #[serde(default)]
    descriptors: Option<Vec<String>>,
    #[serde(default)]
    allophones: Vec<PhoneDef>,
}

#[derive(Debug, Deserialize)]
struct PhoneDef {
    symbol: String,
    #[serde(default)]
    descriptors: Option<Vec<String>>,
}

impl PhoneDef {
    fn into_phone(self) -> Result<Phone> {
        match self.descriptors {
            Some(tags) => Ok(Phone::new(self.symbol, tags)),
            None => Phone::from_ipa(&self.symbol),
        }
    }
}

/// A frozen phoneme inventory with its feature model.
#[derive(Debug, Clone)]
pub struct Inventory {
    features: FeatureModel,
    phonemes: Vec<Arc<Phoneme>>,
    by_symbol: FxHashMap<String, usize>,
    max_symbol_chars: usize,
}

impl Inventory {
    pub fn builder() -> InventoryBuilder {
        InventoryBuilder::new()
    }

    /// Parse an inventory from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: InventoryFile = serde_json::from_str(json)?;
        let mut builder = InventoryBuilder::new();
        for tag in file.descriptors {
            builder.register_descriptor(tag);
        }
        for (name, tags) in file.classes {
            builder.register_descriptor_class(&name, tags)?;
        }
        for def in file.phonemes {
            let allophones = if def.allophones.is_empty() {
                vec![
                    PhoneDef {
                        symbol: def.symbol.clone(),
                        descriptors: def.descriptors,
                    }
                    .into_phone()?,
                ]
            } else {
                def.allophones
                    .into_iter()
                    .map(PhoneDef::into_phone)
                    .collect::<Result<Vec<_>>>()?
            };
            builder.register_phoneme(Phoneme::new(def.symbol, allophones)?)?;
        }
        Ok(builder.build())
    }

    /// One single-allophone phoneme per IPA symbol, described by the chart.
    pub fn from_ipa_symbols(symbols: &[&str]) -> Result<Self> {
        let mut builder = InventoryBuilder::new();
        for symbol in symbols {
            builder.register_phoneme(Phoneme::from_ipa(symbol)?)?;
        }
        Ok(builder.build())
    }

    pub fn features(&self) -> &FeatureModel {
        &self.features
    }

    /// All phonemes in registration order.
    pub fn phonemes(&self) -> &[Arc<Phoneme>] {
        &self.phonemes
    }

    /// Look up a phoneme by its own symbol or an allophone symbol.
    pub fn phoneme(&self, symbol: &str) -> Option<&Arc<Phoneme>> {
        self.by_symbol.get(symbol).map(|&i| &self.phonemes[i])
    }

    /// Evaluate one descriptor term against a descriptor set. Pair terms test
    /// their source side.
    pub fn term_holds(&self, term: &DescriptorTerm, descriptors: &DescriptorSet) -> Result<bool> {
        let name = term.name();
        let holds = self
            .features
            .satisfies(name, descriptors)
            .ok_or_else(|| EngineError::UnknownDescriptor(name.to_string()))?;
        Ok(if term.is_negated() { !holds } else { holds })
    }

    /// Resolve a descriptor-list expression (`[vowel, !back]`) to the
    /// phonemes satisfying every term, in registration order.
    pub fn phonemes_matching(&self, terms: &[DescriptorTerm]) -> Result<Vec<&Arc<Phoneme>>> {
        let mut out = Vec::new();
        for phoneme in &self.phonemes {
            let mut all = true;
            for term in terms {
                if !self.term_holds(term, &phoneme.descriptors)? {
                    all = false;
                    break;
                }
            }
            if all {
                out.push(phoneme);
            }
        }
        Ok(out)
    }

    /// The phoneme whose descriptors equal `wanted`; failing that, the one
    /// containing `wanted` with the fewest extra tags (earliest registered on
    /// ties).
    pub fn closest_with(&self, wanted: &DescriptorSet) -> Option<&Arc<Phoneme>> {
        self.phonemes
            .iter()
            .filter(|p| wanted.is_subset(&p.descriptors))
            .min_by_key(|p| p.descriptors.len() - wanted.len())
    }

    /// Split notation text into phonemes by longest registered symbol.
    pub fn segment(&self, text: &str) -> Result<Vec<Arc<Phoneme>>> {
        let chars: Vec<char> = text.chars().collect();
        let mut out = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let longest = self.max_symbol_chars.min(chars.len() - i);
            let found = (1..=longest).rev().find_map(|len| {
                let candidate: String = chars[i..i + len].iter().collect();
                self.phoneme(&candidate).map(|p| (len, p))
            });
            match found {
                Some((len, phoneme)) => {
                    out.push(Arc::clone(phoneme));
                    i += len;
                }
                None => {
                    let rest: String = chars[i..].iter().collect();
                    return Err(EngineError::UnknownPhoneme(rest));
                }
            }
        }
        Ok(out)
    }
}

/// Load the default inventory embedded at compile time.
///
/// Uses `include_str!` to embed `data/default_inventory.json`. Panics if
/// the embedded JSON is malformed (should never happen in a released build).
pub fn default_inventory() -> Inventory {
    let json = include_str!("../../data/default_inventory.json");
    Inventory::from_json(json).expect("embedded default_inventory.json is malformed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phoneme_descriptors_are_allophone_intersection() {
        let p = Phoneme::new(
            "p",
            vec![Phone::from_ipa("p").unwrap(), Phone::from_ipa("pʰ").unwrap()],
        )
        .unwrap();
        assert!(!p.descriptors().contains("aspirated"));
        assert!(p.descriptors().contains("bilabial"));
        for allophone in p.allophones() {
            assert!(p.descriptors().is_subset(allophone.descriptors()));
        }
    }

    #[test]
    fn test_phoneme_requires_allophones() {
        assert!(matches!(
            Phoneme::new("p", vec![]),
            Err(EngineError::InvalidInventory(_))
        ));
    }

    #[test]
    fn test_phone_identity_is_symbol() {
        let a = Phone::new("x", ["consonant"]);
        let b = Phone::new("x", ["vowel"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_register_phoneme_rejects_duplicate_symbol() {
        let mut builder = InventoryBuilder::new();
        builder.register_phoneme(Phoneme::from_ipa("p").unwrap()).unwrap();
        let err = builder
            .register_phoneme(Phoneme::from_ipa("p").unwrap())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInventory(_)));
    }

    #[test]
    fn test_failed_registration_leaves_symbols_untouched() {
        let mut builder = InventoryBuilder::new();
        builder.register_phoneme(Phoneme::from_ipa("p").unwrap()).unwrap();
        let clash = Phoneme::new(
            "t",
            vec![Phone::from_ipa("t").unwrap(), Phone::from_ipa("p").unwrap()],
        )
        .unwrap();
        assert!(matches!(
            builder.register_phoneme(clash),
            Err(EngineError::InvalidInventory(_))
        ));
        builder.register_phoneme(Phoneme::from_ipa("a").unwrap()).unwrap();
        let inventory = builder.build();
        assert!(inventory.phoneme("t").is_none());
        assert_eq!(inventory.phoneme("a").unwrap().symbol(), "a");
        assert_eq!(inventory.phoneme("p").unwrap().symbol(), "p");
        assert_eq!(inventory.phonemes().len(), 2);
    }

    #[test]
    fn test_register_phoneme_rejects_unknown_descriptor() {
        let mut builder = InventoryBuilder::new();
        let err = builder
            .register_phoneme(Phoneme::new("ʬ", vec![Phone::new("ʬ", ["percussive"])]).unwrap())
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownDescriptor(t) if t == "percussive"));
    }

    #[test]
    fn test_allophone_symbol_resolves_to_phoneme() {
        let inventory = default_inventory();
        assert_eq!(inventory.phoneme("pʰ").unwrap().symbol(), "p");
        assert!(inventory.phoneme("q").is_none());
    }

    #[test]
    fn test_phonemes_matching_with_negation() {
        let inventory =
            Inventory::from_ipa_symbols(&["a", "e", "i", "o", "u", "p", "m", "n"]).unwrap();
        let terms = vec![
            DescriptorTerm::Has("vowel".into()),
            DescriptorTerm::Lacks("back".into()),
        ];
        let found: Vec<&str> = inventory
            .phonemes_matching(&terms)
            .unwrap()
            .into_iter()
            .map(|p| p.symbol())
            .collect();
        assert_eq!(found, vec!["a", "e", "i"]);

        let nasals = inventory
            .phonemes_matching(&[DescriptorTerm::Has("nasal".into())])
            .unwrap();
        assert_eq!(nasals.len(), 2);
    }

    #[test]
    fn test_phonemes_matching_unknown_term() {
        let inventory = default_inventory();
        assert!(matches!(
            inventory.phonemes_matching(&[DescriptorTerm::Has("sparkly".into())]),
            Err(EngineError::UnknownDescriptor(_))
        ));
    }

    #[test]
    fn test_segment_longest_match() {
        let inventory = default_inventory();
        let symbols: Vec<String> = inventory
            .segment("tʃat")
            .unwrap()
            .iter()
            .map(|p| p.symbol().to_string())
            .collect();
        assert_eq!(symbols, vec!["tʃ", "a", "t"]);
    }

    #[test]
    fn test_segment_unknown_symbol() {
        let inventory = default_inventory();
        assert!(matches!(
            inventory.segment("aqa"),
            Err(EngineError::UnknownPhoneme(rest)) if rest == "qa"
        ));
    }

    #[test]
    fn test_closest_with_prefers_exact() {
        let inventory = default_inventory();
        let b = inventory.phoneme("b").unwrap().descriptors().clone();
        assert_eq!(inventory.closest_with(&b).unwrap().symbol(), "b");
    }

    #[test]
    fn test_from_json_classes_and_descriptors() {
        let json = r#"{
            "descriptors": ["sparkly"],
            "classes": {"shiny": ["vowel", "sparkly"]},
            "phonemes": [
                {"symbol": "a"},
                {"symbol": "ä", "descriptors": ["vowel", "sparkly"]}
            ]
        }"#;
        let inventory = Inventory::from_json(json).unwrap();
        assert_eq!(inventory.phonemes().len(), 2);
        let shiny = inventory
            .phonemes_matching(&[DescriptorTerm::Has("shiny".into())])
            .unwrap();
        assert_eq!(shiny.len(), 1);
        assert_eq!(shiny[0].symbol(), "ä");
    }

    #[test]
    fn test_default_inventory_loads() {
        let inventory = default_inventory();
        assert!(inventory.phonemes().len() >= 20);
        assert!(inventory.features().class("stop").is_some());
    }
}
