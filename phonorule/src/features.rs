// Feature model: the descriptor vocabulary and named descriptor classes.
//
// A descriptor (tag) is an atomic phonetic feature such as `voiceless` or
// `bilabial`. A `DescriptorClass` names a set of tags and is satisfied by any
// descriptor set containing all of them (`vowel` ≡ has tag `vowel`). Every
// vocabulary tag also behaves as an implicit one-tag class, so rule authors
// can write `[nasal]` without registering a `nasal` class first.
//
// Negation is tag-level: `!x` holds iff `x` is not satisfied. It is never the
// complement of a whole descriptor set.
//
// The model is built once (see `InventoryBuilder` in `inventory.rs`) and then
// only read. Ordered collections keep iteration and serialization stable.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// An ordered set of descriptor tags.
pub type DescriptorSet = BTreeSet<String>;

/// The segment-level stress descriptor. It lives on `Segment`, not on the
/// phoneme, and is tested by the matcher rather than the feature model.
pub const STRESSED: &str = "stressed";

/// True for `stressed` and its short spelling `stress`.
pub fn is_stress(name: &str) -> bool {
    name == STRESSED || name == "stress"
}

/// Tags every feature model knows about.
pub const BASE_VOCABULARY: &[&str] = &[
    // major class
    "consonant",
    "vowel",
    // phonation
    "voiced",
    "voiceless",
    // place
    "bilabial",
    "labiodental",
    "dental",
    "alveolar",
    "postalveolar",
    "retroflex",
    "alveolo-palatal",
    "palatal",
    "velar",
    "labial-velar",
    "uvular",
    "pharyngeal",
    "glottal",
    // manner
    "plosive",
    "nasal",
    "trill",
    "tap",
    "fricative",
    "sibilant",
    "affricate",
    "approximant",
    "lateral",
    "implosive",
    "click",
    // vowel height
    "close",
    "near-close",
    "close-mid",
    "mid",
    "open-mid",
    "near-open",
    "open",
    // vowel backness
    "front",
    "central",
    "back",
    // rounding
    "rounded",
    "unrounded",
    // secondary articulation and length
    "aspirated",
    "ejective",
    "long",
    "half-long",
    "labialized",
    "palatalized",
    "velarized",
    "pharyngealized",
    "nasalized",
    "syllabic",
    STRESSED,
];

/// Mutually exclusive tags. Adding one member of a group during a feature
/// change removes the others.
const CONTRAST_GROUPS: &[&[&str]] = &[
    &["consonant", "vowel"],
    &["voiced", "voiceless"],
    &[
        "bilabial",
        "labiodental",
        "dental",
        "alveolar",
        "postalveolar",
        "retroflex",
        "alveolo-palatal",
        "palatal",
        "velar",
        "labial-velar",
        "uvular",
        "pharyngeal",
        "glottal",
    ],
    &[
        "close",
        "near-close",
        "close-mid",
        "mid",
        "open-mid",
        "near-open",
        "open",
    ],
    &["front", "central", "back"],
    &["rounded", "unrounded"],
    &["long", "half-long"],
];

/// The tags that exclude `tag`, not including `tag` itself.
pub fn contrasts(tag: &str) -> impl Iterator<Item = &'static str> + '_ {
    CONTRAST_GROUPS
        .iter()
        .filter(move |group| group.iter().any(|t| *t == tag))
        .flat_map(|group| group.iter().copied())
        .filter(move |other| *other != tag)
}

/// A named predicate over descriptor sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorClass {
    name: String,
    tags: DescriptorSet,
}

impl DescriptorClass {
    pub fn new<I, S>(name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DescriptorClass {
            name: name.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The defining tags.
    pub fn tags(&self) -> &DescriptorSet {
        &self.tags
    }

    /// True iff every defining tag is present.
    pub fn is_satisfied_by(&self, descriptors: &DescriptorSet) -> bool {
        self.tags.is_subset(descriptors)
    }
}

/// Descriptor vocabulary plus registered classes.
#[derive(Debug, Clone)]
pub struct FeatureModel {
    vocabulary: BTreeSet<String>,
    classes: BTreeMap<String, DescriptorClass>,
}

impl Default for FeatureModel {
    fn default() -> Self {
        Self::standard()
    }
}

impl FeatureModel {
    /// The base vocabulary with the `vowel` and `consonant` classes.
    pub fn standard() -> Self {
        let mut model = FeatureModel {
            vocabulary: BASE_VOCABULARY.iter().map(|t| t.to_string()).collect(),
            classes: BTreeMap::new(),
        };
        for name in ["vowel", "consonant"] {
            model
                .classes
                .insert(name.to_string(), DescriptorClass::new(name, [name]));
        }
        model
    }

    /// Add a tag to the vocabulary. Re-registering is harmless.
    pub fn register_descriptor(&mut self, tag: impl Into<String>) {
        self.vocabulary.insert(tag.into());
    }

    /// Register (or replace) a named class. Every tag must already be in the
    /// vocabulary.
    pub fn register_class(&mut self, class: DescriptorClass) -> Result<()> {
        if class.tags.is_empty() {
            return Err(EngineError::InvalidInventory(format!(
                "class `{}` has no defining tags",
                class.name
            )));
        }
        if let Some(unknown) = class.tags.iter().find(|t| !self.vocabulary.contains(*t)) {
            return Err(EngineError::UnknownDescriptor(unknown.clone()));
        }
        self.classes.insert(class.name.clone(), class);
        Ok(())
    }

    pub fn is_descriptor(&self, tag: &str) -> bool {
        self.vocabulary.contains(tag)
    }

    pub fn class(&self, name: &str) -> Option<&DescriptorClass> {
        self.classes.get(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &DescriptorClass> {
        self.classes.values()
    }

    /// True iff `name` is a registered class or a vocabulary tag.
    pub fn is_known(&self, name: &str) -> bool {
        self.classes.contains_key(name) || self.vocabulary.contains(name)
    }

    /// The tags `name` stands for: a class's defining tags, or the tag itself.
    pub fn expand(&self, name: &str) -> Result<Vec<&str>> {
        if let Some(class) = self.classes.get(name) {
            return Ok(class.tags.iter().map(String::as_str).collect());
        }
        match self.vocabulary.get(name) {
            Some(tag) => Ok(vec![tag.as_str()]),
            None => Err(EngineError::UnknownDescriptor(name.to_string())),
        }
    }

    /// Evaluate `name` against a descriptor set. `None` if `name` is unknown.
    pub fn satisfies(&self, name: &str, descriptors: &DescriptorSet) -> Option<bool> {
        if let Some(class) = self.classes.get(name) {
            return Some(class.is_satisfied_by(descriptors));
        }
        if self.vocabulary.contains(name) {
            return Some(descriptors.contains(name));
        }
        None
    }
}
