// Phonological rule engine.
//
// Parses a notation for sound changes (`{p,t,k} -> {b,d,ɡ} / V_V`) and for
// morphological affixes (`circumfix: ke-t | Starts with: C`), and applies
// them to words: phoneme sequences carrying syllable and stem markers.
//
// Architecture, leaf-first:
// - `error.rs`: `EngineError`, the single failure type
// - `features.rs`, `ipa.rs`: descriptor vocabulary, classes, and the IPA chart
// - `inventory.rs`: phonemes, allophones, segmentation, `default_inventory()`
// - `word.rs`: `Word` (immutable) and `WordBuilder`
// - `pattern.rs`, `parser.rs`: the pattern tree, `Rule`, and the rule grammar
// - `matcher.rs`: committed-choice pattern matching over a word
// - `applier.rs`: single-pass rule application and replacement materializing
// - `condition.rs`, `affix.rs`, `affixation.rs`: affix notation and strategies
// - `config.rs`, `cache.rs`, `engine.rs`: configuration, shared parse cache,
//   and the `Engine` facade with validated loading and batch application
//
// Everything is synchronous and deterministic. Inventories are frozen once
// built and shared behind `Arc`; the library logs through `tracing` and never
// installs a subscriber.

pub mod affix;
pub mod affixation;
pub mod applier;
pub mod cache;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod inventory;
pub mod ipa;
pub mod matcher;
pub mod parser;
pub mod pattern;
pub mod word;

// Re-export key types at crate root for convenience.
pub use affix::{Affix, AffixKind, parse_affix};
pub use affixation::apply_affix;
pub use applier::{RuleOutcome, apply_rule, apply_rules};
pub use condition::Condition;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use features::{DescriptorClass, FeatureModel};
pub use inventory::{Inventory, InventoryBuilder, Phone, Phoneme, default_inventory};
pub use matcher::{MatchResult, Matcher};
pub use parser::parse_rule;
pub use pattern::{DescriptorTerm, PatternElement, Rule};
pub use word::{Segment, Word, WordBuilder};
