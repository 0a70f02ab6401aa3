// Engine facade: a frozen inventory plus configuration, with cached,
// validated rule and affix parsing and sequential or parallel application.
//
// Parsing alone only checks notation. `Engine::rule` and `Engine::affix` also
// check every name against this engine's inventory (phoneme literals,
// descriptor classes, abbreviations), so an unknown name fails once at load
// time instead of silently never matching. The parse itself is shared across
// engines through the process-wide cache in `cache.rs`.
//
// An `Engine` is cheap to clone (the inventory is behind an `Arc`) and is
// `Send + Sync`; `apply_rule_to_all` fans a batch of words out over rayon.

use std::sync::Arc;

use rayon::prelude::*;

use crate::affix::{Affix, AffixKind, Branch, Material};
use crate::affixation::apply_affix;
use crate::applier::{RuleOutcome, apply_rule, apply_rules};
use crate::cache::{cached_affix, cached_rule};
use crate::condition::Condition;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::features::is_stress;
use crate::inventory::{Inventory, default_inventory};
use crate::matcher::Matcher;
use crate::pattern::{DescriptorTerm, PatternElement, Rule};
use crate::word::Word;

#[derive(Debug, Clone)]
pub struct Engine {
    inventory: Arc<Inventory>,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new(default_inventory())
    }
}

impl Engine {
    /// An engine over `inventory` with the default configuration.
    pub fn new(inventory: impl Into<Arc<Inventory>>) -> Self {
        Engine {
            inventory: inventory.into(),
            config: EngineConfig::default(),
        }
    }

    /// Replace the configuration, checking its class names against the
    /// inventory.
    pub fn with_config(mut self, config: EngineConfig) -> Result<Self> {
        let features = self.inventory.features();
        let names = std::iter::once(config.stem_letter_class.as_str())
            .chain(config.abbreviations.values().map(String::as_str));
        for name in names {
            if !features.is_known(name) {
                return Err(EngineError::UnknownDescriptor(name.to_string()));
            }
        }
        self.config = config;
        Ok(self)
    }

    pub fn inventory(&self) -> &Arc<Inventory> {
        &self.inventory
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Parse word notation (`ke<'tu.ka>`) against the inventory.
    pub fn word(&self, notation: &str) -> Result<Word> {
        Word::parse(&self.inventory, notation)
    }

    /// A matcher over `word` using this engine's inventory and configuration.
    pub fn matcher<'a>(&'a self, word: &'a Word) -> Matcher<'a> {
        Matcher::new(&self.inventory, &self.config, word)
    }

    /// Parse (through the shared cache) and validate a rule.
    pub fn rule(&self, text: &str) -> Result<Arc<Rule>> {
        let rule = cached_rule(text)?;
        self.validate_rule(&rule)?;
        Ok(rule)
    }

    /// Parse (through the shared cache) and validate an affix.
    pub fn affix(&self, text: &str) -> Result<Arc<Affix>> {
        let affix = cached_affix(text)?;
        self.validate_affix(&affix)?;
        Ok(affix)
    }

    pub fn apply_rule(&self, rule: &Rule, word: &Word) -> Word {
        apply_rule(&self.inventory, &self.config, rule, word)
    }

    /// Apply `rules` in order, each to the previous result.
    pub fn apply_rules<'r>(&self, rules: impl IntoIterator<Item = &'r Rule>, word: &Word) -> Word {
        apply_rules(&self.inventory, &self.config, rules, word)
    }

    /// Apply `rule` to every word in parallel. Outcomes keep input order.
    pub fn apply_rule_to_all(&self, rule: &Rule, words: &[Word]) -> Vec<RuleOutcome> {
        words
            .par_iter()
            .map(|word| {
                let out = self.apply_rule(rule, word);
                let changed = out != *word;
                RuleOutcome { word: out, changed }
            })
            .collect()
    }

    pub fn apply_affix(&self, affix: &Affix, word: &Word) -> Result<Word> {
        apply_affix(&self.inventory, &self.config, affix, word)
    }

    fn validate_rule(&self, rule: &Rule) -> Result<()> {
        self.validate_sequence(rule.target())?;
        self.validate_sequence(rule.replacement())?;
        if let Some(env) = rule.environment() {
            self.validate_sequence(&env.left)?;
            self.validate_sequence(&env.right)?;
        }
        Ok(())
    }

    fn validate_affix(&self, affix: &Affix) -> Result<()> {
        fn conditions<'x, M: 'x>(
            branches: &'x [Branch<M>],
        ) -> impl Iterator<Item = &'x Condition> + 'x {
            branches.iter().map(|b| &b.condition)
        }
        let mut materials: Vec<&Material> = Vec::new();
        let mut guards: Vec<&Condition> = Vec::new();
        match affix.kind() {
            AffixKind::Prefix(b)
            | AffixKind::Suffix(b)
            | AffixKind::Infix { branches: b, .. }
            | AffixKind::Duplifix { branches: b, .. }
            | AffixKind::Transfix { branches: b, .. } => {
                materials.extend(b.iter().map(|branch| &branch.material));
                guards.extend(conditions(b));
            }
            AffixKind::Circumfix(b) => {
                for branch in b {
                    materials.push(&branch.material.before);
                    materials.push(&branch.material.after);
                }
                guards.extend(conditions(b));
            }
            AffixKind::Simulfix(b) => {
                for branch in b {
                    self.validate_rule(&branch.material)?;
                }
                guards.extend(conditions(b));
            }
            AffixKind::Disfix(b) => guards.extend(conditions(b)),
            AffixKind::Suprafix { branches, .. } => guards.extend(conditions(branches)),
        }
        for material in materials {
            self.validate_sequence(material)?;
        }
        for condition in guards {
            if let Some(pattern) = condition.pattern() {
                self.validate_sequence(pattern)?;
            }
        }
        Ok(())
    }

    fn validate_sequence(&self, elems: &[PatternElement]) -> Result<()> {
        elems.iter().try_for_each(|elem| self.validate_element(elem))
    }

    fn validate_element(&self, elem: &PatternElement) -> Result<()> {
        let features = self.inventory.features();
        let known = |name: &str| {
            if is_stress(name) || features.is_known(name) {
                Ok(())
            } else {
                Err(EngineError::UnknownDescriptor(name.to_string()))
            }
        };
        match elem {
            PatternElement::Literal(text) => self.inventory.segment(text).map(|_| ()),
            PatternElement::Class(terms) => terms.iter().try_for_each(|term| match term {
                DescriptorTerm::Has(name) | DescriptorTerm::Lacks(name) => known(name),
                DescriptorTerm::Becomes { from, to } => known(from).and_then(|_| known(to)),
            }),
            PatternElement::Abbreviation(letter) => match self.config.abbreviation(*letter) {
                Some(class) => known(class),
                None => Err(EngineError::UnknownDescriptor(letter.to_string())),
            },
            PatternElement::List(alternatives) => alternatives
                .iter()
                .try_for_each(|alternative| self.validate_sequence(alternative)),
            PatternElement::Optional(body) => self.validate_sequence(body),
            PatternElement::Not(inner) => self.validate_element(inner),
            PatternElement::Boundary(_)
            | PatternElement::Stress
            | PatternElement::Wildcard
            | PatternElement::StemLetter(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_validation_rejects_unknown_names() {
        let engine = Engine::default();
        assert!(engine.rule("p -> b / V_V").is_ok());
        assert!(matches!(
            engine.rule("q -> k"),
            Err(EngineError::UnknownPhoneme(_))
        ));
        assert!(matches!(
            engine.rule("[sparkly] -> 0"),
            Err(EngineError::UnknownDescriptor(name)) if name == "sparkly"
        ));
        assert!(matches!(
            engine.rule("Q -> 0"),
            Err(EngineError::UnknownDescriptor(name)) if name == "Q"
        ));
        assert!(engine.rule("[vowel, stressed] -> [!stressed]").is_ok());
    }

    #[test]
    fn test_affix_validation() {
        let engine = Engine::default();
        assert!(engine.affix("circumfix: ke-t | Starts with: C").is_ok());
        assert!(matches!(
            engine.affix("prefix: ke | Starts with: [sparkly]"),
            Err(EngineError::UnknownDescriptor(_))
        ));
        assert!(matches!(
            engine.affix("simulfix: q -> k"),
            Err(EngineError::UnknownPhoneme(_))
        ));
    }

    #[test]
    fn test_with_config_checks_classes() {
        let mut config = EngineConfig::default();
        config.stem_letter_class = "sparkly".to_string();
        assert!(Engine::default().with_config(config).is_err());

        let mut config = EngineConfig::default();
        config.abbreviations.insert('S', "sibilant".to_string());
        let engine = Engine::default().with_config(config).unwrap();
        let rule = engine.rule("S -> h / _#").unwrap();
        let word = engine.word("tas").unwrap();
        assert_eq!(engine.apply_rule(&rule, &word).text(), "tah");
    }

    #[test]
    fn test_apply_rule_to_all_reports_changes() {
        let engine = Engine::default();
        let rule = engine.rule("s -> h / #_").unwrap();
        let words: Vec<Word> = ["sa", "ta", "si"]
            .iter()
            .map(|w| engine.word(w).unwrap())
            .collect();
        let outcomes = engine.apply_rule_to_all(&rule, &words);
        let texts: Vec<String> = outcomes.iter().map(|o| o.word.text()).collect();
        assert_eq!(texts, vec!["ha", "ta", "hi"]);
        assert_eq!(
            outcomes.iter().map(|o| o.changed).collect::<Vec<_>>(),
            vec![true, false, true]
        );
    }

    #[test]
    fn test_apply_affix_through_engine() {
        let engine = Engine::default();
        let affix = engine.affix("suffix: -ne").unwrap();
        let word = engine.word("tuk").unwrap();
        assert_eq!(engine.apply_affix(&affix, &word).unwrap().to_string(), "<tuk>ne");
    }
}
