// Engine configuration, loaded from JSON.
//
// Every field has a default (`#[serde(default)]`), so a partial JSON file
// only overrides what it names and `EngineConfig::default()` is the standard
// setup: stem letters are consonants, and `C`, `V`, `N` abbreviate the
// consonant, vowel and nasal classes.
//
// Names in the config are resolved against an inventory's feature model when
// an `Engine` is built (`Engine::with_config`), not here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Engine-wide tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Class whose members count as stem letters for `L<n>` references.
    pub stem_letter_class: String,
    /// Single-letter class abbreviations usable in patterns.
    pub abbreviations: BTreeMap<char, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            stem_letter_class: "consonant".to_string(),
            abbreviations: [('C', "consonant"), ('N', "nasal"), ('V', "vowel")]
                .into_iter()
                .map(|(c, name)| (c, name.to_string()))
                .collect(),
        }
    }
}

impl EngineConfig {
    /// Parse a config from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The class an abbreviation stands for.
    pub fn abbreviation(&self, letter: char) -> Option<&str> {
        self.abbreviations.get(&letter).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_abbreviations() {
        let config = EngineConfig::default();
        assert_eq!(config.abbreviation('C'), Some("consonant"));
        assert_eq!(config.abbreviation('V'), Some("vowel"));
        assert_eq!(config.abbreviation('N'), Some("nasal"));
        assert_eq!(config.abbreviation('X'), None);
        assert_eq!(config.stem_letter_class, "consonant");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"stem_letter_class": "plosive"}"#).unwrap();
        assert_eq!(config.stem_letter_class, "plosive");
        assert_eq!(config.abbreviation('V'), Some("vowel"));
    }

    #[test]
    fn test_json_overrides_abbreviations() {
        let config =
            EngineConfig::from_json(r#"{"abbreviations": {"S": "sibilant"}}"#).unwrap();
        assert_eq!(config.abbreviation('S'), Some("sibilant"));
        assert_eq!(config.abbreviation('C'), None);
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }
}
