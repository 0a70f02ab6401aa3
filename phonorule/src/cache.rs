// Process-wide caches of parsed rules and affixes.
//
// Parsing depends only on the notation text, so one shared cache serves
// every engine and thread. Entries are `Arc`s handed out by clone; failed
// parses are not cached. Readers take the shared lock, and a miss parses
// outside any lock before inserting, so two threads racing on the same text
// may both parse it and the first insert wins.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::affix::{Affix, parse_affix};
use crate::error::Result;
use crate::parser::parse_rule;
use crate::pattern::Rule;

/// A text-keyed cache of parsed values.
#[derive(Debug)]
pub struct ParseCache<T> {
    entries: RwLock<FxHashMap<String, Arc<T>>>,
}

impl<T> Default for ParseCache<T> {
    fn default() -> Self {
        ParseCache {
            entries: RwLock::new(FxHashMap::default()),
        }
    }
}

impl<T> ParseCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached value for `text`, parsing and inserting it on a miss.
    pub fn get_or_parse(&self, text: &str, parse: impl FnOnce(&str) -> Result<T>) -> Result<Arc<T>> {
        let key = text.trim();
        if let Some(hit) = self.entries.read().get(key) {
            return Ok(Arc::clone(hit));
        }
        let parsed = Arc::new(parse(text)?);
        debug!(text = key, "parse cache miss");
        let mut entries = self.entries.write();
        Ok(Arc::clone(
            entries.entry(key.to_string()).or_insert(parsed),
        ))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

fn rules() -> &'static ParseCache<Rule> {
    static RULES: OnceLock<ParseCache<Rule>> = OnceLock::new();
    RULES.get_or_init(ParseCache::new)
}

fn affixes() -> &'static ParseCache<Affix> {
    static AFFIXES: OnceLock<ParseCache<Affix>> = OnceLock::new();
    AFFIXES.get_or_init(ParseCache::new)
}

/// Parse a rule through the shared cache.
pub fn cached_rule(text: &str) -> Result<Arc<Rule>> {
    rules().get_or_parse(text, parse_rule)
}

/// Parse an affix through the shared cache.
pub fn cached_affix(text: &str) -> Result<Arc<Affix>> {
    affixes().get_or_parse(text, parse_affix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_returns_same_arc() {
        let cache = ParseCache::new();
        let a = cache.get_or_parse("p -> b", parse_rule).unwrap();
        let b = cache.get_or_parse("  p -> b ", parse_rule).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache: ParseCache<Rule> = ParseCache::new();
        assert!(cache.get_or_parse("p ->", parse_rule).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_shared_caches() {
        let rule = cached_rule("s -> z / V_V").unwrap();
        assert!(Arc::ptr_eq(&rule, &cached_rule("s -> z / V_V").unwrap()));
        let affix = cached_affix("suffix: -ne").unwrap();
        assert_eq!(affix.strategy(), "suffix");
    }

    #[test]
    fn test_concurrent_lookups_agree() {
        let cache = Arc::new(ParseCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache
                        .get_or_parse("{p,t,k} -> {b,d,ɡ} / V_V", parse_rule)
                        .unwrap()
                })
            })
            .collect();
        let first = cache.get_or_parse("{p,t,k} -> {b,d,ɡ} / V_V", parse_rule).unwrap();
        for handle in handles {
            assert_eq!(*handle.join().unwrap(), *first);
        }
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
