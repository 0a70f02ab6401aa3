// Property-based tests for rule application.
//
// 1. Idempotence on non-matching input: a rule that cannot match returns its
//    input unchanged.
// 2. Deletion shrinks: `x -> 0` removes exactly the occurrences of `x`.
// 3. Anchoring: a `_#` rule only touches the final segment, and `0 -> x / _#`
//    appends exactly one segment at the end.
// 4. Epenthesis terminates: `0 -> x` adds at most one segment per gap.
// 5. Notation round trip: a word's `Display` parses back to the word.

use phonorule::{Engine, Word};
use proptest::prelude::*;

fn arb_text() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ptksmnaeiu]{0,12}").unwrap()
}

fn word(engine: &Engine, text: &str) -> Word {
    engine.word(text).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn non_matching_rule_is_identity(text in arb_text()) {
        let engine = Engine::default();
        let rule = engine.rule("o -> u / _[vowel]").unwrap();
        let input = word(&engine, &text);
        prop_assert_eq!(engine.apply_rule(&rule, &input), input);
    }

    #[test]
    fn deletion_removes_every_occurrence(text in arb_text()) {
        let engine = Engine::default();
        let rule = engine.rule("a -> 0").unwrap();
        let input = word(&engine, &text);
        let out = engine.apply_rule(&rule, &input);
        let expected: String = text.chars().filter(|c| *c != 'a').collect();
        prop_assert!(out.len() <= input.len());
        prop_assert_eq!(out.text(), expected);
    }

    #[test]
    fn final_anchor_only_touches_last_segment(text in arb_text()) {
        let engine = Engine::default();
        let rule = engine.rule("[vowel] -> o / _#").unwrap();
        let input = word(&engine, &text);
        let out = engine.apply_rule(&rule, &input);
        prop_assert_eq!(out.len(), input.len());
        if input.len() > 1 {
            let keep = input.len() - 1;
            prop_assert_eq!(&out.symbols()[..keep], &input.symbols()[..keep]);
        }
    }

    #[test]
    fn final_epenthesis_appends_once(text in arb_text()) {
        let engine = Engine::default();
        let rule = engine.rule("0 -> o / _#").unwrap();
        let input = word(&engine, &text);
        let out = engine.apply_rule(&rule, &input);
        prop_assert_eq!(out.text(), format!("{text}o"));
    }

    #[test]
    fn epenthesis_adds_at_most_one_per_gap(text in arb_text()) {
        let engine = Engine::default();
        let rule = engine.rule("0 -> e / t_").unwrap();
        let input = word(&engine, &text);
        let out = engine.apply_rule(&rule, &input);
        let ts = text.chars().filter(|c| *c == 't').count();
        prop_assert_eq!(out.len(), input.len() + ts);
    }

    #[test]
    fn word_notation_round_trips(
        text in prop::string::string_regex("[ptksmnaeiu]{2,12}").unwrap(),
        cut in 1usize..12,
        stem_start in 0usize..12,
    ) {
        let engine = Engine::default();
        let plain = word(&engine, &text);
        let len = plain.len();
        let cut = cut.min(len - 1);
        let start = stem_start.min(len);
        let input = plain
            .with_syllable_boundaries([cut])
            .unwrap()
            .with_stem(start, len)
            .unwrap();
        let reparsed = word(&engine, &input.to_string());
        prop_assert_eq!(reparsed, input);
    }
}
