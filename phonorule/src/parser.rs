// Recursive-descent parser for the sound-change notation.
//
//     rule        := target "->" replacement ["/" environment]
//     target      := element+ | "0"
//     replacement := element+ | "0"
//     environment := context "_" context
//     element     := literal | "[" [term ("," term)*] "]" | "!" element
//                  | "{" seq ("," seq)* "}" | "(" seq ")"
//                  | "#" | "$" | "%" | "'" | "..." | "L" digits | ABBREV
//     term        := ["!"] name | name ":" name
//
// Parsing is pure: it needs no inventory. A literal is a maximal run of
// characters that are not structural, not whitespace, not ASCII digits and
// not ASCII uppercase (uppercase letters are class abbreviations). Whether a
// literal's phonemes and a class's descriptor names exist is checked later
// against a concrete inventory (`Engine::rule`).
//
// Structural checks done here: `0` stands alone, feature pairs only appear
// in replacements, replacements hold no optionals/boundaries/wildcards/
// negations, the complexity limits, and replacement/target correlation (see
// `check_correlation`).
//
// The same machinery parses the element sequences used inside affix
// specifications (`parse_material`, `parse_context`), with a column offset so
// errors point into the full affix text.

use crate::error::{EngineError, Result};
use crate::pattern::{
    Boundary, DescriptorTerm, Environment, PatternElement, Rule, sequence_size, slot_indices,
};

/// Maximum number of elements (nested ones included) on one side of a rule.
pub const MAX_PATTERN_ELEMENTS: usize = 64;

/// Maximum bracket nesting depth of `{}`, `()` and `!`.
pub const MAX_NESTING: usize = 8;

/// Which part of a rule or affix is being parsed; decides what is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Target,
    Replacement,
    /// Environment or condition pattern.
    Context,
    /// Affix material: phonemes, stem letters, stress.
    Material,
}

const STRUCTURAL: &[char] = &[
    '[', ']', '{', '}', '(', ')', '!', '#', '$', '%', '\'', 'ˈ', '_', '/', ',', '.', '…', '-', '<',
    '>', ':', ';', '|', '=',
];

fn is_literal_char(c: char) -> bool {
    !c.is_whitespace()
        && !c.is_ascii_uppercase()
        && !c.is_ascii_digit()
        && !STRUCTURAL.contains(&c)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-'
}

/// Character cursor with 1-based column reporting.
struct Cursor {
    chars: Vec<char>,
    pos: usize,
    base_column: usize,
    depth: usize,
}

impl Cursor {
    fn new(text: &str, base_column: usize) -> Self {
        Cursor {
            chars: text.chars().collect(),
            pos: 0,
            base_column,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn looking_at(&self, s: &str) -> bool {
        let mut i = self.pos;
        for c in s.chars() {
            if self.chars.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn eat(&mut self, s: &str) -> bool {
        if self.looking_at(s) {
            self.pos += s.chars().count();
            true
        } else {
            false
        }
    }

    fn column(&self) -> usize {
        self.base_column + self.pos + 1
    }

    fn token(&self) -> String {
        match self.peek() {
            Some(c) => c.to_string(),
            None => "end of input".to_string(),
        }
    }

    fn error(&self, message: impl Into<String>) -> EngineError {
        EngineError::syntax(self.column(), self.token(), message)
    }

    fn error_at(&self, column: usize, token: impl Into<String>, message: &str) -> EngineError {
        EngineError::syntax(column, token, message)
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(format!("nesting deeper than {MAX_NESTING} levels")));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }
}

/// Parse a sound-change rule.
pub fn parse_rule(text: &str) -> Result<Rule> {
    parse_rule_at(text, 0)
}

/// Parse a rule embedded at character offset `base_column` of a larger text.
pub(crate) fn parse_rule_at(text: &str, base_column: usize) -> Result<Rule> {
    let mut cur = Cursor::new(text, base_column);
    let target = parse_sequence(&mut cur, Side::Target, false, &["->"])?;
    if !cur.eat("->") {
        return Err(cur.error("expected `->`"));
    }
    let replacement = parse_sequence(&mut cur, Side::Replacement, false, &["/"])?;
    let environment = if cur.eat("/") {
        let left = parse_sequence(&mut cur, Side::Context, false, &["_"])?;
        if !cur.eat("_") {
            return Err(cur.error("environment needs a `_` focus"));
        }
        let right = parse_sequence(&mut cur, Side::Context, false, &[])?;
        Some(Environment { left, right })
    } else {
        None
    };
    cur.skip_ws();
    if !cur.at_end() {
        return Err(cur.error("unexpected trailing input"));
    }
    check_correlation(&target, &replacement)?;
    Ok(Rule::new(text.trim(), target, replacement, environment))
}

/// Parse affix material (phonemes, stem letters, stress; `0` for nothing).
pub(crate) fn parse_material(text: &str, base_column: usize) -> Result<Vec<PatternElement>> {
    let mut cur = Cursor::new(text, base_column);
    let elems = parse_sequence(&mut cur, Side::Material, false, &[])?;
    finish(&mut cur)?;
    Ok(elems)
}

/// Parse a non-empty context pattern such as a condition operand.
pub(crate) fn parse_context(text: &str, base_column: usize) -> Result<Vec<PatternElement>> {
    let mut cur = Cursor::new(text, base_column);
    let elems = parse_sequence(&mut cur, Side::Context, true, &[])?;
    finish(&mut cur)?;
    Ok(elems)
}

fn finish(cur: &mut Cursor) -> Result<()> {
    cur.skip_ws();
    if cur.at_end() {
        Ok(())
    } else {
        Err(cur.error("unexpected trailing input"))
    }
}

/// Parse elements until end of input or one of `stops`. `nested` sequences
/// (list alternatives, optional bodies) must not be empty.
fn parse_sequence(
    cur: &mut Cursor,
    side: Side,
    nested: bool,
    stops: &[&str],
) -> Result<Vec<PatternElement>> {
    let mut elems = Vec::new();
    let mut zero: Option<usize> = None;
    let mut zero_count = 0;
    loop {
        cur.skip_ws();
        if cur.at_end() || stops.iter().any(|s| cur.looking_at(s)) {
            break;
        }
        if cur.peek() == Some('0') {
            if side == Side::Context {
                return Err(cur.error("`0` cannot appear in an environment or condition"));
            }
            zero.get_or_insert(cur.column());
            zero_count += 1;
            cur.bump();
            continue;
        }
        elems.push(parse_element(cur, side)?);
    }
    if let Some(column) = zero {
        if zero_count > 1 || !elems.is_empty() {
            return Err(cur.error_at(column, "0", "`0` must stand alone"));
        }
    } else if elems.is_empty() && (nested || side != Side::Context) {
        return Err(cur.error("expected a pattern element or `0`"));
    }
    if sequence_size(&elems) > MAX_PATTERN_ELEMENTS {
        return Err(cur.error(format!(
            "pattern has more than {MAX_PATTERN_ELEMENTS} elements"
        )));
    }
    Ok(elems)
}

fn parse_element(cur: &mut Cursor, side: Side) -> Result<PatternElement> {
    let column = cur.column();
    let token = cur.token();
    let Some(c) = cur.peek() else {
        return Err(cur.error("expected a pattern element"));
    };
    let elem = match c {
        '[' => parse_class(cur, side)?,
        '{' => parse_list(cur, side)?,
        '(' => parse_optional(cur, side)?,
        '!' => parse_negation(cur, side)?,
        '#' | '$' | '%' => {
            cur.bump();
            PatternElement::Boundary(match c {
                '#' => Boundary::Word,
                '$' => Boundary::Stem,
                _ => Boundary::Syllable,
            })
        }
        '\'' | 'ˈ' => {
            cur.bump();
            PatternElement::Stress
        }
        '…' => {
            cur.bump();
            PatternElement::Wildcard
        }
        '.' => {
            if !cur.eat("...") {
                return Err(cur.error("expected `...`"));
            }
            PatternElement::Wildcard
        }
        'L' => {
            cur.bump();
            let start = cur.pos;
            while cur.peek().is_some_and(|d| d.is_ascii_digit()) {
                cur.pos += 1;
            }
            let digits: String = cur.chars[start..cur.pos].iter().collect();
            match digits.parse::<usize>() {
                Ok(n) if n >= 1 => PatternElement::StemLetter(n),
                _ => return Err(cur.error_at(column, "L", "`L` needs a stem letter number from 1")),
            }
        }
        c if c.is_ascii_uppercase() => {
            cur.bump();
            PatternElement::Abbreviation(c)
        }
        c if is_literal_char(c) => {
            let start = cur.pos;
            while cur.peek().is_some_and(is_literal_char) {
                cur.pos += 1;
            }
            PatternElement::Literal(cur.chars[start..cur.pos].iter().collect())
        }
        _ => return Err(cur.error("unexpected character")),
    };
    match side {
        Side::Replacement
            if matches!(
                elem,
                PatternElement::Optional(_)
                    | PatternElement::Boundary(_)
                    | PatternElement::Wildcard
                    | PatternElement::Not(_)
            ) =>
        {
            Err(cur.error_at(column, token, "not allowed in a replacement"))
        }
        Side::Material
            if !matches!(
                elem,
                PatternElement::Literal(_) | PatternElement::StemLetter(_) | PatternElement::Stress
            ) =>
        {
            Err(cur.error_at(
                column,
                token,
                "affix material may only hold phonemes, stem letters and stress marks",
            ))
        }
        _ => Ok(elem),
    }
}

fn parse_class(cur: &mut Cursor, side: Side) -> Result<PatternElement> {
    cur.bump();
    cur.skip_ws();
    let mut terms = Vec::new();
    if cur.peek() == Some(']') {
        cur.bump();
        return Ok(PatternElement::Class(terms));
    }
    loop {
        cur.skip_ws();
        let column = cur.column();
        let negated = cur.peek() == Some('!');
        if negated {
            cur.bump();
            cur.skip_ws();
        }
        let name = cur.read_name();
        if name.is_empty() {
            return Err(cur.error("expected a descriptor name"));
        }
        cur.skip_ws();
        let term = if cur.peek() == Some(':') {
            cur.bump();
            cur.skip_ws();
            let to = cur.read_name();
            if to.is_empty() {
                return Err(cur.error("expected a descriptor name after `:`"));
            }
            if negated {
                return Err(cur.error_at(column, "!", "a feature pair cannot be negated"));
            }
            if side != Side::Replacement {
                return Err(cur.error_at(
                    column,
                    name,
                    "feature pairs are only allowed in a replacement",
                ));
            }
            DescriptorTerm::Becomes { from: name, to }
        } else if negated {
            DescriptorTerm::Lacks(name)
        } else {
            DescriptorTerm::Has(name)
        };
        terms.push(term);
        cur.skip_ws();
        match cur.peek() {
            Some(',') => {
                cur.bump();
            }
            Some(']') => {
                cur.bump();
                return Ok(PatternElement::Class(terms));
            }
            None => return Err(cur.error("unclosed `[`")),
            Some(_) => return Err(cur.error("expected `,` or `]`")),
        }
    }
}

fn parse_list(cur: &mut Cursor, side: Side) -> Result<PatternElement> {
    cur.bump();
    cur.enter()?;
    let mut alternatives = Vec::new();
    loop {
        alternatives.push(parse_sequence(cur, side, true, &[",", "}"])?);
        match cur.bump() {
            Some(',') => {}
            Some('}') => break,
            _ => return Err(cur.error("unclosed `{`")),
        }
    }
    cur.leave();
    Ok(PatternElement::List(alternatives))
}

fn parse_optional(cur: &mut Cursor, side: Side) -> Result<PatternElement> {
    cur.bump();
    cur.enter()?;
    let body = parse_sequence(cur, side, true, &[")"])?;
    if !cur.eat(")") {
        return Err(cur.error("unclosed `(`"));
    }
    if body.is_empty() {
        return Err(cur.error("an optional group cannot be `0`"));
    }
    cur.leave();
    Ok(PatternElement::Optional(body))
}

fn parse_negation(cur: &mut Cursor, side: Side) -> Result<PatternElement> {
    cur.bump();
    cur.enter()?;
    cur.skip_ws();
    let column = cur.column();
    let token = cur.token();
    if cur.peek() == Some('0') {
        return Err(cur.error("`0` cannot be negated"));
    }
    let inner = parse_element(cur, side)?;
    cur.leave();
    match inner {
        PatternElement::Class(_)
        | PatternElement::Abbreviation(_)
        | PatternElement::Literal(_)
        | PatternElement::List(_)
        | PatternElement::Boundary(Boundary::Word) => Ok(PatternElement::Not(Box::new(inner))),
        _ => Err(cur.error_at(
            column,
            token,
            "`!` applies to a class, abbreviation, phoneme, list or `#`",
        )),
    }
}

fn ambiguous(
    target: Option<&PatternElement>,
    replacement: &PatternElement,
    message: &str,
) -> EngineError {
    EngineError::AmbiguousCorrelation {
        target: target.map_or_else(|| "0".to_string(), ToString::to_string),
        replacement: replacement.to_string(),
        message: message.to_string(),
    }
}

fn plain_tags(terms: &[DescriptorTerm]) -> usize {
    terms
        .iter()
        .filter(|t| matches!(t, DescriptorTerm::Has(_)))
        .count()
}

/// Replacement slots that modify or select from the matched material must
/// line up with a target slot that can supply it.
fn check_correlation(target: &[PatternElement], replacement: &[PatternElement]) -> Result<()> {
    let target_slots = slot_indices(target);
    for (k, &ri) in slot_indices(replacement).iter().enumerate() {
        let r = &replacement[ri];
        let aligned = target_slots.get(k).map(|&ti| &target[ti]);
        match r {
            PatternElement::Class(_) | PatternElement::Abbreviation(_) => {
                let Some(t) = aligned else {
                    return Err(ambiguous(aligned, r, "no target slot for the class to modify"));
                };
                if matches!(t, PatternElement::Optional(_) | PatternElement::Wildcard) {
                    return Err(ambiguous(
                        aligned,
                        r,
                        "a class can only modify a single matched segment",
                    ));
                }
                if let (PatternElement::Class(tt), PatternElement::Class(rt)) = (t, r) {
                    let paired = rt
                        .iter()
                        .any(|term| matches!(term, DescriptorTerm::Becomes { .. }));
                    if plain_tags(tt) >= 2 && plain_tags(rt) >= 2 && !paired {
                        return Err(ambiguous(
                            aligned,
                            r,
                            "both sides list several features; pair them with `from:to`",
                        ));
                    }
                }
            }
            PatternElement::List(alternatives) => {
                match aligned {
                    Some(PatternElement::List(t)) if t.len() == alternatives.len() => {}
                    _ => {
                        return Err(ambiguous(
                            aligned,
                            r,
                            "a replacement list needs a target list of the same length",
                        ));
                    }
                }
                let phonemes_only = alternatives.iter().flatten().all(|e| {
                    matches!(
                        e,
                        PatternElement::Literal(_)
                            | PatternElement::StemLetter(_)
                            | PatternElement::Stress
                    )
                });
                if !phonemes_only {
                    return Err(ambiguous(
                        aligned,
                        r,
                        "replacement list alternatives may only hold phonemes",
                    ));
                }
            }
            _ => {}
        }
    }
    Ok(())
}
