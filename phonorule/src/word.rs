// Words: phoneme sequences with syllable and stem markers.
//
// A `Word` is an immutable value. Every rule or affix application builds a
// new one, either through `Word::splice` (replace disjoint spans, remapping
// markers through the edits) or through `WordBuilder` (assemble pieces with
// explicit stem marks, used by the affix strategies).
//
// Marker positions are *gaps*: position `i` sits before segment `i`, so a
// word of length n has gaps 0..=n. Syllable boundaries are stored as interior
// gaps only (0 < i < n); the word edges always count as syllable edges. The
// stem is a half-open gap pair `(start, end)`; a word without one treats the
// whole word as its stem.
//
// Notation: phonemes are written back to back and segmented by longest
// registered symbol. `.` marks a syllable boundary, `'` (or `ˈ`) stresses the
// next segment, and `<` `>` delimit the stem: `ke<'tu.ka>`.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::inventory::{Inventory, Phoneme};

/// One phoneme occurrence in a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    phoneme: Arc<Phoneme>,
    stressed: bool,
}

impl Segment {
    pub fn new(phoneme: Arc<Phoneme>, stressed: bool) -> Self {
        Segment { phoneme, stressed }
    }

    pub fn phoneme(&self) -> &Arc<Phoneme> {
        &self.phoneme
    }

    pub fn symbol(&self) -> &str {
        self.phoneme.symbol()
    }

    pub fn is_stressed(&self) -> bool {
        self.stressed
    }

    /// The same phoneme with the stress flag set to `stressed`.
    pub fn with_stress(&self, stressed: bool) -> Segment {
        Segment {
            phoneme: Arc::clone(&self.phoneme),
            stressed,
        }
    }
}

impl From<Arc<Phoneme>> for Segment {
    fn from(phoneme: Arc<Phoneme>) -> Self {
        Segment::new(phoneme, false)
    }
}

/// Replace `start..end` with `segments`. `start == end` is an insertion.
#[derive(Debug, Clone)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub segments: Vec<Segment>,
}

/// An immutable phoneme sequence with syllable and stem markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Word {
    segments: Vec<Segment>,
    syllable_boundaries: BTreeSet<usize>,
    stem: Option<(usize, usize)>,
}

impl Word {
    /// A word with no syllable boundaries and no stem.
    pub fn new(segments: Vec<Segment>) -> Self {
        Word {
            segments,
            syllable_boundaries: BTreeSet::new(),
            stem: None,
        }
    }

    pub fn from_phonemes(phonemes: impl IntoIterator<Item = Arc<Phoneme>>) -> Self {
        Word::new(phonemes.into_iter().map(Segment::from).collect())
    }

    /// Replace the syllable boundaries. Each must be an interior gap.
    pub fn with_syllable_boundaries(
        mut self,
        boundaries: impl IntoIterator<Item = usize>,
    ) -> Result<Self> {
        let len = self.len();
        let boundaries: BTreeSet<usize> = boundaries.into_iter().collect();
        if let Some(&bad) = boundaries.iter().find(|&&b| b == 0 || b >= len) {
            return Err(EngineError::Bounds {
                start: bad,
                end: bad,
                len,
                message: "syllable boundaries must fall between segments".to_string(),
            });
        }
        self.syllable_boundaries = boundaries;
        Ok(self)
    }

    /// Set the stem to the gaps `start..end`.
    pub fn with_stem(mut self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.len() {
            return Err(EngineError::Bounds {
                start,
                end,
                len: self.len(),
                message: "stem does not fit the word".to_string(),
            });
        }
        self.stem = Some((start, end));
        Ok(self)
    }

    /// Parse word notation against an inventory.
    pub fn parse(inventory: &Inventory, notation: &str) -> Result<Self> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut boundaries = BTreeSet::new();
        let mut stem_start: Option<usize> = None;
        let mut stem_end: Option<usize> = None;
        let mut stress_pending: Option<usize> = None;
        let mut run = String::new();

        let chars: Vec<char> = notation.chars().collect();
        for (i, &c) in chars.iter().enumerate() {
            let column = i + 1;
            let is_marker = matches!(c, '.' | '\'' | 'ˈ' | '<' | '>') || c.is_whitespace();
            if !is_marker {
                run.push(c);
                continue;
            }
            flush_run(inventory, &mut run, &mut segments, &mut stress_pending)?;
            match c {
                '.' => {
                    boundaries.insert(segments.len());
                }
                '\'' | 'ˈ' => {
                    if stress_pending.is_some() {
                        return Err(EngineError::syntax(column, c, "doubled stress mark"));
                    }
                    stress_pending = Some(column);
                }
                '<' => {
                    if stem_start.is_some() {
                        return Err(EngineError::syntax(column, c, "second stem start"));
                    }
                    stem_start = Some(segments.len());
                }
                '>' => {
                    if stem_start.is_none() || stem_end.is_some() {
                        return Err(EngineError::syntax(column, c, "`>` without a matching `<`"));
                    }
                    stem_end = Some(segments.len());
                }
                _ => {}
            }
        }
        flush_run(inventory, &mut run, &mut segments, &mut stress_pending)?;
        if let Some(column) = stress_pending {
            return Err(EngineError::syntax(column, "'", "stress mark with no segment after it"));
        }

        let len = segments.len();
        let stem = match (stem_start, stem_end) {
            (Some(start), Some(end)) => Some((start, end)),
            (None, None) => None,
            _ => {
                return Err(EngineError::syntax(chars.len() + 1, "end of input", "unclosed `<`"));
            }
        };
        boundaries.retain(|&b| b > 0 && b < len);
        Ok(Word {
            segments,
            syllable_boundaries: boundaries,
            stem,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Interior syllable boundary gaps.
    pub fn syllable_boundaries(&self) -> &BTreeSet<usize> {
        &self.syllable_boundaries
    }

    /// True at an interior syllable boundary or either word edge.
    pub fn is_syllable_edge(&self, gap: usize) -> bool {
        gap == 0 || gap == self.len() || self.syllable_boundaries.contains(&gap)
    }

    /// The explicit stem, if any.
    pub fn stem(&self) -> Option<(usize, usize)> {
        self.stem
    }

    /// The stem gaps, or the whole word when no stem is marked.
    pub fn stem_range(&self) -> Range<usize> {
        match self.stem {
            Some((start, end)) => start..end,
            None => 0..self.len(),
        }
    }

    /// Syllable spans inside `range`, cut at the interior boundaries it
    /// contains. Empty when `range` is.
    pub fn syllables_in(&self, range: Range<usize>) -> Vec<Range<usize>> {
        if range.is_empty() {
            return Vec::new();
        }
        let mut spans = Vec::new();
        let mut start = range.start;
        for &b in self.syllable_boundaries.range(range.start + 1..range.end) {
            spans.push(start..b);
            start = b;
        }
        spans.push(start..range.end);
        spans
    }

    /// Number of syllables in the whole word (0 for an empty word).
    pub fn syllable_count(&self) -> usize {
        self.syllables_in(0..self.len()).len()
    }

    /// Phoneme symbols in order.
    pub fn symbols(&self) -> Vec<&str> {
        self.segments.iter().map(Segment::symbol).collect()
    }

    /// The phonemes written back to back, without markers.
    pub fn text(&self) -> String {
        self.symbols().concat()
    }

    /// Apply disjoint edits, sorted by `start`, producing a new word.
    ///
    /// A gap inside a replaced span moves to the matching offset of the
    /// replacement (clamped to its end); a gap at an insertion point moves
    /// after the inserted segments. Boundaries that land on a word edge are
    /// dropped.
    pub fn splice(&self, edits: &[Edit]) -> Word {
        let len = self.len();
        let mut map = vec![0; len + 1];
        let mut segments = Vec::with_capacity(len);
        let mut old = 0;
        for edit in edits {
            while old < edit.start {
                map[old] = segments.len();
                segments.push(self.segments[old].clone());
                old += 1;
            }
            let new_start = segments.len();
            segments.extend(edit.segments.iter().cloned());
            let new_end = segments.len();
            if edit.end > edit.start {
                for gap in edit.start..edit.end {
                    map[gap] = (new_start + (gap - edit.start)).min(new_end);
                }
                old = edit.end;
            }
        }
        while old < len {
            map[old] = segments.len();
            segments.push(self.segments[old].clone());
            old += 1;
        }
        map[len] = segments.len();

        let new_len = segments.len();
        let syllable_boundaries = self
            .syllable_boundaries
            .iter()
            .map(|&b| map[b])
            .filter(|&b| b > 0 && b < new_len)
            .collect();
        let stem = self.stem.map(|(start, end)| (map[start], map[end]));
        Word {
            segments,
            syllable_boundaries,
            stem,
        }
    }
}

fn flush_run(
    inventory: &Inventory,
    run: &mut String,
    segments: &mut Vec<Segment>,
    stress_pending: &mut Option<usize>,
) -> Result<()> {
    if run.is_empty() {
        return Ok(());
    }
    for (k, phoneme) in inventory.segment(run)?.into_iter().enumerate() {
        let stressed = k == 0 && stress_pending.take().is_some();
        segments.push(Segment::new(phoneme, stressed));
    }
    run.clear();
    Ok(())
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.len();
        for gap in 0..=len {
            if let Some((start, end)) = self.stem {
                if start == end && start == gap {
                    write!(f, "<>")?;
                } else {
                    if end == gap {
                        write!(f, ">")?;
                    }
                    if self.syllable_boundaries.contains(&gap) {
                        write!(f, ".")?;
                    }
                    if start == gap {
                        write!(f, "<")?;
                    }
                }
            } else if self.syllable_boundaries.contains(&gap) {
                write!(f, ".")?;
            }
            if let Some(segment) = self.segments.get(gap) {
                if segment.stressed {
                    write!(f, "'")?;
                }
                write!(f, "{}", segment.symbol())?;
            }
        }
        Ok(())
    }
}

/// Assembles a word from pieces of other words and fresh segments.
#[derive(Debug, Default)]
pub struct WordBuilder {
    segments: Vec<Segment>,
    boundaries: BTreeSet<usize>,
    stem_start: Option<usize>,
    stem_end: Option<usize>,
}

impl WordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current length in segments.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn push_segments(&mut self, segments: impl IntoIterator<Item = Segment>) -> &mut Self {
        self.segments.extend(segments);
        self
    }

    /// Copy `range` of `word`, with its syllable boundaries (including one at
    /// `range.start`, so a cut at a syllable edge keeps that edge).
    pub fn push_span(&mut self, word: &Word, range: Range<usize>) -> &mut Self {
        if range.start > 0 && word.syllable_boundaries.contains(&range.start) {
            self.syllable_break();
        }
        let offset = self.segments.len();
        for &b in word.syllable_boundaries.range(range.start + 1..range.end.max(range.start + 1)) {
            self.boundaries.insert(offset + (b - range.start));
        }
        self.segments.extend(word.segments[range].iter().cloned());
        self
    }

    /// Mark a syllable boundary at the current end.
    pub fn syllable_break(&mut self) -> &mut Self {
        self.boundaries.insert(self.segments.len());
        self
    }

    pub fn stem_start(&mut self) -> &mut Self {
        self.stem_start = Some(self.segments.len());
        self
    }

    pub fn stem_end(&mut self) -> &mut Self {
        self.stem_end = Some(self.segments.len());
        self
    }

    pub fn finish(self) -> Word {
        let len = self.segments.len();
        let stem = match (self.stem_start, self.stem_end) {
            (Some(start), Some(end)) if start <= end => Some((start, end)),
            _ => None,
        };
        Word {
            segments: self.segments,
            syllable_boundaries: self
                .boundaries
                .into_iter()
                .filter(|&b| b > 0 && b < len)
                .collect(),
            stem,
        }
    }
}
