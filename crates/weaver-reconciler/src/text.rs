//! Flat text storage the reconciler writes into.
//!
//! The `TextStorage` trait is the sink for reconciliation edits: a replace of
//! a char range with attributed fragments, or an attribute change over a
//! range. `EditorRope` keeps the text in a ropey rope and the attributes as a
//! normalized run list.

use std::ops::Range;

use crate::error::StorageError;
use crate::node::Attributes;

/// A piece of text carrying one set of attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    pub attributes: Attributes,
}

impl Fragment {
    pub fn new(text: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            text: text.into(),
            attributes,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Attributes::plain())
    }

    pub fn len_chars(&self) -> usize {
        self.text.chars().count()
    }
}

/// Total char length of a fragment list.
pub fn fragments_len(fragments: &[Fragment]) -> usize {
    fragments.iter().map(Fragment::len_chars).sum()
}

/// Append `fragment`, merging it into the last one when attributes match.
pub(crate) fn push_fragment(out: &mut Vec<Fragment>, text: &str, attributes: Attributes) {
    if text.is_empty() {
        return;
    }
    match out.last_mut() {
        Some(last) if last.attributes == attributes => last.text.push_str(text),
        _ => out.push(Fragment::new(text, attributes)),
    }
}

/// A maximal range of chars sharing the same attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRun {
    pub range: Range<usize>,
    pub attributes: Attributes,
}

/// One edit against flat storage, in the coordinates of the text at the time
/// it is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextEdit {
    /// Replace `range` with the concatenation of `fragments`.
    Replace {
        range: Range<usize>,
        fragments: Vec<Fragment>,
    },
    /// Change attributes over `range` without touching the text.
    SetAttributes {
        range: Range<usize>,
        attributes: Attributes,
    },
}

impl TextEdit {
    pub fn range(&self) -> &Range<usize> {
        match self {
            TextEdit::Replace { range, .. } | TextEdit::SetAttributes { range, .. } => range,
        }
    }

    /// Chars inserted minus chars removed.
    pub fn length_delta(&self) -> i64 {
        match self {
            TextEdit::Replace { range, fragments } => {
                fragments_len(fragments) as i64 - range.len() as i64
            }
            TextEdit::SetAttributes { .. } => 0,
        }
    }

    pub fn is_attribute_only(&self) -> bool {
        matches!(self, TextEdit::SetAttributes { .. })
    }
}

/// Attributed text storage addressed in chars.
pub trait TextStorage {
    /// Total length in chars (Unicode scalar values).
    fn len_chars(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    /// Replace `range` with `fragments`.
    fn replace(&mut self, range: Range<usize>, fragments: &[Fragment]) -> Result<(), StorageError>;

    /// Set `attributes` on every char of `range`.
    fn set_attributes(
        &mut self,
        range: Range<usize>,
        attributes: &Attributes,
    ) -> Result<(), StorageError>;

    /// Text of `range`, `None` when out of bounds.
    fn slice(&self, range: Range<usize>) -> Option<String>;

    fn to_string(&self) -> String;

    /// Normalized attribute runs covering the whole text.
    fn attribute_runs(&self) -> Vec<AttributeRun>;

    fn apply(&mut self, edit: &TextEdit) -> Result<(), StorageError> {
        match edit {
            TextEdit::Replace { range, fragments } => self.replace(range.clone(), fragments),
            TextEdit::SetAttributes { range, attributes } => {
                self.set_attributes(range.clone(), attributes)
            }
        }
    }
}

/// Ropey-backed attributed text.
#[derive(Debug, Clone, Default)]
pub struct EditorRope {
    rope: ropey::Rope,
    /// Sorted, contiguous, non-empty, adjacent runs never share attributes.
    runs: Vec<AttributeRun>,
}

impl EditorRope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from plain text with default attributes.
    pub fn from_text(s: &str) -> Self {
        let mut rope = Self::new();
        // Appending to an empty rope cannot be out of bounds.
        rope.replace(0..0, &[Fragment::plain(s)]).ok();
        rope
    }

    pub fn rope(&self) -> &ropey::Rope {
        &self.rope
    }

    /// Attributes of the char at `offset`.
    pub fn attributes_at(&self, offset: usize) -> Option<&Attributes> {
        let idx = self
            .runs
            .partition_point(|run| run.range.end <= offset);
        self.runs
            .get(idx)
            .filter(|run| run.range.contains(&offset))
            .map(|run| &run.attributes)
    }

    fn check_range(&self, range: &Range<usize>) -> Result<(), StorageError> {
        let len = self.rope.len_chars();
        if range.start > range.end || range.end > len {
            return Err(StorageError::OutOfBounds {
                range: range.clone(),
                len,
            });
        }
        Ok(())
    }

    /// Split the run containing `pos` so that a run boundary falls on `pos`.
    /// Returns the index of the first run starting at or after `pos`.
    fn split_runs_at(&mut self, pos: usize) -> usize {
        let idx = self.runs.partition_point(|run| run.range.end <= pos);
        let Some(run) = self.runs.get_mut(idx) else {
            return idx;
        };
        if run.range.start >= pos {
            return idx;
        }
        let tail = AttributeRun {
            range: pos..run.range.end,
            attributes: run.attributes.clone(),
        };
        run.range.end = pos;
        self.runs.insert(idx + 1, tail);
        idx + 1
    }

    fn normalize_runs(&mut self) {
        self.runs = normalize_runs(std::mem::take(&mut self.runs));
    }
}

impl TextStorage for EditorRope {
    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn replace(&mut self, range: Range<usize>, fragments: &[Fragment]) -> Result<(), StorageError> {
        self.check_range(&range)?;

        self.rope.remove(range.clone());
        let mut cursor = range.start;
        let mut inserted = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let len = fragment.len_chars();
            if len == 0 {
                continue;
            }
            self.rope.insert(cursor, &fragment.text);
            inserted.push(AttributeRun {
                range: cursor..cursor + len,
                attributes: fragment.attributes.clone(),
            });
            cursor += len;
        }

        let first = self.split_runs_at(range.start);
        let last = self.split_runs_at(range.end);
        self.runs.drain(first..last);

        let added = cursor - range.start;
        for run in &mut self.runs[first..] {
            run.range.start = run.range.start - range.len() + added;
            run.range.end = run.range.end - range.len() + added;
        }
        self.runs.splice(first..first, inserted);
        self.normalize_runs();
        Ok(())
    }

    fn set_attributes(
        &mut self,
        range: Range<usize>,
        attributes: &Attributes,
    ) -> Result<(), StorageError> {
        self.check_range(&range)?;
        if range.is_empty() {
            return Ok(());
        }
        let first = self.split_runs_at(range.start);
        let last = self.split_runs_at(range.end);
        for run in &mut self.runs[first..last] {
            run.attributes = attributes.clone();
        }
        self.normalize_runs();
        Ok(())
    }

    fn slice(&self, range: Range<usize>) -> Option<String> {
        if range.start > range.end || range.end > self.rope.len_chars() {
            return None;
        }
        Some(self.rope.slice(range).to_string())
    }

    fn to_string(&self) -> String {
        self.rope.to_string()
    }

    fn attribute_runs(&self) -> Vec<AttributeRun> {
        self.runs.clone()
    }
}

impl From<&str> for EditorRope {
    fn from(s: &str) -> Self {
        Self::from_text(s)
    }
}

/// Normalize an arbitrary run list: drop empty runs, merge equal neighbours.
pub fn normalize_runs(runs: impl IntoIterator<Item = AttributeRun>) -> Vec<AttributeRun> {
    let mut out: Vec<AttributeRun> = Vec::new();
    for run in runs {
        if run.range.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.attributes == run.attributes && last.range.end == run.range.start => {
                last.range.end = run.range.end;
            }
            _ => out.push(run),
        }
    }
    out
}

/// Attribute runs described by a fragment list placed at offset 0.
pub fn runs_from_fragments(fragments: &[Fragment]) -> Vec<AttributeRun> {
    let mut cursor = 0;
    normalize_runs(fragments.iter().map(|fragment| {
        let len = fragment.len_chars();
        let run = AttributeRun {
            range: cursor..cursor + len,
            attributes: fragment.attributes.clone(),
        };
        cursor += len;
        run
    }))
}
