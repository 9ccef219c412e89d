//! Edit log over an immutable source string.
//!
//! Edits are recorded during traversal and only materialised once the
//! traversal has finished, so a failing transform never exposes partial
//! output. Overwrites are content-only: text inserted at either boundary of
//! an overwritten range is kept.

use crate::error::TransformError;
use crate::sourcemap::{LineIndex, SourceMapBuilder};
use std::collections::BTreeMap;
use std::iter::Peekable;
use std::ops::Range;

/// Texts queued at one position.
#[derive(Debug, Default)]
struct Insertions {
    /// Attached to the content ending here. Emitted first.
    after: Vec<String>,
    /// Attached to the content starting here.
    before: Vec<String>,
}

#[derive(Debug)]
struct Overwrite {
    range: Range<usize>,
    text: String,
}

/// One contiguous piece of materialised output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Piece<'a> {
    /// Unchanged original text.
    Original { start: usize, end: usize },
    /// Text with no counterpart in the original.
    Inserted(&'a str),
    /// Replacement for an original range.
    Replaced {
        start: usize,
        end: usize,
        text: &'a str,
    },
}

/// The original text plus its edit log.
#[derive(Debug)]
pub struct SourceBuffer<'a> {
    original: &'a str,
    overwrites: Vec<Overwrite>,
    insertions: BTreeMap<usize, Insertions>,
}

impl<'a> SourceBuffer<'a> {
    #[must_use]
    pub fn new(original: &'a str) -> Self {
        Self {
            original,
            overwrites: Vec::new(),
            insertions: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn original(&self) -> &'a str {
        self.original
    }

    /// Number of recorded edits.
    #[must_use]
    pub fn edit_count(&self) -> usize {
        self.overwrites.len()
            + self
                .insertions
                .values()
                .map(|i| i.after.len() + i.before.len())
                .sum::<usize>()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edit_count() == 0
    }

    /// Replace `range` with `text`.
    pub fn overwrite(&mut self, range: Range<usize>, text: impl Into<String>) {
        self.overwrites.push(Overwrite {
            range,
            text: text.into(),
        });
    }

    /// Delete `range`.
    pub fn remove(&mut self, range: Range<usize>) {
        self.overwrite(range, "");
    }

    /// Insert `text` in front of the content starting at `pos`.
    ///
    /// Repeated calls at one position keep issue order, so the last text
    /// issued ends up nearest to `pos`.
    pub fn insert_before(&mut self, pos: usize, text: impl Into<String>) {
        self.insertions
            .entry(pos)
            .or_default()
            .before
            .push(text.into());
    }

    /// Insert `text` behind the content ending at `pos`.
    pub fn insert_after(&mut self, pos: usize, text: impl Into<String>) {
        self.insertions
            .entry(pos)
            .or_default()
            .after
            .push(text.into());
    }

    /// Apply the edit log and return the rewritten text.
    pub fn materialize(&self) -> Result<String, TransformError> {
        let pieces = self.pieces()?;
        let mut out = String::with_capacity(self.original.len() + 64);
        for piece in pieces {
            match piece {
                Piece::Original { start, end } => out.push_str(&self.original[start..end]),
                Piece::Inserted(text) | Piece::Replaced { text, .. } => out.push_str(text),
            }
        }
        Ok(out)
    }

    /// Build a v3 source map from the original to the rewritten text.
    pub fn generate_map(&self, file: Option<&str>) -> Result<String, TransformError> {
        let pieces = self.pieces()?;
        let index = LineIndex::new(self.original);
        let mut builder = SourceMapBuilder::new(file, self.original);

        let (mut line, mut col) = (0u32, 0u32);
        for piece in pieces {
            match piece {
                Piece::Original { start, end } => {
                    if start == end {
                        continue;
                    }
                    let (src_line, src_col) = index.line_col(start);
                    builder.add_mapping(line, col, src_line, src_col);
                    let text = &self.original[start..end];
                    for (i, c) in text.char_indices() {
                        if c == '\n' {
                            line += 1;
                            col = 0;
                            let next = start + i + 1;
                            if next < end {
                                let (src_line, src_col) = index.line_col(next);
                                builder.add_mapping(line, col, src_line, src_col);
                            }
                        } else {
                            col += c.len_utf16() as u32;
                        }
                    }
                }
                Piece::Replaced { start, text, .. } => {
                    if !text.is_empty() {
                        let (src_line, src_col) = index.line_col(start);
                        builder.add_mapping(line, col, src_line, src_col);
                    }
                    advance(text, &mut line, &mut col);
                }
                Piece::Inserted(text) => advance(text, &mut line, &mut col),
            }
        }

        builder.generate()
    }

    /// Validate the log and lay it out as ordered output pieces.
    pub(crate) fn pieces(&self) -> Result<Vec<Piece<'_>>, TransformError> {
        let mut overwrites: Vec<&Overwrite> = self
            .overwrites
            .iter()
            .filter(|o| o.range.start < o.range.end)
            .collect();
        overwrites.sort_by_key(|o| o.range.start);

        for pair in overwrites.windows(2) {
            if pair[0].range.end > pair[1].range.start {
                return Err(TransformError::EditConflict {
                    first: pair[0].range.clone(),
                    second: pair[1].range.clone(),
                });
            }
        }
        for &pos in self.insertions.keys() {
            if let Some(o) = overwrites
                .iter()
                .find(|o| o.range.start < pos && pos < o.range.end)
            {
                return Err(TransformError::EditConflict {
                    first: o.range.clone(),
                    second: pos..pos,
                });
            }
        }

        let len = self.original.len();
        let mut pieces = Vec::with_capacity(overwrites.len() * 2 + self.insertions.len() + 1);
        let mut pos = 0;
        let mut pending = overwrites.into_iter().peekable();

        for (&at, queued) in &self.insertions {
            push_until(at.min(len), &mut pos, &mut pending, &mut pieces);
            pieces.extend(
                queued
                    .after
                    .iter()
                    .chain(&queued.before)
                    .map(|t| Piece::Inserted(t.as_str())),
            );
        }
        push_until(len, &mut pos, &mut pending, &mut pieces);

        Ok(pieces)
    }
}

/// Emit overwrites starting before `limit`, then original text up to it.
fn push_until<'b>(
    limit: usize,
    pos: &mut usize,
    pending: &mut Peekable<std::vec::IntoIter<&'b Overwrite>>,
    pieces: &mut Vec<Piece<'b>>,
) {
    while let Some(o) = pending.next_if(|o| o.range.start < limit) {
        if *pos < o.range.start {
            pieces.push(Piece::Original {
                start: *pos,
                end: o.range.start,
            });
        }
        pieces.push(Piece::Replaced {
            start: o.range.start,
            end: o.range.end,
            text: &o.text,
        });
        *pos = o.range.end;
    }
    if *pos < limit {
        pieces.push(Piece::Original {
            start: *pos,
            end: limit,
        });
        *pos = limit;
    }
}

fn advance(text: &str, line: &mut u32, col: &mut u32) {
    for c in text.chars() {
        if c == '\n' {
            *line += 1;
            *col = 0;
        } else {
            *col += c.len_utf16() as u32;
        }
    }
}
