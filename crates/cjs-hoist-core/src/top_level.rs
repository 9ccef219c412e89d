//! Tracks which top-level statement the traversal is inside.
//!
//! Generated declarations anchor to the statement open when the need for them
//! is first discovered, not to the start of the file, so side-effecting
//! statements keep their relative order.

use std::ops::Range;

#[derive(Debug, Default)]
pub struct TopLevelTracker {
    current: Option<Range<usize>>,
    entered: usize,
}

impl TopLevelTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the statement spanning `range` is now open.
    pub fn enter(&mut self, range: Range<usize>) {
        self.current = Some(range);
        self.entered += 1;
    }

    /// The most recently entered top-level statement.
    #[must_use]
    pub fn current(&self) -> Option<Range<usize>> {
        self.current.clone()
    }

    /// Number of top-level statements entered so far.
    #[must_use]
    pub fn entered(&self) -> usize {
        self.entered
    }
}
