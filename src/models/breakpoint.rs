//! Normalized breakpoint sets.

use std::collections::BTreeSet;

/// Sorted set of unique, 1-based breakpoint lines.
///
/// Caller input may be unordered and contain duplicates; each distinct line
/// yields exactly one protocol command. Line `0` is not a valid source line
/// and is discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BreakpointSet(BTreeSet<u32>);

impl BreakpointSet {
    /// Build a normalized set from arbitrary caller input.
    pub fn new(lines: impl IntoIterator<Item = u32>) -> Self {
        Self(lines.into_iter().filter(|line| *line > 0).collect())
    }

    /// Lines in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Number of unique lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no breakpoints are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<u32> for BreakpointSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self::new(iter)
    }
}
