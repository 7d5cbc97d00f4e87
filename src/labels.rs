//! Mapping of classifier output indices to sign symbols.

use std::{fmt, str::FromStr};

use anyhow::{bail, ensure};
use itertools::Itertools;

/// The letters of the American Sign Language manual alphabet that can be signed with a static
/// hand shape (J and Z involve motion).
///
/// The order matches the classifier's output indices.
pub const ASL_LETTERS: &str = "ABCDEFGHIKLMNOPQRSTUVWXY";

/// Returns the ASL letter for a classifier output index, or [`None`] if the index is out of range.
pub fn predict_asl_letter(index: usize) -> Option<char> {
    ASL_LETTERS.chars().nth(index)
}

/// An ordered set of symbols, one per classifier output.
#[derive(Clone, PartialEq, Eq)]
pub struct LabelSet {
    symbols: Vec<char>,
}

impl LabelSet {
    /// Creates a label set from its symbols, in classifier output order.
    ///
    /// Returns an error if `symbols` is empty or contains a symbol more than once.
    pub fn new(symbols: Vec<char>) -> anyhow::Result<Self> {
        ensure!(!symbols.is_empty(), "label set must not be empty");
        if let Some(c) = symbols.iter().duplicates().next() {
            bail!("label set contains '{}' more than once", c);
        }
        Ok(Self { symbols })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Returns the symbol for a classifier output index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<char> {
        self.symbols.get(index).copied()
    }

    /// Checks that this label set has one symbol per classifier output.
    pub fn check_width(&self, output_width: usize) -> anyhow::Result<()> {
        ensure!(
            self.len() == output_width,
            "label set {} has {} symbols, but the classifier produces {} outputs",
            self,
            self.len(),
            output_width,
        );
        Ok(())
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self {
            symbols: ASL_LETTERS.chars().collect(),
        }
    }
}

impl FromStr for LabelSet {
    type Err = anyhow::Error;

    /// Parses a label set from a string containing every symbol once, in output order.
    /// Whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.chars().filter(|c| !c.is_whitespace()).collect())
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.symbols {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LabelSet(\"{}\")", self)
    }
}
