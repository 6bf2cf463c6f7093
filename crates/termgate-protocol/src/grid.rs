use serde::Serialize;
use std::fmt;

use crate::{DEFAULT_COLS, DEFAULT_ROWS};

/// Terminal grid in character cells. Both dimensions are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GridSize {
    cols: u16,
    rows: u16,
}

impl GridSize {
    /// Build a grid, rejecting zero dimensions
    pub fn new(cols: u16, rows: u16) -> Option<Self> {
        if cols == 0 || rows == 0 {
            return None;
        }
        Some(Self { cols, rows })
    }

    /// Build a grid from untrusted signed values (wire input).
    /// Non-positive and out-of-range values yield `None`.
    pub fn from_signed(cols: i64, rows: i64) -> Option<Self> {
        let cols = u16::try_from(cols).ok()?;
        let rows = u16::try_from(rows).ok()?;
        Self::new(cols, rows)
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

impl fmt::Display for GridSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_and_negative() {
        assert!(GridSize::new(0, 24).is_none());
        assert!(GridSize::new(80, 0).is_none());
        assert!(GridSize::from_signed(-1, 24).is_none());
        assert!(GridSize::from_signed(80, 0).is_none());
        assert!(GridSize::from_signed(70_000, 24).is_none());
    }

    #[test]
    fn test_default_is_80x24() {
        let grid = GridSize::default();
        assert_eq!((grid.cols(), grid.rows()), (80, 24));
        assert_eq!(grid.to_string(), "80x24");
    }
}
