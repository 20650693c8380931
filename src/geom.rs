// SPDX-License-Identifier: MIT
//
// Screen geometry — coordinates and dimensions in character cells.
//
// The engine's public coordinate system is zero-based with the origin at
// the top-left corner: column grows rightward, row grows downward. ANSI
// reports and requests are 1-based; the conversion happens at the wire
// boundary (`ansi.rs`, `cursor.rs`), never in caller-facing types.

/// A cell position: zero-based, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coordinate {
    /// Column, increasing rightward.
    pub col: u16,
    /// Row, increasing downward.
    pub row: u16,
}

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    /// Number of columns (width).
    pub cols: u16,
    /// Number of rows (height).
    pub rows: u16,
}

impl Dimensions {
    /// Total number of cells (`cols × rows`). Derived, never stored.
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        (self.cols as u32) * (self.rows as u32)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
