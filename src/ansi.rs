// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about where a sequence should go — that's the router's job.
// This module just knows the byte-level encoding of every terminal command
// the engine emits.
//
// All cursor positions are 0-indexed in our API and converted to 1-indexed
// for the terminal (ANSI uses 1-based coordinates).
//
// All functions return `io::Result` propagated from the underlying writer.
// In practice they never fail when writing to a `Vec<u8>` staging buffer.

use std::io::{self, Write};

use crate::geom::Coordinate;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor using the CUP (Cursor Position) sequence.
///
/// Our coordinates are 0-indexed; ANSI CUP is 1-indexed.
#[inline]
pub fn cursor_to(w: &mut impl Write, pos: Coordinate) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", pos.row + 1, pos.col + 1)
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Cursor Shape ───────────────────────────────────────────────────────────

/// Terminal cursor shape (DECSCUSR — Set Cursor Style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    /// Terminal default (usually blinking block).
    #[default]
    Default,
    /// Blinking block cursor.
    BlinkBlock,
    /// Steady (non-blinking) block cursor.
    SteadyBlock,
    /// Blinking underline cursor.
    BlinkUnderline,
    /// Steady underline cursor.
    SteadyUnderline,
    /// Blinking bar (I-beam) cursor.
    BlinkBar,
    /// Steady bar (I-beam) cursor.
    SteadyBar,
}

/// Set the cursor shape using DECSCUSR (`ESC [ N SP q`).
#[inline]
pub fn set_cursor_shape(w: &mut impl Write, shape: CursorShape) -> io::Result<()> {
    let n: u8 = match shape {
        CursorShape::Default => 0,
        CursorShape::BlinkBlock => 1,
        CursorShape::SteadyBlock => 2,
        CursorShape::BlinkUnderline => 3,
        CursorShape::SteadyUnderline => 4,
        CursorShape::BlinkBar => 5,
        CursorShape::SteadyBar => 6,
    };
    write!(w, "\x1b[{n} q")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Clear the current line (EL 2).
#[inline]
pub fn clear_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2K")
}

/// Clear the scrollback history (ED 3, xterm extension).
#[inline]
pub fn clear_history(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[3J")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
#[inline]
pub fn sgr_reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

/// Emit an SGR sequence with caller-supplied parameters (`ESC [ params m`).
/// The parameters are passed through verbatim; composing them is the
/// caller's business.
#[inline]
pub fn sgr(w: &mut impl Write, params: &str) -> io::Result<()> {
    write!(w, "\x1b[{params}m")
}

// ─── Alternate Screen ───────────────────────────────────────────────────────

/// Enter the alternate screen buffer (DEC Private Mode 1049).
///
/// A separate buffer that preserves the original terminal content; exiting
/// restores it, which is what makes full-screen programs non-destructive.
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Exit the alternate screen buffer and restore original content.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Reports & Signals ──────────────────────────────────────────────────────

/// Request a cursor-position report (DSR 6).
///
/// The terminal answers on the *input* channel with `ESC [ row ; col R`,
/// 1-based. See `cursor.rs` for the reply parser.
#[inline]
pub fn dsr_request(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

/// Ring the terminal bell (BEL).
#[inline]
pub fn bell(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x07")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
