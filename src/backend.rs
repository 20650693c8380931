// SPDX-License-Identifier: MIT
//
// The platform capability seam.
//
// Everything the engine needs from a host console is expressed through
// this trait: device-type queries, line-discipline control, non-blocking
// byte reads, bounded polling, window-size and resize observation, and
// per-stream writes. Exactly two kinds of implementation exist:
//
//   PosixBackend    — termios/ioctl/poll against the real process streams
//                     (selected at build time on unix; see posix.rs).
//   ScriptedBackend — a deterministic in-memory console standing in for
//                     structured-input hosts and driving every unit test
//                     (see scripted.rs).
//
// The key decoder's escape tables are data, parameterized per backend via
// `extended_keys`, so platform-specific bindings never branch inline in
// the state machine.

use std::io;
use std::time::Duration;

use crate::error::Result;
use crate::geom::{Coordinate, Dimensions};
use crate::key::SeqPattern;
use crate::raw::RawScope;
use crate::stream::StreamRole;

/// Outcome of a single non-blocking byte read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadByte {
    /// One byte arrived.
    Byte(u8),
    /// Nothing buffered (or end of stream).
    Empty,
    /// The read was interrupted by a signal before any byte arrived.
    Interrupted,
}

/// Outcome of a bounded wait for input readability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    /// At least one byte can be read without blocking.
    Ready,
    /// The time budget elapsed with nothing to read.
    TimedOut,
    /// The wait was interrupted by a signal.
    Interrupted,
}

/// Host console capabilities required by the engine.
pub trait Backend {
    /// Device-type query: is `role` connected to something other than an
    /// interactive terminal? "Not a terminal" with no underlying error is
    /// a `false`-side answer, not a failure.
    ///
    /// # Errors
    ///
    /// A genuine query failure (e.g. a closed descriptor).
    fn is_redirected(&mut self, role: StreamRole) -> io::Result<bool>;

    /// Current window size, if the host can report one.
    fn dimensions(&mut self) -> Option<Dimensions>;

    /// Capture the current line-discipline attributes and switch to raw
    /// mode for `scope`. Must fail with [`crate::Error::RawModeActive`]
    /// if a session is already active, and
    /// [`crate::Error::AttributesUnavailable`] if the get/set calls fail.
    ///
    /// # Errors
    ///
    /// See above.
    fn enter_raw(&mut self, scope: RawScope) -> Result<()>;

    /// Restore the exact snapshot captured by the matching
    /// [`enter_raw`](Self::enter_raw) — never a hard-coded default.
    ///
    /// # Errors
    ///
    /// [`crate::Error::AttributesUnavailable`] if restoration fails or no
    /// session is active.
    fn exit_raw(&mut self) -> Result<()>;

    /// Toggle whether input reads return immediately when no data is
    /// buffered. The pre-raw-mode blocking state is part of the snapshot
    /// restored by [`exit_raw`](Self::exit_raw).
    ///
    /// # Errors
    ///
    /// [`crate::Error::AttributesUnavailable`] if the toggle fails.
    fn set_nonblocking(&mut self, enabled: bool) -> Result<()>;

    /// Read one byte from the input stream, honoring the current
    /// blocking mode.
    ///
    /// # Errors
    ///
    /// A genuine read failure; would-block and EOF are [`ReadByte::Empty`].
    fn read_byte(&mut self) -> io::Result<ReadByte>;

    /// Wait until input is readable. `None` waits forever.
    ///
    /// # Errors
    ///
    /// A genuine poll failure; signal interruption is
    /// [`PollStatus::Interrupted`].
    fn poll_input(&mut self, timeout: Option<Duration>) -> io::Result<PollStatus>;

    /// Take-and-clear: has a window-resize notification arrived since the
    /// last call?
    fn resize_observed(&mut self) -> bool;

    /// Write bytes to an output stream. `role` must be `Output` or
    /// `Error`; writing to `Input` is a caller bug and fails.
    ///
    /// # Errors
    ///
    /// The underlying write failure.
    fn write(&mut self, role: StreamRole, bytes: &[u8]) -> io::Result<()>;

    /// Flush an output stream.
    ///
    /// # Errors
    ///
    /// The underlying flush failure.
    fn flush(&mut self, role: StreamRole) -> io::Result<()>;

    /// Discard any bytes buffered on the input stream.
    ///
    /// # Errors
    ///
    /// The underlying flush failure.
    fn discard_input(&mut self) -> io::Result<()>;

    /// Platform-specific escape sequences consulted before the generic
    /// tables (e.g. Option-key word navigation on macOS). Empty on hosts
    /// with no extensions.
    fn extended_keys(&self) -> &'static [SeqPattern] {
        &[]
    }

    /// Hosts with direct console-buffer metadata answer cursor queries
    /// here, skipping the write/reply round-trip entirely. `None` selects
    /// the DSR protocol.
    fn cursor_position_direct(&mut self) -> Option<Coordinate> {
        None
    }
}
