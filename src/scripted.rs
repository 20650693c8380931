// SPDX-License-Identifier: MIT
//
// Scripted backend — a deterministic in-memory console.
//
// Serves two jobs: the engine's backend on hosts where the process
// streams are structured handles rather than byte devices, and the
// harness every unit test drives. Input is a scripted byte queue, output
// is captured per stream, raw-mode transitions are counted, and resize
// interrupts are injected on demand. Nothing here ever blocks: an empty
// queue reports a timeout (or end-of-stream for an unbounded wait)
// immediately, so tests run at full speed.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::backend::{Backend, PollStatus, ReadByte};
use crate::error::{Error, Result};
use crate::geom::{Coordinate, Dimensions};
use crate::key::SeqPattern;
use crate::raw::RawScope;
use crate::stream::StreamRole;

/// In-memory console with scripted input and captured output.
#[derive(Debug)]
pub struct ScriptedBackend {
    redirected: [bool; 3],
    input: VecDeque<u8>,
    written: [Vec<u8>; 3],
    flushes: [usize; 3],
    dimensions: Option<Dimensions>,
    direct_cursor: Option<Coordinate>,
    cursor_reply: Option<Vec<u8>>,
    extended: &'static [SeqPattern],
    raw_scope: Option<RawScope>,
    raw_enters: usize,
    raw_exits: usize,
    nonblocking: bool,
    pending_interrupt: bool,
    resize_flag: bool,
}

impl ScriptedBackend {
    /// A console with all three streams interactive and an 80×24 window.
    #[must_use]
    pub fn interactive() -> Self {
        Self {
            redirected: [false; 3],
            input: VecDeque::new(),
            written: [Vec::new(), Vec::new(), Vec::new()],
            flushes: [0; 3],
            dimensions: Some(Dimensions { cols: 80, rows: 24 }),
            direct_cursor: None,
            cursor_reply: None,
            extended: &[],
            raw_scope: None,
            raw_enters: 0,
            raw_exits: 0,
            nonblocking: false,
            pending_interrupt: false,
            resize_flag: false,
        }
    }

    // ── Scripting ───────────────────────────────────────────────

    /// Mark a stream as redirected (pipe/file) for classification.
    pub const fn set_redirected(&mut self, role: StreamRole, redirected: bool) {
        self.redirected[role.index()] = redirected;
    }

    /// Append bytes to the input queue.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    /// Replace the platform escape-sequence table.
    #[must_use]
    pub const fn with_extended_keys(mut self, table: &'static [SeqPattern]) -> Self {
        self.extended = table;
        self
    }

    /// Override the reported window size (`None` simulates an unsized
    /// host).
    pub const fn set_dimensions(&mut self, dimensions: Option<Dimensions>) {
        self.dimensions = dimensions;
    }

    /// Answer cursor queries directly instead of via the wire protocol.
    pub const fn set_direct_cursor(&mut self, position: Option<Coordinate>) {
        self.direct_cursor = position;
    }

    /// Script the bytes the console sends back when it sees a
    /// cursor-position request on an output stream. Consumed on the first
    /// request, as a real terminal answers each request once.
    pub fn set_cursor_reply(&mut self, reply: &[u8]) {
        self.cursor_reply = Some(reply.to_vec());
    }

    /// Arrange for the next wait to be interrupted by a window resize.
    pub const fn inject_resize(&mut self) {
        self.pending_interrupt = true;
        self.resize_flag = true;
    }

    // ── Inspection ──────────────────────────────────────────────

    /// Whether a raw-mode session is currently live.
    #[must_use]
    pub const fn raw_active(&self) -> bool {
        self.raw_scope.is_some()
    }

    /// Raw-mode transition counters as `(enters, exits)`.
    #[must_use]
    pub const fn raw_transitions(&self) -> (usize, usize) {
        (self.raw_enters, self.raw_exits)
    }

    /// Everything written to a stream so far.
    #[must_use]
    pub fn written(&self, role: StreamRole) -> &[u8] {
        &self.written[role.index()]
    }

    /// How many times a stream was flushed.
    #[must_use]
    pub const fn flush_count(&self, role: StreamRole) -> usize {
        self.flushes[role.index()]
    }

    /// Bytes still sitting in the input queue.
    #[must_use]
    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }
}

impl Backend for ScriptedBackend {
    fn is_redirected(&mut self, role: StreamRole) -> io::Result<bool> {
        Ok(self.redirected[role.index()])
    }

    fn dimensions(&mut self) -> Option<Dimensions> {
        self.dimensions
    }

    fn enter_raw(&mut self, scope: RawScope) -> Result<()> {
        if self.raw_scope.is_some() {
            return Err(Error::RawModeActive);
        }
        self.raw_scope = Some(scope);
        self.raw_enters += 1;
        Ok(())
    }

    fn exit_raw(&mut self) -> Result<()> {
        if self.raw_scope.take().is_none() {
            return Err(Error::AttributesUnavailable(io::Error::other(
                "no raw session to restore",
            )));
        }
        self.nonblocking = false;
        self.raw_exits += 1;
        Ok(())
    }

    fn set_nonblocking(&mut self, enabled: bool) -> Result<()> {
        self.nonblocking = enabled;
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<ReadByte> {
        Ok(self.input.pop_front().map_or(ReadByte::Empty, ReadByte::Byte))
    }

    fn poll_input(&mut self, timeout: Option<Duration>) -> io::Result<PollStatus> {
        if self.pending_interrupt {
            self.pending_interrupt = false;
            return Ok(PollStatus::Interrupted);
        }
        if !self.input.is_empty() {
            return Ok(PollStatus::Ready);
        }
        // An empty script never refills: a bounded wait times out at
        // once, an unbounded wait sees end-of-stream via an empty read.
        Ok(match timeout {
            Some(_) => PollStatus::TimedOut,
            None => PollStatus::Ready,
        })
    }

    fn resize_observed(&mut self) -> bool {
        std::mem::take(&mut self.resize_flag)
    }

    fn write(&mut self, role: StreamRole, bytes: &[u8]) -> io::Result<()> {
        if matches!(role, StreamRole::Input) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot write to the input stream",
            ));
        }
        self.written[role.index()].extend_from_slice(bytes);
        // A scripted terminal answers a cursor-position request by
        // placing the reply on the input stream.
        if bytes.windows(4).any(|w| w == b"\x1b[6n") {
            if let Some(reply) = self.cursor_reply.take() {
                self.input.extend(reply);
            }
        }
        Ok(())
    }

    fn flush(&mut self, role: StreamRole) -> io::Result<()> {
        self.flushes[role.index()] += 1;
        Ok(())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.input.clear();
        Ok(())
    }

    fn extended_keys(&self) -> &'static [SeqPattern] {
        self.extended
    }

    fn cursor_position_direct(&mut self) -> Option<Coordinate> {
        self.direct_cursor
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn input_queue_drains_in_order() {
        let mut backend = ScriptedBackend::interactive();
        backend.push_input(b"ab");
        assert_eq!(backend.read_byte().unwrap(), ReadByte::Byte(b'a'));
        assert_eq!(backend.read_byte().unwrap(), ReadByte::Byte(b'b'));
        assert_eq!(backend.read_byte().unwrap(), ReadByte::Empty);
    }

    #[test]
    fn bounded_poll_times_out_on_empty_queue() {
        let mut backend = ScriptedBackend::interactive();
        assert_eq!(
            backend
                .poll_input(Some(Duration::from_millis(10)))
                .unwrap(),
            PollStatus::TimedOut
        );
        backend.push_input(b"x");
        assert_eq!(
            backend
                .poll_input(Some(Duration::from_millis(10)))
                .unwrap(),
            PollStatus::Ready
        );
    }

    #[test]
    fn injected_resize_interrupts_exactly_once() {
        let mut backend = ScriptedBackend::interactive();
        backend.inject_resize();
        assert_eq!(
            backend.poll_input(Some(Duration::ZERO)).unwrap(),
            PollStatus::Interrupted
        );
        assert!(backend.resize_observed());
        assert!(!backend.resize_observed());
        assert_eq!(
            backend.poll_input(Some(Duration::ZERO)).unwrap(),
            PollStatus::TimedOut
        );
    }

    #[test]
    fn writes_are_captured_per_stream() {
        let mut backend = ScriptedBackend::interactive();
        backend.write(StreamRole::Output, b"out").unwrap();
        backend.write(StreamRole::Error, b"err").unwrap();
        assert_eq!(backend.written(StreamRole::Output), b"out");
        assert_eq!(backend.written(StreamRole::Error), b"err");
    }

    #[test]
    fn writing_to_input_is_rejected() {
        let mut backend = ScriptedBackend::interactive();
        let err = backend.write(StreamRole::Input, b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn discard_clears_the_queue() {
        let mut backend = ScriptedBackend::interactive();
        backend.push_input(b"stale");
        backend.discard_input().unwrap();
        assert_eq!(backend.remaining_input(), 0);
    }

    #[test]
    fn unbalanced_exit_is_an_error() {
        let mut backend = ScriptedBackend::interactive();
        assert!(backend.exit_raw().is_err());
    }
}
