// SPDX-License-Identifier: MIT
//
// The console context — the engine's public entry point.
//
// One value owns the backend, the startup stream classification, and the
// routing state, so every decision the engine makes is explicit state on
// a context the caller holds rather than ambient process globals. Two
// consoles over two backends never interfere; tests construct as many as
// they like.

use crate::ansi::{self, CursorShape};
use crate::backend::Backend;
use crate::cursor;
use crate::error::Result;
use crate::geom::{Coordinate, Dimensions};
use crate::key::{self, KeyFilter, ReadOutcome, WaitMode};
use crate::router::Router;
use crate::stream::{StreamRole, Streams, StyleEnv};

/// Window size assumed when the host cannot report one.
pub const DEFAULT_DIMENSIONS: Dimensions = Dimensions { cols: 80, rows: 24 };

/// A terminal context: backend plus the classification and routing state
/// derived from it.
pub struct Console<B: Backend> {
    backend: B,
    streams: Streams,
    router: Router,
}

#[cfg(unix)]
impl Console<crate::posix::PosixBackend> {
    /// A console over the process's standard streams, with the style
    /// allowance sampled from the real environment.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Initialization`] if stream classification fails.
    pub fn stdio() -> Result<Self> {
        Self::with_backend(crate::posix::PosixBackend::new())
    }
}

impl<B: Backend> Console<B> {
    /// Build a console over `backend`, classifying the streams once and
    /// sampling the process environment for the style allowance.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Initialization`] if stream classification fails.
    pub fn with_backend(backend: B) -> Result<Self> {
        Self::with_env(backend, &StyleEnv::from_env())
    }

    /// Like [`with_backend`](Self::with_backend) with an explicit
    /// environment sample.
    ///
    /// # Errors
    ///
    /// [`crate::Error::Initialization`] if stream classification fails.
    pub fn with_env(mut backend: B, env: &StyleEnv) -> Result<Self> {
        let streams = Streams::classify(&mut backend, env)?;
        Ok(Self {
            backend,
            streams,
            router: Router::new(),
        })
    }

    /// The startup stream classification.
    #[must_use]
    pub const fn streams(&self) -> &Streams {
        &self.streams
    }

    /// Override the style allowance (e.g. for a `--color=always` flag).
    pub const fn set_styled(&mut self, on: bool) {
        self.streams.set_styled(on);
    }

    /// Direct backend access, mainly for tests and embedding.
    pub const fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    // ── Content ─────────────────────────────────────────────────

    /// Write plain content to the primary stream.
    ///
    /// # Errors
    ///
    /// The underlying write failure.
    pub fn write(&mut self, text: &str) -> Result<()> {
        self.router
            .write_plain(&mut self.backend, StreamRole::Output, text.as_bytes())
    }

    /// Write plain content to the diagnostic stream.
    ///
    /// # Errors
    ///
    /// The underlying write failure.
    pub fn write_error(&mut self, text: &str) -> Result<()> {
        self.router
            .write_plain(&mut self.backend, StreamRole::Error, text.as_bytes())
    }

    /// Flush the primary stream if routed sequence bytes are pending in
    /// its buffer.
    ///
    /// # Errors
    ///
    /// The underlying flush failure.
    pub fn flush(&mut self) -> Result<()> {
        self.router.flush_pending(&mut self.backend)
    }

    // ── Control sequences ───────────────────────────────────────

    fn sequence<F>(&mut self, emit: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<u8>) -> std::io::Result<()>,
    {
        let mut staged = Vec::with_capacity(16);
        emit(&mut staged)?;
        self.router.route(&self.streams, &mut self.backend, &staged)
    }

    /// Move the cursor to a 0-based position.
    ///
    /// # Errors
    ///
    /// [`crate::Error::AllStreamsRedirected`] when no stream can carry
    /// sequences.
    pub fn move_cursor(&mut self, to: Coordinate) -> Result<()> {
        self.sequence(|w| ansi::cursor_to(w, to))
    }

    /// Clear the whole screen.
    ///
    /// # Errors
    ///
    /// See [`move_cursor`](Self::move_cursor).
    pub fn clear_screen(&mut self) -> Result<()> {
        self.sequence(ansi::clear_screen)
    }

    /// Clear the current line.
    ///
    /// # Errors
    ///
    /// See [`move_cursor`](Self::move_cursor).
    pub fn clear_line(&mut self) -> Result<()> {
        self.sequence(ansi::clear_line)
    }

    /// Clear the scrollback history.
    ///
    /// # Errors
    ///
    /// See [`move_cursor`](Self::move_cursor).
    pub fn clear_history(&mut self) -> Result<()> {
        self.sequence(ansi::clear_history)
    }

    /// Hide the cursor.
    ///
    /// # Errors
    ///
    /// See [`move_cursor`](Self::move_cursor).
    pub fn hide_cursor(&mut self) -> Result<()> {
        self.sequence(ansi::cursor_hide)
    }

    /// Show the cursor.
    ///
    /// # Errors
    ///
    /// See [`move_cursor`](Self::move_cursor).
    pub fn show_cursor(&mut self) -> Result<()> {
        self.sequence(ansi::cursor_show)
    }

    /// Set the cursor shape.
    ///
    /// # Errors
    ///
    /// See [`move_cursor`](Self::move_cursor).
    pub fn set_cursor_shape(&mut self, shape: CursorShape) -> Result<()> {
        self.sequence(|w| ansi::set_cursor_shape(w, shape))
    }

    /// Switch to the alternate screen buffer.
    ///
    /// # Errors
    ///
    /// See [`move_cursor`](Self::move_cursor).
    pub fn enter_alt_screen(&mut self) -> Result<()> {
        self.sequence(ansi::enter_alt_screen)
    }

    /// Leave the alternate screen buffer, restoring prior content.
    ///
    /// # Errors
    ///
    /// See [`move_cursor`](Self::move_cursor).
    pub fn exit_alt_screen(&mut self) -> Result<()> {
        self.sequence(ansi::exit_alt_screen)
    }

    /// Ring the terminal bell.
    ///
    /// # Errors
    ///
    /// See [`move_cursor`](Self::move_cursor).
    pub fn bell(&mut self) -> Result<()> {
        self.sequence(ansi::bell)
    }

    /// Emit an SGR styling sequence with the given parameters (`1;31`
    /// for bold red, and so on). A no-op when styling is disallowed or
    /// when no stream can carry sequences; styling is cosmetic and never
    /// worth failing over.
    ///
    /// # Errors
    ///
    /// The underlying write failure.
    pub fn style_sequence(&mut self, params: &str) -> Result<()> {
        if !self.streams.styled() {
            return Ok(());
        }
        match self.sequence(|w| ansi::sgr(w, params)) {
            Err(crate::error::Error::AllStreamsRedirected) => Ok(()),
            other => other,
        }
    }

    /// Reset all styling attributes. A no-op when styling is disallowed
    /// (nothing was ever styled) or when no stream can carry sequences
    /// (there is no screen holding stale attributes).
    ///
    /// # Errors
    ///
    /// The underlying write failure.
    pub fn reset_style(&mut self) -> Result<()> {
        if !self.streams.styled() {
            return Ok(());
        }
        match self.sequence(ansi::sgr_reset) {
            Err(crate::error::Error::AllStreamsRedirected) => Ok(()),
            other => other,
        }
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Current window size, or the conventional 80×24 when the host
    /// cannot report one.
    pub fn dimensions(&mut self) -> Dimensions {
        self.backend.dimensions().unwrap_or(DEFAULT_DIMENSIONS)
    }

    /// Read one key event.
    ///
    /// # Errors
    ///
    /// See [`key::read_key_event`].
    pub fn read_key(&mut self, wait: WaitMode) -> Result<ReadOutcome> {
        key::read_key_event(&mut self.backend, &self.streams, &mut self.router, wait, None)
    }

    /// Read one key event accepted by `filter`; rejected events are
    /// consumed.
    ///
    /// # Errors
    ///
    /// See [`key::read_key_event`].
    pub fn read_key_filtered(
        &mut self,
        wait: WaitMode,
        filter: KeyFilter<'_>,
    ) -> Result<ReadOutcome> {
        key::read_key_event(
            &mut self.backend,
            &self.streams,
            &mut self.router,
            wait,
            Some(filter),
        )
    }

    /// Query the cursor position (0-based).
    ///
    /// # Errors
    ///
    /// See [`cursor::cursor_position`].
    pub fn cursor_position(&mut self) -> Result<Coordinate> {
        cursor::cursor_position(&mut self.backend, &self.streams, &mut self.router)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
