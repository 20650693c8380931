// SPDX-License-Identifier: MIT
//
// Output routing — which stream carries a control sequence, and when the
// primary stream must be flushed.
//
// Control sequences prefer the diagnostic stream: it is conventionally
// unbuffered, so a cursor move or clear takes effect immediately even
// while the primary stream is redirected to a pipe. Plain content flips
// the preference: once the program has written content to the primary
// stream, subsequent sequences follow it there so commands and content
// stay ordered.
//
// The second ordering hazard is buffering skew. The primary stream is
// line-buffered at a terminal, the diagnostic stream is not, so a
// sequence sent to the primary stream can be overtaken by a later
// diagnostic write. The router tracks a pending-flush flag and drains the
// primary stream before any diagnostic write while the flag is set.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::stream::{StreamRole, Streams};

/// Routes control sequences and plain content to the right stream.
///
/// Holds two pieces of state: which stream sequences currently prefer,
/// and whether sequence bytes are sitting unflushed in the primary
/// stream's buffer.
#[derive(Debug, Default)]
pub struct Router {
    /// Sequences follow the primary stream once plain content went there.
    prefer_primary: bool,
    /// A sequence was written to the line-buffered primary stream and has
    /// not been flushed yet.
    pending_flush: bool,
}

impl Router {
    /// A fresh router. Sequences initially prefer the diagnostic stream.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prefer_primary: false,
            pending_flush: false,
        }
    }

    /// Write a control sequence to the first non-redirected stream in
    /// preference order.
    ///
    /// # Errors
    ///
    /// [`Error::AllStreamsRedirected`] when neither output stream faces a
    /// terminal; the sequence would be garbage in a pipe, so it is not
    /// written at all. I/O failures from the backend propagate.
    pub fn route(
        &mut self,
        streams: &Streams,
        backend: &mut dyn Backend,
        sequence: &[u8],
    ) -> Result<()> {
        let order = if self.prefer_primary {
            [StreamRole::Output, StreamRole::Error]
        } else {
            [StreamRole::Error, StreamRole::Output]
        };
        for role in order {
            if streams.is_redirected(role) {
                continue;
            }
            backend.write(role, sequence)?;
            if matches!(role, StreamRole::Output) {
                self.pending_flush = true;
            }
            return Ok(());
        }
        Err(Error::AllStreamsRedirected)
    }

    /// Write plain content to the named stream, maintaining the
    /// preference and flush bookkeeping.
    ///
    /// Content is written even when the stream is redirected; capturing
    /// program output in a file is the point of redirection.
    ///
    /// # Errors
    ///
    /// The underlying write (or interposed flush) failure.
    pub fn write_plain(
        &mut self,
        backend: &mut dyn Backend,
        role: StreamRole,
        bytes: &[u8],
    ) -> Result<()> {
        match role {
            StreamRole::Output => {
                backend.write(StreamRole::Output, bytes)?;
                self.prefer_primary = true;
                // Heuristic: a newline drains a line-buffered stream,
                // carrying any pending sequence bytes out with it. Not
                // true of a block-buffered file, but preserved as
                // documented behavior.
                if bytes.contains(&b'\n') {
                    self.pending_flush = false;
                }
            }
            StreamRole::Error => {
                if self.pending_flush {
                    backend.flush(StreamRole::Output)?;
                    self.pending_flush = false;
                }
                backend.write(StreamRole::Error, bytes)?;
                self.prefer_primary = false;
            }
            StreamRole::Input => {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "cannot write to the input stream",
                )));
            }
        }
        Ok(())
    }

    /// Drain the primary stream if sequence bytes are pending there.
    /// Called before a read blocks so a prompt reaches the screen.
    ///
    /// # Errors
    ///
    /// The underlying flush failure.
    pub fn flush_pending(&mut self, backend: &mut dyn Backend) -> Result<()> {
        if self.pending_flush {
            backend.flush(StreamRole::Output)?;
            self.pending_flush = false;
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
