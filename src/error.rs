// SPDX-License-Identifier: MIT
//
// Failure taxonomy for the terminal engine.
//
// Only genuine faults live here. Expected control-flow outcomes of the
// key decoder — nothing buffered, timeout elapsed, window resized — are
// success variants of `ReadOutcome`, never errors. Conflating the two
// forces callers into error-matching for situations that are perfectly
// normal at a terminal.

use std::io;

use thiserror::Error;

/// Everything that can genuinely go wrong inside the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Stream classification could not complete. Fatal: without knowing
    /// which streams are interactive, no routing decision is sound.
    #[error("stream classification failed: {0}")]
    Initialization(#[source] io::Error),

    /// Every output stream is redirected — there is no channel through
    /// which a control sequence could reach a visible terminal.
    ///
    /// Purely cosmetic operations (styling) recover from this silently;
    /// operations whose result the caller depends on surface it.
    #[error("all output streams are redirected")]
    AllStreamsRedirected,

    /// Querying or mutating the terminal's line-discipline attributes
    /// failed. Fatal to the enclosing raw-mode session; whatever snapshot
    /// exists is still restored before this propagates.
    #[error("terminal attributes unavailable: {0}")]
    AttributesUnavailable(#[source] io::Error),

    /// A raw-mode session was requested while one is already active.
    /// Nesting is undefined and rejected at the API boundary.
    #[error("raw mode is already active")]
    RawModeActive,

    /// The input stream is redirected, or both output streams are.
    /// A configuration fact, not a transient condition — retrying in the
    /// same process cannot succeed.
    #[error("not connected to an interactive terminal")]
    NotInteractive,

    /// The terminal did not answer a cursor-position query with the
    /// expected `ESC [ row ; col R` report. The input buffer has been
    /// cleared so the caller is not left holding stale reply bytes.
    #[error("malformed device status report from terminal")]
    MalformedResponse,

    /// A plain stream write or flush failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Engine-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

// ─── Tests ───────────────────────────────────────────────────────────────────
