// SPDX-License-Identifier: MIT
//
// Stream classification — which standard streams face a real terminal.
//
// Redirection is a per-process configuration fact: a stream connected to a
// pipe at startup stays a pipe for the life of the process. The engine
// therefore classifies each stream exactly once, at context construction,
// and every later routing decision consults the cached result. Observing
// new redirection requires a fresh process; there is deliberately no
// mid-process re-classification.
//
// Style allowance is sampled from the environment at the same moment:
// a present NO_COLOR variable disables styling unconditionally, and on
// POSIX a `TERM=dumb` terminal does too. Callers may override the result
// afterward (e.g. a `--color=always` flag).

use crate::backend::Backend;
use crate::error::{Error, Result};

// ─── StreamRole ──────────────────────────────────────────────────────────────

/// One of the three standard channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRole {
    /// Standard input — the byte source for the key decoder and the
    /// reply channel for cursor queries.
    Input,
    /// Standard output — the primary content stream, conventionally
    /// line-buffered at a terminal.
    Output,
    /// Standard error — the diagnostic stream, conventionally unbuffered.
    Error,
}

impl StreamRole {
    /// Index into per-stream state arrays. Fixed cardinality 3.
    #[inline]
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Input => 0,
            Self::Output => 1,
            Self::Error => 2,
        }
    }
}

// ─── StyleEnv ────────────────────────────────────────────────────────────────

/// Environment sample governing the initial style allowance.
///
/// Captured as plain data so tests can construct arbitrary environments
/// without mutating process globals.
#[derive(Debug, Clone, Default)]
pub struct StyleEnv {
    /// `NO_COLOR` — presence (any value, including empty) disables styling.
    pub no_color: Option<String>,
    /// `TERM` — the value `dumb` disables styling on POSIX platforms.
    pub term: Option<String>,
}

impl StyleEnv {
    /// Sample the real process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            no_color: std::env::var("NO_COLOR").ok().or_else(|| {
                // var() errors on non-unicode values, but presence still
                // counts. var_os() catches that case.
                std::env::var_os("NO_COLOR").map(|_| String::new())
            }),
            term: std::env::var("TERM").ok(),
        }
    }

    /// Whether this environment permits styled output.
    #[must_use]
    pub fn allows_style(&self) -> bool {
        if self.no_color.is_some() {
            return false;
        }
        #[cfg(unix)]
        if self.term.as_deref() == Some("dumb") {
            return false;
        }
        true
    }
}

// ─── Streams ─────────────────────────────────────────────────────────────────

/// Cached classification of the three standard streams plus the current
/// style allowance.
///
/// Built once via [`classify`](Self::classify); the redirection flags are
/// immutable afterward, the style allowance is mutable via
/// [`set_styled`](Self::set_styled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Streams {
    /// `true` means "not an interactive terminal device".
    redirected: [bool; 3],
    /// Whether color/weight/effect sequences may be emitted at all.
    styled: bool,
}

impl Streams {
    /// Classify all three streams through the backend's device-type query
    /// and compute the style allowance from `env`.
    ///
    /// Deterministic for a given backend state: classifying twice yields
    /// identical results.
    ///
    /// # Errors
    ///
    /// [`Error::Initialization`] if any device-type query fails with a
    /// genuine error ("not a terminal" is a classification result, not a
    /// failure).
    pub fn classify(backend: &mut dyn Backend, env: &StyleEnv) -> Result<Self> {
        let mut redirected = [false; 3];
        for role in [StreamRole::Input, StreamRole::Output, StreamRole::Error] {
            redirected[role.index()] = backend
                .is_redirected(role)
                .map_err(Error::Initialization)?;
        }
        Ok(Self {
            redirected,
            styled: env.allows_style(),
        })
    }

    /// Whether `role` is connected to something other than an interactive
    /// terminal (a file, a pipe, /dev/null, ...).
    #[inline]
    #[must_use]
    pub const fn is_redirected(&self, role: StreamRole) -> bool {
        self.redirected[role.index()]
    }

    /// Whether styling sequences may be emitted.
    #[inline]
    #[must_use]
    pub const fn styled(&self) -> bool {
        self.styled
    }

    /// Override the environment-derived style allowance.
    #[inline]
    pub const fn set_styled(&mut self, on: bool) {
        self.styled = on;
    }

    /// The decoder and cursor query both need an interactive input stream
    /// and at least one live output channel to flush through.
    #[must_use]
    pub const fn interactive_for_reading(&self) -> bool {
        !self.is_redirected(StreamRole::Input)
            && !(self.is_redirected(StreamRole::Output) && self.is_redirected(StreamRole::Error))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
