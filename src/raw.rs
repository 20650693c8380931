// SPDX-License-Identifier: MIT
//
// Raw-mode sessions — scoped line-discipline control with guaranteed
// restoration.
//
// The backend owns the snapshot mechanics (termios + blocking flags);
// this module owns the discipline: a session is entered at most once at a
// time, and the snapshot is restored on every exit path. `finish()` is
// the happy path and surfaces restoration errors; `Drop` is the safety
// net for early returns and panics, restoring best-effort.
//
// The guard is constructed only after acquisition succeeded, so a failed
// `enter_raw` never triggers a bogus restore.

use crate::backend::Backend;
use crate::error::Result;

/// Which line-discipline bits a raw-mode session clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawScope {
    /// Canonical mode and echo off. Enough for a synchronous
    /// request/reply exchange such as the cursor query.
    Input,
    /// Additionally suppress signal generation and output flow control,
    /// so Ctrl+C / Ctrl+S arrive as bytes while the key decoder runs.
    Events,
}

/// A live raw-mode session. Restores the captured attributes exactly once,
/// on `finish()` or on drop.
pub struct RawSession<'a> {
    backend: &'a mut dyn Backend,
    armed: bool,
}

impl<'a> RawSession<'a> {
    /// Enter raw mode for `scope`.
    ///
    /// # Errors
    ///
    /// [`crate::Error::RawModeActive`] when a session is already live,
    /// [`crate::Error::AttributesUnavailable`] when the attribute calls
    /// fail. On failure no guard exists and nothing needs restoring.
    pub fn enter(backend: &'a mut dyn Backend, scope: RawScope) -> Result<Self> {
        backend.enter_raw(scope)?;
        Ok(Self {
            backend,
            armed: true,
        })
    }

    /// Access the backend for reads and writes inside the session.
    pub fn backend(&mut self) -> &mut dyn Backend {
        self.backend
    }

    /// Restore the snapshot and end the session, surfacing any
    /// restoration error.
    ///
    /// # Errors
    ///
    /// [`crate::Error::AttributesUnavailable`] if the restore fails.
    pub fn finish(mut self) -> Result<()> {
        self.armed = false;
        self.backend.exit_raw()
    }
}

impl Drop for RawSession<'_> {
    fn drop(&mut self) {
        if self.armed {
            // Best-effort: nothing sensible to do with a restore error
            // during unwinding.
            let _ = self.backend.exit_raw();
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::scripted::ScriptedBackend;

    #[test]
    fn enter_finish_restores() {
        let mut backend = ScriptedBackend::interactive();
        let session = RawSession::enter(&mut backend, RawScope::Events).unwrap();
        session.finish().unwrap();
        assert!(!backend.raw_active());
        assert_eq!(backend.raw_transitions(), (1, 1));
    }

    #[test]
    fn drop_restores() {
        let mut backend = ScriptedBackend::interactive();
        {
            let _session = RawSession::enter(&mut backend, RawScope::Input).unwrap();
        }
        assert!(!backend.raw_active());
        assert_eq!(backend.raw_transitions(), (1, 1));
    }

    #[test]
    fn error_path_still_restores() {
        // Simulates a body that fails between enter and exit: the guard
        // must restore on the early return.
        fn failing_body(backend: &mut ScriptedBackend) -> Result<()> {
            let _session = RawSession::enter(backend, RawScope::Events)?;
            Err(Error::MalformedResponse)
        }

        let mut backend = ScriptedBackend::interactive();
        assert!(failing_body(&mut backend).is_err());
        assert!(!backend.raw_active());
        assert_eq!(backend.raw_transitions(), (1, 1));
    }

    #[test]
    fn nested_enter_rejected() {
        let mut backend = ScriptedBackend::interactive();
        backend.enter_raw(RawScope::Events).unwrap();
        let err = backend.enter_raw(RawScope::Events).unwrap_err();
        assert!(matches!(err, Error::RawModeActive));
        backend.exit_raw().unwrap();
    }

    #[test]
    fn repeated_sessions_balance() {
        // Round-trip law over a sequence of enter/exit pairs: every enter
        // is matched by exactly one exit.
        let mut backend = ScriptedBackend::interactive();
        for _ in 0..4 {
            let session = RawSession::enter(&mut backend, RawScope::Events).unwrap();
            session.finish().unwrap();
        }
        assert_eq!(backend.raw_transitions(), (4, 4));
        assert!(!backend.raw_active());
    }
}
