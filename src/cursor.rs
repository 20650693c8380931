// SPDX-License-Identifier: MIT
//
// Cursor-position query — the one synchronous request/reply exchange in
// the engine.
//
// The protocol writes DSR 6 to the terminal and reads the reply
// `ESC [ row ; col R` back on the *input* stream, so echo must be off
// while the reply is in flight or the report's digits land on screen.
// The exchange runs inside a raw session scoped to input only, with
// pending type-ahead discarded first so a buffered keypress is not
// mistaken for the reply.
//
// The reply is validated incrementally as bytes arrive. A byte that can
// no longer begin a valid report aborts at once, the remaining input is
// discarded, and the caller gets a malformed-response error with the
// terminal state already restored.

use std::time::{Duration, Instant};

use crate::ansi;
use crate::backend::{Backend, PollStatus, ReadByte};
use crate::error::{Error, Result};
use crate::geom::Coordinate;
use crate::raw::{RawScope, RawSession};
use crate::router::Router;
use crate::stream::Streams;

/// Total wall-time budget for the reply. Generous for a local terminal,
/// tight enough that a host that never answers does not hang the caller.
const REPLY_BUDGET: Duration = Duration::from_millis(100);

/// Longest well-formed reply: `ESC [ 12345 ; 12345 R`.
const MAX_REPLY_LEN: usize = 14;

/// Per-field digit cap; a terminal will never report a five-digit-plus
/// row or column.
const MAX_FIELD_DIGITS: usize = 5;

/// Query the cursor position. Returns 0-based coordinates.
///
/// Hosts that expose cursor metadata directly answer without touching the
/// wire; everyone else runs the DSR exchange.
///
/// # Errors
///
/// [`Error::NotInteractive`] when the streams cannot carry the exchange,
/// [`Error::MalformedResponse`] when the reply is absent or unparsable,
/// plus raw-mode and I/O failures.
pub fn cursor_position(
    backend: &mut dyn Backend,
    streams: &Streams,
    router: &mut Router,
) -> Result<Coordinate> {
    if !streams.interactive_for_reading() {
        return Err(Error::NotInteractive);
    }
    if let Some(position) = backend.cursor_position_direct() {
        return Ok(position);
    }

    let mut session = RawSession::enter(backend, RawScope::Input)?;
    let result = exchange(session.backend(), streams, router);
    let restore = session.finish();

    let position = result?;
    restore?;
    Ok(position)
}

fn exchange(
    backend: &mut dyn Backend,
    streams: &Streams,
    router: &mut Router,
) -> Result<Coordinate> {
    // Type-ahead discarded so the next input bytes are the reply.
    backend.discard_input()?;
    let mut request = Vec::with_capacity(4);
    ansi::dsr_request(&mut request)?;
    router.route(streams, backend, &request)?;
    router.flush_pending(backend)?;

    let deadline = Instant::now() + REPLY_BUDGET;
    let mut reply = Vec::with_capacity(MAX_REPLY_LEN);

    loop {
        match scan(&reply) {
            Progress::Done(position) => return Ok(position),
            Progress::Invalid => return malformed(backend),
            Progress::NeedMore => {}
        }
        if reply.len() >= MAX_REPLY_LEN {
            return malformed(backend);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return malformed(backend);
        }
        match backend.poll_input(Some(remaining))? {
            PollStatus::Ready => match backend.read_byte()? {
                ReadByte::Byte(b) => reply.push(b),
                ReadByte::Empty => return malformed(backend),
                ReadByte::Interrupted => {}
            },
            PollStatus::TimedOut => return malformed(backend),
            PollStatus::Interrupted => {}
        }
    }
}

/// Drop whatever garbage remains and report the failure.
fn malformed(backend: &mut dyn Backend) -> Result<Coordinate> {
    backend.discard_input()?;
    Err(Error::MalformedResponse)
}

enum Progress {
    NeedMore,
    Done(Coordinate),
    Invalid,
}

/// Incremental validation of a partial reply.
fn scan(reply: &[u8]) -> Progress {
    match reply {
        [] | [0x1B] => Progress::NeedMore,
        [0x1B, b'[', fields @ ..] => scan_fields(fields),
        _ => Progress::Invalid,
    }
}

fn scan_fields(fields: &[u8]) -> Progress {
    let mut row: u32 = 0;
    let mut col: u32 = 0;
    let mut row_digits = 0usize;
    let mut col_digits = 0usize;
    let mut in_col = false;

    for &b in fields {
        match b {
            b'0'..=b'9' => {
                let (value, digits) = if in_col {
                    (&mut col, &mut col_digits)
                } else {
                    (&mut row, &mut row_digits)
                };
                *digits += 1;
                if *digits > MAX_FIELD_DIGITS {
                    return Progress::Invalid;
                }
                *value = *value * 10 + u32::from(b - b'0');
            }
            b';' if !in_col && row_digits > 0 => in_col = true,
            b'R' if in_col && col_digits > 0 => {
                // The wire is 1-based; zero fields are nonsense.
                if row == 0 || col == 0 {
                    return Progress::Invalid;
                }
                let (Ok(row), Ok(col)) = (u16::try_from(row - 1), u16::try_from(col - 1)) else {
                    return Progress::Invalid;
                };
                return Progress::Done(Coordinate { col, row });
            }
            _ => return Progress::Invalid,
        }
    }
    Progress::NeedMore
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedBackend;
    use crate::stream::{StreamRole, StyleEnv};
    use pretty_assertions::assert_eq;

    fn setup(reply: &[u8]) -> (ScriptedBackend, Streams, Router) {
        let mut backend = ScriptedBackend::interactive();
        backend.set_cursor_reply(reply);
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        (backend, streams, Router::new())
    }

    // ── Reply parsing ───────────────────────────────────────────────────

    #[test]
    fn reply_converts_to_zero_based() {
        let (mut backend, streams, mut router) = setup(b"\x1b[5;10R");
        let pos = cursor_position(&mut backend, &streams, &mut router).unwrap();
        assert_eq!(pos, Coordinate { col: 9, row: 4 });
    }

    #[test]
    fn reply_at_origin() {
        let (mut backend, streams, mut router) = setup(b"\x1b[1;1R");
        let pos = cursor_position(&mut backend, &streams, &mut router).unwrap();
        assert_eq!(pos, Coordinate { col: 0, row: 0 });
    }

    #[test]
    fn large_coordinates() {
        let (mut backend, streams, mut router) = setup(b"\x1b[240;512R");
        let pos = cursor_position(&mut backend, &streams, &mut router).unwrap();
        assert_eq!(pos, Coordinate { col: 511, row: 239 });
    }

    // ── Malformed replies ───────────────────────────────────────────────

    #[test]
    fn garbage_reply_is_malformed() {
        let (mut backend, streams, mut router) = setup(b"junk");
        let err = cursor_position(&mut backend, &streams, &mut router).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse));
        // Residual bytes were discarded and raw mode restored.
        assert_eq!(backend.remaining_input(), 0);
        assert_eq!(backend.raw_transitions(), (1, 1));
    }

    #[test]
    fn missing_column_is_malformed() {
        let (mut backend, streams, mut router) = setup(b"\x1b[5;R");
        let err = cursor_position(&mut backend, &streams, &mut router).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse));
    }

    #[test]
    fn zero_field_is_malformed() {
        let (mut backend, streams, mut router) = setup(b"\x1b[0;3R");
        let err = cursor_position(&mut backend, &streams, &mut router).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse));
    }

    #[test]
    fn silence_is_malformed() {
        // No scripted reply at all: the bounded wait gives up.
        let mut backend = ScriptedBackend::interactive();
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        let mut router = Router::new();
        let err = cursor_position(&mut backend, &streams, &mut router).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse));
        assert_eq!(backend.raw_transitions(), (1, 1));
    }

    // ── Protocol mechanics ──────────────────────────────────────────────

    #[test]
    fn request_goes_out_on_diagnostic_stream() {
        let (mut backend, streams, mut router) = setup(b"\x1b[1;1R");
        cursor_position(&mut backend, &streams, &mut router).unwrap();
        assert_eq!(backend.written(StreamRole::Error), b"\x1b[6n");
    }

    #[test]
    fn type_ahead_is_discarded_before_the_request() {
        let mut backend = ScriptedBackend::interactive();
        // Buffered keypresses would otherwise be read as the reply.
        backend.push_input(b"abc");
        backend.set_cursor_reply(b"\x1b[2;2R");
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        let mut router = Router::new();
        let pos = cursor_position(&mut backend, &streams, &mut router).unwrap();
        assert_eq!(pos, Coordinate { col: 1, row: 1 });
        assert_eq!(backend.remaining_input(), 0);
    }

    #[test]
    fn direct_answer_skips_the_wire() {
        let mut backend = ScriptedBackend::interactive();
        backend.set_direct_cursor(Some(Coordinate { col: 3, row: 7 }));
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        let mut router = Router::new();
        let pos = cursor_position(&mut backend, &streams, &mut router).unwrap();
        assert_eq!(pos, Coordinate { col: 3, row: 7 });
        // No request written, no raw session needed.
        assert_eq!(backend.written(StreamRole::Error), b"");
        assert_eq!(backend.raw_transitions(), (0, 0));
    }

    // ── Preconditions ───────────────────────────────────────────────────

    #[test]
    fn redirected_input_is_not_interactive() {
        let mut backend = ScriptedBackend::interactive();
        backend.set_redirected(StreamRole::Input, true);
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        let mut router = Router::new();
        let err = cursor_position(&mut backend, &streams, &mut router).unwrap_err();
        assert!(matches!(err, Error::NotInteractive));
    }

    #[test]
    fn both_outputs_redirected_is_not_interactive() {
        let mut backend = ScriptedBackend::interactive();
        backend.set_redirected(StreamRole::Output, true);
        backend.set_redirected(StreamRole::Error, true);
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        let mut router = Router::new();
        let err = cursor_position(&mut backend, &streams, &mut router).unwrap_err();
        assert!(matches!(err, Error::NotInteractive));
    }

    // ── Scanner ─────────────────────────────────────────────────────────

    #[test]
    fn scanner_needs_more_on_prefixes() {
        for prefix in [&b""[..], b"\x1b", b"\x1b[", b"\x1b[1", b"\x1b[12;", b"\x1b[12;3"] {
            assert!(matches!(scan(prefix), Progress::NeedMore), "{prefix:?}");
        }
    }

    #[test]
    fn scanner_rejects_oversized_fields() {
        assert!(matches!(scan(b"\x1b[123456"), Progress::Invalid));
    }
}
