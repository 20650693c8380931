// SPDX-License-Identifier: MIT
//
// Key decoding — raw bytes to structured key events.
//
// A byte arriving in raw mode is ambiguous three ways: `0x1B` may be a
// literal Escape keypress, the start of a multi-byte escape sequence, or
// the visible half of a sequence truncated by input buffering. The decoder
// resolves all three with bounded waits: after an ESC it grants the
// terminal a short window to deliver the rest of a sequence, and degrades
// to a bare Escape when the window closes.
//
// Recognition is data-driven. Fixed sequences (arrows, F1–F12, editing
// keys, in CSI, SS3, and the double-bracket console variants) live in
// `GENERIC_KEYS`; platform extensions come from the backend's
// `extended_keys` table and are consulted first. Only the xterm-style
// modified-key forms (`ESC [ 1 ; mods X`) need a parametric parse.
//
// Shift is deliberately not a modifier bit: it is only observable through
// the produced scalar's casing. The modifier set is {Alt, Ctrl}.

use std::time::{Duration, Instant};

use bitflags::bitflags;

use crate::backend::{Backend, PollStatus, ReadByte};
use crate::error::{Error, Result};
use crate::raw::{RawScope, RawSession};
use crate::router::Router;
use crate::stream::Streams;

// ─── Event Types ────────────────────────────────────────────────────────────

/// Identity of a key: a Unicode scalar or one of the fixed non-printable
/// keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// A printable Unicode scalar value.
    Char(char),
    // ── Named keys ──────────────────────────────────────────────
    Enter,
    Tab,
    Backspace,
    Escape,
    Space,
    Insert,
    Delete,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    // ── Function keys ───────────────────────────────────────────
    /// F1 through F12.
    F(u8),
}

bitflags! {
    /// Keyboard modifier flags.
    ///
    /// Shift has no bit: it is observable only through the scalar value
    /// it produces (`A` vs `a`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        /// Alt (Option on macOS).
        const ALT  = 0b01;
        /// Control.
        const CTRL = 0b10;
    }
}

/// A decoded keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Which key was pressed.
    pub key: Key,
    /// Active modifiers.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// A plain keypress with no modifiers.
    #[must_use]
    pub const fn plain(key: Key) -> Self {
        Self {
            key,
            modifiers: Modifiers::empty(),
        }
    }

    /// A keypress with modifiers.
    #[must_use]
    pub const fn with(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }
}

/// How long a read is willing to wait for the first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Return immediately if nothing is buffered.
    NoWait,
    /// Block until an event arrives.
    Forever,
    /// Poll with a decrementing wall-time budget.
    Timeout(Duration),
}

/// Result of a key read. Every variant here is an expected outcome —
/// genuine faults travel through [`Error`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Exactly one key event was decoded.
    Key(KeyEvent),
    /// Nothing was buffered (no-wait read, or the input stream closed).
    NoEvent,
    /// The time budget elapsed with no event.
    TimedOut,
    /// A window resize was observed and the bounded wait ended with no
    /// key. A `Forever` wait never reports this: it resumes through the
    /// interruption.
    Resized,
}

/// Caller-supplied predicate; a rejected event is consumed and the read
/// continues within its remaining budget.
pub type KeyFilter<'a> = &'a dyn Fn(&KeyEvent) -> bool;

// ─── Sequence Tables ────────────────────────────────────────────────────────

/// One fixed escape-sequence binding. `bytes` are the bytes *after* the
/// leading ESC.
#[derive(Debug, Clone, Copy)]
pub struct SeqPattern {
    /// Sequence bytes, ESC stripped.
    pub bytes: &'static [u8],
    /// Produced key.
    pub key: Key,
    /// Produced modifiers.
    pub modifiers: Modifiers,
}

const fn seq(bytes: &'static [u8], key: Key) -> SeqPattern {
    SeqPattern {
        bytes,
        key,
        modifiers: Modifiers::empty(),
    }
}

/// Generic VT-style sequences shared by every platform: CSI letters, SS3
/// letters, tilde-terminated editing/function keys, and the Linux-console
/// double-bracket function keys.
pub static GENERIC_KEYS: &[SeqPattern] = &[
    // CSI arrows and Home/End.
    seq(b"[A", Key::Up),
    seq(b"[B", Key::Down),
    seq(b"[C", Key::Right),
    seq(b"[D", Key::Left),
    seq(b"[H", Key::Home),
    seq(b"[F", Key::End),
    // SS3 variants (application cursor mode, F1–F4 on most terminals).
    seq(b"OA", Key::Up),
    seq(b"OB", Key::Down),
    seq(b"OC", Key::Right),
    seq(b"OD", Key::Left),
    seq(b"OH", Key::Home),
    seq(b"OF", Key::End),
    seq(b"OP", Key::F(1)),
    seq(b"OQ", Key::F(2)),
    seq(b"OR", Key::F(3)),
    seq(b"OS", Key::F(4)),
    // CSI letter F1–F4 (some terminals).
    seq(b"[P", Key::F(1)),
    seq(b"[Q", Key::F(2)),
    seq(b"[R", Key::F(3)),
    seq(b"[S", Key::F(4)),
    // Tilde-terminated editing keys.
    seq(b"[1~", Key::Home),
    seq(b"[2~", Key::Insert),
    seq(b"[3~", Key::Delete),
    seq(b"[4~", Key::End),
    seq(b"[5~", Key::PageUp),
    seq(b"[6~", Key::PageDown),
    seq(b"[7~", Key::Home),
    seq(b"[8~", Key::End),
    // Tilde-terminated function keys.
    seq(b"[11~", Key::F(1)),
    seq(b"[12~", Key::F(2)),
    seq(b"[13~", Key::F(3)),
    seq(b"[14~", Key::F(4)),
    seq(b"[15~", Key::F(5)),
    seq(b"[17~", Key::F(6)),
    seq(b"[18~", Key::F(7)),
    seq(b"[19~", Key::F(8)),
    seq(b"[20~", Key::F(9)),
    seq(b"[21~", Key::F(10)),
    seq(b"[23~", Key::F(11)),
    seq(b"[24~", Key::F(12)),
    // Linux console double-bracket F1–F5.
    seq(b"[[A", Key::F(1)),
    seq(b"[[B", Key::F(2)),
    seq(b"[[C", Key::F(3)),
    seq(b"[[D", Key::F(4)),
    seq(b"[[E", Key::F(5)),
];

// ─── Timing ─────────────────────────────────────────────────────────────────

/// Grace window after a lone ESC before it becomes a literal Escape.
/// Long enough for a terminal to deliver a split sequence, short enough
/// to be imperceptible on a real Escape keypress.
const ESC_DISAMBIGUATE: Duration = Duration::from_millis(10);

/// Per-byte wait while a partial sequence is a known prefix.
const SEQ_CONTINUATION: Duration = Duration::from_millis(10);

/// Hard cap on escape-sequence lookahead. Covers every table entry plus
/// the longest parametric form (`[15;2~`) with room to spare.
const MAX_LOOKAHEAD: usize = 12;

// ─── Driver ─────────────────────────────────────────────────────────────────

/// Read exactly one key event, honoring `wait` and an optional filter.
///
/// Entry preconditions, raw-mode handling, and the outcome contract follow
/// the engine's read protocol: raw mode is entered once, exited exactly
/// once on every path, and pending primary-stream output is flushed first
/// so prompts are visible before the read blocks.
///
/// # Errors
///
/// [`Error::NotInteractive`] when input is redirected or no output channel
/// exists; [`Error::AttributesUnavailable`] / [`Error::RawModeActive`]
/// from the raw-mode controller; [`Error::Io`] on genuine read failures.
pub fn read_key_event(
    backend: &mut dyn Backend,
    streams: &Streams,
    router: &mut Router,
    wait: WaitMode,
    filter: Option<KeyFilter<'_>>,
) -> Result<ReadOutcome> {
    if !streams.interactive_for_reading() {
        return Err(Error::NotInteractive);
    }

    // A prompt sitting in the primary stream must reach the screen before
    // we start waiting on the keyboard.
    router.flush_pending(backend)?;

    let mut session = RawSession::enter(backend, RawScope::Events)?;
    let outcome = decode_loop(session.backend(), wait, filter);
    let restore = session.finish();

    // Restoration is attempted before any failure propagates.
    let outcome = outcome?;
    restore?;
    Ok(outcome)
}

/// A zero-duration timeout behaves exactly like a no-wait read.
const fn effective_wait(wait: WaitMode) -> WaitMode {
    match wait {
        WaitMode::Timeout(d) if d.is_zero() => WaitMode::NoWait,
        other => other,
    }
}

fn decode_loop(
    backend: &mut dyn Backend,
    wait: WaitMode,
    filter: Option<KeyFilter<'_>>,
) -> Result<ReadOutcome> {
    let wait = effective_wait(wait);
    let deadline = match wait {
        WaitMode::Timeout(d) => Some(Instant::now() + d),
        _ => None,
    };
    let mut saw_resize = false;

    loop {
        let first = match await_first_byte(backend, wait, deadline, &mut saw_resize)? {
            FirstByte::Byte(b) => b,
            FirstByte::Outcome(outcome) => return Ok(outcome),
        };

        // A stray UTF-8 continuation byte produces nothing; read on.
        let Some(event) = decode_event(backend, first)? else {
            continue;
        };

        if let Some(accept) = filter {
            if !accept(&event) {
                match wait {
                    WaitMode::NoWait => {
                        return Ok(exhausted_outcome(WaitMode::NoWait, saw_resize));
                    }
                    WaitMode::Forever | WaitMode::Timeout(_) => continue,
                }
            }
        }

        return Ok(ReadOutcome::Key(event));
    }
}

/// What a wait that ended without a key reports.
const fn exhausted_outcome(wait: WaitMode, saw_resize: bool) -> ReadOutcome {
    if saw_resize {
        ReadOutcome::Resized
    } else {
        match wait {
            WaitMode::Timeout(_) => ReadOutcome::TimedOut,
            _ => ReadOutcome::NoEvent,
        }
    }
}

enum FirstByte {
    Byte(u8),
    Outcome(ReadOutcome),
}

/// Wait for the first byte of an event according to the wait mode.
fn await_first_byte(
    backend: &mut dyn Backend,
    wait: WaitMode,
    deadline: Option<Instant>,
    saw_resize: &mut bool,
) -> Result<FirstByte> {
    match wait {
        WaitMode::NoWait => {
            backend.set_nonblocking(true)?;
            let read = backend.read_byte();
            backend.set_nonblocking(false)?;
            *saw_resize |= backend.resize_observed();
            match read? {
                ReadByte::Byte(b) => Ok(FirstByte::Byte(b)),
                ReadByte::Empty | ReadByte::Interrupted => Ok(FirstByte::Outcome(
                    exhausted_outcome(WaitMode::NoWait, *saw_resize),
                )),
            }
        }

        WaitMode::Forever => loop {
            match backend.poll_input(None)? {
                PollStatus::Ready => match backend.read_byte()? {
                    ReadByte::Byte(b) => return Ok(FirstByte::Byte(b)),
                    // Readable but empty: the input stream is closed.
                    ReadByte::Empty => return Ok(FirstByte::Outcome(ReadOutcome::NoEvent)),
                    ReadByte::Interrupted => {
                        *saw_resize |= backend.resize_observed();
                    }
                },
                // A resize interrupts the descriptor but never aborts a
                // forever-wait; observe and resume.
                PollStatus::Interrupted | PollStatus::TimedOut => {
                    *saw_resize |= backend.resize_observed();
                }
            }
        },

        WaitMode::Timeout(_) => {
            // The decode loop always pairs a timeout wait with a deadline.
            let Some(deadline) = deadline else {
                return Ok(FirstByte::Outcome(exhausted_outcome(wait, *saw_resize)));
            };
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Ok(FirstByte::Outcome(exhausted_outcome(wait, *saw_resize)));
                }
                match backend.poll_input(Some(remaining))? {
                    PollStatus::Ready => match backend.read_byte()? {
                        ReadByte::Byte(b) => return Ok(FirstByte::Byte(b)),
                        ReadByte::Empty => {
                            return Ok(FirstByte::Outcome(ReadOutcome::NoEvent));
                        }
                        ReadByte::Interrupted => {
                            *saw_resize |= backend.resize_observed();
                        }
                    },
                    PollStatus::TimedOut => {
                        *saw_resize |= backend.resize_observed();
                        return Ok(FirstByte::Outcome(exhausted_outcome(wait, *saw_resize)));
                    }
                    PollStatus::Interrupted => {
                        *saw_resize |= backend.resize_observed();
                    }
                }
            }
        }
    }
}

// ─── First-Byte Dispatch ────────────────────────────────────────────────────

/// Decode one event starting from its first byte. Returns `None` for
/// bytes that produce nothing (stray UTF-8 continuation bytes).
fn decode_event(backend: &mut dyn Backend, first: u8) -> Result<Option<KeyEvent>> {
    let event = match first {
        // Priority 2/3: escape sequence or bare Escape.
        0x1B => decode_escape(backend)?,
        // Priority 1: UTF-8 lead byte.
        b if b & 0x80 != 0 => return decode_utf8(backend, b),
        // Priority 4 exclusions: Tab and Enter keep their identity.
        0x09 => KeyEvent::plain(Key::Tab),
        0x0A | 0x0D => KeyEvent::plain(Key::Enter),
        // NUL is Ctrl+Space on every terminal.
        0x00 => KeyEvent::with(Key::Space, Modifiers::CTRL),
        // Priority 4: control range maps to Ctrl+letter.
        b @ 0x01..=0x1A => KeyEvent::with(Key::Char((b + 96) as char), Modifiers::CTRL),
        // DEL is the Backspace key on modern terminals.
        0x7F => KeyEvent::plain(Key::Backspace),
        b' ' => KeyEvent::plain(Key::Space),
        // Priority 5: the byte verbatim.
        b => KeyEvent::plain(Key::Char(b as char)),
    };
    Ok(Some(event))
}

// ─── Escape Sequences ───────────────────────────────────────────────────────

enum EscapeParse {
    Done(KeyEvent),
    NeedMore,
    Unmatched,
}

/// Resolve the bytes following an ESC.
///
/// The first follow-up byte gets the disambiguation window; if it never
/// arrives the ESC was a literal Escape keypress. Further bytes are pulled
/// while the partial sequence is still a recognized prefix. Unmatched
/// sequences degrade to Escape with the tail discarded.
fn decode_escape(backend: &mut dyn Backend) -> Result<KeyEvent> {
    let Some(b) = next_byte_within(backend, ESC_DISAMBIGUATE)? else {
        return Ok(KeyEvent::plain(Key::Escape));
    };
    let mut buf = Vec::with_capacity(MAX_LOOKAHEAD);
    buf.push(b);

    loop {
        match classify_escape(&buf, backend.extended_keys()) {
            EscapeParse::Done(event) => return Ok(event),
            EscapeParse::NeedMore if buf.len() < MAX_LOOKAHEAD => {
                match next_byte_within(backend, SEQ_CONTINUATION)? {
                    Some(b) => buf.push(b),
                    // Truncated sequence: degrade.
                    None => return Ok(KeyEvent::plain(Key::Escape)),
                }
            }
            EscapeParse::NeedMore | EscapeParse::Unmatched => {
                return Ok(KeyEvent::plain(Key::Escape));
            }
        }
    }
}

/// Classify a partial post-ESC byte sequence.
fn classify_escape(buf: &[u8], extended: &[SeqPattern]) -> EscapeParse {
    // Platform extensions outrank the generic tables.
    for table in [extended, GENERIC_KEYS] {
        if let Some(pattern) = table.iter().find(|p| p.bytes == buf) {
            return EscapeParse::Done(KeyEvent::with(pattern.key, pattern.modifiers));
        }
    }
    if is_table_prefix(buf, extended) || is_table_prefix(buf, GENERIC_KEYS) {
        return EscapeParse::NeedMore;
    }

    // Parametric CSI: ESC [ params final.
    if buf[0] == b'[' {
        return classify_parametric_csi(buf);
    }

    // Single byte after ESC: Alt-modified keypress.
    if buf.len() == 1 {
        return match buf[0] {
            0x1B => EscapeParse::Done(KeyEvent::with(Key::Escape, Modifiers::ALT)),
            b @ 0x20..=0x7E => {
                EscapeParse::Done(KeyEvent::with(Key::Char(b as char), Modifiers::ALT))
            }
            b @ 0x01..=0x1A if b != 0x09 && b != 0x0A && b != 0x0D => EscapeParse::Done(
                KeyEvent::with(Key::Char((b + 96) as char), Modifiers::ALT | Modifiers::CTRL),
            ),
            _ => EscapeParse::Unmatched,
        };
    }

    EscapeParse::Unmatched
}

fn is_table_prefix(buf: &[u8], table: &[SeqPattern]) -> bool {
    table
        .iter()
        .any(|p| p.bytes.len() > buf.len() && p.bytes.starts_with(buf))
}

/// Parametric CSI sequences: `[ params final` where params are digits and
/// semicolons. Covers the xterm modified-key encodings the fixed tables
/// cannot enumerate (`[1;5A`, `[3;5~`, `[15;2~`, ...).
fn classify_parametric_csi(buf: &[u8]) -> EscapeParse {
    debug_assert_eq!(buf[0], b'[');

    let params_and_final = &buf[1..];
    let Some((&final_byte, params_raw)) = params_and_final.split_last() else {
        return EscapeParse::NeedMore;
    };

    // Still collecting parameter bytes?
    if final_byte.is_ascii_digit() || final_byte == b';' {
        return if params_raw.iter().all(|&b| b.is_ascii_digit() || b == b';') {
            EscapeParse::NeedMore
        } else {
            EscapeParse::Unmatched
        };
    }
    if !params_raw.iter().all(|&b| b.is_ascii_digit() || b == b';') {
        return EscapeParse::Unmatched;
    }

    let params = parse_params(params_raw);
    let modifiers = params.get(1).copied().map_or_else(Modifiers::empty, decode_modifiers);

    let key = match final_byte {
        b'A' => Key::Up,
        b'B' => Key::Down,
        b'C' => Key::Right,
        b'D' => Key::Left,
        b'H' => Key::Home,
        b'F' => Key::End,
        b'P' => Key::F(1),
        b'Q' => Key::F(2),
        b'R' => Key::F(3),
        b'S' => Key::F(4),
        b'~' => match params.first().copied().unwrap_or(0) {
            1 | 7 => Key::Home,
            2 => Key::Insert,
            3 => Key::Delete,
            4 | 8 => Key::End,
            5 => Key::PageUp,
            6 => Key::PageDown,
            11 => Key::F(1),
            12 => Key::F(2),
            13 => Key::F(3),
            14 => Key::F(4),
            15 => Key::F(5),
            17 => Key::F(6),
            18 => Key::F(7),
            19 => Key::F(8),
            20 => Key::F(9),
            21 => Key::F(10),
            23 => Key::F(11),
            24 => Key::F(12),
            _ => return EscapeParse::Unmatched,
        },
        _ => return EscapeParse::Unmatched,
    };

    EscapeParse::Done(KeyEvent::with(key, modifiers))
}

/// Parse semicolon-separated numeric CSI parameters directly from bytes.
fn parse_params(raw: &[u8]) -> Vec<u16> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|&b| b == b';')
        .map(|chunk| {
            chunk.iter().fold(0u16, |acc, &b| {
                acc.saturating_mul(10)
                    .saturating_add(u16::from(b - b'0'))
            })
        })
        .collect()
}

/// Decode the xterm modifier parameter (`1 + bitmask`). The Shift bit is
/// dropped: only the scalar's casing reveals Shift.
fn decode_modifiers(param: u16) -> Modifiers {
    let mask = param.saturating_sub(1);
    let mut modifiers = Modifiers::empty();
    if mask & 0b010 != 0 {
        modifiers |= Modifiers::ALT;
    }
    if mask & 0b100 != 0 {
        modifiers |= Modifiers::CTRL;
    }
    modifiers
}

// ─── UTF-8 ──────────────────────────────────────────────────────────────────

/// Expected byte length of a UTF-8 character from its lead byte.
/// Returns 0 for continuation bytes and invalid leads.
const fn utf8_char_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => 0,
    }
}

/// Assemble a multi-byte scalar from its lead byte, pulling the exact
/// number of continuation bytes the lead implies. A truncated or invalid
/// encoding degrades to the lead byte verbatim; a stray continuation byte
/// produces nothing.
fn decode_utf8(backend: &mut dyn Backend, lead: u8) -> Result<Option<KeyEvent>> {
    let expected = utf8_char_len(lead);
    if expected == 0 {
        return Ok(None);
    }

    let mut bytes = Vec::with_capacity(expected);
    bytes.push(lead);
    for _ in 1..expected {
        match next_byte_within(backend, SEQ_CONTINUATION)? {
            Some(b) if b & 0xC0 == 0x80 => bytes.push(b),
            _ => return Ok(Some(KeyEvent::plain(Key::Char(lead as char)))),
        }
    }

    Ok(std::str::from_utf8(&bytes)
        .ok()
        .and_then(|s| s.chars().next())
        .map_or_else(
            || Some(KeyEvent::plain(Key::Char(lead as char))),
            |ch| Some(KeyEvent::plain(Key::Char(ch))),
        ))
}

// ─── Byte Supply ────────────────────────────────────────────────────────────

/// Fetch the next input byte, waiting at most `timeout`.
fn next_byte_within(backend: &mut dyn Backend, timeout: Duration) -> Result<Option<u8>> {
    loop {
        match backend.poll_input(Some(timeout))? {
            PollStatus::Ready => match backend.read_byte()? {
                ReadByte::Byte(b) => return Ok(Some(b)),
                ReadByte::Empty => return Ok(None),
                ReadByte::Interrupted => {}
            },
            PollStatus::TimedOut => return Ok(None),
            // Resize interrupts are observed by the outer loop; here we
            // just resume the bounded wait.
            PollStatus::Interrupted => {}
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedBackend;
    use crate::stream::{StreamRole, StyleEnv};
    use pretty_assertions::assert_eq;

    fn setup(input: &[u8]) -> (ScriptedBackend, Streams, Router) {
        let mut backend = ScriptedBackend::interactive();
        backend.push_input(input);
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        (backend, streams, Router::new())
    }

    fn read_one(input: &[u8]) -> ReadOutcome {
        let (mut backend, streams, mut router) = setup(input);
        read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::NoWait,
            None,
        )
        .unwrap()
    }

    fn key_of(outcome: ReadOutcome) -> KeyEvent {
        match outcome {
            ReadOutcome::Key(ev) => ev,
            other => panic!("expected a key event, got {other:?}"),
        }
    }

    // ── Plain bytes ─────────────────────────────────────────────────────

    #[test]
    fn ascii_letter() {
        assert_eq!(key_of(read_one(b"a")), KeyEvent::plain(Key::Char('a')));
    }

    #[test]
    fn space() {
        assert_eq!(key_of(read_one(b" ")), KeyEvent::plain(Key::Space));
    }

    #[test]
    fn tab_enter_keep_identity() {
        assert_eq!(key_of(read_one(b"\t")), KeyEvent::plain(Key::Tab));
        assert_eq!(key_of(read_one(b"\r")), KeyEvent::plain(Key::Enter));
        assert_eq!(key_of(read_one(b"\n")), KeyEvent::plain(Key::Enter));
    }

    #[test]
    fn del_is_backspace() {
        assert_eq!(key_of(read_one(b"\x7f")), KeyEvent::plain(Key::Backspace));
    }

    // ── Control range ───────────────────────────────────────────────────

    #[test]
    fn ctrl_c() {
        assert_eq!(
            key_of(read_one(b"\x03")),
            KeyEvent::with(Key::Char('c'), Modifiers::CTRL)
        );
    }

    #[test]
    fn ctrl_a_and_z() {
        assert_eq!(
            key_of(read_one(b"\x01")),
            KeyEvent::with(Key::Char('a'), Modifiers::CTRL)
        );
        assert_eq!(
            key_of(read_one(b"\x1a")),
            KeyEvent::with(Key::Char('z'), Modifiers::CTRL)
        );
    }

    #[test]
    fn nul_is_ctrl_space() {
        assert_eq!(
            key_of(read_one(b"\x00")),
            KeyEvent::with(Key::Space, Modifiers::CTRL)
        );
    }

    // ── Escape sequences ────────────────────────────────────────────────

    #[test]
    fn csi_arrow_up() {
        assert_eq!(key_of(read_one(b"\x1b[A")), KeyEvent::plain(Key::Up));
    }

    #[test]
    fn csi_arrows_all() {
        assert_eq!(key_of(read_one(b"\x1b[B")), KeyEvent::plain(Key::Down));
        assert_eq!(key_of(read_one(b"\x1b[C")), KeyEvent::plain(Key::Right));
        assert_eq!(key_of(read_one(b"\x1b[D")), KeyEvent::plain(Key::Left));
    }

    #[test]
    fn ss3_function_keys() {
        assert_eq!(key_of(read_one(b"\x1bOP")), KeyEvent::plain(Key::F(1)));
        assert_eq!(key_of(read_one(b"\x1bOS")), KeyEvent::plain(Key::F(4)));
    }

    #[test]
    fn tilde_editing_keys() {
        assert_eq!(key_of(read_one(b"\x1b[2~")), KeyEvent::plain(Key::Insert));
        assert_eq!(key_of(read_one(b"\x1b[3~")), KeyEvent::plain(Key::Delete));
        assert_eq!(key_of(read_one(b"\x1b[5~")), KeyEvent::plain(Key::PageUp));
        assert_eq!(key_of(read_one(b"\x1b[6~")), KeyEvent::plain(Key::PageDown));
    }

    #[test]
    fn tilde_function_keys() {
        assert_eq!(key_of(read_one(b"\x1b[15~")), KeyEvent::plain(Key::F(5)));
        assert_eq!(key_of(read_one(b"\x1b[24~")), KeyEvent::plain(Key::F(12)));
    }

    #[test]
    fn double_bracket_function_keys() {
        assert_eq!(key_of(read_one(b"\x1b[[A")), KeyEvent::plain(Key::F(1)));
        assert_eq!(key_of(read_one(b"\x1b[[E")), KeyEvent::plain(Key::F(5)));
    }

    #[test]
    fn bare_escape() {
        assert_eq!(key_of(read_one(b"\x1b")), KeyEvent::plain(Key::Escape));
    }

    #[test]
    fn alt_letter() {
        assert_eq!(
            key_of(read_one(b"\x1bx")),
            KeyEvent::with(Key::Char('x'), Modifiers::ALT)
        );
    }

    #[test]
    fn alt_escape() {
        assert_eq!(
            key_of(read_one(b"\x1b\x1b")),
            KeyEvent::with(Key::Escape, Modifiers::ALT)
        );
    }

    #[test]
    fn alt_ctrl_letter() {
        assert_eq!(
            key_of(read_one(b"\x1b\x01")),
            KeyEvent::with(Key::Char('a'), Modifiers::ALT | Modifiers::CTRL)
        );
    }

    #[test]
    fn unmatched_sequence_degrades_to_escape() {
        // `ESC [ 99 X` is nothing we recognize; the tail is discarded.
        assert_eq!(key_of(read_one(b"\x1b[99X")), KeyEvent::plain(Key::Escape));
    }

    // ── Modified keys (parametric CSI) ──────────────────────────────────

    #[test]
    fn ctrl_right() {
        assert_eq!(
            key_of(read_one(b"\x1b[1;5C")),
            KeyEvent::with(Key::Right, Modifiers::CTRL)
        );
    }

    #[test]
    fn alt_down() {
        assert_eq!(
            key_of(read_one(b"\x1b[1;3B")),
            KeyEvent::with(Key::Down, Modifiers::ALT)
        );
    }

    #[test]
    fn shift_bit_is_dropped() {
        // Modifier 2 = Shift only; no modifier bit survives.
        assert_eq!(key_of(read_one(b"\x1b[1;2A")), KeyEvent::plain(Key::Up));
    }

    #[test]
    fn ctrl_delete() {
        assert_eq!(
            key_of(read_one(b"\x1b[3;5~")),
            KeyEvent::with(Key::Delete, Modifiers::CTRL)
        );
    }

    #[test]
    fn modified_function_key() {
        assert_eq!(
            key_of(read_one(b"\x1b[15;5~")),
            KeyEvent::with(Key::F(5), Modifiers::CTRL)
        );
    }

    // ── UTF-8 ───────────────────────────────────────────────────────────

    #[test]
    fn two_byte_scalar() {
        assert_eq!(
            key_of(read_one("é".as_bytes())),
            KeyEvent::plain(Key::Char('é'))
        );
    }

    #[test]
    fn three_byte_scalar() {
        assert_eq!(
            key_of(read_one("中".as_bytes())),
            KeyEvent::plain(Key::Char('中'))
        );
    }

    #[test]
    fn four_byte_scalar() {
        assert_eq!(
            key_of(read_one("🔥".as_bytes())),
            KeyEvent::plain(Key::Char('🔥'))
        );
    }

    #[test]
    fn truncated_utf8_degrades_to_lead() {
        assert_eq!(
            key_of(read_one(&[0xC3])),
            KeyEvent::plain(Key::Char(0xC3 as char))
        );
    }

    // ── Wait modes ──────────────────────────────────────────────────────

    #[test]
    fn nowait_empty_returns_no_event() {
        assert_eq!(read_one(b""), ReadOutcome::NoEvent);
    }

    #[test]
    fn timeout_zero_returns_no_event_without_blocking() {
        let (mut backend, streams, mut router) = setup(b"");
        let outcome = read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::Timeout(Duration::ZERO),
            None,
        )
        .unwrap();
        assert_eq!(outcome, ReadOutcome::NoEvent);
    }

    #[test]
    fn timeout_exhausts_to_timed_out() {
        let (mut backend, streams, mut router) = setup(b"");
        let outcome = read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::Timeout(Duration::from_millis(5)),
            None,
        )
        .unwrap();
        assert_eq!(outcome, ReadOutcome::TimedOut);
    }

    #[test]
    fn timeout_with_buffered_input_returns_key() {
        let (mut backend, streams, mut router) = setup(b"q");
        let outcome = read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::Timeout(Duration::from_millis(100)),
            None,
        )
        .unwrap();
        assert_eq!(outcome, ReadOutcome::Key(KeyEvent::plain(Key::Char('q'))));
    }

    // ── Preconditions ───────────────────────────────────────────────────

    #[test]
    fn redirected_input_is_not_interactive() {
        let mut backend = ScriptedBackend::interactive();
        backend.set_redirected(StreamRole::Input, true);
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        let mut router = Router::new();
        let err = read_key_event(&mut backend, &streams, &mut router, WaitMode::NoWait, None)
            .unwrap_err();
        assert!(matches!(err, Error::NotInteractive));
    }

    #[test]
    fn both_outputs_redirected_is_not_interactive() {
        let mut backend = ScriptedBackend::interactive();
        backend.set_redirected(StreamRole::Output, true);
        backend.set_redirected(StreamRole::Error, true);
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        let mut router = Router::new();
        let err = read_key_event(&mut backend, &streams, &mut router, WaitMode::NoWait, None)
            .unwrap_err();
        assert!(matches!(err, Error::NotInteractive));
    }

    // ── Raw-mode discipline ─────────────────────────────────────────────

    #[test]
    fn raw_mode_exits_once_on_success() {
        let (mut backend, streams, mut router) = setup(b"a");
        read_key_event(&mut backend, &streams, &mut router, WaitMode::NoWait, None).unwrap();
        assert_eq!(backend.raw_transitions(), (1, 1));
        assert!(!backend.raw_active());
    }

    #[test]
    fn raw_mode_exits_once_on_empty() {
        let (mut backend, streams, mut router) = setup(b"");
        read_key_event(&mut backend, &streams, &mut router, WaitMode::NoWait, None).unwrap();
        assert_eq!(backend.raw_transitions(), (1, 1));
    }

    // ── Filter ──────────────────────────────────────────────────────────

    #[test]
    fn filter_accepts() {
        let (mut backend, streams, mut router) = setup(b"y");
        let accept = |ev: &KeyEvent| matches!(ev.key, Key::Char('y' | 'n'));
        let outcome = read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::Timeout(Duration::from_millis(100)),
            Some(&accept),
        )
        .unwrap();
        assert_eq!(outcome, ReadOutcome::Key(KeyEvent::plain(Key::Char('y'))));
    }

    #[test]
    fn filter_rejection_consumes_and_continues() {
        // 'x' is rejected, 'y' accepted; both are consumed in one session.
        let (mut backend, streams, mut router) = setup(b"xy");
        let accept = |ev: &KeyEvent| matches!(ev.key, Key::Char('y' | 'n'));
        let outcome = read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::Timeout(Duration::from_millis(100)),
            Some(&accept),
        )
        .unwrap();
        assert_eq!(outcome, ReadOutcome::Key(KeyEvent::plain(Key::Char('y'))));
        assert_eq!(backend.raw_transitions(), (1, 1));
    }

    #[test]
    fn filter_rejection_exhausts_budget() {
        let (mut backend, streams, mut router) = setup(b"x");
        let accept = |_: &KeyEvent| false;
        let outcome = read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::Timeout(Duration::from_millis(5)),
            Some(&accept),
        )
        .unwrap();
        assert_eq!(outcome, ReadOutcome::TimedOut);
    }

    // ── Resize ──────────────────────────────────────────────────────────

    #[test]
    fn resize_during_empty_timeout_reports_resized() {
        let (mut backend, streams, mut router) = setup(b"");
        backend.inject_resize();
        let outcome = read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::Timeout(Duration::from_millis(5)),
            None,
        )
        .unwrap();
        assert_eq!(outcome, ReadOutcome::Resized);
        assert_eq!(backend.raw_transitions(), (1, 1));
    }

    #[test]
    fn forever_wait_resumes_through_resize_interrupt() {
        // An unbounded wait is never aborted by a resize: the interrupted
        // poll is resumed and the buffered key still comes through.
        let (mut backend, streams, mut router) = setup(b"a");
        backend.inject_resize();
        let outcome = read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::Forever,
            None,
        )
        .unwrap();
        assert_eq!(outcome, ReadOutcome::Key(KeyEvent::plain(Key::Char('a'))));
        assert_eq!(backend.raw_transitions(), (1, 1));
    }

    #[test]
    fn resize_does_not_abort_buffered_key() {
        let (mut backend, streams, mut router) = setup(b"k");
        backend.inject_resize();
        let outcome = read_key_event(
            &mut backend,
            &streams,
            &mut router,
            WaitMode::Timeout(Duration::from_millis(50)),
            None,
        )
        .unwrap();
        assert_eq!(outcome, ReadOutcome::Key(KeyEvent::plain(Key::Char('k'))));
    }

    // ── Extended table precedence ───────────────────────────────────────

    #[test]
    fn extended_table_outranks_generic_alt_rule() {
        static WORD_NAV: &[SeqPattern] = &[SeqPattern {
            bytes: b"b",
            key: Key::Left,
            modifiers: Modifiers::ALT,
        }];
        let mut backend = ScriptedBackend::interactive().with_extended_keys(WORD_NAV);
        backend.push_input(b"\x1bb");
        let streams = Streams::classify(&mut backend, &StyleEnv::default()).unwrap();
        let mut router = Router::new();
        let outcome =
            read_key_event(&mut backend, &streams, &mut router, WaitMode::NoWait, None).unwrap();
        assert_eq!(
            outcome,
            ReadOutcome::Key(KeyEvent::with(Key::Left, Modifiers::ALT))
        );
    }

    // ── Tables ──────────────────────────────────────────────────────────

    #[test]
    fn generic_table_has_no_duplicate_patterns() {
        for (i, a) in GENERIC_KEYS.iter().enumerate() {
            for b in &GENERIC_KEYS[i + 1..] {
                assert_ne!(a.bytes, b.bytes, "duplicate pattern {:?}", a.bytes);
            }
        }
    }

    #[test]
    fn generic_table_fits_lookahead() {
        for p in GENERIC_KEYS {
            assert!(p.bytes.len() < MAX_LOOKAHEAD);
        }
    }
}
