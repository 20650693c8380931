// SPDX-License-Identifier: MIT
//
// POSIX backend — termios, fcntl, poll, and ioctl against the real
// process streams.
//
// Raw-mode entry snapshots both the termios attributes and the fcntl
// blocking flags; exit restores the exact snapshot, never a hard-coded
// "sane" state, so a caller who ran us under an already-customized line
// discipline gets their discipline back. TCSANOW is used deliberately:
// draining variants would throw away type-ahead the decoder depends on.
//
// SIGWINCH is latched into an atomic by a signal handler installed once
// per process with SA_RESTART, so most syscalls resume transparently and
// poll() wakes with EINTR, which the engine reports as an interruption
// rather than an error.

#![allow(unsafe_code)]

use std::io::{self, Write};
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::backend::{Backend, PollStatus, ReadByte};
use crate::error::{Error, Result};
use crate::geom::Dimensions;
use crate::key::SeqPattern;
use crate::raw::RawScope;
use crate::stream::StreamRole;

// ─── SIGWINCH ────────────────────────────────────────────────────────────────

static RESIZE_FLAG: AtomicBool = AtomicBool::new(false);
static INSTALL_SIGWINCH: Once = Once::new();

extern "C" fn on_sigwinch(_: libc::c_int) {
    RESIZE_FLAG.store(true, Ordering::Relaxed);
}

fn install_sigwinch_handler() {
    INSTALL_SIGWINCH.call_once(|| {
        // SAFETY: sigaction with a handler that only stores to an atomic,
        // which is async-signal-safe.
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction =
                on_sigwinch as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&raw mut action.sa_mask);
            libc::sigaction(libc::SIGWINCH, &raw const action, std::ptr::null_mut());
        }
    });
}

// ─── Backend ─────────────────────────────────────────────────────────────────

/// Everything needed to undo a raw-mode entry.
struct RawSnapshot {
    termios: libc::termios,
    fl_flags: libc::c_int,
}

/// The engine's backend on POSIX hosts, operating on the process's
/// standard descriptors.
pub struct PosixBackend {
    saved: Option<RawSnapshot>,
}

impl PosixBackend {
    /// Construct the backend and install the resize handler (once per
    /// process).
    #[must_use]
    pub fn new() -> Self {
        install_sigwinch_handler();
        Self { saved: None }
    }

    fn window_size(fd: libc::c_int) -> Option<Dimensions> {
        // SAFETY: TIOCGWINSZ only writes into the winsize out-param.
        let mut size: libc::winsize = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &raw mut size) };
        if rc == 0 && size.ws_col > 0 && size.ws_row > 0 {
            Some(Dimensions {
                cols: size.ws_col,
                rows: size.ws_row,
            })
        } else {
            None
        }
    }
}

impl Default for PosixBackend {
    fn default() -> Self {
        Self::new()
    }
}

const fn fd_for(role: StreamRole) -> libc::c_int {
    match role {
        StreamRole::Input => libc::STDIN_FILENO,
        StreamRole::Output => libc::STDOUT_FILENO,
        StreamRole::Error => libc::STDERR_FILENO,
    }
}

fn attrs_err() -> Error {
    Error::AttributesUnavailable(io::Error::last_os_error())
}

impl Backend for PosixBackend {
    fn is_redirected(&mut self, role: StreamRole) -> io::Result<bool> {
        // SAFETY: isatty only inspects the descriptor.
        let rc = unsafe { libc::isatty(fd_for(role)) };
        if rc == 1 {
            return Ok(false);
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            // "Not a terminal" in its platform spellings, or no error at
            // all: a classification answer, not a failure.
            Some(libc::ENOTTY | libc::EINVAL) | Some(0) | None => Ok(true),
            Some(_) => Err(err),
        }
    }

    fn dimensions(&mut self) -> Option<Dimensions> {
        [
            libc::STDOUT_FILENO,
            libc::STDERR_FILENO,
            libc::STDIN_FILENO,
        ]
        .into_iter()
        .find_map(Self::window_size)
    }

    fn enter_raw(&mut self, scope: RawScope) -> Result<()> {
        if self.saved.is_some() {
            return Err(Error::RawModeActive);
        }

        // SAFETY: tcgetattr writes into the out-param; fcntl F_GETFL
        // takes no pointer arguments.
        let mut termios: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &raw mut termios) } != 0 {
            return Err(attrs_err());
        }
        let fl_flags = unsafe { libc::fcntl(libc::STDIN_FILENO, libc::F_GETFL) };
        if fl_flags < 0 {
            return Err(attrs_err());
        }

        let mut attrs = termios;
        attrs.c_lflag &= !(libc::ICANON | libc::ECHO);
        if matches!(scope, RawScope::Events) {
            // Ctrl+C and Ctrl+S must reach the decoder as bytes.
            attrs.c_lflag &= !libc::ISIG;
            attrs.c_iflag &= !libc::IXON;
        }
        attrs.c_cc[libc::VMIN] = 1;
        attrs.c_cc[libc::VTIME] = 0;

        // SAFETY: tcsetattr reads the termios by pointer. TCSANOW keeps
        // buffered type-ahead intact.
        if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw const attrs) } != 0 {
            return Err(attrs_err());
        }

        self.saved = Some(RawSnapshot { termios, fl_flags });
        Ok(())
    }

    fn exit_raw(&mut self) -> Result<()> {
        let Some(snapshot) = self.saved.take() else {
            return Err(Error::AttributesUnavailable(io::Error::other(
                "no raw session to restore",
            )));
        };
        // SAFETY: restores the exact attributes and flags captured at
        // entry.
        let rc =
            unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, &raw const snapshot.termios) };
        let fl =
            unsafe { libc::fcntl(libc::STDIN_FILENO, libc::F_SETFL, snapshot.fl_flags) };
        if rc != 0 || fl < 0 {
            return Err(attrs_err());
        }
        Ok(())
    }

    fn set_nonblocking(&mut self, enabled: bool) -> Result<()> {
        // SAFETY: F_GETFL/F_SETFL take and return plain flag words.
        let flags = unsafe { libc::fcntl(libc::STDIN_FILENO, libc::F_GETFL) };
        if flags < 0 {
            return Err(attrs_err());
        }
        let flags = if enabled {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        if unsafe { libc::fcntl(libc::STDIN_FILENO, libc::F_SETFL, flags) } < 0 {
            return Err(attrs_err());
        }
        Ok(())
    }

    fn read_byte(&mut self) -> io::Result<ReadByte> {
        let mut byte: u8 = 0;
        // SAFETY: reads at most one byte into a stack slot.
        let n = unsafe { libc::read(libc::STDIN_FILENO, (&raw mut byte).cast(), 1) };
        match n {
            1 => Ok(ReadByte::Byte(byte)),
            0 => Ok(ReadByte::Empty),
            _ => {
                let err = io::Error::last_os_error();
                match err.raw_os_error() {
                    // EAGAIN == EWOULDBLOCK on Linux; both named for the
                    // platforms where they differ.
                    #[allow(unreachable_patterns)]
                    Some(libc::EAGAIN | libc::EWOULDBLOCK) => Ok(ReadByte::Empty),
                    Some(libc::EINTR) => Ok(ReadByte::Interrupted),
                    _ => Err(err),
                }
            }
        }
    }

    fn poll_input(&mut self, timeout: Option<Duration>) -> io::Result<PollStatus> {
        let timeout_ms = timeout.map_or(-1, |d| {
            let ms = i32::try_from(d.as_millis()).unwrap_or(i32::MAX);
            // Sub-millisecond budgets round up so a bounded wait is
            // never silently a busy-poll.
            if ms == 0 && !d.is_zero() { 1 } else { ms }
        });
        let mut fds = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: poll reads/writes the single pollfd on the stack.
        let n = unsafe { libc::poll(&raw mut fds, 1, timeout_ms) };
        match n {
            0 => Ok(PollStatus::TimedOut),
            1.. => Ok(PollStatus::Ready),
            _ => {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    Ok(PollStatus::Interrupted)
                } else {
                    Err(err)
                }
            }
        }
    }

    fn resize_observed(&mut self) -> bool {
        RESIZE_FLAG.swap(false, Ordering::Relaxed)
    }

    fn write(&mut self, role: StreamRole, bytes: &[u8]) -> io::Result<()> {
        match role {
            StreamRole::Output => io::stdout().lock().write_all(bytes),
            StreamRole::Error => io::stderr().lock().write_all(bytes),
            StreamRole::Input => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot write to the input stream",
            )),
        }
    }

    fn flush(&mut self, role: StreamRole) -> io::Result<()> {
        match role {
            StreamRole::Output => io::stdout().lock().flush(),
            StreamRole::Error => io::stderr().lock().flush(),
            StreamRole::Input => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot flush the input stream",
            )),
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        // SAFETY: tcflush takes only plain arguments.
        if unsafe { libc::tcflush(libc::STDIN_FILENO, libc::TCIFLUSH) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn extended_keys(&self) -> &'static [SeqPattern] {
        // Terminal.app sends plain `ESC b` / `ESC f` for Option+arrow
        // word navigation.
        #[cfg(target_os = "macos")]
        {
            use crate::key::{Key, Modifiers};
            static OPTION_WORD_NAV: &[SeqPattern] = &[
                SeqPattern {
                    bytes: b"b",
                    key: Key::Left,
                    modifiers: Modifiers::ALT,
                },
                SeqPattern {
                    bytes: b"f",
                    key: Key::Right,
                    modifiers: Modifiers::ALT,
                },
            ];
            OPTION_WORD_NAV
        }
        #[cfg(not(target_os = "macos"))]
        {
            &[]
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
