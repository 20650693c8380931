// SPDX-License-Identifier: MIT
//
// rawterm — a direct terminal I/O engine.
//
// Classifies the standard streams once at startup, routes ANSI control
// sequences to whichever stream still faces a terminal, scopes raw-mode
// line discipline to the operations that need it, decodes keyboard input
// byte by byte with timeout-based escape disambiguation, and answers
// cursor-position queries over the DSR wire protocol.
//
// This crate intentionally avoids terminal-handling frameworks
// (crossterm, termion) in favor of direct termios/poll control on POSIX
// and a capability trait everywhere else. Every escape byte the engine
// emits or consumes is accounted for here.
//
// The entry point is [`Console`]: one value per terminal context, no
// ambient globals.

pub mod ansi;
pub mod backend;
pub mod console;
pub mod cursor;
pub mod error;
pub mod geom;
pub mod key;
pub mod raw;
pub mod router;
pub mod scripted;
pub mod stream;

#[cfg(unix)]
pub mod posix;

pub use ansi::CursorShape;
pub use backend::{Backend, PollStatus, ReadByte};
pub use console::{Console, DEFAULT_DIMENSIONS};
pub use error::{Error, Result};
pub use geom::{Coordinate, Dimensions};
pub use key::{Key, KeyEvent, KeyFilter, Modifiers, ReadOutcome, SeqPattern, WaitMode};
pub use raw::{RawScope, RawSession};
pub use router::Router;
pub use scripted::ScriptedBackend;
pub use stream::{StreamRole, Streams, StyleEnv};

#[cfg(unix)]
pub use posix::PosixBackend;
