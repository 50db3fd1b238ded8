//! Commands sent to the motion controller
//!
//! A [`Command`] is either a queued line, executed in turn by the
//! controller and completed asynchronously, or a realtime signal that
//! bypasses the queue. The empty admission probe is a queued form that
//! never occupies the controller.

use crate::firmware::grbl::RealtimeSignal;
use lathekit_core::{GcodeError, Result};
use std::fmt;

/// Maximum line length accepted by the controller, newline included
pub const MAX_LINE_LENGTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
enum CommandKind {
    Line(String),
    Probe,
    Realtime(RealtimeSignal),
}

/// Immutable controller command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    kind: CommandKind,
}

impl Command {
    /// Create a queued command line
    ///
    /// The text must be printable ASCII and, with its newline terminator,
    /// fit in [`MAX_LINE_LENGTH`] bytes. A trailing newline is accepted and
    /// stripped.
    pub fn line(text: impl Into<String>) -> Result<Self> {
        let mut text = text.into();
        if text.ends_with('\n') {
            text.pop();
        }

        if text.is_empty() || !text.bytes().all(|b| (0x20..0x7f).contains(&b)) {
            return Err(GcodeError::InvalidCharacters { line: text }.into());
        }

        let length = text.len() + 1;
        if length > MAX_LINE_LENGTH {
            return Err(GcodeError::LineTooLong {
                length,
                max: MAX_LINE_LENGTH,
                line: text,
            }
            .into());
        }

        Ok(Self {
            kind: CommandKind::Line(text),
        })
    }

    /// The empty admission probe
    pub fn probe() -> Self {
        Self {
            kind: CommandKind::Probe,
        }
    }

    /// A realtime signal
    pub fn realtime(signal: RealtimeSignal) -> Self {
        Self {
            kind: CommandKind::Realtime(signal),
        }
    }

    /// Command text without terminator (empty for probes and signals)
    pub fn text(&self) -> &str {
        match &self.kind {
            CommandKind::Line(text) => text,
            CommandKind::Probe | CommandKind::Realtime(_) => "",
        }
    }

    /// Text as handed to the controller
    pub fn wire_line(&self) -> String {
        match &self.kind {
            CommandKind::Line(text) => format!("{}\n", text),
            CommandKind::Probe | CommandKind::Realtime(_) => String::new(),
        }
    }

    /// Check if this command bypasses the queue
    pub fn is_realtime_signal(&self) -> bool {
        matches!(self.kind, CommandKind::Realtime(_))
    }

    /// Check if this is the admission probe
    pub fn is_probe(&self) -> bool {
        matches!(self.kind, CommandKind::Probe)
    }

    /// The realtime signal carried by this command, if any
    pub fn realtime_signal(&self) -> Option<RealtimeSignal> {
        match self.kind {
            CommandKind::Realtime(signal) => Some(signal),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CommandKind::Line(text) => write!(f, "{}", text),
            CommandKind::Probe => write!(f, "<probe>"),
            CommandKind::Realtime(signal) => write!(f, "<{}>", signal),
        }
    }
}
