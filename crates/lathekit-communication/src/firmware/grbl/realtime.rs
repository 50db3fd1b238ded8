//! GRBL realtime signals
//!
//! Single bytes that bypass the controller's line queue. They are always
//! accepted and never produce a completion.

use std::fmt;

/// Realtime control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeSignal {
    /// Pause motion (`!`)
    FeedHold,
    /// Resume after a hold (`~`)
    CycleStart,
    /// Request a status report (`?`)
    StatusReport,
    /// Soft reset (Ctrl-X)
    SoftReset,
    /// Cancel an active jog
    JogCancel,
}

impl RealtimeSignal {
    /// Get the byte representation for the signal
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::FeedHold => b'!',
            Self::CycleStart => b'~',
            Self::StatusReport => b'?',
            Self::SoftReset => 0x18,
            Self::JogCancel => 0x85,
        }
    }

    /// Decode a byte back into a signal
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'!' => Some(Self::FeedHold),
            b'~' => Some(Self::CycleStart),
            b'?' => Some(Self::StatusReport),
            0x18 => Some(Self::SoftReset),
            0x85 => Some(Self::JogCancel),
            _ => None,
        }
    }
}

impl fmt::Display for RealtimeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FeedHold => write!(f, "feed hold"),
            Self::CycleStart => write!(f, "cycle start"),
            Self::StatusReport => write!(f, "status report"),
            Self::SoftReset => write!(f, "soft reset"),
            Self::JogCancel => write!(f, "jog cancel"),
        }
    }
}
