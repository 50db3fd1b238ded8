//! Continuation tags registered with the command channel

use lathekit_communication::CommandChannel;
use std::fmt;

/// Component to resume when a submitted command completes or fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Spindle run/stop sequencer
    Spindle,
    /// Spindle speed change; carries the speed to restore on failure
    SpindleSpeed {
        /// Speed before the change (rpm)
        previous: u32,
    },
    /// Threading engine
    Threading,
    /// Straight turning engine
    Turning,
    /// Taper turning engine
    Taper,
}

impl fmt::Display for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Continuation::Spindle => write!(f, "spindle"),
            Continuation::SpindleSpeed { .. } => write!(f, "spindle speed"),
            Continuation::Threading => write!(f, "threading"),
            Continuation::Turning => write!(f, "turning"),
            Continuation::Taper => write!(f, "taper"),
        }
    }
}

/// The panel's command channel
pub type PanelChannel = CommandChannel<Continuation>;
