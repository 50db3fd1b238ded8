//! Motion controller communication
//!
//! Defines the interface to the external motion controller and the
//! single-command-in-flight channel that rides on it.

pub mod channel;
pub mod command;
pub mod position_feed;
pub mod simulated;

pub use channel::{CommandChannel, Delivery, Outcome, CONTINUATION_CAPACITY};
pub use command::{Command, MAX_LINE_LENGTH};
pub use position_feed::PositionFeed;
pub use simulated::{SimulatedController, SimulatedHandle, SimulatedState};

/// Result of asking the controller about the command it is executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerOutcome {
    /// Still executing
    Pending,
    /// Accepted and executed
    Ok,
    /// Rejected or faulted while executing
    Faulted,
}

/// Interface to the external motion controller
///
/// The panel never parses controller replies beyond these observables.
/// Implementations must return quickly; the control loop never blocks.
pub trait MotionController {
    /// Offer a newline-terminated line to the controller's queue.
    /// An empty line only asks whether the queue would accept one.
    fn submit_line(&mut self, line: &str) -> bool;

    /// Send a realtime byte, bypassing the queue
    fn submit_realtime(&mut self, signal: u8);

    /// Outcome of the most recently accepted line
    fn poll_outcome(&mut self) -> ControllerOutcome;

    /// Current machine position in steps, per axis (X, Y, Z)
    fn raw_position(&self) -> [i32; 3];

    /// Active coordinate offset in mm, per axis (X, Y, Z)
    fn current_offset(&self) -> [f64; 3];

    /// Last parser error code, 0 when none
    fn last_error_code(&self) -> i32;

    /// Controller state bits (0 idle, 1 alarm, 8 run, 16 hold, 32 jog)
    fn state_code(&self) -> u16;
}
