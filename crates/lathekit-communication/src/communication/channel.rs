//! Single-command-in-flight channel with continuation tracking
//!
//! Wraps a [`MotionController`] and guarantees that at most one queued
//! command is outstanding at a time. Callers register a continuation with
//! each submission; when the controller completes or faults the command
//! the outcome is latched and continuations are handed back, most recent
//! first, one per poll.
//!
//! # Features
//! - Single queued command in flight
//! - Realtime signals bypass the in-flight check
//! - Bounded continuation stack (overflow is a logic fault)
//! - Admission probe that completes without occupying the controller

use crate::communication::{Command, ControllerOutcome, MotionController};
use crate::firmware::grbl::format_error;
use lathekit_core::{LogicError, MachineState, Result};

/// Maximum number of continuations waiting at once
pub const CONTINUATION_CAPACITY: usize = 10;

/// Outcome of a queued command as seen by the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Still executing, or nothing to report
    Pending,
    /// Executed successfully
    Completed,
    /// Rejected or faulted
    Failed,
}

impl Outcome {
    /// Check if this is a terminal failure
    pub fn is_failed(self) -> bool {
        matches!(self, Outcome::Failed)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Pending => write!(f, "pending"),
            Outcome::Completed => write!(f, "completed"),
            Outcome::Failed => write!(f, "failed"),
        }
    }
}

/// A continuation handed back for dispatch together with the outcome
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery<H> {
    /// Outcome of the command that resumed this continuation
    pub outcome: Outcome,
    /// The continuation registered at submission
    pub continuation: H,
}

/// Channel owning the controller handle, the in-flight command and the
/// continuation stack
pub struct CommandChannel<H> {
    /// The underlying controller
    controller: Box<dyn MotionController>,
    /// Queued command currently executing
    in_flight: Option<Command>,
    /// Continuations awaiting an outcome, most recent last
    continuations: Vec<H>,
    /// Outcome still being handed to continuations
    latched: Option<Outcome>,
}

impl<H: std::fmt::Debug> CommandChannel<H> {
    /// Create a new channel over a controller
    pub fn new(controller: Box<dyn MotionController>) -> Self {
        Self {
            controller,
            in_flight: None,
            continuations: Vec::with_capacity(CONTINUATION_CAPACITY),
            latched: None,
        }
    }

    /// Submit a command, registering an optional continuation
    ///
    /// Returns `Ok(false)` when the command is not admitted (a queued
    /// command is in flight or the controller refuses the line); nothing
    /// changes in that case. A continuation that would overflow the stack
    /// is a logic fault and nothing is sent. Realtime signals are always
    /// admitted and never carry a continuation.
    pub fn submit(&mut self, command: Command, continuation: Option<H>) -> Result<bool> {
        if let Some(signal) = command.realtime_signal() {
            if continuation.is_some() {
                tracing::warn!("Continuation ignored for realtime signal {}", signal);
            }
            tracing::debug!("Realtime signal: {}", signal);
            self.controller.submit_realtime(signal.as_byte());
            return Ok(true);
        }

        if self.in_flight.is_some() {
            return Ok(false);
        }

        if continuation.is_some() && self.continuations.len() >= CONTINUATION_CAPACITY {
            tracing::error!(
                "Continuation stack full, cannot register for {}",
                command
            );
            return Err(LogicError::ContinuationOverflow {
                capacity: CONTINUATION_CAPACITY,
            }
            .into());
        }

        if !self.controller.submit_line(&command.wire_line()) {
            tracing::debug!("Controller refused {}", command);
            return Ok(false);
        }

        tracing::debug!("Submitted {}", command);
        if command.is_probe() {
            self.latched = Some(Outcome::Completed);
        } else {
            self.in_flight = Some(command);
            self.latched = None;
        }

        if let Some(continuation) = continuation {
            self.continuations.push(continuation);
        }

        Ok(true)
    }

    /// Check the in-flight command and hand back at most one continuation
    pub fn poll(&mut self) -> Option<Delivery<H>> {
        if self.in_flight.is_some() {
            let outcome = self.query_controller();
            if outcome == Outcome::Pending {
                return None;
            }

            if let Some(command) = self.in_flight.take() {
                tracing::debug!("{} {}", command, outcome);
            }
            self.latched = Some(outcome);
        }

        let outcome = self.latched?;
        match self.continuations.pop() {
            Some(continuation) => {
                tracing::debug!("Resuming {:?} with {}", continuation, outcome);
                Some(Delivery {
                    outcome,
                    continuation,
                })
            }
            None => {
                self.latched = None;
                None
            }
        }
    }

    fn query_controller(&mut self) -> Outcome {
        if MachineState::from_code(self.controller.state_code()).is_alarm() {
            tracing::warn!("Controller in alarm state");
            return Outcome::Failed;
        }

        let code = self.controller.last_error_code();
        if code != 0 {
            tracing::warn!("Controller fault: {}", format_error(code));
            return Outcome::Failed;
        }

        match self.controller.poll_outcome() {
            ControllerOutcome::Pending => Outcome::Pending,
            ControllerOutcome::Ok => Outcome::Completed,
            ControllerOutcome::Faulted => {
                tracing::warn!("Controller faulted the command");
                Outcome::Failed
            }
        }
    }

    /// Check if a queued command is executing
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The queued command currently executing
    pub fn in_flight(&self) -> Option<&Command> {
        self.in_flight.as_ref()
    }

    /// Number of continuations waiting for an outcome
    pub fn pending_continuations(&self) -> usize {
        self.continuations.len()
    }

    /// Outcome still being handed to continuations, if any
    pub fn latched_outcome(&self) -> Outcome {
        self.latched.unwrap_or(Outcome::Pending)
    }

    /// Get a reference to the underlying controller
    pub fn controller(&self) -> &dyn MotionController {
        self.controller.as_ref()
    }
}
