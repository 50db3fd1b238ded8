//! # LatheKit Communication
//!
//! Command dispatch to the lathe's motion controller.
//! Provides the controller interface, the single-command-in-flight channel
//! with its continuation stack, the position feed, the GRBL command
//! vocabulary and an in-process simulated controller.

pub mod communication;
pub mod firmware;

pub use communication::{
    Command, CommandChannel, ControllerOutcome, Delivery, MotionController, Outcome,
    PositionFeed, SimulatedController, SimulatedHandle, SimulatedState, CONTINUATION_CAPACITY,
    MAX_LINE_LENGTH,
};

pub use firmware::grbl::{command_creator, RealtimeSignal};
