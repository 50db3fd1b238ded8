//! # LatheKit Core
//!
//! Core types and errors for the LatheKit lathe panel.
//! Provides the error taxonomy, position and axis models, the decoded
//! controller machine state and shared-handle aliases used by the
//! communication and machining crates.

pub mod data;
pub mod error;
pub mod types;

pub use data::{Axis, MachineState, Position, SpindleDirection};

pub use error::{Error, GcodeError, LogicError, ParameterError, Result};

pub use types::{shared, Shared};
