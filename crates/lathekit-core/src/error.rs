//! Error handling for LatheKit
//!
//! Provides error types for all layers of the panel core:
//! - G-Code errors (command lines that cannot be formatted or sent)
//! - Logic errors (internal invariant breaches, always fatal)
//! - Parameter errors (operator input rejected before an operation starts)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// G-Code error type
///
/// Represents command lines that cannot be produced for the controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GcodeError {
    /// Line would exceed the controller's line buffer
    #[error("Line too long ({length} bytes, max {max}): {line}")]
    LineTooLong {
        /// Length of the line including its terminator.
        length: usize,
        /// Maximum accepted length.
        max: usize,
        /// The offending line.
        line: String,
    },

    /// Line contains characters the controller cannot accept
    #[error("Line contains non-ASCII or control characters: {line}")]
    InvalidCharacters {
        /// The offending line.
        line: String,
    },

    /// A coordinate or feed value is not a finite number
    #[error("Non-finite value for {word}")]
    NonFiniteValue {
        /// The address word (X, Z, F, ...).
        word: char,
    },
}

/// Logic error type
///
/// An internal invariant was breached. These are never recovered from:
/// the control loop stops and the error is raised to the host.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LogicError {
    /// Too many continuations registered at once
    #[error("Continuation stack overflow (capacity {capacity})")]
    ContinuationOverflow {
        /// The stack capacity.
        capacity: usize,
    },

    /// A component received an outcome it was not waiting for
    #[error("{component} received {outcome} while idle")]
    UnexpectedOutcome {
        /// The component name.
        component: String,
        /// The outcome that was delivered.
        outcome: String,
    },
}

/// Parameter error type
///
/// Operator-entered values that cannot drive an operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    /// A parameter value is out of the valid range.
    #[error("Parameter '{name}' out of range: {value} (valid: {valid})")]
    OutOfRange {
        /// The parameter name.
        name: String,
        /// The rejected value.
        value: f64,
        /// Human readable valid range.
        valid: String,
    },

    /// A parameter value is invalid.
    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue {
        /// The parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ParameterError {
    /// Build an out-of-range error
    pub fn out_of_range(name: &str, value: f64, valid: &str) -> Self {
        Self::OutOfRange {
            name: name.to_string(),
            value,
            valid: valid.to_string(),
        }
    }
}

/// Main error type for LatheKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// G-Code error
    #[error(transparent)]
    Gcode(#[from] GcodeError),

    /// Logic error
    #[error(transparent)]
    Logic(#[from] LogicError),

    /// Parameter error
    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

impl Error {
    /// Check if this error must stop the control loop
    pub fn is_logic_fault(&self) -> bool {
        matches!(self, Error::Logic(_))
    }

    /// Check if this is a parameter error
    pub fn is_parameter_error(&self) -> bool {
        matches!(self, Error::Parameter(_))
    }

    /// Check if this is a G-Code error
    pub fn is_gcode_error(&self) -> bool {
        matches!(self, Error::Gcode(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
