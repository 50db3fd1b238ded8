//! Data models for positions, axes and controller state
//!
//! This module provides:
//! - Tool position snapshots (X, Y, Z) in work coordinates
//! - Axis identifiers used when formatting commands
//! - Spindle direction
//! - Controller machine state as reported by the motion controller

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lathe axis
///
/// X is the cross slide, Z the lead axis along the spindle. Y is the
/// spindle itself when it is driven as a rotary axis (threading), in
/// revolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Cross slide
    X,
    /// Spindle as rotary axis
    Y,
    /// Lead axis
    Z,
}

impl Axis {
    /// All axes in controller order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Address letter used in command lines
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }

    /// Index into per-axis arrays reported by the controller
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Spindle rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpindleDirection {
    /// Clockwise (M3)
    #[default]
    Forward,
    /// Counter-clockwise (M4)
    Reverse,
}

impl SpindleDirection {
    /// The M-code that starts the spindle in this direction
    pub fn m_code(self) -> u8 {
        match self {
            SpindleDirection::Forward => 3,
            SpindleDirection::Reverse => 4,
        }
    }

    /// The opposite direction
    pub fn reversed(self) -> Self {
        match self {
            SpindleDirection::Forward => SpindleDirection::Reverse,
            SpindleDirection::Reverse => SpindleDirection::Forward,
        }
    }
}

/// Position in work coordinates (mm, Y in revolutions)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
}

impl Position {
    /// Create a new position with X, Y, Z coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        debug_assert!(
            x.is_finite() && y.is_finite() && z.is_finite(),
            "Position axes must be finite: x={x}, y={y}, z={z}"
        );
        Self { x, y, z }
    }

    /// Get a single axis value
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{:.3} Y:{:.3} Z:{:.3}", self.x, self.y, self.z)
    }
}

/// Controller machine state
///
/// Decoded from the controller's state bits. Only the states the panel
/// displays are distinguished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MachineState {
    /// Ready, nothing executing
    #[default]
    Idle,
    /// Alarm lock; commands fail until cleared
    Alarm,
    /// Executing motion
    Run,
    /// Feed hold active
    Hold,
    /// Jogging
    Jog,
    /// Any other state code
    Unknown(u16),
}

impl MachineState {
    /// Decode a controller state code
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => MachineState::Idle,
            1 => MachineState::Alarm,
            8 => MachineState::Run,
            16 => MachineState::Hold,
            32 => MachineState::Jog,
            other => MachineState::Unknown(other),
        }
    }

    /// Short label for the status caption
    pub fn label(&self) -> &'static str {
        match self {
            MachineState::Idle => "Idle",
            MachineState::Alarm => "Alarm",
            MachineState::Run => "Run",
            MachineState::Hold => "Hold",
            MachineState::Jog => "Jog",
            MachineState::Unknown(_) => "Unk",
        }
    }

    /// Check if the controller is alarmed
    pub fn is_alarm(&self) -> bool {
        matches!(self, MachineState::Alarm)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
