//! Spindle run/stop sequencer
//!
//! The spindle is never stopped straight from full speed: a stop request
//! first re-issues the spin command at a crawl speed, and only once that
//! completes is `M5` sent. Every transition waits for the controller's
//! outcome before the state settles.

use crate::continuation::{Continuation, PanelChannel};
use lathekit_communication::{command_creator, Outcome};
use lathekit_core::{LogicError, ParameterError, Result, SpindleDirection};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Spindle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpindleState {
    /// Not turning
    #[default]
    Stopped,
    /// Run command in flight
    Starting,
    /// Turning at the commanded speed
    Running,
    /// Crawl-speed command in flight
    Decelerating,
    /// `M5` in flight
    Stopping,
}

impl SpindleState {
    /// Check if a transition is in progress
    pub fn is_transitioning(self) -> bool {
        matches!(
            self,
            SpindleState::Starting | SpindleState::Decelerating | SpindleState::Stopping
        )
    }
}

impl fmt::Display for SpindleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SpindleState::Stopped => "stopped",
            SpindleState::Starting => "starting",
            SpindleState::Running => "running",
            SpindleState::Decelerating => "decelerating",
            SpindleState::Stopping => "stopping",
        };
        write!(f, "{}", label)
    }
}

/// Spindle speed limits and defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpindleSettings {
    /// Speed at power-up (rpm)
    pub default_speed: u32,
    /// Lowest selectable speed (rpm)
    pub min_speed: u32,
    /// Highest selectable speed (rpm)
    pub max_speed: u32,
    /// Increment of the speed buttons (rpm)
    pub speed_step: u32,
    /// Crawl speed used before stopping (rpm)
    pub decel_speed: u32,
    /// Direction at power-up
    pub direction: SpindleDirection,
}

impl Default for SpindleSettings {
    fn default() -> Self {
        Self {
            default_speed: 1000,
            min_speed: 100,
            max_speed: 3000,
            speed_step: 100,
            decel_speed: 1,
            direction: SpindleDirection::Forward,
        }
    }
}

impl SpindleSettings {
    /// Check the limits are consistent
    pub fn validate(&self) -> std::result::Result<(), ParameterError> {
        if self.min_speed == 0 || self.min_speed > self.max_speed {
            return Err(ParameterError::InvalidValue {
                name: "min_speed".to_string(),
                reason: format!(
                    "must be positive and not above max_speed ({})",
                    self.max_speed
                ),
            });
        }
        if !(self.min_speed..=self.max_speed).contains(&self.default_speed) {
            return Err(ParameterError::out_of_range(
                "default_speed",
                self.default_speed as f64,
                &format!("{}..={}", self.min_speed, self.max_speed),
            ));
        }
        if self.speed_step == 0 {
            return Err(ParameterError::out_of_range(
                "speed_step",
                0.0,
                "> 0",
            ));
        }
        if self.decel_speed == 0 || self.decel_speed > self.max_speed {
            return Err(ParameterError::out_of_range(
                "decel_speed",
                self.decel_speed as f64,
                &format!("1..={}", self.max_speed),
            ));
        }
        Ok(())
    }
}

/// Spindle state machine
#[derive(Debug, Clone)]
pub struct SpindleSequencer {
    settings: SpindleSettings,
    state: SpindleState,
    speed: u32,
    direction: SpindleDirection,
}

impl SpindleSequencer {
    /// Create a stopped sequencer
    pub fn new(settings: SpindleSettings) -> Self {
        Self {
            state: SpindleState::Stopped,
            speed: settings.default_speed,
            direction: settings.direction,
            settings,
        }
    }

    /// Current state
    pub fn state(&self) -> SpindleState {
        self.state
    }

    /// Commanded speed (rpm)
    pub fn speed(&self) -> u32 {
        self.speed
    }

    /// Commanded direction
    pub fn direction(&self) -> SpindleDirection {
        self.direction
    }

    /// Speed limits in effect
    pub fn settings(&self) -> &SpindleSettings {
        &self.settings
    }

    /// Start the spindle at the current speed and direction
    ///
    /// Returns false unless the spindle is stopped and the run command was
    /// admitted.
    pub fn request_run(&mut self, channel: &mut PanelChannel) -> Result<bool> {
        if self.state != SpindleState::Stopped {
            return Ok(false);
        }

        let command = command_creator::spindle_run(self.direction, self.speed)?;
        if !channel.submit(command, Some(Continuation::Spindle))? {
            return Ok(false);
        }

        tracing::info!("Spindle starting at {} rpm", self.speed);
        self.state = SpindleState::Starting;
        Ok(true)
    }

    /// Begin the two-phase stop
    ///
    /// Returns false unless the spindle is running and the crawl-speed
    /// command was admitted.
    pub fn request_stop(&mut self, channel: &mut PanelChannel) -> Result<bool> {
        if self.state != SpindleState::Running {
            return Ok(false);
        }

        let command = command_creator::spindle_run(self.direction, self.settings.decel_speed)?;
        if !channel.submit(command, Some(Continuation::Spindle))? {
            return Ok(false);
        }

        tracing::info!("Spindle decelerating");
        self.state = SpindleState::Decelerating;
        Ok(true)
    }

    /// Run when stopped, stop when running
    pub fn toggle(&mut self, channel: &mut PanelChannel) -> Result<bool> {
        match self.state {
            SpindleState::Stopped => self.request_run(channel),
            SpindleState::Running => self.request_stop(channel),
            _ => Ok(false),
        }
    }

    /// Resume after a run/stop command's outcome
    pub fn on_outcome(&mut self, outcome: Outcome, channel: &mut PanelChannel) -> Result<()> {
        match (self.state, outcome) {
            (SpindleState::Starting, Outcome::Completed) => {
                tracing::info!("Spindle running");
                self.state = SpindleState::Running;
            }
            (SpindleState::Starting, Outcome::Failed) => {
                tracing::warn!("Spindle start failed");
                self.state = SpindleState::Stopped;
            }
            (SpindleState::Decelerating, Outcome::Completed) => {
                let command = command_creator::spindle_stop()?;
                if channel.submit(command, Some(Continuation::Spindle))? {
                    self.state = SpindleState::Stopping;
                } else {
                    tracing::warn!("Spindle stop refused, still running");
                    self.state = SpindleState::Running;
                }
            }
            (SpindleState::Stopping, Outcome::Completed) => {
                tracing::info!("Spindle stopped");
                self.state = SpindleState::Stopped;
            }
            (SpindleState::Decelerating | SpindleState::Stopping, Outcome::Failed) => {
                tracing::warn!("Spindle stop failed, still running");
                self.state = SpindleState::Running;
            }
            (state, outcome) => {
                tracing::error!("Spindle received {} while {}", outcome, state);
                return Err(LogicError::UnexpectedOutcome {
                    component: "spindle".to_string(),
                    outcome: outcome.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Set the speed used by the next run command
    ///
    /// Only allowed while stopped; the speed must be within the limits.
    pub fn set_speed(&mut self, rpm: u32) -> Result<bool> {
        if !(self.settings.min_speed..=self.settings.max_speed).contains(&rpm) {
            return Err(ParameterError::out_of_range(
                "spindle_speed",
                rpm as f64,
                &format!("{}..={}", self.settings.min_speed, self.settings.max_speed),
            )
            .into());
        }
        if self.state != SpindleState::Stopped {
            return Ok(false);
        }
        self.speed = rpm;
        Ok(true)
    }

    /// Raise the speed by one step
    pub fn increase_speed(&mut self, channel: &mut PanelChannel) -> Result<bool> {
        if self.speed >= self.settings.max_speed {
            return Ok(false);
        }
        let target = (self.speed + self.settings.speed_step).min(self.settings.max_speed);
        self.change_speed(target, channel)
    }

    /// Lower the speed by one step
    pub fn decrease_speed(&mut self, channel: &mut PanelChannel) -> Result<bool> {
        if self.speed <= self.settings.min_speed {
            return Ok(false);
        }
        let target = self
            .speed
            .saturating_sub(self.settings.speed_step)
            .max(self.settings.min_speed);
        self.change_speed(target, channel)
    }

    fn change_speed(&mut self, target: u32, channel: &mut PanelChannel) -> Result<bool> {
        match self.state {
            SpindleState::Stopped => {
                self.speed = target;
                Ok(true)
            }
            SpindleState::Running => {
                let previous = self.speed;
                let command = command_creator::spindle_run(self.direction, target)?;
                if !channel.submit(command, Some(Continuation::SpindleSpeed { previous }))? {
                    return Ok(false);
                }
                tracing::info!("Spindle speed {} -> {} rpm", previous, target);
                self.speed = target;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Resume after a speed change's outcome; a failure restores the old speed
    pub fn on_speed_outcome(&mut self, outcome: Outcome, previous: u32) {
        if outcome.is_failed() {
            tracing::warn!("Spindle speed change failed, back to {} rpm", previous);
            self.speed = previous;
        }
    }

    /// Flip the direction; only while stopped
    pub fn toggle_direction(&mut self) -> bool {
        if self.state != SpindleState::Stopped {
            return false;
        }
        self.direction = self.direction.reversed();
        tracing::info!("Spindle direction {:?}", self.direction);
        true
    }
}
