//! Operator machine controls
//!
//! Feed-hold toggle, hand-wheel jogging, axis zeroing and file selection.
//! None of these register a continuation: the controller's outcome for
//! them is only visible through the machine state.

use crate::continuation::PanelChannel;
use lathekit_communication::{command_creator, Command, RealtimeSignal};
use lathekit_core::{Axis, MachineState, ParameterError, Result};
use std::fmt;

/// Feed-hold button state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldToggle {
    /// Pressing holds the feed
    #[default]
    Hold,
    /// Pressing resumes
    Resume,
    /// Pressing clears the alarm
    Clear,
}

impl HoldToggle {
    /// Button caption
    pub fn label(self) -> &'static str {
        match self {
            HoldToggle::Hold => "||",
            HoldToggle::Resume => ">",
            HoldToggle::Clear => "Clr",
        }
    }

    /// Track the controller's machine state
    pub fn on_machine_state(&mut self, state: MachineState) {
        if state.is_alarm() {
            *self = HoldToggle::Clear;
        }
    }

    /// Act on a press
    ///
    /// Hold and resume are realtime signals and always go through. Clearing
    /// the alarm is a queued `$X`; the button only changes when it is
    /// admitted.
    pub fn press(&mut self, channel: &mut PanelChannel) -> Result<bool> {
        match self {
            HoldToggle::Hold => {
                channel.submit(Command::realtime(RealtimeSignal::FeedHold), None)?;
                *self = HoldToggle::Resume;
                Ok(true)
            }
            HoldToggle::Resume => {
                channel.submit(Command::realtime(RealtimeSignal::CycleStart), None)?;
                *self = HoldToggle::Hold;
                Ok(true)
            }
            HoldToggle::Clear => {
                if !channel.submit(command_creator::clear_alarm()?, None)? {
                    return Ok(false);
                }
                tracing::info!("Alarm clear requested");
                *self = HoldToggle::Hold;
                Ok(true)
            }
        }
    }
}

impl fmt::Display for HoldToggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Jog distance per encoder detent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogStep {
    /// 1 mm
    One,
    /// 0.1 mm
    Tenth,
    /// 0.01 mm
    Hundredth,
}

impl JogStep {
    /// Distance per detent (mm)
    pub fn distance(self) -> f64 {
        match self {
            JogStep::One => 1.0,
            JogStep::Tenth => 0.1,
            JogStep::Hundredth => 0.01,
        }
    }
}

/// Hand-wheel jog accumulator
#[derive(Debug, Clone, Default)]
pub struct JogWheel {
    axis: Option<Axis>,
    step: Option<JogStep>,
    detents: i32,
}

impl JogWheel {
    /// Create a wheel with nothing selected
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the jogged axis; `None` deselects
    pub fn select_axis(&mut self, axis: Option<Axis>) {
        self.axis = axis;
    }

    /// Select the distance per detent; `None` deselects
    pub fn select_step(&mut self, step: Option<JogStep>) {
        self.step = step;
    }

    /// Selected axis
    pub fn axis(&self) -> Option<Axis> {
        self.axis
    }

    /// Selected step
    pub fn step(&self) -> Option<JogStep> {
        self.step
    }

    /// Detents waiting to be sent
    pub fn pending_detents(&self) -> i32 {
        self.detents
    }

    /// Add encoder detents; discarded unless an axis and a step are selected
    pub fn add_detents(&mut self, detents: i32) {
        if self.axis.is_none() || self.step.is_none() {
            self.detents = 0;
            return;
        }
        self.detents = self.detents.saturating_add(detents);
    }

    /// Submit the accumulated jog, clearing it once admitted
    pub fn submit_pending(&mut self, channel: &mut PanelChannel, feed: u32) -> Result<bool> {
        let (Some(axis), Some(step)) = (self.axis, self.step) else {
            self.detents = 0;
            return Ok(false);
        };
        if self.detents == 0 {
            return Ok(false);
        }

        let distance = self.detents as f64 * step.distance();
        let command = command_creator::jog(axis, distance, feed)?;
        if !channel.submit(command, None)? {
            return Ok(false);
        }
        tracing::debug!("Jog {} by {:.3}", axis, distance);
        self.detents = 0;
        Ok(true)
    }
}

/// Zero an axis at the current position
pub fn zero_axis(channel: &mut PanelChannel, axis: Axis) -> Result<bool> {
    let admitted = channel.submit(command_creator::zero_axis(axis)?, None)?;
    if admitted {
        tracing::info!("Zeroed {}", axis);
    }
    Ok(admitted)
}

/// Select the controller's program file
pub fn select_file(channel: &mut PanelChannel, name: &str) -> Result<bool> {
    if name.trim().is_empty() {
        return Err(ParameterError::InvalidValue {
            name: "file".to_string(),
            reason: "file name is empty".to_string(),
        }
        .into());
    }
    let admitted = channel.submit(command_creator::select_file(name)?, None)?;
    if admitted {
        tracing::info!("Selected file {}", name);
    }
    Ok(admitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lathekit_communication::{SimulatedController, SimulatedHandle};

    fn setup() -> (PanelChannel, SimulatedHandle) {
        let sim = SimulatedController::new([100.0; 3]);
        let handle = sim.handle();
        (PanelChannel::new(Box::new(sim)), handle)
    }

    #[test]
    fn test_hold_cycle() {
        let (mut channel, handle) = setup();
        let mut toggle = HoldToggle::default();
        assert_eq!(toggle.label(), "||");

        toggle.press(&mut channel).unwrap();
        assert_eq!(toggle, HoldToggle::Resume);
        toggle.press(&mut channel).unwrap();
        assert_eq!(toggle, HoldToggle::Hold);
        assert_eq!(handle.borrow().realtime, vec![b'!', b'~']);
    }

    #[test]
    fn test_clear_waits_for_admission() {
        let (mut channel, handle) = setup();
        let mut toggle = HoldToggle::default();
        toggle.on_machine_state(MachineState::Alarm);
        assert_eq!(toggle.label(), "Clr");

        handle.borrow_mut().accept_lines = false;
        assert!(!toggle.press(&mut channel).unwrap());
        assert_eq!(toggle, HoldToggle::Clear);

        handle.borrow_mut().accept_lines = true;
        assert!(toggle.press(&mut channel).unwrap());
        assert_eq!(toggle, HoldToggle::Hold);
        assert_eq!(handle.borrow().sent_lines(), vec!["$X"]);
    }

    #[test]
    fn test_jog_needs_both_selections() {
        let (mut channel, handle) = setup();
        let mut wheel = JogWheel::new();
        wheel.select_axis(Some(Axis::Z));
        wheel.add_detents(3);
        assert_eq!(wheel.pending_detents(), 0);

        wheel.select_step(Some(JogStep::Tenth));
        wheel.add_detents(-2);
        wheel.add_detents(-1);
        assert!(wheel.submit_pending(&mut channel, 500).unwrap());
        assert_eq!(wheel.pending_detents(), 0);
        assert_eq!(handle.borrow().sent_lines(), vec!["$J=G91Z-0.300F500"]);
    }

    #[test]
    fn test_empty_file_name_rejected() {
        let (mut channel, handle) = setup();
        let err = select_file(&mut channel, "  ").unwrap_err();
        assert!(err.is_parameter_error());
        assert!(handle.borrow().sent_lines().is_empty());
    }
}
