//! Simulated motion controller
//!
//! A scriptable in-process stand-in for the external controller. It keeps
//! one queued line busy at a time, applies motion words to a machine
//! position as soon as a line is accepted, and reports completion after a
//! configurable number of polls. All state lives behind a shared handle so
//! tests and the headless binary can inspect and steer it while the
//! channel owns the controller.

use crate::communication::{ControllerOutcome, MotionController};
use crate::firmware::grbl::RealtimeSignal;
use lathekit_core::{shared, Axis, Shared};

/// Error code reported for a line scripted to fail
pub const SIMULATED_FAULT_CODE: i32 = 20;
/// Error code reported for g-code sent while alarmed
pub const LOCKED_OUT_CODE: i32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Busy {
    remaining: u32,
    fault: bool,
    jog: bool,
}

/// Observable and scriptable controller state
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedState {
    /// Every accepted line, newline included
    pub lines: Vec<String>,
    /// Every realtime byte received
    pub realtime: Vec<u8>,
    /// Machine position in mm (Y in revolutions)
    pub machine: [f64; 3],
    /// Active coordinate offset
    pub offset: [f64; 3],
    /// Steps per unit for each axis
    pub steps_per_mm: [f64; 3],
    /// Whether queued lines are accepted
    pub accept_lines: bool,
    /// Polls a line stays pending before it completes
    pub completion_delay: u32,
    /// Fault the next accepted line
    pub fail_next: bool,
    /// Alarm lock active
    pub alarm: bool,
    /// Feed hold active
    pub hold: bool,
    /// Last parser error code
    pub last_error: i32,
    /// Spindle M-code and speed while turning
    pub spindle: Option<(u8, u32)>,
    busy: Option<Busy>,
}

impl SimulatedState {
    fn new(steps_per_mm: [f64; 3]) -> Self {
        Self {
            lines: Vec::new(),
            realtime: Vec::new(),
            machine: [0.0; 3],
            offset: [0.0; 3],
            steps_per_mm,
            accept_lines: true,
            completion_delay: 0,
            fail_next: false,
            alarm: false,
            hold: false,
            last_error: 0,
            spindle: None,
            busy: None,
        }
    }

    /// Work position of an axis
    pub fn work(&self, axis: Axis) -> f64 {
        self.machine[axis.index()] - self.offset[axis.index()]
    }

    /// Accepted lines without their terminators
    pub fn sent_lines(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.trim_end_matches('\n')).collect()
    }

    /// Check if a line is executing
    pub fn is_busy(&self) -> bool {
        self.busy.is_some()
    }

    /// Enter the alarm lock, aborting any executing line
    pub fn raise_alarm(&mut self) {
        self.alarm = true;
        self.busy = None;
        self.spindle = None;
    }

    fn execute(&mut self, text: &str) -> bool {
        if text == "$X" {
            self.alarm = false;
            return true;
        }
        if self.alarm {
            self.last_error = LOCKED_OUT_CODE;
            return false;
        }

        if let Some(rest) = text.strip_prefix("G92") {
            for (letter, _) in parse_words(rest) {
                if let Some(i) = axis_index(letter) {
                    self.offset[i] = self.machine[i];
                }
            }
        } else if let Some(rest) = text.strip_prefix("$J=G91") {
            for (letter, value) in parse_words(rest) {
                if let Some(i) = axis_index(letter) {
                    self.machine[i] += value;
                }
            }
        } else if let Some(rest) = text.strip_prefix("G0").or_else(|| text.strip_prefix("G1")) {
            for (letter, value) in parse_words(rest) {
                if let Some(i) = axis_index(letter) {
                    self.machine[i] = value + self.offset[i];
                }
            }
        } else if text.starts_with("M3") || text.starts_with("M4") {
            let m_code = if text.starts_with("M3") { 3 } else { 4 };
            let rpm = parse_words(&text[2..])
                .into_iter()
                .find(|(letter, _)| *letter == 'S')
                .map(|(_, value)| value as u32)
                .unwrap_or(0);
            self.spindle = Some((m_code, rpm));
        } else if text == "M5" {
            self.spindle = None;
        }
        true
    }
}

fn axis_index(letter: char) -> Option<usize> {
    Axis::ALL
        .iter()
        .find(|axis| axis.letter() == letter)
        .map(|axis| axis.index())
}

/// Split a run of address words (`X1.000Z-2.000F100`) into letter/value pairs
fn parse_words(text: &str) -> Vec<(char, f64)> {
    let mut words = Vec::new();
    let mut current: Option<(char, usize)> = None;

    let mut flush = |current: Option<(char, usize)>, end: usize| {
        if let Some((letter, start)) = current {
            if let Ok(value) = text[start..end].trim().parse::<f64>() {
                words.push((letter, value));
            }
        }
    };

    for (i, c) in text.char_indices() {
        if c.is_ascii_alphabetic() {
            flush(current.take(), i);
            current = Some((c.to_ascii_uppercase(), i + 1));
        }
    }
    flush(current, text.len());

    words
}

/// Handle for inspecting and scripting a [`SimulatedController`]
pub type SimulatedHandle = Shared<SimulatedState>;

/// In-process motion controller
pub struct SimulatedController {
    state: SimulatedHandle,
}

impl SimulatedController {
    /// Create a controller at the machine origin
    pub fn new(steps_per_mm: [f64; 3]) -> Self {
        Self {
            state: shared(SimulatedState::new(steps_per_mm)),
        }
    }

    /// Shared handle onto the controller state
    pub fn handle(&self) -> SimulatedHandle {
        self.state.clone()
    }
}

impl MotionController for SimulatedController {
    fn submit_line(&mut self, line: &str) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.accept_lines || state.busy.is_some() {
            return false;
        }

        let text = line.trim_end_matches('\n');
        if text.is_empty() {
            return true;
        }

        state.lines.push(line.to_string());
        state.last_error = 0;
        if !state.execute(text) {
            return true;
        }
        let fault = std::mem::take(&mut state.fail_next);
        state.busy = Some(Busy {
            remaining: state.completion_delay,
            fault,
            jog: text.starts_with("$J="),
        });
        true
    }

    fn submit_realtime(&mut self, signal: u8) {
        let mut state = self.state.borrow_mut();
        state.realtime.push(signal);
        match RealtimeSignal::from_byte(signal) {
            Some(RealtimeSignal::FeedHold) => state.hold = true,
            Some(RealtimeSignal::CycleStart) => state.hold = false,
            Some(RealtimeSignal::JogCancel) => {
                if state.busy.is_some_and(|b| b.jog) {
                    state.busy = None;
                }
            }
            Some(RealtimeSignal::SoftReset) => {
                state.busy = None;
                state.hold = false;
            }
            Some(RealtimeSignal::StatusReport) | None => {}
        }
    }

    fn poll_outcome(&mut self) -> ControllerOutcome {
        let mut state = self.state.borrow_mut();
        let hold = state.hold;
        let last_error = state.last_error;
        let Some(busy) = state.busy.as_mut() else {
            return if last_error != 0 {
                ControllerOutcome::Faulted
            } else {
                ControllerOutcome::Ok
            };
        };

        if hold {
            return ControllerOutcome::Pending;
        }
        if busy.remaining > 0 {
            busy.remaining -= 1;
            return ControllerOutcome::Pending;
        }

        let fault = busy.fault;
        state.busy = None;
        if fault {
            if state.last_error == 0 {
                state.last_error = SIMULATED_FAULT_CODE;
            }
            ControllerOutcome::Faulted
        } else {
            ControllerOutcome::Ok
        }
    }

    fn raw_position(&self) -> [i32; 3] {
        let state = self.state.borrow();
        let mut steps = [0; 3];
        for (i, step) in steps.iter_mut().enumerate() {
            *step = (state.machine[i] * state.steps_per_mm[i]).round() as i32;
        }
        steps
    }

    fn current_offset(&self) -> [f64; 3] {
        self.state.borrow().offset
    }

    fn last_error_code(&self) -> i32 {
        self.state.borrow().last_error
    }

    fn state_code(&self) -> u16 {
        let state = self.state.borrow();
        match state.busy {
            _ if state.alarm => 1,
            _ if state.hold => 16,
            Some(busy) if busy.jog => 32,
            Some(_) => 8,
            None => 0,
        }
    }
}
