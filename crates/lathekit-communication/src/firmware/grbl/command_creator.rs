//! GRBL command creator
//!
//! Builds the queued command lines the panel sends. Coordinates are
//! formatted with three decimals and feeds as integers; every builder
//! returns a validated [`Command`].

use crate::communication::Command;
use lathekit_core::{Axis, GcodeError, Result, SpindleDirection};

fn push_word(line: &mut String, word: char, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(GcodeError::NonFiniteValue { word }.into());
    }
    line.push(word);
    line.push_str(&format!("{:.3}", value));
    Ok(())
}

fn motion(code: &str, words: &[(Axis, f64)], feed: Option<u32>) -> Result<Command> {
    let mut line = String::from(code);
    for &(axis, value) in words {
        push_word(&mut line, axis.letter(), value)?;
    }
    if let Some(feed) = feed {
        line.push_str(&format!("F{}", feed));
    }
    Command::line(line)
}

/// Rapid positioning move (`G0`)
pub fn rapid(words: &[(Axis, f64)]) -> Result<Command> {
    motion("G0", words, None)
}

/// Linear feed move (`G1`)
pub fn feed(words: &[(Axis, f64)], feed: u32) -> Result<Command> {
    motion("G1", words, Some(feed))
}

/// Start the spindle (`M3`/`M4`) at the given speed
pub fn spindle_run(direction: SpindleDirection, rpm: u32) -> Result<Command> {
    Command::line(format!("M{} S{}", direction.m_code(), rpm))
}

/// Stop the spindle (`M5`)
pub fn spindle_stop() -> Result<Command> {
    Command::line("M5")
}

/// Set the current position of one axis as its origin
pub fn zero_axis(axis: Axis) -> Result<Command> {
    Command::line(format!("G92{}0", axis.letter()))
}

/// Run a program file stored on the controller
pub fn select_file(name: &str) -> Result<Command> {
    Command::line(format!("$F={}", name))
}

/// Incremental jog of one axis
pub fn jog(axis: Axis, distance: f64, feed: u32) -> Result<Command> {
    let mut line = String::from("$J=G91");
    push_word(&mut line, axis.letter(), distance)?;
    line.push_str(&format!("F{}", feed));
    Command::line(line)
}

/// Clear an alarm lock
pub fn clear_alarm() -> Result<Command> {
    Command::line("$X")
}
