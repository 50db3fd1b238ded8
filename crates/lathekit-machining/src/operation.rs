//! Shared machinery for the multi-pass operation engines
//!
//! Each engine is a small state machine: `start` probes the channel and
//! captures the tool position as its origin, and every later step runs
//! from `on_outcome` when the previous leg's command completes. Exactly one
//! command is submitted per step.

use crate::continuation::{Continuation, PanelChannel};
use crate::spindle::{SpindleSequencer, SpindleState};
use lathekit_communication::{Command, Outcome};
use lathekit_core::{LogicError, ParameterError, Position, Result};
use std::fmt;

/// Which operation an engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Multi-pass threading
    Threading,
    /// Straight turning to a diameter
    Turning,
    /// Taper (cone) turning
    Taper,
}

impl OperationKind {
    /// The continuation tag this operation registers
    pub fn continuation(self) -> Continuation {
        match self {
            OperationKind::Threading => Continuation::Threading,
            OperationKind::Turning => Continuation::Turning,
            OperationKind::Taper => Continuation::Taper,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Threading => write!(f, "threading"),
            OperationKind::Turning => write!(f, "turning"),
            OperationKind::Taper => write!(f, "taper"),
        }
    }
}

/// What an engine may touch while it steps
pub struct MachineContext<'a> {
    /// Command channel
    pub channel: &'a mut PanelChannel,
    /// Spindle sequencer
    pub spindle: &'a mut SpindleSequencer,
    /// Tool position sampled this tick
    pub position: Position,
}

/// Contract shared by the operation engines
pub trait OperationEngine {
    /// Operator parameters
    type Params;

    /// The operation this engine runs
    fn kind(&self) -> OperationKind;

    /// Name of the current stage
    fn stage_name(&self) -> &'static str;

    /// Check if the engine is idle
    fn is_idle(&self) -> bool;

    /// Start from idle
    ///
    /// Returns `Ok(false)` when the engine is busy, the spindle is changing
    /// state or the channel refuses the admission probe.
    fn start(&mut self, params: Self::Params, ctx: &mut MachineContext<'_>) -> Result<bool>;

    /// Resume after the outcome of the engine's last command
    fn on_outcome(&mut self, outcome: Outcome, ctx: &mut MachineContext<'_>) -> Result<()>;

    /// Return to idle without submitting anything
    fn abort(&mut self);
}

/// Count of continuations an engine has registered and not yet received
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outstanding(usize);

impl Outstanding {
    /// Number still outstanding
    pub fn count(self) -> usize {
        self.0
    }

    /// Record a registration
    pub fn register(&mut self) {
        self.0 += 1;
    }

    /// Record a delivery; fails if nothing was outstanding
    pub fn resolve(&mut self, kind: OperationKind, outcome: Outcome) -> Result<()> {
        if self.0 == 0 {
            tracing::error!("{} received {} with nothing outstanding", kind, outcome);
            return Err(LogicError::UnexpectedOutcome {
                component: kind.to_string(),
                outcome: outcome.to_string(),
            }
            .into());
        }
        self.0 -= 1;
        Ok(())
    }
}

/// Submit one leg of an operation with the engine's continuation
///
/// Returns false (after logging) when the controller refuses the leg; the
/// caller must then return to idle.
pub fn submit_leg(
    ctx: &mut MachineContext<'_>,
    kind: OperationKind,
    outstanding: &mut Outstanding,
    command: Command,
) -> Result<bool> {
    if ctx.channel.submit(command.clone(), Some(kind.continuation()))? {
        outstanding.register();
        Ok(true)
    } else {
        tracing::warn!("{} leg refused: {}", kind, command);
        Ok(false)
    }
}

/// Submit the admission probe that opens an operation
pub fn submit_probe(
    ctx: &mut MachineContext<'_>,
    kind: OperationKind,
    outstanding: &mut Outstanding,
) -> Result<bool> {
    if ctx
        .channel
        .submit(Command::probe(), Some(kind.continuation()))?
    {
        outstanding.register();
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Check a requested spindle speed against the sequencer's limits
pub(crate) fn check_spindle_speed(ctx: &MachineContext<'_>, rpm: u32) -> ParamResult {
    let limits = ctx.spindle.settings();
    if (limits.min_speed..=limits.max_speed).contains(&rpm) {
        Ok(())
    } else {
        Err(ParameterError::out_of_range(
            "spindle_speed",
            rpm as f64,
            &format!("{}..={}", limits.min_speed, limits.max_speed),
        ))
    }
}

/// Start the spindle for an operation if it is stopped
pub(crate) fn engage_spindle(
    ctx: &mut MachineContext<'_>,
    kind: OperationKind,
    rpm: u32,
) -> Result<()> {
    if ctx.spindle.state() != SpindleState::Stopped {
        return Ok(());
    }
    ctx.spindle.set_speed(rpm)?;
    if !ctx.spindle.request_run(ctx.channel)? {
        tracing::warn!("{}: spindle start refused", kind);
    }
    Ok(())
}

/// Stop the spindle after an operation if it is running
pub(crate) fn release_spindle(ctx: &mut MachineContext<'_>, kind: OperationKind) -> Result<()> {
    if ctx.spindle.state() != SpindleState::Running {
        return Ok(());
    }
    if !ctx.spindle.request_stop(ctx.channel)? {
        tracing::warn!("{}: spindle stop refused", kind);
    }
    Ok(())
}

/// Depth-of-cut selection shared by turning and taper
///
/// Full rough passes are taken while at least a rough plus a finish pass
/// remain. What is left after that is split into one intermediate pass
/// leaving exactly the finish depth, then the finish pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutPlan {
    /// Total depth to remove
    pub total: f64,
    /// Depth removed by a rough pass
    pub rough: f64,
    /// Depth left for the finish pass
    pub finish: f64,
}

/// Slack allowed when deciding the last pass is the finish pass
pub const FINISH_TOLERANCE: f64 = 0.001;

/// One selected pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextCut {
    /// Accumulated depth after this pass
    pub depth: f64,
    /// Whether this is the finish pass
    pub finish: bool,
    /// Whether this pass used up a rough pass number
    pub rough: bool,
}

impl CutPlan {
    /// Select the pass following `accumulated`, or `None` once the total
    /// is reached; `pass` is the 1-based number of the next rough pass
    pub fn next_cut(&self, accumulated: f64, pass: u32) -> Option<NextCut> {
        let diff = self.total - accumulated;
        if diff <= 0.0 {
            return None;
        }

        if diff >= self.rough + self.finish {
            Some(NextCut {
                depth: pass as f64 * self.rough,
                finish: false,
                rough: true,
            })
        } else if diff <= self.finish + FINISH_TOLERANCE {
            Some(NextCut {
                depth: self.total,
                finish: true,
                rough: false,
            })
        } else {
            Some(NextCut {
                depth: self.total - self.finish,
                finish: false,
                rough: false,
            })
        }
    }
}

type ParamResult = std::result::Result<(), ParameterError>;

/// Check a parameter is finite and strictly positive
pub(crate) fn require_positive(name: &str, value: f64) -> ParamResult {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ParameterError::out_of_range(name, value, "> 0"))
    }
}

/// Check a parameter is finite and not zero
pub(crate) fn require_nonzero(name: &str, value: f64) -> ParamResult {
    if value.is_finite() && value != 0.0 {
        Ok(())
    } else {
        Err(ParameterError::InvalidValue {
            name: name.to_string(),
            reason: "must be a non-zero number".to_string(),
        })
    }
}

/// Check a feed is usable
pub(crate) fn require_feed(name: &str, value: u32) -> ParamResult {
    if value > 0 {
        Ok(())
    } else {
        Err(ParameterError::out_of_range(name, 0.0, "> 0"))
    }
}
