//! Multi-pass threading
//!
//! The spindle is driven as the Y axis (in revolutions) so the lead along Z
//! stays synchronised with rotation. Each pass plunges along the flank
//! angle to a depth that grows with the pass number, cuts the thread, runs
//! an exit taper of a few extra revolutions, retracts and returns. Once the
//! full depth is reached a fixed number of spring passes repeat it.

use crate::operation::{
    require_feed, require_nonzero, require_positive, submit_leg, submit_probe, MachineContext,
    OperationEngine, OperationKind, Outstanding,
};
use crate::spindle::SpindleState;
use lathekit_communication::{command_creator, Command, Outcome};
use lathekit_core::{Axis, ParameterError, Result};
use serde::{Deserialize, Serialize};

/// Extra spindle revolutions of the exit taper
pub const EXIT_REVOLUTIONS: f64 = 5.0;
/// Radial retract after each pass (mm)
pub const RETRACT: f64 = 0.5;
/// Thread depth per mm of pitch for a 60 degree thread
pub const DEPTH_PER_PITCH: f64 = 0.61;

/// Standard thread depth for a pitch
pub fn depth_for_pitch(pitch: f64) -> f64 {
    DEPTH_PER_PITCH * pitch
}

/// Threading parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadingParams {
    /// Thread pitch (mm)
    pub pitch: f64,
    /// Thread length; the sign gives the feed direction along Z (mm)
    pub length: f64,
    /// First depth of cut; positive for external threads, negative for
    /// internal (mm)
    pub first_cut: f64,
    /// Full thread depth (mm)
    pub depth: f64,
    /// Infeed flank angle (degrees)
    pub angle: f64,
    /// Depth regression; larger values shrink later passes faster
    pub regression: f64,
    /// Feed (mm/min)
    pub feed: u32,
    /// Passes repeated at full depth
    pub spring_passes: u32,
}

impl Default for ThreadingParams {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            length: -10.0,
            first_cut: 0.1,
            depth: depth_for_pitch(1.0),
            angle: 30.0,
            regression: 1.1,
            feed: 1000,
            spring_passes: 2,
        }
    }
}

impl ThreadingParams {
    /// Set the pitch and the matching standard depth
    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = pitch;
        self.depth = depth_for_pitch(pitch);
        self
    }

    /// Validate the parameters
    pub fn validate(&self) -> std::result::Result<(), ParameterError> {
        require_positive("pitch", self.pitch)?;
        require_nonzero("length", self.length)?;
        require_nonzero("first_cut", self.first_cut)?;
        require_positive("depth", self.depth)?;
        if !(self.angle.is_finite() && (0.0..=60.0).contains(&self.angle)) {
            return Err(ParameterError::out_of_range("angle", self.angle, "0..=60"));
        }
        if !(self.regression.is_finite() && self.regression >= 1.0) {
            return Err(ParameterError::out_of_range(
                "regression",
                self.regression,
                ">= 1",
            ));
        }
        require_feed("feed", self.feed)
    }

    /// Depth of cut for a 1-based pass number, before clamping
    pub fn pass_depth(&self, pass: u32) -> f64 {
        self.first_cut.abs() * (pass as f64).powf(1.0 / self.regression)
    }
}

/// Threading stage; names the leg whose outcome is awaited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadingStage {
    /// Not running
    #[default]
    Idle,
    /// Admission probe
    Start,
    /// Plunge to the pass depth
    Position,
    /// Synchronised cut along Z
    Cut,
    /// Exit taper
    ExitTaper,
    /// Radial retract
    Retract,
    /// Return to the start Z
    Return,
}

impl ThreadingStage {
    fn name(self) -> &'static str {
        match self {
            ThreadingStage::Idle => "idle",
            ThreadingStage::Start => "start",
            ThreadingStage::Position => "position",
            ThreadingStage::Cut => "cut",
            ThreadingStage::ExitTaper => "exit taper",
            ThreadingStage::Retract => "retract",
            ThreadingStage::Return => "return",
        }
    }
}

/// Threading engine
#[derive(Debug, Clone, Default)]
pub struct ThreadingEngine {
    params: ThreadingParams,
    stage: ThreadingStage,
    outstanding: Outstanding,
    direction: f64,
    start_x: f64,
    start_z: f64,
    target_y: f64,
    target_z: f64,
    pass: u32,
    spring_pass: u32,
    depth: f64,
}

impl ThreadingEngine {
    /// Create an idle engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage
    pub fn stage(&self) -> ThreadingStage {
        self.stage
    }

    /// Depth of the pass in progress (mm)
    pub fn current_depth(&self) -> f64 {
        self.depth
    }

    /// Passes started so far
    pub fn passes(&self) -> u32 {
        self.pass.saturating_sub(1)
    }

    fn begin_pass(&mut self, ctx: &mut MachineContext<'_>) -> Result<()> {
        if self.spring_pass > self.params.spring_passes {
            tracing::info!("Threading finished after {} passes", self.passes());
            self.stage = ThreadingStage::Idle;
            return Ok(());
        }

        let mut doc = self.params.pass_depth(self.pass);
        self.pass += 1;
        if doc >= self.params.depth {
            doc = self.params.depth;
            self.spring_pass += 1;
        }
        self.depth = doc;

        let x = self.start_x + doc * self.direction;
        self.target_z = self.start_z - doc * self.params.angle.to_radians().tan();
        tracing::debug!("Threading pass {} at depth {:.3}", self.passes(), doc);
        self.leg(
            ctx,
            command_creator::rapid(&[(Axis::X, x), (Axis::Z, self.target_z)]),
            ThreadingStage::Position,
        )
    }

    fn leg(
        &mut self,
        ctx: &mut MachineContext<'_>,
        command: Result<Command>,
        next: ThreadingStage,
    ) -> Result<()> {
        let command = command.inspect_err(|_| self.stage = ThreadingStage::Idle)?;
        self.stage = if submit_leg(ctx, self.kind(), &mut self.outstanding, command)? {
            next
        } else {
            ThreadingStage::Idle
        };
        Ok(())
    }
}

impl OperationEngine for ThreadingEngine {
    type Params = ThreadingParams;

    fn kind(&self) -> OperationKind {
        OperationKind::Threading
    }

    fn stage_name(&self) -> &'static str {
        self.stage.name()
    }

    fn is_idle(&self) -> bool {
        self.stage == ThreadingStage::Idle
    }

    fn start(&mut self, params: ThreadingParams, ctx: &mut MachineContext<'_>) -> Result<bool> {
        if !self.is_idle() {
            return Ok(false);
        }
        params.validate()?;

        // The spindle is an axis while threading
        if ctx.spindle.state() != SpindleState::Stopped {
            tracing::warn!("Threading needs the spindle stopped");
            return Ok(false);
        }

        if !submit_probe(ctx, self.kind(), &mut self.outstanding)? {
            return Ok(false);
        }

        let pos = ctx.position;
        self.params = params;
        self.direction = if params.first_cut > 0.0 { -1.0 } else { 1.0 };
        self.start_x = pos.x;
        self.start_z = pos.z;
        self.target_y = pos.y;
        self.target_z = pos.z;
        self.pass = 1;
        self.spring_pass = 0;
        self.depth = 0.0;
        self.stage = ThreadingStage::Start;

        tracing::info!(
            "Threading started: pitch {} length {} depth {} from {}",
            params.pitch,
            params.length,
            params.depth,
            pos
        );
        Ok(true)
    }

    fn on_outcome(&mut self, outcome: Outcome, ctx: &mut MachineContext<'_>) -> Result<()> {
        self.outstanding.resolve(self.kind(), outcome)?;

        if self.is_idle() {
            tracing::debug!("Threading absorbed {} after abort", outcome);
            return Ok(());
        }
        if outcome.is_failed() {
            tracing::warn!("Threading stopped: {} leg failed", self.stage.name());
            self.stage = ThreadingStage::Idle;
            return Ok(());
        }

        let p = self.params;
        match self.stage {
            ThreadingStage::Start | ThreadingStage::Return => self.begin_pass(ctx),
            ThreadingStage::Position => {
                self.target_z += p.length;
                self.target_y += (p.length / p.pitch).abs();
                self.leg(
                    ctx,
                    command_creator::feed(
                        &[(Axis::Y, self.target_y), (Axis::Z, self.target_z)],
                        p.feed,
                    ),
                    ThreadingStage::Cut,
                )
            }
            ThreadingStage::Cut => {
                self.target_y = self.target_y.trunc() + EXIT_REVOLUTIONS;
                self.leg(
                    ctx,
                    command_creator::feed(&[(Axis::Y, self.target_y)], p.feed),
                    ThreadingStage::ExitTaper,
                )
            }
            ThreadingStage::ExitTaper => {
                let x = self.start_x - RETRACT * self.direction;
                self.leg(
                    ctx,
                    command_creator::rapid(&[(Axis::X, x)]),
                    ThreadingStage::Retract,
                )
            }
            ThreadingStage::Retract => {
                self.target_z = self.start_z;
                self.leg(
                    ctx,
                    command_creator::rapid(&[(Axis::Z, self.start_z)]),
                    ThreadingStage::Return,
                )
            }
            ThreadingStage::Idle => Ok(()),
        }
    }

    fn abort(&mut self) {
        if !self.is_idle() {
            tracing::info!("Threading aborted in {} stage", self.stage.name());
        }
        self.stage = ThreadingStage::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_for_pitch() {
        assert!((depth_for_pitch(1.5) - 0.915).abs() < 1e-12);
        let params = ThreadingParams::default().with_pitch(2.0);
        assert!((params.depth - 1.22).abs() < 1e-12);
    }

    #[test]
    fn test_pass_depth_grows_with_regression() {
        let params = ThreadingParams::default();
        let depths: Vec<f64> = (1..=8).map(|k| params.pass_depth(k)).collect();
        assert!((depths[0] - 0.1).abs() < 1e-12);
        assert!(depths.windows(2).all(|w| w[1] > w[0]));
        assert!(depths[6] < params.depth);
        assert!(depths[7] >= params.depth);
    }

    #[test]
    fn test_validation() {
        let params = ThreadingParams {
            regression: 0.9,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ThreadingParams {
            pitch: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        assert!(ThreadingParams::default().validate().is_ok());
    }
}
