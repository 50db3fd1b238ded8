//! Taper (cone) turning
//!
//! The cone angle and length give the total depth to remove; passes follow
//! the same depth selection as straight turning. Each pass cuts a two-axis
//! line back to the start diameter so the material comes off as a wedge.

use crate::operation::{
    check_spindle_speed, engage_spindle, release_spindle, require_feed, require_nonzero,
    require_positive, submit_leg, submit_probe, CutPlan, MachineContext, OperationEngine,
    OperationKind, Outstanding,
};
use crate::spindle::SpindleState;
use lathekit_communication::{command_creator, Command, Outcome};
use lathekit_core::{Axis, ParameterError, Result};
use serde::{Deserialize, Serialize};

/// Taper turning parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaperParams {
    /// Cone half angle; positive for external cones (degrees)
    pub cone_angle: f64,
    /// Cone length; the sign gives the direction along Z (mm)
    pub length: f64,
    /// Depth removed per rough pass (mm)
    pub rough_pass_depth: f64,
    /// Depth left for the finish pass (mm)
    pub finish_pass_depth: f64,
    /// Radial retract before returning (mm)
    pub retract: f64,
    /// Rough feed (mm/min)
    pub rough_feed: u32,
    /// Finish feed (mm/min)
    pub finish_feed: u32,
    /// Spindle speed used when the spindle is started for the cut (rpm)
    pub spindle_speed: u32,
}

impl Default for TaperParams {
    fn default() -> Self {
        Self {
            cone_angle: 10.0,
            length: -10.0,
            rough_pass_depth: 0.2,
            finish_pass_depth: 0.1,
            retract: 0.1,
            rough_feed: 200,
            finish_feed: 80,
            spindle_speed: 1000,
        }
    }
}

impl TaperParams {
    /// Validate the parameters
    pub fn validate(&self) -> std::result::Result<(), ParameterError> {
        require_nonzero("cone_angle", self.cone_angle)?;
        if self.cone_angle.abs() >= 90.0 {
            return Err(ParameterError::out_of_range(
                "cone_angle",
                self.cone_angle,
                "-90 < angle < 90",
            ));
        }
        require_nonzero("length", self.length)?;
        require_positive("rough_pass_depth", self.rough_pass_depth)?;
        if !(self.finish_pass_depth.is_finite() && self.finish_pass_depth >= 0.0) {
            return Err(ParameterError::out_of_range(
                "finish_pass_depth",
                self.finish_pass_depth,
                ">= 0",
            ));
        }
        if !(self.retract.is_finite() && self.retract >= 0.0) {
            return Err(ParameterError::out_of_range("retract", self.retract, ">= 0"));
        }
        require_feed("rough_feed", self.rough_feed)?;
        require_feed("finish_feed", self.finish_feed)
    }

    /// Total depth removed by the cone (mm)
    pub fn total_depth(&self) -> f64 {
        self.cone_angle.abs().to_radians().sin() * self.length.abs()
    }
}

/// Taper stage; names the leg whose outcome is awaited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaperStage {
    /// Not running
    #[default]
    Idle,
    /// Admission probe and spindle start
    Start,
    /// Move to the pass start diameter
    Position,
    /// Two-axis cut
    Cut,
    /// Radial retract
    Retract,
    /// Return to the start Z
    Return,
}

impl TaperStage {
    fn name(self) -> &'static str {
        match self {
            TaperStage::Idle => "idle",
            TaperStage::Start => "start",
            TaperStage::Position => "position",
            TaperStage::Cut => "cut",
            TaperStage::Retract => "retract",
            TaperStage::Return => "return",
        }
    }
}

/// Taper turning engine
#[derive(Debug, Clone, Default)]
pub struct TaperEngine {
    params: TaperParams,
    stage: TaperStage,
    outstanding: Outstanding,
    direction: f64,
    cos_angle: f64,
    sin_angle: f64,
    start_x: f64,
    start_z: f64,
    accumulated: f64,
    pass: u32,
    feed: u32,
}

impl TaperEngine {
    /// Create an idle engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage
    pub fn stage(&self) -> TaperStage {
        self.stage
    }

    /// Depth removed once the current pass completes (mm)
    pub fn accumulated_depth(&self) -> f64 {
        self.accumulated
    }

    fn begin_pass(&mut self, ctx: &mut MachineContext<'_>) -> Result<()> {
        let plan = CutPlan {
            total: self.params.total_depth(),
            rough: self.params.rough_pass_depth,
            finish: self.params.finish_pass_depth,
        };

        let Some(cut) = plan.next_cut(self.accumulated, self.pass) else {
            tracing::info!("Taper finished at depth {:.3}", self.accumulated);
            self.stage = TaperStage::Idle;
            return release_spindle(ctx, self.kind());
        };

        if cut.rough {
            self.pass += 1;
        }
        if cut.finish {
            self.feed = self.params.finish_feed;
        }
        self.accumulated = cut.depth;
        let x = self.start_x + self.accumulated * self.direction / self.cos_angle / 2.0;
        tracing::debug!("Taper pass to depth {:.3}", self.accumulated);
        self.leg(
            ctx,
            command_creator::rapid(&[(Axis::X, x)]),
            TaperStage::Position,
        )
    }

    fn leg(
        &mut self,
        ctx: &mut MachineContext<'_>,
        command: Result<Command>,
        next: TaperStage,
    ) -> Result<()> {
        let command = command.inspect_err(|_| self.stage = TaperStage::Idle)?;
        self.stage = if submit_leg(ctx, self.kind(), &mut self.outstanding, command)? {
            next
        } else {
            TaperStage::Idle
        };
        Ok(())
    }
}

impl OperationEngine for TaperEngine {
    type Params = TaperParams;

    fn kind(&self) -> OperationKind {
        OperationKind::Taper
    }

    fn stage_name(&self) -> &'static str {
        self.stage.name()
    }

    fn is_idle(&self) -> bool {
        self.stage == TaperStage::Idle
    }

    fn start(&mut self, params: TaperParams, ctx: &mut MachineContext<'_>) -> Result<bool> {
        if !self.is_idle() {
            return Ok(false);
        }
        params.validate()?;
        check_spindle_speed(ctx, params.spindle_speed)?;
        if ctx.spindle.state().is_transitioning() {
            return Ok(false);
        }

        if !submit_probe(ctx, self.kind(), &mut self.outstanding)? {
            return Ok(false);
        }

        let pos = ctx.position;
        let angle = params.cone_angle.to_radians();
        self.params = params;
        self.direction = if params.cone_angle > 0.0 { -1.0 } else { 1.0 };
        self.cos_angle = angle.cos();
        self.sin_angle = angle.abs().sin();
        self.start_x = pos.x;
        self.start_z = pos.z;
        self.accumulated = 0.0;
        self.pass = 1;
        self.feed = params.rough_feed;
        self.stage = TaperStage::Start;
        tracing::info!(
            "Taper started: angle {} length {} depth {:.3} from {}",
            params.cone_angle,
            params.length,
            params.total_depth(),
            pos
        );

        engage_spindle(ctx, self.kind(), params.spindle_speed)?;
        Ok(true)
    }

    fn on_outcome(&mut self, outcome: Outcome, ctx: &mut MachineContext<'_>) -> Result<()> {
        self.outstanding.resolve(self.kind(), outcome)?;

        if self.is_idle() {
            tracing::debug!("Taper absorbed {} after abort", outcome);
            return Ok(());
        }
        if outcome.is_failed() {
            tracing::warn!("Taper stopped: {} leg failed", self.stage.name());
            self.stage = TaperStage::Idle;
            return Ok(());
        }

        match self.stage {
            TaperStage::Start => {
                if ctx.spindle.state() != SpindleState::Running {
                    tracing::warn!("Taper stopped: spindle is {}", ctx.spindle.state());
                    self.stage = TaperStage::Idle;
                    return Ok(());
                }
                self.begin_pass(ctx)
            }
            TaperStage::Return => self.begin_pass(ctx),
            TaperStage::Position => {
                let travel = self.accumulated / self.sin_angle;
                let z = if self.params.length < 0.0 {
                    self.start_z - travel
                } else {
                    self.start_z + travel
                };
                self.leg(
                    ctx,
                    command_creator::feed(&[(Axis::X, self.start_x), (Axis::Z, z)], self.feed),
                    TaperStage::Cut,
                )
            }
            TaperStage::Cut => {
                let x = self.start_x - self.params.retract * self.direction / self.cos_angle;
                self.leg(
                    ctx,
                    command_creator::rapid(&[(Axis::X, x)]),
                    TaperStage::Retract,
                )
            }
            TaperStage::Retract => {
                let x = self.start_x
                    + (self.accumulated - self.params.retract) * self.direction
                        / self.cos_angle
                        / 2.0;
                self.leg(
                    ctx,
                    command_creator::rapid(&[(Axis::X, x), (Axis::Z, self.start_z)]),
                    TaperStage::Return,
                )
            }
            TaperStage::Idle => Ok(()),
        }
    }

    fn abort(&mut self) {
        if !self.is_idle() {
            tracing::info!("Taper aborted in {} stage", self.stage.name());
        }
        self.stage = TaperStage::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_depth_from_angle() {
        let params = TaperParams {
            cone_angle: -30.0,
            length: 4.0,
            ..Default::default()
        };
        assert!((params.total_depth() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_right_angle() {
        let params = TaperParams {
            cone_angle: 90.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
        assert!(TaperParams::default().validate().is_ok());
    }
}
