//! Straight turning to a target diameter
//!
//! Rough passes remove a fixed depth each until only a rough plus a finish
//! pass remain; an intermediate pass then leaves exactly the finish depth,
//! which is taken at the finish feed. The spindle is started for the
//! operation if it is stopped, and stopped again when the last pass is done.

use crate::operation::{
    check_spindle_speed, engage_spindle, release_spindle, require_feed, require_nonzero,
    require_positive, submit_leg, submit_probe, CutPlan, MachineContext, OperationEngine,
    OperationKind, Outstanding,
};
use crate::spindle::SpindleState;
use lathekit_communication::{command_creator, Command, Outcome};
use lathekit_core::{Axis, ParameterError, Result};
use serde::{Deserialize, Serialize};

/// Straight turning parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurningParams {
    /// Diameter change; negative reduces the diameter (mm)
    pub delta_diameter: f64,
    /// Diameter removed per rough pass (mm)
    pub rough_pass_depth: f64,
    /// Diameter left for the finish pass (mm)
    pub finish_pass_depth: f64,
    /// Cut length; the sign gives the direction along Z (mm)
    pub length: f64,
    /// Radial retract before returning (mm)
    pub retract: f64,
    /// Rough feed (mm/min)
    pub rough_feed: u32,
    /// Finish feed (mm/min)
    pub finish_feed: u32,
    /// Spindle speed used when the spindle is started for the cut (rpm)
    pub spindle_speed: u32,
}

impl Default for TurningParams {
    fn default() -> Self {
        Self {
            delta_diameter: -1.0,
            rough_pass_depth: 0.2,
            finish_pass_depth: 0.1,
            length: -10.0,
            retract: 0.1,
            rough_feed: 200,
            finish_feed: 80,
            spindle_speed: 1000,
        }
    }
}

impl TurningParams {
    /// Validate the parameters
    pub fn validate(&self) -> std::result::Result<(), ParameterError> {
        require_nonzero("delta_diameter", self.delta_diameter)?;
        require_positive("rough_pass_depth", self.rough_pass_depth)?;
        if !(self.finish_pass_depth.is_finite() && self.finish_pass_depth >= 0.0) {
            return Err(ParameterError::out_of_range(
                "finish_pass_depth",
                self.finish_pass_depth,
                ">= 0",
            ));
        }
        require_nonzero("length", self.length)?;
        if !(self.retract.is_finite() && self.retract >= 0.0) {
            return Err(ParameterError::out_of_range("retract", self.retract, ">= 0"));
        }
        require_feed("rough_feed", self.rough_feed)?;
        require_feed("finish_feed", self.finish_feed)
    }
}

/// Turning stage; names the leg whose outcome is awaited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurningStage {
    /// Not running
    #[default]
    Idle,
    /// Admission probe and spindle start
    Start,
    /// Move to the pass diameter
    Position,
    /// Feed along Z
    Cut,
    /// Radial retract
    Retract,
    /// Return to the start Z
    Return,
    /// Final move back to the finished diameter
    Final,
}

impl TurningStage {
    fn name(self) -> &'static str {
        match self {
            TurningStage::Idle => "idle",
            TurningStage::Start => "start",
            TurningStage::Position => "position",
            TurningStage::Cut => "cut",
            TurningStage::Retract => "retract",
            TurningStage::Return => "return",
            TurningStage::Final => "final",
        }
    }
}

/// Straight turning engine
#[derive(Debug, Clone, Default)]
pub struct TurningEngine {
    params: TurningParams,
    stage: TurningStage,
    outstanding: Outstanding,
    direction: f64,
    start_x: f64,
    start_z: f64,
    target_x: f64,
    accumulated: f64,
    pass: u32,
    feed: u32,
}

impl TurningEngine {
    /// Create an idle engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage
    pub fn stage(&self) -> TurningStage {
        self.stage
    }

    /// Diameter removed once the current pass completes (mm)
    pub fn accumulated_depth(&self) -> f64 {
        self.accumulated
    }

    fn begin_pass(&mut self, ctx: &mut MachineContext<'_>) -> Result<()> {
        let plan = CutPlan {
            total: self.params.delta_diameter.abs(),
            rough: self.params.rough_pass_depth,
            finish: self.params.finish_pass_depth,
        };

        let Some(cut) = plan.next_cut(self.accumulated, self.pass) else {
            return self.leg(
                ctx,
                command_creator::rapid(&[(Axis::X, self.target_x)]),
                TurningStage::Final,
            );
        };

        if cut.rough {
            self.pass += 1;
        }
        if cut.finish {
            self.feed = self.params.finish_feed;
        }
        self.accumulated = cut.depth;
        self.target_x = self.start_x + self.accumulated * self.direction / 2.0;
        tracing::debug!(
            "Turning pass to depth {:.3}{}",
            self.accumulated,
            if cut.finish { " (finish)" } else { "" }
        );
        self.leg(
            ctx,
            command_creator::rapid(&[(Axis::X, self.target_x)]),
            TurningStage::Position,
        )
    }

    fn leg(
        &mut self,
        ctx: &mut MachineContext<'_>,
        command: Result<Command>,
        next: TurningStage,
    ) -> Result<()> {
        let command = command.inspect_err(|_| self.stage = TurningStage::Idle)?;
        self.stage = if submit_leg(ctx, self.kind(), &mut self.outstanding, command)? {
            next
        } else {
            TurningStage::Idle
        };
        Ok(())
    }
}

impl OperationEngine for TurningEngine {
    type Params = TurningParams;

    fn kind(&self) -> OperationKind {
        OperationKind::Turning
    }

    fn stage_name(&self) -> &'static str {
        self.stage.name()
    }

    fn is_idle(&self) -> bool {
        self.stage == TurningStage::Idle
    }

    fn start(&mut self, params: TurningParams, ctx: &mut MachineContext<'_>) -> Result<bool> {
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
        self.params = params;
        self.direction = if params.delta_diameter < 0.0 { -1.0 } else { 1.0 };
        self.start_x = pos.x;
        self.start_z = pos.z;
        self.target_x = pos.x;
        self.accumulated = 0.0;
        self.pass = 1;
        self.feed = params.rough_feed;
        self.stage = TurningStage::Start;
        tracing::info!(
            "Turning started: delta {} length {} from {}",
            params.delta_diameter,
            params.length,
            pos
        );

        engage_spindle(ctx, self.kind(), params.spindle_speed)?;
        Ok(true)
    }

    fn on_outcome(&mut self, outcome: Outcome, ctx: &mut MachineContext<'_>) -> Result<()> {
        self.outstanding.resolve(self.kind(), outcome)?;

        if self.is_idle() {
            tracing::debug!("Turning absorbed {} after abort", outcome);
            return Ok(());
        }
        if outcome.is_failed() {
            tracing::warn!("Turning stopped: {} leg failed", self.stage.name());
            self.stage = TurningStage::Idle;
            return Ok(());
        }

        match self.stage {
            TurningStage::Start => {
                if ctx.spindle.state() != SpindleState::Running {
                    tracing::warn!("Turning stopped: spindle is {}", ctx.spindle.state());
                    self.stage = TurningStage::Idle;
                    return Ok(());
                }
                self.begin_pass(ctx)
            }
            TurningStage::Return => self.begin_pass(ctx),
            TurningStage::Position => {
                let z = self.start_z + self.params.length;
                self.leg(
                    ctx,
                    command_creator::feed(&[(Axis::Z, z)], self.feed),
                    TurningStage::Cut,
                )
            }
            TurningStage::Cut => {
                let x = self.target_x - self.params.retract * self.direction;
                self.leg(
                    ctx,
                    command_creator::rapid(&[(Axis::X, x)]),
                    TurningStage::Retract,
                )
            }
            TurningStage::Retract => self.leg(
                ctx,
                command_creator::rapid(&[(Axis::Z, self.start_z)]),
                TurningStage::Return,
            ),
            TurningStage::Final => {
                tracing::info!("Turning finished at depth {:.3}", self.accumulated);
                self.stage = TurningStage::Idle;
                release_spindle(ctx, self.kind())
            }
            TurningStage::Idle => Ok(()),
        }
    }

    fn abort(&mut self) {
        if !self.is_idle() {
            tracing::info!("Turning aborted in {} stage", self.stage.name());
        }
        self.stage = TurningStage::Idle;
    }
}
