//! The panel's polling loop
//!
//! [`ControlLoop`] owns the channel, the spindle sequencer and the three
//! operation engines. Each [`tick`](ControlLoop::tick) refreshes the tool
//! position, tracks the machine state, hands at most one outcome to the
//! component that registered for it, then sends any pending jog. The UI
//! entry points are methods on the loop so that every mutation happens on
//! the loop's thread.

use crate::continuation::{Continuation, PanelChannel};
use crate::machine_control::{self, HoldToggle, JogStep, JogWheel};
use crate::operation::{MachineContext, OperationEngine, OperationKind};
use crate::spindle::{SpindleSequencer, SpindleSettings, SpindleState};
use crate::taper::{TaperEngine, TaperParams};
use crate::threading::{ThreadingEngine, ThreadingParams};
use crate::turning::{TurningEngine, TurningParams};
use lathekit_communication::{Delivery, MotionController, PositionFeed};
use lathekit_core::{Axis, MachineState, Position, Result, SpindleDirection};

/// Machine constants the loop needs
#[derive(Debug, Clone, PartialEq)]
pub struct ControlLoopConfig {
    /// Steps per mm (per revolution for Y)
    pub steps_per_mm: [f64; 3],
    /// Spindle limits and defaults
    pub spindle: SpindleSettings,
    /// Jog feed (mm/min)
    pub jog_feed: u32,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            steps_per_mm: [800.0, 200.0, 400.0],
            spindle: SpindleSettings::default(),
            jog_feed: 500,
        }
    }
}

/// Lathe panel control loop
pub struct ControlLoop {
    channel: PanelChannel,
    feed: PositionFeed,
    spindle: SpindleSequencer,
    threading: ThreadingEngine,
    turning: TurningEngine,
    taper: TaperEngine,
    hold: HoldToggle,
    jog: JogWheel,
    machine_state: MachineState,
    jog_feed: u32,
}

impl ControlLoop {
    /// Create a loop over a controller
    pub fn new(controller: Box<dyn MotionController>, config: ControlLoopConfig) -> Self {
        Self {
            channel: PanelChannel::new(controller),
            feed: PositionFeed::new(config.steps_per_mm),
            spindle: SpindleSequencer::new(config.spindle),
            threading: ThreadingEngine::new(),
            turning: TurningEngine::new(),
            taper: TaperEngine::new(),
            hold: HoldToggle::default(),
            jog: JogWheel::new(),
            machine_state: MachineState::Idle,
            jog_feed: config.jog_feed,
        }
    }

    /// Run one cycle
    ///
    /// An `Err` that is a logic fault means an internal invariant broke and
    /// the loop must not be ticked again.
    pub fn tick(&mut self) -> Result<()> {
        let position = self.feed.refresh(self.channel.controller());

        let state = MachineState::from_code(self.channel.controller().state_code());
        if state != self.machine_state {
            tracing::info!("Machine state {} -> {}", self.machine_state, state);
            self.machine_state = state;
            self.hold.on_machine_state(state);
        }

        if let Some(delivery) = self.channel.poll() {
            self.dispatch(delivery, position)?;
        }

        if self.channel.pending_continuations() == 0 {
            self.jog.submit_pending(&mut self.channel, self.jog_feed)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, delivery: Delivery<Continuation>, position: Position) -> Result<()> {
        let outcome = delivery.outcome;
        let mut ctx = MachineContext {
            channel: &mut self.channel,
            spindle: &mut self.spindle,
            position,
        };

        match delivery.continuation {
            Continuation::Spindle => ctx.spindle.on_outcome(outcome, ctx.channel),
            Continuation::SpindleSpeed { previous } => {
                ctx.spindle.on_speed_outcome(outcome, previous);
                Ok(())
            }
            Continuation::Threading => self.threading.on_outcome(outcome, &mut ctx),
            Continuation::Turning => self.turning.on_outcome(outcome, &mut ctx),
            Continuation::Taper => self.taper.on_outcome(outcome, &mut ctx),
        }
    }

    fn can_start(&self) -> bool {
        self.active_operation().is_none() && self.channel.pending_continuations() == 0
    }

    /// Start threading from the current tool position
    pub fn start_threading(&mut self, params: ThreadingParams) -> Result<bool> {
        if !self.can_start() {
            return Ok(false);
        }
        let mut ctx = MachineContext {
            channel: &mut self.channel,
            spindle: &mut self.spindle,
            position: self.feed.position(),
        };
        self.threading.start(params, &mut ctx)
    }

    /// Start straight turning from the current tool position
    pub fn start_turning(&mut self, params: TurningParams) -> Result<bool> {
        if !self.can_start() {
            return Ok(false);
        }
        let mut ctx = MachineContext {
            channel: &mut self.channel,
            spindle: &mut self.spindle,
            position: self.feed.position(),
        };
        self.turning.start(params, &mut ctx)
    }

    /// Start taper turning from the current tool position
    pub fn start_taper(&mut self, params: TaperParams) -> Result<bool> {
        if !self.can_start() {
            return Ok(false);
        }
        let mut ctx = MachineContext {
            channel: &mut self.channel,
            spindle: &mut self.spindle,
            position: self.feed.position(),
        };
        self.taper.start(params, &mut ctx)
    }

    /// Return every engine to idle without sending anything
    ///
    /// Outcomes still owed to an aborted engine are absorbed when they
    /// arrive. Motion already queued keeps running; use the hold toggle to
    /// stop it.
    pub fn abort_operation(&mut self) {
        self.threading.abort();
        self.turning.abort();
        self.taper.abort();
    }

    /// The operation in progress, if any
    pub fn active_operation(&self) -> Option<OperationKind> {
        if !self.threading.is_idle() {
            Some(OperationKind::Threading)
        } else if !self.turning.is_idle() {
            Some(OperationKind::Turning)
        } else if !self.taper.is_idle() {
            Some(OperationKind::Taper)
        } else {
            None
        }
    }

    /// Stage name of the operation in progress
    pub fn operation_stage(&self) -> Option<&'static str> {
        match self.active_operation()? {
            OperationKind::Threading => Some(self.threading.stage_name()),
            OperationKind::Turning => Some(self.turning.stage_name()),
            OperationKind::Taper => Some(self.taper.stage_name()),
        }
    }

    /// Threading engine
    pub fn threading(&self) -> &ThreadingEngine {
        &self.threading
    }

    /// Straight turning engine
    pub fn turning(&self) -> &TurningEngine {
        &self.turning
    }

    /// Taper engine
    pub fn taper(&self) -> &TaperEngine {
        &self.taper
    }

    /// Start the spindle; refused while an operation runs
    pub fn run_spindle(&mut self) -> Result<bool> {
        if self.active_operation().is_some() {
            return Ok(false);
        }
        self.spindle.request_run(&mut self.channel)
    }

    /// Stop the spindle; refused while an operation runs
    pub fn stop_spindle(&mut self) -> Result<bool> {
        if self.active_operation().is_some() {
            return Ok(false);
        }
        self.spindle.request_stop(&mut self.channel)
    }

    /// Start or stop the spindle; refused while an operation runs
    pub fn toggle_spindle(&mut self) -> Result<bool> {
        if self.active_operation().is_some() {
            return Ok(false);
        }
        self.spindle.toggle(&mut self.channel)
    }

    /// Raise the spindle speed one step
    pub fn increase_spindle_speed(&mut self) -> Result<bool> {
        self.spindle.increase_speed(&mut self.channel)
    }

    /// Lower the spindle speed one step
    pub fn decrease_spindle_speed(&mut self) -> Result<bool> {
        self.spindle.decrease_speed(&mut self.channel)
    }

    /// Reverse the spindle direction; only while stopped and idle
    pub fn toggle_spindle_direction(&mut self) -> bool {
        if self.active_operation().is_some() {
            return false;
        }
        self.spindle.toggle_direction()
    }

    /// Zero an axis at the current position
    pub fn zero_axis(&mut self, axis: Axis) -> Result<bool> {
        if self.channel.pending_continuations() > 0 {
            return Ok(false);
        }
        machine_control::zero_axis(&mut self.channel, axis)
    }

    /// Select the controller's program file
    pub fn select_file(&mut self, name: &str) -> Result<bool> {
        if self.channel.pending_continuations() > 0 {
            return Ok(false);
        }
        machine_control::select_file(&mut self.channel, name)
    }

    /// Press the hold / resume / clear button
    pub fn press_hold(&mut self) -> Result<bool> {
        if self.hold == HoldToggle::Clear && self.channel.pending_continuations() > 0 {
            return Ok(false);
        }
        self.hold.press(&mut self.channel)
    }

    /// Select the jogged axis
    pub fn select_jog_axis(&mut self, axis: Option<Axis>) {
        self.jog.select_axis(axis);
    }

    /// Select the jog distance per detent
    pub fn select_jog_step(&mut self, step: Option<JogStep>) {
        self.jog.select_step(step);
    }

    /// Feed encoder detents; sent on a later tick
    pub fn jog_detents(&mut self, detents: i32) {
        self.jog.add_detents(detents);
    }

    /// Tool position from the last tick
    pub fn position(&self) -> Position {
        self.feed.position()
    }

    /// Spindle state
    pub fn spindle_state(&self) -> SpindleState {
        self.spindle.state()
    }

    /// Commanded spindle speed (rpm)
    pub fn spindle_speed(&self) -> u32 {
        self.spindle.speed()
    }

    /// Commanded spindle direction
    pub fn spindle_direction(&self) -> SpindleDirection {
        self.spindle.direction()
    }

    /// Machine state from the last tick
    pub fn machine_state(&self) -> MachineState {
        self.machine_state
    }

    /// Hold button caption
    pub fn hold_label(&self) -> &'static str {
        self.hold.label()
    }

    /// The command channel
    pub fn channel(&self) -> &PanelChannel {
        &self.channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lathekit_communication::SimulatedController;

    #[test]
    fn test_only_one_operation_at_a_time() {
        let sim = SimulatedController::new([100.0; 3]);
        let mut panel = ControlLoop::new(Box::new(sim), ControlLoopConfig::default());

        assert!(panel.start_threading(ThreadingParams::default()).unwrap());
        assert_eq!(panel.active_operation(), Some(OperationKind::Threading));
        assert!(!panel.start_turning(TurningParams::default()).unwrap());
        assert!(!panel.run_spindle().unwrap());

        panel.abort_operation();
        assert_eq!(panel.active_operation(), None);
        assert_eq!(panel.operation_stage(), None);
    }
}
