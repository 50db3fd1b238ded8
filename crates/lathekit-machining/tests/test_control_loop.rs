use lathekit_communication::{Outcome, SimulatedController, SimulatedHandle};
use lathekit_core::{Axis, MachineState, Position, SpindleDirection};
use lathekit_machining::{
    ControlLoop, ControlLoopConfig, JogStep, MachineContext, OperationEngine, PanelChannel,
    SpindleSequencer, SpindleSettings, SpindleState, TaperParams, ThreadingEngine,
    ThreadingParams, TurningEngine, TurningParams,
};

fn panel_at(x: f64) -> (ControlLoop, SimulatedHandle) {
    let sim = SimulatedController::new([100.0, 100.0, 100.0]);
    let handle = sim.handle();
    handle.borrow_mut().machine = [x, 0.0, 0.0];
    let mut panel = ControlLoop::new(Box::new(sim), ControlLoopConfig::default());
    panel.tick().unwrap();
    (panel, handle)
}

#[derive(Clone, Copy, Debug)]
enum Op {
    Threading,
    Turning,
    Taper,
}

fn start(panel: &mut ControlLoop, op: Op) -> bool {
    match op {
        Op::Threading => panel.start_threading(ThreadingParams::default()),
        Op::Turning => panel.start_turning(TurningParams::default()),
        Op::Taper => panel.start_taper(TaperParams::default()),
    }
    .unwrap()
}

#[test]
fn test_abort_in_every_stage_sends_nothing() {
    for op in [Op::Threading, Op::Turning, Op::Taper] {
        let mut stages = Vec::new();
        for ticks in 0..8 {
            let (mut panel, handle) = panel_at(10.0);
            assert!(start(&mut panel, op));
            for _ in 0..ticks {
                panel.tick().unwrap();
            }
            stages.push(panel.operation_stage().unwrap_or("idle"));

            let sent = handle.borrow().lines.len();
            panel.abort_operation();
            panel.abort_operation();
            assert_eq!(panel.active_operation(), None, "{op:?} after {ticks} ticks");

            // the outcome still owed is absorbed quietly
            for _ in 0..5 {
                panel.tick().unwrap();
            }
            assert_eq!(handle.borrow().lines.len(), sent, "{op:?} after {ticks} ticks");
            assert!(!handle.borrow().is_busy());
        }
        for stage in ["start", "position", "cut", "retract", "return"] {
            assert!(stages.contains(&stage), "{op:?} never aborted in {stage}");
        }
    }
}

#[test]
fn test_outcome_with_nothing_outstanding_is_logic_fault() {
    let sim = SimulatedController::new([100.0, 100.0, 100.0]);
    let mut channel = PanelChannel::new(Box::new(sim));
    let mut spindle = SpindleSequencer::new(SpindleSettings::default());
    let mut ctx = MachineContext {
        channel: &mut channel,
        spindle: &mut spindle,
        position: Position::default(),
    };

    let mut turning = TurningEngine::new();
    let err = turning
        .on_outcome(Outcome::Completed, &mut ctx)
        .unwrap_err();
    assert!(err.is_logic_fault());

    let mut threading = ThreadingEngine::new();
    assert!(threading
        .start(ThreadingParams::default(), &mut ctx)
        .unwrap());
    threading.abort();
    threading.on_outcome(Outcome::Completed, &mut ctx).unwrap();
    let err = threading
        .on_outcome(Outcome::Failed, &mut ctx)
        .unwrap_err();
    assert!(err.is_logic_fault());
}

#[test]
fn test_spindle_controls() {
    let (mut panel, handle) = panel_at(0.0);

    assert!(panel.toggle_spindle_direction());
    assert_eq!(panel.spindle_direction(), SpindleDirection::Reverse);
    assert!(panel.toggle_spindle().unwrap());
    panel.tick().unwrap();
    assert_eq!(panel.spindle_state(), SpindleState::Running);
    assert!(!panel.toggle_spindle_direction());

    assert!(panel.increase_spindle_speed().unwrap());
    assert_eq!(panel.spindle_speed(), 1100);
    panel.tick().unwrap();

    assert!(panel.stop_spindle().unwrap());
    for _ in 0..3 {
        panel.tick().unwrap();
    }
    assert_eq!(panel.spindle_state(), SpindleState::Stopped);
    assert_eq!(
        handle.borrow().sent_lines(),
        vec!["M4 S1000", "M4 S1100", "M4 S1", "M5"]
    );
}

#[test]
fn test_jog_wheel() {
    let (mut panel, handle) = panel_at(0.0);

    panel.select_jog_axis(Some(Axis::Z));
    panel.jog_detents(4);
    panel.tick().unwrap();
    assert!(handle.borrow().lines.is_empty());

    panel.select_jog_step(Some(JogStep::Hundredth));
    panel.jog_detents(5);
    panel.tick().unwrap();
    assert_eq!(handle.borrow().sent_lines(), vec!["$J=G91Z0.050F500"]);

    panel.tick().unwrap();
    assert!((panel.position().z - 0.05).abs() < 1e-9);
}

#[test]
fn test_zero_and_file_select() {
    let (mut panel, handle) = panel_at(12.5);
    assert!((panel.position().x - 12.5).abs() < 1e-9);

    assert!(panel.zero_axis(Axis::X).unwrap());
    panel.tick().unwrap();
    assert!(panel.position().x.abs() < 1e-9);

    assert!(panel.select_file("part.nc").unwrap());
    assert!(panel.select_file("").unwrap_err().is_parameter_error());
    assert_eq!(handle.borrow().sent_lines(), vec!["G92X0", "$F=part.nc"]);
}

#[test]
fn test_controls_wait_for_operation_continuations() {
    let (mut panel, handle) = panel_at(10.0);
    assert!(panel.start_threading(ThreadingParams::default()).unwrap());
    assert!(!panel.zero_axis(Axis::Z).unwrap());
    assert!(!panel.select_file("part.nc").unwrap());
    assert!(handle.borrow().lines.is_empty());
}

#[test]
fn test_hold_toggle_and_alarm_clear() {
    let (mut panel, handle) = panel_at(0.0);
    assert_eq!(panel.hold_label(), "||");

    panel.press_hold().unwrap();
    assert_eq!(panel.hold_label(), ">");
    panel.tick().unwrap();
    assert_eq!(panel.machine_state(), MachineState::Hold);

    panel.press_hold().unwrap();
    assert_eq!(panel.hold_label(), "||");
    assert_eq!(handle.borrow().realtime, vec![b'!', b'~']);

    handle.borrow_mut().raise_alarm();
    panel.tick().unwrap();
    assert_eq!(panel.machine_state(), MachineState::Alarm);
    assert_eq!(panel.hold_label(), "Clr");

    assert!(panel.press_hold().unwrap());
    assert_eq!(panel.hold_label(), "||");
    assert_eq!(handle.borrow().sent_lines(), vec!["$X"]);
    panel.tick().unwrap();
    panel.tick().unwrap();
    assert_eq!(panel.machine_state(), MachineState::Idle);
}
