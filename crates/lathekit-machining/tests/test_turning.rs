use lathekit_communication::{SimulatedController, SimulatedHandle};
use lathekit_core::Axis;
use lathekit_machining::{
    ControlLoop, ControlLoopConfig, OperationKind, SpindleState, TaperParams, TurningParams,
};

const MAX_TICKS: usize = 500;

fn panel_at(x: f64) -> (ControlLoop, SimulatedHandle) {
    let sim = SimulatedController::new([100.0, 100.0, 100.0]);
    let handle = sim.handle();
    handle.borrow_mut().machine = [x, 0.0, 0.0];
    let mut panel = ControlLoop::new(Box::new(sim), ControlLoopConfig::default());
    panel.tick().unwrap();
    (panel, handle)
}

fn run_until_settled(panel: &mut ControlLoop) {
    for _ in 0..MAX_TICKS {
        panel.tick().unwrap();
        if panel.active_operation().is_none() && panel.spindle_state() == SpindleState::Stopped {
            return;
        }
    }
    panic!("operation did not finish within {MAX_TICKS} ticks");
}

/// Accumulated depth after each pass, worked out from first principles
fn expected_depths(total: f64, rough: f64, finish: f64) -> Vec<f64> {
    let mut depths = Vec::new();
    let mut depth = 0.0;
    let mut rough_passes = 0;
    while total - depth >= rough + finish {
        rough_passes += 1;
        depth = rough_passes as f64 * rough;
        depths.push(depth);
    }
    if total - depth > finish + 0.001 {
        depth = total - finish;
        depths.push(depth);
    }
    if total - depth > 0.0 {
        depths.push(total);
    }
    depths
}

#[test]
fn test_oracle_matches_hand_worked_example() {
    let depths = expected_depths(1.0, 0.2, 0.1);
    let want = [0.2, 0.4, 0.6, 0.8, 0.9, 1.0];
    assert_eq!(depths.len(), want.len());
    for (got, want) in depths.iter().zip(want) {
        assert!((got - want).abs() < 1e-9);
    }
}

#[test]
fn test_turning_end_to_end() {
    let (mut panel, handle) = panel_at(10.0);
    let params = TurningParams::default();

    assert!(panel.start_turning(params).unwrap());
    assert_eq!(panel.active_operation(), Some(OperationKind::Turning));
    run_until_settled(&mut panel);

    let depths = expected_depths(1.0, 0.2, 0.1);
    let mut expected = vec!["M3 S1000".to_string()];
    for (i, depth) in depths.iter().enumerate() {
        let x = 10.0 - depth / 2.0;
        let feed = if i + 1 == depths.len() { 80 } else { 200 };
        expected.push(format!("G0X{:.3}", x));
        expected.push(format!("G1Z-10.000F{}", feed));
        expected.push(format!("G0X{:.3}", x + 0.1));
        expected.push("G0Z0.000".to_string());
    }
    expected.push("G0X9.500".to_string());
    expected.push("M3 S1".to_string());
    expected.push("M5".to_string());

    assert_eq!(handle.borrow().sent_lines(), expected);
    assert!((panel.position().x - 9.5).abs() < 1e-9);
    assert!((panel.turning().accumulated_depth() - 1.0).abs() < 1e-9);
}

#[test]
fn test_turning_keeps_running_spindle() {
    let (mut panel, handle) = panel_at(10.0);
    assert!(panel.run_spindle().unwrap());
    panel.tick().unwrap();
    assert_eq!(panel.spindle_state(), SpindleState::Running);

    let params = TurningParams {
        delta_diameter: 0.3,
        ..Default::default()
    };
    assert!(panel.start_turning(params).unwrap());
    for _ in 0..MAX_TICKS {
        panel.tick().unwrap();
        if panel.active_operation().is_none() {
            break;
        }
    }
    for _ in 0..4 {
        panel.tick().unwrap();
    }

    let state = handle.borrow();
    let lines = state.sent_lines();
    assert_eq!(lines.iter().filter(|l| l.starts_with("M3 S1000")).count(), 1);
    // Positive delta grows the diameter
    assert_eq!(lines[1], "G0X10.100");
    assert_eq!(*lines.last().unwrap(), "M5");
    assert_eq!(panel.spindle_state(), SpindleState::Stopped);
}

#[test]
fn test_failed_leg_stops_turning() {
    let (mut panel, handle) = panel_at(10.0);
    panel.start_turning(TurningParams::default()).unwrap();

    // spindle, start, first position leg
    for _ in 0..3 {
        panel.tick().unwrap();
    }
    assert_eq!(panel.operation_stage(), Some("cut"));

    let sent = handle.borrow().lines.len();
    handle.borrow_mut().raise_alarm();
    panel.tick().unwrap();

    assert_eq!(panel.active_operation(), None);
    assert_eq!(panel.hold_label(), "Clr");
    assert_eq!(handle.borrow().lines.len(), sent);
}

#[test]
fn test_transitioning_spindle_blocks_start() {
    let (mut panel, _handle) = panel_at(10.0);
    assert!(panel.run_spindle().unwrap());
    assert_eq!(panel.spindle_state(), SpindleState::Starting);
    assert!(!panel.start_turning(TurningParams::default()).unwrap());
    assert!(!panel.start_taper(TaperParams::default()).unwrap());
}

#[test]
fn test_invalid_parameters_are_not_fatal() {
    let (mut panel, handle) = panel_at(10.0);
    let params = TurningParams {
        spindle_speed: 50,
        ..Default::default()
    };
    let err = panel.start_turning(params).unwrap_err();
    assert!(err.is_parameter_error());
    assert!(!err.is_logic_fault());
    assert!(handle.borrow().lines.is_empty());
    assert_eq!(panel.active_operation(), None);
}

#[test]
fn test_taper_end_to_end() {
    let (mut panel, handle) = panel_at(10.0);
    let params = TaperParams {
        cone_angle: 30.0,
        length: -2.0,
        ..Default::default()
    };
    assert!(panel.start_taper(params).unwrap());
    run_until_settled(&mut panel);

    let cos = 30f64.to_radians().cos();
    let sin = 30f64.to_radians().sin();
    // sin(30) * 2, one millimetre give or take rounding
    let depths = expected_depths(sin * 2.0, 0.2, 0.1);
    assert_eq!(depths.len(), 6);
    let mut expected = vec!["M3 S1000".to_string()];
    for (i, depth) in depths.iter().enumerate() {
        let feed = if i + 1 == depths.len() { 80 } else { 200 };
        expected.push(format!("G0X{:.3}", 10.0 - depth / cos / 2.0));
        expected.push(format!("G1X10.000Z{:.3}F{}", -depth / sin, feed));
        expected.push(format!("G0X{:.3}", 10.0 + 0.1 / cos));
        expected.push(format!("G0X{:.3}Z0.000", 10.0 - (depth - 0.1) / cos / 2.0));
    }
    expected.push("M3 S1".to_string());
    expected.push("M5".to_string());

    assert_eq!(handle.borrow().sent_lines(), expected);
    assert!((handle.borrow().work(Axis::Z)).abs() < 1e-9);
}

#[test]
fn test_internal_taper_cuts_toward_positive_z() {
    let (mut panel, handle) = panel_at(1.25);
    let params = TaperParams {
        cone_angle: -30.0,
        length: 2.0,
        ..Default::default()
    };
    assert!(panel.start_taper(params).unwrap());
    run_until_settled(&mut panel);

    let cos = 30f64.to_radians().cos();
    let sin = 30f64.to_radians().sin();
    let depths = expected_depths(sin * 2.0, 0.2, 0.1);
    let mut expected = vec!["M3 S1000".to_string()];
    for (i, depth) in depths.iter().enumerate() {
        let feed = if i + 1 == depths.len() { 80 } else { 200 };
        expected.push(format!("G0X{:.3}", 1.25 + depth / cos / 2.0));
        expected.push(format!("G1X1.250Z{:.3}F{}", depth / sin, feed));
        expected.push(format!("G0X{:.3}", 1.25 - 0.1 / cos));
        expected.push(format!("G0X{:.3}Z0.000", 1.25 + (depth - 0.1) / cos / 2.0));
    }
    expected.push("M3 S1".to_string());
    expected.push("M5".to_string());

    let state = handle.borrow();
    let lines = state.sent_lines();
    assert_eq!(lines, expected);
    assert_eq!(lines[1], "G0X1.365");
    assert_eq!(lines[2], "G1X1.250Z0.400F200");
    assert_eq!(lines[3], "G0X1.135");
    assert_eq!(lines[4], "G0X1.308Z0.000");
    assert_eq!(lines[lines.len() - 5], "G1X1.250Z2.000F80");
}

#[test]
fn test_failed_leg_stops_taper() {
    let (mut panel, handle) = panel_at(10.0);
    assert!(panel.start_taper(TaperParams::default()).unwrap());

    // spindle, start, first position leg
    for _ in 0..3 {
        panel.tick().unwrap();
    }
    assert_eq!(panel.operation_stage(), Some("cut"));

    // the retract after this cut is faulted
    handle.borrow_mut().fail_next = true;
    panel.tick().unwrap();
    assert_eq!(panel.operation_stage(), Some("retract"));
    panel.tick().unwrap();
    assert_eq!(panel.active_operation(), None);

    let sent = handle.borrow().lines.len();
    assert_eq!(sent, 4);
    for _ in 0..3 {
        panel.tick().unwrap();
    }
    assert_eq!(handle.borrow().lines.len(), sent);
    assert_eq!(panel.spindle_state(), SpindleState::Running);
}
