use lathekit_communication::{
    Command, CommandChannel, Outcome, RealtimeSignal, SimulatedController, SimulatedHandle,
    CONTINUATION_CAPACITY,
};
use proptest::prelude::*;

fn channel() -> (CommandChannel<usize>, SimulatedHandle) {
    let sim = SimulatedController::new([100.0, 100.0, 100.0]);
    let handle = sim.handle();
    (CommandChannel::new(Box::new(sim)), handle)
}

fn line(text: &str) -> Command {
    Command::line(text).unwrap()
}

#[test]
fn test_nested_continuations_resume_in_reverse_order() {
    let (mut ch, _handle) = channel();

    for tag in 1..=4 {
        assert!(ch.submit(Command::probe(), Some(tag)).unwrap());
    }

    let mut resumed = Vec::new();
    while let Some(delivery) = ch.poll() {
        assert_eq!(delivery.outcome, Outcome::Completed);
        resumed.push(delivery.continuation);
    }

    assert_eq!(resumed, vec![4, 3, 2, 1]);
    assert_eq!(ch.pending_continuations(), 0);
}

#[test]
fn test_outcome_cascades_one_continuation_per_poll() {
    let (mut ch, handle) = channel();
    handle.borrow_mut().completion_delay = 2;

    ch.submit(Command::probe(), Some(1)).unwrap();
    ch.submit(line("M3 S600"), Some(2)).unwrap();

    assert!(ch.poll().is_none());
    assert!(ch.poll().is_none());

    let first = ch.poll().unwrap();
    assert_eq!((first.continuation, first.outcome), (2, Outcome::Completed));
    assert!(!ch.is_busy());

    let second = ch.poll().unwrap();
    assert_eq!((second.continuation, second.outcome), (1, Outcome::Completed));
    assert!(ch.poll().is_none());
}

#[test]
fn test_failure_reaches_every_waiting_continuation() {
    let (mut ch, handle) = channel();
    ch.submit(Command::probe(), Some(1)).unwrap();
    handle.borrow_mut().fail_next = true;
    ch.submit(line("M3 S600"), Some(2)).unwrap();

    assert_eq!(ch.poll().unwrap().outcome, Outcome::Failed);
    assert_eq!(ch.poll().unwrap().outcome, Outcome::Failed);
    assert!(ch.poll().is_none());
}

#[test]
fn test_new_submission_stops_the_cascade() {
    let (mut ch, _handle) = channel();
    ch.submit(Command::probe(), Some(1)).unwrap();
    ch.submit(Command::probe(), Some(2)).unwrap();

    let first = ch.poll().unwrap();
    assert_eq!(first.continuation, 2);

    // Continuation 2 submits its next leg; 1 waits for that leg's outcome
    ch.submit(line("G0X1.000"), Some(3)).unwrap();
    assert_eq!(ch.latched_outcome(), Outcome::Pending);

    assert_eq!(ch.poll().unwrap().continuation, 3);
    assert_eq!(ch.poll().unwrap().continuation, 1);
}

#[test]
fn test_overflow_is_a_logic_fault_and_sends_nothing() {
    let (mut ch, handle) = channel();
    for tag in 0..CONTINUATION_CAPACITY {
        assert!(ch.submit(Command::probe(), Some(tag)).unwrap());
    }

    let err = ch.submit(line("G0X1.000"), Some(99)).unwrap_err();
    assert!(err.is_logic_fault());
    assert!(handle.borrow().lines.is_empty());
    assert!(!ch.is_busy());

    // Without a continuation the line is still admitted
    assert!(ch.submit(line("G0X1.000"), None).unwrap());
}

#[test]
fn test_alarm_fails_the_in_flight_command() {
    let (mut ch, handle) = channel();
    handle.borrow_mut().completion_delay = 5;
    ch.submit(line("G1Z-10.000F100"), Some(1)).unwrap();
    assert!(ch.poll().is_none());

    handle.borrow_mut().raise_alarm();
    let delivery = ch.poll().unwrap();
    assert_eq!(delivery.outcome, Outcome::Failed);
    assert!(!ch.is_busy());
}

#[test]
fn test_hold_keeps_command_in_flight() {
    let (mut ch, handle) = channel();
    ch.submit(line("G1Z-10.000F100"), Some(1)).unwrap();
    ch.submit(Command::realtime(RealtimeSignal::FeedHold), None)
        .unwrap();

    assert!(ch.poll().is_none());
    assert!(ch.is_busy());

    ch.submit(Command::realtime(RealtimeSignal::CycleStart), None)
        .unwrap();
    assert_eq!(ch.poll().unwrap().outcome, Outcome::Completed);
    assert_eq!(handle.borrow().realtime, vec![b'!', b'~']);
}

#[derive(Debug, Clone)]
enum Op {
    Line(bool),
    Probe(bool),
    Realtime,
    Poll,
    Fail,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<bool>().prop_map(Op::Line),
        any::<bool>().prop_map(Op::Probe),
        Just(Op::Realtime),
        Just(Op::Poll),
        Just(Op::Poll),
        Just(Op::Fail),
    ]
}

proptest! {
    #[test]
    fn prop_single_command_in_flight(
        delay in 0u32..3,
        ops in prop::collection::vec(op_strategy(), 1..80),
    ) {
        let (mut ch, handle) = channel();
        handle.borrow_mut().completion_delay = delay;

        for (tag, op) in ops.into_iter().enumerate() {
            let busy_before = ch.is_busy();
            let lines_before = handle.borrow().lines.len();
            let stack_before = ch.pending_continuations();

            match op {
                Op::Line(with_cont) => {
                    let cont = with_cont.then_some(tag);
                    match ch.submit(line("G0X1.000"), cont) {
                        Ok(true) => prop_assert!(!busy_before),
                        Ok(false) => {
                            prop_assert!(busy_before);
                            prop_assert_eq!(ch.pending_continuations(), stack_before);
                        }
                        Err(err) => {
                            prop_assert!(err.is_logic_fault());
                            prop_assert_eq!(stack_before, CONTINUATION_CAPACITY);
                        }
                    }
                }
                Op::Probe(with_cont) => {
                    let cont = with_cont.then_some(tag);
                    if let Ok(true) = ch.submit(Command::probe(), cont) {
                        prop_assert!(!busy_before);
                    }
                }
                Op::Realtime => {
                    prop_assert!(ch
                        .submit(Command::realtime(RealtimeSignal::StatusReport), None)
                        .unwrap());
                }
                Op::Poll => {
                    ch.poll();
                }
                Op::Fail => handle.borrow_mut().fail_next = true,
            }

            // The controller never sees a second line while one is outstanding
            if busy_before {
                prop_assert_eq!(handle.borrow().lines.len(), lines_before);
            }
            prop_assert_eq!(ch.is_busy(), handle.borrow().is_busy());
            prop_assert!(ch.pending_continuations() <= CONTINUATION_CAPACITY);
        }
    }
}
