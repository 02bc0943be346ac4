use gemkit_core::{
    DispatchError, EventType, HardwareError, MemoryLogger, Payload, PrinterState, PrinterStatus,
    StateChange, Subscriber,
};
use gemkit_dispatch::{status_channel, EventHandler, HandlerConfig, HandlerState};
use gemkit_hardware::{HardwareResource, Requirement, TimerSpec, WaitableHandle};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

const WAIT: Option<Duration> = Some(Duration::from_secs(2));

// Resource that hands out idle timers and records every call
#[derive(Default)]
struct FakeBoard {
    failing: BTreeSet<EventType>,
    acquired: Mutex<Vec<EventType>>,
    release_calls: Mutex<Vec<EventType>>,
}

impl FakeBoard {
    fn failing(types: &[EventType]) -> Self {
        Self {
            failing: types.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn releases_of(&self, event_type: EventType) -> usize {
        self.release_calls
            .lock()
            .iter()
            .filter(|et| **et == event_type)
            .count()
    }
}

impl HardwareResource for FakeBoard {
    fn acquire(&self, event_type: EventType) -> Result<WaitableHandle, HardwareError> {
        if self.failing.contains(&event_type) {
            return Err(HardwareError::unavailable(event_type, "not fitted"));
        }
        self.acquired.lock().push(event_type);
        Ok(WaitableHandle::Timer(TimerSpec {
            interval: Duration::from_secs(3600),
            periodic: false,
        }))
    }

    fn release(&self, event_type: EventType) -> Result<(), HardwareError> {
        self.release_calls.lock().push(event_type);
        Ok(())
    }
}

struct Recorder {
    name: &'static str,
    log: Arc<Mutex<Vec<(&'static str, EventType, Payload)>>>,
}

fn recorder(
    name: &'static str,
    log: &Arc<Mutex<Vec<(&'static str, EventType, Payload)>>>,
) -> Subscriber {
    let log = log.clone();
    Arc::new(Recorder { name, log })
}

impl gemkit_core::CallbackConsumer for Recorder {
    fn callback(&self, event_type: EventType, payload: &Payload) {
        self.log.lock().push((self.name, event_type, payload.clone()));
    }
}

fn handler_with_logger() -> (EventHandler, Arc<MemoryLogger>) {
    let logger = Arc::new(MemoryLogger::new());
    let handler = EventHandler::with_config(HandlerConfig::default(), logger.clone()).unwrap();
    (handler, logger)
}

#[test]
fn test_each_subscriber_called_once_in_order() {
    let (mut handler, _logger) = handler_with_logger();
    let (mut status_tx, status_rx) = status_channel().unwrap();
    let (_door_tx, door_rx) = mio::unix::pipe::new().unwrap();
    handler
        .set_file_descriptor(EventType::PrinterStatus, status_rx)
        .unwrap();
    handler.set_file_descriptor(EventType::DoorSensor, door_rx).unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    handler
        .subscribe(EventType::PrinterStatus, recorder("first", &log))
        .unwrap();
    handler
        .subscribe(EventType::PrinterStatus, recorder("second", &log))
        .unwrap();
    handler
        .subscribe(EventType::DoorSensor, recorder("door", &log))
        .unwrap();
    handler.start().unwrap();

    let status = PrinterStatus::new(PrinterState::Printing)
        .with_change(StateChange::Entering)
        .with_progress(1, 5, 120);
    status_tx.publish(&status).unwrap();

    assert_eq!(handler.turn(WAIT).unwrap(), 1);
    let entries = log.lock().clone();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, "first");
    assert_eq!(entries[1].0, "second");
    for (_, event_type, payload) in &entries {
        assert_eq!(*event_type, EventType::PrinterStatus);
        assert_eq!(payload, &Payload::PrinterStatus(status.clone()));
    }

    // nothing new is ready, so nothing is redelivered
    assert_eq!(handler.turn(Some(Duration::from_millis(20))).unwrap(), 0);
    assert_eq!(log.lock().len(), 2);
}

#[test]
fn test_no_subscribers_interprets_and_drops() {
    let (mut handler, logger) = handler_with_logger();
    let (mut tx, rx) = mio::unix::pipe::new().unwrap();
    handler.set_file_descriptor(EventType::UiCommand, rx).unwrap();
    handler.start().unwrap();

    tx.write_all(b"pause\n").unwrap();
    assert_eq!(handler.turn(WAIT).unwrap(), 1);
    assert!(logger.records_at(Level::WARN).is_empty());
    assert_eq!(handler.state(), HandlerState::Running);
}

#[test]
fn test_required_failure_releases_everything_acquired() {
    let (mut handler, _logger) = handler_with_logger();
    let board = Arc::new(FakeBoard::failing(&[EventType::MotorInterrupt]));
    for event_type in [
        EventType::DoorSensor,
        EventType::ButtonPress,
        EventType::MotorInterrupt,
    ] {
        handler
            .set_resource(event_type, board.clone(), Requirement::Required)
            .unwrap();
    }

    let err = handler.start().unwrap_err();
    match err {
        DispatchError::StartupFailed(causes) => {
            assert_eq!(causes.len(), 1);
            assert_eq!(causes[0].event_type(), EventType::MotorInterrupt);
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert_eq!(handler.state(), HandlerState::Configured);
    assert_eq!(
        *board.acquired.lock(),
        vec![EventType::DoorSensor, EventType::ButtonPress]
    );
    assert!(!handler.is_armed(EventType::DoorSensor));
    assert!(!handler.is_armed(EventType::ButtonPress));
    assert_eq!(board.releases_of(EventType::DoorSensor), 1);
    assert_eq!(board.releases_of(EventType::ButtonPress), 1);
    // released in reverse of arming order
    let calls = board.release_calls.lock().clone();
    let door = calls.iter().position(|et| *et == EventType::DoorSensor).unwrap();
    let button = calls.iter().position(|et| *et == EventType::ButtonPress).unwrap();
    assert!(button < door);

    // tearing down after the failed start releases nothing twice
    handler.shutdown();
    assert_eq!(board.releases_of(EventType::DoorSensor), 1);
    assert_eq!(board.releases_of(EventType::ButtonPress), 1);
    assert!(board.releases_of(EventType::MotorInterrupt) <= 1);
}

#[test]
fn test_optional_failure_is_skipped() {
    let (mut handler, logger) = handler_with_logger();
    let board = Arc::new(FakeBoard::failing(&[EventType::RotationSensor]));
    handler
        .set_resource(EventType::DoorSensor, board.clone(), Requirement::Required)
        .unwrap();
    handler
        .set_resource(EventType::RotationSensor, board.clone(), Requirement::Optional)
        .unwrap();

    handler.start().unwrap();
    assert!(handler.is_armed(EventType::DoorSensor));
    assert!(!handler.is_armed(EventType::RotationSensor));

    let warnings = logger.records_at(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].event_type, Some(EventType::RotationSensor));

    handler.shutdown();
    assert_eq!(board.releases_of(EventType::DoorSensor), 1);
}


#[test]
fn test_undecodable_signal_is_logged_and_loop_continues() {
    let (mut handler, logger) = handler_with_logger();
    let (mut tx, rx) = mio::unix::pipe::new().unwrap();
    handler.set_file_descriptor(EventType::PrinterStatus, rx).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    handler
        .subscribe(EventType::PrinterStatus, recorder("ui", &log))
        .unwrap();
    handler.start().unwrap();

    let idle = PrinterStatus::new(PrinterState::Idle);
    tx.write_all(b"{\"state\":\"Melting\"}\n").unwrap();
    tx.write_all(idle.to_line().unwrap().as_bytes()).unwrap();
    assert_eq!(handler.turn(WAIT).unwrap(), 1);

    let warnings = logger.records_at(Level::WARN);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].event_type, Some(EventType::PrinterStatus));
    assert_eq!(log.lock().len(), 1);
    assert_eq!(log.lock()[0].2, Payload::PrinterStatus(idle));
    assert_eq!(handler.state(), HandlerState::Running);
}

#[test]
fn test_optional_stream_closing_is_ignored() {
    let (mut handler, logger) = handler_with_logger();
    let (ui_tx, ui_rx) = mio::unix::pipe::new().unwrap();
    let (mut input_tx, input_rx) = mio::unix::pipe::new().unwrap();
    handler
        .set_resource(
            EventType::UiCommand,
            Arc::new(gemkit_hardware::DescriptorResource::new(ui_rx)),
            Requirement::Optional,
        )
        .unwrap();
    handler.set_file_descriptor(EventType::StdinInput, input_rx).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    handler
        .subscribe(EventType::StdinInput, recorder("input", &log))
        .unwrap();
    handler.start().unwrap();

    drop(ui_tx);
    assert_eq!(handler.turn(WAIT).unwrap(), 0);
    assert!(handler.is_dead(EventType::UiCommand));
    assert_eq!(handler.state(), HandlerState::Running);
    assert!(logger
        .records_at(Level::WARN)
        .iter()
        .any(|r| r.event_type == Some(EventType::UiCommand)));

    input_tx.write_all(b"status\n").unwrap();
    assert_eq!(handler.turn(WAIT).unwrap(), 1);
    assert_eq!(log.lock()[0].2, Payload::Input("status".into()));
}

#[test]
fn test_required_stream_closing_stops_handler() {
    let (mut handler, logger) = handler_with_logger();
    let (tx, rx) = status_channel().unwrap();
    handler.set_file_descriptor(EventType::PrinterStatus, rx).unwrap();
    handler.start().unwrap();

    drop(tx);
    let err = handler.turn(WAIT).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::ResourceLost {
            event_type: EventType::PrinterStatus
        }
    ));
    assert_eq!(handler.state(), HandlerState::Stopped);
    assert!(!handler.is_armed(EventType::PrinterStatus));
    assert!(!logger.records_at(Level::ERROR).is_empty());
}

struct TickResource(Duration);

impl HardwareResource for TickResource {
    fn acquire(&self, _event_type: EventType) -> Result<WaitableHandle, HardwareError> {
        Ok(WaitableHandle::Timer(TimerSpec {
            interval: self.0,
            periodic: true,
        }))
    }

    fn release(&self, _event_type: EventType) -> Result<(), HardwareError> {
        Ok(())
    }
}

#[test]
fn test_periodic_timer_keeps_firing() {
    let (mut handler, _logger) = handler_with_logger();
    handler
        .set_resource(
            EventType::DelayTimer,
            Arc::new(TickResource(Duration::from_millis(10))),
            Requirement::Required,
        )
        .unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    handler
        .subscribe(EventType::DelayTimer, recorder("tick", &log))
        .unwrap();
    handler.start().unwrap();

    let mut produced = 0;
    for _ in 0..100 {
        produced += handler.turn(WAIT).unwrap();
        if produced >= 3 {
            break;
        }
    }
    assert!(produced >= 3);
    assert_eq!(log.lock().len(), produced);
    for (_, event_type, payload) in log.lock().iter() {
        assert_eq!(*event_type, EventType::DelayTimer);
        assert!(matches!(payload, Payload::TimerExpired { expirations } if *expirations >= 1));
    }
}

#[test]
fn test_subscriber_can_stop_the_loop() {
    let (mut handler, _logger) = handler_with_logger();
    let (mut tx, rx) = mio::unix::pipe::new().unwrap();
    handler.set_file_descriptor(EventType::StdinInput, rx).unwrap();

    let stop = handler.stop_handle();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in_callback = seen.clone();
    handler
        .subscribe(
            EventType::StdinInput,
            Arc::new(move |_: EventType, payload: &Payload| {
                seen_in_callback.lock().push(payload.clone());
                if *payload == Payload::Input("quit".into()) {
                    stop.request_stop();
                }
            }),
        )
        .unwrap();

    tx.write_all(b"hello\nquit\n").unwrap();
    handler.begin().unwrap();

    assert_eq!(handler.state(), HandlerState::Stopped);
    assert_eq!(
        *seen.lock(),
        vec![Payload::Input("hello".into()), Payload::Input("quit".into())]
    );
}

#[test]
fn test_stop_from_another_thread_wakes_blocked_wait() {
    let (mut handler, _logger) = handler_with_logger();
    let (_tx, rx) = mio::unix::pipe::new().unwrap();
    handler.set_file_descriptor(EventType::UiCommand, rx).unwrap();
    handler.start().unwrap();

    let stop = handler.stop_handle();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        stop.request_stop();
    });

    handler.run().unwrap();
    stopper.join().unwrap();
    assert_eq!(handler.state(), HandlerState::Stopped);
}

#[test]
fn test_blocking_stream_full_chunk_does_not_stall_turn() {
    let (mut handler, _logger) = handler_with_logger();
    // std sockets start out blocking
    let (rx, mut tx) = UnixStream::pair().unwrap();
    handler.set_file_descriptor(EventType::StdinInput, rx).unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    handler
        .subscribe(EventType::StdinInput, recorder("input", &log))
        .unwrap();
    handler.start().unwrap();

    // exactly one read buffer, with the writer left open
    let line = "a".repeat(4095);
    tx.write_all(line.as_bytes()).unwrap();
    tx.write_all(b"\n").unwrap();

    let (done_tx, done_rx) = mpsc::channel();
    let worker = std::thread::spawn(move || {
        let first = handler.turn(Some(Duration::from_secs(1)));
        let second = handler.turn(Some(Duration::from_millis(20)));
        let _ = done_tx.send((
            first.map_err(|e| e.to_string()),
            second.map_err(|e| e.to_string()),
        ));
        handler
    });

    let (first, second) = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("turn blocked on a drained stream");
    assert_eq!(first, Ok(1));
    assert_eq!(second, Ok(0));
    let entries = log.lock().clone();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].2, Payload::Input(line));

    let mut handler = worker.join().unwrap();
    assert_eq!(handler.state(), HandlerState::Running);
    handler.shutdown();
    drop(tx);
}
