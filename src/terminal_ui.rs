//! Terminal consumer for printer status events.

use gemkit_core::{
    CallbackConsumer, EventType, Logger, Payload, PrinterStatus, SignalError, StateChange,
    TracingLogger,
};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::Arc;

/// Format a status as one terminal line
///
/// `entering Printing 3/10, 42s remaining`, with the transition prefix and
/// progress fragment only present when they apply.
pub fn render_status(status: &PrinterStatus) -> String {
    let mut line = String::new();
    match status.change {
        StateChange::Entering => line.push_str("entering "),
        StateChange::Leaving => line.push_str("leaving "),
        StateChange::NoChange => {}
    }
    let _ = write!(line, "{}", status.state);
    if let Some(sub_state) = status.sub_state {
        let _ = write!(line, " {}", sub_state);
    }
    if let Some(progress) = status.progress() {
        let _ = write!(line, " {}", progress);
    }
    line.push('\n');
    line
}

/// Prints printer status changes to a terminal
pub struct TerminalUi<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
    logger: Arc<dyn Logger>,
}

impl TerminalUi<io::Stdout> {
    /// Write to stdout and log through `tracing`
    pub fn stdout() -> Self {
        Self::new(io::stdout(), Arc::new(TracingLogger))
    }
}

impl<W: Write + Send> TerminalUi<W> {
    pub fn new(out: W, logger: Arc<dyn Logger>) -> Self {
        Self {
            out: Mutex::new(out),
            logger,
        }
    }

    /// Give back the output stream
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn show(&self, status: &PrinterStatus) -> io::Result<()> {
        let mut out = self.out.lock();
        out.write_all(render_status(status).as_bytes())?;
        out.flush()
    }
}

impl<W: Write + Send> CallbackConsumer for TerminalUi<W> {
    fn callback(&self, event_type: EventType, payload: &Payload) {
        match (event_type, payload) {
            (EventType::PrinterStatus, Payload::PrinterStatus(status)) => {
                if let Err(e) = self.show(status) {
                    self.logger
                        .error(event_type, &format!("Failed to write status: {}", e));
                }
            }
            _ => self.logger.warn(
                event_type,
                &SignalError::UnexpectedEvent { event_type }.to_string(),
            ),
        }
    }
}
