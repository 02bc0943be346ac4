//! One armed event source.
//!
//! An [`Event`] owns the wait-able handle for a single [`EventType`],
//! registers it with the poller, and turns readiness into [`Payload`]s.

use gemkit_core::{EventType, HardwareError, Payload, PrinterStatus, SignalError};
use gemkit_hardware::{
    set_nonblocking, HardwareResource, Requirement, ResourceGuard, StreamSource, WaitableHandle,
};
use mio::unix::SourceFd;
use mio::{Interest, Registry, Token};
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, ErrorKind, Read};
use std::os::fd::AsFd;
use std::sync::Arc;
use std::time::Instant;

const READ_CHUNK: usize = 4096;

/// Interest used for sysfs GPIO value files
#[cfg(any(target_os = "linux", target_os = "android"))]
fn interrupt_interest() -> Interest {
    Interest::PRIORITY
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn interrupt_interest() -> Interest {
    Interest::READABLE
}

/// Poller token for an event type
pub(crate) fn token_for(event_type: EventType) -> Token {
    Token(event_type.code() as usize)
}

/// The wait-able representation of one configured event type
pub struct Event {
    event_type: EventType,
    resource: Arc<dyn HardwareResource>,
    requirement: Requirement,
    guard: Option<ResourceGuard>,
    partial: Vec<u8>,
    lines: VecDeque<String>,
    eof: bool,
    deadline: Option<Instant>,
    dead: bool,
}

impl Event {
    /// Create an unarmed event
    pub fn new(
        event_type: EventType,
        resource: Arc<dyn HardwareResource>,
        requirement: Requirement,
    ) -> Self {
        Self {
            event_type,
            resource,
            requirement,
            guard: None,
            partial: Vec::new(),
            lines: VecDeque::new(),
            eof: false,
            deadline: None,
            dead: false,
        }
    }

    /// Event type served
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Requirement level
    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    /// Whether a handle is currently held
    pub fn is_armed(&self) -> bool {
        self.guard.is_some()
    }

    /// Whether the resource was lost while running
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Acquire the resource and register it with the poller
    pub fn arm(&mut self, registry: &Registry) -> Result<(), HardwareError> {
        if self.is_armed() {
            return Ok(());
        }
        let guard = ResourceGuard::acquire(self.resource.clone(), self.event_type)?;

        let interest = match guard.handle() {
            Some(WaitableHandle::Interrupt(_)) => Some(interrupt_interest()),
            Some(WaitableHandle::Stream(stream)) => {
                // readiness is edge-triggered, so every wakeup reads to WouldBlock
                set_nonblocking(stream.as_fd(), true).map_err(|e| {
                    HardwareError::unavailable(
                        self.event_type,
                        format!("cannot make descriptor non-blocking: {}", e),
                    )
                })?;
                Some(Interest::READABLE)
            }
            Some(WaitableHandle::Timer(spec)) => {
                self.deadline = Some(Instant::now() + spec.interval);
                None
            }
            None => None,
        };
        let fd = guard.handle().and_then(WaitableHandle::raw_fd);
        if let (Some(interest), Some(fd)) = (interest, fd) {
            // on failure the guard drops here and releases the resource
            registry
                .register(&mut SourceFd(&fd), token_for(self.event_type), interest)
                .map_err(|e| {
                    HardwareError::unavailable(
                        self.event_type,
                        format!("cannot poll descriptor: {}", e),
                    )
                })?;
        }

        self.partial.clear();
        self.lines.clear();
        self.eof = false;
        self.dead = false;
        self.guard = Some(guard);
        Ok(())
    }

    /// Hold an acquired guard without registering it with a poller
    #[cfg(test)]
    pub(crate) fn with_guard(guard: ResourceGuard, requirement: Requirement) -> Self {
        let mut event = Self::new(guard.event_type(), Arc::new(NoResource), requirement);
        event.guard = Some(guard);
        event
    }

    /// Deregister and release the resource; no-op when not armed
    pub fn disarm(&mut self, registry: &Registry) -> Result<(), HardwareError> {
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };
        if let Some(fd) = guard.handle().and_then(WaitableHandle::raw_fd) {
            if let Err(e) = registry.deregister(&mut SourceFd(&fd)) {
                tracing::debug!("Deregistering {} failed: {}", self.event_type, e);
            }
        }
        self.deadline = None;
        guard.release()
    }

    /// Disarm and refuse further readiness
    pub fn mark_dead(&mut self, registry: &Registry) -> Result<(), HardwareError> {
        self.dead = true;
        self.lines.clear();
        self.disarm(registry)
    }

    /// Next timer expiry, for timer events
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether a timer event has expired at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }

    /// Whether more payloads can be produced without waiting again
    pub fn has_pending(&self) -> bool {
        !self.dead && (!self.lines.is_empty() || self.eof)
    }

    /// Turn the current readiness into at most one payload
    ///
    /// `Ok(None)` means the readiness was consumed without completing a
    /// payload (a partial line, or a timer that is not yet due).
    pub fn interpret(&mut self) -> Result<Option<Payload>, SignalError> {
        let event_type = self.event_type;
        if self.dead {
            return Ok(None);
        }
        if let Some(line) = self.lines.pop_front() {
            return decode_line(event_type, line).map(Some);
        }
        if self.eof {
            return Err(SignalError::ResourceGone { event_type });
        }

        let handle = self
            .guard
            .as_mut()
            .and_then(ResourceGuard::handle_mut)
            .ok_or_else(|| SignalError::unexpected(event_type, "event is not armed"))?;

        match handle {
            WaitableHandle::Interrupt(line) => {
                let level = line
                    .read_level()
                    .map_err(|e| SignalError::unexpected(event_type, e.to_string()))?;
                Ok(Some(Payload::Interrupt {
                    pin: line.pin(),
                    level,
                }))
            }
            WaitableHandle::Stream(stream) => {
                let reached_eof = fill_lines(&mut **stream, &mut self.partial, &mut self.lines)
                    .map_err(|e| SignalError::unexpected(event_type, e.to_string()))?;
                if reached_eof {
                    self.eof = true;
                }
                match self.lines.pop_front() {
                    Some(line) => decode_line(event_type, line).map(Some),
                    None if self.eof => Err(SignalError::ResourceGone { event_type }),
                    None => Ok(None),
                }
            }
            WaitableHandle::Timer(spec) => {
                let now = Instant::now();
                let Some(deadline) = self.deadline.filter(|d| *d <= now) else {
                    return Ok(None);
                };
                let interval = spec.interval;
                let expirations = if spec.periodic {
                    let late = now.duration_since(deadline).as_nanos() / interval.as_nanos().max(1);
                    let expirations = late as u64 + 1;
                    self.deadline = Some(deadline + interval * expirations as u32);
                    expirations
                } else {
                    self.deadline = None;
                    1
                };
                Ok(Some(Payload::TimerExpired { expirations }))
            }
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("event_type", &self.event_type)
            .field("requirement", &self.requirement)
            .field("armed", &self.is_armed())
            .field("dead", &self.dead)
            .finish()
    }
}

#[cfg(test)]
struct NoResource;

#[cfg(test)]
impl HardwareResource for NoResource {
    fn acquire(&self, event_type: EventType) -> Result<WaitableHandle, HardwareError> {
        Err(HardwareError::unavailable(event_type, "test resource"))
    }

    fn release(&self, _event_type: EventType) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// Drain a non-blocking stream and split it into complete lines
///
/// Reads until the descriptor would block or reaches end of file. Returns
/// `true` in the latter case.
fn fill_lines(
    stream: &mut dyn StreamSource,
    partial: &mut Vec<u8>,
    lines: &mut VecDeque<String>,
) -> io::Result<bool> {
    let mut buf = [0u8; READ_CHUNK];
    let mut eof = false;
    loop {
        match stream.read(&mut buf) {
            Ok(0) => {
                eof = true;
                break;
            }
            Ok(n) => partial.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    while let Some(pos) = partial.iter().position(|b| *b == b'\n') {
        let raw: Vec<u8> = partial.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw[..raw.len() - 1]);
        lines.push_back(text.trim_end_matches('\r').to_string());
    }
    if eof && !partial.is_empty() {
        let text = String::from_utf8_lossy(partial).into_owned();
        partial.clear();
        lines.push_back(text);
    }
    Ok(eof)
}

fn decode_line(event_type: EventType, line: String) -> Result<Payload, SignalError> {
    match event_type {
        EventType::PrinterStatus => PrinterStatus::from_line(&line)
            .map(Payload::PrinterStatus)
            .map_err(|e| SignalError::unexpected(event_type, format!("bad status line: {}", e))),
        EventType::StdinInput | EventType::UiCommand => Ok(Payload::Input(line)),
        other => Err(SignalError::unexpected(
            other,
            format!("text on a non-text source: {:?}", line),
        )),
    }
}
