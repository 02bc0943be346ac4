//! Board resource table.
//!
//! [`Board`] is the [`HardwareResource`] for a whole controller board: it
//! owns the event-to-resource table and knows which of its resources are
//! currently acquired, so release is idempotent. Only pins the board
//! exported itself are unexported on release.

use crate::gpio::SysfsGpio;
use crate::resource::{set_nonblocking, HardwareResource, WaitableHandle};
use crate::spec::{ResourceBinding, ResourceSpec, TimerSpec};
use gemkit_core::{EventType, HardwareError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::io::{self, Read};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::time::Duration;

/// Hardware resources of one controller board
#[derive(Debug)]
pub struct Board {
    gpio: SysfsGpio,
    specs: BTreeMap<EventType, ResourceSpec>,
    /// Acquired event types, with the pin to unexport on release
    acquired: Mutex<BTreeMap<EventType, Option<u32>>>,
}

impl Board {
    /// Create a board with an empty resource table
    pub fn new(gpio: SysfsGpio) -> Self {
        Self {
            gpio,
            specs: BTreeMap::new(),
            acquired: Mutex::new(BTreeMap::new()),
        }
    }

    /// Create a board from a binding list
    pub fn from_bindings<'a>(
        gpio: SysfsGpio,
        bindings: impl IntoIterator<Item = &'a ResourceBinding>,
    ) -> Self {
        let mut board = Self::new(gpio);
        for binding in bindings {
            board.bind(binding.event_type, binding.source.clone());
        }
        board
    }

    /// Map an event type to a resource, replacing any previous mapping
    pub fn bind(&mut self, event_type: EventType, spec: ResourceSpec) {
        if let Some(previous) = self.specs.insert(event_type, spec) {
            tracing::debug!("Rebinding {} (was {})", event_type, previous);
        }
    }

    /// Resource mapped to an event type
    pub fn spec(&self, event_type: EventType) -> Option<&ResourceSpec> {
        self.specs.get(&event_type)
    }

    /// The GPIO controller
    pub fn gpio(&self) -> &SysfsGpio {
        &self.gpio
    }

    /// Whether `event_type` is currently acquired
    pub fn is_acquired(&self, event_type: EventType) -> bool {
        self.acquired.lock().contains_key(&event_type)
    }

    fn open(&self, event_type: EventType, spec: &ResourceSpec) -> io::Result<WaitableHandle> {
        match spec {
            ResourceSpec::Gpio {
                pin,
                edge,
                active_low,
            } => self
                .gpio
                .open_interrupt(*pin, *edge, *active_low)
                .map(WaitableHandle::Interrupt),
            ResourceSpec::Stdin => Ok(WaitableHandle::Stream(Box::new(StdinStream(io::stdin())))),
            ResourceSpec::Timer {
                interval_ms,
                periodic,
            } => {
                if *interval_ms == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "timer interval must be non-zero",
                    ));
                }
                Ok(WaitableHandle::Timer(TimerSpec {
                    interval: Duration::from_millis(*interval_ms),
                    periodic: *periodic,
                }))
            }
            ResourceSpec::External => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} expects a descriptor supplied at runtime", event_type),
            )),
        }
    }
}

/// Process stdin, put back into blocking mode once the handle closes
struct StdinStream(io::Stdin);

impl Read for StdinStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl AsFd for StdinStream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl AsRawFd for StdinStream {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_raw_fd()
    }
}

impl Drop for StdinStream {
    fn drop(&mut self) {
        // the terminal is shared with the parent shell
        if let Err(e) = set_nonblocking(self.0.as_fd(), false) {
            tracing::warn!("Failed to restore blocking stdin: {}", e);
        }
    }
}

impl HardwareResource for Board {
    fn acquire(&self, event_type: EventType) -> Result<WaitableHandle, HardwareError> {
        let spec = self
            .specs
            .get(&event_type)
            .ok_or_else(|| HardwareError::unavailable(event_type, "no resource mapped"))?;

        let mut acquired = self.acquired.lock();
        if acquired.contains_key(&event_type) {
            return Err(HardwareError::unavailable(
                event_type,
                format!("{} is already acquired", spec),
            ));
        }

        let handle = self
            .open(event_type, spec)
            .map_err(|e| HardwareError::unavailable(event_type, format!("{}: {}", spec, e)))?;
        let owned_pin = match &handle {
            WaitableHandle::Interrupt(line) if line.exported_here() => Some(line.pin()),
            _ => None,
        };
        acquired.insert(event_type, owned_pin);
        Ok(handle)
    }

    fn release(&self, event_type: EventType) -> Result<(), HardwareError> {
        let Some(owned_pin) = self.acquired.lock().remove(&event_type) else {
            return Ok(());
        };
        match owned_pin {
            Some(pin) => self
                .gpio
                .unexport(pin)
                .map_err(|e| HardwareError::ReleaseFailed {
                    event_type,
                    reason: format!("GPIO {}: {}", pin, e),
                }),
            None => {
                tracing::debug!("{} released without unexport", event_type);
                Ok(())
            }
        }
    }
}
