//! Hardware resource contract
//!
//! A [`HardwareResource`] turns an [`EventType`] into a wait-able handle and
//! later undoes whatever that took. [`ResourceGuard`] pairs the two so a
//! handle can never outlive its release.

use crate::spec::TimerSpec;
use gemkit_core::{EventType, HardwareError};
use std::fmt;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::sync::Arc;

/// A readable descriptor the poller can wait on
pub trait StreamSource: Read + AsFd + AsRawFd + Send {}

impl<T> StreamSource for T where T: Read + AsFd + AsRawFd + Send {}

/// Switch the open file description behind `fd` in or out of blocking mode
///
/// The flag is shared by every descriptor duplicated from the same open,
/// so the caller's handle changes mode too.
pub fn set_nonblocking(fd: BorrowedFd<'_>, nonblocking: bool) -> io::Result<()> {
    let dup = fd.try_clone_to_owned()?;
    mio::unix::pipe::Receiver::from(dup).set_nonblocking(nonblocking)
}

/// Open `value` file of an exported, edge-configured GPIO
#[derive(Debug)]
pub struct InterruptLine {
    pin: u32,
    file: File,
    exported_here: bool,
}

impl InterruptLine {
    /// Wrap an opened value file of a pin exported by someone else
    pub fn new(pin: u32, file: File) -> Self {
        Self {
            pin,
            file,
            exported_here: false,
        }
    }

    /// Wrap an opened value file of a pin this process exported
    pub fn exported(pin: u32, file: File) -> Self {
        Self {
            pin,
            file,
            exported_here: true,
        }
    }

    /// GPIO number
    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Whether releasing the line should unexport the pin
    pub fn exported_here(&self) -> bool {
        self.exported_here
    }

    /// Read the current logic level
    ///
    /// Reading also acknowledges the pending interrupt, so the next edge
    /// produces a fresh notification.
    pub fn read_level(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 4];
        self.file.seek(SeekFrom::Start(0))?;
        let n = self.file.read(&mut buf)?;
        match buf[..n].first() {
            Some(b'0') => Ok(0),
            Some(b'1') => Ok(1),
            Some(other) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected level byte 0x{:02x}", other),
            )),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "empty value file",
            )),
        }
    }
}

impl AsRawFd for InterruptLine {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// What an armed event waits on
pub enum WaitableHandle {
    /// GPIO interrupt line, signalled as priority data.
    Interrupt(InterruptLine),
    /// Byte stream read line by line.
    Stream(Box<dyn StreamSource>),
    /// Deadline tracked by the dispatch loop itself.
    Timer(TimerSpec),
}

impl WaitableHandle {
    /// Raw descriptor to register with the poller, if any
    pub fn raw_fd(&self) -> Option<RawFd> {
        match self {
            WaitableHandle::Interrupt(line) => Some(line.as_raw_fd()),
            WaitableHandle::Stream(stream) => Some(stream.as_raw_fd()),
            WaitableHandle::Timer(_) => None,
        }
    }
}

impl fmt::Debug for WaitableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitableHandle::Interrupt(line) => f
                .debug_struct("Interrupt")
                .field("pin", &line.pin)
                .field("fd", &line.as_raw_fd())
                .finish(),
            WaitableHandle::Stream(stream) => f
                .debug_struct("Stream")
                .field("fd", &stream.as_raw_fd())
                .finish(),
            WaitableHandle::Timer(spec) => f.debug_tuple("Timer").field(spec).finish(),
        }
    }
}

/// Acquire/release contract for the OS resource behind an event type
///
/// `release` must undo every side effect of `acquire`, and must be safe to
/// call for an event type that was never (or only partly) acquired.
pub trait HardwareResource: Send + Sync {
    /// Perform OS-level setup and hand out the handle to wait on
    fn acquire(&self, event_type: EventType) -> Result<WaitableHandle, HardwareError>;

    /// Undo the setup performed by `acquire`
    fn release(&self, event_type: EventType) -> Result<(), HardwareError>;
}

/// An acquired handle that is released exactly once
///
/// Dropping the guard closes the handle and releases the resource; call
/// [`ResourceGuard::release`] instead to observe release errors.
pub struct ResourceGuard {
    event_type: EventType,
    resource: Arc<dyn HardwareResource>,
    handle: Option<WaitableHandle>,
    released: bool,
}

impl ResourceGuard {
    /// Acquire `event_type` from `resource`
    pub fn acquire(
        resource: Arc<dyn HardwareResource>,
        event_type: EventType,
    ) -> Result<Self, HardwareError> {
        let handle = match resource.acquire(event_type) {
            Ok(handle) => handle,
            Err(e) => {
                // acquire may have failed half-way; release is required to cope
                if let Err(release_err) = resource.release(event_type) {
                    tracing::warn!("Cleanup after failed acquire: {}", release_err);
                }
                return Err(e);
            }
        };
        tracing::debug!("Acquired {:?} for {}", handle, event_type);
        Ok(Self {
            event_type,
            resource,
            handle: Some(handle),
            released: false,
        })
    }

    /// Event type this guard was acquired for
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// The acquired handle
    pub fn handle(&self) -> Option<&WaitableHandle> {
        self.handle.as_ref()
    }

    /// The acquired handle, mutably
    pub fn handle_mut(&mut self) -> Option<&mut WaitableHandle> {
        self.handle.as_mut()
    }

    /// Close the handle and release the resource
    pub fn release(mut self) -> Result<(), HardwareError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), HardwareError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        // close the descriptor before the pin is unexported
        drop(self.handle.take());
        tracing::debug!("Releasing {}", self.event_type);
        self.resource.release(self.event_type)
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            tracing::warn!("{}", e);
        }
    }
}

impl fmt::Debug for ResourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGuard")
            .field("event_type", &self.event_type)
            .field("handle", &self.handle)
            .field("released", &self.released)
            .finish()
    }
}
