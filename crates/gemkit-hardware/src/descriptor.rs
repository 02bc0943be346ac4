//! Caller-supplied descriptors.

use crate::resource::{HardwareResource, StreamSource, WaitableHandle};
use gemkit_core::{EventType, HardwareError};
use parking_lot::Mutex;
use std::fmt;

/// Resource wrapping a descriptor opened by the caller
///
/// The stream is handed out by the first `acquire`; closing it is the only
/// release action, and that happens when the handle is dropped.
pub struct DescriptorResource {
    stream: Mutex<Option<Box<dyn StreamSource>>>,
}

impl DescriptorResource {
    /// Wrap an open stream
    pub fn new(stream: impl StreamSource + 'static) -> Self {
        Self {
            stream: Mutex::new(Some(Box::new(stream))),
        }
    }
}

impl HardwareResource for DescriptorResource {
    fn acquire(&self, event_type: EventType) -> Result<WaitableHandle, HardwareError> {
        self.stream
            .lock()
            .take()
            .map(WaitableHandle::Stream)
            .ok_or_else(|| HardwareError::unavailable(event_type, "descriptor already handed out"))
    }

    fn release(&self, _event_type: EventType) -> Result<(), HardwareError> {
        Ok(())
    }
}

impl fmt::Debug for DescriptorResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorResource")
            .field("available", &self.stream.lock().is_some())
            .finish()
    }
}
