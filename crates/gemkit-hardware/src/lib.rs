//! # GemKit Hardware
//!
//! Hardware resources backing GemKit events.
//!
//! Every event type is served by a [`HardwareResource`]: something that can
//! acquire a wait-able handle (GPIO interrupt line, byte stream, timer) and
//! later release everything that acquisition touched.
//!
//! - [`Board`]: the controller board's event-to-resource table
//! - [`SysfsGpio`]: export/configure/unexport of sysfs GPIO pins
//! - [`DescriptorResource`]: descriptors opened by the caller
//! - [`ResourceGuard`]: release-on-drop pairing of acquire and release

pub mod board;
pub mod descriptor;
pub mod gpio;
pub mod resource;
pub mod spec;

pub use board::Board;
pub use descriptor::DescriptorResource;
pub use gpio::{SysfsGpio, DEFAULT_SYSFS_ROOT};
pub use resource::{
    set_nonblocking, HardwareResource, InterruptLine, ResourceGuard, StreamSource, WaitableHandle,
};
pub use spec::{
    default_bindings, Edge, Requirement, ResourceBinding, ResourceSpec, TimerSpec,
};
