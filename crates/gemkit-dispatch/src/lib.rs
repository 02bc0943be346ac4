//! # GemKit Dispatch
//!
//! Blocking event multiplexer for GemKit.
//!
//! ## Overview
//!
//! The [`EventHandler`] arms one [`Event`] per configured event type, waits
//! on all of their handles at once, and hands each resulting payload to the
//! subscribers of that event type, synchronously and in subscription order.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gemkit_core::{EventType, Payload};
//! use gemkit_dispatch::{status_channel, EventHandler};
//! use std::sync::Arc;
//!
//! let mut handler = EventHandler::new()?;
//! let (mut publisher, receiver) = status_channel()?;
//! handler.set_file_descriptor(EventType::PrinterStatus, receiver)?;
//! handler.subscribe(
//!     EventType::PrinterStatus,
//!     Arc::new(|_: EventType, payload: &Payload| println!("{}", payload)),
//! )?;
//!
//! let stop = handler.stop_handle();
//! handler.begin()?; // returns after stop.request_stop()
//! ```

mod channel;
mod event;
mod handler;
mod stop;

pub use channel::{status_channel, StatusPublisher};
pub use event::Event;
pub use handler::{EventHandler, HandlerConfig, HandlerState};
pub use stop::StopHandle;
