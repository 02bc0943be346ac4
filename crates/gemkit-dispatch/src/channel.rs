//! In-process printer status channel.
//!
//! The print engine holds the [`StatusPublisher`]; the receiving end is a
//! non-blocking pipe installed on the handler with
//! [`EventHandler::set_file_descriptor`](crate::EventHandler::set_file_descriptor)
//! for [`EventType::PrinterStatus`](gemkit_core::EventType::PrinterStatus).

use gemkit_core::PrinterStatus;
use mio::unix::pipe::{self, Receiver, Sender};
use std::io::{self, Write};

/// Writing end of the status channel
#[derive(Debug)]
pub struct StatusPublisher {
    sender: Sender,
}

impl StatusPublisher {
    /// Publish one status as a JSON line
    ///
    /// Fails with `WouldBlock` when the dispatch loop has fallen so far
    /// behind that the pipe is full.
    pub fn publish(&mut self, status: &PrinterStatus) -> io::Result<()> {
        let line = status.to_line().map_err(io::Error::other)?;
        self.sender.write_all(line.as_bytes())
    }
}

/// Create a status channel
pub fn status_channel() -> io::Result<(StatusPublisher, Receiver)> {
    let (sender, receiver) = pipe::new()?;
    Ok((StatusPublisher { sender }, receiver))
}
