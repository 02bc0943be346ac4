//! # GemKit
//!
//! Event multiplexing and dispatch core for a resin 3D printer controller.
//!
//! ## Architecture
//!
//! GemKit is organized as a workspace with multiple crates:
//!
//! 1. **gemkit-core** - Event types, payloads, printer status, subscriptions, logging
//! 2. **gemkit-hardware** - GPIO, stdin and timer resources behind one acquire/release contract
//! 3. **gemkit-dispatch** - The blocking event handler and the printer-status channel
//! 4. **gemkit-settings** - Board configuration files
//! 5. **gemkit** - Terminal consumer and the binary that wires everything up

pub mod app;
pub mod terminal_ui;

pub use app::{App, QuitCommand};
pub use terminal_ui::{render_status, TerminalUi};

pub use gemkit_core::{
    CallbackConsumer, DispatchError, EventType, Logger, Payload, PrinterState, PrinterStatus,
    StateChange, Subscriber, SubscriptionRegistry, TracingLogger, UiSubState,
};
pub use gemkit_dispatch::{status_channel, EventHandler, HandlerState, StatusPublisher, StopHandle};
pub use gemkit_settings::Config;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging
///
/// Sets up structured logging with:
/// - Output on stderr, leaving stdout to the terminal UI
/// - RUST_LOG environment variable support
/// - `level` as the baseline directive
pub fn init_logging(level: tracing::Level) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
