//! Wiring of configuration, board, handler and consumers.

use gemkit_core::{
    CallbackConsumer, DispatchError, EventType, Logger, Payload, Subscriber,
};
use gemkit_dispatch::{status_channel, EventHandler, HandlerConfig, StatusPublisher, StopHandle};
use gemkit_hardware::{DescriptorResource, ResourceSpec};
use gemkit_settings::Config;
use std::sync::Arc;

/// Stops the dispatch loop when a `quit` or `exit` line arrives
#[derive(Debug, Clone)]
pub struct QuitCommand {
    stop: StopHandle,
}

impl QuitCommand {
    pub fn new(stop: StopHandle) -> Self {
        Self { stop }
    }

    fn is_quit(line: &str) -> bool {
        let line = line.trim();
        line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
    }
}

impl CallbackConsumer for QuitCommand {
    fn callback(&self, event_type: EventType, payload: &Payload) {
        if let Payload::Input(line) = payload {
            if Self::is_quit(line) {
                tracing::info!("{} requested shutdown", event_type);
                self.stop.request_stop();
            }
        }
    }
}

/// A configured event handler plus the pieces the caller drives it with
pub struct App {
    handler: EventHandler,
    publisher: Option<StatusPublisher>,
}

impl App {
    /// Configure a handler from `config`
    ///
    /// An `external` printer-status binding is served by an in-process
    /// status channel whose publishing end is kept in the returned app.
    /// `ui` is subscribed to printer status; a [`QuitCommand`] is
    /// subscribed to every line-input event the config binds.
    pub fn from_config(
        config: &Config,
        logger: Arc<dyn Logger>,
        ui: Subscriber,
    ) -> Result<Self, DispatchError> {
        let mut handler = EventHandler::with_config(
            HandlerConfig {
                events_capacity: config.handler.events_capacity,
            },
            logger,
        )?;
        let board = Arc::new(config.board());
        let mut publisher = None;

        for binding in &config.events {
            let event_type = binding.event_type;
            if event_type == EventType::PrinterStatus && binding.source == ResourceSpec::External {
                let (tx, rx) = status_channel()?;
                handler.set_resource(
                    event_type,
                    Arc::new(DescriptorResource::new(rx)),
                    binding.requirement(),
                )?;
                publisher = Some(tx);
            } else {
                handler.set_resource(event_type, board.clone(), binding.requirement())?;
            }
        }

        handler.subscribe(EventType::PrinterStatus, ui)?;
        let quit: Subscriber = Arc::new(QuitCommand::new(handler.stop_handle()));
        for event_type in [EventType::StdinInput, EventType::UiCommand] {
            if config.binding(event_type).is_some() {
                handler.subscribe(event_type, quit.clone())?;
            }
        }

        Ok(Self { handler, publisher })
    }

    /// Publishing end of the printer-status channel, once
    pub fn take_publisher(&mut self) -> Option<StatusPublisher> {
        self.publisher.take()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.handler.stop_handle()
    }

    pub fn handler(&self) -> &EventHandler {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut EventHandler {
        &mut self.handler
    }

    /// Arm everything and dispatch until stopped
    pub fn run(&mut self) -> Result<(), DispatchError> {
        self.handler.begin()
    }
}
