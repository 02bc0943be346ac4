//! Event handler
//!
//! Owns every configured [`Event`], blocks on the union of their handles and
//! dispatches payloads to subscribers.
//!
//! ## Lifecycle
//!
//! ```text
//! Unconfigured --set_resource/subscribe--> Configured --start--> Running --stop/fatal--> Stopped
//! ```
//!
//! Configuration only happens before `start`; once running, the event table
//! and subscription registry are read-only. `begin` is `start` followed by
//! `run`.

use crate::event::{token_for, Event};
use crate::stop::StopHandle;
use gemkit_core::{
    DispatchError, EventType, Logger, SignalError, Subscriber, SubscriptionRegistry,
    TracingLogger,
};
use gemkit_hardware::{DescriptorResource, HardwareResource, Requirement, StreamSource};
use mio::{Events, Poll, Token, Waker};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAKE_TOKEN: Token = Token(usize::MAX);

/// Handler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// Nothing configured yet.
    Unconfigured,
    /// Resources and subscriptions are being set up.
    Configured,
    /// Events are armed and the loop may run.
    Running,
    /// Everything has been released.
    Stopped,
}

impl fmt::Display for HandlerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerState::Unconfigured => write!(f, "unconfigured"),
            HandlerState::Configured => write!(f, "configured"),
            HandlerState::Running => write!(f, "running"),
            HandlerState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Tuning for the wait loop
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Readiness notifications collected per wakeup.
    pub events_capacity: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            events_capacity: 64,
        }
    }
}

/// Event multiplexer and dispatcher
pub struct EventHandler {
    poll: Poll,
    readiness: Events,
    events: BTreeMap<EventType, Event>,
    order: Vec<EventType>,
    subscriptions: SubscriptionRegistry,
    logger: Arc<dyn Logger>,
    stop: StopHandle,
    state: HandlerState,
}

impl EventHandler {
    /// Create a handler that logs through `tracing`
    pub fn new() -> Result<Self, DispatchError> {
        Self::with_config(HandlerConfig::default(), Arc::new(TracingLogger))
    }

    /// Create a handler with explicit tuning and logger
    pub fn with_config(
        config: HandlerConfig,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, DispatchError> {
        let poll = Poll::new()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;
        Ok(Self {
            poll,
            readiness: Events::with_capacity(config.events_capacity.max(1)),
            events: BTreeMap::new(),
            order: Vec::new(),
            subscriptions: SubscriptionRegistry::new(),
            logger,
            stop: StopHandle::new(waker),
            state: HandlerState::Unconfigured,
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Handle for requesting a stop from elsewhere
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// The subscription registry
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Whether `event_type` currently holds an armed handle
    pub fn is_armed(&self, event_type: EventType) -> bool {
        self.events
            .get(&event_type)
            .is_some_and(Event::is_armed)
    }

    /// Whether `event_type` lost its resource while running
    pub fn is_dead(&self, event_type: EventType) -> bool {
        self.events
            .get(&event_type)
            .is_some_and(Event::is_dead)
    }

    fn ensure_state(&self, allowed: &[HandlerState], operation: &str) -> Result<(), DispatchError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(DispatchError::InvalidState {
                current: self.state.to_string(),
                operation: operation.to_string(),
            })
        }
    }

    /// Associate a hardware resource with an event type
    ///
    /// Configuring the same event type again replaces the earlier resource.
    pub fn set_resource(
        &mut self,
        event_type: EventType,
        resource: Arc<dyn HardwareResource>,
        requirement: Requirement,
    ) -> Result<(), DispatchError> {
        self.ensure_state(
            &[HandlerState::Unconfigured, HandlerState::Configured],
            "configure a resource",
        )?;
        let event = Event::new(event_type, resource, requirement);
        if self.events.insert(event_type, event).is_some() {
            tracing::debug!("Replacing resource for {}", event_type);
            self.order.retain(|et| *et != event_type);
        }
        self.order.push(event_type);
        self.state = HandlerState::Configured;
        Ok(())
    }

    /// Associate an already-open descriptor with an event type
    pub fn set_file_descriptor(
        &mut self,
        event_type: EventType,
        stream: impl StreamSource + 'static,
    ) -> Result<(), DispatchError> {
        self.set_resource(
            event_type,
            Arc::new(DescriptorResource::new(stream)),
            Requirement::Required,
        )
    }

    /// Register a subscriber for an event type
    pub fn subscribe(
        &mut self,
        event_type: EventType,
        subscriber: Subscriber,
    ) -> Result<(), DispatchError> {
        self.ensure_state(
            &[HandlerState::Unconfigured, HandlerState::Configured],
            "subscribe",
        )?;
        self.subscriptions.subscribe(event_type, subscriber);
        Ok(())
    }

    /// Arm every configured event and run the loop until stopped
    pub fn begin(&mut self) -> Result<(), DispatchError> {
        self.start()?;
        self.run()
    }

    /// Arm every configured event
    ///
    /// If any required event fails to arm, everything armed so far is
    /// released again and the handler stays configured.
    pub fn start(&mut self) -> Result<(), DispatchError> {
        self.ensure_state(
            &[HandlerState::Unconfigured, HandlerState::Configured],
            "start",
        )?;

        let registry = self.poll.registry();
        let mut armed = Vec::new();
        let mut failures = Vec::new();
        for event_type in &self.order {
            let Some(event) = self.events.get_mut(event_type) else {
                continue;
            };
            match event.arm(registry) {
                Ok(()) => armed.push(*event_type),
                Err(e) if event.requirement().is_required() => failures.push(e),
                Err(e) => self.logger.warn(
                    *event_type,
                    &format!("Optional resource skipped, {} stays unconfigured: {}", event_type, e),
                ),
            }
        }

        if !failures.is_empty() {
            for event_type in armed.iter().rev() {
                if let Some(event) = self.events.get_mut(event_type) {
                    if let Err(e) = event.disarm(registry) {
                        self.logger.error(*event_type, &e.to_string());
                    }
                }
            }
            self.state = HandlerState::Configured;
            return Err(DispatchError::StartupFailed(failures));
        }

        tracing::info!("Armed {} event source(s)", armed.len());
        self.state = HandlerState::Running;
        Ok(())
    }

    /// Wait and dispatch until a stop is requested
    pub fn run(&mut self) -> Result<(), DispatchError> {
        self.ensure_state(&[HandlerState::Running], "run")?;
        while !self.stop.is_stop_requested() {
            self.turn(None)?;
        }
        tracing::info!("Stop requested, releasing event sources");
        self.shutdown();
        Ok(())
    }

    /// One wait-and-dispatch cycle
    ///
    /// Blocks until a handle is ready, a timer is due, a stop is requested,
    /// or `timeout` elapses. Returns the number of payloads produced.
    pub fn turn(&mut self, timeout: Option<Duration>) -> Result<usize, DispatchError> {
        self.ensure_state(&[HandlerState::Running], "dispatch")?;

        let timeout = self.wait_timeout(timeout);
        if let Err(e) = self.poll.poll(&mut self.readiness, timeout) {
            if e.kind() == ErrorKind::Interrupted {
                return Ok(0);
            }
            self.teardown();
            return Err(DispatchError::Poll(e));
        }

        // BTreeSet: one service call per source, in scan order
        let mut ready = BTreeSet::new();
        for readiness in self.readiness.iter() {
            if readiness.token() == WAKE_TOKEN {
                continue;
            }
            let Some(event_type) = EventType::ALL
                .into_iter()
                .find(|et| token_for(*et) == readiness.token())
            else {
                continue;
            };
            ready.insert(event_type);
        }
        let now = Instant::now();
        ready.extend(
            self.events
                .iter()
                .filter(|(_, event)| event.is_due(now))
                .map(|(et, _)| *et),
        );

        let mut produced = 0;
        for event_type in ready {
            produced += self.service(event_type)?;
        }
        Ok(produced)
    }

    fn wait_timeout(&self, requested: Option<Duration>) -> Option<Duration> {
        let now = Instant::now();
        let next_timer = self
            .events
            .values()
            .filter_map(Event::deadline)
            .min()
            .map(|deadline| deadline.saturating_duration_since(now));
        match (requested, next_timer) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn service(&mut self, event_type: EventType) -> Result<usize, DispatchError> {
        let Some(event) = self.events.get_mut(&event_type) else {
            return Ok(0);
        };
        if !event.is_armed() {
            return Ok(0);
        }

        let mut produced = 0;
        loop {
            match event.interpret() {
                Ok(Some(payload)) => {
                    produced += 1;
                    if self.subscriptions.notify(event_type, &payload) == 0 {
                        tracing::trace!("No subscribers for {}, dropped {}", event_type, payload);
                    }
                }
                Ok(None) => {}
                Err(SignalError::ResourceGone { .. }) => {
                    let required = event.requirement().is_required();
                    if let Err(e) = event.mark_dead(self.poll.registry()) {
                        self.logger.error(event_type, &e.to_string());
                    }
                    if required {
                        self.logger.error(
                            event_type,
                            &format!("Required resource for {} lost, stopping", event_type),
                        );
                        self.teardown();
                        return Err(DispatchError::ResourceLost { event_type });
                    }
                    self.logger.warn(
                        event_type,
                        &format!("Resource for {} is gone, ignoring it from now on", event_type),
                    );
                    break;
                }
                Err(e) => self.logger.warn(event_type, &e.to_string()),
            }
            if !event.has_pending() {
                break;
            }
        }
        Ok(produced)
    }

    /// Release every event source and stop
    pub fn shutdown(&mut self) {
        if self.state != HandlerState::Stopped {
            self.teardown();
        }
    }

    fn teardown(&mut self) {
        let registry = self.poll.registry();
        for event_type in self.order.iter().rev() {
            if let Some(event) = self.events.get_mut(event_type) {
                if let Err(e) = event.disarm(registry) {
                    self.logger.error(*event_type, &e.to_string());
                }
            }
        }
        self.state = HandlerState::Stopped;
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        if self.state == HandlerState::Running {
            self.teardown();
        }
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("state", &self.state)
            .field("events", &self.order)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}
