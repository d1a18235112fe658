//! Event handler registry and dispatch

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::{
    constants::{DEFAULT_EVENT_QUEUE_SIZE, WILDCARD_EVENT},
    error::{AmiError, AmiResult},
    message::AmiMessage,
};

/// Callback invoked for manager events.
///
/// Receives the lowercased event name, the full message, and the host and
/// port of the connection it arrived on. Handlers run inline on the read
/// path: while one runs, no frame is read, including the response an action
/// may be waiting for.
///
/// Any `FnMut(&str, &AmiMessage, &str, u16) -> bool + Send` closure is a
/// handler.
pub trait EventHandler: Send {
    fn handle(&mut self, event: &str, message: &AmiMessage, host: &str, port: u16) -> bool;
}

impl<F> EventHandler for F
where
    F: FnMut(&str, &AmiMessage, &str, u16) -> bool + Send,
{
    fn handle(&mut self, event: &str, message: &AmiMessage, host: &str, port: u16) -> bool {
        self(event, message, host, port)
    }
}

/// Registry of event name → handler, with an optional `*` fallback.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<String, Box<dyn EventHandler>>,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self
            .handlers
            .keys()
            .collect();
        names.sort();
        f.debug_struct("EventDispatcher")
            .field("handlers", &names)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event` (case-insensitive), or for every event
    /// without a specific handler when `event` is `*`.
    ///
    /// An existing registration is never replaced.
    pub fn register(&mut self, event: &str, handler: impl EventHandler + 'static) -> AmiResult<()> {
        let key = event.to_lowercase();
        if self
            .handlers
            .contains_key(&key)
        {
            return Err(AmiError::HandlerAlreadyRegistered { event: key });
        }
        debug!("[EVENT] Registered handler for '{}'", key);
        self.handlers
            .insert(key, Box::new(handler));
        Ok(())
    }

    /// Remove the handler registered for `event`.
    pub fn unregister(&mut self, event: &str) -> AmiResult<()> {
        let key = event.to_lowercase();
        match self
            .handlers
            .remove(&key)
        {
            Some(_) => {
                debug!("[EVENT] Removed handler for '{}'", key);
                Ok(())
            }
            None => Err(AmiError::HandlerNotRegistered { event: key }),
        }
    }

    pub fn is_registered(&self, event: &str) -> bool {
        self.handlers
            .contains_key(&event.to_lowercase())
    }

    /// Route an event to its handler, falling back to the wildcard handler.
    ///
    /// Returns the handler's result, or `None` when no handler applies.
    pub fn dispatch(&mut self, message: &AmiMessage, host: &str, port: u16) -> Option<bool> {
        let event = message
            .event_name()
            .unwrap_or_default()
            .to_lowercase();
        trace!("[EVENT] Got event '{}'", event);

        let handler = if self
            .handlers
            .contains_key(&event)
        {
            self.handlers
                .get_mut(&event)
        } else {
            self.handlers
                .get_mut(WILDCARD_EVENT)
        };

        match handler {
            Some(handler) => Some(handler.handle(&event, message, host, port)),
            None => {
                trace!("[EVENT] No event handler for event '{}'", event);
                None
            }
        }
    }
}

/// Handler that forwards events into a bounded channel.
///
/// Lets a separate task consume events while the connection's own task
/// drives actions. Forwarding never blocks the read path: when the channel
/// is full the event is dropped and counted.
pub struct ChannelForwarder {
    tx: mpsc::Sender<AmiMessage>,
    dropped: Arc<AtomicU64>,
}

impl ChannelForwarder {
    /// Forwarder with the default queue size and its receiving stream.
    pub fn new() -> (Self, AmiEventStream) {
        Self::with_capacity(DEFAULT_EVENT_QUEUE_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> (Self, AmiEventStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let forwarder = Self {
            tx,
            dropped: dropped.clone(),
        };
        (forwarder, AmiEventStream { rx, dropped })
    }
}

impl EventHandler for ChannelForwarder {
    fn handle(&mut self, _event: &str, message: &AmiMessage, _host: &str, _port: u16) -> bool {
        match self
            .tx
            .try_send(message.clone())
        {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped
                    .fetch_add(1, Ordering::Relaxed);
                warn!("Event queue full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Receiving side of a [`ChannelForwarder`].
pub struct AmiEventStream {
    rx: mpsc::Receiver<AmiMessage>,
    dropped: Arc<AtomicU64>,
}

impl std::fmt::Debug for AmiEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiEventStream")
            .field("dropped", &self.dropped_event_count())
            .finish()
    }
}

impl AmiEventStream {
    /// Next forwarded event, or `None` once the forwarder is dropped and
    /// the queue drained.
    pub async fn recv(&mut self) -> Option<AmiMessage> {
        self.rx
            .recv()
            .await
    }

    /// Number of events dropped because the queue was full.
    pub fn dropped_event_count(&self) -> u64 {
        self.dropped
            .load(Ordering::Relaxed)
    }
}

impl futures_util::Stream for AmiEventStream {
    type Item = AmiMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx
            .poll_recv(cx)
    }
}
