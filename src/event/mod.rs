//! Event system for inbound device messages.
//!
//! Decoded events reach application code two ways:
//! - registered [`Handlers`], called synchronously and in registration
//!   order for every event of their kind;
//! - broadcast [`Subscription`]s, for async consumers.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::protocol::IncomingKind;
use crate::types::{ActiveTxMode, ConnectionStatus};

/// Event received from the beacon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Currently configured transmission mode.
    ActiveTxMode(ActiveTxMode),
    /// Transmission progress text.
    TxActionStatus(String),
    /// GPS fix available.
    GpsStatus(bool),
    /// Frequency reference calibrated.
    CalStatus(bool),
    /// Transmitter keyed.
    TxStatus(bool),
    /// Self-check step text.
    SelfCheckAction(String),
    /// Self-check result.
    SelfCheckStatus(bool),
    /// Self-check running.
    SelfCheckActive(bool),
    /// Hardware revision.
    HardwareInfo(String),
    /// Firmware version.
    FirmwareInfo(String),
    /// Calibration value.
    CalValue(i32),
    /// Calibration frequency output state.
    CalFreqGenerated(bool),
    /// Connection status, from the device or the supervisor.
    ConnectionStatus(ConnectionStatus),
    /// Wi-Fi connection result.
    WifiStatus(bool),
    /// Undecodable line, carried verbatim.
    Other(String),
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> IncomingKind {
        match self {
            Self::ActiveTxMode(_) => IncomingKind::ActiveTxMode,
            Self::TxActionStatus(_) => IncomingKind::TxActionStatus,
            Self::GpsStatus(_) => IncomingKind::GpsStatus,
            Self::CalStatus(_) => IncomingKind::CalStatus,
            Self::TxStatus(_) => IncomingKind::TxStatus,
            Self::SelfCheckAction(_) => IncomingKind::SelfCheckAction,
            Self::SelfCheckStatus(_) => IncomingKind::SelfCheckStatus,
            Self::SelfCheckActive(_) => IncomingKind::SelfCheckActive,
            Self::HardwareInfo(_) => IncomingKind::HardwareInfo,
            Self::FirmwareInfo(_) => IncomingKind::FirmwareInfo,
            Self::CalValue(_) => IncomingKind::CalValue,
            Self::CalFreqGenerated(_) => IncomingKind::CalFreqGenerated,
            Self::ConnectionStatus(_) => IncomingKind::ConnectionStatus,
            Self::WifiStatus(_) => IncomingKind::WifiStatus,
            Self::Other(_) => IncomingKind::Other,
        }
    }
}

/// Callback invoked for a received event.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handlers keyed by event kind, each list in registration order.
#[derive(Clone, Default)]
pub struct Handlers {
    map: HashMap<IncomingKind, Vec<Handler>>,
}

impl Handlers {
    /// Creates an empty handler set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler for `kind`.
    #[must_use]
    pub fn on<F>(mut self, kind: IncomingKind, handler: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.add(kind, Arc::new(handler));
        self
    }

    /// Appends an already shared handler for `kind`.
    pub fn add(&mut self, kind: IncomingKind, handler: Handler) {
        self.map.entry(kind).or_default().push(handler);
    }

    /// Returns the handlers registered for `kind`.
    #[must_use]
    pub fn get(&self, kind: IncomingKind) -> &[Handler] {
        self.map.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns true if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.values().all(Vec::is_empty)
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<_, _> = self.map.iter().map(|(k, v)| (k, v.len())).collect();
        f.debug_struct("Handlers").field("counts", &counts).finish()
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the dispatcher is gone. Events missed because
    /// the subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscription lagged, skipped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

struct EventDispatcherInner {
    handlers: RwLock<Arc<Handlers>>,
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to handlers and subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher with the given broadcast capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner {
                handlers: RwLock::new(Arc::new(Handlers::new())),
                sender,
            }),
        }
    }

    /// Replaces the whole handler map.
    pub fn set_handlers(&self, handlers: Handlers) {
        let mut guard = self
            .inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(handlers);
    }

    /// Dispatches an event to its handlers, then to all subscribers.
    pub fn dispatch(&self, event: Event) {
        tracing::debug!(kind = ?event.kind(), "rx {event:?}");

        // Snapshot so handlers run without the lock held.
        let handlers = {
            let guard = self
                .inner
                .handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            Arc::clone(&*guard)
        };
        for handler in handlers.get(event.kind()) {
            handler(&event);
        }

        // No subscribers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to all events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
        }
    }

    /// Waits for the next event of `kind`.
    ///
    /// Returns `None` if the timeout expires or the dispatcher is gone.
    pub async fn wait_for(&self, kind: IncomingKind, timeout: Duration) -> Option<Event> {
        let mut subscription = self.subscribe();

        tokio::select! {
            biased;
            result = async {
                while let Some(event) = subscription.recv().await {
                    if event.kind() == kind {
                        return Some(event);
                    }
                }
                None
            } => result,
            () = tokio::time::sleep(timeout) => None,
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.inner.sender.receiver_count())
            .finish_non_exhaustive()
    }
}
