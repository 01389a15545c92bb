//! Subscriber registry and best-effort fan-out.
//!
//! The [`BroadcastHub`] is the only state shared between the packet loop and the
//! connection tasks. Registration and removal go through a sharded
//! [`DashMap`]; [`publish`](BroadcastHub::publish) takes a snapshot of the
//! registry and hands the encoded message to every subscriber's
//! [`SubscriberSink`] without waiting on any of them.
//!
//! Delivery policy:
//! - a full subscriber queue loses this message for that subscriber only
//! - a closed subscriber is deregistered on the spot
//! - nothing is queued for late joiners and nothing is retried
//!
//! Each [`SubscriberConnection`] moves `Connecting → Open → Closed`; `Closed`
//! is terminal.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace, warn};

use crate::types::Reading;

/// Process-unique subscriber identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Lifecycle of a subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport handshake in progress, not yet receiving
    Connecting,
    /// Registered with the hub and receiving readings
    Open,
    /// Terminal; the client must reconnect to receive again
    Closed,
}

impl ConnectionState {
    const fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Open => 1,
            ConnectionState::Closed => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// One encoded reading, serialized once and shared by every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage(Arc<str>);

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OutboundMessage {
    fn from(text: String) -> Self {
        Self(text.into())
    }
}

/// Why a single delivery attempt failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber cannot accept a message right now; this one is lost
    #[error("subscriber queue is full")]
    Full,
    /// The subscriber is gone
    #[error("subscriber connection is closed")]
    Closed,
}

/// Non-blocking delivery endpoint for one subscriber.
pub trait SubscriberSink: Send + Sync + 'static {
    /// Hand over a message without waiting.
    fn try_deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Sink backed by a bounded tokio channel, drained by the connection's writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<OutboundMessage>,
}

impl ChannelSink {
    /// Create a sink and the receiver its writer task drains.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl SubscriberSink for ChannelSink {
    fn try_deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.tx.try_send(message.clone()).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Full,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// A live real-time consumer as tracked by the hub.
#[derive(Clone)]
pub struct SubscriberConnection {
    id: SubscriberId,
    state: Arc<AtomicU8>,
    sink: Arc<dyn SubscriberSink>,
}

impl SubscriberConnection {
    /// New connection in the `Connecting` state.
    pub fn new(id: SubscriberId, sink: Arc<dyn SubscriberSink>) -> Self {
        Self { id, state: Arc::new(AtomicU8::new(ConnectionState::Connecting.to_u8())), sink }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Connecting → Open`. Fails only if the connection is already closed.
    fn open(&self) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                match ConnectionState::from_u8(raw) {
                    ConnectionState::Closed => None,
                    _ => Some(ConnectionState::Open.to_u8()),
                }
            })
            .is_ok()
    }

    fn close(&self) {
        self.state.store(ConnectionState::Closed.to_u8(), Ordering::Release);
    }
}

impl fmt::Debug for SubscriberConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Registry size at snapshot time
    pub recipients: usize,
    pub delivered: usize,
    /// Lost because the subscriber's queue was full
    pub dropped: usize,
    /// Deregistered because the subscriber was closed
    pub removed: usize,
}

/// Registry of live subscribers and the fan-out over them.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    subscribers: DashMap<SubscriberId, SubscriberConnection>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identifier for a new connection.
    pub fn next_subscriber_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a connection and move it to `Open`.
    ///
    /// Returns `false` without changing anything when the id is already
    /// registered or the connection has been closed.
    pub fn register(&self, connection: SubscriberConnection) -> bool {
        match self.subscribers.entry(connection.id) {
            Entry::Occupied(_) => {
                trace!(subscriber = %connection.id, "Subscriber already registered");
                false
            }
            Entry::Vacant(slot) => {
                if !connection.open() {
                    debug!(subscriber = %connection.id, "Refusing to register closed subscriber");
                    return false;
                }
                let id = connection.id;
                slot.insert(connection);
                info!(subscriber = %id, "Subscriber registered");
                true
            }
        }
    }

    /// Remove a connection and mark it `Closed`. No-op when absent.
    pub fn deregister(&self, id: SubscriberId) -> bool {
        match self.subscribers.remove(&id) {
            Some((_, connection)) => {
                connection.close();
                info!(subscriber = %id, remaining = self.subscribers.len(), "Subscriber deregistered");
                true
            }
            None => false,
        }
    }

    /// Encode `reading` once and deliver it to every current subscriber.
    pub fn publish(&self, reading: &Reading) -> PublishReport {
        match reading.to_json() {
            Ok(json) => self.broadcast(&OutboundMessage::from(json)),
            Err(e) => {
                warn!(error = %e, "Failed to encode reading, skipping");
                PublishReport::default()
            }
        }
    }

    /// Deliver an already encoded message to every current subscriber.
    pub fn broadcast(&self, message: &OutboundMessage) -> PublishReport {
        // Snapshot so no shard lock is held while sinks run
        let snapshot: Vec<SubscriberConnection> =
            self.subscribers.iter().map(|entry| entry.value().clone()).collect();

        let mut report = PublishReport { recipients: snapshot.len(), ..PublishReport::default() };

        for connection in &snapshot {
            if connection.state() == ConnectionState::Closed {
                if self.deregister(connection.id) {
                    report.removed += 1;
                }
                continue;
            }

            match connection.sink.try_deliver(message) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Full) => {
                    report.dropped += 1;
                    debug!(subscriber = %connection.id, "Subscriber queue full, message dropped");
                }
                Err(DeliveryError::Closed) => {
                    warn!(subscriber = %connection.id, "Delivery failed, subscriber closed");
                    if self.deregister(connection.id) {
                        report.removed += 1;
                    }
                }
            }
        }

        trace!(
            recipients = report.recipients,
            delivered = report.delivered,
            dropped = report.dropped,
            removed = report.removed,
            "Broadcast complete"
        );
        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.contains_key(&id)
    }
}
