//! # Event Bus System
//!
//! Typed events on top of `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! Every player owns its own [`EventBus`], so a bot subscribes per guild and
//! never has to demultiplex a global stream. Session lifecycle events from the
//! licensing backend go to a separate, service-wide bus.
//!
//! ```text
//! ┌────────────┐  emit   ┌──────────────┐  subscribe  ┌─────────────┐
//! │ Player (g1)├────────>│ EventBus (g1)├────────────>│ bot handler │
//! └────────────┘         └──────────────┘             └─────────────┘
//! ┌────────────┐  emit   ┌──────────────┐  subscribe  ┌─────────────┐
//! │ Session    ├────────>│ EventBus     ├────────────>│ diagnostics │
//! └────────────┘         └──────────────┘             └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlayerEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Player(PlayerEvent::QueueEnd {
//!     guild_id: "1234".to_string(),
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.description(), "Queue ended");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep receiving.
//! - **`RecvError::Closed`**: every sender is gone; the player was dropped.
//!
//! Emitting with no subscribers returns `Err`; emitters ignore it.

use bridge_traits::media::Track;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for an event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Per-guild player events
    Player(PlayerEvent),
    /// Licensing session lifecycle
    Session(SessionEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Player(e) => e.description(),
            CoreEvent::Session(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::HandshakeFailed { .. }) => EventSeverity::Error,
            CoreEvent::Session(SessionEvent::Invalidated { .. }) => EventSeverity::Warning,
            CoreEvent::Player(PlayerEvent::TrackStuck { .. }) => EventSeverity::Warning,
            CoreEvent::Player(PlayerEvent::TrackStart { .. })
            | CoreEvent::Player(PlayerEvent::ConnectionTerminated { .. })
            | CoreEvent::Session(SessionEvent::Established { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Guild the event belongs to, if any.
    pub fn guild_id(&self) -> Option<&str> {
        match self {
            CoreEvent::Player(e) => e.guild_id(),
            CoreEvent::Session(_) => None,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Player Events
// ============================================================================

/// Events raised by a guild's player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    /// A track was handed to the transport.
    TrackStart { guild_id: String, track: Track },
    /// The transport finished a track and another one is queued.
    TrackEnd { guild_id: String, track: Track },
    /// The transport went idle with nothing left to play.
    QueueEnd { guild_id: String },
    /// Reserved for transports that detect stalled playback.
    TrackStuck { guild_id: String, track: Track },
    /// The voice connection was released.
    ConnectionTerminated { guild_id: String },
    /// Free-form diagnostic message.
    Debug {
        guild_id: Option<String>,
        message: String,
    },
}

impl PlayerEvent {
    fn description(&self) -> &str {
        match self {
            PlayerEvent::TrackStart { .. } => "Track started",
            PlayerEvent::TrackEnd { .. } => "Track ended",
            PlayerEvent::QueueEnd { .. } => "Queue ended",
            PlayerEvent::TrackStuck { .. } => "Track stuck",
            PlayerEvent::ConnectionTerminated { .. } => "Connection terminated",
            PlayerEvent::Debug { .. } => "Debug",
        }
    }

    fn guild_id(&self) -> Option<&str> {
        match self {
            PlayerEvent::TrackStart { guild_id, .. }
            | PlayerEvent::TrackEnd { guild_id, .. }
            | PlayerEvent::QueueEnd { guild_id }
            | PlayerEvent::TrackStuck { guild_id, .. }
            | PlayerEvent::ConnectionTerminated { guild_id } => Some(guild_id),
            PlayerEvent::Debug { guild_id, .. } => guild_id.as_deref(),
        }
    }
}

// ============================================================================
// Session Events
// ============================================================================

/// Licensing session lifecycle. Never carries tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// The ping/getUserData handshake started.
    Establishing,
    /// Tokens are cached and ready.
    Established { high_quality_eligible: bool },
    /// Cached tokens were dropped after a downstream rejection.
    Invalidated { reason: String },
    /// A handshake call failed.
    HandshakeFailed { step: String, message: String },
}

impl SessionEvent {
    fn description(&self) -> &str {
        match self {
            SessionEvent::Establishing => "Session handshake started",
            SessionEvent::Established { .. } => "Session established",
            SessionEvent::Invalidated { .. } => "Session invalidated",
            SessionEvent::HandshakeFailed { .. } => "Session handshake failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel for [`CoreEvent`]s.
///
/// Cloning the bus yields another sender on the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// when nobody is listening.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventSeverity, EventStream};
///
/// let bus = EventBus::default();
/// let warnings = EventStream::new(bus.subscribe())
///     .filter(|event| event.severity() >= EventSeverity::Warning);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next matching event.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once all senders are dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns `None` if no matching event is currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
