//! # Player
//!
//! One player per guild. It owns the queue, asks the deployer for a source,
//! hands it to the voice transport and reacts to the transport's state
//! changes.
//!
//! ## State Machine
//!
//! The playback status is whatever the transport reports:
//!
//! ```text
//!            play()                 transport               stop(true) / track end
//!  Idle ───────────────> Buffering ──────────> Playing ─────────────────────────> Idle
//!                                               │  ▲
//!                                       pause() │  │ resume()
//!                                               ▼  │
//!                                              Paused
//! ```
//!
//! `Playing → Idle` with tracks left emits `TrackEnd` and plays the next one.
//! Any other transition into `Idle` emits `QueueEnd`.
//!
//! The connection lifecycle runs alongside. A manual disconnect destroys the
//! player; other disconnect reasons are only reported, nothing reconnects.

use bridge_traits::transport::{
    AudioResource, ConnectionStatus, DisconnectReason, PlayerStatus, TransportEvent,
    VoiceTransport,
};
use core_runtime::events::{CoreEvent, EventBus, PlayerEvent, Receiver};
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::deployer::TrackDeployer;
use crate::error::{PlaybackError, Result};
use crate::queue::Queue;

/// Inline volume applied to every resource.
pub const DEFAULT_VOLUME: f32 = 1.0;

/// Chat message showing the current track, tracked for the host bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingMessage {
    pub channel_id: String,
    pub message_id: String,
    #[serde(default)]
    pub deleted: bool,
}

impl NowPlayingMessage {
    pub fn new(channel_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
            deleted: false,
        }
    }
}

/// Clears the deploy flag when `play` returns, on every path.
struct DeployGuard<'a>(&'a AtomicBool);

impl Drop for DeployGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Playback state machine for one guild.
pub struct Player {
    guild_id: String,
    transport: Arc<dyn VoiceTransport>,
    deployer: Arc<dyn TrackDeployer>,
    queue: Mutex<Queue>,
    text_channel: RwLock<String>,
    now_playing_message: RwLock<Option<NowPlayingMessage>>,
    is_playing: AtomicBool,
    deploying: AtomicBool,
    destroyed: AtomicBool,
    event_bus: EventBus,
}

impl Player {
    pub fn new(
        guild_id: impl Into<String>,
        text_channel: impl Into<String>,
        transport: Arc<dyn VoiceTransport>,
        deployer: Arc<dyn TrackDeployer>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            guild_id: guild_id.into(),
            transport,
            deployer,
            queue: Mutex::new(Queue::new()),
            text_channel: RwLock::new(text_channel.into()),
            now_playing_message: RwLock::new(None),
            is_playing: AtomicBool::new(false),
            deploying: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            event_bus,
        }
    }

    pub fn guild_id(&self) -> &str {
        &self.guild_id
    }

    /// Lock the queue.
    ///
    /// Do not hold the guard across an `.await`.
    pub fn queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock()
    }

    pub fn status(&self) -> PlayerStatus {
        self.transport.status()
    }

    pub fn connection_state(&self) -> ConnectionStatus {
        self.transport.connection_status()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Events for this player only.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Play the head of the queue.
    ///
    /// Returns `Ok(false)` without touching the queue when it is empty, when
    /// the transport is `Buffering` or `Paused`, or when another `play` is
    /// still deploying. A deploy failure leaves the failed track as
    /// `current` and does not advance.
    #[instrument(skip(self), fields(guild_id = %self.guild_id))]
    pub async fn play(&self) -> Result<bool> {
        self.ensure_alive()?;

        if self.queue.lock().is_empty() {
            debug!("Queue empty, nothing to play");
            return Ok(false);
        }

        let status = self.transport.status();
        if matches!(status, PlayerStatus::Buffering | PlayerStatus::Paused) {
            debug!(status = %status, "Transport busy, ignoring play");
            return Ok(false);
        }

        if self.deploying.swap(true, Ordering::AcqRel) {
            debug!("Deploy already in flight, ignoring play");
            return Ok(false);
        }
        let _guard = DeployGuard(&self.deploying);

        let Some(track) = self.queue.lock().advance() else {
            return Ok(false);
        };

        let source = match self.deployer.deploy(&track).await {
            Ok(source) => source,
            Err(e) => {
                warn!(track_id = %track.id, error = %e, "Failed to deploy track");
                self.emit_debug(format!("Failed to deploy {}: {}", track.id, e));
                return Err(e);
            }
        };

        let resource = AudioResource::new(source).with_inline_volume(DEFAULT_VOLUME);
        self.transport
            .play(resource)
            .await
            .map_err(PlaybackError::Transport)?;

        info!(track_id = %track.id, source = %track.source, "Track started");
        self.emit(PlayerEvent::TrackStart {
            guild_id: self.guild_id.clone(),
            track,
        });
        self.is_playing.store(true, Ordering::Release);
        Ok(true)
    }

    /// Force-stop the current track.
    ///
    /// The transport's resulting `Playing → Idle` transition advances the
    /// queue through [`handle_transport_event`](Self::handle_transport_event).
    #[instrument(skip(self), fields(guild_id = %self.guild_id))]
    pub async fn skip(&self) -> Result<bool> {
        self.ensure_alive()?;
        self.transport
            .stop(true)
            .await
            .map_err(PlaybackError::Transport)
    }

    /// Pause; a no-op unless the transport is `Playing`.
    pub async fn pause(&self) -> Result<bool> {
        self.ensure_alive()?;
        if self.transport.status() != PlayerStatus::Playing {
            return Ok(false);
        }
        self.transport.pause().await.map_err(PlaybackError::Transport)
    }

    /// Resume; a no-op unless the transport is `Paused`.
    pub async fn resume(&self) -> Result<bool> {
        self.ensure_alive()?;
        if self.transport.status() != PlayerStatus::Paused {
            return Ok(false);
        }
        self.transport.resume().await.map_err(PlaybackError::Transport)
    }

    /// Go back one track.
    ///
    /// Returns early when the host has recorded a previous track. That guard
    /// reads inverted but is kept until the intended behaviour is settled.
    /// Playback never writes `previous` itself, so without a recorded track
    /// this plays the head of the queue. `previous` is cleared afterwards
    /// whatever `play` returned.
    #[instrument(skip(self), fields(guild_id = %self.guild_id))]
    pub async fn play_previous(&self) -> Result<bool> {
        self.ensure_alive()?;

        if self.queue.lock().previous().is_some() {
            return Ok(false);
        }

        let played = self.play().await;
        self.queue.lock().set_previous(None);
        played
    }

    /// Emit `ConnectionTerminated` and release the transport.
    ///
    /// Later calls are no-ops.
    #[instrument(skip(self), fields(guild_id = %self.guild_id))]
    pub async fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        self.is_playing.store(false, Ordering::Release);
        self.emit(PlayerEvent::ConnectionTerminated {
            guild_id: self.guild_id.clone(),
        });
        info!("Player destroyed");

        self.transport
            .destroy()
            .await
            .map_err(PlaybackError::Transport)
    }

    /// Apply one transport event to the state machine.
    pub async fn handle_transport_event(&self, event: TransportEvent) -> Result<()> {
        if self.is_destroyed() {
            return Ok(());
        }

        match event {
            TransportEvent::PlayerStateChanged { old, new } => {
                self.on_player_state(old, new).await
            }
            TransportEvent::ConnectionStateChanged {
                new: ConnectionStatus::Disconnected(reason),
                ..
            } => self.on_disconnect(reason).await,
            TransportEvent::ConnectionStateChanged { .. } => Ok(()),
        }
    }

    async fn on_player_state(&self, old: PlayerStatus, new: PlayerStatus) -> Result<()> {
        debug!(guild_id = %self.guild_id, old = %old, new = %new, "Player state changed");

        if new != PlayerStatus::Idle {
            return Ok(());
        }

        let (has_next, finished) = {
            let queue = self.queue.lock();
            (!queue.is_empty(), queue.current().cloned())
        };

        if old == PlayerStatus::Playing && has_next {
            if let Some(track) = finished {
                self.emit(PlayerEvent::TrackEnd {
                    guild_id: self.guild_id.clone(),
                    track,
                });
            }
            self.play().await?;
            return Ok(());
        }

        self.emit(PlayerEvent::QueueEnd {
            guild_id: self.guild_id.clone(),
        });
        self.is_playing.store(false, Ordering::Release);
        Ok(())
    }

    async fn on_disconnect(&self, reason: DisconnectReason) -> Result<()> {
        if reason == DisconnectReason::Manual {
            return self.destroy().await;
        }

        // No reconnection policy exists yet; report and leave the connection as is.
        warn!(guild_id = %self.guild_id, reason = ?reason, "Voice connection lost");
        self.emit_debug(format!("Voice connection lost: {:?}", reason));
        Ok(())
    }

    pub fn set_text_channel(&self, channel_id: impl Into<String>) -> String {
        let channel_id = channel_id.into();
        *self.text_channel.write() = channel_id.clone();
        channel_id
    }

    pub fn text_channel(&self) -> String {
        self.text_channel.read().clone()
    }

    pub fn set_now_playing_message(&self, message: NowPlayingMessage) -> NowPlayingMessage {
        *self.now_playing_message.write() = Some(message.clone());
        message
    }

    pub fn now_playing_message(&self) -> Option<NowPlayingMessage> {
        self.now_playing_message.read().clone()
    }

    /// Progress through the current track in percent, rounded to two
    /// decimals. `None` without a current track or a known duration.
    pub fn current_playback_percentage(&self) -> Option<f64> {
        let duration_ms = self.queue.lock().current()?.duration_ms;
        if duration_ms == 0 {
            return None;
        }

        let elapsed_ms = self.transport.playback_duration().as_millis() as f64;
        let percent = elapsed_ms / duration_ms as f64 * 100.0;
        Some((percent * 100.0).round() / 100.0)
    }

    pub(crate) fn emit_debug(&self, message: String) {
        self.emit(PlayerEvent::Debug {
            guild_id: Some(self.guild_id.clone()),
            message,
        });
    }

    fn emit(&self, event: PlayerEvent) {
        let _ = self.event_bus.emit(CoreEvent::Player(event));
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(PlaybackError::PlayerDestroyed(self.guild_id.clone()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("guild_id", &self.guild_id)
            .field("queue_size", &self.queue.lock().size())
            .field("is_playing", &self.is_playing())
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}
