//! Voice transport seam.
//!
//! The transport is the external voice layer: it establishes the connection,
//! encodes and ships audio, and reports connection and player state changes.
//! The core only hands it a [`AudioResource`] and reacts to [`TransportEvent`]s.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::transcode::AudioFrameStream;

/// Playback status as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerStatus {
    Idle,
    Buffering,
    Playing,
    Paused,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Buffering => "buffering",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Why a voice connection dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The bot was removed from the channel on purpose.
    Manual,
    /// The voice gateway closed with the given code.
    WebSocketClose(u16),
    /// The host adapter went away.
    AdapterUnavailable,
    /// The voice endpoint was removed by the server.
    EndpointRemoved,
}

/// Connection status as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Signalling,
    Connecting,
    Ready,
    Disconnected(DisconnectReason),
    Destroyed,
}

/// State change notifications pushed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    PlayerStateChanged {
        old: PlayerStatus,
        new: PlayerStatus,
    },
    ConnectionStateChanged {
        old: ConnectionStatus,
        new: ConnectionStatus,
    },
}

/// What the transport should play.
#[derive(Debug)]
pub enum PlayableSource {
    /// Decoded frames ready for the transport's encoder.
    Frames(AudioFrameStream),
    /// A URI the transport probes and decodes on its own.
    Uri(String),
}

impl PlayableSource {
    pub fn is_uri(&self) -> bool {
        matches!(self, PlayableSource::Uri(_))
    }
}

/// A playable source plus per-resource playback options.
#[derive(Debug)]
pub struct AudioResource {
    pub source: PlayableSource,
    /// Inline volume multiplier; `None` disables the volume transformer
    pub inline_volume: Option<f32>,
}

impl AudioResource {
    pub fn new(source: PlayableSource) -> Self {
        Self {
            source,
            inline_volume: None,
        }
    }

    pub fn with_inline_volume(mut self, volume: f32) -> Self {
        self.inline_volume = Some(volume);
        self
    }
}

/// One live voice connection with its audio player.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Current player status.
    fn status(&self) -> PlayerStatus;

    /// Current connection status.
    fn connection_status(&self) -> ConnectionStatus;

    /// Start playing `resource`, replacing whatever is playing.
    async fn play(&self, resource: AudioResource) -> Result<()>;

    /// Returns `true` if the player was paused.
    async fn pause(&self) -> Result<bool>;

    /// Returns `true` if the player was resumed.
    async fn resume(&self) -> Result<bool>;

    /// Stop the current resource. With `force` the transport skips its
    /// silence padding and goes straight to idle.
    async fn stop(&self, force: bool) -> Result<bool>;

    /// How long the current resource has been playing.
    fn playback_duration(&self) -> Duration;

    /// Tear down the voice connection.
    async fn destroy(&self) -> Result<()>;

    /// Receive future state change events.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Where and how to join a voice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRequest {
    pub guild_id: String,
    pub channel_id: String,
    /// Channel that receives now-playing and error messages.
    pub text_channel: String,
    pub self_deaf: bool,
    /// Voice channel bitrate in bits per second
    pub bitrate: Option<u32>,
}

impl JoinRequest {
    pub fn new(
        guild_id: impl Into<String>,
        channel_id: impl Into<String>,
        text_channel: impl Into<String>,
    ) -> Self {
        Self {
            guild_id: guild_id.into(),
            channel_id: channel_id.into(),
            text_channel: text_channel.into(),
            self_deaf: true,
            bitrate: None,
        }
    }

    pub fn with_self_deaf(mut self, self_deaf: bool) -> Self {
        self.self_deaf = self_deaf;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = Some(bitrate);
        self
    }
}

/// Factory that joins voice channels.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn join(&self, request: &JoinRequest) -> Result<std::sync::Arc<dyn VoiceTransport>>;
}
