//! # Host Bridge Traits
//!
//! Seams between the playback core and the things it does not own.
//!
//! ## Overview
//!
//! The core negotiates licensing sessions, decrypts media and drives a player
//! state machine. Everything around that is injected by the host through the
//! traits in this crate:
//!
//! - [`HttpClient`](http::HttpClient) - requests and streaming downloads
//! - [`Transcoder`](transcode::Transcoder) - container bytes to fixed-format PCM frames
//! - [`VoiceConnector`](transport::VoiceConnector) / [`VoiceTransport`](transport::VoiceTransport) - the voice layer
//! - [`LoggerSink`](log::LoggerSink) - mirror structured logs into the host
//!
//! The [`Track`](media::Track) model lives here as well so the resolver side of
//! a bot and the playback core agree on it without depending on each other.
//!
//! ## Error Handling
//!
//! All bridge traits report failures as [`BridgeError`](error::BridgeError).
//! Implementations should convert their native errors and keep the message
//! actionable.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`; the core shares adapters across tasks
//! behind `Arc`.

pub mod error;
pub mod http;
pub mod log;
pub mod media;
pub mod transcode;
pub mod transport;

pub use error::BridgeError;

pub use http::{ByteSource, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{Track, TrackSource};
pub use transcode::{AudioFormat, AudioFrame, AudioFrameStream, EncoderSettings, Transcoder};
pub use transport::{
    AudioResource, ConnectionStatus, DisconnectReason, JoinRequest, PlayableSource, PlayerStatus,
    TransportEvent, VoiceConnector, VoiceTransport,
};
