//! # Core Configuration Module
//!
//! Builder for [`CoreConfig`], the bundle of bridges and settings the
//! playback core is started with. Validation is fail-fast: `build()` rejects
//! malformed keys, missing bridges and unsupported encoder formats before any
//! player exists.
//!
//! ## Required
//!
//! - `deezer_master_key` - 16-character key used to derive per-track cipher keys
//! - `VoiceConnector` - joins voice channels and hands back transports
//!
//! ## Optional (with platform defaults)
//!
//! - `HttpClient` - desktop default: reqwest
//! - `Transcoder` - desktop default: ffmpeg child process
//!
//! Without the `desktop-shims` feature both of these must be injected.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .deezer_master_key("g4el58wc0zvf9na1")
//!     .deezer_elevated_credential(std::env::var("DEEZER_ARL")?)
//!     .soundcloud_client_id("client-id")
//!     .voice_connector(Arc::new(MyVoiceConnector))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
pub use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    transcode::{EncoderSettings, CHANNELS, FRAME_SAMPLES, SAMPLE_RATE},
    HttpClient, Transcoder, VoiceConnector,
};
use std::sync::Arc;
use std::time::Duration;

/// Length of the Deezer master key in characters.
pub const MASTER_KEY_LEN: usize = 16;

/// Default network-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Core configuration for the playback pipeline.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Key mixed into every per-track Blowfish key
    pub deezer_master_key: String,

    /// ARL cookie unlocking full-length media URLs
    pub deezer_elevated_credential: Option<String>,

    /// Public client id for the SoundCloud API
    pub soundcloud_client_id: Option<String>,

    pub http_client: Arc<dyn HttpClient>,

    pub transcoder: Arc<dyn Transcoder>,

    pub voice_connector: Arc<dyn VoiceConnector>,

    /// Frame format handed to the transport's encoder
    pub encoder_settings: EncoderSettings,

    pub request_timeout: Duration,

    /// Capacity of each player's event channel
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("deezer_master_key", &"[REDACTED]")
            .field(
                "deezer_elevated_credential",
                &self.deezer_elevated_credential.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "soundcloud_client_id",
                &self.soundcloud_client_id.as_ref().map(|_| "[REDACTED]"),
            )
            .field("http_client", &"HttpClient { ... }")
            .field("transcoder", &"Transcoder { ... }")
            .field("voice_connector", &"VoiceConnector { ... }")
            .field("encoder_settings", &self.encoder_settings)
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The master key is 16 characters, each in U+0000..=U+00FF
    /// - The elevated credential, if present, is not empty
    /// - The encoder settings match the transport's fixed frame format
    /// - Timeout and buffer sizes are non-zero
    pub fn validate(&self) -> Result<()> {
        validate_master_key(&self.deezer_master_key)?;

        if let Some(arl) = &self.deezer_elevated_credential {
            if arl.trim().is_empty() {
                return Err(Error::Config(
                    "Deezer elevated credential cannot be empty".to_string(),
                ));
            }
        }

        if let Some(client_id) = &self.soundcloud_client_id {
            if client_id.trim().is_empty() {
                return Err(Error::Config(
                    "SoundCloud client id cannot be empty".to_string(),
                ));
            }
        }

        let format = self.encoder_settings.format;
        if format.sample_rate != SAMPLE_RATE
            || format.channels != CHANNELS
            || format.frame_samples != FRAME_SAMPLES
        {
            return Err(Error::Config(format!(
                "Unsupported encoder format {} Hz / {} ch / {} samples; the transport requires {} Hz / {} ch / {} samples",
                format.sample_rate,
                format.channels,
                format.frame_samples,
                SAMPLE_RATE,
                CHANNELS,
                FRAME_SAMPLES
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_master_key(key: &str) -> Result<()> {
    let len = key.chars().count();
    if len != MASTER_KEY_LEN {
        return Err(Error::Config(format!(
            "Deezer master key must be {} characters, got {}",
            MASTER_KEY_LEN, len
        )));
    }

    if let Some(c) = key.chars().find(|c| u32::from(*c) > 0xFF) {
        return Err(Error::Config(format!(
            "Deezer master key contains a character outside Latin-1: U+{:04X}",
            u32::from(c)
        )));
    }

    Ok(())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::try_with_config(
        timeout,
        bridge_desktop::DEFAULT_USER_AGENT,
    )
    .map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: format!("Failed to build the default reqwest client: {}", e),
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client provided. Inject one with .http_client() or enable \
                  the `desktop-shims` feature."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_transcoder(settings: EncoderSettings) -> Result<Arc<dyn Transcoder>> {
    Ok(Arc::new(bridge_desktop::FfmpegTranscoder::new(settings)))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_transcoder(_settings: EncoderSettings) -> Result<Arc<dyn Transcoder>> {
    Err(Error::CapabilityMissing {
        capability: "Transcoder".to_string(),
        message: "No transcoder provided. Inject one with .transcoder() or enable \
                  the `desktop-shims` feature."
            .to_string(),
    })
}

/// Builder for constructing a [`CoreConfig`] with validation.
#[derive(Default)]
pub struct CoreConfigBuilder {
    deezer_master_key: Option<String>,
    deezer_elevated_credential: Option<String>,
    soundcloud_client_id: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    transcoder: Option<Arc<dyn Transcoder>>,
    voice_connector: Option<Arc<dyn VoiceConnector>>,
    encoder_settings: Option<EncoderSettings>,
    request_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the Deezer master key (required).
    pub fn deezer_master_key(mut self, key: impl Into<String>) -> Self {
        self.deezer_master_key = Some(key.into());
        self
    }

    /// Sets the ARL cookie used during the session handshake.
    ///
    /// Without it the gateway hands out an anonymous session whose license
    /// token only unlocks previews.
    pub fn deezer_elevated_credential(mut self, arl: impl Into<String>) -> Self {
        self.deezer_elevated_credential = Some(arl.into());
        self
    }

    pub fn soundcloud_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.soundcloud_client_id = Some(client_id.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided and the `desktop-shims` feature is enabled, a
    /// reqwest-based client using the configured request timeout is created.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the transcoder implementation.
    ///
    /// If not provided and the `desktop-shims` feature is enabled, an
    /// ffmpeg-backed transcoder is created.
    pub fn transcoder(mut self, transcoder: Arc<dyn Transcoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Sets the voice connector (required).
    pub fn voice_connector(mut self, connector: Arc<dyn VoiceConnector>) -> Self {
        self.voice_connector = Some(connector);
        self
    }

    pub fn encoder_settings(mut self, settings: EncoderSettings) -> Self {
        self.encoder_settings = Some(settings);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the `CoreConfig`, validating all required fields.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a value is malformed or out of range
    /// - [`Error::CapabilityMissing`] if a required bridge is absent and no
    ///   platform default is available
    pub fn build(self) -> Result<CoreConfig> {
        let deezer_master_key = self
            .deezer_master_key
            .ok_or_else(|| Error::Config("Deezer master key is required".to_string()))?;

        let voice_connector = self.voice_connector.ok_or_else(|| Error::CapabilityMissing {
            capability: "VoiceConnector".to_string(),
            message: "No voice connector provided. The host must inject one with \
                      .voice_connector(); there is no platform default."
                .to_string(),
        })?;

        let encoder_settings = self.encoder_settings.unwrap_or_default();
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let transcoder = match self.transcoder {
            Some(transcoder) => transcoder,
            None => provide_default_transcoder(encoder_settings)?,
        };

        let config = CoreConfig {
            deezer_master_key,
            deezer_elevated_credential: self.deezer_elevated_credential,
            soundcloud_client_id: self.soundcloud_client_id,
            http_client,
            transcoder,
            voice_connector,
            encoder_settings,
            request_timeout,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}
