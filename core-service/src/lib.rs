//! Core service façade and bootstrap.
//!
//! This crate wires a validated [`CoreConfig`] into the playback core: one
//! Deezer session shared by every fetch, one stream deployer, and a registry
//! of per-guild players. Desktop bots typically enable the `desktop-shims`
//! feature so the HTTP client and transcoder default to the adapters in
//! `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::transport::JoinRequest;
use core_playback::{Player, PlayerManager, StreamDeployer, TrackDeployer};
use core_runtime::config::CoreConfig;
use core_runtime::events::{EventBus, EventSeverity, EventStream};
use provider_bandcamp::BandcampScraper;
use provider_deezer::{MasterKey, MediaFetcher, SessionManager};
use provider_soundcloud::SoundCloudClient;
use tracing::info;

/// Primary façade exposed to the host bot.
#[derive(Clone)]
pub struct CoreService {
    session: Arc<SessionManager>,
    session_events: EventBus,
    deployer: Arc<dyn TrackDeployer>,
    players: Arc<PlayerManager>,
}

impl CoreService {
    /// Build the pipeline from `config`.
    ///
    /// ```ignore
    /// let config = CoreConfig::builder()
    ///     .deezer_master_key(master_key)
    ///     .voice_connector(connector)
    ///     .build()?;
    /// let core = CoreService::new(config)?;
    /// let player = core.create_player(JoinRequest::new(guild, voice, text)).await?;
    /// ```
    pub fn new(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let master_key = MasterKey::parse(&config.deezer_master_key)
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

        let session_events = EventBus::new(config.event_buffer_size);
        let session = Arc::new(
            SessionManager::new(
                config.http_client.clone(),
                config.deezer_elevated_credential.clone(),
            )
            .with_event_bus(session_events.clone())
            .with_request_timeout(config.request_timeout),
        );

        let fetcher = Arc::new(MediaFetcher::new(
            config.http_client.clone(),
            session.clone(),
            config.transcoder.clone(),
            master_key,
        ));
        let soundcloud = config.soundcloud_client_id.as_ref().map(|client_id| {
            SoundCloudClient::new(config.http_client.clone(), client_id.as_str())
                .with_request_timeout(config.request_timeout)
        });
        let bandcamp = BandcampScraper::new(config.http_client.clone())
            .with_request_timeout(config.request_timeout);

        let deployer: Arc<dyn TrackDeployer> = Arc::new(StreamDeployer::new(
            fetcher,
            soundcloud,
            bandcamp,
            config.transcoder.clone(),
        ));
        let players = PlayerManager::new(config.voice_connector.clone(), deployer.clone())
            .with_event_buffer_size(config.event_buffer_size);

        info!(
            elevated = config.deezer_elevated_credential.is_some(),
            soundcloud = config.soundcloud_client_id.is_some(),
            "Core service initialized"
        );

        Ok(Self {
            session,
            session_events,
            deployer,
            players: Arc::new(players),
        })
    }

    /// Get or create the player for `request.guild_id`.
    pub async fn create_player(&self, request: JoinRequest) -> Result<Arc<Player>> {
        Ok(self.players.create(request).await?)
    }

    pub fn player(&self, guild_id: &str) -> Option<Arc<Player>> {
        self.players.get(guild_id)
    }

    /// Returns `false` when the guild had no player.
    pub async fn destroy_player(&self, guild_id: &str) -> Result<bool> {
        Ok(self.players.destroy(guild_id).await?)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Licensing session lifecycle events.
    pub fn session_events(&self) -> EventStream {
        EventStream::new(self.session_events.subscribe())
    }

    /// Session events at warning severity or above: invalidations and
    /// failed handshakes.
    pub fn session_problems(&self) -> EventStream {
        self.session_events()
            .filter(|event| event.severity() >= EventSeverity::Warning)
    }

    /// Drop the cached licensing session so the next fetch handshakes again.
    ///
    /// Useful after rotating the elevated-entitlement credential.
    pub async fn reset_session(&self) -> bool {
        self.session.clear().await
    }

    /// The deployer players use, for hosts that want to pre-resolve tracks.
    pub fn deployer(&self) -> Arc<dyn TrackDeployer> {
        Arc::clone(&self.deployer)
    }
}
