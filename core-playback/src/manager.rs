//! # Player Manager
//!
//! Registry of live players keyed by guild id.
//!
//! Each player created here gets an event pump: a task that forwards the
//! transport's [`TransportEvent`]s into
//! [`Player::handle_transport_event`] one at a time, and drops the player from
//! the registry once it is destroyed.

use bridge_traits::transport::{JoinRequest, TransportEvent, VoiceConnector};
use core_runtime::events::{EventBus, Receiver, RecvError, DEFAULT_EVENT_BUFFER_SIZE};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

use crate::deployer::TrackDeployer;
use crate::error::{PlaybackError, Result};
use crate::player::Player;

type Registry = RwLock<HashMap<String, Arc<Player>>>;

/// Creates, tracks and tears down players.
pub struct PlayerManager {
    connector: Arc<dyn VoiceConnector>,
    deployer: Arc<dyn TrackDeployer>,
    players: Arc<Registry>,
    event_buffer_size: usize,
}

impl PlayerManager {
    pub fn new(connector: Arc<dyn VoiceConnector>, deployer: Arc<dyn TrackDeployer>) -> Self {
        Self {
            connector,
            deployer,
            players: Arc::new(RwLock::new(HashMap::new())),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    /// Return the guild's player, joining the voice channel first if there
    /// is none yet.
    ///
    /// Must be called inside a Tokio runtime; the event pump is spawned on it.
    #[instrument(skip(self, request), fields(guild_id = %request.guild_id))]
    pub async fn create(&self, request: JoinRequest) -> Result<Arc<Player>> {
        if let Some(player) = self.get(&request.guild_id) {
            return Ok(player);
        }

        let transport = self
            .connector
            .join(&request)
            .await
            .map_err(PlaybackError::Transport)?;
        let events = transport.subscribe();

        let player = Arc::new(Player::new(
            request.guild_id.clone(),
            request.text_channel.clone(),
            transport.clone(),
            self.deployer.clone(),
            EventBus::new(self.event_buffer_size),
        ));

        let existing = {
            let mut players = self.players.write();
            match players.get(&request.guild_id) {
                Some(existing) => Some(existing.clone()),
                None => {
                    players.insert(request.guild_id.clone(), player.clone());
                    None
                }
            }
        };

        if let Some(existing) = existing {
            // Lost a race with a concurrent create for the same guild.
            debug!("Player created concurrently, releasing duplicate connection");
            if let Err(e) = transport.destroy().await {
                warn!(error = %e, "Failed to release duplicate connection");
            }
            return Ok(existing);
        }

        tokio::spawn(run_event_pump(
            player.clone(),
            events,
            Arc::downgrade(&self.players),
        ));

        info!(channel_id = %request.channel_id, "Player created");
        Ok(player)
    }

    pub fn get(&self, guild_id: &str) -> Option<Arc<Player>> {
        self.players.read().get(guild_id).cloned()
    }

    /// Destroy and unregister the guild's player.
    ///
    /// Returns `false` when the guild had no player.
    pub async fn destroy(&self, guild_id: &str) -> Result<bool> {
        let Some(player) = self.players.write().remove(guild_id) else {
            return Ok(false);
        };
        player.destroy().await?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }
}

async fn run_event_pump(
    player: Arc<Player>,
    mut events: Receiver<TransportEvent>,
    registry: Weak<Registry>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Err(e) = player.handle_transport_event(event).await {
                    warn!(guild_id = %player.guild_id(), error = %e, "Transport event handling failed");
                    player.emit_debug(e.to_string());
                }
                if player.is_destroyed() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(guild_id = %player.guild_id(), skipped, "Transport events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }

    if let Some(registry) = registry.upgrade() {
        let mut players = registry.write();
        if players
            .get(player.guild_id())
            .is_some_and(|registered| Arc::ptr_eq(registered, &player))
        {
            players.remove(player.guild_id());
        }
    }
    debug!(guild_id = %player.guild_id(), "Event pump stopped");
}
