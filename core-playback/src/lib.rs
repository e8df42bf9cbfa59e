//! # Playback Core
//!
//! Queue, stream deployment and the per-guild player state machine.
//!
//! ## Overview
//!
//! - [`Queue`]: pending tracks plus `current`/`previous`
//! - [`StreamDeployer`]: turns a [`Track`](bridge_traits::Track) into frames or a URI,
//!   dispatching on its source
//! - [`Player`]: drives one voice transport and emits [`PlayerEvent`](core_runtime::events::PlayerEvent)s
//! - [`PlayerManager`]: get-or-create registry with one event pump per player
//!
//! ## Usage
//!
//! ```ignore
//! let manager = PlayerManager::new(connector, Arc::new(deployer));
//! let player = manager.create(JoinRequest::new(guild, voice, text)).await?;
//!
//! player.queue().add(track);
//! player.play().await?;
//! ```

pub mod deployer;
pub mod error;
pub mod manager;
pub mod player;
pub mod queue;

pub use deployer::{StreamDeployer, TrackDeployer};
pub use error::{PlaybackError, Result};
pub use manager::PlayerManager;
pub use player::{NowPlayingMessage, Player, DEFAULT_VOLUME};
pub use queue::Queue;
