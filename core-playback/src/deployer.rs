//! # Stream Deployer
//!
//! Turns a resolved [`Track`] into something the voice transport can play.
//!
//! | Source                 | Path                                               | Result   |
//! |------------------------|----------------------------------------------------|----------|
//! | `deezer`               | session → song data → media URL → decrypt → frames | `Frames` |
//! | `spotify`/`applemusic` | ISRC → Deezer id, then the `deezer` path           | `Frames` |
//! | `soundcloud`           | HLS manifest → segment reader → frames             | `Frames` |
//! | `bandcamp`             | page scrape → direct MP3 URL                       | `Uri`    |
//! | `http`                 | `track.uri` as given                               | `Uri`    |
//!
//! Nothing is cached: every call resolves from scratch.

use async_trait::async_trait;
use bridge_traits::{
    media::{Track, TrackSource},
    transcode::Transcoder,
    transport::PlayableSource,
};
use provider_bandcamp::BandcampScraper;
use provider_deezer::MediaFetcher;
use provider_soundcloud::SoundCloudClient;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::{PlaybackError, Result};

/// Produces a playable source for a track.
#[async_trait]
pub trait TrackDeployer: Send + Sync {
    async fn deploy(&self, track: &Track) -> Result<PlayableSource>;
}

/// Source-dispatching [`TrackDeployer`] over the provider crates.
pub struct StreamDeployer {
    fetcher: Arc<MediaFetcher>,
    soundcloud: Option<SoundCloudClient>,
    bandcamp: BandcampScraper,
    transcoder: Arc<dyn Transcoder>,
}

impl StreamDeployer {
    /// `soundcloud` is `None` when no client id is configured; soundcloud
    /// tracks then fail with [`PlaybackError::MissingCredential`].
    pub fn new(
        fetcher: Arc<MediaFetcher>,
        soundcloud: Option<SoundCloudClient>,
        bandcamp: BandcampScraper,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        Self {
            fetcher,
            soundcloud,
            bandcamp,
            transcoder,
        }
    }

    async fn deploy_deezer(&self, track_id: &str) -> Result<PlayableSource> {
        let frames = self.fetcher.fetch_media(track_id).await?;
        Ok(PlayableSource::Frames(frames))
    }

    async fn deploy_by_isrc(&self, track: &Track) -> Result<PlayableSource> {
        let isrc = track
            .isrc
            .as_deref()
            .ok_or_else(|| PlaybackError::MissingField {
                track_id: track.id.clone(),
                field: "isrc",
            })?;

        let deezer_id = self.fetcher.lookup_isrc(isrc).await?;
        debug!(isrc = %isrc, deezer_id = %deezer_id, "Cross-referenced to Deezer");
        self.deploy_deezer(&deezer_id).await
    }

    async fn deploy_soundcloud(&self, track: &Track) -> Result<PlayableSource> {
        let client = self
            .soundcloud
            .as_ref()
            .ok_or(PlaybackError::MissingCredential {
                provider: "soundcloud",
                credential: "client id",
            })?;
        let transcoded_url =
            track
                .transcoded_url
                .as_deref()
                .ok_or_else(|| PlaybackError::MissingField {
                    track_id: track.id.clone(),
                    field: "transcoded url",
                })?;

        let bytes = client.stream(transcoded_url).await?;
        let frames = self
            .transcoder
            .to_frames(bytes)
            .await
            .map_err(PlaybackError::Transcode)?;
        Ok(PlayableSource::Frames(frames))
    }
}

#[async_trait]
impl TrackDeployer for StreamDeployer {
    #[instrument(skip(self, track), fields(track_id = %track.id, source = %track.source))]
    async fn deploy(&self, track: &Track) -> Result<PlayableSource> {
        match track.source {
            TrackSource::Deezer => self.deploy_deezer(&track.id).await,
            TrackSource::Spotify | TrackSource::AppleMusic => self.deploy_by_isrc(track).await,
            TrackSource::SoundCloud => self.deploy_soundcloud(track).await,
            TrackSource::Bandcamp => {
                let url = self.bandcamp.stream_url(&track.uri).await?;
                Ok(PlayableSource::Uri(url))
            }
            TrackSource::Http => Ok(PlayableSource::Uri(track.uri.clone())),
        }
    }
}
