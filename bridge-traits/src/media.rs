//! Track model shared between the resolver side of the bot and the playback core.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BridgeError;

/// Platform a track was resolved from. Drives the acquisition path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    Deezer,
    SoundCloud,
    Spotify,
    AppleMusic,
    Bandcamp,
    Http,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::Deezer => "deezer",
            TrackSource::SoundCloud => "soundcloud",
            TrackSource::Spotify => "spotify",
            TrackSource::AppleMusic => "applemusic",
            TrackSource::Bandcamp => "bandcamp",
            TrackSource::Http => "http",
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackSource {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deezer" => Ok(TrackSource::Deezer),
            "soundcloud" => Ok(TrackSource::SoundCloud),
            "spotify" => Ok(TrackSource::Spotify),
            "applemusic" => Ok(TrackSource::AppleMusic),
            "bandcamp" => Ok(TrackSource::Bandcamp),
            "http" => Ok(TrackSource::Http),
            other => Err(BridgeError::NotAvailable(format!(
                "Unsupported track source: {}",
                other
            ))),
        }
    }
}

/// A resolved, immutable track.
///
/// `transcoded_url` is the source-specific auxiliary locator (the segmented
/// playlist endpoint for SoundCloud). `requester` is opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    pub uri: String,
    pub artwork_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isrc: Option<String>,
    pub source: TrackSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcoded_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester: Option<String>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
        source: TrackSource,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            duration_ms: 0,
            uri: String::new(),
            artwork_url: String::new(),
            isrc: None,
            source,
            transcoded_url: None,
            requester: None,
        }
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_artwork_url(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = url.into();
        self
    }

    pub fn with_isrc(mut self, isrc: impl Into<String>) -> Self {
        self.isrc = Some(isrc.into());
        self
    }

    pub fn with_transcoded_url(mut self, url: impl Into<String>) -> Self {
        self.transcoded_url = Some(url.into());
        self
    }

    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trips_through_str() {
        for source in [
            TrackSource::Deezer,
            TrackSource::SoundCloud,
            TrackSource::Spotify,
            TrackSource::AppleMusic,
            TrackSource::Bandcamp,
            TrackSource::Http,
        ] {
            assert_eq!(source.as_str().parse::<TrackSource>().unwrap(), source);
        }
        assert!("tidal".parse::<TrackSource>().is_err());
    }

    #[test]
    fn test_track_serializes_camel_case() {
        let track = Track::new("3135556", "Harder, Better, Faster, Stronger", "Daft Punk", TrackSource::Deezer)
            .with_duration_ms(224_000)
            .with_isrc("GBDUW0000059");

        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["durationMs"], 224_000);
        assert_eq!(json["source"], "deezer");
        assert_eq!(json["isrc"], "GBDUW0000059");
        assert!(json.get("transcodedUrl").is_none());
    }
}
