//! SoundCloud stream client
//!
//! Turns a track's transcoding URL into a single byte reader over its HLS
//! segments.

use bridge_traits::http::{ByteSource, HttpClient, HttpRequest};
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, instrument};
use url::Url;

use crate::error::{Result, SoundCloudError};
use crate::hls::{parse_playlist, Playlist};

/// Default timeout for API and playlist requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Response of a transcoding URL
#[derive(Debug, Deserialize)]
struct StreamLocator {
    url: String,
}

/// SoundCloud API client
///
/// # Example
///
/// ```ignore
/// use provider_soundcloud::SoundCloudClient;
///
/// let client = SoundCloudClient::new(http_client, client_id);
/// let bytes = client.stream(&track.transcoded_url.unwrap()).await?;
/// ```
pub struct SoundCloudClient {
    http_client: Arc<dyn HttpClient>,
    client_id: String,
    request_timeout: Duration,
}

impl SoundCloudClient {
    pub fn new(http_client: Arc<dyn HttpClient>, client_id: impl Into<String>) -> Self {
        Self {
            http_client,
            client_id: client_id.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Open a lazily chained reader over every segment of the track.
    #[instrument(skip(self, transcoded_url))]
    pub async fn stream(&self, transcoded_url: &str) -> Result<ByteSource> {
        let manifest = self.resolve_manifest_url(transcoded_url).await?;
        let segments = self.segments(&manifest).await?;
        debug!(segments = segments.len(), "Playlist resolved");
        Ok(segment_reader(self.http_client.clone(), segments))
    }

    /// Exchange the transcoding URL for the signed playlist URL.
    pub async fn resolve_manifest_url(&self, transcoded_url: &str) -> Result<Url> {
        let mut url = parse_url(transcoded_url)?;
        url.query_pairs_mut().append_pair("client_id", &self.client_id);

        let locator: StreamLocator = self.get(url.as_str()).await?.json().map_err(|e| {
            SoundCloudError::ParseError(format!("transcoding response: {}", e))
        })?;

        parse_url(&locator.url)
    }

    /// Segment URLs of the playlist at `manifest`, following one level of
    /// master playlist.
    pub async fn segments(&self, manifest: &Url) -> Result<Vec<Url>> {
        match self.playlist(manifest).await? {
            Playlist::Media { segments } => Ok(segments),
            Playlist::Master { variants } => {
                let variant = variants.into_iter().next().ok_or(SoundCloudError::EmptyPlaylist)?;
                debug!(variant = %variant, "Following master playlist");
                match self.playlist(&variant).await? {
                    Playlist::Media { segments } => Ok(segments),
                    Playlist::Master { .. } => Err(SoundCloudError::UnsupportedPlaylist(
                        "nested master playlists".to_string(),
                    )),
                }
            }
        }
    }

    async fn playlist(&self, url: &Url) -> Result<Playlist> {
        let body = self.get(url.as_str()).await?.text()?;
        parse_playlist(&body, url)
    }

    async fn get(&self, url: &str) -> Result<bridge_traits::http::HttpResponse> {
        let request = HttpRequest::get(url).timeout(self.request_timeout);
        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            return Err(SoundCloudError::ApiError {
                status_code: response.status,
                message: response.text().unwrap_or_default(),
            });
        }
        Ok(response)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| SoundCloudError::InvalidUrl {
        url: raw.to_string(),
        message: e.to_string(),
    })
}

/// Concatenate segment downloads into one reader.
///
/// Each segment is requested only when the previous one is exhausted, so at
/// most one download is open at a time.
pub fn segment_reader(http_client: Arc<dyn HttpClient>, segments: Vec<Url>) -> ByteSource {
    let chunks = futures::stream::iter(segments)
        .then(move |segment| {
            let http_client = http_client.clone();
            async move {
                http_client
                    .download_stream(segment.to_string())
                    .await
                    .map_err(io::Error::other)
            }
        })
        .map_ok(ReaderStream::new)
        .try_flatten();

    Box::new(StreamReader::new(Box::pin(chunks)))
}
