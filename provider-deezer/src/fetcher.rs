//! # Media Fetcher
//!
//! Resolves a Deezer track id to playable frames:
//!
//! ```text
//! ensure_session → song.getData → get_url → download → decrypt → transcode
//! ```
//!
//! Each step waits for the previous one. Decryption runs as a
//! [`StripeDecoder`] over the download stream and the transcoder pulls from
//! that stream, so nothing buffers the whole file.
//!
//! Any licensing failure drops the cached session before the error is
//! returned; the failing call itself is not retried.

use bridge_traits::{
    http::{ByteSource, HttpClient, HttpRequest},
    transcode::{AudioFrameStream, Transcoder},
};
use std::sync::Arc;
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::{debug, info, instrument, warn};

use crate::cipher::{derive_key, MasterKey, StripeDecoder};
use crate::error::{DeezerError, Result};
use crate::session::{gateway_results, SessionManager, SessionState};
use crate::types::{
    GatewayMethod, IsrcTrack, MediaFormat, MediaUrlRequest, MediaUrlResponse, SongData,
    SongDataRequest,
};

/// Signed media URL endpoint
pub const MEDIA_URL_ENDPOINT: &str = "https://media.deezer.com/v1/get_url";

/// Public track API
pub const PUBLIC_API_BASE: &str = "https://api.deezer.com";

/// Deezer acquisition pipeline.
///
/// # Example
///
/// ```ignore
/// use provider_deezer::{MasterKey, MediaFetcher, SessionManager};
///
/// let session = Arc::new(SessionManager::new(http_client.clone(), Some(arl)));
/// let fetcher = MediaFetcher::new(http_client, session, transcoder, MasterKey::parse(key)?);
/// let frames = fetcher.fetch_media("3135556").await?;
/// ```
pub struct MediaFetcher {
    http_client: Arc<dyn HttpClient>,
    session: Arc<SessionManager>,
    transcoder: Arc<dyn Transcoder>,
    master_key: MasterKey,
}

impl MediaFetcher {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        session: Arc<SessionManager>,
        transcoder: Arc<dyn Transcoder>,
        master_key: MasterKey,
    ) -> Self {
        Self {
            http_client,
            session,
            transcoder,
            master_key,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Fetch, decrypt and transcode one track.
    #[instrument(skip(self), fields(track_id = %track_id))]
    pub async fn fetch_media(&self, track_id: &str) -> Result<AudioFrameStream> {
        let decrypted = self.fetch_decrypted(track_id).await?;
        let frames = self.transcoder.to_frames(decrypted).await?;
        debug!("Frame stream ready");
        Ok(frames)
    }

    /// Fetch and decrypt one track, returning the plain container bytes.
    #[instrument(skip(self), fields(track_id = %track_id))]
    pub async fn fetch_decrypted(&self, track_id: &str) -> Result<ByteSource> {
        let (song, url) = match self.resolve_media_url(track_id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                if e.is_licensing() {
                    self.session.invalidate(&e.to_string()).await;
                }
                return Err(e);
            }
        };

        let encrypted = self.http_client.download_stream(url).await?;
        let key = derive_key(&song.sng_id, &self.master_key);
        let decrypted = StreamReader::new(FramedRead::new(encrypted, StripeDecoder::new(key)));

        info!(sng_id = %song.sng_id, "Streaming decrypted media");
        Ok(Box::new(decrypted))
    }

    async fn resolve_media_url(&self, track_id: &str) -> Result<(SongData, String)> {
        let state = self.session.ensure_session().await?;
        let song = self.song_data(&state, track_id).await?;
        let format = choose_format(&song, &state);
        debug!(format = %format, filesize_mp3_320 = song.filesize_mp3_320, "Requesting media URL");
        let url = self.media_url(&state, &song, format).await?;
        Ok((song, url))
    }

    async fn song_data(&self, state: &SessionState, track_id: &str) -> Result<SongData> {
        let method = GatewayMethod::SongGetData;
        let request = self
            .session
            .build_authenticated_request(method, state)
            .json(&SongDataRequest { sng_id: track_id })?;

        let response = self.http_client.execute(request).await?;
        gateway_results(&response).map_err(|message| DeezerError::Gateway {
            method: method.as_str().to_string(),
            message,
        })
    }

    async fn media_url(
        &self,
        state: &SessionState,
        song: &SongData,
        format: MediaFormat,
    ) -> Result<String> {
        let request = HttpRequest::post(MEDIA_URL_ENDPOINT)
            .json(&MediaUrlRequest::single(
                &state.license_token,
                &song.track_token,
                format,
            ))?
            .timeout(self.session.request_timeout());

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(status = response.status, "Media URL request rejected");
            return Err(DeezerError::MediaUrlRejected {
                message: format!("HTTP {} {}", response.status, body.trim()),
            });
        }

        let parsed: MediaUrlResponse = response.json()?;
        let errors = parsed.error_messages();
        if !errors.is_empty() {
            warn!(errors = errors.len(), "Media URL request returned errors");
            return Err(DeezerError::MediaUrlRejected {
                message: errors.join("; "),
            });
        }

        parsed
            .first_url()
            .map(str::to_string)
            .ok_or_else(|| DeezerError::MediaUrlRejected {
                message: "no download source returned".to_string(),
            })
    }

    /// Map an ISRC to a Deezer track id.
    #[instrument(skip(self), fields(isrc = %isrc))]
    pub async fn lookup_isrc(&self, isrc: &str) -> Result<String> {
        let request = HttpRequest::get(format!("{}/track/isrc:{}", PUBLIC_API_BASE, isrc))
            .timeout(self.session.request_timeout());
        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            return Err(DeezerError::BridgeError(
                bridge_traits::error::BridgeError::OperationFailed(format!(
                    "ISRC lookup returned HTTP {}",
                    response.status
                )),
            ));
        }

        let track: IsrcTrack = response
            .json()
            .map_err(|e| DeezerError::ParseError(e.to_string()))?;

        match (track.id, track.error) {
            (Some(id), _) => {
                debug!(track_id = id, "ISRC resolved");
                Ok(id.to_string())
            }
            (None, error) => {
                if let Some(error) = error {
                    debug!(message = %error.message, "ISRC lookup returned an error payload");
                }
                Err(DeezerError::IsrcNotFound {
                    isrc: isrc.to_string(),
                })
            }
        }
    }
}

/// 320 kbps only when the file exists and the session may request it.
pub fn choose_format(song: &SongData, state: &SessionState) -> MediaFormat {
    if song.filesize_mp3_320 > 0 && state.high_quality_eligible {
        MediaFormat::Mp3_320
    } else {
        MediaFormat::Mp3_128
    }
}
