//! Bandcamp page scraper

use bridge_traits::http::{HttpClient, HttpRequest};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{BandcampError, Result};

/// Default timeout for page requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

static TRALBUM_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-tralbum="([^"]+)""#).expect("static pattern"));

static MP3_128_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""mp3-128"\s*:\s*"(https?:[^"]+)""#).expect("static pattern"));

/// Fetches track pages and pulls the stream URL out of the embedded player data.
pub struct BandcampScraper {
    http_client: Arc<dyn HttpClient>,
    request_timeout: Duration,
}

impl BandcampScraper {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolve the direct stream URL of the track at `page_url`.
    #[instrument(skip(self), fields(page = %page_url))]
    pub async fn stream_url(&self, page_url: &str) -> Result<String> {
        let request = HttpRequest::get(page_url).timeout(self.request_timeout);
        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            return Err(BandcampError::PageUnavailable {
                status_code: response.status,
            });
        }

        let page = response.text()?;
        let url = extract_stream_url(&page).ok_or_else(|| {
            if TRALBUM_ATTR.is_match(&page) {
                BandcampError::StreamUrlMissing {
                    page: page_url.to_string(),
                }
            } else {
                BandcampError::PlayerDataMissing
            }
        })?;

        debug!("Stream URL extracted");
        Ok(url)
    }
}

/// Pull the `mp3-128` URL out of a track page.
pub fn extract_stream_url(page: &str) -> Option<String> {
    let blob = TRALBUM_ATTR.captures(page)?.get(1)?.as_str();
    let json = unescape_html(blob);

    // Parsing first undoes JSON escapes such as `\/` in the URL.
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&json) {
        let from_json = value["trackinfo"]
            .as_array()
            .into_iter()
            .flatten()
            .find_map(|track| track["file"]["mp3-128"].as_str())
            .map(str::to_string);
        if from_json.is_some() {
            return from_json;
        }
    }

    MP3_128_URL
        .captures(&json)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().replace("\\/", "/"))
}

fn unescape_html(raw: &str) -> String {
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
