//! Deezer wire types
//!
//! Request and response shapes for the private gateway (`gw-light.php`), the
//! media URL endpoint and the public track API.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Cipher scheme requested from the media endpoint.
pub const CIPHER_SCHEME: &str = "BF_CBC_STRIPE";

/// Gateway methods the core calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayMethod {
    Ping,
    GetUserData,
    SongGetData,
}

impl GatewayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayMethod::Ping => "deezer.ping",
            GatewayMethod::GetUserData => "deezer.getUserData",
            GatewayMethod::SongGetData => "song.getData",
        }
    }
}

impl fmt::Display for GatewayMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding requested from the media endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaFormat {
    #[serde(rename = "MP3_128")]
    Mp3_128,
    #[serde(rename = "MP3_320")]
    Mp3_320,
}

impl MediaFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFormat::Mp3_128 => "MP3_128",
            MediaFormat::Mp3_320 => "MP3_320",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope shared by every gateway response.
///
/// `error` is `[]` on success and an object keyed by error code otherwise.
#[derive(Debug, Deserialize)]
pub struct GatewayEnvelope<T> {
    #[serde(default)]
    pub error: serde_json::Value,
    pub results: Option<T>,
}

impl<T> GatewayEnvelope<T> {
    /// Flattened error payload, or `None` when the call succeeded.
    pub fn error_message(&self) -> Option<String> {
        match &self.error {
            serde_json::Value::Null => None,
            serde_json::Value::Array(items) if items.is_empty() => None,
            serde_json::Value::Object(map) if map.is_empty() => None,
            serde_json::Value::Object(map) => Some(
                map.iter()
                    .map(|(code, detail)| match detail.as_str() {
                        Some(text) => format!("{}: {}", code, text),
                        None => format!("{}: {}", code, detail),
                    })
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            other => Some(other.to_string()),
        }
    }
}

/// `deezer.ping` results
#[derive(Debug, Clone, Deserialize)]
pub struct PingResults {
    #[serde(rename = "SESSION")]
    pub session: String,
}

/// `deezer.getUserData` results
#[derive(Debug, Clone, Deserialize)]
pub struct UserDataResults {
    #[serde(rename = "USER")]
    pub user: UserData,

    /// API token for every later gateway call
    #[serde(rename = "checkForm")]
    pub check_form: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserData {
    #[serde(rename = "OPTIONS")]
    pub options: UserOptions,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserOptions {
    pub license_token: String,

    #[serde(default, deserialize_with = "flexible_bool")]
    pub web_hq: bool,

    #[serde(default, deserialize_with = "flexible_bool")]
    pub mobile_hq: bool,
}

impl UserOptions {
    pub fn high_quality_eligible(&self) -> bool {
        self.web_hq || self.mobile_hq
    }
}

/// `song.getData` request body
#[derive(Debug, Clone, Serialize)]
pub struct SongDataRequest<'a> {
    pub sng_id: &'a str,
}

/// `song.getData` results
#[derive(Debug, Clone, Deserialize)]
pub struct SongData {
    /// Canonical track id; the cipher key is derived from this one
    #[serde(rename = "SNG_ID", deserialize_with = "string_or_number")]
    pub sng_id: String,

    #[serde(rename = "TRACK_TOKEN")]
    pub track_token: String,

    #[serde(rename = "FILESIZE_MP3_320", default, deserialize_with = "size_string_or_number")]
    pub filesize_mp3_320: u64,
}

/// Body of `POST media.deezer.com/v1/get_url`
#[derive(Debug, Clone, Serialize)]
pub struct MediaUrlRequest<'a> {
    pub license_token: &'a str,
    pub media: Vec<MediaRequest>,
    pub track_tokens: Vec<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub formats: Vec<CipherFormat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CipherFormat {
    pub cipher: &'static str,
    pub format: MediaFormat,
}

impl<'a> MediaUrlRequest<'a> {
    /// Request for exactly one `{cipher, format}` pair and one track.
    pub fn single(license_token: &'a str, track_token: &'a str, format: MediaFormat) -> Self {
        Self {
            license_token,
            media: vec![MediaRequest {
                kind: "FULL",
                formats: vec![CipherFormat {
                    cipher: CIPHER_SCHEME,
                    format,
                }],
            }],
            track_tokens: vec![track_token],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaUrlResponse {
    #[serde(default)]
    pub data: Vec<MediaData>,

    #[serde(default)]
    pub errors: Vec<MediaError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaData {
    #[serde(default)]
    pub media: Vec<Media>,

    #[serde(default)]
    pub errors: Vec<MediaError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub sources: Vec<MediaSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSource {
    pub url: String,

    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaError {
    #[serde(default)]
    pub code: Option<i64>,

    #[serde(default)]
    pub message: String,
}

impl MediaUrlResponse {
    /// First signed URL, if the endpoint produced one.
    pub fn first_url(&self) -> Option<&str> {
        self.data
            .first()?
            .media
            .first()?
            .sources
            .first()
            .map(|source| source.url.as_str())
    }

    /// Every error the endpoint reported, top-level and per track.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .chain(self.data.iter().flat_map(|d| d.errors.iter()))
            .map(|e| match e.code {
                Some(code) => format!("{} (code {})", e.message, code),
                None => e.message.clone(),
            })
            .collect()
    }
}

/// `GET api.deezer.com/track/isrc:{isrc}`
#[derive(Debug, Clone, Deserialize)]
pub struct IsrcTrack {
    #[serde(default)]
    pub id: Option<u64>,

    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
}

fn flexible_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0) != 0,
        serde_json::Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn size_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_error_detection() {
        let ok: GatewayEnvelope<PingResults> =
            serde_json::from_str(r#"{"error":[],"results":{"SESSION":"abc"}}"#).unwrap();
        assert!(ok.error_message().is_none());

        let failed: GatewayEnvelope<serde_json::Value> = serde_json::from_str(
            r#"{"error":{"VALID_TOKEN_REQUIRED":"Invalid CSRF token"},"results":{}}"#,
        )
        .unwrap();
        assert_eq!(
            failed.error_message().as_deref(),
            Some("VALID_TOKEN_REQUIRED: Invalid CSRF token")
        );
    }

    #[test]
    fn test_song_data_accepts_string_sizes() {
        let data: SongData = serde_json::from_str(
            r#"{"SNG_ID":"3135556","TRACK_TOKEN":"tok","FILESIZE_MP3_320":"8021374"}"#,
        )
        .unwrap();
        assert_eq!(data.sng_id, "3135556");
        assert_eq!(data.filesize_mp3_320, 8_021_374);

        let numeric: SongData =
            serde_json::from_str(r#"{"SNG_ID":3135556,"TRACK_TOKEN":"tok","FILESIZE_MP3_320":0}"#)
                .unwrap();
        assert_eq!(numeric.sng_id, "3135556");
        assert_eq!(numeric.filesize_mp3_320, 0);
    }

    #[test]
    fn test_media_url_request_shape() {
        let request = MediaUrlRequest::single("lic", "tok", MediaFormat::Mp3_128);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "license_token": "lic",
                "media": [{
                    "type": "FULL",
                    "formats": [{"cipher": "BF_CBC_STRIPE", "format": "MP3_128"}]
                }],
                "track_tokens": ["tok"]
            })
        );
    }

    #[test]
    fn test_media_url_response_errors() {
        let response: MediaUrlResponse = serde_json::from_str(
            r#"{"data":[{"errors":[{"code":2002,"message":"Invalid license token"}]}]}"#,
        )
        .unwrap();

        assert!(response.first_url().is_none());
        assert_eq!(
            response.error_messages(),
            vec!["Invalid license token (code 2002)".to_string()]
        );
    }

    #[test]
    fn test_user_options_quality_flags() {
        let options: UserOptions =
            serde_json::from_str(r#"{"license_token":"lic","web_hq":false,"mobile_hq":1}"#)
                .unwrap();
        assert!(options.high_quality_eligible());
    }
}
