//! Minimal HLS playlist parsing.
//!
//! Only what the segment reader needs: the segment URIs of a media playlist,
//! or the variant URIs of a master playlist. URIs are resolved against the
//! playlist's own URL.

use url::Url;

use crate::error::{Result, SoundCloudError};

/// A parsed playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playlist {
    /// Points at other playlists, best first as listed
    Master { variants: Vec<Url> },
    /// Lists the media segments in play order
    Media { segments: Vec<Url> },
}

/// Parse `body` fetched from `base`.
pub fn parse_playlist(body: &str, base: &Url) -> Result<Playlist> {
    let mut lines = body.lines().map(str::trim).filter(|l| !l.is_empty());

    match lines.next() {
        Some("#EXTM3U") => {}
        _ => {
            return Err(SoundCloudError::ParseError(
                "playlist does not start with #EXTM3U".to_string(),
            ))
        }
    }

    let mut is_master = false;
    let mut uris = Vec::new();

    for line in lines {
        if let Some(tag) = line.strip_prefix('#') {
            if tag.starts_with("EXT-X-STREAM-INF") {
                is_master = true;
            } else if let Some(attrs) = tag.strip_prefix("EXT-X-KEY:") {
                if !attrs.contains("METHOD=NONE") {
                    return Err(SoundCloudError::UnsupportedPlaylist(format!(
                        "encrypted segments ({})",
                        attrs
                    )));
                }
            }
            continue;
        }

        let uri = base.join(line).map_err(|e| SoundCloudError::InvalidUrl {
            url: line.to_string(),
            message: e.to_string(),
        })?;
        uris.push(uri);
    }

    if uris.is_empty() {
        return Err(SoundCloudError::EmptyPlaylist);
    }

    Ok(if is_master {
        Playlist::Master { variants: uris }
    } else {
        Playlist::Media { segments: uris }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://cf-hls-media.sndcdn.com/playlist/abc/stream.m3u8?Policy=x").unwrap()
    }

    #[test]
    fn test_media_playlist_segments_resolve_relative() {
        let body = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n\
                    #EXTINF:9.98,\n/media/0/9980/abc.mp3?Policy=y\n\
                    #EXTINF:10.0,\nsegment-2.mp3\n#EXT-X-ENDLIST\n";

        let playlist = parse_playlist(body, &base()).unwrap();

        match playlist {
            Playlist::Media { segments } => {
                assert_eq!(segments.len(), 2);
                assert_eq!(
                    segments[0].as_str(),
                    "https://cf-hls-media.sndcdn.com/media/0/9980/abc.mp3?Policy=y"
                );
                assert_eq!(
                    segments[1].as_str(),
                    "https://cf-hls-media.sndcdn.com/playlist/abc/segment-2.mp3"
                );
            }
            other => panic!("expected media playlist, got {:?}", other),
        }
    }

    #[test]
    fn test_master_playlist_variants() {
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=128000\nhttps://cdn.example/hi.m3u8\n\
                    #EXT-X-STREAM-INF:BANDWIDTH=64000\nlo.m3u8\n";

        let playlist = parse_playlist(body, &base()).unwrap();

        assert_eq!(
            playlist,
            Playlist::Master {
                variants: vec![
                    Url::parse("https://cdn.example/hi.m3u8").unwrap(),
                    Url::parse("https://cf-hls-media.sndcdn.com/playlist/abc/lo.m3u8").unwrap(),
                ]
            }
        );
    }

    #[test]
    fn test_rejects_non_playlist() {
        assert!(matches!(
            parse_playlist("<html></html>", &base()),
            Err(SoundCloudError::ParseError(_))
        ));
    }

    #[test]
    fn test_empty_playlist() {
        assert!(matches!(
            parse_playlist("#EXTM3U\n#EXT-X-ENDLIST\n", &base()),
            Err(SoundCloudError::EmptyPlaylist)
        ));
    }

    #[test]
    fn test_encrypted_playlist_unsupported() {
        let body = "#EXTM3U\n#EXT-X-KEY:METHOD=AES-128,URI=\"k\"\n#EXTINF:10,\na.ts\n";
        assert!(matches!(
            parse_playlist(body, &base()),
            Err(SoundCloudError::UnsupportedPlaylist(_))
        ));
    }
}
