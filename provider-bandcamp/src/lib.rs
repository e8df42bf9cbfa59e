//! # Bandcamp Provider
//!
//! Scraped direct-URL acquisition path: the track page embeds its player
//! data as HTML-escaped JSON, which carries a signed `mp3-128` stream URL.
//! The URL is handed to the transport as-is.

pub mod error;
pub mod scraper;

pub use error::{BandcampError, Result};
pub use scraper::{extract_stream_url, BandcampScraper};
