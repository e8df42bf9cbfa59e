//! # Desktop Bridge Implementations
//!
//! Default adapters for hosts running on a regular OS (bot processes on
//! Linux, macOS, Windows):
//!
//! - [`ReqwestHttpClient`] - `HttpClient` on `reqwest` with retry and streaming downloads
//! - [`FfmpegTranscoder`] - `Transcoder` piping container bytes through an `ffmpeg` child
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FfmpegTranscoder, ReqwestHttpClient};
//! use bridge_traits::EncoderSettings;
//! use std::sync::Arc;
//!
//! let http = Arc::new(ReqwestHttpClient::new());
//! let transcoder = Arc::new(FfmpegTranscoder::new(EncoderSettings::default()));
//! ```

mod http;
mod transcoder;

pub use http::{ReqwestHttpClient, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use transcoder::{pcm_frames, FfmpegTranscoder, PcmFrameCodec};
