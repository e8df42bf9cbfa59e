//! Transcoding seam.
//!
//! A [`Transcoder`] turns compressed container bytes (MP3, AAC segments) into
//! fixed-format PCM frames ready for the voice transport. The transport owns the
//! Opus encoder; [`EncoderSettings`] travels with every frame stream so the
//! encoder is configured with the same frame size and forward error correction
//! the stream was cut for.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::error::Result;
use crate::http::ByteSource;

/// Output sample rate expected by the voice transport.
pub const SAMPLE_RATE: u32 = 48_000;
/// Interleaved stereo.
pub const CHANNELS: u16 = 2;
/// 20 ms at 48 kHz.
pub const FRAME_SAMPLES: usize = 960;
/// Signed 16-bit little-endian.
pub const BYTES_PER_SAMPLE: usize = 2;

/// PCM layout of the frames a transcoder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel in one frame
    pub frame_samples: usize,
}

impl AudioFormat {
    /// Size in bytes of one interleaved frame.
    pub fn frame_bytes(&self) -> usize {
        self.frame_samples * self.channels as usize * BYTES_PER_SAMPLE
    }

    pub fn frame_duration(&self) -> Duration {
        Duration::from_micros(self.frame_samples as u64 * 1_000_000 / self.sample_rate as u64)
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
            frame_samples: FRAME_SAMPLES,
        }
    }
}

/// Settings for the transport-side encode stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    pub format: AudioFormat,
    /// In-band forward error correction on the Opus encoder
    pub forward_error_correction: bool,
    /// Target bitrate in bits per second; `None` lets the transport pick
    pub bitrate: Option<u32>,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            forward_error_correction: true,
            bitrate: None,
        }
    }
}

/// One fixed-size block of interleaved s16le PCM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub pcm: Bytes,
}

impl AudioFrame {
    pub fn new(pcm: Bytes) -> Self {
        Self { pcm }
    }

    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }
}

/// A lazily produced sequence of audio frames plus the encoder settings they
/// were cut for. Frames are only produced as the consumer polls.
pub struct AudioFrameStream {
    settings: EncoderSettings,
    frames: BoxStream<'static, Result<AudioFrame>>,
}

impl AudioFrameStream {
    pub fn new<S>(settings: EncoderSettings, frames: S) -> Self
    where
        S: Stream<Item = Result<AudioFrame>> + Send + 'static,
    {
        Self {
            settings,
            frames: Box::pin(frames),
        }
    }

    pub fn settings(&self) -> &EncoderSettings {
        &self.settings
    }
}

impl Stream for AudioFrameStream {
    type Item = Result<AudioFrame>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.frames.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for AudioFrameStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioFrameStream")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Decode stage feeding the transport's encoder.
///
/// Implementations must not read ahead of the consumer without bound: input is
/// pulled only as fast as frames are taken from the returned stream.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn to_frames(&self, input: ByteSource) -> Result<AudioFrameStream>;

    fn settings(&self) -> EncoderSettings {
        EncoderSettings::default()
    }
}
