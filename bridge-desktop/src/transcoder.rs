//! FFmpeg-backed [`Transcoder`].
//!
//! Container bytes are written to an `ffmpeg` child's stdin by a feeder task
//! while stdout is cut into fixed-size PCM frames. Both sides sit on OS pipes,
//! so the child only decodes as fast as the frame stream is polled.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::ByteSource,
    transcode::{AudioFrame, AudioFrameStream, EncoderSettings, Transcoder},
};
use bytes::BytesMut;
use futures_util::{Stream, StreamExt, TryStreamExt};
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio_util::codec::{Decoder, FramedRead};
use tracing::{debug, instrument, warn};

/// Cuts a PCM byte stream into frames of exactly `frame_bytes`.
///
/// A trailing partial frame is zero-padded so every frame handed to the
/// encoder has the same duration.
#[derive(Debug, Clone, Copy)]
pub struct PcmFrameCodec {
    frame_bytes: usize,
}

impl PcmFrameCodec {
    pub fn new(frame_bytes: usize) -> Self {
        Self { frame_bytes }
    }
}

impl Decoder for PcmFrameCodec {
    type Item = AudioFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<AudioFrame>> {
        if src.len() < self.frame_bytes {
            src.reserve(self.frame_bytes - src.len());
            return Ok(None);
        }
        Ok(Some(AudioFrame::new(src.split_to(self.frame_bytes).freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<AudioFrame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        let mut tail = src.split();
        tail.resize(self.frame_bytes, 0);
        Ok(Some(AudioFrame::new(tail.freeze())))
    }
}

/// Frame stream that owns the child process; dropping it kills ffmpeg.
struct ChildFrames<R> {
    frames: FramedRead<R, PcmFrameCodec>,
    _child: Option<Child>,
}

impl<R: AsyncRead + Unpin> Stream for ChildFrames<R> {
    type Item = io::Result<AudioFrame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().frames.poll_next_unpin(cx)
    }
}

/// Wrap a raw PCM reader as a frame stream cut for `settings`.
pub fn pcm_frames<R>(reader: R, settings: EncoderSettings) -> AudioFrameStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    frames_with_child(reader, None, settings)
}

fn frames_with_child<R>(reader: R, child: Option<Child>, settings: EncoderSettings) -> AudioFrameStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let codec = PcmFrameCodec::new(settings.format.frame_bytes());
    let frames = ChildFrames {
        frames: FramedRead::new(reader, codec),
        _child: child,
    };
    AudioFrameStream::new(settings, frames.map_err(BridgeError::from))
}

/// Decodes any container ffmpeg understands into s16le PCM.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
    settings: EncoderSettings,
}

impl FfmpegTranscoder {
    pub fn new(settings: EncoderSettings) -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            settings,
        }
    }

    /// Use a specific ffmpeg executable instead of the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    fn args(&self) -> Vec<String> {
        let format = self.settings.format;
        vec![
            "-analyzeduration".into(),
            "0".into(),
            "-loglevel".into(),
            "0".into(),
            "-i".into(),
            "pipe:0".into(),
            "-f".into(),
            "s16le".into(),
            "-ar".into(),
            format.sample_rate.to_string(),
            "-ac".into(),
            format.channels.to_string(),
            "pipe:1".into(),
        ]
    }

    fn spawn(&self) -> Result<Child> {
        Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BridgeError::NotAvailable(format!(
                    "Failed to spawn {}: {}",
                    self.binary.display(),
                    e
                ))
            })
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new(EncoderSettings::default())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    #[instrument(skip(self, input), fields(binary = %self.binary.display()))]
    async fn to_frames(&self, mut input: ByteSource) -> Result<AudioFrameStream> {
        let mut child = self.spawn()?;

        let mut stdin = child.stdin.take().ok_or_else(|| {
            BridgeError::OperationFailed("ffmpeg stdin was not captured".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            BridgeError::OperationFailed("ffmpeg stdout was not captured".to_string())
        })?;

        tokio::spawn(async move {
            match tokio::io::copy(&mut input, &mut stdin).await {
                Ok(bytes) => debug!(bytes, "Transcoder input drained"),
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    debug!("Transcoder closed its input early")
                }
                Err(e) => warn!(error = %e, "Feeding transcoder failed"),
            }
        });

        debug!(
            fec = self.settings.forward_error_correction,
            "Transcoder started"
        );
        Ok(frames_with_child(stdout, Some(child), self.settings))
    }

    fn settings(&self) -> EncoderSettings {
        self.settings
    }
}
