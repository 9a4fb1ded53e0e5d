//! Decoded video frame access.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use captionkit_common::error::{CaptionkitError, CaptionkitResult};
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

/// Properties of the source video.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    pub has_audio: bool,
}

/// One decoded frame as straight (non-premultiplied) RGBA8.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Frame with every pixel set to `rgba`.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.width as usize * self.height as usize * 4
    }
}

/// A seekable decoder over the source video.
#[async_trait]
pub trait VideoFrameSource: Send {
    async fn metadata(&mut self) -> CaptionkitResult<SourceMetadata>;

    /// Decode the frame displayed at `time_secs` of the source.
    async fn seek(&mut self, time_secs: f64) -> CaptionkitResult<VideoFrame>;

    /// Release decoder resources.
    async fn close(&mut self) -> CaptionkitResult<()>;
}

/// Frame source backed by the `ffprobe` and `ffmpeg` binaries.
///
/// Each seek runs one `ffmpeg` process that decodes a single RGBA frame.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    source: String,
    metadata: Option<SourceMetadata>,
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    #[serde(default)]
    streams: Vec<MediaStream>,
    format: Option<MediaFormat>,
}

#[derive(Debug, Deserialize)]
struct MediaStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaFormat {
    duration: Option<String>,
}

impl FfmpegFrameSource {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            metadata: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    async fn read_metadata(&self) -> CaptionkitResult<SourceMetadata> {
        if !self.source.contains("://") && !PathBuf::from(&self.source).exists() {
            return Err(CaptionkitError::FileNotFound {
                path: PathBuf::from(&self.source),
            });
        }

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(&self.source)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CaptionkitError::resource_load(format!("Failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(CaptionkitError::resource_load(format!(
                "ffprobe failed for {}: {}",
                self.source,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_media_info(&output.stdout)
    }
}

fn parse_media_info(json: &[u8]) -> CaptionkitResult<SourceMetadata> {
    let info: MediaInfo = serde_json::from_slice(json)
        .map_err(|e| CaptionkitError::resource_load(format!("Unreadable ffprobe output: {e}")))?;

    let video = info
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| CaptionkitError::resource_load("Source has no video stream"))?;
    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(CaptionkitError::resource_load(
                "Source video stream has no dimensions",
            ))
        }
    };

    let duration_secs = info
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
        .ok_or_else(|| CaptionkitError::resource_load("Source duration is unknown"))?;

    let has_audio = info
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(SourceMetadata {
        width,
        height,
        duration_secs,
        has_audio,
    })
}

#[async_trait]
impl VideoFrameSource for FfmpegFrameSource {
    async fn metadata(&mut self) -> CaptionkitResult<SourceMetadata> {
        if let Some(metadata) = &self.metadata {
            return Ok(metadata.clone());
        }
        let metadata = self.read_metadata().await?;
        debug!(
            source = %self.source,
            width = metadata.width,
            height = metadata.height,
            duration = metadata.duration_secs,
            has_audio = metadata.has_audio,
            "Read source metadata"
        );
        self.metadata = Some(metadata.clone());
        Ok(metadata)
    }

    async fn seek(&mut self, time_secs: f64) -> CaptionkitResult<VideoFrame> {
        let metadata = self.metadata().await?;

        let output = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{:.6}", time_secs.max(0.0)), "-i"])
            .arg(&self.source)
            .args([
                "-frames:v",
                "1",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CaptionkitError::resource_load(format!("Failed to run ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(CaptionkitError::resource_load(format!(
                "ffmpeg could not decode frame at {time_secs:.3}s: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let frame = VideoFrame {
            width: metadata.width,
            height: metadata.height,
            data: output.stdout,
        };
        if !frame.is_well_formed() {
            return Err(CaptionkitError::resource_load(format!(
                "Decoded frame at {time_secs:.3}s has {} bytes, expected {}",
                frame.data.len(),
                metadata.width as usize * metadata.height as usize * 4
            )));
        }
        Ok(frame)
    }

    async fn close(&mut self) -> CaptionkitResult<()> {
        self.metadata = None;
        Ok(())
    }
}
