//! Frame-by-frame export of the trimmed clip with burned-in captions.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use captionkit_caption_model::{Caption, CaptionStyle, TrimPoints};
use captionkit_common::clock::{FrameClock, ProgressSampler};
use captionkit_common::config::ExportDefaults;
use captionkit_common::error::{CaptionkitError, CaptionkitResult};
use captionkit_layout_engine::CaptionLayoutEngine;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::compositor::{AspectPreset, FrameCompositor};
use crate::encoder::{
    frame_file_name, is_supported_codec, AudioRequest, EncodeRequest, EncoderHandle, FRAME_PATTERN,
};
use crate::rasterizer::Rasterizer;
use crate::source::{SourceMetadata, VideoFrameSource};

/// Share of progress spent seeking and compositing frames.
const RENDER_SHARE: f64 = 0.85;

/// Progress reached when the encoder finishes.
const ENCODE_END: f64 = 0.95;

/// Progress reports aimed for during the frame loop.
const TARGET_RENDER_REPORTS: u64 = 100;

/// Output parameters of an export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSettings {
    pub fps: u32,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub video_codec: String,
    pub aspect: AspectPreset,
    /// Upper bound for a single source seek.
    pub seek_timeout: Duration,
}

impl ExportSettings {
    pub fn from_defaults(defaults: &ExportDefaults) -> CaptionkitResult<Self> {
        Ok(Self {
            fps: defaults.fps,
            video_bitrate_kbps: defaults.video_bitrate_kbps,
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
            video_codec: defaults.video_codec.clone(),
            aspect: defaults.aspect.parse()?,
            seek_timeout: Duration::from_millis(defaults.seek_timeout_ms),
        })
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        let defaults = ExportDefaults::default();
        Self {
            fps: defaults.fps,
            video_bitrate_kbps: defaults.video_bitrate_kbps,
            audio_bitrate_kbps: defaults.audio_bitrate_kbps,
            video_codec: defaults.video_codec,
            aspect: AspectPreset::Portrait,
            seek_timeout: Duration::from_millis(defaults.seek_timeout_ms),
        }
    }
}

/// Everything one export needs.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Source video path or URL.
    pub source: String,
    pub trim: TrimPoints,
    /// Captions to burn in, already filtered to visible ones.
    pub captions: Vec<Caption>,
    pub settings: ExportSettings,
    pub output_path: PathBuf,
    /// Parent of the per-export staging directory (system temp when unset).
    pub staging_root: Option<PathBuf>,
}

impl ExportRequest {
    /// Reject requests that cannot produce a video.
    pub fn validate(&self) -> CaptionkitResult<()> {
        let TrimPoints {
            start_secs,
            end_secs,
        } = self.trim;
        if !start_secs.is_finite() || !end_secs.is_finite() {
            return Err(CaptionkitError::validation("Trim points must be finite"));
        }
        if start_secs < 0.0 {
            return Err(CaptionkitError::validation(format!(
                "Trim start {start_secs} must not be negative"
            )));
        }
        if end_secs <= start_secs {
            return Err(CaptionkitError::validation(format!(
                "Trim end {end_secs} must be after start {start_secs}"
            )));
        }
        if self.source.trim().is_empty() {
            return Err(CaptionkitError::validation("Source is empty"));
        }
        if self.settings.fps == 0 {
            return Err(CaptionkitError::validation("fps must be positive"));
        }
        if self.settings.seek_timeout.is_zero() {
            return Err(CaptionkitError::validation("Seek timeout must be positive"));
        }
        if !is_supported_codec(&self.settings.video_codec) {
            return Err(CaptionkitError::validation(format!(
                "Unsupported video codec '{}'",
                self.settings.video_codec
            )));
        }
        Ok(())
    }
}

/// Stages of the export process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    Preparing,
    Rendering,
    Writing,
    Encoding,
    Complete,
}

/// Export progress report.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Current progress [0.0, 1.0]; never decreases within one export.
    pub progress: f64,

    /// Frames composited so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    pub stage: ExportStage,
}

/// Progress callback for export rendering.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Forwards progress to the callback, never letting it move backwards.
struct ProgressReporter {
    callback: Option<ProgressCallback>,
    // Bits of a non-negative f64; their integer order matches float order.
    high_water: AtomicU64,
}

impl ProgressReporter {
    fn new(callback: Option<ProgressCallback>) -> Self {
        Self {
            callback,
            high_water: AtomicU64::new(0.0f64.to_bits()),
        }
    }

    fn report(&self, progress: f64, stage: ExportStage, frames_rendered: u64, total_frames: u64) {
        let bits = progress.clamp(0.0, 1.0).to_bits();
        let previous = self.high_water.fetch_max(bits, Ordering::SeqCst);
        if let Some(callback) = &self.callback {
            callback(ExportProgress {
                progress: f64::from_bits(previous.max(bits)),
                frames_rendered,
                total_frames,
                stage,
            });
        }
    }
}

/// Revocable handle on an exported file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    path: PathBuf,
}

impl ExportArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the exported file.
    pub async fn revoke(self) -> CaptionkitResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Style a caption was exported with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionStyleSnapshot {
    pub caption_id: String,
    pub style: CaptionStyle,
}

/// The settings an export actually used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSnapshot {
    pub start_secs: f64,
    pub end_secs: f64,
    pub fps: u32,
    pub video_codec: String,
    pub aspect: AspectPreset,
    pub caption_styles: Vec<CaptionStyleSnapshot>,
}

/// A finished export.
#[derive(Debug, Clone)]
pub struct ExportResult {
    pub video_bytes: Vec<u8>,
    pub artifact: ExportArtifact,
    /// `frame_count / fps`.
    pub duration_secs: f64,
    pub frame_count: u64,
    pub file_size: u64,
    /// Whether the output carries the source audio.
    pub has_audio: bool,
    pub settings: ExportSnapshot,
    pub created_at: DateTime<Utc>,
}

/// Shift captions onto the trimmed timeline and drop those outside it.
pub fn rebase_captions(captions: &[Caption], trim_start: f64, duration: f64) -> Vec<Caption> {
    captions
        .iter()
        .filter(|c| c.visible)
        .map(|c| c.rebased(trim_start))
        .filter(|c| c.end_secs > 0.0 && c.start_secs < duration)
        .collect()
}

/// Seeks, composites, stages, and encodes one export.
#[derive(Debug, Clone)]
pub struct ExportPipeline {
    engine: Arc<CaptionLayoutEngine>,
    encoder: Arc<EncoderHandle>,
}

impl ExportPipeline {
    pub fn new(engine: Arc<CaptionLayoutEngine>, encoder: Arc<EncoderHandle>) -> Self {
        Self { engine, encoder }
    }

    pub fn encoder(&self) -> &Arc<EncoderHandle> {
        &self.encoder
    }

    /// Run an export to completion.
    ///
    /// Either returns a complete result or an error; the staging directory
    /// is removed and the source closed on every path. The output file is
    /// deleted on failure only once the encoder has started writing it, so
    /// an earlier export at the same path survives a failed render.
    pub async fn run(
        &self,
        request: ExportRequest,
        source: &mut dyn VideoFrameSource,
        raster: &mut dyn Rasterizer,
        progress: Option<ProgressCallback>,
    ) -> CaptionkitResult<ExportResult> {
        request.validate()?;

        info!(
            source = %request.source,
            output = %request.output_path.display(),
            start = request.trim.start_secs,
            end = request.trim.end_secs,
            fps = request.settings.fps,
            aspect = %request.settings.aspect,
            "Starting export"
        );

        let reporter = ProgressReporter::new(progress);
        reporter.report(0.0, ExportStage::Preparing, 0, 0);

        let mut output_started = false;
        let outcome = match stage_dir(request.staging_root.clone()).await {
            Ok(staging) => {
                let outcome = self
                    .render_and_encode(
                        &request,
                        staging.path(),
                        source,
                        raster,
                        &reporter,
                        &mut output_started,
                    )
                    .await;
                let staging_path = staging.path().to_path_buf();
                match tokio::task::spawn_blocking(move || staging.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(path = %staging_path.display(), error = %e, "Failed to remove staging directory")
                    }
                    Err(e) => {
                        warn!(path = %staging_path.display(), error = %e, "Staging cleanup task failed")
                    }
                }
                outcome
            }
            Err(e) => Err(e),
        };

        if let Err(e) = source.close().await {
            warn!(error = %e, "Failed to close video source");
        }

        match outcome {
            Ok(result) => {
                reporter.report(1.0, ExportStage::Complete, result.frame_count, result.frame_count);
                info!(
                    output = %result.artifact.path().display(),
                    frames = result.frame_count,
                    bytes = result.file_size,
                    has_audio = result.has_audio,
                    "Export complete"
                );
                Ok(result)
            }
            Err(e) => {
                if output_started {
                    remove_partial_output(&request.output_path).await;
                }
                Err(e)
            }
        }
    }

    async fn render_and_encode(
        &self,
        request: &ExportRequest,
        staging: &Path,
        source: &mut dyn VideoFrameSource,
        raster: &mut dyn Rasterizer,
        reporter: &ProgressReporter,
        output_started: &mut bool,
    ) -> CaptionkitResult<ExportResult> {
        let settings = &request.settings;
        let trim = request.trim;
        let duration = trim.duration_secs();
        let captions = rebase_captions(&request.captions, trim.start_secs, duration);

        let metadata = source.metadata().await.map_err(|e| match e {
            e @ CaptionkitError::ResourceLoad { .. } => e,
            other => {
                CaptionkitError::resource_load(format!("Failed to load source metadata: {other}"))
            }
        })?;
        let clock = FrameClock::new(settings.fps);
        let last_seekable = last_seekable_time(&metadata, trim, clock.frame_interval_secs())?;

        if let Some(parent) = request.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let total = clock.total_frames(duration);
        let sampler = ProgressSampler::new(total, TARGET_RENDER_REPORTS);
        let compositor = FrameCompositor::new(Arc::clone(&self.engine), settings.aspect);
        let timeout_ms = u64::try_from(settings.seek_timeout.as_millis()).unwrap_or(u64::MAX);
        debug!(total_frames = total, captions = captions.len(), "Rendering frames");

        let mut stills = Vec::with_capacity(total as usize);
        for index in 0..total {
            let relative = clock.frame_time(index);
            let time_secs = match last_seekable {
                Some(last) => (trim.start_secs + relative).min(last),
                None => trim.start_secs + relative,
            };
            let frame = tokio::time::timeout(settings.seek_timeout, source.seek(time_secs))
                .await
                .map_err(|_| CaptionkitError::SeekTimeout {
                    frame_index: index,
                    time_secs,
                    timeout_ms,
                })??;

            stills.push(compositor.composite(raster, &frame, &captions, relative)?);

            if sampler.should_report(index) {
                reporter.report(
                    RENDER_SHARE * (index + 1) as f64 / total as f64,
                    ExportStage::Rendering,
                    index + 1,
                    total,
                );
            }
        }

        reporter.report(RENDER_SHARE, ExportStage::Writing, total, total);
        for (index, still) in stills.into_iter().enumerate() {
            tokio::fs::write(staging.join(frame_file_name(index as u64)), still).await?;
        }
        debug!(frames = total, staging = %staging.display(), "Staged frames");

        let encoder = self.encoder.get().await?;

        let audio = if metadata.has_audio {
            let audio_path = staging.join("audio.wav");
            let audio_request = AudioRequest {
                source: request.source.clone(),
                start_secs: trim.start_secs,
                duration_secs: duration,
                output: audio_path.clone(),
            };
            match encoder.extract_audio(&audio_request).await {
                Ok(()) => Some(audio_path),
                Err(e) => {
                    warn!(error = %e, "Audio extraction failed; exporting video only");
                    None
                }
            }
        } else {
            None
        };

        let (width, height) = settings.aspect.dimensions();
        let encode_request = EncodeRequest {
            frames_dir: staging.to_path_buf(),
            frame_pattern: FRAME_PATTERN.to_string(),
            fps: settings.fps,
            width,
            height,
            audio,
            output: request.output_path.clone(),
            video_codec: settings.video_codec.clone(),
            video_bitrate_kbps: settings.video_bitrate_kbps,
            audio_bitrate_kbps: settings.audio_bitrate_kbps,
            total_frames: total,
        };
        let on_progress = |p: f64| {
            reporter.report(
                RENDER_SHARE + (ENCODE_END - RENDER_SHARE) * p.clamp(0.0, 1.0),
                ExportStage::Encoding,
                total,
                total,
            )
        };

        *output_started = true;
        let has_audio = match encoder.encode(&encode_request, &on_progress).await {
            Ok(()) => encode_request.audio.is_some(),
            Err(e) if encode_request.audio.is_some() => {
                warn!(error = %e, "Encoding with audio failed; retrying video only");
                encoder
                    .encode(&encode_request.video_only(), &on_progress)
                    .await
                    .map_err(into_encoding)?;
                false
            }
            Err(e) => return Err(into_encoding(e)),
        };
        reporter.report(ENCODE_END, ExportStage::Encoding, total, total);

        let video_bytes = tokio::fs::read(&request.output_path).await.map_err(|e| {
            CaptionkitError::encoding(format!(
                "Encoder produced no readable output at {}: {e}",
                request.output_path.display()
            ))
        })?;

        Ok(ExportResult {
            file_size: video_bytes.len() as u64,
            video_bytes,
            artifact: ExportArtifact {
                path: request.output_path.clone(),
            },
            duration_secs: clock.duration_of(total),
            frame_count: total,
            has_audio,
            settings: ExportSnapshot {
                start_secs: trim.start_secs,
                end_secs: trim.end_secs,
                fps: settings.fps,
                video_codec: settings.video_codec.clone(),
                aspect: settings.aspect,
                caption_styles: captions
                    .iter()
                    .map(|c| CaptionStyleSnapshot {
                        caption_id: c.id.clone(),
                        style: c.style.clone(),
                    })
                    .collect(),
            },
            created_at: Utc::now(),
        })
    }
}

/// Trim windows that run past the source repeat its last frame; a window
/// starting past the source is rejected.
fn last_seekable_time(
    metadata: &SourceMetadata,
    trim: TrimPoints,
    frame_interval: f64,
) -> CaptionkitResult<Option<f64>> {
    let source_end = metadata.duration_secs;
    if source_end <= 0.0 || trim.end_secs <= source_end + 1e-3 {
        return Ok(None);
    }
    if trim.start_secs >= source_end {
        return Err(CaptionkitError::validation(format!(
            "Trim starts at {:.3}s but the source is only {:.3}s long",
            trim.start_secs, source_end
        )));
    }
    let last = (source_end - frame_interval).max(trim.start_secs);
    warn!(
        end = trim.end_secs,
        source_duration = source_end,
        last_seek = last,
        "Trim ends past the source; trailing frames repeat the last frame"
    );
    Ok(Some(last))
}

async fn stage_dir(root: Option<PathBuf>) -> CaptionkitResult<TempDir> {
    tokio::task::spawn_blocking(move || create_staging(root.as_deref()))
        .await
        .map_err(|e| CaptionkitError::render(format!("Staging task failed: {e}")))?
}

fn create_staging(root: Option<&Path>) -> CaptionkitResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("captionkit-export-");
    let staging = match root {
        Some(root) => {
            std::fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    debug!(path = %staging.path().display(), "Created staging directory");
    Ok(staging)
}

fn into_encoding(error: CaptionkitError) -> CaptionkitError {
    match error {
        e @ CaptionkitError::Encoding { .. } => e,
        other => CaptionkitError::encoding(other.to_string()),
    }
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}
