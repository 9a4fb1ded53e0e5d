//! Video encoding backends and the lazily initialized encoder handle.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use captionkit_common::error::{CaptionkitError, CaptionkitResult};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File name pattern of staged frames.
pub const FRAME_PATTERN: &str = "frame_%06d.png";

/// Staged file name of frame `index`.
pub fn frame_file_name(index: u64) -> String {
    format!("frame_{index:06}.png")
}

/// Mux a staged PNG sequence (and optional audio) into a video file.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeRequest {
    pub frames_dir: PathBuf,
    pub frame_pattern: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub audio: Option<PathBuf>,
    pub output: PathBuf,
    pub video_codec: String,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub total_frames: u64,
}

impl EncodeRequest {
    pub fn duration_secs(&self) -> f64 {
        self.total_frames as f64 / f64::from(self.fps.max(1))
    }

    /// Same request without the audio track.
    pub fn video_only(&self) -> Self {
        Self {
            audio: None,
            ..self.clone()
        }
    }
}

/// Cut the trim window's audio out of the source.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioRequest {
    pub source: String,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub output: PathBuf,
}

/// An external encoder.
#[async_trait]
pub trait Encoder: Send + Sync {
    fn name(&self) -> &str;

    /// Prepare the backend. Called once by [`EncoderHandle`].
    async fn initialize(&self) -> CaptionkitResult<()>;

    async fn extract_audio(&self, request: &AudioRequest) -> CaptionkitResult<()>;

    /// Encode, reporting progress in `[0, 1]`.
    async fn encode(
        &self,
        request: &EncodeRequest,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> CaptionkitResult<()>;

    async fn shutdown(&self) -> CaptionkitResult<()>;
}

type EncoderFactory = Box<dyn Fn() -> Arc<dyn Encoder> + Send + Sync>;

/// Owned, lazily initialized encoder.
///
/// The first [`EncoderHandle::get`] builds and initializes the encoder;
/// later calls reuse it. A failed initialization leaves the handle empty so
/// the next call tries again.
pub struct EncoderHandle {
    factory: EncoderFactory,
    slot: Mutex<Option<Arc<dyn Encoder>>>,
}

impl std::fmt::Debug for EncoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderHandle").finish_non_exhaustive()
    }
}

impl EncoderHandle {
    pub fn new(factory: impl Fn() -> Arc<dyn Encoder> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            slot: Mutex::new(None),
        }
    }

    /// Handle over the ffmpeg command-line encoder.
    pub fn ffmpeg() -> Self {
        Self::new(|| Arc::new(FfmpegEncoder::new()) as Arc<dyn Encoder>)
    }

    pub async fn get(&self) -> CaptionkitResult<Arc<dyn Encoder>> {
        let mut slot = self.slot.lock().await;
        if let Some(encoder) = slot.as_ref() {
            return Ok(Arc::clone(encoder));
        }
        let encoder = (self.factory)();
        encoder.initialize().await?;
        info!(encoder = encoder.name(), "Encoder initialized");
        *slot = Some(Arc::clone(&encoder));
        Ok(encoder)
    }

    pub async fn is_initialized(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Shut down and drop the current encoder, if any.
    pub async fn reset(&self) {
        let encoder = self.slot.lock().await.take();
        if let Some(encoder) = encoder {
            if let Err(e) = encoder.shutdown().await {
                warn!(encoder = encoder.name(), error = %e, "Encoder shutdown failed");
            }
        }
    }
}

/// Encoder driving the `ffmpeg` binary.
#[derive(Debug, Clone, Default)]
pub struct FfmpegEncoder {
    binary: String,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn encode_args(&self, request: &EncodeRequest) -> CaptionkitResult<Vec<String>> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-framerate".to_string(),
            request.fps.to_string(),
            "-i".to_string(),
            request
                .frames_dir
                .join(&request.frame_pattern)
                .to_string_lossy()
                .into_owned(),
        ];
        if let Some(audio) = &request.audio {
            args.push("-i".to_string());
            args.push(audio.to_string_lossy().into_owned());
            args.extend(["-map", "0:v:0", "-map", "1:a:0"].map(String::from));
        }
        args.extend(codec_args(
            &request.video_codec,
            request.video_bitrate_kbps,
            request.audio_bitrate_kbps,
            request.audio.is_some(),
        )?);
        args.extend(
            [
                "-vf".to_string(),
                format!("scale={}:{}", request.width, request.height),
                "-r".to_string(),
                request.fps.to_string(),
            ],
        );
        if request.audio.is_some() {
            args.push("-shortest".to_string());
        }
        args.extend(["-progress", "pipe:1", "-nostats"].map(String::from));
        args.push(request.output.to_string_lossy().into_owned());
        Ok(args)
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn initialize(&self) -> CaptionkitResult<()> {
        if command_exists(&self.binary).await {
            Ok(())
        } else {
            Err(CaptionkitError::unsupported(format!(
                "No supported encoder found (expected {} in PATH)",
                self.binary
            )))
        }
    }

    async fn extract_audio(&self, request: &AudioRequest) -> CaptionkitResult<()> {
        let output = Command::new(&self.binary)
            .args([
                "-y",
                "-v",
                "error",
                "-ss",
                &format!("{:.6}", request.start_secs),
                "-t",
                &format!("{:.6}", request.duration_secs),
                "-i",
                &request.source,
                "-vn",
                "-c:a",
                "pcm_s16le",
            ])
            .arg(&request.output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CaptionkitError::encoding(format!("Failed to start ffmpeg: {e}")))?;

        if !output.status.success() {
            return Err(CaptionkitError::encoding(format!(
                "Audio extraction failed (status {}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        debug!(output = %request.output.display(), "Extracted audio");
        Ok(())
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> CaptionkitResult<()> {
        let args = self.encode_args(request)?;
        debug!(args = ?args, "Running ffmpeg");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CaptionkitError::encoding(format!("Failed to start ffmpeg: {e}")))?;

        info!(
            pid = child.id(),
            total_frames = request.total_frames,
            with_audio = request.audio.is_some(),
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptionkitError::encoding("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptionkitError::encoding("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let expected = request.duration_secs();
        let mut state = ProgressState::default();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| CaptionkitError::encoding(format!("Failed reading ffmpeg progress: {e}")))?
        {
            if let Some((key, value)) = line.trim().split_once('=') {
                state.update(key, value);
                if key == "progress" {
                    progress(state.fraction(expected));
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| CaptionkitError::encoding(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(CaptionkitError::encoding(format!(
                "ffmpeg encode failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }
        progress(1.0);
        Ok(())
    }

    async fn shutdown(&self) -> CaptionkitResult<()> {
        Ok(())
    }
}

/// Codec flags for a codec name from the export settings.
fn codec_args(
    codec: &str,
    video_bitrate_kbps: u32,
    audio_bitrate_kbps: u32,
    with_audio: bool,
) -> CaptionkitResult<Vec<String>> {
    let video_bitrate = format!("{}k", video_bitrate_kbps.max(500));
    let audio_bitrate = format!("{}k", audio_bitrate_kbps.max(64));

    let (video, audio_codec, mp4): (Vec<&str>, &str, bool) =
        match codec.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" | "libx264" => (
                vec!["-c:v", "libx264", "-preset", "medium", "-profile:v", "high"],
                "aac",
                true,
            ),
            "h265" | "hevc" | "libx265" => (
                vec!["-c:v", "libx265", "-preset", "medium", "-tag:v", "hvc1"],
                "aac",
                true,
            ),
            "vp9" | "libvpx-vp9" => (vec!["-c:v", "libvpx-vp9"], "libopus", false),
            other => {
                return Err(CaptionkitError::validation(format!(
                    "Unsupported video codec '{other}' (expected h264, h265, or vp9)"
                )))
            }
        };

    let mut args: Vec<String> = video.into_iter().map(String::from).collect();
    args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
    args.extend(["-b:v".to_string(), video_bitrate]);
    if with_audio {
        args.extend([
            "-c:a".to_string(),
            audio_codec.to_string(),
            "-b:a".to_string(),
            audio_bitrate,
        ]);
    } else {
        args.push("-an".to_string());
    }
    if mp4 {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    Ok(args)
}

/// Whether a codec name is accepted by [`FfmpegEncoder`].
pub fn is_supported_codec(codec: &str) -> bool {
    codec_args(codec, 0, 0, false).is_ok()
}

async fn command_exists(binary: &str) -> bool {
    Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Accumulates `key=value` lines from `ffmpeg -progress`.
#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }

    fn fraction(&self, expected_duration_secs: f64) -> f64 {
        if self.complete {
            1.0
        } else if expected_duration_secs <= 0.0 {
            0.0
        } else {
            (self.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn request(audio: Option<&str>) -> EncodeRequest {
        EncodeRequest {
            frames_dir: PathBuf::from("/tmp/stage"),
            frame_pattern: FRAME_PATTERN.to_string(),
            fps: 30,
            width: 1080,
            height: 1920,
            audio: audio.map(PathBuf::from),
            output: PathBuf::from("/tmp/out.mp4"),
            video_codec: "h264".to_string(),
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            total_frames: 90,
        }
    }

    #[test]
    fn test_frame_file_name() {
        assert_eq!(frame_file_name(7), "frame_000007.png");
    }

    #[test]
    fn test_progress_state_parses_microseconds() {
        let mut state = ProgressState::default();
        state.update("out_time_ms", "1500000");
        assert!((state.fraction(3.0) - 0.5).abs() < 1e-9);
        state.update("progress", "end");
        assert!((state.fraction(3.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_progress_state_clamps() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "9000000");
        assert!((state.fraction(3.0) - 1.0).abs() < 1e-9);
        assert_eq!(state.fraction(0.0), 0.0);
    }

    #[test]
    fn test_codec_args() {
        let args = codec_args("h264", 8000, 192, true).unwrap();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"8000k".to_string()));
        assert!(args.contains(&"+faststart".to_string()));

        let args = codec_args("vp9", 4000, 128, false).unwrap();
        assert!(args.contains(&"libvpx-vp9".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"+faststart".to_string()));

        assert!(matches!(
            codec_args("prores", 1, 1, false),
            Err(CaptionkitError::Validation { .. })
        ));
        assert!(is_supported_codec("HEVC"));
    }

    #[test]
    fn test_encode_args_with_audio() {
        let args = FfmpegEncoder::new()
            .encode_args(&request(Some("/tmp/stage/audio.wav")))
            .unwrap();
        assert!(args.contains(&"/tmp/stage/frame_%06d.png".to_string()));
        assert!(args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"1:a:0".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
    }

    #[test]
    fn test_video_only_request_drops_audio() {
        let req = request(Some("/tmp/a.wav")).video_only();
        assert!(req.audio.is_none());
        let args = FfmpegEncoder::new().encode_args(&req).unwrap();
        assert!(!args.contains(&"-shortest".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert!((req.duration_secs() - 3.0).abs() < 1e-9);
    }

    struct CountingEncoder {
        init_calls: Arc<AtomicUsize>,
        fail_init: bool,
    }

    #[async_trait]
    impl Encoder for CountingEncoder {
        fn name(&self) -> &str {
            "counting"
        }

        async fn initialize(&self) -> CaptionkitResult<()> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                Err(CaptionkitError::unsupported("no encoder"))
            } else {
                Ok(())
            }
        }

        async fn extract_audio(&self, _request: &AudioRequest) -> CaptionkitResult<()> {
            Ok(())
        }

        async fn encode(
            &self,
            _request: &EncodeRequest,
            _progress: &(dyn Fn(f64) + Send + Sync),
        ) -> CaptionkitResult<()> {
            Ok(())
        }

        async fn shutdown(&self) -> CaptionkitResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handle_initializes_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = EncoderHandle::new(move || {
            Arc::new(CountingEncoder {
                init_calls: Arc::clone(&counter),
                fail_init: false,
            }) as Arc<dyn Encoder>
        });

        assert!(!handle.is_initialized().await);
        handle.get().await.unwrap();
        handle.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(handle.is_initialized().await);

        handle.reset().await;
        assert!(!handle.is_initialized().await);
        handle.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_initialization_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = EncoderHandle::new(move || {
            Arc::new(CountingEncoder {
                init_calls: Arc::clone(&counter),
                fail_init: true,
            }) as Arc<dyn Encoder>
        });

        assert!(handle.get().await.is_err());
        assert!(handle.get().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!handle.is_initialized().await);
    }
}
