use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use captionkit_caption_model::{Caption, TrimPoints};
use captionkit_common::error::{CaptionkitError, CaptionkitResult};
use captionkit_layout_engine::{CaptionLayout, CaptionLayoutEngine};
use captionkit_render_engine::{
    AudioRequest, EncodeRequest, Encoder, EncoderHandle, ExportPipeline, ExportProgress,
    ExportRequest, ExportSettings, ExportStage, FramePlacement, Rasterizer, SourceMetadata,
    VideoFrame, VideoFrameSource,
};

#[derive(Clone, Default)]
struct SourceLog {
    seeks: Arc<Mutex<Vec<f64>>>,
    metadata_calls: Arc<AtomicUsize>,
    closed: Arc<AtomicBool>,
}

struct MockSource {
    log: SourceLog,
    has_audio: bool,
    hang_at: Option<usize>,
    fail_metadata: bool,
    duration_secs: f64,
}

impl MockSource {
    fn new(log: &SourceLog) -> Self {
        Self {
            log: log.clone(),
            has_audio: true,
            hang_at: None,
            fail_metadata: false,
            duration_secs: 60.0,
        }
    }
}

#[async_trait]
impl VideoFrameSource for MockSource {
    async fn metadata(&mut self) -> CaptionkitResult<SourceMetadata> {
        self.log.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_metadata {
            return Err(CaptionkitError::FileNotFound {
                path: "missing.mp4".into(),
            });
        }
        Ok(SourceMetadata {
            width: 4,
            height: 4,
            duration_secs: self.duration_secs,
            has_audio: self.has_audio,
        })
    }

    async fn seek(&mut self, time_secs: f64) -> CaptionkitResult<VideoFrame> {
        let index = {
            let mut seeks = self.log.seeks.lock().unwrap();
            seeks.push(time_secs);
            seeks.len() - 1
        };
        if self.hang_at == Some(index) {
            return std::future::pending().await;
        }
        if time_secs >= self.duration_secs {
            return Err(CaptionkitError::resource_load(format!(
                "no frame at {time_secs:.3}s"
            )));
        }
        Ok(VideoFrame::solid(4, 4, [10, 20, 30, 255]))
    }

    async fn close(&mut self) -> CaptionkitResult<()> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct MockRasterizer {
    overlays: Vec<String>,
    stills: usize,
}

impl Rasterizer for MockRasterizer {
    fn begin(&mut self, _width: u32, _height: u32) -> CaptionkitResult<()> {
        Ok(())
    }

    fn draw_frame(
        &mut self,
        _frame: &VideoFrame,
        _placement: &FramePlacement,
    ) -> CaptionkitResult<()> {
        Ok(())
    }

    fn draw_overlay(&mut self, layout: &CaptionLayout) -> CaptionkitResult<()> {
        self.overlays.push(layout.caption_id.clone());
        Ok(())
    }

    fn encode_still(&mut self) -> CaptionkitResult<Vec<u8>> {
        self.stills += 1;
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    fn encode_overlay(&mut self) -> CaptionkitResult<Vec<u8>> {
        Ok(vec![])
    }
}

#[derive(Clone, Default)]
struct MockEncoder {
    fail_audio_extract: bool,
    fail_with_audio: bool,
    fail_always: bool,
    requests: Arc<Mutex<Vec<EncodeRequest>>>,
    staged_frames: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl Encoder for MockEncoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn initialize(&self) -> CaptionkitResult<()> {
        Ok(())
    }

    async fn extract_audio(&self, request: &AudioRequest) -> CaptionkitResult<()> {
        if self.fail_audio_extract {
            return Err(CaptionkitError::encoding("no audio stream decodable"));
        }
        std::fs::write(&request.output, b"pcm")?;
        Ok(())
    }

    async fn encode(
        &self,
        request: &EncodeRequest,
        progress: &(dyn Fn(f64) + Send + Sync),
    ) -> CaptionkitResult<()> {
        self.requests.lock().unwrap().push(request.clone());
        let staged = std::fs::read_dir(&request.frames_dir)?
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("frame_"))
            .count();
        self.staged_frames.lock().unwrap().push(staged);

        std::fs::write(&request.output, b"partial")?;
        if self.fail_always || (self.fail_with_audio && request.audio.is_some()) {
            return Err(CaptionkitError::encoding("muxer rejected stream"));
        }
        progress(0.5);
        progress(1.0);
        std::fs::write(&request.output, b"video-bytes")?;
        Ok(())
    }

    async fn shutdown(&self) -> CaptionkitResult<()> {
        Ok(())
    }
}

struct Fixture {
    staging_root: tempfile::TempDir,
    output_dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            staging_root: tempfile::tempdir().unwrap(),
            output_dir: tempfile::tempdir().unwrap(),
        }
    }

    fn request(&self, start: f64, end: f64, captions: Vec<Caption>) -> ExportRequest {
        ExportRequest {
            source: "clip.mp4".to_string(),
            trim: TrimPoints {
                start_secs: start,
                end_secs: end,
            },
            captions,
            settings: ExportSettings {
                fps: 30,
                ..ExportSettings::default()
            },
            output_path: self.output_dir.path().join("out.mp4"),
            staging_root: Some(self.staging_root.path().to_path_buf()),
        }
    }

    fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging_root.path())
            .unwrap()
            .next()
            .is_none()
    }
}

fn pipeline(encoder: &MockEncoder) -> ExportPipeline {
    let encoder = encoder.clone();
    ExportPipeline::new(
        Arc::new(CaptionLayoutEngine::default()),
        Arc::new(EncoderHandle::new(move || {
            Arc::new(encoder.clone()) as Arc<dyn Encoder>
        })),
    )
}

#[tokio::test]
async fn test_one_second_at_30fps_seeks_30_frames() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource::new(&log);
    let mut raster = MockRasterizer::default();

    let result = pipeline(&encoder)
        .run(
            fixture.request(10.0, 11.0, vec![]),
            &mut source,
            &mut raster,
            None,
        )
        .await
        .unwrap();

    let seeks = log.seeks.lock().unwrap().clone();
    assert_eq!(seeks.len(), 30);
    assert!((seeks[0] - 10.0).abs() < 1e-9);
    assert!((seeks[29] - (10.0 + 29.0 / 30.0)).abs() < 1e-9);
    assert!(seeks.windows(2).all(|w| w[0] < w[1]));

    assert_eq!(result.frame_count, 30);
    assert!((result.duration_secs - 1.0).abs() < 1e-9);
    assert_eq!(result.video_bytes, b"video-bytes");
    assert_eq!(result.file_size, 11);
    assert!(result.has_audio);
    assert_eq!(raster.stills, 30);

    assert_eq!(*encoder.staged_frames.lock().unwrap(), vec![30]);
    let requests = encoder.requests.lock().unwrap();
    assert_eq!(requests[0].total_frames, 30);
    assert!(requests[0].audio.is_some());

    assert!(log.closed.load(Ordering::SeqCst));
    assert!(fixture.staging_is_empty());
    assert!(result.artifact.path().exists());
}

#[tokio::test]
async fn test_audio_extraction_failure_exports_video_only() {
    let fixture = Fixture::new();
    let encoder = MockEncoder {
        fail_audio_extract: true,
        ..MockEncoder::default()
    };
    let log = SourceLog::default();
    let mut source = MockSource::new(&log);
    let mut raster = MockRasterizer::default();

    let result = pipeline(&encoder)
        .run(
            fixture.request(0.0, 0.5, vec![]),
            &mut source,
            &mut raster,
            None,
        )
        .await
        .unwrap();

    assert!(!result.has_audio);
    assert_eq!(result.frame_count, 15);
    let requests = encoder.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].audio.is_none());
}

#[tokio::test]
async fn test_hung_seek_times_out_and_cleans_up() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource {
        hang_at: Some(3),
        ..MockSource::new(&log)
    };
    let mut raster = MockRasterizer::default();
    let mut request = fixture.request(10.0, 12.0, vec![]);
    request.settings.seek_timeout = Duration::from_millis(50);
    let output = request.output_path.clone();

    let err = pipeline(&encoder)
        .run(request, &mut source, &mut raster, None)
        .await
        .unwrap_err();

    match err {
        CaptionkitError::SeekTimeout {
            frame_index,
            time_secs,
            timeout_ms,
        } => {
            assert_eq!(frame_index, 3);
            assert!((time_secs - 10.1).abs() < 1e-9);
            assert_eq!(timeout_ms, 50);
        }
        other => panic!("expected SeekTimeout, got {other:?}"),
    }
    assert_eq!(log.seeks.lock().unwrap().len(), 4);
    assert!(log.closed.load(Ordering::SeqCst));
    assert!(fixture.staging_is_empty());
    assert!(!output.exists());
    assert!(encoder.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_audio_encode_retries_video_only() {
    let fixture = Fixture::new();
    let encoder = MockEncoder {
        fail_with_audio: true,
        ..MockEncoder::default()
    };
    let log = SourceLog::default();
    let mut source = MockSource::new(&log);
    let mut raster = MockRasterizer::default();

    let result = pipeline(&encoder)
        .run(
            fixture.request(1.0, 1.2, vec![]),
            &mut source,
            &mut raster,
            None,
        )
        .await
        .unwrap();

    assert!(!result.has_audio);
    assert_eq!(result.video_bytes, b"video-bytes");
    let requests = encoder.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].audio.is_some());
    assert!(requests[1].audio.is_none());
}

#[tokio::test]
async fn test_encoding_failure_removes_partial_output() {
    let fixture = Fixture::new();
    let encoder = MockEncoder {
        fail_always: true,
        ..MockEncoder::default()
    };
    let log = SourceLog::default();
    let mut source = MockSource {
        has_audio: false,
        ..MockSource::new(&log)
    };
    let mut raster = MockRasterizer::default();
    let request = fixture.request(0.0, 0.2, vec![]);
    let output = request.output_path.clone();

    let err = pipeline(&encoder)
        .run(request, &mut source, &mut raster, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CaptionkitError::Encoding { .. }));
    assert_eq!(encoder.requests.lock().unwrap().len(), 1);
    assert!(!output.exists());
    assert!(log.closed.load(Ordering::SeqCst));
    assert!(fixture.staging_is_empty());
}

#[tokio::test]
async fn test_progress_is_monotonic_and_completes() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource::new(&log);
    let mut raster = MockRasterizer::default();

    let seen: Arc<Mutex<Vec<ExportProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = Box::new(move |p: ExportProgress| sink.lock().unwrap().push(p));

    pipeline(&encoder)
        .run(
            fixture.request(0.0, 2.0, vec![]),
            &mut source,
            &mut raster,
            Some(callback),
        )
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    assert!(seen.windows(2).all(|w| w[0].progress <= w[1].progress));
    assert!(seen
        .iter()
        .any(|p| p.stage == ExportStage::Writing && (p.progress - 0.85).abs() < 1e-9));
    assert!(seen
        .iter()
        .filter(|p| p.stage == ExportStage::Encoding)
        .all(|p| p.progress >= 0.85 && p.progress <= 0.95 + 1e-9));
    let last = seen.last().unwrap();
    assert_eq!(last.stage, ExportStage::Complete);
    assert!((last.progress - 1.0).abs() < 1e-9);
    assert_eq!(last.total_frames, 60);
}

#[tokio::test]
async fn test_invalid_request_never_touches_source() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource::new(&log);
    let mut raster = MockRasterizer::default();

    let err = pipeline(&encoder)
        .run(
            fixture.request(5.0, 5.0, vec![]),
            &mut source,
            &mut raster,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CaptionkitError::Validation { .. }));
    assert_eq!(log.metadata_calls.load(Ordering::SeqCst), 0);
    assert!(log.seeks.lock().unwrap().is_empty());
    assert!(!log.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_metadata_failure_is_resource_load() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource {
        fail_metadata: true,
        ..MockSource::new(&log)
    };
    let mut raster = MockRasterizer::default();

    let err = pipeline(&encoder)
        .run(
            fixture.request(0.0, 1.0, vec![]),
            &mut source,
            &mut raster,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CaptionkitError::ResourceLoad { .. }));
    assert!(log.closed.load(Ordering::SeqCst));
    assert!(fixture.staging_is_empty());
}

#[tokio::test]
async fn test_failed_render_keeps_existing_output() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource {
        fail_metadata: true,
        ..MockSource::new(&log)
    };
    let mut raster = MockRasterizer::default();
    let request = fixture.request(0.0, 1.0, vec![]);
    let output = request.output_path.clone();
    std::fs::write(&output, b"previous export").unwrap();

    let err = pipeline(&encoder)
        .run(request, &mut source, &mut raster, None)
        .await
        .unwrap_err();

    assert!(matches!(err, CaptionkitError::ResourceLoad { .. }));
    assert_eq!(std::fs::read(&output).unwrap(), b"previous export");
    assert!(encoder.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_trim_past_source_end_repeats_last_frame() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource {
        duration_secs: 1.5,
        ..MockSource::new(&log)
    };
    let mut raster = MockRasterizer::default();

    let result = pipeline(&encoder)
        .run(
            fixture.request(0.0, 2.0, vec![]),
            &mut source,
            &mut raster,
            None,
        )
        .await
        .unwrap();

    assert_eq!(result.frame_count, 60);
    let seeks = log.seeks.lock().unwrap().clone();
    assert_eq!(seeks.len(), 60);
    let last = 1.5 - 1.0 / 30.0;
    assert!(seeks.iter().all(|t| *t <= last + 1e-9));
    assert!((seeks[59] - last).abs() < 1e-9);
    assert!(seeks.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_trim_starting_past_source_end_is_rejected() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource {
        duration_secs: 1.5,
        ..MockSource::new(&log)
    };
    let mut raster = MockRasterizer::default();

    let err = pipeline(&encoder)
        .run(
            fixture.request(2.0, 3.0, vec![]),
            &mut source,
            &mut raster,
            None,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CaptionkitError::Validation { .. }));
    assert!(log.seeks.lock().unwrap().is_empty());
    assert!(log.closed.load(Ordering::SeqCst));
    assert!(fixture.staging_is_empty());
}

#[tokio::test]
async fn test_missing_staging_root_is_created() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource::new(&log);
    let mut raster = MockRasterizer::default();
    let mut request = fixture.request(0.0, 0.1, vec![]);
    let nested = fixture.staging_root.path().join("nested").join("staging");
    request.staging_root = Some(nested.clone());

    pipeline(&encoder)
        .run(request, &mut source, &mut raster, None)
        .await
        .unwrap();

    assert!(nested.is_dir());
    assert!(std::fs::read_dir(&nested).unwrap().next().is_none());
}

#[tokio::test]
async fn test_captions_are_rebased_onto_the_trim() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource::new(&log);
    let mut raster = MockRasterizer::default();
    let captions = vec![
        Caption::new("early", "Before the trim", 2.0, 5.0).unwrap(),
        Caption::new("late", "Second half", 10.5, 11.0).unwrap(),
    ];

    let result = pipeline(&encoder)
        .run(
            fixture.request(10.0, 11.0, captions),
            &mut source,
            &mut raster,
            None,
        )
        .await
        .unwrap();

    assert_eq!(raster.overlays.len(), 15);
    assert!(raster.overlays.iter().all(|id| id == "late"));
    let styles = &result.settings.caption_styles;
    assert_eq!(styles.len(), 1);
    assert_eq!(styles[0].caption_id, "late");
    assert!((result.settings.start_secs - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_revoke_deletes_artifact() {
    let fixture = Fixture::new();
    let encoder = MockEncoder::default();
    let log = SourceLog::default();
    let mut source = MockSource::new(&log);
    let mut raster = MockRasterizer::default();

    let result = pipeline(&encoder)
        .run(
            fixture.request(0.0, 0.1, vec![]),
            &mut source,
            &mut raster,
            None,
        )
        .await
        .unwrap();

    let path = result.artifact.path().to_path_buf();
    assert!(Path::new(&path).exists());
    result.artifact.revoke().await.unwrap();
    assert!(!path.exists());
}
