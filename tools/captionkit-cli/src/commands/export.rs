//! Render the trimmed clip with burned-in captions.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use captionkit_common::config::AppConfig;
use captionkit_layout_engine::CaptionLayoutEngine;
use captionkit_render_engine::{
    rebase_captions, EncoderHandle, ExportPipeline, ExportProgress, ExportRequest,
    ExportSettings, FfmpegFrameSource, FontBook, ProgressCallback, ShapingMeasurer,
    SoftwareRasterizer, VideoFrameSource,
};
use captionkit_transcription::save_subtitles;

use crate::SessionArgs;

pub async fn run(
    config: &AppConfig,
    session: SessionArgs,
    output: Option<PathBuf>,
    fps: Option<u32>,
    aspect: Option<String>,
    codec: Option<String>,
    subtitles: bool,
) -> anyhow::Result<()> {
    let mut store = super::open_session(config, &session).await?;
    let clip = store
        .clip()
        .ok_or_else(|| anyhow::anyhow!("No clip loaded"))?
        .clone();

    let mut settings = ExportSettings::from_defaults(&config.export)?;
    if let Some(fps) = fps {
        settings.fps = fps;
    }
    if let Some(aspect) = aspect {
        settings.aspect = aspect.parse()?;
    }
    if let Some(codec) = codec {
        settings.video_codec = codec;
    }

    let mut source = FfmpegFrameSource::new(clip.source_url.clone());
    let metadata = source.metadata().await?;
    if (metadata.duration_secs - store.source_duration()).abs() > 1e-3 {
        tracing::info!(
            declared = store.source_duration(),
            measured = metadata.duration_secs,
            "Using source duration reported by ffmpeg"
        );
        store.set_source_duration(metadata.duration_secs);
    }

    let output_path = output.unwrap_or_else(|| {
        config.export.output_dir.join(format!(
            "captionkit_{}.mp4",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ))
    });

    let trim = store.trim();
    let captions = store.visible_captions();

    println!("Exporting {}", clip.source_url);
    println!("  Trim: {:.2}s - {:.2}s", trim.start_secs, trim.end_secs);
    println!("  Captions: {}", captions.len());
    println!("  Output: {}", output_path.display());
    println!(
        "  Format: {} {} @ {}fps",
        settings.aspect, settings.video_codec, settings.fps
    );

    let fonts = Arc::new(FontBook::load(&config.fonts)?);
    if fonts.is_empty() {
        println!("  [WARN] No fonts configured; captions are laid out but not drawn");
    }
    let engine = Arc::new(CaptionLayoutEngine::new(Box::new(ShapingMeasurer::new(
        Arc::clone(&fonts),
    ))));
    let pipeline = ExportPipeline::new(engine, Arc::new(EncoderHandle::ffmpeg()));

    let request = ExportRequest {
        source: clip.source_url.clone(),
        trim,
        captions: captions.clone(),
        settings,
        output_path: output_path.clone(),
        staging_root: Some(config.export.staging_dir.clone()),
    };

    let progress_cb: ProgressCallback = Box::new(|p: ExportProgress| {
        print!(
            "\r  Progress: {:.1}% ({}/{} frames, {:?})  ",
            p.progress * 100.0,
            p.frames_rendered,
            p.total_frames,
            p.stage,
        );
        let _ = std::io::stdout().flush();
    });

    let mut raster = SoftwareRasterizer::new(fonts);
    let result = pipeline
        .run(request, &mut source, &mut raster, Some(progress_cb))
        .await;
    pipeline.encoder().reset().await;

    match result {
        Ok(result) => {
            println!("\nExport complete: {}", result.artifact.path().display());
            println!(
                "  {:.2}s, {} frames, {} bytes{}",
                result.duration_secs,
                result.frame_count,
                result.file_size,
                if result.has_audio { "" } else { " (no audio)" }
            );
            if subtitles {
                let path = output_path.with_extension("srt");
                let rebased = rebase_captions(&captions, trim.start_secs, trim.duration_secs());
                save_subtitles(&rebased, &path)?;
                println!("  Subtitles: {}", path.display());
            }
            Ok(())
        }
        Err(e) => {
            println!("\nExport failed: {e}");
            Err(e.into())
        }
    }
}
