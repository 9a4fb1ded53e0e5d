//! Subtitle generation in SRT and VTT formats.

use captionkit_caption_model::Caption;
use captionkit_common::error::CaptionkitResult;

/// Generate SRT subtitle content from captions, in the given order.
pub fn generate_srt(captions: &[Caption]) -> String {
    let mut output = String::new();

    for (i, caption) in captions.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(caption.start_secs),
            format_srt_time(caption.end_secs),
        ));
        output.push_str(caption.text.trim());
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT subtitle content from captions.
pub fn generate_vtt(captions: &[Caption]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for caption in captions {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(caption.start_secs),
            format_vtt_time(caption.end_secs),
        ));
        output.push_str(caption.text.trim());
        output.push_str("\n\n");
    }

    output
}

fn split_millis(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    (
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000,
    )
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_millis(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
fn format_vtt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_millis(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// Save subtitles to a file.
pub fn save_subtitles(captions: &[Caption], path: &std::path::Path) -> CaptionkitResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("vtt") => generate_vtt(captions),
        _ => generate_srt(captions), // default to SRT
    };
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), count = captions.len(), "Subtitles written");
    Ok(())
}
