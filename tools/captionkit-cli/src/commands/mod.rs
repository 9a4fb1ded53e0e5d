pub mod captions;
pub mod check;
pub mod export;
pub mod templates;

use captionkit_caption_model::{ClipDescriptor, TemplateStore};
use captionkit_common::config::AppConfig;
use captionkit_timeline::{EditorPhase, TrimTimelineStore};
use captionkit_transcription::SidecarTranscriptionService;

use crate::SessionArgs;

/// Built-in templates plus the user's template file, if configured.
pub fn load_templates(config: &AppConfig) -> anyhow::Result<TemplateStore> {
    let mut templates = TemplateStore::with_builtins();
    if let Some(path) = &config.templates_file {
        let added = templates
            .load_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load templates: {e}"))?;
        tracing::debug!(path = %path.display(), added, "Loaded user templates");
    }
    Ok(templates)
}

/// Open a clip, transcribe it if needed, and apply trim and template
/// overrides.
pub async fn open_session(
    config: &AppConfig,
    args: &SessionArgs,
) -> anyhow::Result<TrimTimelineStore> {
    let clip = ClipDescriptor::load(&args.clip)
        .map_err(|e| anyhow::anyhow!("Failed to load clip: {e}"))?;

    let mut store = TrimTimelineStore::new();
    store.load_clip(clip)?;

    if matches!(store.phase(), EditorPhase::ClipLoaded) {
        let service = match &args.transcript {
            Some(path) => SidecarTranscriptionService::with_path(path),
            None => SidecarTranscriptionService::new(),
        };
        let phase = store.run_transcription(&service).await?.clone();
        if let EditorPhase::TranscriptionFailed { message } = phase {
            eprintln!("Transcription unavailable ({message}); continuing without captions");
            store.skip_transcription()?;
        }
    }

    if args.start.is_some() || args.end.is_some() {
        let trim = store.trim();
        store.set_trim_points(
            args.start.unwrap_or(trim.start_secs),
            args.end.unwrap_or(trim.end_secs),
        );
    }

    if let Some(name) = &args.template {
        let style = load_templates(config)?.get(name)?;
        store.apply_style_to_all(&style);
    }

    Ok(store)
}
