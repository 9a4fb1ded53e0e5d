//! Print or save the captions of a trim window.

use std::path::PathBuf;

use captionkit_common::config::AppConfig;
use captionkit_transcription::{generate_srt, generate_vtt};

use crate::SessionArgs;

pub async fn run(
    config: &AppConfig,
    session: SessionArgs,
    format: String,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = super::open_session(config, &session).await?;
    let captions = store.visible_captions();
    let trim = store.trim();

    eprintln!(
        "{} caption(s) in {:.2}s - {:.2}s",
        captions.len(),
        trim.start_secs,
        trim.end_secs
    );

    let rendered = match format.as_str() {
        "srt" => generate_srt(&captions),
        "vtt" => generate_vtt(&captions),
        "json" => serde_json::to_string_pretty(&captions)?,
        _ => {
            return Err(anyhow::anyhow!(
                "Unknown format: {format}. Use: srt, vtt, json"
            ));
        }
    };

    match output {
        Some(path) => {
            std::fs::write(&path, rendered)?;
            println!("Wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
