//! Transcription service contract.
//!
//! The provider is opaque: it receives a clip and eventually returns
//! full-video transcript segments, or fails. Failures are reported to the
//! editor as recoverable.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use captionkit_caption_model::{ClipDescriptor, Transcript};
use captionkit_common::error::CaptionkitError;
use tracing::{debug, info};

/// Errors a transcription provider can report.
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("No transcript available for {source_url}")]
    NotAvailable { source_url: String },

    #[error("Failed to read transcript {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed transcript {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Transcription provider failed: {message}")]
    Provider { message: String },
}

impl From<TranscriptionError> for CaptionkitError {
    fn from(err: TranscriptionError) -> Self {
        CaptionkitError::transcription(err.to_string())
    }
}

/// Opaque async speech-to-text provider.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Transcribe the full source of `clip`.
    async fn transcribe(&self, clip: &ClipDescriptor) -> Result<Transcript, TranscriptionError>;
}

/// Reads a transcript JSON file stored next to the source video.
///
/// For `talk.mp4` the sidecar is `talk.transcript.json`, unless an explicit
/// path was configured.
#[derive(Debug, Clone, Default)]
pub struct SidecarTranscriptionService {
    override_path: Option<PathBuf>,
}

impl SidecarTranscriptionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always read the transcript from `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            override_path: Some(path.into()),
        }
    }

    /// Sidecar location for a source path.
    pub fn sidecar_path(source: &Path) -> PathBuf {
        source.with_extension("transcript.json")
    }

    fn resolve(&self, clip: &ClipDescriptor) -> PathBuf {
        self.override_path
            .clone()
            .unwrap_or_else(|| Self::sidecar_path(Path::new(&clip.source_url)))
    }
}

#[async_trait]
impl TranscriptionService for SidecarTranscriptionService {
    async fn transcribe(&self, clip: &ClipDescriptor) -> Result<Transcript, TranscriptionError> {
        let path = self.resolve(clip);
        info!(path = %path.display(), source = %clip.source_url, "Loading sidecar transcript");

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(TranscriptionError::NotAvailable {
                source_url: clip.source_url.clone(),
            });
        }

        let json = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| TranscriptionError::Io {
                path: path.clone(),
                source,
            })?;
        let transcript: Transcript =
            serde_json::from_str(&json).map_err(|source| TranscriptionError::Parse {
                path: path.clone(),
                source,
            })?;

        debug!(
            segments = transcript.segments.len(),
            language = ?transcript.language,
            "Sidecar transcript loaded"
        );
        Ok(transcript)
    }
}
