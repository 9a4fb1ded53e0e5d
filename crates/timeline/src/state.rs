//! Editor phase state machine.

use serde::Serialize;

use crate::error::TimelineError;

/// Where the editing session stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum EditorPhase {
    /// No clip loaded.
    #[default]
    Idle,
    /// A clip is loaded; it may still need transcription.
    ClipLoaded,
    /// Waiting on the transcription service.
    Transcribing,
    /// The last transcription attempt failed. The user may retry or skip.
    TranscriptionFailed { message: String },
    /// Captions (possibly none) are available for editing and export.
    Ready,
}

/// Events that move the editor between phases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    LoadClip,
    BeginTranscription,
    /// A transcript arrived, from the service or with the clip itself.
    TranscriptReady,
    TranscriptionFailed { message: String },
    RetryTranscription,
    SkipTranscription,
}

impl EditorEvent {
    fn label(&self) -> &'static str {
        match self {
            EditorEvent::LoadClip => "load a clip",
            EditorEvent::BeginTranscription => "begin transcription",
            EditorEvent::TranscriptReady => "accept a transcript",
            EditorEvent::TranscriptionFailed { .. } => "record a transcription failure",
            EditorEvent::RetryTranscription => "retry transcription",
            EditorEvent::SkipTranscription => "skip transcription",
        }
    }
}

impl EditorPhase {
    pub fn label(&self) -> &'static str {
        match self {
            EditorPhase::Idle => "idle",
            EditorPhase::ClipLoaded => "clip loaded",
            EditorPhase::Transcribing => "transcribing",
            EditorPhase::TranscriptionFailed { .. } => "transcription failed",
            EditorPhase::Ready => "ready",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EditorPhase::Ready)
    }

    /// The phase reached by applying `event`, or `InvalidTransition`.
    pub fn next(&self, event: EditorEvent) -> Result<EditorPhase, TimelineError> {
        use EditorEvent as E;
        use EditorPhase as P;

        let next = match (self, &event) {
            (P::Transcribing, E::LoadClip) => None,
            (_, E::LoadClip) => Some(P::ClipLoaded),
            (P::ClipLoaded, E::BeginTranscription) => Some(P::Transcribing),
            (P::ClipLoaded | P::Transcribing, E::TranscriptReady) => Some(P::Ready),
            (P::Transcribing, E::TranscriptionFailed { message }) => {
                Some(P::TranscriptionFailed {
                    message: message.clone(),
                })
            }
            (P::TranscriptionFailed { .. }, E::RetryTranscription) => Some(P::Transcribing),
            (P::ClipLoaded | P::TranscriptionFailed { .. }, E::SkipTranscription) => {
                Some(P::Ready)
            }
            _ => None,
        };

        next.ok_or_else(|| TimelineError::InvalidTransition {
            from: self.label().to_string(),
            action: event.label().to_string(),
        })
    }
}
