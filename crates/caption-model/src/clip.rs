//! Clip descriptors and transcript segments supplied by collaborators.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::caption::WordTiming;

/// A transcript segment covering part of the full source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    #[serde(rename = "start")]
    pub start_secs: f64,
    #[serde(rename = "end")]
    pub end_secs: f64,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub words: Option<Vec<WordTiming>>,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start_secs: f64, end_secs: f64) -> Self {
        Self {
            text: text.into(),
            start_secs,
            end_secs,
            language: None,
            words: None,
        }
    }

    /// Whether the segment overlaps the half-open window `[start, end)`.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        crate::caption::overlaps(self.start_secs, self.end_secs, start, end)
    }

    /// Segments with an empty or inverted range cannot become captions.
    pub fn is_well_formed(&self) -> bool {
        self.start_secs < self.end_secs && !self.text.trim().is_empty()
    }
}

/// A full-video transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    #[serde(default)]
    pub language: Option<String>,
}

impl Transcript {
    /// Segments with the transcript-level language filled in where a
    /// segment does not carry its own.
    pub fn normalized_segments(&self) -> Vec<TranscriptSegment> {
        self.segments
            .iter()
            .filter(|s| s.is_well_formed())
            .map(|s| {
                let mut segment = s.clone();
                if segment.language.is_none() {
                    segment.language = self.language.clone();
                }
                segment
            })
            .collect()
    }
}

/// A clip handed over by the upload flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipDescriptor {
    /// Location of the source video (path or URL understood by the decoder).
    pub source_url: String,

    /// Length of the full source in seconds.
    pub source_duration: f64,

    /// Initial trim start.
    #[serde(rename = "start_time")]
    pub start_secs: f64,

    /// Initial trim end.
    #[serde(rename = "end_time")]
    pub end_secs: f64,

    /// Transcript, when the clip was already transcribed.
    #[serde(default)]
    pub transcription: Option<Transcript>,
}

impl ClipDescriptor {
    /// Load a clip descriptor from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClipError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ClipError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| ClipError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn needs_transcription(&self) -> bool {
        self.transcription.is_none()
    }
}

/// Errors that can occur when loading clip descriptors.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: std::path::PathBuf,
        source: serde_json::Error,
    },
}
