//! CaptionKit Transcription
//!
//! Speech-to-text is an external collaborator; this crate holds the seams:
//! - **Transcription:** the async `TranscriptionService` contract and a
//!   sidecar-file implementation
//! - **Subtitle Generation:** SRT/VTT output from the active caption set

pub mod subtitles;
pub mod transcription;

pub use subtitles::*;
pub use transcription::*;
