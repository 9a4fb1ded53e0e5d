//! CaptionKit Timeline
//!
//! Owns the editing session of one clip:
//! - **Trim window:** clamped start/end over the source video
//! - **Captions:** rematerialized from the authoritative transcript on
//!   every trim change, preserving user edits and refilling only the gaps
//! - **Editor phase:** clip loading and transcription state machine

pub mod error;
pub mod state;
pub mod store;

pub use error::*;
pub use state::*;
pub use store::*;
