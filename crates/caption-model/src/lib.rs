//! CaptionKit Caption Model
//!
//! Defines the core data contracts for caption editing:
//! - **Captions:** Timed text with position, style, and optional word timings
//! - **Styles:** Value-type caption styling (fonts, colors, karaoke, keywords)
//! - **Trim:** The trim window over the source video and its invariants
//! - **Clips:** Clip descriptors and transcript segments from collaborators
//! - **Templates:** Named styles for one-click application
//!
//! Caption positions live in a canonical 1080x1920 space so that layouts
//! survive changes of output aspect.

pub mod caption;
pub mod clip;
pub mod color;
pub mod style;
pub mod template;
pub mod trim;

pub use caption::*;
pub use clip::*;
pub use color::*;
pub use style::*;
pub use template::*;
pub use trim::*;

/// Errors raised when model invariants are violated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid time range: start {start} must be before end {end}")]
    InvalidTimeRange { start: f64, end: f64 },

    #[error("Invalid color '{value}': expected #rgb, #rrggbb, #rrggbbaa or 'transparent'")]
    InvalidColor { value: String },

    #[error("Unknown template: {name}")]
    UnknownTemplate { name: String },
}
