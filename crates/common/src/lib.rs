//! CaptionKit Common Utilities
//!
//! Shared infrastructure for all CaptionKit crates:
//! - Error taxonomy and result aliases
//! - Frame clock helpers for frame-accurate export
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
