//! CaptionKit Layout Engine
//!
//! Turns a caption, its style, and a point in time into drawable geometry:
//! - **Time gating:** one caption per instant, most recent start wins
//! - **Direction:** explicit, language-derived, or detected from the text
//! - **Wrapping:** greedy word wrap against the block width
//! - **Render modes:** plain, keyword-highlighted, or karaoke
//! - **Animation:** eased entry progress mapped to opacity/offset/scale
//!
//! This crate is pure computation: text measurement is injected through
//! [`TextMeasurer`], and the output is a display list that any rasterizer
//! can replay. Preview and export therefore share one layout.

pub mod animation;
pub mod direction;
pub mod engine;
pub mod geometry;
pub mod karaoke;
pub mod keywords;
pub mod measure;
pub mod wrap;

pub use direction::{detect_direction, resolve_direction, Direction};
pub use engine::CaptionLayoutEngine;
pub use geometry::*;
pub use measure::{HeuristicMeasurer, TextMeasurer};
