//! CaptionKit Render Engine
//!
//! Burns captions into the trimmed source video, frame by frame, with the
//! same layout the live preview uses.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source.mp4 ── seek(t) ──┐
//!                         ├── Fit/Crop (aspect preset)
//! captions ── layout(t) ──┤
//!                         ├── Overlay pass (tiny-skia)
//!                         ▼
//!                    PNG still ── staging/frame_%06d.png
//!                                        │
//! source audio ── extract (trim) ────────┤
//!                                        ▼
//!                                  Encode (ffmpeg)
//!                                        │
//!                                        ▼
//!                                    output.mp4
//! ```

pub mod compositor;
pub mod encoder;
pub mod export;
pub mod fonts;
pub mod rasterizer;
pub mod source;

pub use compositor::*;
pub use encoder::*;
pub use export::*;
pub use fonts::*;
pub use rasterizer::*;
pub use source::*;
