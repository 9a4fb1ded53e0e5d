//! Frame compositor: fits the source frame to the output aspect and
//! overlays the caption selected at each instant.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use captionkit_caption_model::Caption;
use captionkit_common::error::{CaptionkitError, CaptionkitResult};
use captionkit_layout_engine::{CaptionLayout, CaptionLayoutEngine, LayoutFrame};
use serde::{Deserialize, Serialize};

use crate::rasterizer::Rasterizer;
use crate::source::VideoFrame;

/// Output aspect presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectPreset {
    /// 1080x1920. The source fills the height; excess width is cropped.
    #[default]
    Portrait,
    /// 1920x1080. The source fills the width; excess height is cropped.
    Landscape,
}

impl AspectPreset {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            AspectPreset::Portrait => (1080, 1920),
            AspectPreset::Landscape => (1920, 1080),
        }
    }

    pub fn layout_frame(&self) -> LayoutFrame {
        let (w, h) = self.dimensions();
        LayoutFrame::new(f64::from(w), f64::from(h))
    }

    /// Where a `src_w`x`src_h` frame lands in the output.
    ///
    /// The fitted axis matches the output exactly; the other axis is
    /// centred, so it is cropped when larger and letterboxed when smaller.
    pub fn fit(&self, src_w: u32, src_h: u32) -> FramePlacement {
        let (out_w, out_h) = self.dimensions();
        let (out_w, out_h) = (f64::from(out_w), f64::from(out_h));
        let (src_w, src_h) = (f64::from(src_w.max(1)), f64::from(src_h.max(1)));

        let scale = match self {
            AspectPreset::Portrait => out_h / src_h,
            AspectPreset::Landscape => out_w / src_w,
        };
        let width = src_w * scale;
        let height = src_h * scale;
        FramePlacement {
            x: (out_w - width) / 2.0,
            y: (out_h - height) / 2.0,
            width,
            height,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectPreset::Portrait => "portrait",
            AspectPreset::Landscape => "landscape",
        }
    }
}

impl fmt::Display for AspectPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectPreset {
    type Err = CaptionkitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "portrait" | "9:16" => Ok(AspectPreset::Portrait),
            "landscape" | "16:9" => Ok(AspectPreset::Landscape),
            other => Err(CaptionkitError::validation(format!(
                "Unknown aspect preset '{other}' (expected portrait or landscape)"
            ))),
        }
    }
}

/// Destination rectangle of the scaled source frame, in output pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlacement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Draws one output frame: video pass, then caption overlay pass.
///
/// Preview and export both go through [`FrameCompositor::layout_for`], so a
/// caption looks the same in both.
#[derive(Debug, Clone)]
pub struct FrameCompositor {
    engine: Arc<CaptionLayoutEngine>,
    aspect: AspectPreset,
}

impl FrameCompositor {
    pub fn new(engine: Arc<CaptionLayoutEngine>, aspect: AspectPreset) -> Self {
        Self { engine, aspect }
    }

    pub fn aspect(&self) -> AspectPreset {
        self.aspect
    }

    pub fn output_size(&self) -> (u32, u32) {
        self.aspect.dimensions()
    }

    /// Layout of the caption shown at `t` in output pixels.
    pub fn layout_for(&self, captions: &[Caption], t: f64) -> Option<CaptionLayout> {
        self.engine
            .layout_at(captions, t, self.aspect.layout_frame())
    }

    /// Render `frame` with the caption active at `t` and encode a PNG still.
    pub fn composite(
        &self,
        raster: &mut dyn Rasterizer,
        frame: &VideoFrame,
        captions: &[Caption],
        t: f64,
    ) -> CaptionkitResult<Vec<u8>> {
        let (width, height) = self.output_size();
        raster.begin(width, height)?;
        raster.draw_frame(frame, &self.aspect.fit(frame.width, frame.height))?;
        if let Some(layout) = self.layout_for(captions, t) {
            raster.draw_overlay(&layout)?;
        }
        raster.encode_still()
    }

    /// Render only the caption overlay at `t`, for the live preview.
    pub fn render_overlay(
        &self,
        raster: &mut dyn Rasterizer,
        captions: &[Caption],
        t: f64,
    ) -> CaptionkitResult<Vec<u8>> {
        let (width, height) = self.output_size();
        raster.begin(width, height)?;
        if let Some(layout) = self.layout_for(captions, t) {
            raster.draw_overlay(&layout)?;
        }
        raster.encode_overlay()
    }
}
