//! Output geometry: frames, rectangles, and the caption display list.
//!
//! All coordinates here are output pixels with `(0, 0)` at the top-left of
//! the output frame.

use captionkit_caption_model::{Position, Rgba, CANONICAL_HEIGHT, CANONICAL_WIDTH};
use serde::Serialize;

use crate::direction::Direction;

/// Size of the surface a caption is laid out on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LayoutFrame {
    pub width: f64,
    pub height: f64,
}

impl LayoutFrame {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The canonical 1080x1920 frame.
    pub fn canonical() -> Self {
        Self::new(CANONICAL_WIDTH, CANONICAL_HEIGHT)
    }

    /// Uniform factor applied to canonical sizes (fonts, padding, strokes).
    pub fn scale(&self) -> f64 {
        (self.width / CANONICAL_WIDTH).min(self.height / CANONICAL_HEIGHT)
    }

    /// Map a canonical anchor position onto this frame.
    pub fn map_position(&self, position: &Position) -> (f64, f64) {
        (
            position.x * self.width / CANONICAL_WIDTH,
            position.y * self.height / CANONICAL_HEIGHT,
        )
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    /// Rectangle of the given size centred on `(cx, cy)`.
    pub fn centered(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Grow by `dx` on both horizontal sides and `dy` on both vertical sides.
    pub fn inflate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }
}

/// Font selection for a text run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FontSpec {
    pub family: String,
    /// Size in output pixels.
    pub size_px: f64,
    pub weight: u16,
    pub italic: bool,
}

impl FontSpec {
    pub fn is_bold(&self) -> bool {
        self.weight >= 600
    }
}

/// Outline around glyphs, in output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrokeSpec {
    pub color: Rgba,
    pub width: f64,
}

/// Drop shadow, in output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShadowSpec {
    pub offset_x: f64,
    pub offset_y: f64,
    pub blur: f64,
    pub color: Rgba,
}

/// A single glyph placed by manual advance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedGlyph {
    pub text: String,
    /// Left edge relative to the run origin.
    pub x: f64,
}

/// How a run must be handed to the text rasterizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GlyphMode {
    /// Draw the run as one shaped string. Required for joining scripts.
    Atomic,
    /// Draw glyph by glyph at precomputed offsets (letter spacing).
    Spaced(Vec<PlacedGlyph>),
}

/// Recolours part of an atomic run without splitting its text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorSpan {
    /// Byte range within the run's text.
    pub start: usize,
    pub end: usize,
    pub color: Rgba,
}

impl ColorSpan {
    pub fn contains(&self, byte: usize) -> bool {
        byte >= self.start && byte < self.end
    }
}

/// A styled run of text on one line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextOp {
    pub text: String,
    /// Left edge of the run.
    pub x: f64,
    pub baseline_y: f64,
    /// Measured advance of the run.
    pub width: f64,
    pub font: FontSpec,
    pub color: Rgba,
    pub direction: Direction,
    pub mode: GlyphMode,
    /// Colour overrides for parts of the text; `color` applies elsewhere.
    pub spans: Vec<ColorSpan>,
    pub stroke: Option<StrokeSpec>,
    pub shadow: Option<ShadowSpec>,
    /// Scale about the run centre (karaoke emphasis).
    pub scale: f64,
}

impl TextOp {
    /// Fill colour of the glyph whose cluster starts at `byte`.
    pub fn color_at(&self, byte: usize) -> Rgba {
        self.spans
            .iter()
            .find(|span| span.contains(byte))
            .map(|span| span.color)
            .unwrap_or(self.color)
    }

    /// Centre of the run box, used as the pivot for `scale`.
    pub fn pivot(&self) -> (f64, f64) {
        (
            self.x + self.width / 2.0,
            self.baseline_y - self.font.size_px * 0.35,
        )
    }
}

/// One drawing instruction of the caption overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DrawOp {
    /// Filled (optionally rounded) rectangle: backgrounds and underlines.
    Rect {
        rect: Rect,
        color: Rgba,
        radius: f64,
    },
    Text(TextOp),
}

/// Complete drawable geometry of one caption at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptionLayout {
    pub caption_id: String,
    /// Ops in painter's order.
    pub ops: Vec<DrawOp>,
    /// Anchor of the block in output pixels.
    pub anchor: (f64, f64),
    /// Extent of the block including padding.
    pub bounds: Rect,
    pub direction: Direction,
    pub line_count: usize,
    /// Whole-caption opacity in `[0, 1]`.
    pub opacity: f64,
    /// Whole-caption scale about `anchor`.
    pub scale: f64,
    /// Vertical displacement applied to the whole caption.
    pub offset_y: f64,
}

impl CaptionLayout {
    pub fn text_ops(&self) -> impl Iterator<Item = &TextOp> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text(text) => Some(text),
            DrawOp::Rect { .. } => None,
        })
    }

    /// Runs drawn with a non-default scale (the karaoke-active word).
    pub fn emphasized_runs(&self) -> impl Iterator<Item = &TextOp> {
        self.text_ops().filter(|op| (op.scale - 1.0).abs() > f64::EPSILON)
    }
}
