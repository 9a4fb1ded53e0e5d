//! Caption styling.
//!
//! `CaptionStyle` is a plain value type: cloning it produces an
//! independent copy, so mutating one caption's style never leaks into
//! another caption that started from the same template.

use serde::{Deserialize, Serialize};

use crate::color::Rgba;

/// Line height values at or below this are multipliers of the font size;
/// larger values are literal pixels.
pub const LINE_HEIGHT_MULTIPLIER_LIMIT: f64 = 10.0;

/// Default line height multiplier when a style does not set one.
pub const DEFAULT_LINE_HEIGHT: f64 = 1.2;

/// Full caption style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionStyle {
    /// Font family name.
    pub font_family: String,

    /// Font size in canonical pixels.
    pub font_size: f64,

    /// Numeric weight (400 = normal, 700 = bold).
    pub font_weight: u16,

    pub font_style: FontStyle,

    pub text_decoration: TextDecoration,

    /// Text fill color.
    pub color: Rgba,

    /// Box color behind the text; `transparent` disables the box.
    pub background: Rgba,

    /// Fixed background box height, overriding the text-derived height.
    pub background_height: Option<f64>,

    /// Corner radius of the background box.
    pub background_radius: f64,

    pub text_align: TextAlign,

    pub direction: TextDirection,

    pub padding: Padding,

    /// Maximum block width in canonical pixels (defaults to 80% of frame).
    pub max_width: Option<f64>,

    /// Multiplier when `<= 10`, otherwise pixels.
    pub line_height: Option<f64>,

    /// Extra advance between glyphs in pixels.
    pub letter_spacing: f64,

    pub stroke: Option<Stroke>,

    pub shadow: Option<Shadow>,

    pub animation: Option<Animation>,

    pub karaoke: Option<KaraokeStyle>,

    /// Ordered keyword highlights; earlier entries win on overlap.
    pub keywords: Vec<KeywordHighlight>,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_family: "Inter".to_string(),
            font_size: 64.0,
            font_weight: 700,
            font_style: FontStyle::Normal,
            text_decoration: TextDecoration::None,
            color: Rgba::WHITE,
            background: Rgba::TRANSPARENT,
            background_height: None,
            background_radius: 12.0,
            text_align: TextAlign::Center,
            direction: TextDirection::Auto,
            padding: Padding::default(),
            max_width: None,
            line_height: None,
            letter_spacing: 0.0,
            stroke: Some(Stroke {
                color: Rgba::BLACK,
                width: 4.0,
            }),
            shadow: None,
            animation: None,
            karaoke: None,
            keywords: vec![],
        }
    }
}

impl CaptionStyle {
    /// Resolved line height in pixels for the given font size.
    pub fn line_height_px(&self, font_size: f64) -> f64 {
        match self.line_height {
            Some(value) if value > 0.0 && value <= LINE_HEIGHT_MULTIPLIER_LIMIT => {
                value * font_size
            }
            Some(value) if value > LINE_HEIGHT_MULTIPLIER_LIMIT => value,
            _ => DEFAULT_LINE_HEIGHT * font_size,
        }
    }

    pub fn has_background(&self) -> bool {
        !self.background.is_transparent()
    }

    pub fn is_bold(&self) -> bool {
        self.font_weight >= 600
    }

    /// Karaoke settings when karaoke rendering is switched on.
    pub fn active_karaoke(&self) -> Option<&KaraokeStyle> {
        self.karaoke.as_ref().filter(|k| k.enabled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextDecoration {
    #[default]
    None,
    Underline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Requested text direction. `Auto` defers to language and content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextDirection {
    Ltr,
    Rtl,
    #[default]
    Auto,
}

/// Inner padding of the caption block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub x: f64,
    pub y: f64,
}

impl Default for Padding {
    fn default() -> Self {
        Self { x: 24.0, y: 12.0 }
    }
}

/// Text outline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Rgba,
    pub width: f64,
}

/// Drop shadow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    pub offset_x: f64,
    pub offset_y: f64,
    pub blur: f64,
    pub color: Rgba,
}

/// Entry animation applied when a caption appears.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Animation {
    pub kind: AnimationKind,
    pub duration_secs: f64,
    #[serde(default)]
    pub delay_secs: f64,
    #[serde(default)]
    pub easing: Easing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    /// Opacity ramps from 0 to 1.
    Fade,
    /// Caption rises into place from below.
    SlideUp,
    /// Caption scales up from half size.
    Pop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseIn,
    #[default]
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Apply the easing curve to a linear progress value in `[0, 1]`.
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

/// Per-word highlight rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KaraokeStyle {
    pub enabled: bool,
    pub active_color: Rgba,
    /// Scale applied to the active word (1.0 = no change).
    pub active_scale: f64,
}

impl Default for KaraokeStyle {
    fn default() -> Self {
        Self {
            enabled: true,
            active_color: Rgba::rgb(255, 214, 0),
            active_scale: 1.15,
        }
    }
}

/// A substring rendered with its own color, weight, and background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordHighlight {
    pub text: String,
    pub color: Rgba,
    #[serde(default)]
    pub background_color: Option<Rgba>,
    #[serde(default)]
    pub font_weight: Option<u16>,
}
