//! Font loading and shaped text measurement.

use std::path::Path;
use std::sync::Arc;

use captionkit_common::config::FontConfig;
use captionkit_common::error::{CaptionkitError, CaptionkitResult};
use captionkit_layout_engine::measure::{HeuristicMeasurer, TextMeasurer};
use captionkit_layout_engine::{Direction, FontSpec};
use tracing::{debug, info};

/// A parsed font file and the face properties used to select it.
#[derive(Debug, Clone)]
pub struct LoadedFont {
    pub family: String,
    pub weight: u16,
    pub italic: bool,
    data: Arc<Vec<u8>>,
}

impl LoadedFont {
    /// Parse `data`, reading family, weight, and slant from the font tables.
    pub fn from_bytes(data: Vec<u8>) -> CaptionkitResult<Self> {
        let face = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| CaptionkitError::resource_load(format!("Invalid font data: {e}")))?;

        let family = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == ttf_parser::name_id::FAMILY)
            .find_map(|name| name.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let weight = face.weight().to_number();
        let italic = face.is_italic();

        Ok(Self {
            family,
            weight,
            italic,
            data: Arc::new(data),
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shaping face over this font's data.
    pub fn face(&self) -> Option<rustybuzz::Face<'_>> {
        rustybuzz::Face::from_slice(&self.data, 0)
    }
}

/// The set of fonts available to measurement and drawing.
#[derive(Debug, Clone, Default)]
pub struct FontBook {
    fonts: Vec<LoadedFont>,
    default_family: String,
}

impl FontBook {
    /// Read every configured font file.
    pub fn load(config: &FontConfig) -> CaptionkitResult<Self> {
        let mut book = Self::empty(&config.default_family);
        for path in &config.files {
            book.add_file(path)?;
        }
        info!(
            fonts = book.fonts.len(),
            default_family = %book.default_family,
            "Loaded fonts"
        );
        Ok(book)
    }

    pub fn empty(default_family: impl Into<String>) -> Self {
        Self {
            fonts: Vec::new(),
            default_family: default_family.into(),
        }
    }

    pub fn add_file(&mut self, path: &Path) -> CaptionkitResult<()> {
        if !path.exists() {
            return Err(CaptionkitError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let data = std::fs::read(path)?;
        let font = LoadedFont::from_bytes(data).map_err(|e| {
            CaptionkitError::resource_load(format!("{}: {e}", path.display()))
        })?;
        debug!(
            path = %path.display(),
            family = %font.family,
            weight = font.weight,
            italic = font.italic,
            "Registered font"
        );
        self.fonts.push(font);
        Ok(())
    }

    pub fn add(&mut self, font: LoadedFont) {
        self.fonts.push(font);
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn default_family(&self) -> &str {
        &self.default_family
    }

    pub fn families(&self) -> Vec<&str> {
        let mut families: Vec<&str> = self.fonts.iter().map(|f| f.family.as_str()).collect();
        families.sort_unstable();
        families.dedup();
        families
    }

    /// Best font for the request: the named family, then the default
    /// family, then anything loaded. Within a family the matching slant and
    /// the nearest weight win.
    pub fn resolve(&self, family: &str, weight: u16, italic: bool) -> Option<&LoadedFont> {
        let pick = |family: Option<&str>| {
            self.fonts
                .iter()
                .filter(|f| family.map_or(true, |name| f.family.eq_ignore_ascii_case(name)))
                .min_by_key(|f| {
                    let slant_penalty = if f.italic == italic { 0 } else { 1000 };
                    slant_penalty + (i32::from(f.weight) - i32::from(weight)).unsigned_abs()
                })
        };
        pick(Some(family))
            .or_else(|| pick(Some(&self.default_family)))
            .or_else(|| pick(None))
    }

    pub fn resolve_spec(&self, font: &FontSpec) -> Option<&LoadedFont> {
        self.resolve(&font.family, font.weight, font.italic)
    }
}

/// One positioned glyph of a shaped run, in font units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ShapedGlyph {
    pub glyph: u16,
    /// Byte offset in the run's text of the cluster this glyph belongs to.
    pub cluster: usize,
    pub x_advance: i32,
    pub x_offset: i32,
    pub y_offset: i32,
}

/// Shape `text` as one run.
pub(crate) fn shape_run(
    face: &rustybuzz::Face<'_>,
    text: &str,
    direction: Direction,
) -> Vec<ShapedGlyph> {
    let mut buffer = rustybuzz::UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.guess_segment_properties();
    buffer.set_direction(match direction {
        Direction::Ltr => rustybuzz::Direction::LeftToRight,
        Direction::Rtl => rustybuzz::Direction::RightToLeft,
    });
    let shaped = rustybuzz::shape(face, &[], buffer);
    shaped
        .glyph_infos()
        .iter()
        .zip(shaped.glyph_positions())
        .map(|(info, pos)| ShapedGlyph {
            glyph: info.glyph_id as u16,
            cluster: info.cluster as usize,
            x_advance: pos.x_advance,
            x_offset: pos.x_offset,
            y_offset: pos.y_offset,
        })
        .collect()
}

/// Measures text by shaping it with the loaded fonts.
///
/// Falls back to [`HeuristicMeasurer`] when no font matches, so layout
/// never fails on a missing family.
#[derive(Debug, Clone)]
pub struct ShapingMeasurer {
    fonts: Arc<FontBook>,
    fallback: HeuristicMeasurer,
}

impl ShapingMeasurer {
    pub fn new(fonts: Arc<FontBook>) -> Self {
        Self {
            fonts,
            fallback: HeuristicMeasurer,
        }
    }

    pub fn fonts(&self) -> &Arc<FontBook> {
        &self.fonts
    }
}

impl TextMeasurer for ShapingMeasurer {
    fn advance(&self, text: &str, font: &FontSpec, direction: Direction) -> f64 {
        let face = self.fonts.resolve_spec(font).and_then(LoadedFont::face);
        let Some(face) = face else {
            return self.fallback.advance(text, font, direction);
        };
        let units_per_em = f64::from(face.units_per_em().max(1));
        let total: i64 = shape_run(&face, text, direction)
            .iter()
            .map(|g| i64::from(g.x_advance))
            .sum();
        total as f64 * font.size_px / units_per_em
    }
}
