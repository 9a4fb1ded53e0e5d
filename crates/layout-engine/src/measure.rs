//! Text measurement seam.

use crate::direction::Direction;
use crate::geometry::FontSpec;

/// Measures the horizontal advance of a string.
///
/// The render engine provides a shaping implementation backed by real font
/// files; [`HeuristicMeasurer`] is a deterministic stand-in used when no
/// fonts are loaded and in tests.
pub trait TextMeasurer: Send + Sync {
    /// Advance width in pixels of `text` shaped as a single run.
    fn advance(&self, text: &str, font: &FontSpec, direction: Direction) -> f64;
}

/// Width estimate from per-character classes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMeasurer;

impl HeuristicMeasurer {
    fn char_em(c: char) -> f64 {
        match c {
            ' ' | '\u{00A0}' => 0.28,
            'i' | 'l' | 'j' | 'I' | '.' | ',' | '\'' | '!' | '|' | ':' | ';' => 0.3,
            'm' | 'w' | 'M' | 'W' => 0.85,
            c if is_wide(c) => 1.0,
            c if c.is_uppercase() => 0.68,
            c if c.is_ascii_digit() => 0.56,
            _ => 0.55,
        }
    }
}

/// CJK ideographs, kana, hangul, and fullwidth forms occupy a full em.
fn is_wide(c: char) -> bool {
    matches!(
        c as u32,
        0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF | 0xFF00..=0xFF60
    )
}

impl TextMeasurer for HeuristicMeasurer {
    fn advance(&self, text: &str, font: &FontSpec, _direction: Direction) -> f64 {
        let weight_factor = if font.is_bold() { 1.06 } else { 1.0 };
        text.chars().map(Self::char_em).sum::<f64>() * font.size_px * weight_factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn font(size: f64, weight: u16) -> FontSpec {
        FontSpec {
            family: "Inter".to_string(),
            size_px: size,
            weight,
            italic: false,
        }
    }

    #[test]
    fn test_advance_scales_with_size() {
        let m = HeuristicMeasurer;
        let small = m.advance("Hello", &font(10.0, 400), Direction::Ltr);
        let large = m.advance("Hello", &font(20.0, 400), Direction::Ltr);
        assert!((large - 2.0 * small).abs() < 1e-9);
    }

    #[test]
    fn test_bold_is_wider() {
        let m = HeuristicMeasurer;
        let regular = m.advance("caption", &font(40.0, 400), Direction::Ltr);
        let bold = m.advance("caption", &font(40.0, 800), Direction::Ltr);
        assert!(bold > regular);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(
            HeuristicMeasurer.advance("", &font(40.0, 400), Direction::Ltr),
            0.0
        );
    }
}
