//! Text direction resolution and script classification.

use captionkit_caption_model::{Caption, CaptionStyle, TextDirection};
use serde::Serialize;

/// A resolved writing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

/// Primary language subtags written right-to-left.
const RTL_LANGUAGES: &[&str] = &[
    "ar", "he", "iw", "fa", "ur", "ps", "sd", "ug", "yi", "dv", "ckb",
];

/// Whether `c` lies in one of the Arabic Unicode blocks.
///
/// Lines containing these codepoints must be shaped as whole strings,
/// since drawing them glyph by glyph breaks letter joining.
pub fn is_arabic(c: char) -> bool {
    matches!(
        c as u32,
        0x0600..=0x06FF      // Arabic
            | 0x0750..=0x077F // Arabic Supplement
            | 0x0870..=0x089F // Arabic Extended-B
            | 0x08A0..=0x08FF // Arabic Extended-A
            | 0xFB50..=0xFDFF // Arabic Presentation Forms-A
            | 0xFE70..=0xFEFF // Arabic Presentation Forms-B
    )
}

fn is_hebrew(c: char) -> bool {
    matches!(c as u32, 0x0590..=0x05FF | 0xFB1D..=0xFB4F)
}

/// Whether `c` is a strong right-to-left character.
pub fn is_strong_rtl(c: char) -> bool {
    (is_arabic(c) || is_hebrew(c)) && c.is_alphabetic()
}

/// Whether `c` is a strong left-to-right character.
pub fn is_strong_ltr(c: char) -> bool {
    c.is_alphabetic() && !is_arabic(c) && !is_hebrew(c)
}

pub fn contains_arabic(text: &str) -> bool {
    text.chars().any(is_arabic)
}

/// Direction of the first strongly directional character; LTR when the
/// text has none.
pub fn detect_direction(text: &str) -> Direction {
    for c in text.chars() {
        if is_strong_rtl(c) {
            return Direction::Rtl;
        }
        if is_strong_ltr(c) {
            return Direction::Ltr;
        }
    }
    Direction::Ltr
}

/// Direction implied by a language tag such as `ar` or `fa-IR`.
pub fn direction_for_language(tag: &str) -> Option<Direction> {
    let primary = tag
        .split(['-', '_'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_ascii_lowercase();
    if RTL_LANGUAGES.contains(&primary.as_str()) {
        Some(Direction::Rtl)
    } else {
        Some(Direction::Ltr)
    }
}

/// Resolve the direction of a caption: explicit style override, then the
/// caption language, then detection from the text.
pub fn resolve_direction(caption: &Caption, style: &CaptionStyle) -> Direction {
    match style.direction {
        TextDirection::Ltr => Direction::Ltr,
        TextDirection::Rtl => Direction::Rtl,
        TextDirection::Auto => caption
            .language
            .as_deref()
            .and_then(direction_for_language)
            .unwrap_or_else(|| detect_direction(&caption.text)),
    }
}
