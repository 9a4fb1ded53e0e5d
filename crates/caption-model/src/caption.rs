//! Timed caption entries.

use serde::{Deserialize, Serialize};

use crate::style::CaptionStyle;
use crate::ModelError;

/// Width of the canonical caption coordinate space.
pub const CANONICAL_WIDTH: f64 = 1080.0;

/// Height of the canonical caption coordinate space.
pub const CANONICAL_HEIGHT: f64 = 1920.0;

/// Half-open interval overlap: `a.start < b.end && a.end > b.start`.
pub fn overlaps(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> bool {
    a_start < b_end && a_end > b_start
}

/// Anchor point of a caption block (its centre) in canonical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Default caption placement: horizontally centred, lower third.
    pub fn lower_third() -> Self {
        Self {
            x: CANONICAL_WIDTH / 2.0,
            y: CANONICAL_HEIGHT * 0.75,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::lower_third()
    }
}

/// Timing for a single spoken word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl WordTiming {
    /// Whether `t` falls in `[start, end)`.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start_secs && t < self.end_secs
    }
}

/// A caption shown over the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    /// Stable identifier.
    pub id: String,

    pub text: String,

    /// Start time in source-video seconds.
    pub start_secs: f64,

    /// End time in source-video seconds.
    pub end_secs: f64,

    #[serde(default)]
    pub position: Position,

    #[serde(default)]
    pub style: CaptionStyle,

    #[serde(default = "default_visible")]
    pub visible: bool,

    /// BCP-47 language tag, when known.
    #[serde(default)]
    pub language: Option<String>,

    /// Word-level timings, when the transcript provided them.
    #[serde(default)]
    pub words: Option<Vec<WordTiming>>,

    /// Set once the user changed this caption by hand (text, position,
    /// visibility, or an individual style).
    #[serde(default)]
    pub edited: bool,
}

fn default_visible() -> bool {
    true
}

impl Caption {
    /// Create a caption, enforcing `start < end`.
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        start_secs: f64,
        end_secs: f64,
    ) -> Result<Self, ModelError> {
        if !(start_secs < end_secs) {
            return Err(ModelError::InvalidTimeRange {
                start: start_secs,
                end: end_secs,
            });
        }
        Ok(Self {
            id: id.into(),
            text: text.into(),
            start_secs,
            end_secs,
            position: Position::default(),
            style: CaptionStyle::default(),
            visible: true,
            language: None,
            words: None,
            edited: false,
        })
    }

    pub fn with_style(mut self, style: CaptionStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_words(mut self, words: Option<Vec<WordTiming>>) -> Self {
        self.words = words;
        self
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Whether the caption overlaps the half-open window `[start, end)`.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        overlaps(self.start_secs, self.end_secs, start, end)
    }

    /// Whether `t` falls within the closed display interval `[start, end]`.
    pub fn is_active_at(&self, t: f64) -> bool {
        t >= self.start_secs && t <= self.end_secs
    }

    /// Copy of this caption shifted by `-offset` seconds (word timings too).
    pub fn rebased(&self, offset: f64) -> Caption {
        let mut rebased = self.clone();
        rebased.start_secs -= offset;
        rebased.end_secs -= offset;
        if let Some(words) = rebased.words.as_mut() {
            for word in words {
                word.start_secs -= offset;
                word.end_secs -= offset;
            }
        }
        rebased
    }
}

/// Policy for choosing one caption when several are active at once.
///
/// Only one caption is ever drawn per instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// The caption with the latest start time wins; on equal starts the
    /// later entry in list order wins.
    #[default]
    MostRecentStart,
}

impl OverlapPolicy {
    /// Pick the caption to display at time `t` among visible captions.
    pub fn select<'a>(&self, captions: &'a [Caption], t: f64) -> Option<&'a Caption> {
        match self {
            OverlapPolicy::MostRecentStart => captions
                .iter()
                .filter(|c| c.visible && c.is_active_at(t))
                .fold(None, |best: Option<&Caption>, candidate| match best {
                    Some(current) if current.start_secs > candidate.start_secs => Some(current),
                    _ => Some(candidate),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caption(id: &str, start: f64, end: f64) -> Caption {
        Caption::new(id, id, start, end).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_range() {
        assert!(Caption::new("a", "x", 2.0, 2.0).is_err());
        assert!(Caption::new("a", "x", 3.0, 2.0).is_err());
        assert!(Caption::new("a", "x", f64::NAN, 2.0).is_err());
    }

    #[test]
    fn test_overlap_predicate_is_half_open() {
        assert!(overlaps(0.0, 5.0, 4.0, 10.0));
        assert!(!overlaps(0.0, 5.0, 5.0, 10.0));
        assert!(!overlaps(10.0, 12.0, 0.0, 10.0));
    }

    #[test]
    fn test_most_recent_start_wins() {
        let captions = vec![caption("a", 0.0, 10.0), caption("b", 4.0, 6.0)];
        let picked = OverlapPolicy::MostRecentStart.select(&captions, 5.0).unwrap();
        assert_eq!(picked.id, "b");

        let picked = OverlapPolicy::MostRecentStart.select(&captions, 8.0).unwrap();
        assert_eq!(picked.id, "a");
    }

    #[test]
    fn test_equal_starts_prefer_later_entry() {
        let captions = vec![caption("a", 1.0, 3.0), caption("b", 1.0, 3.0)];
        let picked = OverlapPolicy::MostRecentStart.select(&captions, 2.0).unwrap();
        assert_eq!(picked.id, "b");
    }

    #[test]
    fn test_hidden_captions_are_skipped() {
        let mut hidden = caption("b", 4.0, 6.0);
        hidden.visible = false;
        let captions = vec![caption("a", 0.0, 10.0), hidden];
        let picked = OverlapPolicy::MostRecentStart.select(&captions, 5.0).unwrap();
        assert_eq!(picked.id, "a");
    }

    #[test]
    fn test_rebased_shifts_words() {
        let c = caption("a", 12.0, 14.0).with_words(Some(vec![WordTiming {
            text: "hi".to_string(),
            start_secs: 12.5,
            end_secs: 13.0,
        }]));
        let r = c.rebased(10.0);
        assert!((r.start_secs - 2.0).abs() < 1e-9);
        assert!((r.words.unwrap()[0].start_secs - 2.5).abs() < 1e-9);
    }
}
