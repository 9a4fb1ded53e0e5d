//! Named caption styles for one-click application.

use std::collections::BTreeMap;
use std::path::Path;

use crate::clip::ClipError;
use crate::color::Rgba;
use crate::style::{
    Animation, AnimationKind, CaptionStyle, Easing, KaraokeStyle, Padding, Shadow, Stroke,
};
use crate::ModelError;

/// Template name → style lookup.
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: BTreeMap<String, CaptionStyle>,
}

impl TemplateStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with the built-in templates.
    pub fn with_builtins() -> Self {
        let mut store = Self::new();

        store.insert("classic", CaptionStyle::default());

        store.insert(
            "bold_pop",
            CaptionStyle {
                font_size: 76.0,
                font_weight: 900,
                color: Rgba::WHITE,
                stroke: Some(Stroke {
                    color: Rgba::BLACK,
                    width: 6.0,
                }),
                shadow: Some(Shadow {
                    offset_x: 0.0,
                    offset_y: 6.0,
                    blur: 8.0,
                    color: Rgba::rgba(0, 0, 0, 160),
                }),
                animation: Some(Animation {
                    kind: AnimationKind::Pop,
                    duration_secs: 0.25,
                    delay_secs: 0.0,
                    easing: Easing::EaseOut,
                }),
                ..CaptionStyle::default()
            },
        );

        store.insert(
            "karaoke",
            CaptionStyle {
                font_size: 68.0,
                karaoke: Some(KaraokeStyle::default()),
                ..CaptionStyle::default()
            },
        );

        store.insert(
            "minimal",
            CaptionStyle {
                font_size: 52.0,
                font_weight: 500,
                background: Rgba::rgba(0, 0, 0, 170),
                padding: Padding { x: 28.0, y: 14.0 },
                stroke: None,
                animation: Some(Animation {
                    kind: AnimationKind::Fade,
                    duration_secs: 0.3,
                    delay_secs: 0.0,
                    easing: Easing::Linear,
                }),
                ..CaptionStyle::default()
            },
        );

        store
    }

    /// Merge templates from a JSON object of `name → style`.
    ///
    /// Entries in the file replace built-ins of the same name.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, ClipError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ClipError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let parsed: BTreeMap<String, CaptionStyle> =
            serde_json::from_str(&json).map_err(|e| ClipError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;
        let count = parsed.len();
        self.templates.extend(parsed);
        Ok(count)
    }

    pub fn insert(&mut self, name: impl Into<String>, style: CaptionStyle) {
        self.templates.insert(name.into(), style);
    }

    /// A copy of the named template.
    pub fn get(&self, name: &str) -> Result<CaptionStyle, ModelError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownTemplate {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
