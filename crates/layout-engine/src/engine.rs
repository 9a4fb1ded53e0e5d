//! Caption layout: from a caption at an instant to a display list.

use captionkit_caption_model::{
    Caption, CaptionStyle, FontStyle, OverlapPolicy, Rgba, TextAlign, TextDecoration,
};
use tracing::trace;

use crate::animation::animation_state;
use crate::direction::{contains_arabic, resolve_direction, Direction};
use crate::geometry::{
    CaptionLayout, ColorSpan, DrawOp, FontSpec, GlyphMode, LayoutFrame, PlacedGlyph, Rect,
    ShadowSpec, StrokeSpec, TextOp,
};
use crate::karaoke::{active_word, word_timings};
use crate::keywords::{has_keywords, split_keywords};
use crate::measure::{HeuristicMeasurer, TextMeasurer};
use crate::wrap::{words_from_pieces, wrap_lines, Piece, RunTag, Word};

/// Baseline sits this many font sizes below the line's vertical centre.
const BASELINE_OFFSET: f64 = 0.35;

/// A merged run of same-tag text within one line.
struct LineRun {
    text: String,
    tag: RunTag,
    /// Whitespace advance preceding the run.
    gap_before: f64,
}

/// A measured run ready for placement.
struct RunItem {
    text: String,
    font: FontSpec,
    color: Rgba,
    scale: f64,
    gap_before: f64,
    width: f64,
    mode: GlyphMode,
    spans: Vec<ColorSpan>,
    /// Keyword boxes as (offset from the run's leading edge, width, colour).
    boxes: Vec<(f64, f64, Rgba)>,
}

/// Per-caption values shared by every run.
struct RunContext<'a> {
    style: &'a CaptionStyle,
    base_font: FontSpec,
    direction: Direction,
    letter_spacing: f64,
    active_word: Option<usize>,
}

impl RunContext<'_> {
    fn font_for(&self, tag: RunTag) -> FontSpec {
        let mut font = self.base_font.clone();
        if let RunTag::Keyword(k) = tag {
            if let Some(weight) = self.style.keywords.get(k).and_then(|k| k.font_weight) {
                font.weight = weight;
            }
        }
        font
    }

    fn color_for(&self, tag: RunTag) -> Rgba {
        match tag {
            RunTag::Plain => self.style.color,
            RunTag::Keyword(k) => self
                .style
                .keywords
                .get(k)
                .map(|k| k.color)
                .unwrap_or(self.style.color),
            RunTag::Word(i) => match self.style.active_karaoke() {
                Some(karaoke) if self.active_word == Some(i) => karaoke.active_color,
                _ => self.style.color,
            },
        }
    }

    fn background_for(&self, tag: RunTag) -> Option<Rgba> {
        match tag {
            RunTag::Keyword(k) => self.style.keywords.get(k).and_then(|k| k.background_color),
            _ => None,
        }
    }

    fn scale_for(&self, tag: RunTag) -> f64 {
        match (tag, self.style.active_karaoke()) {
            (RunTag::Word(i), Some(karaoke)) if self.active_word == Some(i) => {
                karaoke.active_scale
            }
            _ => 1.0,
        }
    }
}

/// Lays out captions against a frame using an injected text measurer.
pub struct CaptionLayoutEngine {
    measurer: Box<dyn TextMeasurer>,
    policy: OverlapPolicy,
}

impl std::fmt::Debug for CaptionLayoutEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionLayoutEngine")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for CaptionLayoutEngine {
    fn default() -> Self {
        Self::new(Box::new(HeuristicMeasurer))
    }
}

impl CaptionLayoutEngine {
    pub fn new(measurer: Box<dyn TextMeasurer>) -> Self {
        Self {
            measurer,
            policy: OverlapPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    pub fn measurer(&self) -> &dyn TextMeasurer {
        self.measurer.as_ref()
    }

    /// The single caption drawn at `t`, if any.
    pub fn select<'a>(&self, captions: &'a [Caption], t: f64) -> Option<&'a Caption> {
        self.policy.select(captions, t)
    }

    /// Layout of whichever caption is selected at `t`.
    pub fn layout_at(
        &self,
        captions: &[Caption],
        t: f64,
        frame: LayoutFrame,
    ) -> Option<CaptionLayout> {
        self.select(captions, t)
            .and_then(|caption| self.layout(caption, t, frame))
    }

    /// Layout of one caption at `t` using its own style.
    ///
    /// Returns `None` when the caption is hidden, not active at `t`, or has
    /// no text.
    pub fn layout(&self, caption: &Caption, t: f64, frame: LayoutFrame) -> Option<CaptionLayout> {
        if !caption.visible {
            return None;
        }
        self.layout_with_style(caption, &caption.style, t, frame)
    }

    /// Layout of one caption at `t` with an explicit style.
    pub fn layout_with_style(
        &self,
        caption: &Caption,
        style: &CaptionStyle,
        t: f64,
        frame: LayoutFrame,
    ) -> Option<CaptionLayout> {
        if !caption.is_active_at(t) || caption.text.trim().is_empty() {
            return None;
        }

        let scale = frame.scale();
        let anchor = frame.map_position(&caption.position);
        let direction = resolve_direction(caption, style);

        let (pieces, active) = build_pieces(caption, style, t);
        let ctx = RunContext {
            style,
            base_font: FontSpec {
                family: style.font_family.clone(),
                size_px: style.font_size * scale,
                weight: style.font_weight,
                italic: style.font_style == FontStyle::Italic,
            },
            direction,
            letter_spacing: style.letter_spacing * scale,
            active_word: active,
        };

        let words = words_from_pieces(&pieces);
        if words.is_empty() {
            return None;
        }

        let word_widths: Vec<f64> = words
            .iter()
            .map(|word| {
                word.pieces
                    .iter()
                    .map(|p| {
                        let atomic = contains_arabic(&p.text);
                        self.measure_run(&p.text, &ctx.font_for(p.tag), &ctx, atomic).0
                    })
                    .sum()
            })
            .collect();
        let space_width = self.space_width(&ctx);

        let padding_x = style.padding.x * scale;
        let padding_y = style.padding.y * scale;
        let max_width = (style
            .max_width
            .map(|w| w * scale)
            .unwrap_or(frame.width * 0.8)
            - 2.0 * padding_x)
            .max(1.0);

        let line_ranges = wrap_lines(&word_widths, space_width, max_width);
        let lines: Vec<Vec<LineRun>> = line_ranges
            .iter()
            .map(|range| merge_line_runs(&words[range.clone()], space_width))
            .collect();

        let size_px = ctx.base_font.size_px;
        let line_height = style.line_height_px(style.font_size) * scale;
        let total_height = line_height * lines.len() as f64;
        let top = anchor.1 - total_height / 2.0;

        // Measure every run once; line widths follow from the runs.
        let measured: Vec<Vec<RunItem>> = lines
            .into_iter()
            .map(|line| self.line_items(line, &ctx))
            .collect();
        let line_widths: Vec<f64> = measured
            .iter()
            .map(|line| line.iter().map(|item| item.gap_before + item.width).sum())
            .collect();
        let block_width = line_widths.iter().cloned().fold(0.0, f64::max);
        let block_left = anchor.0 - block_width / 2.0;

        let text_block = Rect::new(block_left, top, block_width, total_height);
        let bounds = match style.background_height {
            Some(height) if height > 0.0 => Rect::new(
                block_left - padding_x,
                anchor.1 - height * scale / 2.0,
                block_width + 2.0 * padding_x,
                height * scale,
            ),
            _ => text_block.inflate(padding_x, padding_y),
        };

        let stroke = style
            .stroke
            .filter(|s| s.width > 0.0 && !s.color.is_transparent())
            .map(|s| StrokeSpec {
                color: s.color,
                width: s.width * scale,
            });
        let shadow = style.shadow.map(|s| ShadowSpec {
            offset_x: s.offset_x * scale,
            offset_y: s.offset_y * scale,
            blur: s.blur * scale,
            color: s.color,
        });

        let mut backgrounds = Vec::new();
        let mut texts = Vec::new();
        let mut underlines = Vec::new();

        if style.has_background() {
            backgrounds.push(DrawOp::Rect {
                rect: bounds,
                color: style.background,
                radius: style.background_radius * scale,
            });
        }

        for (i, (line, line_width)) in measured.into_iter().zip(&line_widths).enumerate() {
            let line_left = match style.text_align {
                TextAlign::Left => block_left,
                TextAlign::Center => anchor.0 - line_width / 2.0,
                TextAlign::Right => block_left + block_width - line_width,
            };
            let baseline_y =
                top + i as f64 * line_height + line_height / 2.0 + BASELINE_OFFSET * size_px;

            let mut cursor = match direction {
                Direction::Ltr => line_left,
                Direction::Rtl => line_left + line_width,
            };

            for item in line {
                let width = item.width;
                let x = match direction {
                    Direction::Ltr => {
                        cursor += item.gap_before;
                        let x = cursor;
                        cursor += width;
                        x
                    }
                    Direction::Rtl => {
                        cursor -= item.gap_before + width;
                        cursor
                    }
                };

                let op = TextOp {
                    font: item.font,
                    color: item.color,
                    scale: item.scale,
                    text: item.text,
                    x,
                    baseline_y,
                    width,
                    direction,
                    mode: item.mode,
                    spans: item.spans,
                    stroke,
                    shadow,
                };

                let (_, pivot_y) = op.pivot();
                for (offset, box_width, color) in item.boxes {
                    let box_x = match direction {
                        Direction::Ltr => x + offset,
                        Direction::Rtl => x + width - offset - box_width,
                    };
                    let pad = 0.1 * size_px;
                    let height = 1.15 * size_px;
                    backgrounds.push(DrawOp::Rect {
                        rect: Rect::new(
                            box_x - pad,
                            pivot_y - height / 2.0,
                            box_width + 2.0 * pad,
                            height,
                        ),
                        color,
                        radius: 0.15 * size_px,
                    });
                }

                if style.text_decoration == TextDecoration::Underline {
                    underlines.push(DrawOp::Rect {
                        rect: Rect::new(
                            x,
                            baseline_y + 0.1 * size_px,
                            width,
                            (0.06 * size_px).max(1.0),
                        ),
                        color: op.color,
                        radius: 0.0,
                    });
                }

                texts.push(DrawOp::Text(op));
            }
        }

        let line_count = line_widths.len();
        let animation = animation_state(style.animation.as_ref(), caption.start_secs, t, scale);

        trace!(
            caption = %caption.id,
            lines = line_count,
            direction = ?direction,
            "Laid out caption"
        );

        let mut ops = backgrounds;
        ops.extend(texts);
        ops.extend(underlines);

        Some(CaptionLayout {
            caption_id: caption.id.clone(),
            ops,
            anchor,
            bounds,
            direction,
            line_count,
            opacity: animation.opacity,
            scale: animation.scale,
            offset_y: animation.offset_y,
        })
    }

    fn space_width(&self, ctx: &RunContext<'_>) -> f64 {
        self.measurer.advance(" ", &ctx.base_font, ctx.direction) + ctx.letter_spacing
    }

    /// Measure a wrapped line's runs.
    ///
    /// A line containing Arabic becomes one atomic run in the base font:
    /// keyword and karaoke colours are carried as spans over its text and
    /// keyword boxes are placed by prefix advance. Other lines keep one run
    /// per styling class.
    fn line_items(&self, line: Vec<LineRun>, ctx: &RunContext<'_>) -> Vec<RunItem> {
        if line.iter().any(|run| contains_arabic(&run.text)) {
            return vec![self.atomic_line(line, ctx)];
        }

        line.into_iter()
            .map(|run| {
                let font = ctx.font_for(run.tag);
                let (width, mode) = self.measure_run(&run.text, &font, ctx, false);
                RunItem {
                    boxes: ctx
                        .background_for(run.tag)
                        .map(|color| vec![(0.0, width, color)])
                        .unwrap_or_default(),
                    color: ctx.color_for(run.tag),
                    scale: ctx.scale_for(run.tag),
                    text: run.text,
                    font,
                    gap_before: run.gap_before,
                    width,
                    mode,
                    spans: Vec::new(),
                }
            })
            .collect()
    }

    fn atomic_line(&self, line: Vec<LineRun>, ctx: &RunContext<'_>) -> RunItem {
        let font = ctx.base_font.clone();
        let gap_before = line.first().map_or(0.0, |run| run.gap_before);

        let mut text = String::new();
        let mut ranges = Vec::with_capacity(line.len());
        for (i, run) in line.into_iter().enumerate() {
            if i > 0 && run.gap_before > 0.0 {
                text.push(' ');
            }
            let start = text.len();
            text.push_str(&run.text);
            ranges.push((start, text.len(), run.tag));
        }

        let mut spans = Vec::new();
        let mut boxes = Vec::new();
        for (start, end, tag) in ranges {
            let color = ctx.color_for(tag);
            if color != ctx.style.color {
                spans.push(ColorSpan { start, end, color });
            }
            if let Some(background) = ctx.background_for(tag) {
                let offset = if start == 0 {
                    0.0
                } else {
                    self.measurer.advance(&text[..start], &font, ctx.direction)
                };
                let width = self.measurer.advance(&text[start..end], &font, ctx.direction);
                boxes.push((offset, width, background));
            }
        }

        RunItem {
            width: self.measurer.advance(&text, &font, ctx.direction),
            text,
            font,
            color: ctx.style.color,
            scale: 1.0,
            gap_before,
            mode: GlyphMode::Atomic,
            spans,
            boxes,
        }
    }

    /// Width and glyph mode of a run.
    ///
    /// With letter spacing, non-atomic runs are placed glyph by glyph.
    fn measure_run(
        &self,
        text: &str,
        font: &FontSpec,
        ctx: &RunContext<'_>,
        atomic: bool,
    ) -> (f64, GlyphMode) {
        if atomic || ctx.letter_spacing == 0.0 {
            return (
                self.measurer.advance(text, font, ctx.direction),
                GlyphMode::Atomic,
            );
        }

        let pitches: Vec<(String, f64)> = text
            .chars()
            .map(|c| {
                let glyph = c.to_string();
                let advance = self.measurer.advance(&glyph, font, ctx.direction);
                (glyph, advance + ctx.letter_spacing)
            })
            .collect();
        let width: f64 = pitches.iter().map(|(_, p)| p).sum();

        let mut offset = 0.0;
        let glyphs = pitches
            .into_iter()
            .map(|(text, pitch)| {
                let x = match ctx.direction {
                    Direction::Ltr => offset,
                    Direction::Rtl => width - offset - pitch,
                };
                offset += pitch;
                PlacedGlyph { text, x }
            })
            .collect();

        (width, GlyphMode::Spaced(glyphs))
    }
}

/// Styled pieces for the caption's render mode, plus the active karaoke word.
fn build_pieces(caption: &Caption, style: &CaptionStyle, t: f64) -> (Vec<Piece>, Option<usize>) {
    if style.active_karaoke().is_some() {
        let timings = word_timings(caption);
        let active = active_word(&timings, t);
        let pieces = caption
            .text
            .split_whitespace()
            .enumerate()
            .map(|(i, word)| Piece {
                text: format!("{word} "),
                tag: RunTag::Word(i),
            })
            .collect();
        return (pieces, active);
    }

    if has_keywords(&style.keywords) {
        let pieces = split_keywords(&caption.text, &style.keywords)
            .into_iter()
            .map(|segment| Piece {
                text: segment.text,
                tag: segment.keyword.map(RunTag::Keyword).unwrap_or(RunTag::Plain),
            })
            .collect();
        return (pieces, None);
    }

    (
        vec![Piece {
            text: caption.text.clone(),
            tag: RunTag::Plain,
        }],
        None,
    )
}

/// Merge a line's words into runs of equal tag, joined by single spaces.
fn merge_line_runs(words: &[Word], space_width: f64) -> Vec<LineRun> {
    let mut runs: Vec<LineRun> = Vec::new();

    for (w, word) in words.iter().enumerate() {
        for (p, piece) in word.pieces.iter().enumerate() {
            let word_break = w > 0 && p == 0;
            match runs.last_mut() {
                Some(run) if run.tag == piece.tag => {
                    if word_break {
                        run.text.push(' ');
                    }
                    run.text.push_str(&piece.text);
                }
                _ => runs.push(LineRun {
                    text: piece.text.clone(),
                    tag: piece.tag,
                    gap_before: if word_break { space_width } else { 0.0 },
                }),
            }
        }
    }
    runs
}
