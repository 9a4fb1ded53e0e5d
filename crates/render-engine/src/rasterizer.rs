//! Drawing backends for frames and caption overlays.

use std::sync::Arc;

use captionkit_caption_model::Rgba;
use captionkit_common::error::{CaptionkitError, CaptionkitResult};
use captionkit_layout_engine::{
    CaptionLayout, DrawOp, GlyphMode, PlacedGlyph, ShadowSpec, TextOp,
};
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, LineJoin, Paint, Path, PathBuilder, Pixmap,
    PixmapPaint, Stroke, Transform,
};
use tracing::{trace, warn};

use crate::compositor::FramePlacement;
use crate::fonts::{shape_run, FontBook, LoadedFont};
use crate::source::VideoFrame;

/// Target of the two compositing passes.
///
/// `begin` starts a new output frame, `draw_frame` paints the fitted video
/// frame, `draw_overlay` paints a caption on a separate overlay surface, and
/// `encode_still` flattens both into a PNG.
pub trait Rasterizer: Send {
    fn begin(&mut self, width: u32, height: u32) -> CaptionkitResult<()>;

    fn draw_frame(&mut self, frame: &VideoFrame, placement: &FramePlacement)
        -> CaptionkitResult<()>;

    fn draw_overlay(&mut self, layout: &CaptionLayout) -> CaptionkitResult<()>;

    /// PNG of the frame with the overlay composited on top.
    fn encode_still(&mut self) -> CaptionkitResult<Vec<u8>>;

    /// PNG of the overlay surface alone (transparent where no caption).
    fn encode_overlay(&mut self) -> CaptionkitResult<Vec<u8>>;
}

/// CPU rasterizer built on tiny-skia with rustybuzz-shaped glyph outlines.
#[derive(Debug)]
pub struct SoftwareRasterizer {
    fonts: Arc<FontBook>,
    frame: Option<Pixmap>,
    overlay: Option<Pixmap>,
    overlay_opacity: f32,
    warned_missing_font: bool,
}

impl SoftwareRasterizer {
    pub fn new(fonts: Arc<FontBook>) -> Self {
        Self {
            fonts,
            frame: None,
            overlay: None,
            overlay_opacity: 1.0,
            warned_missing_font: false,
        }
    }

    /// Frame and overlay flattened into one pixmap.
    pub fn composite_pixmap(&self) -> CaptionkitResult<Pixmap> {
        let mut out = self.frame_surface()?.clone();
        let overlay = self.overlay_surface()?;
        out.draw_pixmap(
            0,
            0,
            overlay.as_ref(),
            &PixmapPaint {
                opacity: self.overlay_opacity,
                ..PixmapPaint::default()
            },
            Transform::identity(),
            None,
        );
        Ok(out)
    }

    pub fn overlay_pixmap(&self) -> Option<&Pixmap> {
        self.overlay.as_ref()
    }

    fn frame_surface(&self) -> CaptionkitResult<&Pixmap> {
        self.frame
            .as_ref()
            .ok_or_else(|| CaptionkitError::render("Rasterizer used before begin()"))
    }

    fn overlay_surface(&self) -> CaptionkitResult<&Pixmap> {
        self.overlay
            .as_ref()
            .ok_or_else(|| CaptionkitError::render("Rasterizer used before begin()"))
    }

    fn draw_text(&mut self, overlay: &mut Pixmap, op: &TextOp, transform: Transform) {
        let fonts = Arc::clone(&self.fonts);
        let Some(font) = fonts.resolve_spec(&op.font) else {
            if !self.warned_missing_font {
                warn!(
                    family = %op.font.family,
                    "No font loaded; caption text is not drawn"
                );
                self.warned_missing_font = true;
            }
            return;
        };
        let Some(path) = text_path(font, op, &|_| true) else {
            return;
        };

        if let Some(shadow) = &op.shadow {
            draw_shadow(overlay, &path, shadow, transform);
        }

        if let Some(stroke) = &op.stroke {
            if stroke.width > 0.0 && !stroke.color.is_transparent() {
                // The fill covers the inner half of the centred stroke.
                let outline = Stroke {
                    width: (stroke.width * 2.0) as f32,
                    line_join: LineJoin::Round,
                    ..Stroke::default()
                };
                overlay.stroke_path(&path, &paint(stroke.color), &outline, transform, None);
            }
        }

        if op.spans.is_empty() {
            overlay.fill_path(&path, &paint(op.color), FillRule::Winding, transform, None);
            return;
        }

        // Recoloured spans share the shaped run, so joining is preserved.
        let unspanned = |byte: usize| !op.spans.iter().any(|span| span.contains(byte));
        if let Some(base) = text_path(font, op, &unspanned) {
            overlay.fill_path(&base, &paint(op.color), FillRule::Winding, transform, None);
        }
        for span in &op.spans {
            if let Some(part) = text_path(font, op, &|byte| span.contains(byte)) {
                overlay.fill_path(&part, &paint(span.color), FillRule::Winding, transform, None);
            }
        }
    }
}

impl Rasterizer for SoftwareRasterizer {
    fn begin(&mut self, width: u32, height: u32) -> CaptionkitResult<()> {
        let mut frame = new_pixmap(width, height)?;
        frame.fill(Color::BLACK);
        self.frame = Some(frame);
        self.overlay = Some(new_pixmap(width, height)?);
        self.overlay_opacity = 1.0;
        Ok(())
    }

    fn draw_frame(
        &mut self,
        frame: &VideoFrame,
        placement: &FramePlacement,
    ) -> CaptionkitResult<()> {
        if !frame.is_well_formed() {
            return Err(CaptionkitError::render(format!(
                "Malformed {}x{} frame with {} bytes",
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }
        let source = frame_pixmap(frame)?;
        let target = self
            .frame
            .as_mut()
            .ok_or_else(|| CaptionkitError::render("Rasterizer used before begin()"))?;

        let sx = (placement.width / f64::from(frame.width)) as f32;
        let sy = (placement.height / f64::from(frame.height)) as f32;
        let transform = Transform::from_row(
            sx,
            0.0,
            0.0,
            sy,
            placement.x as f32,
            placement.y as f32,
        );
        target.draw_pixmap(
            0,
            0,
            source.as_ref(),
            &PixmapPaint {
                quality: FilterQuality::Bilinear,
                ..PixmapPaint::default()
            },
            transform,
            None,
        );
        Ok(())
    }

    fn draw_overlay(&mut self, layout: &CaptionLayout) -> CaptionkitResult<()> {
        let mut overlay = self
            .overlay
            .take()
            .ok_or_else(|| CaptionkitError::render("Rasterizer used before begin()"))?;

        let (ax, ay) = layout.anchor;
        let caption_transform = Transform::from_translate(0.0, layout.offset_y as f32)
            .pre_concat(scale_about(ax, ay, layout.scale));

        for op in &layout.ops {
            match op {
                DrawOp::Rect {
                    rect,
                    color,
                    radius,
                } => {
                    if let Some(path) =
                        rounded_rect(rect.x, rect.y, rect.width, rect.height, *radius)
                    {
                        overlay.fill_path(
                            &path,
                            &paint(*color),
                            FillRule::Winding,
                            caption_transform,
                            None,
                        );
                    }
                }
                DrawOp::Text(text) => {
                    let (px, py) = text.pivot();
                    let transform = caption_transform.pre_concat(scale_about(px, py, text.scale));
                    self.draw_text(&mut overlay, text, transform);
                }
            }
        }

        self.overlay_opacity = layout.opacity.clamp(0.0, 1.0) as f32;
        self.overlay = Some(overlay);
        trace!(
            caption_id = %layout.caption_id,
            ops = layout.ops.len(),
            opacity = layout.opacity,
            "Drew caption overlay"
        );
        Ok(())
    }

    fn encode_still(&mut self) -> CaptionkitResult<Vec<u8>> {
        self.composite_pixmap()?
            .encode_png()
            .map_err(|e| CaptionkitError::render(format!("PNG encoding failed: {e}")))
    }

    fn encode_overlay(&mut self) -> CaptionkitResult<Vec<u8>> {
        self.overlay_surface()?
            .encode_png()
            .map_err(|e| CaptionkitError::render(format!("PNG encoding failed: {e}")))
    }
}

fn new_pixmap(width: u32, height: u32) -> CaptionkitResult<Pixmap> {
    Pixmap::new(width, height)
        .ok_or_else(|| CaptionkitError::render(format!("Invalid surface size {width}x{height}")))
}

/// Premultiplied pixmap over a straight-alpha RGBA frame.
fn frame_pixmap(frame: &VideoFrame) -> CaptionkitResult<Pixmap> {
    let mut data = frame.data.clone();
    for px in data.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a < 255 {
            for c in &mut px[..3] {
                *c = ((u16::from(*c) * a + 127) / 255) as u8;
            }
        }
    }
    let size = IntSize::from_wh(frame.width, frame.height)
        .ok_or_else(|| CaptionkitError::render("Frame has zero size"))?;
    Pixmap::from_vec(data, size)
        .ok_or_else(|| CaptionkitError::render("Frame buffer does not match its size"))
}

fn paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, color.a);
    paint.anti_alias = true;
    paint
}

fn scale_about(px: f64, py: f64, scale: f64) -> Transform {
    let (px, py, s) = (px as f32, py as f32, scale as f32);
    Transform::from_translate(px, py)
        .pre_scale(s, s)
        .pre_translate(-px, -py)
}

fn rounded_rect(x: f64, y: f64, width: f64, height: f64, radius: f64) -> Option<Path> {
    let (x, y, w, h) = (x as f32, y as f32, width as f32, height as f32);
    let r = (radius as f32).clamp(0.0, w.min(h) / 2.0);
    if r <= 0.0 {
        return tiny_skia::Rect::from_xywh(x, y, w, h).map(PathBuilder::from_rect);
    }
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Glyph outlines in output pixels, flipping the font's y-up space.
struct GlyphOutline<'a> {
    builder: &'a mut PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphOutline<'_> {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.scale, self.origin_y - y * self.scale)
    }
}

impl ttf_parser::OutlineBuilder for GlyphOutline<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// Append the shaped outline of `text` with its pen starting at `x`.
///
/// Only glyphs whose cluster (offset by `byte_base`) passes `keep` are
/// outlined; the pen still advances over the others.
fn append_run(
    builder: &mut PathBuilder,
    face: &rustybuzz::Face<'_>,
    text: &str,
    op: &TextOp,
    x: f64,
    byte_base: usize,
    keep: &dyn Fn(usize) -> bool,
) {
    let scale = (op.font.size_px / f64::from(face.units_per_em().max(1))) as f32;
    let mut pen = 0i32;
    for shaped in shape_run(face, text, op.direction) {
        if keep(byte_base + shaped.cluster) {
            let mut outline = GlyphOutline {
                builder: &mut *builder,
                origin_x: x as f32 + (pen + shaped.x_offset) as f32 * scale,
                origin_y: op.baseline_y as f32 - shaped.y_offset as f32 * scale,
                scale,
            };
            face.outline_glyph(ttf_parser::GlyphId(shaped.glyph), &mut outline);
        }
        pen += shaped.x_advance;
    }
}

/// Outline of the glyphs of `op` whose byte offset passes `keep`.
fn text_path(font: &LoadedFont, op: &TextOp, keep: &dyn Fn(usize) -> bool) -> Option<Path> {
    let face = font.face()?;
    let mut builder = PathBuilder::new();
    match &op.mode {
        GlyphMode::Atomic => append_run(&mut builder, &face, &op.text, op, op.x, 0, keep),
        GlyphMode::Spaced(glyphs) => {
            for (glyph, byte_base) in glyphs.iter().zip(glyph_byte_offsets(glyphs)) {
                append_run(
                    &mut builder,
                    &face,
                    &glyph.text,
                    op,
                    op.x + glyph.x,
                    byte_base,
                    keep,
                );
            }
        }
    }
    builder.finish()
}

/// Byte offset of each placed glyph within the run's text.
fn glyph_byte_offsets(glyphs: &[PlacedGlyph]) -> Vec<usize> {
    glyphs
        .iter()
        .scan(0, |offset, glyph| {
            let start = *offset;
            *offset += glyph.text.len();
            Some(start)
        })
        .collect()
}

fn draw_shadow(overlay: &mut Pixmap, path: &Path, shadow: &ShadowSpec, transform: Transform) {
    if shadow.color.is_transparent() {
        return;
    }
    let Some(device_path) = path.clone().transform(transform) else {
        return;
    };
    let bounds = device_path.bounds();
    let margin = (shadow.blur.max(0.0) * 2.0).ceil() as i32 + 1;
    let left = bounds.left().floor() as i32 - margin;
    let top = bounds.top().floor() as i32 - margin;
    let width = (bounds.width().ceil() as i32 + 2 * margin).max(1) as u32;
    let height = (bounds.height().ceil() as i32 + 2 * margin).max(1) as u32;
    let Some(mut layer) = Pixmap::new(width, height) else {
        return;
    };

    layer.fill_path(
        &device_path,
        &paint(shadow.color),
        FillRule::Winding,
        Transform::from_translate(-left as f32, -top as f32),
        None,
    );
    let radius = (shadow.blur / 2.0).round().max(0.0) as usize;
    if radius > 0 {
        box_blur(layer.data_mut(), width as usize, height as usize, radius);
        box_blur(layer.data_mut(), width as usize, height as usize, radius);
    }

    overlay.draw_pixmap(
        left + shadow.offset_x.round() as i32,
        top + shadow.offset_y.round() as i32,
        layer.as_ref(),
        &PixmapPaint::default(),
        Transform::identity(),
        None,
    );
}

/// Separable box blur over premultiplied RGBA8.
fn box_blur(data: &mut [u8], width: usize, height: usize, radius: usize) {
    let mut scratch = vec![0u8; data.len()];
    blur_pass(data, &mut scratch, width, height, radius, true);
    blur_pass(&scratch, data, width, height, radius, false);
}

fn blur_pass(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    radius: usize,
    horizontal: bool,
) {
    let (lines, len) = if horizontal {
        (height, width)
    } else {
        (width, height)
    };
    let index = |line: usize, i: usize| {
        if horizontal {
            (line * width + i) * 4
        } else {
            (i * width + line) * 4
        }
    };
    let window = (2 * radius + 1) as u32;

    for line in 0..lines {
        for channel in 0..4 {
            let mut sum: u32 = (0..=radius.min(len - 1))
                .map(|i| u32::from(src[index(line, i) + channel]))
                .sum();
            for i in 0..len {
                dst[index(line, i) + channel] = (sum / window) as u8;
                if i + radius + 1 < len {
                    sum += u32::from(src[index(line, i + radius + 1) + channel]);
                }
                if i >= radius {
                    sum -= u32::from(src[index(line, i - radius) + channel]);
                }
            }
        }
    }
}
