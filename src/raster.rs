use std::sync::Arc;

use rustybuzz::{Face as HbFace, UnicodeBuffer};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform};
use ttf_parser::{GlyphId, OutlineBuilder};

use crate::canvas::{Command, Document};
use crate::error::EtchError;
use crate::font::{self, DEFAULT_FONT, FontRegistry};
use crate::types::{Color, Pt};

pub const DEFAULT_DPI: u32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterOptions {
    pub dpi: u32,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self { dpi: DEFAULT_DPI }
    }
}

#[derive(Clone)]
struct RasterState {
    transform: Transform,
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_name: Arc<str>,
    font_size: Pt,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            transform: Transform::identity(),
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_name: Arc::from(DEFAULT_FONT),
            font_size: Pt::from_f32(12.0),
        }
    }
}

/// Rasterizes every page onto a white background.
///
/// Text is drawn from the glyph outlines of registered fonts; text set in a
/// font with no registered file is skipped.
pub fn document_to_pixmaps(
    document: &Document,
    options: RasterOptions,
    fonts: &FontRegistry,
) -> Result<Vec<Pixmap>, EtchError> {
    let dpi = options.dpi;
    let width_px = pt_milli_to_px_u32(document.page_size.width.to_milli_i64(), dpi)?;
    let height_px = pt_milli_to_px_u32(document.page_size.height.to_milli_i64(), dpi)?;
    let scale = dpi as f32 / 72.0;
    let base_transform = Transform::from_scale(scale, scale);

    let mut pixmaps = Vec::with_capacity(document.pages.len());
    for (index, page) in document.pages.iter().enumerate() {
        let mut pixmap = Pixmap::new(width_px, height_px).ok_or_else(|| {
            EtchError::InvalidConfiguration(format!(
                "invalid raster size {}x{} at {} DPI",
                width_px, height_px, dpi
            ))
        })?;
        pixmap.fill(tiny_skia::Color::WHITE);
        log::debug!(
            "rasterizing page {} ({} commands) at {}x{}",
            index,
            page.commands.len(),
            width_px,
            height_px
        );
        render_commands(&mut pixmap, &page.commands, base_transform, fonts);
        pixmaps.push(pixmap);
    }
    Ok(pixmaps)
}

/// Rasterizes every page and encodes each as PNG.
pub fn document_to_png_pages(
    document: &Document,
    dpi: u32,
    fonts: &FontRegistry,
) -> Result<Vec<Vec<u8>>, EtchError> {
    document_to_pixmaps(document, RasterOptions { dpi }, fonts)?
        .iter()
        .map(|pixmap| {
            pixmap
                .encode_png()
                .map_err(|e| EtchError::Io(std::io::Error::other(format!("png encode failed: {e}"))))
        })
        .collect()
}

fn render_commands(
    pixmap: &mut Pixmap,
    commands: &[Command],
    base_transform: Transform,
    fonts: &FontRegistry,
) {
    let mut state = RasterState::default();
    let mut stack: Vec<RasterState> = Vec::new();

    for cmd in commands {
        match cmd {
            Command::SaveState => stack.push(state.clone()),
            Command::RestoreState => {
                if let Some(previous) = stack.pop() {
                    state = previous;
                }
            }
            Command::Translate(x, y) => {
                state.transform = state.transform.pre_translate(x.to_f32(), y.to_f32());
            }
            Command::Scale(x, y) => {
                state.transform = state.transform.pre_scale(*x, *y);
            }
            Command::Rotate(degrees) => {
                state.transform = state.transform.pre_concat(Transform::from_rotate(*degrees));
            }
            Command::Shear(sx, sy) => {
                state.transform = state
                    .transform
                    .pre_concat(Transform::from_row(1.0, *sy, *sx, 1.0, 0.0, 0.0));
            }
            Command::SetFillColor(color) => state.fill_color = *color,
            Command::SetStrokeColor(color) => state.stroke_color = *color,
            Command::SetLineWidth(width) => state.line_width = *width,
            Command::SetFontName(name) => state.font_name = name.clone(),
            Command::SetFontSize(size) => state.font_size = *size,
            Command::DrawLine { x0, y0, x1, y1 } => {
                let mut builder = PathBuilder::new();
                builder.move_to(x0.to_f32(), y0.to_f32());
                builder.line_to(x1.to_f32(), y1.to_f32());
                let Some(path) = builder.finish() else {
                    continue;
                };
                let stroke = Stroke {
                    width: state.line_width.to_f32().max(0.0),
                    ..Stroke::default()
                };
                pixmap.stroke_path(
                    &path,
                    &solid_paint(state.stroke_color),
                    &stroke,
                    base_transform.pre_concat(state.transform),
                    None,
                );
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                let Some(rect) =
                    Rect::from_xywh(x.to_f32(), y.to_f32(), width.to_f32(), height.to_f32())
                else {
                    continue;
                };
                pixmap.fill_rect(
                    rect,
                    &solid_paint(state.fill_color),
                    base_transform.pre_concat(state.transform),
                    None,
                );
            }
            Command::DrawString { x, y, text } => {
                draw_string(pixmap, &state, x.to_f32(), y.to_f32(), text, base_transform, fonts);
            }
        }
    }
}

fn draw_string(
    pixmap: &mut Pixmap,
    state: &RasterState,
    x: f32,
    y: f32,
    text: &str,
    base_transform: Transform,
    fonts: &FontRegistry,
) {
    let font_size = state.font_size.to_f32();
    if !(font_size > 0.0) || text.is_empty() {
        return;
    }
    let Some(font) = fonts.resolve(&state.font_name) else {
        log::debug!(
            "no outlines for font {:?}; skipping {} char(s) of text",
            state.font_name,
            text.chars().count()
        );
        return;
    };
    let Ok(face) = ttf_parser::Face::parse(&font.data, 0) else {
        log::warn!("registered font {:?} no longer parses", font.name);
        return;
    };

    let paint = solid_paint(state.fill_color);
    let transform = base_transform.pre_concat(state.transform);
    for placement in layout_glyphs(&font.data, &face, text, font_size, x, y) {
        let mut builder = GlyphPathBuilder::new(placement.origin_x, placement.origin_y, placement.scale);
        if face
            .outline_glyph(GlyphId(placement.glyph_id), &mut builder)
            .is_none()
        {
            continue;
        }
        if let Some(path) = builder.finish() {
            pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
        }
    }
}

struct GlyphPlacement {
    glyph_id: u16,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

fn layout_glyphs(
    font_data: &[u8],
    face: &ttf_parser::Face<'_>,
    text: &str,
    font_size: f32,
    baseline_x: f32,
    baseline_y: f32,
) -> Vec<GlyphPlacement> {
    let Some(hb_face) = HbFace::from_slice(font_data, 0) else {
        return layout_glyphs_unshaped(face, text, font_size, baseline_x, baseline_y);
    };
    let units = hb_face.units_per_em().max(1) as f32;
    let scale = font_size / units;
    let mut buffer = UnicodeBuffer::new();
    buffer.set_direction(font::detect_direction(text));
    buffer.push_str(text);
    let output = rustybuzz::shape(&hb_face, &[], buffer);
    let infos = output.glyph_infos();
    let positions = output.glyph_positions();
    if infos.is_empty() || infos.len() != positions.len() {
        return layout_glyphs_unshaped(face, text, font_size, baseline_x, baseline_y);
    }

    let mut out = Vec::with_capacity(infos.len());
    let mut pen_x = 0.0f32;
    let mut pen_y = 0.0f32;
    for (info, pos) in infos.iter().zip(positions) {
        let glyph_id = info.glyph_id as u16;
        if glyph_id != 0 {
            out.push(GlyphPlacement {
                glyph_id,
                origin_x: baseline_x + pen_x + pos.x_offset as f32 * scale,
                // Shaper offsets grow up; the page grows down.
                origin_y: baseline_y - (pen_y + pos.y_offset as f32 * scale),
                scale,
            });
        }
        pen_x += pos.x_advance as f32 * scale;
        pen_y += pos.y_advance as f32 * scale;
    }
    out
}

fn layout_glyphs_unshaped(
    face: &ttf_parser::Face<'_>,
    text: &str,
    font_size: f32,
    baseline_x: f32,
    baseline_y: f32,
) -> Vec<GlyphPlacement> {
    let scale = font_size / face.units_per_em().max(1) as f32;
    let mut pen_x = 0.0f32;
    let mut out = Vec::new();
    for ch in text.chars() {
        let Some(glyph) = font::glyph_index_for_char(face, ch) else {
            continue;
        };
        out.push(GlyphPlacement {
            glyph_id: glyph.0,
            origin_x: baseline_x + pen_x,
            origin_y: baseline_y,
            scale,
        });
        pen_x += face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
    }
    out
}

/// Converts font-unit outlines (y up) into page space (y down) at `origin`.
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }

    fn x(&self, x: f32) -> f32 {
        self.origin_x + x * self.scale
    }

    fn y(&self, y: f32) -> f32 {
        self.origin_y - y * self.scale
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = (self.x(x), self.y(y));
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1, x, y) = (self.x(x1), self.y(y1), self.x(x), self.y(y));
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = (self.x(x1), self.y(y1));
        let (x2, y2) = (self.x(x2), self.y(y2));
        let (x, y) = (self.x(x), self.y(y));
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

fn solid_paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(color));
    paint.anti_alias = true;
    paint
}

fn to_sk_color(color: Color) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba(
        color.r.clamp(0.0, 1.0),
        color.g.clamp(0.0, 1.0),
        color.b.clamp(0.0, 1.0),
        color.a.clamp(0.0, 1.0),
    )
    .unwrap_or(tiny_skia::Color::BLACK)
}

fn pt_milli_to_px_u32(pt_milli: i64, dpi: u32) -> Result<u32, EtchError> {
    if dpi == 0 {
        return Err(EtchError::InvalidConfiguration("dpi must be > 0".to_string()));
    }
    let num = (pt_milli as i128).saturating_mul(dpi as i128);
    let den = 72_000_i128;
    let px = if num >= 0 {
        (num + den / 2) / den
    } else {
        -((-num + den / 2) / den)
    };
    if px <= 0 {
        return Err(EtchError::InvalidConfiguration(format!(
            "invalid non-positive pixel dimension {px} for pt_milli={pt_milli} dpi={dpi}"
        )));
    }
    u32::try_from(px).map_err(|_| {
        EtchError::InvalidConfiguration(format!(
            "pixel dimension out of range: {px} for pt_milli={pt_milli} dpi={dpi}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Page;
    use crate::types::Size;

    fn document(commands: Vec<Command>) -> Document {
        Document {
            page_size: Size::new(50.0, 50.0),
            pages: vec![Page { commands }],
        }
    }

    fn rect(x: i32, y: i32, w: i32, h: i32) -> Command {
        Command::DrawRect {
            x: Pt::from_i32(x),
            y: Pt::from_i32(y),
            width: Pt::from_i32(w),
            height: Pt::from_i32(h),
        }
    }

    fn decode(document: &Document, dpi: u32) -> image::RgbaImage {
        let pages = document_to_png_pages(document, dpi, &FontRegistry::new()).unwrap();
        assert_eq!(pages.len(), document.pages.len());
        image::load_from_memory(&pages[0]).unwrap().to_rgba8()
    }

    const RED: Color = Color::rgb(1.0, 0.0, 0.0);

    fn is_red(img: &image::RgbaImage, x: u32, y: u32) -> bool {
        img.get_pixel(x, y).0 == [255, 0, 0, 255]
    }

    fn is_white(img: &image::RgbaImage, x: u32, y: u32) -> bool {
        img.get_pixel(x, y).0 == [255, 255, 255, 255]
    }

    #[test]
    fn pixel_size_follows_dpi() {
        assert_eq!(pt_milli_to_px_u32(72_000, 72).unwrap(), 72);
        assert_eq!(pt_milli_to_px_u32(72_000, 150).unwrap(), 150);
        assert_eq!(pt_milli_to_px_u32(500, 72).unwrap(), 1);
        assert!(pt_milli_to_px_u32(72_000, 0).is_err());
        assert!(pt_milli_to_px_u32(0, 72).is_err());
    }

    #[test]
    fn rect_is_filled_in_top_left_coordinates() {
        let img = decode(&document(vec![Command::SetFillColor(RED), rect(10, 5, 10, 10)]), 72);
        assert_eq!(img.dimensions(), (50, 50));
        assert!(is_red(&img, 15, 10));
        assert!(is_white(&img, 5, 10));
        assert!(is_white(&img, 15, 40));
    }

    #[test]
    fn dpi_scales_output() {
        let img = decode(&document(vec![Command::SetFillColor(RED), rect(10, 10, 10, 10)]), 144);
        assert_eq!(img.dimensions(), (100, 100));
        assert!(is_red(&img, 30, 30));
        assert!(is_white(&img, 15, 15));
    }

    #[test]
    fn restore_drops_the_translation() {
        let img = decode(
            &document(vec![
                Command::SetFillColor(RED),
                Command::SaveState,
                Command::Translate(Pt::from_i32(30), Pt::ZERO),
                rect(0, 0, 5, 5),
                Command::RestoreState,
                rect(0, 40, 5, 5),
            ]),
            72,
        );
        assert!(is_red(&img, 32, 2));
        assert!(is_white(&img, 2, 2));
        assert!(is_red(&img, 2, 42));
    }

    #[test]
    fn rotation_turns_clockwise() {
        let img = decode(
            &document(vec![
                Command::SetFillColor(RED),
                Command::Translate(Pt::from_i32(40), Pt::ZERO),
                Command::Rotate(90.0),
                rect(0, 0, 10, 5),
            ]),
            72,
        );
        assert!(is_red(&img, 37, 5));
        assert!(is_white(&img, 42, 5));
    }

    #[test]
    fn lines_use_stroke_color() {
        let img = decode(
            &document(vec![
                Command::SetStrokeColor(RED),
                Command::SetLineWidth(Pt::from_i32(4)),
                Command::DrawLine {
                    x0: Pt::ZERO,
                    y0: Pt::from_i32(25),
                    x1: Pt::from_i32(50),
                    y1: Pt::from_i32(25),
                },
            ]),
            72,
        );
        assert!(is_red(&img, 25, 25));
        assert!(is_white(&img, 25, 10));
    }

    #[test]
    fn text_without_registered_outlines_is_skipped() {
        let img = decode(
            &document(vec![Command::DrawString {
                x: Pt::from_i32(5),
                y: Pt::from_i32(20),
                text: "Hello".to_string(),
            }]),
            72,
        );
        assert!(img.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn transparent_fill_leaves_background() {
        let img = decode(
            &document(vec![Command::SetFillColor(Color::TRANSPARENT), rect(0, 0, 50, 50)]),
            72,
        );
        assert!(is_white(&img, 25, 25));
    }
}
