mod canvas;
mod debug;
mod drawable;
mod error;
mod font;
mod inflater;
mod layout_params;
mod linear_layout;
mod measure_spec;
mod pdf;
mod perf;
mod raster;
mod renderer;
mod surface_view;
#[cfg(test)]
mod testing;
mod text_view;
mod types;
mod view;
mod view_group;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

pub use canvas::{Canvas, Command, Document, Page, Paint, RecordingCanvas, TextMeasurer};
pub use debug::{DebugLogger, Pass};
pub use drawable::{Drawable, RectDrawable};
pub use error::EtchError;
pub use font::{DEFAULT_FONT, FontRegistry};
pub use inflater::{Inflater, ViewFactory};
pub use layout_params::{Dimension, Gravity, LayoutParams, LayoutParamsKind, Margins};
pub use linear_layout::{LinearLayout, Orientation};
pub use measure_spec::{MeasureMode, MeasureSpec};
pub use pdf::{document_to_pdf, write_document};
pub use perf::PerfLogger;
pub use raster::{DEFAULT_DPI, RasterOptions, document_to_pixmaps, document_to_png_pages};
pub use renderer::{Renderer, render};
pub use surface_view::{DrawCallback, SurfaceView};
pub use text_view::TextView;
pub use types::{Color, Pt, RectF, Size};
pub use view::{
    Bounds, MeasureContext, MeasuredSize, Measurement, PlainView, View, ViewCore, ViewExt,
    ViewState,
};
pub use view_group::ViewGroup;

const MAX_DPI: u32 = 2400;

/// Configured engine: page geometry, fonts and output settings shared by
/// every render.
pub struct LightEtch {
    page_size: Size,
    background: Option<Color>,
    raster_dpi: u32,
    fonts: Arc<FontRegistry>,
    inflater: Inflater,
    renderer: Renderer,
    perf: Option<PerfLogger>,
}

pub struct LightEtchBuilder {
    page_size: Size,
    background: Option<Color>,
    raster_dpi: u32,
    font_dirs: Vec<PathBuf>,
    font_files: Vec<PathBuf>,
    font_bytes: Vec<(Vec<u8>, String)>,
    debug_path: Option<PathBuf>,
    perf_path: Option<PathBuf>,
}

impl LightEtch {
    pub fn builder() -> LightEtchBuilder {
        LightEtchBuilder::new()
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn fonts(&self) -> &Arc<FontRegistry> {
        &self.fonts
    }

    pub fn inflater_mut(&mut self) -> &mut Inflater {
        &mut self.inflater
    }

    /// A recording surface of the configured page size, measuring text with
    /// the engine's fonts.
    pub fn new_canvas(&self) -> RecordingCanvas {
        RecordingCanvas::new(self.page_size, self.fonts.clone())
    }

    pub fn inflate(&self, markup: &str) -> Result<Box<dyn View>, EtchError> {
        self.inflater.inflate(markup)
    }

    /// Runs a full measure, layout and draw of `root` onto `canvas`.
    pub fn render(&self, root: &mut dyn View, canvas: &mut dyn Canvas) -> Result<(), EtchError> {
        self.renderer.render(root, canvas)
    }

    /// Records `root` as a single page, painting the page background first.
    pub fn render_document(&self, root: &mut dyn View) -> Result<Document, EtchError> {
        let mut canvas = self.new_canvas();
        if let Some(color) = self.background {
            let page = RectF::from_size(
                self.page_size.width.to_f32(),
                self.page_size.height.to_f32(),
            )?;
            canvas.draw_rect(page, &Paint::fill(color));
        }
        self.render(root, &mut canvas)?;
        Ok(canvas.finish())
    }

    pub fn render_pdf(&self, root: &mut dyn View) -> Result<Vec<u8>, EtchError> {
        let mut out = Vec::new();
        self.render_pdf_to_writer(root, &mut out)?;
        Ok(out)
    }

    pub fn render_pdf_to_writer<W: Write>(
        &self,
        root: &mut dyn View,
        writer: &mut W,
    ) -> Result<(), EtchError> {
        let document = self.render_document(root)?;
        let start = Instant::now();
        pdf::write_document(&document, writer)?;
        if let Some(perf) = &self.perf {
            perf.log_span_ms("pdf", None, start.elapsed().as_secs_f64() * 1000.0);
            perf.log_counts("pdf", None, &[("pages", document.pages.len() as u64)]);
            perf.flush();
        }
        Ok(())
    }

    /// Renders `root` and encodes the page as PNG at the configured DPI.
    pub fn render_png(&self, root: &mut dyn View) -> Result<Vec<u8>, EtchError> {
        let document = self.render_document(root)?;
        let start = Instant::now();
        let mut pages = raster::document_to_png_pages(&document, self.raster_dpi, &self.fonts)?;
        if let Some(perf) = &self.perf {
            perf.log_span_ms("raster", None, start.elapsed().as_secs_f64() * 1000.0);
            perf.flush();
        }
        if pages.is_empty() {
            return Err(EtchError::ContractViolation(
                "rasterizer produced no pages".to_string(),
            ));
        }
        Ok(pages.swap_remove(0))
    }
}

impl LightEtchBuilder {
    pub fn new() -> Self {
        Self {
            page_size: Size::a4(),
            background: None,
            raster_dpi: DEFAULT_DPI,
            font_dirs: Vec::new(),
            font_files: Vec::new(),
            font_bytes: Vec::new(),
            debug_path: None,
            perf_path: None,
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_files.push(path.into());
        self
    }

    pub fn font_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_dirs.push(path.into());
        self
    }

    pub fn font_bytes(mut self, data: Vec<u8>, name: impl Into<String>) -> Self {
        self.font_bytes.push((data, name.into()));
        self
    }

    pub fn raster_dpi(mut self, dpi: u32) -> Self {
        self.raster_dpi = dpi;
        self
    }

    // Painted under the root on every recorded page.
    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    // JSON-lines trace of every measured, placed and drawn node.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    // JSON-lines timings; a ranked `<stem>_hot.log` is written next to it.
    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<LightEtch, EtchError> {
        let width = self.page_size.width.to_f32();
        let height = self.page_size.height.to_f32();
        if !(width > 0.0 && height > 0.0) {
            return Err(EtchError::InvalidConfiguration(format!(
                "page size must be positive, got {width}x{height}"
            )));
        }
        if !(1..=MAX_DPI).contains(&self.raster_dpi) {
            return Err(EtchError::InvalidConfiguration(format!(
                "raster dpi must be in 1..={MAX_DPI}, got {}",
                self.raster_dpi
            )));
        }

        let mut registry = FontRegistry::new();
        for dir in &self.font_dirs {
            let count = registry.register_dir(dir)?;
            log::debug!("registered {count} font(s) from {}", dir.display());
        }
        for file in &self.font_files {
            registry.register_file(file)?;
        }
        for (data, name) in self.font_bytes {
            registry.register_bytes(data, Some(&name))?;
        }

        let mut renderer = Renderer::new();
        if let Some(path) = self.debug_path {
            renderer = renderer.with_debug(DebugLogger::new(path)?);
        }
        let perf = match self.perf_path {
            Some(path) => Some(PerfLogger::new(path)?),
            None => None,
        };
        if let Some(perf) = &perf {
            renderer = renderer.with_perf(perf.clone());
        }

        Ok(LightEtch {
            page_size: self.page_size,
            background: self.background,
            raster_dpi: self.raster_dpi,
            fonts: Arc::new(registry),
            inflater: Inflater::new(),
            renderer,
            perf,
        })
    }
}

impl Default for LightEtchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<LinearLayout background="#ff0000">
        <View height="10" weight="1"/>
        <TextView textSize="10">Hello world</TextView>
    </LinearLayout>"##;

    fn engine() -> LightEtch {
        LightEtch::builder()
            .page_size(Size::new(100.0, 50.0))
            .raster_dpi(72)
            .build()
            .unwrap()
    }

    #[test]
    fn build_rejects_bad_configuration() {
        let zero_page = LightEtch::builder().page_size(Size::new(0.0, 10.0)).build();
        assert!(matches!(zero_page, Err(EtchError::InvalidConfiguration(_))));
        let zero_dpi = LightEtch::builder().raster_dpi(0).build();
        assert!(matches!(zero_dpi, Err(EtchError::InvalidConfiguration(_))));
        let huge_dpi = LightEtch::builder().raster_dpi(MAX_DPI + 1).build();
        assert!(matches!(huge_dpi, Err(EtchError::InvalidConfiguration(_))));
    }

    #[test]
    fn build_reports_unusable_fonts() {
        let missing = LightEtch::builder().font_file("/nonexistent/font.ttf").build();
        assert!(matches!(missing, Err(EtchError::Io(_))));
        let not_a_font = LightEtch::builder().font_file("/nonexistent/font.txt").build();
        assert!(matches!(not_a_font, Err(EtchError::Font(_))));
        let garbage = LightEtch::builder().font_bytes(vec![0; 16], "Garbage").build();
        assert!(matches!(garbage, Err(EtchError::Font(_))));
        let no_dir = LightEtch::builder().font_dir("/nonexistent/fonts").build();
        assert!(matches!(no_dir, Err(EtchError::Io(_))));
    }

    #[test]
    fn pdf_contains_inflated_content() {
        let engine = engine();
        let mut root = engine.inflate(PAGE).unwrap();
        let pdf = engine.render_pdf(&mut *root).unwrap();
        let doc = lopdf::Document::load_mem(&pdf).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = pages.values().next().copied().unwrap();
        let content = String::from_utf8_lossy(&doc.get_page_content(page_id).unwrap()).into_owned();
        assert!(content.contains("(Hello world) Tj"));
        assert!(content.contains("1 0 0 rg"));
    }

    #[test]
    fn png_covers_the_page_at_the_configured_dpi() {
        let engine = LightEtch::builder()
            .page_size(Size::new(100.0, 50.0))
            .raster_dpi(144)
            .background(Color::rgb(0.0, 0.0, 1.0))
            .build()
            .unwrap();
        let mut root = engine.inflate(r#"<View/>"#).unwrap();
        let png = engine.render_png(&mut *root).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (200, 100));
        assert_eq!(img.get_pixel(10, 10).0, [0, 0, 255, 255]);
    }

    #[test]
    fn background_is_recorded_before_the_tree() {
        let engine = LightEtch::builder()
            .page_size(Size::new(100.0, 50.0))
            .background(Color::WHITE)
            .build()
            .unwrap();
        let mut root = engine.inflate(r##"<View background="#000000"/>"##).unwrap();
        let document = engine.render_document(&mut *root).unwrap();
        let commands = &document.pages[0].commands;
        assert_eq!(commands[0], Command::SetFillColor(Color::WHITE));
        assert!(matches!(commands[1], Command::DrawRect { .. }));
        assert_eq!(commands[2], Command::SaveState);
    }

    #[test]
    fn multiple_roots_share_one_document() {
        let engine = engine();
        let mut canvas = engine.new_canvas();
        for text in ["one", "two"] {
            let mut root = engine
                .inflate(&format!("<TextView>{text}</TextView>"))
                .unwrap();
            engine.render(&mut *root, &mut canvas).unwrap();
            canvas.show_page();
        }
        let pdf = document_to_pdf(&canvas.finish()).unwrap();
        let doc = lopdf::Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn logs_are_written_when_configured() {
        let dir = std::env::temp_dir();
        let stem = format!("lightetch_engine_{}", std::process::id());
        let debug_path = dir.join(format!("{stem}_debug.jsonl"));
        let perf_path = dir.join(format!("{stem}_perf.log"));
        {
            let engine = LightEtch::builder()
                .page_size(Size::new(100.0, 50.0))
                .debug_log(&debug_path)
                .perf_log(&perf_path)
                .build()
                .unwrap();
            let mut root = engine.inflate(PAGE).unwrap();
            engine.render_pdf(&mut *root).unwrap();
        }
        let debug = std::fs::read_to_string(&debug_path).unwrap();
        let perf = std::fs::read_to_string(&perf_path).unwrap();
        let hot = perf_path.with_file_name(format!("{stem}_perf_hot.log"));
        let _ = std::fs::remove_file(&debug_path);
        let _ = std::fs::remove_file(&perf_path);
        let _ = std::fs::remove_file(&hot);
        assert!(debug.contains("\"type\":\"view.draw\""));
        assert!(debug.contains("\"type\":\"debug.summary\""));
        assert!(perf.contains("\"name\":\"measure\""));
        assert!(perf.contains("\"name\":\"pdf\""));
    }
}
