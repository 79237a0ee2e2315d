use std::sync::Arc;

use crate::font::{DEFAULT_FONT, FontRegistry};
use crate::types::{Color, Pt, RectF, Size};

/// Style used by the paint primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    pub fill_color: Color,
    pub stroke_color: Color,
    pub stroke_width: f32,
    pub text_size: f32,
    pub font_name: Arc<str>,
}

impl Default for Paint {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            stroke_width: 1.0,
            text_size: 12.0,
            font_name: Arc::from(DEFAULT_FONT),
        }
    }
}

impl Paint {
    pub fn fill(color: Color) -> Self {
        Self {
            fill_color: color,
            ..Self::default()
        }
    }

    pub fn stroke(color: Color, width: f32) -> Self {
        Self {
            stroke_color: color,
            stroke_width: width,
            ..Self::default()
        }
    }
}

/// Text metrics capability.
pub trait TextMeasurer {
    /// Bounds of `text` relative to its baseline origin: `top` is minus the
    /// ascent, `bottom` the descent and `right` the advance width.
    fn measure_text(&self, text: &str, paint: &Paint) -> RectF;
}

/// A 2D drawing surface with a nested save/restore state stack.
///
/// Every implementation must keep the stack exact: `restore` undoes exactly
/// what was pushed by the matching `save`, and `restore_to_count(token)`
/// leaves [`Canvas::save_count`] equal to `token`. Operations a backend
/// cannot express may be ignored.
pub trait Canvas {
    fn width(&self) -> i32;
    fn height(&self) -> i32;

    /// Pushes the transform and paint state. Returns the stack depth before
    /// the push, to be handed to [`Canvas::restore_to_count`].
    fn save(&mut self) -> usize;
    /// Pops one level. Popping an empty stack, or below the restore floor,
    /// does nothing.
    fn restore(&mut self);
    fn restore_to_count(&mut self, count: usize);
    fn save_count(&self) -> usize;
    /// Refuses restores that would drop the stack below `floor`. Returns the
    /// previous floor.
    fn set_restore_floor(&mut self, floor: usize) -> usize;

    fn translate(&mut self, dx: f32, dy: f32);
    fn scale(&mut self, sx: f32, sy: f32);
    fn rotate(&mut self, degrees: f32);
    fn shear(&mut self, sx: f32, sy: f32);

    fn draw_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, paint: &Paint);
    fn draw_rect(&mut self, rect: RectF, paint: &Paint);
    /// Paints `text` with its baseline starting at (`x`, `y`).
    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &Paint);

    fn text_metrics(&self) -> &dyn TextMeasurer;

    fn measure_text(&self, text: &str, paint: &Paint) -> RectF {
        self.text_metrics().measure_text(text, paint)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    Translate(Pt, Pt),
    Scale(f32, f32),
    /// Clockwise rotation in degrees.
    Rotate(f32),
    Shear(f32, f32),
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFontName(Arc<str>),
    SetFontSize(Pt),
    DrawLine {
        x0: Pt,
        y0: Pt,
        x1: Pt,
        y1: Pt,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub commands: Vec<Command>,
}

/// Recorded display list, one [`Page`] per `show_page`.
#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font_size: Pt,
    font_name: Arc<str>,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font_size: Pt::from_f32(12.0),
            font_name: Arc::from(DEFAULT_FONT),
        }
    }
}

/// Canvas that records commands into a [`Document`] for the PDF and raster
/// backends to replay. Redundant state changes are dropped.
pub struct RecordingCanvas {
    page_size: Size,
    fonts: Arc<FontRegistry>,
    pages: Vec<Page>,
    current: Page,
    state_stack: Vec<GraphicsState>,
    restore_floor: usize,
    current_state: GraphicsState,
}

impl RecordingCanvas {
    pub fn new(page_size: Size, fonts: Arc<FontRegistry>) -> Self {
        Self {
            page_size,
            fonts,
            pages: Vec::new(),
            current: Page::default(),
            state_stack: Vec::new(),
            restore_floor: 0,
            current_state: GraphicsState::default(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn fonts(&self) -> &Arc<FontRegistry> {
        &self.fonts
    }

    pub fn current_commands(&self) -> &[Command] {
        &self.current.commands
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Closes the current page and starts a new one with a fresh state.
    pub fn show_page(&mut self) {
        if !self.state_stack.is_empty() {
            log::warn!(
                "closing page with {} unrestored save(s)",
                self.state_stack.len()
            );
        }
        let current = std::mem::take(&mut self.current);
        self.pages.push(current);
        self.state_stack.clear();
        self.restore_floor = 0;
        self.current_state = GraphicsState::default();
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }

    fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.current.commands.push(Command::SetLineWidth(width));
    }

    fn set_font(&mut self, name: &Arc<str>, size: Pt) {
        if self.current_state.font_name != *name {
            self.current_state.font_name = name.clone();
            self.current.commands.push(Command::SetFontName(name.clone()));
        }
        if self.current_state.font_size != size {
            self.current_state.font_size = size;
            self.current.commands.push(Command::SetFontSize(size));
        }
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> i32 {
        self.page_size.width.to_f32().floor() as i32
    }

    fn height(&self) -> i32 {
        self.page_size.height.to_f32().floor() as i32
    }

    fn save(&mut self) -> usize {
        let depth = self.state_stack.len();
        self.state_stack.push(self.current_state.clone());
        self.current.commands.push(Command::SaveState);
        depth
    }

    fn restore(&mut self) {
        if self.state_stack.len() <= self.restore_floor && !self.state_stack.is_empty() {
            log::warn!(
                "restore() below the floor of {} refused",
                self.restore_floor
            );
            return;
        }
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.current.commands.push(Command::RestoreState);
        } else {
            log::warn!("restore() called with an empty state stack");
        }
    }

    fn restore_to_count(&mut self, count: usize) {
        let count = count.max(self.restore_floor);
        while self.state_stack.len() > count {
            self.restore();
        }
    }

    fn save_count(&self) -> usize {
        self.state_stack.len()
    }

    fn set_restore_floor(&mut self, floor: usize) -> usize {
        std::mem::replace(&mut self.restore_floor, floor)
    }

    fn translate(&mut self, dx: f32, dy: f32) {
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        self.current
            .commands
            .push(Command::Translate(Pt::from_f32(dx), Pt::from_f32(dy)));
    }

    fn scale(&mut self, sx: f32, sy: f32) {
        self.current.commands.push(Command::Scale(sx, sy));
    }

    fn rotate(&mut self, degrees: f32) {
        self.current.commands.push(Command::Rotate(degrees));
    }

    fn shear(&mut self, sx: f32, sy: f32) {
        self.current.commands.push(Command::Shear(sx, sy));
    }

    fn draw_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, paint: &Paint) {
        self.set_stroke_color(paint.stroke_color);
        self.set_line_width(Pt::from_f32(paint.stroke_width));
        self.current.commands.push(Command::DrawLine {
            x0: Pt::from_f32(x0),
            y0: Pt::from_f32(y0),
            x1: Pt::from_f32(x1),
            y1: Pt::from_f32(y1),
        });
    }

    fn draw_rect(&mut self, rect: RectF, paint: &Paint) {
        self.set_fill_color(paint.fill_color);
        self.current.commands.push(Command::DrawRect {
            x: Pt::from_f32(rect.left()),
            y: Pt::from_f32(rect.top()),
            width: Pt::from_f32(rect.width()),
            height: Pt::from_f32(rect.height()),
        });
    }

    fn draw_text(&mut self, text: &str, x: f32, y: f32, paint: &Paint) {
        if text.is_empty() {
            return;
        }
        self.set_fill_color(paint.fill_color);
        self.set_font(&paint.font_name, Pt::from_f32(paint.text_size));
        self.current.commands.push(Command::DrawString {
            x: Pt::from_f32(x),
            y: Pt::from_f32(y),
            text: text.to_string(),
        });
    }

    fn text_metrics(&self) -> &dyn TextMeasurer {
        self.fonts.as_ref()
    }
}
