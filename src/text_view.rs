use std::sync::Arc;

use crate::canvas::{Canvas, Paint};
use crate::error::EtchError;
use crate::layout_params::Dimension;
use crate::measure_spec::{MeasureMode, MeasureSpec};
use crate::types::Color;
use crate::view::{MeasureContext, Measurement, View, ViewCore};

/// Leaf that shows a block of text, wrapped on whitespace to the width it
/// is offered.
#[derive(Debug, Default)]
pub struct TextView {
    core: ViewCore,
    text: String,
    paint: Paint,
    lines: Vec<String>,
    line_height: f32,
    ascent: f32,
}

impl TextView {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn paint(&self) -> &Paint {
        &self.paint
    }

    pub fn paint_mut(&mut self) -> &mut Paint {
        &mut self.paint
    }

    /// Lines produced by the last measure pass.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    fn wrap(&self, cx: &MeasureContext<'_>, max_width: f32) -> (Vec<String>, f32) {
        let mut lines = Vec::new();
        let mut widest = 0.0f32;
        let text = self.text.trim();
        if text.is_empty() {
            return (lines, widest);
        }
        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                if current.is_empty() {
                    current.push_str(word);
                    continue;
                }
                let candidate = format!("{current} {word}");
                if self.width_of(cx, &candidate) <= max_width {
                    current = candidate;
                } else {
                    widest = widest.max(self.width_of(cx, &current));
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                }
            }
            widest = widest.max(self.width_of(cx, &current));
            lines.push(current);
        }
        (lines, widest)
    }

    fn unwrapped(&self, cx: &MeasureContext<'_>) -> (Vec<String>, f32) {
        let text = self.text.trim();
        if text.is_empty() {
            return (Vec::new(), 0.0);
        }
        let lines: Vec<String> = text.split('\n').map(|line| line.trim().to_string()).collect();
        let widest = lines
            .iter()
            .map(|line| self.width_of(cx, line))
            .fold(0.0f32, f32::max);
        (lines, widest)
    }

    fn width_of(&self, cx: &MeasureContext<'_>, text: &str) -> f32 {
        cx.measure_text(text, &self.paint).width()
    }
}

impl View for TextView {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "TextView"
    }

    fn on_measure(
        &mut self,
        cx: &MeasureContext<'_>,
        width_spec: MeasureSpec,
        height_spec: MeasureSpec,
        out: &mut Measurement,
    ) -> Result<(), EtchError> {
        let available = width_spec.size() as f32;
        let (lines, width) = match width_spec.mode() {
            MeasureMode::AtMost => {
                let (lines, widest) = self.wrap(cx, available);
                if self.core.layout_params().width() == Dimension::WrapContent {
                    (lines, widest)
                } else {
                    (lines, widest.max(available))
                }
            }
            MeasureMode::Exactly => (self.wrap(cx, available).0, available),
            MeasureMode::Unspecified => self.unwrapped(cx),
        };

        let metrics = cx.measure_text(&self.text, &self.paint);
        self.line_height = metrics.height();
        self.ascent = -metrics.top();

        let height = match height_spec.mode() {
            MeasureMode::Exactly => height_spec.size(),
            _ => (self.line_height * lines.len() as f32).ceil() as i32,
        };
        self.lines = lines;
        out.set_measured_dimension(width.ceil() as i32, height);
        Ok(())
    }

    fn draw(&self, canvas: &mut dyn Canvas) -> Result<(), EtchError> {
        for (index, line) in self.lines.iter().enumerate() {
            let baseline = self.ascent + index as f32 * self.line_height;
            canvas.draw_text(line, 0.0, baseline, &self.paint);
        }
        Ok(())
    }

    fn set_attribute(&mut self, key: &str, value: &str) -> Result<bool, EtchError> {
        match key {
            "text" => self.text = value.to_string(),
            "textSize" => {
                let size = value
                    .trim()
                    .trim_end_matches("px")
                    .parse::<f32>()
                    .ok()
                    .filter(|size| size.is_finite() && *size > 0.0)
                    .ok_or_else(|| EtchError::Markup(format!("invalid textSize {value:?}")))?;
                self.paint.text_size = size;
            }
            "textColor" => {
                self.paint.fill_color = Color::parse(value)
                    .ok_or_else(|| EtchError::Markup(format!("invalid textColor {value:?}")))?;
            }
            "fontName" => self.paint.font_name = Arc::from(value.trim()),
            _ => return Ok(false),
        }
        Ok(true)
    }
}
