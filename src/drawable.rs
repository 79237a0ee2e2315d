use std::fmt;

use crate::canvas::{Canvas, Paint};
use crate::error::EtchError;
use crate::types::{Color, RectF};

/// Something paintable inside its own bounds, such as a view background.
pub trait Drawable: fmt::Debug {
    fn bounds(&self) -> RectF;
    /// Bounds are copied in; later changes to `bounds` do not affect the
    /// drawable.
    fn set_bounds(&mut self, bounds: RectF);
    fn draw(&self, canvas: &mut dyn Canvas) -> Result<(), EtchError>;
}

/// Solid rectangle fill.
#[derive(Debug, Clone, PartialEq)]
pub struct RectDrawable {
    bounds: RectF,
    paint: Paint,
}

impl RectDrawable {
    pub fn new(color: Color) -> Self {
        Self {
            bounds: RectF::default(),
            paint: Paint::fill(color),
        }
    }

    pub fn with_paint(paint: Paint) -> Self {
        Self {
            bounds: RectF::default(),
            paint,
        }
    }

    pub fn paint(&self) -> &Paint {
        &self.paint
    }

    pub fn color(&self) -> Color {
        self.paint.fill_color
    }
}

impl Drawable for RectDrawable {
    fn bounds(&self) -> RectF {
        self.bounds
    }

    fn set_bounds(&mut self, bounds: RectF) {
        self.bounds = bounds;
    }

    fn draw(&self, canvas: &mut dyn Canvas) -> Result<(), EtchError> {
        if self.paint.fill_color.a <= 0.0 {
            return Ok(());
        }
        canvas.draw_rect(self.bounds, &self.paint);
        Ok(())
    }
}
