use std::fmt;

use crate::canvas::Canvas;
use crate::error::EtchError;
use crate::view::{View, ViewCore};

pub type DrawCallback = Box<dyn Fn(&ViewCore, &mut dyn Canvas) -> Result<(), EtchError>>;

/// Leaf whose content is painted by a caller-supplied callback, in the
/// view's local coordinates.
#[derive(Default)]
pub struct SurfaceView {
    core: ViewCore,
    on_draw: Option<DrawCallback>,
}

impl SurfaceView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(&ViewCore, &mut dyn Canvas) -> Result<(), EtchError> + 'static,
    {
        Self {
            core: ViewCore::new(),
            on_draw: Some(Box::new(callback)),
        }
    }

    pub fn set_on_draw<F>(&mut self, callback: F)
    where
        F: Fn(&ViewCore, &mut dyn Canvas) -> Result<(), EtchError> + 'static,
    {
        self.on_draw = Some(Box::new(callback));
    }

    pub fn clear_on_draw(&mut self) {
        self.on_draw = None;
    }
}

impl fmt::Debug for SurfaceView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceView")
            .field("core", &self.core)
            .field("has_callback", &self.on_draw.is_some())
            .finish()
    }
}

impl View for SurfaceView {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "SurfaceView"
    }

    fn draw(&self, canvas: &mut dyn Canvas) -> Result<(), EtchError> {
        match &self.on_draw {
            Some(callback) => callback(&self.core, canvas),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Command, Paint, RecordingCanvas};
    use crate::font::FontRegistry;
    use crate::types::{Pt, Size};
    use crate::view::ViewExt;
    use std::sync::Arc;

    fn canvas() -> RecordingCanvas {
        RecordingCanvas::new(Size::new(100.0, 100.0), Arc::new(FontRegistry::new()))
    }

    #[test]
    fn callback_paints_with_view_geometry() {
        let mut view = SurfaceView::with_callback(|core, canvas| {
            let b = core.bounds();
            canvas.draw_line(0.0, 0.0, b.width() as f32, b.height() as f32, &Paint::default());
            Ok(())
        });
        view.layout(5, 5, 25, 15).unwrap();
        let mut c = canvas();
        view.draw(&mut c).unwrap();
        assert_eq!(
            c.current_commands(),
            &[Command::DrawLine {
                x0: Pt::ZERO,
                y0: Pt::ZERO,
                x1: Pt::from_i32(20),
                y1: Pt::from_i32(10),
            }]
        );
    }

    #[test]
    fn without_callback_draws_nothing() {
        let mut view = SurfaceView::new();
        view.set_on_draw(|_, _| Err(EtchError::ContractViolation("boom".into())));
        view.clear_on_draw();
        let mut c = canvas();
        view.draw(&mut c).unwrap();
        assert!(c.current_commands().is_empty());
    }

    #[test]
    fn callback_errors_propagate() {
        let view = SurfaceView::with_callback(|_, _| Err(EtchError::Markup("bad".into())));
        let mut c = canvas();
        assert!(matches!(view.draw(&mut c), Err(EtchError::Markup(_))));
    }
}
