use crate::canvas::Canvas;
use crate::debug::{DebugLogger, Pass};
use crate::error::EtchError;
use crate::measure_spec::MeasureSpec;
use crate::perf::PerfLogger;
use crate::view::{Bounds, MeasureContext, View, ViewExt};

/// Runs measure, layout and draw over a view tree.
///
/// Every render is a full pass; nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    debug: Option<DebugLogger>,
    perf: Option<PerfLogger>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_debug(mut self, debug: DebugLogger) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn with_perf(mut self, perf: PerfLogger) -> Self {
        self.perf = Some(perf);
        self
    }

    /// Measures `root` against the surface extents, places it at the origin
    /// with its measured size and paints the tree.
    ///
    /// On failure the surface's state stack is unwound to its depth before
    /// the call; the tree is left partially measured or placed.
    pub fn render(&self, root: &mut dyn View, surface: &mut dyn Canvas) -> Result<(), EtchError> {
        let width_spec = MeasureSpec::at_most(surface.width());
        let height_spec = MeasureSpec::at_most(surface.height());
        log::debug!(
            "render {} with {:?} x {:?}",
            root.type_name(),
            width_spec,
            height_spec
        );

        let size = self.timed("measure", || {
            let cx = MeasureContext::new(surface.text_metrics());
            root.measure(&cx, width_spec, height_spec)
        })?;
        if let Some(debug) = &self.debug {
            log_tree(debug, Pass::Measure, root, 0);
        }

        self.timed("layout", || root.layout(0, 0, size.width, size.height))?;
        if let Some(debug) = &self.debug {
            log_tree(debug, Pass::Layout, root, 0);
        }

        let depth = surface.save_count();
        let floor = surface.set_restore_floor(depth);
        let drawn = self.timed("draw", || self.draw_node(root, None, 0, surface));
        surface.set_restore_floor(floor);
        let drawn = match drawn {
            Ok(count) => count,
            Err(err) => {
                surface.restore_to_count(depth);
                return Err(err);
            }
        };

        if let Some(perf) = &self.perf {
            perf.log_counts("render", None, &[("views", drawn as u64)]);
            perf.flush();
        }
        if let Some(debug) = &self.debug {
            debug.emit_summary("render");
            debug.flush();
        }
        Ok(())
    }

    fn timed<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        match &self.perf {
            Some(perf) => perf.span(name, None, f),
            None => f(),
        }
    }

    /// Paints `view` and its subtree inside one save/restore bracket.
    /// Returns the number of views painted.
    fn draw_node(
        &self,
        view: &dyn View,
        parent: Option<Bounds>,
        depth: usize,
        surface: &mut dyn Canvas,
    ) -> Result<usize, EtchError> {
        let token = surface.save();
        match self.draw_bracketed(view, parent, depth, surface) {
            Ok(count) => {
                let open = surface.save_count();
                if open < token + 1 {
                    surface.restore_to_count(token);
                    return Err(EtchError::ContractViolation(format!(
                        "{} restored canvas state it did not save",
                        view.type_name()
                    )));
                }
                if open > token + 1 {
                    log::warn!(
                        "{} left {} unrestored save(s)",
                        view.type_name(),
                        open - token - 1
                    );
                    surface.restore_to_count(token + 1);
                }
                surface.restore();
                Ok(count)
            }
            Err(err) => {
                surface.restore_to_count(token);
                Err(err)
            }
        }
    }

    fn draw_bracketed(
        &self,
        view: &dyn View,
        parent: Option<Bounds>,
        depth: usize,
        surface: &mut dyn Canvas,
    ) -> Result<usize, EtchError> {
        let bounds = view.core().bounds();
        // Bounds are absolute; the surface origin already sits at the parent.
        let (dx, dy) = match parent {
            Some(parent) => (
                bounds.left.saturating_sub(parent.left),
                bounds.top.saturating_sub(parent.top),
            ),
            None => (bounds.left, bounds.top),
        };
        surface.translate(dx as f32, dy as f32);
        log::trace!("draw {} at depth {} {:?}", view.type_name(), depth, bounds);
        if let Some(debug) = &self.debug {
            debug.log_node(Pass::Draw, depth, view);
        }

        // Suspect order: children paint before this node's background and
        // content, so an opaque background covers them.
        let mut count = 1;
        for child in view.children() {
            count += self.draw_node(&**child, Some(bounds), depth + 1, surface)?;
        }
        if let Some(background) = view.core().background() {
            background.draw(surface)?;
        }
        view.draw(surface)?;
        Ok(count)
    }
}

fn log_tree(debug: &DebugLogger, pass: Pass, view: &dyn View, depth: usize) {
    debug.log_node(pass, depth, view);
    for child in view.children() {
        log_tree(debug, pass, &**child, depth + 1);
    }
}

/// Renders `root` onto `surface` with a default [`Renderer`].
pub fn render(root: &mut dyn View, surface: &mut dyn Canvas) -> Result<(), EtchError> {
    Renderer::default().render(root, surface)
}
