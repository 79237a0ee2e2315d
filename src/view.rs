use std::fmt;
use std::sync::OnceLock;

use crate::canvas::{Canvas, Paint, TextMeasurer};
use crate::drawable::{Drawable, RectDrawable};
use crate::error::EtchError;
use crate::font::FontRegistry;
use crate::layout_params::{LayoutParams, LayoutParamsKind};
use crate::measure_spec::MeasureSpec;
use crate::types::{Color, RectF};
use crate::view_group::ViewGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasuredSize {
    pub width: i32,
    pub height: i32,
}

/// Placed rectangle in surface coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn to_rect(&self) -> Result<RectF, EtchError> {
        RectF::new(
            self.left as f32,
            self.top as f32,
            self.right as f32,
            self.bottom as f32,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Unmeasured,
    Measured,
    Placed,
}

/// Sink for the result of [`View::on_measure`].
///
/// Sizing logic must finish by calling
/// [`Measurement::set_measured_dimension`]; [`ViewExt::measure`] rejects a
/// measurement that was never set.
#[derive(Debug, Default)]
pub struct Measurement {
    size: Option<MeasuredSize>,
}

impl Measurement {
    pub fn set_measured_dimension(&mut self, width: i32, height: i32) {
        self.size = Some(MeasuredSize { width, height });
    }

    pub fn get(&self) -> Option<MeasuredSize> {
        self.size
    }
}

/// Services available to sizing logic.
#[derive(Clone, Copy)]
pub struct MeasureContext<'a> {
    text: &'a dyn TextMeasurer,
}

impl<'a> MeasureContext<'a> {
    pub fn new(text: &'a dyn TextMeasurer) -> Self {
        Self { text }
    }

    pub fn measure_text(&self, text: &str, paint: &Paint) -> RectF {
        self.text.measure_text(text, paint)
    }
}

impl MeasureContext<'static> {
    /// Context backed by the built-in font metrics only.
    pub fn builtin() -> Self {
        static FONTS: OnceLock<FontRegistry> = OnceLock::new();
        Self {
            text: FONTS.get_or_init(FontRegistry::new),
        }
    }
}

impl fmt::Debug for MeasureContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasureContext").finish_non_exhaustive()
    }
}

/// State every node carries, whatever its kind.
#[derive(Debug, Default)]
pub struct ViewCore {
    layout_params: LayoutParams,
    measured: MeasuredSize,
    bounds: Bounds,
    background: Option<Box<dyn Drawable>>,
    state: ViewState,
    id: Option<String>,
}

impl ViewCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(layout_params: LayoutParams) -> Self {
        Self {
            layout_params,
            ..Self::default()
        }
    }

    pub fn layout_params(&self) -> &LayoutParams {
        &self.layout_params
    }

    pub fn layout_params_mut(&mut self) -> &mut LayoutParams {
        &mut self.layout_params
    }

    pub fn set_layout_params(&mut self, params: LayoutParams) {
        self.layout_params = params;
    }

    pub fn measured(&self) -> MeasuredSize {
        self.measured
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn background(&self) -> Option<&dyn Drawable> {
        self.background.as_deref()
    }

    pub fn set_background(&mut self, background: Option<Box<dyn Drawable>>) {
        self.background = background;
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Attributes shared by every node kind: `id` and `background`.
    pub fn set_attribute(&mut self, key: &str, value: &str) -> Result<bool, EtchError> {
        match key {
            "id" => {
                self.set_id(value.trim());
                Ok(true)
            }
            "background" => {
                let color = Color::parse(value).ok_or_else(|| {
                    EtchError::Markup(format!("invalid color {value:?} for background"))
                })?;
                self.set_background(Some(Box::new(RectDrawable::new(color))));
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// A node of the layout tree.
///
/// Implementors supply sizing (`on_measure`), placement (`on_layout`) and
/// painting (`draw`). The non-overridable template steps live on
/// [`ViewExt`].
pub trait View: fmt::Debug {
    fn core(&self) -> &ViewCore;
    fn core_mut(&mut self) -> &mut ViewCore;

    fn type_name(&self) -> &'static str;

    /// Sizes the node. The default takes the measure spec sizes whatever the modes.
    fn on_measure(
        &mut self,
        _cx: &MeasureContext<'_>,
        width_spec: MeasureSpec,
        height_spec: MeasureSpec,
        out: &mut Measurement,
    ) -> Result<(), EtchError> {
        out.set_measured_dimension(width_spec.size(), height_spec.size());
        Ok(())
    }

    /// Runs after `bounds` has been recorded. Composites place their
    /// children here.
    fn on_layout(&mut self, _bounds: Bounds) -> Result<(), EtchError> {
        Ok(())
    }

    /// Paints the node's own content in its local coordinates. Never
    /// recurses into children.
    fn draw(&self, _canvas: &mut dyn Canvas) -> Result<(), EtchError> {
        Ok(())
    }

    fn group(&self) -> Option<&ViewGroup> {
        None
    }

    fn group_mut(&mut self) -> Option<&mut ViewGroup> {
        None
    }

    fn children(&self) -> &[Box<dyn View>] {
        match self.group() {
            Some(group) => group.children(),
            None => &[],
        }
    }

    /// Layout params variant this node requires of its children, if it can
    /// hold any.
    fn child_params_kind(&self) -> Option<LayoutParamsKind> {
        self.group().map(|group| group.child_params_kind())
    }

    /// Kind-specific markup attributes. `Ok(false)` means not recognized.
    fn set_attribute(&mut self, _key: &str, _value: &str) -> Result<bool, EtchError> {
        Ok(false)
    }
}

/// Template steps shared by every [`View`].
pub trait ViewExt {
    fn measure(
        &mut self,
        cx: &MeasureContext<'_>,
        width_spec: MeasureSpec,
        height_spec: MeasureSpec,
    ) -> Result<MeasuredSize, EtchError>;
    fn layout(&mut self, left: i32, top: i32, right: i32, bottom: i32) -> Result<(), EtchError>;
    fn measured_width(&self) -> i32;
    fn measured_height(&self) -> i32;
    fn bounds(&self) -> Bounds;
    fn layout_params(&self) -> &LayoutParams;
}

impl<T: View + ?Sized> ViewExt for T {
    fn measure(
        &mut self,
        cx: &MeasureContext<'_>,
        width_spec: MeasureSpec,
        height_spec: MeasureSpec,
    ) -> Result<MeasuredSize, EtchError> {
        let mut out = Measurement::default();
        self.on_measure(cx, width_spec, height_spec, &mut out)?;
        let Some(size) = out.get() else {
            return Err(EtchError::ContractViolation(format!(
                "{}::on_measure did not set the measured dimension ({:?}, {:?})",
                self.type_name(),
                width_spec,
                height_spec
            )));
        };
        let core = self.core_mut();
        core.measured = size;
        core.state = ViewState::Measured;
        Ok(size)
    }

    fn layout(&mut self, left: i32, top: i32, right: i32, bottom: i32) -> Result<(), EtchError> {
        let bounds = Bounds::new(left, top, right, bottom);
        let core = self.core_mut();
        if let Some(background) = core.background.as_mut() {
            background.set_bounds(RectF::from_size(
                bounds.width() as f32,
                bounds.height() as f32,
            )?);
        }
        core.bounds = bounds;
        core.state = ViewState::Placed;
        self.on_layout(bounds)
    }

    fn measured_width(&self) -> i32 {
        self.core().measured.width
    }

    fn measured_height(&self) -> i32 {
        self.core().measured.height
    }

    fn bounds(&self) -> Bounds {
        self.core().bounds
    }

    fn layout_params(&self) -> &LayoutParams {
        &self.core().layout_params
    }
}

/// The plain leaf node: occupies whatever it is offered and paints only its
/// background.
#[derive(Debug, Default)]
pub struct PlainView {
    core: ViewCore,
}

impl PlainView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: LayoutParams) -> Self {
        Self {
            core: ViewCore::with_params(params),
        }
    }
}

impl View for PlainView {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "View"
    }
}
