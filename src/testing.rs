//! Fixtures shared by the unit tests.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::EtchError;
use crate::layout_params::LayoutParams;
use crate::measure_spec::{MeasureMode, MeasureSpec};
use crate::view::{MeasureContext, MeasuredSize, Measurement, View, ViewCore};

/// Leaf with a natural size that honors the measure modes the usual way:
/// EXACTLY takes the measure spec size, AT_MOST caps the natural size, UNSPECIFIED takes
/// it as is.
#[derive(Debug)]
pub(crate) struct FixedView {
    core: ViewCore,
    natural: MeasuredSize,
    measure_calls: Rc<Cell<usize>>,
}

impl FixedView {
    pub(crate) fn new(width: i32, height: i32) -> Self {
        Self {
            core: ViewCore::new(),
            natural: MeasuredSize { width, height },
            measure_calls: Rc::new(Cell::new(0)),
        }
    }

    pub(crate) fn with_params(width: i32, height: i32, params: LayoutParams) -> Self {
        let mut view = Self::new(width, height);
        view.core.set_layout_params(params);
        view
    }

    pub(crate) fn id(mut self, id: &str) -> Self {
        self.core.set_id(id);
        self
    }

    /// Shared counter of `on_measure` calls, readable after the view has
    /// been moved into a container.
    pub(crate) fn measure_calls(&self) -> Rc<Cell<usize>> {
        self.measure_calls.clone()
    }
}

fn resolve(natural: i32, spec: MeasureSpec) -> i32 {
    match spec.mode() {
        MeasureMode::Exactly => spec.size(),
        MeasureMode::AtMost => natural.min(spec.size()),
        MeasureMode::Unspecified => natural,
    }
}

impl View for FixedView {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "FixedView"
    }

    fn on_measure(
        &mut self,
        _cx: &MeasureContext<'_>,
        width_spec: MeasureSpec,
        height_spec: MeasureSpec,
        out: &mut Measurement,
    ) -> Result<(), EtchError> {
        self.measure_calls.set(self.measure_calls.get() + 1);
        out.set_measured_dimension(
            resolve(self.natural.width, width_spec),
            resolve(self.natural.height, height_spec),
        );
        Ok(())
    }
}
