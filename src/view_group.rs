use crate::error::EtchError;
use crate::layout_params::{LayoutParams, LayoutParamsKind};
use crate::measure_spec::{MeasureMode, MeasureSpec};
use crate::view::{Bounds, MeasureContext, Measurement, View, ViewCore, ViewExt};

/// A node that owns an ordered list of children.
///
/// On its own it offers each child the space left after the child's
/// margins and stacks every child at its margin offset from the group's
/// top-left corner. Other containers embed it for child bookkeeping and
/// replace the sizing and placement logic.
#[derive(Debug)]
pub struct ViewGroup {
    core: ViewCore,
    children: Vec<Box<dyn View>>,
    child_params_kind: LayoutParamsKind,
}

impl Default for ViewGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewGroup {
    pub fn new() -> Self {
        Self::with_child_params(LayoutParamsKind::Margin)
    }

    /// Group whose children must carry `kind` params.
    pub fn with_child_params(child_params_kind: LayoutParamsKind) -> Self {
        Self {
            core: ViewCore::new(),
            children: Vec::new(),
            child_params_kind,
        }
    }

    pub fn child_params_kind(&self) -> LayoutParamsKind {
        self.child_params_kind
    }

    /// Appends `child`, rebuilding its params as the variant this group
    /// requires.
    pub fn add_child(&mut self, mut child: Box<dyn View>) {
        let params = child.layout_params().convert_to(self.child_params_kind);
        child.core_mut().set_layout_params(params);
        self.children.push(child);
    }

    /// Appends `child` with explicit params, which must satisfy the variant
    /// this group requires.
    pub fn add_child_with_params(
        &mut self,
        mut child: Box<dyn View>,
        params: LayoutParams,
    ) -> Result<(), EtchError> {
        self.check_params(&params)?;
        child.core_mut().set_layout_params(params);
        self.children.push(child);
        Ok(())
    }

    pub(crate) fn check_params(&self, params: &LayoutParams) -> Result<(), EtchError> {
        if params.kind().satisfies(self.child_params_kind) {
            Ok(())
        } else {
            Err(EtchError::UnsupportedLayoutParams {
                expected: self.child_params_kind,
                found: params.kind(),
            })
        }
    }

    pub fn remove_child_at(&mut self, index: usize) -> Result<Box<dyn View>, EtchError> {
        if index >= self.children.len() {
            return Err(EtchError::IndexOutOfRange {
                index,
                len: self.children.len(),
            });
        }
        Ok(self.children.remove(index))
    }

    pub fn remove_all(&mut self) {
        self.children.clear();
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child_at(&self, index: usize) -> Result<&dyn View, EtchError> {
        let len = self.children.len();
        self.children
            .get(index)
            .map(|child| child.as_ref())
            .ok_or(EtchError::IndexOutOfRange { index, len })
    }

    pub fn child_at_mut(&mut self, index: usize) -> Result<&mut Box<dyn View>, EtchError> {
        let len = self.children.len();
        self.children
            .get_mut(index)
            .ok_or(EtchError::IndexOutOfRange { index, len })
    }

    pub fn children(&self) -> &[Box<dyn View>] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [Box<dyn View>] {
        &mut self.children
    }
}

/// Measure spec for a child axis: the parent's size minus the child's margins,
/// bounded unless the parent itself is unbounded.
pub(crate) fn child_spec(parent: MeasureSpec, margins: i32) -> MeasureSpec {
    let size = parent.size().saturating_sub(margins);
    match parent.mode() {
        MeasureMode::Unspecified => MeasureSpec::unspecified(size),
        MeasureMode::Exactly | MeasureMode::AtMost => MeasureSpec::at_most(size),
    }
}

impl View for ViewGroup {
    fn core(&self) -> &ViewCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    fn type_name(&self) -> &'static str {
        "ViewGroup"
    }

    fn on_measure(
        &mut self,
        cx: &MeasureContext<'_>,
        width_spec: MeasureSpec,
        height_spec: MeasureSpec,
        out: &mut Measurement,
    ) -> Result<(), EtchError> {
        for child in &mut self.children {
            let margins = child.layout_params().margins();
            child.measure(
                cx,
                child_spec(width_spec, margins.horizontal()),
                child_spec(height_spec, margins.vertical()),
            )?;
        }
        out.set_measured_dimension(width_spec.size(), height_spec.size());
        Ok(())
    }

    fn on_layout(&mut self, bounds: Bounds) -> Result<(), EtchError> {
        for child in &mut self.children {
            let margins = child.layout_params().margins();
            let left = bounds.left.saturating_add(margins.left as i32);
            let top = bounds.top.saturating_add(margins.top as i32);
            let size = child.core().measured();
            child.layout(
                left,
                top,
                left.saturating_add(size.width),
                top.saturating_add(size.height),
            )?;
        }
        Ok(())
    }

    fn group(&self) -> Option<&ViewGroup> {
        Some(self)
    }

    fn group_mut(&mut self) -> Option<&mut ViewGroup> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout_params::{Dimension, Margins};
    use crate::view::{MeasuredSize, PlainView};

    fn leaf(id: &str) -> Box<dyn View> {
        let mut view = PlainView::new();
        view.core_mut().set_id(id);
        Box::new(view)
    }

    fn ids(group: &ViewGroup) -> Vec<&str> {
        group
            .children()
            .iter()
            .map(|child| child.core().id().unwrap_or(""))
            .collect()
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut group = ViewGroup::new();
        group.add_child(leaf("a"));
        group.add_child(leaf("b"));
        group.add_child(leaf("c"));
        assert_eq!(group.child_count(), 3);
        assert_eq!(ids(&group), ["a", "b", "c"]);

        let removed = group.remove_child_at(1).unwrap();
        assert_eq!(removed.core().id(), Some("b"));
        assert_eq!(ids(&group), ["a", "c"]);
        assert_eq!(group.child_at(1).unwrap().core().id(), Some("c"));

        group.remove_all();
        assert_eq!(group.child_count(), 0);
    }

    #[test]
    fn bad_index_is_reported() {
        let mut group = ViewGroup::new();
        group.add_child(leaf("a"));
        assert!(matches!(
            group.remove_child_at(1),
            Err(EtchError::IndexOutOfRange { index: 1, len: 1 })
        ));
        assert!(matches!(
            group.child_at(5),
            Err(EtchError::IndexOutOfRange { index: 5, len: 1 })
        ));
        assert!(group.child_at_mut(1).is_err());
        assert_eq!(group.child_count(), 1);
    }

    #[test]
    fn attached_children_get_the_required_params_variant() {
        let mut group = ViewGroup::with_child_params(LayoutParamsKind::Stack);
        group.add_child(leaf("a"));
        assert_eq!(
            group.child_at(0).unwrap().layout_params().kind(),
            LayoutParamsKind::Stack
        );
        assert_eq!(group.child_params_kind(), LayoutParamsKind::Stack);
        assert_eq!(
            View::child_params_kind(&group),
            Some(LayoutParamsKind::Stack)
        );
    }

    #[test]
    fn explicit_params_must_satisfy_the_group() {
        let mut group = ViewGroup::with_child_params(LayoutParamsKind::Stack);
        let err = group
            .add_child_with_params(leaf("a"), LayoutParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            EtchError::UnsupportedLayoutParams {
                expected: LayoutParamsKind::Stack,
                found: LayoutParamsKind::Plain,
            }
        ));
        assert_eq!(group.child_count(), 0);

        let mut margin_group = ViewGroup::new();
        let stack = LayoutParams::stack(Dimension::WrapContent, Dimension::WrapContent, 2);
        margin_group.add_child_with_params(leaf("b"), stack).unwrap();
        assert_eq!(margin_group.child_at(0).unwrap().layout_params().weight(), 2);
    }

    #[test]
    fn measure_offers_children_space_minus_margins() {
        let cx = MeasureContext::builtin();
        let mut group = ViewGroup::new();
        let params = LayoutParams::margin(
            Dimension::WrapContent,
            Dimension::WrapContent,
            Margins {
                top: 1,
                bottom: 2,
                left: 3,
                right: 4,
            },
        );
        group.add_child_with_params(leaf("a"), params).unwrap();

        let size = group
            .measure(&cx, MeasureSpec::exactly(100), MeasureSpec::at_most(50))
            .unwrap();
        assert_eq!(size, MeasuredSize { width: 100, height: 50 });
        let child = group.child_at(0).unwrap();
        assert_eq!(child.measured_width(), 93);
        assert_eq!(child.measured_height(), 47);

        group.layout(10, 20, 110, 70).unwrap();
        let child = group.child_at(0).unwrap();
        assert_eq!(child.bounds(), Bounds::new(13, 21, 106, 68));
    }

    #[test]
    fn unbounded_parent_stays_unbounded() {
        let spec = child_spec(MeasureSpec::unspecified(0), 10);
        assert_eq!(spec.mode(), MeasureMode::Unspecified);
        assert_eq!(spec.size(), 0);
        assert_eq!(child_spec(MeasureSpec::exactly(30), 10), MeasureSpec::at_most(20));
    }
}
