use crate::error::EtchError;
use crate::layout_params::{LayoutParams, LayoutParamsKind, Margins};
use crate::measure_spec::MeasureSpec;
use crate::view::{
    Bounds, MeasureContext, MeasuredSize, Measurement, View, ViewCore, ViewExt,
};
use crate::view_group::ViewGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

impl Orientation {
    pub fn parse(value: &str) -> Option<Orientation> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vertical" => Some(Orientation::Vertical),
            "horizontal" => Some(Orientation::Horizontal),
            _ => None,
        }
    }

    /// Splits a (width, height) pair into (main, cross).
    fn split<T>(self, width: T, height: T) -> (T, T) {
        match self {
            Orientation::Vertical => (height, width),
            Orientation::Horizontal => (width, height),
        }
    }

    /// Inverse of [`Orientation::split`].
    fn join<T>(self, main: T, cross: T) -> (T, T) {
        match self {
            Orientation::Vertical => (cross, main),
            Orientation::Horizontal => (main, cross),
        }
    }

    fn main_size(self, size: MeasuredSize) -> i32 {
        self.split(size.width, size.height).0
    }

    fn cross_size(self, size: MeasuredSize) -> i32 {
        self.split(size.width, size.height).1
    }

    /// (main, cross) margin totals.
    fn margin_totals(self, margins: &Margins) -> (i32, i32) {
        self.split(margins.horizontal(), margins.vertical())
    }
}

/// Stacks children along one axis and shares leftover or missing main-axis
/// space among children with a positive weight.
///
/// Children carry [`LayoutParams::Stack`].
#[derive(Debug)]
pub struct LinearLayout {
    group: ViewGroup,
    orientation: Orientation,
}

impl Default for LinearLayout {
    fn default() -> Self {
        Self::new(Orientation::default())
    }
}

impl LinearLayout {
    pub const CHILD_PARAMS: LayoutParamsKind = LayoutParamsKind::Stack;

    pub fn new(orientation: Orientation) -> Self {
        Self {
            group: ViewGroup::with_child_params(Self::CHILD_PARAMS),
            orientation,
        }
    }

    pub fn vertical() -> Self {
        Self::new(Orientation::Vertical)
    }

    pub fn horizontal() -> Self {
        Self::new(Orientation::Horizontal)
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.orientation = orientation;
    }

    pub fn as_group(&self) -> &ViewGroup {
        &self.group
    }

    pub fn as_group_mut(&mut self) -> &mut ViewGroup {
        &mut self.group
    }

    pub fn add_child(&mut self, child: Box<dyn View>) {
        self.group.add_child(child);
    }

    pub fn add_child_with_params(
        &mut self,
        child: Box<dyn View>,
        params: LayoutParams,
    ) -> Result<(), EtchError> {
        self.group.add_child_with_params(child, params)
    }

    pub fn child_at(&self, index: usize) -> Result<&dyn View, EtchError> {
        self.group.child_at(index)
    }
}

fn stack_params(child: &dyn View) -> Result<(Margins, u32), EtchError> {
    match *child.layout_params() {
        LayoutParams::Stack {
            margins, weight, ..
        } => Ok((margins, weight)),
        other => Err(EtchError::UnsupportedLayoutParams {
            expected: LayoutParamsKind::Stack,
            found: other.kind(),
        }),
    }
}

/// Main-axis targets for the weighted children, given as `(weight, natural)`
/// in child order. Each child takes `weight * remaining_slack / remaining_weight`
/// (truncated), so the last one absorbs the rounding. A child whose share would
/// take it below zero is pinned at zero and the pass restarts with the rest of
/// the slack spread over the others.
fn distribute_slack(natural: &[(u32, i64)], slack: i64) -> Vec<i64> {
    let mut pinned = vec![false; natural.len()];
    let mut targets = vec![0i64; natural.len()];
    'pass: loop {
        let mut remaining_slack = slack as i128;
        let mut remaining_weight: i128 = 0;
        for (index, &(weight, size)) in natural.iter().enumerate() {
            if pinned[index] {
                remaining_slack += size as i128;
            } else {
                remaining_weight += weight as i128;
            }
        }
        for (index, &(weight, size)) in natural.iter().enumerate() {
            if pinned[index] {
                targets[index] = 0;
                continue;
            }
            let share = weight as i128 * remaining_slack / remaining_weight;
            remaining_slack -= share;
            remaining_weight -= weight as i128;
            let target = size as i128 + share;
            if target < 0 {
                pinned[index] = true;
                continue 'pass;
            }
            targets[index] = target.min(i64::MAX as i128) as i64;
        }
        return targets;
    }
}

fn clamp_size(value: i64) -> i32 {
    value.clamp(0, MeasureSpec::MAX_SIZE as i64) as i32
}

impl View for LinearLayout {
    fn core(&self) -> &ViewCore {
        self.group.core()
    }

    fn core_mut(&mut self) -> &mut ViewCore {
        self.group.core_mut()
    }

    fn type_name(&self) -> &'static str {
        "LinearLayout"
    }

    fn on_measure(
        &mut self,
        cx: &MeasureContext<'_>,
        width_spec: MeasureSpec,
        height_spec: MeasureSpec,
        out: &mut Measurement,
    ) -> Result<(), EtchError> {
        let orientation = self.orientation;
        let (main_spec, cross_spec) = orientation.split(width_spec, height_spec);
        // Own margins are not subtracted here; the parent's spec already excludes them.
        let available_main = main_spec.size();
        let available_cross = cross_spec.size();

        let mut total_weight: u64 = 0;
        let mut total_main: i64 = 0;
        let mut max_cross: i32 = 0;

        for child in self.group.children_mut() {
            let (margins, weight) = stack_params(&**child)?;
            let (margin_main, margin_cross) = orientation.margin_totals(&margins);
            let (w, h) = orientation.join(
                MeasureSpec::at_most(available_main.saturating_sub(margin_main)),
                MeasureSpec::at_most(available_cross.saturating_sub(margin_cross)),
            );
            let size = child.measure(cx, w, h)?;
            total_weight += weight as u64;
            total_main += orientation.main_size(size) as i64;
            max_cross = max_cross.max(orientation.cross_size(size).saturating_add(margin_cross));
        }

        let slack = available_main as i64 - total_main;
        let main_size = if slack != 0 && total_weight > 0 {
            log::debug!(
                "{:?} LinearLayout redistributing {} over weight {}",
                orientation,
                slack,
                total_weight
            );
            let mut natural = Vec::new();
            for child in self.group.children() {
                let (_, weight) = stack_params(&**child)?;
                if weight > 0 {
                    natural.push((weight, orientation.main_size(child.core().measured()) as i64));
                }
            }
            let mut targets = distribute_slack(&natural, slack).into_iter();
            for child in self.group.children_mut() {
                let (margins, weight) = stack_params(&**child)?;
                if weight == 0 {
                    continue;
                }
                let Some(target) = targets.next() else {
                    break;
                };
                let (_, margin_cross) = orientation.margin_totals(&margins);
                let (w, h) = orientation.join(
                    MeasureSpec::exactly(clamp_size(target)),
                    MeasureSpec::at_most(available_cross.saturating_sub(margin_cross)),
                );
                let size = child.measure(cx, w, h)?;
                max_cross =
                    max_cross.max(orientation.cross_size(size).saturating_add(margin_cross));
            }
            available_main
        } else {
            clamp_size(total_main)
        };

        let (width, height) = orientation.join(main_size, max_cross);
        out.set_measured_dimension(width, height);
        Ok(())
    }

    fn on_layout(&mut self, bounds: Bounds) -> Result<(), EtchError> {
        let orientation = self.orientation;
        let mut child_left = bounds.left;
        let mut child_top = bounds.top;
        for child in self.group.children_mut() {
            let (margins, _) = stack_params(&**child)?;
            let size = child.core().measured();
            let left = child_left.saturating_add(margins.left as i32);
            let top = child_top.saturating_add(margins.top as i32);
            child.layout(
                left,
                top,
                left.saturating_add(size.width),
                top.saturating_add(size.height),
            )?;
            match orientation {
                Orientation::Vertical => {
                    child_top = child_top
                        .saturating_add(size.height)
                        .saturating_add(margins.vertical());
                }
                Orientation::Horizontal => {
                    child_left = child_left
                        .saturating_add(size.width)
                        .saturating_add(margins.horizontal());
                }
            }
        }
        Ok(())
    }

    fn group(&self) -> Option<&ViewGroup> {
        Some(&self.group)
    }

    fn group_mut(&mut self) -> Option<&mut ViewGroup> {
        Some(&mut self.group)
    }

    fn set_attribute(&mut self, key: &str, value: &str) -> Result<bool, EtchError> {
        match key {
            "orientation" => {
                self.orientation = Orientation::parse(value).ok_or_else(|| {
                    EtchError::Markup(format!("invalid orientation {value:?}"))
                })?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
