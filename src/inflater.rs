use std::collections::HashMap;

use crate::error::EtchError;
use crate::layout_params::{LayoutParams, LayoutParamsKind};
use crate::linear_layout::LinearLayout;
use crate::surface_view::SurfaceView;
use crate::text_view::TextView;
use crate::view::{PlainView, View};
use crate::view_group::ViewGroup;

pub type ViewFactory = Box<dyn Fn() -> Box<dyn View> + Send + Sync>;

/// Builds view trees from XML markup.
///
/// Each element names a registered view kind. Attributes are offered to the
/// shared node state, then to the view kind, then to the layout params its
/// parent gave it; attributes nobody recognizes are logged and ignored.
/// Non-blank text inside an element is applied as its `text` attribute.
pub struct Inflater {
    factories: HashMap<String, ViewFactory>,
}

impl Default for Inflater {
    fn default() -> Self {
        let mut inflater = Self {
            factories: HashMap::new(),
        };
        inflater.register("View", || Box::new(PlainView::new()));
        inflater.register("ViewGroup", || Box::new(ViewGroup::new()));
        inflater.register("LinearLayout", || Box::new(LinearLayout::default()));
        inflater.register("TextView", || Box::new(TextView::default()));
        inflater.register("SurfaceView", || Box::new(SurfaceView::new()));
        inflater
    }
}

impl Inflater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `tag` to `factory`, replacing any earlier registration.
    pub fn register<F>(&mut self, tag: &str, factory: F)
    where
        F: Fn() -> Box<dyn View> + Send + Sync + 'static,
    {
        self.factories.insert(tag.to_string(), Box::new(factory));
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn inflate(&self, markup: &str) -> Result<Box<dyn View>, EtchError> {
        let doc = roxmltree::Document::parse(markup)
            .map_err(|e| EtchError::Markup(format!("malformed markup: {e}")))?;
        self.build(&doc, doc.root_element(), None)
    }

    fn build(
        &self,
        doc: &roxmltree::Document<'_>,
        node: roxmltree::Node<'_, '_>,
        parent_kind: Option<LayoutParamsKind>,
    ) -> Result<Box<dyn View>, EtchError> {
        let tag = node.tag_name().name();
        let line = doc.text_pos_at(node.range().start).row;
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| EtchError::Markup(format!("line {line}: unknown view <{tag}>")))?;
        let mut view = factory();
        if let Some(kind) = parent_kind {
            view.core_mut().set_layout_params(LayoutParams::for_kind(kind));
        }

        for attr in node.attributes() {
            apply_attribute(&mut *view, attr.name(), attr.value())
                .map_err(|e| EtchError::Markup(format!("line {line}: <{tag}>: {e}")))?;
        }

        let text: String = node
            .children()
            .filter(|child| child.is_text())
            .filter_map(|child| child.text())
            .collect();
        let text = text.trim();
        if !text.is_empty() && !view.set_attribute("text", text)? {
            log::warn!("line {line}: <{tag}> ignores text content");
        }

        let elements: Vec<roxmltree::Node<'_, '_>> =
            node.children().filter(|child| child.is_element()).collect();
        if elements.is_empty() {
            return Ok(view);
        }
        let child_kind = view.child_params_kind().ok_or_else(|| {
            EtchError::Markup(format!("line {line}: <{tag}> cannot hold child views"))
        })?;
        for element in elements {
            let child = self.build(doc, element, Some(child_kind))?;
            if let Some(group) = view.group_mut() {
                group.add_child(child);
            }
        }
        Ok(view)
    }
}

fn apply_attribute(view: &mut dyn View, key: &str, value: &str) -> Result<(), EtchError> {
    if view.core_mut().set_attribute(key, value)? {
        return Ok(());
    }
    if view.set_attribute(key, value)? {
        return Ok(());
    }
    if view.core_mut().layout_params_mut().set_attribute(key, value)? {
        return Ok(());
    }
    log::warn!(
        "ignoring attribute {key:?} on {} ({} layout params)",
        view.type_name(),
        view.core().layout_params().kind().name()
    );
    Ok(())
}
