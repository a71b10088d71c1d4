//! Component style adapter.
//!
//! The template is a [`Component`]: something that turns data into
//! [`Markup`] and may hook into mounting.  Re-rendering patches the existing
//! root in place when the root tag is unchanged, so the view keeps the same
//! element across syncs.  Components own their event handling, so view-level
//! event binding is switched off for this adapter.

use serde_json::Value;
use stagehand_core::adapter::{Adapter, AdapterFuture, Template};
use stagehand_core::dom::{Element, Markup};
use stagehand_core::error::AdapterError;
use stagehand_core::view::View;
use std::rc::Rc;

/// A renderable component.
pub trait Component {
    /// Describe the component for `data`.  Must return an element, not text.
    fn render(&self, data: &Value) -> Markup;

    /// Called once after the root element is attached.
    fn mounted(&self, _root: &Element) {}

    /// Called when the view removes the component.
    fn unmounted(&self, _root: &Element) {}
}

#[derive(Clone)]
struct ComponentTemplate(Rc<dyn Component>);

/// Wrap a component as a view template.
pub fn component(component: impl Component + 'static) -> Template {
    Template::new(ComponentTemplate(Rc::new(component)))
}

/// Adapter registered as `"component"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComponentAdapter;

impl ComponentAdapter {
    /// Registry name.
    pub const NAME: &'static str = "component";

    fn component(view: &View) -> Result<Rc<dyn Component>, AdapterError> {
        view.template()
            .downcast_ref::<ComponentTemplate>()
            .map(|template| template.0.clone())
            .ok_or(AdapterError::TemplateMismatch {
                expected: "component",
            })
    }

    /// Render into `current` if its tag matches, otherwise build a new root
    /// under the holder.  Returns the root and whether it is new.
    fn reconcile(
        view: &View,
        component: &dyn Component,
        data: &Value,
        current: Option<Element>,
    ) -> Result<(Element, bool), AdapterError> {
        let markup = component.render(data);
        let Markup::Element { tag, .. } = &markup else {
            return Err(AdapterError::Failed(
                "component must render an element".to_string(),
            ));
        };

        match current {
            Some(root) if root.tag() == *tag => {
                patch(&root, &markup);
                if !root.is_connected() {
                    view.holder()?.append_child(&root);
                }
                Ok((root, false))
            }
            stale => {
                let display = stale.as_ref().and_then(|old| old.style("display"));
                if let Some(old) = stale {
                    old.destroy();
                }
                let root = view.holder()?.append_markup(&markup);
                if let Some(display) = display {
                    root.set_style("display", display);
                }
                Ok((root, true))
            }
        }
    }
}

/// Replace `root`'s attributes and children with those of `markup`, keeping
/// its inline `display`.
fn patch(root: &Element, markup: &Markup) {
    let Markup::Element {
        attrs, children, ..
    } = markup
    else {
        return;
    };
    let display = root.style("display");
    root.clear_attrs();
    for (name, value) in attrs {
        root.set_attr(name, value.clone());
    }
    if let Some(display) = display {
        root.set_style("display", display);
    }
    root.clear_children();
    for child in children {
        match child {
            Markup::Text(text) => root.append_text(text.clone()),
            Markup::Element { .. } => {
                root.append_markup(child);
            }
        }
    }
}

impl Adapter for ComponentAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn render(
        &self,
        view: &View,
        data: &Value,
        existing: Option<Element>,
    ) -> Result<Element, AdapterError> {
        let component = Self::component(view)?;
        let (root, _) = Self::reconcile(view, component.as_ref(), data, existing)?;
        component.mounted(&root);
        Ok(root)
    }

    fn sync(&self, view: &View, data: &Value) -> AdapterFuture {
        let result = Self::component(view).and_then(|component| {
            let (root, fresh) = Self::reconcile(view, component.as_ref(), data, view.element())?;
            if fresh {
                component.mounted(&root);
            }
            Ok(root)
        });
        Box::pin(futures::future::ready(result))
    }

    fn remove(&self, view: &View) {
        let Some(root) = view.element() else {
            return;
        };
        if let Ok(component) = Self::component(view) {
            component.unmounted(&root);
        }
        root.destroy();
    }

    fn events(&self) -> bool {
        false
    }

    fn rebind_events_after_sync(&self) -> bool {
        false
    }
}
