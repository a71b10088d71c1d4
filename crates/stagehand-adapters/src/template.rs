//! String-template style adapter.
//!
//! The template is a function from data to [`Markup`].  Every render and
//! every sync builds a fresh element and drops the previous one, so listeners
//! must be bound again after each sync.

use serde_json::Value;
use stagehand_core::adapter::{Adapter, AdapterFuture, Template};
use stagehand_core::dom::{Element, Markup};
use stagehand_core::error::AdapterError;
use stagehand_core::view::View;
use std::rc::Rc;

/// Template payload understood by [`TemplateAdapter`].
#[derive(Clone)]
pub struct MarkupTemplate(Rc<dyn Fn(&Value) -> Markup>);

impl MarkupTemplate {
    /// Wrap a render function.
    pub fn new(f: impl Fn(&Value) -> Markup + 'static) -> Self {
        MarkupTemplate(Rc::new(f))
    }

    /// Produce markup for `data`.
    pub fn render(&self, data: &Value) -> Markup {
        (self.0)(data)
    }
}

/// Shorthand for `Template::new(MarkupTemplate::new(f))`.
///
/// ```rust,ignore
/// let greeting = template(|data| {
///     Markup::element("p").content(format!("Hello {}", data["name"].as_str().unwrap_or("you")))
/// });
/// ```
pub fn template(f: impl Fn(&Value) -> Markup + 'static) -> Template {
    Template::new(MarkupTemplate::new(f))
}

/// Adapter registered as `"template"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateAdapter;

impl TemplateAdapter {
    /// Registry name.
    pub const NAME: &'static str = "template";

    fn build(view: &View, data: &Value) -> Result<Element, AdapterError> {
        let template = view
            .template()
            .downcast_ref::<MarkupTemplate>()
            .ok_or(AdapterError::TemplateMismatch {
                expected: "MarkupTemplate",
            })?;
        let holder = view.holder()?;
        Ok(holder.append_markup(&template.render(data)))
    }
}

impl Adapter for TemplateAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn render(
        &self,
        view: &View,
        data: &Value,
        existing: Option<Element>,
    ) -> Result<Element, AdapterError> {
        if let Some(existing) = existing {
            existing.destroy();
        }
        Self::build(view, data)
    }

    fn sync(&self, view: &View, data: &Value) -> AdapterFuture {
        let display = view.element().and_then(|old| old.style("display"));
        self.remove(view);
        let result = Self::build(view, data).map(|element| {
            if let Some(display) = display {
                element.set_style("display", display);
            }
            element
        });
        Box::pin(futures::future::ready(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stagehand_core::dom::Document;
    use stagehand_core::registry::Registry;
    use stagehand_core::view::ViewOptions;

    fn greeting() -> Template {
        template(|data| {
            Markup::element("p")
                .class("greeting")
                .content(format!("Hello {}", data["name"].as_str().unwrap_or("you")))
        })
    }

    fn view_with(template: Template) -> (Rc<Registry>, View) {
        let registry = Registry::new(Document::new());
        registry.register_adapter(Rc::new(TemplateAdapter)).unwrap();
        let view = registry
            .create_view(ViewOptions::new("greeting").template(template).adapter("template"))
            .unwrap();
        (registry, view)
    }

    #[tokio::test]
    async fn render_appends_built_markup() {
        let (registry, view) = view_with(greeting());
        view.render(json!({"name": "Ada"})).await.unwrap();
        let element = view.element().unwrap();
        assert_eq!(element.text(), "Hello Ada");
        assert_eq!(element.parent(), Some(registry.document().body()));
    }

    #[tokio::test]
    async fn sync_replaces_element_and_keeps_display() {
        let (registry, view) = view_with(greeting());
        view.render(json!({"name": "Ada"})).await.unwrap();
        let first = view.element().unwrap();
        view.hide();

        view.sync(json!({"name": "Grace"})).await.unwrap();

        let second = view.element().unwrap();
        assert_ne!(first, second);
        assert!(!first.is_connected());
        assert_eq!(second.text(), "Hello Grace");
        assert!(second.is_hidden());
        assert_eq!(registry.document().body().children(), vec![second]);
    }

    #[tokio::test]
    async fn repeated_syncs_do_not_grow_the_document() {
        let (registry, view) = view_with(greeting());
        view.render(json!({"name": "Ada"})).await.unwrap();
        let nodes = registry.document().node_count();

        for i in 0..200 {
            view.sync(json!({"name": format!("visitor {i}")})).await.unwrap();
        }

        assert_eq!(registry.document().node_count(), nodes);
        assert_eq!(view.element().unwrap().text(), "Hello visitor 199");
    }

    #[tokio::test]
    async fn pre_rendered_element_is_replaced() {
        let registry = Registry::new(Document::new());
        registry.register_adapter(Rc::new(TemplateAdapter)).unwrap();
        let stale = registry
            .document()
            .body()
            .append_markup(&Markup::element("p").content("stale"));
        let view = registry
            .create_view(
                ViewOptions::new("greeting")
                    .template(greeting())
                    .adapter("template")
                    .element(stale.clone()),
            )
            .unwrap();

        view.render(json!({})).await.unwrap();

        assert!(!stale.is_connected());
        assert_eq!(view.element().unwrap().text(), "Hello you");
    }

    #[tokio::test]
    async fn wrong_payload_is_an_adapter_error() {
        let (_, view) = view_with(Template::new(42u8));
        let err = view.render(json!({})).await.err();
        assert!(matches!(
            err,
            Some(stagehand_core::Error::Adapter {
                source: AdapterError::TemplateMismatch { .. },
                ..
            })
        ));
    }
}
