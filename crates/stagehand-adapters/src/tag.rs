//! Custom-tag style adapter.
//!
//! Tags are defined once in a [`TagLibrary`] and referenced from a view's
//! template by name.  Rendering mounts the tag into a `<name>` element (an
//! existing one when the view was pre-rendered) and keeps a [`TagInstance`]
//! in the view's adapter state; syncing updates that instance; removing
//! unmounts it.

use serde_json::Value;
use stagehand_core::adapter::{Adapter, AdapterFuture};
use stagehand_core::data;
use stagehand_core::dom::{Element, Markup};
use stagehand_core::error::AdapterError;
use stagehand_core::view::View;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

type TagRender = Rc<dyn Fn(&Value) -> Vec<Markup>>;

/// Named tag definitions.
#[derive(Clone, Default)]
pub struct TagLibrary {
    tags: HashMap<String, TagRender>,
}

impl TagLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define tag `name`.  `render` produces the tag's inner content from its
    /// options.  Redefining a name replaces it.
    pub fn define(
        mut self,
        name: impl Into<String>,
        render: impl Fn(&Value) -> Vec<Markup> + 'static,
    ) -> Self {
        self.tags.insert(name.into(), Rc::new(render));
        self
    }

    /// Whether `name` is defined.
    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<TagRender> {
        self.tags.get(name).cloned()
    }
}

impl fmt::Debug for TagLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.tags.keys().collect();
        names.sort();
        f.debug_struct("TagLibrary").field("tags", &names).finish()
    }
}

/// A mounted tag.
pub struct TagInstance {
    name: String,
    root: Element,
    opts: data::Data,
    render: TagRender,
}

impl TagInstance {
    /// Tag name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `<name>` element the tag is mounted on.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Current options.
    pub fn opts(&self) -> Value {
        Value::Object(self.opts.clone())
    }

    /// Merge `data` into the options and redraw the content.
    pub fn update(&mut self, data: &Value) {
        if let Value::Object(incoming) = data {
            data::merge(&mut self.opts, incoming);
        }
        self.root.clear_children();
        for markup in (self.render)(&Value::Object(self.opts.clone())) {
            match markup {
                Markup::Text(text) => self.root.append_text(text),
                element => {
                    self.root.append_markup(&element);
                }
            }
        }
    }

    fn unmount(self) {
        self.root.destroy();
    }
}

/// Adapter registered as `"tag"`.
///
/// The view's template must be the tag name, as a `String` or a
/// `&'static str`.
#[derive(Debug, Clone)]
pub struct TagAdapter {
    library: Rc<TagLibrary>,
}

impl TagAdapter {
    /// Registry name.
    pub const NAME: &'static str = "tag";

    /// An adapter over `library`.
    pub fn new(library: TagLibrary) -> Self {
        Self {
            library: Rc::new(library),
        }
    }

    fn tag_name(view: &View) -> Result<String, AdapterError> {
        let template = view.template();
        template
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| template.downcast_ref::<&'static str>().map(|s| s.to_string()))
            .ok_or(AdapterError::TemplateMismatch {
                expected: "tag name",
            })
    }
}

impl Adapter for TagAdapter {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn render(
        &self,
        view: &View,
        data: &Value,
        existing: Option<Element>,
    ) -> Result<Element, AdapterError> {
        let name = Self::tag_name(view)?;
        let render = self
            .library
            .get(&name)
            .ok_or_else(|| AdapterError::Failed(format!("tag '{name}' is not defined")))?;

        let root = match existing {
            Some(element) => {
                if !element.is_connected() {
                    view.holder()?.append_child(&element);
                }
                element
            }
            None => view.holder()?.append_markup(&Markup::element(name.clone())),
        };
        let mut instance = TagInstance {
            name,
            root: root.clone(),
            opts: data::Data::new(),
            render,
        };
        instance.update(data);
        tracing::trace!(view = %view.name(), tag = %instance.name, "mounted tag");
        view.set_adapter_state(instance);
        Ok(root)
    }

    fn sync(&self, view: &View, data: &Value) -> AdapterFuture {
        let result = view
            .with_adapter_state(|instance: &mut TagInstance| {
                if !instance.root.is_connected() {
                    // the holder was rebuilt (a parent re-rendered): mount afresh
                    let holder = view.holder()?;
                    instance.root.destroy();
                    instance.root = holder.append_markup(&Markup::element(instance.name.clone()));
                }
                instance.update(data);
                Ok(instance.root.clone())
            })
            .unwrap_or(Err(AdapterError::NotMounted));
        Box::pin(futures::future::ready(result))
    }

    fn remove(&self, view: &View) {
        match view.take_adapter_state::<TagInstance>() {
            Some(instance) => instance.unmount(),
            None => stagehand_core::adapter::default_remove(view),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use stagehand_core::adapter::Template;
    use stagehand_core::dom::Document;
    use stagehand_core::registry::Registry;
    use stagehand_core::view::ViewOptions;

    fn library() -> TagLibrary {
        TagLibrary::new().define("todo-list", |opts| {
            let items = opts["items"].as_array().cloned().unwrap_or_default();
            items
                .iter()
                .map(|item| Markup::element("li").content(item.as_str().unwrap_or_default()))
                .collect()
        })
    }

    fn setup(template: Template) -> (Rc<Registry>, View) {
        let registry = Registry::new(Document::new());
        registry
            .register_adapter(Rc::new(TagAdapter::new(library())))
            .unwrap();
        let view = registry
            .create_view(ViewOptions::new("todos").template(template).adapter("tag"))
            .unwrap();
        (registry, view)
    }

    #[tokio::test]
    async fn mounts_into_named_element() {
        let (registry, view) = setup(Template::new("todo-list"));
        view.render(json!({"items": ["milk"]})).await.unwrap();

        let root = view.element().unwrap();
        assert_eq!(root.tag(), "todo-list");
        assert_eq!(root.text(), "milk");
        assert_eq!(root.parent(), Some(registry.document().body()));
    }

    #[tokio::test]
    async fn sync_updates_the_instance() {
        let (_, view) = setup(Template::new(String::from("todo-list")));
        view.render(json!({"items": ["milk"]})).await.unwrap();
        let root = view.element().unwrap();

        view.sync(json!({"items": ["milk", "eggs"]})).await.unwrap();

        assert_eq!(view.element(), Some(root.clone()));
        assert_eq!(root.children().len(), 2);
        let opts = view.with_adapter_state(|tag: &mut TagInstance| tag.opts());
        assert_eq!(opts, Some(json!({"items": ["milk", "eggs"]})));
    }

    #[tokio::test]
    async fn remove_unmounts() {
        let (_, view) = setup(Template::new("todo-list"));
        view.render(json!({})).await.unwrap();
        let root = view.element().unwrap();

        view.remove();

        assert!(!root.is_connected());
        assert!(view.take_adapter_state::<TagInstance>().is_none());
    }

    #[tokio::test]
    async fn tag_inside_a_rebuilt_parent_is_mounted_again() {
        use crate::template::{template, TemplateAdapter};
        use stagehand_core::owner::ViewOwner;
        use stagehand_core::sub_view::SubViewOptions;

        let registry = Registry::new(Document::new());
        registry
            .register_adapter(Rc::new(TagAdapter::new(library())))
            .unwrap();
        registry.register_adapter(Rc::new(TemplateAdapter)).unwrap();
        registry
            .define_view(
                ViewOptions::new("todos")
                    .template(Template::new("todo-list"))
                    .adapter("tag"),
            )
            .unwrap();
        let page = registry
            .create_view(
                ViewOptions::new("page")
                    .adapter("template")
                    .template(template(|_| {
                        Markup::element("article").child(Markup::element("div").class("slot"))
                    }))
                    .sub_view(SubViewOptions::new("todos", "todos", ".slot")),
            )
            .unwrap();
        page.render(json!({"items": ["milk"]})).await.unwrap();
        let nodes = registry.document().node_count();

        page.sync(json!({"items": ["eggs"]})).await.unwrap();

        let slot = page.element().unwrap().query_selector(".slot").unwrap().unwrap();
        let root = page.sub_views()[0].view().element().unwrap();
        assert_eq!(root.parent(), Some(slot));
        assert_eq!(root.text(), "eggs");
        assert_eq!(registry.document().node_count(), nodes);
    }

    #[tokio::test]
    async fn unknown_tag_fails() {
        let (_, view) = setup(Template::new("nope"));
        let err = view.render(json!({})).await.err();
        assert!(matches!(
            err,
            Some(stagehand_core::Error::Adapter {
                source: AdapterError::Failed(_),
                ..
            })
        ));
    }
}
