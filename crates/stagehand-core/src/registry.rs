//! Shared context every view is built from.
//!
//! A [`Registry`] bundles the document views render into, the adapters they
//! can use, named view definitions, the global middleware pipelines, the
//! view defaults and the sub view factory.  Views keep an `Rc` to the
//! registry they were built from.
//!
//! Most code receives a registry from its [`Director`](crate::director::Director).
//! Standalone views can use the thread-local default from
//! [`Registry::global`]; tests reset it with [`Registry::reset_global`].

use crate::adapter::{Adapter, AdapterRef, AdapterRegistry};
use crate::config::ViewDefaults;
use crate::dom::Document;
use crate::error::{Error, Result};
use crate::middleware::MiddlewareRunner;
use crate::sub_view::{DefaultSubViewFactory, SubViewFactory};
use crate::view::{View, ViewOptions};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

thread_local! {
    static GLOBAL: RefCell<Option<Rc<Registry>>> = const { RefCell::new(None) };
}

/// Document, adapters, view definitions, middleware and defaults.
pub struct Registry {
    document: Document,
    adapters: RefCell<AdapterRegistry>,
    specs: RefCell<HashMap<String, ViewOptions>>,
    middleware: MiddlewareRunner,
    defaults: ViewDefaults,
    factory: Rc<dyn SubViewFactory>,
}

impl Registry {
    /// A registry over `document` with empty pipelines and default settings.
    pub fn new(document: Document) -> Rc<Self> {
        Self::builder(document).build()
    }

    /// Start configuring a registry.
    pub fn builder(document: Document) -> RegistryBuilder {
        RegistryBuilder {
            document,
            middleware: MiddlewareRunner::new(),
            defaults: ViewDefaults::default(),
            factory: Rc::new(DefaultSubViewFactory),
        }
    }

    /// The thread-local default registry, created over a fresh document on
    /// first use.
    pub fn global() -> Rc<Self> {
        GLOBAL.with(|global| {
            global
                .borrow_mut()
                .get_or_insert_with(|| Registry::new(Document::new()))
                .clone()
        })
    }

    /// Drop the thread-local default so the next [`global`](Registry::global)
    /// call starts over.
    pub fn reset_global() {
        GLOBAL.with(|global| global.borrow_mut().take());
    }

    /// The document views render into.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The global middleware pipelines.
    pub fn middleware(&self) -> &MiddlewareRunner {
        &self.middleware
    }

    /// View defaults.
    pub fn defaults(&self) -> &ViewDefaults {
        &self.defaults
    }

    /// The sub view factory handed to every view.
    pub fn sub_view_factory(&self) -> Rc<dyn SubViewFactory> {
        self.factory.clone()
    }

    /// Register an adapter.  Fails on an empty or taken name.
    pub fn register_adapter(&self, adapter: Rc<dyn Adapter>) -> Result<Rc<dyn Adapter>> {
        self.adapters.borrow_mut().register(adapter)
    }

    /// Resolve an adapter reference, registering options on first use.
    pub fn ensure_adapter(&self, adapter: AdapterRef) -> Result<Rc<dyn Adapter>> {
        self.adapters.borrow_mut().ensure(adapter)
    }

    /// Look up an adapter.
    pub fn adapter(&self, name: &str) -> Option<Rc<dyn Adapter>> {
        self.adapters.borrow().get(name)
    }

    /// Remove an adapter.
    pub fn unregister_adapter(&self, name: &str) -> Option<Rc<dyn Adapter>> {
        self.adapters.borrow_mut().unregister(name)
    }

    /// Registered adapter names, sorted.
    pub fn adapter_names(&self) -> Vec<String> {
        self.adapters.borrow().names()
    }

    /// Store a view definition.  The first definition of a name wins;
    /// returns whether `options` was stored.
    pub fn define_view(&self, options: ViewOptions) -> Result<bool> {
        if options.name.trim().is_empty() {
            return Err(Error::construction("View", "no name specified"));
        }
        let mut specs = self.specs.borrow_mut();
        if specs.contains_key(&options.name) {
            return Ok(false);
        }
        tracing::debug!(view = %options.name, "defined view");
        specs.insert(options.name.clone(), options);
        Ok(true)
    }

    /// A copy of the definition called `name`.
    pub fn view_spec(&self, name: &str) -> Option<ViewOptions> {
        self.specs.borrow().get(name).cloned()
    }

    /// Whether a definition called `name` exists.
    pub fn has_view_spec(&self, name: &str) -> bool {
        self.specs.borrow().contains_key(name)
    }

    /// Build a view from `options`.
    pub fn create_view(self: &Rc<Self>, options: ViewOptions) -> Result<View> {
        View::new(options, self)
    }

    /// Build a view from the definition called `name`.
    pub fn create_view_from_spec(self: &Rc<Self>, name: &str) -> Result<View> {
        let options = self
            .view_spec(name)
            .ok_or_else(|| Error::resolution("View", name))?;
        View::new(options, self)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("adapters", &self.adapter_names())
            .field("views", &self.specs.borrow().len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// Builder for [`Registry`].
pub struct RegistryBuilder {
    document: Document,
    middleware: MiddlewareRunner,
    defaults: ViewDefaults,
    factory: Rc<dyn SubViewFactory>,
}

impl RegistryBuilder {
    /// Set the global middleware.
    pub fn middleware(mut self, middleware: MiddlewareRunner) -> Self {
        self.middleware = middleware;
        self
    }

    /// Set the view defaults.
    pub fn defaults(mut self, defaults: ViewDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replace the sub view factory.
    pub fn sub_view_factory(mut self, factory: Rc<dyn SubViewFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Finish.
    pub fn build(self) -> Rc<Registry> {
        Rc::new(Registry {
            document: self.document,
            adapters: RefCell::new(AdapterRegistry::new()),
            specs: RefCell::new(HashMap::new()),
            middleware: self.middleware,
            defaults: self.defaults,
            factory: self.factory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Template;
    use crate::testing::RecordingAdapter;

    #[test]
    fn first_definition_wins() {
        let registry = Registry::new(Document::new());
        assert!(registry.define_view(ViewOptions::new("home").holder("#a")).unwrap());
        assert!(!registry.define_view(ViewOptions::new("home").holder("#b")).unwrap());
        let spec = registry.view_spec("home").unwrap();
        assert!(matches!(spec.holder, Some(crate::view::Holder::Selector(s)) if s == "#a"));
    }

    #[test]
    fn define_requires_name() {
        let registry = Registry::new(Document::new());
        assert!(matches!(
            registry.define_view(ViewOptions::new(" ")),
            Err(Error::Construction { .. })
        ));
    }

    #[test]
    fn create_from_unknown_spec_fails() {
        let registry = Registry::new(Document::new());
        assert!(matches!(
            registry.create_view_from_spec("nope"),
            Err(Error::Resolution { kind: "View", .. })
        ));
    }

    #[test]
    fn create_from_spec_uses_defaults() {
        let registry = Registry::builder(Document::new())
            .defaults(ViewDefaults {
                adapter: Some("recording".into()),
                ..ViewDefaults::default()
            })
            .build();
        registry.register_adapter(RecordingAdapter::new("recording")).unwrap();
        registry
            .define_view(ViewOptions::new("home").template(Template::new(())))
            .unwrap();

        let view = registry.create_view_from_spec("home").unwrap();
        assert_eq!(view.adapter().name(), "recording");
        assert_eq!(view.holder().unwrap(), registry.document().body());
    }

    #[test]
    fn global_is_shared_until_reset() {
        Registry::reset_global();
        let a = Registry::global();
        let b = Registry::global();
        assert!(Rc::ptr_eq(&a, &b));
        Registry::reset_global();
        let c = Registry::global();
        assert!(!Rc::ptr_eq(&a, &c));
    }
}
