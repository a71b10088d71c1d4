//! The rendering strategy contract and the registry that names strategies.
//!
//! A [`View`] never builds elements itself.  It hands its [`Template`], its
//! merged data and (on re-renders) the element it already owns to an
//! [`Adapter`], which decides whether to reuse or replace that element and
//! returns the element the view owns afterwards.
//!
//! Adapters come in two flavours:
//!
//! * types implementing [`Adapter`] directly (see the `stagehand-adapters`
//!   crate for template, component and tag adapters), and
//! * closure-built adapters described by [`AdapterOptions`], handy for tests
//!   and one-off integrations.
//!
//! Both are stored as `Rc<dyn Adapter>` in an [`AdapterRegistry`].

use crate::dom::Element;
use crate::error::{AdapterError, Error, Result};
use crate::view::View;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Opaque template payload handed to a view's adapter.
///
/// The view layer never looks inside; each adapter downcasts to the payload
/// type it understands and reports [`AdapterError::TemplateMismatch`]
/// otherwise.
#[derive(Clone)]
pub struct Template(Rc<dyn Any>);

impl Template {
    /// Wrap any payload.
    pub fn new<T: Any>(payload: T) -> Self {
        Template(Rc::new(payload))
    }

    /// Borrow the payload as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    /// Whether the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Template(..)")
    }
}

/// Result of an adapter's sync: the element the view owns afterwards.
pub type AdapterFuture = LocalBoxFuture<'static, Result<Element, AdapterError>>;

/// A pluggable strategy that materializes, updates and removes a view's
/// element.
///
/// Only [`name`](Adapter::name) and [`render`](Adapter::render) are
/// required.  The provided [`sync`](Adapter::sync) removes the element and
/// renders again, which is correct for any adapter but wasteful; adapters
/// that can update in place should override it.
pub trait Adapter {
    /// Unique name within a registry.
    fn name(&self) -> &str;

    /// Create (or adopt `existing` and fill) the view's element from `data`.
    ///
    /// `existing` is `Some` when the view already owns an element that may be
    /// reused, for example a pre-rendered one.  The returned element becomes
    /// the view's element.
    fn render(
        &self,
        view: &View,
        data: &Value,
        existing: Option<Element>,
    ) -> Result<Element, AdapterError>;

    /// Bring the view's element up to date with `data`.
    fn sync(&self, view: &View, data: &Value) -> AdapterFuture {
        default_sync(self, view, data)
    }

    /// Take the view's element out of the document.
    fn remove(&self, view: &View) {
        default_remove(view);
    }

    /// Whether the view should bind its declared events after render.
    fn events(&self) -> bool {
        true
    }

    /// Whether events must be bound again after every sync, because sync may
    /// replace the nodes listeners were attached to.
    fn rebind_events_after_sync(&self) -> bool {
        true
    }
}

/// Generic sync: remove the current element, then render from scratch.
pub fn default_sync<A: Adapter + ?Sized>(adapter: &A, view: &View, data: &Value) -> AdapterFuture {
    adapter.remove(view);
    Box::pin(futures::future::ready(adapter.render(view, data, None)))
}

/// Generic remove: destroy the view's element and everything under it.
pub fn default_remove(view: &View) {
    if let Some(element) = view.element() {
        element.destroy();
    }
}

/// Render callback for [`AdapterOptions`].
pub type RenderFn = Rc<dyn Fn(&View, &Value, Option<Element>) -> Result<Element, AdapterError>>;
/// Sync callback for [`AdapterOptions`].
pub type SyncFn = Rc<dyn Fn(&View, &Value) -> AdapterFuture>;
/// Remove callback for [`AdapterOptions`].
pub type RemoveFn = Rc<dyn Fn(&View)>;

/// Closure-based adapter description.
///
/// ```rust,ignore
/// let adapter = AdapterOptions::new("plain")
///     .render(|view, data, _existing| {
///         let holder = view.holder()?;
///         Ok(holder.append_markup(&Markup::element("p").content(data["text"].to_string())))
///     })
///     .build()?;
/// ```
#[derive(Clone)]
pub struct AdapterOptions {
    /// Registry name.  Must be non-empty.
    pub name: String,
    /// Required render callback.
    pub render: Option<RenderFn>,
    /// Optional sync override.
    pub sync: Option<SyncFn>,
    /// Optional remove override.
    pub remove: Option<RemoveFn>,
    /// Bind view events after render (default: true).
    pub events: bool,
    /// Rebind view events after sync (default: true).
    pub rebind_events_after_sync: bool,
}

impl AdapterOptions {
    /// Start describing an adapter called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            render: None,
            sync: None,
            remove: None,
            events: true,
            rebind_events_after_sync: true,
        }
    }

    /// Set the render callback.
    pub fn render(
        mut self,
        f: impl Fn(&View, &Value, Option<Element>) -> Result<Element, AdapterError> + 'static,
    ) -> Self {
        self.render = Some(Rc::new(f));
        self
    }

    /// Override sync.
    pub fn sync(mut self, f: impl Fn(&View, &Value) -> AdapterFuture + 'static) -> Self {
        self.sync = Some(Rc::new(f));
        self
    }

    /// Override remove.
    pub fn remove(mut self, f: impl Fn(&View) + 'static) -> Self {
        self.remove = Some(Rc::new(f));
        self
    }

    /// Toggle event binding.
    pub fn events(mut self, events: bool) -> Self {
        self.events = events;
        self
    }

    /// Toggle rebinding after sync.
    pub fn rebind_events_after_sync(mut self, rebind: bool) -> Self {
        self.rebind_events_after_sync = rebind;
        self
    }

    /// Validate and build the adapter.
    pub fn build(self) -> Result<Rc<dyn Adapter>> {
        if self.name.trim().is_empty() {
            return Err(Error::construction("Adapter", "no or invalid name provided"));
        }
        let Some(render) = self.render else {
            return Err(Error::construction("Adapter", "no or invalid render method"));
        };
        Ok(Rc::new(FnAdapter {
            name: self.name,
            render,
            sync: self.sync,
            remove: self.remove,
            events: self.events,
            rebind_events_after_sync: self.rebind_events_after_sync,
        }))
    }
}

impl fmt::Debug for AdapterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterOptions")
            .field("name", &self.name)
            .field("render", &self.render.is_some())
            .field("sync", &self.sync.is_some())
            .field("remove", &self.remove.is_some())
            .finish()
    }
}

struct FnAdapter {
    name: String,
    render: RenderFn,
    sync: Option<SyncFn>,
    remove: Option<RemoveFn>,
    events: bool,
    rebind_events_after_sync: bool,
}

impl Adapter for FnAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(
        &self,
        view: &View,
        data: &Value,
        existing: Option<Element>,
    ) -> Result<Element, AdapterError> {
        (self.render)(view, data, existing)
    }

    fn sync(&self, view: &View, data: &Value) -> AdapterFuture {
        match &self.sync {
            Some(sync) => sync(view, data),
            None => default_sync(self, view, data),
        }
    }

    fn remove(&self, view: &View) {
        match &self.remove {
            Some(remove) => remove(view),
            None => default_remove(view),
        }
    }

    fn events(&self) -> bool {
        self.events
    }

    fn rebind_events_after_sync(&self) -> bool {
        self.rebind_events_after_sync
    }
}

/// Ways to refer to an adapter when constructing a view.
#[derive(Clone)]
pub enum AdapterRef {
    /// A registered adapter name.
    Name(String),
    /// An adapter instance, used as-is.
    Instance(Rc<dyn Adapter>),
    /// Options to register on first use.
    Options(AdapterOptions),
}

impl From<&str> for AdapterRef {
    fn from(name: &str) -> Self {
        AdapterRef::Name(name.to_string())
    }
}

impl From<String> for AdapterRef {
    fn from(name: String) -> Self {
        AdapterRef::Name(name)
    }
}

impl From<Rc<dyn Adapter>> for AdapterRef {
    fn from(adapter: Rc<dyn Adapter>) -> Self {
        AdapterRef::Instance(adapter)
    }
}

impl From<AdapterOptions> for AdapterRef {
    fn from(options: AdapterOptions) -> Self {
        AdapterRef::Options(options)
    }
}

impl fmt::Debug for AdapterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterRef::Name(name) => f.debug_tuple("Name").field(name).finish(),
            AdapterRef::Instance(a) => f.debug_tuple("Instance").field(&a.name()).finish(),
            AdapterRef::Options(o) => f.debug_tuple("Options").field(&o.name).finish(),
        }
    }
}

/// Name-keyed adapter store.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Rc<dyn Adapter>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `adapter`.  Fails if its name is empty or already taken.
    pub fn register(&mut self, adapter: Rc<dyn Adapter>) -> Result<Rc<dyn Adapter>> {
        let name = adapter.name().to_string();
        if name.trim().is_empty() {
            return Err(Error::construction("Adapter", "no or invalid name provided"));
        }
        if self.adapters.contains_key(&name) {
            return Err(Error::duplicate("Adapter", name));
        }
        tracing::debug!(adapter = %name, "registered adapter");
        self.adapters.insert(name, adapter.clone());
        Ok(adapter)
    }

    /// Resolve `adapter`: instances are returned unchanged, names are looked
    /// up, options are built and registered.
    pub fn ensure(&mut self, adapter: AdapterRef) -> Result<Rc<dyn Adapter>> {
        match adapter {
            AdapterRef::Instance(adapter) => Ok(adapter),
            AdapterRef::Name(name) => self
                .get(&name)
                .ok_or_else(|| Error::resolution("Adapter", name)),
            AdapterRef::Options(options) => {
                let adapter = options.build()?;
                self.register(adapter)
            }
        }
    }

    /// Look up an adapter by name.
    pub fn get(&self, name: &str) -> Option<Rc<dyn Adapter>> {
        self.adapters.get(name).cloned()
    }

    /// Whether `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Remove an adapter.  Intended for test teardown.
    pub fn unregister(&mut self, name: &str) -> Option<Rc<dyn Adapter>> {
        self.adapters.remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }
}
