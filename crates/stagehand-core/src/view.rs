use crate::adapter::{Adapter, AdapterRef, Template};
use crate::data::{self, Data};
use crate::dom::{Document, Element, Event, ListenerId};
use crate::error::{AdapterError, Error, Result};
use crate::event::{self, Handler, HandlerFn, MethodTable};
use crate::middleware::{MiddlewareError, MiddlewareRef, Rejection, Syncer};
use crate::owner::{Owner, ViewOwner};
use crate::registry::Registry;
use crate::sub_view::{SubView, SubViewFactory, SubViewOptions};
use futures::future::{join_all, LocalBoxFuture};
use serde_json::Value;
use std::any::Any;
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Where a view's element is attached.
#[derive(Clone, Debug)]
pub enum Holder {
    /// A selector resolved against the document.
    Selector(String),
    /// A specific element.
    Element(Element),
}

impl From<&str> for Holder {
    fn from(selector: &str) -> Self {
        Holder::Selector(selector.to_string())
    }
}

impl From<String> for Holder {
    fn from(selector: String) -> Self {
        Holder::Selector(selector)
    }
}

impl From<Element> for Holder {
    fn from(element: Element) -> Self {
        Holder::Element(element)
    }
}

/// A holder as the view resolves it on every render.
#[derive(Clone)]
pub(crate) enum Locator {
    Selector { document: Document, selector: String },
    Element(Element),
    /// A selector evaluated inside the parent view's live element.
    Within { parent: WeakView, selector: String },
}

impl Locator {
    /// Validate a top-level holder: selectors must resolve right now and
    /// elements must belong to `document`.
    pub(crate) fn top_level(kind: &'static str, holder: Holder, document: &Document) -> Result<Self> {
        match holder {
            Holder::Selector(selector) => {
                if selector.trim().is_empty() {
                    return Err(Error::construction(kind, "no holder specified"));
                }
                if document.query_selector(&selector)?.is_none() {
                    return Err(Error::construction(
                        kind,
                        format!("holder '{selector}' not found in document"),
                    ));
                }
                Ok(Locator::Selector {
                    document: document.clone(),
                    selector,
                })
            }
            Holder::Element(element) => {
                if !document.owns(&element) {
                    return Err(Error::construction(
                        kind,
                        "holder element belongs to another document",
                    ));
                }
                Ok(Locator::Element(element))
            }
        }
    }

    fn resolve(&self) -> Result<Element, AdapterError> {
        match self {
            Locator::Selector { document, selector } => document
                .query_selector(selector)
                .ok()
                .flatten()
                .ok_or_else(|| AdapterError::HolderNotFound(selector.clone())),
            Locator::Element(element) => Ok(element.clone()),
            Locator::Within { parent, selector } => parent
                .upgrade()
                .and_then(|parent| parent.element())
                .and_then(|element| element.query_selector(selector).ok().flatten())
                .ok_or_else(|| AdapterError::HolderNotFound(selector.clone())),
        }
    }
}

/// Everything needed to construct a [`View`].
///
/// Options double as view *definitions*: a registry stores them by name
/// so sub views, static views and directors can build views from a name.
///
/// ```rust,ignore
/// let options = ViewOptions::new("profile")
///     .template(Template::new(Markup::element("section").class("profile")))
///     .holder("#main")
///     .adapter("template")
///     .data(load_profile)
///     .sub_view(SubViewOptions::new("avatar", "avatar", ".avatar-slot"));
/// ```
#[derive(Clone, Default)]
pub struct ViewOptions {
    /// View name.  Several views may share one.
    pub name: String,
    /// Payload for the adapter.
    pub template: Option<Template>,
    /// Attachment point.  Falls back to the registry's default holder.
    pub holder: Option<Holder>,
    /// Adapter reference.  Falls back to the registry's default adapter.
    pub adapter: Option<AdapterRef>,
    /// A pre-rendered element offered to the adapter on first render.
    pub element: Option<Element>,
    /// Event map: `"type[ selector]"` to handler.
    pub events: Vec<(String, Handler)>,
    /// Named handlers, addressable from the event map by dotted path.
    pub methods: MethodTable,
    /// View-specific security middleware.
    pub security: Vec<MiddlewareRef>,
    /// View-specific data middleware.
    pub data: Vec<MiddlewareRef>,
    /// Sub views created lazily on first render.
    pub sub_views: Vec<SubViewOptions>,
}

impl ViewOptions {
    /// Start describing a view called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the template payload.
    pub fn template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    /// Set the holder.
    pub fn holder(mut self, holder: impl Into<Holder>) -> Self {
        self.holder = Some(holder.into());
        self
    }

    /// Set the adapter.
    pub fn adapter(mut self, adapter: impl Into<AdapterRef>) -> Self {
        self.adapter = Some(adapter.into());
        self
    }

    /// Provide a pre-rendered element.
    pub fn element(mut self, element: Element) -> Self {
        self.element = Some(element);
        self
    }

    /// Add an event map entry.
    pub fn on(mut self, key: impl Into<String>, handler: impl Into<Handler>) -> Self {
        self.events.push((key.into(), handler.into()));
        self
    }

    /// Add a named method.  Dots in `path` nest it: `"form.save"`.
    pub fn method(mut self, path: &str, f: impl Fn(&Event, &View) + 'static) -> Self {
        self.methods.insert(path, Rc::new(f));
        self
    }

    /// Mount a whole table of methods under `name`.
    pub fn methods(mut self, name: impl Into<String>, table: MethodTable) -> Self {
        self.methods = self.methods.table(name, table);
        self
    }

    /// Add a security middleware.
    pub fn security(mut self, middleware: MiddlewareRef) -> Self {
        self.security.push(middleware);
        self
    }

    /// Add a data middleware.
    pub fn data(mut self, middleware: MiddlewareRef) -> Self {
        self.data.push(middleware);
        self
    }

    /// Declare a sub view.
    pub fn sub_view(mut self, sub_view: SubViewOptions) -> Self {
        self.sub_views.push(sub_view);
        self
    }
}

impl fmt::Debug for ViewOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewOptions")
            .field("name", &self.name)
            .field("holder", &self.holder)
            .field("adapter", &self.adapter)
            .field("events", &self.events.len())
            .field("methods", &self.methods)
            .field("sub_views", &self.sub_views.len())
            .finish()
    }
}

/// Flags for [`View::render_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderFlags {
    /// Render from scratch even if already rendered.
    pub force: bool,
    /// Clear the data store before merging.
    pub replace: bool,
}

impl RenderFlags {
    /// `force` set.
    pub fn forced() -> Self {
        Self {
            force: true,
            replace: false,
        }
    }

    /// `replace` set.
    pub fn replacing() -> Self {
        Self {
            force: false,
            replace: true,
        }
    }
}

/// How a render call ended when it did not fail unexpectedly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The adapter rendered the view.
    Rendered,
    /// The view was already rendered and was synced and shown instead.
    Synced,
    /// Security middleware refused; the view is hidden.
    Denied,
    /// Data middleware failed; the view is hidden and the failure logged.
    DataUnavailable,
}

impl RenderOutcome {
    /// Whether the view now shows current data.
    pub fn is_success(self) -> bool {
        matches!(self, RenderOutcome::Rendered | RenderOutcome::Synced)
    }
}

#[derive(Default)]
struct ViewState {
    data: Data,
    element: Option<Element>,
    rendered: bool,
    last_display: Option<String>,
    sub_views: BTreeMap<String, SubView>,
    listeners: Vec<(Element, ListenerId)>,
    adapter_state: Option<Box<dyn Any>>,
    owner: Option<Owner>,
}

struct ViewInner {
    name: String,
    template: Template,
    locator: Locator,
    adapter: Rc<dyn Adapter>,
    registry: Rc<Registry>,
    factory: Rc<dyn SubViewFactory>,
    events: Vec<(String, Handler)>,
    methods: MethodTable,
    security: Vec<MiddlewareRef>,
    data_middleware: Vec<MiddlewareRef>,
    sub_view_specs: Vec<SubViewOptions>,
    state: RefCell<ViewState>,
}

/// A unit of UI with a uniform lifecycle: render, sync, show/hide, remove.
///
/// `View` is a cheap, cloneable handle; clones refer to the same view.  The
/// view owns at most one element, created by its [`Adapter`] on the first
/// render and attached under its holder.
///
/// # Lifecycle
///
/// * **render** -- while unrendered (or with [`RenderFlags::force`]), runs the
///   security and data middleware, merges the data, asks the adapter to
///   render, binds events and renders every sub view.  Once rendered, a plain
///   render becomes [`sync`](View::sync) followed by [`show`](View::show).
/// * **sync** -- merges data and asks the adapter to update in place, then
///   syncs existing sub views.  Middleware does not run.
/// * **show / hide** -- toggle the element's `display`.
/// * **remove** -- detaches the element and removes every sub view; the next
///   render starts from scratch.
///
/// Expected middleware rejections resolve the render future with
/// [`RenderOutcome::Denied`] or [`RenderOutcome::DataUnavailable`]; only
/// unexpected failures resolve with an [`Error`].
#[derive(Clone)]
pub struct View {
    inner: Rc<ViewInner>,
}

/// Non-owning reference to a [`View`].
#[derive(Clone, Default)]
pub struct WeakView(Weak<ViewInner>);

impl WeakView {
    /// A reference that never upgrades.
    pub fn new() -> Self {
        WeakView(Weak::new())
    }

    /// Upgrade to a strong handle if the view is still alive.
    pub fn upgrade(&self) -> Option<View> {
        self.0.upgrade().map(|inner| View { inner })
    }
}

impl fmt::Debug for WeakView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(view) => f.debug_tuple("WeakView").field(&view.name()).finish(),
            None => f.write_str("WeakView(<dropped>)"),
        }
    }
}

impl View {
    /// Construct a view from `options`.
    ///
    /// Fails without touching the document when the name, template, holder or
    /// adapter is missing, when the adapter name is unknown, or when a holder
    /// selector does not resolve.
    pub fn new(options: ViewOptions, registry: &Rc<Registry>) -> Result<View> {
        let holder = options
            .holder
            .clone()
            .or_else(|| registry.defaults().holder.clone().map(Holder::Selector))
            .ok_or_else(|| Error::construction("View", "no holder specified"))?;
        let locator = Locator::top_level("View", holder, registry.document())?;
        Self::with_locator(options, registry, locator)
    }

    pub(crate) fn with_locator(
        options: ViewOptions,
        registry: &Rc<Registry>,
        locator: Locator,
    ) -> Result<View> {
        if options.name.trim().is_empty() {
            return Err(Error::construction("View", "no name specified"));
        }
        let ViewOptions {
            name,
            template,
            adapter,
            element,
            events,
            methods,
            security,
            data,
            sub_views,
            ..
        } = options;
        let template = template.ok_or_else(|| Error::construction("View", "no template specified"))?;
        let adapter = adapter
            .or_else(|| registry.defaults().adapter.clone().map(AdapterRef::Name))
            .ok_or_else(|| Error::construction("View", "no adapter specified"))?;
        let adapter = registry.ensure_adapter(adapter)?;

        tracing::debug!(view = %name, adapter = %adapter.name(), "constructed view");
        Ok(View {
            inner: Rc::new(ViewInner {
                name,
                template,
                locator,
                adapter,
                registry: registry.clone(),
                factory: registry.sub_view_factory(),
                events,
                methods,
                security,
                data_middleware: data,
                sub_view_specs: sub_views,
                state: RefCell::new(ViewState {
                    element,
                    ..ViewState::default()
                }),
            }),
        })
    }

    /// The view's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The template payload.
    pub fn template(&self) -> &Template {
        &self.inner.template
    }

    /// The resolved adapter.
    pub fn adapter(&self) -> Rc<dyn Adapter> {
        self.inner.adapter.clone()
    }

    /// The registry this view was built from.
    pub fn registry(&self) -> &Rc<Registry> {
        &self.inner.registry
    }

    /// The document the view renders into.
    pub fn document(&self) -> &Document {
        self.inner.registry.document()
    }

    /// Resolve the holder element now.
    pub fn holder(&self) -> Result<Element, AdapterError> {
        self.inner.locator.resolve()
    }

    /// The element the view owns, if any.
    pub fn element(&self) -> Option<Element> {
        self.state().element.clone()
    }

    /// Whether the view is rendered.
    pub fn is_rendered(&self) -> bool {
        self.state().rendered
    }

    /// Snapshot of the accumulated data.
    pub fn data(&self) -> Value {
        Value::Object(self.state().data.clone())
    }

    /// Look up a method by dotted path, one namespace per segment.
    pub fn method(&self, path: &str) -> Option<HandlerFn> {
        self.inner.methods.get(path)
    }

    /// The declared event map.
    pub fn event_map(&self) -> &[(String, Handler)] {
        &self.inner.events
    }

    /// The sub view called `name`, if created.
    pub fn sub_view(&self, name: &str) -> Option<SubView> {
        self.state().sub_views.get(name).cloned()
    }

    /// All created sub views, ordered by name.
    pub fn sub_views(&self) -> Vec<SubView> {
        self.state().sub_views.values().cloned().collect()
    }

    /// The logical owner, set when the view is wrapped by a sub view or a
    /// static view.
    pub fn owner(&self) -> Option<Owner> {
        self.state().owner.clone()
    }

    pub(crate) fn set_owner(&self, owner: Owner) {
        self.inner.state.borrow_mut().owner = Some(owner);
    }

    /// Store adapter-private state (a mounted component, a tag instance...).
    pub fn set_adapter_state<T: Any>(&self, state: T) {
        self.inner.state.borrow_mut().adapter_state = Some(Box::new(state));
    }

    /// Run `f` on the adapter state if it is a `T`.
    ///
    /// `f` must not call back into this view's adapter-state methods.
    pub fn with_adapter_state<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut state = self.inner.state.borrow_mut();
        state.adapter_state.as_mut()?.downcast_mut::<T>().map(f)
    }

    /// Remove and return the adapter state if it is a `T`.
    pub fn take_adapter_state<T: Any>(&self) -> Option<T> {
        let mut state = self.inner.state.borrow_mut();
        match state.adapter_state.take()?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                state.adapter_state = Some(other);
                None
            }
        }
    }

    /// Non-owning handle.
    pub fn downgrade(&self) -> WeakView {
        WeakView(Rc::downgrade(&self.inner))
    }

    /// Whether two handles refer to the same view.
    pub fn ptr_eq(&self, other: &View) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Render with default flags.
    pub fn render(&self, data: Value) -> LocalBoxFuture<'static, Result<RenderOutcome>> {
        self.render_with(data, RenderFlags::default())
    }

    /// Render, or sync and show when already rendered and not forced.
    pub fn render_with(
        &self,
        data: Value,
        flags: RenderFlags,
    ) -> LocalBoxFuture<'static, Result<RenderOutcome>> {
        let view = self.clone();
        Box::pin(async move {
            if view.is_rendered() && !flags.force {
                view.sync_with(data, flags.replace).await?;
                view.show();
                return Ok(RenderOutcome::Synced);
            }

            match view.gated_render(data, flags).await {
                Ok(()) => Ok(RenderOutcome::Rendered),
                Err(Rejection::Security(err)) => {
                    view.hide();
                    tracing::debug!(view = %view.name(), error = %err, "security middleware refused render");
                    Ok(RenderOutcome::Denied)
                }
                Err(Rejection::Data(err)) => {
                    view.hide();
                    tracing::error!(view = %view.name(), error = %err, "data middleware failed");
                    Ok(RenderOutcome::DataUnavailable)
                }
                Err(Rejection::Unexpected(err)) => {
                    view.hide();
                    Err(err)
                }
            }
        })
    }

    async fn gated_render(&self, data: Value, flags: RenderFlags) -> Result<(), Rejection> {
        let incoming = self.check_data(&data)?;
        let inner = &self.inner;
        let resolved = inner
            .registry
            .middleware()
            .run(
                &inner.name,
                &inner.security,
                &inner.data_middleware,
                data,
                Syncer::new(self.downgrade()),
            )
            .await?;
        let resolved = data::as_object(&resolved).ok_or_else(|| Error::Middleware {
            view: inner.name.clone(),
            source: MiddlewareError::new(format!(
                "data pipeline resolved with {}, expected an object",
                data::type_name(&resolved)
            )),
        })?;

        let merged = {
            let mut state = inner.state.borrow_mut();
            if flags.replace {
                state.data.clear();
            }
            data::merge(&mut state.data, &incoming);
            data::merge(&mut state.data, &resolved);
            Value::Object(state.data.clone())
        };

        let (was_rendered, previous) = {
            let state = self.state();
            (state.rendered, state.element.clone())
        };
        event::unbind_events(self);
        let existing = match previous {
            Some(_) if was_rendered => {
                // forced re-render: the adapter starts from a clean slate
                inner.adapter.remove(self);
                self.inner.state.borrow_mut().element = None;
                None
            }
            other => other,
        };

        let element = inner
            .adapter
            .render(self, &merged, existing)
            .map_err(|source| self.adapter_error(source))?;
        self.inner.state.borrow_mut().element = Some(element);
        if inner.adapter.events() {
            event::bind_events(self)?;
        }
        self.inner.state.borrow_mut().rendered = true;
        tracing::debug!(view = %inner.name, force = flags.force, "rendered view");

        self.render_sub_views(merged, flags).await?;
        Ok(())
    }

    async fn render_sub_views(&self, data: Value, flags: RenderFlags) -> Result<()> {
        self.ensure_sub_views()?;
        let renders = self
            .sub_views()
            .into_iter()
            .map(|sub_view| sub_view.view().render_with(data.clone(), flags));
        for result in join_all(renders).await {
            result?;
        }
        Ok(())
    }

    /// Create every declared sub view that does not exist yet.
    pub fn ensure_sub_views(&self) -> Result<()> {
        for spec in &self.inner.sub_view_specs {
            if self.state().sub_views.contains_key(&spec.name) {
                continue;
            }
            self.add_sub_view(spec.clone())?;
        }
        Ok(())
    }

    /// Create a sub view under this view.  Fails with
    /// [`Error::DuplicateName`] if the name is taken.
    pub fn add_sub_view(&self, options: SubViewOptions) -> Result<SubView> {
        let sub_view = self.inner.factory.create_sub_view(self, &options)?;
        self.inner
            .state
            .borrow_mut()
            .sub_views
            .insert(options.name.clone(), sub_view.clone());
        tracing::debug!(view = %self.name(), sub_view = %options.name, "created sub view");
        Ok(sub_view)
    }

    /// Sync with default flags.
    pub fn sync(&self, data: Value) -> LocalBoxFuture<'static, Result<()>> {
        self.sync_with(data, false)
    }

    /// Merge (or with `replace`, substitute) `data` and update the element in
    /// place.  On an unrendered view only the data store changes.
    pub fn sync_with(&self, data: Value, replace: bool) -> LocalBoxFuture<'static, Result<()>> {
        let view = self.clone();
        Box::pin(async move {
            let incoming = view.check_data(&data)?;
            let (merged, rendered) = {
                let mut state = view.inner.state.borrow_mut();
                if replace {
                    state.data.clear();
                }
                data::merge(&mut state.data, &incoming);
                (Value::Object(state.data.clone()), state.rendered)
            };
            if !rendered {
                tracing::debug!(view = %view.name(), "sync before render only merged data");
                return Ok(());
            }

            let adapter = view.adapter();
            let element = adapter
                .sync(&view, &merged)
                .await
                .map_err(|source| view.adapter_error(source))?;
            view.inner.state.borrow_mut().element = Some(element);
            if adapter.events() && adapter.rebind_events_after_sync() {
                event::bind_events(&view)?;
            }
            tracing::debug!(view = %view.name(), "synced view");

            let syncs = view
                .sub_views()
                .into_iter()
                .map(|sub_view| sub_view.view().sync_with(merged.clone(), replace));
            for result in join_all(syncs).await {
                result?;
            }
            Ok(())
        })
    }

    /// Show the element, restoring the display value it had before
    /// [`hide`](View::hide).
    pub fn show(&self) {
        let Some(element) = self.element() else {
            return;
        };
        if element.style("display").as_deref() != Some("none") {
            return;
        }
        let previous = self.inner.state.borrow_mut().last_display.take();
        match previous {
            Some(display) => element.set_style("display", display),
            None => element.remove_style("display"),
        }
        tracing::trace!(view = %self.name(), "shown");
    }

    /// Hide the element, remembering its current display value.
    pub fn hide(&self) {
        let Some(element) = self.element() else {
            return;
        };
        let current = element.style("display");
        if current.as_deref() != Some("none") {
            self.inner.state.borrow_mut().last_display = current;
            element.set_style("display", "none");
        }
        tracing::trace!(view = %self.name(), "hidden");
    }

    /// Whether the view has an element that is currently hidden.
    pub fn is_hidden(&self) -> bool {
        self.element().is_some_and(|e| e.is_hidden())
    }

    /// Detach the element and remove every sub view.  No-op when unrendered.
    pub fn remove(&self) {
        if !self.is_rendered() {
            return;
        }
        event::unbind_events(self);
        self.inner.adapter.remove(self);
        {
            let mut state = self.inner.state.borrow_mut();
            state.element = None;
            state.rendered = false;
            state.last_display = None;
        }
        for sub_view in self.sub_views() {
            sub_view.view().remove();
        }
        tracing::debug!(view = %self.name(), "removed view");
    }

    pub(crate) fn store_listeners(&self, listeners: Vec<(Element, ListenerId)>) {
        self.inner.state.borrow_mut().listeners = listeners;
    }

    pub(crate) fn take_listeners(&self) -> Vec<(Element, ListenerId)> {
        std::mem::take(&mut self.inner.state.borrow_mut().listeners)
    }

    fn state(&self) -> Ref<'_, ViewState> {
        self.inner.state.borrow()
    }

    fn check_data(&self, value: &Value) -> Result<Data> {
        data::as_object(value).ok_or_else(|| Error::InvalidData {
            view: self.name().to_string(),
            found: data::type_name(value),
        })
    }

    fn adapter_error(&self, source: AdapterError) -> Error {
        Error::Adapter {
            adapter: self.inner.adapter.name().to_string(),
            view: self.name().to_string(),
            source,
        }
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("View")
            .field("name", &self.inner.name)
            .field("adapter", &self.inner.adapter.name())
            .field("rendered", &state.rendered)
            .field("element", &state.element)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Markup;
    use crate::middleware::{from_fn, MiddlewareError, Request};
    use crate::testing::{Call, RecordingAdapter};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::cell::Cell;
    use tracing_test::traced_test;

    fn setup() -> (Rc<Registry>, Rc<RecordingAdapter>) {
        let document = Document::new();
        document.body().append_markup(&Markup::element("main").id("main"));
        let registry = Registry::new(document);
        let adapter = RecordingAdapter::new("recording");
        registry.register_adapter(adapter.clone()).unwrap();
        (registry, adapter)
    }

    fn options(name: &str) -> ViewOptions {
        ViewOptions::new(name)
            .template(Template::new(()))
            .holder("#main")
            .adapter("recording")
    }

    fn main_of(registry: &Registry) -> Element {
        registry.document().query_selector("#main").unwrap().unwrap()
    }

    #[test]
    fn construction_validates_before_touching_the_document() {
        let (registry, _) = setup();
        let before = registry.document().markup();

        let no_template = ViewOptions::new("a").holder("#main").adapter("recording");
        assert!(matches!(
            View::new(no_template, &registry),
            Err(Error::Construction { .. })
        ));
        let no_adapter = ViewOptions::new("a").template(Template::new(())).holder("#main");
        assert!(matches!(
            View::new(no_adapter, &registry),
            Err(Error::Construction { .. })
        ));
        assert!(matches!(
            View::new(options("a").adapter("missing"), &registry),
            Err(Error::Resolution { kind: "Adapter", .. })
        ));
        assert!(matches!(
            View::new(options("a").holder("#nowhere"), &registry),
            Err(Error::Construction { .. })
        ));
        assert!(matches!(
            View::new(options(""), &registry),
            Err(Error::Construction { .. })
        ));

        assert_eq!(registry.document().markup(), before);
    }

    #[tokio::test]
    async fn first_render_hands_data_to_adapter() {
        let (registry, adapter) = setup();
        let view = View::new(options("home"), &registry).unwrap();
        assert!(view.element().is_none());
        assert!(!view.is_rendered());

        let outcome = view.render(json!({"x": 1})).await.unwrap();

        assert_eq!(outcome, RenderOutcome::Rendered);
        assert_eq!(
            adapter.calls(),
            vec![Call::Render {
                view: "home".into(),
                data: json!({"x": 1}),
                had_existing: false,
            }]
        );
        let element = view.element().unwrap();
        assert_eq!(main_of(&registry).children(), vec![element]);
        assert!(view.is_rendered());
    }

    #[tokio::test]
    async fn second_render_syncs_and_shows() {
        let (registry, adapter) = setup();
        let view = View::new(options("home"), &registry).unwrap();

        view.render(json!({"a": 1})).await.unwrap();
        view.hide();
        let outcome = view.render(json!({"b": 2})).await.unwrap();

        assert_eq!(outcome, RenderOutcome::Synced);
        assert_eq!(adapter.render_count(), 1);
        assert_eq!(adapter.sync_count(), 1);
        assert!(!view.is_hidden());
        assert_eq!(view.data(), json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn forced_render_starts_over() {
        let (registry, adapter) = setup();
        let view = View::new(options("home"), &registry).unwrap();

        view.render_with(json!({}), RenderFlags::forced()).await.unwrap();
        view.render_with(json!({}), RenderFlags::forced()).await.unwrap();

        assert_eq!(adapter.render_count(), 2);
        assert_eq!(adapter.sync_count(), 0);
        assert_eq!(adapter.remove_count(), 1);
        assert_eq!(main_of(&registry).children().len(), 1);
    }

    #[tokio::test]
    async fn sync_merges_unless_replacing() {
        let (registry, adapter) = setup();
        let view = View::new(options("home"), &registry).unwrap();
        view.render(json!({"a": 1})).await.unwrap();

        view.sync(json!({"b": 2})).await.unwrap();
        view.sync_with(json!({"c": 3}), true).await.unwrap();

        let syncs: Vec<Value> = adapter
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Sync { data, .. } => Some(data),
                _ => None,
            })
            .collect();
        assert_eq!(syncs, vec![json!({"a": 1, "b": 2}), json!({"c": 3})]);
    }

    #[tokio::test]
    async fn render_with_replace_clears_the_store() {
        let (registry, _) = setup();
        let view = View::new(options("home"), &registry).unwrap();
        view.render(json!({"a": 1})).await.unwrap();
        view.render_with(json!({"b": 2}), RenderFlags { force: true, replace: true })
            .await
            .unwrap();
        assert_eq!(view.data(), json!({"b": 2}));
    }

    #[tokio::test]
    async fn sync_before_render_only_merges() {
        let (registry, adapter) = setup();
        let view = View::new(options("home"), &registry).unwrap();

        view.sync(json!({"a": 1})).await.unwrap();

        assert!(adapter.calls().is_empty());
        assert!(view.element().is_none());
        view.render(json!({"b": 2})).await.unwrap();
        assert_eq!(
            adapter.calls()[0],
            Call::Render {
                view: "home".into(),
                data: json!({"a": 1, "b": 2}),
                had_existing: false,
            }
        );
    }

    #[tokio::test]
    async fn non_object_data_is_rejected() {
        let (registry, adapter) = setup();
        let view = View::new(options("home"), &registry).unwrap();
        let err = view.render(json!([1, 2])).await.err();
        assert!(matches!(err, Some(Error::InvalidData { found: "array", .. })));
        assert_eq!(adapter.render_count(), 0);
    }

    #[tokio::test]
    async fn remove_is_a_noop_until_rendered() {
        let (registry, adapter) = setup();
        let view = View::new(options("home"), &registry).unwrap();

        view.remove();
        assert!(adapter.calls().is_empty());

        view.render(json!({})).await.unwrap();
        view.remove();
        view.remove();
        assert_eq!(adapter.remove_count(), 1);
        assert!(view.element().is_none());
        assert!(!view.is_rendered());
        assert!(main_of(&registry).children().is_empty());
    }

    #[tokio::test]
    async fn hide_and_show_restore_display() {
        let (registry, _) = setup();
        let view = View::new(options("home"), &registry).unwrap();
        view.show();
        view.hide();

        view.render(json!({})).await.unwrap();
        let element = view.element().unwrap();
        element.set_style("display", "flex");

        view.hide();
        assert_eq!(element.style("display").as_deref(), Some("none"));
        view.hide();
        view.show();
        assert_eq!(element.style("display").as_deref(), Some("flex"));
        view.show();
        assert_eq!(element.style("display").as_deref(), Some("flex"));
    }

    #[tokio::test]
    async fn pre_rendered_element_is_offered_once() {
        let (registry, adapter) = setup();
        let existing = registry.document().create_element("article");
        let view = View::new(options("home").element(existing.clone()), &registry).unwrap();

        view.render(json!({})).await.unwrap();

        assert!(matches!(
            adapter.calls()[0],
            Call::Render { had_existing: true, .. }
        ));
        assert_eq!(view.element(), Some(existing.clone()));
        assert!(existing.is_connected());
    }

    fn parent_options() -> ViewOptions {
        let markup = Markup::element("section").child(Markup::element("div").class("slot"));
        options("parent")
            .template(Template::new(markup))
            .sub_view(SubViewOptions::new("child", "child", ".slot"))
    }

    #[tokio::test]
    async fn sub_views_render_inside_parent() {
        let (registry, adapter) = setup();
        registry.define_view(options("child")).unwrap();
        let parent = View::new(parent_options(), &registry).unwrap();
        assert!(parent.sub_view("child").is_none());

        parent.render(json!({"x": 1})).await.unwrap();

        let sub_view = parent.sub_view("child").unwrap();
        let child = sub_view.view().clone();
        let slot = parent.element().unwrap().query_selector(".slot").unwrap().unwrap();
        assert_eq!(child.element().unwrap().parent(), Some(slot));
        assert!(sub_view.parent_view().unwrap().ptr_eq(&parent));
        assert_eq!(child.data(), json!({"x": 1}));
        assert!(matches!(child.owner(), Some(Owner::View(_))));
        assert_eq!(adapter.render_count(), 2);

        parent.render(json!({"y": 2})).await.unwrap();
        assert_eq!(adapter.sync_count(), 2);
        assert_eq!(child.data(), json!({"x": 1, "y": 2}));
    }

    #[tokio::test]
    async fn duplicate_sub_view_names_are_rejected() {
        let (registry, _) = setup();
        registry.define_view(options("child")).unwrap();
        let parent = View::new(parent_options(), &registry).unwrap();
        parent.render(json!({})).await.unwrap();

        let err = parent
            .add_sub_view(SubViewOptions::new("child", "child", ".slot"))
            .err();
        assert!(matches!(err, Some(Error::DuplicateName { kind: "SubView", .. })));
    }

    #[tokio::test]
    async fn sub_view_of_unknown_spec_fails_the_render() {
        let (registry, _) = setup();
        let parent = View::new(parent_options(), &registry).unwrap();
        let err = parent.render(json!({})).await.err();
        assert!(matches!(err, Some(Error::Resolution { kind: "View", .. })));
    }

    #[tokio::test]
    async fn remove_cascades_to_sub_views() {
        let (registry, adapter) = setup();
        registry.define_view(options("child")).unwrap();
        let parent = View::new(parent_options(), &registry).unwrap();
        parent.render(json!({})).await.unwrap();
        let child = parent.sub_view("child").unwrap().view().clone();

        parent.remove();

        assert!(!child.is_rendered());
        assert_eq!(adapter.remove_count(), 2);
    }

    #[tokio::test]
    async fn events_are_rebound_not_duplicated() {
        let (registry, _) = setup();
        let clicks = Rc::new(Cell::new(0));
        let counter = clicks.clone();
        let markup = Markup::element("form").child(Markup::element("button").class("save"));
        let view = View::new(
            options("form")
                .template(Template::new(markup))
                .method("form.save", move |_ev, _view| counter.set(counter.get() + 1))
                .on("click .save", "form.save"),
            &registry,
        )
        .unwrap();

        view.render(json!({})).await.unwrap();
        let button = view.element().unwrap().query_selector(".save").unwrap().unwrap();
        button.dispatch("click");
        view.render(json!({})).await.unwrap();
        button.dispatch("click");

        assert_eq!(clicks.get(), 2);
        assert_eq!(button.listener_count(), 1);
        view.remove();
        assert_eq!(button.listener_count(), 0);
    }

    #[test]
    fn holder_from_another_document_is_rejected() {
        let (registry, _) = setup();
        let stranger = Document::new().body();
        let err = View::new(options("v").holder(stranger), &registry).err();
        assert!(matches!(err, Some(Error::Construction { .. })));
    }

    #[tokio::test]
    async fn unknown_handler_fails_the_render() {
        let (registry, _) = setup();
        let view = View::new(options("form").on("click", "nope"), &registry).unwrap();
        let err = view.render(json!({})).await.err();
        assert!(matches!(err, Some(Error::EventBinding { .. })));
        assert!(view.is_hidden());
    }

    #[tokio::test]
    async fn handler_paths_resolve_through_nested_tables() {
        let (registry, _) = setup();
        let saves = Rc::new(Cell::new(0));
        let counter = saves.clone();
        let markup = Markup::element("form").child(Markup::element("button").class("save"));
        let view = View::new(
            options("form")
                .template(Template::new(markup))
                .methods(
                    "form",
                    MethodTable::new().method("draft.save", move |_ev, _view| counter.set(counter.get() + 1)),
                )
                .on("click .save", "form.draft.save"),
            &registry,
        )
        .unwrap();

        view.render(json!({})).await.unwrap();
        let button = view.element().unwrap().query_selector(".save").unwrap().unwrap();
        button.dispatch("click");

        assert_eq!(saves.get(), 1);
        assert!(view.method("form.draft").is_none());
        assert!(view.method("form.draft.save").is_some());
    }

    #[tokio::test]
    async fn missing_path_segment_fails_the_render() {
        let (registry, _) = setup();
        let view = View::new(
            options("form")
                .method("form.save", |_ev, _view| {})
                .on("click", "form.publish"),
            &registry,
        )
        .unwrap();
        let err = view.render(json!({})).await.err();
        assert!(matches!(err, Some(Error::EventBinding { .. })));
    }

    #[tokio::test]
    async fn security_rejection_leaves_view_unrendered() {
        let (registry, adapter) = setup();
        let view = View::new(
            options("admin").security(from_fn(|_req: Request| async {
                Err(MiddlewareError::new("not an admin"))
            })),
            &registry,
        )
        .unwrap();

        let outcome = view.render(json!({})).await.unwrap();

        assert_eq!(outcome, RenderOutcome::Denied);
        assert!(view.element().is_none());
        assert_eq!(adapter.render_count(), 0);
    }

    #[tokio::test]
    #[traced_test]
    async fn data_rejection_is_logged() {
        let (registry, adapter) = setup();
        let view = View::new(
            options("home").data(from_fn(|_req: Request| async {
                Err(MiddlewareError::new("backend down"))
            })),
            &registry,
        )
        .unwrap();

        let outcome = view.render(json!({})).await.unwrap();

        assert_eq!(outcome, RenderOutcome::DataUnavailable);
        assert_eq!(adapter.render_count(), 0);
        assert!(logs_contain("data middleware failed"));
        assert!(logs_contain("backend down"));
    }

    #[tokio::test]
    async fn data_middleware_output_is_merged() {
        let (registry, adapter) = setup();
        let view = View::new(
            options("home").data(from_fn(|req: Request| async move {
                let mut data = req.into_data();
                data["loaded"] = json!(true);
                Ok(data)
            })),
            &registry,
        )
        .unwrap();

        view.render(json!({"id": 7})).await.unwrap();

        assert!(matches!(
            &adapter.calls()[0],
            Call::Render { data, .. } if *data == json!({"id": 7, "loaded": true})
        ));
    }

    #[tokio::test]
    async fn syncer_pushes_late_data() {
        let (registry, adapter) = setup();
        let slot: Rc<RefCell<Option<Syncer>>> = Rc::new(RefCell::new(None));
        let keep = slot.clone();
        let view = View::new(
            options("feed").data(from_fn(move |req: Request| {
                *keep.borrow_mut() = req.syncer().cloned();
                async move { Ok(req.into_data()) }
            })),
            &registry,
        )
        .unwrap();
        view.render(json!({"items": [1]})).await.unwrap();

        let syncer = slot.borrow().clone().unwrap();
        syncer.sync(json!({"items": [1, 2]})).await.unwrap();

        assert_eq!(adapter.sync_count(), 1);
        assert_eq!(view.data(), json!({"items": [1, 2]}));
    }
}
