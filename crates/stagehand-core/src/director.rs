//! The navigation controller.
//!
//! A [`Director`] owns a [`Registry`], indexes view instances by name, keeps
//! the static views that persist across navigation, and switches what is on
//! screen:
//!
//! * [`set_current_view`](Director::set_current_view) hides the current view
//!   and renders the next one, showing it only once its render succeeded;
//! * [`set_static_views`](Director::set_static_views) replaces the set of
//!   visible static views, rendering them concurrently;
//! * [`set_composition`](Director::set_composition) does both at once.
//!
//! Expected middleware rejections never fail these calls: the affected view
//! simply stays hidden and the [`RenderOutcome`] says why.
//!
//! # Example
//!
//! ```rust,ignore
//! let director = Director::new(
//!     DirectorOptions::new(document)
//!         .adapter(my_adapter)
//!         .view(ViewOptions::new("home").template(home_template).adapter("mine"))
//!         .view(ViewOptions::new("header").template(header_template).adapter("mine"))
//!         .static_view(StaticViewOptions::new("header", "header").holder("#top"))
//!         .composition(Composition::named("landing").view("home").static_views(["header"])),
//! )?;
//!
//! director.set_composition("landing", json!({"user": "ada"})).await?;
//! ```

use crate::adapter::Adapter;
use crate::config::DirectorConfig;
use crate::dom::Document;
use crate::error::{Error, Result};
use crate::middleware::{MiddlewareRef, MiddlewareRunner};
use crate::owner::ViewOwner;
use crate::registry::Registry;
use crate::static_view::{StaticView, StaticViewOptions};
use crate::sub_view::SubViewFactory;
use crate::view::{RenderOutcome, View, ViewOptions};
use futures::future::join_all;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// Ways to name the target of [`Director::set_current_view`].
#[derive(Clone, Debug)]
pub enum ViewRef {
    /// An existing instance, or else the definition, with this name.
    Name(String),
    /// Options: reuse the first instance with the same name or build one.
    Options(ViewOptions),
    /// A specific instance.
    View(View),
}

impl From<&str> for ViewRef {
    fn from(name: &str) -> Self {
        ViewRef::Name(name.to_string())
    }
}

impl From<String> for ViewRef {
    fn from(name: String) -> Self {
        ViewRef::Name(name)
    }
}

impl From<ViewOptions> for ViewRef {
    fn from(options: ViewOptions) -> Self {
        ViewRef::Options(options)
    }
}

impl From<View> for ViewRef {
    fn from(view: View) -> Self {
        ViewRef::View(view)
    }
}

/// A current view and a set of static views switched together.
///
/// Leaving `view` or `static_views` unset leaves that part of the screen as
/// it is; an empty static view list hides every static view.
#[derive(Clone, Debug, Default)]
pub struct Composition {
    /// Name, required for registration.
    pub name: Option<String>,
    /// The current view to show.
    pub view: Option<ViewRef>,
    /// The static views to show, by name.
    pub static_views: Option<Vec<String>>,
}

impl Composition {
    /// An anonymous composition.
    pub fn new() -> Self {
        Self::default()
    }

    /// A composition that can be registered under `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the current view.
    pub fn view(mut self, view: impl Into<ViewRef>) -> Self {
        self.view = Some(view.into());
        self
    }

    /// Set the static views.
    pub fn static_views<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_views = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// Ways to name the target of [`Director::set_composition`].
#[derive(Clone, Debug)]
pub enum CompositionRef {
    /// A registered composition.
    Name(String),
    /// An ad-hoc composition.
    Composition(Composition),
}

impl From<&str> for CompositionRef {
    fn from(name: &str) -> Self {
        CompositionRef::Name(name.to_string())
    }
}

impl From<String> for CompositionRef {
    fn from(name: String) -> Self {
        CompositionRef::Name(name)
    }
}

impl From<Composition> for CompositionRef {
    fn from(composition: Composition) -> Self {
        CompositionRef::Composition(composition)
    }
}

/// What [`Director::set_composition`] did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompositionOutcome {
    /// Outcome of the current view branch, if the composition had one.
    pub view: Option<RenderOutcome>,
    /// Outcome per static view, in request order.
    pub static_views: Vec<(String, RenderOutcome)>,
}

/// Everything a [`Director`] is set up with.
///
/// ```rust,ignore
/// let options = DirectorOptions::new(document)
///     .config(DirectorConfig::from_json(CONFIG)?)
///     .security(require_login)
///     .adapter(template_adapter);
/// ```
pub struct DirectorOptions {
    document: Document,
    config: DirectorConfig,
    adapters: Vec<Rc<dyn Adapter>>,
    views: Vec<ViewOptions>,
    static_views: Vec<StaticViewOptions>,
    compositions: Vec<Composition>,
    middleware: MiddlewareRunner,
    sub_view_factory: Option<Rc<dyn SubViewFactory>>,
}

impl DirectorOptions {
    /// Options for a director rendering into `document`.
    pub fn new(document: Document) -> Self {
        Self {
            document,
            config: DirectorConfig::default(),
            adapters: Vec::new(),
            views: Vec::new(),
            static_views: Vec::new(),
            compositions: Vec::new(),
            middleware: MiddlewareRunner::new(),
            sub_view_factory: None,
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: DirectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an adapter.
    pub fn adapter(mut self, adapter: Rc<dyn Adapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Register several adapters.
    pub fn adapters(mut self, adapters: impl IntoIterator<Item = Rc<dyn Adapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    /// Add a view definition.
    pub fn view(mut self, options: ViewOptions) -> Self {
        self.views.push(options);
        self
    }

    /// Define a static view, created on first use.
    pub fn static_view(mut self, options: StaticViewOptions) -> Self {
        self.static_views.push(options);
        self
    }

    /// Register a composition.
    pub fn composition(mut self, composition: Composition) -> Self {
        self.compositions.push(composition);
        self
    }

    /// Add a global security middleware.
    pub fn security(mut self, middleware: MiddlewareRef) -> Self {
        self.middleware = self.middleware.security(middleware);
        self
    }

    /// Add a global data middleware.
    pub fn data(mut self, middleware: MiddlewareRef) -> Self {
        self.middleware = self.middleware.data(middleware);
        self
    }

    /// Replace the sub view factory.
    pub fn sub_view_factory(mut self, factory: Rc<dyn SubViewFactory>) -> Self {
        self.sub_view_factory = Some(factory);
        self
    }
}

/// Decides which views are on screen.
pub struct Director {
    registry: Rc<Registry>,
    config: DirectorConfig,
    views: RefCell<HashMap<String, Vec<View>>>,
    static_specs: RefCell<HashMap<String, StaticViewOptions>>,
    static_views: RefCell<BTreeMap<String, StaticView>>,
    compositions: RefCell<HashMap<String, Composition>>,
    current_view: RefCell<Option<View>>,
    current_static_views: RefCell<Vec<StaticView>>,
}

impl Director {
    /// Build a director.  Fails on invalid adapters, view definitions
    /// without a name, or unnamed compositions.
    pub fn new(options: DirectorOptions) -> Result<Self> {
        let mut builder = Registry::builder(options.document)
            .middleware(options.middleware)
            .defaults(options.config.view_defaults.clone());
        if let Some(factory) = options.sub_view_factory {
            builder = builder.sub_view_factory(factory);
        }

        let director = Director {
            registry: builder.build(),
            config: options.config,
            views: RefCell::new(HashMap::new()),
            static_specs: RefCell::new(HashMap::new()),
            static_views: RefCell::new(BTreeMap::new()),
            compositions: RefCell::new(HashMap::new()),
            current_view: RefCell::new(None),
            current_static_views: RefCell::new(Vec::new()),
        };
        for adapter in options.adapters {
            director.register_adapter(adapter)?;
        }
        for view in options.views {
            director.define_view(view)?;
        }
        for static_view in options.static_views {
            director.define_static_view(static_view)?;
        }
        for composition in options.compositions {
            director.register_composition(composition)?;
        }
        Ok(director)
    }

    /// The registry views are built from.
    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    /// The document views render into.
    pub fn document(&self) -> &Document {
        self.registry.document()
    }

    /// The configuration.
    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    /// Register an adapter.  If the name is taken the existing adapter is
    /// returned and `adapter` is dropped.
    pub fn register_adapter(&self, adapter: Rc<dyn Adapter>) -> Result<Rc<dyn Adapter>> {
        match self.registry.adapter(adapter.name()) {
            Some(existing) => Ok(existing),
            None => self.registry.register_adapter(adapter),
        }
    }

    /// Store a view definition; the first one for a name wins.
    pub fn define_view(&self, options: ViewOptions) -> Result<bool> {
        self.registry.define_view(options)
    }

    /// Return the first instance named like `options`, or build and index
    /// one.
    pub fn register_view(&self, options: ViewOptions) -> Result<View> {
        if let Some(existing) = self.first_view(&options.name) {
            return Ok(existing);
        }
        self.create_view(options)
    }

    /// Always build a new instance and index it under its name.
    pub fn create_view(&self, options: ViewOptions) -> Result<View> {
        let view = View::new(options.clone(), &self.registry)?;
        self.registry.define_view(options)?;
        self.index_view(&view);
        Ok(view)
    }

    /// Every instance indexed under `name`.
    pub fn views_named(&self, name: &str) -> Vec<View> {
        self.views.borrow().get(name).cloned().unwrap_or_default()
    }

    /// Define a static view to be created on first use.  The first
    /// definition of a name wins.
    pub fn define_static_view(&self, options: StaticViewOptions) -> Result<bool> {
        if options.name.trim().is_empty() {
            return Err(Error::construction("StaticView", "no name specified"));
        }
        let mut specs = self.static_specs.borrow_mut();
        if specs.contains_key(&options.name) {
            return Ok(false);
        }
        specs.insert(options.name.clone(), options);
        Ok(true)
    }

    /// Create a static view now.  Fails with [`Error::DuplicateName`] if a
    /// static view of that name exists.
    pub fn register_static_view(&self, options: StaticViewOptions) -> Result<StaticView> {
        if self.static_views.borrow().contains_key(&options.name) {
            return Err(Error::duplicate("StaticView", options.name));
        }
        let name = options.name.clone();
        let static_view = StaticView::new(
            options,
            &self.registry,
            self.config.static_view_defaults.holder.as_deref(),
        )?;
        tracing::debug!(static_view = %name, "registered static view");
        self.static_views
            .borrow_mut()
            .insert(name, static_view.clone());
        Ok(static_view)
    }

    /// The live static view called `name`.
    pub fn static_view(&self, name: &str) -> Option<StaticView> {
        self.static_views.borrow().get(name).cloned()
    }

    /// Register a composition; the first registration of a name wins.
    pub fn register_composition(&self, composition: Composition) -> Result<bool> {
        let name = match composition.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(Error::construction("Composition", "no name specified")),
        };
        let mut compositions = self.compositions.borrow_mut();
        if compositions.contains_key(&name) {
            return Ok(false);
        }
        compositions.insert(name, composition);
        Ok(true)
    }

    /// The registered composition called `name`.
    pub fn composition(&self, name: &str) -> Option<Composition> {
        self.compositions.borrow().get(name).cloned()
    }

    /// The current view.
    pub fn current_view(&self) -> Option<View> {
        self.current_view.borrow().clone()
    }

    /// The static views currently on screen.
    pub fn current_static_views(&self) -> Vec<StaticView> {
        self.current_static_views.borrow().clone()
    }

    /// Hide the current view without forgetting it.
    pub fn hide_current_view(&self) {
        if let Some(view) = self.current_view() {
            view.hide();
        }
    }

    /// Hide every current static view without forgetting them.
    pub fn hide_static_views(&self) {
        for static_view in self.current_static_views() {
            static_view.hide();
        }
    }

    /// Make `target` the current view and render it with `data`.
    ///
    /// The previous view is hidden first.  The new view is shown only once
    /// its render succeeded and only if no later call replaced it in the
    /// meantime.
    pub async fn set_current_view(
        &self,
        target: impl Into<ViewRef>,
        data: Value,
    ) -> Result<RenderOutcome> {
        self.hide_current_view();
        let view = self.ensure_view(target.into())?;
        *self.current_view.borrow_mut() = Some(view.clone());
        tracing::debug!(view = %view.name(), "switching current view");

        let outcome = view.render(data).await?;
        let still_current = self
            .current_view
            .borrow()
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&view));
        if !still_current {
            view.hide();
        } else if outcome.is_success() {
            view.show();
        }
        Ok(outcome)
    }

    /// Replace the visible static views with `names`, rendering them
    /// concurrently.
    ///
    /// Every name is resolved before anything renders.  Each static view is
    /// shown as soon as its own render succeeds; a failing one is logged and
    /// does not stop the others.  The first failure is returned once all
    /// renders have settled.
    pub async fn set_static_views<I, S>(
        &self,
        names: I,
        data: Value,
    ) -> Result<Vec<(String, RenderOutcome)>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hide_static_views();
        let mut requested: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !requested.contains(&name) {
                requested.push(name);
            }
        }
        let static_views = requested
            .iter()
            .map(|name| self.ensure_static_view(name))
            .collect::<Result<Vec<_>>>()?;
        *self.current_static_views.borrow_mut() = static_views.clone();

        let renders = static_views.into_iter().map(|static_view| {
            let data = data.clone();
            async move {
                let result = static_view.render(data).await;
                match &result {
                    Ok(outcome) if outcome.is_success() => static_view.show(),
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(static_view = %static_view.name(), error = %err, "static view failed to render");
                    }
                }
                (static_view.name().to_string(), result)
            }
        });

        let mut outcomes = Vec::new();
        let mut first_error = None;
        for (name, result) in join_all(renders).await {
            match result {
                Ok(outcome) => outcomes.push((name, outcome)),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(outcomes),
        }
    }

    /// Switch the current view and the static views together.
    ///
    /// Both branches run concurrently and both settle before this resolves.
    pub async fn set_composition(
        &self,
        target: impl Into<CompositionRef>,
        data: Value,
    ) -> Result<CompositionOutcome> {
        let composition = match target.into() {
            CompositionRef::Composition(composition) => composition,
            CompositionRef::Name(name) => self
                .composition(&name)
                .ok_or_else(|| Error::resolution("Composition", name))?,
        };
        let Composition {
            name,
            view,
            static_views,
        } = composition;
        tracing::debug!(composition = ?name, "applying composition");

        let view_data = data.clone();
        let view_branch = async move {
            match view {
                Some(view) => self.set_current_view(view, view_data).await.map(Some),
                None => Ok(None),
            }
        };
        let static_branch = async move {
            match static_views {
                Some(names) => self.set_static_views(names, data).await,
                None => Ok(Vec::new()),
            }
        };
        let (view, static_views) = futures::join!(view_branch, static_branch);
        Ok(CompositionOutcome {
            view: view?,
            static_views: static_views?,
        })
    }

    /// Sync `data` into the current view and every current static view,
    /// concurrently.  Middleware does not run.
    pub async fn sync(&self, data: Value) -> Result<()> {
        let mut syncs = Vec::new();
        if let Some(view) = self.current_view() {
            syncs.push(view.sync(data.clone()));
        }
        for static_view in self.current_static_views() {
            syncs.push(static_view.sync(data.clone()));
        }
        let mut first_error = None;
        for result in join_all(syncs).await {
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn first_view(&self, name: &str) -> Option<View> {
        self.views
            .borrow()
            .get(name)
            .and_then(|views| views.first().cloned())
    }

    fn index_view(&self, view: &View) {
        let mut views = self.views.borrow_mut();
        let list = views.entry(view.name().to_string()).or_default();
        if !list.iter().any(|existing| existing.ptr_eq(view)) {
            list.push(view.clone());
        }
    }

    fn ensure_view(&self, target: ViewRef) -> Result<View> {
        match target {
            ViewRef::View(view) => {
                self.index_view(&view);
                Ok(view)
            }
            ViewRef::Options(options) => self.register_view(options),
            ViewRef::Name(name) => {
                if let Some(existing) = self.first_view(&name) {
                    return Ok(existing);
                }
                let view = self.registry.create_view_from_spec(&name)?;
                self.index_view(&view);
                Ok(view)
            }
        }
    }

    fn ensure_static_view(&self, name: &str) -> Result<StaticView> {
        if let Some(existing) = self.static_view(name) {
            return Ok(existing);
        }
        let options = self
            .static_specs
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::resolution("StaticView", name))?;
        self.register_static_view(options)
    }
}

impl fmt::Debug for Director {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Director")
            .field("registry", &self.registry)
            .field("current_view", &self.current_view.borrow())
            .field("static_views", &self.static_views.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Template;
    use crate::dom::Markup;
    use crate::testing::RecordingAdapter;
    use serde_json::json;

    fn director() -> (Director, Rc<RecordingAdapter>) {
        let document = Document::new();
        document.body().append_markup(&Markup::element("div").id("top"));
        let adapter = RecordingAdapter::new("recording");
        let director = Director::new(
            DirectorOptions::new(document)
                .adapter(adapter.clone())
                .view(ViewOptions::new("home").template(Template::new(())).adapter("recording"))
                .view(ViewOptions::new("header").template(Template::new(())).adapter("recording"))
                .static_view(StaticViewOptions::new("header", "header").holder("#top")),
        )
        .unwrap();
        (director, adapter)
    }

    #[test]
    fn register_adapter_first_wins() {
        let (director, adapter) = director();
        let other = RecordingAdapter::new("recording");
        let kept = director.register_adapter(other).unwrap();
        let original: Rc<dyn Adapter> = adapter;
        assert!(Rc::ptr_eq(&kept, &original));
    }

    #[test]
    fn register_view_reuses_create_view_does_not() {
        let (director, _) = director();
        let spec = director.registry().view_spec("home").unwrap();
        let a = director.register_view(spec.clone()).unwrap();
        let b = director.register_view(spec.clone()).unwrap();
        let c = director.create_view(spec).unwrap();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(director.views_named("home").len(), 2);
    }

    #[test]
    fn register_static_view_rejects_live_duplicates() {
        let (director, _) = director();
        director
            .register_static_view(StaticViewOptions::new("nav", "header").holder("#top"))
            .unwrap();
        let err = director
            .register_static_view(StaticViewOptions::new("nav", "header").holder("#top"))
            .err();
        assert!(matches!(err, Some(Error::DuplicateName { kind: "StaticView", .. })));
    }

    #[test]
    fn compositions_need_a_name() {
        let (director, _) = director();
        assert!(matches!(
            director.register_composition(Composition::new().view("home")),
            Err(Error::Construction { .. })
        ));
        assert!(director.register_composition(Composition::named("a")).unwrap());
        assert!(!director.register_composition(Composition::named("a")).unwrap());
    }

    #[tokio::test]
    async fn unknown_targets_fail_with_resolution() {
        let (director, adapter) = director();
        assert!(matches!(
            director.set_current_view("missing", json!({})).await,
            Err(Error::Resolution { kind: "View", .. })
        ));
        assert!(matches!(
            director.set_static_views(["header", "missing"], json!({})).await,
            Err(Error::Resolution { kind: "StaticView", .. })
        ));
        assert!(matches!(
            director.set_composition("missing", json!({})).await,
            Err(Error::Resolution { kind: "Composition", .. })
        ));
        assert_eq!(adapter.render_count(), 0);
    }

    #[tokio::test]
    async fn sync_reaches_current_and_static_views() {
        let (director, adapter) = director();
        director.set_current_view("home", json!({"a": 1})).await.unwrap();
        director.set_static_views(["header"], json!({"a": 1})).await.unwrap();
        director.sync(json!({"b": 2})).await.unwrap();

        assert_eq!(adapter.render_count(), 2);
        assert_eq!(adapter.sync_count(), 2);
        assert_eq!(
            director.current_view().unwrap().data(),
            json!({"a": 1, "b": 2})
        );
    }
}
