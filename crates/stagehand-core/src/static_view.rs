use crate::error::{Error, Result};
use crate::middleware::MiddlewareRef;
use crate::owner::{ObjectWithView, Overrides, Owner, ViewOwner};
use crate::registry::Registry;
use crate::view::{Holder, Locator, View};
use std::fmt;
use std::rc::Rc;

/// Declaration of a view that persists across navigation (header, sidebar).
#[derive(Clone, Default)]
pub struct StaticViewOptions {
    /// Name, unique per director.
    pub name: String,
    /// Name of the view definition to build from.
    pub view: String,
    /// Attachment point.  Falls back to the definition's holder, then to
    /// the director's static view defaults.
    pub holder: Option<Holder>,
    /// Security middleware run before the definition's own.
    pub security: Vec<MiddlewareRef>,
    /// Data middleware run before the definition's own.
    pub data: Vec<MiddlewareRef>,
}

impl StaticViewOptions {
    /// Declare static view `name` built from definition `view`.
    pub fn new(name: impl Into<String>, view: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view: view.into(),
            ..Self::default()
        }
    }

    /// Set the holder.
    pub fn holder(mut self, holder: impl Into<Holder>) -> Self {
        self.holder = Some(holder.into());
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
}

impl fmt::Debug for StaticViewOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticViewOptions")
            .field("name", &self.name)
            .field("view", &self.view)
            .field("holder", &self.holder)
            .finish()
    }
}

/// A named view owned by a director.
#[derive(Clone, Debug)]
pub struct StaticView {
    inner: ObjectWithView,
}

impl StaticView {
    /// Build from `options`.  `fallback_holder` is used when neither the
    /// options nor the definition name a holder.
    pub(crate) fn new(
        options: StaticViewOptions,
        registry: &Rc<Registry>,
        fallback_holder: Option<&str>,
    ) -> Result<Self> {
        let spec = registry
            .view_spec(&options.view)
            .ok_or_else(|| Error::resolution("View", options.view.clone()))?;
        let holder = options
            .holder
            .or(spec.holder)
            .or_else(|| fallback_holder.map(Holder::from))
            .ok_or_else(|| Error::construction("StaticView", "no holder specified"))?;
        let locator = Locator::top_level("StaticView", holder, registry.document())?;
        let overrides = Overrides {
            name: options.name,
            security: options.security,
            data: options.data,
        };
        let inner = ObjectWithView::from_spec(
            "StaticView",
            registry,
            &options.view,
            overrides,
            locator,
            Owner::Director,
        )?;
        Ok(Self { inner })
    }
}

impl ViewOwner for StaticView {
    fn view(&self) -> &View {
        self.inner.view()
    }
}
