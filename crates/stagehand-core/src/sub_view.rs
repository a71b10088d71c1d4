use crate::dom::Selector;
use crate::error::{Error, Result};
use crate::middleware::MiddlewareRef;
use crate::owner::{ObjectWithView, Overrides, Owner, ViewOwner};
use crate::view::{Locator, View, WeakView};
use std::fmt;

/// Declaration of a sub view inside a parent view's definition.
#[derive(Clone, Default)]
pub struct SubViewOptions {
    /// Name, unique under one parent.
    pub name: String,
    /// Name of the view definition to build from.
    pub view: String,
    /// Selector resolved inside the parent's element.
    pub holder: String,
    /// Security middleware run before the definition's own.
    pub security: Vec<MiddlewareRef>,
    /// Data middleware run before the definition's own.
    pub data: Vec<MiddlewareRef>,
}

impl SubViewOptions {
    /// Declare sub view `name`, built from definition `view` and attached
    /// under `holder` inside the parent.
    pub fn new(name: impl Into<String>, view: impl Into<String>, holder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            view: view.into(),
            holder: holder.into(),
            ..Self::default()
        }
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

impl fmt::Debug for SubViewOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubViewOptions")
            .field("name", &self.name)
            .field("view", &self.view)
            .field("holder", &self.holder)
            .finish()
    }
}

/// A view nested inside another view's element.
///
/// The holder selector is evaluated against the parent's *current* element
/// every time the sub view renders, so a parent that replaces its element on
/// sync still hosts its sub views correctly.  The parent reference is weak.
#[derive(Clone, Debug)]
pub struct SubView {
    inner: ObjectWithView,
    parent: WeakView,
    selector: String,
}

impl SubView {
    /// The parent view, if still alive.
    pub fn parent_view(&self) -> Option<View> {
        self.parent.upgrade()
    }

    /// The holder selector, relative to the parent's element.
    pub fn holder_selector(&self) -> &str {
        &self.selector
    }
}

impl ViewOwner for SubView {
    fn view(&self) -> &View {
        self.inner.view()
    }
}

/// Builds sub views for a parent view.
///
/// Views receive their factory from the registry, which keeps the view
/// module independent of how sub views are constructed.
pub trait SubViewFactory {
    /// Create the sub view described by `options` under `parent`.
    fn create_sub_view(&self, parent: &View, options: &SubViewOptions) -> Result<SubView>;
}

/// The factory used unless a registry is given another one.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSubViewFactory;

impl SubViewFactory for DefaultSubViewFactory {
    fn create_sub_view(&self, parent: &View, options: &SubViewOptions) -> Result<SubView> {
        if options.name.trim().is_empty() {
            return Err(Error::construction("SubView", "no name specified"));
        }
        if options.holder.trim().is_empty() {
            return Err(Error::construction("SubView", "no holder specified"));
        }
        Selector::parse(&options.holder)?;
        if parent.sub_view(&options.name).is_some() {
            return Err(Error::duplicate("SubView", options.name.clone()));
        }

        let locator = Locator::Within {
            parent: parent.downgrade(),
            selector: options.holder.clone(),
        };
        let overrides = Overrides {
            name: options.name.clone(),
            security: options.security.clone(),
            data: options.data.clone(),
        };
        let inner = ObjectWithView::from_spec(
            "SubView",
            parent.registry(),
            &options.view,
            overrides,
            locator,
            Owner::View(parent.downgrade()),
        )?;
        Ok(SubView {
            inner,
            parent: parent.downgrade(),
            selector: options.holder.clone(),
        })
    }
}
