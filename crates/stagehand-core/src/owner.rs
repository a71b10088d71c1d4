//! Objects that own a view and expose its lifecycle.
//!
//! [`SubView`](crate::sub_view::SubView) and
//! [`StaticView`](crate::static_view::StaticView) are not views themselves:
//! each wraps an [`ObjectWithView`], which builds a [`View`] from a named
//! definition, and forwards the lifecycle through the [`ViewOwner`]
//! trait.

use crate::dom::Element;
use crate::error::{Error, Result};
use crate::middleware::MiddlewareRef;
use crate::registry::Registry;
use crate::view::{Locator, RenderFlags, RenderOutcome, View, WeakView};
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::rc::Rc;

/// The logical owner recorded on a wrapped view.
#[derive(Clone)]
pub enum Owner {
    /// A parent view (for sub views).
    View(WeakView),
    /// The director (for static views).
    Director,
}

impl std::fmt::Debug for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::View(parent) => match parent.upgrade() {
                Some(view) => f.debug_tuple("View").field(&view.name()).finish(),
                None => f.write_str("View(<dropped>)"),
            },
            Owner::Director => f.write_str("Director"),
        }
    }
}

/// Lifecycle delegation to an owned [`View`].
///
/// Implementors only provide [`view`](ViewOwner::view); everything else
/// forwards to it.
pub trait ViewOwner {
    /// The owned view.
    fn view(&self) -> &View;

    /// Name of the owned view.
    fn name(&self) -> &str {
        self.view().name()
    }

    /// See [`View::render`].
    fn render(&self, data: Value) -> LocalBoxFuture<'static, Result<RenderOutcome>> {
        self.view().render(data)
    }

    /// See [`View::render_with`].
    fn render_with(
        &self,
        data: Value,
        flags: RenderFlags,
    ) -> LocalBoxFuture<'static, Result<RenderOutcome>> {
        self.view().render_with(data, flags)
    }

    /// See [`View::sync`].
    fn sync(&self, data: Value) -> LocalBoxFuture<'static, Result<()>> {
        self.view().sync(data)
    }

    /// See [`View::sync_with`].
    fn sync_with(&self, data: Value, replace: bool) -> LocalBoxFuture<'static, Result<()>> {
        self.view().sync_with(data, replace)
    }

    /// See [`View::show`].
    fn show(&self) {
        self.view().show();
    }

    /// See [`View::hide`].
    fn hide(&self) {
        self.view().hide();
    }

    /// See [`View::remove`].
    fn remove(&self) {
        self.view().remove();
    }

    /// The owned view's element.
    fn element(&self) -> Option<Element> {
        self.view().element()
    }

    /// The owned view's holder, if it resolves right now.
    fn holder(&self) -> Option<Element> {
        self.view().holder().ok()
    }
}

/// Middleware and naming overrides applied on top of a view definition.
#[derive(Clone, Default)]
pub(crate) struct Overrides {
    pub(crate) name: String,
    pub(crate) security: Vec<MiddlewareRef>,
    pub(crate) data: Vec<MiddlewareRef>,
}

/// A view built from a registered definition, with its owner recorded.
#[derive(Clone, Debug)]
pub struct ObjectWithView {
    view: View,
    owner: Owner,
}

impl ObjectWithView {
    /// Build from the definition called `spec`.
    ///
    /// The definition's name is replaced by `overrides.name` and its
    /// middleware lists are appended after the overriding ones.
    pub(crate) fn from_spec(
        kind: &'static str,
        registry: &Rc<Registry>,
        spec: &str,
        overrides: Overrides,
        locator: Locator,
        owner: Owner,
    ) -> Result<Self> {
        if overrides.name.trim().is_empty() {
            return Err(Error::construction(kind, "no name specified"));
        }
        let mut options = registry
            .view_spec(spec)
            .ok_or_else(|| Error::resolution("View", spec))?;
        options.name = overrides.name;
        options.holder = None;
        options.security = overrides.security.into_iter().chain(options.security).collect();
        options.data = overrides.data.into_iter().chain(options.data).collect();

        let view = View::with_locator(options, registry, locator)?;
        view.set_owner(owner.clone());
        Ok(Self { view, owner })
    }

    /// The logical owner.
    pub fn owner(&self) -> &Owner {
        &self.owner
    }
}

impl ViewOwner for ObjectWithView {
    fn view(&self) -> &View {
        &self.view
    }
}
