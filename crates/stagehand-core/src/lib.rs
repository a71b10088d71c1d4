//! Core view lifecycle for **stagehand**.
//!
//! `stagehand-core` is the composition layer that sits between whatever
//! actually draws elements (an [`Adapter`]) and the application deciding
//! what should be on screen (a [`Director`]).  Views have one lifecycle no
//! matter which adapter renders them: render once, sync afterwards, show and
//! hide freely, remove to start over.
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Adapter`] | Pluggable strategy that creates, updates and removes a view's element |
//! | [`View`] | Unit of UI with the render / sync / show / hide / remove lifecycle |
//! | [`SubView`] | View nested inside a parent view's element |
//! | [`StaticView`] | Named view owned by a director that survives navigation |
//! | [`Director`] | Switches the current view, static views and compositions |
//! | [`MiddlewareRunner`] | Security and data pipelines run before every render |
//! | [`Registry`] | Document, adapters, view definitions and defaults |
//! | [`RecordingAdapter`](testing::RecordingAdapter) | Adapter that records its calls, for tests |
//!
//! # Lifecycle
//!
//! 1. **construct** -- [`View::new`] validates the template, holder and
//!    adapter before anything touches the document.
//! 2. **gate** -- the first [`View::render`] runs security middleware, then
//!    data middleware whose output is merged into the view's data.
//! 3. **render** -- the adapter builds the element under the holder, events
//!    are bound, and declared sub views render with the same data.
//! 4. **sync** -- later renders merge new data and let the adapter update the
//!    element in place, then sync every sub view.
//! 5. **remove** -- the element is detached and the view is unrendered again.
//!
//! # Quick example
//!
//! ```ignore
//! use stagehand_core::{AdapterOptions, Markup, Registry, Template, ViewOptions};
//! use serde_json::json;
//!
//! let registry = Registry::global();
//! registry.register_adapter(
//!     AdapterOptions::new("plain")
//!         .render(|view, data, _existing| {
//!             let holder = view.holder()?;
//!             let text = data["greeting"].as_str().unwrap_or_default();
//!             Ok(holder.append_markup(&Markup::element("p").content(text)))
//!         })
//!         .build()?,
//! )?;
//!
//! let view = registry.create_view(
//!     ViewOptions::new("hello").template(Template::new(())).adapter("plain"),
//! )?;
//! view.render(json!({"greeting": "hi"})).await?;
//! ```

pub mod adapter;
pub mod config;
pub mod data;
pub mod director;
pub mod dom;
pub mod error;
pub mod event;
pub mod middleware;
pub mod owner;
pub mod registry;
pub mod static_view;
pub mod sub_view;
pub mod testing;
pub mod view;

pub use adapter::{
    default_remove, default_sync, Adapter, AdapterFuture, AdapterOptions, AdapterRef,
    AdapterRegistry, Template,
};
pub use config::{DirectorConfig, ViewDefaults};
pub use data::Data;
pub use director::{
    Composition, CompositionOutcome, CompositionRef, Director, DirectorOptions, ViewRef,
};
pub use dom::{Document, Element, Event, Listener, ListenerId, Markup, Selector, SelectorError};
pub use error::{AdapterError, Error, Result};
pub use event::{Handler, HandlerFn, MethodTable};
pub use middleware::{
    from_fn, Middleware, MiddlewareError, MiddlewareFuture, MiddlewareRef, MiddlewareRunner,
    Pipeline, Rejection, Request, Stage, Syncer,
};
pub use owner::{ObjectWithView, Owner, ViewOwner};
pub use registry::{Registry, RegistryBuilder};
pub use static_view::{StaticView, StaticViewOptions};
pub use sub_view::{DefaultSubViewFactory, SubView, SubViewFactory, SubViewOptions};
pub use view::{Holder, RenderFlags, RenderOutcome, View, ViewOptions, WeakView};

/// Build a view on the thread-local default [`Registry`].
pub fn create_view(options: ViewOptions) -> Result<View> {
    Registry::global().create_view(options)
}
