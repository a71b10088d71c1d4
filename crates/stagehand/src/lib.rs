//! **stagehand** -- view composition with pluggable rendering adapters.
//!
//! This is the umbrella crate that re-exports everything needed to build a
//! stagehand application from a single dependency:
//!
//! ```toml
//! [dependencies]
//! stagehand = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`stagehand_core`] are available at the crate root
//!   ([`View`], [`Director`], [`Adapter`], [`Registry`], [`MiddlewareRunner`],
//!   etc.).
//! * The [`adapters`] module re-exports the built-in adapters from
//!   [`stagehand_adapters`].
//! * [`serde_json`] and [`futures`] are re-exported so downstream crates do
//!   not need to depend on them directly.
//!
//! # Quick start
//!
//! ```ignore
//! use stagehand::adapters::template;
//! use stagehand::{Director, DirectorOptions, Document, Markup, ViewOptions};
//! use serde_json::json;
//!
//! let director = stagehand::director_with_builtins(
//!     DirectorOptions::new(Document::new()).view(
//!         ViewOptions::new("home")
//!             .adapter("template")
//!             .template(template(|data| Markup::element("h1").content(data["title"].to_string()))),
//!     ),
//! )?;
//! director.set_current_view("home", json!({"title": "Welcome"})).await?;
//! ```

pub use stagehand_core::*;
pub mod adapters {
    pub use stagehand_adapters::*;
}

// Re-export dependencies for use in demos and downstream crates
pub use futures;
pub use serde_json;

/// Build a director with the template and component adapters already
/// registered, plus a tag adapter with an empty library.
///
/// Adapters passed in `options` are registered first and win on name
/// clashes.
pub fn director_with_builtins(options: DirectorOptions) -> Result<Director> {
    director_with_tags(options, adapters::TagLibrary::new())
}

/// Like [`director_with_builtins`], with a tag adapter over `tags`.
pub fn director_with_tags(options: DirectorOptions, tags: adapters::TagLibrary) -> Result<Director> {
    let director = Director::new(options)?;
    for adapter in adapters::builtin(tags) {
        director.register_adapter(adapter)?;
    }
    tracing::debug!(adapters = ?director.registry().adapter_names(), "director ready");
    Ok(director)
}
