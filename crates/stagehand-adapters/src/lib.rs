//! Built-in adapters for **stagehand**.
//!
//! Every adapter in this crate implements [`stagehand_core::Adapter`] over the
//! in-memory [`Document`](stagehand_core::Document), so any of them can back a
//! [`View`](stagehand_core::View) or be registered on a
//! [`Director`](stagehand_core::Director).
//!
//! # Adapters
//!
//! | Module | Name | Description |
//! |--------|------|-------------|
//! | [`template`] | `"template"` | Function from data to markup; every sync builds a fresh element |
//! | [`component`] | `"component"` | Stateful component patched in place; owns its own events |
//! | [`tag`] | `"tag"` | Named custom tags mounted from a [`TagLibrary`](tag::TagLibrary) |

pub mod component;
pub mod tag;
pub mod template;

pub use component::{component, Component, ComponentAdapter};
pub use tag::{TagAdapter, TagInstance, TagLibrary};
pub use template::{template, MarkupTemplate, TemplateAdapter};

use stagehand_core::Adapter;
use std::rc::Rc;

/// The template and component adapters plus a tag adapter over `tags`.
///
/// ```rust,ignore
/// let director = Director::new(
///     DirectorOptions::new(document).adapters(stagehand_adapters::builtin(TagLibrary::new())),
/// )?;
/// ```
pub fn builtin(tags: TagLibrary) -> Vec<Rc<dyn Adapter>> {
    vec![
        Rc::new(TemplateAdapter),
        Rc::new(ComponentAdapter),
        Rc::new(TagAdapter::new(tags)),
    ]
}
