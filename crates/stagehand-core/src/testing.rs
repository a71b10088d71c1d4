//! Headless helpers for exercising views without a real adapter.
//!
//! [`RecordingAdapter`] records every render, sync and remove it receives,
//! so tests can assert on call counts and on the exact data each call saw.
//! [`render_document`] draws the visible part of a [`Document`] into a
//! `ratatui` buffer and returns it as plain text.
//!
//! # Example
//!
//! ```rust,ignore
//! use stagehand_core::testing::{render_document, RecordingAdapter};
//!
//! let adapter = RecordingAdapter::new("recording");
//! registry.register_adapter(adapter.clone())?;
//! let view = registry.create_view(
//!     ViewOptions::new("home").template(Template::new(())).adapter("recording"),
//! )?;
//! view.render(json!({"x": 1})).await?;
//! assert_eq!(adapter.render_count(), 1);
//! assert!(render_document(registry.document(), 40, 5).contains(r#"{"x":1}"#));
//! ```

use crate::adapter::{default_sync, Adapter, AdapterFuture};
use crate::dom::{Document, Element, Markup};
use crate::error::AdapterError;
use crate::view::View;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::text::{Line, Text};
use ratatui::widgets::{Paragraph, Widget};
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;

/// One call received by a [`RecordingAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// `render(view, data, existing)`.
    Render {
        /// View name.
        view: String,
        /// Data passed in.
        data: Value,
        /// Whether an existing element was offered.
        had_existing: bool,
    },
    /// `sync(view, data)`.
    Sync {
        /// View name.
        view: String,
        /// Data passed in.
        data: Value,
    },
    /// `remove(view)`.
    Remove {
        /// View name.
        view: String,
    },
}

/// An adapter that records its calls.
///
/// Templates that are a [`Markup`] are built as-is; any other template yields
/// a `<div class="payload">` whose text is the compact JSON of the data.
/// Every element gets a `data-view` attribute with the view name.  Sync
/// updates the element in place unless built with
/// [`replacing`](RecordingAdapter::replacing), in which case the generic
/// remove-then-render sync is used.
pub struct RecordingAdapter {
    name: String,
    in_place: bool,
    calls: RefCell<Vec<Call>>,
}

impl RecordingAdapter {
    /// A recording adapter that syncs in place.
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            in_place: true,
            calls: RefCell::new(Vec::new()),
        })
    }

    /// A recording adapter that syncs by re-rendering.
    pub fn replacing(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            in_place: false,
            calls: RefCell::new(Vec::new()),
        })
    }

    /// All calls so far.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Number of render calls.
    pub fn render_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Render { .. }))
    }

    /// Number of sync calls.
    pub fn sync_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Sync { .. }))
    }

    /// Number of remove calls.
    pub fn remove_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Remove { .. }))
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    fn build(&self, view: &View, data: &Value) -> Element {
        let element = match view.template().downcast_ref::<Markup>() {
            Some(markup) => view.document().build(markup),
            None => {
                let element = view
                    .document()
                    .build(&Markup::element("div").class("payload"));
                element.set_text(data.to_string());
                element
            }
        };
        element.set_attr("data-view", view.name());
        element
    }
}

impl Adapter for RecordingAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(
        &self,
        view: &View,
        data: &Value,
        existing: Option<Element>,
    ) -> Result<Element, AdapterError> {
        self.calls.borrow_mut().push(Call::Render {
            view: view.name().to_string(),
            data: data.clone(),
            had_existing: existing.is_some(),
        });
        if let Some(existing) = existing {
            if !existing.is_connected() {
                view.holder()?.append_child(&existing);
            }
            return Ok(existing);
        }
        let element = self.build(view, data);
        view.holder()?.append_child(&element);
        Ok(element)
    }

    fn sync(&self, view: &View, data: &Value) -> AdapterFuture {
        self.calls.borrow_mut().push(Call::Sync {
            view: view.name().to_string(),
            data: data.clone(),
        });
        if !self.in_place {
            return default_sync(self, view, data);
        }
        let result = view.element().ok_or(AdapterError::NotMounted).map(|element| {
            if element.has_class("payload") {
                element.set_text(data.to_string());
            }
            element
        });
        Box::pin(futures::future::ready(result))
    }

    fn remove(&self, view: &View) {
        self.calls.borrow_mut().push(Call::Remove {
            view: view.name().to_string(),
        });
        if let Some(element) = view.element() {
            element.destroy();
        }
    }
}

/// Draw the visible text of `document` into a `width` x `height` buffer and
/// return it as a string.
///
/// Each visible element with its own text contributes one line, indented
/// two spaces per nesting level below `body`.  Elements hidden with
/// `display: none` are skipped together with their subtree.  Trailing
/// whitespace is trimmed from every row and trailing empty rows are dropped.
pub fn render_document(document: &Document, width: u16, height: u16) -> String {
    let mut lines: Vec<Line<'static>> = Vec::new();
    document.body().visit_visible(0, &mut |depth, element| {
        let text = element.own_text();
        let text = text.trim();
        if !text.is_empty() {
            let indent = "  ".repeat(depth.saturating_sub(1));
            lines.push(Line::from(format!("{indent}{text}")));
        }
    });

    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    Paragraph::new(Text::from(lines)).render(area, &mut buf);

    let mut rows = Vec::with_capacity(height as usize);
    for y in area.top()..area.bottom() {
        let mut row = String::new();
        for x in area.left()..area.right() {
            row.push_str(buf[(x, y)].symbol());
        }
        rows.push(row.trim_end().to_string());
    }
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
    rows.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_skips_hidden_subtrees() {
        let doc = Document::new();
        let body = doc.body();
        body.append_markup(
            &Markup::element("header").child(Markup::element("h1").content("Title")),
        );
        let main = body.append_markup(
            &Markup::element("main").child(Markup::element("p").content("Secret")),
        );
        main.set_style("display", "none");

        let out = render_document(&doc, 20, 4);
        assert_eq!(out, "  Title");
    }

    #[test]
    fn preview_clips_to_width() {
        let doc = Document::new();
        doc.body()
            .append_markup(&Markup::element("p").content("abcdefghij"));
        assert_eq!(render_document(&doc, 4, 1), "abcd");
    }
}
