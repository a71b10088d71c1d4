use crate::dom::{Element, Event, ListenerId};
use crate::error::{Error, Result};
use crate::view::View;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// A view-level event handler.  Receives the event and the view it was bound
/// for.
pub type HandlerFn = Rc<dyn Fn(&Event, &View)>;

/// What an entry in a view's event map points at.
///
/// Event maps are keyed by `"type"` or `"type selector"`, e.g. `"click"` or
/// `"click .save"`.  The value is either the name of one of the view's
/// methods or a handler function.
///
/// ```rust,ignore
/// let options = ViewOptions::new("form")
///     .method("form.submit", |_ev, view| { /* ... */ })
///     .on("click .save", "form.submit")
///     .on("keyup input", Handler::func(|ev, _view| println!("{}", ev.event_type())));
/// ```
#[derive(Clone)]
pub enum Handler {
    /// Look up a method on the view by its (possibly dotted) name.
    Named(String),
    /// Call this function.
    Func(HandlerFn),
}

impl Handler {
    /// Wrap a closure.
    pub fn func(f: impl Fn(&Event, &View) + 'static) -> Self {
        Handler::Func(Rc::new(f))
    }
}

impl From<&str> for Handler {
    fn from(name: &str) -> Self {
        Handler::Named(name.to_string())
    }
}

impl From<String> for Handler {
    fn from(name: String) -> Self {
        Handler::Named(name)
    }
}

impl From<HandlerFn> for Handler {
    fn from(f: HandlerFn) -> Self {
        Handler::Func(f)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Handler::Func(_) => f.write_str("Func(..)"),
        }
    }
}

/// A view's named handlers, nested by namespace.
///
/// Names are dotted paths: `"form.save"` is the `save` handler inside the
/// `form` table.  Registering a path creates the intermediate tables.
///
/// ```rust,ignore
/// let methods = MethodTable::new()
///     .method("close", |_ev, view| view.hide())
///     .table("form", MethodTable::new().method("save", save_form));
/// assert!(methods.get("form.save").is_some());
/// ```
#[derive(Clone, Default)]
pub struct MethodTable {
    entries: BTreeMap<String, MethodEntry>,
}

#[derive(Clone)]
enum MethodEntry {
    Handler(HandlerFn),
    Table(MethodTable),
}

impl MethodTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler at `path`.
    pub fn method(mut self, path: &str, f: impl Fn(&Event, &View) + 'static) -> Self {
        self.insert(path, Rc::new(f));
        self
    }

    /// Mount `table` under `name`, replacing whatever was there.
    pub fn table(mut self, name: impl Into<String>, table: MethodTable) -> Self {
        self.entries.insert(name.into(), MethodEntry::Table(table));
        self
    }

    /// Store `f` at the dotted `path`.  A handler sitting where a namespace
    /// is needed is replaced by an empty table.
    pub fn insert(&mut self, path: &str, f: HandlerFn) {
        let segments: Vec<&str> = path.split('.').collect();
        self.insert_segments(&segments, f);
    }

    fn insert_segments(&mut self, segments: &[&str], f: HandlerFn) {
        match segments {
            [] => {}
            [name] => {
                self.entries.insert(name.to_string(), MethodEntry::Handler(f));
            }
            [namespace, rest @ ..] => {
                let entry = self
                    .entries
                    .entry(namespace.to_string())
                    .or_insert_with(|| MethodEntry::Table(MethodTable::new()));
                match entry {
                    MethodEntry::Table(table) => table.insert_segments(rest, f),
                    MethodEntry::Handler(_) => {
                        let mut table = MethodTable::new();
                        table.insert_segments(rest, f);
                        *entry = MethodEntry::Table(table);
                    }
                }
            }
        }
    }

    /// Resolve a dotted `path` segment by segment.
    pub fn get(&self, path: &str) -> Option<HandlerFn> {
        let mut segments = path.split('.');
        let last = segments.next_back()?;
        let mut table = self;
        for segment in segments {
            match table.entries.get(segment)? {
                MethodEntry::Table(next) => table = next,
                MethodEntry::Handler(_) => return None,
            }
        }
        match table.entries.get(last)? {
            MethodEntry::Handler(f) => Some(f.clone()),
            MethodEntry::Table(_) => None,
        }
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, entry) in &self.entries {
            match entry {
                MethodEntry::Handler(_) => map.entry(name, &"fn"),
                MethodEntry::Table(table) => map.entry(name, table),
            };
        }
        map.finish()
    }
}

/// Split `"type selector"` on the first space.
fn parse_key(key: &str) -> Option<(&str, Option<&str>)> {
    let key = key.trim();
    let (event_type, selector) = match key.split_once(' ') {
        Some((ty, rest)) => (ty, Some(rest.trim()).filter(|s| !s.is_empty())),
        None => (key, None),
    };
    (!event_type.is_empty()).then_some((event_type, selector))
}

/// Attach every listener declared in the view's event map to its element.
///
/// Listeners from a previous binding are removed first.  Every handler and
/// target is resolved before anything is attached, so a failing entry leaves
/// the view without listeners rather than half-bound.
pub(crate) fn bind_events(view: &View) -> Result<()> {
    unbind_events(view);
    let Some(root) = view.element() else {
        return Ok(());
    };

    let mut resolved: Vec<(Element, String, HandlerFn)> = Vec::new();
    for (key, handler) in view.event_map() {
        let fail = |reason: String| Error::EventBinding {
            view: view.name().to_string(),
            key: key.clone(),
            reason,
        };
        let handler = match handler {
            Handler::Func(f) => f.clone(),
            Handler::Named(path) => view
                .method(path)
                .ok_or_else(|| fail(format!("no method at path '{path}'")))?,
        };
        let (event_type, selector) =
            parse_key(key).ok_or_else(|| fail("missing event type".to_string()))?;
        let target = match selector {
            Some(selector) => root
                .query_selector(selector)?
                .ok_or_else(|| fail(format!("selector '{selector}' matched nothing")))?,
            None => root.clone(),
        };
        resolved.push((target, event_type.to_string(), handler));
    }

    let mut bound: Vec<(Element, ListenerId)> = Vec::with_capacity(resolved.len());
    for (target, event_type, handler) in resolved {
        let weak = view.downgrade();
        let id = target.add_event_listener(
            &event_type,
            Rc::new(move |event: &Event| {
                if let Some(view) = weak.upgrade() {
                    handler(event, &view);
                }
            }),
        );
        bound.push((target, id));
    }
    tracing::trace!(view = %view.name(), listeners = bound.len(), "bound events");
    view.store_listeners(bound);
    Ok(())
}

/// Remove every listener attached by [`bind_events`].
pub(crate) fn unbind_events(view: &View) {
    for (element, id) in view.take_listeners() {
        element.remove_event_listener(id);
    }
}
