//! In-memory document model used as the attachment surface for views.
//!
//! [`Document`] owns an arena of nodes rooted at a `body` element.
//! [`Element`] is a cheap, cloneable handle into that arena, so adapters and
//! views can hold on to elements without lifetimes.  The model covers exactly
//! what the view layer needs from a DOM: building subtrees from [`Markup`],
//! attaching and detaching, inline `display` styles for show/hide, simple CSS
//! selectors, and event listeners with bubbling dispatch.
//!
//! Detaching with [`Element::remove`] keeps a subtree alive so it can be
//! attached again.  [`Element::destroy`] and [`Element::clear_children`] free
//! the nodes together with their listeners.  Handles to freed nodes stay
//! valid to hold but behave as empty, detached elements; arena keys are
//! generational, so a freed slot that gets reused never aliases an old
//! handle.
//!
//! Supported selectors are compounds of a tag name (or `*`), `#id` and any
//! number of `.class` parts, combined with the descendant combinator
//! (whitespace).  Anything else is a [`SelectorError`].

use slotmap::SlotMap;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

slotmap::new_key_type! {
    struct NodeId;
}

/// Identifies a listener registered with [`Element::add_event_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callback invoked when an event reaches an element.
pub type Listener = Rc<dyn Fn(&Event)>;

enum NodeKind {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
        style: BTreeMap<String, String>,
    },
    Text(String),
}

struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    listeners: Vec<(ListenerId, String, Listener)>,
}

struct Tree {
    nodes: SlotMap<NodeId, Node>,
    body: NodeId,
    next_listener: u64,
}

impl Tree {
    fn push(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.insert(Node {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
        })
    }

    fn push_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            style: BTreeMap::new(),
        })
    }

    fn build(&mut self, markup: &Markup) -> NodeId {
        match markup {
            Markup::Element {
                tag,
                attrs,
                children,
            } => {
                let id = self.push_element(tag);
                if let NodeKind::Element { attrs: a, .. } = &mut self.nodes[id].kind {
                    for (k, v) in attrs {
                        a.insert(k.clone(), v.clone());
                    }
                }
                for child in children {
                    let child_id = self.build(child);
                    self.attach(id, child_id);
                }
                id
            }
            Markup::Text(text) => self.push(NodeKind::Text(text.clone())),
        }
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.nodes.get_mut(id).and_then(|node| node.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.children.retain(|c| *c != id);
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(child) {
            return;
        }
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    fn append_text(&mut self, parent: NodeId, text: String) {
        if self.nodes.contains_key(parent) {
            let node = self.push(NodeKind::Text(text));
            self.attach(parent, node);
        }
    }

    /// Drop `id` and its whole subtree from the arena.  Does not touch the
    /// parent's child list.
    fn free(&mut self, id: NodeId) {
        let mut pending = vec![id];
        while let Some(id) = pending.pop() {
            if let Some(node) = self.nodes.remove(id) {
                pending.extend(node.children);
            }
        }
    }

    fn destroy(&mut self, id: NodeId) {
        if id == self.body {
            return;
        }
        self.detach(id);
        self.free(id);
    }

    fn clear_children(&mut self, id: NodeId) {
        let children = self
            .nodes
            .get_mut(id)
            .map(|node| std::mem::take(&mut node.children))
            .unwrap_or_default();
        for child in children {
            self.free(child);
        }
    }

    fn is_element(&self, id: NodeId) -> bool {
        self.nodes
            .get(id)
            .is_some_and(|node| matches!(node.kind, NodeKind::Element { .. }))
    }

    fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|node| node.parent)
    }

    fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |p| self.parent(*p))
    }

    fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
    }

    fn descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(id) {
            if self.is_element(*child) {
                out.push(*child);
                self.descendants(*child, out);
            }
        }
    }

    fn text(&self, id: NodeId, out: &mut String) {
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::Text(t)) => out.push_str(t),
            Some(NodeKind::Element { .. }) => {
                for child in self.children(id) {
                    self.text(*child, out);
                }
            }
            None => {}
        }
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        match self.nodes.get(id).map(|node| &node.kind) {
            Some(NodeKind::Text(t)) => out.push_str(t),
            Some(NodeKind::Element { tag, attrs, style }) => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push_str(&format!(" {k}=\"{v}\""));
                }
                if !style.is_empty() {
                    let css: Vec<String> = style.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                    out.push_str(&format!(" style=\"{}\"", css.join("; ")));
                }
                out.push('>');
                for child in self.children(id) {
                    self.serialize(*child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
            None => {}
        }
    }
}

/// An in-memory document: an element tree rooted at `body`.
///
/// Cloning a `Document` clones the handle, not the tree.
#[derive(Clone)]
pub struct Document {
    tree: Rc<RefCell<Tree>>,
}

impl Document {
    /// Create an empty document containing only a `body` element.
    pub fn new() -> Self {
        let mut tree = Tree {
            nodes: SlotMap::with_key(),
            body: NodeId::default(),
            next_listener: 0,
        };
        tree.body = tree.push_element("body");
        Self {
            tree: Rc::new(RefCell::new(tree)),
        }
    }

    /// The `body` element.
    pub fn body(&self) -> Element {
        let body = self.tree.borrow().body;
        self.handle(body)
    }

    /// Create a detached element with the given tag name.
    pub fn create_element(&self, tag: &str) -> Element {
        let id = self.tree.borrow_mut().push_element(tag);
        self.handle(id)
    }

    /// Build a detached subtree from `markup` and return its root element.
    ///
    /// A bare [`Markup::Text`] root is wrapped in a `span`.
    pub fn build(&self, markup: &Markup) -> Element {
        let mut tree = self.tree.borrow_mut();
        let id = match markup {
            Markup::Text(_) => {
                let span = tree.push_element("span");
                let text = tree.build(markup);
                tree.attach(span, text);
                span
            }
            Markup::Element { .. } => tree.build(markup),
        };
        drop(tree);
        self.handle(id)
    }

    /// First element matching `selector`, searching `body` and its subtree.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>, SelectorError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// All elements matching `selector` in document order, `body` included.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, SelectorError> {
        let selector = Selector::parse(selector)?;
        let tree = self.tree.borrow();
        let mut candidates = vec![tree.body];
        tree.descendants(tree.body, &mut candidates);
        let found: Vec<NodeId> = candidates
            .into_iter()
            .filter(|id| selector.matches(&tree, *id))
            .collect();
        drop(tree);
        Ok(found.into_iter().map(|id| self.handle(id)).collect())
    }

    /// Serialized markup of the whole document.
    pub fn markup(&self) -> String {
        self.body().markup()
    }

    /// Number of live nodes, attached or not, text nodes included.
    pub fn node_count(&self) -> usize {
        self.tree.borrow().nodes.len()
    }

    /// Whether `element` belongs to this document.
    pub fn owns(&self, element: &Element) -> bool {
        Rc::ptr_eq(&self.tree, &element.tree)
    }

    fn handle(&self, id: NodeId) -> Element {
        Element {
            tree: self.tree.clone(),
            id,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.node_count())
            .finish()
    }
}

/// Handle to an element node inside a [`Document`].
///
/// Two handles are equal when they point at the same node of the same
/// document.
#[derive(Clone)]
pub struct Element {
    tree: Rc<RefCell<Tree>>,
    id: NodeId,
}

impl Element {
    /// The document this element belongs to.
    pub fn document(&self) -> Document {
        Document {
            tree: self.tree.clone(),
        }
    }

    /// Whether the node behind this handle has not been destroyed.
    pub fn is_alive(&self) -> bool {
        self.tree.borrow().nodes.contains_key(self.id)
    }

    /// Lower-case tag name.  Empty once destroyed.
    pub fn tag(&self) -> String {
        self.with_kind(|kind| match kind {
            NodeKind::Element { tag, .. } => tag.clone(),
            NodeKind::Text(_) => String::new(),
        })
        .unwrap_or_default()
    }

    /// Value of attribute `name`, if set.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.with_kind(|kind| match kind {
            NodeKind::Element { attrs, .. } => attrs.get(name).cloned(),
            NodeKind::Text(_) => None,
        })
        .flatten()
    }

    /// Set attribute `name` to `value`.
    pub fn set_attr(&self, name: &str, value: impl Into<String>) {
        self.with_kind_mut(|kind| {
            if let NodeKind::Element { attrs, .. } = kind {
                attrs.insert(name.to_string(), value.into());
            }
        });
    }

    /// Remove every attribute and inline style.
    pub fn clear_attrs(&self) {
        self.with_kind_mut(|kind| {
            if let NodeKind::Element { attrs, style, .. } = kind {
                attrs.clear();
                style.clear();
            }
        });
    }

    /// Whether the `class` attribute contains `class`.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|c| c.split_whitespace().any(|part| part == class))
    }

    /// Concatenated text content of this element's subtree.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.tree.borrow().text(self.id, &mut out);
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text(&self, text: impl Into<String>) {
        let mut tree = self.tree.borrow_mut();
        tree.clear_children(self.id);
        tree.append_text(self.id, text.into());
    }

    /// Append a text node.
    pub fn append_text(&self, text: impl Into<String>) {
        self.tree.borrow_mut().append_text(self.id, text.into());
    }

    /// Append `child`, detaching it from its previous parent first.
    ///
    /// Elements from another document, destroyed elements and ancestors of
    /// `self` are ignored.
    pub fn append_child(&self, child: &Element) {
        if !Rc::ptr_eq(&self.tree, &child.tree) || child.contains(self) {
            return;
        }
        self.tree.borrow_mut().attach(self.id, child.id);
    }

    /// Build `markup` and append it, returning the new element.
    pub fn append_markup(&self, markup: &Markup) -> Element {
        let element = self.document().build(markup);
        self.append_child(&element);
        element
    }

    /// Detach this element from its parent.  The subtree stays intact and
    /// can be attached again.
    pub fn remove(&self) {
        self.tree.borrow_mut().detach(self.id);
    }

    /// Detach this element and free it together with its subtree and every
    /// listener in it.  `body` cannot be destroyed.
    pub fn destroy(&self) {
        self.tree.borrow_mut().destroy(self.id);
    }

    /// Destroy every child node.
    pub fn clear_children(&self) {
        self.tree.borrow_mut().clear_children(self.id);
    }

    /// Parent element, if attached.
    pub fn parent(&self) -> Option<Element> {
        let parent = self.tree.borrow().parent(self.id)?;
        Some(self.sibling_handle(parent))
    }

    /// Child elements (text nodes are skipped).
    pub fn children(&self) -> Vec<Element> {
        let tree = self.tree.borrow();
        let ids: Vec<NodeId> = tree
            .children(self.id)
            .iter()
            .copied()
            .filter(|c| tree.is_element(*c))
            .collect();
        drop(tree);
        ids.into_iter().map(|id| self.sibling_handle(id)).collect()
    }

    /// Whether this element is reachable from the document's `body`.
    pub fn is_connected(&self) -> bool {
        let tree = self.tree.borrow();
        self.id == tree.body || tree.ancestors(self.id).any(|a| a == tree.body)
    }

    /// Whether `other` is this element or one of its descendants.
    pub fn contains(&self, other: &Element) -> bool {
        if !Rc::ptr_eq(&self.tree, &other.tree) {
            return false;
        }
        let tree = self.tree.borrow();
        tree.nodes.contains_key(other.id)
            && (other.id == self.id || tree.ancestors(other.id).any(|a| a == self.id))
    }

    /// First descendant matching `selector`.
    pub fn query_selector(&self, selector: &str) -> Result<Option<Element>, SelectorError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// All descendants matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> Result<Vec<Element>, SelectorError> {
        let selector = Selector::parse(selector)?;
        let tree = self.tree.borrow();
        let mut candidates = Vec::new();
        tree.descendants(self.id, &mut candidates);
        let found: Vec<NodeId> = candidates
            .into_iter()
            .filter(|id| selector.matches(&tree, *id))
            .collect();
        drop(tree);
        Ok(found.into_iter().map(|id| self.sibling_handle(id)).collect())
    }

    /// Inline style property, if set.
    pub fn style(&self, property: &str) -> Option<String> {
        self.with_kind(|kind| match kind {
            NodeKind::Element { style, .. } => style.get(property).cloned(),
            NodeKind::Text(_) => None,
        })
        .flatten()
    }

    /// Set an inline style property.
    pub fn set_style(&self, property: &str, value: impl Into<String>) {
        self.with_kind_mut(|kind| {
            if let NodeKind::Element { style, .. } = kind {
                style.insert(property.to_string(), value.into());
            }
        });
    }

    /// Remove an inline style property.
    pub fn remove_style(&self, property: &str) {
        self.with_kind_mut(|kind| {
            if let NodeKind::Element { style, .. } = kind {
                style.remove(property);
            }
        });
    }

    /// Whether this element or any ancestor has `display: none`.
    pub fn is_hidden(&self) -> bool {
        let hidden = |e: &Element| e.style("display").as_deref() == Some("none");
        hidden(self) || std::iter::successors(self.parent(), |p| p.parent()).any(|p| hidden(&p))
    }

    /// Register `listener` for `event_type` on this element.  A destroyed
    /// element drops the listener.
    pub fn add_event_listener(&self, event_type: &str, listener: Listener) -> ListenerId {
        let mut tree = self.tree.borrow_mut();
        tree.next_listener += 1;
        let id = ListenerId(tree.next_listener);
        if let Some(node) = tree.nodes.get_mut(self.id) {
            node.listeners.push((id, event_type.to_string(), listener));
        }
        id
    }

    /// Remove a listener previously added to this element.  Returns whether it
    /// was present.
    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        let mut tree = self.tree.borrow_mut();
        let Some(node) = tree.nodes.get_mut(self.id) else {
            return false;
        };
        let before = node.listeners.len();
        node.listeners.retain(|(l, _, _)| *l != id);
        before != node.listeners.len()
    }

    /// Number of listeners registered directly on this element.
    pub fn listener_count(&self) -> usize {
        self.tree
            .borrow()
            .nodes
            .get(self.id)
            .map_or(0, |node| node.listeners.len())
    }

    /// Dispatch an event of `event_type` targeting this element.  The event
    /// bubbles through every ancestor.  Returns the number of listeners run.
    pub fn dispatch(&self, event_type: &str) -> usize {
        let path: Vec<NodeId> = {
            let tree = self.tree.borrow();
            if !tree.nodes.contains_key(self.id) {
                return 0;
            }
            std::iter::once(self.id).chain(tree.ancestors(self.id)).collect()
        };
        let mut invoked = 0;
        for node in path {
            let listeners: Vec<Listener> = self
                .tree
                .borrow()
                .nodes
                .get(node)
                .map(|node| {
                    node.listeners
                        .iter()
                        .filter(|(_, ty, _)| ty == event_type)
                        .map(|(_, _, l)| l.clone())
                        .collect()
                })
                .unwrap_or_default();
            let event = Event {
                event_type: event_type.to_string(),
                target: self.clone(),
                current_target: self.sibling_handle(node),
            };
            for listener in listeners {
                listener(&event);
                invoked += 1;
            }
        }
        invoked
    }

    /// Serialized markup of this element and its subtree.
    pub fn markup(&self) -> String {
        let mut out = String::new();
        self.tree.borrow().serialize(self.id, &mut out);
        out
    }

    pub(crate) fn visit_visible(&self, depth: usize, visit: &mut dyn FnMut(usize, &Element)) {
        if self.style("display").as_deref() == Some("none") {
            return;
        }
        visit(depth, self);
        for child in self.children() {
            child.visit_visible(depth + 1, visit);
        }
    }

    pub(crate) fn own_text(&self) -> String {
        let tree = self.tree.borrow();
        tree.children(self.id)
            .iter()
            .filter_map(|c| match tree.nodes.get(*c).map(|node| &node.kind) {
                Some(NodeKind::Text(t)) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn with_kind<R>(&self, f: impl FnOnce(&NodeKind) -> R) -> Option<R> {
        self.tree.borrow().nodes.get(self.id).map(|node| f(&node.kind))
    }

    fn with_kind_mut<R>(&self, f: impl FnOnce(&mut NodeKind) -> R) -> Option<R> {
        self.tree
            .borrow_mut()
            .nodes
            .get_mut(self.id)
            .map(|node| f(&mut node.kind))
    }

    fn sibling_handle(&self, id: NodeId) -> Element {
        Element {
            tree: self.tree.clone(),
            id,
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("tag", &self.tag())
            .field("node", &self.id)
            .finish()
    }
}

/// An event travelling through the document.
pub struct Event {
    event_type: String,
    target: Element,
    current_target: Element,
}

impl Event {
    /// The event type, e.g. `"click"`.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The element the event was dispatched on.
    pub fn target(&self) -> &Element {
        &self.target
    }

    /// The element whose listener is currently running.
    pub fn current_target(&self) -> &Element {
        &self.current_target
    }
}

/// Declarative description of a subtree, built into a [`Document`] with
/// [`Document::build`] or [`Element::append_markup`].
///
/// ```rust,ignore
/// let nav = Markup::element("nav")
///     .class("menu")
///     .child(Markup::element("a").class("home").content("Home"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Markup {
    /// An element with attributes and children.
    Element {
        /// Tag name.
        tag: String,
        /// Attributes in insertion order.
        attrs: Vec<(String, String)>,
        /// Child nodes.
        children: Vec<Markup>,
    },
    /// A text node.
    Text(String),
}

impl Markup {
    /// Start an element description.
    pub fn element(tag: impl Into<String>) -> Self {
        Markup::Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// A text node.
    pub fn text(text: impl Into<String>) -> Self {
        Markup::Text(text.into())
    }

    /// Set an attribute.  No effect on text nodes.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Markup::Element { attrs, .. } = &mut self {
            let name = name.into();
            let value = value.into();
            match attrs.iter_mut().find(|(k, _)| *k == name) {
                Some(slot) => slot.1 = value,
                None => attrs.push((name, value)),
            }
        }
        self
    }

    /// Set the `id` attribute.
    pub fn id(self, id: impl Into<String>) -> Self {
        self.attr("id", id)
    }

    /// Add a class to the `class` attribute.
    pub fn class(mut self, class: impl Into<String>) -> Self {
        if let Markup::Element { attrs, .. } = &mut self {
            let class = class.into();
            match attrs.iter_mut().find(|(k, _)| k == "class") {
                Some(slot) => {
                    slot.1.push(' ');
                    slot.1.push_str(&class);
                }
                None => attrs.push(("class".to_string(), class)),
            }
        }
        self
    }

    /// Append a child node.
    pub fn child(mut self, child: Markup) -> Self {
        if let Markup::Element { children, .. } = &mut self {
            children.push(child);
        }
        self
    }

    /// Append several child nodes.
    pub fn children(mut self, iter: impl IntoIterator<Item = Markup>) -> Self {
        if let Markup::Element { children, .. } = &mut self {
            children.extend(iter);
        }
        self
    }

    /// Append a text child.
    pub fn content(self, text: impl Into<String>) -> Self {
        self.child(Markup::text(text))
    }

    /// Tag name of an element description.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Markup::Element { tag, .. } => Some(tag),
            Markup::Text(_) => None,
        }
    }
}

/// A selector could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
    /// The selector was empty or whitespace.
    #[error("empty selector")]
    Empty,
    /// The selector uses unsupported or malformed syntax.
    #[error("invalid selector '{selector}': {reason}")]
    Invalid {
        /// The selector text.
        selector: String,
        /// What went wrong.
        reason: String,
    },
}

#[derive(Debug, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        let Some(NodeKind::Element { tag, attrs, .. }) = tree.nodes.get(node).map(|n| &n.kind) else {
            return false;
        };
        if self.tag.as_ref().is_some_and(|t| t != tag) {
            return false;
        }
        if self.id.as_ref().is_some_and(|id| attrs.get("id") != Some(id)) {
            return false;
        }
        let classes = attrs.get("class").map(String::as_str).unwrap_or("");
        self.classes
            .iter()
            .all(|c| classes.split_whitespace().any(|have| have == c))
    }
}

/// A parsed selector (compounds joined by the descendant combinator).
#[derive(Debug)]
pub struct Selector {
    compounds: Vec<Compound>,
}

impl Selector {
    /// Parse a selector string.
    pub fn parse(selector: &str) -> Result<Self, SelectorError> {
        let invalid = |reason: &str| SelectorError::Invalid {
            selector: selector.to_string(),
            reason: reason.to_string(),
        };
        let mut compounds = Vec::new();
        for part in selector.split_whitespace() {
            let mut compound = Compound::default();
            let mut chars = part.chars().peekable();
            if chars.peek() == Some(&'*') {
                chars.next();
            }
            let mut pending: Option<char> = None;
            let mut name = String::new();
            let flush = |marker: Option<char>, name: &mut String, compound: &mut Compound| {
                if name.is_empty() {
                    return match marker {
                        Some(_) => Err(invalid("missing name after '.' or '#'")),
                        None => Ok(()),
                    };
                }
                let value = std::mem::take(name);
                match marker {
                    None => compound.tag = Some(value.to_ascii_lowercase()),
                    Some('#') => compound.id = Some(value),
                    Some(_) => compound.classes.push(value),
                }
                Ok(())
            };
            for ch in chars {
                match ch {
                    '.' | '#' => {
                        flush(pending, &mut name, &mut compound)?;
                        pending = Some(ch);
                    }
                    c if c.is_alphanumeric() || c == '-' || c == '_' => name.push(c),
                    other => return Err(invalid(&format!("unsupported character '{other}'"))),
                }
            }
            flush(pending, &mut name, &mut compound)?;
            compounds.push(compound);
        }
        if compounds.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(Self { compounds })
    }

    fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        let Some((last, rest)) = self.compounds.split_last() else {
            return false;
        };
        if !last.matches(tree, node) {
            return false;
        }
        let mut ancestors = tree.ancestors(node);
        rest.iter()
            .rev()
            .all(|compound| ancestors.any(|a| compound.matches(tree, a)))
    }
}
