//! Arena-backed in-memory host
//!
//! Nodes live in one `Vec` and refer to each other by [`NodeId`]. Detached
//! nodes keep their slot (parent = `None`) so ids stay stable across
//! remove/insert cycles. Covers the subset of markup the binder needs:
//! elements, quoted/unquoted attributes, text, void and self-closing tags,
//! comments/doctype (skipped), inline `style` declarations.

use std::cell::{Cell, RefCell};

use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;

use super::{Dom, DomEvent, Event, Listener, ListenerId, NodeId};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("Unterminated tag at byte {position}")]
    UnterminatedTag { position: usize },

    #[error("Unterminated comment at byte {position}")]
    UnterminatedComment { position: usize },

    #[error("Invalid tag name at byte {position}")]
    InvalidTagName { position: usize },
}

enum NodeKind {
    Fragment,
    Element(Element),
    Text(String),
}

struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Default)]
struct Element {
    tag: String,
    /// Ordered for stable serialization
    attrs: Vec<(String, String)>,
    properties: FxHashMap<String, Value>,
    style: Vec<(String, String)>,
    listeners: Vec<(ListenerId, String, Listener)>,
}

struct Arena {
    nodes: Vec<Node>,
}

/// In-memory document implementing [`Dom`]
pub struct MemoryDom {
    arena: RefCell<Arena>,
    next_listener: Cell<u64>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    /// Create an empty document (root fragment only)
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Fragment,
        };
        Self {
            arena: RefCell::new(Arena { nodes: vec![root] }),
            next_listener: Cell::new(0),
        }
    }

    /// Build a document from markup
    pub fn parse(markup: &str) -> Result<Self, MarkupError> {
        let dom = Self::new();
        dom.arena.borrow_mut().parse_into(dom.root(), markup)?;
        Ok(dom)
    }

    /// The root fragment (parent of all top-level nodes)
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// First element under the root fragment
    pub fn first_element(&self) -> Option<NodeId> {
        self.children(self.root()).into_iter().next()
    }

    /// Element children of `node`
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        let arena = self.arena.borrow();
        arena.nodes[node.0]
            .children
            .iter()
            .copied()
            .filter(|child| arena.element(*child).is_some())
            .collect()
    }

    /// First element (document order) whose `id` attribute equals `id`
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|node| self.get_attribute(*node, "id").as_deref() == Some(id))
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.arena.borrow().element(node).map(|el| el.tag.clone())
    }

    /// Create a detached element
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.arena.borrow_mut().create(
            None,
            NodeKind::Element(Element {
                tag: tag.to_ascii_lowercase(),
                ..Element::default()
            }),
        )
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Number of listeners registered on `node` for `event_type`
    pub fn listener_count(&self, node: NodeId, event_type: &str) -> usize {
        self.arena
            .borrow()
            .element(node)
            .map(|el| el.listeners.iter().filter(|(_, ty, _)| ty == event_type).count())
            .unwrap_or(0)
    }

    /// Dispatch a bubbling event at `target`
    ///
    /// Listeners on each node run in registration order; a stopped event
    /// finishes the current node and does not reach ancestors.
    pub fn dispatch(&self, target: NodeId, event_type: &str) -> DomEvent {
        let event = DomEvent::new(event_type, target);
        let event_ref: &dyn Event = &event;
        let mut cursor = Some(target);

        while let Some(node) = cursor {
            // Clone out so listeners may touch the document
            let listeners: Vec<Listener> = self
                .arena
                .borrow()
                .element(node)
                .map(|el| {
                    el.listeners
                        .iter()
                        .filter(|(_, ty, _)| ty == event_type)
                        .map(|(_, _, listener)| listener.clone())
                        .collect()
                })
                .unwrap_or_default();

            for listener in listeners {
                listener(event_ref);
            }

            if event.propagation_stopped() {
                break;
            }
            cursor = self.parent(node);
        }

        event
    }
}

impl Dom for MemoryDom {
    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.borrow().nodes[node.0].parent
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let arena = self.arena.borrow();
        let parent = arena.nodes[node.0].parent?;
        let siblings = &arena.nodes[parent.0].children;
        let pos = siblings.iter().position(|id| *id == node)?;
        siblings.get(pos + 1).copied()
    }

    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let arena = self.arena.borrow();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = arena.nodes[node.0].children.iter().rev().copied().collect();

        while let Some(current) = stack.pop() {
            if arena.element(current).is_some() {
                out.push(current);
            }
            stack.extend(arena.nodes[current.0].children.iter().rev().copied());
        }
        out
    }

    fn remove_child(&self, parent: NodeId, child: NodeId) {
        let mut arena = self.arena.borrow_mut();
        if arena.nodes[child.0].parent != Some(parent) {
            return;
        }
        arena.nodes[parent.0].children.retain(|id| *id != child);
        arena.nodes[child.0].parent = None;
    }

    fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let mut arena = self.arena.borrow_mut();
        arena.detach(child);

        let index = reference
            .and_then(|r| arena.nodes[parent.0].children.iter().position(|id| *id == r))
            .unwrap_or(arena.nodes[parent.0].children.len());
        arena.nodes[parent.0].children.insert(index, child);
        arena.nodes[child.0].parent = Some(parent);
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        let arena = self.arena.borrow();
        let el = arena.element(node)?;
        el.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let mut arena = self.arena.borrow_mut();
        if let Some(el) = arena.element_mut(node) {
            el.set_attr(&name.to_ascii_lowercase(), value);
            if name.eq_ignore_ascii_case("style") {
                el.style = parse_style_declarations(value);
            }
        }
    }

    fn get_property(&self, node: NodeId, name: &str) -> Value {
        let arena = self.arena.borrow();
        let Some(el) = arena.element(node) else {
            return Value::Null;
        };
        if let Some(value) = el.properties.get(name) {
            return value.clone();
        }
        // Unwritten properties reflect the attribute of the exact same name
        el.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| Value::String(value.clone()))
            .unwrap_or(Value::Null)
    }

    fn set_property(&self, node: NodeId, name: &str, value: Value) {
        if let Some(el) = self.arena.borrow_mut().element_mut(node) {
            el.properties.insert(name.to_string(), value);
        }
    }

    fn style_get(&self, node: NodeId, name: &str) -> String {
        let arena = self.arena.borrow();
        arena
            .element(node)
            .and_then(|el| el.style.iter().find(|(key, _)| key == name))
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    }

    fn style_set(&self, node: NodeId, name: &str, value: &str) {
        let mut arena = self.arena.borrow_mut();
        let Some(el) = arena.element_mut(node) else {
            return;
        };
        let name = name.to_ascii_lowercase();
        if value.is_empty() {
            el.style.retain(|(key, _)| *key != name);
        } else if let Some(pos) = el.style.iter().position(|(key, _)| *key == name) {
            el.style[pos].1 = value.to_string();
        } else {
            el.style.push((name, value.to_string()));
        }
        let serialized = serialize_style_declarations(&el.style);
        el.set_attr("style", &serialized);
    }

    fn text_get(&self, node: NodeId) -> String {
        self.arena.borrow().text_content(node)
    }

    fn text_set(&self, node: NodeId, value: &str) {
        let mut arena = self.arena.borrow_mut();
        if arena.element(node).is_none() {
            return;
        }
        arena.clear_children(node);
        if !value.is_empty() {
            arena.create(Some(node), NodeKind::Text(value.to_string()));
        }
    }

    fn html_get(&self, node: NodeId) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        for child in &arena.nodes[node.0].children {
            arena.serialize(*child, &mut out);
        }
        out
    }

    fn html_set(&self, node: NodeId, value: &str) {
        let mut arena = self.arena.borrow_mut();
        if arena.element(node).is_none() {
            return;
        }
        arena.clear_children(node);
        if let Err(err) = arena.parse_into(node, value) {
            tracing::warn!("Malformed markup assigned as html ({}), storing as text", err);
            arena.clear_children(node);
            arena.create(Some(node), NodeKind::Text(value.to_string()));
        }
    }

    fn add_listener(&self, node: NodeId, event_type: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        if let Some(el) = self.arena.borrow_mut().element_mut(node) {
            el.listeners.push((id, event_type.to_string(), listener));
        }
        id
    }

    fn remove_listener(&self, node: NodeId, id: ListenerId) {
        if let Some(el) = self.arena.borrow_mut().element_mut(node) {
            el.listeners.retain(|(existing, _, _)| *existing != id);
        }
    }
}

impl Element {
    fn set_attr(&mut self, name: &str, value: &str) {
        if let Some(pos) = self.attrs.iter().position(|(key, _)| key == name) {
            self.attrs[pos].1 = value.to_string();
        } else {
            self.attrs.push((name.to_string(), value.to_string()));
        }
    }
}

impl Arena {
    fn create(&mut self, parent: Option<NodeId>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node.0)?.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|id| *id != node);
        }
    }

    fn clear_children(&mut self, node: NodeId) {
        for child in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[child.0].parent = None;
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Fragment | NodeKind::Element(_) => self.nodes[node.0]
                .children
                .iter()
                .map(|child| self.text_content(*child))
                .collect(),
        }
    }

    fn serialize(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(&escape(text, false)),
            NodeKind::Fragment => {
                for child in &self.nodes[node.0].children {
                    self.serialize(*child, out);
                }
            }
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape(value, true));
                    out.push('"');
                }
                out.push('>');
                if VOID_TAGS.contains(&el.tag.as_str()) {
                    return;
                }
                for child in &self.nodes[node.0].children {
                    self.serialize(*child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }

    fn parse_into(&mut self, parent: NodeId, markup: &str) -> Result<(), MarkupError> {
        let bytes = markup.as_bytes();
        let mut stack = vec![parent];
        let mut i = 0usize;

        while i < bytes.len() {
            if markup[i..].starts_with("<!--") {
                let end = markup[i + 4..]
                    .find("-->")
                    .ok_or(MarkupError::UnterminatedComment { position: i })?;
                i += 4 + end + 3;
                continue;
            }

            if markup[i..].starts_with("<!") {
                let end = markup[i..]
                    .find('>')
                    .ok_or(MarkupError::UnterminatedTag { position: i })?;
                i += end + 1;
                continue;
            }

            if markup[i..].starts_with("</") {
                let end = markup[i..]
                    .find('>')
                    .ok_or(MarkupError::UnterminatedTag { position: i })?;
                let tag = markup[i + 2..i + end].trim().to_ascii_lowercase();
                i += end + 1;

                // Pop up to and including the matching open element
                if let Some(pos) = stack.iter().rposition(|node| {
                    self.element(*node).is_some_and(|el| el.tag == tag)
                }) {
                    if pos > 0 {
                        stack.truncate(pos);
                    }
                }
                continue;
            }

            if bytes[i] == b'<' {
                let (tag, attrs, self_closing, next) = parse_start_tag(markup, i)?;
                i = next;

                let current = stack.last().copied().unwrap_or(parent);
                let style = attrs
                    .iter()
                    .find(|(name, _)| name == "style")
                    .map(|(_, value)| parse_style_declarations(value))
                    .unwrap_or_default();
                let is_void = VOID_TAGS.contains(&tag.as_str());
                let node = self.create(
                    Some(current),
                    NodeKind::Element(Element {
                        tag,
                        attrs,
                        style,
                        ..Element::default()
                    }),
                );

                if !self_closing && !is_void {
                    stack.push(node);
                }
                continue;
            }

            let start = i;
            while i < bytes.len() && bytes[i] != b'<' {
                i += 1;
            }
            let current = stack.last().copied().unwrap_or(parent);
            self.create(Some(current), NodeKind::Text(unescape(&markup[start..i])));
        }

        Ok(())
    }
}

/// Parse `<tag attr="v" ...>` starting at `at` (which points at `<`)
fn parse_start_tag(
    markup: &str,
    at: usize,
) -> Result<(String, Vec<(String, String)>, bool, usize), MarkupError> {
    let bytes = markup.as_bytes();
    let unterminated = MarkupError::UnterminatedTag { position: at };
    let mut i = at + 1;

    let tag_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    if i == tag_start {
        return Err(MarkupError::InvalidTagName { position: at });
    }
    let tag = markup[tag_start..i].to_ascii_lowercase();

    let mut attrs: Vec<(String, String)> = Vec::new();
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i) {
            None => return Err(unterminated),
            Some(b'>') => return Ok((tag, attrs, false, i + 1)),
            Some(b'/') => {
                if bytes.get(i + 1) == Some(&b'>') {
                    return Ok((tag, attrs, true, i + 2));
                }
                i += 1;
                continue;
            }
            Some(_) => {}
        }

        let name_start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !matches!(bytes[i], b'=' | b'>' | b'/')
        {
            i += 1;
        }
        let name = markup[name_start..i].to_ascii_lowercase();

        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            match bytes.get(i) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let close = markup[i + 1..]
                        .find(quote as char)
                        .ok_or(unterminated.clone())?;
                    value = unescape(&markup[i + 1..i + 1 + close]);
                    i += close + 2;
                }
                Some(_) => {
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                        i += 1;
                    }
                    value = unescape(&markup[value_start..i]);
                }
                None => return Err(unterminated),
            }
        }

        if !attrs.iter().any(|(existing, _)| *existing == name) {
            attrs.push((name, value));
        }
    }
}

fn parse_style_declarations(src: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for decl in src.split(';') {
        let Some((name, value)) = decl.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().to_string();
        if let Some(pos) = out.iter().position(|(existing, _)| *existing == name) {
            out[pos].1 = value;
        } else {
            out.push((name, value));
        }
    }
    out
}

fn serialize_style_declarations(decls: &[(String, String)]) -> String {
    decls
        .iter()
        .map(|(name, value)| format!("{name}: {value};"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape(src: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(src.len());
    for ch in src.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }
    src.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
