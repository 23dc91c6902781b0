//! Host capability interface
//!
//! The engine never touches a concrete UI toolkit. Everything it needs from
//! the host tree (structure, values, listeners) goes through [`Dom`].
//! [`MemoryDom`] is the arena-backed reference host.

mod memory;

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;

pub use memory::MemoryDom;

/// Element identity issued by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Handle for exactly one listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Event seen by listeners
pub trait Event {
    fn event_type(&self) -> &str;
    fn prevent_default(&self);
    fn stop_propagation(&self);
}

/// Listener as registered with the host
pub type Listener = Rc<dyn Fn(&dyn Event) -> Value>;

/// Element primitives the engine relies on
///
/// All methods take `&self`: hosts are shared (`Rc<dyn Dom>`) between the
/// engine and every live accessor, so they use interior mutability.
pub trait Dom {
    // ── structure ──────────────────────────────────────────────
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    /// Element descendants of `node` in document order (excluding `node`)
    fn descendants(&self, node: NodeId) -> Vec<NodeId>;
    fn remove_child(&self, parent: NodeId, child: NodeId);
    /// Insert `child` before `reference`, or append when `reference` is `None`
    fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>);

    // ── values ─────────────────────────────────────────────────
    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&self, node: NodeId, name: &str, value: &str);
    fn get_property(&self, node: NodeId, name: &str) -> Value;
    fn set_property(&self, node: NodeId, name: &str, value: Value);
    fn style_get(&self, node: NodeId, name: &str) -> String;
    fn style_set(&self, node: NodeId, name: &str, value: &str);
    fn text_get(&self, node: NodeId) -> String;
    fn text_set(&self, node: NodeId, value: &str);
    fn html_get(&self, node: NodeId) -> String;
    fn html_set(&self, node: NodeId, value: &str);

    // ── listeners ──────────────────────────────────────────────
    fn add_listener(&self, node: NodeId, event_type: &str, listener: Listener) -> ListenerId;
    fn remove_listener(&self, node: NodeId, id: ListenerId);

    fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.get_attribute(node, name).is_some()
    }
}

/// Plain event record used for host dispatch and synthetic invocations
#[derive(Debug)]
pub struct DomEvent {
    event_type: String,
    target: NodeId,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
}

impl DomEvent {
    pub fn new(event_type: impl Into<String>, target: NodeId) -> Self {
        Self {
            event_type: event_type.into(),
            target,
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }
}

impl Event for DomEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }
}
