//! External handler tables
//!
//! A [`Context`] maps a binder kind (e.g. `event`) to a [`HandlerTable`]
//! whose entries are looked up by the expression's left operand
//! (`save on click` → `context.event.save`).

use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::dom::{Event, NodeId};

/// Reserved handler name that always resolves (does nothing)
pub const NOOP_HANDLER: &str = "noop";

/// Binder kind whose table receives the built-in handlers
pub const EVENT_TABLE: &str = "event";

/// Event handler: receives the bound element and the original event
pub type Handler = Rc<dyn Fn(NodeId, &dyn Event) -> Value>;

/// Named handlers for one binder kind
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: FxHashMap<String, Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(NodeId, &dyn Event) -> Value + 'static,
    ) {
        self.handlers.insert(name.into(), Rc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Binder kind → handler table
#[derive(Clone, Default)]
pub struct Context {
    tables: FxHashMap<String, HandlerTable>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register `handler` as `context.<binder>.<name>`
    pub fn with_handler(
        mut self,
        binder: &str,
        name: &str,
        handler: impl Fn(NodeId, &dyn Event) -> Value + 'static,
    ) -> Self {
        self.tables
            .entry(binder.to_string())
            .or_default()
            .insert(name, handler);
        self
    }

    pub fn insert_table(&mut self, binder: impl Into<String>, table: HandlerTable) {
        self.tables.insert(binder.into(), table);
    }

    pub fn table(&self, binder: &str) -> Option<&HandlerTable> {
        self.tables.get(binder)
    }

    /// Copy of this context with the reserved handlers layered in
    ///
    /// User-supplied entries win over built-ins of the same name.
    pub fn with_builtins(&self) -> Context {
        let mut context = self.clone();
        let events = context.tables.entry(EVENT_TABLE.to_string()).or_default();
        if !events.contains(NOOP_HANDLER) {
            events.insert(NOOP_HANDLER, |_, _| Value::Null);
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_registers_handlers() {
        let context = Context::new().with_handler("event", "save", |_, _| Value::from(true));
        let table = context.table("event").unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.contains("save"));
        assert!(context.table("other").is_none());
    }

    #[test]
    fn builtins_add_noop() {
        let context = Context::new().with_builtins();
        let noop = context.table(EVENT_TABLE).unwrap().get(NOOP_HANDLER).unwrap();
        let event = crate::dom::DomEvent::new("click", NodeId(0));
        let event_ref: &dyn Event = &event;
        assert_eq!(noop(NodeId(0), event_ref), Value::Null);
    }

    #[test]
    fn builtins_keep_user_noop() {
        let context = Context::new()
            .with_handler(EVENT_TABLE, NOOP_HANDLER, |_, _| Value::from("mine"))
            .with_builtins();
        let noop = context.table(EVENT_TABLE).unwrap().get(NOOP_HANDLER).unwrap();
        let event = crate::dom::DomEvent::new("click", NodeId(0));
        let event_ref: &dyn Event = &event;
        assert_eq!(noop(NodeId(0), event_ref), Value::from("mine"));
    }

    #[test]
    fn builtins_do_not_mutate_original() {
        let context = Context::new();
        let _ = context.with_builtins();
        assert!(context.table(EVENT_TABLE).is_none());
    }
}
