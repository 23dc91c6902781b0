//! The three primitive binding operators
//!
//! - `as`: expose a live accessor under an alias
//! - `into`: aggregate writers under one write-only alias (fan-out)
//! - `on`: attach an event listener with `prevent`/`stop` modifiers
//!
//! Every operator hands back a [`Cleanup`] that undoes exactly what it did.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::context::Handler;
use crate::dom::{Dom, Event, Listener, NodeId};
use crate::error::BindError;
use crate::scope::{Accessor, FanoutSetter, ScopeMap};

/// Idempotent, single-shot detachment handle
pub struct Cleanup {
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Cleanup {
    pub fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            action: RefCell::new(Some(Box::new(action))),
        }
    }

    /// A handle with nothing to undo
    pub fn noop() -> Self {
        Self {
            action: RefCell::new(None),
        }
    }

    /// Run the detachment (later calls do nothing)
    pub fn run(&self) {
        let action = self.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }

    pub fn is_done(&self) -> bool {
        self.action.borrow().is_none()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup").field("done", &self.is_done()).finish()
    }
}

/// Result of [`bind_on`]: the cleanup plus the exact listener registered
pub struct Subscription {
    pub cleanup: Cleanup,
    pub listener: Listener,
}

/// `as`: install `accessor` under `alias`, replacing any previous accessor
///
/// The cleanup removes the alias only while it still holds this accessor.
pub fn bind_as(scope: &ScopeMap, alias: &str, accessor: Accessor) -> Cleanup {
    let token = scope.define(alias, accessor);
    let scope = scope.clone();
    let alias = alias.to_string();
    Cleanup::new(move || {
        scope.undefine(&alias, token);
    })
}

/// `into`: register `(owner, set)` as one more writer behind `alias`
pub fn bind_into(scope: &ScopeMap, alias: &str, set: FanoutSetter, owner: NodeId) -> Cleanup {
    let token = scope.push_fanout(alias, owner, set);
    let scope = scope.clone();
    let alias = alias.to_string();
    Cleanup::new(move || scope.remove_fanout(&alias, token))
}

/// `on`: listen for `event_type` on `target`
///
/// Modifiers apply before the callback, `prevent` then `stop`. The callback
/// receives the target and the original event; its result is returned.
pub fn bind_on(
    host: &Rc<dyn Dom>,
    target: NodeId,
    event_type: &str,
    callback: Option<Handler>,
    modifiers: &[String],
) -> Result<Subscription, BindError> {
    let callback = callback.ok_or_else(|| BindError::MissingCallback {
        name: None,
        event_type: event_type.to_string(),
    })?;

    let prevent = modifiers.iter().any(|m| m == "prevent");
    let stop = modifiers.iter().any(|m| m == "stop");

    let listener: Listener = Rc::new(move |event: &dyn Event| -> Value {
        if prevent {
            event.prevent_default();
        }
        if stop {
            event.stop_propagation();
        }
        callback(target, event)
    });

    let id = host.add_listener(target, event_type, listener.clone());
    let host = Rc::clone(host);
    Ok(Subscription {
        cleanup: Cleanup::new(move || host.remove_listener(target, id)),
        listener,
    })
}
