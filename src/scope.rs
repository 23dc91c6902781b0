//! Scope storage and its external wrapper
//!
//! A [`ScopeMap`] is the backing store the operators write into. A [`Scope`]
//! is what application code holds: reads/writes go through it, it only
//! accepts writes to aliases some binder declared, and it hides aliases
//! carrying the private marker (`$`).
//!
//! Both are thin handles over one shared store, so cloning a handle or
//! asking the map for its wrapper twice yields the same live scope.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::dom::NodeId;
use crate::error::BindError;

/// Prefix marking engine-private aliases
pub const PRIVATE_MARKER: char = '$';

pub type Getter = Rc<dyn Fn() -> Value>;
pub type Setter = Rc<dyn Fn(Value)>;
/// Fan-out setter, receives the owner element registered with it
pub type FanoutSetter = Rc<dyn Fn(NodeId, &Value)>;

/// What reading an alias yields
#[derive(Clone)]
pub enum Bound {
    Value(Value),
    Element(NodeId),
    Scope(Scope),
}

impl Bound {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Bound::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<NodeId> {
        match self {
            Bound::Element(node) => Some(*node),
            _ => None,
        }
    }

    pub fn as_scope(&self) -> Option<&Scope> {
        match self {
            Bound::Scope(scope) => Some(scope),
            _ => None,
        }
    }
}

impl fmt::Debug for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Bound::Element(node) => f.debug_tuple("Element").field(node).finish(),
            Bound::Scope(scope) => f.debug_tuple("Scope").field(scope).finish(),
        }
    }
}

/// Accessor installed by the `as` operator
#[derive(Clone)]
pub enum Accessor {
    /// Live getter with an optional setter
    Live { get: Getter, set: Option<Setter> },
    /// Constant value (read-only)
    Constant(Bound),
}

impl Accessor {
    pub fn live(get: impl Fn() -> Value + 'static, set: impl Fn(Value) + 'static) -> Self {
        Accessor::Live {
            get: Rc::new(get),
            set: Some(Rc::new(set)),
        }
    }

    pub fn read_only(get: impl Fn() -> Value + 'static) -> Self {
        Accessor::Live {
            get: Rc::new(get),
            set: None,
        }
    }

    pub fn constant(bound: Bound) -> Self {
        Accessor::Constant(bound)
    }
}

#[derive(Clone)]
struct FanoutEntry {
    token: u64,
    owner: NodeId,
    set: FanoutSetter,
}

enum Slot {
    Accessor { token: u64, accessor: Accessor },
    /// Write-only alias fanning out through the private `$alias` list
    Collective,
    Fanout(Vec<FanoutEntry>),
    Scope(Scope),
}

#[derive(Default)]
struct ScopeStore {
    slots: FxHashMap<String, Slot>,
    next_token: u64,
}

impl ScopeStore {
    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}

fn private_alias(alias: &str) -> String {
    format!("{PRIVATE_MARKER}{alias}")
}

pub fn is_private(alias: &str) -> bool {
    alias.starts_with(PRIVATE_MARKER)
}

/// Backing store of one scope
#[derive(Clone, Default)]
pub struct ScopeMap {
    store: Rc<RefCell<ScopeStore>>,
}

impl ScopeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The external wrapper for this store
    pub fn wrapper(&self) -> Scope {
        Scope { map: self.clone() }
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.store.borrow().slots.contains_key(alias)
    }

    /// All aliases, private ones included
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.store.borrow().slots.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    /// Install (or replace) an accessor; returns the installation token
    pub fn define(&self, alias: &str, accessor: Accessor) -> u64 {
        let mut store = self.store.borrow_mut();
        let token = store.token();
        store
            .slots
            .insert(alias.to_string(), Slot::Accessor { token, accessor });
        token
    }

    /// Remove the accessor under `alias` if it is still installation `token`
    pub fn undefine(&self, alias: &str, token: u64) -> bool {
        let mut store = self.store.borrow_mut();
        let current = matches!(
            store.slots.get(alias),
            Some(Slot::Accessor { token: installed, .. }) if *installed == token
        );
        if current {
            store.slots.remove(alias);
        }
        current
    }

    /// Install a child scope under `alias`, returning what it replaced
    pub fn define_scope(&self, alias: &str, scope: Scope) -> Option<Bound> {
        let previous = self
            .store
            .borrow_mut()
            .slots
            .insert(alias.to_string(), Slot::Scope(scope));
        match previous {
            Some(Slot::Scope(scope)) => Some(Bound::Scope(scope)),
            Some(Slot::Accessor { accessor: Accessor::Constant(bound), .. }) => Some(bound),
            Some(_) => Some(Bound::Value(Value::Null)),
            None => None,
        }
    }

    /// Child scope stored under `alias`, if any
    pub fn child_scope(&self, alias: &str) -> Option<Scope> {
        match self.store.borrow().slots.get(alias) {
            Some(Slot::Scope(scope)) => Some(scope.clone()),
            _ => None,
        }
    }

    /// Append a fan-out writer under `alias`
    ///
    /// Lazily creates the private `$alias` list and the public write-only
    /// alias. Returns the entry token.
    pub fn push_fanout(&self, alias: &str, owner: NodeId, set: FanoutSetter) -> u64 {
        let mut store = self.store.borrow_mut();
        let token = store.token();
        let private = private_alias(alias);

        match store.slots.get_mut(&private) {
            Some(Slot::Fanout(entries)) => entries.push(FanoutEntry { token, owner, set }),
            _ => {
                store
                    .slots
                    .insert(private, Slot::Fanout(vec![FanoutEntry { token, owner, set }]));
            }
        }

        if !store.slots.contains_key(alias) {
            store.slots.insert(alias.to_string(), Slot::Collective);
        } else if !matches!(store.slots.get(alias), Some(Slot::Collective)) {
            tracing::warn!(
                "Alias '{}' is already bound; \"into\" writers will not receive writes to it",
                alias
            );
        }

        token
    }

    /// Remove one fan-out entry; drops both aliases when the list empties
    pub fn remove_fanout(&self, alias: &str, token: u64) {
        let mut store = self.store.borrow_mut();
        let private = private_alias(alias);

        let empty = match store.slots.get_mut(&private) {
            Some(Slot::Fanout(entries)) => {
                entries.retain(|entry| entry.token != token);
                entries.is_empty()
            }
            _ => return,
        };

        if empty {
            store.slots.remove(&private);
            if matches!(store.slots.get(alias), Some(Slot::Collective)) {
                store.slots.remove(alias);
            }
        }
    }

    /// Number of fan-out writers registered under `alias`
    pub fn fanout_len(&self, alias: &str) -> usize {
        match self.store.borrow().slots.get(&private_alias(alias)) {
            Some(Slot::Fanout(entries)) => entries.len(),
            _ => 0,
        }
    }

    /// Unchecked read (no private-marker filtering)
    pub fn read(&self, alias: &str) -> Result<Option<Bound>, BindError> {
        // Clone out of the store so getters never run under a borrow
        let accessor = match self.store.borrow().slots.get(alias) {
            None | Some(Slot::Fanout(_)) => return Ok(None),
            Some(Slot::Collective) => {
                return Err(BindError::CollectiveRead {
                    alias: alias.to_string(),
                })
            }
            Some(Slot::Scope(scope)) => return Ok(Some(Bound::Scope(scope.clone()))),
            Some(Slot::Accessor { accessor, .. }) => accessor.clone(),
        };

        Ok(Some(match accessor {
            Accessor::Live { get, .. } => Bound::Value(get()),
            Accessor::Constant(bound) => bound,
        }))
    }

    /// Unchecked write (no declared-alias check beyond slot existence)
    pub fn write(&self, alias: &str, value: Value) -> Result<(), BindError> {
        enum Target {
            Setter(Setter),
            Fanout(Vec<FanoutEntry>),
        }

        let target = {
            let store = self.store.borrow();
            match store.slots.get(alias) {
                None | Some(Slot::Fanout(_)) => {
                    return Err(BindError::UnknownProperty {
                        alias: alias.to_string(),
                    })
                }
                Some(Slot::Accessor {
                    accessor: Accessor::Live { set: Some(set), .. },
                    ..
                }) => Target::Setter(set.clone()),
                Some(Slot::Accessor { .. }) | Some(Slot::Scope(_)) => {
                    return Err(BindError::ReadOnlyAlias {
                        alias: alias.to_string(),
                    })
                }
                Some(Slot::Collective) => match store.slots.get(&private_alias(alias)) {
                    Some(Slot::Fanout(entries)) => Target::Fanout(entries.clone()),
                    _ => Target::Fanout(Vec::new()),
                },
            }
        };

        match target {
            Target::Setter(set) => set(value),
            Target::Fanout(entries) => {
                for entry in entries {
                    (entry.set)(entry.owner, &value);
                }
            }
        }
        Ok(())
    }

    pub fn remove(&self, alias: &str) -> bool {
        self.store.borrow_mut().slots.remove(alias).is_some()
    }

    fn ptr_eq(&self, other: &ScopeMap) -> bool {
        Rc::ptr_eq(&self.store, &other.store)
    }
}

/// External read/write surface of a scope
#[derive(Clone)]
pub struct Scope {
    map: ScopeMap,
}

impl Scope {
    /// Read an alias
    ///
    /// Unset and private aliases read as `None`; `into` aliases fail.
    pub fn get(&self, alias: &str) -> Result<Option<Bound>, BindError> {
        if is_private(alias) {
            return Ok(None);
        }
        self.map.read(alias)
    }

    /// Read an alias expected to hold a plain value
    pub fn value(&self, alias: &str) -> Result<Option<Value>, BindError> {
        Ok(self.get(alias)?.and_then(|bound| match bound {
            Bound::Value(value) => Some(value),
            _ => None,
        }))
    }

    /// Child scope registered under `alias`
    pub fn scope(&self, alias: &str) -> Option<Scope> {
        if is_private(alias) {
            return None;
        }
        self.map.child_scope(alias)
    }

    /// Write a previously declared alias
    pub fn set(&self, alias: &str, value: impl Into<Value>) -> Result<(), BindError> {
        if is_private(alias) || !self.map.contains(alias) {
            return Err(BindError::UnknownProperty {
                alias: alias.to_string(),
            });
        }
        self.map.write(alias, value.into())
    }

    pub fn contains(&self, alias: &str) -> bool {
        !is_private(alias) && self.map.contains(alias)
    }

    /// Public aliases, sorted
    pub fn keys(&self) -> Vec<String> {
        self.map
            .aliases()
            .into_iter()
            .filter(|alias| !is_private(alias))
            .collect()
    }

    /// Check if both wrappers front the same storage
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        self.map.ptr_eq(&other.map)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("keys", &self.keys()).finish()
    }
}
