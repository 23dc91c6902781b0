//! Scope discovery and nesting
//!
//! One resolve pass over a subtree runs five phases:
//!
//! 1. discover: every element carrying the scope attribute, root first
//! 2. detach: pull each boundary out of the tree (remembering its position)
//!    so nested boundaries never leak into an outer scope's inspection
//! 3. inspect: run the [`Inspector`] over each boundary's descendants
//! 4. reattach: reinsert boundaries in reverse discovery order
//! 5. register: expose each scope under its alias in the nearest enclosing
//!    scope, or in the parent map handed to the resolver
//!
//! Reattachment happens even when inspection fails.

use std::rc::Rc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::config::{BindOptions, DuplicateScopePolicy};
use crate::context::Context;
use crate::dom::{Dom, NodeId};
use crate::error::BindError;
use crate::expression::{parse, Operator};
use crate::inspector::{InspectArgs, Inspector};
use crate::registry::Registry;
use crate::scope::ScopeMap;
use crate::timings::{Phase, Timings};

/// Engine-private state of one scope boundary
#[derive(Clone)]
pub struct ScopeContext {
    pub alias: String,
    pub map: ScopeMap,
}

/// Shared inputs of a resolve pass
pub struct ResolveArgs<'a> {
    pub host: &'a Rc<dyn Dom>,
    pub registry: &'a Registry,
    pub context: &'a Context,
    pub options: &'a BindOptions,
}

struct Detached {
    node: NodeId,
    parent: NodeId,
    next_sibling: Option<NodeId>,
}

/// Tracks scope boundaries across passes so rebinds reuse storage
#[derive(Default)]
pub struct ScopeResolver {
    scopes: FxHashMap<NodeId, ScopeContext>,
}

impl ScopeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope context assigned to a boundary element
    pub fn scope_of(&self, node: NodeId) -> Option<&ScopeContext> {
        self.scopes.get(&node)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Resolve every scope under `root` into `parent`; returns the boundaries
    pub fn resolve(
        &mut self,
        args: &ResolveArgs<'_>,
        inspector: &mut Inspector,
        timings: &mut Timings,
        root: NodeId,
        parent: &ScopeMap,
    ) -> Result<Vec<NodeId>, BindError> {
        let attribute = args.options.scope_attribute();

        let start = Instant::now();
        let boundaries = self.discover(args.host.as_ref(), root, &attribute)?;
        timings.record(Phase::Discover, start.elapsed());

        let detached = detach(args.host.as_ref(), root, &boundaries);

        let start = Instant::now();
        let inspected = self.inspect(args, inspector, &boundaries);
        timings.record(Phase::Inspect, start.elapsed());

        let start = Instant::now();
        reattach(args.host.as_ref(), &detached);
        timings.record(Phase::Reattach, start.elapsed());

        inspected?;

        let start = Instant::now();
        self.register(args, root, parent, &boundaries, &attribute)?;
        timings.record(Phase::Register, start.elapsed());

        Ok(boundaries)
    }

    fn discover(&mut self, host: &dyn Dom, root: NodeId, attribute: &str) -> Result<Vec<NodeId>, BindError> {
        let mut boundaries = Vec::new();

        for node in std::iter::once(root).chain(host.descendants(root)) {
            let Some(source) = host.get_attribute(node, attribute) else {
                continue;
            };
            let alias = match parse(&source).as_deref() {
                Ok([unit]) if unit.operator == Operator::As => unit.right.clone(),
                _ => {
                    return Err(BindError::InvalidScopeExpression {
                        attribute: attribute.to_string(),
                        expression: source,
                    })
                }
            };

            // Rebinds keep the first alias and storage
            let context = self.scopes.entry(node).or_insert_with(|| ScopeContext {
                alias,
                map: ScopeMap::new(),
            });
            debug!(alias = %context.alias, element = node.0, "discovered scope");
            boundaries.push(node);
        }

        if boundaries.is_empty() {
            return Err(BindError::NoScopeFound {
                attribute: attribute.to_string(),
            });
        }
        Ok(boundaries)
    }

    fn inspect(
        &self,
        args: &ResolveArgs<'_>,
        inspector: &mut Inspector,
        boundaries: &[NodeId],
    ) -> Result<(), BindError> {
        for boundary in boundaries {
            let Some(scope) = self.scopes.get(boundary) else {
                continue;
            };
            for element in args.host.descendants(*boundary) {
                inspector.inspect(
                    args.registry,
                    &InspectArgs {
                        host: args.host,
                        element,
                        scope: &scope.map,
                        context: args.context,
                        prefix: args.options.prefix(),
                    },
                )?;
            }
        }
        Ok(())
    }

    fn register(
        &self,
        args: &ResolveArgs<'_>,
        root: NodeId,
        parent: &ScopeMap,
        boundaries: &[NodeId],
        attribute: &str,
    ) -> Result<(), BindError> {
        let host = args.host.as_ref();

        for boundary in boundaries {
            let Some(scope) = self.scopes.get(boundary) else {
                continue;
            };
            let target = self
                .enclosing_scope(host, root, *boundary, attribute)
                .map_or(parent, |context| &context.map);
            let wrapper = scope.map.wrapper();

            if let Some(existing) = target.child_scope(&scope.alias) {
                if existing.ptr_eq(&wrapper) {
                    continue;
                }
            }
            if target.contains(&scope.alias) {
                match args.options.duplicate_scopes {
                    DuplicateScopePolicy::Warn => warn!(
                        "Duplicate scope name and alias found, \"{}\". The scope will overwrite the existing value.",
                        scope.alias
                    ),
                    DuplicateScopePolicy::Reject => {
                        return Err(BindError::DuplicateScope {
                            alias: scope.alias.clone(),
                        })
                    }
                }
            }
            target.define_scope(&scope.alias, wrapper);
        }
        Ok(())
    }

    /// Nearest ancestor boundary of `node`, looking no higher than `root`
    fn enclosing_scope(
        &self,
        host: &dyn Dom,
        root: NodeId,
        node: NodeId,
        attribute: &str,
    ) -> Option<&ScopeContext> {
        if node == root {
            return None;
        }
        let mut current = host.parent(node);
        while let Some(ancestor) = current {
            if host.has_attribute(ancestor, attribute) {
                if let Some(context) = self.scopes.get(&ancestor) {
                    return Some(context);
                }
            }
            if ancestor == root {
                break;
            }
            current = host.parent(ancestor);
        }
        None
    }
}

/// Remove boundaries from the tree in discovery order
///
/// A root without a parent stays in place.
fn detach(host: &dyn Dom, root: NodeId, boundaries: &[NodeId]) -> Vec<Detached> {
    let mut detached = Vec::with_capacity(boundaries.len());
    for &node in boundaries {
        let Some(parent) = host.parent(node) else {
            debug_assert_eq!(node, root);
            continue;
        };
        let next_sibling = host.next_sibling(node);
        host.remove_child(parent, node);
        detached.push(Detached {
            node,
            parent,
            next_sibling,
        });
    }
    detached
}

/// Reinsert in reverse order so remembered siblings are valid again
fn reattach(host: &dyn Dom, detached: &[Detached]) {
    for entry in detached.iter().rev() {
        host.insert_before(entry.parent, entry.node, entry.next_sibling);
    }
}
