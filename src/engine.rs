//! Bind façade
//!
//! [`Engine`] owns everything that must outlive one bind pass: the registry,
//! the per-element cleanup table, scope storage of every boundary it has
//! seen, and the root maps it hands out. Rebinding the same root is safe and
//! returns the same live [`Scope`].

use std::rc::Rc;
use std::time::Instant;

use rustc_hash::FxHashMap;
use tracing::{info, instrument, warn};

use crate::config::BindOptions;
use crate::dom::{Dom, NodeId};
use crate::error::BindError;
use crate::inspector::Inspector;
use crate::registry::Registry;
use crate::resolver::{ResolveArgs, ScopeResolver};
use crate::scope::{Scope, ScopeMap};
use crate::timings::{Phase, Timings};

pub struct Engine {
    host: Rc<dyn Dom>,
    registry: Registry,
    inspector: Inspector,
    resolver: ScopeResolver,
    roots: FxHashMap<NodeId, ScopeMap>,
    timings: Timings,
}

impl Engine {
    /// Engine with the standard binder catalog
    pub fn new(host: Rc<dyn Dom>) -> Self {
        Self::with_registry(host, Registry::standard())
    }

    pub fn with_registry(host: Rc<dyn Dom>, registry: Registry) -> Self {
        Self {
            host,
            registry,
            inspector: Inspector::new(),
            resolver: ScopeResolver::new(),
            roots: FxHashMap::default(),
            timings: Timings::new(),
        }
    }

    pub fn host(&self) -> &Rc<dyn Dom> {
        &self.host
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Bind every scope under `root` and return the root scope
    ///
    /// Fails fast on the first error. A failed pass runs the cleanups of
    /// every element it inspected and drops its `init` hooks.
    #[instrument(skip_all, fields(root = root.0))]
    pub fn bind(&mut self, root: NodeId, options: &BindOptions) -> Result<Scope, BindError> {
        let start = Instant::now();
        options.validate()?;
        self.timings.set_enabled(options.timings);

        let context = options.context.with_builtins();
        let parent = self.roots.entry(root).or_default().clone();
        let args = ResolveArgs {
            host: &self.host,
            registry: &self.registry,
            context: &context,
            options,
        };

        let resolved = self.resolver.resolve(
            &args,
            &mut self.inspector,
            &mut self.timings,
            root,
            &parent,
        );
        let boundaries = match resolved {
            Ok(boundaries) => {
                self.inspector.commit();
                boundaries
            }
            Err(err) => {
                let undone = self.inspector.rollback();
                warn!(undone, error = %err, "binded: Bind failed, pass rolled back");
                return Err(err);
            }
        };
        let hooks = self.inspector.take_after_bind();

        for hook in hooks {
            hook();
        }

        let elapsed = start.elapsed();
        self.timings.record(Phase::Bind, elapsed);
        info!(
            scopes = boundaries.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "binded: Initialized"
        );
        if options.timings {
            self.timings.log();
        }

        Ok(parent.wrapper())
    }

    /// Root scope previously returned for `root`
    pub fn scope(&self, root: NodeId) -> Option<Scope> {
        self.roots.get(&root).map(ScopeMap::wrapper)
    }

    /// Accumulated phase statistics (recorded while `timings` is on)
    pub fn stats(&self) -> &Timings {
        &self.timings
    }

    /// Run the cleanups of `node` and its descendants; returns how many ran
    pub fn cleanup(&mut self, node: NodeId) -> usize {
        std::iter::once(node)
            .chain(self.host.descendants(node))
            .map(|element| self.inspector.run_cleanups(element))
            .sum()
    }

    /// Run every cleanup this engine recorded
    pub fn cleanup_all(&mut self) -> usize {
        self.inspector.cleanup_all()
    }

    pub fn cleanup_count(&self, node: NodeId) -> usize {
        self.inspector.cleanup_count(node)
    }
}

/// One-shot bind with a throwaway engine
///
/// Bindings stay live, but nothing is left to run their cleanups.
pub fn bind(host: Rc<dyn Dom>, root: NodeId, options: &BindOptions) -> Result<Scope, BindError> {
    Engine::new(host).bind(root, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;
    use serde_json::Value;

    fn engine(markup: &str) -> (Rc<MemoryDom>, Engine) {
        let dom = Rc::new(MemoryDom::parse(markup).unwrap());
        let engine = Engine::new(dom.clone());
        (dom, engine)
    }

    #[test]
    fn bind_returns_root_scope() {
        let (dom, mut engine) = engine(r#"<div binded-scope="as app"><span binded-text="as greeting">Hi</span></div>"#);
        let root = dom.first_element().unwrap();
        let scope = engine.bind(root, &BindOptions::new()).unwrap();

        let app = scope.scope("app").unwrap();
        assert_eq!(app.value("greeting").unwrap(), Some(Value::from("Hi")));
        assert!(engine.scope(root).unwrap().ptr_eq(&scope));
    }

    #[test]
    fn invalid_prefix_fails_before_touching_tree() {
        let (dom, mut engine) = engine(r#"<div binded-scope="as app"></div>"#);
        let root = dom.first_element().unwrap();
        let err = engine.bind(root, &BindOptions::new().with_prefix("Bad")).unwrap_err();
        assert!(matches!(err, BindError::InvalidPrefix { .. }));
        assert!(engine.scope(root).is_none());
    }

    #[test]
    fn cleanup_covers_descendants() {
        let (dom, mut engine) = engine(
            r#"<div binded-scope="as app"><p binded-text="as a"><b binded-text="as b"></b></p></div>"#,
        );
        let root = dom.first_element().unwrap();
        let scope = engine.bind(root, &BindOptions::new()).unwrap();
        assert_eq!(engine.cleanup(root), 2);
        assert!(scope.scope("app").unwrap().keys().is_empty());
        assert_eq!(engine.cleanup_all(), 0);
    }

    #[test]
    fn failed_bind_leaves_no_cleanups() {
        let (dom, mut engine) = engine(
            r#"<div binded-scope="as app"><p binded-text="into all"></p><b binded-text="bad"></b></div>"#,
        );
        let root = dom.first_element().unwrap();
        assert!(engine.bind(root, &BindOptions::new()).is_err());
        let p = dom.children(root)[0];
        assert_eq!(engine.cleanup_count(p), 0);
        assert_eq!(engine.cleanup_all(), 0);
    }

    #[test]
    fn stats_only_with_timings() {
        let (dom, mut engine) = engine(r#"<div binded-scope="as app"></div>"#);
        let root = dom.first_element().unwrap();
        engine.bind(root, &BindOptions::new()).unwrap();
        assert!(engine.stats().is_empty());

        engine.bind(root, &BindOptions::new().with_timings(true)).unwrap();
        assert_eq!(engine.stats().get(Phase::Bind).unwrap().count, 1);
    }

    #[test]
    fn free_bind_function() {
        let dom = Rc::new(MemoryDom::parse(r#"<div binded-scope="as app"></div>"#).unwrap());
        let root = dom.first_element().unwrap();
        let scope = bind(dom, root, &BindOptions::new()).unwrap();
        assert!(scope.scope("app").is_some());
    }
}
