//! Element inspection
//!
//! For one element: run its previous cleanups, find the binder attributes it
//! carries, validate each parsed unit against the binder's descriptor, then
//! dispatch to the processor. Cleanups live in a side table keyed by element.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::config::{attribute_name, property_name};
use crate::context::{Context, HandlerTable};
use crate::dom::{Dom, NodeId};
use crate::error::BindError;
use crate::expression::{parse, Expression};
use crate::operators::Cleanup;
use crate::registry::{BinderKind, ProcessArgs, Registry};
use crate::scope::ScopeMap;

/// Input for one [`Inspector::inspect`] call
pub struct InspectArgs<'a> {
    pub host: &'a Rc<dyn Dom>,
    pub element: NodeId,
    pub scope: &'a ScopeMap,
    pub context: &'a Context,
    pub prefix: &'a str,
}

/// Owns per-element cleanups and pending after-bind hooks
#[derive(Default)]
pub struct Inspector {
    cleanups: FxHashMap<NodeId, Vec<Cleanup>>,
    after_bind: Vec<Box<dyn FnOnce()>>,
    /// Elements inspected since the last commit or rollback
    pass: Vec<NodeId>,
}

impl Inspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebind one element; returns the number of units dispatched
    pub fn inspect(&mut self, registry: &Registry, args: &InspectArgs<'_>) -> Result<usize, BindError> {
        self.run_cleanups(args.element);
        self.pass.push(args.element);

        let empty = HandlerTable::new();
        let mut dispatched = 0;

        for binder in registry.binders() {
            let Some(source) = binder_source(args, binder) else {
                continue;
            };
            let units = parse(&source)?;

            for unit in &units {
                let table = validate(binder, unit, args.context)?;
                let processor = binder
                    .processor(unit.operator)
                    .ok_or_else(|| unsupported(binder, unit))?;

                debug!(
                    binder = %binder.name,
                    operator = %unit.operator,
                    alias = %unit.right,
                    element = args.element.0,
                    "dispatching binder"
                );

                let binding = processor(&ProcessArgs {
                    host: args.host,
                    element: args.element,
                    expression: unit,
                    scope: args.scope,
                    context: table.unwrap_or(&empty),
                })?;

                self.cleanups
                    .entry(args.element)
                    .or_default()
                    .push(binding.cleanup);
                if let Some(hook) = binding.after_bind {
                    self.after_bind.push(hook);
                }
                dispatched += 1;
            }
        }

        Ok(dispatched)
    }

    /// Run and clear an element's cleanups in registration order
    pub fn run_cleanups(&mut self, element: NodeId) -> usize {
        let Some(cleanups) = self.cleanups.remove(&element) else {
            return 0;
        };
        for cleanup in &cleanups {
            cleanup.run();
        }
        cleanups.len()
    }

    /// Run every recorded cleanup
    pub fn cleanup_all(&mut self) -> usize {
        let mut elements: Vec<NodeId> = self.cleanups.keys().copied().collect();
        elements.sort();
        elements
            .into_iter()
            .map(|element| self.run_cleanups(element))
            .sum()
    }

    pub fn cleanup_count(&self, element: NodeId) -> usize {
        self.cleanups.get(&element).map_or(0, Vec::len)
    }

    /// Keep the bindings of the current pass
    pub fn commit(&mut self) {
        self.pass.clear();
    }

    /// Undo the current pass: run its cleanups and drop its pending hooks
    pub fn rollback(&mut self) -> usize {
        self.after_bind.clear();
        std::mem::take(&mut self.pass)
            .into_iter()
            .map(|element| self.run_cleanups(element))
            .sum()
    }

    /// Hooks queued since the last take
    pub fn take_after_bind(&mut self) -> Vec<Box<dyn FnOnce()>> {
        std::mem::take(&mut self.after_bind)
    }
}

/// Expression source: `<prefix>-<kind>` attribute, else `<prefix><Kind>` property
fn binder_source(args: &InspectArgs<'_>, binder: &BinderKind) -> Option<String> {
    let attribute = attribute_name(args.prefix, &binder.name);
    if let Some(value) = args.host.get_attribute(args.element, &attribute) {
        if !value.is_empty() {
            return Some(value);
        }
    }

    let property = property_name(args.prefix, &binder.name);
    match args.host.get_property(args.element, &property) {
        Value::String(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn unsupported(binder: &BinderKind, unit: &Expression) -> BindError {
    BindError::UnsupportedOperator {
        binder: binder.name.clone(),
        operator: unit.operator.to_string(),
    }
}

/// Check a unit against the binder; returns `context.<binder>` if present
fn validate<'c>(
    binder: &BinderKind,
    unit: &Expression,
    context: &'c Context,
) -> Result<Option<&'c HandlerTable>, BindError> {
    if !binder.supports(unit.operator) {
        return Err(unsupported(binder, unit));
    }

    let table = context.table(&binder.name);
    let Some(descriptor) = &binder.descriptor else {
        return Ok(table);
    };

    if descriptor.req_context && table.is_none() {
        return Err(BindError::MissingContext {
            binder: binder.name.clone(),
        });
    }
    if descriptor.req_left && unit.left.is_none() {
        return Err(BindError::MissingLeftOperand {
            binder: binder.name.clone(),
        });
    }
    if let Some(allowed) = &descriptor.valid_right_attrs {
        if let Some(modifier) = unit
            .right_attrs
            .iter()
            .find(|attr| !allowed.contains(&attr.as_str()))
        {
            return Err(BindError::InvalidModifier {
                binder: binder.name.clone(),
                modifier: modifier.clone(),
            });
        }
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;

    struct Fixture {
        dom: Rc<MemoryDom>,
        host: Rc<dyn Dom>,
        scope: ScopeMap,
        registry: Registry,
        inspector: Inspector,
    }

    impl Fixture {
        fn new(markup: &str) -> Self {
            let dom = Rc::new(MemoryDom::parse(markup).unwrap());
            let host: Rc<dyn Dom> = dom.clone();
            Self {
                dom,
                host,
                scope: ScopeMap::new(),
                registry: Registry::standard(),
                inspector: Inspector::new(),
            }
        }

        fn inspect_with(&mut self, context: &Context, prefix: &str) -> Result<usize, BindError> {
            let element = self.dom.first_element().unwrap();
            self.inspector.inspect(
                &self.registry,
                &InspectArgs {
                    host: &self.host,
                    element,
                    scope: &self.scope,
                    context,
                    prefix,
                },
            )
        }

        fn inspect(&mut self) -> Result<usize, BindError> {
            self.inspect_with(&Context::new().with_builtins(), "binded")
        }
    }

    #[test]
    fn dispatches_every_unit() {
        let mut fx = Fixture::new(r#"<p binded-text="as t" binded-attr="id as i and class as c"></p>"#);
        assert_eq!(fx.inspect().unwrap(), 3);
        assert_eq!(fx.scope.wrapper().keys(), vec!["c", "i", "t"]);
    }

    #[test]
    fn reinspect_runs_cleanups_first() {
        let mut fx = Fixture::new(r#"<p binded-text="into all"></p>"#);
        fx.inspect().unwrap();
        fx.inspect().unwrap();
        assert_eq!(fx.scope.fanout_len("all"), 1);
        let element = fx.dom.first_element().unwrap();
        assert_eq!(fx.inspector.cleanup_count(element), 1);
    }

    #[test]
    fn cleanup_removes_bindings() {
        let mut fx = Fixture::new(r#"<p binded-text="as t"></p>"#);
        fx.inspect().unwrap();
        assert_eq!(fx.inspector.cleanup_all(), 1);
        assert!(fx.scope.wrapper().keys().is_empty());
    }

    #[test]
    fn property_source_is_used() {
        let mut fx = Fixture::new("<p>hi</p>");
        let element = fx.dom.first_element().unwrap();
        fx.host.set_property(element, "bindedText", Value::from("as t"));
        assert_eq!(fx.inspect().unwrap(), 1);
        assert_eq!(fx.scope.wrapper().value("t").unwrap(), Some(Value::from("hi")));
    }

    #[test]
    fn lowercased_attribute_is_not_a_property_source() {
        let mut fx = Fixture::new(r#"<p bindedtext="as t">hi</p>"#);
        assert_eq!(fx.inspect().unwrap(), 0);
        assert!(fx.scope.wrapper().keys().is_empty());
    }

    #[test]
    fn empty_attribute_is_skipped() {
        let mut fx = Fixture::new(r#"<p binded-text=""></p>"#);
        assert_eq!(fx.inspect().unwrap(), 0);
    }

    #[test]
    fn whitespace_attribute_fails() {
        let mut fx = Fixture::new(r#"<p binded-text="  "></p>"#);
        assert_eq!(fx.inspect().unwrap_err(), BindError::EmptyExpression);
    }

    #[test]
    fn custom_prefix_and_empty_prefix() {
        let mut fx = Fixture::new(r#"<p app-text="as a" text="as b"></p>"#);
        let context = Context::new();
        assert_eq!(fx.inspect_with(&context, "app").unwrap(), 1);
        assert_eq!(fx.inspect_with(&context, "").unwrap(), 1);
        assert_eq!(fx.scope.wrapper().keys(), vec!["b"]);
    }

    // ═══════════════════════════════════════════════════════════════
    // Descriptor enforcement
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn unsupported_operator() {
        let mut fx = Fixture::new(r#"<p binded-text="click on t"></p>"#);
        let err = fx.inspect().unwrap_err();
        assert_eq!(
            err,
            BindError::UnsupportedOperator {
                binder: "text".into(),
                operator: "on".into()
            }
        );
    }

    #[test]
    fn missing_left_operand() {
        let mut fx = Fixture::new(r#"<p binded-style="as s"></p>"#);
        assert!(matches!(fx.inspect().unwrap_err(), BindError::MissingLeftOperand { .. }));
    }

    #[test]
    fn missing_context() {
        let mut fx = Fixture::new(r#"<p binded-event="on click"></p>"#);
        let err = fx.inspect_with(&Context::new(), "binded").unwrap_err();
        assert_eq!(err, BindError::MissingContext { binder: "event".into() });
    }

    #[test]
    fn invalid_modifier() {
        let mut fx = Fixture::new(r#"<p binded-event="on click.me"></p>"#);
        let err = fx.inspect().unwrap_err();
        assert_eq!(
            err,
            BindError::InvalidModifier {
                binder: "event".into(),
                modifier: "me".into()
            }
        );
    }

    #[test]
    fn rollback_undoes_pass() {
        let mut fx = Fixture::new(r#"<p binded-text="as t" binded-attr="id into all"></p>"#);
        fx.inspect().unwrap();
        fx.inspector.commit();
        assert_eq!(fx.inspector.rollback(), 0);

        fx.inspect().unwrap();
        assert_eq!(fx.inspector.rollback(), 2);
        assert!(fx.scope.wrapper().keys().is_empty());
        assert_eq!(fx.scope.fanout_len("all"), 0);
    }

    #[test]
    fn rollback_keeps_partial_element_clean() {
        let mut fx = Fixture::new(r#"<p binded-attr="id as i" binded-text="bad"></p>"#);
        assert!(fx.inspect().is_err());
        let element = fx.dom.first_element().unwrap();
        assert_eq!(fx.inspector.cleanup_count(element), 1);
        assert_eq!(fx.inspector.rollback(), 1);
        assert_eq!(fx.inspector.cleanup_count(element), 0);
    }

    #[test]
    fn init_hooks_are_queued() {
        let mut fx = Fixture::new(r#"<p binded-event="on ready.init"></p>"#);
        fx.inspect().unwrap();
        let hooks = fx.inspector.take_after_bind();
        assert_eq!(hooks.len(), 1);
        assert!(fx.inspector.take_after_bind().is_empty());
    }
}
