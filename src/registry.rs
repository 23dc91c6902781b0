//! Binder catalog
//!
//! Each [`BinderKind`] names an attribute suffix (`text` in `binded-text`),
//! declares the structural requirements its expressions must meet
//! ([`Descriptor`]), and maps the operators it supports to processors.
//!
//! | kind  | `as` get                | `as` set / `into`           |
//! |-------|-------------------------|-----------------------------|
//! | attr  | named attribute         | named attribute             |
//! | elem  | the element (constant)  | -                           |
//! | hide  | `display == none`       | `none` if truthy, else revert |
//! | html  | inner markup            | inner markup                |
//! | prop  | named property          | named property              |
//! | show  | `display != none`       | revert if truthy, else `none` |
//! | style | named style property    | named style property        |
//! | text  | text content            | text content                |
//! | event | `on`: listener from `context.event.<left>`            |

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::context::{HandlerTable, NOOP_HANDLER};
use crate::dom::{Dom, DomEvent, Event, NodeId};
use crate::error::BindError;
use crate::expression::{Expression, Operator};
use crate::operators::{bind_as, bind_into, bind_on, Cleanup};
use crate::scope::{Accessor, Bound, FanoutSetter, ScopeMap};

/// Display value written to un-hide an element
pub const REVERT_DISPLAY: &str = "revert";

/// Event modifier requesting one invocation once the bind pass completes
pub const INIT_MODIFIER: &str = "init";

/// Everything a processor needs for one expression unit
pub struct ProcessArgs<'a> {
    pub host: &'a Rc<dyn Dom>,
    pub element: NodeId,
    pub expression: &'a Expression,
    pub scope: &'a ScopeMap,
    /// `context.<binder>` (empty when the context has none)
    pub context: &'a HandlerTable,
}

/// What a processor leaves behind
pub struct Binding {
    pub cleanup: Cleanup,
    /// Hook to run after the whole bind pass succeeded
    pub after_bind: Option<Box<dyn FnOnce()>>,
}

impl Binding {
    pub fn new(cleanup: Cleanup) -> Self {
        Self {
            cleanup,
            after_bind: None,
        }
    }
}

impl From<Cleanup> for Binding {
    fn from(cleanup: Cleanup) -> Self {
        Binding::new(cleanup)
    }
}

pub type Processor = fn(&ProcessArgs<'_>) -> Result<Binding, BindError>;

/// Structural requirements of a binder's expressions
///
/// Absent constraints (`false` / `None`) mean unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    pub req_left: bool,
    pub req_context: bool,
    pub valid_right_attrs: Option<Vec<&'static str>>,
}

impl Descriptor {
    pub fn requires_left() -> Self {
        Self {
            req_left: true,
            ..Default::default()
        }
    }
}

/// One binder kind: name, descriptor, and per-operator processors
#[derive(Clone)]
pub struct BinderKind {
    pub name: String,
    pub descriptor: Option<Descriptor>,
    processors: Vec<(Operator, Processor)>,
}

impl BinderKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptor: None,
            processors: Vec::new(),
        }
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Register (or replace) the processor for `operator`
    pub fn with_processor(mut self, operator: Operator, processor: Processor) -> Self {
        self.processors.retain(|(op, _)| *op != operator);
        self.processors.push((operator, processor));
        self
    }

    pub fn processor(&self, operator: Operator) -> Option<Processor> {
        self.processors
            .iter()
            .find(|(op, _)| *op == operator)
            .map(|(_, processor)| *processor)
    }

    pub fn supports(&self, operator: Operator) -> bool {
        self.processor(operator).is_some()
    }

    pub fn operators(&self) -> Vec<Operator> {
        self.processors.iter().map(|(op, _)| *op).collect()
    }
}

impl fmt::Debug for BinderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinderKind")
            .field("name", &self.name)
            .field("descriptor", &self.descriptor)
            .field("operators", &self.operators())
            .finish()
    }
}

/// Ordered set of binder kinds consulted by the inspector
#[derive(Debug, Clone)]
pub struct Registry {
    binders: Vec<BinderKind>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Registry {
    /// Registry with no binders
    pub fn empty() -> Self {
        Self {
            binders: Vec::new(),
        }
    }

    /// The built-in catalog, in inspection order
    pub fn standard() -> Self {
        Self::empty()
            .with_binder(
                BinderKind::new("attr")
                    .with_descriptor(Descriptor::requires_left())
                    .with_processor(Operator::As, attr_as)
                    .with_processor(Operator::Into, attr_into),
            )
            .with_binder(BinderKind::new("elem").with_processor(Operator::As, elem_as))
            .with_binder(
                BinderKind::new("event")
                    .with_descriptor(Descriptor {
                        req_context: true,
                        valid_right_attrs: Some(vec!["prevent", "stop", INIT_MODIFIER]),
                        ..Default::default()
                    })
                    .with_processor(Operator::On, event_on),
            )
            .with_binder(
                BinderKind::new("hide")
                    .with_processor(Operator::As, hide_as)
                    .with_processor(Operator::Into, hide_into),
            )
            .with_binder(
                BinderKind::new("html")
                    .with_processor(Operator::As, html_as)
                    .with_processor(Operator::Into, html_into),
            )
            .with_binder(
                BinderKind::new("prop")
                    .with_descriptor(Descriptor::requires_left())
                    .with_processor(Operator::As, prop_as)
                    .with_processor(Operator::Into, prop_into),
            )
            .with_binder(
                BinderKind::new("show")
                    .with_processor(Operator::As, show_as)
                    .with_processor(Operator::Into, show_into),
            )
            .with_binder(
                BinderKind::new("style")
                    .with_descriptor(Descriptor::requires_left())
                    .with_processor(Operator::As, style_as)
                    .with_processor(Operator::Into, style_into),
            )
            .with_binder(
                BinderKind::new("text")
                    .with_processor(Operator::As, text_as)
                    .with_processor(Operator::Into, text_into),
            )
    }

    /// Add a binder kind; a kind with the same name is replaced in place
    pub fn with_binder(mut self, binder: BinderKind) -> Self {
        match self.binders.iter_mut().find(|b| b.name == binder.name) {
            Some(existing) => *existing = binder,
            None => self.binders.push(binder),
        }
        self
    }

    pub fn binders(&self) -> &[BinderKind] {
        &self.binders
    }

    pub fn get(&self, name: &str) -> Option<&BinderKind> {
        self.binders.iter().find(|b| b.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.binders.iter().map(|b| b.name.as_str()).collect()
    }
}

// ═══════════════════════════════════════════════════════════════
// Value conversion
// ═══════════════════════════════════════════════════════════════

/// Render a value for string-typed targets (strings verbatim)
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loose truthiness: null, false, 0, NaN and "" are falsy
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ═══════════════════════════════════════════════════════════════
// Shared wiring
// ═══════════════════════════════════════════════════════════════

fn left_operand<'a>(args: &'a ProcessArgs<'_>, binder: &str) -> Result<&'a str, BindError> {
    args.expression
        .left
        .as_deref()
        .ok_or_else(|| BindError::MissingLeftOperand {
            binder: binder.to_string(),
        })
}

/// `as` with a live getter/setter pair against the element
fn expose<G, S>(args: &ProcessArgs<'_>, get: G, set: S) -> Binding
where
    G: Fn(&dyn Dom, NodeId) -> Value + 'static,
    S: Fn(&dyn Dom, NodeId, &Value) + 'static,
{
    let element = args.element;
    let reader = Rc::clone(args.host);
    let writer = Rc::clone(args.host);
    let accessor = Accessor::live(
        move || get(reader.as_ref(), element),
        move |value| set(writer.as_ref(), element, &value),
    );
    bind_as(args.scope, &args.expression.right, accessor).into()
}

/// `into` with a setter applied to the owning element
fn aggregate<S>(args: &ProcessArgs<'_>, set: S) -> Binding
where
    S: Fn(&dyn Dom, NodeId, &Value) + 'static,
{
    let host = Rc::clone(args.host);
    let setter: FanoutSetter =
        Rc::new(move |owner: NodeId, value: &Value| set(host.as_ref(), owner, value));
    bind_into(args.scope, &args.expression.right, setter, args.element).into()
}

fn is_hidden(host: &dyn Dom, node: NodeId) -> bool {
    host.style_get(node, "display") == "none"
}

fn set_hidden(host: &dyn Dom, node: NodeId, hidden: bool) {
    let display = if hidden { "none" } else { REVERT_DISPLAY };
    host.style_set(node, "display", display);
}

// ═══════════════════════════════════════════════════════════════
// Processors
// ═══════════════════════════════════════════════════════════════

fn attr_as(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    let name = left_operand(args, "attr")?.to_string();
    let write_name = name.clone();
    Ok(expose(
        args,
        move |host, node| {
            host.get_attribute(node, &name)
                .map(Value::String)
                .unwrap_or(Value::Null)
        },
        move |host, node, value| host.set_attribute(node, &write_name, &stringify(value)),
    ))
}

fn attr_into(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    let name = left_operand(args, "attr")?.to_string();
    Ok(aggregate(args, move |host, node, value| {
        host.set_attribute(node, &name, &stringify(value))
    }))
}

fn elem_as(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    let accessor = Accessor::constant(Bound::Element(args.element));
    Ok(bind_as(args.scope, &args.expression.right, accessor).into())
}

fn event_on(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    let expression = args.expression;
    let name = expression.left.as_deref().unwrap_or(NOOP_HANDLER);
    let handler = args
        .context
        .get(name)
        .cloned()
        .ok_or_else(|| BindError::MissingCallback {
            name: Some(name.to_string()),
            event_type: expression.right.clone(),
        })?;

    let subscription = bind_on(
        args.host,
        args.element,
        &expression.right,
        Some(handler),
        &expression.right_attrs,
    )?;

    let mut binding = Binding::new(subscription.cleanup);
    if expression.has_right_attr(INIT_MODIFIER) {
        let listener = subscription.listener;
        let event_type = expression.right.clone();
        let element = args.element;
        binding.after_bind = Some(Box::new(move || {
            let event = DomEvent::new(event_type, element);
            let event_ref: &dyn Event = &event;
            listener(event_ref);
        }));
    }
    Ok(binding)
}

fn hide_as(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    Ok(expose(
        args,
        |host, node| Value::Bool(is_hidden(host, node)),
        |host, node, value| set_hidden(host, node, truthy(value)),
    ))
}

fn hide_into(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    Ok(aggregate(args, |host, node, value| {
        set_hidden(host, node, truthy(value))
    }))
}

fn show_as(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    Ok(expose(
        args,
        |host, node| Value::Bool(!is_hidden(host, node)),
        |host, node, value| set_hidden(host, node, !truthy(value)),
    ))
}

fn show_into(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    Ok(aggregate(args, |host, node, value| {
        set_hidden(host, node, !truthy(value))
    }))
}

fn html_as(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    Ok(expose(
        args,
        |host, node| Value::String(host.html_get(node)),
        |host, node, value| host.html_set(node, &stringify(value)),
    ))
}

fn html_into(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    Ok(aggregate(args, |host, node, value| {
        host.html_set(node, &stringify(value))
    }))
}

fn prop_as(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    let name = left_operand(args, "prop")?.to_string();
    let write_name = name.clone();
    Ok(expose(
        args,
        move |host, node| host.get_property(node, &name),
        move |host, node, value| host.set_property(node, &write_name, value.clone()),
    ))
}

fn prop_into(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    let name = left_operand(args, "prop")?.to_string();
    Ok(aggregate(args, move |host, node, value| {
        host.set_property(node, &name, value.clone())
    }))
}

fn style_as(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    let name = left_operand(args, "style")?.to_string();
    let write_name = name.clone();
    Ok(expose(
        args,
        move |host, node| Value::String(host.style_get(node, &name)),
        move |host, node, value| host.style_set(node, &write_name, &stringify(value)),
    ))
}

fn style_into(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    let name = left_operand(args, "style")?.to_string();
    Ok(aggregate(args, move |host, node, value| {
        host.style_set(node, &name, &stringify(value))
    }))
}

fn text_as(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    Ok(expose(
        args,
        |host, node| Value::String(host.text_get(node)),
        |host, node, value| host.text_set(node, &stringify(value)),
    ))
}

fn text_into(args: &ProcessArgs<'_>) -> Result<Binding, BindError> {
    Ok(aggregate(args, |host, node, value| {
        host.text_set(node, &stringify(value))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDom;
    use crate::expression::parse;
    use std::cell::Cell;

    struct Fixture {
        dom: Rc<MemoryDom>,
        host: Rc<dyn Dom>,
        scope: ScopeMap,
        context: HandlerTable,
    }

    impl Fixture {
        fn new(markup: &str) -> Self {
            let dom = Rc::new(MemoryDom::parse(markup).unwrap());
            let host: Rc<dyn Dom> = dom.clone();
            Self {
                dom,
                host,
                scope: ScopeMap::new(),
                context: HandlerTable::new(),
            }
        }

        fn element(&self) -> NodeId {
            self.dom.first_element().unwrap()
        }

        fn run(&self, binder: &str, source: &str) -> Result<Binding, BindError> {
            let registry = Registry::standard();
            let kind = registry.get(binder).unwrap();
            let expression = parse(source).unwrap().remove(0);
            let processor = kind.processor(expression.operator).unwrap();
            processor(&ProcessArgs {
                host: &self.host,
                element: self.element(),
                expression: &expression,
                scope: &self.scope,
                context: &self.context,
            })
        }
    }

    #[test]
    fn standard_catalog_order() {
        assert_eq!(
            Registry::standard().names(),
            vec!["attr", "elem", "event", "hide", "html", "prop", "show", "style", "text"]
        );
    }

    #[test]
    fn descriptors_match_catalog() {
        let registry = Registry::standard();
        assert!(registry.get("attr").unwrap().descriptor.as_ref().unwrap().req_left);
        assert!(registry.get("event").unwrap().descriptor.as_ref().unwrap().req_context);
        assert!(registry.get("text").unwrap().descriptor.is_none());
        assert_eq!(registry.get("elem").unwrap().operators(), vec![Operator::As]);
        assert_eq!(registry.get("event").unwrap().operators(), vec![Operator::On]);
    }

    #[test]
    fn with_binder_replaces_same_name() {
        let registry = Registry::standard()
            .with_binder(BinderKind::new("text").with_processor(Operator::As, elem_as));
        assert_eq!(registry.binders().len(), 9);
        assert!(!registry.get("text").unwrap().supports(Operator::Into));
    }

    #[test]
    fn truthiness() {
        for falsy in [Value::Null, Value::Bool(false), Value::from(0), Value::from("")] {
            assert!(!truthy(&falsy), "{falsy}");
        }
        for t in [Value::Bool(true), Value::from(1.5), Value::from("x"), serde_json::json!([])] {
            assert!(truthy(&t), "{t}");
        }
    }

    #[test]
    fn stringify_values() {
        assert_eq!(stringify(&Value::from("a b")), "a b");
        assert_eq!(stringify(&Value::from(3)), "3");
        assert_eq!(stringify(&Value::Bool(true)), "true");
    }

    // ═══════════════════════════════════════════════════════════════
    // Binders
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn attr_reads_and_writes() {
        let fx = Fixture::new(r#"<div class="foo"></div>"#);
        fx.run("attr", "class as cls").unwrap();
        let scope = fx.scope.wrapper();
        assert_eq!(scope.value("cls").unwrap(), Some(Value::from("foo")));
        scope.set("cls", "bar").unwrap();
        assert_eq!(fx.host.get_attribute(fx.element(), "class").as_deref(), Some("bar"));
    }

    #[test]
    fn attr_missing_reads_null() {
        let fx = Fixture::new("<div></div>");
        fx.run("attr", "title as t").unwrap();
        assert_eq!(fx.scope.wrapper().value("t").unwrap(), Some(Value::Null));
    }

    #[test]
    fn elem_exposes_element() {
        let fx = Fixture::new("<div></div>");
        fx.run("elem", "as el").unwrap();
        let bound = fx.scope.wrapper().get("el").unwrap().unwrap();
        assert_eq!(bound.as_element(), Some(fx.element()));
    }

    #[test]
    fn hide_and_show_toggle_display() {
        let fx = Fixture::new("<div></div>");
        fx.run("hide", "as hidden").unwrap();
        fx.run("show", "as shown").unwrap();
        let scope = fx.scope.wrapper();

        assert_eq!(scope.value("hidden").unwrap(), Some(Value::Bool(false)));
        scope.set("hidden", true).unwrap();
        assert_eq!(fx.host.style_get(fx.element(), "display"), "none");
        assert_eq!(scope.value("shown").unwrap(), Some(Value::Bool(false)));

        scope.set("shown", 1).unwrap();
        assert_eq!(fx.host.style_get(fx.element(), "display"), REVERT_DISPLAY);
        assert_eq!(scope.value("hidden").unwrap(), Some(Value::Bool(false)));
    }

    #[test]
    fn html_reads_and_writes_markup() {
        let fx = Fixture::new("<div><b>hi</b></div>");
        fx.run("html", "as content").unwrap();
        let scope = fx.scope.wrapper();
        assert_eq!(scope.value("content").unwrap(), Some(Value::from("<b>hi</b>")));
        scope.set("content", "<i>yo</i>").unwrap();
        assert_eq!(fx.host.text_get(fx.element()), "yo");
    }

    #[test]
    fn prop_keeps_json_values() {
        let fx = Fixture::new("<input>");
        fx.run("prop", "checked as on").unwrap();
        let scope = fx.scope.wrapper();
        scope.set("on", true).unwrap();
        assert_eq!(fx.host.get_property(fx.element(), "checked"), Value::Bool(true));
        assert_eq!(scope.value("on").unwrap(), Some(Value::Bool(true)));
    }

    #[test]
    fn style_reads_and_writes() {
        let fx = Fixture::new(r#"<div style="color: red"></div>"#);
        fx.run("style", "color as color").unwrap();
        let scope = fx.scope.wrapper();
        assert_eq!(scope.value("color").unwrap(), Some(Value::from("red")));
        scope.set("color", "blue").unwrap();
        assert_eq!(fx.host.style_get(fx.element(), "color"), "blue");
    }

    #[test]
    fn text_into_fans_out() {
        let fx = Fixture::new("<p>old</p>");
        fx.run("text", "into all").unwrap();
        fx.scope.wrapper().set("all", "new").unwrap();
        assert_eq!(fx.host.text_get(fx.element()), "new");
        assert!(fx.scope.wrapper().get("all").is_err());
    }

    #[test]
    fn missing_left_operand_is_reported() {
        let fx = Fixture::new("<div></div>");
        let err = fx.run("attr", "as cls").err().unwrap();
        assert!(matches!(err, BindError::MissingLeftOperand { .. }));
    }

    // ═══════════════════════════════════════════════════════════════
    // Events
    // ═══════════════════════════════════════════════════════════════

    #[test]
    fn event_resolves_named_handler() {
        let mut fx = Fixture::new("<button></button>");
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        fx.context.insert("save", move |_, _| {
            counter.set(counter.get() + 1);
            Value::Null
        });

        let binding = fx.run("event", "save on click").unwrap();
        assert!(binding.after_bind.is_none());
        fx.dom.dispatch(fx.element(), "click");
        assert_eq!(hits.get(), 1);

        binding.cleanup.run();
        fx.dom.dispatch(fx.element(), "click");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn event_unknown_handler_fails() {
        let fx = Fixture::new("<button></button>");
        let err = fx.run("event", "save on click").err().unwrap();
        assert_eq!(
            err,
            BindError::MissingCallback {
                name: Some("save".into()),
                event_type: "click".into()
            }
        );
    }

    #[test]
    fn event_init_runs_after_bind() {
        let mut fx = Fixture::new("<button></button>");
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        fx.context.insert("load", move |_, event| {
            assert_eq!(event.event_type(), "ready");
            counter.set(counter.get() + 1);
            Value::Null
        });

        let binding = fx.run("event", "load on ready.init").unwrap();
        assert_eq!(hits.get(), 0);
        (binding.after_bind.unwrap())();
        assert_eq!(hits.get(), 1);
    }
}
