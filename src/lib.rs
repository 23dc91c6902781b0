//! Binded - declarative DOM data binding
//!
//! Elements carry small binding expressions in prefixed attributes
//! (`binded-text="as greeting"`); binding a subtree wires them to live
//! aliases on nested scopes:
//!
//! ```
//! use std::rc::Rc;
//! use binded::{BindOptions, Engine, MemoryDom};
//!
//! let dom = Rc::new(
//!     MemoryDom::parse(r#"<div binded-scope="as app"><span binded-text="as greeting">Hi</span></div>"#)
//!         .unwrap(),
//! );
//! let root = dom.first_element().unwrap();
//! let mut engine = Engine::new(dom.clone());
//!
//! let app = engine.bind(root, &BindOptions::new()).unwrap().scope("app").unwrap();
//! assert_eq!(app.value("greeting").unwrap(), Some("Hi".into()));
//! app.set("greeting", "Bye").unwrap();
//! ```

pub mod config;
pub mod context;
pub mod dom;
pub mod engine;
pub mod error;
pub mod expression;
pub mod inspector;
pub mod operators;
pub mod registry;
pub mod resolver;
pub mod scope;
pub mod timings;

pub use config::{BindConfig, BindOptions, DuplicateScopePolicy};
pub use context::{Context, Handler, HandlerTable};
pub use dom::{Dom, DomEvent, Event, MemoryDom, NodeId};
pub use engine::{bind, Engine};
pub use error::{BindError, ErrorKind, FixSuggestion};
pub use expression::{parse, Expression, Operator};
pub use operators::Cleanup;
pub use registry::{BinderKind, Descriptor, Registry};
pub use scope::{Bound, Scope, ScopeMap};
pub use timings::{Phase, PhaseStat, Timings};
