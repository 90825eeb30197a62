//! Core of a UML model editor.
//!
//! The [`ElementFactory`] owns the model elements and the diagram items that
//! present them. Every change goes through a reversible command, so it can be
//! grouped into transactions for undo and redo, and is announced on the
//! factory's event bus. [`ConnectorRegistry`] keeps diagram lines and the
//! relationships they present consistent while handles are connected and
//! moved.
//!
//! ```
//! use nh_model::{ConnectorRegistry, ElementFactory, ElementKind, Glue, HandleEnd, LineKind, NodeKind, PortId};
//!
//! let mut factory = ElementFactory::new();
//! let registry = ConnectorRegistry::default();
//! let diagram = factory.create(ElementKind::Diagram)?;
//! let a = factory.create(ElementKind::Class)?;
//! let b = factory.create(ElementKind::Class)?;
//! let na = factory.create_item(diagram, NodeKind::Class, Some(a))?;
//! let nb = factory.create_item(diagram, NodeKind::Class, Some(b))?;
//! let line = factory.create_item(diagram, LineKind::Association, None)?;
//!
//! factory.begin_transaction()?;
//! registry.connect(&mut factory, &Glue { line, handle: HandleEnd::Head, element: na, port: PortId(0) })?;
//! registry.connect(&mut factory, &Glue { line, handle: HandleEnd::Tail, element: nb, port: PortId(2) })?;
//! factory.commit_transaction()?;
//! assert_eq!(factory.lselect_kind(ElementKind::Association).len(), 1);
//!
//! factory.undo_transaction()?;
//! assert!(factory.lselect_kind(ElementKind::Association).is_empty());
//! # Ok::<(), nh_model::ModelError>(())
//! ```

pub mod common;
pub mod connectors;
pub mod diagram;
pub mod element;
pub mod factory;
pub mod metamodel;
pub mod modelfactory;
pub mod undo;

pub use common::error::ModelError;
pub use common::observer::{EventKind, ModelEvent, Observable, Subscription, SubscriptionId};
pub use common::settings::ModelSettings;
pub use common::uuid::{ModelUuid, ViewUuid};
pub use connectors::{ConnectAdapter, ConnectorRegistry, Glue};
pub use diagram::{DiagramItem, HandleEnd, HandleState, ItemKind, LineKind, NodeKind, PortId};
pub use element::Element;
pub use factory::ElementFactory;
pub use metamodel::{Attribute, ElementKind, Navigability, Value};
