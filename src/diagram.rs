//! Diagram items: the graphical side of the model.
//!
//! Items live in the factory next to the elements but are keyed by
//! [`ViewUuid`]. An item presents at most one element (its subject); lines
//! additionally carry a head and a tail [`Handle`] that attach to node ports.

use serde::{Deserialize, Serialize};

use crate::common::uuid::{ModelUuid, ViewUuid};
use crate::metamodel::ElementKind;

/// Item classes used to pick a connect adapter; a node kind may belong to
/// several of them, most specific first.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum ItemClass {
    Named,
    Classifier,
    Package,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum NodeKind {
    Class,
    Interface,
    Component,
    Actor,
    DataType,
    Enumeration,
    Package,
    Comment,
}

impl NodeKind {
    pub fn item_classes(&self) -> &'static [ItemClass] {
        match self {
            NodeKind::Class
            | NodeKind::Interface
            | NodeKind::Component
            | NodeKind::Actor
            | NodeKind::DataType
            | NodeKind::Enumeration => &[ItemClass::Classifier, ItemClass::Named],
            NodeKind::Package => &[ItemClass::Package, ItemClass::Named],
            NodeKind::Comment => &[],
        }
    }

    /// Boxes have one port per side
    pub fn port_count(&self) -> usize {
        4
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
pub enum LineKind {
    Dependency,
    Generalization,
    Association,
    Implementation,
    PackageImport,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::From)]
pub enum ItemKind {
    Node(NodeKind),
    Line(LineKind),
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleEnd {
    Head,
    Tail,
}

impl HandleEnd {
    pub fn opposite(&self) -> HandleEnd {
        match self {
            HandleEnd::Head => HandleEnd::Tail,
            HandleEnd::Tail => HandleEnd::Head,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandleState {
    Unconnected,
    Glued,
    Connected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub item: ViewUuid,
    pub port: PortId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Handle {
    pub(crate) connected: Option<Connection>,
    pub(crate) glued: Option<Connection>,
}

impl Handle {
    pub fn state(&self) -> HandleState {
        if self.connected.is_some() {
            HandleState::Connected
        } else if self.glued.is_some() {
            HandleState::Glued
        } else {
            HandleState::Unconnected
        }
    }

    pub fn connection(&self) -> Option<Connection> {
        self.connected
    }

    pub fn glued_to(&self) -> Option<Connection> {
        self.glued
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeItem {
    pub kind: NodeKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineItem {
    pub kind: LineKind,
    pub(crate) head: Handle,
    pub(crate) tail: Handle,
    /// Member-end subjects of association lines
    pub(crate) head_end: Option<ModelUuid>,
    pub(crate) tail_end: Option<ModelUuid>,
    /// Compute the dependency subtype from the connected elements
    pub auto_dependency: bool,
    pub dependency_type: ElementKind,
}

impl LineItem {
    pub(crate) fn new(kind: LineKind, auto_dependency: bool) -> Self {
        Self {
            kind,
            head: Handle::default(),
            tail: Handle::default(),
            head_end: None,
            tail_end: None,
            auto_dependency,
            dependency_type: ElementKind::Dependency,
        }
    }

    pub fn handle(&self, end: HandleEnd) -> &Handle {
        match end {
            HandleEnd::Head => &self.head,
            HandleEnd::Tail => &self.tail,
        }
    }

    pub(crate) fn handle_mut(&mut self, end: HandleEnd) -> &mut Handle {
        match end {
            HandleEnd::Head => &mut self.head,
            HandleEnd::Tail => &mut self.tail,
        }
    }

    pub fn end_subject(&self, end: HandleEnd) -> Option<ModelUuid> {
        match end {
            HandleEnd::Head => self.head_end,
            HandleEnd::Tail => self.tail_end,
        }
    }

    pub(crate) fn set_end_subject(&mut self, end: HandleEnd, subject: Option<ModelUuid>) {
        match end {
            HandleEnd::Head => self.head_end = subject,
            HandleEnd::Tail => self.tail_end = subject,
        }
    }

    /// Ends attached to the given item
    pub fn ends_connected_to(&self, item: ViewUuid) -> Vec<HandleEnd> {
        [HandleEnd::Head, HandleEnd::Tail]
            .into_iter()
            .filter(|e| self.handle(*e).connected.is_some_and(|c| c.item == item))
            .collect()
    }

    /// Whether either handle is connected or glued to `item`
    pub fn is_attached_to(&self, item: ViewUuid) -> bool {
        [&self.head, &self.tail].into_iter().any(|h| {
            h.connected.is_some_and(|c| c.item == item) || h.glued.is_some_and(|c| c.item == item)
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ItemShape {
    Node(NodeItem),
    Line(LineItem),
}

#[derive(Clone, Debug, PartialEq)]
pub struct DiagramItem {
    uuid: ViewUuid,
    diagram: ModelUuid,
    pub(crate) subject: Option<ModelUuid>,
    pub(crate) shape: ItemShape,
}

impl DiagramItem {
    pub(crate) fn new(diagram: ModelUuid, kind: ItemKind, subject: Option<ModelUuid>, auto_dependency: bool) -> Self {
        let shape = match kind {
            ItemKind::Node(kind) => ItemShape::Node(NodeItem { kind }),
            ItemKind::Line(kind) => ItemShape::Line(LineItem::new(kind, auto_dependency)),
        };
        Self {
            uuid: ViewUuid::now_v7(),
            diagram,
            subject,
            shape,
        }
    }

    pub fn uuid(&self) -> ViewUuid {
        self.uuid
    }

    pub fn diagram(&self) -> ModelUuid {
        self.diagram
    }

    pub fn subject(&self) -> Option<ModelUuid> {
        self.subject
    }

    pub fn shape(&self) -> &ItemShape {
        &self.shape
    }

    pub fn kind(&self) -> ItemKind {
        match &self.shape {
            ItemShape::Node(n) => ItemKind::Node(n.kind),
            ItemShape::Line(l) => ItemKind::Line(l.kind),
        }
    }

    pub fn as_node(&self) -> Option<&NodeItem> {
        match &self.shape {
            ItemShape::Node(n) => Some(n),
            ItemShape::Line(_) => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineItem> {
        match &self.shape {
            ItemShape::Line(l) => Some(l),
            ItemShape::Node(_) => None,
        }
    }

    pub(crate) fn as_line_mut(&mut self) -> Option<&mut LineItem> {
        match &mut self.shape {
            ItemShape::Line(l) => Some(l),
            ItemShape::Node(_) => None,
        }
    }

    /// Whether the item shows `element` as its subject or as one of its ends
    pub fn presents(&self, element: ModelUuid) -> bool {
        self.subject == Some(element)
            || self
                .as_line()
                .is_some_and(|l| l.head_end == Some(element) || l.tail_end == Some(element))
    }

    /// Clear every weak reference to `element`; returns whether anything changed
    pub(crate) fn forget_element(&mut self, element: ModelUuid) -> bool {
        let mut changed = false;
        if self.subject == Some(element) {
            self.subject = None;
            changed = true;
        }
        if let Some(l) = self.as_line_mut() {
            for end in [HandleEnd::Head, HandleEnd::Tail] {
                if l.end_subject(end) == Some(element) {
                    l.set_end_subject(end, None);
                    changed = true;
                }
            }
        }
        changed
    }

    /// Detach handles attached to `item`; returns whether anything changed
    pub(crate) fn forget_item(&mut self, item: ViewUuid) -> bool {
        let mut changed = false;
        if let Some(l) = self.as_line_mut() {
            for end in [HandleEnd::Head, HandleEnd::Tail] {
                let h = l.handle_mut(end);
                if h.connected.is_some_and(|c| c.item == item) {
                    h.connected = None;
                    changed = true;
                }
                if h.glued.is_some_and(|c| c.item == item) {
                    h.glued = None;
                    changed = true;
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_handle_states() {
        let mut h = Handle::default();
        assert_eq!(h.state(), HandleState::Unconnected);
        let c = Connection { item: ViewUuid::now_v7(), port: PortId(0) };
        h.glued = Some(c);
        assert_eq!(h.state(), HandleState::Glued);
        h.connected = Some(c);
        assert_eq!(h.state(), HandleState::Connected);
    }

    #[test]
    fn test_forget_element_clears_subject_and_ends() {
        let diagram = ModelUuid::now_v7();
        let assoc = ModelUuid::now_v7();
        let end = ModelUuid::now_v7();
        let mut item = DiagramItem::new(diagram, LineKind::Association.into(), Some(assoc), true);
        item.as_line_mut().unwrap().head_end = Some(end);

        assert!(item.presents(end));
        assert!(item.forget_element(end));
        assert!(!item.presents(end));
        assert_eq!(item.subject(), Some(assoc));
        assert!(!item.forget_element(end));
    }

    #[test]
    fn test_forget_item_detaches_handles() {
        let node = ViewUuid::now_v7();
        let mut item = DiagramItem::new(ModelUuid::now_v7(), LineKind::Dependency.into(), None, true);
        item.as_line_mut().unwrap().tail.connected = Some(Connection { item: node, port: PortId(2) });
        assert_eq!(item.as_line().unwrap().ends_connected_to(node), vec![HandleEnd::Tail]);

        assert!(item.forget_item(node));
        assert_eq!(item.as_line().unwrap().handle(HandleEnd::Tail).state(), HandleState::Unconnected);
    }

    #[test]
    fn test_node_classes() {
        assert_eq!(NodeKind::Class.item_classes()[0], ItemClass::Classifier);
        assert!(NodeKind::Package.item_classes().contains(&ItemClass::Named));
        assert!(NodeKind::Comment.item_classes().is_empty());
    }
}
