//! Connect adapters keep diagram lines and model relationships consistent.
//!
//! When a line handle is dropped on a node, the [`ConnectorRegistry`] picks
//! the adapter registered for the node's item class and the line kind. The
//! adapter decides whether the glue is legal and, once both handles are
//! connected, finds or creates the relationship the line presents.

mod classconnect;
mod packageconnect;

use std::collections::HashMap;

use log::debug;

use crate::common::error::ModelError;
use crate::common::uuid::{ModelUuid, ViewUuid};
use crate::diagram::{Connection, HandleEnd, ItemClass, LineItem, LineKind, NodeKind, PortId};
use crate::factory::ElementFactory;
use crate::metamodel::{Attribute, ElementKind};

pub use classconnect::{AssociationConnect, DependencyConnect, GeneralizationConnect, ImplementationConnect};
pub use packageconnect::PackageImportConnect;

/// A proposed attachment of one line handle to a node port
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glue {
    pub line: ViewUuid,
    pub handle: HandleEnd,
    pub element: ViewUuid,
    pub port: PortId,
}

pub trait ConnectAdapter {
    /// Whether the handle may attach to the element. Never mutates and never fails.
    fn allow(&self, factory: &ElementFactory, glue: &Glue) -> bool;

    /// Both handles are connected: find or create the relationship and make
    /// it the line's subject.
    fn connect_subject(&self, factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd) -> Result<(), ModelError>;

    /// A connected handle moved to another element
    fn reconnect(&self, factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd) -> Result<(), ModelError>;

    /// The handle is about to be detached
    fn disconnect_subject(&self, factory: &mut ElementFactory, line: ViewUuid, _handle: HandleEnd) -> Result<(), ModelError> {
        unary_disconnect_subject(factory, line)
    }
}

/// Roles of a binary directed relationship: the metaclass and the attributes
/// pointing at the head and tail element.
#[derive(Clone, Copy, Debug)]
pub struct RelationshipEnds {
    pub kind: ElementKind,
    pub head: Attribute,
    pub tail: Attribute,
}

impl RelationshipEnds {
    pub fn role(&self, end: HandleEnd) -> Attribute {
        match end {
            HandleEnd::Head => self.head,
            HandleEnd::Tail => self.tail,
        }
    }
}

/// Glue rule shared by every relationship: both items exist on the same
/// diagram, the port is on the node and the node presents a live element.
pub fn relationship_allow(factory: &ElementFactory, glue: &Glue) -> bool {
    let (Some(line), Some(node)) = (factory.item(glue.line), factory.item(glue.element)) else {
        return false;
    };
    let (Some(_), Some(node_item)) = (line.as_line(), node.as_node()) else {
        return false;
    };
    line.diagram() == node.diagram()
        && glue.port.0 < node_item.kind.port_count()
        && node.subject().is_some_and(|s| factory.contains(s))
}

/// Whether the glued node presents an instance of `kind`
pub fn subject_is_a(factory: &ElementFactory, glue: &Glue, kind: ElementKind) -> bool {
    factory
        .item(glue.element)
        .and_then(|n| n.subject())
        .and_then(|s| factory.get(s))
        .is_some_and(|e| e.is_a(kind))
}

pub(crate) fn line_item(factory: &ElementFactory, line: ViewUuid) -> Result<&LineItem, ModelError> {
    factory
        .item_checked(line)?
        .as_line()
        .ok_or(ModelError::NotALine(line))
}

/// Subject of the node the handle is connected to
pub fn connected_subject(factory: &ElementFactory, line: ViewUuid, end: HandleEnd) -> Result<Option<ModelUuid>, ModelError> {
    Ok(line_item(factory, line)?
        .handle(end)
        .connection()
        .and_then(|c| factory.item(c.item))
        .and_then(|n| n.subject()))
}

fn connected_subjects(factory: &ElementFactory, line: ViewUuid) -> Result<Option<(ModelUuid, ModelUuid)>, ModelError> {
    Ok(match (
        connected_subject(factory, line, HandleEnd::Head)?,
        connected_subject(factory, line, HandleEnd::Tail)?,
    ) {
        (Some(head), Some(tail)) => Some((head, tail)),
        _ => None,
    })
}

/// Find a relationship between the two connected subjects. The line's own
/// subject wins when it already has the right ends; otherwise an existing
/// relation not yet shown on this diagram is picked up.
pub fn relationship(factory: &ElementFactory, line: ViewUuid, ends: &RelationshipEnds) -> Result<Option<ModelUuid>, ModelError> {
    let item = factory.item_checked(line)?;
    let Some((head_subject, tail_subject)) = connected_subjects(factory, line)? else {
        return Ok(None);
    };

    if let Some(current) = item.subject().and_then(|s| factory.get(s)) {
        if current.is_a(ends.kind)
            && current.references(ends.head) == [head_subject].as_slice()
            && current.references(ends.tail) == [tail_subject].as_slice()
        {
            return Ok(Some(current.uuid()));
        }
    }

    if !factory.settings().reuse_relationships {
        return Ok(None);
    }
    let Some(back_reference) = ends.tail.opposite() else {
        return Ok(None);
    };
    for candidate in factory.element(tail_subject)?.references(back_reference) {
        let Some(relation) = factory.get(*candidate) else {
            continue;
        };
        if !relation.is_a(ends.kind) || !relation.refers_to(ends.head, head_subject) {
            continue;
        }
        let shown_here = factory
            .presentations(relation.uuid())
            .iter()
            .any(|p| p.diagram() == item.diagram() && p.uuid() != line);
        if !shown_here {
            return Ok(Some(relation.uuid()));
        }
    }
    Ok(None)
}

pub fn relationship_or_new(factory: &mut ElementFactory, line: ViewUuid, ends: &RelationshipEnds) -> Result<ModelUuid, ModelError> {
    if let Some(relation) = relationship(factory, line, ends)? {
        debug!(relation:% = relation, kind:% = ends.kind; "reusing relationship");
        return Ok(relation);
    }
    let Some((head_subject, tail_subject)) = connected_subjects(factory, line)? else {
        return Err(ModelError::InvalidState(format!("line {} is not connected at both ends", line)));
    };
    let relation = factory.create(ends.kind)?;
    factory.add_reference(relation, ends.head, head_subject)?;
    factory.add_reference(relation, ends.tail, tail_subject)?;
    place_in_diagram_package(factory, line, relation)?;
    debug!(relation:% = relation, kind:% = ends.kind; "created relationship");
    Ok(relation)
}

/// Put a new relationship into the package owning the line's diagram
pub(crate) fn place_in_diagram_package(factory: &mut ElementFactory, line: ViewUuid, relation: ModelUuid) -> Result<(), ModelError> {
    if !factory.element(relation)?.is_a(ElementKind::PackageableElement) {
        return Ok(());
    }
    let diagram = factory.item_checked(line)?.diagram();
    match factory.element(diagram)?.reference(Attribute::Package) {
        Some(package) => factory.set_reference(relation, Attribute::Package, Some(package)),
        None => Ok(()),
    }
}

/// Point the moved role at the element now connected to `handle`, clearing
/// whatever it referenced before.
pub fn reconnect_relationship(factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd, ends: &RelationshipEnds) -> Result<(), ModelError> {
    let Some(relation) = factory.item_checked(line)?.subject() else {
        return Ok(());
    };
    let Some(target) = connected_subject(factory, line, handle)? else {
        return Ok(());
    };
    let role = ends.role(handle);
    factory.clear_attribute(relation, role)?;
    factory.add_reference(relation, role, target)?;
    debug!(relation:% = relation, role:% = role; "reconnected relationship");
    Ok(())
}

/// Clear the line's subject and drop the relationship once nothing presents it
pub fn unary_disconnect_subject(factory: &mut ElementFactory, line: ViewUuid) -> Result<(), ModelError> {
    let Some(relation) = factory.item_checked(line)?.subject() else {
        return Ok(());
    };
    factory.set_item_subject(line, None)?;
    unlink_orphan(factory, relation)
}

/// Unlink a relationship no diagram item presents any more, together with
/// the member ends of an association.
pub(crate) fn unlink_orphan(factory: &mut ElementFactory, relation: ModelUuid) -> Result<(), ModelError> {
    if !factory.contains(relation) || !factory.presentations(relation).is_empty() {
        return Ok(());
    }
    debug!(relation:% = relation; "unlinking orphaned relationship");
    let ends = factory.element(relation)?.references(Attribute::MemberEnd).to_vec();
    for end in ends {
        if factory.contains(end) {
            factory.unlink(end)?;
        }
    }
    factory.unlink(relation)
}

pub struct ConnectorRegistry {
    adapters: HashMap<(ItemClass, LineKind), Box<dyn ConnectAdapter>>,
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        let mut r = Self::empty();
        r.register(ItemClass::Named, LineKind::Dependency, DependencyConnect);
        r.register(ItemClass::Classifier, LineKind::Generalization, GeneralizationConnect);
        r.register(ItemClass::Classifier, LineKind::Association, AssociationConnect);
        r.register(ItemClass::Named, LineKind::Implementation, ImplementationConnect);
        r.register(ItemClass::Package, LineKind::PackageImport, PackageImportConnect);
        r
    }
}

impl ConnectorRegistry {
    pub fn empty() -> Self {
        Self { adapters: HashMap::new() }
    }

    /// Register an adapter, returning the one it replaces
    pub fn register(
        &mut self,
        class: ItemClass,
        line: LineKind,
        adapter: impl ConnectAdapter + 'static,
    ) -> Option<Box<dyn ConnectAdapter>> {
        self.adapters.insert((class, line), Box::new(adapter))
    }

    /// The adapter of the most specific item class of `node` that has one
    pub fn adapter_for(&self, node: NodeKind, line: LineKind) -> Option<&dyn ConnectAdapter> {
        node.item_classes()
            .iter()
            .find_map(|c| self.adapters.get(&(*c, line)))
            .map(|a| a.as_ref())
    }

    fn adapter_for_glue(&self, factory: &ElementFactory, glue: &Glue) -> Result<&dyn ConnectAdapter, ModelError> {
        let node = factory
            .item_checked(glue.element)?
            .as_node()
            .ok_or(ModelError::NotANode(glue.element))?
            .kind;
        let line = line_item(factory, glue.line)?.kind;
        self.adapter_for(node, line)
            .ok_or(ModelError::NoAdapter { node, line })
    }

    pub fn allow(&self, factory: &ElementFactory, glue: &Glue) -> bool {
        self.adapter_for_glue(factory, glue)
            .is_ok_and(|a| a.allow(factory, glue))
    }

    /// Check a glue and record it on the handle for live feedback
    pub fn glue(&self, factory: &mut ElementFactory, glue: &Glue) -> Result<bool, ModelError> {
        let allowed = self.allow(factory, glue);
        let connection = allowed.then_some(Connection { item: glue.element, port: glue.port });
        factory.set_glued(glue.line, glue.handle, connection)?;
        Ok(allowed)
    }

    /// Connect the handle. Returns `false`, leaving everything untouched, when
    /// the glue is not allowed.
    pub fn connect(&self, factory: &mut ElementFactory, glue: &Glue) -> Result<bool, ModelError> {
        if !self.allow(factory, glue) {
            debug!(line:% = glue.line, element:% = glue.element; "connection refused");
            return Ok(false);
        }
        let adapter = self.adapter_for_glue(factory, glue)?;

        factory.batch(|f| {
            let mut item = f.item_checked(glue.line)?.clone();
            let subject = item.subject();
            let line = item.as_line_mut().ok_or(ModelError::NotALine(glue.line))?;
            let handle = line.handle_mut(glue.handle);
            let previous = handle.connected.replace(Connection { item: glue.element, port: glue.port });
            handle.glued = None;
            let opposite_connected = line.handle(glue.handle.opposite()).connection().is_some();
            f.update_item(item)?;

            if !opposite_connected {
                return Ok(true);
            }
            let previous_subject = previous.and_then(|c| f.item(c.item)).and_then(|n| n.subject());
            let current_subject = f.item(glue.element).and_then(|n| n.subject());
            match (subject, previous) {
                (Some(_), Some(_)) if previous_subject != current_subject => {
                    adapter.reconnect(f, glue.line, glue.handle)?;
                }
                (Some(_), Some(_)) => {}
                (stale, _) => {
                    adapter.connect_subject(f, glue.line, glue.handle)?;
                    // a subject left over from a handle detached without the
                    // registry is dropped once the line moved on
                    if let Some(stale) = stale.filter(|s| f.item(glue.line).and_then(|i| i.subject()) != Some(*s)) {
                        unlink_orphan(f, stale)?;
                    }
                }
            }
            Ok(true)
        })
    }

    /// Detach a handle, letting the adapter release the relationship first
    pub fn disconnect(&self, factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd) -> Result<(), ModelError> {
        let item = factory.item_checked(line)?;
        let l = item.as_line().ok_or(ModelError::NotALine(line))?;
        let Some(connection) = l.handle(handle).connection() else {
            return Ok(());
        };
        let line_kind = l.kind;
        let presents = item.subject().is_some()
            || l.end_subject(HandleEnd::Head).is_some()
            || l.end_subject(HandleEnd::Tail).is_some();

        factory.batch(|f| {
            if presents {
                let adapter = f
                    .item(connection.item)
                    .and_then(|n| n.as_node())
                    .and_then(|n| self.adapter_for(n.kind, line_kind));
                match adapter {
                    Some(adapter) => adapter.disconnect_subject(f, line, handle)?,
                    None => unary_disconnect_subject(f, line)?,
                }
            }
            let mut item = f.item_checked(line)?.clone();
            if let Some(l) = item.as_line_mut() {
                let h = l.handle_mut(handle);
                h.connected = None;
                h.glued = None;
            }
            f.update_item(item)
        })
    }

    /// Remove a diagram item. Lines attached to a node, or the line's own
    /// handles, are disconnected first so their relationships are released.
    pub fn remove_item(&self, factory: &mut ElementFactory, id: ViewUuid) -> Result<(), ModelError> {
        let item = factory.item_checked(id)?;
        let handles: Vec<(ViewUuid, HandleEnd)> = match item.as_line() {
            Some(_) => vec![(id, HandleEnd::Head), (id, HandleEnd::Tail)],
            None => factory
                .items()
                .filter_map(|i| i.as_line().map(|l| (i.uuid(), l.ends_connected_to(id))))
                .flat_map(|(line, ends)| ends.into_iter().map(move |e| (line, e)))
                .collect(),
        };
        factory.batch(|f| {
            for (line, end) in handles {
                self.disconnect(f, line, end)?;
            }
            f.remove_item(id)
        })
    }
}
