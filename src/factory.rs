//! The element store.
//!
//! [`ElementFactory`] owns every live [`Element`] and every [`DiagramItem`].
//! All other references are identities looked up here, so removal from the
//! factory is the only authority on liveness.
//!
//! Mutations are funnelled through [`ModelCommand`]s: applying a command
//! pushes its inverse to an undo accumulator, and an open transaction keeps
//! those inverses. Compound operations hold event delivery until they are
//! complete, so observers never see a half-updated model.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, trace, warn};

use crate::common::error::ModelError;
use crate::common::observer::{EventBus, Observable, ModelEvent, Subscription};
use crate::common::settings::ModelSettings;
use crate::common::uuid::{ModelUuid, ViewUuid};
use crate::diagram::{Connection, DiagramItem, HandleEnd, ItemKind};
use crate::element::Element;
use crate::metamodel::{Attribute, AttributeData, ElementKind, Value};
use crate::undo::{ModelCommand, Transaction, UndoManager};

pub struct ElementFactory {
    elements: IndexMap<ModelUuid, Element>,
    items: IndexMap<ViewUuid, DiagramItem>,
    bus: EventBus<ElementFactory>,
    undo: UndoManager,
    settings: ModelSettings,
}

impl Default for ElementFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable for ElementFactory {
    fn event_bus(&mut self) -> &mut EventBus<Self> {
        &mut self.bus
    }
}

impl ElementFactory {
    pub fn new() -> Self {
        Self::with_settings(ModelSettings::default())
    }

    pub fn with_settings(settings: ModelSettings) -> Self {
        Self {
            elements: IndexMap::new(),
            items: IndexMap::new(),
            bus: EventBus::new(),
            undo: UndoManager::new(settings.undo_depth),
            settings,
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    // Queries

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// Live elements in creation order
    pub fn values(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn lselect(&self, predicate: impl Fn(&Element) -> bool) -> Vec<&Element> {
        self.elements.values().filter(|e| predicate(e)).collect()
    }

    /// Instances of `kind`, including its specializations
    pub fn lselect_kind(&self, kind: ElementKind) -> Vec<&Element> {
        self.lselect(|e| e.is_a(kind))
    }

    pub fn get(&self, id: ModelUuid) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn contains(&self, id: ModelUuid) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn element(&self, id: ModelUuid) -> Result<&Element, ModelError> {
        self.elements.get(&id).ok_or(ModelError::DanglingReference(id))
    }

    /// Diagram items showing `element` as subject or as an association end
    pub fn presentations(&self, element: ModelUuid) -> Vec<&DiagramItem> {
        self.items.values().filter(|i| i.presents(element)).collect()
    }

    // Lifecycle

    pub fn create(&mut self, kind: ElementKind) -> Result<ModelUuid, ModelError> {
        self.create_as(kind, ModelUuid::now_v7())
    }

    /// Create with a known identity, as a loader restoring a saved model does
    pub fn create_as(&mut self, kind: ElementKind, uuid: ModelUuid) -> Result<ModelUuid, ModelError> {
        if kind.is_abstract() {
            return Err(ModelError::AbstractMetaclass(kind));
        }
        if self.elements.contains_key(&uuid) {
            return Err(ModelError::InvalidState(format!("element {} already exists", uuid)));
        }
        let position = self.elements.len();
        self.batch(|f| {
            f.perform(ModelCommand::InsertElement {
                element: Element::new(uuid, kind),
                position,
            })
        })?;
        Ok(uuid)
    }

    /// Remove `id` from the model together with the elements it owns, after
    /// detaching every reference from and to it.
    pub fn unlink(&mut self, id: ModelUuid) -> Result<(), ModelError> {
        self.element(id)?;
        let mut visited = HashSet::new();
        self.batch(|f| f.unlink_recursive(id, &mut visited))
    }

    fn unlink_recursive(&mut self, id: ModelUuid, visited: &mut HashSet<ModelUuid>) -> Result<(), ModelError> {
        if !visited.insert(id) {
            return Ok(());
        }
        let Some(element) = self.elements.get(&id) else {
            return Ok(());
        };
        let kind = element.kind();

        let owned: Vec<ModelUuid> = element
            .values()
            .filter(|(a, _)| a.spec().composite)
            .flat_map(|(a, _)| element.references(a).iter().copied())
            .collect();
        for child in owned {
            self.unlink_recursive(child, visited)?;
        }

        if kind == ElementKind::Diagram {
            let shown: Vec<ViewUuid> = self
                .items
                .values()
                .filter(|i| i.diagram() == id)
                .map(|i| i.uuid())
                .collect();
            for item in shown {
                self.remove_item(item)?;
            }
        }

        let presenting: Vec<DiagramItem> = self
            .items
            .values()
            .filter(|i| i.presents(id))
            .cloned()
            .collect();
        for mut item in presenting {
            item.forget_element(id);
            self.perform(ModelCommand::UpdateItem(item))?;
        }

        let outgoing: Vec<(Attribute, ModelUuid)> = self
            .element(id)?
            .values()
            .filter(|(a, _)| a.is_reference())
            .flat_map(|(a, v)| match v {
                Value::Reference(r) => vec![(a, *r)],
                Value::References(rs) => rs.iter().map(|r| (a, *r)).collect(),
                _ => vec![],
            })
            .collect();
        for (attribute, target) in outgoing {
            self.unlink_reference(id, attribute, target)?;
        }

        // One-way attributes of other elements still pointing here
        let incoming: Vec<(ModelUuid, Attribute)> = self
            .elements
            .values()
            .filter(|e| e.uuid() != id)
            .flat_map(|e| e.attributes_referencing(id).into_iter().map(move |a| (e.uuid(), a)))
            .collect();
        for (source, attribute) in incoming {
            self.unlink_reference(source, attribute, id)?;
        }

        debug!(element:% = id, kind:% = kind; "unlinking element");
        self.perform(ModelCommand::RemoveElement(id))
    }

    /// Drop every element and item at once. No per-element cascade runs and
    /// only a single [`ModelEvent::FlushFactory`] is emitted.
    pub fn flush(&mut self) {
        self.elements.clear();
        self.items.clear();
        self.undo.reset();
        self.notify_observers(ModelEvent::FlushFactory);
    }

    /// Announce that the model was bulk-loaded from outside
    pub fn notify_model(&mut self) {
        self.notify_observers(ModelEvent::ModelFactory);
    }

    pub fn subscribe<F, H>(&mut self, filter: F, callback: H) -> Subscription
    where
        F: Fn(&ModelEvent) -> bool + 'static,
        H: FnMut(&ModelEvent, &mut ElementFactory) -> Result<(), ModelError> + 'static,
    {
        self.bus.subscribe(filter, callback)
    }

    /// Run `f` with event delivery held until it returns
    pub fn batch<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ModelError>) -> Result<T, ModelError> {
        self.hold_events();
        let result = f(self);
        self.release_events();
        result
    }

    // Attributes

    pub fn set_value(&mut self, id: ModelUuid, attribute: Attribute, value: Value) -> Result<(), ModelError> {
        let element = self.element(id)?;
        if !element.has_attribute(attribute) || attribute.is_reference() || !value.fits(attribute) {
            return Err(ModelError::AttributeMismatch { kind: element.kind(), attribute });
        }
        if element.get(attribute) == Some(&value) {
            return Ok(());
        }
        self.batch(|f| f.perform(ModelCommand::SetValue(id, attribute, Some(value))))
    }

    /// Set or clear a single-valued reference. The opposite side, if any,
    /// follows, and a previous target is released on both sides.
    pub fn set_reference(&mut self, id: ModelUuid, attribute: Attribute, target: Option<ModelUuid>) -> Result<(), ModelError> {
        let element = self.element(id)?;
        if attribute.spec().many {
            return Err(ModelError::AttributeMismatch { kind: element.kind(), attribute });
        }
        match target {
            Some(target) => self.add_reference(id, attribute, target),
            None => self.clear_attribute(id, attribute),
        }
    }

    pub fn add_reference(&mut self, id: ModelUuid, attribute: Attribute, target: ModelUuid) -> Result<(), ModelError> {
        self.check_reference(id, attribute, Some(target))?;
        self.batch(|f| f.link_reference(id, attribute, target))
    }

    pub fn remove_reference(&mut self, id: ModelUuid, attribute: Attribute, target: ModelUuid) -> Result<(), ModelError> {
        self.check_reference(id, attribute, None)?;
        self.batch(|f| f.unlink_reference(id, attribute, target))
    }

    pub fn clear_attribute(&mut self, id: ModelUuid, attribute: Attribute) -> Result<(), ModelError> {
        let element = self.element(id)?;
        if !element.has_attribute(attribute) {
            return Err(ModelError::AttributeMismatch { kind: element.kind(), attribute });
        }
        if !attribute.is_reference() {
            if element.get(attribute).is_none() {
                return Ok(());
            }
            return self.batch(|f| f.perform(ModelCommand::SetValue(id, attribute, None)));
        }
        let targets = element.references(attribute).to_vec();
        self.batch(|f| {
            for target in targets {
                f.unlink_reference(id, attribute, target)?;
            }
            Ok(())
        })
    }

    fn check_reference(&self, id: ModelUuid, attribute: Attribute, target: Option<ModelUuid>) -> Result<(), ModelError> {
        let element = self.element(id)?;
        let AttributeData::Reference(target_kind) = attribute.spec().data else {
            return Err(ModelError::AttributeMismatch { kind: element.kind(), attribute });
        };
        if !element.has_attribute(attribute) {
            return Err(ModelError::AttributeMismatch { kind: element.kind(), attribute });
        }
        if let Some(target) = target {
            let t = self.element(target)?;
            if !t.is_a(target_kind) {
                return Err(ModelError::AttributeMismatch { kind: t.kind(), attribute });
            }
        }
        Ok(())
    }

    fn link_reference(&mut self, id: ModelUuid, attribute: Attribute, target: ModelUuid) -> Result<(), ModelError> {
        self.displace(id, attribute, target)?;
        self.insert_reference(id, attribute, target)?;
        if let Some(opposite) = attribute.opposite() {
            self.displace(target, opposite, id)?;
            self.insert_reference(target, opposite, id)?;
        }
        Ok(())
    }

    fn unlink_reference(&mut self, id: ModelUuid, attribute: Attribute, target: ModelUuid) -> Result<(), ModelError> {
        self.erase_reference(id, attribute, target)?;
        if let Some(opposite) = attribute.opposite() {
            if self.elements.contains_key(&target) {
                self.erase_reference(target, opposite, id)?;
            }
        }
        Ok(())
    }

    /// Release the current target of a single-valued slot before `incoming` takes it
    fn displace(&mut self, id: ModelUuid, attribute: Attribute, incoming: ModelUuid) -> Result<(), ModelError> {
        if attribute.spec().many {
            return Ok(());
        }
        match self.element(id)?.reference(attribute) {
            Some(previous) if previous != incoming => self.unlink_reference(id, attribute, previous),
            _ => Ok(()),
        }
    }

    fn insert_reference(&mut self, id: ModelUuid, attribute: Attribute, target: ModelUuid) -> Result<(), ModelError> {
        let element = self.element(id)?;
        if element.refers_to(attribute, target) {
            return Ok(());
        }
        let value = if attribute.spec().many {
            let mut targets = element.references(attribute).to_vec();
            targets.push(target);
            Value::References(targets)
        } else {
            Value::Reference(target)
        };
        self.perform(ModelCommand::SetValue(id, attribute, Some(value)))
    }

    fn erase_reference(&mut self, id: ModelUuid, attribute: Attribute, target: ModelUuid) -> Result<(), ModelError> {
        let element = self.element(id)?;
        if !element.refers_to(attribute, target) {
            return Ok(());
        }
        let remaining: Vec<ModelUuid> = element
            .references(attribute)
            .iter()
            .filter(|r| **r != target)
            .copied()
            .collect();
        let value = if remaining.is_empty() {
            None
        } else {
            Some(Value::References(remaining))
        };
        self.perform(ModelCommand::SetValue(id, attribute, value))
    }

    // Diagram items

    pub fn create_item(&mut self, diagram: ModelUuid, kind: impl Into<ItemKind>, subject: Option<ModelUuid>) -> Result<ViewUuid, ModelError> {
        if self.element(diagram)?.kind() != ElementKind::Diagram {
            return Err(ModelError::NotADiagram(diagram));
        }
        if let Some(subject) = subject {
            self.element(subject)?;
        }
        let item = DiagramItem::new(diagram, kind.into(), subject, self.settings.auto_dependency);
        let uuid = item.uuid();
        let position = self.items.len();
        self.batch(|f| f.perform(ModelCommand::InsertItem { item, position }))?;
        Ok(uuid)
    }

    pub fn item(&self, id: ViewUuid) -> Option<&DiagramItem> {
        self.items.get(&id)
    }

    pub fn item_checked(&self, id: ViewUuid) -> Result<&DiagramItem, ModelError> {
        self.items.get(&id).ok_or(ModelError::UnknownItem(id))
    }

    pub fn items(&self) -> impl Iterator<Item = &DiagramItem> {
        self.items.values()
    }

    pub fn items_of(&self, diagram: ModelUuid) -> Vec<&DiagramItem> {
        self.items.values().filter(|i| i.diagram() == diagram).collect()
    }

    pub fn set_item_subject(&mut self, id: ViewUuid, subject: Option<ModelUuid>) -> Result<(), ModelError> {
        if let Some(subject) = subject {
            self.element(subject)?;
        }
        let mut item = self.item_checked(id)?.clone();
        item.subject = subject;
        self.update_item(item)
    }

    /// Store a changed copy of an item; no-op when nothing changed
    pub(crate) fn update_item(&mut self, item: DiagramItem) -> Result<(), ModelError> {
        if self.item_checked(item.uuid())? == &item {
            return Ok(());
        }
        self.batch(|f| f.perform(ModelCommand::UpdateItem(item)))
    }

    /// Glue feedback is transient and bypasses the transaction log
    pub(crate) fn set_glued(&mut self, line: ViewUuid, end: HandleEnd, glued: Option<Connection>) -> Result<(), ModelError> {
        let item = self.items.get_mut(&line).ok_or(ModelError::UnknownItem(line))?;
        let line_item = item.as_line_mut().ok_or(ModelError::NotALine(line))?;
        line_item.handle_mut(end).glued = glued;
        Ok(())
    }

    /// Remove an item, detaching the handles of lines attached to it
    pub fn remove_item(&mut self, id: ViewUuid) -> Result<(), ModelError> {
        self.item_checked(id)?;
        self.batch(|f| {
            let attached: Vec<DiagramItem> = f
                .items
                .values()
                .filter(|i| i.as_line().is_some_and(|l| l.is_attached_to(id)))
                .cloned()
                .collect();
            for mut line in attached {
                line.forget_item(id);
                f.perform(ModelCommand::UpdateItem(line))?;
            }
            f.perform(ModelCommand::RemoveItem(id))
        })
    }

    // Transactions

    pub fn undo_manager(&self) -> &UndoManager {
        &self.undo
    }

    pub fn begin_transaction(&mut self) -> Result<(), ModelError> {
        self.undo.begin_transaction()
    }

    pub fn commit_transaction(&mut self) -> Result<(), ModelError> {
        self.undo.commit_transaction()
    }

    /// Revert the steps of the open transaction and close it
    pub fn rollback_transaction(&mut self) -> Result<(), ModelError> {
        let transaction = self.undo.take_current()?;
        if let Err(e) = self.batch(|f| f.replay(&transaction)) {
            self.undo.restore_current(transaction);
            return Err(e);
        }
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Revert the last committed transaction. When a step no longer applies
    /// the model is left as it was and the transaction stays on the undo stack.
    pub fn undo_transaction(&mut self) -> Result<(), ModelError> {
        self.undo.ensure_idle("undo")?;
        let Some(transaction) = self.undo.pop_undo() else {
            warn!("nothing to undo");
            return Ok(());
        };
        match self.batch(|f| f.replay(&transaction)) {
            Ok(redo) => {
                self.undo.push_redo(redo);
                Ok(())
            }
            Err(e) => {
                self.undo.push_undo(transaction);
                Err(e)
            }
        }
    }

    pub fn redo_transaction(&mut self) -> Result<(), ModelError> {
        self.undo.ensure_idle("redo")?;
        let Some(transaction) = self.undo.pop_redo() else {
            warn!("nothing to redo");
            return Ok(());
        };
        match self.batch(|f| f.replay(&transaction)) {
            Ok(undo) => {
                self.undo.push_undo(undo);
                Ok(())
            }
            Err(e) => {
                self.undo.push_redo(transaction);
                Err(e)
            }
        }
    }

    /// Apply a recorded transaction back to front and return the commands
    /// that revert the replay. If a command fails, the steps applied so far
    /// are reverted before the error is returned.
    fn replay(&mut self, transaction: &Transaction) -> Result<Transaction, ModelError> {
        let mut undo_accumulator = Vec::with_capacity(transaction.len());
        for command in transaction.commands().iter().rev() {
            if let Err(e) = self.apply_command(command.clone(), &mut undo_accumulator) {
                warn!(error:% = e; "replay failed, reverting {} applied steps", undo_accumulator.len());
                let mut discarded = Vec::with_capacity(undo_accumulator.len());
                for inverse in undo_accumulator.into_iter().rev() {
                    self.apply_command(inverse, &mut discarded)?;
                }
                return Err(e);
            }
        }
        Ok(Transaction::from_commands(undo_accumulator))
    }

    fn perform(&mut self, command: ModelCommand) -> Result<(), ModelError> {
        let mut undo_accumulator = Vec::new();
        self.apply_command(command, &mut undo_accumulator)?;
        for inverse in undo_accumulator {
            self.undo.record(inverse);
        }
        Ok(())
    }

    fn apply_command(&mut self, command: ModelCommand, undo_accumulator: &mut Vec<ModelCommand>) -> Result<(), ModelError> {
        trace!("applying command: {}", command.info_text());
        match command {
            ModelCommand::InsertElement { element, position } => {
                let (uuid, kind) = (element.uuid(), element.kind());
                if self.elements.contains_key(&uuid) {
                    return Err(ModelError::InvalidState(format!("element {} already exists", uuid)));
                }
                let position = position.min(self.elements.len());
                self.elements.shift_insert(position, uuid, element);
                undo_accumulator.push(ModelCommand::RemoveElement(uuid));
                self.notify_observers(ModelEvent::ElementCreate { element: uuid, kind });
            }
            ModelCommand::RemoveElement(uuid) => {
                let (position, _, element) = self
                    .elements
                    .shift_remove_full(&uuid)
                    .ok_or(ModelError::DanglingReference(uuid))?;
                let kind = element.kind();
                undo_accumulator.push(ModelCommand::InsertElement { element, position });
                self.notify_observers(ModelEvent::ElementDelete { element: uuid, kind });
            }
            ModelCommand::SetValue(uuid, attribute, value) => {
                let element = self
                    .elements
                    .get_mut(&uuid)
                    .ok_or(ModelError::DanglingReference(uuid))?;
                let previous = element.put(attribute, value);
                undo_accumulator.push(ModelCommand::SetValue(uuid, attribute, previous));
                self.notify_observers(ModelEvent::AttributeChange { element: uuid, attribute });
            }
            ModelCommand::InsertItem { item, position } => {
                let (uuid, subject) = (item.uuid(), item.subject());
                if self.items.contains_key(&uuid) {
                    return Err(ModelError::InvalidState(format!("diagram item {} already exists", uuid)));
                }
                let position = position.min(self.items.len());
                self.items.shift_insert(position, uuid, item);
                undo_accumulator.push(ModelCommand::RemoveItem(uuid));
                if subject.is_some() {
                    self.notify_observers(ModelEvent::SubjectChange { item: uuid, old: None, new: subject });
                }
            }
            ModelCommand::RemoveItem(uuid) => {
                let (position, _, item) = self
                    .items
                    .shift_remove_full(&uuid)
                    .ok_or(ModelError::UnknownItem(uuid))?;
                let subject = item.subject();
                undo_accumulator.push(ModelCommand::InsertItem { item, position });
                if subject.is_some() {
                    self.notify_observers(ModelEvent::SubjectChange { item: uuid, old: subject, new: None });
                }
            }
            ModelCommand::UpdateItem(item) => {
                let uuid = item.uuid();
                let stored = self.items.get_mut(&uuid).ok_or(ModelError::UnknownItem(uuid))?;
                let previous = std::mem::replace(stored, item);
                let (old, new) = (previous.subject(), stored.subject());
                undo_accumulator.push(ModelCommand::UpdateItem(previous));
                if old != new {
                    self.notify_observers(ModelEvent::SubjectChange { item: uuid, old, new });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::common::observer::{EventKind, any_event, kinds};
    use crate::diagram::{LineKind, NodeKind};

    fn recorded(f: &mut ElementFactory) -> (Rc<RefCell<Vec<ModelEvent>>>, Subscription) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let s = f.subscribe(any_event, move |e, _| {
            sink.borrow_mut().push(e.clone());
            Ok(())
        });
        (events, s)
    }

    #[test]
    fn test_create_abstract_fails() {
        let mut f = ElementFactory::new();
        assert!(matches!(
            f.create(ElementKind::Classifier),
            Err(ModelError::AbstractMetaclass(ElementKind::Classifier))
        ));
        assert_eq!(f.size(), 0);
    }

    #[test]
    fn test_create_as_rejects_duplicate() {
        let mut f = ElementFactory::new();
        let id = f.create(ElementKind::Class).unwrap();
        assert!(matches!(f.create_as(ElementKind::Class, id), Err(ModelError::InvalidState(_))));
        assert_eq!(f.size(), 1);
    }

    #[test]
    fn test_opposite_is_maintained() {
        let mut f = ElementFactory::new();
        let class = f.create(ElementKind::Class).unwrap();
        let attr = f.create(ElementKind::Property).unwrap();

        f.add_reference(class, Attribute::OwnedAttribute, attr).unwrap();
        assert_eq!(f.get(attr).unwrap().reference(Attribute::OwningClassifier), Some(class));

        f.set_reference(attr, Attribute::OwningClassifier, None).unwrap();
        assert!(f.get(class).unwrap().references(Attribute::OwnedAttribute).is_empty());
    }

    #[test]
    fn test_single_valued_target_is_displaced() {
        let mut f = ElementFactory::new();
        let p1 = f.create(ElementKind::Package).unwrap();
        let p2 = f.create(ElementKind::Package).unwrap();
        let class = f.create(ElementKind::Class).unwrap();

        f.set_reference(class, Attribute::Package, Some(p1)).unwrap();
        f.set_reference(class, Attribute::Package, Some(p2)).unwrap();
        assert!(f.get(p1).unwrap().references(Attribute::PackagedElement).is_empty());
        assert_eq!(f.get(p2).unwrap().references(Attribute::PackagedElement), &[class]);
    }

    #[test]
    fn test_wrong_target_kind_is_rejected() {
        let mut f = ElementFactory::new();
        let prop = f.create(ElementKind::Property).unwrap();
        let comment = f.create(ElementKind::Comment).unwrap();
        assert!(matches!(
            f.set_reference(prop, Attribute::Type, Some(comment)),
            Err(ModelError::AttributeMismatch { .. })
        ));
        assert!(matches!(
            f.set_value(comment, Attribute::Name, Value::Text("x".to_owned())),
            Err(ModelError::AttributeMismatch { .. })
        ));
        assert!(matches!(
            f.add_reference(prop, Attribute::MemberEnd, prop),
            Err(ModelError::AttributeMismatch { .. })
        ));
    }

    #[test]
    fn test_dangling_reference() {
        let mut f = ElementFactory::new();
        let class = f.create(ElementKind::Class).unwrap();
        f.unlink(class).unwrap();
        assert!(matches!(f.unlink(class), Err(ModelError::DanglingReference(id)) if id == class));
        assert!(matches!(
            f.set_value(class, Attribute::Name, Value::Text("A".to_owned())),
            Err(ModelError::DanglingReference(_))
        ));
    }

    #[test]
    fn test_unlink_clears_one_way_references() {
        let mut f = ElementFactory::new();
        let class = f.create(ElementKind::Class).unwrap();
        let prop = f.create(ElementKind::Property).unwrap();
        f.set_reference(prop, Attribute::Type, Some(class)).unwrap();

        f.unlink(class).unwrap();
        assert_eq!(f.get(prop).unwrap().reference(Attribute::Type), None);
        assert_eq!(f.size(), 1);
    }

    #[test]
    fn test_unlink_cascades_to_owned_elements() {
        let mut f = ElementFactory::new();
        let package = f.create(ElementKind::Package).unwrap();
        let class = f.create(ElementKind::Class).unwrap();
        let attr = f.create(ElementKind::Property).unwrap();
        f.set_reference(class, Attribute::Package, Some(package)).unwrap();
        f.add_reference(class, Attribute::OwnedAttribute, attr).unwrap();

        f.unlink(package).unwrap();
        assert_eq!(f.size(), 0);
    }

    #[test]
    fn test_unlink_diagram_removes_items() {
        let mut f = ElementFactory::new();
        let diagram = f.create(ElementKind::Diagram).unwrap();
        let class = f.create(ElementKind::Class).unwrap();
        f.create_item(diagram, NodeKind::Class, Some(class)).unwrap();
        f.create_item(diagram, LineKind::Dependency, None).unwrap();

        f.unlink(diagram).unwrap();
        assert_eq!(f.items().count(), 0);
        assert!(f.contains(class));
    }

    #[test]
    fn test_unlink_forgets_subject_of_items() {
        let mut f = ElementFactory::new();
        let diagram = f.create(ElementKind::Diagram).unwrap();
        let class = f.create(ElementKind::Class).unwrap();
        let item = f.create_item(diagram, NodeKind::Class, Some(class)).unwrap();

        f.unlink(class).unwrap();
        assert_eq!(f.item(item).unwrap().subject(), None);
    }

    #[test]
    fn test_create_item_needs_diagram() {
        let mut f = ElementFactory::new();
        let class = f.create(ElementKind::Class).unwrap();
        assert!(matches!(
            f.create_item(class, NodeKind::Class, None),
            Err(ModelError::NotADiagram(_))
        ));
    }

    #[test]
    fn test_events_of_compound_operation_arrive_after_it() {
        let mut f = ElementFactory::new();
        let class = f.create(ElementKind::Class).unwrap();
        let attr = f.create(ElementKind::Property).unwrap();
        f.add_reference(class, Attribute::OwnedAttribute, attr).unwrap();

        // the subscriber checks that both elements are gone when it runs
        let observed = Rc::new(RefCell::new(Vec::new()));
        let sink = observed.clone();
        let _s = f.subscribe(kinds(&[EventKind::ElementDelete]), move |_, f| {
            sink.borrow_mut().push(f.size());
            Ok(())
        });
        f.unlink(class).unwrap();
        assert_eq!(*observed.borrow(), vec![0, 0]);
    }

    #[test]
    fn test_reentrant_unlink_from_subscriber() {
        let mut f = ElementFactory::new();
        let a = f.create(ElementKind::Class).unwrap();
        let b = f.create(ElementKind::Class).unwrap();
        let _s = f.subscribe(kinds(&[EventKind::ElementDelete]), move |e, f| {
            if let ModelEvent::ElementDelete { element, .. } = e {
                if *element == a && f.contains(b) {
                    f.unlink(b)?;
                }
            }
            Ok(())
        });
        f.unlink(a).unwrap();
        assert_eq!(f.size(), 0);
    }

    #[test]
    fn test_flush_resets_log_and_emits_once() {
        let mut f = ElementFactory::new();
        f.begin_transaction().unwrap();
        f.create(ElementKind::Class).unwrap();
        let (events, _s) = recorded(&mut f);

        f.flush();
        assert_eq!(*events.borrow(), vec![ModelEvent::FlushFactory]);
        assert!(!f.undo_manager().in_transaction());
        assert!(!f.can_undo());
    }

    #[test]
    fn test_undo_attribute_change() {
        let mut f = ElementFactory::new();
        let class = f.create(ElementKind::Class).unwrap();
        f.set_value(class, Attribute::Name, Value::Text("A".to_owned())).unwrap();

        f.begin_transaction().unwrap();
        f.set_value(class, Attribute::Name, Value::Text("B".to_owned())).unwrap();
        f.commit_transaction().unwrap();
        assert_eq!(f.get(class).unwrap().name(), Some("B"));

        f.undo_transaction().unwrap();
        assert_eq!(f.get(class).unwrap().name(), Some("A"));
        f.redo_transaction().unwrap();
        assert_eq!(f.get(class).unwrap().name(), Some("B"));
    }

    #[test]
    fn test_undo_unlink_restores_references_and_order() {
        let mut f = ElementFactory::new();
        let class = f.create(ElementKind::Class).unwrap();
        let attr = f.create(ElementKind::Property).unwrap();
        let other = f.create(ElementKind::Class).unwrap();
        f.add_reference(class, Attribute::OwnedAttribute, attr).unwrap();
        f.set_reference(attr, Attribute::Type, Some(other)).unwrap();

        f.begin_transaction().unwrap();
        f.unlink(class).unwrap();
        f.commit_transaction().unwrap();
        assert_eq!(f.size(), 1);

        f.undo_transaction().unwrap();
        let order: Vec<ModelUuid> = f.values().map(|e| e.uuid()).collect();
        assert_eq!(order, vec![class, attr, other]);
        assert_eq!(f.get(attr).unwrap().reference(Attribute::OwningClassifier), Some(class));
        assert_eq!(f.get(attr).unwrap().reference(Attribute::Type), Some(other));
    }

    #[test]
    fn test_rollback_reverts_open_transaction() {
        let mut f = ElementFactory::new();
        f.begin_transaction().unwrap();
        f.create(ElementKind::Class).unwrap();
        f.create(ElementKind::Package).unwrap();
        f.rollback_transaction().unwrap();

        assert_eq!(f.size(), 0);
        assert!(!f.can_undo());
        assert!(!f.can_redo());
        assert!(matches!(f.rollback_transaction(), Err(ModelError::InvalidState(_))));
    }

    #[test]
    fn test_undo_inside_transaction_fails() {
        let mut f = ElementFactory::new();
        f.begin_transaction().unwrap();
        assert!(matches!(f.undo_transaction(), Err(ModelError::InvalidState(_))));
        assert!(matches!(f.redo_transaction(), Err(ModelError::InvalidState(_))));
    }

    #[test]
    fn test_undo_on_empty_stack_is_silent() {
        let mut f = ElementFactory::new();
        f.undo_transaction().unwrap();
        f.redo_transaction().unwrap();
        assert_eq!(f.size(), 0);
    }

    #[test]
    fn test_failed_undo_leaves_model_and_history_intact() {
        let mut f = ElementFactory::new();
        f.begin_transaction().unwrap();
        let a = f.create(ElementKind::Class).unwrap();
        f.set_value(a, Attribute::Name, Value::Text("A".to_owned())).unwrap();
        let b = f.create(ElementKind::Class).unwrap();
        f.commit_transaction().unwrap();

        // untracked edit the transaction does not know about
        f.unlink(a).unwrap();

        assert!(matches!(f.undo_transaction(), Err(ModelError::DanglingReference(_))));
        assert!(f.contains(b));
        assert_eq!(f.size(), 1);
        assert!(f.can_undo());
        assert!(!f.can_redo());
        assert_eq!(f.undo_manager().undo_depth(), 1);
    }

    #[test]
    fn test_failed_redo_stays_on_redo_stack() {
        let mut f = ElementFactory::new();
        f.begin_transaction().unwrap();
        let c = f.create(ElementKind::Class).unwrap();
        let a = f.create(ElementKind::Class).unwrap();
        f.commit_transaction().unwrap();
        f.undo_transaction().unwrap();

        f.create_as(ElementKind::Package, a).unwrap();
        assert!(matches!(f.redo_transaction(), Err(ModelError::InvalidState(_))));
        assert_eq!(f.size(), 1);
        assert!(!f.contains(c));
        assert_eq!(f.get(a).unwrap().kind(), ElementKind::Package);
        assert!(f.can_redo());
    }

    #[test]
    fn test_subject_change_event() {
        let mut f = ElementFactory::new();
        let diagram = f.create(ElementKind::Diagram).unwrap();
        let class = f.create(ElementKind::Class).unwrap();
        let item = f.create_item(diagram, NodeKind::Class, None).unwrap();
        let (events, _s) = recorded(&mut f);

        f.set_item_subject(item, Some(class)).unwrap();
        f.set_item_subject(item, Some(class)).unwrap();
        assert_eq!(
            *events.borrow(),
            vec![ModelEvent::SubjectChange { item, old: None, new: Some(class) }]
        );
    }
}
