//! Dependency, generalization, association and implementation connections.

use log::debug;

use super::{
    ConnectAdapter, Glue, RelationshipEnds, connected_subject, line_item, place_in_diagram_package,
    reconnect_relationship, relationship_allow, relationship_or_new, subject_is_a, unlink_orphan,
};
use crate::common::error::ModelError;
use crate::common::uuid::ViewUuid;
use crate::diagram::HandleEnd;
use crate::factory::ElementFactory;
use crate::metamodel::{Attribute, ElementKind, Navigability};
use crate::modelfactory;

/// Connect two named elements with a dependency. The head is the supplier.
pub struct DependencyConnect;

impl DependencyConnect {
    fn ends(kind: ElementKind) -> RelationshipEnds {
        RelationshipEnds {
            kind,
            head: Attribute::Supplier,
            tail: Attribute::Client,
        }
    }
}

impl ConnectAdapter for DependencyConnect {
    fn allow(&self, factory: &ElementFactory, glue: &Glue) -> bool {
        subject_is_a(factory, glue, ElementKind::NamedElement) && relationship_allow(factory, glue)
    }

    fn connect_subject(&self, factory: &mut ElementFactory, line: ViewUuid, _handle: HandleEnd) -> Result<(), ModelError> {
        factory.batch(|f| {
            let l = line_item(f, line)?;
            let mut kind = l.dependency_type;
            if l.auto_dependency {
                let client = connected_subject(f, line, HandleEnd::Tail)?;
                let supplier = connected_subject(f, line, HandleEnd::Head)?;
                if let (Some(client), Some(supplier)) = (client, supplier) {
                    kind = modelfactory::dependency_type(f.element(client)?.kind(), f.element(supplier)?.kind());
                }
                if kind != l.dependency_type {
                    let mut item = f.item_checked(line)?.clone();
                    if let Some(l) = item.as_line_mut() {
                        l.dependency_type = kind;
                    }
                    f.update_item(item)?;
                }
            }

            let relation = relationship_or_new(f, line, &Self::ends(kind))?;
            f.set_item_subject(line, Some(relation))
        })
    }

    fn reconnect(&self, factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd) -> Result<(), ModelError> {
        let kind = line_item(factory, line)?.dependency_type;
        factory.batch(|f| reconnect_relationship(f, line, handle, &Self::ends(kind)))
    }
}

/// Connect classifiers with a generalization. The head is the general end.
pub struct GeneralizationConnect;

const GENERALIZATION: RelationshipEnds = RelationshipEnds {
    kind: ElementKind::Generalization,
    head: Attribute::General,
    tail: Attribute::Specific,
};

impl ConnectAdapter for GeneralizationConnect {
    fn allow(&self, factory: &ElementFactory, glue: &Glue) -> bool {
        subject_is_a(factory, glue, ElementKind::Classifier) && relationship_allow(factory, glue)
    }

    fn connect_subject(&self, factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd) -> Result<(), ModelError> {
        debug!(line:% = line, handle:? = handle; "connect_subject");
        factory.batch(|f| {
            let relation = relationship_or_new(f, line, &GENERALIZATION)?;
            f.set_item_subject(line, Some(relation))
        })
    }

    fn reconnect(&self, factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd) -> Result<(), ModelError> {
        factory.batch(|f| reconnect_relationship(f, line, handle, &GENERALIZATION))
    }
}

/// Connect an association to classifiers. The line keeps the two member
/// ends as end subjects; the first member end belongs to the head.
pub struct AssociationConnect;

impl ConnectAdapter for AssociationConnect {
    fn allow(&self, factory: &ElementFactory, glue: &Glue) -> bool {
        subject_is_a(factory, glue, ElementKind::Classifier) && relationship_allow(factory, glue)
    }

    fn connect_subject(&self, factory: &mut ElementFactory, line: ViewUuid, _handle: HandleEnd) -> Result<(), ModelError> {
        let (Some(head_type), Some(tail_type)) = (
            connected_subject(factory, line, HandleEnd::Head)?,
            connected_subject(factory, line, HandleEnd::Tail)?,
        ) else {
            return Ok(());
        };

        // Keep the current association if it already joins these two types
        if let Some(current) = factory.item_checked(line)?.subject() {
            if let Ok((end1, end2)) = modelfactory::member_ends(factory, current) {
                let type_of = |end| factory.get(end).and_then(|e| e.reference(Attribute::Type));
                let (t1, t2) = (type_of(end1), type_of(end2));
                let ends = if t1 == Some(head_type) && t2 == Some(tail_type) {
                    Some((end1, end2))
                } else if t2 == Some(head_type) && t1 == Some(tail_type) {
                    Some((end2, end1))
                } else {
                    None
                };
                if let Some((head_end, tail_end)) = ends {
                    let mut item = factory.item_checked(line)?.clone();
                    if let Some(l) = item.as_line_mut() {
                        l.set_end_subject(HandleEnd::Head, Some(head_end));
                        l.set_end_subject(HandleEnd::Tail, Some(tail_end));
                    }
                    return factory.update_item(item);
                }
            }
        }

        factory.batch(|f| {
            let relation = modelfactory::create_association(f, head_type, tail_type)?;
            place_in_diagram_package(f, line, relation)?;
            let (head_end, tail_end) = modelfactory::member_ends(f, relation)?;

            let mut item = f.item_checked(line)?.clone();
            if let Some(l) = item.as_line_mut() {
                l.set_end_subject(HandleEnd::Head, Some(head_end));
                l.set_end_subject(HandleEnd::Tail, Some(tail_end));
            }
            f.update_item(item)?;
            debug!(relation:% = relation; "created association");

            // Subject last, so observers find the association complete
            f.set_item_subject(line, Some(relation))
        })
    }

    fn reconnect(&self, factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd) -> Result<(), ModelError> {
        let Some(association) = factory.item_checked(line)?.subject() else {
            return Ok(());
        };
        let l = line_item(factory, line)?;
        let (Some(moved), Some(far)) = (l.end_subject(handle), l.end_subject(handle.opposite())) else {
            return Err(ModelError::MalformedRelationship(association));
        };
        let Some(target) = connected_subject(factory, line, handle)? else {
            return Ok(());
        };
        let moved_navigability = modelfactory::navigability(factory, moved)?;
        let far_navigability = modelfactory::navigability(factory, far)?;

        factory.batch(|f| {
            // Ownership of navigable ends depends on the opposite type, so
            // release both before retyping
            modelfactory::set_navigability(f, association, moved, Navigability::NonNavigable)?;
            modelfactory::set_navigability(f, association, far, Navigability::NonNavigable)?;
            f.set_reference(moved, Attribute::Type, Some(target))?;
            modelfactory::set_navigability(f, association, moved, moved_navigability)?;
            modelfactory::set_navigability(f, association, far, far_navigability)?;
            debug!(association:% = association; "reconnected association end");
            Ok(())
        })
    }

    /// Only acts while both handles are still connected; drops the
    /// association and its member ends once no item shows it.
    fn disconnect_subject(&self, factory: &mut ElementFactory, line: ViewUuid, _handle: HandleEnd) -> Result<(), ModelError> {
        let l = line_item(factory, line)?;
        if l.handle(HandleEnd::Head).connection().is_none() || l.handle(HandleEnd::Tail).connection().is_none() {
            return Ok(());
        }
        let old = factory.item_checked(line)?.subject();

        factory.batch(|f| {
            let mut item = f.item_checked(line)?.clone();
            item.subject = None;
            if let Some(l) = item.as_line_mut() {
                l.set_end_subject(HandleEnd::Head, None);
                l.set_end_subject(HandleEnd::Tail, None);
            }
            f.update_item(item)?;

            match old {
                Some(old) => unlink_orphan(f, old),
                None => Ok(()),
            }
        })
    }
}

/// Connect an interface (head) and a behaviored classifier (tail)
pub struct ImplementationConnect;

const IMPLEMENTATION: RelationshipEnds = RelationshipEnds {
    kind: ElementKind::Implementation,
    head: Attribute::Contract,
    tail: Attribute::ImplementingClassifier,
};

impl ConnectAdapter for ImplementationConnect {
    fn allow(&self, factory: &ElementFactory, glue: &Glue) -> bool {
        let required = match glue.handle {
            HandleEnd::Head => ElementKind::Interface,
            HandleEnd::Tail => ElementKind::BehavioredClassifier,
        };
        subject_is_a(factory, glue, required) && relationship_allow(factory, glue)
    }

    fn connect_subject(&self, factory: &mut ElementFactory, line: ViewUuid, _handle: HandleEnd) -> Result<(), ModelError> {
        factory.batch(|f| {
            let relation = relationship_or_new(f, line, &IMPLEMENTATION)?;
            f.set_item_subject(line, Some(relation))
        })
    }

    fn reconnect(&self, factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd) -> Result<(), ModelError> {
        factory.batch(|f| reconnect_relationship(f, line, handle, &IMPLEMENTATION))
    }
}
