//! Builders for model structures that span several elements.

use crate::common::error::ModelError;
use crate::common::uuid::ModelUuid;
use crate::factory::ElementFactory;
use crate::metamodel::{Attribute, ElementKind, Navigability};

/// Concrete dependency metaclass fitting a client/supplier pair.
///
/// Interfaces are classifiers too, so they are tested first.
pub fn dependency_type(client: ElementKind, supplier: ElementKind) -> ElementKind {
    if supplier.is_a(ElementKind::Interface) {
        ElementKind::Usage
    } else if supplier.is_a(ElementKind::Classifier) && client.is_a(ElementKind::Component) {
        ElementKind::Realization
    } else {
        ElementKind::Dependency
    }
}

/// Create an association between two types. The first member end is typed
/// `head_type`, the second `tail_type`; both start with unspecified
/// navigability.
pub fn create_association(
    factory: &mut ElementFactory,
    head_type: ModelUuid,
    tail_type: ModelUuid,
) -> Result<ModelUuid, ModelError> {
    for t in [head_type, tail_type] {
        let e = factory.element(t)?;
        if !e.is_a(ElementKind::Type) {
            return Err(ModelError::AttributeMismatch {
                kind: e.kind(),
                attribute: Attribute::Type,
            });
        }
    }

    factory.batch(|f| {
        let association = f.create(ElementKind::Association)?;
        let head_end = f.create(ElementKind::Property)?;
        let tail_end = f.create(ElementKind::Property)?;
        f.add_reference(association, Attribute::MemberEnd, head_end)?;
        f.add_reference(association, Attribute::MemberEnd, tail_end)?;
        f.set_reference(head_end, Attribute::Type, Some(head_type))?;
        f.set_reference(tail_end, Attribute::Type, Some(tail_type))?;
        set_navigability(f, association, head_end, Navigability::Unspecified)?;
        set_navigability(f, association, tail_end, Navigability::Unspecified)?;
        Ok(association)
    })
}

/// Both member ends of a binary association, in order
pub fn member_ends(factory: &ElementFactory, association: ModelUuid) -> Result<(ModelUuid, ModelUuid), ModelError> {
    match factory.element(association)?.references(Attribute::MemberEnd) {
        [first, second] => Ok((*first, *second)),
        _ => Err(ModelError::MalformedRelationship(association)),
    }
}

/// The other member end of the association `end` belongs to
pub fn opposite_end(factory: &ElementFactory, end: ModelUuid) -> Result<Option<ModelUuid>, ModelError> {
    let Some(association) = factory.element(end)?.reference(Attribute::Association) else {
        return Ok(None);
    };
    let (first, second) = member_ends(factory, association)?;
    Ok(if first == end {
        Some(second)
    } else if second == end {
        Some(first)
    } else {
        None
    })
}

/// Class or interface at the far side of `end`, which owns `end` as an
/// attribute when it is navigable
fn attribute_owner(factory: &ElementFactory, end: ModelUuid) -> Result<Option<ModelUuid>, ModelError> {
    let Some(opposite) = opposite_end(factory, end)? else {
        return Ok(None);
    };
    let owner = factory
        .element(opposite)?
        .reference(Attribute::Type)
        .and_then(|t| factory.get(t))
        .filter(|t| t.is_a(ElementKind::Class) || t.is_a(ElementKind::Interface))
        .map(|t| t.uuid());
    Ok(owner)
}

/// Record the navigability of a member end.
///
/// Navigable ends are owned attributes of the opposite class or interface,
/// or navigable owned ends of the association for other types. Ends of
/// unspecified navigability are owned by the association, and non-navigable
/// ends by neither.
pub fn set_navigability(
    factory: &mut ElementFactory,
    association: ModelUuid,
    end: ModelUuid,
    navigability: Navigability,
) -> Result<(), ModelError> {
    if !factory.element(association)?.refers_to(Attribute::MemberEnd, end) {
        return Err(ModelError::MalformedRelationship(association));
    }
    let owner = attribute_owner(factory, end)?;

    factory.batch(|f| {
        if let Some(current) = f.element(end)?.reference(Attribute::OwningClassifier) {
            f.remove_reference(current, Attribute::OwnedAttribute, end)?;
        }
        f.remove_reference(association, Attribute::OwnedEnd, end)?;
        f.remove_reference(association, Attribute::NavigableOwnedEnd, end)?;

        match (navigability, owner) {
            (Navigability::Navigable, Some(owner)) => f.add_reference(owner, Attribute::OwnedAttribute, end),
            (Navigability::Navigable, None) => f.add_reference(association, Attribute::NavigableOwnedEnd, end),
            (Navigability::Unspecified, _) => f.add_reference(association, Attribute::OwnedEnd, end),
            (Navigability::NonNavigable, _) => Ok(()),
        }
    })
}

pub fn navigability(factory: &ElementFactory, end: ModelUuid) -> Result<Navigability, ModelError> {
    let element = factory.element(end)?;
    let Some(association) = element.reference(Attribute::Association) else {
        return Ok(Navigability::Unspecified);
    };
    if let Some(owner) = element.reference(Attribute::OwningClassifier) {
        if attribute_owner(factory, end)? == Some(owner) {
            return Ok(Navigability::Navigable);
        }
    }
    let association = factory.element(association)?;
    if association.refers_to(Attribute::NavigableOwnedEnd, end) {
        Ok(Navigability::Navigable)
    } else if association.refers_to(Attribute::OwnedEnd, end) {
        Ok(Navigability::Unspecified)
    } else {
        Ok(Navigability::NonNavigable)
    }
}
