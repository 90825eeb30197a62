//! UML metaclasses and their attributes.
//!
//! The metamodel is a static table: every [`ElementKind`] knows its direct
//! generalizations, every [`Attribute`] knows which metaclass owns it, what it
//! holds and which attribute (if any) is its opposite. The factory uses the
//! table to validate writes and to keep both sides of a bidirectional
//! association in sync.

use serde::{Deserialize, Serialize};

use crate::common::uuid::ModelUuid;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display)]
pub enum ElementKind {
    // abstract
    Element,
    NamedElement,
    PackageableElement,
    Namespace,
    Type,
    Classifier,
    BehavioredClassifier,
    TypedElement,
    ValueSpecification,
    Relationship,
    DirectedRelationship,

    // concrete
    Package,
    Class,
    Interface,
    Component,
    Actor,
    DataType,
    Enumeration,
    Property,
    Parameter,
    LiteralString,
    LiteralInteger,
    Comment,
    Diagram,
    Dependency,
    Usage,
    Realization,
    Generalization,
    Association,
    Implementation,
    PackageImport,
}

impl ElementKind {
    pub fn is_abstract(&self) -> bool {
        matches!(
            self,
            ElementKind::Element
                | ElementKind::NamedElement
                | ElementKind::PackageableElement
                | ElementKind::Namespace
                | ElementKind::Type
                | ElementKind::Classifier
                | ElementKind::BehavioredClassifier
                | ElementKind::TypedElement
                | ElementKind::ValueSpecification
                | ElementKind::Relationship
                | ElementKind::DirectedRelationship
        )
    }

    /// Direct generalizations
    pub fn supertypes(&self) -> &'static [ElementKind] {
        use ElementKind as K;
        match self {
            K::Element => &[],
            K::NamedElement => &[K::Element],
            K::PackageableElement => &[K::NamedElement],
            K::Namespace => &[K::NamedElement],
            K::Type => &[K::PackageableElement],
            K::Classifier => &[K::Namespace, K::Type],
            K::BehavioredClassifier => &[K::Classifier],
            K::TypedElement => &[K::NamedElement],
            K::ValueSpecification => &[K::TypedElement, K::PackageableElement],
            K::Relationship => &[K::Element],
            K::DirectedRelationship => &[K::Relationship],

            K::Package => &[K::Namespace, K::PackageableElement],
            K::Class => &[K::BehavioredClassifier],
            K::Interface => &[K::Classifier],
            K::Component => &[K::Class],
            K::Actor => &[K::BehavioredClassifier],
            K::DataType => &[K::Classifier],
            K::Enumeration => &[K::DataType],
            K::Property => &[K::TypedElement],
            K::Parameter => &[K::TypedElement],
            K::LiteralString | K::LiteralInteger => &[K::ValueSpecification],
            K::Comment => &[K::Element],
            K::Diagram => &[K::PackageableElement],
            K::Dependency => &[K::DirectedRelationship, K::PackageableElement],
            K::Usage | K::Realization => &[K::Dependency],
            K::Generalization => &[K::DirectedRelationship],
            K::Association => &[K::Classifier, K::Relationship],
            K::Implementation => &[K::DirectedRelationship],
            K::PackageImport => &[K::DirectedRelationship],
        }
    }

    /// Whether `self` equals `other` or specializes it, transitively
    pub fn is_a(&self, other: ElementKind) -> bool {
        *self == other || self.supertypes().iter().any(|s| s.is_a(other))
    }
}

/// What an attribute stores
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttributeData {
    Text,
    Integer,
    Boolean,
    /// Reference to an element of (a subtype of) the given metaclass
    Reference(ElementKind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeSpec {
    pub owner: ElementKind,
    pub data: AttributeData,
    pub many: bool,
    /// Referenced elements are owned and die with the owner
    pub composite: bool,
    pub opposite: Option<Attribute>,
}

impl AttributeSpec {
    const fn data(owner: ElementKind, data: AttributeData) -> Self {
        Self { owner, data, many: false, composite: false, opposite: None }
    }
    const fn one(owner: ElementKind, target: ElementKind, opposite: Option<Attribute>) -> Self {
        Self { owner, data: AttributeData::Reference(target), many: false, composite: false, opposite }
    }
    const fn many(owner: ElementKind, target: ElementKind, opposite: Option<Attribute>) -> Self {
        Self { owner, data: AttributeData::Reference(target), many: true, composite: false, opposite }
    }
    const fn owned(self) -> Self {
        Self { composite: true, ..self }
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display)]
pub enum Attribute {
    Name,
    Body,
    StringValue,
    IntegerValue,
    IsAbstract,

    Client,
    Supplier,
    ClientDependency,
    SupplierDependency,
    General,
    Specific,
    Generalization,
    MemberEnd,
    Association,
    OwnedEnd,
    OwningAssociation,
    NavigableOwnedEnd,
    OwnedAttribute,
    OwningClassifier,
    Type,
    DefaultValue,
    OwningElement,
    PackagedElement,
    Package,
    Contract,
    ImplementingClassifier,
    Implementation,
    ImportedPackage,
    ImportingNamespace,
    PackageImport,
    AnnotatedElement,
}

impl Attribute {
    pub fn spec(&self) -> AttributeSpec {
        use Attribute as A;
        use AttributeData as D;
        use ElementKind as K;
        match self {
            A::Name => AttributeSpec::data(K::NamedElement, D::Text),
            A::Body => AttributeSpec::data(K::Comment, D::Text),
            A::StringValue => AttributeSpec::data(K::LiteralString, D::Text),
            A::IntegerValue => AttributeSpec::data(K::LiteralInteger, D::Integer),
            A::IsAbstract => AttributeSpec::data(K::Classifier, D::Boolean),

            A::Client => AttributeSpec::many(K::Dependency, K::NamedElement, Some(A::ClientDependency)),
            A::Supplier => AttributeSpec::many(K::Dependency, K::NamedElement, Some(A::SupplierDependency)),
            A::ClientDependency => AttributeSpec::many(K::NamedElement, K::Dependency, Some(A::Client)),
            A::SupplierDependency => AttributeSpec::many(K::NamedElement, K::Dependency, Some(A::Supplier)),

            A::General => AttributeSpec::one(K::Generalization, K::Classifier, None),
            A::Specific => AttributeSpec::one(K::Generalization, K::Classifier, Some(A::Generalization)),
            A::Generalization => AttributeSpec::many(K::Classifier, K::Generalization, Some(A::Specific)).owned(),

            A::MemberEnd => AttributeSpec::many(K::Association, K::Property, Some(A::Association)),
            A::Association => AttributeSpec::one(K::Property, K::Association, Some(A::MemberEnd)),
            A::OwnedEnd => AttributeSpec::many(K::Association, K::Property, Some(A::OwningAssociation)).owned(),
            A::OwningAssociation => AttributeSpec::one(K::Property, K::Association, Some(A::OwnedEnd)),
            A::NavigableOwnedEnd => AttributeSpec::many(K::Association, K::Property, None),

            A::OwnedAttribute => AttributeSpec::many(K::Classifier, K::Property, Some(A::OwningClassifier)).owned(),
            A::OwningClassifier => AttributeSpec::one(K::Property, K::Classifier, Some(A::OwnedAttribute)),

            A::Type => AttributeSpec::one(K::TypedElement, K::Type, None),
            A::DefaultValue => AttributeSpec::one(K::TypedElement, K::ValueSpecification, Some(A::OwningElement)).owned(),
            A::OwningElement => AttributeSpec::one(K::ValueSpecification, K::TypedElement, Some(A::DefaultValue)),

            A::PackagedElement => AttributeSpec::many(K::Package, K::PackageableElement, Some(A::Package)).owned(),
            A::Package => AttributeSpec::one(K::PackageableElement, K::Package, Some(A::PackagedElement)),

            A::Contract => AttributeSpec::many(K::Implementation, K::Interface, None),
            A::ImplementingClassifier => AttributeSpec::many(K::Implementation, K::BehavioredClassifier, Some(A::Implementation)),
            A::Implementation => AttributeSpec::many(K::BehavioredClassifier, K::Implementation, Some(A::ImplementingClassifier)).owned(),

            A::ImportedPackage => AttributeSpec::one(K::PackageImport, K::Package, None),
            A::ImportingNamespace => AttributeSpec::one(K::PackageImport, K::Namespace, Some(A::PackageImport)),
            A::PackageImport => AttributeSpec::many(K::Namespace, K::PackageImport, Some(A::ImportingNamespace)).owned(),

            A::AnnotatedElement => AttributeSpec::many(K::Comment, K::Element, None),
        }
    }

    pub fn opposite(&self) -> Option<Attribute> {
        self.spec().opposite
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.spec().data, AttributeData::Reference(_))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Text(String),
    Integer(i64),
    Boolean(bool),
    Reference(ModelUuid),
    References(Vec<ModelUuid>),
}

impl Value {
    /// Whether the value has the shape the attribute expects
    pub fn fits(&self, attribute: Attribute) -> bool {
        let spec = attribute.spec();
        match (self, spec.data) {
            (Value::Text(_), AttributeData::Text)
            | (Value::Integer(_), AttributeData::Integer)
            | (Value::Boolean(_), AttributeData::Boolean) => true,
            (Value::Reference(_), AttributeData::Reference(_)) => !spec.many,
            (Value::References(_), AttributeData::Reference(_)) => spec.many,
            _ => false,
        }
    }
}

/// Direction information of an association end
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Navigability {
    #[default]
    Unspecified,
    Navigable,
    NonNavigable,
}

impl Navigability {
    pub fn name(&self) -> &'static str {
        match self {
            Navigability::Unspecified => "Unspecified",
            Navigability::Navigable => "Navigable",
            Navigability::NonNavigable => "Non-navigable",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL_ATTRIBUTES: &[Attribute] = &[
        Attribute::Name, Attribute::Body, Attribute::StringValue, Attribute::IntegerValue,
        Attribute::IsAbstract, Attribute::Client, Attribute::Supplier, Attribute::ClientDependency,
        Attribute::SupplierDependency, Attribute::General, Attribute::Specific,
        Attribute::Generalization, Attribute::MemberEnd, Attribute::Association,
        Attribute::OwnedEnd, Attribute::OwningAssociation, Attribute::NavigableOwnedEnd,
        Attribute::OwnedAttribute, Attribute::OwningClassifier, Attribute::Type,
        Attribute::DefaultValue, Attribute::OwningElement, Attribute::PackagedElement,
        Attribute::Package, Attribute::Contract, Attribute::ImplementingClassifier,
        Attribute::Implementation, Attribute::ImportedPackage, Attribute::ImportingNamespace,
        Attribute::PackageImport, Attribute::AnnotatedElement,
    ];

    #[test]
    fn test_opposites_are_symmetric() {
        for a in ALL_ATTRIBUTES {
            if let Some(o) = a.opposite() {
                assert_eq!(o.opposite(), Some(*a), "{} <-> {}", a, o);
                // each side points at the other's owner
                let AttributeData::Reference(target) = a.spec().data else {
                    panic!("{} has an opposite but holds data", a);
                };
                assert!(o.spec().owner.is_a(target) || target.is_a(o.spec().owner));
            }
        }
    }

    #[test]
    fn test_hierarchy() {
        assert!(ElementKind::Component.is_a(ElementKind::BehavioredClassifier));
        assert!(ElementKind::Component.is_a(ElementKind::NamedElement));
        assert!(ElementKind::Usage.is_a(ElementKind::Dependency));
        assert!(ElementKind::Package.is_a(ElementKind::Namespace));
        assert!(!ElementKind::Interface.is_a(ElementKind::BehavioredClassifier));
        assert!(!ElementKind::Implementation.is_a(ElementKind::Dependency));
        assert!(!ElementKind::Comment.is_a(ElementKind::NamedElement));
    }

    #[test]
    fn test_abstract_kinds_have_concrete_subtypes_only_below() {
        assert!(ElementKind::Classifier.is_abstract());
        assert!(!ElementKind::Class.is_abstract());
        for k in [ElementKind::Class, ElementKind::Package, ElementKind::Association] {
            assert!(k.is_a(ElementKind::Element));
        }
    }

    #[test]
    fn test_value_shapes() {
        let id = ModelUuid::now_v7();
        assert!(Value::Text("x".to_owned()).fits(Attribute::Name));
        assert!(!Value::Integer(1).fits(Attribute::Name));
        assert!(Value::Reference(id).fits(Attribute::Type));
        assert!(!Value::References(vec![id]).fits(Attribute::Type));
        assert!(Value::References(vec![id]).fits(Attribute::MemberEnd));
        assert!(!Value::Reference(id).fits(Attribute::MemberEnd));
    }
}
