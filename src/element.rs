use std::collections::BTreeMap;

use crate::common::uuid::ModelUuid;
use crate::metamodel::{Attribute, ElementKind, Value};

/// A node of the semantic model. Elements are owned by the
/// [`ElementFactory`](crate::factory::ElementFactory); everything else refers
/// to them by [`ModelUuid`].
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    uuid: ModelUuid,
    kind: ElementKind,
    values: BTreeMap<Attribute, Value>,
}

impl Element {
    pub(crate) fn new(uuid: ModelUuid, kind: ElementKind) -> Self {
        Self {
            uuid,
            kind,
            values: BTreeMap::new(),
        }
    }

    pub fn uuid(&self) -> ModelUuid {
        self.uuid
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_a(&self, kind: ElementKind) -> bool {
        self.kind.is_a(kind)
    }

    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        self.kind.is_a(attribute.spec().owner)
    }

    pub fn get(&self, attribute: Attribute) -> Option<&Value> {
        self.values.get(&attribute)
    }

    pub fn values(&self) -> impl Iterator<Item = (Attribute, &Value)> {
        self.values.iter().map(|(a, v)| (*a, v))
    }

    pub fn text(&self, attribute: Attribute) -> Option<&str> {
        match self.values.get(&attribute) {
            Some(Value::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.text(Attribute::Name)
    }

    pub fn integer(&self, attribute: Attribute) -> Option<i64> {
        match self.values.get(&attribute) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn boolean(&self, attribute: Attribute) -> Option<bool> {
        match self.values.get(&attribute) {
            Some(Value::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Single-valued reference
    pub fn reference(&self, attribute: Attribute) -> Option<ModelUuid> {
        match self.values.get(&attribute) {
            Some(Value::Reference(r)) => Some(*r),
            _ => None,
        }
    }

    /// Referenced elements of either multiplicity, in insertion order
    pub fn references(&self, attribute: Attribute) -> &[ModelUuid] {
        match self.values.get(&attribute) {
            Some(Value::Reference(r)) => std::slice::from_ref(r),
            Some(Value::References(r)) => r,
            _ => &[],
        }
    }

    pub fn refers_to(&self, attribute: Attribute, target: ModelUuid) -> bool {
        self.references(attribute).contains(&target)
    }

    /// Attributes of this element that point at `target`
    pub fn attributes_referencing(&self, target: ModelUuid) -> Vec<Attribute> {
        self.values
            .keys()
            .filter(|a| self.refers_to(**a, target))
            .copied()
            .collect()
    }

    pub(crate) fn put(&mut self, attribute: Attribute, value: Option<Value>) -> Option<Value> {
        match value {
            Some(v) => self.values.insert(attribute, v),
            None => self.values.remove(&attribute),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_references_of_both_multiplicities() {
        let (a, b) = (ModelUuid::now_v7(), ModelUuid::now_v7());
        let mut e = Element::new(ModelUuid::now_v7(), ElementKind::Association);
        assert!(e.references(Attribute::MemberEnd).is_empty());

        e.put(Attribute::MemberEnd, Some(Value::References(vec![a, b])));
        e.put(Attribute::Package, Some(Value::Reference(a)));
        assert_eq!(e.references(Attribute::MemberEnd), &[a, b]);
        assert_eq!(e.references(Attribute::Package), &[a]);
        assert_eq!(e.attributes_referencing(a), vec![Attribute::MemberEnd, Attribute::Package]);
        assert_eq!(e.attributes_referencing(b), vec![Attribute::MemberEnd]);
    }

    #[test]
    fn test_put_returns_previous() {
        let mut e = Element::new(ModelUuid::now_v7(), ElementKind::Class);
        assert_eq!(e.put(Attribute::Name, Some(Value::Text("A".to_owned()))), None);
        assert_eq!(e.name(), Some("A"));
        assert_eq!(e.put(Attribute::Name, None), Some(Value::Text("A".to_owned())));
        assert_eq!(e.name(), None);
    }
}
