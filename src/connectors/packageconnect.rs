use super::{ConnectAdapter, Glue, RelationshipEnds, reconnect_relationship, relationship_allow, relationship_or_new, subject_is_a};
use crate::common::error::ModelError;
use crate::common::uuid::ViewUuid;
use crate::diagram::HandleEnd;
use crate::factory::ElementFactory;
use crate::metamodel::{Attribute, ElementKind};

/// Connect two packages with a package import; the tail imports the head.
pub struct PackageImportConnect;

const PACKAGE_IMPORT: RelationshipEnds = RelationshipEnds {
    kind: ElementKind::PackageImport,
    head: Attribute::ImportedPackage,
    tail: Attribute::ImportingNamespace,
};

impl ConnectAdapter for PackageImportConnect {
    fn allow(&self, factory: &ElementFactory, glue: &Glue) -> bool {
        subject_is_a(factory, glue, ElementKind::Package) && relationship_allow(factory, glue)
    }

    fn connect_subject(&self, factory: &mut ElementFactory, line: ViewUuid, _handle: HandleEnd) -> Result<(), ModelError> {
        factory.batch(|f| {
            let relation = relationship_or_new(f, line, &PACKAGE_IMPORT)?;
            f.set_item_subject(line, Some(relation))
        })
    }

    fn reconnect(&self, factory: &mut ElementFactory, line: ViewUuid, handle: HandleEnd) -> Result<(), ModelError> {
        factory.batch(|f| reconnect_relationship(f, line, handle, &PACKAGE_IMPORT))
    }
}
