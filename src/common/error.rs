//! Error taxonomy of the model core.
//!
//! Glue legality is never reported through [`ModelError`]: connect adapters
//! answer `allow` with a plain `bool` so the diagram can give live feedback.
//! Errors here signal programmer mistakes or stale identities.

use thiserror::Error;

use crate::common::uuid::{ModelUuid, ViewUuid};
use crate::diagram::{LineKind, NodeKind};
use crate::metamodel::{Attribute, ElementKind};

#[derive(Debug, Error)]
pub enum ModelError {
    /// Transaction protocol violated (nested begin, commit without begin, ...)
    #[error("invalid transaction state: {0}")]
    InvalidState(String),

    #[error("cannot instantiate abstract metaclass {0}")]
    AbstractMetaclass(ElementKind),

    /// The element was unlinked, flushed or never created by this factory
    #[error("element {0} is not live in this factory")]
    DanglingReference(ModelUuid),

    #[error("diagram item {0} does not exist")]
    UnknownItem(ViewUuid),

    #[error("element {0} is not a diagram")]
    NotADiagram(ModelUuid),

    #[error("{kind} has no attribute {attribute} of that shape")]
    AttributeMismatch {
        kind: ElementKind,
        attribute: Attribute,
    },

    #[error("diagram item {0} is not a line")]
    NotALine(ViewUuid),

    #[error("diagram item {0} is not a node")]
    NotANode(ViewUuid),

    #[error("no connect adapter for {node} and {line}")]
    NoAdapter { node: NodeKind, line: LineKind },

    #[error("relationship {0} is missing its end elements")]
    MalformedRelationship(ModelUuid),

    #[error("event subscriber failed: {0}")]
    Subscriber(String),

    #[error("failed to parse settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("failed to write settings: {0}")]
    SettingsWrite(#[from] toml::ser::Error),
}
