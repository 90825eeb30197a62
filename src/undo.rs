//! Undo/redo transaction log.
//!
//! Every mutation of the factory is expressed as a [`ModelCommand`]. Applying a
//! command yields its inverse; while a transaction is open the inverses are
//! accumulated, and a committed transaction is the list of inverses needed to
//! undo it. Replaying a transaction yields the inverses of the inverses, which
//! is exactly the transaction needed to go back the other way.

use std::collections::VecDeque;

use log::warn;

use crate::common::error::ModelError;
use crate::common::uuid::{ModelUuid, ViewUuid};
use crate::diagram::DiagramItem;
use crate::element::Element;
use crate::metamodel::{Attribute, Value};

#[derive(Clone, Debug, PartialEq)]
pub enum ModelCommand {
    /// Insert at `position` in creation order, clamped to the store size
    InsertElement { element: Element, position: usize },
    RemoveElement(ModelUuid),
    SetValue(ModelUuid, Attribute, Option<Value>),
    InsertItem { item: DiagramItem, position: usize },
    RemoveItem(ViewUuid),
    /// Replace the stored item with the same uuid
    UpdateItem(DiagramItem),
}

impl ModelCommand {
    pub fn info_text(&self) -> String {
        match self {
            ModelCommand::InsertElement { element, .. } => format!("Create {}", element.kind()),
            ModelCommand::RemoveElement(_) => "Delete element".to_owned(),
            ModelCommand::SetValue(_, a, _) => format!("Change {}", a),
            ModelCommand::InsertItem { .. } => "Add diagram item".to_owned(),
            ModelCommand::RemoveItem(_) => "Remove diagram item".to_owned(),
            ModelCommand::UpdateItem(_) => "Change diagram item".to_owned(),
        }
    }
}

/// Ordered list of commands that are replayed as one step
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transaction {
    commands: Vec<ModelCommand>,
}

impl Transaction {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn commands(&self) -> &[ModelCommand] {
        &self.commands
    }

    pub(crate) fn push(&mut self, command: ModelCommand) {
        self.commands.push(command);
    }

    pub(crate) fn from_commands(commands: Vec<ModelCommand>) -> Self {
        Self { commands }
    }
}

pub struct UndoManager {
    current: Option<Transaction>,
    undo_stack: VecDeque<Transaction>,
    redo_stack: Vec<Transaction>,
    depth: usize,
}

impl UndoManager {
    pub fn new(depth: usize) -> Self {
        Self {
            current: None,
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            depth,
        }
    }

    pub fn begin_transaction(&mut self) -> Result<(), ModelError> {
        if self.current.is_some() {
            return Err(ModelError::InvalidState(
                "a transaction is already open".to_owned(),
            ));
        }
        self.current = Some(Transaction::default());
        Ok(())
    }

    pub fn commit_transaction(&mut self) -> Result<(), ModelError> {
        let Some(transaction) = self.current.take() else {
            return Err(ModelError::InvalidState(
                "commit without an open transaction".to_owned(),
            ));
        };
        if transaction.is_empty() {
            warn!("discarding empty transaction");
            return Ok(());
        }
        self.redo_stack.clear();
        self.push_undo(transaction);
        Ok(())
    }

    /// Close the open transaction and hand it back for reverting
    pub(crate) fn take_current(&mut self) -> Result<Transaction, ModelError> {
        self.current.take().ok_or_else(|| {
            ModelError::InvalidState("rollback without an open transaction".to_owned())
        })
    }

    /// Reopen a transaction whose rollback failed
    pub(crate) fn restore_current(&mut self, transaction: Transaction) {
        self.current = Some(transaction);
    }

    pub fn in_transaction(&self) -> bool {
        self.current.is_some()
    }

    /// Steps recorded so far in the open transaction
    pub fn pending(&self) -> Option<&Transaction> {
        self.current.as_ref()
    }

    pub fn can_undo(&self) -> bool {
        self.current.as_ref().is_some_and(|t| !t.is_empty()) || !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear_undo_stack(&mut self) {
        self.undo_stack.clear();
    }

    pub fn clear_redo_stack(&mut self) {
        self.redo_stack.clear();
    }

    /// Drop the open transaction and both stacks
    pub fn reset(&mut self) {
        self.current = None;
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Record the inverse of an applied command; ignored outside a transaction
    pub(crate) fn record(&mut self, inverse: ModelCommand) {
        if let Some(t) = self.current.as_mut() {
            t.push(inverse);
        }
    }

    pub(crate) fn ensure_idle(&self, what: &str) -> Result<(), ModelError> {
        if self.current.is_some() {
            return Err(ModelError::InvalidState(format!(
                "cannot {} while a transaction is open",
                what
            )));
        }
        Ok(())
    }

    pub(crate) fn pop_undo(&mut self) -> Option<Transaction> {
        self.undo_stack.pop_back()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<Transaction> {
        self.redo_stack.pop()
    }

    pub(crate) fn push_undo(&mut self, transaction: Transaction) {
        self.undo_stack.push_back(transaction);
        while self.undo_stack.len() > self.depth {
            self.undo_stack.pop_front();
        }
    }

    pub(crate) fn push_redo(&mut self, transaction: Transaction) {
        self.redo_stack.push(transaction);
    }
}
