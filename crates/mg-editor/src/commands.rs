//! Undoable action dispatcher.
//!
//! Every mutating operation is wrapped in a `Command` holding the forward
//! mutation and its precomputed inverse. History is a single linear
//! sequence: undo pops into a redo stack, and a fresh action discards the
//! redo tail. A saved-checkpoint marker tracks whether the document has
//! diverged from its last save.
//!
//! Dispatch is synchronous: `execute` returns once model and views are
//! consistent and the structural events (plus one trailing `DoLayout`)
//! have been published.

use crate::error::EditorError;
use crate::mutation::{apply_mutation, compute_inverse, Mutation};
use crate::view::ViewRegistry;
use mg_core::model::Mindmap;
use mg_core::{EventBus, StructuralEvent};
use std::cell::RefCell;

pub const DEFAULT_HISTORY_DEPTH: usize = 100;

#[derive(Debug, Clone)]
struct Command {
    forward: Box<Mutation>,
    inverse: Box<Mutation>,
    description: &'static str,
}

pub struct ActionDispatcher {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    max_depth: usize,
    /// Undo-stack length at the last save checkpoint. `None` when the
    /// checkpoint has been trimmed or discarded with a redo tail.
    clean_len: Option<usize>,
}

impl ActionDispatcher {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth),
            redo_stack: Vec::new(),
            max_depth,
            clean_len: Some(0),
        }
    }

    /// Apply `mutation`, publish its events, and push it onto the
    /// history. A rejected mutation reaches neither model nor history.
    pub fn execute(
        &mut self,
        model: &RefCell<Mindmap>,
        views: &RefCell<ViewRegistry>,
        bus: &EventBus,
        mutation: Mutation,
    ) -> Result<(), EditorError> {
        let description = mutation.describe();
        let (inverse, events) = {
            let mut model = model.borrow_mut();
            let mut views = views.borrow_mut();
            let inverse = compute_inverse(&model, &mutation)?;
            let events = apply_mutation(&mut model, &mut views, &mutation)?;
            (inverse, events)
        };
        publish(bus, &events);

        self.push(Command {
            forward: Box::new(mutation),
            inverse: Box::new(inverse),
            description,
        });
        log::debug!("executed: {description}");
        Ok(())
    }

    /// Reverse the most recent command. Returns its description, or
    /// `None` when there is nothing to undo.
    pub fn undo(
        &mut self,
        model: &RefCell<Mindmap>,
        views: &RefCell<ViewRegistry>,
        bus: &EventBus,
    ) -> Option<&'static str> {
        let cmd = self.undo_stack.pop()?;
        match self.replay(model, views, bus, &cmd.inverse) {
            Ok(()) => {
                let description = cmd.description;
                self.redo_stack.push(cmd);
                Some(description)
            }
            Err(err) => {
                log::error!("undo of '{}' failed: {err}", cmd.description);
                self.undo_stack.push(cmd);
                None
            }
        }
    }

    /// Re-apply the command most recently undone.
    pub fn redo(
        &mut self,
        model: &RefCell<Mindmap>,
        views: &RefCell<ViewRegistry>,
        bus: &EventBus,
    ) -> Option<&'static str> {
        let cmd = self.redo_stack.pop()?;
        match self.replay(model, views, bus, &cmd.forward) {
            Ok(()) => {
                let description = cmd.description;
                self.undo_stack.push(cmd);
                Some(description)
            }
            Err(err) => {
                log::error!("redo of '{}' failed: {err}", cmd.description);
                self.redo_stack.push(cmd);
                None
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Whether any command has been applied since `mark_saved`.
    pub fn has_been_changed(&self) -> bool {
        self.clean_len != Some(self.undo_stack.len())
    }

    pub fn mark_saved(&mut self) {
        self.clean_len = Some(self.undo_stack.len());
    }

    fn push(&mut self, cmd: Command) {
        if !self.redo_stack.is_empty() {
            self.redo_stack.clear();
            // A checkpoint sitting in the discarded tail is unreachable.
            if self.clean_len.is_some_and(|c| c > self.undo_stack.len()) {
                self.clean_len = None;
            }
        }
        self.undo_stack.push(cmd);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
            self.clean_len = match self.clean_len {
                Some(0) | None => None,
                Some(n) => Some(n - 1),
            };
        }
    }

    fn replay(
        &self,
        model: &RefCell<Mindmap>,
        views: &RefCell<ViewRegistry>,
        bus: &EventBus,
        mutation: &Mutation,
    ) -> Result<(), EditorError> {
        let events = {
            let mut model = model.borrow_mut();
            let mut views = views.borrow_mut();
            apply_mutation(&mut model, &mut views, mutation)?
        };
        publish(bus, &events);
        Ok(())
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

fn publish(bus: &EventBus, events: &[StructuralEvent]) {
    for event in events {
        bus.emit(event);
    }
    bus.emit(&StructuralEvent::DoLayout);
}
