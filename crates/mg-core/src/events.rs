//! Structural event bus.
//!
//! The bus decouples the view layer from the layout engine: every
//! structural mutation is published here and the layout bridge feeds it
//! into the engine's shadow. One bus per open document, passed by
//! reference to collaborators — never a process-wide singleton, so two
//! open documents can not interfere and tests stay isolated.
//!
//! Delivery is synchronous, single-threaded, in registration order.
//! Handlers are snapshotted out of the registry before invocation, so a
//! nested emit (a terminal `Change` fired while `DoLayout` is being
//! handled) can not deadlock on the registry borrow. New event kinds
//! must preserve the acyclic emission property: `Change` writes position
//! data and never re-triggers a structural event.

use crate::id::TopicId;
use crate::model::{Point, Size};
use std::cell::RefCell;
use std::rc::Rc;

/// Position/order update published after a layout pass. Terminal: its
/// handlers write data, they do not emit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeEvent {
    pub id: TopicId,
    pub position: Point,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StructuralEvent {
    NodeAdded {
        id: TopicId,
        size: Size,
        position: Point,
    },
    NodeRemoved {
        id: TopicId,
    },
    NodeResized {
        id: TopicId,
        size: Size,
    },
    /// Manual drag repositioning, propagated into the layout shadow as an
    /// override. A later layout pass of a connected topic recomputes it.
    NodeMoved {
        id: TopicId,
        position: Point,
    },
    NodeDisconnected {
        id: TopicId,
    },
    NodeConnected {
        parent: TopicId,
        child: TopicId,
        order: u32,
    },
    NodeRepositioned {
        id: TopicId,
        position: Point,
    },
    NodeShrink {
        id: TopicId,
        shrunken: bool,
    },
    /// Request a coalesced layout pass on the next scheduler tick.
    DoLayout,
    /// Outbound position/order update from the layout engine.
    Change(ChangeEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NodeAdded,
    NodeRemoved,
    NodeResized,
    NodeMoved,
    NodeDisconnected,
    NodeConnected,
    NodeRepositioned,
    NodeShrink,
    DoLayout,
    Change,
}

impl StructuralEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            StructuralEvent::NodeAdded { .. } => EventKind::NodeAdded,
            StructuralEvent::NodeRemoved { .. } => EventKind::NodeRemoved,
            StructuralEvent::NodeResized { .. } => EventKind::NodeResized,
            StructuralEvent::NodeMoved { .. } => EventKind::NodeMoved,
            StructuralEvent::NodeDisconnected { .. } => EventKind::NodeDisconnected,
            StructuralEvent::NodeConnected { .. } => EventKind::NodeConnected,
            StructuralEvent::NodeRepositioned { .. } => EventKind::NodeRepositioned,
            StructuralEvent::NodeShrink { .. } => EventKind::NodeShrink,
            StructuralEvent::DoLayout => EventKind::DoLayout,
            StructuralEvent::Change(_) => EventKind::Change,
        }
    }
}

type Handler = Rc<dyn Fn(&StructuralEvent)>;

/// Synchronous publish/subscribe channel with application lifetime equal
/// to its owning controller.
#[derive(Default)]
pub struct EventBus {
    handlers: RefCell<Vec<(EventKind, Handler)>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind. Handlers fire in
    /// registration order.
    pub fn on(&self, kind: EventKind, handler: impl Fn(&StructuralEvent) + 'static) {
        self.handlers.borrow_mut().push((kind, Rc::new(handler)));
    }

    /// Deliver `event` to every matching handler, synchronously.
    pub fn emit(&self, event: &StructuralEvent) {
        let kind = event.kind();
        // Snapshot first: a handler may emit again (terminal Change during
        // DoLayout) or register new handlers.
        let matching: Vec<Handler> = self
            .handlers
            .borrow()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in matching {
            handler(event);
        }
    }
}
