//! Event-bus wiring between structural mutations and the layout engine.
//!
//! Inbound: every structural event kind feeds the engine's shadow.
//! `DoLayout` only raises a pending flag — scheduling while already
//! pending is a no-op, so a burst of mutations coalesces into one pass.
//! The owning controller calls `flush` at the end of each gesture to run
//! the deferred pass.
//!
//! Outbound: each position/order change from a pass is written into the
//! model and the view registry, then republished as a terminal `Change`
//! event for external observers. `Change` handlers must not emit.

use crate::view::ViewRegistry;
use mg_core::layout::LayoutEngine;
use mg_core::model::{Mindmap, Size};
use mg_core::{EventBus, EventKind, StructuralEvent, TopicId};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub struct LayoutBridge {
    engine: Rc<RefCell<LayoutEngine>>,
    pending: Rc<Cell<bool>>,
}

impl LayoutBridge {
    /// Build the engine for one document and subscribe it to `bus`. The
    /// root gets its special-cased shadow entry up front.
    pub fn install(bus: &EventBus, root: TopicId, root_size: Size) -> Self {
        let engine = Rc::new(RefCell::new(LayoutEngine::new(root, root_size)));
        let pending = Rc::new(Cell::new(false));

        let handle = Rc::clone(&engine);
        bus.on(EventKind::NodeAdded, move |ev| {
            if let StructuralEvent::NodeAdded { id, size, position } = ev
                && let Err(err) = handle.borrow_mut().add_node(*id, *size, *position)
            {
                log::warn!("layout shadow rejected {id}: {err}");
            }
        });

        let handle = Rc::clone(&engine);
        bus.on(EventKind::NodeRemoved, move |ev| {
            if let StructuralEvent::NodeRemoved { id } = ev {
                handle.borrow_mut().remove_node(*id);
            }
        });

        let handle = Rc::clone(&engine);
        bus.on(EventKind::NodeResized, move |ev| {
            if let StructuralEvent::NodeResized { id, size } = ev {
                handle.borrow_mut().update_node_size(*id, *size);
            }
        });

        let handle = Rc::clone(&engine);
        bus.on(EventKind::NodeMoved, move |ev| {
            if let StructuralEvent::NodeMoved { id, position } = ev {
                handle.borrow_mut().set_position_override(*id, *position);
            }
        });

        let handle = Rc::clone(&engine);
        bus.on(EventKind::NodeRepositioned, move |ev| {
            if let StructuralEvent::NodeRepositioned { id, position } = ev {
                handle.borrow_mut().set_position_override(*id, *position);
            }
        });

        let handle = Rc::clone(&engine);
        bus.on(EventKind::NodeConnected, move |ev| {
            if let StructuralEvent::NodeConnected {
                parent,
                child,
                order,
            } = ev
            {
                handle.borrow_mut().connect_node(*parent, *child, *order);
            }
        });

        let handle = Rc::clone(&engine);
        bus.on(EventKind::NodeDisconnected, move |ev| {
            if let StructuralEvent::NodeDisconnected { id } = ev {
                handle.borrow_mut().disconnect_node(*id);
            }
        });

        let handle = Rc::clone(&engine);
        bus.on(EventKind::NodeShrink, move |ev| {
            if let StructuralEvent::NodeShrink { id, shrunken } = ev {
                handle.borrow_mut().update_shrink_state(*id, *shrunken);
            }
        });

        let flag = Rc::clone(&pending);
        bus.on(EventKind::DoLayout, move |_| {
            flag.set(true);
        });

        Self { engine, pending }
    }

    pub fn has_pending_layout(&self) -> bool {
        self.pending.get()
    }

    /// Run the deferred pass, if one was requested since the last flush.
    pub fn flush(&self, model: &RefCell<Mindmap>, views: &RefCell<ViewRegistry>, bus: &EventBus) {
        if self.pending.replace(false) {
            self.run(false, model, views, bus);
        }
    }

    /// Unconditional full-tree pass. Converges to the same geometry as
    /// the incremental passes it replaces.
    pub fn force_layout(
        &self,
        model: &RefCell<Mindmap>,
        views: &RefCell<ViewRegistry>,
        bus: &EventBus,
    ) {
        self.pending.set(false);
        self.run(true, model, views, bus);
    }

    fn run(
        &self,
        force: bool,
        model: &RefCell<Mindmap>,
        views: &RefCell<ViewRegistry>,
        bus: &EventBus,
    ) {
        let changes = self.engine.borrow_mut().layout(force);
        if changes.is_empty() {
            return;
        }
        log::debug!("layout pass moved {} topics", changes.len());
        {
            let mut model = model.borrow_mut();
            let mut views = views.borrow_mut();
            for change in &changes {
                if let Some(topic) = model.get_mut(change.id) {
                    topic.position = change.position;
                    topic.order = change.order;
                }
                views.reposition(change.id, change.position);
            }
        }
        for change in changes {
            bus.emit(&StructuralEvent::Change(change));
        }
    }
}
