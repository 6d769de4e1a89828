//! Integration tests: undoable editing through the controller.
//!
//! Exercises the dispatcher, the mutation layer, and the layout bridge
//! together, verifying that undo restores the exact pre-dispatch state
//! of model and views.

use mg_core::{Document, EventKind, StructuralEvent, TopicId};
use mg_editor::controller::{Controller, DiagramElement};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

fn snapshot(controller: &Controller) -> Document {
    Document::from_mindmap(&controller.model())
}

#[test]
fn undo_restores_pre_dispatch_state_exactly() {
    let mut controller = Controller::new();
    let a = controller.create_child_topic(TopicId::ROOT).unwrap();
    let c = controller.create_child_topic(a).unwrap();
    let b = controller.create_child_topic(TopicId::ROOT).unwrap();
    let rel = controller.add_relationship(c, b).unwrap();
    let before = snapshot(&controller);

    controller.select_topic(a);
    controller.delete_selection().unwrap();
    assert!(!controller.model().contains(a));
    assert!(!controller.model().contains(c));
    assert!(controller.model().relationship(rel).is_none());
    assert_eq!(controller.views().line_count(), 0);

    controller.undo().unwrap();
    assert_eq!(snapshot(&controller), before);
    assert!(controller.views().topic(c).is_some());
    assert!(controller.views().line(rel).is_some());
}

#[test]
fn deleting_a_topic_removes_its_whole_subtree_and_cascades() {
    let mut controller = Controller::new();
    let a = controller.create_child_topic(TopicId::ROOT).unwrap();
    let c = controller.create_child_topic(a).unwrap();
    let d = controller.create_child_topic(c).unwrap();
    let b = controller.create_child_topic(TopicId::ROOT).unwrap();
    controller.add_relationship(d, b).unwrap();

    let before = controller.model().topic_count();
    controller.select_topic(a);
    controller.delete_selection().unwrap();

    // A had two descendants: exactly three topics go.
    assert_eq!(controller.model().topic_count(), before - 3);
    assert!(controller.model().relationships().is_empty());
    assert!(controller.model().contains(b));
}

#[test]
fn deleting_the_central_topic_is_rejected() {
    let mut controller = Controller::new();
    controller.create_child_topic(TopicId::ROOT).unwrap();
    let before = snapshot(&controller);

    controller.select_topic(TopicId::ROOT);
    let err = controller.delete_selection().unwrap_err();
    assert!(err.is_advisory());
    assert_eq!(snapshot(&controller), before);
}

#[test]
fn multi_target_font_color_undoes_atomically() {
    let mut controller = Controller::new();
    let a = controller.create_child_topic(TopicId::ROOT).unwrap();
    let b = controller.create_child_topic(TopicId::ROOT).unwrap();

    controller.set_selection(vec![DiagramElement::Topic(a), DiagramElement::Topic(b)]);
    controller.change_font_color(Some("red".into())).unwrap();
    assert_eq!(
        controller.model().expect(a).unwrap().style.font_color.as_deref(),
        Some("red")
    );
    assert_eq!(
        controller.model().expect(b).unwrap().style.font_color.as_deref(),
        Some("red")
    );

    controller.undo().unwrap();
    assert_eq!(controller.model().expect(a).unwrap().style.font_color, None);
    assert_eq!(controller.model().expect(b).unwrap().style.font_color, None);

    controller.redo().unwrap();
    assert_eq!(
        controller.model().expect(a).unwrap().style.font_color.as_deref(),
        Some("red")
    );
    assert_eq!(
        controller.model().expect(b).unwrap().style.font_color.as_deref(),
        Some("red")
    );
}

#[test]
fn new_command_discards_the_redo_tail() {
    let mut controller = Controller::new();
    controller.create_child_topic(TopicId::ROOT).unwrap();
    controller.create_child_topic(TopicId::ROOT).unwrap();

    controller.undo().unwrap();
    assert!(controller.can_redo());

    controller.create_child_topic(TopicId::ROOT).unwrap();
    assert!(!controller.can_redo());
}

#[test]
fn cycle_forming_connect_fails_cleanly() {
    let mut controller = Controller::new();
    let c = controller.create_child_topic(TopicId::ROOT).unwrap();
    let d = controller.create_child_topic(c).unwrap();

    // Free the branch, then try to hang it beneath its own descendant.
    controller.disconnect_topic(c).unwrap();

    let changes = Rc::new(RefCell::new(0));
    {
        let changes = Rc::clone(&changes);
        controller.bus().on(EventKind::Change, move |ev| {
            if let StructuralEvent::Change(_) = ev {
                *changes.borrow_mut() += 1;
            }
        });
    }

    let err = controller.connect_topic(c, d, 0).unwrap_err();
    assert!(!err.is_advisory());
    assert_eq!(controller.model().parent_of(c), None);
    assert_eq!(controller.model().parent_of(d), Some(c));
    assert_eq!(*changes.borrow(), 0, "a rejected connect must not relayout");
}

#[test]
fn disconnect_then_undo_restores_the_connection() {
    let mut controller = Controller::new();
    let a = controller.create_child_topic(TopicId::ROOT).unwrap();
    let order = controller.model().expect(a).unwrap().order;

    controller.disconnect_topic(a).unwrap();
    assert_eq!(controller.model().parent_of(a), None);

    controller.undo().unwrap();
    assert_eq!(controller.model().parent_of(a), Some(TopicId::ROOT));
    assert_eq!(controller.model().expect(a).unwrap().order, order);
}

#[test]
fn undoing_a_reconnect_restores_the_prior_order() {
    let mut controller = Controller::new();
    let a = controller.create_child_topic(TopicId::ROOT).unwrap();
    let b = controller.create_child_topic(TopicId::ROOT).unwrap();
    let order = controller.model().expect(a).unwrap().order;

    controller.disconnect_topic(a).unwrap();
    controller.connect_topic(a, b, 7).unwrap();
    assert_eq!(controller.model().expect(a).unwrap().order, 7);

    controller.undo().unwrap();
    assert_eq!(controller.model().parent_of(a), None);
    assert_eq!(controller.model().expect(a).unwrap().order, order);

    controller.redo().unwrap();
    assert_eq!(controller.model().parent_of(a), Some(b));
    assert_eq!(controller.model().expect(a).unwrap().order, 7);
}

#[test]
fn save_checkpoint_survives_undo_redo_cycles() {
    let mut controller = Controller::new();
    controller.create_child_topic(TopicId::ROOT).unwrap();
    assert!(controller.needs_save());

    let saved = controller.save();
    assert!(!controller.needs_save());
    assert_eq!(saved.properties.layout_strategy, "tree");

    controller.undo().unwrap();
    assert!(controller.needs_save());
    controller.redo().unwrap();
    assert!(!controller.needs_save());
}
