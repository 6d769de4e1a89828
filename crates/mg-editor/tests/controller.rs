//! Integration tests: controller-level editing, navigation, shrink
//! behavior, and load/save reconciliation.

use mg_core::model::ShapeType;
use mg_core::{Document, TopicId};
use mg_editor::controller::{Controller, DiagramElement, Direction, MAX_ZOOM, MIN_ZOOM};
use pretty_assertions::assert_eq;

/// Root plus a right-side branch pair (A above B) with two children
/// under A.
fn sample() -> (Controller, TopicId, TopicId, TopicId, TopicId) {
    let mut controller = Controller::new();
    let a = controller.create_child_topic(TopicId::ROOT).unwrap();
    controller.select_topic(a);
    let b = controller.add_sibling_topic().unwrap();
    let c = controller.create_child_topic(a).unwrap();
    controller.select_topic(c);
    let d = controller.add_sibling_topic().unwrap();
    controller.deselect_all();
    (controller, a, b, c, d)
}

// ─── Topic creation ─────────────────────────────────────────────────────

#[test]
fn first_level_branches_alternate_sides() {
    let mut controller = Controller::new();
    let first = controller.create_child_topic(TopicId::ROOT).unwrap();
    let second = controller.create_child_topic(TopicId::ROOT).unwrap();
    let third = controller.create_child_topic(TopicId::ROOT).unwrap();

    let model = controller.model();
    assert!(model.expect(first).unwrap().position.x > 0.0);
    assert!(model.expect(second).unwrap().position.x < 0.0);
    assert!(model.expect(third).unwrap().position.x > 0.0);
}

#[test]
fn sibling_lands_on_the_same_side_as_its_source() {
    let mut controller = Controller::new();
    let right = controller.create_child_topic(TopicId::ROOT).unwrap();
    let left = controller.create_child_topic(TopicId::ROOT).unwrap();

    controller.select_topic(left);
    let sibling = controller.add_sibling_topic().unwrap();

    let model = controller.model();
    assert!(model.expect(sibling).unwrap().position.x < 0.0);
    assert!(model.expect(right).unwrap().position.x > 0.0);
    assert_eq!(
        model.expect(sibling).unwrap().order,
        model.expect(left).unwrap().order + 1
    );
}

#[test]
fn sibling_of_the_central_topic_degrades_to_child() {
    let mut controller = Controller::new();
    controller.select_topic(TopicId::ROOT);
    let child = controller.add_sibling_topic().unwrap();
    assert_eq!(controller.model().parent_of(child), Some(TopicId::ROOT));
}

#[test]
fn new_topic_becomes_the_selection() {
    let mut controller = Controller::new();
    controller.select_topic(TopicId::ROOT);
    let child = controller.add_topic().unwrap();
    assert_eq!(controller.selection(), &[DiagramElement::Topic(child)]);
}

// ─── Selection preconditions ────────────────────────────────────────────

#[test]
fn attribute_commands_require_a_selection() {
    let mut controller = Controller::new();
    let err = controller.change_font_color(Some("red".into())).unwrap_err();
    assert!(err.is_advisory());
    assert!(!controller.can_undo());
}

#[test]
fn add_topic_requires_exactly_one_target() {
    let (mut controller, a, b, ..) = sample();
    controller.set_selection(vec![DiagramElement::Topic(a), DiagramElement::Topic(b)]);
    let err = controller.add_topic().unwrap_err();
    assert!(err.is_advisory());
}

#[test]
fn line_shape_is_filtered_for_the_central_topic() {
    let mut controller = Controller::new();
    controller.select_topic(TopicId::ROOT);
    let err = controller.change_shape(Some(ShapeType::Line)).unwrap_err();
    assert!(err.is_advisory());
    assert_eq!(controller.model().expect(TopicId::ROOT).unwrap().style.shape, None);
}

#[test]
fn line_shaped_topics_refuse_box_colors() {
    let (mut controller, a, ..) = sample();
    controller.select_topic(a);
    controller.change_shape(Some(ShapeType::Line)).unwrap();

    let err = controller
        .change_background_color(Some("red".into()))
        .unwrap_err();
    assert!(err.is_advisory());
    let err = controller.change_border_color(Some("red".into())).unwrap_err();
    assert!(err.is_advisory());

    let model = controller.model();
    assert_eq!(model.expect(a).unwrap().style.background_color, None);
    assert_eq!(model.expect(a).unwrap().style.border_color, None);
}

#[test]
fn box_colors_skip_line_shaped_targets_in_a_mixed_selection() {
    let (mut controller, a, b, ..) = sample();
    controller.select_topic(a);
    controller.change_shape(Some(ShapeType::Line)).unwrap();

    controller.set_selection(vec![DiagramElement::Topic(a), DiagramElement::Topic(b)]);
    controller
        .change_background_color(Some("blue".into()))
        .unwrap();

    let model = controller.model();
    assert_eq!(model.expect(a).unwrap().style.background_color, None);
    assert_eq!(
        model.expect(b).unwrap().style.background_color.as_deref(),
        Some("blue")
    );
}

// ─── Navigation ─────────────────────────────────────────────────────────

#[test]
fn navigation_walks_the_visible_tree() {
    let (mut controller, a, b, c, d) = sample();

    controller.select_topic(TopicId::ROOT);
    assert_eq!(controller.navigate(Direction::Right), Some(a));
    assert_eq!(controller.navigate(Direction::Right), Some(c));
    assert_eq!(controller.navigate(Direction::Down), Some(d));
    assert_eq!(controller.navigate(Direction::Up), Some(c));
    assert_eq!(controller.navigate(Direction::Left), Some(a));
    assert_eq!(controller.navigate(Direction::Down), Some(b));
    // B is the bottom sibling; focus stays put.
    assert_eq!(controller.navigate(Direction::Down), None);
    assert_eq!(controller.selection(), &[DiagramElement::Topic(b)]);
}

#[test]
fn left_arrow_from_root_enters_the_left_side() {
    let mut controller = Controller::new();
    let _right = controller.create_child_topic(TopicId::ROOT).unwrap();
    let left = controller.create_child_topic(TopicId::ROOT).unwrap();

    controller.select_topic(TopicId::ROOT);
    assert_eq!(controller.navigate(Direction::Left), Some(left));
    // Towards the root again.
    assert_eq!(controller.navigate(Direction::Right), Some(TopicId::ROOT));
}

#[test]
fn navigation_skips_hidden_topics() {
    let (mut controller, a, b, c, _d) = sample();
    controller.toggle_shrink(a).unwrap();

    controller.select_topic(a);
    // A's children are hidden; right goes nowhere.
    assert_eq!(controller.navigate(Direction::Right), None);

    controller.toggle_shrink(a).unwrap();
    controller.select_topic(a);
    assert_eq!(controller.navigate(Direction::Right), Some(c));
    controller.select_topic(b);
    assert_eq!(controller.navigate(Direction::Up), Some(a));
}

// ─── Shrink ─────────────────────────────────────────────────────────────

#[test]
fn shrinking_a_branch_pulls_siblings_together_and_back() {
    let (mut controller, a, b, c, d) = sample();
    let b_before = controller.model().expect(b).unwrap().position;
    let c_order = controller.model().expect(c).unwrap().order;
    let d_order = controller.model().expect(d).unwrap().order;

    controller.toggle_shrink(a).unwrap();
    assert!(!controller.views().topic(c).unwrap().visible);
    assert!(!controller.views().topic(d).unwrap().visible);
    let b_shrunk = controller.model().expect(b).unwrap().position;
    assert!(b_shrunk.y < b_before.y, "B moves up once A's subtree is hidden");

    controller.toggle_shrink(a).unwrap();
    assert!(controller.views().topic(c).unwrap().visible);
    assert_eq!(controller.model().expect(b).unwrap().position, b_before);
    assert_eq!(controller.model().expect(c).unwrap().order, c_order);
    assert_eq!(controller.model().expect(d).unwrap().order, d_order);
}

#[test]
fn relationship_lines_hide_with_their_endpoints() {
    let (mut controller, a, b, c, _d) = sample();
    let rel = controller.add_relationship(c, b).unwrap();
    assert!(controller.views().line(rel).unwrap().visible);

    controller.toggle_shrink(a).unwrap();
    assert!(!controller.views().line(rel).unwrap().visible);

    controller.toggle_shrink(a).unwrap();
    assert!(controller.views().line(rel).unwrap().visible);
}

#[test]
fn shrink_toggling_stays_out_of_the_history() {
    let (mut controller, a, ..) = sample();
    let undoable_before = controller.can_undo();
    controller.save();

    controller.toggle_shrink(a).unwrap();
    assert_eq!(controller.can_undo(), undoable_before);
    assert!(!controller.needs_save());
}

// ─── Manual positioning ─────────────────────────────────────────────────

#[test]
fn free_topics_keep_their_dragged_position() {
    let (mut controller, a, b, ..) = sample();
    controller.disconnect_topic(b).unwrap();
    controller
        .move_topic(b, mg_core::model::Point::new(500.0, 300.0))
        .unwrap();

    // A structural change elsewhere relayouts the tree but leaves the
    // free branch alone.
    controller.create_child_topic(a).unwrap();
    let pos = controller.model().expect(b).unwrap().position;
    assert_eq!(pos, mg_core::model::Point::new(500.0, 300.0));
}

// ─── Load / save ────────────────────────────────────────────────────────

#[test]
fn loaded_documents_rebuild_views_and_geometry() {
    let (mut controller, a, b, c, _d) = sample();
    controller.select_topic(a);
    controller.change_text("Research").unwrap();
    controller.add_note(Some("pending review".into())).unwrap();
    controller.add_relationship(c, b).unwrap();
    controller.disconnect_topic(b).unwrap();

    let saved = controller.save();
    let loaded = Controller::from_document(saved.document.clone()).unwrap();

    let original = controller.model();
    let rebuilt = loaded.model();
    let mut ids: Vec<TopicId> = original.topic_ids().collect();
    ids.sort();
    let mut rebuilt_ids: Vec<TopicId> = rebuilt.topic_ids().collect();
    rebuilt_ids.sort();
    assert_eq!(ids, rebuilt_ids);
    for id in ids {
        assert_eq!(original.expect(id).unwrap(), rebuilt.expect(id).unwrap());
        assert_eq!(original.parent_of(id), rebuilt.parent_of(id));
        assert_eq!(
            loaded.views().topic(id).unwrap().position,
            rebuilt.expect(id).unwrap().position
        );
    }
    assert_eq!(original.relationships(), rebuilt.relationships());
    assert_eq!(loaded.views().line_count(), 1);
    assert!(!loaded.needs_save());
}

#[test]
fn loading_preserves_shrink_visibility() {
    let (mut controller, a, _b, c, d) = sample();
    controller.toggle_shrink(a).unwrap();

    let saved = controller.save();
    let loaded = Controller::from_document(saved.document).unwrap();
    assert!(loaded.model().expect(a).unwrap().shrunken);
    assert!(!loaded.views().topic(c).unwrap().visible);
    assert!(!loaded.views().topic(d).unwrap().visible);
}

#[test]
fn save_reports_zoom_and_strategy() {
    let mut controller = Controller::new();
    controller.set_zoom(2.0);
    let saved = controller.save();
    assert_eq!(saved.properties.zoom, 2.0);
    assert_eq!(saved.properties.layout_strategy, "tree");
}

#[test]
fn zoom_clamps_to_its_range() {
    let mut controller = Controller::new();
    assert_eq!(controller.set_zoom(10.0), MAX_ZOOM);
    assert_eq!(controller.set_zoom(0.01), MIN_ZOOM);
    for _ in 0..30 {
        controller.zoom_out();
    }
    assert_eq!(controller.zoom(), MIN_ZOOM);
    for _ in 0..30 {
        controller.zoom_in();
    }
    assert_eq!(controller.zoom(), MAX_ZOOM);
}

#[test]
fn rejected_loads_leave_no_controller() {
    let (mut controller, ..) = sample();
    let mut saved = controller.save();
    saved.document.root.id = TopicId(9);
    assert!(Controller::from_document(saved.document).is_err());
}

#[test]
fn document_survives_a_serde_round_trip() {
    let (mut controller, ..) = sample();
    let saved = controller.save();
    let json = serde_json::to_string(&saved.document).unwrap();
    let parsed: Document = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, saved.document);
}
