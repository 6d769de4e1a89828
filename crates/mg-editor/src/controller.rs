//! Diagram controller.
//!
//! One controller per open document. It owns the model, the view
//! registry, the event bus, the layout bridge, and the dispatcher, and
//! is the only entry point the UI collaborator talks to: it validates
//! the selection, builds the mutation, dispatches it, and flushes the
//! deferred layout pass before returning, so every public operation
//! leaves model, views, and layout consistent.
//!
//! Selection preconditions are recoverable conditions, not faults:
//! invalid targets are filtered with a logged advisory and the operation
//! proceeds on the valid remainder; an empty remainder aborts with
//! `EditorError::Advisory`.

use crate::bridge::LayoutBridge;
use crate::commands::ActionDispatcher;
use crate::error::EditorError;
use crate::mutation::Mutation;
use crate::view::ViewRegistry;
use mg_core::model::{Mindmap, Point, ShapeType, Size};
use mg_core::{CoreError, Document, EventBus, RelationshipId, StructuralEvent, TopicId};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

pub const MIN_ZOOM: f32 = 0.3;
pub const MAX_ZOOM: f32 = 4.0;
const ZOOM_FACTOR: f32 = 1.2;

/// Name reported in the save properties bag.
const LAYOUT_STRATEGY: &str = "tree";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramElement {
    Topic(TopicId),
    Relationship(RelationshipId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveProperties {
    pub zoom: f32,
    pub layout_strategy: &'static str,
}

/// Handed to the persistence collaborator on save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveData {
    pub document: Document,
    pub properties: SaveProperties,
}

pub struct Controller {
    model: Rc<RefCell<Mindmap>>,
    views: Rc<RefCell<ViewRegistry>>,
    bus: Rc<EventBus>,
    bridge: LayoutBridge,
    dispatcher: ActionDispatcher,
    selection: Vec<DiagramElement>,
    zoom: f32,
}

impl Controller {
    /// A fresh document: the central topic only.
    pub fn new() -> Self {
        Self::from_model(Mindmap::new())
    }

    /// Build a controller from a pre-parsed document: mirror the tree
    /// into view objects pre-order (parents before children), register
    /// relationships once every endpoint exists, then normalize the
    /// geometry with one full layout pass.
    pub fn from_document(document: Document) -> Result<Self, EditorError> {
        let model = document.into_mindmap()?;
        Ok(Self::from_model(model))
    }

    fn from_model(model: Mindmap) -> Self {
        let bus = Rc::new(EventBus::new());
        let root = model
            .get(TopicId::ROOT)
            .expect("every mindmap has a central topic")
            .clone();

        let mut views = ViewRegistry::new();
        views.create_topic(root.id, root.position, root.size);
        let bridge = LayoutBridge::install(&bus, root.id, root.size);
        if root.position != Point::default() {
            bus.emit(&StructuralEvent::NodeMoved {
                id: root.id,
                position: root.position,
            });
        }

        let mut controller = Self {
            model: Rc::new(RefCell::new(model)),
            views: Rc::new(RefCell::new(views)),
            bus,
            bridge,
            dispatcher: ActionDispatcher::default(),
            selection: Vec::new(),
            zoom: 1.0,
        };
        controller.mirror_loaded_model();
        controller
    }

    fn mirror_loaded_model(&mut self) {
        let model = self.model.borrow();
        let mut views = self.views.borrow_mut();

        let mut tops = vec![TopicId::ROOT];
        tops.extend(
            model
                .topic_ids()
                .filter(|id| !id.is_root() && model.parent_of(*id).is_none()),
        );
        let mut shrunken = Vec::new();
        for top in tops {
            for id in model.subtree(top) {
                let topic = model.expect(id).expect("subtree ids are live");
                if !id.is_root() {
                    views.create_topic(id, topic.position, topic.size);
                    self.bus.emit(&StructuralEvent::NodeAdded {
                        id,
                        size: topic.size,
                        position: topic.position,
                    });
                    if let Some(parent) = model.parent_of(id) {
                        views.connect(id, parent);
                        self.bus.emit(&StructuralEvent::NodeConnected {
                            parent,
                            child: id,
                            order: topic.order,
                        });
                    }
                }
                if topic.shrunken {
                    shrunken.push(id);
                }
                views.set_visibility(id, model.is_visible(id));
            }
        }
        for id in shrunken {
            self.bus.emit(&StructuralEvent::NodeShrink { id, shrunken: true });
        }
        for rel in model.relationships() {
            views.create_line(rel.id, rel.from, rel.to);
        }
        views.refresh_line_visibility();
        drop(views);
        drop(model);

        if self.model.borrow().topic_count() > 1 {
            self.bridge.force_layout(&self.model, &self.views, &self.bus);
        }
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn select_topic(&mut self, id: TopicId) {
        self.selection = vec![DiagramElement::Topic(id)];
    }

    pub fn select_relationship(&mut self, id: RelationshipId) {
        self.selection = vec![DiagramElement::Relationship(id)];
    }

    pub fn set_selection(&mut self, elements: Vec<DiagramElement>) {
        self.selection = elements;
    }

    pub fn deselect_all(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &[DiagramElement] {
        &self.selection
    }

    /// Selected topics that still exist, in selection order. Stale
    /// entries are dropped with a logged advisory.
    pub fn selected_topics(&self) -> Vec<TopicId> {
        let model = self.model.borrow();
        self.selection
            .iter()
            .filter_map(|el| match el {
                DiagramElement::Topic(id) if model.contains(*id) => Some(*id),
                DiagramElement::Topic(id) => {
                    log::warn!("selection references removed topic {id}");
                    None
                }
                DiagramElement::Relationship(_) => None,
            })
            .collect()
    }

    fn single_selected_topic(&self) -> Result<TopicId, EditorError> {
        match self.selected_topics().as_slice() {
            [one] => Ok(*one),
            [] => Err(EditorError::advisory("no topic is selected")),
            _ => Err(EditorError::advisory("exactly one topic must be selected")),
        }
    }

    // ─── Topic creation ──────────────────────────────────────────────────

    /// Add a child under the single selected topic and select it.
    pub fn add_topic(&mut self) -> Result<TopicId, EditorError> {
        let parent = self.single_selected_topic()?;
        self.create_child_topic(parent)
    }

    /// Add a sibling after the single selected topic; for the central
    /// topic, which has no siblings, this degrades to adding a child.
    pub fn add_sibling_topic(&mut self) -> Result<TopicId, EditorError> {
        let selected = self.single_selected_topic()?;
        if selected.is_root() {
            return self.create_child_topic(selected);
        }
        let parent = self
            .model
            .borrow()
            .parent_of(selected)
            .ok_or_else(|| EditorError::advisory("a free topic has no sibling position"))?;
        let mut seed = self.model.borrow_mut().create_sibling_model(selected)?;
        // Same side as its source, regardless of the branch alternation.
        seed.position = self
            .model
            .borrow()
            .get(selected)
            .map(|t| t.position)
            .unwrap_or_default();
        self.insert_topic(Some(parent), seed)
    }

    pub fn create_child_topic(&mut self, parent: TopicId) -> Result<TopicId, EditorError> {
        let mut seed = self.model.borrow_mut().create_child_model(parent)?;
        seed.position = self.branch_seed_position(parent);
        self.insert_topic(Some(parent), seed)
    }

    /// First-level branches alternate sides; deeper topics inherit their
    /// parent's side, so any seed on the parent's side of the root works.
    fn branch_seed_position(&self, parent: TopicId) -> Point {
        let model = self.model.borrow();
        if parent.is_root() {
            let branches = model.branches().len();
            let root_x = model
                .get(TopicId::ROOT)
                .map(|r| r.position.x)
                .unwrap_or_default();
            let sign = if branches % 2 == 0 { 1.0 } else { -1.0 };
            Point::new(root_x + sign, 0.0)
        } else {
            model
                .get(parent)
                .map(|p| p.position)
                .unwrap_or_default()
        }
    }

    fn insert_topic(
        &mut self,
        parent: Option<TopicId>,
        seed: mg_core::model::TopicModel,
    ) -> Result<TopicId, EditorError> {
        let id = seed.id;
        self.dispatcher.execute(
            &self.model,
            &self.views,
            &self.bus,
            Mutation::AddTopic {
                parent,
                model: Box::new(seed),
            },
        )?;
        self.flush();
        self.select_topic(id);
        Ok(id)
    }

    // ─── Deletion ────────────────────────────────────────────────────────

    /// Delete every selected element. Topic deletion is recursive and
    /// cascades to relationships touching any removed topic; the central
    /// topic is filtered out of the target set with an advisory.
    pub fn delete_selection(&mut self) -> Result<(), EditorError> {
        if self.selection.is_empty() {
            return Err(EditorError::advisory("nothing is selected"));
        }

        let (topic_ids, relationship_ids) = {
            let model = self.model.borrow();
            let mut roots = Vec::new();
            let mut lines = Vec::new();
            for el in &self.selection {
                match el {
                    DiagramElement::Topic(id) if id.is_root() => {
                        log::warn!("the central topic can not be deleted; skipped");
                    }
                    DiagramElement::Topic(id) if model.contains(*id) => roots.push(*id),
                    DiagramElement::Topic(id) => {
                        log::warn!("selection references removed topic {id}");
                    }
                    DiagramElement::Relationship(id) => lines.push(*id),
                }
            }
            if roots.is_empty() && lines.is_empty() {
                return Err(EditorError::advisory("no deletable element is selected"));
            }

            // Expand to whole subtrees, then keep only subtree tops so a
            // selected descendant of a selected topic is not scheduled
            // twice. Concatenated pre-orders reversed give leaf-first.
            let mut doomed: Vec<TopicId> = Vec::new();
            for root in &roots {
                if roots
                    .iter()
                    .any(|other| model.is_ancestor_of(*other, *root))
                {
                    continue;
                }
                doomed.extend(model.subtree(*root));
            }
            doomed.reverse();

            for id in model.relationships_touching(&doomed) {
                if !lines.contains(&id) {
                    lines.push(id);
                }
            }
            (doomed, lines)
        };

        self.dispatcher.execute(
            &self.model,
            &self.views,
            &self.bus,
            Mutation::DeleteTopics {
                topic_ids,
                relationship_ids,
            },
        )?;
        self.flush();
        self.deselect_all();
        Ok(())
    }

    // ─── Connection ──────────────────────────────────────────────────────

    /// Reattach a free topic (end of a drag gesture).
    pub fn connect_topic(
        &mut self,
        child: TopicId,
        parent: TopicId,
        order: u32,
    ) -> Result<(), EditorError> {
        self.dispatcher.execute(
            &self.model,
            &self.views,
            &self.bus,
            Mutation::Connect {
                child,
                parent,
                order,
            },
        )?;
        self.flush();
        Ok(())
    }

    /// Detach a topic from its parent (start of a drag gesture).
    pub fn disconnect_topic(&mut self, child: TopicId) -> Result<(), EditorError> {
        self.dispatcher.execute(
            &self.model,
            &self.views,
            &self.bus,
            Mutation::Disconnect {
                child,
                restore_order: None,
            },
        )?;
        self.flush();
        Ok(())
    }

    /// Manual drag of a free topic (or a transient drag preview).
    pub fn move_topic(&mut self, id: TopicId, position: Point) -> Result<(), EditorError> {
        self.dispatcher.execute(
            &self.model,
            &self.views,
            &self.bus,
            Mutation::MoveTopic {
                targets: vec![(id, position)],
            },
        )?;
        self.flush();
        Ok(())
    }

    /// Size update from the rendering collaborator after text measure.
    pub fn resize_topic(&mut self, id: TopicId, size: Size) -> Result<(), EditorError> {
        self.dispatcher.execute(
            &self.model,
            &self.views,
            &self.bus,
            Mutation::ResizeTopic {
                targets: vec![(id, size)],
            },
        )?;
        self.flush();
        Ok(())
    }

    // ─── Relationships ───────────────────────────────────────────────────

    pub fn add_relationship(
        &mut self,
        from: TopicId,
        to: TopicId,
    ) -> Result<RelationshipId, EditorError> {
        let rel = self.model.borrow_mut().create_relationship(from, to)?;
        let id = rel.id;
        self.dispatcher.execute(
            &self.model,
            &self.views,
            &self.bus,
            Mutation::AddRelationship {
                model: Box::new(rel),
            },
        )?;
        self.flush();
        Ok(id)
    }

    // ─── Attribute commands ──────────────────────────────────────────────

    /// Replace the text of the single selected topic.
    pub fn change_text(&mut self, text: impl Into<String>) -> Result<(), EditorError> {
        let id = self.single_selected_topic()?;
        self.execute_on_targets(Mutation::SetText {
            targets: vec![(id, text.into())],
        })
    }

    pub fn change_font_family(&mut self, family: Option<String>) -> Result<(), EditorError> {
        let targets = self.topic_targets(family)?;
        self.execute_on_targets(Mutation::SetFontFamily { targets })
    }

    pub fn change_font_size(&mut self, size: Option<f32>) -> Result<(), EditorError> {
        let targets = self.topic_targets(size)?;
        self.execute_on_targets(Mutation::SetFontSize { targets })
    }

    pub fn change_font_color(&mut self, color: Option<String>) -> Result<(), EditorError> {
        let targets = self.topic_targets(color)?;
        self.execute_on_targets(Mutation::SetFontColor { targets })
    }

    pub fn change_font_weight(&mut self, bold: bool) -> Result<(), EditorError> {
        let targets = self.topic_targets(bold)?;
        self.execute_on_targets(Mutation::SetBold { targets })
    }

    pub fn change_font_style(&mut self, italic: bool) -> Result<(), EditorError> {
        let targets = self.topic_targets(italic)?;
        self.execute_on_targets(Mutation::SetItalic { targets })
    }

    /// The line shape draws text on a bare connector and is not valid
    /// for the central topic; such targets are filtered with an advisory.
    pub fn change_shape(&mut self, shape: Option<ShapeType>) -> Result<(), EditorError> {
        let mut targets = self.topic_targets(shape)?;
        if shape == Some(ShapeType::Line) {
            let before = targets.len();
            targets.retain(|(id, _)| !id.is_root());
            if targets.len() < before {
                log::warn!("the central topic can not use the line shape; skipped");
            }
            if targets.is_empty() {
                return Err(EditorError::advisory(
                    "no selected topic accepts the line shape",
                ));
            }
        }
        self.execute_on_targets(Mutation::SetShape { targets })
    }

    pub fn change_background_color(&mut self, color: Option<String>) -> Result<(), EditorError> {
        let targets = self.boxed_targets(self.topic_targets(color)?)?;
        self.execute_on_targets(Mutation::SetBackgroundColor { targets })
    }

    pub fn change_border_color(&mut self, color: Option<String>) -> Result<(), EditorError> {
        let targets = self.boxed_targets(self.topic_targets(color)?)?;
        self.execute_on_targets(Mutation::SetBorderColor { targets })
    }

    pub fn add_icon(&mut self, icon: impl Into<String>) -> Result<(), EditorError> {
        let id = self.single_selected_topic()?;
        self.execute_on_targets(Mutation::AddIcon {
            id,
            icon: icon.into(),
        })
    }

    pub fn add_link(&mut self, url: Option<String>) -> Result<(), EditorError> {
        let id = self.single_selected_topic()?;
        self.execute_on_targets(Mutation::SetLink { id, value: url })
    }

    pub fn add_note(&mut self, note: Option<String>) -> Result<(), EditorError> {
        let id = self.single_selected_topic()?;
        self.execute_on_targets(Mutation::SetNote { id, value: note })
    }

    /// Line-shaped topics draw no box, so background and border colors
    /// do not apply; such targets are filtered with an advisory.
    fn boxed_targets<T>(
        &self,
        mut targets: Vec<(TopicId, T)>,
    ) -> Result<Vec<(TopicId, T)>, EditorError> {
        let model = self.model.borrow();
        let before = targets.len();
        targets.retain(|(id, _)| {
            !model
                .get(*id)
                .is_some_and(|t| t.style.shape == Some(ShapeType::Line))
        });
        if targets.len() < before {
            log::warn!("line-shaped topics take no box color; skipped");
        }
        if targets.is_empty() {
            return Err(EditorError::advisory("no selected topic draws a box"));
        }
        Ok(targets)
    }

    fn topic_targets<T: Clone>(&self, value: T) -> Result<Vec<(TopicId, T)>, EditorError> {
        let topics = self.selected_topics();
        if topics.is_empty() {
            return Err(EditorError::advisory("at least one topic must be selected"));
        }
        Ok(topics.into_iter().map(|id| (id, value.clone())).collect())
    }

    fn execute_on_targets(&mut self, mutation: Mutation) -> Result<(), EditorError> {
        self.dispatcher
            .execute(&self.model, &self.views, &self.bus, mutation)?;
        self.flush();
        Ok(())
    }

    // ─── Shrink ──────────────────────────────────────────────────────────

    /// Collapse or expand a subtree. Not tracked in the history: the
    /// toggle is its own inverse and users expect undo to skip it.
    pub fn toggle_shrink(&mut self, id: TopicId) -> Result<bool, EditorError> {
        if id.is_root() {
            return Err(CoreError::invalid("the central topic can not be shrunk").into());
        }
        let shrunken = {
            let mut model = self.model.borrow_mut();
            let topic = model
                .get_mut(id)
                .ok_or_else(|| CoreError::topic_not_found(id))?;
            topic.shrunken = !topic.shrunken;
            topic.shrunken
        };
        {
            let model = self.model.borrow();
            let mut views = self.views.borrow_mut();
            for descendant in model.subtree(id).into_iter().skip(1) {
                views.set_visibility(descendant, model.is_visible(descendant));
            }
        }
        self.bus
            .emit(&StructuralEvent::NodeShrink { id, shrunken });
        self.bus.emit(&StructuralEvent::DoLayout);
        self.flush();
        Ok(shrunken)
    }

    // ─── History ─────────────────────────────────────────────────────────

    pub fn undo(&mut self) -> Option<&'static str> {
        let description = self.dispatcher.undo(&self.model, &self.views, &self.bus);
        self.flush();
        description
    }

    pub fn redo(&mut self) -> Option<&'static str> {
        let description = self.dispatcher.redo(&self.model, &self.views, &self.bus);
        self.flush();
        description
    }

    pub fn can_undo(&self) -> bool {
        self.dispatcher.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.dispatcher.can_redo()
    }

    // ─── Navigation ──────────────────────────────────────────────────────

    /// Keyboard focus movement from the single selected topic. Returns
    /// the newly focused topic; focus stays put when no candidate
    /// qualifies.
    pub fn navigate(&mut self, direction: Direction) -> Option<TopicId> {
        let current = self.single_selected_topic().ok()?;
        let target = {
            let model = self.model.borrow();
            match direction {
                Direction::Up | Direction::Down => {
                    sibling_towards(&model, current, direction)
                }
                Direction::Left | Direction::Right => lateral(&model, current, direction),
            }
        };
        if let Some(target) = target {
            self.select_topic(target);
        }
        target
    }

    // ─── Zoom / persistence ──────────────────────────────────────────────

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.zoom * ZOOM_FACTOR)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.zoom / ZOOM_FACTOR)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.zoom
    }

    /// Snapshot for the persistence collaborator; the history is marked
    /// clean once the snapshot is taken.
    pub fn save(&mut self) -> SaveData {
        let document = Document::from_mindmap(&self.model.borrow());
        self.dispatcher.mark_saved();
        SaveData {
            document,
            properties: SaveProperties {
                zoom: self.zoom,
                layout_strategy: LAYOUT_STRATEGY,
            },
        }
    }

    pub fn needs_save(&self) -> bool {
        self.dispatcher.has_been_changed()
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn model(&self) -> Ref<'_, Mindmap> {
        self.model.borrow()
    }

    pub fn views(&self) -> Ref<'_, ViewRegistry> {
        self.views.borrow()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn flush(&self) {
        self.bridge.flush(&self.model, &self.views, &self.bus);
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Navigation geometry ─────────────────────────────────────────────────

fn side_sign(model: &Mindmap, id: TopicId) -> f32 {
    let root_x = model
        .get(TopicId::ROOT)
        .map(|r| r.position.x)
        .unwrap_or_default();
    let x = model.get(id).map(|t| t.position.x).unwrap_or_default();
    if x < root_x { -1.0 } else { 1.0 }
}

/// Nearest same-side sibling strictly above (Up) or below (Down),
/// breaking ties by smallest vertical distance.
fn sibling_towards(model: &Mindmap, current: TopicId, direction: Direction) -> Option<TopicId> {
    let parent = model.parent_of(current)?;
    let current_y = model.get(current)?.position.y;
    let current_side = side_sign(model, current);

    model
        .children_of(parent)
        .into_iter()
        .filter(|id| *id != current && model.is_visible(*id))
        .filter(|id| !parent.is_root() || side_sign(model, *id) == current_side)
        .filter_map(|id| {
            let y = model.get(id)?.position.y;
            let qualifies = match direction {
                Direction::Up => y < current_y,
                Direction::Down => y > current_y,
                _ => false,
            };
            qualifies.then(|| (id, (y - current_y).abs()))
        })
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(id, _)| id)
}

/// Left/Right movement: from the root, the topmost child on the pressed
/// side; away from the root, the topmost child; towards it, the parent.
fn lateral(model: &Mindmap, current: TopicId, direction: Direction) -> Option<TopicId> {
    let pressed_sign = match direction {
        Direction::Left => -1.0,
        Direction::Right => 1.0,
        _ => return None,
    };

    if current.is_root() {
        return topmost_child_on_side(model, current, pressed_sign);
    }
    if side_sign(model, current) == pressed_sign {
        topmost_child_on_side(model, current, pressed_sign)
    } else {
        model.parent_of(current)
    }
}

fn topmost_child_on_side(model: &Mindmap, parent: TopicId, sign: f32) -> Option<TopicId> {
    model
        .children_of(parent)
        .into_iter()
        .filter(|id| model.is_visible(*id))
        .filter(|id| !parent.is_root() || side_sign(model, *id) == sign)
        .filter_map(|id| model.get(id).map(|t| (id, t.position.y)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(id, _)| id)
}
