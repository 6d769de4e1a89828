//! Document model for a mind map.
//!
//! Topics are vertices of a tree rooted at the single central topic
//! (`TopicId::ROOT`); edges represent parent→child containment.
//! Relationships are non-tree edges between two topics and are stored
//! separately. A topic's `position` is a cached copy of layout-engine
//! output — layout math never reads it back, it reads the engine's own
//! shadow entries.

use crate::error::CoreError;
use crate::id::{RelationshipId, TopicId};
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::HashMap;

// ─── Geometry ────────────────────────────────────────────────────────────

/// A point in workspace coordinates. The central topic sits at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl Default for Size {
    fn default() -> Self {
        DEFAULT_TOPIC_SIZE
    }
}

/// Structural default seeded into freshly created topics. The rendering
/// collaborator resizes them once text is measured.
pub const DEFAULT_TOPIC_SIZE: Size = Size {
    width: 110.0,
    height: 30.0,
};

pub const CENTRAL_TOPIC_SIZE: Size = Size {
    width: 140.0,
    height: 50.0,
};

// ─── Topic kind, shape, style ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopicKind {
    /// The single root. Never deleted, never disconnected.
    Central,
    /// A direct branch of the central topic.
    Main,
    /// Any deeper topic.
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeType {
    Rectangle,
    RoundedRectangle,
    Ellipse,
    /// Text on a bare line. Not a valid shape for the central topic and
    /// refuses background/border colors.
    Line,
}

/// Visual attributes. Opaque to the core beyond being attached and
/// detached atomically — colors are kept as free-form strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicStyle {
    pub font_family: Option<String>,
    pub font_size: Option<f32>,
    pub font_color: Option<String>,
    pub bold: bool,
    pub italic: bool,
    pub shape: Option<ShapeType>,
    pub background_color: Option<String>,
    pub border_color: Option<String>,
}

/// Always-present optional attachments. Queried by presence, never by
/// probing for a duck-typed property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Decorations {
    pub link: Option<String>,
    pub note: Option<String>,
    pub icons: SmallVec<[String; 2]>,
}

impl Decorations {
    pub fn has_link(&self) -> bool {
        self.link.is_some()
    }

    pub fn has_note(&self) -> bool {
        self.note.is_some()
    }
}

// ─── Topic ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicModel {
    pub id: TopicId,
    pub kind: TopicKind,
    pub text: String,
    /// Cached layout output. Written by the layout bridge, or directly
    /// for disconnected (free) topics.
    pub position: Point,
    pub size: Size,
    /// Stacking index among siblings. Unique per side, not necessarily
    /// contiguous.
    pub order: u32,
    /// When set, the whole subtree below is hidden and excluded from
    /// layout until un-shrunk.
    pub shrunken: bool,
    pub style: TopicStyle,
    pub decorations: Decorations,
}

impl TopicModel {
    pub fn new(id: TopicId, kind: TopicKind) -> Self {
        let size = match kind {
            TopicKind::Central => CENTRAL_TOPIC_SIZE,
            _ => DEFAULT_TOPIC_SIZE,
        };
        Self {
            id,
            kind,
            text: String::new(),
            position: Point::default(),
            size,
            order: 0,
            shrunken: false,
            style: TopicStyle::default(),
            decorations: Decorations::default(),
        }
    }
}

// ─── Relationship ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineType {
    Straight,
    #[default]
    Curved,
}

/// A non-tree edge between two live topics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipModel {
    pub id: RelationshipId,
    pub from: TopicId,
    pub to: TopicId,
    pub line_type: LineType,
    pub src_ctrl_point: Option<Point>,
    pub dest_ctrl_point: Option<Point>,
    pub start_arrow: bool,
    pub end_arrow: bool,
}

impl RelationshipModel {
    pub fn new(id: RelationshipId, from: TopicId, to: TopicId) -> Self {
        Self {
            id,
            from,
            to,
            line_type: LineType::default(),
            src_ctrl_point: None,
            dest_ctrl_point: None,
            start_arrow: false,
            end_arrow: true,
        }
    }

    pub fn touches(&self, id: TopicId) -> bool {
        self.from == id || self.to == id
    }
}

// ─── Mindmap ─────────────────────────────────────────────────────────────

/// The canonical topic tree plus the relationship list.
///
/// Parent→child edges live in a `StableDiGraph`; an `id_index` maps the
/// stable integer IDs to graph indices so deletion never leaves a
/// dangling cross-pointer.
#[derive(Debug, Clone)]
pub struct Mindmap {
    graph: StableDiGraph<TopicModel, ()>,
    root: NodeIndex,
    id_index: HashMap<TopicId, NodeIndex>,
    relationships: Vec<RelationshipModel>,
    next_topic_id: u32,
    next_relationship_id: u32,
}

impl Mindmap {
    /// A fresh document: the central topic at the origin, nothing else.
    #[must_use]
    pub fn new() -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(TopicModel::new(TopicId::ROOT, TopicKind::Central));

        let mut id_index = HashMap::new();
        id_index.insert(TopicId::ROOT, root);

        Self {
            graph,
            root,
            id_index,
            relationships: Vec::new(),
            next_topic_id: 1,
            next_relationship_id: 1,
        }
    }

    // ─── Factories ───────────────────────────────────────────────────────

    /// Allocate a fresh topic model. Not yet part of the map — the
    /// dispatcher inserts it as an undoable command.
    pub fn create_node(&mut self, kind: TopicKind) -> TopicModel {
        let id = TopicId(self.next_topic_id);
        self.next_topic_id += 1;
        TopicModel::new(id, kind)
    }

    /// Seed a child of `parent`: structural defaults only, no view state.
    /// Order is appended after the current max sibling order.
    pub fn create_child_model(&mut self, parent: TopicId) -> Result<TopicModel, CoreError> {
        let parent_kind = self.expect(parent)?.kind;
        let kind = match parent_kind {
            TopicKind::Central => TopicKind::Main,
            _ => TopicKind::Generic,
        };
        let order = self
            .children_of(parent)
            .iter()
            .filter_map(|id| self.get(*id).map(|t| t.order))
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);

        let mut model = self.create_node(kind);
        model.order = order;
        Ok(model)
    }

    /// Seed a sibling of `id`: same kind, ordered right after it.
    pub fn create_sibling_model(&mut self, id: TopicId) -> Result<TopicModel, CoreError> {
        let source = self.expect(id)?;
        let kind = source.kind;
        let order = source.order + 1;

        let mut model = self.create_node(kind);
        model.order = order;
        Ok(model)
    }

    /// Allocate a relationship between two existing topics.
    pub fn create_relationship(
        &mut self,
        from: TopicId,
        to: TopicId,
    ) -> Result<RelationshipModel, CoreError> {
        self.expect(from)?;
        self.expect(to)?;
        let id = RelationshipId(self.next_relationship_id);
        self.next_relationship_id += 1;
        Ok(RelationshipModel::new(id, from, to))
    }

    // ─── Structural mutations ────────────────────────────────────────────

    /// Insert a previously created topic, disconnected. The ID counter is
    /// bumped past loaded IDs so later `create_node` calls stay unique.
    pub fn insert(&mut self, model: TopicModel) -> Result<(), CoreError> {
        if self.id_index.contains_key(&model.id) {
            return Err(CoreError::invalid(format!(
                "topic {} already exists",
                model.id
            )));
        }
        self.next_topic_id = self.next_topic_id.max(model.id.0 + 1);
        let id = model.id;
        let idx = self.graph.add_node(model);
        self.id_index.insert(id, idx);
        Ok(())
    }

    /// Attach `child` under `parent`. Validate-then-apply: the central
    /// topic is never reconnected, a node never connects beneath its own
    /// descendant, and a connected node must be disconnected first.
    pub fn connect(&mut self, child: TopicId, parent: TopicId) -> Result<(), CoreError> {
        let child_idx = self.expect_index(child)?;
        let parent_idx = self.expect_index(parent)?;

        if child.is_root() {
            return Err(CoreError::invalid("the central topic can not be connected"));
        }
        if self.parent_of(child).is_some() {
            return Err(CoreError::invalid(format!(
                "topic {child} is already connected"
            )));
        }
        if child == parent || self.is_ancestor_of(child, parent) {
            return Err(CoreError::invalid(format!(
                "connecting {child} under {parent} would form a cycle"
            )));
        }

        self.graph.add_edge(parent_idx, child_idx, ());
        Ok(())
    }

    /// Detach `id` from its parent without destroying it. No-op when
    /// already disconnected.
    pub fn disconnect(&mut self, id: TopicId) -> Result<(), CoreError> {
        if id.is_root() {
            return Err(CoreError::invalid(
                "the central topic can not be disconnected",
            ));
        }
        let idx = self.expect_index(id)?;
        if let Some(parent_idx) = self.parent_index(idx)
            && let Some(edge) = self.graph.find_edge(parent_idx, idx)
        {
            self.graph.remove_edge(edge);
        }
        Ok(())
    }

    /// Remove a single leaf topic. Recursion is the controller's job:
    /// children must already be gone.
    pub fn delete_node(&mut self, id: TopicId) -> Result<TopicModel, CoreError> {
        if id.is_root() {
            return Err(CoreError::invalid("the central topic can not be deleted"));
        }
        let idx = self.expect_index(id)?;
        if !self.children_of(id).is_empty() {
            return Err(CoreError::invalid(format!(
                "topic {id} still has children; delete them first"
            )));
        }
        self.disconnect(id)?;
        let removed = self
            .graph
            .remove_node(idx)
            .ok_or_else(|| CoreError::topic_not_found(id))?;
        self.id_index.remove(&id);
        Ok(removed)
    }

    pub fn add_relationship(&mut self, model: RelationshipModel) -> Result<(), CoreError> {
        self.expect(model.from)?;
        self.expect(model.to)?;
        if self.relationship(model.id).is_some() {
            return Err(CoreError::invalid(format!(
                "relationship {} already exists",
                model.id
            )));
        }
        self.next_relationship_id = self.next_relationship_id.max(model.id.0 + 1);
        self.relationships.push(model);
        Ok(())
    }

    pub fn remove_relationship(
        &mut self,
        id: RelationshipId,
    ) -> Result<RelationshipModel, CoreError> {
        let pos = self
            .relationships
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| CoreError::relationship_not_found(id))?;
        Ok(self.relationships.remove(pos))
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn root(&self) -> TopicId {
        TopicId::ROOT
    }

    pub fn get(&self, id: TopicId) -> Option<&TopicModel> {
        self.id_index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn get_mut(&mut self, id: TopicId) -> Option<&mut TopicModel> {
        self.id_index
            .get(&id)
            .copied()
            .map(|idx| &mut self.graph[idx])
    }

    pub fn expect(&self, id: TopicId) -> Result<&TopicModel, CoreError> {
        self.get(id).ok_or_else(|| CoreError::topic_not_found(id))
    }

    pub fn contains(&self, id: TopicId) -> bool {
        self.id_index.contains_key(&id)
    }

    pub fn parent_of(&self, id: TopicId) -> Option<TopicId> {
        let idx = *self.id_index.get(&id)?;
        self.parent_index(idx).map(|p| self.graph[p].id)
    }

    /// Direct children, sorted by (order, id) so stacking is stable even
    /// when two siblings request the same order.
    pub fn children_of(&self, id: TopicId) -> Vec<TopicId> {
        let Some(&idx) = self.id_index.get(&id) else {
            return Vec::new();
        };
        let mut children: Vec<TopicId> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .map(|c| self.graph[c].id)
            .collect();
        children.sort_by_key(|c| (self.graph[self.id_index[c]].order, *c));
        children
    }

    /// The central topic's direct branches.
    pub fn branches(&self) -> Vec<TopicId> {
        self.children_of(TopicId::ROOT)
    }

    pub fn relationships(&self) -> &[RelationshipModel] {
        &self.relationships
    }

    pub fn relationship(&self, id: RelationshipId) -> Option<&RelationshipModel> {
        self.relationships.iter().find(|r| r.id == id)
    }

    /// Relationships with either endpoint among `ids`. Used for cascaded
    /// removal when a subtree is deleted.
    pub fn relationships_touching(&self, ids: &[TopicId]) -> Vec<RelationshipId> {
        self.relationships
            .iter()
            .filter(|r| ids.contains(&r.from) || ids.contains(&r.to))
            .map(|r| r.id)
            .collect()
    }

    pub fn topic_count(&self) -> usize {
        self.id_index.len()
    }

    pub fn topic_ids(&self) -> impl Iterator<Item = TopicId> + '_ {
        self.graph.node_indices().map(|idx| self.graph[idx].id)
    }

    /// Walk parent links from `descendant` up to the root.
    pub fn is_ancestor_of(&self, ancestor: TopicId, descendant: TopicId) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut current = descendant;
        while let Some(parent) = self.parent_of(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Pre-order listing of `id` and everything beneath it.
    pub fn subtree(&self, id: TopicId) -> Vec<TopicId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if !self.contains(next) {
                continue;
            }
            out.push(next);
            let mut children = self.children_of(next);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// True when no ancestor of `id` (excluding itself) is shrunken.
    pub fn is_visible(&self, id: TopicId) -> bool {
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            match self.get(parent) {
                Some(p) if p.shrunken => return false,
                _ => {}
            }
            current = parent;
        }
        true
    }

    fn parent_index(&self, idx: NodeIndex) -> Option<NodeIndex> {
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .next()
    }

    fn expect_index(&self, id: TopicId) -> Result<NodeIndex, CoreError> {
        self.id_index
            .get(&id)
            .copied()
            .ok_or_else(|| CoreError::topic_not_found(id))
    }
}

impl Default for Mindmap {
    fn default() -> Self {
        Self::new()
    }
}
