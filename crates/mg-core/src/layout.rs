//! Incremental tree layout for mind-map topics.
//!
//! The engine keeps a private shadow of the topology (parent/child links,
//! sibling order, per-node size, shrink state) keyed by topic ID. This
//! shadow is the single source of truth for layout math; the document
//! model's position field is a cached copy written back from `Change`
//! events.
//!
//! Geometry: children stack vertically in (order, registration) order,
//! each centered in a slot sized by its subtree height, slots centered on
//! the parent's vertical center. Horizontal offset is a deterministic
//! function of depth and side; the root is the only node with children on
//! both sides. Shrunken nodes contribute their own height only — their
//! hidden subtree is skipped entirely.
//!
//! Structural operations mark the affected node and its ancestor chain
//! dirty. `layout(false)` recomputes dirty branches only, reusing cached
//! subtree heights of clean siblings; `layout(true)` recomputes the whole
//! tree. Both converge to identical geometry.

use crate::error::CoreError;
use crate::events::ChangeEvent;
use crate::id::TopicId;
use crate::model::{Point, Size};
use std::collections::{HashMap, HashSet};

/// Which side of the central topic a branch hangs on. Assigned from the
/// registered position's x sign at connect time; inherited below the
/// first level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn sign(self) -> f32 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }
}

/// Vertical spacing between sibling slots.
const VERTICAL_GAP: f32 = 10.0;
/// Horizontal clearance between a first-level branch and the root box.
const FIRST_LEVEL_GAP: f32 = 80.0;
/// Horizontal clearance for deeper branches.
const BRANCH_GAP: f32 = 30.0;

fn horizontal_gap(depth: usize) -> f32 {
    if depth <= 1 { FIRST_LEVEL_GAP } else { BRANCH_GAP }
}

#[derive(Debug, Clone)]
struct ShadowNode {
    size: Size,
    position: Point,
    order: u32,
    /// Order value last reported through a `Change` event.
    reported_order: u32,
    parent: Option<TopicId>,
    /// Sorted by (order, seq): equal orders keep registration order.
    children: Vec<TopicId>,
    shrunken: bool,
    side: Side,
    seq: u64,
    /// Cached subtree height, refreshed for dirty branches each pass.
    branch_height: f32,
}

pub struct LayoutEngine {
    root: TopicId,
    nodes: HashMap<TopicId, ShadowNode>,
    /// Changed nodes plus their ancestor chains.
    dirty: HashSet<TopicId>,
    next_seq: u64,
}

impl LayoutEngine {
    /// The root entry is special-cased at construction; `add_node` must
    /// not be called for it again.
    pub fn new(root: TopicId, root_size: Size) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            ShadowNode {
                size: root_size,
                position: Point::default(),
                order: 0,
                reported_order: 0,
                parent: None,
                children: Vec::new(),
                shrunken: false,
                side: Side::Right,
                seq: 0,
                branch_height: root_size.height,
            },
        );
        Self {
            root,
            nodes,
            dirty: HashSet::new(),
            next_seq: 1,
        }
    }

    // ─── Shadow maintenance ──────────────────────────────────────────────

    /// Start tracking a topic. The entry is free (disconnected) until a
    /// `connect_node` arrives.
    pub fn add_node(
        &mut self,
        id: TopicId,
        size: Size,
        position: Point,
    ) -> Result<(), CoreError> {
        if self.nodes.contains_key(&id) {
            return Err(CoreError::DuplicateNode(id));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.nodes.insert(
            id,
            ShadowNode {
                size,
                position,
                order: 0,
                reported_order: 0,
                parent: None,
                children: Vec::new(),
                shrunken: false,
                side: Side::Right,
                seq,
                branch_height: size.height,
            },
        );
        Ok(())
    }

    /// Stop tracking a topic. Unknown IDs and the root are silently
    /// ignored; any children left behind become free entries.
    pub fn remove_node(&mut self, id: TopicId) {
        if id == self.root || !self.nodes.contains_key(&id) {
            return;
        }
        self.detach(id);
        if let Some(removed) = self.nodes.remove(&id) {
            for child in removed.children {
                if let Some(node) = self.nodes.get_mut(&child) {
                    node.parent = None;
                }
            }
        }
        self.dirty.remove(&id);
    }

    /// Attach `child` under `parent` at the requested order. Equal orders
    /// resolve by registration sequence: the later-registered node is
    /// placed after the earlier one. No-op on unknown IDs.
    pub fn connect_node(&mut self, parent: TopicId, child: TopicId, order: u32) {
        if !self.nodes.contains_key(&parent) || !self.nodes.contains_key(&child) {
            log::debug!("connect_node: unknown id ({parent} -> {child}), ignored");
            return;
        }
        self.detach(child);

        let side = if parent == self.root {
            let root_x = self.nodes[&self.root].position.x;
            if self.nodes[&child].position.x < root_x {
                Side::Left
            } else {
                Side::Right
            }
        } else {
            self.nodes[&parent].side
        };

        if let Some(node) = self.nodes.get_mut(&child) {
            node.order = order;
            node.parent = Some(parent);
        }
        self.set_side_recursive(child, side);

        let child_key = (order, self.nodes[&child].seq);
        let siblings = &self.nodes[&parent].children;
        let insert_at = siblings
            .iter()
            .position(|c| {
                let n = &self.nodes[c];
                (n.order, n.seq) > child_key
            })
            .unwrap_or(siblings.len());
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.insert(insert_at, child);
        }

        self.mark_dirty(child);
    }

    /// Detach a topic from its parent, keeping its last position as a
    /// free entry. No-op on unknown IDs.
    pub fn disconnect_node(&mut self, id: TopicId) {
        if !self.nodes.contains_key(&id) {
            return;
        }
        self.detach(id);
    }

    pub fn update_node_size(&mut self, id: TopicId, size: Size) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.size != size {
            node.size = size;
            self.mark_dirty(id);
        }
    }

    pub fn update_shrink_state(&mut self, id: TopicId, shrunken: bool) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if node.shrunken == shrunken {
            return;
        }
        node.shrunken = shrunken;
        if shrunken {
            self.mark_dirty(id);
        } else {
            // Hidden descendants may have gone stale while excluded from
            // the height pass; recompute the whole branch.
            self.mark_subtree_dirty(id);
        }
    }

    /// Manual drag override. Durable for free topics; the next layout
    /// pass of a connected topic recomputes and wins.
    pub fn set_position_override(&mut self, id: TopicId, position: Point) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.position = position;
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn is_tracked(&self, id: TopicId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn position_of(&self, id: TopicId) -> Option<Point> {
        self.nodes.get(&id).map(|n| n.position)
    }

    pub fn order_of(&self, id: TopicId) -> Option<u32> {
        self.nodes.get(&id).map(|n| n.order)
    }

    pub fn tracked_count(&self) -> usize {
        self.nodes.len()
    }

    // ─── Layout pass ─────────────────────────────────────────────────────

    /// Recompute geometry and report every topic whose position or order
    /// changed. `force` recomputes everything; otherwise only dirty
    /// branches are revisited.
    pub fn layout(&mut self, force: bool) -> Vec<ChangeEvent> {
        if !force && self.dirty.is_empty() {
            return Vec::new();
        }
        let mut changes = Vec::new();
        self.refresh_height(self.root, force);
        let root_center = self.nodes[&self.root].position;
        self.place(self.root, root_center, 0, force, &mut changes);
        self.dirty.clear();
        changes
    }

    /// Subtree height, using the cached value for clean subtrees.
    fn refresh_height(&mut self, id: TopicId, force: bool) -> f32 {
        let (cached, shrunken, own_height, children) = {
            let node = &self.nodes[&id];
            (
                node.branch_height,
                node.shrunken,
                node.size.height,
                node.children.clone(),
            )
        };
        if !force && !self.dirty.contains(&id) {
            return cached;
        }
        let height = if shrunken || children.is_empty() {
            own_height
        } else {
            let mut total = 0.0;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    total += VERTICAL_GAP;
                }
                total += self.refresh_height(*child, force);
            }
            own_height.max(total)
        };
        if let Some(node) = self.nodes.get_mut(&id) {
            node.branch_height = height;
        }
        height
    }

    fn place(
        &mut self,
        id: TopicId,
        center: Point,
        depth: usize,
        force: bool,
        changes: &mut Vec<ChangeEvent>,
    ) {
        let (position, order, reported_order, shrunken) = {
            let node = &self.nodes[&id];
            (node.position, node.order, node.reported_order, node.shrunken)
        };
        let moved = center != position;
        let dirty = force || self.dirty.contains(&id);
        // A clean subtree whose assigned center did not move keeps every
        // position it already has.
        if !moved && !dirty {
            return;
        }
        let order_changed = order != reported_order;
        if (moved || order_changed) && id != self.root {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.position = center;
                node.reported_order = order;
            }
            changes.push(ChangeEvent {
                id,
                position: center,
                order,
            });
        }
        if shrunken {
            return;
        }

        let children = self.nodes[&id].children.clone();
        if children.is_empty() {
            return;
        }
        if id == self.root {
            for side in [Side::Right, Side::Left] {
                let on_side: Vec<TopicId> = children
                    .iter()
                    .copied()
                    .filter(|c| self.nodes[c].side == side)
                    .collect();
                self.place_children(id, center, &on_side, side, depth, force, changes);
            }
        } else {
            let side = self.nodes[&id].side;
            self.place_children(id, center, &children, side, depth, force, changes);
        }
    }

    fn place_children(
        &mut self,
        parent: TopicId,
        center: Point,
        children: &[TopicId],
        side: Side,
        depth: usize,
        force: bool,
        changes: &mut Vec<ChangeEvent>,
    ) {
        if children.is_empty() {
            return;
        }
        let parent_half_width = self.nodes[&parent].size.width / 2.0;
        let mut total = 0.0;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                total += VERTICAL_GAP;
            }
            total += self.nodes[child].branch_height;
        }

        let mut y = center.y - total / 2.0;
        for child in children {
            let (branch_height, child_half_width) = {
                let node = &self.nodes[child];
                (node.branch_height, node.size.width / 2.0)
            };
            let x = center.x
                + side.sign() * (parent_half_width + horizontal_gap(depth + 1) + child_half_width);
            let child_center = Point::new(x, y + branch_height / 2.0);
            self.place(*child, child_center, depth + 1, force, changes);
            y += branch_height + VERTICAL_GAP;
        }
    }

    // ─── Dirty tracking ──────────────────────────────────────────────────

    fn mark_dirty(&mut self, id: TopicId) {
        let mut current = Some(id);
        while let Some(next) = current {
            if !self.dirty.insert(next) {
                break;
            }
            current = self.nodes.get(&next).and_then(|n| n.parent);
        }
    }

    fn mark_subtree_dirty(&mut self, id: TopicId) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get(&next) {
                stack.extend(node.children.iter().copied());
            }
            self.dirty.insert(next);
        }
        self.mark_dirty(id);
    }

    fn detach(&mut self, id: TopicId) {
        let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|c| *c != id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
        self.mark_dirty(parent);
    }

    fn set_side_recursive(&mut self, id: TopicId, side: Side) {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(&next) {
                node.side = side;
                stack.extend(node.children.iter().copied());
            }
        }
    }
}
