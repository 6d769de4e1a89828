//! View-object registry.
//!
//! One lightweight record per topic and per relationship line, keyed by
//! ID. The registry stands in for the rendering collaborator: structural
//! commands drive it through create/reposition/set-visibility/connect/
//! disconnect/remove calls, and tests assert against it instead of a
//! canvas. No record holds a pointer back into the model; deletion is a
//! single map removal.

use mg_core::model::{Point, Size};
use mg_core::{RelationshipId, TopicId};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct TopicView {
    pub id: TopicId,
    pub position: Point,
    pub size: Size,
    pub visible: bool,
    pub parent: Option<TopicId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineView {
    pub id: RelationshipId,
    pub from: TopicId,
    pub to: TopicId,
    /// True only while both endpoint topics are visible.
    pub visible: bool,
}

#[derive(Debug, Default)]
pub struct ViewRegistry {
    topics: HashMap<TopicId, TopicView>,
    lines: HashMap<RelationshipId, LineView>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Topic views ─────────────────────────────────────────────────────

    pub fn create_topic(&mut self, id: TopicId, position: Point, size: Size) {
        self.topics.insert(
            id,
            TopicView {
                id,
                position,
                size,
                visible: true,
                parent: None,
            },
        );
    }

    pub fn remove_topic(&mut self, id: TopicId) {
        self.topics.remove(&id);
    }

    pub fn reposition(&mut self, id: TopicId, position: Point) {
        if let Some(view) = self.topics.get_mut(&id) {
            view.position = position;
        }
    }

    pub fn resize(&mut self, id: TopicId, size: Size) {
        if let Some(view) = self.topics.get_mut(&id) {
            view.size = size;
        }
    }

    pub fn set_visibility(&mut self, id: TopicId, visible: bool) {
        if let Some(view) = self.topics.get_mut(&id) {
            view.visible = visible;
        }
        self.refresh_line_visibility();
    }

    pub fn connect(&mut self, child: TopicId, parent: TopicId) {
        if let Some(view) = self.topics.get_mut(&child) {
            view.parent = Some(parent);
        }
    }

    pub fn disconnect(&mut self, child: TopicId) {
        if let Some(view) = self.topics.get_mut(&child) {
            view.parent = None;
        }
    }

    pub fn topic(&self, id: TopicId) -> Option<&TopicView> {
        self.topics.get(&id)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    // ─── Relationship lines ──────────────────────────────────────────────

    pub fn create_line(&mut self, id: RelationshipId, from: TopicId, to: TopicId) {
        let visible = self.topic_visible(from) && self.topic_visible(to);
        self.lines.insert(
            id,
            LineView {
                id,
                from,
                to,
                visible,
            },
        );
    }

    pub fn remove_line(&mut self, id: RelationshipId) {
        self.lines.remove(&id);
    }

    pub fn line(&self, id: RelationshipId) -> Option<&LineView> {
        self.lines.get(&id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Re-derive every line's visibility from its endpoints.
    pub fn refresh_line_visibility(&mut self) {
        let states: Vec<(RelationshipId, bool)> = self
            .lines
            .values()
            .map(|line| {
                (
                    line.id,
                    self.topics.get(&line.from).is_some_and(|t| t.visible)
                        && self.topics.get(&line.to).is_some_and(|t| t.visible),
                )
            })
            .collect();
        for (id, visible) in states {
            if let Some(line) = self.lines.get_mut(&id) {
                line.visible = visible;
            }
        }
    }

    fn topic_visible(&self, id: TopicId) -> bool {
        self.topics.get(&id).is_some_and(|t| t.visible)
    }
}
