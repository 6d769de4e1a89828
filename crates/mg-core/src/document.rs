//! Serde-facing document records.
//!
//! The on-disk shape is a nested tree: each topic record carries its
//! children, so containment needs no separate edge list. Free
//! (disconnected) branches are stored next to the root, relationships
//! after all topics. The records are format-agnostic; callers pick the
//! serde backend.

use crate::error::CoreError;
use crate::id::{RelationshipId, TopicId};
use crate::model::{
    Decorations, LineType, Mindmap, Point, RelationshipModel, Size, TopicKind, TopicModel,
    TopicStyle,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub id: TopicId,
    pub kind: TopicKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    pub position: Point,
    pub size: Size,
    #[serde(default)]
    pub order: u32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub shrunken: bool,
    #[serde(default, skip_serializing_if = "TopicStyle::is_default")]
    pub style: TopicStyle,
    #[serde(default, skip_serializing_if = "Decorations::is_empty")]
    pub decorations: Decorations,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TopicRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub id: RelationshipId,
    pub from: TopicId,
    pub to: TopicId,
    #[serde(default)]
    pub line_type: LineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ctrl_point: Option<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest_ctrl_point: Option<Point>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub start_arrow: bool,
    #[serde(default = "default_true")]
    pub end_arrow: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub root: TopicRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub free_branches: Vec<TopicRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<RelationshipRecord>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_true() -> bool {
    true
}

impl TopicStyle {
    fn is_default(&self) -> bool {
        *self == TopicStyle::default()
    }
}

impl Decorations {
    fn is_empty(&self) -> bool {
        self.link.is_none() && self.note.is_none() && self.icons.is_empty()
    }
}

impl Document {
    pub fn from_mindmap(map: &Mindmap) -> Self {
        let root = record_subtree(map, map.root());
        let mut free_branches: Vec<TopicId> = map
            .topic_ids()
            .filter(|id| !id.is_root() && map.parent_of(*id).is_none())
            .collect();
        free_branches.sort();
        Self {
            root,
            free_branches: free_branches
                .into_iter()
                .map(|id| record_subtree(map, id))
                .collect(),
            relationships: map.relationships().iter().map(record_relationship).collect(),
        }
    }

    /// Rebuild a model from records. Topics are inserted parents-first so
    /// every connect sees a live parent; relationships go last so both
    /// endpoints exist.
    pub fn into_mindmap(self) -> Result<Mindmap, CoreError> {
        if !self.root.id.is_root() {
            return Err(CoreError::invalid(format!(
                "document root must be topic {}, found {}",
                TopicId::ROOT,
                self.root.id
            )));
        }
        if self.root.kind != TopicKind::Central {
            return Err(CoreError::invalid("document root must be a central topic"));
        }

        let mut map = Mindmap::new();
        {
            let root = map
                .get_mut(TopicId::ROOT)
                .ok_or_else(|| CoreError::topic_not_found(TopicId::ROOT))?;
            *root = topic_from_record(&self.root);
        }
        for child in &self.root.children {
            insert_subtree(&mut map, child, Some(TopicId::ROOT))?;
        }
        for branch in &self.free_branches {
            insert_subtree(&mut map, branch, None)?;
        }
        for record in &self.relationships {
            map.add_relationship(relationship_from_record(record))?;
        }
        Ok(map)
    }
}

fn record_subtree(map: &Mindmap, id: TopicId) -> TopicRecord {
    let model = map.get(id).expect("subtree ids come from the map itself");
    TopicRecord {
        id: model.id,
        kind: model.kind,
        text: model.text.clone(),
        position: model.position,
        size: model.size,
        order: model.order,
        shrunken: model.shrunken,
        style: model.style.clone(),
        decorations: model.decorations.clone(),
        children: map
            .children_of(id)
            .into_iter()
            .map(|child| record_subtree(map, child))
            .collect(),
    }
}

fn record_relationship(model: &RelationshipModel) -> RelationshipRecord {
    RelationshipRecord {
        id: model.id,
        from: model.from,
        to: model.to,
        line_type: model.line_type,
        src_ctrl_point: model.src_ctrl_point,
        dest_ctrl_point: model.dest_ctrl_point,
        start_arrow: model.start_arrow,
        end_arrow: model.end_arrow,
    }
}

fn topic_from_record(record: &TopicRecord) -> TopicModel {
    TopicModel {
        id: record.id,
        kind: record.kind,
        text: record.text.clone(),
        position: record.position,
        size: record.size,
        order: record.order,
        shrunken: record.shrunken,
        style: record.style.clone(),
        decorations: record.decorations.clone(),
    }
}

fn relationship_from_record(record: &RelationshipRecord) -> RelationshipModel {
    RelationshipModel {
        id: record.id,
        from: record.from,
        to: record.to,
        line_type: record.line_type,
        src_ctrl_point: record.src_ctrl_point,
        dest_ctrl_point: record.dest_ctrl_point,
        start_arrow: record.start_arrow,
        end_arrow: record.end_arrow,
    }
}

fn insert_subtree(
    map: &mut Mindmap,
    record: &TopicRecord,
    parent: Option<TopicId>,
) -> Result<(), CoreError> {
    if record.id.is_root() {
        return Err(CoreError::invalid(
            "the central topic can only appear as the document root",
        ));
    }
    map.insert(topic_from_record(record))?;
    if let Some(parent) = parent {
        map.connect(record.id, parent)?;
    }
    for child in &record.children {
        insert_subtree(map, child, Some(record.id))?;
    }
    Ok(())
}
