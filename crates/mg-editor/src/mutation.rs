//! Reversible mutations against the model and the view registry.
//!
//! A `Mutation` is the payload of one history entry: the dispatcher
//! computes its inverse from the current model state before applying it,
//! so undo is a plain forward application of the captured inverse.
//!
//! Validate-then-apply: every arm checks its preconditions against the
//! model before touching anything, so a rejected mutation leaves model
//! and views exactly as they were. Application returns the structural
//! events to publish; the caller emits them once its own borrows are
//! released.

use crate::error::EditorError;
use crate::view::ViewRegistry;
use mg_core::model::{Mindmap, Point, RelationshipModel, ShapeType, Size, TopicModel};
use mg_core::{CoreError, RelationshipId, StructuralEvent, TopicId};

#[derive(Debug, Clone)]
pub enum Mutation {
    /// Insert one freshly created topic, optionally connecting it.
    AddTopic {
        parent: Option<TopicId>,
        model: Box<TopicModel>,
    },
    /// Remove topics leaf-first (every child precedes its parent) plus
    /// the relationships cascaded by the removal.
    DeleteTopics {
        topic_ids: Vec<TopicId>,
        relationship_ids: Vec<RelationshipId>,
    },
    /// Inverse of `DeleteTopics`: re-insert parents-first, then restore
    /// the cascaded relationships.
    RestoreTopics {
        topics: Vec<(Option<TopicId>, TopicModel)>,
        relationships: Vec<RelationshipModel>,
    },
    Connect {
        child: TopicId,
        parent: TopicId,
        order: u32,
    },
    /// Detach a topic. `restore_order` is set only on the inverse of a
    /// `Connect`, undoing the order that connect wrote.
    Disconnect {
        child: TopicId,
        restore_order: Option<u32>,
    },
    AddRelationship {
        model: Box<RelationshipModel>,
    },
    RemoveRelationship {
        id: RelationshipId,
    },
    SetText {
        targets: Vec<(TopicId, String)>,
    },
    SetFontFamily {
        targets: Vec<(TopicId, Option<String>)>,
    },
    SetFontSize {
        targets: Vec<(TopicId, Option<f32>)>,
    },
    SetFontColor {
        targets: Vec<(TopicId, Option<String>)>,
    },
    SetBold {
        targets: Vec<(TopicId, bool)>,
    },
    SetItalic {
        targets: Vec<(TopicId, bool)>,
    },
    SetShape {
        targets: Vec<(TopicId, Option<ShapeType>)>,
    },
    SetBackgroundColor {
        targets: Vec<(TopicId, Option<String>)>,
    },
    SetBorderColor {
        targets: Vec<(TopicId, Option<String>)>,
    },
    ResizeTopic {
        targets: Vec<(TopicId, Size)>,
    },
    /// Manual drag. Durable for free topics; the layout engine treats it
    /// as an override that the next pass over the branch recomputes.
    MoveTopic {
        targets: Vec<(TopicId, Point)>,
    },
    SetLink {
        id: TopicId,
        value: Option<String>,
    },
    SetNote {
        id: TopicId,
        value: Option<String>,
    },
    AddIcon {
        id: TopicId,
        icon: String,
    },
    RemoveIcon {
        id: TopicId,
        icon: String,
    },
}

impl Mutation {
    /// Short label for history inspection and logging.
    pub fn describe(&self) -> &'static str {
        match self {
            Mutation::AddTopic { .. } => "add topic",
            Mutation::DeleteTopics { .. } => "delete topics",
            Mutation::RestoreTopics { .. } => "restore topics",
            Mutation::Connect { .. } => "connect topic",
            Mutation::Disconnect { .. } => "disconnect topic",
            Mutation::AddRelationship { .. } => "add relationship",
            Mutation::RemoveRelationship { .. } => "remove relationship",
            Mutation::SetText { .. } => "change text",
            Mutation::SetFontFamily { .. } => "change font family",
            Mutation::SetFontSize { .. } => "change font size",
            Mutation::SetFontColor { .. } => "change font color",
            Mutation::SetBold { .. } => "change font weight",
            Mutation::SetItalic { .. } => "change font style",
            Mutation::SetShape { .. } => "change shape",
            Mutation::SetBackgroundColor { .. } => "change background color",
            Mutation::SetBorderColor { .. } => "change border color",
            Mutation::ResizeTopic { .. } => "resize topic",
            Mutation::MoveTopic { .. } => "move topic",
            Mutation::SetLink { .. } => "change link",
            Mutation::SetNote { .. } => "change note",
            Mutation::AddIcon { .. } => "add icon",
            Mutation::RemoveIcon { .. } => "remove icon",
        }
    }
}

/// Capture the inverse of `mutation` against the current model state.
/// Must run before `apply_mutation`.
pub fn compute_inverse(model: &Mindmap, mutation: &Mutation) -> Result<Mutation, EditorError> {
    let inverse = match mutation {
        Mutation::AddTopic { model: topic, .. } => Mutation::DeleteTopics {
            topic_ids: vec![topic.id],
            relationship_ids: Vec::new(),
        },
        Mutation::DeleteTopics {
            topic_ids,
            relationship_ids,
        } => {
            // Leaf-first forward order reversed gives parents-first.
            let mut topics = Vec::with_capacity(topic_ids.len());
            for id in topic_ids.iter().rev() {
                let topic = model.expect(*id)?.clone();
                topics.push((model.parent_of(*id), topic));
            }
            let mut relationships = Vec::with_capacity(relationship_ids.len());
            for id in relationship_ids {
                let rel = model
                    .relationship(*id)
                    .ok_or_else(|| CoreError::relationship_not_found(*id))?;
                relationships.push(rel.clone());
            }
            Mutation::RestoreTopics {
                topics,
                relationships,
            }
        }
        Mutation::RestoreTopics {
            topics,
            relationships,
        } => Mutation::DeleteTopics {
            topic_ids: topics.iter().rev().map(|(_, t)| t.id).collect(),
            relationship_ids: relationships.iter().map(|r| r.id).collect(),
        },
        Mutation::Connect { child, .. } => Mutation::Disconnect {
            child: *child,
            restore_order: Some(model.expect(*child)?.order),
        },
        Mutation::Disconnect { child, .. } => {
            let parent = model.parent_of(*child).ok_or_else(|| {
                CoreError::invalid(format!("topic {child} is not connected"))
            })?;
            Mutation::Connect {
                child: *child,
                parent,
                order: model.expect(*child)?.order,
            }
        }
        Mutation::AddRelationship { model: rel } => {
            Mutation::RemoveRelationship { id: rel.id }
        }
        Mutation::RemoveRelationship { id } => {
            let rel = model
                .relationship(*id)
                .ok_or_else(|| CoreError::relationship_not_found(*id))?;
            Mutation::AddRelationship {
                model: Box::new(rel.clone()),
            }
        }
        Mutation::SetText { targets } => Mutation::SetText {
            targets: capture(model, targets, |t| t.text.clone())?,
        },
        Mutation::SetFontFamily { targets } => Mutation::SetFontFamily {
            targets: capture(model, targets, |t| t.style.font_family.clone())?,
        },
        Mutation::SetFontSize { targets } => Mutation::SetFontSize {
            targets: capture(model, targets, |t| t.style.font_size)?,
        },
        Mutation::SetFontColor { targets } => Mutation::SetFontColor {
            targets: capture(model, targets, |t| t.style.font_color.clone())?,
        },
        Mutation::SetBold { targets } => Mutation::SetBold {
            targets: capture(model, targets, |t| t.style.bold)?,
        },
        Mutation::SetItalic { targets } => Mutation::SetItalic {
            targets: capture(model, targets, |t| t.style.italic)?,
        },
        Mutation::SetShape { targets } => Mutation::SetShape {
            targets: capture(model, targets, |t| t.style.shape)?,
        },
        Mutation::SetBackgroundColor { targets } => Mutation::SetBackgroundColor {
            targets: capture(model, targets, |t| t.style.background_color.clone())?,
        },
        Mutation::SetBorderColor { targets } => Mutation::SetBorderColor {
            targets: capture(model, targets, |t| t.style.border_color.clone())?,
        },
        Mutation::ResizeTopic { targets } => Mutation::ResizeTopic {
            targets: capture(model, targets, |t| t.size)?,
        },
        Mutation::MoveTopic { targets } => Mutation::MoveTopic {
            targets: capture(model, targets, |t| t.position)?,
        },
        Mutation::SetLink { id, .. } => Mutation::SetLink {
            id: *id,
            value: model.expect(*id)?.decorations.link.clone(),
        },
        Mutation::SetNote { id, .. } => Mutation::SetNote {
            id: *id,
            value: model.expect(*id)?.decorations.note.clone(),
        },
        Mutation::AddIcon { id, icon } => Mutation::RemoveIcon {
            id: *id,
            icon: icon.clone(),
        },
        Mutation::RemoveIcon { id, icon } => Mutation::AddIcon {
            id: *id,
            icon: icon.clone(),
        },
    };
    Ok(inverse)
}

fn capture<T: Clone>(
    model: &Mindmap,
    targets: &[(TopicId, T)],
    read: impl Fn(&TopicModel) -> T,
) -> Result<Vec<(TopicId, T)>, EditorError> {
    targets
        .iter()
        .map(|(id, _)| Ok((*id, read(model.expect(*id)?))))
        .collect()
}

/// Apply `mutation` to the model and the view registry, returning the
/// structural events the caller must publish.
pub fn apply_mutation(
    model: &mut Mindmap,
    views: &mut ViewRegistry,
    mutation: &Mutation,
) -> Result<Vec<StructuralEvent>, EditorError> {
    let mut events = Vec::new();
    match mutation {
        Mutation::AddTopic {
            parent,
            model: topic,
        } => {
            if let Some(parent) = parent {
                model.expect(*parent)?;
            }
            model.insert((**topic).clone())?;
            views.create_topic(topic.id, topic.position, topic.size);
            events.push(StructuralEvent::NodeAdded {
                id: topic.id,
                size: topic.size,
                position: topic.position,
            });
            if let Some(parent) = parent {
                model.connect(topic.id, *parent)?;
                views.connect(topic.id, *parent);
                views.set_visibility(topic.id, model.is_visible(topic.id));
                events.push(StructuralEvent::NodeConnected {
                    parent: *parent,
                    child: topic.id,
                    order: topic.order,
                });
            }
        }
        Mutation::DeleteTopics {
            topic_ids,
            relationship_ids,
        } => {
            for id in topic_ids {
                if id.is_root() {
                    return Err(CoreError::invalid(
                        "the central topic can not be deleted",
                    )
                    .into());
                }
                model.expect(*id)?;
                // Leaf-first: every child must be scheduled too.
                for child in model.children_of(*id) {
                    if !topic_ids.contains(&child) {
                        return Err(CoreError::invalid(format!(
                            "topic {id} can not be deleted while child {child} survives"
                        ))
                        .into());
                    }
                }
            }
            for id in relationship_ids {
                model
                    .relationship(*id)
                    .ok_or_else(|| CoreError::relationship_not_found(*id))?;
            }

            for id in relationship_ids {
                model.remove_relationship(*id)?;
                views.remove_line(*id);
            }
            for id in topic_ids {
                model.delete_node(*id)?;
                views.remove_topic(*id);
                events.push(StructuralEvent::NodeRemoved { id: *id });
            }
        }
        Mutation::RestoreTopics {
            topics,
            relationships,
        } => {
            for (_, topic) in topics {
                if model.contains(topic.id) {
                    return Err(CoreError::invalid(format!(
                        "topic {} already exists",
                        topic.id
                    ))
                    .into());
                }
            }
            for (parent, topic) in topics {
                model.insert(topic.clone())?;
                views.create_topic(topic.id, topic.position, topic.size);
                events.push(StructuralEvent::NodeAdded {
                    id: topic.id,
                    size: topic.size,
                    position: topic.position,
                });
                if let Some(parent) = parent {
                    model.connect(topic.id, *parent)?;
                    views.connect(topic.id, *parent);
                    events.push(StructuralEvent::NodeConnected {
                        parent: *parent,
                        child: topic.id,
                        order: topic.order,
                    });
                }
                views.set_visibility(topic.id, model.is_visible(topic.id));
            }
            for rel in relationships {
                model.add_relationship(rel.clone())?;
                views.create_line(rel.id, rel.from, rel.to);
            }
        }
        Mutation::Connect {
            child,
            parent,
            order,
        } => {
            model.connect(*child, *parent)?;
            if let Some(topic) = model.get_mut(*child) {
                topic.order = *order;
            }
            views.connect(*child, *parent);
            views.set_visibility(*child, model.is_visible(*child));
            events.push(StructuralEvent::NodeConnected {
                parent: *parent,
                child: *child,
                order: *order,
            });
        }
        Mutation::Disconnect {
            child,
            restore_order,
        } => {
            model.disconnect(*child)?;
            if let (Some(order), Some(topic)) = (restore_order, model.get_mut(*child)) {
                topic.order = *order;
            }
            views.disconnect(*child);
            views.set_visibility(*child, true);
            events.push(StructuralEvent::NodeDisconnected { id: *child });
        }
        Mutation::AddRelationship { model: rel } => {
            model.add_relationship((**rel).clone())?;
            views.create_line(rel.id, rel.from, rel.to);
        }
        Mutation::RemoveRelationship { id } => {
            model.remove_relationship(*id)?;
            views.remove_line(*id);
        }
        Mutation::SetText { targets } => {
            apply_each(model, targets, |t, v| t.text = v.clone())?;
        }
        Mutation::SetFontFamily { targets } => {
            apply_each(model, targets, |t, v| t.style.font_family = v.clone())?;
        }
        Mutation::SetFontSize { targets } => {
            apply_each(model, targets, |t, v| t.style.font_size = *v)?;
        }
        Mutation::SetFontColor { targets } => {
            apply_each(model, targets, |t, v| t.style.font_color = v.clone())?;
        }
        Mutation::SetBold { targets } => {
            apply_each(model, targets, |t, v| t.style.bold = *v)?;
        }
        Mutation::SetItalic { targets } => {
            apply_each(model, targets, |t, v| t.style.italic = *v)?;
        }
        Mutation::SetShape { targets } => {
            apply_each(model, targets, |t, v| t.style.shape = *v)?;
        }
        Mutation::SetBackgroundColor { targets } => {
            apply_each(model, targets, |t, v| t.style.background_color = v.clone())?;
        }
        Mutation::SetBorderColor { targets } => {
            apply_each(model, targets, |t, v| t.style.border_color = v.clone())?;
        }
        Mutation::ResizeTopic { targets } => {
            apply_each(model, targets, |t, v| t.size = *v)?;
            for (id, size) in targets {
                views.resize(*id, *size);
                events.push(StructuralEvent::NodeResized {
                    id: *id,
                    size: *size,
                });
            }
        }
        Mutation::MoveTopic { targets } => {
            apply_each(model, targets, |t, v| t.position = *v)?;
            for (id, position) in targets {
                views.reposition(*id, *position);
                events.push(StructuralEvent::NodeMoved {
                    id: *id,
                    position: *position,
                });
            }
        }
        Mutation::SetLink { id, value } => {
            model.expect(*id)?;
            if let Some(topic) = model.get_mut(*id) {
                topic.decorations.link = value.clone();
            }
        }
        Mutation::SetNote { id, value } => {
            model.expect(*id)?;
            if let Some(topic) = model.get_mut(*id) {
                topic.decorations.note = value.clone();
            }
        }
        Mutation::AddIcon { id, icon } => {
            model.expect(*id)?;
            if let Some(topic) = model.get_mut(*id)
                && !topic.decorations.icons.contains(icon)
            {
                topic.decorations.icons.push(icon.clone());
            }
        }
        Mutation::RemoveIcon { id, icon } => {
            model.expect(*id)?;
            if let Some(topic) = model.get_mut(*id) {
                topic.decorations.icons.retain(|i| i != icon);
            }
        }
    }
    Ok(events)
}

fn apply_each<T>(
    model: &mut Mindmap,
    targets: &[(TopicId, T)],
    write: impl Fn(&mut TopicModel, &T),
) -> Result<(), EditorError> {
    for (id, _) in targets {
        model.expect(*id)?;
    }
    for (id, value) in targets {
        if let Some(topic) = model.get_mut(*id) {
            write(topic, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mg_core::model::TopicKind;
    use pretty_assertions::assert_eq;

    fn map_with_child() -> (Mindmap, ViewRegistry, TopicId) {
        let mut model = Mindmap::new();
        let mut views = ViewRegistry::new();
        views.create_topic(TopicId::ROOT, Point::default(), model.expect(TopicId::ROOT).unwrap().size);

        let child = model.create_child_model(TopicId::ROOT).unwrap();
        let id = child.id;
        apply_mutation(
            &mut model,
            &mut views,
            &Mutation::AddTopic {
                parent: Some(TopicId::ROOT),
                model: Box::new(child),
            },
        )
        .unwrap();
        (model, views, id)
    }

    #[test]
    fn add_then_inverse_delete_round_trips() {
        let (mut model, mut views, id) = map_with_child();
        let forward = Mutation::DeleteTopics {
            topic_ids: vec![id],
            relationship_ids: Vec::new(),
        };
        let inverse = compute_inverse(&model, &forward).unwrap();
        let before = model.expect(id).unwrap().clone();

        apply_mutation(&mut model, &mut views, &forward).unwrap();
        assert!(!model.contains(id));
        assert!(views.topic(id).is_none());

        apply_mutation(&mut model, &mut views, &inverse).unwrap();
        assert_eq!(model.expect(id).unwrap(), &before);
        assert_eq!(model.parent_of(id), Some(TopicId::ROOT));
        assert!(views.topic(id).is_some());
    }

    #[test]
    fn delete_requires_children_in_the_same_batch() {
        let (mut model, mut views, parent_id) = map_with_child();
        let grandchild = model.create_child_model(parent_id).unwrap();
        let grandchild_id = grandchild.id;
        apply_mutation(
            &mut model,
            &mut views,
            &Mutation::AddTopic {
                parent: Some(parent_id),
                model: Box::new(grandchild),
            },
        )
        .unwrap();

        let err = apply_mutation(
            &mut model,
            &mut views,
            &Mutation::DeleteTopics {
                topic_ids: vec![parent_id],
                relationship_ids: Vec::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EditorError::Core(CoreError::InvalidOperation(_))
        ));
        // Nothing was applied.
        assert!(model.contains(parent_id));
        assert!(model.contains(grandchild_id));
    }

    #[test]
    fn multi_target_inverse_captures_every_prior_value() {
        let (mut model, mut views, a) = map_with_child();
        let sibling = model.create_child_model(TopicId::ROOT).unwrap();
        let b = sibling.id;
        apply_mutation(
            &mut model,
            &mut views,
            &Mutation::AddTopic {
                parent: Some(TopicId::ROOT),
                model: Box::new(sibling),
            },
        )
        .unwrap();
        model.get_mut(a).unwrap().style.font_color = Some("blue".into());

        let forward = Mutation::SetFontColor {
            targets: vec![(a, Some("red".into())), (b, Some("red".into()))],
        };
        let inverse = compute_inverse(&model, &forward).unwrap();
        apply_mutation(&mut model, &mut views, &forward).unwrap();
        assert_eq!(
            model.expect(a).unwrap().style.font_color.as_deref(),
            Some("red")
        );

        apply_mutation(&mut model, &mut views, &inverse).unwrap();
        assert_eq!(
            model.expect(a).unwrap().style.font_color.as_deref(),
            Some("blue")
        );
        assert_eq!(model.expect(b).unwrap().style.font_color, None);
    }

    #[test]
    fn cycle_forming_connect_is_rejected_without_side_effects() {
        let (mut model, mut views, parent_id) = map_with_child();
        let child = model.create_child_model(parent_id).unwrap();
        let child_id = child.id;
        apply_mutation(
            &mut model,
            &mut views,
            &Mutation::AddTopic {
                parent: Some(parent_id),
                model: Box::new(child),
            },
        )
        .unwrap();

        apply_mutation(
            &mut model,
            &mut views,
            &Mutation::Disconnect {
                child: parent_id,
                restore_order: None,
            },
        )
        .unwrap();
        let err = apply_mutation(
            &mut model,
            &mut views,
            &Mutation::Connect {
                child: parent_id,
                parent: child_id,
                order: 0,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EditorError::Core(CoreError::InvalidOperation(_))
        ));
        assert_eq!(model.parent_of(parent_id), None);
        assert_eq!(model.parent_of(child_id), Some(parent_id));
    }

    #[test]
    fn icons_do_not_duplicate() {
        let (mut model, mut views, id) = map_with_child();
        for _ in 0..2 {
            apply_mutation(
                &mut model,
                &mut views,
                &Mutation::AddIcon {
                    id,
                    icon: "flag".into(),
                },
            )
            .unwrap();
        }
        assert_eq!(model.expect(id).unwrap().decorations.icons.len(), 1);
    }

    #[test]
    fn create_node_seeds_are_structural_only() {
        let mut model = Mindmap::new();
        let node = model.create_node(TopicKind::Generic);
        assert_eq!(node.style, Default::default());
        assert_eq!(node.decorations, Default::default());
    }
}
