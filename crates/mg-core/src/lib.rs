pub mod document;
pub mod error;
pub mod events;
pub mod id;
pub mod layout;
pub mod model;

pub use document::{Document, RelationshipRecord, TopicRecord};
pub use error::CoreError;
pub use events::{ChangeEvent, EventBus, EventKind, StructuralEvent};
pub use id::{RelationshipId, TopicId};
pub use layout::{LayoutEngine, Side};
pub use model::*;
