pub mod bridge;
pub mod commands;
pub mod controller;
pub mod error;
pub mod mutation;
pub mod view;

pub use bridge::LayoutBridge;
pub use commands::{ActionDispatcher, DEFAULT_HISTORY_DEPTH};
pub use controller::{
    Controller, DiagramElement, Direction, SaveData, SaveProperties, MAX_ZOOM, MIN_ZOOM,
};
pub use error::EditorError;
pub use mutation::Mutation;
pub use view::{LineView, TopicView, ViewRegistry};
