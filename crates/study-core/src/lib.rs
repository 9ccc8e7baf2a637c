pub mod api;
pub mod assistant;
pub mod config;
pub mod error;
pub mod model;
pub mod navigator;
pub mod notes;
pub mod options;
pub mod reference;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export main types for convenience
pub use api::{HttpStudyApi, StudyApi};
pub use assistant::{Assistant, ChatMessage, ChatRole};
pub use config::Config;
pub use error::ApiError;
pub use model::{Commentary, CommentarySection, Confidence, Note, NotePayload, NoteQuery, StudyQuestion, Verse};
pub use navigator::{Fetch, Loaded, Navigator};
pub use notes::{NoteDraft, NoteScope, NotesDrawer};
pub use options::OptionSet;
pub use reference::Reference;
