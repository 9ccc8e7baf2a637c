pub mod http;

pub use http::HttpStudyApi;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Commentary, Note, NotePayload, NoteQuery, StudyQuestion, Verse};

/// The remote study API, one method per endpoint.
///
/// Implementations perform a single request with no retry; callers decide
/// whether a failure degrades to an empty value or is shown to the user.
#[async_trait]
pub trait StudyApi: Send + Sync {
    async fn books(&self) -> Result<Vec<String>>;

    async fn chapters(&self, book: &str) -> Result<Vec<u32>>;

    async fn verse_numbers(&self, book: &str, chapter: u32) -> Result<Vec<u32>>;

    async fn verses(&self, book: &str, chapter: u32, verse: Option<u32>) -> Result<Vec<Verse>>;

    async fn commentary(&self, book: &str, chapter: u32) -> Result<Commentary>;

    async fn ask(&self, question: &StudyQuestion) -> Result<String>;

    async fn notes(&self, query: &NoteQuery) -> Result<Vec<Note>>;

    async fn create_note(&self, payload: &NotePayload) -> Result<Note>;

    async fn update_note(&self, id: i64, payload: &NotePayload) -> Result<Note>;
}
