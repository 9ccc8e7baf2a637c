//! In-memory [`StudyApi`] for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::StudyApi;
use crate::error::{ApiError, Result};
use crate::model::{Commentary, CommentarySection, Confidence, Note, NotePayload, NoteQuery, StudyQuestion, Verse};

#[derive(Default)]
struct Inner {
    books: Vec<(String, BTreeMap<u32, Vec<String>>)>,
    commentary: BTreeMap<(String, u32), Commentary>,
    answer: Option<std::result::Result<String, String>>,
    failure: Option<String>,
    notes: Vec<Note>,
    next_note_id: i64,
    calls: Vec<String>,
    questions: Vec<StudyQuestion>,
    note_queries: Vec<NoteQuery>,
}

/// Scripture, commentary and notes held in memory.
///
/// Unknown books and chapters answer with empty lists, as the real API does.
/// `fail_all` makes every call fail with a 502 carrying the given message.
#[derive(Default)]
pub struct FakeStudyApi {
    inner: Mutex<Inner>,
}

impl FakeStudyApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chapter(&self, book: &str, chapter: u32, texts: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        let idx = match inner.books.iter().position(|(b, _)| b == book) {
            Some(idx) => idx,
            None => {
                inner.books.push((book.to_string(), BTreeMap::new()));
                inner.books.len() - 1
            }
        };
        inner.books[idx]
            .1
            .insert(chapter, texts.iter().map(|t| t.to_string()).collect());
    }

    pub fn set_commentary(&self, book: &str, chapter: u32, commentary: Commentary) {
        self.inner
            .lock()
            .unwrap()
            .commentary
            .insert((book.to_string(), chapter), commentary);
    }

    /// Answer for `ask`; `Err` becomes an `ApiError::Status` with that message.
    pub fn set_answer(&self, answer: std::result::Result<&str, &str>) {
        self.inner.lock().unwrap().answer = Some(answer.map(str::to_string).map_err(str::to_string));
    }

    pub fn fail_all(&self, message: &str) {
        self.inner.lock().unwrap().failure = Some(message.to_string());
    }

    pub fn recover(&self) {
        self.inner.lock().unwrap().failure = None;
    }

    pub fn insert_note(&self, title: &str, content: &str, reference: Option<&str>) -> Note {
        let mut inner = self.inner.lock().unwrap();
        inner.next_note_id += 1;
        let note = Note {
            id: Some(inner.next_note_id),
            title: title.to_string(),
            content: content.to_string(),
            tags: None,
            reference: reference.map(str::to_string),
            created_at: None,
            updated_at: None,
        };
        inner.notes.push(note.clone());
        note
    }

    pub fn notes_snapshot(&self) -> Vec<Note> {
        self.inner.lock().unwrap().notes.clone()
    }

    /// Endpoint names in call order, e.g. `"books"`, `"create_note"`.
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.inner.lock().unwrap().calls.iter().filter(|c| *c == name).count()
    }

    pub fn questions(&self) -> Vec<StudyQuestion> {
        self.inner.lock().unwrap().questions.clone()
    }

    pub fn note_queries(&self) -> Vec<NoteQuery> {
        self.inner.lock().unwrap().note_queries.clone()
    }

    fn enter(&self, name: &str) -> Result<std::sync::MutexGuard<'_, Inner>> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(name.to_string());
        if let Some(message) = inner.failure.clone() {
            return Err(ApiError::Status { status: 502, message });
        }
        Ok(inner)
    }
}

fn chapter_verses(inner: &Inner, book: &str, chapter: u32) -> Vec<Verse> {
    inner
        .books
        .iter()
        .find(|(b, _)| b == book)
        .and_then(|(_, chapters)| chapters.get(&chapter))
        .map(|texts| {
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| Verse { number: i as u32 + 1, text: text.clone() })
                .collect()
        })
        .unwrap_or_default()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl StudyApi for FakeStudyApi {
    async fn books(&self) -> Result<Vec<String>> {
        let inner = self.enter("books")?;
        Ok(inner.books.iter().map(|(b, _)| b.clone()).collect())
    }

    async fn chapters(&self, book: &str) -> Result<Vec<u32>> {
        let inner = self.enter("chapters")?;
        Ok(inner
            .books
            .iter()
            .find(|(b, _)| b == book)
            .map(|(_, chapters)| chapters.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn verse_numbers(&self, book: &str, chapter: u32) -> Result<Vec<u32>> {
        let inner = self.enter("verse_numbers")?;
        Ok(chapter_verses(&inner, book, chapter).into_iter().map(|v| v.number).collect())
    }

    async fn verses(&self, book: &str, chapter: u32, verse: Option<u32>) -> Result<Vec<Verse>> {
        let inner = self.enter("verses")?;
        Ok(chapter_verses(&inner, book, chapter)
            .into_iter()
            .filter(|v| verse.map_or(true, |n| v.number == n))
            .collect())
    }

    async fn commentary(&self, book: &str, chapter: u32) -> Result<Commentary> {
        let inner = self.enter("commentary")?;
        Ok(inner
            .commentary
            .get(&(book.to_string(), chapter))
            .cloned()
            .unwrap_or_else(|| Commentary {
                sections: vec![CommentarySection {
                    content: format!("Clarke on {} {}", book, chapter),
                }],
                confidence: Confidence::High,
            }))
    }

    async fn ask(&self, question: &StudyQuestion) -> Result<String> {
        let mut inner = self.enter("ask")?;
        inner.questions.push(question.clone());
        match inner.answer.clone() {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(message)) => Err(ApiError::Status { status: 503, message }),
            None => Ok(format!("An answer about {}", question.book)),
        }
    }

    async fn notes(&self, query: &NoteQuery) -> Result<Vec<Note>> {
        let mut inner = self.enter("notes")?;
        inner.note_queries.push(query.clone());
        let limit = query.limit.unwrap_or(50) as usize;
        let mut notes: Vec<Note> = inner
            .notes
            .iter()
            .filter(|n| {
                query.search.as_deref().map_or(true, |s| {
                    contains_ci(&n.title, s) || contains_ci(&n.content, s)
                })
            })
            .filter(|n| {
                query.reference.as_deref().map_or(true, |r| {
                    n.reference.as_deref().is_some_and(|nr| contains_ci(nr, r))
                })
            })
            .filter(|n| {
                query.tag.as_deref().map_or(true, |t| {
                    n.tags.as_deref().is_some_and(|nt| contains_ci(nt, t))
                })
            })
            .cloned()
            .collect();
        notes.reverse();
        notes.truncate(limit);
        Ok(notes)
    }

    async fn create_note(&self, payload: &NotePayload) -> Result<Note> {
        let mut inner = self.enter("create_note")?;
        inner.next_note_id += 1;
        let note = Note {
            id: Some(inner.next_note_id),
            title: payload.title.clone(),
            content: payload.content.clone(),
            tags: payload.tags.clone(),
            reference: payload.reference.clone(),
            created_at: None,
            updated_at: None,
        };
        inner.notes.push(note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: i64, payload: &NotePayload) -> Result<Note> {
        let mut inner = self.enter("update_note")?;
        let Some(note) = inner.notes.iter_mut().find(|n| n.id == Some(id)) else {
            return Err(ApiError::Status {
                status: 404,
                message: r#"{"detail":"Note not found"}"#.to_string(),
            });
        };
        note.title = payload.title.clone();
        note.content = payload.content.clone();
        if payload.tags.is_some() {
            note.tags = payload.tags.clone();
        }
        if payload.reference.is_some() {
            note.reference = payload.reference.clone();
        }
        Ok(note.clone())
    }
}
