//! Notes drawer: list filtered by scope and search, plus the note being edited.

use tracing::{debug, warn};

use crate::api::StudyApi;
use crate::error::{ApiError, Result};
use crate::model::{Note, NotePayload, NoteQuery};
use crate::reference::Reference;

const REQUIRED_MESSAGE: &str = "Title and content are required.";

/// Which notes the list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteScope {
    #[default]
    All,
    /// Only notes attached to the current passage label.
    Passage,
}

impl NoteScope {
    pub fn toggle(self) -> Self {
        match self {
            NoteScope::All => NoteScope::Passage,
            NoteScope::Passage => NoteScope::All,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            NoteScope::All => "All notes",
            NoteScope::Passage => "This passage",
        }
    }
}

/// The note in the editor. `id` is `None` until the note has been saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub id: Option<i64>,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub reference: String,
}

impl NoteDraft {
    /// A fresh note pinned to `label`.
    pub fn pinned_to(label: &str) -> Self {
        Self {
            reference: label.to_string(),
            ..Self::default()
        }
    }

    pub fn from_note(note: &Note) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            content: note.content.clone(),
            tags: note.tags.clone().unwrap_or_default(),
            reference: note.reference.clone().unwrap_or_default(),
        }
    }

    /// Build the request body, rejecting a blank title or content.
    pub fn payload(&self) -> Result<NotePayload> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(ApiError::Validation(REQUIRED_MESSAGE.to_string()));
        }
        Ok(NotePayload {
            title: self.title.clone(),
            content: self.content.clone(),
            tags: or_none(&self.tags),
            reference: or_none(&self.reference),
        })
    }
}

/// Empty fields are sent as null; anything else goes out as typed.
fn or_none(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[derive(Debug)]
pub struct NotesDrawer {
    pub search: String,
    pub draft: NoteDraft,
    notes: Vec<Note>,
    scope: NoteScope,
    label: String,
    limit: u32,
    loading: bool,
    saving: bool,
    error: Option<String>,
}

impl NotesDrawer {
    pub fn new(label: &str, limit: u32) -> Self {
        Self {
            search: String::new(),
            draft: NoteDraft::pinned_to(label),
            notes: Vec::new(),
            scope: NoteScope::All,
            label: label.to_string(),
            limit,
            loading: false,
            saving: false,
            error: None,
        }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn scope(&self) -> NoteScope {
        self.scope
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Track the current passage label.
    ///
    /// An unsaved draft follows the label; a note loaded for editing keeps
    /// its own reference. Returns true when the label changed, which means
    /// an open drawer should reload its list.
    pub fn set_label(&mut self, label: &str) -> bool {
        if self.label == label {
            return false;
        }
        self.label = label.to_string();
        if self.draft.id.is_none() {
            self.draft.reference = self.label.clone();
        }
        if self.scope == NoteScope::Passage && self.label.is_empty() {
            self.scope = NoteScope::All;
        }
        true
    }

    /// Switch scope. `Passage` is refused while there is no label.
    pub fn set_scope(&mut self, scope: NoteScope) -> bool {
        if scope == NoteScope::Passage && self.label.is_empty() {
            return false;
        }
        self.scope = scope;
        true
    }

    pub fn toggle_scope(&mut self) -> bool {
        self.set_scope(self.scope.toggle())
    }

    /// The list query for the current scope and search.
    pub fn query(&mut self) -> NoteQuery {
        self.loading = true;
        let reference = match self.scope {
            NoteScope::Passage => non_empty(&self.label),
            NoteScope::All => None,
        };
        NoteQuery {
            search: non_empty(&self.search),
            reference,
            tag: None,
            limit: Some(self.limit),
        }
    }

    /// Apply a list result. On failure the previous list stays.
    pub fn apply_notes(&mut self, result: Result<Vec<Note>>) {
        self.loading = false;
        match result {
            Ok(notes) => {
                debug!(count = notes.len(), "notes loaded");
                self.notes = notes;
                self.error = None;
            }
            Err(e) => {
                warn!(error = %e, "failed to load notes");
                self.error = Some(e.to_string());
            }
        }
    }

    pub fn is_pinned(&self) -> bool {
        !self.label.is_empty() && self.draft.reference == self.label
    }

    /// Attach the draft to the current passage, or detach it if already attached.
    pub fn toggle_pin(&mut self) {
        if self.label.is_empty() {
            return;
        }
        if self.is_pinned() {
            self.draft.reference.clear();
        } else {
            self.draft.reference = self.label.clone();
        }
    }

    pub fn edit(&mut self, note: &Note) {
        self.draft = NoteDraft::from_note(note);
        self.error = None;
    }

    pub fn start_new(&mut self) {
        self.draft = NoteDraft::pinned_to(&self.label);
        self.error = None;
    }

    /// Validate the draft and mark a save as in flight.
    ///
    /// Returns the note id (for an update) and the body. A blank title or
    /// content sets the inline error and issues nothing.
    pub fn begin_save(&mut self) -> Option<(Option<i64>, NotePayload)> {
        if self.saving {
            return None;
        }
        match self.draft.payload() {
            Ok(payload) => {
                self.saving = true;
                self.error = None;
                Some((self.draft.id, payload))
            }
            Err(e) => {
                self.error = Some(e.to_string());
                None
            }
        }
    }

    /// Record a save result. Returns true when the list should be reloaded.
    ///
    /// Success resets the editor to a new note pinned to the current label;
    /// failure keeps the draft so nothing typed is lost.
    pub fn finish_save(&mut self, result: Result<Note>) -> bool {
        self.saving = false;
        match result {
            Ok(note) => {
                debug!(id = ?note.id, "note saved");
                self.draft = NoteDraft::pinned_to(&self.label);
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to save note");
                self.error = Some(e.to_string());
                false
            }
        }
    }

    /// Reload the list.
    pub async fn refresh(&mut self, api: &dyn StudyApi) {
        let query = self.query();
        let result = api.notes(&query).await;
        self.apply_notes(result);
    }

    /// Save the draft and reload the list on success.
    pub async fn save(&mut self, api: &dyn StudyApi) {
        let Some((id, payload)) = self.begin_save() else {
            return;
        };
        let result = save_note(api, id, &payload).await;
        if self.finish_save(result) {
            self.refresh(api).await;
        }
    }
}

/// Create or update depending on whether the note has an id.
pub async fn save_note(api: &dyn StudyApi, id: Option<i64>, payload: &NotePayload) -> Result<Note> {
    match id {
        Some(id) => api.update_note(id, payload).await,
        None => api.create_note(payload).await,
    }
}

/// The passage a note is attached to, if its reference can be navigated to.
pub fn jump_target(note: &Note) -> Option<Reference> {
    note.reference.as_deref().and_then(Reference::parse)
}
