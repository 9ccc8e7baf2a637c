//! AI study chat: transcript plus the single outstanding question.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::StudyApi;
use crate::error::ApiError;
use crate::model::StudyQuestion;
use crate::reference::Reference;

const FALLBACK_ERROR: &str = "AI response failed. Try again in a moment.";
const NO_PASSAGE_ERROR: &str = "Select a book and chapter first.";

/// A chat message in the AI conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Default)]
pub struct Assistant {
    /// Question being typed. Cleared on submit, not on success.
    pub input: String,
    messages: Vec<ChatMessage>,
    pending: bool,
    error: Option<String>,
}

impl Assistant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether `submit` would send anything right now.
    pub fn can_submit(&self) -> bool {
        !self.pending && !self.input.trim().is_empty()
    }

    /// Take the typed question and echo it into the transcript.
    ///
    /// Returns the request to send, or `None` when the input is blank or a
    /// question is already in flight; in that case nothing changes. Without a
    /// book and chapter the input is kept and an inline error is set.
    pub fn submit(&mut self, reference: &Reference) -> Option<StudyQuestion> {
        if !self.can_submit() {
            return None;
        }
        let Some(chapter) = reference.chapter.filter(|_| reference.is_resolved()) else {
            self.error = Some(NO_PASSAGE_ERROR.to_string());
            return None;
        };

        let question = self.input.trim().to_string();
        self.input.clear();
        self.pending = true;
        self.error = None;
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            text: question.clone(),
        });

        debug!(reference = %reference, "submitting study question");
        Some(StudyQuestion {
            book: reference.book.clone(),
            chapter,
            verse: reference.verse,
            question,
        })
    }

    /// Record the outcome of the outstanding question.
    ///
    /// A failure only sets the inline error; the transcript keeps the user's
    /// message and gains no assistant entry.
    pub fn resolve(&mut self, result: Result<String, ApiError>) {
        self.pending = false;
        match result {
            Ok(answer) => self.messages.push(ChatMessage {
                role: ChatRole::Assistant,
                text: answer,
            }),
            Err(e) => {
                warn!(error = %e, "study question failed");
                let message = e.to_string();
                self.error = Some(if message.trim().is_empty() {
                    FALLBACK_ERROR.to_string()
                } else {
                    message
                });
            }
        }
    }

    /// Submit and wait for the answer in one step. Returns false for a no-op submit.
    pub async fn ask(&mut self, api: &dyn StudyApi, reference: &Reference) -> bool {
        let Some(question) = self.submit(reference) else {
            return false;
        };
        let result = api.ask(&question).await;
        self.resolve(result);
        true
    }
}
