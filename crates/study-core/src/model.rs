//! Wire and display types for the study API.

use serde::{Deserialize, Serialize};

/// One verse row from `GET /verses/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verse {
    #[serde(rename = "verse")]
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentarySection {
    pub content: String,
}

/// How directly the commentary targets the selected passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Moderate,
    #[default]
    None,
}

impl Confidence {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Confidence::High),
            "moderate" => Some(Confidence::Moderate),
            "none" => Some(Confidence::None),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Confidence::High => "Chapter focus",
            Confidence::Moderate => "Semantic fallback",
            Confidence::None => "Limited data",
        }
    }
}

/// Commentary for a chapter plus its confidence classification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Commentary {
    pub sections: Vec<CommentarySection>,
    pub confidence: Confidence,
}

impl Commentary {
    /// Classify a raw `GET /commentary/` body.
    ///
    /// A bare list is chapter-keyed commentary and therefore `High`. The
    /// wrapped form carries its own `confidence`; anything missing or
    /// unrecognized is `None`.
    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(items) => Self {
                sections: sections_from(items),
                confidence: Confidence::High,
            },
            serde_json::Value::Object(mut map) => {
                let sections = match map.remove("commentary") {
                    Some(serde_json::Value::Array(items)) => sections_from(items),
                    _ => Vec::new(),
                };
                let confidence = map
                    .get("confidence")
                    .and_then(|c| c.as_str())
                    .and_then(Confidence::from_str)
                    .unwrap_or_default();
                Self { sections, confidence }
            }
            _ => Self::default(),
        }
    }
}

fn sections_from(items: Vec<serde_json::Value>) -> Vec<CommentarySection> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

/// A persisted study note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: Option<i64>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(rename = "verse_ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Body for `POST /notes/` and `PUT /notes/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotePayload {
    pub title: String,
    pub content: String,
    pub tags: Option<String>,
    #[serde(rename = "verse_ref")]
    pub reference: Option<String>,
}

/// Query for `GET /notes/`. Empty fields are left off the query string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NoteQuery {
    pub search: Option<String>,
    pub reference: Option<String>,
    pub tag: Option<String>,
    pub limit: Option<u32>,
}

impl NoteQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            params.push(("search", search.to_string()));
        }
        if let Some(reference) = self.reference.as_deref().filter(|s| !s.is_empty()) {
            params.push(("verse_ref", reference.to_string()));
        }
        if let Some(tag) = self.tag.as_deref().filter(|s| !s.is_empty()) {
            params.push(("tag", tag.to_string()));
        }
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            params.push(("limit", limit.to_string()));
        }
        params
    }
}

/// Body for `POST /ai/study`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyQuestion {
    pub book: String,
    pub chapter: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verse: Option<u32>,
    pub question: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudyAnswer {
    pub answer: String,
}
