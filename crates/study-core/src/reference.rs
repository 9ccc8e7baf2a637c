//! The passage currently under study.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// (book, chapter, verse) triple for the passage being studied.
///
/// Setters never validate: only the option lists fetched from the API know
/// which books and chapters exist, so `Navigator` checks membership after
/// every refetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub book: String,
    pub chapter: Option<u32>,
    pub verse: Option<u32>,
}

impl Reference {
    pub fn new(book: &str, chapter: u32) -> Self {
        Self {
            book: book.to_string(),
            chapter: Some(chapter),
            verse: None,
        }
    }

    pub fn with_verse(mut self, verse: u32) -> Self {
        self.verse = Some(verse);
        self
    }

    pub fn set_book(&mut self, book: &str) {
        self.book = book.to_string();
    }

    pub fn set_chapter(&mut self, chapter: Option<u32>) {
        self.chapter = chapter;
    }

    pub fn set_verse(&mut self, verse: Option<u32>) {
        self.verse = verse;
    }

    /// Book and chapter are both known, so content can be fetched.
    pub fn is_resolved(&self) -> bool {
        !self.book.is_empty() && self.chapter.is_some()
    }

    /// "John 3" / "John 3:16", or empty while book or chapter is unset.
    pub fn label(&self) -> String {
        match (self.book.is_empty(), self.chapter) {
            (false, Some(chapter)) => match self.verse {
                Some(verse) => format!("{} {}:{}", self.book, chapter, verse),
                None => format!("{} {}", self.book, chapter),
            },
            _ => String::new(),
        }
    }

    /// Parse a label produced by [`Reference::label`].
    ///
    /// Book names may contain digits and spaces ("1 John", "Song of Solomon").
    pub fn parse(label: &str) -> Option<Self> {
        static LABEL_RE: OnceLock<Regex> = OnceLock::new();
        let re = LABEL_RE.get_or_init(|| {
            Regex::new(r"^\s*(?P<book>(?:[1-3]\s+)?[A-Za-z][A-Za-z .']*?)\s+(?P<chapter>\d+)(?::(?P<verse>\d+))?\s*$")
                .expect("reference pattern is valid")
        });

        let caps = re.captures(label)?;
        let book = caps.name("book")?.as_str().trim().to_string();
        let chapter = caps.name("chapter")?.as_str().parse().ok()?;
        let verse = match caps.name("verse") {
            Some(v) => Some(v.as_str().parse().ok()?),
            None => None,
        };

        Some(Self {
            book,
            chapter: Some(chapter),
            verse,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_with_and_without_verse() {
        assert_eq!(Reference::new("John", 3).label(), "John 3");
        assert_eq!(Reference::new("John", 3).with_verse(16).label(), "John 3:16");
    }

    #[test]
    fn test_label_empty_when_unresolved() {
        let mut r = Reference::new("John", 3);
        r.set_chapter(None);
        assert_eq!(r.label(), "");
        assert!(!r.is_resolved());

        let r = Reference::new("", 3);
        assert_eq!(r.label(), "");
    }

    #[test]
    fn test_parse_simple() {
        let r = Reference::parse("John 3:16").unwrap();
        assert_eq!(r, Reference::new("John", 3).with_verse(16));
    }

    #[test]
    fn test_parse_numbered_book() {
        let r = Reference::parse("1 John 2:3").unwrap();
        assert_eq!(r.book, "1 John");
        assert_eq!(r.chapter, Some(2));
        assert_eq!(r.verse, Some(3));
    }

    #[test]
    fn test_parse_multi_word_book_without_verse() {
        let r = Reference::parse("Song of Solomon 1").unwrap();
        assert_eq!(r.book, "Song of Solomon");
        assert_eq!(r.chapter, Some(1));
        assert_eq!(r.verse, None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Reference::parse("").is_none());
        assert!(Reference::parse("John").is_none());
        assert!(Reference::parse("3:16").is_none());
    }

    #[test]
    fn test_label_round_trips_through_parse() {
        let r = Reference::new("2 Corinthians", 5).with_verse(17);
        assert_eq!(Reference::parse(&r.label()), Some(r));
    }
}
