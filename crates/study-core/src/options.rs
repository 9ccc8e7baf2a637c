//! Option lists for the book/chapter/verse selectors and the rules that keep
//! a selection inside them.

/// The valid choices for each selector, as last fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    pub books: Vec<String>,
    pub chapters: Vec<u32>,
    pub verses: Vec<u32>,
}

/// Book to use after `books` was refetched, or `None` to keep the current one.
///
/// An empty list says nothing about validity, so it never forces a change.
pub fn reconcile_book(current: &str, books: &[String]) -> Option<String> {
    match books.first() {
        Some(first) if !books.iter().any(|b| b == current) => Some(first.clone()),
        _ => None,
    }
}

/// Chapter to use after `chapters` was refetched.
///
/// Keeps the current chapter when it is listed, otherwise the first listed
/// chapter, or unset when the list is empty.
pub fn reconcile_chapter(current: Option<u32>, chapters: &[u32]) -> Option<u32> {
    match current {
        Some(c) if chapters.contains(&c) => Some(c),
        _ => chapters.first().copied(),
    }
}

/// Verse to use after `verses` was refetched. An unlisted verse is cleared.
pub fn reconcile_verse(current: Option<u32>, verses: &[u32]) -> Option<u32> {
    current.filter(|v| verses.contains(v))
}
