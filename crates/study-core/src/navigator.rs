//! Book/chapter/verse navigation shared by every panel.
//!
//! `Navigator` owns the reference state, the fetched option lists and the
//! content for the current passage. It never performs I/O itself: every
//! mutation returns the [`Fetch`]es that the change makes necessary, and the
//! caller feeds each result back through [`Navigator::apply`]. Results are
//! applied in arrival order with no cancellation, so a slow response for a
//! superseded selection can still land after a newer one.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::api::StudyApi;
use crate::model::{Commentary, Verse};
use crate::options::{reconcile_book, reconcile_chapter, reconcile_verse, OptionSet};
use crate::reference::Reference;

/// A request the navigator needs answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch {
    Books,
    Chapters { book: String },
    VerseNumbers { book: String, chapter: u32 },
    Verses { book: String, chapter: u32, verse: Option<u32> },
    Commentary { book: String, chapter: u32 },
}

/// The answer to a [`Fetch`], keyed by what it was fetched for.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
    Books(Vec<String>),
    Chapters { book: String, chapters: Vec<u32> },
    VerseNumbers { book: String, chapter: u32, verses: Vec<u32> },
    Verses { book: String, chapter: u32, verse: Option<u32>, rows: Vec<Verse> },
    Commentary { book: String, chapter: u32, commentary: Commentary },
}

impl Fetch {
    /// Perform the request. Failures degrade to an empty result.
    pub async fn run(self, api: &dyn StudyApi) -> Loaded {
        match self {
            Fetch::Books => Loaded::Books(api.books().await.unwrap_or_else(|e| {
                warn!(error = %e, "books fetch failed");
                Vec::new()
            })),
            Fetch::Chapters { book } => {
                let chapters = api.chapters(&book).await.unwrap_or_else(|e| {
                    warn!(%book, error = %e, "chapters fetch failed");
                    Vec::new()
                });
                Loaded::Chapters { book, chapters }
            }
            Fetch::VerseNumbers { book, chapter } => {
                let verses = api.verse_numbers(&book, chapter).await.unwrap_or_else(|e| {
                    warn!(%book, chapter, error = %e, "verse numbers fetch failed");
                    Vec::new()
                });
                Loaded::VerseNumbers { book, chapter, verses }
            }
            Fetch::Verses { book, chapter, verse } => {
                let rows = api.verses(&book, chapter, verse).await.unwrap_or_else(|e| {
                    warn!(%book, chapter, ?verse, error = %e, "verses fetch failed");
                    Vec::new()
                });
                Loaded::Verses { book, chapter, verse, rows }
            }
            Fetch::Commentary { book, chapter } => {
                let commentary = api.commentary(&book, chapter).await.unwrap_or_else(|e| {
                    warn!(%book, chapter, error = %e, "commentary fetch failed");
                    Commentary::default()
                });
                Loaded::Commentary { book, chapter, commentary }
            }
        }
    }
}

/// The inputs that content and option fetches are keyed on.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Keys {
    book: String,
    chapter: Option<u32>,
    filter: Option<u32>,
}

pub struct Navigator {
    /// `verse` is the highlighted verse, which is what questions and notes refer to.
    reference: Reference,
    /// Narrows the scripture panel to one verse. Set together with the highlight
    /// from the verse selector, but a row can be highlighted without filtering.
    verse_filter: Option<u32>,
    options: OptionSet,
    verses: Vec<Verse>,
    commentary: Commentary,
    loading_verses: bool,
    loading_commentary: bool,
}

impl Navigator {
    pub fn new(book: &str, chapter: u32) -> Self {
        Self {
            reference: Reference::new(book, chapter),
            verse_filter: None,
            options: OptionSet::default(),
            verses: Vec::new(),
            commentary: Commentary::default(),
            loading_verses: false,
            loading_commentary: false,
        }
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn label(&self) -> String {
        self.reference.label()
    }

    pub fn verse_filter(&self) -> Option<u32> {
        self.verse_filter
    }

    pub fn highlighted(&self) -> Option<u32> {
        self.reference.verse
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn verses(&self) -> &[Verse] {
        &self.verses
    }

    pub fn commentary(&self) -> &Commentary {
        &self.commentary
    }

    pub fn is_loading_verses(&self) -> bool {
        self.loading_verses
    }

    pub fn is_loading_commentary(&self) -> bool {
        self.loading_commentary
    }

    /// Initial fetches: the book list plus everything keyed on the default reference.
    pub fn start(&mut self) -> Vec<Fetch> {
        let mut fetches = vec![Fetch::Books];
        fetches.extend(self.follow_ups(None));
        self.issue(fetches)
    }

    /// User picked a book. The old chapter is kept until the new chapter list
    /// says otherwise; the verse selection never survives a book change.
    pub fn select_book(&mut self, book: &str) -> Vec<Fetch> {
        self.transition(|r, filter| {
            r.set_book(book);
            r.set_verse(None);
            *filter = None;
        })
    }

    pub fn select_chapter(&mut self, chapter: u32) -> Vec<Fetch> {
        self.transition(|r, filter| {
            r.set_chapter(Some(chapter));
            r.set_verse(None);
            *filter = None;
        })
    }

    /// Verse selector: `None` is "All". Filters the panel and highlights the verse.
    pub fn select_verse(&mut self, verse: Option<u32>) -> Vec<Fetch> {
        self.transition(|r, filter| {
            r.set_verse(verse);
            *filter = verse;
        })
    }

    /// Highlight a verse row without changing the filter.
    pub fn highlight(&mut self, verse: Option<u32>) {
        self.reference.set_verse(verse);
    }

    /// Move to an arbitrary reference, e.g. the one a note is pinned to.
    pub fn jump_to(&mut self, target: &Reference) -> Vec<Fetch> {
        self.transition(|r, filter| {
            r.set_book(&target.book);
            r.set_chapter(target.chapter);
            r.set_verse(target.verse);
            *filter = None;
        })
    }

    /// Fold a fetch result into state and reconcile the selection against it.
    pub fn apply(&mut self, loaded: Loaded) -> Vec<Fetch> {
        match loaded {
            Loaded::Books(books) => {
                self.options.books = books;
                match reconcile_book(&self.reference.book, &self.options.books) {
                    Some(book) => {
                        debug!(from = %self.reference.book, to = %book, "book not listed, resetting");
                        self.transition(|r, filter| {
                            r.set_book(&book);
                            r.set_verse(None);
                            *filter = None;
                        })
                    }
                    None => Vec::new(),
                }
            }
            Loaded::Chapters { book, chapters } => {
                if book != self.reference.book {
                    debug!(%book, current = %self.reference.book, "applying chapters for superseded book");
                }
                self.options.chapters = chapters;
                let chapter = reconcile_chapter(self.reference.chapter, &self.options.chapters);
                if chapter == self.reference.chapter {
                    return Vec::new();
                }
                debug!(from = ?self.reference.chapter, to = ?chapter, "chapter not listed, resetting");
                self.transition(|r, filter| {
                    r.set_chapter(chapter);
                    r.set_verse(None);
                    *filter = None;
                })
            }
            Loaded::VerseNumbers { book, chapter, verses } => {
                if !self.is_current(&book, chapter) {
                    debug!(%book, chapter, "applying verse numbers for superseded chapter");
                }
                self.options.verses = verses;
                let highlight = reconcile_verse(self.reference.verse, &self.options.verses);
                let filter = reconcile_verse(self.verse_filter, &self.options.verses);
                if highlight != self.reference.verse || filter != self.verse_filter {
                    debug!(?highlight, ?filter, "verse not listed, clearing");
                }
                self.transition(|r, f| {
                    r.set_verse(highlight);
                    *f = filter;
                })
            }
            Loaded::Verses { book, chapter, verse, rows } => {
                if !self.is_current(&book, chapter) || verse != self.verse_filter {
                    debug!(%book, chapter, ?verse, "applying verses for superseded selection");
                }
                self.verses = rows;
                self.loading_verses = false;
                Vec::new()
            }
            Loaded::Commentary { book, chapter, commentary } => {
                if !self.is_current(&book, chapter) {
                    debug!(%book, chapter, "applying commentary for superseded chapter");
                }
                self.commentary = commentary;
                self.loading_commentary = false;
                Vec::new()
            }
        }
    }

    /// Run `pending` and every follow-up fetch to completion, one at a time.
    pub async fn settle(&mut self, api: &dyn StudyApi, pending: Vec<Fetch>) {
        let mut queue: VecDeque<Fetch> = pending.into();
        while let Some(fetch) = queue.pop_front() {
            let loaded = fetch.run(api).await;
            queue.extend(self.apply(loaded));
        }
    }

    fn is_current(&self, book: &str, chapter: u32) -> bool {
        self.reference.book == book && self.reference.chapter == Some(chapter)
    }

    fn keys(&self) -> Keys {
        Keys {
            book: self.reference.book.clone(),
            chapter: self.reference.chapter,
            filter: self.verse_filter,
        }
    }

    fn transition(&mut self, change: impl FnOnce(&mut Reference, &mut Option<u32>)) -> Vec<Fetch> {
        let before = self.keys();
        change(&mut self.reference, &mut self.verse_filter);
        let fetches = self.follow_ups(Some(&before));
        self.issue(fetches)
    }

    /// Fetches keyed on inputs that differ from `before` (all of them when `None`).
    fn follow_ups(&mut self, before: Option<&Keys>) -> Vec<Fetch> {
        let after = self.keys();
        let book_changed = before.map_or(true, |b| b.book != after.book);
        let chapter_changed = book_changed || before.map_or(true, |b| b.chapter != after.chapter);
        let filter_changed = chapter_changed || before.map_or(true, |b| b.filter != after.filter);

        let mut fetches = Vec::new();
        if after.book.is_empty() {
            return fetches;
        }
        if book_changed {
            fetches.push(Fetch::Chapters { book: after.book.clone() });
        }

        let Some(chapter) = after.chapter else {
            if chapter_changed {
                self.options.verses.clear();
                self.verses.clear();
                self.commentary = Commentary::default();
            }
            return fetches;
        };

        if chapter_changed {
            fetches.push(Fetch::VerseNumbers { book: after.book.clone(), chapter });
            fetches.push(Fetch::Commentary { book: after.book.clone(), chapter });
        }
        if filter_changed {
            fetches.push(Fetch::Verses {
                book: after.book.clone(),
                chapter,
                verse: after.filter,
            });
        }
        fetches
    }

    fn issue(&mut self, fetches: Vec<Fetch>) -> Vec<Fetch> {
        for fetch in &fetches {
            match fetch {
                Fetch::Verses { .. } => self.loading_verses = true,
                Fetch::Commentary { .. } => self.loading_commentary = true,
                _ => {}
            }
            debug!(?fetch, "issuing fetch");
        }
        fetches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommentarySection, Confidence};
    use crate::testing::FakeStudyApi;

    fn api() -> FakeStudyApi {
        let api = FakeStudyApi::new();
        api.add_chapter(
            "Genesis",
            1,
            &[
                "In the beginning God created the heaven and the earth.",
                "And the earth was without form, and void;",
                "And God said, Let there be light: and there was light.",
            ],
        );
        api.add_chapter("Genesis", 2, &["Thus the heavens and the earth were finished,"]);
        api.add_chapter("Obadiah", 1, &["The vision of Obadiah.", "Behold, I have made thee small"]);
        api.add_chapter("John", 3, &["There was a man of the Pharisees, named Nicodemus,"; 16]);
        api
    }

    #[test]
    fn test_start_requests_books_and_default_passage() {
        let mut nav = Navigator::new("John", 3);
        let fetches = nav.start();
        assert_eq!(
            fetches,
            vec![
                Fetch::Books,
                Fetch::Chapters { book: "John".into() },
                Fetch::VerseNumbers { book: "John".into(), chapter: 3 },
                Fetch::Commentary { book: "John".into(), chapter: 3 },
                Fetch::Verses { book: "John".into(), chapter: 3, verse: None },
            ]
        );
        assert!(nav.is_loading_verses());
    }

    #[test]
    fn test_select_verse_only_refetches_verses() {
        let mut nav = Navigator::new("John", 3);
        let fetches = nav.select_verse(Some(16));
        assert_eq!(
            fetches,
            vec![Fetch::Verses { book: "John".into(), chapter: 3, verse: Some(16) }]
        );
        assert_eq!(nav.label(), "John 3:16");
    }

    #[test]
    fn test_highlight_does_not_fetch_or_filter() {
        let mut nav = Navigator::new("John", 3);
        nav.highlight(Some(5));
        assert_eq!(nav.verse_filter(), None);
        assert_eq!(nav.label(), "John 3:5");
    }

    #[test]
    fn test_select_book_clears_verse() {
        let mut nav = Navigator::new("John", 3);
        nav.select_verse(Some(16));
        let fetches = nav.select_book("Genesis");
        assert_eq!(nav.reference().verse, None);
        assert_eq!(nav.verse_filter(), None);
        assert_eq!(fetches[0], Fetch::Chapters { book: "Genesis".into() });
    }

    #[test]
    fn test_chapter_resets_to_first_when_not_listed() {
        let mut nav = Navigator::new("Obadiah", 3);
        let fetches = nav.apply(Loaded::Chapters { book: "Obadiah".into(), chapters: vec![1] });
        assert_eq!(nav.reference().chapter, Some(1));
        assert!(fetches.contains(&Fetch::VerseNumbers { book: "Obadiah".into(), chapter: 1 }));
        assert!(fetches.contains(&Fetch::Verses { book: "Obadiah".into(), chapter: 1, verse: None }));
    }

    #[test]
    fn test_chapter_unset_when_list_empty() {
        let mut nav = Navigator::new("Nowhere", 3);
        nav.apply(Loaded::Verses {
            book: "Nowhere".into(),
            chapter: 3,
            verse: None,
            rows: vec![Verse { number: 1, text: "stale".into() }],
        });
        let fetches = nav.apply(Loaded::Chapters { book: "Nowhere".into(), chapters: vec![] });
        assert_eq!(nav.reference().chapter, None);
        assert_eq!(nav.label(), "");
        assert!(fetches.is_empty());
        assert!(nav.verses().is_empty());
    }

    #[test]
    fn test_listed_chapter_is_kept_without_fetches() {
        let mut nav = Navigator::new("John", 3);
        let fetches = nav.apply(Loaded::Chapters { book: "John".into(), chapters: (1..=21).collect() });
        assert!(fetches.is_empty());
        assert_eq!(nav.reference().chapter, Some(3));
    }

    #[test]
    fn test_unlisted_verse_clears_filter_and_highlight() {
        let mut nav = Navigator::new("John", 3);
        nav.select_verse(Some(40));
        let fetches = nav.apply(Loaded::VerseNumbers {
            book: "John".into(),
            chapter: 3,
            verses: (1..=36).collect(),
        });
        assert_eq!(nav.highlighted(), None);
        assert_eq!(nav.verse_filter(), None);
        assert_eq!(
            fetches,
            vec![Fetch::Verses { book: "John".into(), chapter: 3, verse: None }]
        );
    }

    #[test]
    fn test_unlisted_highlight_alone_clears_without_fetch() {
        let mut nav = Navigator::new("John", 3);
        nav.highlight(Some(99));
        let fetches = nav.apply(Loaded::VerseNumbers {
            book: "John".into(),
            chapter: 3,
            verses: vec![1, 2, 3],
        });
        assert_eq!(nav.highlighted(), None);
        assert!(fetches.is_empty());
    }

    #[test]
    fn test_books_reset_to_first_when_default_missing() {
        let mut nav = Navigator::new("Jasher", 1);
        let fetches = nav.apply(Loaded::Books(vec!["Genesis".into(), "Exodus".into()]));
        assert_eq!(nav.reference().book, "Genesis");
        assert_eq!(fetches[0], Fetch::Chapters { book: "Genesis".into() });
    }

    #[test]
    fn test_stale_response_still_applies() {
        let mut nav = Navigator::new("John", 3);
        nav.select_chapter(4);
        nav.apply(Loaded::Verses {
            book: "John".into(),
            chapter: 3,
            verse: None,
            rows: vec![Verse { number: 1, text: "old".into() }],
        });
        assert_eq!(nav.verses()[0].text, "old");
    }

    #[tokio::test]
    async fn test_genesis_one_full_then_single_verse() {
        let api = api();
        let mut nav = Navigator::new("John", 3);
        let start = nav.start();
        nav.settle(&api, start).await;
        assert_eq!(nav.verses().len(), 16);

        let fetches = nav.select_book("Genesis");
        nav.settle(&api, fetches).await;
        let fetches = nav.select_chapter(1);
        nav.settle(&api, fetches).await;

        assert_eq!(nav.reference(), &Reference::new("Genesis", 1));
        assert_eq!(nav.options().verses, vec![1, 2, 3]);
        assert_eq!(nav.verses().len(), 3);
        assert!(!nav.is_loading_verses());

        let fetches = nav.select_verse(Some(1));
        nav.settle(&api, fetches).await;
        assert_eq!(nav.verses().len(), 1);
        assert_eq!(nav.verses()[0].number, 1);
        assert_eq!(nav.label(), "Genesis 1:1");
    }

    #[tokio::test]
    async fn test_switching_to_short_book_cascades_chapter_and_verse() {
        let api = api();
        let mut nav = Navigator::new("John", 3);
        let start = nav.start();
        nav.settle(&api, start).await;

        let fetches = nav.select_book("Obadiah");
        nav.settle(&api, fetches).await;

        assert_eq!(nav.reference().chapter, Some(1));
        assert_eq!(nav.options().chapters, vec![1]);
        assert_eq!(nav.options().verses, vec![1, 2]);
        assert_eq!(nav.verses()[0].text, "The vision of Obadiah.");
    }

    #[tokio::test]
    async fn test_failed_fetches_degrade_to_empty() {
        let api = api();
        api.fail_all("connection refused");
        let mut nav = Navigator::new("John", 3);
        let start = nav.start();
        nav.settle(&api, start).await;

        assert!(nav.options().books.is_empty());
        assert_eq!(nav.reference().book, "John");
        assert_eq!(nav.reference().chapter, None);
        assert!(nav.verses().is_empty());
        assert_eq!(nav.commentary().confidence, Confidence::None);
    }

    #[tokio::test]
    async fn test_commentary_recovers_after_outage() {
        let api = api();
        api.set_commentary(
            "Genesis",
            2,
            Commentary {
                sections: vec![CommentarySection { content: "Of the sabbath.".to_string() }],
                confidence: Confidence::Moderate,
            },
        );
        api.fail_all("connection refused");
        let mut nav = Navigator::new("Genesis", 2);
        let start = nav.start();
        nav.settle(&api, start).await;
        assert!(nav.commentary().sections.is_empty());

        api.recover();
        let fetches = nav.select_chapter(2);
        nav.settle(&api, fetches).await;
        assert_eq!(nav.commentary().confidence, Confidence::Moderate);
        assert_eq!(nav.commentary().sections[0].content, "Of the sabbath.");
    }

    #[tokio::test]
    async fn test_jump_to_note_reference() {
        let api = api();
        let mut nav = Navigator::new("John", 3);
        let start = nav.start();
        nav.settle(&api, start).await;

        let target = Reference::parse("Genesis 2:1").unwrap();
        let fetches = nav.jump_to(&target);
        nav.settle(&api, fetches).await;
        assert_eq!(nav.label(), "Genesis 2:1");
        assert_eq!(nav.verses().len(), 1);
    }
}
