use std::sync::Arc;

use ratatui::widgets::ListState;
use study_core::notes::{jump_target, save_note};
use study_core::{Assistant, Config, Fetch, Navigator, Note, NotesDrawer, StudyApi};
use tokio::sync::mpsc;
use tracing::debug;

use crate::tui::{ApiEvent, AppEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Scripture,
    Commentary,
    Assistant,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Scripture => FocusPane::Commentary,
            FocusPane::Commentary => FocusPane::Assistant,
            FocusPane::Assistant => FocusPane::Scripture,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerKind {
    Book,
    Chapter,
    Verse,
}

/// Which part of the notes drawer receives keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotesFocus {
    List,
    Search,
    Title,
    Content,
    Tags,
    Reference,
}

impl NotesFocus {
    pub fn next(self) -> Self {
        match self {
            NotesFocus::List => NotesFocus::Search,
            NotesFocus::Search => NotesFocus::Title,
            NotesFocus::Title => NotesFocus::Content,
            NotesFocus::Content => NotesFocus::Tags,
            NotesFocus::Tags => NotesFocus::Reference,
            NotesFocus::Reference => NotesFocus::List,
        }
    }

    pub fn is_text(self) -> bool {
        self != NotesFocus::List
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Study state
    pub navigator: Navigator,
    pub assistant: Assistant,
    pub notes: NotesDrawer,

    // AI input
    pub ai_cursor: usize, // cursor position in assistant.input

    // Selector popup
    pub picker: Option<PickerKind>,
    pub picker_state: ListState,

    // Notes drawer
    pub notes_open: bool,
    pub notes_focus: NotesFocus,
    pub notes_state: ListState,
    pub note_cursor: usize, // cursor position in the focused note field

    // Scrolling
    pub scripture_scroll: u16,
    pub scripture_height: u16,
    pub commentary_scroll: u16,
    pub chat_scroll: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    api: Arc<dyn StudyApi>,
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(api: Arc<dyn StudyApi>, tx: mpsc::UnboundedSender<AppEvent>, config: &Config) -> Self {
        let navigator = Navigator::new(&config.default_book, config.default_chapter);
        let notes = NotesDrawer::new(&navigator.label(), config.notes_limit);

        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            focus: FocusPane::Scripture,

            navigator,
            assistant: Assistant::new(),
            notes,

            ai_cursor: 0,

            picker: None,
            picker_state: ListState::default(),

            notes_open: false,
            notes_focus: NotesFocus::List,
            notes_state: ListState::default(),
            note_cursor: 0,

            scripture_scroll: 0,
            scripture_height: 0,
            commentary_scroll: 0,
            chat_scroll: 0,

            animation_frame: 0,

            api,
            tx,
        }
    }

    /// Kick off the initial option and content fetches.
    pub fn start(&mut self) {
        let fetches = self.navigator.start();
        self.dispatch(fetches);
    }

    fn dispatch(&self, fetches: Vec<Fetch>) {
        for fetch in fetches {
            let api = self.api.clone();
            let tx = self.tx.clone();
            tokio::spawn(async move {
                let loaded = fetch.run(api.as_ref()).await;
                let _ = tx.send(AppEvent::Api(ApiEvent::Loaded(loaded)));
            });
        }
    }

    /// Fold a finished API task into state.
    pub fn on_api(&mut self, event: ApiEvent) {
        match event {
            ApiEvent::Loaded(loaded) => {
                let fetches = self.navigator.apply(loaded);
                self.dispatch(fetches);
                self.after_navigation();
            }
            ApiEvent::Answer(result) => {
                self.assistant.resolve(result);
                self.chat_scroll = u16::MAX;
            }
            ApiEvent::Notes(result) => {
                self.notes.apply_notes(result);
                self.clamp_notes_selection();
            }
            ApiEvent::Saved(result) => {
                if self.notes.finish_save(result) {
                    self.note_cursor = 0;
                    self.refresh_notes();
                }
            }
        }
    }

    /// Keep the notes drawer in step with the current label.
    fn after_navigation(&mut self) {
        let label = self.navigator.label();
        if self.notes.set_label(&label) && self.notes_open {
            self.refresh_notes();
        }
    }

    // Navigation actions
    pub fn select_book(&mut self, book: &str) {
        let fetches = self.navigator.select_book(book);
        self.dispatch(fetches);
        self.scripture_scroll = 0;
        self.commentary_scroll = 0;
        self.after_navigation();
    }

    pub fn select_chapter(&mut self, chapter: u32) {
        let fetches = self.navigator.select_chapter(chapter);
        self.dispatch(fetches);
        self.scripture_scroll = 0;
        self.commentary_scroll = 0;
        self.after_navigation();
    }

    pub fn select_verse(&mut self, verse: Option<u32>) {
        let fetches = self.navigator.select_verse(verse);
        self.dispatch(fetches);
        self.scripture_scroll = 0;
        self.after_navigation();
    }

    /// Move the verse highlight by `delta` rows within the loaded verses.
    pub fn move_highlight(&mut self, delta: i32) {
        let verses = self.navigator.verses();
        if verses.is_empty() {
            return;
        }
        let current = self
            .navigator
            .highlighted()
            .and_then(|n| verses.iter().position(|v| v.number == n));
        let idx = match current {
            Some(i) => (i as i32 + delta).clamp(0, verses.len() as i32 - 1) as usize,
            None => 0,
        };
        let number = verses[idx].number;
        self.navigator.highlight(Some(number));
        self.after_navigation();
    }

    pub fn clear_highlight(&mut self) {
        self.navigator.highlight(None);
        self.after_navigation();
    }

    pub fn highlighted_index(&self) -> Option<usize> {
        let n = self.navigator.highlighted()?;
        self.navigator.verses().iter().position(|v| v.number == n)
    }

    // Selector popup
    pub fn open_picker(&mut self, kind: PickerKind) {
        let reference = self.navigator.reference();
        let options = self.navigator.options();
        let selected = match kind {
            PickerKind::Book => options.books.iter().position(|b| *b == reference.book),
            PickerKind::Chapter => reference
                .chapter
                .and_then(|c| options.chapters.iter().position(|x| *x == c)),
            // Row 0 is "All"
            PickerKind::Verse => Some(
                self.navigator
                    .verse_filter()
                    .and_then(|v| options.verses.iter().position(|x| *x == v))
                    .map_or(0, |i| i + 1),
            ),
        };
        if self.picker_items_for(kind).is_empty() {
            debug!(?kind, "no options to pick from");
            return;
        }
        self.picker_state.select(Some(selected.unwrap_or(0)));
        self.picker = Some(kind);
    }

    pub fn picker_items(&self) -> Vec<String> {
        self.picker.map(|kind| self.picker_items_for(kind)).unwrap_or_default()
    }

    fn picker_items_for(&self, kind: PickerKind) -> Vec<String> {
        let options = self.navigator.options();
        match kind {
            PickerKind::Book => options.books.clone(),
            PickerKind::Chapter => options.chapters.iter().map(|c| c.to_string()).collect(),
            PickerKind::Verse => std::iter::once("All".to_string())
                .chain(options.verses.iter().map(|v| v.to_string()))
                .collect(),
        }
    }

    pub fn picker_nav_down(&mut self) {
        let len = self.picker_items().len();
        if len > 0 {
            let i = self.picker_state.selected().unwrap_or(0);
            self.picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn picker_nav_up(&mut self) {
        let i = self.picker_state.selected().unwrap_or(0);
        self.picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn picker_confirm(&mut self) {
        let Some(kind) = self.picker.take() else {
            return;
        };
        let Some(i) = self.picker_state.selected() else {
            return;
        };
        let options = self.navigator.options();
        match kind {
            PickerKind::Book => {
                if let Some(book) = options.books.get(i).cloned() {
                    self.select_book(&book);
                }
            }
            PickerKind::Chapter => {
                if let Some(chapter) = options.chapters.get(i).copied() {
                    self.select_chapter(chapter);
                }
            }
            PickerKind::Verse => {
                let verse = if i == 0 { None } else { options.verses.get(i - 1).copied() };
                self.select_verse(verse);
            }
        }
    }

    // AI assistant
    pub fn ask(&mut self) {
        let Some(question) = self.assistant.submit(self.navigator.reference()) else {
            return;
        };
        self.ai_cursor = 0;
        self.chat_scroll = u16::MAX;

        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.ask(&question).await;
            let _ = tx.send(AppEvent::Api(ApiEvent::Answer(result)));
        });
    }

    // Notes drawer
    pub fn open_notes(&mut self) {
        self.notes_open = true;
        self.notes_focus = NotesFocus::List;
        self.refresh_notes();
    }

    pub fn close_notes(&mut self) {
        self.notes_open = false;
    }

    pub fn refresh_notes(&mut self) {
        let query = self.notes.query();
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = api.notes(&query).await;
            let _ = tx.send(AppEvent::Api(ApiEvent::Notes(result)));
        });
    }

    pub fn save_note(&mut self) {
        let Some((id, payload)) = self.notes.begin_save() else {
            return;
        };
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = save_note(api.as_ref(), id, &payload).await;
            let _ = tx.send(AppEvent::Api(ApiEvent::Saved(result)));
        });
    }

    pub fn toggle_notes_scope(&mut self) {
        if self.notes.toggle_scope() {
            self.refresh_notes();
        }
    }

    pub fn edit_selected_note(&mut self) {
        if let Some(note) = self.selected_note().cloned() {
            self.notes.edit(&note);
            self.focus_note_field(NotesFocus::Title);
        }
    }

    pub fn new_note(&mut self) {
        self.notes.start_new();
        self.focus_note_field(NotesFocus::Title);
    }

    /// Navigate to the selected note's passage and close the drawer.
    pub fn jump_to_selected_note(&mut self) {
        let Some(target) = self.selected_note().and_then(jump_target) else {
            return;
        };
        let fetches = self.navigator.jump_to(&target);
        self.dispatch(fetches);
        self.scripture_scroll = 0;
        self.commentary_scroll = 0;
        self.notes_open = false;
        self.after_navigation();
    }

    pub fn selected_note(&self) -> Option<&Note> {
        self.notes_state.selected().and_then(|i| self.notes.notes().get(i))
    }

    pub fn notes_nav_down(&mut self) {
        let len = self.notes.notes().len();
        if len > 0 {
            let i = self.notes_state.selected().unwrap_or(0);
            self.notes_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn notes_nav_up(&mut self) {
        let i = self.notes_state.selected().unwrap_or(0);
        self.notes_state.select(Some(i.saturating_sub(1)));
    }

    fn clamp_notes_selection(&mut self) {
        let len = self.notes.notes().len();
        match self.notes_state.selected() {
            _ if len == 0 => self.notes_state.select(None),
            Some(i) if i >= len => self.notes_state.select(Some(len - 1)),
            None => self.notes_state.select(Some(0)),
            _ => {}
        }
    }

    pub fn focus_note_field(&mut self, focus: NotesFocus) {
        self.notes_focus = focus;
        self.note_cursor = self.note_field(focus).map_or(0, |s| s.chars().count());
    }

    pub fn note_field(&self, focus: NotesFocus) -> Option<&String> {
        match focus {
            NotesFocus::List => None,
            NotesFocus::Search => Some(&self.notes.search),
            NotesFocus::Title => Some(&self.notes.draft.title),
            NotesFocus::Content => Some(&self.notes.draft.content),
            NotesFocus::Tags => Some(&self.notes.draft.tags),
            NotesFocus::Reference => Some(&self.notes.draft.reference),
        }
    }

    pub fn note_field_mut(&mut self, focus: NotesFocus) -> Option<&mut String> {
        match focus {
            NotesFocus::List => None,
            NotesFocus::Search => Some(&mut self.notes.search),
            NotesFocus::Title => Some(&mut self.notes.draft.title),
            NotesFocus::Content => Some(&mut self.notes.draft.content),
            NotesFocus::Tags => Some(&mut self.notes.draft.tags),
            NotesFocus::Reference => Some(&mut self.notes.draft.reference),
        }
    }

    // Scrolling
    pub fn scroll_commentary(&mut self, delta: i32) {
        self.commentary_scroll = (self.commentary_scroll as i32 + delta).max(0) as u16;
    }

    /// `chat_scroll` is clamped to the transcript length during render.
    pub fn scroll_chat(&mut self, delta: i32) {
        self.chat_scroll = (self.chat_scroll as i32 + delta).clamp(0, u16::MAX as i32) as u16;
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.assistant.is_pending() || self.notes.is_loading() || self.notes.is_saving() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use study_core::testing::FakeStudyApi;
    use study_core::Reference;

    fn fake() -> Arc<FakeStudyApi> {
        let api = FakeStudyApi::new();
        api.add_chapter("Genesis", 1, &["In the beginning", "And the earth", "And God said"]);
        api.add_chapter("Genesis", 2, &["Thus the heavens"]);
        api.add_chapter("John", 3, &["There was a man", "The same came", "Jesus answered"]);
        Arc::new(api)
    }

    fn app(api: Arc<FakeStudyApi>) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(api, tx, &Config::default()), rx)
    }

    /// Apply API results until the app goes quiet.
    async fn settle(app: &mut App, rx: &mut mpsc::UnboundedReceiver<AppEvent>) {
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            if let AppEvent::Api(api_event) = event {
                app.on_api(api_event);
            }
        }
    }

    #[tokio::test]
    async fn test_startup_loads_default_passage() {
        let api = fake();
        let (mut app, mut rx) = app(api.clone());
        app.start();
        settle(&mut app, &mut rx).await;

        assert_eq!(app.navigator.label(), "John 3");
        assert_eq!(app.navigator.verses().len(), 3);
        assert_eq!(app.navigator.options().books, vec!["Genesis", "John"]);
        assert_eq!(app.navigator.commentary().sections[0].content, "Clarke on John 3");
    }

    #[tokio::test]
    async fn test_verse_picker_all_row_clears_filter() {
        let (mut app, mut rx) = app(fake());
        app.start();
        settle(&mut app, &mut rx).await;

        app.open_picker(PickerKind::Verse);
        assert_eq!(app.picker_items()[0], "All");
        app.picker_state.select(Some(2));
        app.picker_confirm();
        settle(&mut app, &mut rx).await;
        assert_eq!(app.navigator.label(), "John 3:2");
        assert_eq!(app.navigator.verses().len(), 1);

        app.open_picker(PickerKind::Verse);
        assert_eq!(app.picker_state.selected(), Some(2));
        app.picker_state.select(Some(0));
        app.picker_confirm();
        settle(&mut app, &mut rx).await;
        assert_eq!(app.navigator.label(), "John 3");
        assert_eq!(app.navigator.verses().len(), 3);
    }

    #[tokio::test]
    async fn test_highlight_moves_within_verses() {
        let (mut app, mut rx) = app(fake());
        app.start();
        settle(&mut app, &mut rx).await;

        app.move_highlight(1);
        assert_eq!(app.navigator.highlighted(), Some(1));
        app.move_highlight(5);
        assert_eq!(app.navigator.highlighted(), Some(3));
        assert_eq!(app.notes.draft.reference, "John 3:3");
        app.move_highlight(-1);
        assert_eq!(app.navigator.highlighted(), Some(2));
    }

    #[tokio::test]
    async fn test_ask_round_trip() {
        let api = fake();
        let (mut app, mut rx) = app(api.clone());
        app.start();
        settle(&mut app, &mut rx).await;

        app.assistant.input = "Who was Nicodemus?".to_string();
        app.ask();
        assert!(app.assistant.is_pending());
        settle(&mut app, &mut rx).await;

        assert_eq!(app.assistant.messages().len(), 2);
        assert_eq!(app.assistant.messages()[1].text, "An answer about John");
        assert_eq!(api.questions()[0].chapter, 3);
    }

    #[tokio::test]
    async fn test_book_change_moves_to_listed_chapter() {
        let (mut app, mut rx) = app(fake());
        app.start();
        settle(&mut app, &mut rx).await;

        app.select_book("Genesis");
        settle(&mut app, &mut rx).await;

        assert_eq!(app.navigator.reference(), &Reference::new("Genesis", 1));
        assert_eq!(app.navigator.verses()[0].text, "In the beginning");
        assert_eq!(app.notes.draft.reference, "Genesis 1");
    }

    #[tokio::test]
    async fn test_save_note_then_jump_to_it() {
        let api = fake();
        let (mut app, mut rx) = app(api.clone());
        app.start();
        settle(&mut app, &mut rx).await;

        app.open_notes();
        settle(&mut app, &mut rx).await;
        app.notes.draft.title = "Creation".to_string();
        app.notes.draft.content = "Day one".to_string();
        app.notes.draft.reference = "Genesis 2:1".to_string();
        app.save_note();
        settle(&mut app, &mut rx).await;

        assert_eq!(app.notes.notes().len(), 1);
        assert_eq!(app.notes_state.selected(), Some(0));
        assert_eq!(app.notes.draft.reference, "John 3");

        app.jump_to_selected_note();
        settle(&mut app, &mut rx).await;
        assert!(!app.notes_open);
        assert_eq!(app.navigator.label(), "Genesis 2:1");
        assert_eq!(app.navigator.verses().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_ask_shows_error() {
        let api = fake();
        let (mut app, mut rx) = app(api.clone());
        app.start();
        settle(&mut app, &mut rx).await;

        api.set_answer(Err("AI service unavailable"));
        app.assistant.input = "What does this mean?".to_string();
        app.ask();
        settle(&mut app, &mut rx).await;

        assert_eq!(app.assistant.error(), Some("AI service unavailable"));
        assert_eq!(app.assistant.messages().len(), 1);
        assert!(app.assistant.input.is_empty());
    }
}
