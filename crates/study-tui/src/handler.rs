use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, FocusPane, InputMode, NotesFocus, PickerKind};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Apply a cursor-editing key to `text`. Returns true if the text changed.
fn edit_text(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    let char_count = text.chars().count();
    *cursor = (*cursor).min(char_count);
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
                return true;
            }
        }
        KeyCode::Delete => {
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
                return true;
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(char_count),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = char_count,
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
            return true;
        }
        _ => {}
    }
    false
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Api(api_event) => app.on_api(api_event),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.picker.is_some() {
        handle_picker(app, key);
    } else if app.notes_open {
        handle_notes(app, key);
    } else {
        match app.input_mode {
            InputMode::Normal => handle_normal_mode(app, key),
            InputMode::Editing => handle_question_editing(app, key),
        }
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab => app.focus = app.focus.next(),

        // Selectors
        KeyCode::Char('b') => app.open_picker(PickerKind::Book),
        KeyCode::Char('c') => app.open_picker(PickerKind::Chapter),
        KeyCode::Char('v') => app.open_picker(PickerKind::Verse),

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Scripture => app.move_highlight(1),
            FocusPane::Commentary => app.scroll_commentary(1),
            FocusPane::Assistant => app.scroll_chat(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Scripture => app.move_highlight(-1),
            FocusPane::Commentary => app.scroll_commentary(-1),
            FocusPane::Assistant => app.scroll_chat(-1),
        },
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => match app.focus {
            FocusPane::Scripture => app.move_highlight(5),
            FocusPane::Commentary => app.scroll_commentary(10),
            FocusPane::Assistant => app.scroll_chat(10),
        },
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => match app.focus {
            FocusPane::Scripture => app.move_highlight(-5),
            FocusPane::Commentary => app.scroll_commentary(-10),
            FocusPane::Assistant => app.scroll_chat(-10),
        },
        KeyCode::Esc => app.clear_highlight(),

        // AI question
        KeyCode::Char('a') | KeyCode::Char('i') => {
            app.focus = FocusPane::Assistant;
            app.input_mode = InputMode::Editing;
            app.ai_cursor = app.assistant.input.chars().count();
        }

        KeyCode::Char('n') => app.open_notes(),

        _ => {}
    }
}

fn handle_question_editing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.ask(),
        _ => {
            edit_text(&mut app.assistant.input, &mut app.ai_cursor, key);
        }
    }
}

fn handle_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.picker = None,
        KeyCode::Char('j') | KeyCode::Down => app.picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.picker_nav_up(),
        KeyCode::Enter => app.picker_confirm(),
        _ => {}
    }
}

fn handle_notes(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.save_note();
        return;
    }
    if key.code == KeyCode::Tab {
        let next = app.notes_focus.next();
        app.focus_note_field(next);
        return;
    }

    if app.notes_focus.is_text() {
        handle_note_field(app, key);
        return;
    }

    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.close_notes(),
        KeyCode::Char('j') | KeyCode::Down => app.notes_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.notes_nav_up(),
        KeyCode::Enter | KeyCode::Char('e') => app.edit_selected_note(),
        KeyCode::Char('f') => app.toggle_notes_scope(),
        KeyCode::Char('/') => app.focus_note_field(NotesFocus::Search),
        KeyCode::Char('p') => app.notes.toggle_pin(),
        KeyCode::Char('N') => app.new_note(),
        KeyCode::Char('g') => app.jump_to_selected_note(),
        _ => {}
    }
}

fn handle_note_field(app: &mut App, key: KeyEvent) {
    let focus = app.notes_focus;
    match key.code {
        KeyCode::Esc => {
            app.notes_focus = NotesFocus::List;
            return;
        }
        // Content is multi-line; other fields move on
        KeyCode::Enter if focus == NotesFocus::Content => {
            let mut cursor = app.note_cursor;
            if let Some(field) = app.note_field_mut(focus) {
                let byte_pos = char_to_byte_index(field, cursor);
                field.insert(byte_pos, '\n');
                cursor += 1;
            }
            app.note_cursor = cursor;
            return;
        }
        KeyCode::Enter if focus == NotesFocus::Search => {
            app.notes_focus = NotesFocus::List;
            return;
        }
        KeyCode::Enter => {
            app.focus_note_field(focus.next());
            return;
        }
        _ => {}
    }

    let mut cursor = app.note_cursor;
    let changed = match app.note_field_mut(focus) {
        Some(field) => edit_text(field, &mut cursor, key),
        None => false,
    };
    app.note_cursor = cursor;

    if changed && focus == NotesFocus::Search {
        app.refresh_notes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        assert_eq!(char_to_byte_index("añb", 2), 3);
        assert_eq!(char_to_byte_index("abc", 10), 3);
    }

    #[test]
    fn test_edit_text_inserts_at_cursor() {
        let mut text = "grae".to_string();
        let mut cursor = 3;
        assert!(edit_text(&mut text, &mut cursor, key(KeyCode::Char('c'))));
        assert_eq!(text, "grace");
        assert_eq!(cursor, 4);
    }

    #[test]
    fn test_edit_text_backspace_and_delete() {
        let mut text = "señor".to_string();
        let mut cursor = 3;
        assert!(edit_text(&mut text, &mut cursor, key(KeyCode::Backspace)));
        assert_eq!(text, "seor");
        assert!(edit_text(&mut text, &mut cursor, key(KeyCode::Delete)));
        assert_eq!(text, "ser");
        assert_eq!(cursor, 2);

        let mut cursor = 0;
        assert!(!edit_text(&mut text, &mut cursor, key(KeyCode::Backspace)));
    }

    #[test]
    fn test_edit_text_cursor_moves() {
        let mut text = "abc".to_string();
        let mut cursor = 1;
        assert!(!edit_text(&mut text, &mut cursor, key(KeyCode::End)));
        assert_eq!(cursor, 3);
        edit_text(&mut text, &mut cursor, key(KeyCode::Right));
        assert_eq!(cursor, 3);
        edit_text(&mut text, &mut cursor, key(KeyCode::Home));
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_control_chars_are_not_typed() {
        let mut text = String::new();
        let mut cursor = 0;
        let ctrl_s = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
        assert!(!edit_text(&mut text, &mut cursor, ctrl_s));
        assert!(text.is_empty());
    }
}
