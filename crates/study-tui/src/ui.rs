use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use study_core::{ChatRole, Confidence};
use crate::app::{App, FocusPane, InputMode, NotesFocus, PickerKind};

const TITLE: &str = "Clarke + KJV Companion";
const STATUS: &str = "AI grounded in KJV + Adam Clarke";
const NO_VERSES: &str = "No verses loaded for this chapter yet.";
const NO_COMMENTARY: &str = "No commentary passages surfaced yet. Try another chapter.";
const SECTION_LEVEL_NOTE: &str = "Clarke comments at the chapter or section level for many passages.";
const ASK_PROMPT: &str = "Ask a question about the passage, doctrine, or Clarke's notes.";
const NO_NOTES: &str = "No notes yet. Create one below.";

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        if end > 0 {
            spans.push(Span::styled(
                after[..end].to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn ellipsis(frame: u8) -> String {
    ".".repeat(frame as usize + 1)
}

fn border_style(focused: bool) -> Style {
    Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray })
}

/// Centered popup area, clamped to `area`.
fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, selectors, body, footer
    let [header_area, selector_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(frame, header_area);
    render_selectors(app, frame, selector_area);

    let [scripture_area, commentary_area, assistant_area] = Layout::horizontal([
        Constraint::Percentage(35),
        Constraint::Percentage(30),
        Constraint::Percentage(35),
    ])
    .areas(body_area);

    render_scripture(app, frame, scripture_area);
    render_commentary(app, frame, commentary_area);
    render_assistant(app, frame, assistant_area);

    render_footer(app, frame, footer_area);

    // Overlays, picker on top
    if app.notes_open {
        render_notes(app, frame, body_area);
    }
    if app.picker.is_some() {
        render_picker(app, frame, area);
    }
}

fn render_header(frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(format!(" {} ", TITLE), Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", STATUS), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_selectors(app: &App, frame: &mut Frame, area: Rect) {
    let reference = app.navigator.reference();
    let key_style = Style::default().fg(Color::DarkGray);
    let value_style = Style::default().fg(Color::Yellow).bold();

    let chapter = reference.chapter.map_or_else(|| "-".to_string(), |c| c.to_string());
    let verse = app
        .navigator
        .verse_filter()
        .map_or_else(|| "All".to_string(), |v| v.to_string());

    let line = Line::from(vec![
        Span::styled(" Book ", key_style),
        Span::styled(reference.book.clone(), value_style),
        Span::styled("  Chapter ", key_style),
        Span::styled(chapter, value_style),
        Span::styled("  Verse ", key_style),
        Span::styled(verse, value_style),
        Span::raw("   "),
        Span::styled(app.navigator.label(), Style::default().fg(Color::Cyan).bold()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_scripture(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Scripture;
    let label = app.navigator.label();
    let title = if label.is_empty() { "Scripture".to_string() } else { label };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(focused))
        .title(format!(" {} ", title));

    app.scripture_height = block.inner(area).height;

    if app.navigator.is_loading_verses() && app.navigator.verses().is_empty() {
        let loading = Paragraph::new(format!("Loading verses{}", ellipsis(app.animation_frame)))
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(loading, area);
        return;
    }

    if app.navigator.verses().is_empty() {
        let placeholder = Paragraph::new(NO_VERSES)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(placeholder, area);
        return;
    }

    let highlighted = app.navigator.highlighted();
    let mut lines: Vec<Line> = Vec::new();
    for verse in app.navigator.verses() {
        let is_highlighted = highlighted == Some(verse.number);
        let number_style = if is_highlighted {
            Style::default().fg(Color::Black).bg(Color::Yellow).bold()
        } else {
            Style::default().fg(Color::Yellow).bold()
        };
        let text_style = if is_highlighted {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(format!("{}  ", verse.number), number_style),
            Span::styled(verse.text.clone(), text_style),
        ]));
        lines.push(Line::default()); // Empty line between verses
    }

    // Keep the highlighted verse on screen (two lines per verse before wrapping)
    if let Some(idx) = app.highlighted_index() {
        let top = (idx * 2) as u16;
        let height = app.scripture_height.max(1);
        if top < app.scripture_scroll {
            app.scripture_scroll = top;
        } else if top + 1 >= app.scripture_scroll + height {
            app.scripture_scroll = (top + 2).saturating_sub(height);
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.scripture_scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_commentary(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Commentary;
    let commentary = app.navigator.commentary();

    let badge_style = match commentary.confidence {
        Confidence::High => Style::default().fg(Color::Green),
        Confidence::Moderate => Style::default().fg(Color::Yellow),
        Confidence::None => Style::default().fg(Color::DarkGray),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(focused))
        .title(" Adam Clarke Commentary ")
        .title(
            Line::from(Span::styled(
                format!(" {} ", commentary.confidence.display_name()),
                badge_style,
            ))
            .right_aligned(),
        );

    if app.navigator.is_loading_commentary() && commentary.sections.is_empty() {
        let loading = Paragraph::new(format!("Loading commentary{}", ellipsis(app.animation_frame)))
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(loading, area);
        return;
    }

    let mut lines: Vec<Line> = Vec::new();
    if commentary.confidence != Confidence::High {
        lines.push(Line::from(Span::styled(
            SECTION_LEVEL_NOTE,
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
        lines.push(Line::default());
    }

    if commentary.sections.is_empty() {
        lines.push(Line::from(Span::styled(NO_COMMENTARY, Style::default().fg(Color::DarkGray))));
    }
    for section in &commentary.sections {
        for line in section.content.lines() {
            lines.push(Line::from(line.to_string()));
        }
        lines.push(Line::default());
    }

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.commentary_scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_assistant(app: &mut App, frame: &mut Frame, area: Rect) {
    let [chat_area, error_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(if app.assistant.error().is_some() { 2 } else { 0 }),
        Constraint::Length(3),
    ])
    .areas(area);

    let focused = app.focus == FocusPane::Assistant;
    let label = app.navigator.label();
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(focused))
        .title(if label.is_empty() {
            " AI Study ".to_string()
        } else {
            format!(" AI Study: {} ", label)
        });

    let chat_text = if app.assistant.messages().is_empty() && !app.assistant.is_pending() {
        Text::from(Span::styled(ASK_PROMPT, Style::default().fg(Color::DarkGray)))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.assistant.messages() {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.text.clone()));
                }
                ChatRole::Assistant => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.text.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
            }
            lines.push(Line::default());
        }

        if app.assistant.is_pending() {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", ellipsis(app.animation_frame)),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    // Clamp scroll to the transcript, ignoring wrapping
    let visible = chat_area.height.saturating_sub(2);
    let max_scroll = (chat_text.lines.len() as u16).saturating_sub(visible);
    app.chat_scroll = app.chat_scroll.min(max_scroll);

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    if let Some(error) = app.assistant.error() {
        let error = Paragraph::new(error.to_string())
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true });
        frame.render_widget(error, error_area);
    }

    let editing = app.input_mode == InputMode::Editing && !app.notes_open && app.picker.is_none();
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(if app.assistant.is_pending() { " Ask (waiting) " } else { " Ask " });

    render_text_input(frame, input_area, input_block, &app.assistant.input, app.ai_cursor, editing);
}

/// Single-line input with horizontal scrolling to keep the cursor visible.
fn render_text_input(frame: &mut Frame, area: Rect, block: Block, text: &str, cursor: usize, editing: bool) {
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor = cursor.min(text.chars().count());

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor >= inner_width {
        cursor - inner_width + 1
    } else {
        0
    };

    let visible_text: String = text
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_notes(app: &mut App, frame: &mut Frame, area: Rect) {
    let popup = popup_rect(area, area.width.saturating_sub(4), area.height.saturating_sub(2));
    frame.render_widget(Clear, popup);

    let status = if app.notes.is_saving() {
        format!(" Saving{} ", ellipsis(app.animation_frame))
    } else if app.notes.is_loading() {
        format!(" Loading notes{} ", ellipsis(app.animation_frame))
    } else {
        String::new()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Study Notes ")
        .title(Line::from(Span::styled(status, Style::default().fg(Color::DarkGray))).right_aligned());
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let [body_area, error_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(if app.notes.error().is_some() { 1 } else { 0 }),
    ])
    .areas(inner);

    let [list_side, editor_side] = Layout::horizontal([
        Constraint::Percentage(40),
        Constraint::Percentage(60),
    ])
    .areas(body_area);

    render_notes_list(app, frame, list_side);
    render_note_editor(app, frame, editor_side);

    if let Some(error) = app.notes.error() {
        let error = Paragraph::new(error.to_string()).style(Style::default().fg(Color::Red));
        frame.render_widget(error, error_area);
    }
}

fn render_notes_list(app: &mut App, frame: &mut Frame, area: Rect) {
    let [search_area, list_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(area);

    let search_focused = app.notes_focus == NotesFocus::Search;
    let search_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(search_focused))
        .title(" Search ");
    render_text_input(frame, search_area, search_block, &app.notes.search, app.note_cursor, search_focused);

    let list_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(app.notes_focus == NotesFocus::List))
        .title(format!(" {} ", app.notes.scope().display_name()));

    if app.notes.notes().is_empty() {
        let text = if app.notes.is_loading() { "" } else { NO_NOTES };
        let placeholder = Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .block(list_block);
        frame.render_widget(placeholder, list_area);
        return;
    }

    let items: Vec<ListItem> = app
        .notes
        .notes()
        .iter()
        .map(|note| {
            let mut lines = vec![Line::from(Span::styled(
                note.title.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            let detail: Vec<&str> = [note.reference.as_deref(), note.tags.as_deref()]
                .into_iter()
                .flatten()
                .filter(|s| !s.is_empty())
                .collect();
            if !detail.is_empty() {
                lines.push(Line::from(Span::styled(
                    detail.join(" | "),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            ListItem::new(lines)
        })
        .collect();

    let list = List::new(items)
        .block(list_block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, list_area, &mut app.notes_state);
}

fn render_note_editor(app: &App, frame: &mut Frame, area: Rect) {
    let [title_area, content_area, tags_area, reference_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(3),
        Constraint::Length(3),
        Constraint::Length(3),
    ])
    .areas(area);

    let draft = &app.notes.draft;
    let editing_title = if draft.id.is_some() { " Title (editing) " } else { " Title (new) " };

    let field = |focus: NotesFocus, title: &str| {
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style(app.notes_focus == focus))
            .title(title.to_string())
    };

    render_text_input(
        frame,
        title_area,
        field(NotesFocus::Title, editing_title),
        &draft.title,
        app.note_cursor,
        app.notes_focus == NotesFocus::Title,
    );

    let content = Paragraph::new(draft.content.clone())
        .block(field(NotesFocus::Content, " Content "))
        .wrap(Wrap { trim: false });
    frame.render_widget(content, content_area);
    if app.notes_focus == NotesFocus::Content {
        // Cursor on the last line of the content
        let before: String = draft.content.chars().take(app.note_cursor).collect();
        let row = before.matches('\n').count() as u16;
        let col = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) as u16;
        let max_row = content_area.height.saturating_sub(3);
        let max_col = content_area.width.saturating_sub(3);
        frame.set_cursor_position((
            content_area.x + 1 + col.min(max_col),
            content_area.y + 1 + row.min(max_row),
        ));
    }

    render_text_input(
        frame,
        tags_area,
        field(NotesFocus::Tags, " Tags "),
        &draft.tags,
        app.note_cursor,
        app.notes_focus == NotesFocus::Tags,
    );

    let pin = if app.notes.is_pinned() { " Reference [pinned] " } else { " Reference " };
    render_text_input(
        frame,
        reference_area,
        field(NotesFocus::Reference, pin),
        &draft.reference,
        app.note_cursor,
        app.notes_focus == NotesFocus::Reference,
    );
}

fn render_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let title = match app.picker {
        Some(PickerKind::Book) => " Book ",
        Some(PickerKind::Chapter) => " Chapter ",
        Some(PickerKind::Verse) => " Verse ",
        None => return,
    };
    let items = app.picker_items();

    let popup = popup_rect(area, 30, items.len() as u16 + 2);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);

    let items: Vec<ListItem> = items
        .into_iter()
        .map(|item| ListItem::new(format!(" {} ", item)))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup, &mut app.picker_state);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let pairs: &[(&str, &str)] = if app.picker.is_some() {
        &[("j/k", "move"), ("Enter", "select"), ("Esc", "cancel")]
    } else if app.notes_open {
        if app.notes_focus.is_text() {
            &[("Tab", "next field"), ("Esc", "list"), ("Ctrl-s", "save")]
        } else {
            &[
                ("j/k", "nav"),
                ("Enter", "edit"),
                ("N", "new"),
                ("f", "scope"),
                ("/", "search"),
                ("p", "pin"),
                ("g", "go to"),
                ("Ctrl-s", "save"),
                ("Esc", "close"),
            ]
        }
    } else if app.input_mode == InputMode::Editing {
        &[("Enter", "ask"), ("Esc", "done")]
    } else {
        &[
            ("Tab", "focus"),
            ("b/c/v", "book/chapter/verse"),
            ("j/k", "move"),
            ("a", "ask AI"),
            ("n", "notes"),
            ("q", "quit"),
        ]
    };

    let hints: Vec<Span> = pairs
        .iter()
        .flat_map(|(key, label)| {
            [
                Span::styled(format!(" {} ", key), key_style),
                Span::styled(format!(" {} ", label), label_style),
            ]
        })
        .collect();

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_bold_spans() {
        let line = parse_markdown_line("The **new birth** is spiritual");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "new birth");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_markdown_unclosed_is_literal() {
        let line = parse_markdown_line("a **b");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "a **b");
    }

    #[test]
    fn test_popup_is_centered_and_clamped() {
        let area = Rect::new(0, 0, 100, 40);
        assert_eq!(popup_rect(area, 30, 10), Rect::new(35, 15, 30, 10));
        assert_eq!(popup_rect(area, 200, 100).width, 96);
    }
}
