//! UI rendering with Ratatui.

use crate::app::{App, AuthField, Confirm, FamilyInput, FeedTab, InputMode, Screen};
use crate::config::Theme;
use crate::form::FormField;
use donutlog_core::{format, Entry, Visibility};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    prelude::*,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

/// Colors for one theme.
struct Palette {
    text: Color,
    muted: Color,
    accent: Color,
    border: Color,
    selected_bg: Color,
    shared: Color,
    private: Color,
    error: Color,
    success: Color,
}

impl Palette {
    fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                text: Color::Black,
                muted: Color::DarkGray,
                accent: Color::Magenta,
                border: Color::Gray,
                selected_bg: Color::Rgb(255, 228, 240),
                shared: Color::Blue,
                private: Color::DarkGray,
                error: Color::Red,
                success: Color::Green,
            },
            Theme::Dark => Self {
                text: Color::White,
                muted: Color::DarkGray,
                accent: Color::Rgb(255, 140, 180),
                border: Color::DarkGray,
                selected_bg: Color::Rgb(60, 60, 80),
                shared: Color::Cyan,
                private: Color::Gray,
                error: Color::LightRed,
                success: Color::LightGreen,
            },
            Theme::Hanukkah => Self {
                text: Color::White,
                muted: Color::Rgb(150, 170, 210),
                accent: Color::Rgb(255, 200, 60),
                border: Color::Rgb(40, 80, 160),
                selected_bg: Color::Rgb(20, 50, 120),
                shared: Color::Rgb(120, 180, 255),
                private: Color::Rgb(150, 170, 210),
                error: Color::LightRed,
                success: Color::Rgb(255, 200, 60),
            },
        }
    }
}

/// Main render function.
pub fn render(frame: &mut Frame, app: &App) {
    let palette = Palette::for_theme(app.theme());

    match app.screen {
        Screen::Login | Screen::Signup => render_auth(frame, app, &palette),
        Screen::Feed => render_feed(frame, app, &palette),
        Screen::EntryForm { .. } => render_form(frame, app, &palette),
        Screen::Family => render_family(frame, app, &palette),
        Screen::Quit => {}
    }

    if app.input_mode == InputMode::Search {
        render_search_overlay(frame, app, &palette, frame.area());
    }
    if let Some(ref confirm) = app.confirm {
        render_confirm(frame, confirm, &palette);
    }
}

/// Render the login / signup dialog.
fn render_auth(frame: &mut Frame, app: &App, palette: &Palette) {
    let area = frame.area();
    let dialog_area = centered_rect(56, 12, area);

    frame.render_widget(Clear, dialog_area);

    let title = if app.screen == Screen::Signup {
        " 🍩 donutlog - הרשמה "
    } else {
        " 🍩 donutlog - התחברות "
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));

    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // Email
            Constraint::Length(1), // Password
            Constraint::Length(1),
            Constraint::Min(2),    // Status
            Constraint::Length(1), // Help line
        ])
        .split(inner);

    let masked = "*".repeat(app.password_input.chars().count());
    render_input(
        frame,
        "אימייל",
        &app.email_input,
        app.auth_field == AuthField::Email,
        chunks[0],
        palette,
    );
    render_input(
        frame,
        "סיסמה",
        &masked,
        app.auth_field == AuthField::Password,
        chunks[1],
        palette,
    );

    render_status(frame, app, palette, chunks[3]);

    let help = if app.screen == Screen::Signup {
        "Enter: הרשמה | Tab: מעבר שדה | Ctrl+L: התחברות | Esc: יציאה"
    } else {
        "Enter: התחברות | Tab: מעבר שדה | Ctrl+N: הרשמה | Ctrl+R: שכחתי סיסמה | Esc: יציאה"
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(palette.muted)),
        chunks[4],
    );
}

fn render_input(
    frame: &mut Frame,
    label: &str,
    value: &str,
    focused: bool,
    area: Rect,
    palette: &Palette,
) {
    let value_style = if focused {
        Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(palette.text)
    };
    let cursor = if focused { "_" } else { "" };
    let line = Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(palette.muted)),
        Span::styled(format!("{value}{cursor}"), value_style),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

/// Render the feed: tabs, family selector, cards and status.
fn render_feed(frame: &mut Frame, app: &App, palette: &Palette) {
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tabs
            Constraint::Min(3),    // Cards
            Constraint::Length(1), // Status
            Constraint::Length(1), // Help line
        ])
        .split(area);

    render_feed_header(frame, app, palette, chunks[0]);
    render_cards(frame, app, palette, chunks[1]);
    render_status(frame, app, palette, chunks[2]);

    let help = "a: הוספה | e: עריכה | d: מחיקה | Tab: משפחה/שלי | g: החלפת משפחה | f: משפחות | /: חיפוש | r: רענון | o: התנתקות | q: יציאה";
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(palette.muted)),
        chunks[3],
    );
}

fn render_feed_header(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let tab_style = |active: bool| {
        if active {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(palette.muted)
        }
    };

    let mut spans = vec![
        Span::styled(" 👨‍👩‍👧 המשפחה ", tab_style(app.tab == FeedTab::Family)),
        Span::raw("  "),
        Span::styled(" 🍩 שלי ", tab_style(app.tab == FeedTab::Mine)),
    ];
    if app.tab == FeedTab::Family {
        let family = match app.active_group() {
            Some(group) => format!("   משפחה פעילה: {}", group.name),
            None => "   אין משפחה פעילה".to_string(),
        };
        spans.push(Span::styled(family, Style::default().fg(palette.text)));
        if app.groups.len() > 1 {
            spans.push(Span::styled(
                format!(" ({} משפחות, g להחלפה)", app.groups.len()),
                Style::default().fg(palette.muted),
            ));
        }
    }

    let block = Block::default()
        .title(format!(" donutlog {} ", app.theme().label()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_cards(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.entries.is_empty() {
        let message = if app.status.busy {
            "טוען..."
        } else if app.tab == FeedTab::Family && app.groups.is_empty() {
            "עדיין לא הצטרפת למשפחה. לחצי f כדי ליצור משפחה או להצטרף עם קוד"
        } else if app.tab == FeedTab::Family {
            "אין עדיין טעימות משותפות במשפחה הזו"
        } else {
            "עדיין לא רשמת טעימות. לחצי a כדי להוסיף"
        };
        let paragraph = Paragraph::new(message)
            .style(Style::default().fg(palette.muted))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, centered_rect(inner.width, 3, inner));
        return;
    }

    let items: Vec<ListItem> = app
        .entries
        .iter()
        .map(|entry| card(entry, palette))
        .collect();

    let list = List::new(items).highlight_style(
        Style::default()
            .bg(palette.selected_bg)
            .add_modifier(Modifier::BOLD),
    );
    let mut state = ListState::default().with_selected(Some(app.selected_index));
    frame.render_stateful_widget(list, inner, &mut state);
}

/// One entry as a multi-line list item.
fn card<'a>(entry: &'a Entry, palette: &Palette) -> ListItem<'a> {
    let badge_color = match entry.visibility {
        Visibility::Group => palette.shared,
        Visibility::Private => palette.private,
    };

    let mut lines = vec![Line::from(vec![
        Span::styled(
            entry.place_name.as_str(),
            Style::default().fg(palette.text).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            format!("[{}]", entry.visibility.label()),
            Style::default().fg(badge_color),
        ),
        Span::raw("  "),
        Span::styled(format::rating(entry.rating), Style::default().fg(palette.accent)),
        Span::raw("  "),
        Span::styled(
            format!(
                "{} ({})",
                format::medium_datetime(&entry.date),
                format::relative_time(&entry.date)
            ),
            Style::default().fg(palette.muted),
        ),
    ])];

    let mut donut = entry.donut_name.clone();
    if let Some(filling) = &entry.filling {
        donut.push_str(" · ");
        donut.push_str(filling);
    }
    let mut second = vec![Span::styled(donut, Style::default().fg(palette.text))];
    if let Some(price) = entry.price {
        second.push(Span::raw("  "));
        second.push(Span::styled(format::price(price), Style::default().fg(palette.muted)));
    }
    lines.push(Line::from(second));

    if let Some(notes) = &entry.notes {
        lines.push(Line::styled(
            format!("  {notes}"),
            Style::default().fg(palette.muted).add_modifier(Modifier::ITALIC),
        ));
    }
    if let Some(url) = &entry.photo_url {
        lines.push(Line::styled(
            format!("  🔗 {url}"),
            Style::default().fg(palette.shared),
        ));
    }
    lines.push(Line::raw(""));

    ListItem::new(lines)
}

/// Render the add / edit form.
fn render_form(frame: &mut Frame, app: &App, palette: &Palette) {
    let area = frame.area();
    let title = match app.screen {
        Screen::EntryForm { editing: Some(_) } => " ✏️ עריכת טעימה ",
        _ => " 🍩 טעימה חדשה ",
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Min(FormField::ALL.len() as u16 * 2),
            Constraint::Length(1), // Status
            Constraint::Length(1), // Help line
        ])
        .split(inner);

    let mut lines = Vec::new();
    for field in FormField::ALL {
        let focused = app.form.focus == field;
        let value_style = if focused {
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        };
        let marker = if focused { "▸ " } else { "  " };
        let cursor = if focused && field != FormField::Visibility {
            "_"
        } else {
            ""
        };

        let mut value = app.form.value(field).to_string();
        if field == FormField::Visibility {
            value = format!("◀ {value} ▶");
            if app.form.visibility == Visibility::Group {
                let family = app
                    .active_group()
                    .map(|g| g.name.clone())
                    .unwrap_or_else(|| "אין משפחה פעילה".to_string());
                value.push_str(&format!("  ({family})"));
            }
        }

        lines.push(Line::from(vec![
            Span::styled(marker, Style::default().fg(palette.accent)),
            Span::styled(
                format!("{}: ", field.label()),
                Style::default().fg(palette.muted),
            ),
            Span::styled(format!("{value}{cursor}"), value_style),
        ]));
        match app.form.errors.get(field.key()) {
            Some(error) => lines.push(Line::styled(
                format!("    {error}"),
                Style::default().fg(palette.error),
            )),
            None => lines.push(Line::raw("")),
        }
    }
    frame.render_widget(Paragraph::new(lines), chunks[0]);

    render_status(frame, app, palette, chunks[1]);
    frame.render_widget(
        Paragraph::new("Enter/Ctrl+S: שמירה | Tab: שדה הבא | רווח/←→: שינוי נראות | Esc: ביטול")
            .style(Style::default().fg(palette.muted)),
        chunks[2],
    );
}

/// Render the family management screen.
fn render_family(frame: &mut Frame, app: &App, palette: &Palette) {
    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(5),    // Groups
            Constraint::Length(6), // Inputs
            Constraint::Length(1), // Status
            Constraint::Length(1), // Help line
        ])
        .split(area);

    let block = Block::default()
        .title(" 👨‍👩‍👧 המשפחות שלי ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(chunks[0]);
    frame.render_widget(block, chunks[0]);

    if app.groups.is_empty() {
        frame.render_widget(
            Paragraph::new("עדיין אין לך משפחות. צרי משפחה חדשה או הצטרפי עם קוד")
                .style(Style::default().fg(palette.muted))
                .alignment(Alignment::Center),
            centered_rect(inner.width, 1, inner),
        );
    } else {
        let items: Vec<ListItem> = app
            .groups
            .iter()
            .map(|group| {
                let active = app.active_group.as_deref() == Some(group.id.as_str());
                let marker = if active { "● " } else { "○ " };
                ListItem::new(Line::from(vec![
                    Span::styled(marker, Style::default().fg(palette.accent)),
                    Span::styled(group.name.as_str(), Style::default().fg(palette.text)),
                    Span::styled(
                        format!("   קוד: {}", group.join_code),
                        Style::default().fg(palette.muted),
                    ),
                ]))
            })
            .collect();
        let list = List::new(items).highlight_style(
            Style::default()
                .bg(palette.selected_bg)
                .add_modifier(Modifier::BOLD),
        );
        let mut state = ListState::default().with_selected(Some(app.family_selected));
        frame.render_stateful_widget(list, inner, &mut state);
    }

    let inputs_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let inputs_inner = inputs_block.inner(chunks[1]);
    frame.render_widget(inputs_block, chunks[1]);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inputs_inner);

    let editing = app.input_mode == InputMode::Editing;
    render_input(
        frame,
        "משפחה חדשה (n)",
        &app.group_name_input,
        editing && app.family_input == FamilyInput::CreateName,
        rows[0],
        palette,
    );
    render_input(
        frame,
        "הצטרפות עם קוד (c)",
        &app.join_code_input,
        editing && app.family_input == FamilyInput::JoinCode,
        rows[1],
        palette,
    );
    if let Some(group) = app.active_group() {
        let line = Line::from(vec![
            Span::styled("קוד ההצטרפות למשפחה הפעילה: ", Style::default().fg(palette.muted)),
            Span::styled(
                group.join_code.as_str(),
                Style::default().fg(palette.accent).add_modifier(Modifier::BOLD),
            ),
        ]);
        frame.render_widget(Paragraph::new(line), rows[3]);
    }

    render_status(frame, app, palette, chunks[2]);
    let help = if editing {
        "Enter: אישור | Tab: החלפת שדה | Esc: ביטול"
    } else {
        "j/k: בחירה | Enter: הפיכה לפעילה | n: יצירה | c: הצטרפות | l: עזיבה | Esc: חזרה"
    };
    frame.render_widget(
        Paragraph::new(help).style(Style::default().fg(palette.muted)),
        chunks[3],
    );
}

/// Busy, error or success line.
fn render_status(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let (text, color) = if app.status.busy {
        ("⏳ רגע...".to_string(), palette.muted)
    } else if let Some(ref error) = app.status.error {
        (format!("⚠️ {error}"), palette.error)
    } else if let Some(ref success) = app.status.success {
        (format!("✓ {success}"), palette.success)
    } else {
        return;
    };
    frame.render_widget(
        Paragraph::new(text)
            .style(Style::default().fg(color))
            .wrap(Wrap { trim: true }),
        area,
    );
}

/// Render the y/n dialog.
fn render_confirm(frame: &mut Frame, confirm: &Confirm, palette: &Palette) {
    let question = match confirm {
        Confirm::DeleteEntry(_) => "למחוק את הטעימה?",
        Confirm::LeaveGroup(_) => "לעזוב את המשפחה?",
    };
    let dialog_area = centered_rect(40, 5, frame.area());
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(" אישור ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.error));
    let lines = vec![
        Line::styled(question, Style::default().fg(palette.text)),
        Line::styled("y: כן | n: לא", Style::default().fg(palette.muted)),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(block),
        dialog_area,
    );
}

/// Render the search overlay.
fn render_search_overlay(frame: &mut Frame, app: &App, palette: &Palette, area: Rect) {
    let dialog_width = 60.min(area.width.saturating_sub(4));
    let dialog_height = 15.min(area.height.saturating_sub(4));
    let dialog_area = centered_rect(dialog_width, dialog_height, area);

    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(" 🔍 חיפוש ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));

    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);

    let input_line = Line::from(vec![
        Span::styled("▸ ", Style::default().fg(palette.accent)),
        Span::styled(&app.search_query, Style::default().fg(palette.text)),
        Span::styled(
            "_",
            Style::default()
                .fg(palette.text)
                .add_modifier(Modifier::SLOW_BLINK),
        ),
    ]);
    frame.render_widget(Paragraph::new(input_line), chunks[0]);

    if !app.search_results.is_empty() {
        let items: Vec<ListItem> = app
            .search_results
            .iter()
            .enumerate()
            .filter_map(|(i, result)| {
                let entry = app.entries.get(result.index)?;
                let style = if i == app.search_selected_index {
                    Style::default()
                        .bg(palette.selected_bg)
                        .fg(palette.text)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(palette.text)
                };

                let line = Line::from(vec![
                    Span::styled("🍩 ", Style::default()),
                    Span::styled(entry.donut_name.as_str(), style),
                    Span::styled(" ", Style::default()),
                    Span::styled(entry.place_name.as_str(), Style::default().fg(palette.muted)),
                ]);

                Some(ListItem::new(line).style(style))
            })
            .collect();

        frame.render_widget(List::new(items), chunks[1]);
    } else if !app.search_query.is_empty() {
        let no_results = Paragraph::new("לא נמצאו תוצאות")
            .style(Style::default().fg(palette.muted))
            .alignment(Alignment::Center);
        frame.render_widget(no_results, chunks[1]);
    }
}

/// Helper to create a centered rectangle.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
