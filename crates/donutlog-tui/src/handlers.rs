//! Keyboard event handling.

use crate::app::{Action, App, AuthField, FamilyInput, InputMode, Screen};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Handle a key event. Returns true if the app should quit.
pub fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Ctrl+C to quit
    if ctrl && key.code == KeyCode::Char('c') {
        app.quit();
        return true;
    }

    // Ctrl+T to switch theme
    if ctrl && key.code == KeyCode::Char('t') {
        app.cycle_theme();
        return false;
    }

    // Ignore input while a request is queued
    if app.status.busy {
        return false;
    }

    match app.screen.clone() {
        Screen::Login | Screen::Signup => handle_auth_key(app, key),
        Screen::Feed => match app.input_mode {
            InputMode::Search => handle_search_key(app, key),
            InputMode::Confirm => handle_confirm_key(app, key),
            _ => handle_feed_key(app, key),
        },
        Screen::EntryForm { .. } => handle_form_key(app, key),
        Screen::Family => match app.input_mode {
            InputMode::Editing => handle_family_input_key(app, key),
            InputMode::Confirm => handle_confirm_key(app, key),
            _ => handle_family_key(app, key),
        },
        Screen::Quit => true,
    }
}

fn handle_auth_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('n') if ctrl => {
            app.status.clear();
            app.navigate(Screen::Signup);
            false
        }
        KeyCode::Char('l') if ctrl => {
            app.status.clear();
            app.navigate(Screen::Login);
            false
        }
        KeyCode::Char('r') if ctrl && app.screen == Screen::Login => {
            app.dispatch(Action::ResetPassword);
            false
        }
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            app.auth_field = match app.auth_field {
                AuthField::Email => AuthField::Password,
                AuthField::Password => AuthField::Email,
            };
            false
        }
        KeyCode::Enter => {
            if app.auth_field == AuthField::Email {
                app.auth_field = AuthField::Password;
            } else if app.screen == Screen::Signup {
                app.dispatch(Action::SignUp);
            } else {
                app.dispatch(Action::SignIn);
            }
            false
        }
        KeyCode::Char(c) => {
            match app.auth_field {
                AuthField::Email => app.email_input.push(c),
                AuthField::Password => app.password_input.push(c),
            }
            false
        }
        KeyCode::Backspace => {
            match app.auth_field {
                AuthField::Email => app.email_input.pop(),
                AuthField::Password => app.password_input.pop(),
            };
            false
        }
        KeyCode::Esc => {
            app.quit();
            true
        }
        _ => false,
    }
}

fn handle_feed_key(app: &mut App, key: KeyEvent) -> bool {
    // Ctrl+P to search
    if key.code == KeyCode::Char('p') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.start_search();
        return false;
    }

    match key.code {
        KeyCode::Char('q') => {
            app.quit();
            true
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.move_down();
            false
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.move_up();
            false
        }
        KeyCode::Tab => {
            app.toggle_tab();
            false
        }
        KeyCode::Char('g') => {
            app.cycle_active_group();
            false
        }
        KeyCode::Char('a') => {
            app.open_new_entry();
            false
        }
        KeyCode::Char('e') | KeyCode::Enter => {
            app.open_edit_entry();
            false
        }
        KeyCode::Char('d') | KeyCode::Delete => {
            app.request_delete();
            false
        }
        KeyCode::Char('f') => {
            app.status.clear();
            app.navigate(Screen::Family);
            false
        }
        KeyCode::Char('r') => {
            app.dispatch(Action::LoadFeed);
            false
        }
        KeyCode::Char('/') => {
            app.start_search();
            false
        }
        KeyCode::Char('o') => {
            app.dispatch(Action::SignOut);
            false
        }
        KeyCode::Esc => {
            app.status.clear();
            false
        }
        _ => false,
    }
}

fn handle_confirm_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.answer_confirm(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.answer_confirm(false),
        _ => {}
    }
    false
}

fn handle_form_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('s') if ctrl => app.submit_entry_form(),
        KeyCode::Enter => app.submit_entry_form(),
        KeyCode::Esc => {
            app.status.clear();
            app.navigate(Screen::Feed);
        }
        KeyCode::Tab | KeyCode::Down => app.form.focus_next(),
        KeyCode::BackTab | KeyCode::Up => app.form.focus_prev(),
        KeyCode::Left | KeyCode::Right => {
            if app.form.focus == crate::form::FormField::Visibility {
                app.form.toggle_visibility();
            }
        }
        KeyCode::Char(c) => app.form.insert_char(c),
        KeyCode::Backspace => app.form.backspace(),
        _ => {}
    }
    false
}

fn handle_family_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => {
            app.quit();
            true
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if app.family_selected + 1 < app.groups.len() {
                app.family_selected += 1;
            }
            false
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.family_selected = app.family_selected.saturating_sub(1);
            false
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            app.select_group(app.family_selected);
            false
        }
        KeyCode::Char('n') => {
            app.status.clear();
            app.family_input = FamilyInput::CreateName;
            app.input_mode = InputMode::Editing;
            false
        }
        KeyCode::Char('c') => {
            app.status.clear();
            app.family_input = FamilyInput::JoinCode;
            app.input_mode = InputMode::Editing;
            false
        }
        KeyCode::Char('l') => {
            app.request_leave();
            false
        }
        KeyCode::Esc | KeyCode::Char('b') => {
            app.status.clear();
            app.navigate(Screen::Feed);
            false
        }
        _ => false,
    }
}

fn family_buffer(app: &mut App) -> &mut String {
    match app.family_input {
        FamilyInput::CreateName => &mut app.group_name_input,
        FamilyInput::JoinCode => &mut app.join_code_input,
    }
}

fn handle_family_input_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char(c) => family_buffer(app).push(c),
        KeyCode::Backspace => {
            family_buffer(app).pop();
        }
        KeyCode::Enter => match app.family_input {
            FamilyInput::CreateName => app.dispatch(Action::CreateGroup),
            FamilyInput::JoinCode => app.dispatch(Action::JoinGroup),
        },
        KeyCode::Tab => {
            app.family_input = match app.family_input {
                FamilyInput::CreateName => FamilyInput::JoinCode,
                FamilyInput::JoinCode => FamilyInput::CreateName,
            };
        }
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        _ => {}
    }
    false
}

fn handle_search_key(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Esc => {
            app.exit_search();
            false
        }
        KeyCode::Enter => {
            app.select_search_result();
            false
        }
        KeyCode::Up => {
            if app.search_selected_index > 0 {
                app.search_selected_index -= 1;
            }
            false
        }
        KeyCode::Down => {
            if app.search_selected_index + 1 < app.search_results.len() {
                app.search_selected_index += 1;
            }
            false
        }
        KeyCode::Char(c) => {
            app.search_query.push(c);
            app.perform_search();
            false
        }
        KeyCode::Backspace => {
            app.search_query.pop();
            app.perform_search();
            false
        }
        _ => false,
    }
}
