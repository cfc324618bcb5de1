//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{
    can_add_compose_char, can_add_email_char, can_add_field_char, can_add_password_char,
    can_add_query_char, App, AppState, ComposeKind, Focus, LoginFocus, ProfileList,
    RegisterFocus, Tab, PAGE_SCROLL_SIZE,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => return handle_login_input(app, key).await,
        AppState::Registering => return handle_register_input(app, key).await,
        AppState::Composing => {
            handle_compose_input(app, key);
            return Ok(false);
        }
        AppState::Filtering => {
            handle_filter_input(app, key);
            return Ok(false);
        }
        AppState::EditingSearch => {
            handle_search_input(app, key);
            return Ok(false);
        }
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingDelete => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm_delete(),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.pending_delete = None;
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Quitting => return Ok(true),
        AppState::Normal => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return Ok(false);
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return Ok(false);
        }
        KeyCode::Char('1') => switch_tab(app, Tab::Feed),
        KeyCode::Char('2') => switch_tab(app, Tab::Search),
        KeyCode::Char('3') => {
            switch_tab(app, Tab::Profile);
            if app.profile.is_none() {
                app.open_my_profile();
            }
        }
        KeyCode::Left => switch_tab(app, app.current_tab.prev()),
        KeyCode::Right => switch_tab(app, app.current_tab.next()),
        KeyCode::Tab => {
            // Toggle focus between list and detail panels
            app.focus = match app.focus {
                Focus::List => Focus::Detail,
                Focus::Detail => Focus::List,
            };
        }
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::PageUp => app.move_selection(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::PageDown => app.move_selection(PAGE_SCROLL_SIZE as isize),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),
        KeyCode::Char('u') => app.refresh_current_tab(),
        KeyCode::Char('m') => app.open_my_profile(),
        KeyCode::Char('L') => app.logout(),
        KeyCode::Char('n') => app.start_compose(ComposeKind::NewPost),
        KeyCode::Char('l') => app.toggle_like_selected(),
        KeyCode::Char('c') => app.start_comment(),
        KeyCode::Char('d') => app.request_delete_selected(),
        KeyCode::Enter | KeyCode::Char('p') => app.open_selected_profile(),
        _ => match app.current_tab {
            Tab::Feed => handle_feed_input(app, key),
            Tab::Search => handle_search_tab_input(app, key),
            Tab::Profile => handle_profile_input(app, key),
        },
    }

    Ok(false)
}

fn switch_tab(app: &mut App, tab: Tab) {
    app.current_tab = tab;
    app.focus = Focus::List;
}

fn handle_feed_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('/') => app.state = AppState::Filtering,
        KeyCode::Esc => {
            app.feed_filter.clear();
            app.on_filter_changed();
        }
        _ => {}
    }
}

fn handle_search_tab_input(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('/') {
        app.state = AppState::EditingSearch;
    }
}

fn handle_profile_input(app: &mut App, key: KeyEvent) {
    let own = app.viewing_own_profile();
    match key.code {
        KeyCode::Char('f') => app.toggle_follow(),
        KeyCode::Char('e') if own => app.start_compose(ComposeKind::EditBio),
        KeyCode::Char('N') if own => app.start_compose(ComposeKind::EditName),
        KeyCode::Char('i') if own => app.start_compose(ComposeKind::PicturePath),
        KeyCode::Char('F') => app.show_connections(ProfileList::Followers),
        KeyCode::Char('G') => app.show_connections(ProfileList::Following),
        KeyCode::Char('s') => app.show_suggestions(),
        KeyCode::Esc if app.profile_list != ProfileList::Posts => app.show_profile_posts(),
        _ => {}
    }
}

fn handle_filter_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.feed_filter.clear();
            app.on_filter_changed();
            app.state = AppState::Normal;
        }
        KeyCode::Enter => {
            // Keep the filter active
            app.state = AppState::Normal;
        }
        KeyCode::Backspace => {
            app.feed_filter.pop();
            app.on_filter_changed();
        }
        KeyCode::Char(c) => {
            if can_add_query_char(app.feed_filter.chars().count(), c) {
                app.feed_filter.push(c);
                app.on_filter_changed();
            }
        }
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.state = AppState::Normal,
        KeyCode::Enter => {
            app.state = AppState::Normal;
            app.run_search();
        }
        KeyCode::Backspace => {
            app.search_query.pop();
        }
        KeyCode::Char(c) => {
            if can_add_query_char(app.search_query.chars().count(), c) {
                app.search_query.push(c);
            }
        }
        _ => {}
    }
}

fn handle_compose_input(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let Some(compose) = app.compose.as_mut() else {
        app.state = AppState::Normal;
        return;
    };
    let multiline = compose.kind.is_multiline();

    match key.code {
        KeyCode::Esc => app.cancel_compose(),
        KeyCode::Char('s') if ctrl => app.submit_compose(),
        KeyCode::Enter if multiline && !ctrl => {
            if can_add_compose_char(compose.text.chars().count(), '\n') {
                compose.text.push('\n');
            }
        }
        KeyCode::Enter => app.submit_compose(),
        KeyCode::Backspace => {
            compose.text.pop();
            compose.error = None;
        }
        KeyCode::Char(c) => {
            if can_add_compose_char(compose.text.chars().count(), c) {
                compose.text.push(c);
                compose.error = None;
            }
        }
        _ => {}
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => app.login_focus = app.login_focus.next(),
        KeyCode::Up | KeyCode::BackTab => app.login_focus = app.login_focus.prev(),
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Email => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                // On failure login_error is set and the form stays up
                if app.attempt_login().await.is_ok() {
                    app.load_initial();
                }
            }
            LoginFocus::Register => app.start_register(),
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Email => {
                app.login_email.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button | LoginFocus::Register => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Email => {
                if can_add_email_char(app.login_email.chars().count(), c) {
                    app.login_email.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            // Ignore character input on buttons
            LoginFocus::Button | LoginFocus::Register => {}
        },
        _ => {}
    }
    Ok(false)
}

async fn handle_register_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => app.start_login(),
        KeyCode::Down | KeyCode::Tab => app.register.focus = app.register.focus.next(),
        KeyCode::Up | KeyCode::BackTab => app.register.focus = app.register.focus.prev(),
        KeyCode::Enter => {
            if app.register.focus == RegisterFocus::Button {
                if app.attempt_register().await.is_ok() {
                    app.load_initial();
                }
            } else {
                app.register.focus = app.register.focus.next();
            }
        }
        KeyCode::Backspace => {
            if let Some((field, _)) = app.register.focused_field_mut() {
                field.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some((field, max_len)) = app.register.focused_field_mut() {
                if can_add_field_char(field.chars().count(), max_len, c) {
                    field.push(c);
                }
            }
        }
        _ => {}
    }
    Ok(false)
}
