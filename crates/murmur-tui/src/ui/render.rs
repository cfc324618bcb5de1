use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, AppState, LoginFocus, RegisterFocus, Tab};

use super::styles;
use super::tabs::{feed, profile, search};

const LOGO: [&str; 3] = [
    "    ╔╦╗╦ ╦╦═╗╔╦╗╦ ╦╦═╗",
    "    ║║║║ ║╠╦╝║║║║ ║╠╦╝",
    "    ╩ ╩╚═╝╩╚═╩ ╩╚═╝╩╚═",
];

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::Registering => render_register_overlay(frame, app),
        AppState::Composing => render_compose_overlay(frame, app),
        AppState::ConfirmingDelete => render_delete_overlay(frame),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Normal
        | AppState::Filtering
        | AppState::EditingSearch
        | AppState::Quitting => {}
    }
}

fn logo_lines() -> Vec<Line<'static>> {
    LOGO.iter()
        .map(|l| Line::from(Span::styled(*l, styles::title_style())))
        .collect()
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  murmur";
    let user = match &app.identity {
        Some(identity) => format!("{}  [?] Help", identity.display_name()),
        None => "not logged in  [?] Help".to_string(),
    };

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + user.chars().count() + 2),
        )),
        Span::styled(user, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let tabs = [Tab::Feed, Tab::Search, Tab::Profile];

    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in tabs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, tab.title());
        let style = if app.current_tab == *tab {
            styles::tab_style(true)
        } else {
            styles::muted_style()
        };
        spans.push(Span::styled(label, style));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    frame.render_widget(paragraph, area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_tab {
        Tab::Feed => feed::render(frame, app, area),
        Tab::Search => search::render(frame, app, area),
        Tab::Profile => profile::render(frame, app, area),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = match app.current_tab {
        Tab::Feed => "[n]ew [l]ike [c]omment [/]filter [u]pdate [q]uit",
        Tab::Search => "[/]search [Enter]open [l]ike [q]uit",
        Tab::Profile => "[f]ollow [F]ollowers [G] following [s]uggest [q]uit",
    };

    let left_text = match &app.status_message {
        Some(msg) => format!(" {} ", msg),
        None if app.feed_loading || app.profile_loading => " Loading... ".to_string(),
        None => String::new(),
    };
    let right_text = format!(" {} ", shortcuts);

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 36, frame.area());
    frame.render_widget(Clear, area);

    let mut help_text = logo_lines();
    help_text.push(Line::from(Span::styled(
        format!("              version {}", env!("CARGO_PKG_VERSION")),
        styles::muted_style(),
    )));
    help_text.extend([
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1-3", "Switch tabs"),
        help_line("←/→", "Prev/next tab"),
        help_line("Tab", "Switch focus (list ↔ detail)"),
        help_line("↑/↓ j/k", "Navigate list"),
        help_line("Enter / p", "Open author / user profile"),
        Line::from(""),
        Line::from(Span::styled(" Posts", styles::highlight_style())),
        help_line("n", "New post"),
        help_line("l", "Like / unlike"),
        help_line("c", "Comment"),
        help_line("d", "Delete your post"),
        help_line("/", "Filter feed / search"),
        help_line("u", "Reload"),
        Line::from(""),
        Line::from(Span::styled(" Profile", styles::highlight_style())),
        help_line("f", "Follow / unfollow"),
        help_line("e / N", "Edit bio / name"),
        help_line("i", "Upload profile picture"),
        help_line("F G s", "Followers, following, suggestions"),
        help_line("Esc", "Back to posts"),
        help_line("m", "My profile"),
        Line::from(""),
        help_line("L", "Log out"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// One `Label: [value▌]` form row
fn field_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let cursor = if focused { "▌" } else { "" };
    // Keep the end of long input visible
    let skip = value.chars().count().saturating_sub(24);
    let shown: String = value.chars().skip(skip).collect();
    Line::from(vec![
        Span::styled(format!("  {:>9}: [", label), styles::muted_style()),
        Span::styled(format!("{:<24}{}", shown, cursor), styles::field_style(focused)),
        Span::styled("]", styles::muted_style()),
    ])
}

fn button_line(label: &str, focused: bool) -> Line<'static> {
    let text = if focused {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    Line::from(vec![
        Span::raw("             ["),
        Span::styled(text, styles::field_style(focused)),
        Span::raw("]"),
    ])
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 15 } else { 13 };
    let area = centered_rect_fixed(48, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(field_line(
        "Email",
        &app.login_email,
        app.login_focus == LoginFocus::Email,
    ));
    lines.push(field_line(
        "Password",
        &"*".repeat(app.login_password.chars().count()),
        app.login_focus == LoginFocus::Password,
    ));
    lines.push(Line::from(""));
    lines.push(button_line("Login", app.login_focus == LoginFocus::Button));
    lines.push(button_line(
        "Create account",
        app.login_focus == LoginFocus::Register,
    ));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .title(" Log in ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_register_overlay(frame: &mut Frame, app: &App) {
    let form = &app.register;
    let height = if form.error.is_some() { 15 } else { 13 };
    let area = centered_rect_fixed(48, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.push(Line::from(""));
    lines.push(field_line("Name", &form.name, form.focus == RegisterFocus::Name));
    lines.push(field_line("Email", &form.email, form.focus == RegisterFocus::Email));
    lines.push(field_line(
        "Password",
        &"*".repeat(form.password.chars().count()),
        form.focus == RegisterFocus::Password,
    ));
    lines.push(field_line(
        "Confirm",
        &"*".repeat(form.confirm.chars().count()),
        form.focus == RegisterFocus::Confirm,
    ));
    lines.push(Line::from(""));
    lines.push(button_line("Sign up", form.focus == RegisterFocus::Button));

    if let Some(ref error) = form.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .title(" Create account (Esc to go back) ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_compose_overlay(frame: &mut Frame, app: &App) {
    let Some(compose) = &app.compose else {
        return;
    };
    let height = if compose.kind.is_multiline() { 14 } else { 7 };
    let area = centered_rect_fixed(64, height, frame.area());
    frame.render_widget(Clear, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(2)])
        .split(area);

    let mut lines: Vec<Line> = compose.text.split('\n').map(|l| Line::from(l.to_string())).collect();
    if let Some(last) = lines.last_mut() {
        last.push_span(Span::styled("▌", styles::highlight_style()));
    }

    let block = Block::default()
        .title(format!(" {} ", compose.kind.title()))
        .title_style(styles::title_style())
        .borders(Borders::TOP | Borders::LEFT | Borders::RIGHT)
        .border_style(styles::border_style(true));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        chunks[0],
    );

    let hint = if compose.kind.is_multiline() {
        "Ctrl+S send  Enter newline  Esc cancel"
    } else {
        "Enter send  Esc cancel"
    };
    let footer = match &compose.error {
        Some(error) => Line::from(Span::styled(format!(" {}", error), styles::error_style())),
        None => Line::from(vec![
            Span::styled(format!(" {} chars  ", compose.text.chars().count()), styles::muted_style()),
            Span::styled(hint, styles::muted_style()),
        ]),
    };
    let block = Block::default()
        .borders(Borders::BOTTOM | Borders::LEFT | Borders::RIGHT)
        .border_style(styles::border_style(true));
    frame.render_widget(Paragraph::new(footer).block(block), chunks[1]);
}

fn render_confirm_overlay(frame: &mut Frame, question: &str, yes: &str) {
    let area = centered_rect_fixed(48, 9, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = logo_lines();
    lines.extend([
        Line::from(""),
        Line::from(Span::styled(format!("   {}", question), styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(format!(" to {}, ", yes), styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_delete_overlay(frame: &mut Frame) {
    render_confirm_overlay(frame, "Delete this post?", "delete");
}

fn render_quit_overlay(frame: &mut Frame) {
    render_confirm_overlay(frame, "Are you sure you want to quit?", "quit");
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fixed() {
        let outer = Rect::new(0, 0, 100, 40);
        let r = centered_rect_fixed(48, 10, outer);
        assert_eq!(r, Rect::new(26, 15, 48, 10));
    }

    #[test]
    fn test_centered_rect_clamps_to_small_area() {
        let outer = Rect::new(2, 1, 30, 5);
        let r = centered_rect_fixed(48, 10, outer);
        assert_eq!(r.width, 30);
        assert_eq!(r.height, 5);
        assert_eq!((r.x, r.y), (2, 1));
    }
}
