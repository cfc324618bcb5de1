use murmur_core::utils::truncate;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::{App, AppState, Focus};
use crate::ui::styles;

use super::feed::render_post_table;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(5)])
        .split(area);

    render_query_bar(frame, app, rows[0]);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    render_user_table(frame, app, chunks[0]);

    let posts: Vec<_> = app.search_posts.iter().collect();
    render_post_table(
        frame,
        &posts,
        app.search_post_selection,
        matches!(app.focus, Focus::Detail),
        &format!(" Posts ({}) ", posts.len()),
        chunks[1],
    );
}

fn render_query_bar(frame: &mut Frame, app: &App, area: Rect) {
    let editing = matches!(app.state, AppState::EditingSearch);
    let line = if app.search_query.is_empty() && !editing {
        Line::from(Span::styled(
            " Press / to search users and posts",
            styles::muted_style(),
        ))
    } else {
        let cursor = if editing { "▌" } else { "" };
        Line::from(vec![
            Span::styled(" / ", styles::search_style()),
            Span::raw(format!("{}{}", app.search_query, cursor)),
        ])
    };

    let title = match &app.last_search {
        Some(query) => format!(" Search: \"{}\" ", query),
        None => " Search ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(editing));
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_user_table(frame: &mut Frame, app: &App, area: Rect) {
    let focused = matches!(app.focus, Focus::List);

    let header = Row::new([Cell::from("Name"), Cell::from("Email")])
        .style(styles::title_style())
        .height(1);

    let rows: Vec<Row> = app
        .search_users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let style = if i == app.search_user_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(truncate(&user.name, 24)),
                Cell::from(user.email.clone().unwrap_or_default()),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(rows, [Constraint::Percentage(45), Constraint::Fill(1)])
        .header(header)
        .block(
            Block::default()
                .title(format!(" Users ({}) ", app.search_users.len()))
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(focused)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !app.search_users.is_empty() {
        state.select(Some(app.search_user_selection));
    }

    frame.render_stateful_widget(table, area, &mut state);
}
