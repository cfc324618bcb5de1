use chrono::Utc;
use murmur_core::models::Post;
use murmur_core::utils::{format_timestamp, relative_age, truncate};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use crate::app::{App, AppState, Focus};
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let filtering = matches!(app.state, AppState::Filtering) || !app.feed_filter.is_empty();
    let list_area = if filtering {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(chunks[0]);
        render_filter_bar(frame, app, parts[0]);
        parts[1]
    } else {
        chunks[0]
    };

    let posts = app.visible_feed();
    render_post_table(
        frame,
        &posts,
        app.feed_selection,
        matches!(app.focus, Focus::List),
        &format!(" Feed ({}) ", posts.len()),
        list_area,
    );
    render_post_detail(
        frame,
        posts.get(app.feed_selection).copied(),
        matches!(app.focus, Focus::Detail),
        chunks[1],
    );
}

fn render_filter_bar(frame: &mut Frame, app: &App, area: Rect) {
    let editing = matches!(app.state, AppState::Filtering);
    let cursor = if editing { "▌" } else { "" };
    let line = Line::from(vec![
        Span::styled(" / ", styles::search_style()),
        Span::raw(format!("{}{}", app.feed_filter, cursor)),
    ]);
    let block = Block::default()
        .title(" Filter ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(editing));
    frame.render_widget(Paragraph::new(line).block(block), area);
}

/// Post list shared by the feed, search and profile tabs
pub fn render_post_table(
    frame: &mut Frame,
    posts: &[&Post],
    selection: usize,
    focused: bool,
    title: &str,
    area: Rect,
) {
    let header = Row::new([
        Cell::from("Author"),
        Cell::from("Post"),
        Cell::from("♥"),
        Cell::from("When"),
    ])
    .style(styles::title_style())
    .height(1);

    let now = Utc::now();
    let rows: Vec<Row> = posts
        .iter()
        .enumerate()
        .map(|(i, post)| {
            let style = if i == selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let when = post
                .created_at
                .as_ref()
                .map(|ts| relative_age(ts, now))
                .unwrap_or_default();

            Row::new(vec![
                Cell::from(truncate(&post.user_name, 16)),
                Cell::from(post.content.lines().next().unwrap_or("").to_string()),
                Cell::from(Span::styled(
                    post.like_count.to_string(),
                    styles::like_style(post.is_liked),
                )),
                Cell::from(when),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(16),
        Constraint::Fill(1),
        Constraint::Length(5),
        Constraint::Length(9),
    ];

    let empty = posts.is_empty();
    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title.to_string())
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(focused)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !empty {
        state.select(Some(selection));
    }

    frame.render_stateful_widget(table, area, &mut state);
}

/// Full post with its comments
pub fn render_post_detail(frame: &mut Frame, post: Option<&Post>, focused: bool, area: Rect) {
    let content = match post {
        Some(post) => {
            let mut lines = vec![
                Line::from(Span::styled(post.user_name.clone(), styles::author_style())),
                Line::from(Span::styled(
                    post.created_at
                        .as_ref()
                        .map(format_timestamp)
                        .unwrap_or_default(),
                    styles::muted_style(),
                )),
                Line::from(""),
            ];
            lines.extend(post.content.lines().map(|l| Line::from(l.to_string())));
            if let Some(ref image) = post.image {
                lines.push(Line::from(Span::styled(
                    format!("[image] {}", image),
                    styles::muted_style(),
                )));
            }
            lines.push(Line::from(""));

            let heart = if post.is_liked { "♥" } else { "♡" };
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} {} likes", heart, post.like_count),
                    styles::like_style(post.is_liked),
                ),
                Span::styled(
                    format!("   {} comments", post.comment_count),
                    styles::muted_style(),
                ),
            ]));

            if !post.comments.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Comments", styles::highlight_style())));
                for comment in &post.comments {
                    lines.push(Line::from(vec![
                        Span::styled(format!("  {}: ", comment.user_name), styles::author_style()),
                        Span::raw(comment.text.clone()),
                    ]));
                }
            }
            lines
        }
        None => vec![Line::from(Span::styled(
            "No post selected",
            styles::muted_style(),
        ))],
    };

    let block = Block::default()
        .title(" Post ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused));

    frame.render_widget(
        Paragraph::new(content).block(block).wrap(Wrap { trim: false }),
        area,
    );
}
