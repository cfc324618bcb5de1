use murmur_core::api::ProfileView;
use murmur_core::models::UserSummary;
use murmur_core::utils::{format_timestamp, truncate};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use crate::app::{App, Focus, ProfileList};
use crate::ui::styles;

use super::feed::{render_post_detail, render_post_table};

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let Some(view) = app.profile.as_ref() else {
        let text = if app.profile_loading {
            "Loading profile..."
        } else {
            "No profile loaded. Press m for your own profile."
        };
        let block = Block::default()
            .title(" Profile ")
            .title_style(styles::muted_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(false));
        frame.render_widget(
            Paragraph::new(Span::styled(text, styles::muted_style())).block(block),
            area,
        );
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(5)])
        .split(chunks[0]);

    render_profile_card(frame, app, view, left[0]);

    let list_focused = matches!(app.focus, Focus::List);
    let detail_focused = matches!(app.focus, Focus::Detail);
    match app.profile_list {
        ProfileList::Posts => {
            let posts: Vec<_> = view.posts.iter().collect();
            render_post_table(
                frame,
                &posts,
                app.profile_selection,
                list_focused,
                &format!(" Posts ({}) ", posts.len()),
                left[1],
            );
            render_post_detail(
                frame,
                posts.get(app.profile_selection).copied(),
                detail_focused,
                chunks[1],
            );
        }
        list => {
            let users = app.profile_users();
            render_user_list(frame, list, users, app.profile_selection, list_focused, left[1]);
            render_user_detail(frame, users.get(app.profile_selection), detail_focused, chunks[1]);
        }
    }
}

fn render_profile_card(frame: &mut Frame, app: &App, view: &ProfileView, area: Rect) {
    let profile = &view.profile;
    let own = app.viewing_own_profile();

    let mut title = vec![Span::styled(profile.name.clone(), styles::title_style())];
    if own {
        title.push(Span::styled("  (you)", styles::muted_style()));
    } else if let Some(status) = &view.follow {
        if status.is_following {
            title.push(Span::styled("  ✓ following", styles::success_style()));
        }
    }

    let mut lines = vec![Line::from(title)];
    if let Some(ref email) = profile.email {
        lines.push(Line::from(Span::styled(email.clone(), styles::muted_style())));
    }
    lines.push(Line::from(vec![
        Span::styled(profile.follower_count.to_string(), styles::highlight_style()),
        Span::styled(" followers  ", styles::muted_style()),
        Span::styled(profile.following_count.to_string(), styles::highlight_style()),
        Span::styled(" following", styles::muted_style()),
    ]));
    if let Some(ref joined) = profile.date_joined {
        lines.push(Line::from(Span::styled(
            format!("Joined {}", format_timestamp(joined)),
            styles::muted_style(),
        )));
    }
    if !profile.bio_text().is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(profile.bio_text().to_string()));
    }

    let hint = if own {
        " [e]dit bio [N]ame p[i]cture "
    } else {
        " [f]ollow "
    };
    let block = Block::default()
        .title(" Profile ")
        .title_style(styles::muted_style())
        .title_bottom(Line::from(Span::styled(hint, styles::muted_style())))
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}

fn render_user_list(
    frame: &mut Frame,
    list: ProfileList,
    users: &[UserSummary],
    selection: usize,
    focused: bool,
    area: Rect,
) {
    let rows: Vec<Row> = users
        .iter()
        .enumerate()
        .map(|(i, user)| {
            let style = if i == selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![Cell::from(truncate(&user.name, 32))]).style(style)
        })
        .collect();

    let table = Table::new(rows, [Constraint::Fill(1)])
        .block(
            Block::default()
                .title(format!(" {} ({}) ", list.title(), users.len()))
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(focused)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    if !users.is_empty() {
        state.select(Some(selection));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_user_detail(frame: &mut Frame, user: Option<&UserSummary>, focused: bool, area: Rect) {
    let content = match user {
        Some(user) => {
            let mut lines = vec![Line::from(Span::styled(user.name.clone(), styles::title_style()))];
            if let Some(ref email) = user.email {
                lines.push(Line::from(Span::styled(email.clone(), styles::muted_style())));
            }
            if let Some(ref bio) = user.bio {
                lines.push(Line::from(""));
                lines.push(Line::from(bio.clone()));
            }
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Enter to open profile",
                styles::muted_style(),
            )));
            lines
        }
        None => vec![Line::from(Span::styled("Nobody here yet", styles::muted_style()))],
    };

    let block = Block::default()
        .title(" User ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused));

    frame.render_widget(
        Paragraph::new(content).block(block).wrap(Wrap { trim: false }),
        area,
    );
}
