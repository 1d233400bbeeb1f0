//! Frame rendering for the TUI.
//!
//! The main content area follows the route guard: a loading placeholder
//! while the authorization check is in flight, the protected home view once
//! authorized, and nothing but the login overlay otherwise. Protected
//! content is never drawn unless the guard has settled on Authorized.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, AppState, LoginFocus};
use crate::auth::GuardState;

use super::styles;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(5),    // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, chunks[0]);
    render_main_content(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }

    if matches!(app.state, AppState::LoggingIn) {
        render_login_overlay(frame, app);
    }
}

fn render_title_bar(frame: &mut Frame, area: Rect) {
    let title = "  centavo";
    let help_hint = "[?] Help";

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            area.width
                .saturating_sub(title.len() as u16 + help_hint.len() as u16 + 4)
                as usize,
        )),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.guard.state() {
        GuardState::Unknown => render_loading(frame, area),
        GuardState::Authorized => render_home(frame, app, area),
        GuardState::Unauthorized => {
            // The login overlay is the redirect destination; draw nothing
            // protected behind it.
            let placeholder = Paragraph::new(Line::from(Span::styled(
                "  Signed out",
                styles::muted_style(),
            )));
            frame.render_widget(placeholder, area);
        }
    }
}

fn render_loading(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("  Checking session ...", styles::muted_style())),
    ];
    frame.render_widget(Paragraph::new(lines), area);
}

/// The protected home view: the backend greeting.
fn render_home(frame: &mut Frame, app: &App, area: Rect) {
    let greeting = match app.greeting {
        Some(ref message) => Span::styled(message.as_str(), styles::highlight_style()),
        None => Span::styled("Fetching greeting ...", styles::muted_style()),
    };

    let lines = vec![
        Line::from(""),
        Line::from(vec![Span::raw("  "), greeting]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Home ")
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "[r]echeck | [o] logout | [q]uit";

    let left_text = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => String::from(" Ready "),
    };
    let right_text = format!(" {} ", shortcuts);

    let padding = (area.width as usize)
        .saturating_sub(left_text.len())
        .saturating_sub(right_text.len());

    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding)),
        Span::styled(right_text, styles::muted_style()),
    ]);

    frame.render_widget(Paragraph::new(status_line), area);
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(46, height, frame.area());

    frame.render_widget(Clear, area);

    let mut lines = vec![];

    lines.push(Line::from(Span::styled(
        "              centavo login",
        styles::title_style(),
    )));
    lines.push(Line::from(""));

    let username_focused = app.login_focus == LoginFocus::Username;
    let username_style = if username_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if username_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Username: [", styles::muted_style()),
        Span::styled(
            format!("{:<16}{}", app.login_username, cursor),
            username_style,
        ),
        Span::styled("]", styles::muted_style()),
    ]));

    let password_focused = app.login_focus == LoginFocus::Password;
    let password_style = if password_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let password_masked: String = "*".repeat(app.login_password.len().min(16));
    let cursor = if password_focused { "▌" } else { "" };
    lines.push(Line::from(vec![
        Span::raw("      "),
        Span::styled("Password: [", styles::muted_style()),
        Span::styled(format!("{:<16}{}", password_masked, cursor), password_style),
        Span::styled("]", styles::muted_style()),
    ]));

    let button_focused = app.login_focus == LoginFocus::Button;
    let button_label = if button_focused { " ▶ Login ◀ " } else { "   Login   " };
    let button_style = if button_focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("            ["),
        Span::styled(button_label, button_style),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 10, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(" Keys", styles::title_style())),
        Line::from(""),
        Line::from("  r      re-run the session check"),
        Line::from("  o      log out"),
        Line::from("  ?      toggle this help"),
        Line::from("  q      quit"),
        Line::from(""),
        Line::from(Span::styled("  Esc closes this overlay", styles::muted_style())),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Help ")
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// A fixed-size rect centered in `r`, clamped to its bounds.
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
