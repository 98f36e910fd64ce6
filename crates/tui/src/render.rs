use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone, Utc};
use dbcopilot_core::chat::{ChatSurface, MAX_MESSAGE_CHARS};
use dbcopilot_core::registry::{field_label, is_secret_field};
use dbcopilot_core::routes::Route;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::{HomePane, LoginField, SignupField, TuiApp, WizardFocus};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub(crate) fn render(frame: &mut Frame<'_>, app: &TuiApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);

    match &app.route {
        Route::Landing => render_landing(frame, chunks[1]),
        Route::Login => render_login(frame, app, chunks[1]),
        Route::Signup => render_signup(frame, app, chunks[1]),
        Route::Home => render_home(frame, app, chunks[1]),
        Route::Chat { .. } => render_chat(frame, app, chunks[1]),
    }

    let footer = Paragraph::new(vec![
        Line::from(key_hints(app)),
        Line::from(format!("Status: {}", app.status_line)),
    ])
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    frame.render_widget(footer, chunks[2]);

    if app.show_help {
        render_help_popup(frame);
    }
}

fn render_header(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let account = app
        .session
        .user()
        .map_or_else(|| "signed out".to_string(), |user| user.email);
    let activity = if app.busy {
        format!("working {}", spinner(app.ticks))
    } else {
        "idle".to_string()
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", app.route.title()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::raw(format!("Account: {account}")),
        Span::raw(" | "),
        Span::raw(activity),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("Database Copilot"),
    );
    frame.render_widget(header, area);
}

fn render_landing(frame: &mut Frame<'_>, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            "Database Copilot",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("Talk to your databases in plain language."),
        Line::from(""),
        Line::from("l: sign in"),
        Line::from("s: create an account"),
        Line::from("q: quit"),
    ];
    let body = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    frame.render_widget(body, area);
}

fn render_login(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let lines = vec![
        Line::from("Sign in to continue"),
        Line::from(""),
        field_line(
            app.login_field == LoginField::Email,
            "Email",
            &app.login_form.email,
        ),
        field_line(
            app.login_field == LoginField::Password,
            "Password",
            &mask(&app.login_form.password),
        ),
    ];
    let body = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Sign In"));
    frame.render_widget(body, area);
}

fn render_signup(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let form = &app.signup_form;
    let mut lines = vec![Line::from("Create your account"), Line::from("")];
    for (field, value) in [
        (SignupField::Name, form.name.clone()),
        (SignupField::Email, form.email.clone()),
        (SignupField::Password, mask(&form.password)),
        (SignupField::ConfirmPassword, mask(&form.confirm_password)),
    ] {
        lines.push(field_line(app.signup_field == field, field.label(), &value));
    }
    let body = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Create Account"),
    );
    frame.render_widget(body, area);
}

fn render_home(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    let wizard = &app.wizard;
    let focused = |focus: WizardFocus| app.home_pane == HomePane::Wizard && app.wizard_focus == focus;

    let mut lines = vec![
        Line::from("Left/Right: choose | Tab: next field | Enter: connect"),
        Line::from(""),
        field_line(
            focused(WizardFocus::DatabaseType),
            "Database Type",
            wizard.db_type().map_or("< choose >", |db_type| db_type.label()),
        ),
    ];
    if wizard.db_type().is_some() {
        let provider = wizard
            .provider()
            .map_or_else(|| "< choose >".to_string(), |provider| provider.label());
        lines.push(field_line(
            focused(WizardFocus::Provider),
            "Provider",
            &provider,
        ));
    }
    if wizard.provider().is_some() {
        lines.push(field_line(
            focused(WizardFocus::Name),
            "Connection Name",
            wizard.name(),
        ));
        for (index, field) in wizard.credential_fields().iter().enumerate() {
            let value = wizard.credential(field);
            let shown = if is_secret_field(field) {
                mask(value)
            } else {
                value.to_string()
            };
            lines.push(field_line(
                focused(WizardFocus::Credential(index)),
                &field_label(field),
                &shown,
            ));
        }
        lines.push(Line::from(""));
        let label = if app.busy { "[ Connecting... ]" } else { "[ Connect ]" };
        let style = if focused(WizardFocus::Connect) {
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Cyan)
        };
        lines.push(Line::from(Span::styled(label, style)));
    }

    let wizard_block = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("New Connection"),
    );
    frame.render_widget(wizard_block, columns[0]);

    let mut entries = Vec::new();
    if app.connections_loading {
        entries.push(Line::from(format!("Loading {}", spinner(app.ticks))));
    } else if app.connections.is_empty() {
        entries.push(Line::from("No connections yet"));
    }
    for (index, connection) in app.connections.iter().enumerate() {
        let marker = if app.home_pane == HomePane::Connections && index == app.selected_connection
        {
            ">"
        } else {
            " "
        };
        let state = if connection.connected { "up" } else { "down" };
        entries.push(Line::from(format!(
            "{marker} {} ({}, {state})",
            connection.db_name, connection.db_provider_name
        )));
    }
    let sidebar = Paragraph::new(entries).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Connections"),
    );
    frame.render_widget(sidebar, columns[1]);
}

fn render_chat(frame: &mut Frame<'_>, app: &TuiApp, area: Rect) {
    let Some(chat) = app.chat.as_ref() else {
        return;
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(area);

    let transcript = transcript_lines(chat, app.ticks);
    let inner_width = rows[0].width.saturating_sub(2).max(1);
    let inner_height = rows[0].height.saturating_sub(2);
    let wrapped_height: usize = transcript
        .iter()
        .map(|line| line.width().max(1).div_ceil(usize::from(inner_width)))
        .sum();
    let scroll = u16::try_from(wrapped_height)
        .unwrap_or(u16::MAX)
        .saturating_sub(inner_height);

    let messages = Paragraph::new(transcript)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(Block::default().borders(Borders::ALL).title(format!(
            "Connection {}",
            chat.short_connection_id()
        )));
    frame.render_widget(messages, rows[0]);

    let input = Paragraph::new(chat.input()).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Message {}/{MAX_MESSAGE_CHARS}", chat.input_len())),
    );
    frame.render_widget(input, rows[1]);
}

fn transcript_lines(chat: &ChatSurface, ticks: u64) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in chat.messages() {
        let (author, color) = if message.is_user() {
            ("You", Color::Cyan)
        } else {
            ("Copilot", Color::Green)
        };
        lines.push(Line::from(vec![
            Span::styled(
                author,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {}", clock_label(message.created_at)),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        lines.extend(message.text.lines().map(|text| Line::from(text.to_string())));
        lines.push(Line::from(""));
    }
    if chat.is_pending() {
        lines.push(Line::from(Span::styled(
            format!("Copilot is thinking {}", spinner(ticks)),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn field_line(focused: bool, label: &str, value: &str) -> Line<'static> {
    let marker = if focused { ">" } else { " " };
    let style = if focused {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    Line::from(Span::styled(format!("{marker} {label}: {value}"), style))
}

fn key_hints(app: &TuiApp) -> String {
    let hints = match app.route {
        Route::Landing => "l: sign in | s: sign up | F1: help | Ctrl+C: quit",
        Route::Login | Route::Signup => "Tab: next field | Enter: submit | Esc: back | F1: help",
        Route::Home => {
            "Tab: next field | F2: switch pane | Ctrl+R: refresh | Ctrl+O: sign out | F1: help"
        }
        Route::Chat { .. } => "Enter: send | Esc: back to home | Ctrl+O: sign out | F1: help",
    };
    hints.to_string()
}

pub(crate) fn mask(value: &str) -> String {
    "*".repeat(value.chars().count())
}

fn spinner(ticks: u64) -> &'static str {
    let index = usize::try_from(ticks % 4).unwrap_or(0);
    SPINNER[index]
}

/// `HH:MM` in the local time zone.
fn clock_label(at: DateTime<Utc>) -> String {
    clock_label_in(at, &Local)
}

pub(crate) fn clock_label_in<Tz>(at: DateTime<Utc>, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.with_timezone(zone).format("%H:%M").to_string()
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Global keymap"),
        Line::from("Ctrl+C / Ctrl+Q: quit"),
        Line::from("F1: toggle help"),
        Line::from("Tab / Shift+Tab: next or previous field"),
        Line::from("Left / Right: choose database type or provider"),
        Line::from("Enter: submit form, connect or send message"),
        Line::from("F2: switch between form and saved connections"),
        Line::from("Ctrl+R: reload connections"),
        Line::from("Ctrl+O: sign out"),
        Line::from("Esc: go back"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{FixedOffset, TimeZone, Utc};
    use dbcopilot_core::registry::CredentialRegistry;
    use dbcopilot_core::session::SessionContext;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    use super::{clock_label_in, mask, render};
    use crate::app::{Msg, TuiApp};

    fn screen_text(app: &TuiApp) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).expect("test terminal");
        terminal
            .draw(|frame| render(frame, app))
            .expect("draw should succeed");
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(ratatui::buffer::Cell::symbol)
            .collect()
    }

    #[test]
    fn secrets_are_masked_per_character() {
        assert_eq!(mask("hunter2"), "*******");
        assert_eq!(mask(""), "");
    }

    #[test]
    fn clock_label_uses_the_viewer_time_zone() {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 1, 13, 7, 42)
            .single()
            .expect("valid timestamp");
        assert_eq!(clock_label_in(at, &Utc), "13:07");

        let kolkata = FixedOffset::east_opt(5 * 3_600 + 30 * 60).expect("valid offset");
        assert_eq!(clock_label_in(at, &kolkata), "18:37");

        let midnight = Utc
            .with_ymd_and_hms(1970, 1, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp");
        assert_eq!(clock_label_in(midnight, &kolkata), "05:30");
    }

    #[test]
    fn login_view_never_shows_the_password() {
        let session = Arc::new(SessionContext::in_memory());
        let mut app = TuiApp::new(session, CredentialRegistry::default());
        app.handle(Msg::Input('l'));
        for ch in "ada@example.com".chars() {
            app.handle(Msg::Input(ch));
        }
        app.handle(Msg::NextField);
        for ch in "sekret".chars() {
            app.handle(Msg::Input(ch));
        }

        let text = screen_text(&app);
        assert!(text.contains("ada@example.com"));
        assert!(text.contains("******"));
        assert!(!text.contains("sekret"));
    }
}
