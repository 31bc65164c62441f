//! Status bar component.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};

use crate::push::LinkStatus;
use crate::tui::app::App;

/// Renders the status bar.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let link = app.current_tab().map_or(LinkStatus::Off, |tab| tab.link);
    let status_color = match link {
        LinkStatus::Connected => Color::Green,
        LinkStatus::Connecting | LinkStatus::Reconnecting => Color::Yellow,
        LinkStatus::Disconnected => Color::Red,
        LinkStatus::Off | LinkStatus::Closed => Color::Gray,
    };

    let tab_info = if app.tabs.is_empty() {
        " 0/0 ".to_string()
    } else {
        format!(" {}/{} ", app.active_tab + 1, app.tabs.len())
    };

    let error_span = if let Some(ref error) = app.error_message {
        Span::styled(
            format!(" {} ", error.message),
            Style::default().fg(Color::Red),
        )
    } else {
        Span::raw("")
    };

    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", link.label()),
            Style::default().fg(status_color),
        ),
        Span::raw("│"),
        error_span,
        Span::raw(format!(
            "{:>width$}",
            tab_info,
            width = area.width.saturating_sub(30) as usize
        )),
    ]);

    let para = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(para, area);
}
