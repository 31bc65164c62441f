//! Balance panel component.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::models::BalanceState;
use crate::push::LinkStatus;
use crate::tui::app::AccountTab;

/// The headline sentence for a balance.
pub fn balance_line(state: BalanceState) -> String {
    format!("Your balance is {state}")
}

/// The push channel sentence for a link status.
pub fn link_line(status: LinkStatus) -> String {
    match status {
        LinkStatus::Off => "No push channel for this view".to_string(),
        status => format!("The push channel is currently {}", status.label()),
    }
}

fn link_color(status: LinkStatus) -> Color {
    match status {
        LinkStatus::Connected => Color::Green,
        LinkStatus::Connecting | LinkStatus::Reconnecting => Color::Yellow,
        LinkStatus::Disconnected => Color::Red,
        LinkStatus::Off | LinkStatus::Closed => Color::DarkGray,
    }
}

/// Renders the balance panel for one tab.
pub fn render(frame: &mut Frame, area: Rect, tab: &AccountTab) {
    let balance_style = match tab.balance.state() {
        BalanceState::Unknown => Style::default().fg(Color::DarkGray),
        BalanceState::Known(_) => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    };

    let mut lines = vec![
        Line::from(Span::styled(balance_line(tab.balance.state()), balance_style)),
        Line::from(""),
        Line::from(Span::styled(
            link_line(tab.link),
            Style::default().fg(link_color(tab.link)),
        )),
    ];

    if let Some(ref payload) = tab.last_push {
        lines.push(Line::from(vec![
            Span::styled("Last message: ", Style::default().fg(Color::DarkGray)),
            Span::raw(payload.as_str()),
        ]));
    }

    if tab.deposit_pending {
        lines.push(Line::from(Span::styled(
            "Deposit in progress...",
            Style::default().fg(Color::Yellow),
        )));
    } else if let Some(amount) = tab.last_deposit {
        lines.push(Line::from(Span::styled(
            format!("Last deposit: {amount}"),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let block = Block::default()
        .title(format!(" {} ", tab.title()))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let para = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(para, area);
}
