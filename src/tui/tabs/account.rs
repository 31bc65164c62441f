//! Account tab layout and rendering.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};

use crate::models::FIXED_DEPOSIT;
use crate::tui::app::{App, Mode};
use crate::tui::components::{balance, status_bar, tab_bar};
use crate::tui::input::TextInput;

/// Renders the active account tab.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Tab bar
            Constraint::Length(1), // Status bar
            Constraint::Min(7),    // Balance panel
            Constraint::Length(3), // Input
            Constraint::Length(1), // Keybindings help
        ])
        .split(area);

    tab_bar::render(frame, main_layout[0], app);
    status_bar::render(frame, main_layout[1], app);

    match app.current_tab() {
        Some(tab) => balance::render(frame, main_layout[2], tab),
        None => render_empty(frame, main_layout[2]),
    }

    match app.mode {
        Mode::AccountInput => render_input(
            frame,
            main_layout[3],
            " Open account ",
            &app.account_input,
            true,
        ),
        mode => render_input(
            frame,
            main_layout[3],
            " Deposit amount ",
            &app.deposit_input,
            mode == Mode::DepositInput,
        ),
    }

    render_keybindings(frame, main_layout[4], app);
}

fn render_empty(frame: &mut Frame, area: Rect) {
    let para = Paragraph::new("No account views open. Press [a] to open one.")
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(para, area);
}

/// Renders a single-line input box, with the cursor when `active`.
fn render_input(frame: &mut Frame, area: Rect, title: &str, input: &TextInput, active: bool) {
    let border_style = if active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let prompt = "> ";
    frame.render_widget(Paragraph::new(format!("{prompt}{}", input.as_str())), inner);

    if active {
        let cursor_x = inner.x + prompt.len() as u16 + input.cursor_column();
        frame.set_cursor_position((cursor_x.min(inner.right().saturating_sub(1)), inner.y));
    }
}

/// Renders the keybindings help line.
fn render_keybindings(frame: &mut Frame, area: Rect, app: &App) {
    let help = match app.mode {
        Mode::DepositInput => "[Esc]cancel [Enter]deposit".to_string(),
        Mode::AccountInput => "[Esc]cancel [Enter]open".to_string(),
        Mode::Normal => format!(
            "[Tab]switch [d]deposit [f]deposit {FIXED_DEPOSIT} [r]refresh [a]open [x]close [q]quit"
        ),
    };

    let para = Paragraph::new(help).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(para, area);
}
