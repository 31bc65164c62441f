//! Main UI rendering coordinator.

use ratatui::Frame;

use super::app::App;
use super::tabs::account;

/// Renders the entire application UI.
pub fn render(frame: &mut Frame, app: &App) {
    account::render(frame, app);
}

#[cfg(test)]
mod tests {
    use ratatui::{Terminal, backend::TestBackend};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{AccountId, Scope};
    use crate::push::LinkStatus;
    use crate::sync::Sequencer;

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 14)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn renders_balance_and_link_state() {
        let id = AccountId::parse("acc-1").unwrap();
        let mut app = App::new([Scope::Account(id)]);
        app.tabs[0].balance.apply(Sequencer::new().next(), dec!(42));
        app.tabs[0].link = LinkStatus::Connected;

        let text = screen(&app);
        assert!(text.contains("Account acc-1"));
        assert!(text.contains("Your balance is 42"));
        assert!(text.contains("The push channel is currently Open"));
    }

    #[test]
    fn renders_without_tabs() {
        let mut app = App::default();
        app.close_current_tab();
        assert!(screen(&app).contains("No account views open"));
    }
}
