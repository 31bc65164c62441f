//! Main UI loop.

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::Scope;
use crate::session::Sessions;
use crate::{BankviewError, Result};

use super::app::App;
use super::event::{Action, spawn_event_reader, spawn_tick_timer, update};
use super::terminal::Tui;
use super::ui::render;

/// Interval between ticks, which redraw and expire old errors.
const TICK_INTERVAL_MS: u64 = 250;

/// Runs the UI until the user quits. Every session is closed on return.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or drawing fails.
pub async fn run(terminal: &mut Tui, config: AppConfig, scopes: Vec<Scope>) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_event_reader(tx.clone());
    spawn_tick_timer(tx.clone(), TICK_INTERVAL_MS);

    let mut sessions = Sessions::new(config, tx)?;
    let mut app = App::new(scopes);
    for tab in &app.tabs {
        sessions.open(tab.scope.clone(), tab.id);
    }
    info!(views = sessions.open_count(), "UI started");

    loop {
        terminal
            .draw(|frame| render(frame, &app))
            .map_err(|e| BankviewError::Io(format!("failed to draw: {e}")))?;

        let Some(message) = rx.recv().await else {
            break;
        };
        if let Some(action) = update(&mut app, message) {
            dispatch(&mut sessions, action);
        }
        if app.should_quit {
            break;
        }
    }

    sessions.close_all();
    info!("UI stopped");
    Ok(())
}

/// Performs the network side of an [`Action`].
pub fn dispatch(sessions: &mut Sessions, action: Action) {
    match action {
        Action::OpenAccount(scope, tab) => sessions.open(scope, tab),
        Action::CloseAccount(scope) => sessions.close(&scope),
        Action::Refresh(scope) => match sessions.get(&scope) {
            Some(session) => {
                session.refresh();
            }
            None => warn!(scope = ?scope, "Refresh for a view without a session"),
        },
        Action::Deposit(scope, amount) => match sessions.get(&scope) {
            Some(session) => {
                session.deposit(amount);
            }
            None => warn!(scope = ?scope, "Deposit for a view without a session"),
        },
    }
}
