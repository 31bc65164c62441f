//! Event handling for the TUI.

use std::time::Duration;

use crossterm::event::{
    Event as CrosstermEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use futures_util::StreamExt;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::{AccountId, DepositAmount, Scope};
use crate::push::LinkStatus;
use crate::sync::Seq;

use super::app::{App, Mode, TabId};

/// Events that can occur in the application.
#[derive(Debug)]
pub enum Event {
    /// A key was pressed.
    Key(KeyEvent),
    /// Terminal was resized.
    Resize(u16, u16),
    /// Periodic tick for UI updates.
    Tick,
}

/// Which request a failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Fetch,
    Deposit,
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Fetch => "balance read",
            Operation::Deposit => "deposit",
        }
    }
}

/// Messages that update application state.
#[derive(Debug)]
pub enum Message {
    /// Input event from terminal.
    Input(Event),

    /// A balance read completed.
    BalanceFetched {
        scope: Scope,
        tab: TabId,
        seq: Seq,
        balance: Decimal,
    },
    /// A deposit was accepted. `balance` is `None` when the server did not
    /// return one; a read has been issued in that case.
    DepositCompleted {
        scope: Scope,
        tab: TabId,
        seq: Seq,
        amount: DepositAmount,
        balance: Option<Decimal>,
    },
    /// A read or deposit failed.
    RequestFailed {
        scope: Scope,
        tab: TabId,
        operation: Operation,
        error: String,
    },

    /// A push message carrying a balance.
    PushBalance {
        scope: Scope,
        seq: Seq,
        balance: Decimal,
        payload: String,
    },
    /// A push message without a balance; a read has been issued.
    PushSignal { scope: Scope, payload: String },
    /// A push message that could not be decoded; a read has been issued.
    PushMalformed {
        scope: Scope,
        payload: String,
        reason: String,
    },
    /// The push channel of a view changed state.
    Link { scope: Scope, status: LinkStatus },
}

/// Actions that require network work.
#[derive(Debug, PartialEq, Eq)]
pub enum Action {
    /// Open a session for a newly added tab.
    OpenAccount(Scope, TabId),
    /// Tear down the session of a closed tab.
    CloseAccount(Scope),
    /// Re-read the balance.
    Refresh(Scope),
    /// Submit a validated deposit.
    Deposit(Scope, DepositAmount),
}

/// Spawns a task that forwards terminal events to a channel.
pub fn spawn_event_reader(tx: mpsc::UnboundedSender<Message>) {
    tokio::spawn(async move {
        let mut events = EventStream::new();
        while let Some(event) = events.next().await {
            let message = match event {
                Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    Message::Input(Event::Key(key))
                }
                Ok(CrosstermEvent::Resize(w, h)) => Message::Input(Event::Resize(w, h)),
                Ok(_) => continue,
                Err(e) => {
                    warn!("Terminal event stream failed: {e}");
                    break;
                }
            };
            if tx.send(message).is_err() {
                break;
            }
        }
    });
}

/// Spawns a task that sends periodic tick events.
pub fn spawn_tick_timer(tx: mpsc::UnboundedSender<Message>, interval_ms: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            interval.tick().await;
            if tx.send(Message::Input(Event::Tick)).is_err() {
                break;
            }
        }
    });
}

/// Updates application state based on a message.
pub fn update(app: &mut App, message: Message) -> Option<Action> {
    match message {
        Message::Input(event) => handle_input(app, event),
        Message::BalanceFetched { scope, tab, seq, .. } if !app.is_open(&scope, tab) => {
            debug!(scope = ?scope, seq = seq.get(), "Discarded read for a closed view");
            None
        }
        Message::DepositCompleted { scope, tab, seq, .. } if !app.is_open(&scope, tab) => {
            debug!(scope = ?scope, seq = seq.get(), "Discarded deposit result for a closed view");
            None
        }
        Message::RequestFailed { scope, tab, .. } if !app.is_open(&scope, tab) => {
            debug!(scope = ?scope, "Discarded failure for a closed view");
            None
        }
        Message::BalanceFetched {
            scope,
            seq,
            balance,
            ..
        } => {
            if !app.apply_balance(&scope, seq, balance) {
                debug!(scope = ?scope, seq = seq.get(), "Discarded stale balance read");
            }
            None
        }
        Message::DepositCompleted {
            scope,
            seq,
            amount,
            balance,
            ..
        } => {
            if let Some(tab) = app.tab_mut(&scope) {
                tab.deposit_pending = false;
                tab.last_deposit = Some(amount);
            }
            if let Some(balance) = balance
                && !app.apply_balance(&scope, seq, balance)
            {
                debug!(scope = ?scope, seq = seq.get(), "Discarded stale deposit result");
            }
            None
        }
        Message::RequestFailed {
            scope,
            operation,
            error,
            ..
        } => {
            if operation == Operation::Deposit
                && let Some(tab) = app.tab_mut(&scope)
            {
                tab.deposit_pending = false;
            }
            app.show_error(format!("{} failed: {error}", operation.label()));
            None
        }
        Message::PushBalance {
            scope,
            seq,
            balance,
            payload,
        } => {
            if let Some(tab) = app.tab_mut(&scope) {
                tab.last_push = Some(payload);
            }
            app.apply_balance(&scope, seq, balance);
            None
        }
        Message::PushSignal { scope, payload } => {
            if let Some(tab) = app.tab_mut(&scope) {
                tab.last_push = Some(payload);
            }
            None
        }
        Message::PushMalformed {
            scope,
            payload,
            reason,
        } => {
            if let Some(tab) = app.tab_mut(&scope) {
                tab.last_push = Some(payload);
                app.show_error(format!("unreadable push message: {reason}"));
            }
            None
        }
        Message::Link { scope, status } => {
            if let Some(tab) = app.tab_mut(&scope) {
                tab.link = status;
            }
            None
        }
    }
}

/// Handles input events and updates application state.
fn handle_input(app: &mut App, event: Event) -> Option<Action> {
    match event {
        Event::Key(key) => handle_key(app, key),
        Event::Resize(_, _) => None,
        Event::Tick => {
            app.clear_stale_errors();
            None
        }
    }
}

/// Handles key press events.
fn handle_key(app: &mut App, key: KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return None;
    }

    match app.mode {
        Mode::Normal => handle_normal_mode(app, key),
        Mode::DepositInput => handle_deposit_input(app, key),
        Mode::AccountInput => handle_account_input(app, key),
    }
}

/// Handles keys in normal mode.
fn handle_normal_mode(app: &mut App, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            None
        }

        // Tab navigation
        KeyCode::Tab => {
            if key.modifiers.contains(KeyModifiers::SHIFT) {
                app.previous_tab();
            } else {
                app.next_tab();
            }
            None
        }
        KeyCode::BackTab => {
            app.previous_tab();
            None
        }

        KeyCode::Char('a') => {
            app.account_input.clear();
            app.mode = Mode::AccountInput;
            None
        }
        KeyCode::Char('x') => app.close_current_tab().map(Action::CloseAccount),

        KeyCode::Char('r') => app
            .current_tab()
            .map(|tab| Action::Refresh(tab.scope.clone())),
        KeyCode::Char('d') | KeyCode::Char('i') => {
            if app.current_tab().is_some() {
                app.mode = Mode::DepositInput;
            }
            None
        }
        KeyCode::Char('f') => submit_deposit(app, DepositAmount::fixed()),

        _ => None,
    }
}

/// Handles keys while typing a deposit amount.
fn handle_deposit_input(app: &mut App, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => {
            app.deposit_input.clear();
            app.mode = Mode::Normal;
            None
        }
        KeyCode::Enter => match DepositAmount::parse(app.deposit_input.as_str()) {
            Ok(amount) => {
                app.deposit_input.clear();
                app.mode = Mode::Normal;
                submit_deposit(app, amount)
            }
            // Leave the text in place so it can be corrected.
            Err(e) => {
                app.show_error(e.to_string());
                None
            }
        },
        _ => {
            app.deposit_input.handle_key(key);
            None
        }
    }
}

/// Handles keys while typing an account id.
fn handle_account_input(app: &mut App, key: KeyEvent) -> Option<Action> {
    match key.code {
        KeyCode::Esc => {
            app.account_input.clear();
            app.mode = Mode::Normal;
            None
        }
        KeyCode::Enter => match AccountId::parse(app.account_input.as_str()) {
            Ok(id) => {
                app.account_input.clear();
                app.mode = Mode::Normal;
                if !app.open_tab(Scope::Account(id)) {
                    return None;
                }
                app.current_tab()
                    .map(|tab| Action::OpenAccount(tab.scope.clone(), tab.id))
            }
            Err(e) => {
                app.show_error(e.to_string());
                None
            }
        },
        _ => {
            app.account_input.handle_key(key);
            None
        }
    }
}

/// Submits a deposit for the active tab unless one is already in flight.
fn submit_deposit(app: &mut App, amount: DepositAmount) -> Option<Action> {
    let tab = app.current_tab_mut()?;
    if tab.deposit_pending {
        app.show_error("a deposit is already in progress");
        return None;
    }
    tab.deposit_pending = true;
    Some(Action::Deposit(tab.scope.clone(), amount))
}
