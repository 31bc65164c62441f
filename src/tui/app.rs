//! Application state for the TUI.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;

use crate::models::{DepositAmount, Scope};
use crate::push::LinkStatus;
use crate::sync::{BalanceView, Seq};

use super::input::TextInput;

/// How long an error stays in the status bar.
const ERROR_DISPLAY_DURATION: Duration = Duration::from_secs(5);

/// Central application state container.
pub struct App {
    // -- Tab State --
    /// One tab per open account view.
    pub tabs: Vec<AccountTab>,
    /// Index of the currently active tab.
    pub active_tab: usize,

    // -- Input State --
    /// Current input mode.
    pub mode: Mode,
    /// Deposit amount being typed.
    pub deposit_input: TextInput,
    /// Account id being typed.
    pub account_input: TextInput,

    // -- UI State --
    /// Error message to display (clears after timeout).
    pub error_message: Option<ErrorDisplay>,

    // -- Internal --
    /// Flag to signal application should quit.
    pub should_quit: bool,
    /// Id handed to the next opened tab.
    next_tab_id: u64,
}

impl App {
    /// Creates the application with one tab per scope, in order.
    pub fn new(scopes: impl IntoIterator<Item = Scope>) -> Self {
        let mut app = Self {
            tabs: Vec::new(),
            active_tab: 0,
            mode: Mode::Normal,
            deposit_input: TextInput::new(),
            account_input: TextInput::new(),
            error_message: None,
            should_quit: false,
            next_tab_id: 0,
        };
        for scope in scopes {
            app.open_tab(scope);
        }
        app.active_tab = 0;
        app
    }

    /// Returns the currently active tab.
    pub fn current_tab(&self) -> Option<&AccountTab> {
        self.tabs.get(self.active_tab)
    }

    pub fn current_tab_mut(&mut self) -> Option<&mut AccountTab> {
        self.tabs.get_mut(self.active_tab)
    }

    /// Returns the tab showing `scope`, if open.
    pub fn tab(&self, scope: &Scope) -> Option<&AccountTab> {
        self.tabs.iter().find(|tab| &tab.scope == scope)
    }

    pub fn tab_mut(&mut self, scope: &Scope) -> Option<&mut AccountTab> {
        self.tabs.iter_mut().find(|tab| &tab.scope == scope)
    }

    /// Returns `true` if the tab for `scope` is still the one opened as `id`.
    pub fn is_open(&self, scope: &Scope, id: TabId) -> bool {
        self.tab(scope).is_some_and(|tab| tab.id == id)
    }

    /// Switches to the next tab.
    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active_tab = (self.active_tab + 1) % self.tabs.len();
        }
    }

    /// Switches to the previous tab.
    pub fn previous_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active_tab = self
                .active_tab
                .checked_sub(1)
                .unwrap_or(self.tabs.len() - 1);
        }
    }

    /// Opens and focuses a tab for `scope`.
    ///
    /// Returns `false` if one was already open; that tab is focused instead.
    pub fn open_tab(&mut self, scope: Scope) -> bool {
        if let Some(pos) = self.tabs.iter().position(|tab| tab.scope == scope) {
            self.active_tab = pos;
            return false;
        }
        let id = TabId(self.next_tab_id);
        self.next_tab_id += 1;
        self.tabs.push(AccountTab::new(scope, id));
        self.active_tab = self.tabs.len() - 1;
        true
    }

    /// Closes the active tab and returns its scope.
    pub fn close_current_tab(&mut self) -> Option<Scope> {
        if self.active_tab >= self.tabs.len() {
            return None;
        }
        let tab = self.tabs.remove(self.active_tab);
        if self.active_tab >= self.tabs.len() && self.active_tab > 0 {
            self.active_tab = self.tabs.len() - 1;
        }
        Some(tab.scope)
    }

    /// Applies a tagged balance to the tab for `scope`.
    ///
    /// Returns `false` if the tab is gone or the value is older than the
    /// one displayed.
    pub fn apply_balance(&mut self, scope: &Scope, seq: Seq, balance: Decimal) -> bool {
        self.tab_mut(scope)
            .is_some_and(|tab| tab.balance.apply(seq, balance))
    }

    /// Sets an error message to display.
    pub fn show_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(ErrorDisplay {
            message: message.into(),
            timestamp: Instant::now(),
        });
    }

    /// Clears error messages older than [`ERROR_DISPLAY_DURATION`].
    pub fn clear_stale_errors(&mut self) {
        if let Some(ref error) = self.error_message
            && error.timestamp.elapsed() > ERROR_DISPLAY_DURATION
        {
            self.error_message = None;
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new([Scope::Global])
    }
}

/// Identifies one opening of a tab. Reopening an account yields a new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TabId(u64);

/// State of one account view.
#[derive(Clone, Debug)]
pub struct AccountTab {
    pub id: TabId,
    /// Which balance this tab shows.
    pub scope: Scope,
    /// Displayed balance and the tag it came from.
    pub balance: BalanceView,
    /// State of the push channel.
    pub link: LinkStatus,
    /// Raw text of the last push message received.
    pub last_push: Option<String>,
    /// A deposit is in flight; further submissions are refused.
    pub deposit_pending: bool,
    /// Most recent accepted deposit.
    pub last_deposit: Option<DepositAmount>,
}

impl AccountTab {
    pub fn new(scope: Scope, id: TabId) -> Self {
        Self {
            id,
            scope,
            balance: BalanceView::new(),
            link: LinkStatus::Off,
            last_push: None,
            deposit_pending: false,
            last_deposit: None,
        }
    }

    pub fn title(&self) -> String {
        self.scope.title()
    }
}

/// Input mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Normal,
    /// Typing a deposit amount.
    DepositInput,
    /// Typing an account id to open.
    AccountInput,
}

/// Error message with timestamp for auto-clear.
#[derive(Clone, Debug)]
pub struct ErrorDisplay {
    /// The error message.
    pub message: String,
    /// When the error was shown.
    pub timestamp: Instant,
}
