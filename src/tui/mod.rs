//! Terminal user interface.
//!
//! One tab per open account view, each showing the balance, the state of
//! its push channel and a deposit input.

pub mod app;
pub mod components;
pub mod event;
pub mod input;
pub mod runner;
pub mod tabs;
pub mod terminal;
pub mod ui;

pub use app::{App, TabId};
pub use event::{Action, Event, Message, Operation, update};
pub use runner::run;
pub use terminal::{Tui, install_panic_hook, restore_terminal, setup_terminal};
pub use ui::render;
