//! Widgets shared across tabs.

pub mod balance;
pub mod status_bar;
pub mod tab_bar;
