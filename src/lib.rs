//! Terminal client for a bank account balance service.
//!
//! Reads balances and submits deposits over HTTP, and keeps the display
//! current through a push channel (a shared or per-account WebSocket feed,
//! or server-sent events) with reconnection and latest-sequence-wins
//! ordering.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod push;
pub mod rest;
pub mod session;
pub mod sse;
pub mod sync;
pub mod tui;
pub mod websocket;

pub use error::{BankviewError, Result};
