//! Alufab back office - ledger and glass calculator services
//!
//! Wraps the pure domain in `shared` with a record store, per-key locking,
//! configuration, logging and a command dispatcher.

pub mod commands;
pub mod config;
pub mod error;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, AppResult};
