//! Core library for cachewatch.
//!
//! Watches the caches owned by one geocaching account for problem logs
//! (not found, needs maintenance, needs archive, listing disabled), keeps
//! the unresolved ones in a JSON state file and emails a digest when new
//! ones show up.

pub mod api;
pub mod auth;
pub mod config;
pub mod filter;
pub mod models;
pub mod notify;
pub mod store;
pub mod utils;
pub mod watcher;

pub use api::{ApiClient, ApiError, LogSource};
pub use config::{Config, ConfigError};
pub use notify::{Digest, Mailer, SmtpMailer};
pub use store::StateStore;
pub use watcher::{CycleReport, Watcher};
