//! REST client module for the geocaching web service.
//!
//! `LogSource` is the seam the watch loop depends on; `ApiClient` is the
//! reqwest-backed implementation. The service uses bearer tokens obtained
//! from a password grant against the auth endpoint.

pub mod client;
pub mod error;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CacheSummary, LogEntry};

pub use client::ApiClient;
pub use error::ApiError;

/// Where cache listings and logbooks come from.
#[async_trait]
pub trait LogSource {
    /// Log in; called once at the start of every polling cycle.
    async fn authenticate(&mut self) -> Result<()>;

    /// Caches owned by the configured account.
    async fn owned_caches(&self) -> Result<Vec<CacheSummary>>;

    /// Most recent logs for a cache, newest first.
    async fn recent_logs(&self, waypoint: &str) -> Result<Vec<LogEntry>>;
}
