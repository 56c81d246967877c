//! Data models for geocaching entities.
//!
//! - `LogEntry`, `LogType`: dated events recorded against a cache
//! - `CacheSummary`: a cache as listed by the owner search
//! - `CacheRecord`: persisted per-cache state with unresolved problem logs

pub mod cache;
pub mod log;

pub use cache::{cache_url, CacheRecord, CacheSummary, LOG_WINDOW};
pub use log::{LogEntry, LogType, UNKNOWN_SYMBOL};
