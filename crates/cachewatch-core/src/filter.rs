//! Decides which freshly fetched logs are worth reporting.
//!
//! A log is reported once: when it is a problem log (not found, needs
//! maintenance, needs archive, listing disabled), was made within the last
//! 30 days, is not already tracked, and no owner maintenance log is newer
//! than it. Tracked logs that an owner maintenance log has superseded are
//! dropped.

use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::models::{CacheRecord, CacheSummary, LogEntry, LogType};

/// Logs older than this many days are neither reported nor kept.
pub const RECENCY_WINDOW_DAYS: i64 = 30;

/// Position of the newest owner maintenance log in a newest-first window.
fn latest_maintenance(window: &[LogEntry]) -> Option<usize> {
    window
        .iter()
        .position(|log| log.log_type == LogType::OwnerMaintenance)
}

fn tracked_ids(records: &[CacheRecord]) -> HashSet<String> {
    records
        .iter()
        .flat_map(|r| r.unresolved.iter().map(|l| l.id.clone()))
        .collect()
}

/// Logs from `window` that should be reported, newest first.
pub fn qualifying_logs<'a>(
    window: &'a [LogEntry],
    known_ids: &HashSet<String>,
    today: NaiveDate,
) -> Vec<&'a LogEntry> {
    let cutoff = latest_maintenance(window).unwrap_or(window.len());
    window[..cutoff]
        .iter()
        .filter(|log| log.log_type.is_reportable())
        .filter(|log| log.is_recent(today, RECENCY_WINDOW_DAYS))
        .filter(|log| !known_ids.contains(&log.id))
        .collect()
}

/// Merge one cache's freshly fetched window into the tracked records.
///
/// Refreshes the record's log snapshot, drops tracked logs resolved by a newer
/// owner maintenance log, and appends qualifying logs (creating the record on
/// first sighting). Returns the logs that were added.
pub fn apply_window(
    records: &mut Vec<CacheRecord>,
    cache: &CacheSummary,
    window: &[LogEntry],
    today: NaiveDate,
) -> Vec<LogEntry> {
    let known = tracked_ids(records);
    let fresh: Vec<LogEntry> = qualifying_logs(window, &known, today)
        .into_iter()
        .cloned()
        .collect();

    let position = records.iter().position(|r| r.waypoint == cache.waypoint);
    let record = match position {
        Some(i) => &mut records[i],
        None if fresh.is_empty() => return fresh,
        None => {
            records.push(CacheRecord::new(cache));
            let last = records.len() - 1;
            &mut records[last]
        }
    };

    record.name = cache.name.clone();
    record.recent_types = window.iter().map(|l| l.log_type).collect();

    if let Some(maintenance) = latest_maintenance(window) {
        let still_open: HashSet<&str> = window[..maintenance].iter().map(|l| l.id.as_str()).collect();
        let before = record.unresolved.len();
        record.unresolved.retain(|l| still_open.contains(l.id.as_str()));
        let resolved = before - record.unresolved.len();
        if resolved > 0 {
            info!(cache = %record.waypoint, resolved, "Owner maintenance resolved tracked logs");
        }
    }

    if !fresh.is_empty() {
        debug!(cache = %record.waypoint, count = fresh.len(), "New qualifying logs");
        record.unresolved.extend(fresh.iter().cloned());
        record.has_new_logs = true;
    }

    fresh
}

/// Apply the recency policy to loaded state: forget tracked logs older than
/// the window and drop records left without any.
pub fn prune(records: &mut Vec<CacheRecord>, today: NaiveDate) {
    for record in records.iter_mut() {
        record
            .unresolved
            .retain(|l| l.is_recent(today, RECENCY_WINDOW_DAYS));
    }
    drop_resolved(records);
}

/// Drop records that no longer track any log.
pub fn drop_resolved(records: &mut Vec<CacheRecord>) {
    let before = records.len();
    records.retain(|r| !r.unresolved.is_empty());
    if records.len() < before {
        debug!(dropped = before - records.len(), "Dropped records without open logs");
    }
}
