use serde::{Deserialize, Serialize};

use super::{LogEntry, LogType};

/// Number of recent logs fetched and remembered per cache.
pub const LOG_WINDOW: usize = 10;

/// A cache as returned by the owner search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSummary {
    #[serde(rename = "referenceCode")]
    pub waypoint: String,
    pub name: String,
}

impl CacheSummary {
    pub fn url(&self) -> String {
        cache_url(&self.waypoint)
    }
}

/// Public listing page for a waypoint
pub fn cache_url(waypoint: &str) -> String {
    format!("https://www.geocaching.com/geocache/{}", waypoint)
}

/// Tracked state for one cache: the problem logs not yet resolved by the owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    #[serde(rename = "wp")]
    pub waypoint: String,
    pub name: String,
    #[serde(rename = "not_found_logs", default)]
    pub unresolved: Vec<LogEntry>,
    #[serde(rename = "new_logs", default)]
    pub has_new_logs: bool,
    #[serde(rename = "last_ten_logs_status", default)]
    pub recent_types: Vec<LogType>,
}

impl CacheRecord {
    pub fn new(summary: &CacheSummary) -> Self {
        Self {
            waypoint: summary.waypoint.clone(),
            name: summary.name.clone(),
            unresolved: Vec::new(),
            has_new_logs: false,
            recent_types: Vec::new(),
        }
    }

    /// Record used by the one-shot overview: no tracked logs, only the window.
    pub fn snapshot(summary: &CacheSummary, window: &[LogEntry]) -> Self {
        Self {
            recent_types: window.iter().map(|l| l.log_type).collect(),
            ..Self::new(summary)
        }
    }

    pub fn url(&self) -> String {
        cache_url(&self.waypoint)
    }

    pub fn contains_log(&self, id: &str) -> bool {
        self.unresolved.iter().any(|l| l.id == id)
    }

    /// Logs in the remembered window newer than the last find or owner maintenance.
    pub fn logs_since_last_find(&self) -> usize {
        self.recent_types
            .iter()
            .position(|t| matches!(t, LogType::FoundIt | LogType::OwnerMaintenance))
            .unwrap_or(self.recent_types.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> CacheSummary {
        CacheSummary {
            waypoint: "GC123".into(),
            name: "Old Oak".into(),
        }
    }

    #[test]
    fn test_logs_since_last_find() {
        let mut record = CacheRecord::new(&summary());
        assert_eq!(record.logs_since_last_find(), 0);

        record.recent_types = vec![
            LogType::DidntFindIt,
            LogType::DidntFindIt,
            LogType::FoundIt,
            LogType::DidntFindIt,
        ];
        assert_eq!(record.logs_since_last_find(), 2);

        record.recent_types = vec![LogType::NeedsMaintenance, LogType::WriteNote];
        assert_eq!(record.logs_since_last_find(), 2);
    }

    #[test]
    fn test_parse_legacy_record_without_optional_fields() {
        let json = r#"{"wp":"GC123","name":"Old Oak","not_found_logs":[{"author":"bob","type":"didn't find it","date":"2024-05-01","id":"abc"}]}"#;
        let record: CacheRecord = serde_json::from_str(json).expect("parse record");
        assert_eq!(record.waypoint, "GC123");
        assert!(!record.has_new_logs);
        assert!(record.recent_types.is_empty());
        assert!(record.contains_log("abc"));
        assert_eq!(record.url(), "https://www.geocaching.com/geocache/GC123");
    }
}
