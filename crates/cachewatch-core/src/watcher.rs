//! The polling driver: one-shot snapshot or the endless watch loop.

use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use tracing::{debug, info};

use crate::api::LogSource;
use crate::filter;
use crate::models::{CacheRecord, LogEntry};
use crate::notify::{Digest, Mailer};
use crate::store::StateStore;

/// What a single polling cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub caches_checked: usize,
    pub new_logs: Vec<LogEntry>,
    pub email_sent: bool,
}

pub struct Watcher<S, M> {
    source: S,
    mailer: M,
    store: StateStore,
    interval: Duration,
}

impl<S: LogSource, M: Mailer> Watcher<S, M> {
    pub fn new(source: S, mailer: M, store: StateStore, interval: Duration) -> Self {
        Self {
            source,
            mailer,
            store,
            interval,
        }
    }

    /// Email an overview of every owned cache's last logs. Nothing is persisted.
    pub async fn snapshot(&mut self, today: NaiveDate) -> Result<Vec<CacheRecord>> {
        self.source.authenticate().await?;
        let caches = self.source.owned_caches().await?;

        let mut records = Vec::with_capacity(caches.len());
        for cache in &caches {
            info!(cache = %cache.waypoint, name = %cache.name, "Checking cache");
            let window = self.source.recent_logs(&cache.waypoint).await?;
            records.push(CacheRecord::snapshot(cache, &window));
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));

        let digest = Digest::snapshot(&records, today)?;
        self.mailer.send(&digest).await?;
        info!(caches = records.len(), "Snapshot sent");
        Ok(records)
    }

    /// One fetch, diff, notify, persist pass over `records`.
    pub async fn run_cycle(
        &mut self,
        records: &mut Vec<CacheRecord>,
        today: NaiveDate,
    ) -> Result<CycleReport> {
        filter::prune(records, today);
        for record in records.iter_mut() {
            record.has_new_logs = false;
        }

        self.source.authenticate().await?;
        let caches = self.source.owned_caches().await?;

        let mut report = CycleReport {
            caches_checked: caches.len(),
            ..CycleReport::default()
        };
        for cache in &caches {
            info!(cache = %cache.waypoint, name = %cache.name, "Checking cache");
            let window = self.source.recent_logs(&cache.waypoint).await?;
            report
                .new_logs
                .extend(filter::apply_window(records, cache, &window, today));
        }
        filter::drop_resolved(records);

        if report.new_logs.is_empty() {
            debug!("No new qualifying logs");
        } else {
            info!(count = report.new_logs.len(), "New problem logs found");
            let digest = Digest::alert(records, &report.new_logs, today)?;
            self.mailer.send(&digest).await?;
            report.email_sent = true;
        }

        self.store.save(records)?;
        Ok(report)
    }

    /// Load prior state, then poll and sleep forever. Returns only on error.
    pub async fn run(&mut self) -> Result<()> {
        let mut records = self.store.load();
        info!(
            path = %self.store.path().display(),
            tracked = records.len(),
            "Starting watch loop"
        );

        loop {
            info!("Checking for new logs");
            let today = Local::now().date_naive();
            let report = self.run_cycle(&mut records, today).await?;
            info!(
                caches = report.caches_checked,
                new_logs = report.new_logs.len(),
                email_sent = report.email_sent,
                "Cycle finished"
            );

            info!(hours = self.interval.as_secs_f64() / 3600.0, "Sleeping");
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Duration as Days;
    use tempfile::TempDir;

    use crate::models::{CacheSummary, LogType};

    #[derive(Default)]
    struct FakeSource {
        caches: Vec<CacheSummary>,
        logs: HashMap<String, Vec<LogEntry>>,
        logins: usize,
        reject_login: bool,
    }

    #[async_trait]
    impl LogSource for FakeSource {
        async fn authenticate(&mut self) -> Result<()> {
            if self.reject_login {
                return Err(anyhow!("login rejected"));
            }
            self.logins += 1;
            Ok(())
        }

        async fn owned_caches(&self) -> Result<Vec<CacheSummary>> {
            Ok(self.caches.clone())
        }

        async fn recent_logs(&self, waypoint: &str) -> Result<Vec<LogEntry>> {
            Ok(self.logs.get(waypoint).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Digest>>,
    }

    impl RecordingMailer {
        fn sent(&self) -> Vec<Digest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, digest: &Digest) -> Result<()> {
            self.sent.lock().unwrap().push(digest.clone());
            Ok(())
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn log(wp: &str, id: &str, log_type: LogType, days_ago: i64) -> LogEntry {
        LogEntry {
            author: format!("author-{}", id),
            log_type,
            date: today() - Days::days(days_ago),
            id: id.into(),
            cache_code: wp.into(),
        }
    }

    fn summary(wp: &str, name: &str) -> CacheSummary {
        CacheSummary {
            waypoint: wp.into(),
            name: name.into(),
        }
    }

    fn watcher(dir: &TempDir, source: FakeSource) -> Watcher<FakeSource, RecordingMailer> {
        Watcher::new(
            source,
            RecordingMailer::default(),
            StateStore::new(dir.path().join("logs.json")),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_cycle_reports_only_the_new_log() {
        let dir = TempDir::new().unwrap();
        let store = StateStore::new(dir.path().join("logs.json"));
        let mut prior = CacheRecord::new(&summary("GC123", "Old Oak"));
        prior.unresolved.push(log("GC123", "A", LogType::DidntFindIt, 10));
        store.save(&[prior]).unwrap();

        let mut source = FakeSource {
            caches: vec![summary("GC123", "Old Oak")],
            ..FakeSource::default()
        };
        source.logs.insert(
            "GC123".into(),
            vec![
                log("GC123", "B", LogType::DidntFindIt, 5),
                log("GC123", "A", LogType::DidntFindIt, 10),
            ],
        );
        let mut watcher = watcher(&dir, source);

        let mut records = store.load();
        let report = watcher.run_cycle(&mut records, today()).await.unwrap();

        assert_eq!(report.caches_checked, 1);
        assert_eq!(report.new_logs.len(), 1);
        assert_eq!(report.new_logs[0].id, "B");
        assert!(report.email_sent);
        assert_eq!(records.len(), 1);
        assert!(records[0].has_new_logs);
        let ids: Vec<&str> = records[0].unresolved.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);

        let sent = watcher.mailer.sent();
        assert_eq!(sent.len(), 1);
        let (new_part, _) = sent[0].text.split_once("Previously reported:").unwrap();
        assert!(new_part.contains("author-B"));
        assert!(!new_part.contains("author-A"));

        assert_eq!(store.load(), records);
    }

    #[tokio::test]
    async fn test_quiet_cycle_sends_nothing_but_persists() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource {
            caches: vec![summary("GC1", "Quiet")],
            ..FakeSource::default()
        };
        source.logs.insert(
            "GC1".into(),
            vec![
                log("GC1", "F", LogType::FoundIt, 1),
                log("GC1", "OLD", LogType::DidntFindIt, 60),
            ],
        );
        let mut watcher = watcher(&dir, source);

        let mut records = Vec::new();
        let report = watcher.run_cycle(&mut records, today()).await.unwrap();

        assert!(report.new_logs.is_empty());
        assert!(!report.email_sent);
        assert!(watcher.mailer.sent().is_empty());
        assert!(dir.path().join("logs.json").exists());
    }

    #[tokio::test]
    async fn test_repeat_cycle_does_not_duplicate_or_resend() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource {
            caches: vec![summary("GC1", "Alpha")],
            ..FakeSource::default()
        };
        source
            .logs
            .insert("GC1".into(), vec![log("GC1", "A", LogType::NeedsMaintenance, 2)]);
        let mut watcher = watcher(&dir, source);

        let mut records = Vec::new();
        watcher.run_cycle(&mut records, today()).await.unwrap();
        let second = watcher.run_cycle(&mut records, today()).await.unwrap();

        assert!(!second.email_sent);
        assert_eq!(records[0].unresolved.len(), 1);
        assert!(!records[0].has_new_logs);
        assert_eq!(watcher.mailer.sent().len(), 1);
        assert_eq!(watcher.source.logins, 2);
    }

    #[tokio::test]
    async fn test_maintenance_clears_record() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource {
            caches: vec![summary("GC1", "Alpha")],
            ..FakeSource::default()
        };
        source
            .logs
            .insert("GC1".into(), vec![log("GC1", "A", LogType::DidntFindIt, 4)]);
        let mut watcher = watcher(&dir, source);

        let mut records = Vec::new();
        watcher.run_cycle(&mut records, today()).await.unwrap();
        assert_eq!(records.len(), 1);

        watcher.source.logs.insert(
            "GC1".into(),
            vec![
                log("GC1", "M", LogType::OwnerMaintenance, 1),
                log("GC1", "A", LogType::DidntFindIt, 4),
            ],
        );
        let report = watcher.run_cycle(&mut records, today()).await.unwrap();

        assert!(!report.email_sent);
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_login_failure_propagates_without_saving() {
        let dir = TempDir::new().unwrap();
        let source = FakeSource {
            reject_login: true,
            ..FakeSource::default()
        };
        let mut watcher = watcher(&dir, source);

        let mut records = Vec::new();
        assert!(watcher.run_cycle(&mut records, today()).await.is_err());
        assert!(!dir.path().join("logs.json").exists());
        assert!(watcher.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_sorted_and_not_persisted() {
        let dir = TempDir::new().unwrap();
        let mut source = FakeSource {
            caches: vec![summary("GC2", "Zebra"), summary("GC1", "Alpha")],
            ..FakeSource::default()
        };
        source.logs.insert(
            "GC2".into(),
            vec![
                log("GC2", "X", LogType::DidntFindIt, 2),
                log("GC2", "Y", LogType::FoundIt, 3),
            ],
        );
        let mut watcher = watcher(&dir, source);

        let records = watcher.snapshot(today()).await.unwrap();

        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zebra"]);
        assert!(records.iter().all(|r| r.unresolved.is_empty()));
        assert_eq!(
            records[1].recent_types,
            vec![LogType::DidntFindIt, LogType::FoundIt]
        );
        assert_eq!(watcher.mailer.sent().len(), 1);
        assert!(!dir.path().join("logs.json").exists());
    }
}
