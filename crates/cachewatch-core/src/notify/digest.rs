//! Email digest composition: subject plus plain-text and HTML bodies.

use std::collections::HashSet;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use askama::Template;
use chrono::NaiveDate;

use crate::models::{CacheRecord, LogEntry, LogType};
use crate::utils::{format_age, format_date};

const ALERT_INTRO: &str = "There are new logs reporting a cache as not found or in need of maintenance.";
const SNAPSHOT_INTRO: &str = "Latest logs on all of your caches.";

struct LogView {
    symbol: &'static str,
    label: &'static str,
    author: String,
    date: String,
    age: String,
    is_new: bool,
}

struct CacheView {
    name: String,
    waypoint: String,
    url: String,
    is_new: bool,
    recent_symbols: String,
    since_last_find: usize,
    logs: Vec<LogView>,
}

#[derive(Template)]
#[template(path = "digest.html")]
struct DigestTemplate<'a> {
    intro: &'a str,
    caches: &'a [CacheView],
    legend: String,
}

/// A composed email, ready to hand to a `Mailer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest {
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// "✅ Found it | ❌ Didn't find it | ..."
pub fn legend() -> String {
    LogType::LEGEND
        .iter()
        .map(|t| format!("{} {}", t.symbol(), t.label()))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn log_view(log: &LogEntry, is_new: bool, today: NaiveDate) -> LogView {
    LogView {
        symbol: log.log_type.symbol(),
        label: log.log_type.label(),
        author: log.author.clone(),
        date: format_date(log.date),
        age: format_age(log.date, today),
        is_new,
    }
}

fn cache_view(record: &CacheRecord, fresh_ids: &HashSet<&str>, today: NaiveDate) -> CacheView {
    CacheView {
        name: record.name.clone(),
        waypoint: record.waypoint.clone(),
        url: record.url(),
        is_new: record.has_new_logs,
        recent_symbols: record
            .recent_types
            .iter()
            .map(|t| t.symbol())
            .collect::<Vec<_>>()
            .join(" "),
        since_last_find: record.logs_since_last_find(),
        logs: record
            .unresolved
            .iter()
            .map(|l| log_view(l, fresh_ids.contains(l.id.as_str()), today))
            .collect(),
    }
}

fn write_log_line(out: &mut String, log: &LogView) {
    let _ = writeln!(
        out,
        "  - {} {} by {} on {} ({})",
        log.symbol, log.label, log.author, log.date, log.age
    );
}

fn write_cache_heading(out: &mut String, cache: &CacheView) {
    let _ = writeln!(out, "{} ({}) {}", cache.name, cache.waypoint, cache.url);
}

impl Digest {
    /// Digest for a polling cycle that found new problem logs.
    ///
    /// Lists the logs added this cycle first, then every log that was already
    /// being tracked, each grouped by cache.
    pub fn alert(records: &[CacheRecord], fresh: &[LogEntry], today: NaiveDate) -> Result<Self> {
        let fresh_ids: HashSet<&str> = fresh.iter().map(|l| l.id.as_str()).collect();
        let views: Vec<CacheView> = records
            .iter()
            .map(|r| cache_view(r, &fresh_ids, today))
            .collect();

        let subject = match fresh.len() {
            1 => "New problem log on one of your caches".to_string(),
            n => format!("{} new problem logs on your caches", n),
        };

        let mut text = format!("{}\n\n", ALERT_INTRO);
        for cache in views.iter().filter(|c| c.logs.iter().any(|l| l.is_new)) {
            write_cache_heading(&mut text, cache);
            for log in cache.logs.iter().filter(|l| l.is_new) {
                write_log_line(&mut text, log);
            }
            text.push('\n');
        }

        let previous: Vec<&CacheView> = views
            .iter()
            .filter(|c| c.logs.iter().any(|l| !l.is_new))
            .collect();
        if !previous.is_empty() {
            text.push_str("Previously reported:\n\n");
            for cache in previous {
                write_cache_heading(&mut text, cache);
                for log in cache.logs.iter().filter(|l| !l.is_new) {
                    write_log_line(&mut text, log);
                }
                text.push('\n');
            }
        }
        let _ = writeln!(text, "Legend: {}", legend());

        let html = render_html(ALERT_INTRO, &views)?;
        Ok(Self { subject, text, html })
    }

    /// One-shot overview of every owned cache's recent log types.
    pub fn snapshot(records: &[CacheRecord], today: NaiveDate) -> Result<Self> {
        let no_fresh = HashSet::new();
        let views: Vec<CacheView> = records
            .iter()
            .map(|r| cache_view(r, &no_fresh, today))
            .collect();

        let mut text = format!("{}\n\n", SNAPSHOT_INTRO);
        for cache in &views {
            write_cache_heading(&mut text, cache);
            let _ = writeln!(
                text,
                "  Last 10 logs: {} ({} since last find)\n",
                cache.recent_symbols, cache.since_last_find
            );
        }
        let _ = writeln!(text, "Legend: {}", legend());

        let html = render_html(SNAPSHOT_INTRO, &views)?;
        Ok(Self {
            subject: format!("Status of your {} caches", views.len()),
            text,
            html,
        })
    }
}

fn render_html(intro: &str, caches: &[CacheView]) -> Result<String> {
    DigestTemplate {
        intro,
        caches,
        legend: legend(),
    }
    .render()
    .context("Failed to render digest template")
}
