use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Placeholder shown for log kinds we have no symbol for.
pub const UNKNOWN_SYMBOL: &str = "❓";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogType {
    // Aliases accept the spelled-out names found in older state files.
    #[serde(alias = "found it")]
    FoundIt,
    #[serde(alias = "didn't find it")]
    DidntFindIt,
    #[serde(alias = "write note")]
    WriteNote,
    #[serde(alias = "needs maintenance")]
    NeedsMaintenance,
    #[serde(alias = "owner maintenance")]
    OwnerMaintenance,
    #[serde(alias = "needs archived")]
    NeedsArchive,
    #[serde(alias = "temporarily disable listing")]
    TempDisableListing,
    #[serde(alias = "enable listing")]
    EnableListing,
    Archive,
    Unarchive,
    #[serde(alias = "publish listing")]
    Publish,
    #[serde(alias = "post reviewer note")]
    ReviewerNote,
    #[serde(alias = "webcam photo taken")]
    WebcamPhotoTaken,
    Attended,
    #[serde(alias = "will attend")]
    WillAttend,
    #[serde(alias = "update coordinates")]
    UpdateCoordinates,
    Announcement,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for LogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl LogType {
    /// Kinds that point at a problem with the cache and get reported.
    pub const REPORTABLE: [LogType; 4] = [
        LogType::DidntFindIt,
        LogType::NeedsMaintenance,
        LogType::NeedsArchive,
        LogType::TempDisableListing,
    ];

    /// Kinds listed in the digest legend, in display order.
    pub const LEGEND: [LogType; 8] = [
        LogType::FoundIt,
        LogType::DidntFindIt,
        LogType::NeedsMaintenance,
        LogType::OwnerMaintenance,
        LogType::NeedsArchive,
        LogType::TempDisableListing,
        LogType::EnableListing,
        LogType::WriteNote,
    ];

    /// Map a geocaching API log type id to a kind.
    /// Falls back to the type name when the id is not one we know.
    pub fn from_api(id: i64, name: &str) -> Self {
        match id {
            2 => LogType::FoundIt,
            3 => LogType::DidntFindIt,
            4 => LogType::WriteNote,
            5 => LogType::Archive,
            7 => LogType::NeedsArchive,
            9 => LogType::WillAttend,
            10 => LogType::Attended,
            11 => LogType::WebcamPhotoTaken,
            12 => LogType::Unarchive,
            18 | 68 => LogType::ReviewerNote,
            22 => LogType::TempDisableListing,
            23 => LogType::EnableListing,
            24 => LogType::Publish,
            45 => LogType::NeedsMaintenance,
            46 => LogType::OwnerMaintenance,
            47 => LogType::UpdateCoordinates,
            74 => LogType::Announcement,
            _ => Self::from_name(name),
        }
    }

    /// Parse a human-readable log type name as the web service spells it.
    pub fn from_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "found it" => LogType::FoundIt,
            "didn't find it" | "didnt find it" => LogType::DidntFindIt,
            "write note" | "note" => LogType::WriteNote,
            "needs maintenance" => LogType::NeedsMaintenance,
            "owner maintenance" => LogType::OwnerMaintenance,
            "needs archived" | "needs archive" => LogType::NeedsArchive,
            "temporarily disable listing" => LogType::TempDisableListing,
            "enable listing" => LogType::EnableListing,
            "archive" => LogType::Archive,
            "unarchive" => LogType::Unarchive,
            "publish listing" => LogType::Publish,
            "post reviewer note" => LogType::ReviewerNote,
            "webcam photo taken" => LogType::WebcamPhotoTaken,
            "attended" => LogType::Attended,
            "will attend" => LogType::WillAttend,
            "update coordinates" => LogType::UpdateCoordinates,
            "announcement" => LogType::Announcement,
            _ => LogType::Unknown,
        }
    }

    pub fn is_reportable(&self) -> bool {
        Self::REPORTABLE.contains(self)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogType::FoundIt => "Found it",
            LogType::DidntFindIt => "Didn't find it",
            LogType::WriteNote => "Note",
            LogType::NeedsMaintenance => "Needs maintenance",
            LogType::OwnerMaintenance => "Owner maintenance",
            LogType::NeedsArchive => "Needs archive",
            LogType::TempDisableListing => "Listing disabled",
            LogType::EnableListing => "Listing enabled",
            LogType::Archive => "Archived",
            LogType::Unarchive => "Unarchived",
            LogType::Publish => "Published",
            LogType::ReviewerNote => "Reviewer note",
            LogType::WebcamPhotoTaken => "Webcam photo taken",
            LogType::Attended => "Attended",
            LogType::WillAttend => "Will attend",
            LogType::UpdateCoordinates => "Coordinates updated",
            LogType::Announcement => "Announcement",
            LogType::Unknown => "Unknown",
        }
    }

    pub fn emoji(&self) -> Option<&'static str> {
        match self {
            LogType::FoundIt => Some("✅"),
            LogType::DidntFindIt => Some("❌"),
            LogType::WriteNote => Some("📝"),
            LogType::NeedsMaintenance => Some("🔧"),
            LogType::OwnerMaintenance => Some("🔨"),
            LogType::NeedsArchive => Some("🗑️"),
            LogType::TempDisableListing => Some("🛑"),
            LogType::EnableListing => Some("🟢"),
            LogType::Archive => Some("📦"),
            LogType::Unarchive => Some("📤"),
            LogType::Publish => Some("📢"),
            LogType::ReviewerNote => Some("👀"),
            LogType::WebcamPhotoTaken => Some("📷"),
            LogType::Attended => Some("🎉"),
            LogType::WillAttend => Some("📅"),
            LogType::UpdateCoordinates => Some("📍"),
            LogType::Announcement => Some("📣"),
            LogType::Unknown => None,
        }
    }

    /// Emoji for display, logging and substituting a placeholder when none exists.
    pub fn symbol(&self) -> &'static str {
        self.emoji().unwrap_or_else(|| {
            warn!(log_type = ?self, "No symbol for log type");
            UNKNOWN_SYMBOL
        })
    }
}

/// A dated event recorded against a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub author: String,
    #[serde(rename = "type")]
    pub log_type: LogType,
    /// Visit date as entered by the logger
    pub date: NaiveDate,
    pub id: String,
    /// Waypoint of the owning cache
    #[serde(rename = "cache", default)]
    pub cache_code: String,
}

impl LogEntry {
    /// Age in whole days relative to `today` (negative for future-dated logs)
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        (today - self.date).num_days()
    }

    /// Whether the visit date falls inside the last `window_days` days.
    /// The boundary day itself is outside the window.
    pub fn is_recent(&self, today: NaiveDate, window_days: i64) -> bool {
        self.age_days(today) < window_days
    }
}
