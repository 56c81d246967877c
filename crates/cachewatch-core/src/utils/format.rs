use chrono::NaiveDate;

/// Format a visit date for display: "01.05.2024"
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d.%m.%Y").to_string()
}

/// Relative age of a date: "today", "yesterday", "5 days ago"
pub fn format_age(date: NaiveDate, today: NaiveDate) -> String {
    match (today - date).num_days() {
        days if days < 0 => "in the future".to_string(),
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        days => format!("{} days ago", days),
    }
}
