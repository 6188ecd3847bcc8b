//! Formatting utilities (Telegram HTML escaping, human-relative times).

use chrono::{DateTime, TimeZone};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Calendar-style phrase for `at` as seen from `now`:
/// `Today 14:00`, `Yesterday 09:30`, `Tomorrow 18:00`, `Last Monday 12:00`,
/// `Friday 17:45`, otherwise `MM/DD/YYYY`.
pub fn calendar_time<Tz: TimeZone>(at: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let days = at
        .date_naive()
        .signed_duration_since(now.date_naive())
        .num_days();
    let hm = at.format("%H:%M");

    match days {
        d if d < -6 => at.format("%m/%d/%Y").to_string(),
        d if d < -1 => format!("Last {} {hm}", at.format("%A")),
        -1 => format!("Yesterday {hm}"),
        0 => format!("Today {hm}"),
        1 => format!("Tomorrow {hm}"),
        d if d < 7 => format!("{} {hm}", at.format("%A")),
        _ => at.format("%m/%d/%Y").to_string(),
    }
}
