use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in seconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

// Remove ^0 - ^9 colour codes from a player name
pub fn strip_colors(name: &str) -> String {
    let mut pretty = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '^' && chars.peek().is_some_and(|next| next.is_ascii_digit()) {
            chars.next();
            continue;
        }
        pretty.push(c);
    }
    pretty
}

// Human readable form of a stored unix timestamp
pub fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|time| time.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string())
}

// Kill/death ratio rounded to two decimals, 1.0 without deaths
pub fn ratio(kills: u32, deaths: u32) -> f64 {
    if deaths == 0 {
        return 1.0;
    }
    (kills as f64 / deaths as f64 * 100.0).round() / 100.0
}

// Percentage of `part` in `total`, 0 when nothing was counted
pub fn percentage(part: u32, total: u32) -> u32 {
    if total == 0 {
        0
    } else {
        (part as f64 / total as f64 * 100.0).round() as u32
    }
}
