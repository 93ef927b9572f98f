use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 and naive ISO-8601 (assumed UTC), which is what the
/// backend emits for rows stored without a zone.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Sort key placing undated entries first, like the epoch would
pub fn sort_key(timestamp: Option<DateTime<Utc>>) -> i64 {
    timestamp.map(|t| t.timestamp_millis()).unwrap_or(0)
}
