use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Uses the `iana-time-zone` crate directly – no subprocess calls.
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

/// Resolve an IANA timezone name.
///
/// If `tz_name` is not a recognised IANA timezone, falls back to UTC
/// and logs a warning.
pub fn resolve_timezone(tz_name: &str) -> Tz {
    tz_name.parse::<Tz>().unwrap_or_else(|_| {
        warn!(
            "unrecognised timezone \"{}\", falling back to UTC",
            tz_name
        );
        Tz::UTC
    })
}

/// Validate that `tz_name` is a recognised IANA timezone identifier.
pub fn validate_timezone(tz_name: &str) -> bool {
    tz_name.parse::<Tz>().is_ok()
}

// ── Envelope dates ────────────────────────────────────────────────────────────

/// Convert a mail-service `internalDate` (milliseconds since the epoch).
pub fn timestamp_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Calendar date of a delivery instant as seen in `tz`.
pub fn envelope_date(ts: DateTime<Utc>, tz: Tz) -> NaiveDate {
    ts.with_timezone(&tz).date_naive()
}

/// Parse a collaborator-supplied date string, truncating any time part.
///
/// Accepts plain ISO dates (`2023-07-14`), ISO date-times with or without
/// an offset (the calendar part is taken as written), and RFC 2822 dates.
pub fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(prefix) = s.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.date_naive());
    }

    warn!("could not parse calendar date \"{}\"", s);
    None
}

// ── Clock times ───────────────────────────────────────────────────────────────

/// Normalise a 12-hour clock (`"9:05"`, `"PM"`) into 24-hour `HH:MM`.
pub fn to_24h_clock(hhmm: &str, meridiem: &str) -> Option<String> {
    let text = format!("{} {}", hhmm.trim(), meridiem.trim().to_uppercase());
    NaiveTime::parse_from_str(&text, "%I:%M %p")
        .ok()
        .map(|t| t.format("%H:%M").to_string())
}

/// Normalise a 24-hour clock into zero-padded `HH:MM`.
pub fn normalize_24h_clock(hhmm: &str) -> Option<String> {
    NaiveTime::parse_from_str(hhmm.trim(), "%H:%M")
        .ok()
        .map(|t| t.format("%H:%M").to_string())
}
