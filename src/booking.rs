// Booking helpers: rental day preview, booking table summaries and date display.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::models::{Booking, BookingStatus};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Day count shown next to the booking form.
///
/// Ceiling of the absolute millisecond difference divided by one day.
/// A missing or unparseable date yields 0. The range is not required to be
/// ordered: `rental_days(a, b) == rental_days(b, a)`.
pub fn rental_days(start: Option<&str>, end: Option<&str>) -> i64 {
    match (start.and_then(parse_instant), end.and_then(parse_instant)) {
        (Some(start), Some(end)) => days_between(start, end),
        _ => 0,
    }
}

pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let diff_ms = (end - start).num_milliseconds().abs();
    (diff_ms + MS_PER_DAY - 1) / MS_PER_DAY
}

/// Accepts `YYYY-MM-DD` (midnight UTC), RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]`.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// "Dec 18, 2025"; falls back to the raw value when it does not parse.
pub fn display_date(raw: &str) -> String {
    match parse_instant(raw) {
        Some(dt) => dt.format("%b %d, %Y").to_string(),
        None => raw.to_string(),
    }
}

/// Totals shown under the user's booking table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingSummary {
    pub total: usize,
    pub active: usize,
    pub total_spent: f64,
}

impl BookingSummary {
    pub fn from_bookings(bookings: &[Booking]) -> Self {
        BookingSummary {
            total: bookings.len(),
            active: bookings
                .iter()
                .filter(|b| b.status == BookingStatus::Active)
                .count(),
            total_spent: bookings.iter().map(|b| b.total_price).sum(),
        }
    }
}
