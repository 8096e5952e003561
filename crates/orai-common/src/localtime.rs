use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Europe::Vilnius;
use chrono_tz::Tz;

/// Convert a UTC instant to the product's fixed local timezone.
///
/// Quiet hours, digest send hours and digest batch dates are all evaluated
/// on Vilnius wall-clock time, wherever the server runs.
pub fn to_vilnius(utc: DateTime<Utc>) -> DateTime<Tz> {
    utc.with_timezone(&Vilnius)
}

/// Local wall-clock hour (0-23) at the given UTC instant.
pub fn local_hour(utc: DateTime<Utc>) -> u8 {
    to_vilnius(utc).hour() as u8
}

/// Local calendar date at the given UTC instant.
pub fn local_date(utc: DateTime<Utc>) -> NaiveDate {
    to_vilnius(utc).date_naive()
}

/// `YYYY-MM-DD HH:MM:SS` in local time, for email bodies.
pub fn format_local(utc: DateTime<Utc>) -> String {
    to_vilnius(utc).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Whether the local hour falls inside the half-open quiet window
/// `[start, end)`.
///
/// Either bound missing disables the window. `start == end` also disables
/// it (a full-day window would silence the rule forever). `start > end`
/// wraps midnight: active when `hour >= start || hour < end`.
pub fn is_in_quiet_hours(now_utc: DateTime<Utc>, start: Option<u8>, end: Option<u8>) -> bool {
    let (Some(start), Some(end)) = (start, end) else {
        return false;
    };
    if start == end {
        return false;
    }

    let hour = local_hour(now_utc);
    if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}
