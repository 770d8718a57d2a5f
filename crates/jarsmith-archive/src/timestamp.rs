//! Entry timestamps.
//!
//! Resources carry epoch milliseconds; ZIP entries carry DOS date-times.
//! Conversions here are done in UTC so output never depends on the host
//! time zone.

use std::time::SystemTime;
use time::format_description::well_known::Rfc3339;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};
use tracing::warn;

/// Fixed entry time for reproducible output: 1980-02-01T00:00:00Z.
///
/// One month past the DOS epoch so no reader normalizes it to a
/// different instant.
pub const ZIP_ENTRY_CONSTANT_TIME: i64 = 318_211_200_000;

/// Parse an output timestamp setting.
///
/// Returns `None` when reproducible output is off (`"false"` or empty).
/// `"true"` selects [`ZIP_ENTRY_CONSTANT_TIME`]; otherwise the value may be
/// epoch seconds or an RFC 3339 date-time. Unparseable values fall back to
/// the constant.
pub fn parse_output_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("false") {
        return None;
    }
    if value.eq_ignore_ascii_case("true") {
        return Some(ZIP_ENTRY_CONSTANT_TIME);
    }
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(
            i64::try_from(seconds)
                .ok()
                .and_then(|s| s.checked_mul(1000))
                .unwrap_or(ZIP_ENTRY_CONSTANT_TIME),
        );
    }
    match OffsetDateTime::parse(value, &Rfc3339) {
        Ok(date_time) => Some(millis_of(date_time)),
        Err(e) => {
            warn!(value, error = %e, "unrecognized output timestamp, using the fixed entry time");
            Some(ZIP_ENTRY_CONSTANT_TIME)
        }
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    millis_of(OffsetDateTime::now_utc())
}

/// Convert a file system time to epoch milliseconds
pub fn system_time_millis(time: SystemTime) -> i64 {
    millis_of(OffsetDateTime::from(time))
}

fn millis_of(date_time: OffsetDateTime) -> i64 {
    i64::try_from(date_time.unix_timestamp_nanos() / 1_000_000).unwrap_or(0)
}

/// Convert epoch milliseconds to a ZIP entry time.
///
/// Instants outside the DOS range map to the DOS epoch.
pub fn to_zip_time(millis: i64) -> zip::DateTime {
    let Ok(date_time) = OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
    else {
        return zip::DateTime::default();
    };
    let Ok(year) = u16::try_from(date_time.year()) else {
        return zip::DateTime::default();
    };
    zip::DateTime::from_date_and_time(
        year,
        u8::from(date_time.month()),
        date_time.day(),
        date_time.hour(),
        date_time.minute(),
        date_time.second(),
    )
    .unwrap_or_default()
}

/// Convert a ZIP entry time to epoch milliseconds, 0 when it is not a valid date
pub fn from_zip_time(time: zip::DateTime) -> i64 {
    let Ok(month) = Month::try_from(time.month()) else {
        return 0;
    };
    let Ok(date) = Date::from_calendar_date(i32::from(time.year()), month, time.day()) else {
        return 0;
    };
    let Ok(clock) = Time::from_hms(time.hour(), time.minute(), time.second()) else {
        return 0;
    };
    millis_of(PrimitiveDateTime::new(date, clock).assume_utc())
}
