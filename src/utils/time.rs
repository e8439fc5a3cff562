// src/utils/time.rs

//! Epoch conversion.

use chrono::{DateTime, Local, TimeZone, Utc};

/// Convert Unix epoch seconds (UTC) to local time.
///
/// Fractional seconds are kept to the nanosecond. Values outside chrono's
/// range yield `None`.
pub fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Local>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(whole as i64, nanos)
        .single()
        .map(|utc| utc.with_timezone(&Local))
}

/// Like [`from_epoch_seconds`], but absent or unrepresentable values become now.
pub fn epoch_or_now(seconds: Option<f64>) -> DateTime<Local> {
    seconds.and_then(from_epoch_seconds).unwrap_or_else(Local::now)
}
