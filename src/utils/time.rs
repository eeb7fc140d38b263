//! Time and timestamp utilities

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Current Unix timestamp in milliseconds
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Drop the sub-second part of a timestamp.
///
/// HTTP dates only carry whole seconds, so modification times must be
/// truncated before they are compared with a client-supplied date.
pub fn truncate_to_secs(time: SystemTime) -> SystemTime {
    match time.duration_since(UNIX_EPOCH) {
        Ok(since) => UNIX_EPOCH + Duration::from_secs(since.as_secs()),
        Err(_) => time,
    }
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn http_date(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}

/// Parse an HTTP date header value, `None` when malformed
pub fn parse_http_date(value: &str) -> Option<SystemTime> {
    httpdate::parse_http_date(value.trim()).ok()
}

/// Age of `time` relative to now; zero for timestamps in the future
pub fn age(time: SystemTime) -> Duration {
    SystemTime::now().duration_since(time).unwrap_or(Duration::ZERO)
}
