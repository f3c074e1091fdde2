use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch. Clocks set before 1970 read as zero.
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub fn elapsed_seconds(start: i64, end: i64) -> i64 {
    end - start
}

/// True once strictly more than `max_age` seconds separate `timestamp` from `now`.
pub fn is_expired(timestamp: i64, max_age: i64, now: i64) -> bool {
    elapsed_seconds(timestamp, now) > max_age
}
