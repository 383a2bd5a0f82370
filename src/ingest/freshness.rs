//! Snapshot staleness detection.
//!
//! The server refreshes its snapshot once per fetch interval. A snapshot
//! whose `updated_at` lags far behind means the fetcher stalled upstream,
//! even though the API itself still answers. The list header flags this.
//!
//! # Clock injection
//! `is_stale_at` takes `now` explicitly so tests stay deterministic.

use chrono::{DateTime, Duration, Utc};

/// Returns `true` if `updated_at` is older than `max_age_minutes` relative
/// to `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age_minutes  →  stale
///   age == max_age_minutes →  not stale
///
/// Timestamps in the future count as fresh. Returns an error if
/// `updated_at` is not RFC 3339; callers treat that as stale.
pub fn is_stale_at(updated_at: &str, max_age_minutes: u64, now: DateTime<Utc>) -> Result<bool, String> {
    let parsed = DateTime::parse_from_rfc3339(updated_at.trim())
        .map_err(|e| format!("cannot parse snapshot timestamp '{}': {}", updated_at, e))?;
    let age = now - parsed.with_timezone(&Utc);
    // Thresholds too large for a Duration can never be exceeded.
    let threshold = match i64::try_from(max_age_minutes).ok().and_then(Duration::try_minutes) {
        Some(threshold) => threshold,
        None => return Ok(false),
    };
    Ok(age > threshold)
}

/// Convenience wrapper that uses the real current time.
pub fn is_stale(updated_at: &str, max_age_minutes: u64) -> Result<bool, String> {
    is_stale_at(updated_at, max_age_minutes, Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// 2025-01-01 12:00:00 UTC, i.e. 20:00 in the servers' UTC+8.
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_recent_snapshot_is_not_stale() {
        let stale = is_stale_at("2025-01-01T19:55:00+08:00", 15, fixed_now()).expect("valid timestamp");
        assert!(!stale, "5-minute-old snapshot should not be stale with 15-min threshold");
    }

    #[test]
    fn test_exactly_at_threshold_is_not_stale() {
        let stale = is_stale_at("2025-01-01T11:45:00Z", 15, fixed_now()).expect("valid timestamp");
        assert!(!stale, "staleness is strictly greater than the threshold");
    }

    #[test]
    fn test_one_minute_past_threshold_is_stale() {
        let stale = is_stale_at("2025-01-01T19:44:00+08:00", 15, fixed_now()).expect("valid timestamp");
        assert!(stale);
    }

    #[test]
    fn test_seconds_past_threshold_are_stale() {
        let stale = is_stale_at("2025-01-01T11:44:01Z", 15, fixed_now()).expect("valid timestamp");
        assert!(stale, "15m59s old is past a 15-minute threshold");
        let stale = is_stale_at("2025-01-01T11:44:59Z", 15, fixed_now()).expect("valid timestamp");
        assert!(stale, "15m01s old is past a 15-minute threshold");
    }

    #[test]
    fn test_fractional_seconds_from_isoformat() {
        let stale = is_stale_at("2025-01-01T19:59:30.123456+08:00", 15, fixed_now()).expect("valid timestamp");
        assert!(!stale);
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let stale = is_stale_at("2025-01-01T21:00:00+08:00", 15, fixed_now()).expect("valid timestamp");
        assert!(!stale);
    }

    #[test]
    fn test_unparseable_timestamps_error() {
        assert!(is_stale_at("not-a-datetime", 15, fixed_now()).is_err());
        assert!(is_stale_at("", 15, fixed_now()).is_err());
        assert!(is_stale_at("2025-01-01 12:00:00", 15, fixed_now()).is_err(), "offset is required");
    }

    #[test]
    fn test_same_snapshot_under_tight_and_loose_thresholds() {
        let updated = "2025-01-01T11:30:00Z";
        assert!(is_stale_at(updated, 20, fixed_now()).expect("valid"));
        assert!(!is_stale_at(updated, 60, fixed_now()).expect("valid"));
    }
}
