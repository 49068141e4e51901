// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike, Utc};
use std::time;

/// The number of seconds from 1st January 1900 UTC to the start of the Unix epoch.
pub const EPOCH_DELTA: i64 = 2_208_988_800;

/// The number of seconds in one NTP era (2^32 seconds, approximately 136 years).
pub const ERA_SECONDS: i64 = 4_294_967_296;

/// Current system time as fractional seconds since the Unix epoch.
///
/// Times before the epoch are negative.
pub fn now_epoch() -> f64 {
    match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

/// Convert raw NTP transmit seconds to Unix seconds.
///
/// The 32-bit field is ambiguous across eras; the era is chosen so that the
/// result lies within half an era of `pivot_unix_secs` (normally "now"). For
/// any pivot in era 0 (before 2036-02-07) this is plain subtraction of
/// [`EPOCH_DELTA`].
pub fn ntp_to_unix_seconds(raw_seconds: u32, pivot_unix_secs: i64) -> i64 {
    let pivot_ntp = pivot_unix_secs + EPOCH_DELTA;
    let pivot_era = pivot_ntp.div_euclid(ERA_SECONDS);
    let candidate = pivot_era * ERA_SECONDS + raw_seconds as i64;

    let diff = candidate - pivot_ntp;
    let ntp_secs = if diff > ERA_SECONDS / 2 {
        candidate - ERA_SECONDS
    } else if diff < -(ERA_SECONDS / 2) {
        candidate + ERA_SECONDS
    } else {
        candidate
    };
    ntp_secs - EPOCH_DELTA
}

/// Convert fractional epoch seconds to a UTC `DateTime`.
pub fn to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() {
        return None;
    }
    let secs = epoch.floor();
    let nanos = ((epoch - secs) * 1e9).round() as u32;
    let (secs, nanos) = if nanos >= 1_000_000_000 {
        (secs as i64 + 1, 0)
    } else {
        (secs as i64, nanos)
    };
    DateTime::<Utc>::from_timestamp(secs, nanos)
}

/// Render epoch seconds as ISO-8601 UTC with an explicit `+00:00` offset.
///
/// Sub-second precision is microseconds and is omitted when zero, e.g.
/// `2024-01-01T00:00:00+00:00` or `2024-01-01T00:00:00.500000+00:00`.
pub fn format_iso(epoch: f64) -> Option<String> {
    let dt = to_datetime(epoch)?;
    let micros = dt.nanosecond() / 1_000;
    let dt = dt.with_nanosecond(micros * 1_000)?;
    let rendered = if micros == 0 {
        dt.format("%Y-%m-%dT%H:%M:%S+00:00")
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00")
    };
    Some(rendered.to_string())
}

fn datetime_to_epoch<Tz: chrono::TimeZone>(dt: &DateTime<Tz>) -> f64 {
    dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 / 1e9
}

/// Parse an ISO-8601 timestamp to fractional epoch seconds.
///
/// Accepted forms:
/// - RFC 3339 with `Z` or a numeric offset (`2024-01-01T00:00:00Z`,
///   `2024-01-01T02:00:00.25+02:00`),
/// - a space instead of `T`, offsets without colon (`+0200`),
/// - naive date-times and bare dates, interpreted as UTC.
///
/// Returns `None` if the string matches none of these.
pub fn parse_iso(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(datetime_to_epoch(&dt));
    }

    let normalized = normalize_zulu(s);
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(&normalized, fmt) {
            return Some(datetime_to_epoch(&dt));
        }
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(datetime_to_epoch(&naive.and_utc()));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| datetime_to_epoch(&naive.and_utc()));
    }
    None
}

// A trailing `Z`/`z` designates UTC.
fn normalize_zulu(s: &str) -> String {
    match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        Some(rest) => format!("{rest}+00:00"),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ntp_to_unix_era0() {
        // 2024-01-01T00:00:00Z in NTP seconds.
        let raw = (1_704_067_200 + EPOCH_DELTA) as u32;
        assert_eq!(ntp_to_unix_seconds(raw, 1_704_067_000), 1_704_067_200);
    }

    #[test]
    fn test_ntp_to_unix_matches_plain_subtraction_before_2036() {
        for raw in [2_208_988_800u32, 3_913_056_000, 4_000_000_000] {
            assert_eq!(
                ntp_to_unix_seconds(raw, 1_700_000_000),
                raw as i64 - EPOCH_DELTA
            );
        }
    }

    #[test]
    fn test_ntp_to_unix_era1_rollover() {
        // Pivot just after the 2036 rollover; raw value 10 is era 1.
        let era1_start_unix = ERA_SECONDS - EPOCH_DELTA;
        assert_eq!(
            ntp_to_unix_seconds(10, era1_start_unix + 5),
            era1_start_unix + 10
        );
    }

    #[test]
    fn test_parse_iso_zulu() {
        assert_eq!(parse_iso("2024-01-01T00:00:00Z"), Some(1_704_067_200.0));
    }

    #[test]
    fn test_parse_iso_offset() {
        assert_eq!(parse_iso("2024-01-01T02:00:00+02:00"), Some(1_704_067_200.0));
        assert_eq!(parse_iso("2024-01-01T02:00:00+0200"), Some(1_704_067_200.0));
    }

    #[test]
    fn test_parse_iso_fractional() {
        let epoch = parse_iso("2024-01-01T00:00:00.250Z").unwrap();
        assert!((epoch - 1_704_067_200.25).abs() < 1e-6);
    }

    #[test]
    fn test_parse_iso_naive_is_utc() {
        assert_eq!(parse_iso("2024-01-01T00:00:00"), Some(1_704_067_200.0));
        assert_eq!(parse_iso("2024-01-01 00:00:00"), Some(1_704_067_200.0));
        assert_eq!(parse_iso("2024-01-01"), Some(1_704_067_200.0));
    }

    #[test]
    fn test_parse_iso_rejects_garbage() {
        assert_eq!(parse_iso("yesterday"), None);
        assert_eq!(parse_iso(""), None);
        assert_eq!(parse_iso("2024-13-01T00:00:00Z"), None);
    }

    #[test]
    fn test_format_iso_whole_seconds() {
        assert_eq!(
            format_iso(1_704_067_200.0).as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_format_iso_microseconds() {
        assert_eq!(
            format_iso(1_704_067_200.5).as_deref(),
            Some("2024-01-01T00:00:00.500000+00:00")
        );
    }

    #[test]
    fn test_format_iso_rejects_non_finite() {
        assert_eq!(format_iso(f64::NAN), None);
        assert_eq!(format_iso(f64::INFINITY), None);
    }

    #[test]
    fn test_now_epoch_is_recent() {
        // After 2020-01-01.
        assert!(now_epoch() > 1_577_836_800.0);
    }
}
