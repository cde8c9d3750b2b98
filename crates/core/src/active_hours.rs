//! Recipient-local active-hours window math.
//!
//! A recipient accepts sends during the local hours `[start, end)`.
//! `start > end` means the window crosses midnight (e.g. 22 -> 6);
//! `start == end` means the recipient is always active.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

/// Parse an IANA timezone name, falling back to UTC for unknown names.
///
/// Directory rows are expected to carry valid names; the fallback keeps a
/// single bad row from stalling a whole campaign.
pub fn parse_timezone(name: &str) -> Tz {
    name.parse().unwrap_or(chrono_tz::UTC)
}

/// Whether a local hour-of-day falls inside the `[start, end)` window.
pub fn in_window(hour: u32, start: u32, end: u32) -> bool {
    if start == end {
        true
    } else if start < end {
        (start..end).contains(&hour)
    } else {
        // Window crosses midnight.
        hour >= start || hour < end
    }
}

/// Shift `instant` forward to the next moment inside the recipient's active
/// hours; returns `instant` unchanged when it is already inside.
///
/// The shift walks hour boundaries instead of doing calendar arithmetic so
/// DST gaps and overlaps cannot produce an invalid local time. Never moves
/// an instant backwards.
pub fn next_active_instant(
    instant: DateTime<Utc>,
    tz: Tz,
    active_hours_start: i16,
    active_hours_end: i16,
) -> DateTime<Utc> {
    let start = active_hours_start.rem_euclid(24) as u32;
    let end = active_hours_end.rem_euclid(24) as u32;

    if in_window(instant.with_timezone(&tz).hour(), start, end) {
        return instant;
    }

    // Next top-of-hour, then hour by hour. 48 steps cover any window even
    // across a DST switch.
    let mut ts = instant.timestamp() - instant.timestamp().rem_euclid(3600);
    for _ in 0..48 {
        ts += 3600;
        let Some(candidate) = DateTime::<Utc>::from_timestamp(ts, 0) else {
            return instant;
        };
        if in_window(candidate.with_timezone(&tz).hour(), start, end) {
            return candidate;
        }
    }
    instant
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn plain_window_membership() {
        assert!(in_window(8, 8, 21));
        assert!(in_window(20, 8, 21));
        assert!(!in_window(21, 8, 21));
        assert!(!in_window(3, 8, 21));
    }

    #[test]
    fn midnight_crossing_window_membership() {
        assert!(in_window(23, 22, 6));
        assert!(in_window(0, 22, 6));
        assert!(in_window(5, 22, 6));
        assert!(!in_window(6, 22, 6));
        assert!(!in_window(12, 22, 6));
    }

    #[test]
    fn equal_bounds_mean_always_active() {
        for hour in 0..24 {
            assert!(in_window(hour, 9, 9));
        }
    }

    #[test]
    fn instant_inside_window_is_unchanged() {
        let instant = utc(2026, 3, 2, 10, 30);
        assert_eq!(
            next_active_instant(instant, chrono_tz::UTC, 8, 21),
            instant
        );
    }

    #[test]
    fn instant_before_window_shifts_to_window_start() {
        let shifted = next_active_instant(utc(2026, 3, 2, 5, 45), chrono_tz::UTC, 8, 21);
        assert_eq!(shifted, utc(2026, 3, 2, 8, 0));
    }

    #[test]
    fn instant_after_window_shifts_to_next_day() {
        let shifted = next_active_instant(utc(2026, 3, 2, 22, 10), chrono_tz::UTC, 8, 21);
        assert_eq!(shifted, utc(2026, 3, 3, 8, 0));
    }

    #[test]
    fn shift_honours_recipient_timezone() {
        // 06:00 UTC is 07:00 in Berlin (winter) — still before an 08:00
        // window start, so the shift lands on 08:00 local = 07:00 UTC.
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let shifted = next_active_instant(utc(2026, 1, 15, 6, 0), tz, 8, 21);
        assert_eq!(shifted, utc(2026, 1, 15, 7, 0));
    }

    #[test]
    fn midnight_window_is_honoured_when_shifting() {
        let shifted = next_active_instant(utc(2026, 3, 2, 12, 0), chrono_tz::UTC, 22, 6);
        assert_eq!(shifted, utc(2026, 3, 2, 22, 0));

        // 23:30 is already inside the night window.
        let inside = utc(2026, 3, 2, 23, 30);
        assert_eq!(next_active_instant(inside, chrono_tz::UTC, 22, 6), inside);
    }

    #[test]
    fn shift_never_moves_backwards() {
        let instant = utc(2026, 3, 2, 13, 37);
        let shifted = next_active_instant(instant, chrono_tz::UTC, 14, 18);
        assert!(shifted >= instant);
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(parse_timezone("Mars/Olympus_Mons"), chrono_tz::UTC);
        assert_eq!(parse_timezone("Europe/Berlin"), chrono_tz::Europe::Berlin);
    }
}
