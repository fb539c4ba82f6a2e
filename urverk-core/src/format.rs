//! Duration helpers and countdown formatting.
//!
//! Formatters take whole seconds; negative inputs render as zero.

/// Millisecond constructors for scheduling calls.
pub mod duration {
    pub const fn millis(ms: i64) -> i64 {
        ms
    }

    pub const fn seconds(s: i64) -> i64 {
        s.saturating_mul(1_000)
    }

    pub const fn minutes(m: i64) -> i64 {
        seconds(m.saturating_mul(60))
    }

    pub const fn hours(h: i64) -> i64 {
        minutes(h.saturating_mul(60))
    }

    pub const fn days(d: i64) -> i64 {
        hours(d.saturating_mul(24))
    }
}

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// `HH:MM:SS`; hours are not wrapped at 24.
pub fn hh_mm_ss(total_secs: i64) -> String {
    let s = total_secs.max(0);
    format!("{:02}:{:02}:{:02}", s / HOUR, (s % HOUR) / MINUTE, s % MINUTE)
}

/// `MM:SS`; minutes are not wrapped at 60.
pub fn mm_ss(total_secs: i64) -> String {
    let s = total_secs.max(0);
    format!("{:02}:{:02}", s / MINUTE, s % MINUTE)
}

/// `"1d 2h 3m 4s"` with zero-valued units omitted, `"0s"` for zero.
pub fn compact(total_secs: i64) -> String {
    let s = total_secs.max(0);
    if s == 0 {
        return "0s".to_string();
    }
    let parts = [
        (s / DAY, 'd'),
        ((s % DAY) / HOUR, 'h'),
        ((s % HOUR) / MINUTE, 'm'),
        (s % MINUTE, 's'),
    ];
    parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| format!("{value}{unit}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Only the largest non-zero unit, truncated: `"3d"`, `"2h"`, `"5m"`, `"9s"`.
pub fn largest_unit(total_secs: i64) -> String {
    let s = total_secs.max(0);
    if s >= DAY {
        format!("{}d", s / DAY)
    } else if s >= HOUR {
        format!("{}h", s / HOUR)
    } else if s >= MINUTE {
        format!("{}m", s / MINUTE)
    } else {
        format!("{s}s")
    }
}

/// Whole seconds left in a millisecond countdown, rounded up so a running
/// timer never displays zero.
pub fn ceil_secs(remaining_ms: i64) -> i64 {
    let ms = remaining_ms.max(0);
    ms / 1_000 + i64::from(ms % 1_000 != 0)
}
