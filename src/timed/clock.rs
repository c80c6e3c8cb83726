use chrono::{Duration, NaiveTime, Timelike};

pub fn day() -> Duration {
    Duration::hours(24)
}

/// Wraps a duration onto the repeating 24h circle, into `[0, 24h)`.
pub fn mod24(d: Duration) -> Duration {
    let day_ms = day().num_milliseconds();
    Duration::milliseconds(d.num_milliseconds().rem_euclid(day_ms))
}

/// Positional distance from `b` forward to `a` on the 24h circle.
pub fn clock_diff(a: NaiveTime, b: NaiveTime) -> Duration {
    mod24(a.signed_duration_since(b))
}

pub fn clock_format(t: NaiveTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

pub fn duration_format(d: Duration) -> String {
    let total = d.num_seconds();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
