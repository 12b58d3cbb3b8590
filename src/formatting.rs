use std::time::Duration;

/// Human readable duration, e.g. `850ms`, `12.3s`, `4m05s`, `2h10m00s`
pub fn format_duration_human(duration: &Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1. {
        let msec = (secs * 1000.).round() as u64;
        if msec == 0 && secs > 0. {
            "<1ms".to_string()
        } else {
            format!("{}ms", msec)
        }
    } else if secs < 60. {
        format!("{:.1}s", secs)
    } else {
        let total = secs.round() as u64;
        let (hr, min, sec) = (total / 3600, (total / 60) % 60, total % 60);
        if hr == 0 {
            format!("{}m{:02}s", min, sec)
        } else {
            format!("{}h{:02}m{:02}s", hr, min, sec)
        }
    }
}

/// For log lines. Longer durations also show the raw seconds.
pub fn format_duration(d: Duration) -> String {
    if d.as_secs_f64() < 60. {
        format_duration_human(&d)
    } else {
        format!("{} ( {:.1}sec )", format_duration_human(&d), d.as_secs_f64())
    }
}

/// `part` as a percentage of `total`, to 1 decimal place. `0.0%` when total is 0.
pub fn format_percent(part: usize, total: usize) -> String {
    if total == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", (part as f64 / total as f64) * 100.)
}
