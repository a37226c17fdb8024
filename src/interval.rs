//! Human-friendly poll interval strings.

use std::time::Duration;

/// Parse an interval like "1h", "30m", "1d", "45s" or raw seconds ("2.5").
pub fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();

    let (number, unit) = if let Some(days) = s.strip_suffix('d') {
        (days, 86400.0)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600.0)
    } else if let Some(minutes) = s.strip_suffix('m') {
        (minutes, 60.0)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1.0)
    } else {
        (s.as_str(), 1.0)
    };

    let value = number
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))?;

    seconds_to_duration(value * unit)
        .ok_or_else(|| format!("Interval must be a non-negative number in range: {}", s))
}

/// Parse a header-style seconds value ("60", "2.5") into a duration.
pub fn parse_seconds(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().and_then(seconds_to_duration)
}

fn seconds_to_duration(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

/// Format an interval for log messages.
pub fn format_interval(interval: Duration) -> String {
    if interval.subsec_nanos() != 0 {
        let secs = interval.as_secs_f64();
        return if secs < 1.0 {
            format!("{}ms", interval.as_millis())
        } else {
            format!("{:.1}s", secs)
        };
    }

    let secs = interval.as_secs();
    if secs >= 86400 && secs.is_multiple_of(86400) {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs.is_multiple_of(3600) {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs.is_multiple_of(60) {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}
