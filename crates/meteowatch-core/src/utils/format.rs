use chrono::{Duration, NaiveDateTime};

/// Format a temperature for display, one decimal place
pub fn format_temperature(celsius: f64) -> String {
    format!("{:.1}°C", celsius)
}

/// Format a remaining lifetime compactly ("23h 59m", "4m", "expired")
pub fn format_remaining(remaining: Duration) -> String {
    let minutes = remaining.num_minutes();
    if remaining <= Duration::zero() {
        "expired".to_string()
    } else if minutes < 1 {
        "under a minute".to_string()
    } else if minutes < 60 {
        format!("{}m", minutes)
    } else {
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}

/// Reduce an ISO timestamp to 24-hour "HH:MM"; other input is returned unchanged
pub fn format_clock(timestamp: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(timestamp) {
        return dt.format("%H:%M").to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(timestamp, pattern) {
            return dt.format("%H:%M").to_string();
        }
    }
    timestamp.to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_temperature() {
        assert_eq!(format_temperature(25.0), "25.0°C");
        assert_eq!(format_temperature(-3.26), "-3.3°C");
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::zero()), "expired");
        assert_eq!(format_remaining(Duration::seconds(-5)), "expired");
        assert_eq!(format_remaining(Duration::seconds(30)), "under a minute");
        assert_eq!(format_remaining(Duration::minutes(4)), "4m");
        assert_eq!(format_remaining(Duration::minutes(24 * 60 - 1)), "23h 59m");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock("2024-06-01T13:05"), "13:05");
        assert_eq!(format_clock("2024-06-01T13:05:59"), "13:05");
        assert_eq!(format_clock("2024-06-01T13:05:00+01:00"), "13:05");
        assert_eq!(format_clock("13:05"), "13:05");
        assert_eq!(format_clock("yesterday"), "yesterday");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }
}
