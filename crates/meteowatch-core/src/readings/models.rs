use serde::{Deserialize, Serialize};

/// Number of most recent history points kept for display
pub const HISTORY_WINDOW: usize = 10;

/// Body of `GET /api/latest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestReading {
    pub temperature: f64,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Body of `GET /api/history`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub timestamps: Vec<String>,
    #[serde(default)]
    pub temperatures: Vec<f64>,
    #[serde(default)]
    pub humidity: Vec<f64>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl History {
    /// Point count as reported by the server, else the number of timestamps
    pub fn count(&self) -> usize {
        self.count.unwrap_or(self.timestamps.len())
    }

    /// Keep only the last `n` points of every series
    pub fn last(mut self, n: usize) -> Self {
        fn tail<T>(v: &mut Vec<T>, n: usize) {
            if v.len() > n {
                v.drain(..v.len() - n);
            }
        }
        tail(&mut self.timestamps, n);
        tail(&mut self.temperatures, n);
        tail(&mut self.humidity, n);
        self.count = Some(self.timestamps.len());
        self
    }

    /// (timestamp, temperature) pairs in order
    pub fn points(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.timestamps
            .iter()
            .map(String::as_str)
            .zip(self.temperatures.iter().copied())
    }
}

/// Direction of the latest temperature relative to the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    /// Compare against the previous reading; no previous reading counts as 0.
    pub fn between(previous: Option<f64>, current: f64) -> Self {
        let previous = previous.unwrap_or(0.0);
        if current > previous {
            Trend::Up
        } else if current < previous {
            Trend::Down
        } else {
            Trend::Stable
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Trend::Up => "↑",
            Trend::Down => "↓",
            Trend::Stable => "→",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_between() {
        assert_eq!(Trend::between(Some(20.0), 21.5), Trend::Up);
        assert_eq!(Trend::between(Some(20.0), 19.0), Trend::Down);
        assert_eq!(Trend::between(Some(20.0), 20.0), Trend::Stable);
        // First reading compares against zero
        assert_eq!(Trend::between(None, 25.0), Trend::Up);
        assert_eq!(Trend::between(None, -3.0), Trend::Down);
        assert_eq!(Trend::between(None, 0.0), Trend::Stable);
    }

    #[test]
    fn test_history_count_defaults_to_timestamps() {
        let json = r#"{"timestamps":["10:00","11:00"],"temperatures":[20.5,21.0]}"#;
        let history: History = serde_json::from_str(json).unwrap();
        assert_eq!(history.count(), 2);

        let json = r#"{"timestamps":[],"temperatures":[],"count":7}"#;
        let history: History = serde_json::from_str(json).unwrap();
        assert_eq!(history.count(), 7);
    }

    #[test]
    fn test_history_last_keeps_tail() {
        let history = History {
            timestamps: (0..24).map(|h| format!("{:02}:00", h)).collect(),
            temperatures: (0..24_i32).map(f64::from).collect(),
            humidity: Vec::new(),
            count: Some(24),
        }
        .last(HISTORY_WINDOW);

        assert_eq!(history.count(), HISTORY_WINDOW);
        assert_eq!(history.timestamps.first().map(String::as_str), Some("14:00"));
        assert_eq!(history.temperatures.last().copied(), Some(23.0));
        assert!(history.humidity.is_empty());
        assert_eq!(history.points().count(), HISTORY_WINDOW);
    }

    #[test]
    fn test_latest_reading_optional_fields() {
        let reading: LatestReading = serde_json::from_str(r#"{"temperature":25}"#).unwrap();
        assert_eq!(reading.temperature, 25.0);
        assert!(reading.humidity.is_none());
        assert!(reading.time.is_none());
    }

    #[test]
    fn test_trend_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Trend::Stable).unwrap(), r#""stable""#);
    }
}
