use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

const DAY_MILLIS: i64 = 1000 * 60 * 60 * 24;

/// Reminder counts for one UTC day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DailyMetrics {
    /// Sent during the day
    pub sent: i64,
    /// Failed and still waiting for a retry, last touched during the day
    pub failed: i64,
    /// Dead-lettered during the day
    pub dead: i64,
    /// All pending reminders, regardless of day
    pub pending: i64,
}

impl DailyMetrics {
    pub fn summary(&self) -> String {
        format!(
            "📊 *Daily Reminder Metrics*\n\n✅ Sent: {}\n⚠️ Failed: {}\n☠️ Dead: {}\n⏳ Pending: {}",
            self.sent, self.failed, self.dead, self.pending
        )
    }
}

/// Timestamp of the start of the UTC day containing `timestamp`
pub fn start_of_utc_day(timestamp: i64) -> i64 {
    timestamp - timestamp.rem_euclid(DAY_MILLIS)
}

/// `YYYY-MM-DD` of the UTC day containing `timestamp`
pub fn utc_date(timestamp: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp).single() {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tue Mar 05 2024 13:45:10 UTC
    const TS: i64 = 1709646310000;

    #[test]
    fn finds_start_of_day() {
        assert_eq!(start_of_utc_day(TS), 1709596800000);
        assert_eq!(start_of_utc_day(1709596800000), 1709596800000);
        assert_eq!(utc_date(TS), "2024-03-05");
    }

    #[test]
    fn summary_lists_all_counts() {
        let metrics = DailyMetrics {
            sent: 3,
            failed: 2,
            dead: 1,
            pending: 9,
        };
        let summary = metrics.summary();
        assert!(summary.contains("Sent: 3"));
        assert!(summary.contains("Failed: 2"));
        assert!(summary.contains("Dead: 1"));
        assert!(summary.contains("Pending: 9"));
    }
}
