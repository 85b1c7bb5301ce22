//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Creates a timestamp from Unix seconds, as Stripe reports them.
    ///
    /// Returns `None` for values chrono cannot represent.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Calendar day (UTC) this timestamp falls on.
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// Creates a new timestamp by adding the specified number of days.
    ///
    /// Negative values subtract days.
    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn from_unix_secs_matches_epoch_seconds() {
        let ts = Timestamp::from_unix_secs(1_704_067_200).unwrap();
        assert_eq!(ts.as_unix_secs(), 1_704_067_200);
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn from_unix_secs_rejects_out_of_range_values() {
        assert!(Timestamp::from_unix_secs(i64::MAX).is_none());
    }

    #[test]
    fn add_days_moves_forward_and_back() {
        let ts = Timestamp::from_unix_secs(1_704_067_200).unwrap();
        assert_eq!(ts.add_days(1).as_unix_secs(), 1_704_067_200 + 86_400);
        assert!(ts.add_days(-1).is_before(&ts));
    }

    #[test]
    fn timestamp_serializes_as_rfc3339() {
        let ts = Timestamp::from_unix_secs(0).unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, r#""1970-01-01T00:00:00Z""#);
    }
}
