//! Date parsing utilities.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::error::EngineError;

/// Parse an RFC 3339 timestamp to UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s.trim())
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}

/// Parse either an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
///
/// Bare dates resolve to the first second of the day, or the last one when
/// `end_of_day` is set, so that a date-only range covers whole days.
pub fn parse_bound(s: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
  if let Some(ts) = parse_timestamp(s) {
    return Some(ts);
  }
  let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?;
  let time = if end_of_day {
    NaiveTime::from_hms_opt(23, 59, 59)?
  } else {
    NaiveTime::from_hms_opt(0, 0, 0)?
  };
  Some(date.and_time(time).and_utc())
}

/// Inclusive report window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl DateRange {
  /// Fails when `end < start`; that is a caller bug, not dirty data.
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, EngineError> {
    if end < start {
      return Err(EngineError::validation(
        "range",
        &format!("end {} is before start {}", end.to_rfc3339(), start.to_rfc3339()),
      ));
    }
    Ok(Self { start, end })
  }

  pub fn parse(start: &str, end: &str) -> Result<Self, EngineError> {
    let start = parse_bound(start, false)
      .ok_or_else(|| EngineError::validation("range.start", "expected RFC3339 or YYYY-MM-DD"))?;
    let end = parse_bound(end, true)
      .ok_or_else(|| EngineError::validation("range.end", "expected RFC3339 or YYYY-MM-DD"))?;
    Self::new(start, end)
  }

  /// Both ends inclusive.
  pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
    *ts >= self.start && *ts <= self.end
  }

  /// "YYYY-MM-DD to YYYY-MM-DD", used in report headings.
  pub fn label(&self) -> String {
    format!(
      "{} to {}",
      self.start.format("%Y-%m-%d"),
      self.end.format("%Y-%m-%d")
    )
  }
}
