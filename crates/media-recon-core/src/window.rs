use crate::error::Error;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use std::fmt;

/// Offset applied when the operator names a date without one.
pub const DEFAULT_UTC_OFFSET: &str = "-04:00";

/// Half-open `[start, end)` interval in UTC covering one local calendar day.
///
/// The offset is applied as a constant for the whole day, so a day that spans a
/// DST transition is still treated as exactly 24 hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, Error> {
        if start >= end {
            return Err(Error::invalid_input(format!(
                "window start {} is not before end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Resolve a local `YYYY-MM-DD` date under a fixed `+HH:MM`/`-HH:MM` offset.
    pub fn for_local_date(date: &str, offset: &str) -> Result<Self, Error> {
        let offset = parse_offset(offset)?;
        let day = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .map_err(|e| Error::invalid_input(format!("invalid date '{}': {}", date, e)))?;
        let midnight = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::invalid_input(format!("invalid date '{}'", date)))?;
        let start_local = offset
            .from_local_datetime(&midnight)
            .single()
            .ok_or_else(|| Error::invalid_input(format!("ambiguous local date '{}'", date)))?;
        let start = start_local.with_timezone(&Utc);
        Self::new(start, start + Duration::days(1))
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        )
    }
}

/// Parse `+HH:MM` or `-HH:MM` into a fixed offset.
pub fn parse_offset(raw: &str) -> Result<FixedOffset, Error> {
    let bad = || Error::invalid_input(format!("invalid UTC offset '{}', expected +HH:MM", raw));
    let raw = raw.trim();
    let (sign, rest) = match raw.as_bytes().first() {
        Some(b'+') => (1, &raw[1..]),
        Some(b'-') => (-1, &raw[1..]),
        _ => return Err(bad()),
    };
    let (hh, mm) = rest.split_once(':').ok_or_else(bad)?;
    let two_digits = |s: &str| s.len() == 2 && s.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hh) || !two_digits(mm) {
        return Err(bad());
    }
    let hours: i32 = hh.parse().map_err(|_| bad())?;
    let minutes: i32 = mm.parse().map_err(|_| bad())?;
    if hours > 23 || minutes > 59 {
        return Err(bad());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(bad)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_negative_offset_window() {
        let w = TimeWindow::for_local_date("2025-03-10", "-04:00").unwrap();
        assert_eq!(w.start(), utc("2025-03-10T04:00:00Z"));
        assert_eq!(w.end(), utc("2025-03-11T04:00:00Z"));
    }

    #[test]
    fn test_positive_offset_window() {
        let w = TimeWindow::for_local_date("2025-01-01", "+05:30").unwrap();
        assert_eq!(w.start(), utc("2024-12-31T18:30:00Z"));
        assert_eq!(w.end(), utc("2025-01-01T18:30:00Z"));
    }

    #[test]
    fn test_window_is_half_open() {
        let w = TimeWindow::for_local_date("2025-03-10", "+00:00").unwrap();
        assert!(w.contains(utc("2025-03-10T00:00:00Z")));
        assert!(w.contains(utc("2025-03-10T23:59:59Z")));
        assert!(!w.contains(utc("2025-03-11T00:00:00Z")));
        assert!(!w.contains(utc("2025-03-09T23:59:59Z")));
    }

    #[test]
    fn test_dst_day_is_still_24_hours() {
        let w = TimeWindow::for_local_date("2025-03-09", "-05:00").unwrap();
        assert_eq!(w.end() - w.start(), Duration::hours(24));
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(TimeWindow::for_local_date("2025-13-01", "-04:00").is_err());
        assert!(TimeWindow::for_local_date("10/03/2025", "-04:00").is_err());
        assert!(TimeWindow::for_local_date("2025-03-10", "04:00").is_err());
        assert!(TimeWindow::for_local_date("2025-03-10", "-4:00").is_err());
        assert!(TimeWindow::for_local_date("2025-03-10", "-04:75").is_err());
        assert!(TimeWindow::for_local_date("2025-03-10", "").is_err());
    }

    #[test]
    fn test_rejects_signed_offset_fields() {
        for raw in ["+-1:00", "-+4:00", "+04:-5", "+00:+9", "+0a:00", "- 4:00"] {
            assert!(parse_offset(raw).is_err(), "accepted {raw:?}");
        }
        assert_eq!(parse_offset("-04:00").unwrap().local_minus_utc(), -14400);
        assert_eq!(parse_offset("+05:30").unwrap().local_minus_utc(), 19800);
    }

    #[test]
    fn test_rejects_empty_window() {
        let t = utc("2025-03-10T04:00:00Z");
        assert!(TimeWindow::new(t, t).is_err());
    }
}
