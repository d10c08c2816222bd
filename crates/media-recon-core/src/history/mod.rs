pub mod extract;
pub mod rules;

use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::service::HistoryFeed;
use crate::window::TimeWindow;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

pub use extract::{dedupe_first_seen, DeletionEvent, DeletionExtractor, ExtractStats};

/// One raw history entry. Only the timestamp, event kind, entity id and path
/// are interpreted; everything else rides along untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord(Value);

impl HistoryRecord {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// `None` when the timestamp is absent or unparseable.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        rules::first_str(&self.0, rules::TIMESTAMP_RULES).and_then(parse_timestamp)
    }

    pub fn event_kind(&self) -> Option<&str> {
        rules::first_str(&self.0, rules::EVENT_KIND_RULES)
    }
}

impl From<Value> for HistoryRecord {
    fn from(raw: Value) -> Self {
        Self(raw)
    }
}

/// ISO-8601 with optional `Z`/offset and any fractional-second precision.
/// Values with no offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// How the feed is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// One request for everything since the window start.
    Since,
    /// Newest-first pages of `page_size` records.
    Paged { page_size: u32, overscan_pages: u32 },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub requests: u32,
    pub records_fetched: usize,
    pub records_in_window: usize,
    pub skipped_bad_timestamp: usize,
}

#[derive(Debug, Clone)]
pub struct HistoryScan {
    /// In-window records, in feed order.
    pub records: Vec<HistoryRecord>,
    pub stats: ScanStats,
}

pub struct HistoryScanner<'a, F: HistoryFeed + ?Sized> {
    feed: &'a F,
    window: TimeWindow,
}

impl<'a, F: HistoryFeed + ?Sized> HistoryScanner<'a, F> {
    pub fn new(feed: &'a F, window: TimeWindow) -> Self {
        Self { feed, window }
    }

    /// Collect every record whose timestamp falls inside the window.
    ///
    /// Records are always re-filtered by timestamp, whatever page they arrived
    /// on. Feed errors abort the scan.
    pub fn scan(&self, mode: ScanMode, reporter: &dyn ProgressReporter) -> Result<HistoryScan, Error> {
        info!("Scanning history for {} using {:?}", self.window, mode);
        let started = Instant::now();
        reporter.on_history_start();

        let scan = match mode {
            ScanMode::Since => self.scan_since(reporter)?,
            ScanMode::Paged {
                page_size,
                overscan_pages,
            } => self.scan_paged(page_size, overscan_pages, reporter)?,
        };

        info!(
            "Fetched {} history records in {} request(s), {} inside the window",
            scan.stats.records_fetched, scan.stats.requests, scan.stats.records_in_window
        );
        reporter.on_history_complete(scan.stats.records_in_window, started.elapsed().as_secs_f64());
        Ok(scan)
    }

    fn scan_since(&self, reporter: &dyn ProgressReporter) -> Result<HistoryScan, Error> {
        let mut stats = ScanStats::default();
        let fetched = self.feed.since(self.window.start())?;
        stats.requests = 1;
        stats.records_fetched = fetched.len();
        reporter.on_history_page(1, stats.records_fetched);

        let mut records = Vec::new();
        for record in fetched {
            match record.timestamp() {
                Some(at) if self.window.contains(at) => records.push(record),
                Some(_) => {}
                None => stats.skipped_bad_timestamp += 1,
            }
        }
        stats.records_in_window = records.len();
        Ok(HistoryScan { records, stats })
    }

    /// Stop when a page is short (feed exhausted), or when a page reaches past
    /// the window start without holding any in-window record. After that,
    /// `overscan_pages` more pages are read to catch records a loosely ordered
    /// feed placed late; any in-window hit resets the countdown.
    fn scan_paged(
        &self,
        page_size: u32,
        overscan_pages: u32,
        reporter: &dyn ProgressReporter,
    ) -> Result<HistoryScan, Error> {
        if page_size == 0 {
            return Err(Error::invalid_input("history page size must be positive"));
        }

        let mut stats = ScanStats::default();
        let mut records = Vec::new();
        let mut page = 1u32;
        let mut pages_past_window = 0u32;

        loop {
            let fetched = self.feed.page(page, page_size)?;
            stats.requests += 1;
            stats.records_fetched += fetched.len();
            reporter.on_history_page(page, stats.records_fetched);

            if fetched.is_empty() {
                break;
            }
            let page_len = fetched.len();

            let mut page_has_target = false;
            let mut page_has_older = false;
            for record in fetched {
                match record.timestamp() {
                    Some(at) if self.window.contains(at) => {
                        page_has_target = true;
                        records.push(record);
                    }
                    Some(at) if at < self.window.start() => page_has_older = true,
                    Some(_) => {}
                    None => stats.skipped_bad_timestamp += 1,
                }
            }

            if page_len < page_size as usize {
                debug!("Page {} was short ({} records), feed exhausted", page, page_len);
                break;
            }

            if page_has_target {
                pages_past_window = 0;
            } else if page_has_older || pages_past_window > 0 {
                pages_past_window += 1;
                if pages_past_window > overscan_pages {
                    debug!("Page {} is past the window, stopping", page);
                    break;
                }
            }

            page += 1;
        }

        stats.records_in_window = records.len();
        Ok(HistoryScan { records, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use serde_json::json;
    use std::cell::RefCell;

    /// Serves a fixed newest-first list, paged on request.
    struct VecFeed {
        records: Vec<Value>,
        requested_pages: RefCell<Vec<u32>>,
    }

    impl VecFeed {
        fn new(records: Vec<Value>) -> Self {
            Self {
                records,
                requested_pages: RefCell::new(Vec::new()),
            }
        }
    }

    impl HistoryFeed for VecFeed {
        fn since(&self, start: DateTime<Utc>) -> Result<Vec<HistoryRecord>, Error> {
            Ok(self
                .records
                .iter()
                .cloned()
                .map(HistoryRecord::new)
                .filter(|r| r.timestamp().map_or(true, |t| t >= start))
                .collect())
        }

        fn page(&self, page: u32, page_size: u32) -> Result<Vec<HistoryRecord>, Error> {
            self.requested_pages.borrow_mut().push(page);
            let start = ((page - 1) * page_size) as usize;
            Ok(self
                .records
                .iter()
                .skip(start)
                .take(page_size as usize)
                .cloned()
                .map(HistoryRecord::new)
                .collect())
        }
    }

    fn rec(date: &str, id: i64) -> Value {
        json!({"date": date, "eventType": "movieFileDeleted", "movieId": id})
    }

    fn window() -> TimeWindow {
        TimeWindow::for_local_date("2025-03-10", "-04:00").unwrap()
    }

    fn paged(page_size: u32, overscan_pages: u32) -> ScanMode {
        ScanMode::Paged {
            page_size,
            overscan_pages,
        }
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = DateTime::parse_from_rfc3339("2025-03-10T05:06:07Z").unwrap();
        assert_eq!(parse_timestamp("2025-03-10T05:06:07Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-10T05:06:07").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-03-10T01:06:07-04:00").unwrap(), expected);
        assert!(parse_timestamp("2025-03-10T05:06:07.1234567Z").is_some());
        assert!(parse_timestamp("2025-03-10T05:06:07.5").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_since_mode_filters_end_and_bad_timestamps() {
        let feed = VecFeed::new(vec![
            rec("2025-03-11T05:00:00Z", 1),
            rec("2025-03-10T12:00:00Z", 2),
            json!({"eventType": "movieFileDeleted", "movieId": 3}),
            json!({"date": "not a date", "movieId": 4}),
            rec("2025-03-10T03:59:59Z", 5),
        ]);
        let scan = HistoryScanner::new(&feed, window())
            .scan(ScanMode::Since, &SilentReporter)
            .unwrap();
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.stats.skipped_bad_timestamp, 2);
        assert_eq!(scan.stats.requests, 1);
    }

    #[test]
    fn test_paged_stops_on_short_page() {
        let feed = VecFeed::new(vec![
            rec("2025-03-10T20:00:00Z", 1),
            rec("2025-03-10T10:00:00Z", 2),
            rec("2025-03-10T09:00:00Z", 3),
        ]);
        let scan = HistoryScanner::new(&feed, window())
            .scan(paged(2, 0), &SilentReporter)
            .unwrap();
        assert_eq!(scan.records.len(), 3);
        assert_eq!(*feed.requested_pages.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_paged_continues_past_straddling_page() {
        // Page 2 straddles the window start, page 3 is entirely older.
        let feed = VecFeed::new(vec![
            rec("2025-03-12T10:00:00Z", 1),
            rec("2025-03-11T10:00:00Z", 2),
            rec("2025-03-10T10:00:00Z", 3),
            rec("2025-03-09T10:00:00Z", 4),
            rec("2025-03-08T10:00:00Z", 5),
            rec("2025-03-07T10:00:00Z", 6),
            rec("2025-03-06T10:00:00Z", 7),
        ]);
        let scan = HistoryScanner::new(&feed, window())
            .scan(paged(2, 0), &SilentReporter)
            .unwrap();
        assert_eq!(scan.records.len(), 1);
        assert_eq!(*feed.requested_pages.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn test_overscan_catches_out_of_order_record() {
        let feed = VecFeed::new(vec![
            rec("2025-03-09T10:00:00Z", 1),
            rec("2025-03-09T09:00:00Z", 2),
            rec("2025-03-10T10:00:00Z", 3),
            rec("2025-03-09T08:00:00Z", 4),
            rec("2025-03-08T10:00:00Z", 5),
            rec("2025-03-08T09:00:00Z", 6),
            rec("2025-03-07T10:00:00Z", 7),
        ]);

        let strict = HistoryScanner::new(&feed, window())
            .scan(paged(2, 0), &SilentReporter)
            .unwrap();
        assert!(strict.records.is_empty());

        let tolerant = HistoryScanner::new(&feed, window())
            .scan(paged(2, 1), &SilentReporter)
            .unwrap();
        assert_eq!(tolerant.records.len(), 1);
    }

    #[test]
    fn test_paged_empty_feed() {
        let feed = VecFeed::new(vec![]);
        let scan = HistoryScanner::new(&feed, window())
            .scan(paged(100, 1), &SilentReporter)
            .unwrap();
        assert!(scan.records.is_empty());
        assert_eq!(scan.stats.requests, 1);
        assert!(HistoryScanner::new(&feed, window())
            .scan(paged(0, 0), &SilentReporter)
            .is_err());
    }
}
