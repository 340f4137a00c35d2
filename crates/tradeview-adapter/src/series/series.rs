/*
[INPUT]:  Historical bar pages, live bar ticks, viewport positions
[OUTPUT]: One strictly time-ordered bar sequence + backfill requests + price ticker
[POS]:    Series layer - pure merge engine (no IO)
[UPDATE]: When changing merge, de-duplication or backfill rules
*/

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::series::bar::{Bar, Interval};

/// Bars requested per page (initial load and each backfill)
pub const DEFAULT_PAGE_SIZE: u32 = 500;
/// Logical bar index under which the left viewport edge triggers a backfill
pub const DEFAULT_BACKFILL_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveMerge {
    /// Same interval still forming; last bar overwritten
    Replaced,
    Appended,
    /// Older than the last bar; dropped
    Stale,
}

/// Fetch parameters for one backfill page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillRequest {
    /// Inclusive upper bound, one second before the current boundary
    pub end_time: i64,
    pub limit: u32,
    epoch: u64,
}

impl BackfillRequest {
    pub fn end_time_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.end_time, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillOutcome {
    /// Number of bars added to the left
    Prepended(usize),
    /// Nothing older exists; further triggers are ignored
    Exhausted,
    /// The series was reloaded since the request was issued
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceDirection {
    Up,
    Down,
    Flat,
}

/// Current vs previous close shown next to the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceTicker {
    pub current: Option<Decimal>,
    pub previous: Option<Decimal>,
}

impl PriceTicker {
    fn seed(last: &Bar) -> Self {
        Self {
            current: Some(last.close),
            previous: Some(last.open),
        }
    }

    fn tick(&mut self, close: Decimal) {
        self.previous = self.current;
        self.current = Some(close);
    }

    pub fn direction(&self) -> PriceDirection {
        match (self.current, self.previous) {
            (Some(current), Some(previous)) => match current.cmp(&previous) {
                Ordering::Greater => PriceDirection::Up,
                Ordering::Less => PriceDirection::Down,
                Ordering::Equal => PriceDirection::Flat,
            },
            _ => PriceDirection::Flat,
        }
    }
}

/// Ordered bars for one (symbol, interval) pair.
///
/// `time` strictly increases across `bars`; every mutation keeps that true.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    interval: Interval,
    page_size: u32,
    bars: Vec<Bar>,
    boundary: Option<i64>,
    backfill_in_flight: bool,
    exhausted: bool,
    ticker: PriceTicker,
    epoch: u64,
}

impl TimeSeries {
    pub fn new(interval: Interval) -> Self {
        Self {
            interval,
            page_size: DEFAULT_PAGE_SIZE,
            bars: Vec::new(),
            boundary: None,
            backfill_in_flight: false,
            exhausted: false,
            ticker: PriceTicker::default(),
            epoch: 0,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Build from a history page in any order
    pub fn from_history(interval: Interval, bars: Vec<Bar>) -> Self {
        let mut series = Self::new(interval);
        series.load_history(bars);
        series
    }

    /// Replace everything with a fresh history page. Pending backfills are voided.
    pub fn load_history(&mut self, bars: Vec<Bar>) {
        self.bars = normalize(self.interval, bars);
        self.boundary = self.bars.first().map(|bar| bar.time);
        self.backfill_in_flight = false;
        self.exhausted = false;
        self.ticker = self.bars.last().map(PriceTicker::seed).unwrap_or_default();
        self.epoch += 1;
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Oldest bar time already fetched
    pub fn boundary(&self) -> Option<i64> {
        self.boundary
    }

    pub fn ticker(&self) -> PriceTicker {
        self.ticker
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_backfill_in_flight(&self) -> bool {
        self.backfill_in_flight
    }

    /// Merge one live bar: replace the forming bar, append a newer one, drop older ones.
    pub fn apply_live(&mut self, mut bar: Bar) -> LiveMerge {
        bar.time = self.interval.align(bar.time);

        let last_time = self.bars.last().map(|last| last.time);
        let outcome = match last_time {
            Some(last_time) if bar.time < last_time => return LiveMerge::Stale,
            Some(last_time) if bar.time == last_time => {
                if let Some(last) = self.bars.last_mut() {
                    *last = bar.clone();
                }
                LiveMerge::Replaced
            }
            _ => {
                if self.boundary.is_none() {
                    self.boundary = Some(bar.time);
                }
                self.bars.push(bar.clone());
                LiveMerge::Appended
            }
        };

        self.ticker.tick(bar.close);
        outcome
    }

    /// Start a backfill if the left viewport edge is within `threshold` bars of
    /// the oldest loaded bar. At most one request is outstanding at a time.
    pub fn begin_backfill(&mut self, left_edge: f64, threshold: f64) -> Option<BackfillRequest> {
        if self.backfill_in_flight || self.exhausted {
            return None;
        }
        let boundary = self.boundary?;
        if left_edge >= threshold {
            return None;
        }

        self.backfill_in_flight = true;
        Some(BackfillRequest {
            end_time: boundary - 1,
            limit: self.page_size,
            epoch: self.epoch,
        })
    }

    /// Prepend a backfill page. Bars whose time is already present keep the
    /// value already in the series.
    pub fn complete_backfill(&mut self, request: BackfillRequest, bars: Vec<Bar>) -> BackfillOutcome {
        if request.epoch != self.epoch {
            return BackfillOutcome::Discarded;
        }
        self.backfill_in_flight = false;

        let previous_boundary = self.boundary;
        let incoming = normalize(self.interval, bars);
        let before = self.bars.len();
        self.bars = merge_keep_existing(std::mem::take(&mut self.bars), incoming);
        let added = self.bars.len() - before;
        self.boundary = self.bars.first().map(|bar| bar.time);

        let advanced = match (previous_boundary, self.boundary) {
            (Some(previous), Some(current)) => current < previous,
            (None, Some(_)) => true,
            _ => false,
        };
        if !advanced {
            self.exhausted = true;
            return BackfillOutcome::Exhausted;
        }
        BackfillOutcome::Prepended(added)
    }

    /// Release the in-flight slot after a failed fetch; the next trigger may retry.
    pub fn fail_backfill(&mut self, request: BackfillRequest) {
        if request.epoch == self.epoch {
            self.backfill_in_flight = false;
        }
    }
}

/// Align, sort ascending and drop duplicate times (last occurrence wins)
fn normalize(interval: Interval, bars: Vec<Bar>) -> Vec<Bar> {
    let mut bars: Vec<Bar> = bars
        .into_iter()
        .map(|mut bar| {
            bar.time = interval.align(bar.time);
            bar
        })
        .collect();
    bars.sort_by_key(|bar| bar.time);

    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.time == bar.time => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

/// Merge two sorted, duplicate-free sequences; on equal time the existing bar wins
fn merge_keep_existing(existing: Vec<Bar>, incoming: Vec<Bar>) -> Vec<Bar> {
    let mut out = Vec::with_capacity(existing.len() + incoming.len());
    let mut existing = existing.into_iter().peekable();
    let mut incoming = incoming.into_iter().peekable();

    loop {
        let next = match (existing.peek(), incoming.peek()) {
            (Some(old), Some(new)) => match old.time.cmp(&new.time) {
                Ordering::Less => existing.next(),
                Ordering::Greater => incoming.next(),
                Ordering::Equal => {
                    incoming.next();
                    existing.next()
                }
            },
            (Some(_), None) => existing.next(),
            (None, Some(_)) => incoming.next(),
            (None, None) => break,
        };
        if let Some(bar) = next {
            out.push(bar);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const HOUR: i64 = 3_600;

    fn bar(time: i64, close: i64) -> Bar {
        Bar {
            time,
            open: Decimal::from(close - 1),
            high: Decimal::from(close + 1),
            low: Decimal::from(close - 2),
            close: Decimal::from(close),
            volume: Decimal::ONE,
        }
    }

    fn times(series: &TimeSeries) -> Vec<i64> {
        series.bars().iter().map(|bar| bar.time).collect()
    }

    fn assert_strictly_increasing(series: &TimeSeries) {
        let times = times(series);
        assert!(
            times.windows(2).all(|pair| pair[0] < pair[1]),
            "times not strictly increasing: {times:?}"
        );
    }

    #[test]
    fn test_from_history_orders_ascending_and_sets_boundary() {
        let series = TimeSeries::from_history(
            Interval::OneHour,
            vec![bar(3 * HOUR, 13), bar(HOUR, 11), bar(2 * HOUR, 12)],
        );
        assert_eq!(times(&series), vec![HOUR, 2 * HOUR, 3 * HOUR]);
        assert_eq!(series.boundary(), Some(HOUR));
        assert_eq!(series.ticker().current, Some(Decimal::from(13)));
        assert_eq!(series.ticker().previous, Some(Decimal::from(12)));
    }

    #[test]
    fn test_live_bar_replaces_appends_or_is_stale() {
        let mut series =
            TimeSeries::from_history(Interval::OneHour, vec![bar(HOUR, 10), bar(2 * HOUR, 11)]);

        assert_eq!(series.apply_live(bar(2 * HOUR, 12)), LiveMerge::Replaced);
        assert_eq!(series.last().map(|b| b.close), Some(Decimal::from(12)));

        assert_eq!(series.apply_live(bar(3 * HOUR, 13)), LiveMerge::Appended);
        assert_eq!(series.apply_live(bar(HOUR, 99)), LiveMerge::Stale);
        assert_eq!(times(&series), vec![HOUR, 2 * HOUR, 3 * HOUR]);
        assert_eq!(series.bars()[0].close, Decimal::from(10));
    }

    #[test]
    fn test_live_bar_time_is_aligned_to_interval() {
        let mut series = TimeSeries::from_history(Interval::OneHour, vec![bar(HOUR, 10)]);
        assert_eq!(series.apply_live(bar(HOUR + 1_799, 11)), LiveMerge::Replaced);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_applying_same_live_bar_twice_is_idempotent() {
        let mut series = TimeSeries::from_history(Interval::OneHour, vec![bar(HOUR, 10)]);
        series.apply_live(bar(2 * HOUR, 11));
        let once = series.bars().to_vec();

        assert_eq!(series.apply_live(bar(2 * HOUR, 11)), LiveMerge::Replaced);
        assert_eq!(series.bars(), once.as_slice());
    }

    #[test]
    fn test_live_bar_on_empty_series_sets_boundary() {
        let mut series = TimeSeries::new(Interval::OneMinute);
        assert_eq!(series.apply_live(bar(120, 5)), LiveMerge::Appended);
        assert_eq!(series.boundary(), Some(120));
    }

    #[test]
    fn test_ticker_moves_previous_to_current() {
        let mut series = TimeSeries::from_history(Interval::OneHour, vec![bar(HOUR, 10)]);
        series.apply_live(bar(HOUR, 12));
        let ticker = series.ticker();
        assert_eq!(ticker.previous, Some(Decimal::from(10)));
        assert_eq!(ticker.current, Some(Decimal::from(12)));
        assert_eq!(ticker.direction(), PriceDirection::Up);

        series.apply_live(bar(2 * HOUR, 7));
        assert_eq!(series.ticker().direction(), PriceDirection::Down);
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(9.5, true)]
    #[case(-3.0, true)]
    #[case(10.0, false)]
    #[case(250.0, false)]
    fn test_backfill_triggers_near_left_edge(#[case] left_edge: f64, #[case] triggers: bool) {
        let mut series = TimeSeries::from_history(Interval::OneHour, vec![bar(5 * HOUR, 1)]);
        let request = series.begin_backfill(left_edge, DEFAULT_BACKFILL_THRESHOLD);
        assert_eq!(request.is_some(), triggers);
        if let Some(request) = request {
            assert_eq!(request.end_time, 5 * HOUR - 1);
            assert_eq!(request.limit, DEFAULT_PAGE_SIZE);
        }
    }

    #[test]
    fn test_only_one_backfill_in_flight() {
        let mut series = TimeSeries::from_history(Interval::OneHour, vec![bar(5 * HOUR, 1)]);
        let first = series.begin_backfill(0.0, 10.0);
        assert!(first.is_some());
        assert!(series.begin_backfill(0.0, 10.0).is_none());
        assert!(series.is_backfill_in_flight());

        series.fail_backfill(first.unwrap());
        assert!(series.begin_backfill(0.0, 10.0).is_some());
    }

    #[test]
    fn test_backfill_prepends_and_advances_boundary() {
        let mut series =
            TimeSeries::from_history(Interval::OneHour, vec![bar(5 * HOUR, 5), bar(6 * HOUR, 6)]);
        let request = series.begin_backfill(0.0, 10.0).unwrap();

        let outcome = series.complete_backfill(request, vec![bar(4 * HOUR, 4), bar(3 * HOUR, 3)]);
        assert_eq!(outcome, BackfillOutcome::Prepended(2));
        assert_eq!(times(&series), vec![3 * HOUR, 4 * HOUR, 5 * HOUR, 6 * HOUR]);
        assert_eq!(series.boundary(), Some(3 * HOUR));
        assert!(!series.is_backfill_in_flight());
    }

    #[test]
    fn test_backfill_overlap_keeps_existing_bar() {
        let mut series =
            TimeSeries::from_history(Interval::OneHour, vec![bar(5 * HOUR, 5), bar(6 * HOUR, 6)]);
        let request = series.begin_backfill(0.0, 10.0).unwrap();
        series.apply_live(bar(6 * HOUR, 60));

        let outcome = series.complete_backfill(
            request,
            vec![bar(4 * HOUR, 4), bar(5 * HOUR, 50), bar(6 * HOUR, 600)],
        );
        assert_eq!(outcome, BackfillOutcome::Prepended(1));
        assert_eq!(series.bars()[1].close, Decimal::from(5));
        assert_eq!(series.bars()[2].close, Decimal::from(60));
        assert_strictly_increasing(&series);
    }

    #[test]
    fn test_empty_backfill_marks_exhausted() {
        let mut series = TimeSeries::from_history(Interval::OneHour, vec![bar(5 * HOUR, 5)]);
        let request = series.begin_backfill(0.0, 10.0).unwrap();
        assert_eq!(series.complete_backfill(request, Vec::new()), BackfillOutcome::Exhausted);
        assert!(series.is_exhausted());
        assert!(series.begin_backfill(0.0, 10.0).is_none());
    }

    #[test]
    fn test_backfill_of_only_known_bars_marks_exhausted() {
        let mut series = TimeSeries::from_history(Interval::OneHour, vec![bar(5 * HOUR, 5)]);
        let request = series.begin_backfill(0.0, 10.0).unwrap();
        let outcome = series.complete_backfill(request, vec![bar(5 * HOUR, 1)]);
        assert_eq!(outcome, BackfillOutcome::Exhausted);
        assert_eq!(series.bars()[0].close, Decimal::from(5));
    }

    #[test]
    fn test_backfill_after_reload_is_discarded() {
        let mut series = TimeSeries::from_history(Interval::OneHour, vec![bar(5 * HOUR, 5)]);
        let request = series.begin_backfill(0.0, 10.0).unwrap();
        series.load_history(vec![bar(9 * HOUR, 9)]);

        let outcome = series.complete_backfill(request, vec![bar(4 * HOUR, 4)]);
        assert_eq!(outcome, BackfillOutcome::Discarded);
        assert_eq!(times(&series), vec![9 * HOUR]);
    }

    #[test]
    fn test_interleaved_backfill_and_live_keep_order() {
        let mut series = TimeSeries::from_history(
            Interval::OneHour,
            (20..25).map(|i| bar(i * HOUR, i)).collect(),
        );

        for round in 0..6i64 {
            let request = series.begin_backfill(0.0, 10.0).unwrap();
            let live_time = (25 + round / 2) * HOUR;
            series.apply_live(bar(live_time, 100 + round));
            series.apply_live(bar((24 - round) * HOUR, 1));

            let end = request.end_time;
            let page: Vec<Bar> = (0..4).map(|i| bar(end + 1 - (i + 1) * HOUR, 0)).rev().collect();
            series.complete_backfill(request, page);
            assert_strictly_increasing(&series);
        }

        let mut deduped = times(&series);
        deduped.dedup();
        assert_eq!(deduped.len(), series.len());
    }
}
