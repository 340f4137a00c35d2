/*
[INPUT]:  Candle source (REST), candle channel connector, viewport changes
[OUTPUT]: Live, backfilled TimeSeries for one (symbol, interval) + change notifications
[POS]:    Series layer - owns a TimeSeries for the lifetime of one chart view
[UPDATE]: When changing how history, backfill and live ticks are wired together
*/

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{ApiClient, Result};
use crate::series::bar::{Bar, Interval};
use crate::series::series::{
    BackfillOutcome, DEFAULT_BACKFILL_THRESHOLD, DEFAULT_PAGE_SIZE, LiveMerge, PriceTicker,
    TimeSeries,
};
use crate::ws::{
    CandleChannel, CandleFrame, ChannelConfig, ChannelConnection, ConnectionState, Connector,
};

/// Where historical bars come from
#[async_trait]
pub trait CandleSource: Send + Sync + 'static {
    /// Up to `limit` bars ending at `end_time` (inclusive), any order
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>>;
}

#[async_trait]
impl CandleSource for ApiClient {
    async fn fetch_bars(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>> {
        let candles = self
            .get_candles(symbol, interval.as_str(), limit, end_time)
            .await?;
        Ok(candles.into_iter().map(Bar::from).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesViewOptions {
    pub page_size: u32,
    pub backfill_threshold: f64,
}

impl Default for SeriesViewOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            backfill_threshold: DEFAULT_BACKFILL_THRESHOLD,
        }
    }
}

/// One chart's series plus its live feed.
///
/// Dropping the view (or calling [`teardown`](Self::teardown)) stops the feed;
/// late backfill responses and live frames are then ignored.
pub struct SeriesView {
    symbol: String,
    interval: Interval,
    options: SeriesViewOptions,
    series: Arc<Mutex<TimeSeries>>,
    revision: watch::Sender<u64>,
    source: Arc<dyn CandleSource>,
    live: Option<ChannelConnection<CandleChannel>>,
    alive: CancellationToken,
}

impl std::fmt::Debug for SeriesView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesView")
            .field("symbol", &self.symbol)
            .field("interval", &self.interval)
            .field("bars", &lock(&self.series).len())
            .field("live", &self.live.is_some())
            .field("alive", &!self.alive.is_cancelled())
            .finish()
    }
}

impl SeriesView {
    /// Fetch the most recent page and build the series
    pub async fn load(
        source: Arc<dyn CandleSource>,
        symbol: impl Into<String>,
        interval: Interval,
        options: SeriesViewOptions,
    ) -> Result<Self> {
        let symbol = symbol.into();
        let history = source
            .fetch_bars(&symbol, interval, options.page_size, None)
            .await?;
        info!(%symbol, %interval, bars = history.len(), "series history loaded");

        let series = TimeSeries::from_history(interval, history).with_page_size(options.page_size);
        let (revision, _rx) = watch::channel(0u64);

        Ok(Self {
            symbol,
            interval,
            options,
            series: Arc::new(Mutex::new(series)),
            revision,
            source,
            live: None,
            alive: CancellationToken::new(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Open the live candle feed and merge every tick into the series
    pub fn attach_live(&mut self, config: ChannelConfig, connector: Arc<dyn Connector>) -> Result<()> {
        if self.alive.is_cancelled() || self.live.is_some() {
            return Ok(());
        }

        let series = self.series.clone();
        let revision = self.revision.clone();
        let alive = self.alive.clone();
        let symbol = self.symbol.clone();

        let connection = ChannelConnection::spawn(
            CandleChannel::new(self.symbol.clone(), self.interval.as_str()),
            config,
            connector,
            move |frame: CandleFrame| {
                let CandleFrame::Candle { candle } = frame else {
                    return;
                };
                let mut series = lock(&series);
                if alive.is_cancelled() {
                    return;
                }
                match series.apply_live(candle) {
                    LiveMerge::Stale => debug!(%symbol, "stale live bar dropped"),
                    LiveMerge::Replaced | LiveMerge::Appended => {
                        revision.send_modify(|rev| *rev += 1);
                    }
                }
            },
        )?;
        connection.connect();
        self.live = Some(connection);
        Ok(())
    }

    /// React to the chart scrolling. Fetches one older page when the left edge
    /// nears the start of loaded data; `None` when nothing was fetched.
    pub async fn on_viewport_change(&self, left_edge: f64) -> Result<Option<BackfillOutcome>> {
        let request = {
            let mut series = lock(&self.series);
            if self.alive.is_cancelled() {
                return Ok(None);
            }
            series.begin_backfill(left_edge, self.options.backfill_threshold)
        };
        let Some(request) = request else {
            return Ok(None);
        };

        debug!(symbol = %self.symbol, end_time = request.end_time, "backfill requested");
        let fetched = self
            .source
            .fetch_bars(&self.symbol, self.interval, request.limit, request.end_time_utc())
            .await;

        let mut series = lock(&self.series);
        if self.alive.is_cancelled() {
            return Ok(None);
        }
        match fetched {
            Ok(bars) => {
                let outcome = series.complete_backfill(request, bars);
                drop(series);
                if matches!(outcome, BackfillOutcome::Prepended(_)) {
                    self.revision.send_modify(|rev| *rev += 1);
                }
                info!(symbol = %self.symbol, ?outcome, "backfill finished");
                Ok(Some(outcome))
            }
            Err(err) => {
                series.fail_backfill(request);
                warn!(symbol = %self.symbol, error = %err, "backfill failed");
                Err(err)
            }
        }
    }

    pub fn bars(&self) -> Vec<Bar> {
        lock(&self.series).bars().to_vec()
    }

    /// Copy of the whole series state
    pub fn snapshot(&self) -> TimeSeries {
        lock(&self.series).clone()
    }

    pub fn ticker(&self) -> PriceTicker {
        lock(&self.series).ticker()
    }

    /// Bumped on every change to the series
    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub fn live_state(&self) -> Option<ConnectionState> {
        self.live.as_ref().map(ChannelConnection::state)
    }

    pub fn is_torn_down(&self) -> bool {
        self.alive.is_cancelled()
    }

    /// Mark the view dead, then close the live feed and its retry timer
    pub fn teardown(&mut self) {
        self.alive.cancel();
        if let Some(mut live) = self.live.take() {
            live.teardown();
        }
    }
}

impl Drop for SeriesView {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn lock(series: &Mutex<TimeSeries>) -> MutexGuard<'_, TimeSeries> {
    series.lock().unwrap_or_else(PoisonError::into_inner)
}
