/*
[INPUT]:  MonitorConfig, REST client, WebSocket connector
[OUTPUT]: Live price / order book / chart state logged on an interval
[POS]:    Runner layer - wires the adapter library into a headless consumer
[UPDATE]: When adding monitored data sources or report fields
*/

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tradeview_adapter::{
    ApiClient, Connector, OrderBookFeed, PriceFeed, PriceTable, SeriesView, SessionStore,
    Subscription, TungsteniteConnector,
};

use crate::config::MonitorConfig;

/// Owns every live resource for one monitor run
pub struct Monitor {
    config: MonitorConfig,
    client: Arc<ApiClient>,
    connector: Arc<dyn Connector>,
    shutdown: CancellationToken,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let session_dir = config.session_dir();
        let session = SessionStore::open_file(&session_dir)
            .with_context(|| format!("open session store at {}", session_dir.display()))?;
        let client = ApiClient::with_config(config.client_config(), session)
            .context("build api client")?;
        Ok(Self::with_parts(config, Arc::new(client), Arc::new(TungsteniteConnector)))
    }

    pub fn with_parts(
        config: MonitorConfig,
        client: Arc<ApiClient>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            config,
            client,
            connector,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Log in unless a persisted session is still usable. Failures are logged;
    /// public channels keep working without a session.
    pub async fn ensure_session(&self) -> bool {
        if self.client.session().is_logged_in() {
            info!("reusing persisted session");
            return true;
        }
        let Some((username, password)) = self.config.credentials() else {
            info!("no credentials configured; running anonymously");
            return false;
        };
        match self.client.login(&username, &password).await {
            Ok(_) => {
                info!(%username, "logged in");
                true
            }
            Err(err) => {
                warn!(%username, error = %err, "login failed; running anonymously");
                false
            }
        }
    }

    pub async fn run(self) -> Result<()> {
        if self.ensure_session().await {
            match self.client.get_profile().await {
                Ok(profile) => info!(username = %profile.username, "profile loaded"),
                Err(err) => warn!(error = %err, "profile request failed"),
            }
        }

        let channel_config = self.config.channel_config();
        let mut held: Vec<Subscription> = Vec::new();

        let mut prices = None;
        if !self.config.symbols.is_empty() {
            let feed = PriceFeed::spawn(channel_config.clone(), self.connector.clone())
                .context("spawn price feed")?;
            held.push(feed.subscribe(self.config.symbols.iter().cloned()));
            feed.connect();
            info!(symbols = ?self.config.symbols, "price feed started");
            prices = Some(feed);
        }

        let mut books = None;
        if !self.config.order_books.is_empty() {
            let feed = OrderBookFeed::spawn(channel_config.clone(), self.connector.clone())
                .context("spawn order book feed")?;
            held.push(feed.subscribe(self.config.order_books.iter().cloned()));
            feed.connect();
            info!(markets = ?self.config.order_books, "order book feed started");
            books = Some(feed);
        }

        let mut chart = None;
        if let Some(chart_config) = &self.config.chart {
            let mut view = SeriesView::load(
                self.client.clone(),
                chart_config.symbol.clone(),
                chart_config.interval()?,
                chart_config.view_options(),
            )
            .await
            .context("load chart history")?;
            for page in 0..chart_config.backfill_pages {
                match view.on_viewport_change(0.0).await {
                    Ok(Some(outcome)) => info!(page, ?outcome, "chart backfill"),
                    Ok(None) => break,
                    Err(err) => {
                        warn!(page, error = %err, "chart backfill failed");
                        break;
                    }
                }
            }
            view.attach_live(channel_config.clone(), self.connector.clone())
                .context("attach live candles")?;
            info!(
                symbol = %view.symbol(),
                interval = %view.interval(),
                bars = view.bars().len(),
                "chart started"
            );
            chart = Some(view);
        }

        let mut ticker = tokio::time::interval(self.config.report_interval());
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(feed) = &prices {
                        report_prices(&feed.snapshot(), &self.config.symbols, feed.is_connected());
                    }
                    if let Some(feed) = &books {
                        for market in &self.config.order_books {
                            match feed.depth(market, self.config.depth_levels) {
                                Some(depth) => info!(
                                    %market,
                                    best_bid = ?depth.best_bid(),
                                    best_ask = ?depth.best_ask(),
                                    spread = ?depth.spread(),
                                    "order book"
                                ),
                                None => info!(%market, state = ?feed.state(), "order book pending"),
                            }
                        }
                    }
                    if let Some(view) = &chart {
                        let quote = view.ticker();
                        info!(
                            symbol = %view.symbol(),
                            bars = view.bars().len(),
                            close = ?quote.current,
                            direction = ?quote.direction(),
                            live = ?view.live_state(),
                            "chart"
                        );
                    }
                }
            }
        }

        info!("stopping monitor");
        drop(held);
        if let Some(mut view) = chart {
            view.teardown();
        }
        if let Some(mut feed) = prices {
            feed.teardown();
        }
        if let Some(mut feed) = books {
            feed.teardown();
        }
        Ok(())
    }
}

fn report_prices(table: &PriceTable, symbols: &[String], connected: bool) {
    for symbol in symbols {
        match table.get(symbol) {
            Some(entry) => info!(
                %symbol,
                close = %entry.close,
                high = %entry.high,
                low = %entry.low,
                volume = %entry.volume,
                connected,
                "price"
            ),
            None => info!(%symbol, connected, "price pending"),
        }
    }
}
