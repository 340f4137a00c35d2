/*
[INPUT]:  Channel descriptor, connector, subscription commands from consumers
[OUTPUT]: Decoded frames delivered to a sink + connection state notifications
[POS]:    WebSocket layer - per-channel connection lifecycle and subscription multiplexing
[UPDATE]: When changing reconnect, replay or teardown semantics
*/

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http::{Result, SyncError};
use crate::ws::channel::ChannelSpec;
use crate::ws::connector::{Connector, TransportLink};
use crate::ws::message::{SubscriptionAction, subscription_frame};
use crate::ws::policy::ReconnectPolicy;
use crate::ws::registry::SubscriptionRegistry;

pub const DEFAULT_WS_BASE_URL: &str = "ws://localhost:5001";

const SUBSCRIPTION_LOG_LIMIT: usize = 10;
const PARSE_FAIL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

/// Per-connection sample counters for noisy log events
#[derive(Debug, Default)]
struct LogSamples {
    subscriptions: usize,
    parse_failures: usize,
}

/// 1-based sample index while under `limit`
fn take_sample(counter: &mut usize, limit: usize) -> Option<usize> {
    let index = *counter;
    *counter = counter.saturating_add(1);
    (index < limit).then_some(index + 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Idle; waiting for `connect()`
    Disconnected,
    Connecting,
    Open,
    /// Transport dropped or failed; next attempt after `delay`
    RetryScheduled { attempt: u32, delay: Duration },
    /// Torn down; no further connects will happen
    TornDown,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}

/// Per-channel transport settings
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub ws_base_url: String,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ws_base_url: DEFAULT_WS_BASE_URL.to_string(),
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ChannelConfig {
    pub fn with_base_url(ws_base_url: impl Into<String>) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            ..Self::default()
        }
    }

    fn url_for<C: ChannelSpec>(&self, spec: &C) -> String {
        format!("{}{}", self.ws_base_url.trim_end_matches('/'), spec.path())
    }
}

#[derive(Debug)]
enum Command {
    Connect,
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
    Subscriptions(oneshot::Sender<Vec<String>>),
}

/// Handle to one channel connection.
///
/// All state lives in a worker task; this handle only sends commands to it.
/// Dropping the handle tears the connection down.
#[derive(Debug)]
pub struct ChannelConnection<C: ChannelSpec> {
    name: &'static str,
    cmd_tx: mpsc::UnboundedSender<Command>,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    worker_handle: Option<JoinHandle<()>>,
    _spec: PhantomData<fn() -> C>,
}

impl<C: ChannelSpec> ChannelConnection<C> {
    /// Spawn the worker. Frames are handed to `sink` in arrival order.
    ///
    /// The connection stays `Disconnected` until [`connect`](Self::connect).
    pub fn spawn<F>(
        spec: C,
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
        sink: F,
    ) -> Result<Self>
    where
        F: FnMut(C::Frame) + Send + 'static,
    {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(SyncError::Config(
                "channel connection requires a Tokio runtime".to_string(),
            ));
        }

        let name = spec.name();
        let url = config.url_for(&spec);
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let worker = ChannelWorker {
            spec,
            url,
            reconnect: config.reconnect,
            connect_timeout: config.connect_timeout,
            connector,
            registry: SubscriptionRegistry::new(),
            cmd_rx,
            state: state.clone(),
            shutdown: shutdown.clone(),
            samples: LogSamples::default(),
            sink,
        };
        let worker_handle = tokio::spawn(worker.run());

        Ok(Self {
            name,
            cmd_tx,
            state,
            shutdown,
            worker_handle: Some(worker_handle),
            _spec: PhantomData,
        })
    }

    /// Open the transport. No-op while connecting or open; skips a pending retry delay.
    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    /// Take a reference on each key. Only newly held keys go on the wire.
    pub fn subscribe<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send(Command::Subscribe(keys.into_iter().map(Into::into).collect()));
    }

    /// Drop a reference on each key. Keys still held elsewhere stay subscribed.
    pub fn unsubscribe<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.send(Command::Unsubscribe(keys.into_iter().map(Into::into).collect()));
    }

    /// Like [`subscribe`](Self::subscribe), released when the guard drops
    pub fn hold<I, S>(&self, keys: I) -> Subscription
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        self.send(Command::Subscribe(keys.clone()));
        Subscription {
            channel: self.name,
            keys,
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Keys currently held, after every earlier command has been applied
    pub async fn subscriptions(&self) -> Vec<String> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Subscriptions(tx));
        rx.await.unwrap_or_default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().is_open()
    }

    /// Stop immediately: cancels the liveness token, drops any retry timer and
    /// closes the transport. Frames decoded after the token is cancelled are
    /// never handed to the sink.
    pub fn teardown(&mut self) {
        if self.shutdown.is_cancelled() && self.worker_handle.is_none() {
            return;
        }
        self.shutdown.cancel();
        if let Some(handle) = self.worker_handle.take() {
            handle.abort();
        }
        self.state.send_replace(ConnectionState::TornDown);
        debug!(channel = self.name, "channel torn down");
    }

    /// Graceful variant of [`teardown`](Self::teardown): lets the worker send a
    /// close frame before returning.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.await;
        }
        self.state.send_replace(ConnectionState::TornDown);
    }

    fn send(&self, command: Command) {
        if self.cmd_tx.send(command).is_err() {
            debug!(channel = self.name, "command after teardown ignored");
        }
    }
}

impl<C: ChannelSpec> Drop for ChannelConnection<C> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// One consumer's reference on a set of keys
#[must_use = "dropping a Subscription unsubscribes its keys"]
#[derive(Debug)]
pub struct Subscription {
    channel: &'static str,
    keys: Vec<String>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let keys = std::mem::take(&mut self.keys);
        if self.cmd_tx.send(Command::Unsubscribe(keys)).is_err() {
            debug!(channel = self.channel, "subscription released after teardown");
        }
    }
}

struct ChannelWorker<C: ChannelSpec, F> {
    spec: C,
    url: String,
    reconnect: ReconnectPolicy,
    connect_timeout: Duration,
    connector: Arc<dyn Connector>,
    registry: SubscriptionRegistry,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    samples: LogSamples,
    sink: F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamExit {
    Disconnected,
    Shutdown,
}

impl<C, F> ChannelWorker<C, F>
where
    C: ChannelSpec,
    F: FnMut(C::Frame) + Send + 'static,
{
    async fn run(mut self) {
        let name = self.spec.name();
        let mut attempt: u32 = 0;

        'run: {
            if !self.wait_for_connect().await {
                break 'run;
            }

            loop {
                self.set_state(ConnectionState::Connecting);
                info!(channel = name, url = %self.url, "connecting channel");

                let connected = tokio::select! {
                    _ = self.shutdown.cancelled() => break 'run,
                    result = tokio::time::timeout(self.connect_timeout, self.connector.connect(&self.url)) => {
                        result.unwrap_or_else(|_| Err(SyncError::WebSocket("connect timed out".to_string())))
                    }
                };

                match connected {
                    Ok(mut link) => {
                        attempt = 0;
                        self.set_state(ConnectionState::Open);
                        info!(channel = name, "channel open");

                        let keys = self.registry.keys();
                        let replayed = send_frame(
                            &link.outbound,
                            name,
                            self.spec.keys_field(),
                            SubscriptionAction::Subscribe,
                            &keys,
                            &mut self.samples,
                        )
                        .await;
                        let exit = match replayed {
                            Ok(()) => self.stream_loop(&mut link).await,
                            Err(err) => {
                                warn!(channel = name, error = %err, "subscription replay failed");
                                StreamExit::Disconnected
                            }
                        };
                        drop(link);

                        if exit == StreamExit::Shutdown {
                            break 'run;
                        }
                        warn!(channel = name, "channel transport closed");
                    }
                    Err(err) => {
                        warn!(channel = name, error = %err, "channel connect failed");
                    }
                }

                attempt = attempt.saturating_add(1);
                match self.reconnect.delay_for(attempt) {
                    Some(delay) => {
                        self.set_state(ConnectionState::RetryScheduled { attempt, delay });
                        debug!(channel = name, attempt, ?delay, "reconnect scheduled");
                        if !self.wait_retry(delay).await {
                            break 'run;
                        }
                    }
                    None => {
                        warn!(channel = name, attempt, "channel gave up reconnecting");
                        self.set_state(ConnectionState::Disconnected);
                        attempt = 0;
                        if !self.wait_for_connect().await {
                            break 'run;
                        }
                    }
                }
            }
        }

        self.set_state(ConnectionState::TornDown);
        debug!(channel = name, "channel worker finished");
    }

    /// Idle until `connect()`. Returns false on shutdown.
    async fn wait_for_connect(&mut self) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Connect) => return true,
                        Some(command) => self.apply_offline(command),
                        None => return false,
                    }
                }
            }
        }
    }

    /// Sleep out the retry delay; `connect()` cuts it short. Returns false on shutdown.
    async fn wait_retry(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return false,
                _ = &mut sleep => return true,
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(Command::Connect) => return true,
                        Some(command) => self.apply_offline(command),
                        None => return false,
                    }
                }
            }
        }
    }

    async fn stream_loop(&mut self, link: &mut TransportLink) -> StreamExit {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!(channel = self.spec.name(), "channel shutdown requested");
                    return StreamExit::Shutdown;
                }
                cmd = self.cmd_rx.recv() => {
                    let Some(command) = cmd else {
                        return StreamExit::Shutdown;
                    };
                    if let Err(err) = self.apply_online(command, link).await {
                        warn!(channel = self.spec.name(), error = %err, "failed to send subscription frame");
                        return StreamExit::Disconnected;
                    }
                }
                inbound = link.inbound.recv() => {
                    match inbound {
                        Some(text) => self.dispatch(&text),
                        None => return StreamExit::Disconnected,
                    }
                }
            }
        }
    }

    fn apply_offline(&mut self, command: Command) {
        match command {
            Command::Connect => {}
            Command::Subscribe(keys) => {
                self.registry.acquire(keys);
            }
            Command::Unsubscribe(keys) => {
                self.registry.release(keys);
            }
            Command::Subscriptions(reply) => {
                let _ = reply.send(self.registry.keys());
            }
        }
    }

    async fn apply_online(&mut self, command: Command, link: &TransportLink) -> Result<()> {
        match command {
            Command::Connect => Ok(()),
            Command::Subscribe(keys) => {
                let added = self.registry.acquire(keys);
                send_frame(
                    &link.outbound,
                    self.spec.name(),
                    self.spec.keys_field(),
                    SubscriptionAction::Subscribe,
                    &added,
                    &mut self.samples,
                )
                .await
            }
            Command::Unsubscribe(keys) => {
                let removed = self.registry.release(keys);
                send_frame(
                    &link.outbound,
                    self.spec.name(),
                    self.spec.keys_field(),
                    SubscriptionAction::Unsubscribe,
                    &removed,
                    &mut self.samples,
                )
                .await
            }
            Command::Subscriptions(reply) => {
                let _ = reply.send(self.registry.keys());
                Ok(())
            }
        }
    }

    fn dispatch(&mut self, text: &str) {
        match self.spec.decode(text) {
            Ok(frame) => {
                if self.shutdown.is_cancelled() {
                    return;
                }
                (self.sink)(frame);
            }
            Err(err) => log_parse_fail_once(&mut self.samples, self.spec.name(), &err, text),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// No-op for URL-scoped channels and empty key lists
async fn send_frame(
    outbound: &mpsc::Sender<String>,
    channel: &'static str,
    keys_field: Option<&'static str>,
    action: SubscriptionAction,
    keys: &[String],
    samples: &mut LogSamples,
) -> Result<()> {
    let Some(field) = keys_field else {
        return Ok(());
    };
    if keys.is_empty() {
        return Ok(());
    }

    let frame = subscription_frame(action, field, keys);
    outbound
        .send(frame.to_string())
        .await
        .map_err(|_| SyncError::WebSocket("transport send channel closed".to_string()))?;

    log_subscription_sent(samples, channel, action, keys);
    Ok(())
}

fn log_subscription_sent(
    samples: &mut LogSamples,
    channel: &str,
    action: SubscriptionAction,
    keys: &[String],
) {
    if let Some(sample_index) = take_sample(&mut samples.subscriptions, SUBSCRIPTION_LOG_LIMIT) {
        info!(
            sample_index,
            sample_limit = SUBSCRIPTION_LOG_LIMIT,
            channel,
            action = action.as_str(),
            keys = keys.len(),
            "ws subscription sent"
        );
    } else {
        debug!(channel, action = action.as_str(), keys = keys.len(), "ws subscription sent");
    }
}

fn log_parse_fail_once(
    samples: &mut LogSamples,
    channel: &str,
    err: &serde_json::Error,
    raw: &str,
) {
    if let Some(sample_index) = take_sample(&mut samples.parse_failures, PARSE_FAIL_LOG_LIMIT) {
        info!(
            sample_index,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            channel,
            error = %err,
            bytes = raw.len(),
            "ws message parse failed"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index,
            sample_limit = PARSE_FAIL_LOG_LIMIT,
            channel,
            message = %preview,
            "ws message parse failed"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("abcdef", 3), "abc...");
        assert_eq!(truncate_for_log("aé", 2), "a...");
    }

    #[test]
    fn test_log_samples_are_counted_per_connection() {
        let mut noisy = LogSamples::default();
        let taken: Vec<_> = (0..PARSE_FAIL_LOG_LIMIT + 2)
            .map(|_| take_sample(&mut noisy.parse_failures, PARSE_FAIL_LOG_LIMIT))
            .collect();
        assert_eq!(taken, vec![Some(1), Some(2), Some(3), None, None]);
        assert_eq!(
            take_sample(&mut noisy.subscriptions, SUBSCRIPTION_LOG_LIMIT),
            Some(1)
        );

        let mut fresh = LogSamples::default();
        assert_eq!(
            take_sample(&mut fresh.parse_failures, PARSE_FAIL_LOG_LIMIT),
            Some(1)
        );
    }

    #[test]
    fn test_url_joins_base_and_channel_path() {
        let config = ChannelConfig::with_base_url("ws://example.test/");
        assert_eq!(
            config.url_for(&crate::ws::PriceChannel),
            "ws://example.test/ws/market-prices"
        );
    }

    #[test]
    fn test_spawn_without_runtime_fails() {
        let result = ChannelConnection::spawn(
            crate::ws::PriceChannel,
            ChannelConfig::default(),
            Arc::new(crate::ws::TungsteniteConnector),
            |_frame| {},
        );
        assert!(matches!(result, Err(SyncError::Config(_))));
    }
}
