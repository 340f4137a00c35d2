/*
[INPUT]:  Channel config + connector, consumer subscriptions
[OUTPUT]: Read-only `watch` snapshots of the price table and order books
[POS]:    Data layer - channel connection composed with its state store
[UPDATE]: When adding feeds or changing how frames reach stores
*/

use std::sync::Arc;
use tokio::sync::watch;

use crate::http::Result;
use crate::store::{DepthView, OrderBookStore, PriceTable};
use crate::ws::{
    ChannelConfig, ChannelConnection, ChannelSpec, ConnectionState, Connector, OrderBookChannel,
    PriceChannel, Subscription,
};

/// Channel connection whose frames are folded into a store.
///
/// The store is only written by the connection's frame handler; consumers get
/// `watch` receivers that always hold the latest snapshot.
#[derive(Debug)]
pub struct Feed<C: ChannelSpec, S> {
    connection: ChannelConnection<C>,
    store: watch::Receiver<S>,
}

/// Aggregate prices for subscribed symbols
pub type PriceFeed = Feed<PriceChannel, PriceTable>;

/// Order books for subscribed market ids
pub type OrderBookFeed = Feed<OrderBookChannel, OrderBookStore>;

impl PriceFeed {
    pub fn spawn(config: ChannelConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        Feed::with_store(PriceChannel, config, connector, |table: &mut PriceTable, entries| {
            table.apply(entries) > 0
        })
    }
}

impl OrderBookFeed {
    pub fn spawn(config: ChannelConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        Feed::with_store(
            OrderBookChannel,
            config,
            connector,
            |books: &mut OrderBookStore, frame| !books.apply(frame).is_empty(),
        )
    }

    pub fn depth(&self, market_id: &str, levels: usize) -> Option<DepthView> {
        self.store.borrow().depth(market_id, levels)
    }
}

impl<C, S> Feed<C, S>
where
    C: ChannelSpec,
    S: Default + Send + Sync + 'static,
{
    /// `apply` returns whether the store changed; receivers are only woken when it did
    pub fn with_store<A>(
        spec: C,
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
        apply: A,
    ) -> Result<Self>
    where
        A: Fn(&mut S, C::Frame) -> bool + Send + 'static,
    {
        let (store_tx, store) = watch::channel(S::default());
        let connection = ChannelConnection::spawn(spec, config, connector, move |frame| {
            store_tx.send_if_modified(|state| apply(state, frame));
        })?;

        Ok(Self { connection, store })
    }

    pub fn connect(&self) {
        self.connection.connect();
    }

    /// Hold `keys` until the returned guard drops
    pub fn subscribe<I, K>(&self, keys: I) -> Subscription
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.connection.hold(keys)
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.connection.subscriptions().await
    }

    pub fn store(&self) -> watch::Receiver<S> {
        self.store.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state_receiver()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    pub fn teardown(&mut self) {
        self.connection.teardown();
    }
}

impl<C, S> Feed<C, S>
where
    C: ChannelSpec,
    S: Clone,
{
    pub fn snapshot(&self) -> S {
        self.store.borrow().clone()
    }
}
