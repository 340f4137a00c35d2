/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public TradeView sync crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod feeds;
pub mod http;
pub mod series;
pub mod session;
pub mod store;
pub mod types;
pub mod ws;

// Re-export commonly used types from http
pub use http::{ApiClient, ClientConfig, Credential, DEFAULT_BASE_URL, Result, SyncError};

// Re-export commonly used types from session
pub use session::{
    FileStorage, MemoryStorage, SAFETY_MARGIN_SECONDS, Session, SessionStorage, SessionStore,
};

// Re-export all types
pub use types::*;

pub use feeds::{Feed, OrderBookFeed, PriceFeed};
pub use series::{
    BackfillOutcome, Bar, CandleSource, Interval, LiveMerge, PriceTicker, SeriesView,
    SeriesViewOptions, TimeSeries,
};
pub use store::{DepthLevel, DepthView, OrderBookStore, PriceTable};

// Re-export commonly used types from ws
pub use ws::{
    ChannelConfig, ChannelConnection, ConnectionState, Connector, ReconnectPolicy, Subscription,
    TransportLink, TungsteniteConnector,
};
