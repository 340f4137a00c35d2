/*
[INPUT]:  WebSocket configuration and subscription keys
[OUTPUT]: Per-channel connections delivering decoded frames
[POS]:    WebSocket layer - real-time data streams
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod channel;
pub mod connection;
pub mod connector;
pub mod message;
pub mod policy;
pub mod registry;

pub use channel::{CandleChannel, ChannelSpec, OrderBookChannel, PriceChannel};
pub use connection::{
    ChannelConfig, ChannelConnection, ConnectionState, DEFAULT_WS_BASE_URL, Subscription,
};
pub use connector::{Connector, TransportLink, TungsteniteConnector};
pub use message::{CandleFrame, SubscriptionAction, subscription_frame};
pub use policy::ReconnectPolicy;
pub use registry::SubscriptionRegistry;
