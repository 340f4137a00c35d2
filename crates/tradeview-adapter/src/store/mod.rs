/*
[INPUT]:  Decoded price and order book frames
[OUTPUT]: Keyed state snapshots for read-only consumers
[POS]:    State layer - price table and order book stores
[UPDATE]: When adding stores or changing merge rules
*/

pub mod order_book;
pub mod prices;

pub use order_book::{DEFAULT_DEPTH_LEVELS, DepthLevel, DepthView, OrderBookStore};
pub use prices::PriceTable;
