/*
[INPUT]:  Order book frames keyed by market id
[OUTPUT]: Sorted snapshot per market and depth views with cumulative totals
[POS]:    State layer - order book store
[UPDATE]: When order book wire format or depth presentation changes
*/

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

use crate::types::{BookLevel, OrderBookSnapshot};

/// Levels shown per side by default
pub const DEFAULT_DEPTH_LEVELS: usize = 10;

/// Latest full snapshot per market id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBookStore {
    books: BTreeMap<String, OrderBookSnapshot>,
}

impl OrderBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace each market in the frame wholesale. Returns the market ids touched.
    pub fn apply(&mut self, frame: HashMap<String, OrderBookSnapshot>) -> Vec<String> {
        let mut touched: Vec<String> = frame
            .into_iter()
            .map(|(market_id, snapshot)| {
                self.apply_snapshot(&market_id, snapshot);
                market_id
            })
            .collect();
        touched.sort();
        touched
    }

    /// Replace one market; sides are re-sorted regardless of wire order
    pub fn apply_snapshot(&mut self, market_id: &str, mut snapshot: OrderBookSnapshot) {
        if snapshot.market_id.is_empty() {
            snapshot.market_id = market_id.to_string();
        }
        normalize(&mut snapshot);
        self.books.insert(market_id.to_string(), snapshot);
    }

    pub fn get(&self, market_id: &str) -> Option<&OrderBookSnapshot> {
        self.books.get(market_id)
    }

    pub fn depth(&self, market_id: &str, levels: usize) -> Option<DepthView> {
        self.books
            .get(market_id)
            .map(|snapshot| DepthView::from_snapshot(snapshot, levels))
    }

    pub fn market_ids(&self) -> Vec<String> {
        self.books.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}

/// Bids descending, asks ascending
pub fn normalize(snapshot: &mut OrderBookSnapshot) {
    snapshot.bids.sort_by(|a, b| b.price.cmp(&a.price));
    snapshot.asks.sort_by(|a, b| a.price.cmp(&b.price));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthLevel {
    pub price: Decimal,
    pub amount: Decimal,
    /// Running sum of `amount` from the best price outward
    pub total: Decimal,
    /// `total` relative to the deepest shown level, 0..=1
    pub share: Decimal,
}

/// Top-of-book levels derived at read time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepthView {
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

impl DepthView {
    pub fn from_snapshot(snapshot: &OrderBookSnapshot, levels: usize) -> Self {
        Self {
            bids: cumulative(&snapshot.bids, levels),
            asks: cumulative(&snapshot.asks, levels),
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|level| level.price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|level| level.price)
    }

    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()? - self.best_bid()?)
    }
}

fn cumulative(side: &[BookLevel], levels: usize) -> Vec<DepthLevel> {
    let mut running = Decimal::ZERO;
    let mut out: Vec<DepthLevel> = side
        .iter()
        .take(levels)
        .map(|level| {
            running += level.amount;
            DepthLevel {
                price: level.price,
                amount: level.amount,
                total: running,
                share: Decimal::ZERO,
            }
        })
        .collect();

    if running > Decimal::ZERO {
        for level in &mut out {
            level.share = level.total / running;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(price: i64, amount: i64) -> BookLevel {
        BookLevel {
            price: Decimal::from(price),
            amount: Decimal::from(amount),
        }
    }

    fn snapshot(bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> OrderBookSnapshot {
        OrderBookSnapshot {
            market_id: String::new(),
            bids,
            asks,
            timestamp: String::new(),
        }
    }

    #[test]
    fn test_apply_sorts_sides_on_ingestion() {
        let mut store = OrderBookStore::new();
        let frame = HashMap::from([(
            "BTCUSDT".to_string(),
            snapshot(vec![level(98, 1), level(99, 1), level(97, 1)], vec![level(102, 1), level(101, 1)]),
        )]);
        assert_eq!(store.apply(frame), vec!["BTCUSDT"]);

        let book = store.get("BTCUSDT").unwrap();
        let bid_prices: Vec<_> = book.bids.iter().map(|l| l.price).collect();
        let ask_prices: Vec<_> = book.asks.iter().map(|l| l.price).collect();
        assert_eq!(bid_prices, vec![Decimal::from(99), Decimal::from(98), Decimal::from(97)]);
        assert_eq!(ask_prices, vec![Decimal::from(101), Decimal::from(102)]);
        assert_eq!(book.market_id, "BTCUSDT");
    }

    #[test]
    fn test_snapshot_replaces_wholesale() {
        let mut store = OrderBookStore::new();
        store.apply_snapshot("BTCUSDT", snapshot(vec![level(99, 1), level(98, 2)], vec![]));
        store.apply_snapshot("BTCUSDT", snapshot(vec![level(97, 5)], vec![level(100, 1)]));

        let book = store.get("BTCUSDT").unwrap();
        assert_eq!(book.bids, vec![level(97, 5)]);
        assert_eq!(book.asks, vec![level(100, 1)]);
    }

    #[test]
    fn test_other_markets_survive_partial_frame() {
        let mut store = OrderBookStore::new();
        store.apply_snapshot("BTCUSDT", snapshot(vec![level(99, 1)], vec![]));
        store.apply(HashMap::from([("ETHUSDT".to_string(), snapshot(vec![], vec![]))]));
        assert_eq!(store.market_ids(), vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_depth_view_cumulative_totals() {
        let mut store = OrderBookStore::new();
        store.apply_snapshot(
            "BTCUSDT",
            snapshot(
                vec![level(99, 1), level(98, 3), level(97, 4)],
                vec![level(101, 2), level(102, 2)],
            ),
        );

        let depth = store.depth("BTCUSDT", 2).unwrap();
        let totals: Vec<_> = depth.bids.iter().map(|l| l.total).collect();
        assert_eq!(totals, vec![Decimal::from(1), Decimal::from(4)]);
        assert_eq!(depth.bids[0].share, Decimal::new(25, 2));
        assert_eq!(depth.bids[1].share, Decimal::ONE);
        assert_eq!(depth.asks[1].total, Decimal::from(4));
        assert_eq!(depth.spread(), Some(Decimal::from(2)));
    }

    #[test]
    fn test_depth_view_of_empty_side() {
        let depth = DepthView::from_snapshot(&snapshot(vec![], vec![level(1, 0)]), DEFAULT_DEPTH_LEVELS);
        assert!(depth.bids.is_empty());
        assert_eq!(depth.asks[0].share, Decimal::ZERO);
        assert_eq!(depth.spread(), None);
    }
}
