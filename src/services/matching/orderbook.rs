//! Orderbook Implementation
//!
//! A per-symbol book of resting bids and asks with price-time priority.
//! Ties at identical price are broken by insertion order: orders are always
//! appended to the back of a price level's queue and the engine assigns
//! timestamps in strictly increasing submission order, so queue order and
//! timestamp order coincide.

use super::types::*;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

/// Outcome of decrementing the current best maker on one side of the book.
pub struct DecrementOutcome {
    pub order_id: u64,
    pub remaining_quantity: i64,
    pub filled: bool,
}

pub struct Orderbook {
    symbol: String,

    /// Keyed by descending price (best/highest first) via `ReversePriceLevel`.
    bids: RwLock<BTreeMap<ReversePriceLevel, VecDeque<OrderEntry>>>,
    /// Keyed by ascending price (best/lowest first).
    asks: RwLock<BTreeMap<PriceLevel, VecDeque<OrderEntry>>>,

    /// order_id -> (side, price) for O(1) cancellation and lookup.
    order_index: DashMap<u64, (Side, PriceLevel)>,

    last_trade_price: AtomicI64,
    total_volume: AtomicI64,
    order_count: AtomicI64,
}

impl Orderbook {
    pub fn new(symbol: String) -> Self {
        Self {
            symbol,
            bids: RwLock::new(BTreeMap::new()),
            asks: RwLock::new(BTreeMap::new()),
            order_index: DashMap::new(),
            last_trade_price: AtomicI64::new(0),
            total_volume: AtomicI64::new(0),
            order_count: AtomicI64::new(0),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn order_count(&self) -> i64 {
        self.order_count.load(AtomicOrdering::Relaxed)
    }

    pub fn last_trade_price(&self) -> PriceLevel {
        PriceLevel::from_raw(self.last_trade_price.load(AtomicOrdering::Relaxed))
    }

    pub fn set_last_trade_price(&self, price: PriceLevel) {
        self.last_trade_price
            .store(price.raw(), AtomicOrdering::Relaxed);
    }

    pub fn total_volume(&self) -> i64 {
        self.total_volume.load(AtomicOrdering::Relaxed)
    }

    pub fn record_volume(&self, quantity: i64) {
        self.total_volume.fetch_add(quantity, AtomicOrdering::Relaxed);
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.read().keys().next().map(|p| p.0)
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.read().keys().next().copied()
    }

    /// Summed remaining quantity across all orders at the current best
    /// price level for `side`. Used for quote publication; `(ZERO, 0)` if
    /// that side has no resting liquidity.
    pub fn aggregate_best_level(&self, side: Side) -> (PriceLevel, i64) {
        match side {
            Side::Buy => {
                let bids = self.bids.read();
                match bids.iter().next() {
                    Some((price, queue)) => {
                        (price.0, queue.iter().map(|o| o.remaining_quantity).sum())
                    }
                    None => (PriceLevel::ZERO, 0),
                }
            }
            Side::Sell => {
                let asks = self.asks.read();
                match asks.iter().next() {
                    Some((price, queue)) => {
                        (*price, queue.iter().map(|o| o.remaining_quantity).sum())
                    }
                    None => (PriceLevel::ZERO, 0),
                }
            }
        }
    }

    /// Accumulate matchable quantity on `side`'s book against a taker
    /// constrained by `limit_price` (`None` for MARKET, unbounded). Stops
    /// scanning once the running total reaches `target`; does not mutate
    /// the book. Used for the FOK precheck.
    pub fn peek_cross(&self, side: Side, limit_price: Option<PriceLevel>, target: i64) -> i64 {
        let mut total = 0i64;
        match side {
            Side::Buy => {
                // Taker is SELL; scan bids, highest price first, stop below limit.
                for (price, queue) in self.bids.read().iter() {
                    if let Some(limit) = limit_price {
                        if price.0 < limit {
                            break;
                        }
                    }
                    total += queue.iter().map(|o| o.remaining_quantity).sum::<i64>();
                    if total >= target {
                        break;
                    }
                }
            }
            Side::Sell => {
                // Taker is BUY; scan asks, lowest price first, stop above limit.
                for (price, queue) in self.asks.read().iter() {
                    if let Some(limit) = limit_price {
                        if *price > limit {
                            break;
                        }
                    }
                    total += queue.iter().map(|o| o.remaining_quantity).sum::<i64>();
                    if total >= target {
                        break;
                    }
                }
            }
        }
        total
    }

    /// The current best maker on `side`, if any (without removing it).
    pub fn peek_front(&self, side: Side) -> Option<OrderEntry> {
        match side {
            Side::Buy => self
                .bids
                .read()
                .iter()
                .next()
                .and_then(|(_, q)| q.front().cloned()),
            Side::Sell => self
                .asks
                .read()
                .iter()
                .next()
                .and_then(|(_, q)| q.front().cloned()),
        }
    }

    /// Decrement the current best maker on `side` by `quantity`. Pops and
    /// removes the order (and its price level, if now empty) when it is
    /// fully filled.
    pub fn decrement_front(&self, side: Side, quantity: i64) -> Option<DecrementOutcome> {
        match side {
            Side::Buy => {
                let mut bids = self.bids.write();
                let key = *bids.iter().next()?.0;
                let queue = bids.get_mut(&key)?;
                let front = queue.front_mut()?;
                front.remaining_quantity -= quantity;
                let order_id = front.order_id;
                let remaining_quantity = front.remaining_quantity;
                let filled = remaining_quantity == 0;
                if filled {
                    queue.pop_front();
                    self.order_index.remove(&order_id);
                    self.order_count.fetch_sub(1, AtomicOrdering::Relaxed);
                    if queue.is_empty() {
                        bids.remove(&key);
                    }
                }
                Some(DecrementOutcome {
                    order_id,
                    remaining_quantity,
                    filled,
                })
            }
            Side::Sell => {
                let mut asks = self.asks.write();
                let key = *asks.iter().next()?.0;
                let queue = asks.get_mut(&key)?;
                let front = queue.front_mut()?;
                front.remaining_quantity -= quantity;
                let order_id = front.order_id;
                let remaining_quantity = front.remaining_quantity;
                let filled = remaining_quantity == 0;
                if filled {
                    queue.pop_front();
                    self.order_index.remove(&order_id);
                    self.order_count.fetch_sub(1, AtomicOrdering::Relaxed);
                    if queue.is_empty() {
                        asks.remove(&key);
                    }
                }
                Some(DecrementOutcome {
                    order_id,
                    remaining_quantity,
                    filled,
                })
            }
        }
    }

    /// Insert a resting order. Illegal to call with `remaining_quantity == 0`.
    pub fn insert(&self, entry: OrderEntry) {
        debug_assert!(entry.remaining_quantity > 0);
        let side = entry.side;
        let price = entry.price;
        let order_id = entry.order_id;

        match side {
            Side::Buy => {
                self.bids
                    .write()
                    .entry(ReversePriceLevel(price))
                    .or_default()
                    .push_back(entry);
            }
            Side::Sell => {
                self.asks.write().entry(price).or_default().push_back(entry);
            }
        }

        self.order_index.insert(order_id, (side, price));
        self.order_count.fetch_add(1, AtomicOrdering::Relaxed);
    }

    /// Withdraw a still-resting order.
    pub fn remove(&self, order_id: u64) -> Option<OrderEntry> {
        let (side, price) = self.order_index.remove(&order_id)?.1;

        let entry = match side {
            Side::Buy => {
                let mut bids = self.bids.write();
                let key = ReversePriceLevel(price);
                let queue = bids.get_mut(&key)?;
                let pos = queue.iter().position(|o| o.order_id == order_id)?;
                let entry = queue.remove(pos);
                if queue.is_empty() {
                    bids.remove(&key);
                }
                entry
            }
            Side::Sell => {
                let mut asks = self.asks.write();
                let queue = asks.get_mut(&price)?;
                let pos = queue.iter().position(|o| o.order_id == order_id)?;
                let entry = queue.remove(pos);
                if queue.is_empty() {
                    asks.remove(&price);
                }
                entry
            }
        };

        if entry.is_some() {
            self.order_count.fetch_sub(1, AtomicOrdering::Relaxed);
        }
        entry
    }

    pub fn has_order(&self, order_id: u64) -> bool {
        self.order_index.contains_key(&order_id)
    }

    pub fn get_order(&self, order_id: u64) -> Option<OrderEntry> {
        let (side, price) = *self.order_index.get(&order_id)?;
        match side {
            Side::Buy => self
                .bids
                .read()
                .get(&ReversePriceLevel(price))?
                .iter()
                .find(|o| o.order_id == order_id)
                .cloned(),
            Side::Sell => self
                .asks
                .read()
                .get(&price)?
                .iter()
                .find(|o| o.order_id == order_id)
                .cloned(),
        }
    }

    /// No resting bid may be priced at or above any resting ask.
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(id: u64, price: rust_decimal::Decimal, qty: i64, side: Side, ts: u64) -> OrderEntry {
        OrderEntry {
            order_id: id,
            user_id: 1,
            symbol: "AAPL".to_string(),
            side,
            order_type: OrderType::Limit,
            price: PriceLevel::from_decimal(price),
            initial_quantity: qty,
            remaining_quantity: qty,
            time_in_force: TimeInForce::Gfd,
            timestamp: ts,
            status: OrderStatus::New,
        }
    }

    #[test]
    fn insert_and_cancel_order() {
        let book = Orderbook::new("AAPL".to_string());
        book.insert(order(1, dec!(100.0), 10, Side::Buy, 1));
        assert_eq!(book.order_count(), 1);
        assert!(book.has_order(1));

        let cancelled = book.remove(1);
        assert!(cancelled.is_some());
        assert_eq!(book.order_count(), 0);
        assert!(!book.has_order(1));
    }

    #[test]
    fn best_bid_and_ask_track_price_priority() {
        let book = Orderbook::new("AAPL".to_string());
        book.insert(order(1, dec!(100.0), 1, Side::Buy, 1));
        book.insert(order(2, dec!(101.0), 1, Side::Buy, 2));
        book.insert(order(3, dec!(103.0), 1, Side::Sell, 3));
        book.insert(order(4, dec!(102.0), 1, Side::Sell, 4));

        assert_eq!(book.best_bid(), Some(PriceLevel::from_decimal(dec!(101.0))));
        assert_eq!(book.best_ask(), Some(PriceLevel::from_decimal(dec!(102.0))));
    }

    #[test]
    fn aggregate_best_level_sums_quantity_at_top_price() {
        let book = Orderbook::new("AAPL".to_string());
        book.insert(order(1, dec!(100.0), 4, Side::Buy, 1));
        book.insert(order(2, dec!(100.0), 6, Side::Buy, 2));
        book.insert(order(3, dec!(105.0), 1, Side::Buy, 3));

        let (price, qty) = book.aggregate_best_level(Side::Buy);
        assert_eq!(price, PriceLevel::from_decimal(dec!(105.0)));
        assert_eq!(qty, 1);
    }

    #[test]
    fn decrement_front_pops_when_fully_filled() {
        let book = Orderbook::new("AAPL".to_string());
        book.insert(order(1, dec!(100.0), 5, Side::Sell, 1));

        let outcome = book.decrement_front(Side::Sell, 5).unwrap();
        assert_eq!(outcome.order_id, 1);
        assert_eq!(outcome.remaining_quantity, 0);
        assert!(outcome.filled);
        assert!(!book.has_order(1));
    }

    #[test]
    fn decrement_front_keeps_partially_filled_order_resting() {
        let book = Orderbook::new("AAPL".to_string());
        book.insert(order(1, dec!(100.0), 10, Side::Sell, 1));

        let outcome = book.decrement_front(Side::Sell, 4).unwrap();
        assert!(!outcome.filled);
        assert_eq!(outcome.remaining_quantity, 6);
        assert!(book.has_order(1));
    }

    #[test]
    fn price_time_priority_orders_ties_by_earlier_timestamp() {
        let book = Orderbook::new("AAPL".to_string());
        book.insert(order(1, dec!(100.0), 5, Side::Buy, 1));
        book.insert(order(2, dec!(100.0), 5, Side::Buy, 2));

        let front = book.peek_front(Side::Buy).unwrap();
        assert_eq!(front.order_id, 1);
    }

    #[test]
    fn peek_cross_respects_limit_price_without_mutating_book() {
        let book = Orderbook::new("AAPL".to_string());
        book.insert(order(1, dec!(100.0), 5, Side::Sell, 1));

        let qty = book.peek_cross(Side::Sell, Some(PriceLevel::from_decimal(dec!(99.0))), 100);
        assert_eq!(qty, 0);
        assert!(book.has_order(1));

        let qty = book.peek_cross(Side::Sell, Some(PriceLevel::from_decimal(dec!(100.0))), 100);
        assert_eq!(qty, 5);
        assert!(book.has_order(1));
    }
}
