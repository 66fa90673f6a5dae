//! Matching Engine Types
//!
//! Domain types shared by the order book and matching engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ============================================================================
// Price Level
// ============================================================================

/// Fixed-scale price: 4 decimal places, stored as an integer number of
/// ten-thousandths so book ordering and equality are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceLevel(i64);

const PRICE_SCALE: i64 = 10_000;

impl PriceLevel {
    pub const ZERO: PriceLevel = PriceLevel(0);

    /// Reconstruct a PriceLevel from an already-scaled raw integer, as
    /// stored in the book's atomic last-trade-price cell.
    pub fn from_raw(raw: i64) -> Self {
        PriceLevel(raw)
    }

    /// Create a PriceLevel from a Decimal price.
    pub fn from_decimal(price: Decimal) -> Self {
        let scaled = (price * Decimal::from(PRICE_SCALE)).round();
        let value: i64 = scaled.try_into().unwrap_or(0);
        PriceLevel(value)
    }

    /// Convert back to Decimal.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 4)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Raw scaled integer, exposed for the reversed-ordering wrapper used by
    /// the bid side of the book.
    pub fn raw(&self) -> i64 {
        self.0
    }
}

impl Ord for PriceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for PriceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PriceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

/// Descending-price wrapper used as the `BTreeMap` key for the bid side: the
/// map iterates ascending, but bids must be visited best (highest) price
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReversePriceLevel(pub PriceLevel);

impl PartialOrd for ReversePriceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReversePriceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

// ============================================================================
// Order Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Time-in-force policy. GFD (Good-For-Day) replaces the teacher's GTC: an
/// order rests until end of session or fill, it is never literally
/// good-till-cancelled since this engine has no persistence across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    Gfd,
    Ioc,
    Fok,
}

impl Default for TimeInForce {
    fn default() -> Self {
        TimeInForce::Gfd
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    /// Distinct from plain `Cancelled`: reached only when an IOC/MARKET
    /// taker achieved a partial fill before its unfilled remainder was
    /// cancelled.
    PartiallyFilledCancelled,
    /// Synthetic terminal reached at admission; the order never enters a
    /// book.
    Rejected,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            OrderStatus::Filled => write!(f, "FILLED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
            OrderStatus::PartiallyFilledCancelled => write!(f, "PARTIALLY_FILLED_CANCELLED"),
            OrderStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl OrderStatus {
    /// Terminal statuses are absorbing (testable property #6): once
    /// reached, the order never re-enters a book.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::PartiallyFilledCancelled
                | OrderStatus::Rejected
        )
    }

    pub fn is_resting(self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

// ============================================================================
// Order Entry (in orderbook)
// ============================================================================

/// An order, resting or in flight through the matching engine.
#[derive(Debug, Clone)]
pub struct OrderEntry {
    pub order_id: u64,
    pub user_id: u64,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: PriceLevel,
    pub initial_quantity: i64,
    pub remaining_quantity: i64,
    pub time_in_force: TimeInForce,
    pub timestamp: u64,
    pub status: OrderStatus,
}

impl OrderEntry {
    pub fn is_resting(&self) -> bool {
        self.status.is_resting()
    }
}

// ============================================================================
// Trade Execution
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeExecution {
    pub trade_id: u64,
    pub symbol: String,
    pub price: PriceLevel,
    pub quantity: i64,
    pub buy_order_id: u64,
    pub sell_order_id: u64,
    pub timestamp: u64,
}

/// Emitted whenever an order's state changes. The sequence of updates for a
/// single order is a prefix of
/// `NEW -> PARTIALLY_FILLED* -> {FILLED | CANCELLED | PARTIALLY_FILLED_CANCELLED}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub order_id: u64,
    pub symbol: String,
    pub status: OrderStatus,
    pub remaining_quantity: i64,
    pub last_fill_quantity: Option<i64>,
    pub last_fill_price: Option<PriceLevel>,
    pub timestamp: u64,
}

// ============================================================================
// Match Result
// ============================================================================

/// Result of a single `submit` call: the taker's final disposition plus
/// every trade and order-update event produced while handling it.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub order_id: u64,
    pub status: OrderStatus,
    pub initial_quantity: i64,
    pub remaining_quantity: i64,
    pub trades: Vec<TradeExecution>,
    pub updates: Vec<OrderUpdate>,
}

// ============================================================================
// Tick (top-of-book snapshot)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub last_trade_price: PriceLevel,
    pub last_trade_quantity: i64,
    pub bid_price: PriceLevel,
    pub bid_quantity: i64,
    pub ask_price: PriceLevel,
    pub ask_quantity: i64,
    pub total_volume: i64,
    pub timestamp: u64,
}

// ============================================================================
// Error Types
// ============================================================================

/// Synchronous rejection: no book mutation has occurred.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RejectReason {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("quantity must be a positive integer")]
    NonPositiveQuantity,
    #[error("limit orders require a positive price")]
    InvalidLimitPrice,
    #[error("unknown side, type, or time-in-force value")]
    UnknownEnumValue,
    #[error("unknown or already-terminal order id {0}")]
    UnknownOrder(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_level_round_trips_through_decimal() {
        let price = dec!(150.00);
        let level = PriceLevel::from_decimal(price);
        assert_eq!(level.to_decimal(), dec!(150.0000));
    }

    #[test]
    fn price_level_ordering_is_numeric() {
        let p1 = PriceLevel::from_decimal(dec!(100.0));
        let p2 = PriceLevel::from_decimal(dec!(200.0));
        assert!(p1 < p2);
    }

    #[test]
    fn reverse_price_level_inverts_ordering_for_bid_side() {
        let low = ReversePriceLevel(PriceLevel::from_decimal(dec!(99.0)));
        let high = ReversePriceLevel(PriceLevel::from_decimal(dec!(100.0)));
        assert!(high < low);
    }

    #[test]
    fn terminal_statuses_are_absorbing() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::PartiallyFilledCancelled.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }
}
