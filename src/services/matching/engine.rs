//! Matching Engine
//!
//! Owns the registry of per-symbol order books and the global order/trade
//! counters, accepts order commands, executes matching, and produces trade
//! records and order-status updates.

use super::orderbook::Orderbook;
use super::types::*;
use crate::error::EngineError;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// An order submission before admission. Mirrors the HTTP request DTO but
/// lives at the engine boundary so the engine can be driven directly by
/// tests without going through the HTTP layer.
#[derive(Debug, Clone)]
pub struct SubmitCommand {
    pub user_id: u64,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub quantity: i64,
    pub time_in_force: TimeInForce,
}

/// Top-of-book quote for one symbol.
#[derive(Debug, Clone)]
pub struct Quote {
    pub symbol: String,
    pub last_trade_price: PriceLevel,
    pub bid_price: PriceLevel,
    pub bid_quantity: i64,
    pub ask_price: PriceLevel,
    pub ask_quantity: i64,
    pub total_volume: i64,
}

struct SymbolContext {
    book: Orderbook,
    /// Single-writer critical section: held for the full duration of a
    /// submission so order IDs, timestamps, and book mutations observe the
    /// exact same serialization order (spec's concurrency model, option a).
    lock: Mutex<()>,
    /// Set if a matching pass ever left the book in a state that violates a
    /// core invariant (crossed book). Once set, the symbol refuses further
    /// submissions rather than risk compounding the corruption — the
    /// in-process equivalent of halting the engine.
    halted: AtomicBool,
}

impl SymbolContext {
    fn new(symbol: String) -> Self {
        Self {
            book: Orderbook::new(symbol),
            lock: Mutex::new(()),
            halted: AtomicBool::new(false),
        }
    }
}

pub struct MatchingEngine {
    books: DashMap<String, Arc<SymbolContext>>,
    next_order_id: AtomicU64,
    next_trade_id: AtomicU64,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
            next_order_id: AtomicU64::new(1),
            next_trade_id: AtomicU64::new(1),
        }
    }

    /// Pre-create books for a configured symbol basket; a book is otherwise
    /// created lazily on first reference.
    pub fn with_symbols<I: IntoIterator<Item = String>>(symbols: I) -> Self {
        let engine = Self::new();
        for symbol in symbols {
            engine.context_for(&symbol);
        }
        engine
    }

    fn context_for(&self, symbol: &str) -> Arc<SymbolContext> {
        if let Some(ctx) = self.books.get(symbol) {
            return ctx.clone();
        }
        self.books
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(SymbolContext::new(symbol.to_string())))
            .clone()
    }

    fn validate(cmd: &SubmitCommand) -> Result<(), RejectReason> {
        if cmd.symbol.trim().is_empty() {
            return Err(RejectReason::MissingField("symbol"));
        }
        if cmd.quantity <= 0 {
            return Err(RejectReason::NonPositiveQuantity);
        }
        if cmd.order_type == OrderType::Limit {
            match cmd.price {
                Some(p) if p > Decimal::ZERO => {}
                _ => return Err(RejectReason::InvalidLimitPrice),
            }
        }
        // FOK combined with MARKET is permitted; every other (side, type,
        // time_in_force) combination is accepted if individually valid, so
        // there is nothing further to reject here.
        Ok(())
    }

    /// Assign the next order id and use it as the order's timestamp ordinal
    /// too: both are drawn from the same atomically-incremented sequence,
    /// so "assigned under the engine's global counter lock, increment
    /// strictly" holds for both by construction.
    fn next_order_id_and_timestamp(&self) -> (u64, u64) {
        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        (id, id)
    }

    pub fn submit(&self, cmd: SubmitCommand) -> Result<MatchResult, EngineError> {
        Self::validate(&cmd).map_err(|reason| EngineError::Validation(reason.to_string()))?;

        let ctx = self.context_for(&cmd.symbol);
        if ctx.halted.load(Ordering::SeqCst) {
            return Err(EngineError::Internal(format!(
                "book for {} halted after a prior invariant violation",
                cmd.symbol
            )));
        }

        let _guard = ctx.lock.lock();
        let (order_id, timestamp) = self.next_order_id_and_timestamp();

        let price = match cmd.order_type {
            OrderType::Limit => PriceLevel::from_decimal(cmd.price.expect("validated above")),
            OrderType::Market => PriceLevel::ZERO,
        };

        let taker_side = cmd.side;
        let book_side = taker_side.opposite();
        let limit = match cmd.order_type {
            OrderType::Limit => Some(price),
            OrderType::Market => None,
        };

        // FOK precheck: scan without mutating; if the book can't fill the
        // whole order, cancel it outright with no trades.
        if cmd.time_in_force == TimeInForce::Fok {
            let available = ctx.book.peek_cross(book_side, limit, cmd.quantity);
            if available < cmd.quantity {
                let update = OrderUpdate {
                    order_id,
                    symbol: cmd.symbol.clone(),
                    status: OrderStatus::Cancelled,
                    remaining_quantity: cmd.quantity,
                    last_fill_quantity: None,
                    last_fill_price: None,
                    timestamp,
                };
                return Ok(MatchResult {
                    order_id,
                    status: OrderStatus::Cancelled,
                    initial_quantity: cmd.quantity,
                    remaining_quantity: cmd.quantity,
                    trades: Vec::new(),
                    updates: vec![update],
                });
            }
        }

        let mut remaining = cmd.quantity;
        let mut trades = Vec::new();
        let mut updates = Vec::new();

        while remaining > 0 {
            let Some(maker) = ctx.book.peek_front(book_side) else {
                break;
            };
            if let Some(limit_price) = limit {
                let stop = match taker_side {
                    Side::Buy => maker.price > limit_price,
                    Side::Sell => maker.price < limit_price,
                };
                if stop {
                    break;
                }
            }

            let fill_qty = remaining.min(maker.remaining_quantity);
            let outcome = ctx
                .book
                .decrement_front(book_side, fill_qty)
                .expect("front maker observed above must still be present under the held lock");

            remaining -= fill_qty;
            ctx.book.set_last_trade_price(maker.price);
            ctx.book.record_volume(fill_qty);

            let trade_id = self.next_trade_id.fetch_add(1, Ordering::SeqCst);
            let (buy_order_id, sell_order_id) = match taker_side {
                Side::Buy => (order_id, maker.order_id),
                Side::Sell => (maker.order_id, order_id),
            };
            trades.push(TradeExecution {
                trade_id,
                symbol: cmd.symbol.clone(),
                price: maker.price,
                quantity: fill_qty,
                buy_order_id,
                sell_order_id,
                timestamp,
            });

            if outcome.filled {
                updates.push(OrderUpdate {
                    order_id: maker.order_id,
                    symbol: cmd.symbol.clone(),
                    status: OrderStatus::Filled,
                    remaining_quantity: 0,
                    last_fill_quantity: Some(fill_qty),
                    last_fill_price: Some(maker.price),
                    timestamp,
                });
            }
        }

        let filled_any = remaining < cmd.quantity;
        let rests = cmd.order_type == OrderType::Limit && cmd.time_in_force == TimeInForce::Gfd;

        let status = if remaining == 0 {
            OrderStatus::Filled
        } else if rests {
            if filled_any {
                OrderStatus::PartiallyFilled
            } else {
                OrderStatus::New
            }
        } else if filled_any {
            OrderStatus::PartiallyFilledCancelled
        } else {
            OrderStatus::Cancelled
        };

        if status.is_resting() {
            ctx.book.insert(OrderEntry {
                order_id,
                user_id: cmd.user_id,
                symbol: cmd.symbol.clone(),
                side: taker_side,
                order_type: cmd.order_type,
                price,
                initial_quantity: cmd.quantity,
                remaining_quantity: remaining,
                time_in_force: cmd.time_in_force,
                timestamp,
                status,
            });
        }

        updates.push(OrderUpdate {
            order_id,
            symbol: cmd.symbol.clone(),
            status,
            remaining_quantity: remaining,
            last_fill_quantity: trades.last().map(|t| t.quantity),
            last_fill_price: trades.last().map(|t| t.price),
            timestamp,
        });

        if ctx.book.is_crossed() {
            ctx.halted.store(true, Ordering::SeqCst);
            tracing::error!(symbol = %cmd.symbol, "book crossed after match, halting symbol");
            return Err(EngineError::Internal(format!(
                "book for {} crossed after match",
                cmd.symbol
            )));
        }

        Ok(MatchResult {
            order_id,
            status,
            initial_quantity: cmd.quantity,
            remaining_quantity: remaining,
            trades,
            updates,
        })
    }

    pub fn cancel(&self, symbol: &str, order_id: u64) -> Result<MatchResult, EngineError> {
        let ctx = self.context_for(symbol);
        let _guard = ctx.lock.lock();

        let order = ctx
            .book
            .remove(order_id)
            .ok_or_else(|| EngineError::Validation(RejectReason::UnknownOrder(order_id).to_string()))?;

        let update = OrderUpdate {
            order_id,
            symbol: symbol.to_string(),
            status: OrderStatus::Cancelled,
            remaining_quantity: order.remaining_quantity,
            last_fill_quantity: None,
            last_fill_price: None,
            timestamp: order.timestamp,
        };

        Ok(MatchResult {
            order_id,
            status: OrderStatus::Cancelled,
            initial_quantity: order.initial_quantity,
            remaining_quantity: order.remaining_quantity,
            trades: Vec::new(),
            updates: vec![update],
        })
    }

    /// Top-of-book quote. `UnknownSymbol` only for a symbol whose book was
    /// never created, not for a known symbol with an empty side.
    pub fn best_quote(&self, symbol: &str) -> Result<Quote, EngineError> {
        let ctx = self
            .books
            .get(symbol)
            .ok_or_else(|| EngineError::UnknownSymbol(symbol.to_string()))?;

        let (bid_price, bid_quantity) = ctx.book.aggregate_best_level(Side::Buy);
        let (ask_price, ask_quantity) = ctx.book.aggregate_best_level(Side::Sell);

        Ok(Quote {
            symbol: symbol.to_string(),
            last_trade_price: ctx.book.last_trade_price(),
            bid_price,
            bid_quantity,
            ask_price,
            ask_quantity,
            total_volume: ctx.book.total_volume(),
        })
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cmd(
        symbol: &str,
        side: Side,
        order_type: OrderType,
        price: Option<Decimal>,
        qty: i64,
        tif: TimeInForce,
    ) -> SubmitCommand {
        SubmitCommand {
            user_id: 1,
            symbol: symbol.to_string(),
            side,
            order_type,
            price,
            quantity: qty,
            time_in_force: tif,
        }
    }

    #[test]
    fn s1_empty_book_limit_rests() {
        let engine = MatchingEngine::new();
        let result = engine
            .submit(cmd(
                "AAPL",
                Side::Buy,
                OrderType::Limit,
                Some(dec!(150.00)),
                10,
                TimeInForce::Gfd,
            ))
            .unwrap();

        assert_eq!(result.status, OrderStatus::New);
        assert!(result.trades.is_empty());

        let quote = engine.best_quote("AAPL").unwrap();
        assert_eq!(quote.bid_price, PriceLevel::from_decimal(dec!(150.00)));
        assert_eq!(quote.bid_quantity, 10);
        assert_eq!(quote.ask_quantity, 0);
    }

    #[test]
    fn s2_full_cross() {
        let engine = MatchingEngine::new();
        engine
            .submit(cmd(
                "AAPL",
                Side::Buy,
                OrderType::Limit,
                Some(dec!(150.00)),
                10,
                TimeInForce::Gfd,
            ))
            .unwrap();

        let result = engine
            .submit(cmd(
                "AAPL",
                Side::Sell,
                OrderType::Limit,
                Some(dec!(150.00)),
                10,
                TimeInForce::Gfd,
            ))
            .unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].price, PriceLevel::from_decimal(dec!(150.00)));
        assert_eq!(result.trades[0].quantity, 10);
        assert_eq!(result.status, OrderStatus::Filled);

        let quote = engine.best_quote("AAPL").unwrap();
        assert_eq!(quote.bid_quantity, 0);
        assert_eq!(quote.ask_quantity, 0);
    }

    #[test]
    fn s3_partial_then_rest() {
        let engine = MatchingEngine::new();
        engine
            .submit(cmd(
                "AAPL",
                Side::Buy,
                OrderType::Limit,
                Some(dec!(150.00)),
                10,
                TimeInForce::Gfd,
            ))
            .unwrap();

        let result = engine
            .submit(cmd(
                "AAPL",
                Side::Sell,
                OrderType::Limit,
                Some(dec!(150.00)),
                6,
                TimeInForce::Gfd,
            ))
            .unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].quantity, 6);
        assert_eq!(result.status, OrderStatus::Filled);

        let quote = engine.best_quote("AAPL").unwrap();
        assert_eq!(quote.bid_quantity, 4);
        assert_eq!(quote.bid_price, PriceLevel::from_decimal(dec!(150.00)));
    }

    #[test]
    fn s4_ioc_with_no_liquidity() {
        let engine = MatchingEngine::new();
        let result = engine
            .submit(cmd(
                "TSLA",
                Side::Buy,
                OrderType::Limit,
                Some(dec!(200.00)),
                15,
                TimeInForce::Ioc,
            ))
            .unwrap();

        assert!(result.trades.is_empty());
        assert_eq!(result.status, OrderStatus::Cancelled);

        let quote = engine.best_quote("TSLA").unwrap();
        assert_eq!(quote.bid_quantity, 0);
    }

    #[test]
    fn s5_fok_insufficient_liquidity_leaves_book_untouched() {
        let engine = MatchingEngine::new();
        engine
            .submit(cmd(
                "XOM",
                Side::Sell,
                OrderType::Limit,
                Some(dec!(100.00)),
                5,
                TimeInForce::Gfd,
            ))
            .unwrap();

        let result = engine
            .submit(cmd(
                "XOM",
                Side::Buy,
                OrderType::Market,
                None,
                10,
                TimeInForce::Fok,
            ))
            .unwrap();

        assert!(result.trades.is_empty());
        assert_eq!(result.status, OrderStatus::Cancelled);

        let quote = engine.best_quote("XOM").unwrap();
        assert_eq!(quote.ask_quantity, 5);
    }

    #[test]
    fn s6_price_time_tiebreak() {
        let engine = MatchingEngine::new();
        engine
            .submit(cmd(
                "IBM",
                Side::Buy,
                OrderType::Limit,
                Some(dec!(100.00)),
                5,
                TimeInForce::Gfd,
            ))
            .unwrap();
        let second = engine
            .submit(cmd(
                "IBM",
                Side::Buy,
                OrderType::Limit,
                Some(dec!(100.00)),
                5,
                TimeInForce::Gfd,
            ))
            .unwrap();

        let result = engine
            .submit(cmd(
                "IBM",
                Side::Sell,
                OrderType::Limit,
                Some(dec!(100.00)),
                5,
                TimeInForce::Gfd,
            ))
            .unwrap();

        assert_eq!(result.trades[0].buy_order_id, 1);
        assert_ne!(result.trades[0].buy_order_id, second.order_id);
    }

    #[test]
    fn order_ids_and_trade_ids_are_strictly_increasing() {
        let engine = MatchingEngine::new();
        let a = engine
            .submit(cmd(
                "MSFT",
                Side::Buy,
                OrderType::Limit,
                Some(dec!(50.0)),
                1,
                TimeInForce::Gfd,
            ))
            .unwrap();
        let b = engine
            .submit(cmd(
                "MSFT",
                Side::Sell,
                OrderType::Limit,
                Some(dec!(50.0)),
                1,
                TimeInForce::Gfd,
            ))
            .unwrap();

        assert!(b.order_id > a.order_id);
        assert_eq!(b.trades[0].trade_id, 1);
    }

    #[test]
    fn rejects_non_positive_quantity_without_mutating_book() {
        let engine = MatchingEngine::new();
        let err = engine
            .submit(cmd(
                "AAPL",
                Side::Buy,
                OrderType::Limit,
                Some(dec!(150.00)),
                0,
                TimeInForce::Gfd,
            ))
            .unwrap_err();

        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn cancel_withdraws_a_resting_order() {
        let engine = MatchingEngine::new();
        let placed = engine
            .submit(cmd(
                "AAPL",
                Side::Buy,
                OrderType::Limit,
                Some(dec!(150.00)),
                10,
                TimeInForce::Gfd,
            ))
            .unwrap();

        let cancelled = engine.cancel("AAPL", placed.order_id).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let quote = engine.best_quote("AAPL").unwrap();
        assert_eq!(quote.bid_quantity, 0);
    }

    #[test]
    fn quote_for_never_traded_symbol_is_unknown() {
        let engine = MatchingEngine::new();
        let err = engine.best_quote("ZZZZ").unwrap_err();
        assert!(matches!(err, EngineError::UnknownSymbol(_)));
    }
}
