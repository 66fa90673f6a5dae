//! Synthetic tick and trade simulator
//!
//! One Gaussian random walk per configured symbol, publishing `Tick`s on
//! MARKET_DATA and occasionally a synthetic `TradeExecution` on TRADES.
//! Entirely independent of the matching engine: it never touches an
//! `Orderbook`, it only manufactures market-data events for a demo or a
//! development gateway with no real order flow.
//!
//! Grounded on the original price-movement generator: each symbol's price
//! is seeded uniformly in `[50.0, 500.0]`, then walked by a per-step
//! Gaussian percentage change (`volatility` as its standard deviation),
//! clamped to `[1.0, 10000.0]`, with a synthesized bid/ask spread and a
//! 10% per-step chance of also emitting a trade.

use crate::config::Settings;
use crate::services::bus::{Event, EventBus};
use crate::services::matching::{PriceLevel, Tick, TradeExecution};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rust_decimal::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const MIN_PRICE: f64 = 1.0;
const MAX_PRICE: f64 = 10_000.0;
const TRADE_PROBABILITY: f64 = 0.10;
const MIN_SPREAD_PCT: f64 = 0.001;
const MAX_SPREAD_PCT: f64 = 0.005;
const SEED_MIN_PRICE: f64 = 50.0;
const SEED_MAX_PRICE: f64 = 500.0;

pub struct Simulator {
    bus: Arc<EventBus>,
    symbols: Vec<String>,
    volatility: f64,
    update_interval: Duration,
    next_trade_id: AtomicU64,
}

impl Simulator {
    pub fn new(bus: Arc<EventBus>, settings: &Settings) -> Self {
        Self {
            bus,
            symbols: settings.symbols.clone(),
            volatility: settings.volatility.max(0.0),
            update_interval: Duration::from_secs_f64(settings.update_interval.max(0.01)),
            next_trade_id: AtomicU64::new(1),
        }
    }

    /// Runs until the process shuts down. A no-op if no symbols are
    /// configured.
    pub async fn run(self) {
        if self.symbols.is_empty() {
            tracing::info!("tick simulator: no symbols configured, disabled");
            return;
        }

        let normal = Normal::new(0.0, self.volatility.max(f64::EPSILON))
            .expect("volatility produces a valid standard deviation");
        let mut rng = rand::thread_rng();
        let mut prices: HashMap<String, f64> = self
            .symbols
            .iter()
            .map(|s| (s.clone(), rng.gen_range(SEED_MIN_PRICE..=SEED_MAX_PRICE)))
            .collect();
        let mut volumes: HashMap<String, i64> =
            self.symbols.iter().map(|s| (s.clone(), 0)).collect();
        let mut interval = tokio::time::interval(self.update_interval);

        loop {
            interval.tick().await;
            for symbol in &self.symbols {
                let price = prices.get_mut(symbol).expect("seeded above");
                *price = next_price(*price, &normal, &mut rng);

                let tick = self.build_tick(symbol, *price, &mut rng, &mut volumes);
                self.bus.publish(Event::Tick(tick));

                if rng.gen::<f64>() < TRADE_PROBABILITY {
                    let trade = self.build_trade(symbol, *price, &mut rng);
                    self.bus.publish(Event::Trade(trade));
                }
            }
        }
    }

    fn build_tick(
        &self,
        symbol: &str,
        price: f64,
        rng: &mut impl Rng,
        volumes: &mut HashMap<String, i64>,
    ) -> Tick {
        let spread_pct = rng.gen_range(MIN_SPREAD_PCT..=MAX_SPREAD_PCT);
        let half_spread = price * spread_pct / 2.0;
        let bid = (price - half_spread).max(MIN_PRICE);
        let ask = (price + half_spread).min(MAX_PRICE);
        let depth = rng.gen_range(1..=500);
        let trade_qty = rng.gen_range(1..=200);
        let volume = volumes.entry(symbol.to_string()).or_insert(0);
        *volume += trade_qty;

        Tick {
            symbol: symbol.to_string(),
            last_trade_price: to_price_level(price),
            last_trade_quantity: trade_qty,
            bid_price: to_price_level(bid),
            bid_quantity: depth,
            ask_price: to_price_level(ask),
            ask_quantity: depth,
            total_volume: *volume,
            timestamp: 0,
        }
    }

    fn build_trade(&self, symbol: &str, price: f64, rng: &mut impl Rng) -> TradeExecution {
        let trade_id = self.next_trade_id.fetch_add(1, Ordering::Relaxed);
        TradeExecution {
            trade_id,
            symbol: symbol.to_string(),
            price: to_price_level(price),
            quantity: rng.gen_range(1..=100),
            // No resting order backs a synthetic trade; 0 is a sentinel,
            // never a real order_id (the engine's counters start at 1).
            buy_order_id: 0,
            sell_order_id: 0,
            timestamp: 0,
        }
    }
}

fn next_price(current: f64, normal: &Normal<f64>, rng: &mut impl Rng) -> f64 {
    let pct_change = normal.sample(rng);
    (current * (1.0 + pct_change)).clamp(MIN_PRICE, MAX_PRICE)
}

fn to_price_level(value: f64) -> PriceLevel {
    let rounded = Decimal::from_f64(value).unwrap_or(Decimal::ZERO).round_dp(4);
    PriceLevel::from_decimal(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_price_stays_within_clamp_bounds_for_extreme_steps() {
        let normal = Normal::new(0.0, 5.0).unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let price = next_price(5.0, &normal, &mut rng);
            assert!((MIN_PRICE..=MAX_PRICE).contains(&price));
        }
    }

    #[test]
    fn to_price_level_rounds_to_fixed_scale() {
        let level = to_price_level(150.12341);
        assert_eq!(level.to_decimal(), Decimal::new(1501234, 4));
    }
}
