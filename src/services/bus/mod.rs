//! In-process Event Bus
//!
//! Four fixed channels (MARKET_DATA, ORDER_UPDATES, TRADES, ERRORS) plus a
//! virtual ALL union. Each channel is a `tokio::sync::broadcast` — publish
//! is non-blocking for the producer, and a subscriber that falls behind
//! observes `RecvError::Lagged` rather than stalling the publisher or
//! losing the channel for everyone else; that is exactly the drop-oldest,
//! per-subscriber-queue policy this bus is specified to have, so there is
//! no hand-rolled ring buffer here.

pub mod bridge;

use crate::services::matching::{OrderUpdate, Tick, TradeExecution};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    MarketData,
    OrderUpdates,
    Trades,
    Errors,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::MarketData,
        Channel::OrderUpdates,
        Channel::Trades,
        Channel::Errors,
    ];
}

/// An event carried on the bus. `to_frame`/`from_frame` convert to and from
/// the wire shape gateway clients and the external bridge actually see.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Tick(Tick),
    Trade(TradeExecution),
    OrderUpdate(OrderUpdate),
    Error { message: String },
}

impl Event {
    pub fn channel(&self) -> Channel {
        match self {
            Event::Tick(_) => Channel::MarketData,
            Event::Trade(_) => Channel::Trades,
            Event::OrderUpdate(_) => Channel::OrderUpdates,
            Event::Error { .. } => Channel::Errors,
        }
    }

    /// The wire shape shared by the streaming gateway and the external bus
    /// bridge: a `type` tag plus a nested `data` body, everything except
    /// `error` (whose message sits at the top level, not nested).
    pub fn to_frame(&self) -> Value {
        match self {
            Event::Tick(tick) => json!({ "type": "tick", "data": tick }),
            Event::Trade(trade) => json!({ "type": "trade", "data": trade }),
            Event::OrderUpdate(update) => json!({ "type": "order_update", "data": update }),
            Event::Error { message } => json!({ "type": "error", "message": message }),
        }
    }

    /// Inverse of `to_frame`, used by the external bus bridge to reconstruct
    /// an `Event` from a message received on a mirrored topic.
    pub fn from_frame(frame: &Value) -> Option<Event> {
        let kind = frame.get("type")?.as_str()?;
        match kind {
            "tick" => serde_json::from_value(frame.get("data")?.clone()).ok().map(Event::Tick),
            "trade" => serde_json::from_value(frame.get("data")?.clone()).ok().map(Event::Trade),
            "order_update" => serde_json::from_value(frame.get("data")?.clone())
                .ok()
                .map(Event::OrderUpdate),
            "error" => frame
                .get("message")?
                .as_str()
                .map(|message| Event::Error { message: message.to_string() }),
            _ => None,
        }
    }
}

/// Default per-subscriber backlog before the oldest unread event for that
/// subscriber is dropped.
const DEFAULT_CAPACITY: usize = 1024;

pub struct EventBus {
    market_data: broadcast::Sender<Event>,
    order_updates: broadcast::Sender<Event>,
    trades: broadcast::Sender<Event>,
    errors: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            market_data: broadcast::channel(capacity).0,
            order_updates: broadcast::channel(capacity).0,
            trades: broadcast::channel(capacity).0,
            errors: broadcast::channel(capacity).0,
        }
    }

    fn sender(&self, channel: Channel) -> &broadcast::Sender<Event> {
        match channel {
            Channel::MarketData => &self.market_data,
            Channel::OrderUpdates => &self.order_updates,
            Channel::Trades => &self.trades,
            Channel::Errors => &self.errors,
        }
    }

    /// Deliver to every current subscriber of the event's channel. Returns
    /// the number reached; zero subscribers is not an error, the event is
    /// simply dropped.
    pub fn publish(&self, event: Event) -> usize {
        let channel = event.channel();
        self.sender(channel).send(event).unwrap_or(0)
    }

    pub fn subscribe(&self, channel: Channel) -> broadcast::Receiver<Event> {
        self.sender(channel).subscribe()
    }

    /// One receiver per real channel; the caller merges them (e.g. via
    /// `tokio::select!`) to realize the virtual ALL stream.
    pub fn subscribe_all(&self) -> [broadcast::Receiver<Event>; 4] {
        [
            self.market_data.subscribe(),
            self.order_updates.subscribe(),
            self.trades.subscribe(),
            self.errors.subscribe(),
        ]
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matching::PriceLevel;

    fn sample_tick() -> Tick {
        Tick {
            symbol: "AAPL".to_string(),
            last_trade_price: PriceLevel::ZERO,
            last_trade_quantity: 0,
            bid_price: PriceLevel::ZERO,
            bid_quantity: 0,
            ask_price: PriceLevel::ZERO,
            ask_quantity: 0,
            total_volume: 0,
            timestamp: 1,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event_on_its_channel() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Channel::MarketData);

        bus.publish(Event::Tick(sample_tick()));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.channel(), Channel::MarketData);
    }

    #[tokio::test]
    async fn subscriber_on_a_different_channel_does_not_see_the_event() {
        let bus = EventBus::new();
        let mut trades_rx = bus.subscribe(Channel::Trades);

        bus.publish(Event::Tick(sample_tick()));

        assert!(trades_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn overflowing_subscriber_observes_lag_rather_than_blocking_the_publisher() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe(Channel::MarketData);

        for _ in 0..5 {
            bus.publish(Event::Tick(sample_tick()));
        }

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(_)) => {}
            other => panic!("expected Lagged, got {other:?}"),
        }
    }
}
