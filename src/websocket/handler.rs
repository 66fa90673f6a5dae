//! Streaming gateway connection loop.
//!
//! One task per connection: merges however many bus channels the
//! connection is currently subscribed to with reads from the client
//! socket, via `tokio::select!` over `broadcast::Receiver`s exactly as
//! the bus hands them out. A slow client only loses its own backlog (the
//! bus's drop-oldest policy) and never blocks a publisher.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

use crate::services::bus::{Channel as BusChannel, Event};
use crate::websocket::channels::GatewayChannel;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum ClientAction {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn envelope(mut frame: Value) -> Message {
    if let Value::Object(ref mut map) = frame {
        map.entry("timestamp").or_insert(json!(now_ms()));
    }
    Message::Text(frame.to_string())
}

struct Subscriptions {
    bus: Arc<crate::services::bus::EventBus>,
    market_data: Option<broadcast::Receiver<Event>>,
    order_updates: Option<broadcast::Receiver<Event>>,
    trades: Option<broadcast::Receiver<Event>>,
    errors: Option<broadcast::Receiver<Event>>,
}

impl Subscriptions {
    fn new(bus: Arc<crate::services::bus::EventBus>) -> Self {
        Self {
            bus,
            market_data: None,
            order_updates: None,
            trades: None,
            errors: None,
        }
    }

    fn add(&mut self, channel: BusChannel) {
        let slot = match channel {
            BusChannel::MarketData => &mut self.market_data,
            BusChannel::OrderUpdates => &mut self.order_updates,
            BusChannel::Trades => &mut self.trades,
            BusChannel::Errors => &mut self.errors,
        };
        if slot.is_none() {
            *slot = Some(self.bus.subscribe(channel));
        }
    }

    fn remove(&mut self, channel: BusChannel) {
        match channel {
            BusChannel::MarketData => self.market_data = None,
            BusChannel::OrderUpdates => self.order_updates = None,
            BusChannel::Trades => self.trades = None,
            BusChannel::Errors => self.errors = None,
        }
    }

    fn apply(&mut self, gateway_channel: GatewayChannel, subscribe: bool) {
        for channel in gateway_channel.bus_channels() {
            if subscribe {
                self.add(channel);
            } else {
                self.remove(channel);
            }
        }
    }
}

pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, path: String) {
    let (mut sender, mut receiver) = socket.split();

    let mut subs = Subscriptions::new(state.bus.clone());
    subs.apply(GatewayChannel::from_path(&path), true);

    if sender
        .send(envelope(json!({ "type": "connection", "status": "connected" })))
        .await
        .is_err()
    {
        return;
    }

    loop {
        let next_event = tokio::select! {
            Some(market_data) = recv_opt(&mut subs.market_data) => Some(market_data),
            Some(order_updates) = recv_opt(&mut subs.order_updates) => Some(order_updates),
            Some(trades) = recv_opt(&mut subs.trades) => Some(trades),
            Some(errors) = recv_opt(&mut subs.errors) => Some(errors),
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(frame) = handle_client_text(&text, &mut subs) {
                            if sender.send(envelope(frame)).await.is_err() {
                                break;
                            }
                        }
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => break,
                }
            }
        };

        match next_event {
            Some(RecvOutcome::Event(event)) => {
                if sender.send(envelope(event.to_frame())).await.is_err() {
                    break;
                }
            }
            Some(RecvOutcome::Lag(n)) => {
                let frame = json!({ "type": "lag", "skipped": n });
                if sender.send(envelope(frame)).await.is_err() {
                    break;
                }
            }
            None => {}
        }
    }
}

enum RecvOutcome {
    Event(Event),
    Lag(u64),
}

/// Normalizes a `broadcast::Receiver` poll into `Option<RecvOutcome>` so
/// `tokio::select!` can treat an unsubscribed slot (`None`) as a branch
/// that never fires, instead of needing a separate arm per channel state.
async fn recv_opt(receiver: &mut Option<broadcast::Receiver<Event>>) -> Option<RecvOutcome> {
    match receiver {
        None => std::future::pending().await,
        Some(rx) => match rx.recv().await {
            Ok(event) => Some(RecvOutcome::Event(event)),
            Err(broadcast::error::RecvError::Lagged(n)) => Some(RecvOutcome::Lag(n)),
            Err(broadcast::error::RecvError::Closed) => std::future::pending().await,
        },
    }
}

fn handle_client_text(text: &str, subs: &mut Subscriptions) -> Option<Value> {
    let action: ClientAction = match serde_json::from_str(text) {
        Ok(action) => action,
        Err(error) => {
            return Some(json!({ "type": "error", "message": error.to_string() }));
        }
    };

    match action {
        ClientAction::Subscribe { channel } => match GatewayChannel::from_name(&channel) {
            Some(gateway_channel) => {
                subs.apply(gateway_channel, true);
                Some(json!({ "type": "subscription", "action": "subscribe", "channel": channel }))
            }
            None => Some(json!({ "type": "error", "message": format!("unknown channel: {channel}") })),
        },
        ClientAction::Unsubscribe { channel } => match GatewayChannel::from_name(&channel) {
            Some(gateway_channel) => {
                subs.apply(gateway_channel, false);
                Some(json!({ "type": "subscription", "action": "unsubscribe", "channel": channel }))
            }
            None => Some(json!({ "type": "error", "message": format!("unknown channel: {channel}") })),
        },
        ClientAction::Ping => Some(json!({ "type": "pong" })),
    }
}
