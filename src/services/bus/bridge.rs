//! Optional external pub/sub bridge
//!
//! Mirrors the four local bus channels onto named topics on a remote
//! Redis-compatible endpoint, and injects inbound messages on those same
//! topics back into the local bus — the path a simulated-tick producer
//! running outside this process would use to feed the gateway.
//!
//! Grounded on the teacher's `cache::redis_client`/`cache::pubsub`
//! connection and publish patterns, simplified: no connection-manager
//! retry wrapper (a dropped bridge connection degrades to local-only
//! fan-out, it does not take the matching engine down with it) and no
//! cache-side commands, just PUBLISH and SUBSCRIBE.

use super::{Channel, Event, EventBus};
use crate::config::{ChannelSettings, RedisSettings};
use redis::AsyncCommands;
use std::sync::Arc;

pub struct Bridge {
    client: redis::Client,
    channels: ChannelSettings,
}

impl Bridge {
    pub fn connect(settings: &RedisSettings, channels: ChannelSettings) -> redis::RedisResult<Self> {
        let url = match &settings.password {
            Some(password) => format!("redis://:{}@{}:{}", password, settings.host, settings.port),
            None => format!("redis://{}:{}", settings.host, settings.port),
        };
        Ok(Self {
            client: redis::Client::open(url)?,
            channels,
        })
    }

    fn topic(&self, channel: Channel) -> &str {
        match channel {
            Channel::MarketData => &self.channels.market_data,
            Channel::OrderUpdates => &self.channels.order_updates,
            Channel::Trades => &self.channels.trade,
            Channel::Errors => &self.channels.error,
        }
    }

    /// Mirror every locally-published event onto its external topic. Runs
    /// until the process shuts down; a publish failure is logged and
    /// skipped rather than propagated, since a lost mirror must never
    /// back-pressure or halt the matching engine.
    pub async fn run_outbound(self: Arc<Self>, bus: Arc<EventBus>) {
        let Ok(mut conn) = self.client.get_multiplexed_async_connection().await else {
            tracing::warn!("external bus bridge: could not connect, outbound mirroring disabled");
            return;
        };

        let [mut market_data, mut order_updates, mut trades, mut errors] = bus.subscribe_all();
        loop {
            let (channel, event) = tokio::select! {
                Ok(event) = market_data.recv() => (Channel::MarketData, event),
                Ok(event) = order_updates.recv() => (Channel::OrderUpdates, event),
                Ok(event) = trades.recv() => (Channel::Trades, event),
                Ok(event) = errors.recv() => (Channel::Errors, event),
                else => break,
            };
            self.publish_one(&mut conn, channel, &event).await;
        }
    }

    /// Mirrors the same `{type, data}` frame shape the streaming gateway
    /// sends to clients, minus the `timestamp` envelope the gateway adds
    /// per connection.
    async fn publish_one(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        channel: Channel,
        event: &Event,
    ) {
        let Ok(payload) = serde_json::to_string(&event.to_frame()) else {
            return;
        };
        let topic = self.topic(channel);
        if let Err(error) = conn.publish::<_, _, ()>(topic, payload).await {
            tracing::warn!(%topic, %error, "external bus bridge: publish failed");
        }
    }

    /// Listen on every named topic and inject inbound messages into the
    /// local bus, tagged by the topic they arrived on. Used when an
    /// external producer (e.g. a simulator running in another process)
    /// feeds this gateway instead of the in-process one.
    pub async fn run_inbound(self: Arc<Self>, bus: Arc<EventBus>) {
        let Ok(mut pubsub) = self.client.get_async_pubsub().await else {
            tracing::warn!("external bus bridge: could not open pub/sub connection, inbound disabled");
            return;
        };

        for channel in Channel::ALL {
            if let Err(error) = pubsub.subscribe(self.topic(channel)).await {
                tracing::warn!(topic = self.topic(channel), %error, "external bus bridge: subscribe failed");
            }
        }

        let mut stream = pubsub.on_message();
        while let Some(message) = futures::StreamExt::next(&mut stream).await {
            let Ok(payload): Result<String, _> = message.get_payload() else {
                continue;
            };
            let Ok(frame) = serde_json::from_str::<serde_json::Value>(&payload) else {
                continue;
            };
            let Some(event) = Event::from_frame(&frame) else {
                continue;
            };
            bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_without_password_omits_credentials() {
        let settings = RedisSettings {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
        };
        let channels = ChannelSettings {
            market_data: "market_data".to_string(),
            order_updates: "order_updates".to_string(),
            trade: "trades".to_string(),
            error: "errors".to_string(),
        };
        let bridge = Bridge::connect(&settings, channels).unwrap();
        assert_eq!(bridge.topic(Channel::Trades), "trades");
    }
}
