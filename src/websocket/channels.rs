//! Gateway channel naming: maps the streaming paths and the client
//! subscribe/unsubscribe action's `channel` field onto the bus's
//! `Channel` set, plus the virtual ALL union.

use crate::services::bus::Channel as BusChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayChannel {
    MarketData,
    OrderUpdates,
    Trades,
    All,
}

impl GatewayChannel {
    /// Initial subscription for a connection on `path`. Unrecognized
    /// paths default to ALL.
    pub fn from_path(path: &str) -> Self {
        match path.trim_start_matches("/ws/") {
            "marketdata" => GatewayChannel::MarketData,
            "orderupdates" => GatewayChannel::OrderUpdates,
            "trades" => GatewayChannel::Trades,
            _ => GatewayChannel::All,
        }
    }

    /// Parse a client-supplied channel name from a subscribe/unsubscribe
    /// action. Unlike `from_path`, an unrecognized name here is an error
    /// rather than a silent default to ALL — the client asked for
    /// something specific and got it wrong.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "marketdata" => Some(GatewayChannel::MarketData),
            "orderupdates" => Some(GatewayChannel::OrderUpdates),
            "trades" => Some(GatewayChannel::Trades),
            "all" => Some(GatewayChannel::All),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GatewayChannel::MarketData => "marketdata",
            GatewayChannel::OrderUpdates => "orderupdates",
            GatewayChannel::Trades => "trades",
            GatewayChannel::All => "all",
        }
    }

    pub fn bus_channels(&self) -> Vec<BusChannel> {
        match self {
            GatewayChannel::MarketData => vec![BusChannel::MarketData],
            GatewayChannel::OrderUpdates => vec![BusChannel::OrderUpdates],
            GatewayChannel::Trades => vec![BusChannel::Trades],
            GatewayChannel::All => BusChannel::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_path_defaults_to_all() {
        assert_eq!(GatewayChannel::from_path("/ws/whatever"), GatewayChannel::All);
    }

    #[test]
    fn known_paths_map_to_their_channel() {
        assert_eq!(GatewayChannel::from_path("/ws/trades"), GatewayChannel::Trades);
    }

    #[test]
    fn unrecognized_client_channel_name_is_rejected() {
        assert!(GatewayChannel::from_name("bogus").is_none());
    }
}
