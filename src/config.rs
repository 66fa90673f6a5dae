//! Layered configuration, loaded the way the teacher's `AppConfig` is:
//! defaults, then an optional file, then `APP_`-prefixed environment
//! variables, with `.env` populating the process environment first.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSettings {
    #[serde(rename = "marketData")]
    pub market_data: String,
    #[serde(rename = "orderUpdate")]
    pub order_updates: String,
    pub trade: String,
    pub error: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub symbols: Vec<String>,
    pub volatility: f64,
    #[serde(rename = "updateInterval")]
    pub update_interval: f64,
    pub server: ServerSettings,
    pub redis: Option<RedisSettings>,
    pub channels: ChannelSettings,
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .set_default("symbols", default_symbols())?
            .set_default("volatility", 0.02)?
            .set_default("updateInterval", 1.0)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8765)?
            .set_default("channels.marketData", "market_data")?
            .set_default("channels.orderUpdate", "order_updates")?
            .set_default("channels.trade", "trades")?
            .set_default("channels.error", "errors")?
            .add_source(
                config::File::with_name("config/default").required(false),
            )
            .add_source(
                config::File::with_name("config/local").required(false),
            )
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }
}

fn default_symbols() -> Vec<String> {
    [
        "AAPL", "GOOGL", "MSFT", "AMZN", "TSLA", "FB", "NFLX", "NVDA", "AMD", "INTC",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_symbols_match_original_demo_basket() {
        assert_eq!(default_symbols().len(), 10);
        assert!(default_symbols().contains(&"AAPL".to_string()));
    }
}
