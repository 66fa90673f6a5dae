use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod error;
mod models;
mod services;
mod websocket;

use crate::config::Settings;
use crate::services::bus::bridge::Bridge;
use crate::services::bus::EventBus;
use crate::services::matching::MatchingEngine;
use crate::services::simulator::Simulator;

pub struct AppState {
    pub config: Settings,
    pub engine: Arc<MatchingEngine>,
    pub bus: Arc<EventBus>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketcore=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    tracing::info!("Starting marketcore v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(symbols = ?settings.symbols, "configured symbols");

    let engine = Arc::new(MatchingEngine::with_symbols(settings.symbols.clone()));
    let bus = Arc::new(EventBus::new());

    let simulator = Simulator::new(bus.clone(), &settings);
    tokio::spawn(simulator.run());
    tracing::info!("tick simulator spawned");

    if let Some(redis) = settings.redis.clone() {
        match Bridge::connect(&redis, settings.channels.clone()) {
            Ok(bridge) => {
                let bridge = Arc::new(bridge);
                tokio::spawn(bridge.clone().run_outbound(bus.clone()));
                tokio::spawn(bridge.run_inbound(bus.clone()));
                tracing::info!(host = %redis.host, port = redis.port, "external bus bridge spawned");
            }
            Err(error) => {
                tracing::warn!(%error, "failed to connect external bus bridge, running local-only");
            }
        }
    } else {
        tracing::info!("no external bus configured, running local-only");
    }

    let host = settings.server.host.clone();
    let port = settings.server.port;

    let state = Arc::new(AppState {
        config: settings,
        engine,
        bus,
    });

    let app = Router::new()
        .merge(api::routes::create_router(state.clone()))
        .nest("/ws", websocket::routes::create_router(state.clone()))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from_str(&format!("{host}:{port}"))?;
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
