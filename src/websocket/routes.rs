use axum::{
    extract::{ws::WebSocketUpgrade, OriginalUri, State},
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::websocket::handler::handle_socket;
use crate::AppState;

pub fn create_router(_state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/marketdata", get(ws_handler))
        .route("/orderupdates", get(ws_handler))
        .route("/trades", get(ws_handler))
        .route("/all", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let path = uri.path().to_string();
    ws.on_upgrade(move |socket| handle_socket(socket, state, path))
}
