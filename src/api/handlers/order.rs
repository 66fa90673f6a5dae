//! Order submission handler.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::extract::ValidatedJson;
use crate::error::EngineError;
use crate::models::{CreateOrderRequest, OrderResponse};
use crate::services::bus::Event;
use crate::services::matching::SubmitCommand;
use crate::AppState;

#[derive(serde::Serialize)]
struct Accepted {
    success: bool,
    data: OrderResponse,
}

pub async fn place_order(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<CreateOrderRequest>,
) -> Result<Json<Accepted>, EngineError> {
    let command = SubmitCommand {
        user_id: request.user_id,
        symbol: request.symbol.clone(),
        side: request.side,
        order_type: request.order_type,
        price: request.price,
        quantity: request.quantity,
        time_in_force: request.time_in_force,
    };

    let result = state.engine.submit(command)?;

    for trade in &result.trades {
        state.bus.publish(Event::Trade(trade.clone()));
    }
    for update in &result.updates {
        state.bus.publish(Event::OrderUpdate(update.clone()));
    }

    let data = OrderResponse::from_result(&request, &result);
    Ok(Json(Accepted { success: true, data }))
}
