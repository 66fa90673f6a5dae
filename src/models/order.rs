//! HTTP-facing DTOs for order submission and query, distinct from the
//! engine-internal types: these carry the wire JSON field names and
//! serde-level validation quirks (`price` optional, required only for
//! LIMIT; `timeInForce` defaults to GFD when omitted) rather than the
//! engine's typed invariants. Missing/malformed fields are surfaced as
//! `Validation` errors by `api::extract::ValidatedJson`, not a bare
//! deserialization failure.

use crate::services::matching::{MatchResult, OrderStatus, OrderType, Side, TimeInForce};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: u64,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(default)]
    pub price: Option<Decimal>,
    pub quantity: i64,
    #[serde(default)]
    pub time_in_force: TimeInForce,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: u64,
    pub user_id: u64,
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub price: Decimal,
    pub quantity: i64,
    pub remaining_quantity: i64,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
}

impl OrderResponse {
    pub fn from_result(request: &CreateOrderRequest, result: &MatchResult) -> Self {
        Self {
            order_id: result.order_id,
            user_id: request.user_id,
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            price: request.price.unwrap_or(Decimal::ZERO),
            quantity: result.initial_quantity,
            remaining_quantity: result.remaining_quantity,
            time_in_force: request.time_in_force,
            status: result.status,
        }
    }
}
