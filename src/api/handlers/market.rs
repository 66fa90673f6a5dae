//! Quote endpoint handler.

use axum::{extract::{Path, State}, Json};
use std::sync::Arc;

use crate::error::EngineError;
use crate::models::QuoteResponse;
use crate::services::matching::{PriceLevel, Quote};
use crate::AppState;

#[derive(serde::Serialize)]
struct QuoteEnvelope {
    success: bool,
    data: QuoteResponse,
}

/// `UnknownSymbol` is not an error here: a symbol that has never traded
/// still has a valid (all-zero) quote, per the quote endpoint's own
/// error-kind carve-out.
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<QuoteEnvelope>, EngineError> {
    let quote = match state.engine.best_quote(&symbol) {
        Ok(quote) => quote,
        Err(EngineError::UnknownSymbol(_)) => Quote {
            symbol: symbol.clone(),
            last_trade_price: PriceLevel::ZERO,
            bid_price: PriceLevel::ZERO,
            bid_quantity: 0,
            ask_price: PriceLevel::ZERO,
            ask_quantity: 0,
            total_volume: 0,
        },
        Err(other) => return Err(other),
    };

    Ok(Json(QuoteEnvelope {
        success: true,
        data: quote.into(),
    }))
}
