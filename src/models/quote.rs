//! HTTP-facing DTO for the quote endpoint.

use crate::services::matching::Quote;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub symbol: String,
    pub last_trade_price: Decimal,
    pub bid_price: Decimal,
    pub bid_quantity: i64,
    pub ask_price: Decimal,
    pub ask_quantity: i64,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        Self {
            symbol: quote.symbol,
            last_trade_price: quote.last_trade_price.to_decimal(),
            bid_price: quote.bid_price.to_decimal(),
            bid_quantity: quote.bid_quantity,
            ask_price: quote.ask_price.to_decimal(),
            ask_quantity: quote.ask_quantity,
        }
    }
}
