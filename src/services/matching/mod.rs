//! Matching Engine Module
//!
//! In-memory limit order matching with price-time priority.
//!
//! ```text
//! API Handler
//!   -> MatchingEngine (per-symbol exclusive critical section)
//!        -> Orderbook (bids/asks, resting orders)
//! ```
//!
//! One `Orderbook` per symbol, created lazily on first reference. The
//! engine is the sole owner of the order-id/trade-id sequences and the
//! per-symbol lock that serializes matching.

mod engine;
mod orderbook;
mod types;

pub use engine::{MatchingEngine, Quote, SubmitCommand};
pub use orderbook::Orderbook;
pub use types::*;
