//! Order — a target trade emitted by the risk manager for the engine to fill.
//!
//! There is no order book, no resting stop/limit state machine: every order
//! is a market order, executed (with slippage and commission) on the bar it
//! is issued for, per the simulation engine's rebalance-driven fill model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// A single target order produced by the risk manager during a rebalance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
}

impl Order {
    pub fn buy(symbol: impl Into<String>, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Buy,
            quantity,
        }
    }

    pub fn sell(symbol: impl Into<String>, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side: OrderSide::Sell,
            quantity,
        }
    }
}
