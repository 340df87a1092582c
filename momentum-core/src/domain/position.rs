//! Position — an open long holding in a single symbol.
//!
//! Short selling is out of scope: a position is either `Long` or `Flat`
//! (closed). There is no `Short` state to construct or transition into.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Flat,
}

/// An open position in a single symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub entry_date: chrono::NaiveDate,
    pub unrealized_pnl: f64,
}

impl Position {
    pub fn new_long(
        symbol: impl Into<String>,
        quantity: f64,
        entry_price: f64,
        entry_date: chrono::NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side: PositionSide::Long,
            quantity,
            avg_entry_price: entry_price,
            entry_date,
            unrealized_pnl: 0.0,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.side, PositionSide::Flat) || self.quantity == 0.0
    }

    /// Update unrealized PnL against the latest mark.
    pub fn update_mark(&mut self, current_price: f64) {
        self.unrealized_pnl = (current_price - self.avg_entry_price) * self.quantity;
    }

    /// Market value at the given price.
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}
