//! Trade — a single execution (buy or sell) applied to the portfolio.
//!
//! A buy trade opens or adds to a position; a sell trade reduces or closes
//! one. `pnl` is `None` on opening trades and `Some` on trades that realize
//! PnL (full or partial closes).

use super::order::OrderSide;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub date: NaiveDate,
    pub commission: f64,
    pub slippage_cost: f64,
    pub pnl: Option<f64>,
}

impl Trade {
    /// Notional value of the trade before costs.
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    pub fn is_winner(&self) -> bool {
        self.pnl.is_some_and(|p| p > 0.0)
    }

    pub fn is_closing(&self) -> bool {
        self.pnl.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade(pnl: Option<f64>) -> Trade {
        Trade {
            symbol: "SPY".into(),
            side: OrderSide::Sell,
            quantity: 50.0,
            price: 110.0,
            date: NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
            commission: 10.0,
            slippage_cost: 5.0,
            pnl,
        }
    }

    #[test]
    fn notional_is_price_times_quantity() {
        assert_eq!(sample_trade(None).notional(), 5500.0);
    }

    #[test]
    fn opening_trade_is_not_winner_or_closing() {
        let trade = sample_trade(None);
        assert!(!trade.is_winner());
        assert!(!trade.is_closing());
    }

    #[test]
    fn closing_trade_with_positive_pnl_is_winner() {
        let trade = sample_trade(Some(485.0));
        assert!(trade.is_winner());
        assert!(trade.is_closing());
    }

    #[test]
    fn closing_trade_with_negative_pnl_is_not_winner() {
        let trade = sample_trade(Some(-50.0));
        assert!(!trade.is_winner());
        assert!(trade.is_closing());
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade(Some(485.0));
        let json = serde_json::to_string(&trade).unwrap();
        let deser: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade.symbol, deser.symbol);
        assert_eq!(trade.pnl, deser.pnl);
    }
}
