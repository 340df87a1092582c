//! Order execution and equity accounting (spec §4.6 "Order execution").
//!
//! Every order is a market order filled on the bar it targets: execution
//! price is `close × (1 + slippage_pct × side)`, commission is
//! `|notional| × commission_pct`. Buys that would overdraw cash are scaled
//! down to the largest affordable whole-share count (reserving commission);
//! if that count is zero the order is skipped with `InsufficientCash`.

use crate::domain::{Order, OrderSide, Portfolio, Position, Trade};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One point on the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Filled(Trade),
    InsufficientCash { symbol: String, requested: f64 },
}

/// Execute a single order against the portfolio, mutating cash and
/// positions in place. Returns the resulting trade or the reason execution
/// was skipped.
pub fn execute_order(
    portfolio: &mut Portfolio,
    order: &Order,
    close_price: f64,
    commission_pct: f64,
    slippage_pct: f64,
    date: NaiveDate,
    allows_fractional: bool,
) -> ExecutionOutcome {
    match order.side {
        OrderSide::Buy => {
            let fill_price = close_price * (1.0 + slippage_pct);
            let mut quantity = order.quantity;

            let affordable = |qty: f64| -> bool {
                let notional = qty * fill_price;
                let commission = notional * commission_pct;
                portfolio.cash >= notional + commission - 1e-9
            };

            if !affordable(quantity) {
                if allows_fractional {
                    // binary-search for the largest affordable fraction
                    let mut lo = 0.0;
                    let mut hi = quantity;
                    for _ in 0..60 {
                        let mid = (lo + hi) / 2.0;
                        if affordable(mid) {
                            lo = mid;
                        } else {
                            hi = mid;
                        }
                    }
                    quantity = lo;
                } else {
                    let mut shares = quantity.floor();
                    while shares > 0.0 && !affordable(shares) {
                        shares -= 1.0;
                    }
                    quantity = shares.max(0.0);
                }
            }

            if quantity <= 1e-12 {
                return ExecutionOutcome::InsufficientCash {
                    symbol: order.symbol.clone(),
                    requested: order.quantity,
                };
            }

            let notional = quantity * fill_price;
            let commission = notional * commission_pct;
            portfolio.cash -= notional + commission;
            portfolio.total_commission += commission;
            portfolio.total_slippage += (fill_price - close_price).abs() * quantity;

            let entry = portfolio
                .positions
                .entry(order.symbol.clone())
                .or_insert_with(|| Position::new_long(order.symbol.clone(), 0.0, fill_price, date));

            let existing_notional = entry.quantity * entry.avg_entry_price;
            let new_quantity = entry.quantity + quantity;
            entry.avg_entry_price = (existing_notional + notional) / new_quantity;
            entry.quantity = new_quantity;
            entry.entry_date = date;

            ExecutionOutcome::Filled(Trade {
                symbol: order.symbol.clone(),
                side: OrderSide::Buy,
                quantity,
                price: fill_price,
                date,
                commission,
                slippage_cost: (fill_price - close_price).abs() * quantity,
                pnl: None,
            })
        }
        OrderSide::Sell => {
            let fill_price = close_price * (1.0 - slippage_pct);
            let held = portfolio
                .positions
                .get(&order.symbol)
                .map(|p| p.quantity)
                .unwrap_or(0.0);
            let quantity = order.quantity.min(held);

            if quantity <= 1e-12 {
                return ExecutionOutcome::InsufficientCash {
                    symbol: order.symbol.clone(),
                    requested: order.quantity,
                };
            }

            let notional = quantity * fill_price;
            let commission = notional * commission_pct;
            let entry_price = portfolio
                .positions
                .get(&order.symbol)
                .map(|p| p.avg_entry_price)
                .unwrap_or(fill_price);

            portfolio.cash += notional - commission;
            portfolio.total_commission += commission;
            portfolio.total_slippage += (close_price - fill_price).abs() * quantity;

            let pnl = (fill_price - entry_price) * quantity - commission;

            if let Some(pos) = portfolio.positions.get_mut(&order.symbol) {
                pos.quantity -= quantity;
                if pos.quantity <= 1e-9 {
                    portfolio.positions.remove(&order.symbol);
                }
            }

            ExecutionOutcome::Filled(Trade {
                symbol: order.symbol.clone(),
                side: OrderSide::Sell,
                quantity,
                price: fill_price,
                date,
                commission,
                slippage_cost: (close_price - fill_price).abs() * quantity,
                pnl: Some(pnl),
            })
        }
    }
}

/// Mark every open position to the given close prices, updating
/// `unrealized_pnl`.
pub fn mark_to_market(portfolio: &mut Portfolio, prices: &std::collections::HashMap<String, f64>) {
    for (symbol, position) in portfolio.positions.iter_mut() {
        if let Some(&price) = prices.get(symbol) {
            position.update_mark(price);
        }
    }
}
