//! Risk manager (spec §4.5): turns target weights into a concrete set of
//! orders, applying position and leverage caps before sizing.
//!
//! Sizing algorithm:
//! 1. target weights (from the optimizer) are capped at `max_position_size`.
//! 2. the capped weight vector is rescaled if its sum exceeds `max_leverage`.
//! 3. each weight is converted to a dollar allocation against current equity.
//! 4. dollar allocations are converted to share quantities (whole shares
//!    unless the asset allows fractional units).
//! 5. orders are emitted as deltas against current holdings; symbols with a
//!    target weight of zero that are currently held are fully sold.
//! 6. symbols with no emitted order by this point already match their
//!    target within a rounding tolerance and are left alone.

use crate::domain::{AssetMetadata, Order, Portfolio};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    #[error("max_position_size must be in (0, 1], got {0}")]
    InvalidMaxPositionSize(f64),
    #[error("max_leverage must be in [0, 1], got {0}")]
    InvalidMaxLeverage(f64),
    #[error("negative target weight for {symbol}: {weight}")]
    NegativeWeight { symbol: String, weight: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum fraction of equity allocated to a single symbol.
    pub max_position_size: f64,
    /// Maximum total gross exposure as a multiple of equity (1.0 = fully
    /// invested, no leverage).
    pub max_leverage: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size: 1.0,
            max_leverage: 1.0,
        }
    }
}

impl RiskConfig {
    fn validate(&self) -> Result<(), RiskError> {
        if !(self.max_position_size > 0.0 && self.max_position_size <= 1.0) {
            return Err(RiskError::InvalidMaxPositionSize(self.max_position_size));
        }
        if !(0.0..=1.0).contains(&self.max_leverage) {
            return Err(RiskError::InvalidMaxLeverage(self.max_leverage));
        }
        Ok(())
    }
}

/// Cap each weight at `max_position_size`, then rescale the whole vector
/// down (never up) if total gross exposure exceeds `max_leverage`.
fn apply_caps(
    weights: &HashMap<String, f64>,
    config: &RiskConfig,
) -> Result<HashMap<String, f64>, RiskError> {
    let mut capped = HashMap::new();
    for (symbol, &w) in weights {
        if w < -1e-9 {
            return Err(RiskError::NegativeWeight {
                symbol: symbol.clone(),
                weight: w,
            });
        }
        capped.insert(symbol.clone(), w.min(config.max_position_size));
    }

    let gross: f64 = capped.values().sum();
    if gross > config.max_leverage && gross > 1e-12 {
        let scale = config.max_leverage / gross;
        for w in capped.values_mut() {
            *w *= scale;
        }
    }

    Ok(capped)
}

/// Convert a dollar allocation into a share quantity, rounding down to
/// whole shares unless the asset allows fractional units.
fn shares_for_allocation(dollars: f64, price: f64, allows_fractional: bool) -> f64 {
    if price <= 0.0 || !price.is_finite() {
        return 0.0;
    }
    let raw = dollars / price;
    if allows_fractional {
        raw.max(0.0)
    } else {
        raw.floor().max(0.0)
    }
}

/// Compute the order list needed to move `portfolio` from its current
/// holdings to `target_weights`, given current `prices` and `equity`.
///
/// Symbols present in the portfolio but absent from `target_weights` are
/// fully liquidated. Orders are returned in sorted-symbol order for
/// determinism.
pub fn size_orders(
    portfolio: &Portfolio,
    target_weights: &HashMap<String, f64>,
    prices: &HashMap<String, f64>,
    assets: &HashMap<String, AssetMetadata>,
    equity: f64,
    config: &RiskConfig,
) -> Result<Vec<Order>, RiskError> {
    config.validate()?;
    let capped = apply_caps(target_weights, config)?;

    let mut symbols: Vec<String> = capped.keys().cloned().collect();
    for held in portfolio.positions.keys() {
        if !capped.contains_key(held) && portfolio.has_position(held) {
            symbols.push(held.clone());
        }
    }
    symbols.sort();
    symbols.dedup();

    let mut orders = Vec::new();

    for symbol in symbols {
        let target_weight = capped.get(&symbol).copied().unwrap_or(0.0);
        let price = prices.get(&symbol).copied().unwrap_or(0.0);
        let current_quantity = portfolio
            .get_position(&symbol)
            .map(|p| p.quantity)
            .unwrap_or(0.0);

        if target_weight <= 0.0 {
            if current_quantity > 0.0 {
                orders.push(Order::sell(symbol.clone(), current_quantity));
            }
            continue;
        }

        let allows_fractional = assets
            .get(&symbol)
            .map(|a| a.allows_fractional())
            .unwrap_or(false);
        let target_dollars = target_weight * equity;
        let target_quantity = shares_for_allocation(target_dollars, price, allows_fractional);
        let delta = target_quantity - current_quantity;

        if delta.abs() < 1e-9 {
            continue;
        }
        if delta > 0.0 {
            orders.push(Order::buy(symbol, delta));
        } else {
            orders.push(Order::sell(symbol, -delta));
        }
    }

    Ok(orders)
}
