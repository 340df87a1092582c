//! Momentum Core — a deterministic, event-driven backtesting engine for
//! momentum-based portfolio strategies.
//!
//! This crate contains:
//! - Domain types (bars, orders, positions, trades, instruments)
//! - Multi-symbol calendar alignment
//! - Momentum indicators and the momentum strategy
//! - Portfolio optimizers (equal weight through hierarchical risk parity)
//! - A risk manager that turns target weights into sized orders
//! - The bar-by-bar simulation engine
//! - Performance metrics
//! - Deterministic run fingerprinting and RNG seeding

pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod metrics;
pub mod optimizer;
pub mod rng;
pub mod risk;
pub mod strategy;
