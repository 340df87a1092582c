//! The simulation engine: warm-up gating, order execution/accounting, and
//! the bar-by-bar control loop (spec §4.6).

pub mod accounting;
pub mod event_loop;
pub mod state;
pub mod warmup;

pub use accounting::EquityPoint;
pub use event_loop::{run, EngineError};
pub use state::{BacktestResult, EngineConfig, ExecutionConfig, SkippedSignal};
pub use warmup::WarmupState;
