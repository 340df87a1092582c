//! Panel alignment.

pub mod align;

pub use align::{AlignError, AlignedPanel};
