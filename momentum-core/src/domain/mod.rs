//! Domain types: the plain value records shared by every component.

pub mod bar;
pub mod ids;
pub mod instrument;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use ids::{ConfigHash, DatasetHash, FullHash, RunId};
pub use instrument::{AssetClass, AssetMetadata};
pub use order::{Order, OrderSide};
pub use portfolio::Portfolio;
pub use position::{Position, PositionSide};
pub use trade::Trade;

/// Symbol type alias.
pub type Symbol = String;
