//! Projection implementations (read model builders).
//!
//! Projections consume published envelopes and build query-optimized read
//! models. All projections are rebuildable from the event stream,
//! tenant-isolated, and idempotent under at-least-once delivery.

pub mod batches;
pub mod stock_levels;

pub use batches::{BatchReadModel, BatchesProjection, BatchProjectionError};
pub use stock_levels::{StockLevel, StockLevelsProjection, StockProjectionError};
