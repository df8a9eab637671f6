//! `wareflow-products` — product master data (read-only collaborator).
//!
//! Products are owned by master-data management outside this engine. The
//! reconciliation workflow and allocation scorer only ever read them, so the
//! crate exposes a registry contract plus the value types the engine needs
//! (SKU, expiry flag, temperature requirement), not a lifecycle aggregate.

pub mod catalog;
pub mod product;
pub mod temperature;

pub use catalog::{InMemoryProductCatalog, ProductCatalog};
pub use product::{Product, ProductId};
pub use temperature::TemperatureRange;
