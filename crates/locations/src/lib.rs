//! `wareflow-locations` — warehouse location hierarchy (read-only collaborator).
//!
//! Warehouse → Zone → Aisle → Shelf → Bin. Hierarchy CRUD belongs to the
//! external location manager; this crate carries the typed ids, the bin/zone
//! records the engine reads, and the directory contract it reads them through.
//! Bins keep a denormalized path so a suggestion can pre-fill a cascading
//! location selector without walking the tree.

pub mod bin;
pub mod directory;
pub mod ids;

pub use bin::{Bin, BinPath, Zone};
pub use directory::{InMemoryLocationDirectory, LocationDirectory};
pub use ids::{AisleId, BinId, ShelfId, WarehouseId, ZoneId};
