use serde::{Deserialize, Serialize};

use wareflow_core::{DomainError, Entity, ValueObject};
use wareflow_products::TemperatureRange;

use crate::ids::{AisleId, BinId, ShelfId, WarehouseId, ZoneId};

/// Denormalized ancestry of a bin, warehouse down to shelf.
///
/// Stored on the bin itself so lookups and suggestion responses never need to
/// traverse the tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinPath {
    pub warehouse_id: WarehouseId,
    pub zone_id: ZoneId,
    pub aisle_id: AisleId,
    pub shelf_id: ShelfId,
}

impl ValueObject for BinPath {}

/// Leaf storage location.
///
/// Immutable once ledger rows reference it, except capacity edits performed
/// by the external hierarchy manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    pub bin_id: BinId,
    /// Human-readable label (e.g. "A-01-03-2").
    pub code: String,
    pub path: BinPath,
    /// Maximum quantity units the bin can hold, across all products.
    pub capacity: i64,
}

impl Bin {
    pub fn new(
        bin_id: BinId,
        code: impl Into<String>,
        path: BinPath,
        capacity: i64,
    ) -> Result<Self, DomainError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("bin code cannot be empty"));
        }
        if capacity <= 0 {
            return Err(DomainError::validation("bin capacity must be positive"));
        }
        Ok(Self {
            bin_id,
            code,
            path,
            capacity,
        })
    }
}

impl Entity for Bin {
    type Id = BinId;

    fn id(&self) -> &Self::Id {
        &self.bin_id
    }
}

/// Zone record: the hierarchy level that owns a temperature regime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub zone_id: ZoneId,
    pub warehouse_id: WarehouseId,
    pub name: String,
    /// `None` means ambient, uncontrolled storage.
    pub temperature_range: Option<TemperatureRange>,
}

impl Entity for Zone {
    type Id = ZoneId;

    fn id(&self) -> &Self::Id {
        &self.zone_id
    }
}
