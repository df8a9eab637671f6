//! Typed identifiers for each level of the hierarchy.

use serde::{Deserialize, Serialize};

use wareflow_core::AggregateId;

macro_rules! impl_location_id {
    ($(#[$doc:meta])* $t:ident) => {
        $(#[$doc])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(pub AggregateId);

        impl $t {
            pub fn new(id: AggregateId) -> Self {
                Self(id)
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

impl_location_id!(
    /// Identifier of a warehouse (root of the hierarchy, and the ledger's
    /// consistency boundary).
    WarehouseId
);
impl_location_id!(
    /// Identifier of a zone (carries the maintained temperature range).
    ZoneId
);
impl_location_id!(
    /// Identifier of an aisle.
    AisleId
);
impl_location_id!(
    /// Identifier of a shelf.
    ShelfId
);
impl_location_id!(
    /// Identifier of a bin — the smallest addressable storage location.
    BinId
);
