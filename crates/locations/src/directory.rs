//! Read-oriented directory over the location hierarchy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use wareflow_core::TenantId;

use crate::bin::{Bin, Zone};
use crate::ids::{BinId, WarehouseId, ZoneId};

/// Tenant-scoped lookup over bins and zones.
///
/// `register_*` is the seam through which the external hierarchy manager
/// publishes records; the engine itself only ever reads.
pub trait LocationDirectory: Send + Sync {
    fn bin(&self, tenant_id: TenantId, bin_id: &BinId) -> Option<Bin>;
    fn bins_in_warehouse(&self, tenant_id: TenantId, warehouse_id: &WarehouseId) -> Vec<Bin>;
    fn zone(&self, tenant_id: TenantId, zone_id: &ZoneId) -> Option<Zone>;
    fn register_bin(&self, tenant_id: TenantId, bin: Bin);
    fn register_zone(&self, tenant_id: TenantId, zone: Zone);
}

impl<D> LocationDirectory for Arc<D>
where
    D: LocationDirectory + ?Sized,
{
    fn bin(&self, tenant_id: TenantId, bin_id: &BinId) -> Option<Bin> {
        (**self).bin(tenant_id, bin_id)
    }

    fn bins_in_warehouse(&self, tenant_id: TenantId, warehouse_id: &WarehouseId) -> Vec<Bin> {
        (**self).bins_in_warehouse(tenant_id, warehouse_id)
    }

    fn zone(&self, tenant_id: TenantId, zone_id: &ZoneId) -> Option<Zone> {
        (**self).zone(tenant_id, zone_id)
    }

    fn register_bin(&self, tenant_id: TenantId, bin: Bin) {
        (**self).register_bin(tenant_id, bin)
    }

    fn register_zone(&self, tenant_id: TenantId, zone: Zone) {
        (**self).register_zone(tenant_id, zone)
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryLocationDirectory {
    bins: RwLock<HashMap<(TenantId, BinId), Bin>>,
    zones: RwLock<HashMap<(TenantId, ZoneId), Zone>>,
}

impl InMemoryLocationDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationDirectory for InMemoryLocationDirectory {
    fn bin(&self, tenant_id: TenantId, bin_id: &BinId) -> Option<Bin> {
        let map = self.bins.read().ok()?;
        map.get(&(tenant_id, *bin_id)).cloned()
    }

    fn bins_in_warehouse(&self, tenant_id: TenantId, warehouse_id: &WarehouseId) -> Vec<Bin> {
        let map = match self.bins.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        let mut bins: Vec<Bin> = map
            .iter()
            .filter_map(|((t, _), b)| {
                (*t == tenant_id && b.path.warehouse_id == *warehouse_id).then(|| b.clone())
            })
            .collect();

        // Stable order keeps downstream scoring reproducible.
        bins.sort_by_key(|b| *b.bin_id.0.as_uuid());
        bins
    }

    fn zone(&self, tenant_id: TenantId, zone_id: &ZoneId) -> Option<Zone> {
        let map = self.zones.read().ok()?;
        map.get(&(tenant_id, *zone_id)).cloned()
    }

    fn register_bin(&self, tenant_id: TenantId, bin: Bin) {
        if let Ok(mut map) = self.bins.write() {
            map.insert((tenant_id, bin.bin_id), bin);
        }
    }

    fn register_zone(&self, tenant_id: TenantId, zone: Zone) {
        if let Ok(mut map) = self.zones.write() {
            map.insert((tenant_id, zone.zone_id), zone);
        }
    }
}
