use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use wareflow_core::{AggregateId, TenantId};
use wareflow_events::EventEnvelope;
use wareflow_ledger::{StockLedgerEvent, StockLedgerId};
use wareflow_locations::{BinId, WarehouseId};
use wareflow_products::ProductId;

use crate::read_model::TenantStore;

/// Queryable stock read model: current quantities per (product, bin).
///
/// Zero rows are kept once created, mirroring the ledger's audit-continuity
/// rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub bin_id: BinId,
    pub warehouse_id: WarehouseId,
    pub available: i64,
    pub reserved: i64,
}

/// Tenant+aggregate cursor to support at-least-once delivery (idempotent projection).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

#[derive(Debug, Error)]
pub enum StockProjectionError {
    #[error("failed to deserialize ledger event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Stock levels projection.
///
/// Consumes published stock ledger envelopes and maintains a tenant-isolated
/// read model keyed by (product, bin). Disposable and rebuildable from the
/// event stream.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: TenantStore<(ProductId, BinId), StockLevel>,
{
    store: S,
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl<S> StockLevelsProjection<S>
where
    S: TenantStore<(ProductId, BinId), StockLevel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Query read model for one tenant + (product, bin) pair.
    pub fn get(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        bin_id: BinId,
    ) -> Option<StockLevel> {
        self.store.get(tenant_id, &(product_id, bin_id))
    }

    /// List all stock rows for a tenant.
    pub fn list(&self, tenant_id: TenantId) -> Vec<StockLevel> {
        self.store.list(tenant_id)
    }

    /// List stock rows for one warehouse.
    pub fn list_for_warehouse(
        &self,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
    ) -> Vec<StockLevel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .filter(|s| s.warehouse_id == warehouse_id)
            .collect()
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces tenant isolation
    /// - Enforces monotonic sequence per (tenant, aggregate) stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockProjectionError> {
        let tenant_id = envelope.tenant_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let key = CursorKey {
                tenant_id,
                aggregate_id,
            };
            let last = *cursors.get(&key).unwrap_or(&0);

            if seq == 0 {
                return Err(StockProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(StockProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let ev: StockLedgerEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| StockProjectionError::Deserialize(e.to_string()))?;

            let (event_tenant, warehouse_id) = match &ev {
                StockLedgerEvent::DeltasApplied(e) => (e.tenant_id, e.warehouse_id),
                StockLedgerEvent::StockReserved(e) => (e.tenant_id, e.warehouse_id),
                StockLedgerEvent::ReservationReleased(e) => (e.tenant_id, e.warehouse_id),
            };

            if event_tenant != tenant_id {
                return Err(StockProjectionError::TenantIsolation(
                    "event tenant_id does not match envelope tenant_id".to_string(),
                ));
            }

            if StockLedgerId::for_warehouse(warehouse_id).0 != aggregate_id {
                return Err(StockProjectionError::TenantIsolation(
                    "event warehouse_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match ev {
                StockLedgerEvent::DeltasApplied(e) => {
                    for d in &e.deltas {
                        let mut row = self
                            .store
                            .get(tenant_id, &(d.product_id, d.bin_id))
                            .unwrap_or(StockLevel {
                                product_id: d.product_id,
                                bin_id: d.bin_id,
                                warehouse_id,
                                available: 0,
                                reserved: 0,
                            });
                        row.available += d.quantity_change;
                        self.store.upsert(tenant_id, (d.product_id, d.bin_id), row);
                    }
                }
                StockLedgerEvent::StockReserved(e) => {
                    let mut row = self
                        .store
                        .get(tenant_id, &(e.product_id, e.bin_id))
                        .unwrap_or(StockLevel {
                            product_id: e.product_id,
                            bin_id: e.bin_id,
                            warehouse_id,
                            available: 0,
                            reserved: 0,
                        });
                    row.available -= e.quantity;
                    row.reserved += e.quantity;
                    self.store.upsert(tenant_id, (e.product_id, e.bin_id), row);
                }
                StockLedgerEvent::ReservationReleased(e) => {
                    let mut row = self
                        .store
                        .get(tenant_id, &(e.product_id, e.bin_id))
                        .unwrap_or(StockLevel {
                            product_id: e.product_id,
                            bin_id: e.bin_id,
                            warehouse_id,
                            available: 0,
                            reserved: 0,
                        });
                    row.reserved -= e.quantity;
                    row.available += e.quantity;
                    self.store.upsert(tenant_id, (e.product_id, e.bin_id), row);
                }
            }

            // Advance cursor after successful apply.
            cursors.insert(key, seq);
        }

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), StockProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }

        let mut envs: Vec<_> = envelopes.into_iter().collect();

        // Clear read model per tenant before rebuilding.
        {
            let mut tenants = envs.iter().map(|e| e.tenant_id()).collect::<Vec<_>>();
            tenants.sort_by_key(|t| *t.as_uuid().as_bytes());
            tenants.dedup();
            for t in tenants {
                self.store.clear_tenant(t);
            }
        }

        // Deterministic replay order: tenant, aggregate, sequence.
        envs.sort_by_key(|e| {
            (
                *e.tenant_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
