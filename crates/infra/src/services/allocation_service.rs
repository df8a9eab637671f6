//! Putaway suggestion service.
//!
//! Assembles the scorer's inputs from the product catalog, the location
//! directory, and a fresh ledger read, then delegates to the pure scorer.
//! Read-only: the caller writes the putaway result back through the ledger's
//! delta interface if the suggestion is accepted.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use wareflow_allocation::{suggest_bin, AllocationError, BinSnapshot, BinSuggestion};
use wareflow_core::TenantId;
use wareflow_events::{EventBus, EventEnvelope};
use wareflow_ledger::{StockLedger, StockLedgerId};
use wareflow_locations::{LocationDirectory, WarehouseId};
use wareflow_products::{ProductCatalog, ProductId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

#[derive(Debug, Error)]
pub enum AllocationServiceError {
    #[error("product not found")]
    ProductNotFound,

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("failed to read ledger state: {0}")]
    Ledger(String),
}

/// Bin allocation service.
pub struct AllocationService<S, B, C, D> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    catalog: C,
    directory: D,
}

impl<S, B, C, D> AllocationService<S, B, C, D>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    C: ProductCatalog,
    D: LocationDirectory,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, catalog: C, directory: D) -> Self {
        Self {
            dispatcher,
            catalog,
            directory,
        }
    }

    /// Suggest the best bin in `warehouse_id` for `quantity` units of
    /// `product_id`. Pure read: two calls against unchanged state return the
    /// same bin.
    pub fn suggest(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
    ) -> Result<BinSuggestion, AllocationServiceError> {
        let product = self
            .catalog
            .get(tenant_id, &product_id)
            .ok_or(AllocationServiceError::ProductNotFound)?;

        let ledger_id = StockLedgerId::for_warehouse(warehouse_id);
        let ledger: StockLedger = self
            .dispatcher
            .load(tenant_id, ledger_id.0, |_, _| StockLedger::empty(ledger_id))
            .map_err(|e: DispatchError| AllocationServiceError::Ledger(format!("{e:?}")))?;

        let snapshots: Vec<BinSnapshot> = self
            .directory
            .bins_in_warehouse(tenant_id, &warehouse_id)
            .into_iter()
            .map(|bin| {
                let zone_temperature = self
                    .directory
                    .zone(tenant_id, &bin.path.zone_id)
                    .and_then(|z| z.temperature_range);
                BinSnapshot {
                    occupancy: ledger.bin_occupancy(bin.bin_id),
                    product_quantity: ledger.available(product_id, bin.bin_id),
                    zone_temperature,
                    bin,
                }
            })
            .collect();

        debug!(
            %product_id,
            %warehouse_id,
            quantity,
            bins = snapshots.len(),
            "scoring putaway candidates"
        );

        Ok(suggest_bin(&product, quantity, &snapshots)?)
    }
}
