use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use wareflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, StockShortfall, TenantId,
};
use wareflow_events::Event;
use wareflow_locations::{BinId, WarehouseId};
use wareflow_products::ProductId;

/// Stock ledger identifier. One ledger stream exists per warehouse, so the
/// stream id is derived directly from the warehouse id.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockLedgerId(pub AggregateId);

impl StockLedgerId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    pub fn for_warehouse(warehouse_id: WarehouseId) -> Self {
        Self(warehouse_id.0)
    }
}

impl core::fmt::Display for StockLedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Per-(product, bin) quantities.
///
/// Invariant: both fields are `>= 0` at all observable times. Entries are
/// created lazily on first placement and never removed; a zero row is kept
/// for audit continuity.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub available: i64,
    pub reserved: i64,
}

/// One requested change to a (product, bin) availability.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub product_id: ProductId,
    pub bin_id: BinId,
    pub quantity_change: i64,
}

/// Aggregate root: StockLedger (all stock entries of one warehouse).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLedger {
    id: StockLedgerId,
    tenant_id: Option<TenantId>,
    entries: HashMap<(ProductId, BinId), LedgerEntry>,
    version: u64,
}

impl StockLedger {
    /// Create an empty aggregate instance for rehydration.
    ///
    /// A ledger has no explicit "create" command; the first applied delta
    /// batch brings the stream into existence.
    pub fn empty(id: StockLedgerId) -> Self {
        Self {
            id,
            tenant_id: None,
            entries: HashMap::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> StockLedgerId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Point read of one entry; absent entries read as zero.
    pub fn quantity(&self, product_id: ProductId, bin_id: BinId) -> LedgerEntry {
        self.entries
            .get(&(product_id, bin_id))
            .copied()
            .unwrap_or_default()
    }

    /// Available quantity of one product in one bin.
    pub fn available(&self, product_id: ProductId, bin_id: BinId) -> i64 {
        self.quantity(product_id, bin_id).available
    }

    /// Total available quantity in a bin across all products (bin occupancy).
    pub fn bin_occupancy(&self, bin_id: BinId) -> i64 {
        self.entries
            .iter()
            .filter(|((_, b), _)| *b == bin_id)
            .map(|(_, e)| e.available)
            .sum()
    }

    /// All entries, including zero rows.
    pub fn entries(&self) -> impl Iterator<Item = (&(ProductId, BinId), &LedgerEntry)> {
        self.entries.iter()
    }
}

impl AggregateRoot for StockLedger {
    type Id = StockLedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ApplyDeltas — atomically shift availability on a set of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyDeltas {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub deltas: Vec<StockDelta>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Reserve — move quantity from available to reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub bin_id: BinId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Release — return reserved quantity to available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub bin_id: BinId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockLedgerCommand {
    ApplyDeltas(ApplyDeltas),
    Reserve(Reserve),
    Release(Release),
}

/// Event: DeltasApplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltasApplied {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub deltas: Vec<StockDelta>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReserved {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub bin_id: BinId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationReleased {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub product_id: ProductId,
    pub bin_id: BinId,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockLedgerEvent {
    DeltasApplied(DeltasApplied),
    StockReserved(StockReserved),
    ReservationReleased(ReservationReleased),
}

impl Event for StockLedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockLedgerEvent::DeltasApplied(_) => "ledger.stock.deltas_applied",
            StockLedgerEvent::StockReserved(_) => "ledger.stock.reserved",
            StockLedgerEvent::ReservationReleased(_) => "ledger.stock.reservation_released",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockLedgerEvent::DeltasApplied(e) => e.occurred_at,
            StockLedgerEvent::StockReserved(e) => e.occurred_at,
            StockLedgerEvent::ReservationReleased(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockLedger {
    type Command = StockLedgerCommand;
    type Event = StockLedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            StockLedgerEvent::DeltasApplied(e) => {
                self.tenant_id = Some(e.tenant_id);
                for d in &e.deltas {
                    let entry = self.entries.entry((d.product_id, d.bin_id)).or_default();
                    entry.available += d.quantity_change;
                }
            }
            StockLedgerEvent::StockReserved(e) => {
                self.tenant_id = Some(e.tenant_id);
                let entry = self.entries.entry((e.product_id, e.bin_id)).or_default();
                entry.available -= e.quantity;
                entry.reserved += e.quantity;
            }
            StockLedgerEvent::ReservationReleased(e) => {
                self.tenant_id = Some(e.tenant_id);
                let entry = self.entries.entry((e.product_id, e.bin_id)).or_default();
                entry.reserved -= e.quantity;
                entry.available += e.quantity;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            StockLedgerCommand::ApplyDeltas(cmd) => self.handle_apply(cmd),
            StockLedgerCommand::Reserve(cmd) => self.handle_reserve(cmd),
            StockLedgerCommand::Release(cmd) => self.handle_release(cmd),
        }
    }
}

impl StockLedger {
    fn ensure_tenant(&self, tenant_id: TenantId) -> Result<(), DomainError> {
        match self.tenant_id {
            Some(t) if t != tenant_id => Err(DomainError::invariant("tenant mismatch")),
            _ => Ok(()),
        }
    }

    fn ensure_warehouse(&self, warehouse_id: WarehouseId) -> Result<(), DomainError> {
        if StockLedgerId::for_warehouse(warehouse_id) != self.id {
            return Err(DomainError::invariant("warehouse_id mismatch"));
        }
        Ok(())
    }

    fn handle_apply(&self, cmd: &ApplyDeltas) -> Result<Vec<StockLedgerEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_warehouse(cmd.warehouse_id)?;

        // Zero lines are legal input (an approval where stock did not move)
        // but carry no information; drop them before validating.
        let deltas: Vec<StockDelta> = cmd
            .deltas
            .iter()
            .copied()
            .filter(|d| d.quantity_change != 0)
            .collect();

        if deltas.is_empty() {
            return Ok(vec![]);
        }

        // Validate the cumulative effect per (product, bin) pair so a batch
        // repeating a pair cannot sneak past the non-negativity check.
        let mut net: HashMap<(ProductId, BinId), i64> = HashMap::new();
        for d in &deltas {
            *net.entry((d.product_id, d.bin_id)).or_insert(0) += d.quantity_change;
        }

        let mut shortfalls: Vec<StockShortfall> = net
            .iter()
            .filter_map(|(&(product_id, bin_id), &change)| {
                let available = self.available(product_id, bin_id);
                (available + change < 0).then_some(StockShortfall {
                    product_id: product_id.0,
                    bin_id: bin_id.0,
                    requested: change,
                    available,
                })
            })
            .collect();

        if !shortfalls.is_empty() {
            shortfalls.sort_by_key(|s| (*s.product_id.as_uuid(), *s.bin_id.as_uuid()));
            return Err(DomainError::InsufficientStock(shortfalls));
        }

        Ok(vec![StockLedgerEvent::DeltasApplied(DeltasApplied {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            deltas,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &Reserve) -> Result<Vec<StockLedgerEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_warehouse(cmd.warehouse_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("reserve quantity must be positive"));
        }

        let available = self.available(cmd.product_id, cmd.bin_id);
        if available < cmd.quantity {
            return Err(DomainError::InsufficientStock(vec![StockShortfall {
                product_id: cmd.product_id.0,
                bin_id: cmd.bin_id.0,
                requested: -cmd.quantity,
                available,
            }]));
        }

        Ok(vec![StockLedgerEvent::StockReserved(StockReserved {
            tenant_id: cmd.tenant_id,
            warehouse_id: cmd.warehouse_id,
            product_id: cmd.product_id,
            bin_id: cmd.bin_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &Release) -> Result<Vec<StockLedgerEvent>, DomainError> {
        self.ensure_tenant(cmd.tenant_id)?;
        self.ensure_warehouse(cmd.warehouse_id)?;

        if cmd.quantity <= 0 {
            return Err(DomainError::validation("release quantity must be positive"));
        }

        let reserved = self.quantity(cmd.product_id, cmd.bin_id).reserved;
        if reserved < cmd.quantity {
            return Err(DomainError::invariant(format!(
                "release of {} exceeds reserved quantity {}",
                cmd.quantity, reserved
            )));
        }

        Ok(vec![StockLedgerEvent::ReservationReleased(
            ReservationReleased {
                tenant_id: cmd.tenant_id,
                warehouse_id: cmd.warehouse_id,
                product_id: cmd.product_id,
                bin_id: cmd.bin_id,
                quantity: cmd.quantity,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
