//! Infrastructure wiring for the HTTP layer.
//!
//! Event store + bus + dispatcher, the two projections, and the domain
//! services, all in-memory. A background subscriber drains the bus into the
//! projections and fans tenant-scoped notifications out to SSE clients.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use wareflow_core::TenantId;
use wareflow_events::{EventBus, EventEnvelope, InMemoryEventBus};
use wareflow_infra::{
    command_dispatcher::CommandDispatcher,
    event_store::InMemoryEventStore,
    projections::{BatchReadModel, BatchesProjection, StockLevel, StockLevelsProjection},
    read_model::InMemoryTenantStore,
    services::{AllocationService, ReconciliationService},
};
use wareflow_locations::{BinId, InMemoryLocationDirectory};
use wareflow_products::{InMemoryProductCatalog, ProductId};
use wareflow_reconciliation::BatchId;

/// Realtime message broadcasted via SSE.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RealtimeMessage {
    pub tenant_id: TenantId,
    pub topic: String,
    pub payload: serde_json::Value,
}

pub type ApiStore = Arc<InMemoryEventStore>;
pub type ApiBus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;
pub type ApiDispatcher = CommandDispatcher<ApiStore, ApiBus>;

type StockLevels =
    StockLevelsProjection<Arc<InMemoryTenantStore<(ProductId, BinId), StockLevel>>>;
type Batches = BatchesProjection<Arc<InMemoryTenantStore<BatchId, BatchReadModel>>>;

pub struct AppServices {
    pub reconciliation: ReconciliationService<ApiStore, ApiBus>,
    pub allocation:
        AllocationService<ApiStore, ApiBus, Arc<InMemoryProductCatalog>, Arc<InMemoryLocationDirectory>>,
    pub catalog: Arc<InMemoryProductCatalog>,
    pub directory: Arc<InMemoryLocationDirectory>,
    pub stock_levels: Arc<StockLevels>,
    pub batches: Arc<Batches>,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        &self.realtime_tx
    }
}

pub fn build_services() -> AppServices {
    let store: ApiStore = Arc::new(InMemoryEventStore::new());
    let bus: ApiBus = Arc::new(InMemoryEventBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(store, bus.clone()));

    let catalog = Arc::new(InMemoryProductCatalog::new());
    let directory = Arc::new(InMemoryLocationDirectory::new());

    let stock_levels: Arc<StockLevels> = Arc::new(StockLevelsProjection::new(Arc::new(
        InMemoryTenantStore::new(),
    )));
    let batches: Arc<Batches> = Arc::new(BatchesProjection::new(Arc::new(InMemoryTenantStore::new())));

    // Realtime channel (SSE): lossy broadcast, tenant-filtered in handlers.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Background subscriber: bus -> projections -> realtime notifications.
    {
        let sub = bus.subscribe();
        let stock_levels = stock_levels.clone();
        let batches = batches.clone();
        let realtime_tx = realtime_tx.clone();
        tokio::task::spawn_blocking(move || {
            while let Ok(env) = sub.recv() {
                let applied = match env.aggregate_type() {
                    "ledger.stock" => stock_levels.apply_envelope(&env).map_err(|e| format!("{e:?}")),
                    "reconciliation.batch" => batches.apply_envelope(&env).map_err(|e| format!("{e:?}")),
                    other => Err(format!("no projection for aggregate_type {other}")),
                };

                if let Err(e) = applied {
                    tracing::error!(error = %e, "projection update failed");
                    continue;
                }

                let _ = realtime_tx.send(RealtimeMessage {
                    tenant_id: env.tenant_id(),
                    topic: env.aggregate_type().to_string(),
                    payload: serde_json::json!({
                        "aggregate_id": env.aggregate_id().to_string(),
                        "sequence_number": env.sequence_number(),
                        "event": env.payload(),
                    }),
                });
            }
        });
    }

    AppServices {
        reconciliation: ReconciliationService::new(dispatcher.clone()),
        allocation: AllocationService::new(dispatcher, catalog.clone(), directory.clone()),
        catalog,
        directory,
        stock_levels,
        batches,
        realtime_tx,
    }
}

/// Tenant-filtered stream of projection updates.
pub fn tenant_sse_stream(
    services: Arc<AppServices>,
    tenant_id: TenantId,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(m) if m.tenant_id == tenant_id => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        _ => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
