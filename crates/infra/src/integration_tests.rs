//! Integration tests for the full engine pipeline.
//!
//! Command → EventStore → EventBus → Projections → ReadModels, plus the
//! reconciliation and allocation services on top.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use uuid::Uuid;

    use wareflow_allocation::AllocationError;
    use wareflow_core::{AggregateId, ExpectedVersion, TenantId, UserId};
    use wareflow_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use wareflow_ledger::stock::DeltasApplied;
    use wareflow_ledger::{StockDelta, StockLedgerEvent, StockLedgerId};
    use wareflow_locations::{
        AisleId, Bin, BinId, BinPath, InMemoryLocationDirectory, LocationDirectory, ShelfId,
        WarehouseId, Zone, ZoneId,
    };
    use wareflow_products::{
        InMemoryProductCatalog, Product, ProductCatalog, ProductId, TemperatureRange,
    };
    use wareflow_reconciliation::{BatchKind, BatchStatus, ReasonCode};

    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::{
        EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent,
    };
    use crate::projections::{BatchesProjection, StockLevelsProjection};
    use crate::read_model::InMemoryTenantStore;
    use crate::services::reconciliation_service::LEDGER_AGGREGATE_TYPE;
    use crate::services::{
        AllocationService, AllocationServiceError, CycleCountScope, NewBatchLine,
        ReconciliationService,
    };

    type Bus = Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>;
    type Dispatcher = Arc<CommandDispatcher<InMemoryEventStore, Bus>>;

    struct Harness {
        dispatcher: Dispatcher,
        recon: ReconciliationService<InMemoryEventStore, Bus>,
        allocation:
            AllocationService<InMemoryEventStore, Bus, Arc<InMemoryProductCatalog>, Arc<InMemoryLocationDirectory>>,
        catalog: Arc<InMemoryProductCatalog>,
        directory: Arc<InMemoryLocationDirectory>,
        stock_levels: Arc<
            StockLevelsProjection<
                Arc<InMemoryTenantStore<(ProductId, BinId), crate::projections::StockLevel>>,
            >,
        >,
        batches: Arc<
            BatchesProjection<
                Arc<InMemoryTenantStore<wareflow_reconciliation::BatchId, crate::projections::BatchReadModel>>,
            >,
        >,
    }

    fn setup() -> Harness {
        let store = InMemoryEventStore::new();
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher: Dispatcher = Arc::new(CommandDispatcher::new(store, bus.clone()));

        let catalog = Arc::new(InMemoryProductCatalog::new());
        let directory = Arc::new(InMemoryLocationDirectory::new());

        let stock_levels = Arc::new(StockLevelsProjection::new(Arc::new(
            InMemoryTenantStore::new(),
        )));
        let batches = Arc::new(BatchesProjection::new(Arc::new(InMemoryTenantStore::new())));

        // Subscribe to the bus BEFORE any events are published.
        let stock_levels_clone = stock_levels.clone();
        let batches_clone = batches.clone();
        let bus_clone = bus.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<()>();
        std::thread::spawn(move || {
            let sub = bus_clone.subscribe();
            let _ = ready_tx.send(());
            while let Ok(env) = sub.recv() {
                let result = match env.aggregate_type() {
                    "ledger.stock" => stock_levels_clone
                        .apply_envelope(&env)
                        .map_err(|e| format!("{e:?}")),
                    "reconciliation.batch" => batches_clone
                        .apply_envelope(&env)
                        .map_err(|e| format!("{e:?}")),
                    other => Err(format!("unexpected aggregate_type {other}")),
                };
                if let Err(e) = result {
                    eprintln!("failed to apply envelope: {e}");
                }
            }
        });
        let _ = ready_rx.recv_timeout(std::time::Duration::from_secs(1));

        Harness {
            dispatcher: dispatcher.clone(),
            recon: ReconciliationService::new(dispatcher.clone()),
            allocation: AllocationService::new(dispatcher, catalog.clone(), directory.clone()),
            catalog,
            directory,
            stock_levels,
            batches,
        }
    }

    fn wait_for_processing() {
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_user_id() -> UserId {
        UserId::new()
    }

    fn register_bin(
        h: &Harness,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        zone_id: ZoneId,
        code: &str,
        capacity: i64,
    ) -> BinId {
        let bin_id = BinId::new(AggregateId::new());
        let path = BinPath {
            warehouse_id,
            zone_id,
            aisle_id: AisleId::new(AggregateId::new()),
            shelf_id: ShelfId::new(AggregateId::new()),
        };
        h.directory
            .register_bin(tenant_id, Bin::new(bin_id, code, path, capacity).unwrap());
        bin_id
    }

    fn register_zone(
        h: &Harness,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        temperature: Option<TemperatureRange>,
    ) -> ZoneId {
        let zone_id = ZoneId::new(AggregateId::new());
        h.directory.register_zone(
            tenant_id,
            Zone {
                zone_id,
                warehouse_id,
                name: "Z".to_string(),
                temperature_range: temperature,
            },
        );
        zone_id
    }

    fn register_product(h: &Harness, tenant_id: TenantId, sku: &str) -> ProductId {
        let product_id = ProductId::new(AggregateId::new());
        h.catalog
            .register(tenant_id, Product::new(product_id, sku, sku).unwrap());
        product_id
    }

    fn seed_stock(
        h: &Harness,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        bin_id: BinId,
        quantity: i64,
    ) {
        h.recon
            .apply_deltas(
                tenant_id,
                warehouse_id,
                vec![StockDelta {
                    product_id,
                    bin_id,
                    quantity_change: quantity,
                }],
            )
            .unwrap();
    }

    #[test]
    fn adjustment_approval_applies_deltas_and_flips_status() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_id, warehouse_id, None);
        let product_id = register_product(&h, tenant_id, "SKU-1");
        let bin_id = register_bin(&h, tenant_id, warehouse_id, zone_id, "A-01", 500);

        seed_stock(&h, tenant_id, warehouse_id, product_id, bin_id, 100);

        let batch_id = h
            .recon
            .create_batch(
                tenant_id,
                test_user_id(),
                warehouse_id,
                BatchKind::Adjustment,
                vec![NewBatchLine {
                    product_id,
                    bin_id,
                    proposed_quantity: 80,
                    reason_code: Some(ReasonCode::Damaged),
                    notes: None,
                }],
                None,
                None,
            )
            .unwrap();

        h.recon.approve_batch(tenant_id, batch_id).unwrap();
        wait_for_processing();

        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_id, bin_id), 80);

        let rm = h.batches.get(tenant_id, &batch_id).unwrap();
        assert_eq!(rm.status, BatchStatus::Approved);
        assert_eq!(rm.applied_deltas.len(), 1);
        assert_eq!(rm.applied_deltas[0].quantity_change, -20);

        let stock = h.stock_levels.get(tenant_id, product_id, bin_id).unwrap();
        assert_eq!(stock.available, 80);
    }

    #[test]
    fn rejected_cycle_count_causes_no_ledger_change() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_id, warehouse_id, None);
        let product_id = register_product(&h, tenant_id, "SKU-2");
        let bin_id = register_bin(&h, tenant_id, warehouse_id, zone_id, "B-01", 500);

        seed_stock(&h, tenant_id, warehouse_id, product_id, bin_id, 50);

        let batch_id = h
            .recon
            .create_batch(
                tenant_id,
                test_user_id(),
                warehouse_id,
                BatchKind::CycleCount,
                vec![NewBatchLine {
                    product_id,
                    bin_id,
                    proposed_quantity: 45,
                    reason_code: Some(ReasonCode::Missing),
                    notes: None,
                }],
                None,
                None,
            )
            .unwrap();

        h.recon.reject_batch(tenant_id, batch_id).unwrap();

        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_id, bin_id), 50);

        // Terminal state: a later approval attempt is rejected.
        let err = h.recon.approve_batch(tenant_id, batch_id).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState(_)));
        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_id, bin_id), 50);
    }

    #[test]
    fn double_approval_is_rejected_and_does_not_reapply() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_id, warehouse_id, None);
        let product_id = register_product(&h, tenant_id, "SKU-3");
        let bin_id = register_bin(&h, tenant_id, warehouse_id, zone_id, "C-01", 500);

        seed_stock(&h, tenant_id, warehouse_id, product_id, bin_id, 100);

        let batch_id = h
            .recon
            .create_batch(
                tenant_id,
                test_user_id(),
                warehouse_id,
                BatchKind::Adjustment,
                vec![NewBatchLine {
                    product_id,
                    bin_id,
                    proposed_quantity: 90,
                    reason_code: Some(ReasonCode::Expired),
                    notes: None,
                }],
                None,
                None,
            )
            .unwrap();

        h.recon.approve_batch(tenant_id, batch_id).unwrap();
        let err = h.recon.approve_batch(tenant_id, batch_id).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState(_)));

        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_id, bin_id), 90);
    }

    #[test]
    fn approval_recomputes_deltas_from_fresh_ledger_reads() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_id, warehouse_id, None);
        let product_id = register_product(&h, tenant_id, "SKU-4");
        let bin_a = register_bin(&h, tenant_id, warehouse_id, zone_id, "D-01", 500);
        let bin_b = register_bin(&h, tenant_id, warehouse_id, zone_id, "D-02", 500);

        seed_stock(&h, tenant_id, warehouse_id, product_id, bin_a, 30);
        seed_stock(&h, tenant_id, warehouse_id, product_id, bin_b, 10);

        let batch_id = h
            .recon
            .create_batch(
                tenant_id,
                test_user_id(),
                warehouse_id,
                BatchKind::CycleCount,
                vec![
                    NewBatchLine {
                        product_id,
                        bin_id: bin_a,
                        proposed_quantity: 25,
                        reason_code: Some(ReasonCode::Missing),
                        notes: None,
                    },
                    NewBatchLine {
                        product_id,
                        bin_id: bin_b,
                        proposed_quantity: 8,
                        reason_code: Some(ReasonCode::Missing),
                        notes: None,
                    },
                ],
                None,
                None,
            )
            .unwrap();

        // Stock moves after proposal: bin_b is emptied by another writer.
        // The creation-time snapshot (10) is now stale.
        h.recon
            .apply_deltas(
                tenant_id,
                warehouse_id,
                vec![StockDelta {
                    product_id,
                    bin_id: bin_b,
                    quantity_change: -10,
                }],
            )
            .unwrap();

        h.recon.approve_batch(tenant_id, batch_id).unwrap();
        wait_for_processing();

        // Both lines land exactly on their counted quantities: bin_a via
        // delta -5, bin_b via delta +8 against its fresh value of 0 (the
        // stale snapshot would have produced -2 and gone negative).
        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_id, bin_a), 25);
        assert_eq!(ledger.available(product_id, bin_b), 8);

        let rm = h.batches.get(tenant_id, &batch_id).unwrap();
        assert_eq!(rm.status, BatchStatus::Approved);
        assert_eq!(rm.applied_deltas.len(), 2);
    }

    #[test]
    fn multi_line_approval_applies_all_lines_atomically() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_id, warehouse_id, None);
        let product_a = register_product(&h, tenant_id, "SKU-5A");
        let product_b = register_product(&h, tenant_id, "SKU-5B");
        let bin_id = register_bin(&h, tenant_id, warehouse_id, zone_id, "E-01", 500);

        seed_stock(&h, tenant_id, warehouse_id, product_a, bin_id, 100);
        seed_stock(&h, tenant_id, warehouse_id, product_b, bin_id, 5);

        let batch_id = h
            .recon
            .create_batch(
                tenant_id,
                test_user_id(),
                warehouse_id,
                BatchKind::Adjustment,
                vec![
                    NewBatchLine {
                        product_id: product_a,
                        bin_id,
                        proposed_quantity: 60,
                        reason_code: Some(ReasonCode::Damaged),
                        notes: None,
                    },
                    NewBatchLine {
                        product_id: product_b,
                        bin_id,
                        proposed_quantity: 0,
                        reason_code: Some(ReasonCode::Missing),
                        notes: None,
                    },
                ],
                None,
                None,
            )
            .unwrap();

        h.recon.approve_batch(tenant_id, batch_id).unwrap();
        wait_for_processing();

        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_a, bin_id), 60);
        assert_eq!(ledger.available(product_b, bin_id), 0);

        let rm = h.batches.get(tenant_id, &batch_id).unwrap();
        assert_eq!(rm.status, BatchStatus::Approved);
    }

    #[test]
    fn tenant_isolation_holds_across_ledger_and_batches() {
        let h = setup();
        let tenant_a = test_tenant_id();
        let tenant_b = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_a, warehouse_id, None);
        let product_id = register_product(&h, tenant_a, "SKU-6");
        let bin_id = register_bin(&h, tenant_a, warehouse_id, zone_id, "F-01", 500);

        seed_stock(&h, tenant_a, warehouse_id, product_id, bin_id, 40);

        // Tenant B sees an empty ledger for the same warehouse id.
        let ledger_b = h.recon.load_ledger(tenant_b, warehouse_id).unwrap();
        assert_eq!(ledger_b.available(product_id, bin_id), 0);

        let batch_id = h
            .recon
            .create_batch(
                tenant_a,
                test_user_id(),
                warehouse_id,
                BatchKind::Adjustment,
                vec![NewBatchLine {
                    product_id,
                    bin_id,
                    proposed_quantity: 38,
                    reason_code: Some(ReasonCode::Damaged),
                    notes: None,
                }],
                None,
                None,
            )
            .unwrap();

        // Tenant B cannot see or approve tenant A's batch.
        assert!(matches!(
            h.recon.load_batch(tenant_b, batch_id).unwrap_err(),
            DispatchError::NotFound
        ));
        assert!(matches!(
            h.recon.approve_batch(tenant_b, batch_id).unwrap_err(),
            DispatchError::NotFound
        ));
    }

    #[test]
    fn allocation_consolidation_bias_and_exclusions() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let ambient_zone = register_zone(&h, tenant_id, warehouse_id, None);
        let product_id = register_product(&h, tenant_id, "SKU-7");

        let bin_x = register_bin(&h, tenant_id, warehouse_id, ambient_zone, "X-01", 100);
        let bin_y = register_bin(&h, tenant_id, warehouse_id, ambient_zone, "Y-01", 100);

        // BIN-X already holds the product; equal remaining capacity.
        seed_stock(&h, tenant_id, warehouse_id, product_id, bin_x, 5);
        let filler = register_product(&h, tenant_id, "SKU-FILL");
        seed_stock(&h, tenant_id, warehouse_id, filler, bin_y, 5);

        let suggestion = h
            .allocation
            .suggest(tenant_id, product_id, warehouse_id, 10)
            .unwrap();
        assert_eq!(suggestion.bin_id, bin_x);

        // Determinism: same state, same answer.
        let again = h
            .allocation
            .suggest(tenant_id, product_id, warehouse_id, 10)
            .unwrap();
        assert_eq!(again.bin_id, suggestion.bin_id);
    }

    #[test]
    fn allocation_temperature_exclusion_yields_no_candidate() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let warm_zone = register_zone(
            &h,
            tenant_id,
            warehouse_id,
            Some(TemperatureRange::new(15, 25).unwrap()),
        );

        let product_id = ProductId::new(AggregateId::new());
        h.catalog.register(
            tenant_id,
            Product::new(product_id, "SKU-COLD", "Vaccine")
                .unwrap()
                .with_temperature_requirement(TemperatureRange::new(2, 8).unwrap()),
        );

        register_bin(&h, tenant_id, warehouse_id, warm_zone, "Z-01", 1000);

        let err = h
            .allocation
            .suggest(tenant_id, product_id, warehouse_id, 10)
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationServiceError::Allocation(AllocationError::NoCandidate)
        ));
    }

    #[test]
    fn allocation_unknown_product_is_not_found() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());

        let err = h
            .allocation
            .suggest(
                tenant_id,
                ProductId::new(AggregateId::new()),
                warehouse_id,
                1,
            )
            .unwrap_err();
        assert!(matches!(err, AllocationServiceError::ProductNotFound));
    }

    #[test]
    fn insufficient_stock_on_direct_deltas_reports_shortfall_lines() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_id, warehouse_id, None);
        let product_id = register_product(&h, tenant_id, "SKU-8");
        let bin_id = register_bin(&h, tenant_id, warehouse_id, zone_id, "G-01", 500);

        seed_stock(&h, tenant_id, warehouse_id, product_id, bin_id, 3);

        let err = h
            .recon
            .apply_deltas(
                tenant_id,
                warehouse_id,
                vec![StockDelta {
                    product_id,
                    bin_id,
                    quantity_change: -5,
                }],
            )
            .unwrap_err();

        match err {
            DispatchError::InsufficientStock(lines) => {
                assert_eq!(lines.len(), 1);
                assert_eq!(lines[0].available, 3);
                assert_eq!(lines[0].requested, -5);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_id, bin_id), 3);
    }

    #[test]
    fn stock_projection_rebuilds_from_the_event_store() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_id, warehouse_id, None);
        let product_id = register_product(&h, tenant_id, "SKU-RB");
        let bin_id = register_bin(&h, tenant_id, warehouse_id, zone_id, "H-01", 500);

        seed_stock(&h, tenant_id, warehouse_id, product_id, bin_id, 100);

        let batch_id = h
            .recon
            .create_batch(
                tenant_id,
                test_user_id(),
                warehouse_id,
                BatchKind::Adjustment,
                vec![NewBatchLine {
                    product_id,
                    bin_id,
                    proposed_quantity: 80,
                    reason_code: Some(ReasonCode::Damaged),
                    notes: None,
                }],
                None,
                None,
            )
            .unwrap();
        h.recon.approve_batch(tenant_id, batch_id).unwrap();
        wait_for_processing();

        // Replay the warehouse stream into a fresh projection; it must land
        // on the same rows as the live, bus-fed one.
        let ledger_id = StockLedgerId::for_warehouse(warehouse_id);
        let history = h
            .dispatcher
            .store()
            .load_stream(tenant_id, ledger_id.0)
            .unwrap();
        let envelopes: Vec<_> = history.iter().map(|e| e.to_envelope()).collect();

        let fresh = StockLevelsProjection::new(Arc::new(InMemoryTenantStore::new()));
        fresh.rebuild_from_scratch(envelopes).unwrap();

        let rebuilt = fresh.get(tenant_id, product_id, bin_id).unwrap();
        let live = h.stock_levels.get(tenant_id, product_id, bin_id).unwrap();
        assert_eq!(rebuilt, live);
        assert_eq!(rebuilt.available, 80);
    }

    #[test]
    fn cycle_count_scope_prepopulates_lines_from_the_ledger() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_id, warehouse_id, None);
        let product_a = register_product(&h, tenant_id, "SKU-9A");
        let product_b = register_product(&h, tenant_id, "SKU-9B");
        let bin_a = register_bin(&h, tenant_id, warehouse_id, zone_id, "J-01", 500);
        let bin_b = register_bin(&h, tenant_id, warehouse_id, zone_id, "J-02", 500);

        seed_stock(&h, tenant_id, warehouse_id, product_a, bin_a, 30);
        seed_stock(&h, tenant_id, warehouse_id, product_b, bin_a, 12);
        seed_stock(&h, tenant_id, warehouse_id, product_a, bin_b, 7);

        // Scope covers bin_a only; the hand-entered line for (product_a,
        // bin_a) wins over the scope for that pair.
        let batch_id = h
            .recon
            .create_cycle_count(
                tenant_id,
                test_user_id(),
                warehouse_id,
                Some(CycleCountScope {
                    bin_ids: vec![bin_a],
                    product_id: None,
                }),
                vec![NewBatchLine {
                    product_id: product_a,
                    bin_id: bin_a,
                    proposed_quantity: 28,
                    reason_code: Some(ReasonCode::Missing),
                    notes: None,
                }],
                None,
                None,
            )
            .unwrap();

        let batch = h.recon.load_batch(tenant_id, batch_id).unwrap();
        assert_eq!(batch.lines().len(), 2);

        let manual = batch
            .lines()
            .iter()
            .find(|l| l.product_id == product_a && l.bin_id == bin_a)
            .unwrap();
        assert_eq!(manual.proposed_quantity, 28);
        assert_eq!(manual.system_quantity, 30);

        // Scope-derived line defaults the count to the snapshot (zero
        // variance, so no reason code required).
        let derived = batch
            .lines()
            .iter()
            .find(|l| l.product_id == product_b && l.bin_id == bin_a)
            .unwrap();
        assert_eq!(derived.proposed_quantity, 12);
        assert_eq!(derived.system_quantity, 12);
        assert_eq!(derived.reason_code, None);

        // bin_b is outside the scope.
        assert!(!batch.lines().iter().any(|l| l.bin_id == bin_b));
    }

    #[test]
    fn cycle_count_scope_narrows_to_one_product() {
        let h = setup();
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let zone_id = register_zone(&h, tenant_id, warehouse_id, None);
        let product_a = register_product(&h, tenant_id, "SKU-10A");
        let product_b = register_product(&h, tenant_id, "SKU-10B");
        let bin_a = register_bin(&h, tenant_id, warehouse_id, zone_id, "K-01", 500);
        let bin_b = register_bin(&h, tenant_id, warehouse_id, zone_id, "K-02", 500);

        seed_stock(&h, tenant_id, warehouse_id, product_a, bin_a, 20);
        seed_stock(&h, tenant_id, warehouse_id, product_b, bin_a, 9);
        seed_stock(&h, tenant_id, warehouse_id, product_a, bin_b, 4);

        let batch_id = h
            .recon
            .create_cycle_count(
                tenant_id,
                test_user_id(),
                warehouse_id,
                Some(CycleCountScope {
                    bin_ids: vec![bin_a, bin_b],
                    product_id: Some(product_a),
                }),
                vec![],
                None,
                None,
            )
            .unwrap();

        let batch = h.recon.load_batch(tenant_id, batch_id).unwrap();
        assert_eq!(batch.lines().len(), 2);
        assert!(batch.lines().iter().all(|l| l.product_id == product_a));

        // All counts match the snapshot, so approval is a no-op on the ledger.
        h.recon.approve_batch(tenant_id, batch_id).unwrap();
        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_a, bin_a), 20);
        assert_eq!(ledger.available(product_a, bin_b), 4);
    }

    /// Store double for the approval retry path: before the next `armed`
    /// appends to the target stream, a rival delta lands first, so the
    /// original append loses its version check exactly as it would against a
    /// concurrent writer.
    struct ContendedStore {
        inner: InMemoryEventStore,
        target: AggregateId,
        rival: UncommittedEvent,
        armed: AtomicUsize,
    }

    impl EventStore for ContendedStore {
        fn append(
            &self,
            events: Vec<UncommittedEvent>,
            expected_version: ExpectedVersion,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            let contended = events.first().is_some_and(|e| e.aggregate_id == self.target)
                && self
                    .armed
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
            if contended {
                let mut rival = self.rival.clone();
                rival.event_id = Uuid::now_v7();
                self.inner.append(vec![rival], expected_version)?;
            }
            self.inner.append(events, expected_version)
        }

        fn load_stream(
            &self,
            tenant_id: TenantId,
            aggregate_id: AggregateId,
        ) -> Result<Vec<StoredEvent>, EventStoreError> {
            self.inner.load_stream(tenant_id, aggregate_id)
        }
    }

    struct ContendedHarness {
        recon: ReconciliationService<Arc<ContendedStore>, Bus>,
        store: Arc<ContendedStore>,
    }

    fn contended_setup(
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        product_id: ProductId,
        bin_id: BinId,
    ) -> ContendedHarness {
        let ledger_id = StockLedgerId::for_warehouse(warehouse_id);
        let rival = UncommittedEvent::from_typed(
            tenant_id,
            ledger_id.0,
            LEDGER_AGGREGATE_TYPE,
            Uuid::now_v7(),
            &StockLedgerEvent::DeltasApplied(DeltasApplied {
                tenant_id,
                warehouse_id,
                deltas: vec![StockDelta {
                    product_id,
                    bin_id,
                    quantity_change: -1,
                }],
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let store = Arc::new(ContendedStore {
            inner: InMemoryEventStore::new(),
            target: ledger_id.0,
            rival,
            armed: AtomicUsize::new(0),
        });
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::new(store.clone(), bus));
        ContendedHarness {
            recon: ReconciliationService::new(dispatcher),
            store,
        }
    }

    #[test]
    fn approval_retries_once_after_losing_the_ledger_race() {
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let product_id = ProductId::new(AggregateId::new());
        let bin_id = BinId::new(AggregateId::new());
        let h = contended_setup(tenant_id, warehouse_id, product_id, bin_id);

        h.recon
            .apply_deltas(
                tenant_id,
                warehouse_id,
                vec![StockDelta {
                    product_id,
                    bin_id,
                    quantity_change: 100,
                }],
            )
            .unwrap();

        let batch_id = h
            .recon
            .create_batch(
                tenant_id,
                test_user_id(),
                warehouse_id,
                BatchKind::Adjustment,
                vec![NewBatchLine {
                    product_id,
                    bin_id,
                    proposed_quantity: 80,
                    reason_code: Some(ReasonCode::Damaged),
                    notes: None,
                }],
                None,
                None,
            )
            .unwrap();

        // One rival append steals the version; the automatic retry's fresh
        // read (99) recomputes the delta and lands on the proposed quantity.
        h.store.armed.store(1, Ordering::SeqCst);
        h.recon.approve_batch(tenant_id, batch_id).unwrap();

        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_id, bin_id), 80);
        let batch = h.recon.load_batch(tenant_id, batch_id).unwrap();
        assert_eq!(batch.status(), BatchStatus::Approved);
    }

    #[test]
    fn approval_conflict_propagates_when_the_retry_also_loses() {
        let tenant_id = test_tenant_id();
        let warehouse_id = WarehouseId::new(AggregateId::new());
        let product_id = ProductId::new(AggregateId::new());
        let bin_id = BinId::new(AggregateId::new());
        let h = contended_setup(tenant_id, warehouse_id, product_id, bin_id);

        h.recon
            .apply_deltas(
                tenant_id,
                warehouse_id,
                vec![StockDelta {
                    product_id,
                    bin_id,
                    quantity_change: 100,
                }],
            )
            .unwrap();

        let batch_id = h
            .recon
            .create_batch(
                tenant_id,
                test_user_id(),
                warehouse_id,
                BatchKind::Adjustment,
                vec![NewBatchLine {
                    product_id,
                    bin_id,
                    proposed_quantity: 80,
                    reason_code: Some(ReasonCode::Damaged),
                    notes: None,
                }],
                None,
                None,
            )
            .unwrap();

        h.store.armed.store(2, Ordering::SeqCst);
        let err = h.recon.approve_batch(tenant_id, batch_id).unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));

        // The batch was never flipped; a later approval still goes through.
        let batch = h.recon.load_batch(tenant_id, batch_id).unwrap();
        assert_eq!(batch.status(), BatchStatus::Created);
        h.recon.approve_batch(tenant_id, batch_id).unwrap();
        let ledger = h.recon.load_ledger(tenant_id, warehouse_id).unwrap();
        assert_eq!(ledger.available(product_id, bin_id), 80);
    }
}
