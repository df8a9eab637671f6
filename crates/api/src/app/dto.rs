use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use wareflow_allocation::{BinCandidate, BinSuggestion};
use wareflow_core::AggregateId;
use wareflow_infra::projections::{BatchReadModel, StockLevel};
use wareflow_ledger::StockDelta;
use wareflow_reconciliation::{ReasonCode, ReconciliationLine};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct BatchLineRequest {
    pub product_id: String,
    pub bin_id: String,
    pub proposed_quantity: i64,
    pub reason_code: Option<ReasonCode>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBatchRequest {
    pub warehouse_id: String,
    pub lines: Vec<BatchLineRequest>,
    pub notes: Option<String>,
    /// Rejected on adjustments; kept in the request so the aggregate's
    /// validation answers instead of silent field drop.
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CycleCountScopeRequest {
    pub bin_ids: Vec<String>,
    #[serde(default)]
    pub product_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCycleCountRequest {
    pub warehouse_id: String,
    /// Pre-populate lines from these bins (optionally one product).
    #[serde(default)]
    pub scope: Option<CycleCountScopeRequest>,
    #[serde(default)]
    pub lines: Vec<BatchLineRequest>,
    pub notes: Option<String>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct StockDeltaRequest {
    pub product_id: String,
    pub bin_id: String,
    pub quantity_change: i64,
}

#[derive(Debug, Deserialize)]
pub struct ApplyDeltasRequest {
    pub deltas: Vec<StockDeltaRequest>,
}

#[derive(Debug, Deserialize)]
pub struct TemperatureRangeRequest {
    pub min_celsius: i32,
    pub max_celsius: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub has_expiry_date: bool,
    pub temperature_requirement: Option<TemperatureRangeRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateZoneRequest {
    pub warehouse_id: String,
    pub name: String,
    pub temperature_range: Option<TemperatureRangeRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBinRequest {
    pub code: String,
    pub warehouse_id: String,
    pub zone_id: String,
    /// Optional: generated when the seeding caller has no aisle granularity.
    pub aisle_id: Option<String>,
    /// Optional: generated when the seeding caller has no shelf granularity.
    pub shelf_id: Option<String>,
    pub capacity: i64,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionQuery {
    pub product_id: String,
    pub warehouse_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct QuantityQuery {
    pub product_id: String,
    pub bin_id: String,
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_id(s: &str, what: &str) -> Result<AggregateId, axum::response::Response> {
    s.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn stock_level_to_json(level: StockLevel) -> serde_json::Value {
    serde_json::json!({
        "product_id": level.product_id.to_string(),
        "bin_id": level.bin_id.to_string(),
        "warehouse_id": level.warehouse_id.to_string(),
        "available": level.available,
        "reserved": level.reserved,
    })
}

pub fn line_to_json(line: &ReconciliationLine) -> serde_json::Value {
    serde_json::json!({
        "product_id": line.product_id.to_string(),
        "bin_id": line.bin_id.to_string(),
        "system_quantity": line.system_quantity,
        "proposed_quantity": line.proposed_quantity,
        "variance": line.variance(),
        "reason_code": line.reason_code,
        "notes": line.notes,
    })
}

pub fn delta_to_json(delta: &StockDelta) -> serde_json::Value {
    serde_json::json!({
        "product_id": delta.product_id.to_string(),
        "bin_id": delta.bin_id.to_string(),
        "quantity_change": delta.quantity_change,
    })
}

pub fn batch_to_json(rm: BatchReadModel) -> serde_json::Value {
    serde_json::json!({
        "id": rm.batch_id.to_string(),
        "warehouse_id": rm.warehouse_id.to_string(),
        "kind": rm.kind,
        "status": rm.status,
        "sequence_no": rm.sequence_no,
        "lines": rm.lines.iter().map(line_to_json).collect::<Vec<_>>(),
        "notes": rm.notes,
        "scheduled_for": rm.scheduled_for,
        "created_by": rm.created_by.map(|u| u.to_string()),
        "created_at": rm.created_at,
        "applied_deltas": rm.applied_deltas.iter().map(delta_to_json).collect::<Vec<_>>(),
        "processed_at": rm.processed_at,
    })
}

fn candidate_to_json(c: &BinCandidate) -> serde_json::Value {
    serde_json::json!({
        "bin_id": c.bin_id.to_string(),
        "remaining_capacity": c.remaining_capacity,
        "product_quantity": c.product_quantity,
        "capacity_score": c.capacity_score,
        "item_match_score": c.item_match_score,
        "temperature_score": c.temperature_score,
        "score": c.score,
    })
}

pub fn suggestion_to_json(s: BinSuggestion) -> serde_json::Value {
    serde_json::json!({
        "bin_id": s.bin_id.to_string(),
        "bin_code": s.bin_code,
        "path": {
            "warehouse_id": s.path.warehouse_id.to_string(),
            "zone_id": s.path.zone_id.to_string(),
            "aisle_id": s.path.aisle_id.to_string(),
            "shelf_id": s.path.shelf_id.to_string(),
        },
        "score": s.score,
        "candidates": s.candidates.iter().map(candidate_to_json).collect::<Vec<_>>(),
    })
}
