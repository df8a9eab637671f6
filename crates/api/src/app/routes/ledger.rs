use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use wareflow_ledger::StockDelta;
use wareflow_locations::{BinId, WarehouseId};
use wareflow_products::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:warehouse/quantity", get(get_quantity))
        .route("/:warehouse/stock", get(list_stock))
        .route("/:warehouse/deltas", post(apply_deltas))
}

/// Point read of one (product, bin) entry, straight from the rehydrated
/// ledger (read-after-write consistent, unlike the projection).
pub async fn get_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(warehouse): Path<String>,
    Query(query): Query<dto::QuantityQuery>,
) -> axum::response::Response {
    let warehouse_id = match dto::parse_id(&warehouse, "warehouse") {
        Ok(id) => WarehouseId::new(id),
        Err(resp) => return resp,
    };
    let product_id = match dto::parse_id(&query.product_id, "product") {
        Ok(id) => ProductId::new(id),
        Err(resp) => return resp,
    };
    let bin_id = match dto::parse_id(&query.bin_id, "bin") {
        Ok(id) => BinId::new(id),
        Err(resp) => return resp,
    };

    let ledger = match services
        .reconciliation
        .load_ledger(tenant.tenant_id(), warehouse_id)
    {
        Ok(l) => l,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    let entry = ledger.quantity(product_id, bin_id);
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "product_id": product_id.to_string(),
            "bin_id": bin_id.to_string(),
            "available": entry.available,
            "reserved": entry.reserved,
        })),
    )
        .into_response()
}

/// Projected stock levels for a warehouse (eventually consistent).
pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(warehouse): Path<String>,
) -> axum::response::Response {
    let warehouse_id = match dto::parse_id(&warehouse, "warehouse") {
        Ok(id) => WarehouseId::new(id),
        Err(resp) => return resp,
    };

    let levels: Vec<serde_json::Value> = services
        .stock_levels
        .list_for_warehouse(tenant.tenant_id(), warehouse_id)
        .into_iter()
        .map(dto::stock_level_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "levels": levels }))).into_response()
}

/// Putaway write-back: the receiving collaborator posts signed deltas here
/// after a suggestion is accepted.
pub async fn apply_deltas(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(warehouse): Path<String>,
    Json(body): Json<dto::ApplyDeltasRequest>,
) -> axum::response::Response {
    let warehouse_id = match dto::parse_id(&warehouse, "warehouse") {
        Ok(id) => WarehouseId::new(id),
        Err(resp) => return resp,
    };

    let mut deltas = Vec::with_capacity(body.deltas.len());
    for delta in body.deltas {
        let product_id = match dto::parse_id(&delta.product_id, "product") {
            Ok(id) => ProductId::new(id),
            Err(resp) => return resp,
        };
        let bin_id = match dto::parse_id(&delta.bin_id, "bin") {
            Ok(id) => BinId::new(id),
            Err(resp) => return resp,
        };
        deltas.push(StockDelta {
            product_id,
            bin_id,
            quantity_change: delta.quantity_change,
        });
    }

    if let Err(e) = services
        .reconciliation
        .apply_deltas(tenant.tenant_id(), warehouse_id, deltas)
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "warehouse_id": warehouse_id.to_string() })),
    )
        .into_response()
}
