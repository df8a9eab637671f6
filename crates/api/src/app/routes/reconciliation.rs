use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use wareflow_locations::{BinId, WarehouseId};
use wareflow_products::ProductId;
use wareflow_reconciliation::{BatchId, BatchKind};

use wareflow_infra::services::{CycleCountScope, NewBatchLine};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/adjustments", post(create_adjustment))
        .route("/cycle-counts", post(create_cycle_count))
        .route("/batches", get(list_batches))
        .route("/batches/:id", get(get_batch))
        .route("/batches/:id/approve", post(approve_batch))
        .route("/batches/:id/reject", post(reject_batch))
}

pub async fn create_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateBatchRequest>,
) -> axum::response::Response {
    let warehouse_id = match dto::parse_id(&body.warehouse_id, "warehouse") {
        Ok(id) => WarehouseId::new(id),
        Err(resp) => return resp,
    };

    let lines = match parse_lines(body.lines) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };

    let batch_id = match services.reconciliation.create_batch(
        tenant.tenant_id(),
        principal.user_id(),
        warehouse_id,
        BatchKind::Adjustment,
        lines,
        body.notes,
        body.scheduled_for,
    ) {
        Ok(id) => id,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": batch_id.to_string() })),
    )
        .into_response()
}

pub async fn create_cycle_count(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateCycleCountRequest>,
) -> axum::response::Response {
    let warehouse_id = match dto::parse_id(&body.warehouse_id, "warehouse") {
        Ok(id) => WarehouseId::new(id),
        Err(resp) => return resp,
    };

    let scope = match body.scope {
        Some(scope) => {
            let mut bin_ids = Vec::with_capacity(scope.bin_ids.len());
            for raw in &scope.bin_ids {
                match dto::parse_id(raw, "bin") {
                    Ok(id) => bin_ids.push(BinId::new(id)),
                    Err(resp) => return resp,
                }
            }
            let product_id = match scope.product_id {
                Some(raw) => match dto::parse_id(&raw, "product") {
                    Ok(id) => Some(ProductId::new(id)),
                    Err(resp) => return resp,
                },
                None => None,
            };
            Some(CycleCountScope {
                bin_ids,
                product_id,
            })
        }
        None => None,
    };

    let lines = match parse_lines(body.lines) {
        Ok(lines) => lines,
        Err(resp) => return resp,
    };

    let batch_id = match services.reconciliation.create_cycle_count(
        tenant.tenant_id(),
        principal.user_id(),
        warehouse_id,
        scope,
        lines,
        body.notes,
        body.scheduled_for,
    ) {
        Ok(id) => id,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": batch_id.to_string() })),
    )
        .into_response()
}

fn parse_lines(
    lines: Vec<dto::BatchLineRequest>,
) -> Result<Vec<NewBatchLine>, axum::response::Response> {
    let mut parsed = Vec::with_capacity(lines.len());
    for line in lines {
        let product_id = ProductId::new(dto::parse_id(&line.product_id, "product")?);
        let bin_id = BinId::new(dto::parse_id(&line.bin_id, "bin")?);
        parsed.push(NewBatchLine {
            product_id,
            bin_id,
            proposed_quantity: line.proposed_quantity,
            reason_code: line.reason_code,
            notes: line.notes,
        });
    }
    Ok(parsed)
}

pub async fn approve_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let batch_id = match dto::parse_id(&id, "batch") {
        Ok(id) => BatchId::new(id),
        Err(resp) => return resp,
    };

    if let Err(e) = services
        .reconciliation
        .approve_batch(tenant.tenant_id(), batch_id)
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "id": batch_id.to_string(), "status": "approved" })),
    )
        .into_response()
}

pub async fn reject_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let batch_id = match dto::parse_id(&id, "batch") {
        Ok(id) => BatchId::new(id),
        Err(resp) => return resp,
    };

    if let Err(e) = services
        .reconciliation
        .reject_batch(tenant.tenant_id(), batch_id)
    {
        return errors::dispatch_error_to_response(e);
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({ "id": batch_id.to_string(), "status": "rejected" })),
    )
        .into_response()
}

pub async fn list_batches(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let batches: Vec<serde_json::Value> = services
        .batches
        .list(tenant.tenant_id())
        .into_iter()
        .map(dto::batch_to_json)
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "batches": batches }))).into_response()
}

pub async fn get_batch(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let batch_id = match dto::parse_id(&id, "batch") {
        Ok(id) => BatchId::new(id),
        Err(resp) => return resp,
    };

    match services.batches.get(tenant.tenant_id(), &batch_id) {
        Some(rm) => (StatusCode::OK, Json(dto::batch_to_json(rm))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "batch not found"),
    }
}
