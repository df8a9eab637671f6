use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use wareflow_core::AggregateId;
use wareflow_locations::{
    AisleId, Bin, BinId, BinPath, LocationDirectory, ShelfId, WarehouseId, Zone, ZoneId,
};
use wareflow_products::TemperatureRange;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/zones", post(create_zone))
        .route("/bins", post(create_bin))
}

/// Seeding endpoint for the external hierarchy manager: registers a zone
/// and its maintained temperature range.
pub async fn create_zone(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateZoneRequest>,
) -> axum::response::Response {
    let warehouse_id = match dto::parse_id(&body.warehouse_id, "warehouse") {
        Ok(id) => WarehouseId::new(id),
        Err(resp) => return resp,
    };

    let temperature_range = match body.temperature_range {
        Some(range) => match TemperatureRange::new(range.min_celsius, range.max_celsius) {
            Ok(r) => Some(r),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
            }
        },
        None => None,
    };

    let zone_id = ZoneId::new(AggregateId::new());
    services.directory.register_zone(
        tenant.tenant_id(),
        Zone {
            zone_id,
            warehouse_id,
            name: body.name,
            temperature_range,
        },
    );

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": zone_id.to_string() })),
    )
        .into_response()
}

/// Seeding endpoint for the external hierarchy manager: registers a bin with
/// its full denormalized path.
pub async fn create_bin(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateBinRequest>,
) -> axum::response::Response {
    let warehouse_id = match dto::parse_id(&body.warehouse_id, "warehouse") {
        Ok(id) => WarehouseId::new(id),
        Err(resp) => return resp,
    };
    let zone_id = match dto::parse_id(&body.zone_id, "zone") {
        Ok(id) => ZoneId::new(id),
        Err(resp) => return resp,
    };
    let aisle_id = match body.aisle_id {
        Some(s) => match dto::parse_id(&s, "aisle") {
            Ok(id) => AisleId::new(id),
            Err(resp) => return resp,
        },
        None => AisleId::new(AggregateId::new()),
    };
    let shelf_id = match body.shelf_id {
        Some(s) => match dto::parse_id(&s, "shelf") {
            Ok(id) => ShelfId::new(id),
            Err(resp) => return resp,
        },
        None => ShelfId::new(AggregateId::new()),
    };

    let path = BinPath {
        warehouse_id,
        zone_id,
        aisle_id,
        shelf_id,
    };

    let bin_id = BinId::new(AggregateId::new());
    let bin = match Bin::new(bin_id, body.code, path, body.capacity) {
        Ok(b) => b,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    services.directory.register_bin(tenant.tenant_id(), bin);

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": bin_id.to_string() })),
    )
        .into_response()
}
