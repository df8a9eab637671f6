use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use wareflow_locations::WarehouseId;
use wareflow_products::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/suggestion", get(suggestion))
}

pub async fn suggestion(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<dto::SuggestionQuery>,
) -> axum::response::Response {
    let product_id = match dto::parse_id(&query.product_id, "product") {
        Ok(id) => ProductId::new(id),
        Err(resp) => return resp,
    };
    let warehouse_id = match dto::parse_id(&query.warehouse_id, "warehouse") {
        Ok(id) => WarehouseId::new(id),
        Err(resp) => return resp,
    };

    match services.allocation.suggest(
        tenant.tenant_id(),
        product_id,
        warehouse_id,
        query.quantity,
    ) {
        Ok(suggestion) => (StatusCode::OK, Json(dto::suggestion_to_json(suggestion))).into_response(),
        Err(e) => errors::allocation_error_to_response(e),
    }
}
