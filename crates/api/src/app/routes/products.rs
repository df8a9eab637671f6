use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use wareflow_core::AggregateId;
use wareflow_products::{Product, ProductCatalog, ProductId, TemperatureRange};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/", post(create_product).get(list_products))
}

/// Seeding endpoint for the external master-data collaborator.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let product_id = ProductId::new(AggregateId::new());

    let mut product = match Product::new(product_id, body.sku, body.name) {
        Ok(p) => p,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };
    if body.has_expiry_date {
        product = product.with_expiry_date();
    }
    if let Some(range) = body.temperature_requirement {
        match TemperatureRange::new(range.min_celsius, range.max_celsius) {
            Ok(r) => product = product.with_temperature_requirement(r),
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string());
            }
        }
    }

    services.catalog.register(tenant.tenant_id(), product);

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": product_id.to_string() })),
    )
        .into_response()
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    let products: Vec<serde_json::Value> = services
        .catalog
        .list(tenant.tenant_id())
        .into_iter()
        .map(|p| {
            serde_json::json!({
                "id": p.product_id.to_string(),
                "sku": p.sku,
                "name": p.name,
                "has_expiry_date": p.has_expiry_date,
                "temperature_requirement": p.temperature_requirement,
            })
        })
        .collect();

    (StatusCode::OK, Json(serde_json::json!({ "products": products }))).into_response()
}
