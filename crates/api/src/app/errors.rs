use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use wareflow_infra::command_dispatcher::DispatchError;
use wareflow_infra::services::AllocationServiceError;

pub fn dispatch_error_to_response(err: DispatchError) -> axum::response::Response {
    match err {
        DispatchError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DispatchError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DispatchError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DispatchError::InvalidState(msg) => json_error(StatusCode::CONFLICT, "invalid_state", msg),
        DispatchError::InsufficientStock(shortfalls) => {
            let lines: Vec<serde_json::Value> = shortfalls
                .iter()
                .map(|s| {
                    json!({
                        "product_id": s.product_id.to_string(),
                        "bin_id": s.bin_id.to_string(),
                        "requested": s.requested,
                        "available": s.available,
                    })
                })
                .collect();
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                axum::Json(json!({
                    "error": "insufficient_stock",
                    "message": "one or more deltas would drive availability below zero",
                    "shortfalls": lines,
                })),
            )
                .into_response()
        }
        DispatchError::Unauthorized => json_error(StatusCode::FORBIDDEN, "unauthorized", "unauthorized"),
        DispatchError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DispatchError::Deserialize(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        DispatchError::Store(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            format!("{e:?}"),
        ),
        DispatchError::Publish(msg) => json_error(StatusCode::BAD_GATEWAY, "publish_error", msg),
        DispatchError::TenantIsolation(msg) => json_error(StatusCode::FORBIDDEN, "tenant_isolation", msg),
    }
}

pub fn allocation_error_to_response(err: AllocationServiceError) -> axum::response::Response {
    match err {
        AllocationServiceError::ProductNotFound => {
            json_error(StatusCode::NOT_FOUND, "not_found", "product not found")
        }
        AllocationServiceError::Allocation(e) => match e {
            wareflow_allocation::AllocationError::NoCandidate => {
                json_error(StatusCode::UNPROCESSABLE_ENTITY, "no_candidate", e.to_string())
            }
            wareflow_allocation::AllocationError::InvalidQuantity(_) => {
                json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
            }
        },
        AllocationServiceError::Ledger(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "ledger_read_error", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
