use axum::{Router, routing::get};

pub mod allocation;
pub mod ledger;
pub mod locations;
pub mod products;
pub mod reconciliation;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/reconciliation", reconciliation::router())
        .nest("/allocation", allocation::router())
        .nest("/ledger", ledger::router())
        .nest("/products", products::router())
        .nest("/locations", locations::router())
}
