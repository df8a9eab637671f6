//! Application services: orchestration over dispatchers and read collaborators.

pub mod allocation_service;
pub mod reconciliation_service;

pub use allocation_service::{AllocationService, AllocationServiceError};
pub use reconciliation_service::{CycleCountScope, NewBatchLine, ReconciliationService};
