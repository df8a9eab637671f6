//! Reconciliation workflow: adjustment and cycle-count batches.
//!
//! Both batch kinds share one state machine (`created → approved | rejected`,
//! both terminal). They differ only in vocabulary and in how their lines are
//! sourced, so a single aggregate carries a `kind` tag plus kind-specific
//! validation instead of two near-identical lifecycles.

pub mod batch;
pub mod reason;

pub use batch::{
    ApproveBatch, BatchApproved, BatchCreated, BatchId, BatchKind, BatchRejected, BatchStatus,
    CreateBatch, ReconciliationBatch, ReconciliationBatchCommand, ReconciliationBatchEvent,
    ReconciliationLine, RejectBatch,
};
pub use reason::ReasonCode;
