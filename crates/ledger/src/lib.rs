//! `wareflow-ledger` — the authoritative stock ledger.
//!
//! One event-sourced [`StockLedger`] aggregate per (tenant, warehouse). The
//! warehouse is the consistency boundary: a multi-line delta batch is a single
//! event in a single stream, so applying it is atomic by construction and the
//! event store's optimistic version check serializes concurrent writers that
//! touch the same warehouse. Streams of different warehouses commute.

pub mod stock;

pub use stock::{
    ApplyDeltas, LedgerEntry, Release, Reserve, StockDelta, StockLedger, StockLedgerCommand,
    StockLedgerEvent, StockLedgerId,
};
