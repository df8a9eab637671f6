//! Bin allocation scorer.
//!
//! Pure putaway recommendation: given a product, a quantity, and a snapshot of
//! every bin in the target warehouse, rank the bins that can take the whole
//! quantity and return the best one with its full hierarchy path. The scorer
//! performs no reads or writes of its own; callers assemble the snapshots from
//! the ledger and the location directory.

pub mod scorer;

pub use scorer::{suggest_bin, AllocationError, BinCandidate, BinSnapshot, BinSuggestion};
