use serde::{Deserialize, Serialize};
use thiserror::Error;

use wareflow_locations::{Bin, BinId, BinPath};
use wareflow_products::{Product, TemperatureRange};

/// Weighting of the three sub-scores. They sum to 1.0.
const CAPACITY_WEIGHT: f64 = 0.45;
const ITEM_MATCH_WEIGHT: f64 = 0.35;
const TEMPERATURE_WEIGHT: f64 = 0.20;

/// Allocation failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// No bin can take the whole quantity (capacity filter and temperature
    /// exclusion removed every bin). Partial placement is never suggested.
    #[error("no eligible bin for the requested quantity")]
    NoCandidate,

    /// The requested quantity is not positive.
    #[error("allocation quantity must be positive (got {0})")]
    InvalidQuantity(i64),
}

/// Caller-assembled view of one bin at suggestion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinSnapshot {
    pub bin: Bin,
    /// Temperature range of the bin's zone; `None` for ambient zones.
    pub zone_temperature: Option<TemperatureRange>,
    /// Total available quantity in the bin, summed across all products.
    pub occupancy: i64,
    /// Available quantity of the requested product already in this bin.
    pub product_quantity: i64,
}

impl BinSnapshot {
    pub fn remaining_capacity(&self) -> i64 {
        self.bin.capacity - self.occupancy
    }
}

/// Scored candidate. Transient: exists only for the duration of one request,
/// surfaced so callers can show the ranking alongside the winner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinCandidate {
    pub bin_id: BinId,
    pub path: BinPath,
    pub remaining_capacity: i64,
    pub product_quantity: i64,
    pub capacity_score: f64,
    pub item_match_score: f64,
    pub temperature_score: f64,
    pub score: f64,
}

/// The winning bin with its full hierarchy path, ready to pre-fill a
/// cascading location selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSuggestion {
    pub bin_id: BinId,
    pub bin_code: String,
    pub path: BinPath,
    pub score: f64,
    /// Full ranking, best first.
    pub candidates: Vec<BinCandidate>,
}

fn temperature_compatible(
    requirement: Option<&TemperatureRange>,
    zone: Option<&TemperatureRange>,
) -> bool {
    match requirement {
        None => true,
        Some(required) => zone.is_some_and(|z| z.contains(required)),
    }
}

/// Suggest the best bin for putting away `quantity` units of `product`.
///
/// Deterministic: identical snapshots and arguments produce the same
/// suggestion. Ties on the composite score go to the lowest bin id.
pub fn suggest_bin(
    product: &Product,
    quantity: i64,
    snapshots: &[BinSnapshot],
) -> Result<BinSuggestion, AllocationError> {
    if quantity <= 0 {
        return Err(AllocationError::InvalidQuantity(quantity));
    }

    let requirement = product.temperature_requirement.as_ref();

    // Hard filters: the whole quantity must fit, and a product with a
    // temperature requirement is excluded (not down-scored) from bins whose
    // zone cannot hold it.
    let eligible: Vec<&BinSnapshot> = snapshots
        .iter()
        .filter(|s| s.remaining_capacity() >= quantity)
        .filter(|s| temperature_compatible(requirement, s.zone_temperature.as_ref()))
        .collect();

    let max_remaining = eligible
        .iter()
        .map(|s| s.remaining_capacity())
        .max()
        .ok_or(AllocationError::NoCandidate)?;

    let mut candidates: Vec<BinCandidate> = eligible
        .into_iter()
        .map(|s| {
            let remaining = s.remaining_capacity();
            // max_remaining >= quantity >= 1, so the division is safe.
            let capacity_score = remaining as f64 / max_remaining as f64;
            let item_match_score = if s.product_quantity > 0 { 1.0 } else { 0.0 };
            // Survivors always pass the temperature check, so this sub-score
            // is 1.0 here; kept explicit so the composite formula is visible.
            let temperature_score = 1.0;

            let score = CAPACITY_WEIGHT * capacity_score
                + ITEM_MATCH_WEIGHT * item_match_score
                + TEMPERATURE_WEIGHT * temperature_score;

            BinCandidate {
                bin_id: s.bin.bin_id,
                path: s.bin.path,
                remaining_capacity: remaining,
                product_quantity: s.product_quantity,
                capacity_score,
                item_match_score,
                temperature_score,
                score,
            }
        })
        .collect();

    // Best first; equal scores ordered by bin id for reproducibility.
    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.bin_id.0.as_uuid().cmp(b.bin_id.0.as_uuid()))
    });

    let winner = &candidates[0];
    let bin_code = snapshots
        .iter()
        .find(|s| s.bin.bin_id == winner.bin_id)
        .map(|s| s.bin.code.clone())
        .unwrap_or_default();

    Ok(BinSuggestion {
        bin_id: winner.bin_id,
        bin_code,
        path: winner.path,
        score: winner.score,
        candidates,
    })
}
