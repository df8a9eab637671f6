use serde::{Deserialize, Serialize};

use wareflow_core::{DomainError, ValueObject};

/// Inclusive temperature band in whole degrees Celsius.
///
/// Used both as a product's storage requirement and as a zone's maintained
/// range. A requirement is satisfied only when the zone range fully contains
/// it — partial overlap is not good enough for putaway.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemperatureRange {
    pub min_celsius: i32,
    pub max_celsius: i32,
}

impl TemperatureRange {
    pub fn new(min_celsius: i32, max_celsius: i32) -> Result<Self, DomainError> {
        if min_celsius > max_celsius {
            return Err(DomainError::validation(format!(
                "temperature range is inverted ({min_celsius}..{max_celsius})"
            )));
        }
        Ok(Self {
            min_celsius,
            max_celsius,
        })
    }

    /// True when `required` lies entirely within `self`.
    pub fn contains(&self, required: &TemperatureRange) -> bool {
        self.min_celsius <= required.min_celsius && required.max_celsius <= self.max_celsius
    }
}

impl ValueObject for TemperatureRange {}
