use serde::{Deserialize, Serialize};

use wareflow_core::{AggregateId, DomainError, Entity};

use crate::temperature::TemperatureRange;

/// Product identifier (tenant-scoped at the registry level).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product master record as seen by the engine.
///
/// Mutation happens in the master-data collaborator; here the record is a
/// snapshot the ledger, workflow, and scorer read from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub has_expiry_date: bool,
    /// Storage requirement; `None` means the product tolerates any zone.
    pub temperature_requirement: Option<TemperatureRange>,
}

impl Product {
    pub fn new(
        product_id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let sku = sku.into();
        let name = name.into();
        if sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        Ok(Self {
            product_id,
            sku,
            name,
            has_expiry_date: false,
            temperature_requirement: None,
        })
    }

    pub fn with_expiry_date(mut self) -> Self {
        self.has_expiry_date = true;
        self
    }

    pub fn with_temperature_requirement(mut self, range: TemperatureRange) -> Self {
        self.temperature_requirement = Some(range);
        self
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_sku_is_rejected() {
        let err = Product::new(ProductId::new(AggregateId::new()), "  ", "Frozen peas");
        assert!(matches!(err, Err(DomainError::Validation(_))));
    }

    #[test]
    fn builder_flags_accumulate() {
        let p = Product::new(ProductId::new(AggregateId::new()), "SKU-1", "Vaccine")
            .unwrap()
            .with_expiry_date()
            .with_temperature_requirement(TemperatureRange::new(2, 8).unwrap());

        assert!(p.has_expiry_date);
        assert_eq!(
            p.temperature_requirement,
            Some(TemperatureRange::new(2, 8).unwrap())
        );
    }
}
