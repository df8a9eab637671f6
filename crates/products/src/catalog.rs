//! Read-only product registry contract.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use wareflow_core::TenantId;

use crate::product::{Product, ProductId};

/// Tenant-scoped, read-oriented product lookup.
///
/// The engine treats products as externally-owned master data; `register` is
/// the seam through which the collaborator publishes records.
pub trait ProductCatalog: Send + Sync {
    fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<Product>;
    fn list(&self, tenant_id: TenantId) -> Vec<Product>;
    fn register(&self, tenant_id: TenantId, product: Product);
}

impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<Product> {
        (**self).get(tenant_id, product_id)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<Product> {
        (**self).list(tenant_id)
    }

    fn register(&self, tenant_id: TenantId, product: Product) {
        (**self).register(tenant_id, product)
    }
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    inner: RwLock<HashMap<(TenantId, ProductId), Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<Product> {
        let map = self.inner.read().ok()?;
        map.get(&(tenant_id, *product_id)).cloned()
    }

    fn list(&self, tenant_id: TenantId) -> Vec<Product> {
        let map = match self.inner.read() {
            Ok(m) => m,
            Err(_) => return vec![],
        };

        map.iter()
            .filter_map(|((t, _), p)| if *t == tenant_id { Some(p.clone()) } else { None })
            .collect()
    }

    fn register(&self, tenant_id: TenantId, product: Product) {
        if let Ok(mut map) = self.inner.write() {
            map.insert((tenant_id, product.product_id), product);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wareflow_core::AggregateId;

    #[test]
    fn catalog_is_tenant_isolated() {
        let catalog = InMemoryProductCatalog::new();
        let tenant_a = TenantId::new();
        let tenant_b = TenantId::new();
        let product_id = ProductId::new(AggregateId::new());

        let product = Product::new(product_id, "SKU-1", "Widget").unwrap();
        catalog.register(tenant_a, product.clone());

        assert_eq!(catalog.get(tenant_a, &product_id), Some(product));
        assert_eq!(catalog.get(tenant_b, &product_id), None);
        assert!(catalog.list(tenant_b).is_empty());
    }
}
