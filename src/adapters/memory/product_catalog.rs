//! In-memory product catalog.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode};
use crate::domain::member::{Product, ProductPrice};
use crate::ports::ProductCatalog;

/// Products in insertion order; the first one is the default product.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    products: Arc<RwLock<Vec<Product>>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(RwLock::new(products)),
        }
    }

    pub async fn products(&self) -> Vec<Product> {
        self.products.read().await.clone()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn default_product(&self) -> Result<Option<Product>, DomainError> {
        Ok(self.products.read().await.first().cloned())
    }

    async fn find_by_price(&self, stripe_price_id: &str) -> Result<Option<Product>, DomainError> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .find(|p| p.has_price(stripe_price_id))
            .cloned())
    }

    async fn find_by_stripe_product(
        &self,
        stripe_product_id: &str,
    ) -> Result<Option<Product>, DomainError> {
        Ok(self
            .products
            .read()
            .await
            .iter()
            .find(|p| p.stripe_product_id == stripe_product_id)
            .cloned())
    }

    async fn add_price(&self, product_id: &str, price: ProductPrice) -> Result<(), DomainError> {
        let mut products = self.products.write().await;
        let product = products
            .iter_mut()
            .find(|p| p.id == product_id)
            .ok_or_else(|| {
                DomainError::new(ErrorCode::ProductNotFound, "Product not found")
                    .with_detail("product_id", product_id)
            })?;
        if !product.has_price(&price.stripe_price_id) {
            product.prices.push(price);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::member::PlanInterval;

    fn product() -> Product {
        Product {
            id: "p1".into(),
            name: "Default".into(),
            stripe_product_id: "prod_1".into(),
            prices: vec![],
        }
    }

    fn free_price(id: &str) -> ProductPrice {
        ProductPrice {
            stripe_price_id: id.into(),
            currency: "usd".into(),
            amount: 0,
            interval: PlanInterval::Year,
            nickname: Some("Complimentary".into()),
            active: true,
        }
    }

    #[tokio::test]
    async fn add_price_is_idempotent_and_findable() {
        let catalog = InMemoryProductCatalog::with_products(vec![product()]);

        catalog.add_price("p1", free_price("price_free")).await.unwrap();
        catalog.add_price("p1", free_price("price_free")).await.unwrap();

        let found = catalog.find_by_price("price_free").await.unwrap().unwrap();
        assert_eq!(found.prices.len(), 1);
    }

    #[tokio::test]
    async fn find_by_stripe_product_matches_provider_id() {
        let catalog = InMemoryProductCatalog::with_products(vec![product()]);

        assert_eq!(
            catalog.find_by_stripe_product("prod_1").await.unwrap().map(|p| p.id),
            Some("p1".to_string())
        );
        assert!(catalog.find_by_stripe_product("prod_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn add_price_to_unknown_product_fails() {
        let catalog = InMemoryProductCatalog::new();
        let err = catalog.add_price("nope", free_price("price_free")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ProductNotFound);
        assert!(catalog.default_product().await.unwrap().is_none());
    }
}
