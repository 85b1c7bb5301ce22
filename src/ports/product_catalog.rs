//! ProductCatalog port - read access to content-gating products.
//!
//! Catalog administration lives elsewhere; the membership core only looks
//! products up by price and registers complimentary prices it creates.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::member::{Product, ProductPrice};

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// The product new paid members are associated with by default.
    async fn default_product(&self) -> Result<Option<Product>, DomainError>;

    async fn find_by_price(&self, stripe_price_id: &str) -> Result<Option<Product>, DomainError>;

    async fn find_by_stripe_product(
        &self,
        stripe_product_id: &str,
    ) -> Result<Option<Product>, DomainError>;

    /// Registers a price on a product. Re-adding the same price id is a no-op.
    async fn add_price(&self, product_id: &str, price: ProductPrice) -> Result<(), DomainError>;
}
