//! Catalog products that gate content, and the Stripe prices behind them.

use serde::{Deserialize, Serialize};

use super::subscription::PlanInterval;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPrice {
    pub stripe_price_id: String,
    pub currency: String,
    pub amount: i64,
    pub interval: PlanInterval,
    pub nickname: Option<String>,
    pub active: bool,
}

impl ProductPrice {
    pub fn is_complimentary(&self) -> bool {
        self.amount == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub stripe_product_id: String,
    pub prices: Vec<ProductPrice>,
}

impl Product {
    pub fn has_price(&self, stripe_price_id: &str) -> bool {
        self.prices.iter().any(|p| p.stripe_price_id == stripe_price_id)
    }

    /// Active zero-amount price in `currency`, if one exists.
    pub fn complimentary_price(&self, currency: &str) -> Option<&ProductPrice> {
        self.prices
            .iter()
            .find(|p| p.active && p.is_complimentary() && p.currency.eq_ignore_ascii_case(currency))
    }
}
