//! In-memory member store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, MemberId, Timestamp};
use crate::domain::member::{Member, MemberSelector, MemberStatus, StripeCustomer, Subscription};
use crate::ports::MemberStore;

#[derive(Debug, Default)]
struct Tables {
    members: HashMap<MemberId, Member>,
    customers: HashMap<String, StripeCustomer>,
    subscriptions: HashMap<String, Subscription>,
}

/// Member, customer and subscription tables behind one lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMemberStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryMemberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn member_count(&self) -> usize {
        self.tables.read().await.members.len()
    }

    pub async fn subscription_count(&self) -> usize {
        self.tables.read().await.subscriptions.len()
    }
}

fn member_by_email<'a>(tables: &'a Tables, email: &str) -> Option<&'a Member> {
    let email = email.trim().to_lowercase();
    tables.members.values().find(|m| m.email == email)
}

fn member_row<'a>(tables: &'a mut Tables, id: &MemberId) -> Result<&'a mut Member, DomainError> {
    tables.members.get_mut(id).ok_or_else(|| {
        DomainError::new(ErrorCode::MemberNotFound, "Member not found")
            .with_detail("member_id", id.to_string())
    })
}

#[async_trait]
impl MemberStore for InMemoryMemberStore {
    async fn find_member(&self, selector: &MemberSelector) -> Result<Option<Member>, DomainError> {
        let tables = self.tables.read().await;
        let member = match selector {
            MemberSelector::Id(id) => tables.members.get(id),
            MemberSelector::Email(email) => member_by_email(&tables, email),
            MemberSelector::CustomerId(customer_id) => tables
                .customers
                .get(customer_id)
                .and_then(|c| tables.members.get(&c.member_id)),
        };
        Ok(member.cloned())
    }

    async fn insert_member(&self, member: &Member) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        if tables.members.contains_key(&member.id) || member_by_email(&tables, &member.email).is_some()
        {
            return Err(DomainError::new(ErrorCode::MemberExists, "Member already exists")
                .with_detail("email", member.email.clone()));
        }
        tables.members.insert(member.id, member.clone());
        Ok(())
    }

    async fn update_profile(&self, member: &Member) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        let clash = tables
            .members
            .values()
            .any(|m| m.id != member.id && m.email == member.email);
        if clash {
            return Err(DomainError::new(ErrorCode::MemberExists, "Email already in use")
                .with_detail("email", member.email.clone()));
        }
        let row = member_row(&mut tables, &member.id)?;
        let status = row.status;
        let products = std::mem::take(&mut row.products);
        *row = Member {
            status,
            products,
            ..member.clone()
        };
        Ok(())
    }

    async fn update_status(
        &self,
        id: &MemberId,
        status: MemberStatus,
        products: &[String],
        updated_at: Timestamp,
    ) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        let row = member_row(&mut tables, id)?;
        row.status = status;
        row.products = products.to_vec();
        row.updated_at = updated_at;
        Ok(())
    }

    async fn delete_member(&self, id: &MemberId) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        tables.members.remove(id);
        tables.customers.retain(|_, c| c.member_id != *id);
        Ok(())
    }

    async fn customers_for_member(&self, id: &MemberId) -> Result<Vec<StripeCustomer>, DomainError> {
        let tables = self.tables.read().await;
        let mut customers: Vec<StripeCustomer> = tables
            .customers
            .values()
            .filter(|c| c.member_id == *id)
            .cloned()
            .collect();
        customers.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
        Ok(customers)
    }

    async fn find_customer(&self, customer_id: &str) -> Result<Option<StripeCustomer>, DomainError> {
        Ok(self.tables.read().await.customers.get(customer_id).cloned())
    }

    async fn upsert_customer(&self, customer: &StripeCustomer) -> Result<(), DomainError> {
        self.tables
            .write()
            .await
            .customers
            .insert(customer.customer_id.clone(), customer.clone());
        Ok(())
    }

    async fn find_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        Ok(self.tables.read().await.subscriptions.get(subscription_id).cloned())
    }

    async fn subscriptions_for_member(
        &self,
        id: &MemberId,
    ) -> Result<Vec<Subscription>, DomainError> {
        let tables = self.tables.read().await;
        let mut subscriptions: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| {
                tables
                    .customers
                    .get(&s.customer_id)
                    .is_some_and(|c| c.member_id == *id)
            })
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| a.subscription_id.cmp(&b.subscription_id));
        Ok(subscriptions)
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        if tables.subscriptions.contains_key(&subscription.subscription_id) {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                "Subscription already exists",
            )
            .with_detail("subscription_id", subscription.subscription_id.clone()));
        }
        tables
            .subscriptions
            .insert(subscription.subscription_id.clone(), subscription.clone());
        Ok(())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut tables = self.tables.write().await;
        match tables.subscriptions.get_mut(&subscription.subscription_id) {
            Some(row) => {
                *row = subscription.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::SubscriptionNotFound,
                "Subscription not found",
            )
            .with_detail("subscription_id", subscription.subscription_id.clone())),
        }
    }
}
