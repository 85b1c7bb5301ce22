//! Deterministic Stripe resources.
//!
//! A resource created through `ensure` gets an id derived from a semantic
//! seed (a product name, a price's identity, an email), so repeating the
//! creation finds the existing resource instead of duplicating it. When the
//! resource behind an id is unusable (archived, deleted) the id is hashed
//! again, giving a fresh slot without touching the old object.

use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use crate::domain::billing::{BillingError, BillingErrorKind};
use crate::ports::{FormParams, StripeApi, StripeResource};

use super::retry::RetryPolicy;

/// Rehashes allowed before giving up on finding a usable slot.
const MAX_REHASHES: usize = 16;

/// Lowercase hex SHA-256 of `seed`.
pub fn deterministic_id(seed: &str) -> String {
    hex::encode(Sha256::digest(seed.as_bytes()))
}

/// Whether a retrieved object may be reused.
pub type Validity = fn(&JsonValue) -> bool;

pub fn active(object: &JsonValue) -> bool {
    object.get("active").and_then(JsonValue::as_bool).unwrap_or(false)
}

pub fn not_deleted(object: &JsonValue) -> bool {
    !object.get("deleted").and_then(JsonValue::as_bool).unwrap_or(false)
}

pub struct DeterministicResource<'a, A: StripeApi + ?Sized> {
    api: &'a A,
    retry: &'a RetryPolicy,
    resource: StripeResource,
    is_valid: Validity,
}

impl<'a, A: StripeApi + ?Sized> DeterministicResource<'a, A> {
    pub fn new(
        api: &'a A,
        retry: &'a RetryPolicy,
        resource: StripeResource,
        is_valid: Validity,
    ) -> Self {
        Self {
            api,
            retry,
            resource,
            is_valid,
        }
    }

    /// Finds the usable object for `seed`.
    ///
    /// A `ResourceMissing` error carries the id that should be created.
    pub async fn get(&self, seed: &str) -> Result<JsonValue, BillingError> {
        let mut id = deterministic_id(seed);

        for _ in 0..MAX_REHASHES {
            let found = self
                .retry
                .run("retrieve", || self.api.retrieve(self.resource, &id, &[]))
                .await
                .map_err(|err| err.with_requested_id(id.clone()))?;

            if (self.is_valid)(&found) {
                return Ok(found);
            }
            tracing::debug!(
                resource = self.resource.path(),
                id = %id,
                "Deterministic resource unusable, rehashing"
            );
            id = deterministic_id(&id);
        }

        Err(BillingError::new(
            BillingErrorKind::InvalidRequest,
            format!(
                "no usable {} slot after {} rehashes",
                self.resource.path(),
                MAX_REHASHES
            ),
        ))
    }

    /// Creates the object with an explicit id; the id is also the
    /// idempotency key.
    pub async fn create(&self, id: &str, params: FormParams) -> Result<JsonValue, BillingError> {
        let mut params = params;
        params.push(("id".to_string(), id.to_string()));
        self.retry
            .run("create", || self.api.create(self.resource, params.clone(), id))
            .await
    }

    /// Returns the existing object for `seed`, creating it when missing.
    pub async fn ensure(&self, seed: &str, params: FormParams) -> Result<JsonValue, BillingError> {
        match self.get(seed).await {
            Ok(found) => Ok(found),
            Err(err) if err.is(BillingErrorKind::ResourceMissing) => {
                let id = match err.requested_id {
                    Some(id) => id,
                    None => deterministic_id(seed),
                };
                tracing::info!(resource = self.resource.path(), id = %id, "Creating deterministic resource");
                self.create(&id, params).await
            }
            Err(err) => Err(err),
        }
    }

    /// Deletes the object for `seed`; a missing object is not an error.
    pub async fn remove(&self, seed: &str) -> Result<(), BillingError> {
        let result = match self.get(seed).await {
            Ok(found) => {
                let id = found
                    .get("id")
                    .and_then(JsonValue::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| deterministic_id(seed));
                self.retry
                    .run("delete", || self.api.delete(self.resource, &id))
                    .await
                    .map(|_| ())
            }
            Err(err) => Err(err),
        };

        match result {
            Err(err) if err.is(BillingErrorKind::ResourceMissing) => Ok(()),
            other => other,
        }
    }
}
