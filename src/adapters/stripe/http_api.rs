//! Stripe REST transport.
//!
//! Implements `StripeApi` over reqwest: form-encoded requests authenticated
//! with the secret key as basic-auth user, JSON responses, and Stripe's error
//! envelope mapped onto `BillingErrorKind`.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::domain::billing::{BillingError, BillingErrorKind};
use crate::ports::{FormParams, StripeApi, StripeResource};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Stripe API transport configuration.
#[derive(Clone)]
pub struct StripeHttpConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,
}

impl StripeHttpConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for StripeHttpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeHttpConfig")
            .field("api_base_url", &self.api_base_url)
            .finish_non_exhaustive()
    }
}

pub struct StripeHttpApi {
    config: StripeHttpConfig,
    http_client: reqwest::Client,
}

impl StripeHttpApi {
    pub fn new(config: StripeHttpConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base_url, path)
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        requested_id: Option<&str>,
    ) -> Result<JsonValue, BillingError> {
        let response = self.authed(request).send().await.map_err(|e| {
            BillingError::new(BillingErrorKind::TransientNetworkError, e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            BillingError::new(BillingErrorKind::TransientNetworkError, e.to_string())
        })?;

        if !status.is_success() {
            let mut err = classify_error(status, &body);
            if let Some(id) = requested_id {
                err = err.with_requested_id(id);
            }
            tracing::debug!(status = status.as_u16(), kind = %err.kind, "Stripe request failed");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| {
            BillingError::new(
                BillingErrorKind::Provider,
                format!("Failed to parse Stripe response: {}", e),
            )
        })
    }
}

#[async_trait]
impl StripeApi for StripeHttpApi {
    async fn retrieve(
        &self,
        resource: StripeResource,
        id: &str,
        expand: &[&str],
    ) -> Result<JsonValue, BillingError> {
        let query: Vec<(&str, &str)> = expand.iter().map(|field| ("expand[]", *field)).collect();
        let request = self
            .http_client
            .get(self.url(&format!("{}/{}", resource.path(), id)))
            .query(&query);
        self.send(request, Some(id)).await
    }

    async fn create(
        &self,
        resource: StripeResource,
        params: FormParams,
        idempotency_key: &str,
    ) -> Result<JsonValue, BillingError> {
        let requested_id = params
            .iter()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.clone());

        let request = self
            .http_client
            .post(self.url(resource.path()))
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .form(&params);
        self.send(request, requested_id.as_deref()).await
    }

    async fn update(
        &self,
        resource: StripeResource,
        id: &str,
        params: FormParams,
    ) -> Result<JsonValue, BillingError> {
        let request = self
            .http_client
            .post(self.url(&format!("{}/{}", resource.path(), id)))
            .form(&params);
        self.send(request, Some(id)).await
    }

    async fn delete(&self, resource: StripeResource, id: &str) -> Result<JsonValue, BillingError> {
        let request = self
            .http_client
            .delete(self.url(&format!("{}/{}", resource.path(), id)));
        self.send(request, Some(id)).await
    }

    async fn invoke(
        &self,
        resource: StripeResource,
        id: &str,
        action: &str,
        params: FormParams,
    ) -> Result<JsonValue, BillingError> {
        let request = self
            .http_client
            .post(self.url(&format!("{}/{}/{}", resource.path(), id, action)))
            .form(&params);
        self.send(request, Some(id)).await
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Maps an unsuccessful response onto a billing error kind.
pub(crate) fn classify_error(status: StatusCode, body: &str) -> BillingError {
    let envelope: ErrorEnvelope = serde_json::from_str(body).unwrap_or_default();
    let error = envelope.error;
    let code = error.code.as_deref();
    let error_type = error.error_type.as_deref();

    let kind = if status == StatusCode::TOO_MANY_REQUESTS || code == Some("rate_limit") {
        BillingErrorKind::RateLimited
    } else if status == StatusCode::PAYMENT_REQUIRED || error_type == Some("card_error") {
        BillingErrorKind::CardDeclined
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        BillingErrorKind::AuthenticationFailed
    } else if status == StatusCode::NOT_FOUND || code == Some("resource_missing") {
        BillingErrorKind::ResourceMissing
    } else if status.is_client_error() {
        BillingErrorKind::InvalidRequest
    } else {
        BillingErrorKind::Provider
    };

    let message = error
        .message
        .unwrap_or_else(|| format!("Stripe API error ({})", status.as_u16()));
    let err = BillingError::new(kind, message);
    match error.code {
        Some(code) => err.with_provider_code(code),
        None => err,
    }
}
