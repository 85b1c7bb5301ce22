//! Billing module - Stripe wire shapes, webhook verification and dispatch.

mod errors;
mod resources;
mod stripe_event;
mod webhook_errors;
mod webhook_processor;
mod webhook_verifier;

pub use errors::{BillingError, BillingErrorKind};
pub use resources::{
    BillingDetails, CardDetails, CheckoutMetadata, CheckoutMode, Recurring, SetupIntentMetadata,
    StripeCheckoutSession, StripeCustomerObject, StripeInvoice, StripeList, StripePaymentMethod,
    StripePlan, StripePrice, StripeProduct, StripeSetupIntent, StripeSubscription,
    StripeWebhookEndpoint, SubscriptionItem, PaymentMethodRef,
};
pub use stripe_event::{ClassifiedEvent, StripeEvent, StripeEventData, StripeEventType};
pub use webhook_errors::WebhookError;
pub use webhook_processor::{IdempotentWebhookProcessor, WebhookDispatcher};
pub use webhook_verifier::{signature_header, SignatureHeader, StripeWebhookVerifier};

#[cfg(test)]
pub use stripe_event::StripeEventBuilder;
