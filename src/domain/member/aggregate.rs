//! Member aggregate and its billing-customer links.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{MemberId, Timestamp};

use super::errors::MemberError;
use super::ledger::SubscribeSource;

/// Access tier of a member.
///
/// `Comped` is only ever read back from legacy rows. Complimentary access is
/// granted through a zero-amount subscription, which derives as `Paid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Free,
    Paid,
    Comped,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Free => "free",
            MemberStatus::Paid => "paid",
            MemberStatus::Comped => "comped",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A member of the publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub email: String,
    pub name: Option<String>,
    pub note: Option<String>,
    pub status: MemberStatus,
    /// Newsletter opt-in, independent of billing.
    pub subscribed: bool,
    pub labels: Vec<String>,
    pub geolocation: Option<String>,
    /// Catalog product ids granted by active subscriptions.
    pub products: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Member {
    /// Creates a free member from signup data.
    pub fn create(data: NewMember) -> Result<Self, MemberError> {
        let email = normalize_email(&data.email)?;
        let now = Timestamp::now();

        Ok(Self {
            id: MemberId::new(),
            email,
            name: data.name,
            note: data.note,
            status: MemberStatus::Free,
            subscribed: data.subscribed,
            labels: dedupe_labels(data.labels),
            geolocation: data.geolocation,
            products: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies an edit, returning what changed.
    ///
    /// Status and products are not editable here; they follow from the
    /// subscription set.
    pub fn apply(&mut self, changes: MemberChanges) -> Result<AppliedChanges, MemberError> {
        let mut applied = AppliedChanges::default();

        if let Some(email) = changes.email {
            let email = normalize_email(&email)?;
            if email != self.email {
                applied.previous_email = Some(std::mem::replace(&mut self.email, email));
            }
        }
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(note) = changes.note {
            self.note = note;
        }
        if let Some(subscribed) = changes.subscribed {
            if subscribed != self.subscribed {
                self.subscribed = subscribed;
                applied.subscribed_changed = true;
            }
        }
        if let Some(labels) = changes.labels {
            self.labels = dedupe_labels(labels);
        }
        if let Some(geolocation) = changes.geolocation {
            self.geolocation = geolocation;
        }

        self.updated_at = Timestamp::now();
        Ok(applied)
    }
}

fn normalize_email(email: &str) -> Result<String, MemberError> {
    let trimmed = email.trim();
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
            Ok(trimmed.to_lowercase())
        }
        _ => Err(MemberError::InvalidEmail(email.to_string())),
    }
}

fn dedupe_labels(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim().to_string();
        if !label.is_empty() && !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

/// Data for a new member.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewMember {
    pub email: String,
    pub name: Option<String>,
    pub note: Option<String>,
    pub subscribed: bool,
    pub labels: Vec<String>,
    pub geolocation: Option<String>,
}

impl NewMember {
    /// A newsletter-subscribed member with only an email.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            subscribed: true,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unsubscribed(mut self) -> Self {
        self.subscribed = false;
        self
    }
}

/// Editable member fields. `None` leaves a field untouched; for optional
/// fields `Some(None)` clears it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberChanges {
    pub email: Option<String>,
    pub name: Option<Option<String>>,
    pub note: Option<Option<String>>,
    pub subscribed: Option<bool>,
    pub labels: Option<Vec<String>>,
    pub geolocation: Option<Option<String>>,
}

/// What an edit actually changed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppliedChanges {
    pub previous_email: Option<String>,
    pub subscribed_changed: bool,
}

impl AppliedChanges {
    pub fn email_changed(&self) -> bool {
        self.previous_email.is_some()
    }
}

/// Join record between a member and one Stripe customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StripeCustomer {
    pub customer_id: String,
    pub member_id: MemberId,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// How a member is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberSelector {
    Id(MemberId),
    Email(String),
    /// Resolved through the customer join.
    CustomerId(String),
}

impl fmt::Display for MemberSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberSelector::Id(id) => write!(f, "id={}", id),
            MemberSelector::Email(email) => write!(f, "email={}", email),
            MemberSelector::CustomerId(customer) => write!(f, "customer_id={}", customer),
        }
    }
}

/// Who initiated a member operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// Internal system process (webhooks, jobs).
    Internal,
    /// Staff user acting in the admin.
    Staff,
    /// The member themselves.
    Member,
}

/// Caller context for member writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: Actor,
    source: Option<SubscribeSource>,
}

impl RequestContext {
    pub fn internal() -> Self {
        Self {
            actor: Actor::Internal,
            source: None,
        }
    }

    pub fn staff() -> Self {
        Self {
            actor: Actor::Staff,
            source: None,
        }
    }

    pub fn member() -> Self {
        Self {
            actor: Actor::Member,
            source: None,
        }
    }

    /// Pins the subscribe-event source, e.g. for imports or Stripe checkouts.
    pub fn with_source(mut self, source: SubscribeSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Source recorded on subscribe events written in this context.
    pub fn subscribe_source(&self) -> SubscribeSource {
        self.source.unwrap_or(match self.actor {
            Actor::Internal => SubscribeSource::System,
            Actor::Staff => SubscribeSource::Admin,
            Actor::Member => SubscribeSource::Member,
        })
    }
}
