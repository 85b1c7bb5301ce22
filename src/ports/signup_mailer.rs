//! SignupMailer port - post-checkout welcome email.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::member::Member;

#[async_trait]
pub trait SignupMailer: Send + Sync {
    /// Sends the signup email. `request_src` is the checkout's originating
    /// surface, forwarded for attribution.
    async fn send_signup_email(
        &self,
        member: &Member,
        request_src: Option<&str>,
    ) -> Result<(), DomainError>;
}
