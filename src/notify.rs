use async_trait::async_trait;

use crate::errors::AppResult;
use crate::models::user::User;

/// Outbound channel for account messages. Delivery itself (SMTP, SMS) lives
/// behind this seam.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification(&self, user: &User, token: &str) -> AppResult<()>;
}

/// Writes the verification token to the log instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_verification(&self, user: &User, token: &str) -> AppResult<()> {
        tracing::info!(
            user_id = %user.id,
            email = %user.email,
            token = %token,
            "email verification pending"
        );
        Ok(())
    }
}
