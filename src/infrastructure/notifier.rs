use crate::domain::ports::Notifier;
use crate::domain::reservation::UserId;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Notifier that records messages in the log instead of delivering them.
///
/// Stands in for the transactional mail service, which resolves the user's
/// address from their id and is not part of this crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, recipient: UserId, subject: &str, body: &str) -> Result<()> {
        info!(%recipient, subject, body, "Notification dispatched");
        Ok(())
    }
}
