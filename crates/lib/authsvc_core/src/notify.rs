//! Security notices.
//!
//! Delivery is best-effort: the orchestrator dispatches on a detached task
//! and failures are logged, never propagated to the refresh caller.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::models::auth::IpChangeNotice;
use crate::store::CredentialStore;

/// Receives security notices about a user's credentials.
#[async_trait]
pub trait SecurityNotifier: Send + Sync {
    /// A refresh arrived from an address other than the one the access
    /// token was issued to.
    async fn ip_changed(&self, notice: &IpChangeNotice) -> Result<()>;
}

/// Notifier that emits a structured warning event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl SecurityNotifier for LogNotifier {
    async fn ip_changed(&self, notice: &IpChangeNotice) -> Result<()> {
        warn!(
            user_id = %notice.user_id,
            email = notice.email.as_deref().unwrap_or("<unknown>"),
            previous_ip = %notice.previous_ip,
            new_ip = %notice.new_ip,
            "refresh from a new IP address"
        );
        Ok(())
    }
}

/// Resolve the user's email and hand the notice to `notifier` on a
/// detached task.
pub(crate) fn dispatch_ip_change(
    store: Arc<dyn CredentialStore>,
    notifier: Arc<dyn SecurityNotifier>,
    mut notice: IpChangeNotice,
) {
    tokio::spawn(async move {
        match store.find_user_by_id(&notice.user_id).await {
            Ok(user) => notice.email = Some(user.email),
            Err(e) => warn!(user_id = %notice.user_id, error = %e, "notice recipient lookup failed"),
        }
        if let Err(e) = notifier.ip_changed(&notice).await {
            warn!(user_id = %notice.user_id, error = %e, "failed to deliver IP change notice");
        }
    });
}
