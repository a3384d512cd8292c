use async_trait::async_trait;

use crate::models::UserId;

/// Delivers a text message to a user's chat.
///
/// Delivery is best-effort: implementations log failures instead of
/// returning them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, user_id: &UserId, text: &str);
}

/// Writes messages to the log, for runs without a chat transport.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, user_id: &UserId, text: &str) {
        tracing::info!(user = %user_id, "{}", text);
    }
}
