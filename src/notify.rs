//! Outbound notification seam.
//!
//! The core never blocks or fails on notification delivery: messages are
//! dispatched after the financial transaction commits, and a send failure is
//! logged and ignored. The actual Telegram transport lives behind the
//! [`Notifier`] trait so the core stays testable without the network.

use tracing::warn;

use crate::errors::Result;

/// A message prepared inside a transaction and dispatched after commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Telegram id of the recipient
    pub telegram_id: i64,
    /// Message body, already formatted
    pub body: String,
}

/// Fire-and-forget message sender.
pub trait Notifier: Send + Sync {
    /// Sends a message to a recipient. Failures are surfaced to the caller
    /// only so they can be logged; they must never affect committed state.
    fn send(
        &self,
        telegram_id: i64,
        body: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Default notifier that only writes the message to the log. The production
/// bot service swaps in its own transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    async fn send(&self, telegram_id: i64, body: &str) -> Result<()> {
        tracing::info!(telegram_id, body, "notification");
        Ok(())
    }
}

/// Dispatches a notification in its own guarded scope: errors are logged and
/// swallowed so they cannot roll back or taint the surrounding operation.
pub async fn dispatch<N: Notifier>(notifier: &N, notification: &Notification) {
    if let Err(e) = notifier
        .send(notification.telegram_id, &notification.body)
        .await
    {
        warn!(
            telegram_id = notification.telegram_id,
            error = %e,
            "notification delivery failed (non-fatal)"
        );
    }
}
