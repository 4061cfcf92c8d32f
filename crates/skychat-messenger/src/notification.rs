//! User-facing events raised while messages are applied.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

use skychat_shared::{Message, Route};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A message was added to the log of `route`.
    NewMessage { route: Route, message: Message },
    /// A remote visor opened a P2P chat with us.
    NewP2PChat { route: Route },
    /// A peer joined one of our hosted groups.
    NewGroupChat { route: Route },
    AddRoute { route: Route },
    DeleteRoute { route: Route },
}

impl Notification {
    pub fn route(&self) -> Route {
        match self {
            Notification::NewMessage { route, .. }
            | Notification::NewP2PChat { route }
            | Notification::NewGroupChat { route }
            | Notification::AddRoute { route }
            | Notification::DeleteRoute { route } => *route,
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("No notification subscribers")]
    NoSubscribers,

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Where notifications go. Delivery is fire-and-forget for the messenger.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Fans notifications out to every subscribed receiver.
#[derive(Clone)]
pub struct ChannelNotifier {
    tx: broadcast::Sender<Notification>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx
            .send(notification)
            .map(|_| ())
            .map_err(|_| NotifyError::NoSubscribers)
    }
}

/// Deliver `notification`, logging instead of failing.
pub fn emit(sink: &dyn NotificationSink, notification: Notification) {
    let route = notification.route();
    if let Err(e) = sink.notify(notification) {
        warn!(route = %route, error = %e, "Failed to emit notification");
    }
}
