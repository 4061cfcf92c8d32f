//! Everything the messenger needs, assembled once at startup.

use std::sync::Arc;

use skychat_net::ConnectionHandler;
use skychat_shared::{PeerId, User, UserRepository, VisorRepository};

use crate::error::Result;
use crate::notification::NotificationSink;

/// Handles to the collaborators shared by every messenger operation.
///
/// Cloning is cheap; all fields are reference counted.
#[derive(Clone)]
pub struct AppContext {
    /// Public key of the local visor
    pub local: PeerId,
    pub visors: Arc<dyn VisorRepository>,
    pub users: Arc<dyn UserRepository>,
    pub notifier: Arc<dyn NotificationSink>,
    pub handler: ConnectionHandler,
}

impl AppContext {
    pub fn new(
        visors: Arc<dyn VisorRepository>,
        users: Arc<dyn UserRepository>,
        notifier: Arc<dyn NotificationSink>,
        handler: ConnectionHandler,
    ) -> Self {
        Self {
            local: handler.local(),
            visors,
            users,
            notifier,
            handler,
        }
    }

    pub fn user(&self) -> Result<User> {
        Ok(self.users.get_user()?)
    }
}
