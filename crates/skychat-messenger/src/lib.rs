//! # skychat-messenger
//!
//! The messenger turns the connection handler's inbound stream into state:
//! every message is classified as direct chat, remote group or hosted group
//! traffic, authorized against blacklists and membership, applied to the
//! visor aggregates, answered and surfaced as a [`Notification`].
//!
//! It also carries the outbound API the local user drives: sending
//! messages and commands, hosting servers, deleting and leaving routes.

pub mod classify;
pub mod context;
pub mod error;
mod local_group;
pub mod notification;
mod p2p;
mod remote_group;
mod routes;
mod send;
pub mod service;

#[cfg(test)]
mod scenarios;

pub use classify::{classify, MessageClass};
pub use context::AppContext;
pub use error::MessengerError;
pub use notification::{ChannelNotifier, Notification, NotificationSink, NotifyError};
pub use service::{log_errors, MessengerService};
