use thiserror::Error;

use skychat_net::NetError;
use skychat_shared::{CmdKind, DomainError, MessageKind, PeerId, RepositoryError, Route};

use crate::classify::MessageClass;

/// Per-message and per-request failures of the messenger.
///
/// None of these are fatal; the inbound loop reports them on its error
/// stream and moves on to the next message.
#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("Message from {root} to {dest} matches no chat class")]
    Unclassified { root: Route, dest: Route },

    #[error("{kind:?} is not accepted on {class:?} routes")]
    UnexpectedKind {
        kind: MessageKind,
        class: MessageClass,
    },

    #[error("Peer {peer} is blacklisted on {route}")]
    Blacklisted { peer: PeerId, route: Route },

    #[error("Peer {peer} is not a member of {route}")]
    NotMember { peer: PeerId, route: Route },

    #[error("Peer {peer} may not run {command:?} on {route}")]
    Unauthorized {
        peer: PeerId,
        route: Route,
        command: CmdKind,
    },

    #[error("Peer {peer} sent info describing {described}")]
    ForeignInfo { peer: PeerId, described: PeerId },

    #[error("Route {0} belongs to the local visor")]
    OwnRoute(Route),

    #[error("Route {0} does not belong to the local visor")]
    ForeignRoute(Route),

    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Net(#[from] NetError),
}

pub type Result<T> = std::result::Result<T, MessengerError>;
