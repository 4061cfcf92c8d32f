use std::fmt;

use thiserror::Error;

use crate::route::Route;
use crate::types::PeerId;

/// The peer sets kept by rooms and servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSet {
    Members,
    Admins,
    Moderators,
    Muted,
    Blacklist,
    Whitelist,
}

impl fmt::Display for PeerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerSet::Members => "members",
            PeerSet::Admins => "admins",
            PeerSet::Moderators => "moderators",
            PeerSet::Muted => "muted",
            PeerSet::Blacklist => "blacklist",
            PeerSet::Whitelist => "whitelist",
        };
        f.write_str(name)
    }
}

/// Violations of the domain model invariants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Peer {peer} is already in {set}")]
    AlreadyInSet { set: PeerSet, peer: PeerId },

    #[error("Peer {peer} is not in {set}")]
    NotInSet { set: PeerSet, peer: PeerId },

    #[error("Room {0} already exists")]
    RoomExists(PeerId),

    #[error("Room {0} not found")]
    RoomNotFound(PeerId),

    #[error("Server {0} already exists")]
    ServerExists(PeerId),

    #[error("Server {0} not found")]
    ServerNotFound(PeerId),

    #[error("P2P room already exists")]
    P2PExists,

    #[error("P2P room not found")]
    P2PNotFound,

    #[error("Message {0} not found")]
    MessageNotFound(String),

    #[error("Invalid route: {0}")]
    InvalidRoute(Route),

    #[error("Unknown message kind: type {msg_type}, subtype {msg_subtype}")]
    UnknownKind { msg_type: u8, msg_subtype: u8 },
}

/// Errors surfaced by the persistence collaborators.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Visor {0} not found")]
    NotFound(PeerId),

    #[error("Visor {0} already exists")]
    AlreadyExists(PeerId),

    #[error("User not found")]
    UserNotFound,

    #[error("Mutation rejected: {0}")]
    Rejected(#[from] DomainError),

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Invalid key bytes")]
    InvalidKeyBytes,

    #[error("Key file error: {0}")]
    KeyFile(String),
}
